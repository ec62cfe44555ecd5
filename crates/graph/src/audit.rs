use crate::types::Catalog;
use std::collections::BTreeSet;

/// How a technique's requirements can be met by the rest of the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reachability {
    /// Every requirement is provided unconditionally by some technique
    Reachable,
    /// Some requirement is only granted through conditional provides
    ConditionalOnly,
    /// Some requirement is never granted; needs seeding
    Unreachable,
}

/// Techniques whose requirements are not unconditionally provided.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnreachableReport {
    pub conditional_only: Vec<String>,
    pub unreachable: Vec<String>,
}

impl UnreachableReport {
    /// False when any technique cannot be reached without seeding.
    pub fn is_ok(&self) -> bool {
        self.unreachable.is_empty()
    }
}

/// Check every technique's requirements against everything the catalog provides.
///
/// Pass a catalog of base records and flattened children; conditional variants
/// require system conditions nothing provides and would all be reported.
pub fn check_unreachable(catalog: &Catalog) -> UnreachableReport {
    let mut normal: BTreeSet<&str> = BTreeSet::new();
    let mut conditional: BTreeSet<&str> = BTreeSet::new();

    for (_, technique) in catalog.iter() {
        normal.extend(technique.provides.iter().map(String::as_str));
        for child in technique.children.values() {
            normal.extend(child.provides.iter().flatten().map(String::as_str));
        }
        for grants in technique.conditional_provides.values() {
            conditional.extend(grants.iter().map(String::as_str));
        }
    }

    let mut report = UnreachableReport::default();
    for (id, technique) in catalog.iter() {
        let reachability = classify(
            technique.requires.iter().map(String::as_str),
            &normal,
            &conditional,
        );
        match reachability {
            Reachability::Reachable => {}
            Reachability::ConditionalOnly => {
                log::warn!("{id} can only be reached through conditional provides");
                report.conditional_only.push(id.clone());
            }
            Reachability::Unreachable => {
                log::warn!("{id} can not be reached without seeding");
                report.unreachable.push(id.clone());
            }
        }
    }
    report
}

fn classify<'a>(
    mut requires: impl Iterator<Item = &'a str> + Clone,
    normal: &BTreeSet<&str>,
    conditional: &BTreeSet<&str>,
) -> Reachability {
    if requires.clone().all(|req| normal.contains(req)) {
        Reachability::Reachable
    } else if requires.all(|req| normal.contains(req) || conditional.contains(req)) {
        Reachability::ConditionalOnly
    } else {
        Reachability::Unreachable
    }
}
