use crate::types::{Catalog, Technique};
use std::collections::BTreeSet;

/// Techniques that do nothing once `ignored` promises are disregarded.
///
/// With `nop_empty_provides` a technique is a NOP when nothing remains of its
/// provides; otherwise both requires and provides must be empty.
pub fn nop_techniques(
    catalog: &Catalog,
    ignored: &[String],
    nop_empty_provides: bool,
) -> BTreeSet<String> {
    catalog
        .iter()
        .filter(|(_, technique)| is_nop(technique, ignored, nop_empty_provides))
        .map(|(id, _)| id.clone())
        .collect()
}

fn is_nop(technique: &Technique, ignored: &[String], nop_empty_provides: bool) -> bool {
    let kept = |promise: &&String| !ignored.contains(promise);
    let provides_left = technique.provides.iter().any(|p| kept(&p));
    if nop_empty_provides {
        return !provides_left;
    }
    let requires_left = technique.requires.iter().any(|r| kept(&r));
    !provides_left && !requires_left
}

/// Split `bundle` into kept entries and the sorted NOP entries removed.
pub fn remove_nops(bundle: &[String], nops: &BTreeSet<String>) -> (Vec<String>, Vec<String>) {
    let (removed, kept): (Vec<String>, Vec<String>) =
        bundle.iter().cloned().partition(|id| nops.contains(id));
    let removed: BTreeSet<String> = removed.into_iter().collect();
    (kept, removed.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn technique(requires: &[&str], provides: &[&str]) -> Technique {
        Technique {
            requires: requires.iter().map(|s| s.to_string()).collect(),
            provides: provides.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    fn catalog() -> Catalog {
        [
            ("only_requires", technique(&["x"], &[])),
            ("evasion", technique(&["code_executed"], &["defense_evasion"])),
            ("useful", technique(&[], &["persistence"])),
            ("pure_evasion", technique(&["defense_evasion"], &["defense_evasion"])),
        ]
        .into_iter()
        .map(|(id, t)| (id.to_string(), t))
        .collect()
    }

    #[test]
    fn stripped_requires_and_empty_provides_is_nop() {
        let ignored = vec!["x".to_string()];
        assert!(nop_techniques(&catalog(), &ignored, false).contains("only_requires"));
        assert!(nop_techniques(&catalog(), &ignored, true).contains("only_requires"));
    }

    #[test]
    fn empty_provides_mode_ignores_requires() {
        let ignored = vec!["defense_evasion".to_string()];

        let strict = nop_techniques(&catalog(), &ignored, false);
        assert_eq!(
            strict.into_iter().collect::<Vec<_>>(),
            vec!["pure_evasion".to_string()]
        );

        let loose = nop_techniques(&catalog(), &ignored, true);
        assert_eq!(
            loose.into_iter().collect::<Vec<_>>(),
            vec![
                "evasion".to_string(),
                "only_requires".to_string(),
                "pure_evasion".to_string()
            ]
        );
    }

    #[test]
    fn remove_nops_keeps_order_and_sorts_removed() {
        let nops = BTreeSet::from(["b".to_string(), "a".to_string()]);
        let bundle: Vec<String> = ["c", "b", "d", "a"].iter().map(|s| s.to_string()).collect();
        let (kept, removed) = remove_nops(&bundle, &nops);
        assert_eq!(kept, vec!["c".to_string(), "d".to_string()]);
        assert_eq!(removed, vec!["a".to_string(), "b".to_string()]);
    }
}
