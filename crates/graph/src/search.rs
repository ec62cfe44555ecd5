//! Catalog queries: promise usage counts, technique search and promise statistics.

use crate::types::{Catalog, Technique};
use crate::vocabulary::Vocabulary;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// How often a promise is provided and required across the catalog.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct PromiseUsage {
    pub promise: String,
    pub provides: usize,
    pub requires: usize,
}

/// Promises provided at most `provide_limit` times or required at most
/// `require_limit` times. Vocabulary entries nobody uses count as zero.
pub fn promise_usage(
    catalog: &Catalog,
    vocabulary: &Vocabulary,
    provide_limit: usize,
    require_limit: usize,
) -> Vec<PromiseUsage> {
    let mut counts: BTreeMap<String, (usize, usize)> = vocabulary
        .iter()
        .map(|promise| (promise.to_string(), (0, 0)))
        .collect();

    for (_, technique) in catalog.iter() {
        for promise in &technique.provides {
            counts.entry(promise.clone()).or_default().0 += 1;
        }
        for promise in &technique.requires {
            counts.entry(promise.clone()).or_default().1 += 1;
        }
    }

    counts
        .into_iter()
        .filter(|(_, (provides, requires))| {
            *provides <= provide_limit || *requires <= require_limit
        })
        .map(|(promise, (provides, requires))| PromiseUsage {
            promise,
            provides,
            requires,
        })
        .collect()
}

/// Filters for [`search_techniques`]. Empty filters match everything.
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    pub provides: Vec<String>,
    pub not_provides: Vec<String>,
    pub requires: Vec<String>,
    pub not_requires: Vec<String>,
    /// Case-insensitive substrings of the technique name; any may match
    pub name: Vec<String>,
}

impl SearchQuery {
    pub fn is_empty(&self) -> bool {
        self.provides.is_empty()
            && self.not_provides.is_empty()
            && self.requires.is_empty()
            && self.not_requires.is_empty()
            && self.name.is_empty()
    }

    fn matches(&self, technique: &Technique) -> bool {
        if !self.provides.is_empty() && !contains_all(&self.provides, &technique.provides) {
            return false;
        }
        if !self.not_provides.is_empty() && contains_all(&self.not_provides, &technique.provides) {
            return false;
        }
        if !self.requires.is_empty() && !contains_all(&self.requires, &technique.requires) {
            return false;
        }
        if !self.not_requires.is_empty() && contains_all(&self.not_requires, &technique.requires) {
            return false;
        }
        if !self.name.is_empty() {
            let name = technique.name.to_lowercase();
            if !self.name.iter().any(|term| name.contains(&term.to_lowercase())) {
                return false;
            }
        }
        true
    }
}

/// Whether every term is a substring of some promise in `bucket`.
fn contains_all(terms: &[String], bucket: &BTreeSet<String>) -> bool {
    terms
        .iter()
        .all(|term| bucket.iter().any(|item| item.contains(term.as_str())))
}

/// Techniques matching `query`, in ID order.
pub fn search_techniques<'a>(
    catalog: &'a Catalog,
    query: &SearchQuery,
) -> Vec<(&'a String, &'a Technique)> {
    catalog
        .iter()
        .filter(|(_, technique)| query.matches(technique))
        .collect()
}

/// Where a single promise is used.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PromiseStats {
    /// (ID, name) of techniques providing the promise
    pub provided_by: Vec<(String, String)>,
    /// (ID, name) of techniques requiring the promise
    pub required_by: Vec<(String, String)>,
    /// class -> (provide count, require count)
    pub classes: BTreeMap<String, (usize, usize)>,
    /// Techniques granting the promise through a conditional provide
    pub conditionally_provided_by: Vec<(String, String)>,
}

pub fn promise_stats(catalog: &Catalog, promise: &str) -> PromiseStats {
    let mut stats = PromiseStats::default();

    for (id, technique) in catalog.iter() {
        let entry = || (id.clone(), technique.name.clone());

        if technique
            .conditional_provides
            .values()
            .any(|grants| grants.contains(promise))
        {
            stats.conditionally_provided_by.push(entry());
        }
        if technique.provides.contains(promise) {
            stats.provided_by.push(entry());
            for class in &technique.agent_class {
                stats.classes.entry(class.clone()).or_default().0 += 1;
            }
        }
        if technique.requires.contains(promise) {
            stats.required_by.push(entry());
            for class in &technique.agent_class {
                stats.classes.entry(class.clone()).or_default().1 += 1;
            }
        }
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn catalog() -> Catalog {
        [
            (
                "T1059",
                Technique {
                    name: "Command and Scripting Interpreter".to_string(),
                    requires: set(&["code_executed"]),
                    provides: set(&["code_executed", "file_transfer"]),
                    agent_class: vec!["Execution".to_string()],
                    ..Default::default()
                },
            ),
            (
                "T1046",
                Technique {
                    name: "Network Service Discovery".to_string(),
                    requires: set(&["code_executed"]),
                    provides: set(&["info_network_services"]),
                    conditional_provides: BTreeMap::from([(
                        "moved_laterally".to_string(),
                        set(&["file_transfer"]),
                    )]),
                    agent_class: vec!["Discovery".to_string()],
                    ..Default::default()
                },
            ),
        ]
        .into_iter()
        .map(|(id, t)| (id.to_string(), t))
        .collect()
    }

    fn usage(promise: &str, provides: usize, requires: usize) -> PromiseUsage {
        PromiseUsage {
            promise: promise.to_string(),
            provides,
            requires,
        }
    }

    #[test]
    fn usage_includes_unused_vocabulary() {
        let vocabulary = Vocabulary::parse("code_executed\nfile_transfer\npersistence\n");
        let rows = promise_usage(&catalog(), &vocabulary, 0, 0);
        assert_eq!(
            rows,
            vec![
                usage("file_transfer", 1, 0),
                usage("info_network_services", 1, 0),
                usage("persistence", 0, 0),
            ]
        );
    }

    #[test]
    fn search_combines_filters() {
        let catalog = catalog();

        let query = SearchQuery {
            requires: vec!["code_exec".to_string()],
            not_provides: vec!["file_transfer".to_string()],
            ..Default::default()
        };
        let found: Vec<_> = search_techniques(&catalog, &query)
            .into_iter()
            .map(|(id, _)| id.as_str())
            .collect();
        assert_eq!(found, vec!["T1046"]);

        let by_name = SearchQuery {
            name: vec!["INTERPRETER".to_string()],
            ..Default::default()
        };
        assert_eq!(search_techniques(&catalog, &by_name).len(), 1);
        assert!(!by_name.is_empty());
        assert!(SearchQuery::default().is_empty());
    }

    #[test]
    fn stats_count_classes_and_conditionals() {
        let stats = promise_stats(&catalog(), "file_transfer");
        assert_eq!(stats.provided_by.len(), 1);
        assert!(stats.required_by.is_empty());
        assert_eq!(stats.classes.get("Execution"), Some(&(1, 0)));
        assert_eq!(
            stats.conditionally_provided_by,
            vec![("T1046".to_string(), "Network Service Discovery".to_string())]
        );
    }
}
