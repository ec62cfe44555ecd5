//! Technique bundles: the repertoire of techniques available to an actor.

use crate::error::{GraphError, Result};
use crate::types::{Catalog, ExpansionMap};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::Path;

/// Bundle document with a primary list and an auxiliary list of techniques
/// inherited from extended agents (tools).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BundleDocument {
    #[serde(alias = "techniques")]
    pub agents: Vec<String>,

    #[serde(default, alias = "tool_techniques")]
    pub extended_agents: Vec<String>,
}

impl BundleDocument {
    pub fn parse(text: &str, path: &Path) -> Result<Self> {
        serde_json::from_str(text).map_err(|err| GraphError::Parse {
            path: path.to_path_buf(),
            message: err.to_string(),
        })
    }

    pub fn read(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| GraphError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text, path)
    }

    /// Deduplicated technique IDs, optionally including extended agents.
    pub fn resolve(&self, include_extended: bool) -> Vec<String> {
        let mut ids: BTreeSet<&String> = self.agents.iter().collect();
        if include_extended {
            ids.extend(self.extended_agents.iter());
        }
        ids.into_iter().cloned().collect()
    }
}

/// Read a bundle file and resolve it to technique IDs.
pub fn read_bundle(path: &Path, include_extended: bool) -> Result<Vec<String>> {
    Ok(BundleDocument::read(path)?.resolve(include_extended))
}

/// Drop bundle entries the catalog does not know.
pub fn remove_missing(catalog: &Catalog, bundle: &[String]) -> Vec<String> {
    bundle
        .iter()
        .filter(|id| {
            let known = catalog.contains(id);
            if !known {
                log::debug!("Removing {id} from bundle: not in technique catalog");
            }
            known
        })
        .cloned()
        .collect()
}

/// Append the conditional variants of every bundle entry, skipping IDs already listed.
pub fn expand_conditionals(expansion_map: &ExpansionMap, bundle: &[String]) -> Vec<String> {
    let mut seen: BTreeSet<&str> = bundle.iter().map(String::as_str).collect();
    let mut expanded = bundle.to_vec();
    for id in bundle {
        for variant in expansion_map.get(id).into_iter().flatten() {
            if seen.insert(variant.as_str()) {
                expanded.push(variant.clone());
            }
        }
    }
    expanded
}

/// Remove unknown entries, then add conditional variants.
pub fn preprocess(
    catalog: &Catalog,
    expansion_map: &ExpansionMap,
    bundle: &[String],
) -> Vec<String> {
    let known = remove_missing(catalog, bundle);
    expand_conditionals(expansion_map, &known)
}

/// Result of applying explicit include/exclude requests to a bundle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BundleAdjustment {
    pub bundle: Vec<String>,
    /// Excluded IDs that were not in the bundle, sorted
    pub not_present: Vec<String>,
}

/// Add `include` (skipping IDs already present) and remove every `exclude`.
pub fn adjust_bundle(
    bundle: &[String],
    include: &[String],
    exclude: &[String],
) -> BundleAdjustment {
    let mut adjusted = bundle.to_vec();
    for id in include {
        if !adjusted.contains(id) {
            adjusted.push(id.clone());
        }
    }

    let mut not_present = BTreeSet::new();
    for id in exclude {
        let before = adjusted.len();
        adjusted.retain(|existing| existing != id);
        if adjusted.len() == before {
            not_present.insert(id.clone());
        }
    }

    BundleAdjustment {
        bundle: adjusted,
        not_present: not_present.into_iter().collect(),
    }
}
