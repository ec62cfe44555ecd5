//! Technique catalog construction.
//!
//! Building runs in phases over a raw technique document:
//!
//! 1. Structural check: every record needs `name`, `requires`, `provides` and
//!    `conditional_provides`. Defects are collected, not fatal.
//! 2. Child flattening: each child becomes a top-level record derived from a
//!    copy of its parent (single level, no recursion).
//! 3. Vocabulary check against the promise descriptions.
//! 4. Conditional synthesis: one variant per conditional trigger.
//! 5. Vocabulary check against promise descriptions and system conditions.

use crate::error::{GraphError, MissingField, Result};
use crate::types::{Catalog, ExpansionMap, RawTechnique, Technique, TechniqueDocument};
use crate::vocabulary::Vocabulary;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const REQUIRED_FIELDS: [&str; 4] = ["name", "requires", "provides", "conditional_provides"];

/// Input files needed to build a catalog.
#[derive(Debug, Clone)]
pub struct DataFiles {
    pub agent_promises: PathBuf,
    pub promise_descriptions: PathBuf,
    pub conditions: PathBuf,
}

/// Output of a catalog build.
#[derive(Debug, Clone)]
pub struct CatalogBuild {
    pub catalog: Catalog,
    pub expansion_map: ExpansionMap,
    /// Structural defects found in the raw document
    pub missing: Vec<MissingField>,
}

impl CatalogBuild {
    pub fn is_valid(&self) -> bool {
        self.missing.is_empty()
    }

    /// Catalog and expansion map, or the structural defects if there are any.
    pub fn into_trusted(self) -> Result<(Catalog, ExpansionMap)> {
        if self.missing.is_empty() {
            Ok((self.catalog, self.expansion_map))
        } else {
            Err(GraphError::MissingFields(self.missing))
        }
    }
}

/// Parse a technique document from JSON text.
pub fn parse_document(text: &str, path: &Path) -> Result<TechniqueDocument> {
    serde_json::from_str(text).map_err(|err| GraphError::Parse {
        path: path.to_path_buf(),
        message: err.to_string(),
    })
}

pub fn read_document(path: &Path) -> Result<TechniqueDocument> {
    let text = std::fs::read_to_string(path).map_err(|source| GraphError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_document(&text, path)
}

/// Records missing a required field, in ID order.
pub fn check_techniques(document: &TechniqueDocument) -> Vec<MissingField> {
    let mut missing = Vec::new();
    for (id, raw) in document {
        let present = [
            raw.name.is_some(),
            raw.requires.is_some(),
            raw.provides.is_some(),
            raw.conditional_provides.is_some(),
        ];
        for (field, present) in REQUIRED_FIELDS.into_iter().zip(present) {
            if !present {
                log::warn!("{id} missing key {field}");
                missing.push(MissingField {
                    technique: id.clone(),
                    field,
                });
            }
        }
    }
    missing
}

/// One flattened record per child, keyed by the child's ID.
pub fn flatten_children(document: &TechniqueDocument) -> BTreeMap<String, RawTechnique> {
    let mut flattened = BTreeMap::new();
    for parent in document.values() {
        for (child_id, child) in parent.children.iter().flatten() {
            flattened.insert(child_id.clone(), parent.overlay(child));
        }
    }
    flattened
}

/// Base records plus flattened children, without conditional variants.
pub fn flatten_document(document: &TechniqueDocument) -> Catalog {
    let mut records = document.clone();
    records.extend(flatten_children(document));
    records
        .iter()
        .map(|(id, raw)| (id.clone(), Technique::from_raw(raw)))
        .collect()
}

/// Variants for every record with conditional provides, plus the expansion map.
///
/// Variant IDs are `"<id>_<trigger>"`. Variants are derived only from the
/// records passed in and are never expanded again.
pub fn synthesize_conditionals(catalog: &Catalog) -> (BTreeMap<String, Technique>, ExpansionMap) {
    let mut variants = BTreeMap::new();
    let mut expansion_map = ExpansionMap::new();

    for (id, technique) in catalog.iter() {
        if technique.conditional_provides.is_empty() {
            continue;
        }
        let mut ids = Vec::with_capacity(technique.conditional_provides.len());
        for trigger in technique.conditional_provides.keys() {
            if let Some(variant) = technique.conditional_variant(trigger) {
                let variant_id = format!("{id}_{trigger}");
                variants.insert(variant_id.clone(), variant);
                ids.push(variant_id);
            }
        }
        expansion_map.insert(id.clone(), ids);
    }

    (variants, expansion_map)
}

/// Build a catalog from an in-memory document and vocabularies.
///
/// Vocabulary violations are returned as [`GraphError::UnknownPromises`];
/// structural defects are reported in [`CatalogBuild::missing`].
pub fn build_catalog(
    document: &TechniqueDocument,
    promise_descriptions: &Vocabulary,
    conditions: &Vocabulary,
) -> Result<CatalogBuild> {
    let missing = check_techniques(document);

    let mut catalog = flatten_document(document);

    // System conditions may only show up through conditional triggers, so the
    // first check runs before any variant exists.
    promise_descriptions.validate(&catalog.used_promises())?;

    let (variants, expansion_map) = synthesize_conditionals(&catalog);
    let variant_count = variants.len();
    for replaced in catalog.merge(variants) {
        log::warn!("Conditional variant {replaced} replaced an existing technique");
    }

    let accepted = promise_descriptions.union(conditions);
    accepted.validate(&catalog.used_promises())?;

    log::info!(
        "Built technique catalog: {} base, {} total, {} conditional variants",
        document.len(),
        catalog.len(),
        variant_count
    );

    Ok(CatalogBuild {
        catalog,
        expansion_map,
        missing,
    })
}

/// Read the technique document and vocabularies from disk and build a catalog.
pub fn read_catalog(files: &DataFiles) -> Result<CatalogBuild> {
    let document = read_document(&files.agent_promises)?;
    let promise_descriptions = Vocabulary::read(&files.promise_descriptions)?;
    let conditions = Vocabulary::read(&files.conditions)?;
    build_catalog(&document, &promise_descriptions, &conditions)
}
