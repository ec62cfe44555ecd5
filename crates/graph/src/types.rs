use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Prefix marking a promise as a terminal objective.
pub const OBJECTIVE_PREFIX: &str = "objective_";

/// Raw technique document: technique ID -> partial record.
pub type TechniqueDocument = BTreeMap<String, RawTechnique>;

/// Parent technique ID -> IDs of its synthesized conditional variants.
pub type ExpansionMap = BTreeMap<String, Vec<String>>;

/// Technique record as written in a technique document.
///
/// Every field is optional so that structural defects can be reported
/// instead of failing deserialization. Children use the same shape and
/// override their parent's fields when flattened.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTechnique {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provides: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditional_provides: Option<BTreeMap<String, Vec<String>>>,

    #[serde(
        default,
        alias = "subtechniques",
        skip_serializing_if = "Option::is_none"
    )]
    pub children: Option<BTreeMap<String, RawTechnique>>,

    #[serde(default, alias = "tactic", skip_serializing_if = "Option::is_none")]
    pub agent_class: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevant_for: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mitigations: Option<Vec<String>>,
}

impl RawTechnique {
    /// Copy of `self` without children, overlaid by the fields `child` sets.
    ///
    /// The resulting name is `"<parent name>:<child name>"`; a child without a
    /// name of its own repeats the parent's.
    pub fn overlay(&self, child: &RawTechnique) -> RawTechnique {
        let parent_name = self.name.clone().unwrap_or_default();
        let child_name = child.name.clone().unwrap_or_else(|| parent_name.clone());

        RawTechnique {
            name: Some(format!("{parent_name}:{child_name}")),
            requires: child.requires.clone().or_else(|| self.requires.clone()),
            provides: child.provides.clone().or_else(|| self.provides.clone()),
            conditional_provides: child
                .conditional_provides
                .clone()
                .or_else(|| self.conditional_provides.clone()),
            children: None,
            agent_class: child.agent_class.clone().or_else(|| self.agent_class.clone()),
            relevant_for: child
                .relevant_for
                .clone()
                .or_else(|| self.relevant_for.clone()),
            mitigations: child.mitigations.clone().or_else(|| self.mitigations.clone()),
        }
    }
}

/// Technique record with every collection present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Technique {
    pub name: String,
    pub requires: BTreeSet<String>,
    pub provides: BTreeSet<String>,
    pub conditional_provides: BTreeMap<String, BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub children: BTreeMap<String, RawTechnique>,
    #[serde(default)]
    pub agent_class: Vec<String>,
    #[serde(default)]
    pub relevant_for: Vec<String>,
    #[serde(default)]
    pub mitigations: Vec<String>,
}

impl Technique {
    /// Convert a raw record, defaulting absent fields to empty values.
    pub fn from_raw(raw: &RawTechnique) -> Self {
        Self {
            name: raw.name.clone().unwrap_or_default(),
            requires: raw.requires.iter().flatten().cloned().collect(),
            provides: raw.provides.iter().flatten().cloned().collect(),
            conditional_provides: raw
                .conditional_provides
                .iter()
                .flatten()
                .map(|(trigger, provides)| (trigger.clone(), provides.iter().cloned().collect()))
                .collect(),
            children: raw.children.clone().unwrap_or_default(),
            agent_class: raw.agent_class.clone().unwrap_or_default(),
            relevant_for: raw.relevant_for.clone().unwrap_or_default(),
            mitigations: raw.mitigations.clone().unwrap_or_default(),
        }
    }

    /// Variant that also requires `trigger` and grants its conditional provides.
    ///
    /// Returns `None` when `trigger` is not one of this technique's triggers.
    pub fn conditional_variant(&self, trigger: &str) -> Option<Technique> {
        let extra = self.conditional_provides.get(trigger)?;

        let mut requires = self.requires.clone();
        requires.insert(trigger.to_string());

        let mut provides = self.provides.clone();
        provides.extend(extra.iter().cloned());

        Some(Technique {
            name: format!("{} [{}]", self.name, trigger),
            requires,
            provides,
            conditional_provides: BTreeMap::new(),
            children: self.children.clone(),
            agent_class: self.agent_class.clone(),
            relevant_for: self.relevant_for.clone(),
            mitigations: self.mitigations.clone(),
        })
    }

    /// Whether every requirement is in `provided`.
    pub fn is_ready(&self, provided: &BTreeSet<String>) -> bool {
        self.requires.iter().all(|req| provided.contains(req))
    }
}

/// Validated technique catalog keyed by technique ID.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Catalog {
    techniques: BTreeMap<String, Technique>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<String>, technique: Technique) -> Option<Technique> {
        self.techniques.insert(id.into(), technique)
    }

    /// Merge `other` into this catalog, returning the IDs that were replaced.
    pub fn merge(&mut self, other: BTreeMap<String, Technique>) -> Vec<String> {
        let mut replaced = Vec::new();
        for (id, technique) in other {
            if self.techniques.insert(id.clone(), technique).is_some() {
                replaced.push(id);
            }
        }
        replaced
    }

    pub fn get(&self, id: &str) -> Option<&Technique> {
        self.techniques.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.techniques.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Technique)> {
        self.techniques.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = &String> {
        self.techniques.keys()
    }

    pub fn len(&self) -> usize {
        self.techniques.len()
    }

    pub fn is_empty(&self) -> bool {
        self.techniques.is_empty()
    }

    /// Every promise used in a `requires` or `provides` list.
    pub fn used_promises(&self) -> BTreeSet<String> {
        self.techniques
            .values()
            .flat_map(|t| t.requires.iter().chain(t.provides.iter()))
            .cloned()
            .collect()
    }
}

impl FromIterator<(String, Technique)> for Catalog {
    fn from_iter<I: IntoIterator<Item = (String, Technique)>>(iter: I) -> Self {
        Self {
            techniques: iter.into_iter().collect(),
        }
    }
}

/// One round of the simulation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    /// Techniques executed this stage
    pub techniques: BTreeSet<String>,

    /// Promises first granted this stage
    pub new_provides: BTreeSet<String>,

    /// Promises provided before this stage started
    pub last_stage_sum_provides: BTreeSet<String>,
}

/// Result of a simulation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Simulation {
    pub stages: Vec<Stage>,
    pub objectives: BTreeSet<String>,
    pub provided: BTreeSet<String>,
    pub backburner: Vec<String>,
    pub debug: Vec<String>,
}

impl Simulation {
    /// Whether the run ended with `end_condition` provided.
    pub fn reached(&self, end_condition: &str) -> bool {
        self.provided.contains(end_condition)
    }
}
