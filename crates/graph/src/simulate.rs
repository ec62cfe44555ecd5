//! Staged reachability simulation.
//!
//! Starting from the seeds and system conditions, every technique whose
//! requirements are met executes in the current stage. Their provides are
//! added to the provided set and the remaining techniques are checked again.
//! The run ends when a stage would be empty; whatever is left stays on the
//! backburner.

use crate::error::{GraphError, Result};
use crate::types::{Catalog, Simulation, Stage, Technique, OBJECTIVE_PREFIX};
use serde::Serialize;
use std::collections::BTreeSet;

pub const NOT_BOOTSTRAPPED: &str = "Pipeline not bootstrapped.";

/// Run the simulation for `bundle` over `catalog`.
///
/// Fails only if the bundle names a technique the catalog does not contain.
pub fn simulate(
    seeds: &[String],
    bundle: &[String],
    catalog: &Catalog,
    system_conditions: &[String],
) -> Result<Simulation> {
    let mut sim = Simulation {
        provided: seeds.iter().chain(system_conditions).cloned().collect(),
        ..Default::default()
    };

    let (mut ready, mut potential) = fill_pipeline(catalog, bundle, &sim.provided)?;
    if ready.is_empty() {
        sim.debug.push(NOT_BOOTSTRAPPED.to_string());
    }

    while !ready.is_empty() {
        let mut stage_techniques = BTreeSet::new();
        let mut stage_provides = BTreeSet::new();
        for id in ready {
            stage_provides.extend(lookup(catalog, &id)?.provides.iter().cloned());
            stage_techniques.insert(id);
        }

        sim.stages.push(Stage {
            techniques: stage_techniques,
            new_provides: stage_provides.difference(&sim.provided).cloned().collect(),
            last_stage_sum_provides: sim.provided.clone(),
        });
        sim.provided.extend(stage_provides);

        (ready, potential) = fill_pipeline(catalog, &potential, &sim.provided)?;
    }

    sim.backburner = potential;
    sim.objectives = sim
        .provided
        .iter()
        .filter(|promise| promise.starts_with(OBJECTIVE_PREFIX))
        .cloned()
        .collect();

    log::debug!(
        "Simulation finished: {} stages, {} provided, {} on backburner",
        sim.stages.len(),
        sim.provided.len(),
        sim.backburner.len()
    );

    Ok(sim)
}

/// Split `potential` into techniques ready to run and the rest, keeping order.
pub fn fill_pipeline(
    catalog: &Catalog,
    potential: &[String],
    provided: &BTreeSet<String>,
) -> Result<(Vec<String>, Vec<String>)> {
    let mut ready = Vec::new();
    let mut waiting = Vec::new();
    for id in potential {
        if lookup(catalog, id)?.is_ready(provided) {
            ready.push(id.clone());
        } else {
            waiting.push(id.clone());
        }
    }
    Ok((ready, waiting))
}

fn lookup<'a>(catalog: &'a Catalog, id: &str) -> Result<&'a Technique> {
    catalog
        .get(id)
        .ok_or_else(|| GraphError::UnknownTechnique(id.to_string()))
}

/// Display row for one stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageRow {
    pub stage: usize,
    pub techniques: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_promises: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_classes: Option<Vec<String>>,
}

/// Technique name, optionally with its classes, marked `[*]` when it adds nothing new.
pub fn describe_technique(
    technique: &Technique,
    last_stage_sum_provides: &BTreeSet<String>,
    show_classes: bool,
) -> String {
    let mut description = technique.name.clone();
    if show_classes && !technique.agent_class.is_empty() {
        description.push_str(&format!(" ({})", technique.agent_class.join(",")));
    }
    if technique.provides.is_subset(last_stage_sum_provides) {
        description.push_str(" [*]");
    }
    description
}

/// One row per stage; IDs starting with `_` are shadow techniques and hidden.
pub fn stage_rows(
    sim: &Simulation,
    catalog: &Catalog,
    show_promises: bool,
    show_classes: bool,
) -> Result<Vec<StageRow>> {
    let mut rows = Vec::with_capacity(sim.stages.len());
    for (idx, stage) in sim.stages.iter().enumerate() {
        let mut descriptions = BTreeSet::new();
        let mut classes = BTreeSet::new();

        for id in stage.techniques.iter().filter(|id| !id.starts_with('_')) {
            let technique = lookup(catalog, id)?;
            classes.extend(technique.agent_class.iter().cloned());
            descriptions.insert(describe_technique(
                technique,
                &stage.last_stage_sum_provides,
                show_classes,
            ));
        }

        rows.push(StageRow {
            stage: idx + 1,
            techniques: descriptions.into_iter().collect(),
            new_promises: show_promises.then(|| stage.new_provides.iter().cloned().collect()),
            agent_classes: show_classes.then(|| classes.into_iter().collect()),
        });
    }
    Ok(rows)
}
