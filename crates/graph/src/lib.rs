//! # Provreq Graph
//!
//! Technique catalogs and staged reachability simulation.
//!
//! ## Features
//!
//! - **Catalog construction** - flatten children, synthesize conditional variants
//! - **Vocabulary validation** - reject undeclared promises with suggestions
//! - **Bundle preparation** - resolve an actor's techniques against the catalog
//! - **Simulation** - fixed-point propagation of promises, stage by stage
//!
//! ## Architecture
//!
//! ```text
//! technique document ──> Catalog Builder ──> Catalog + ExpansionMap
//!     │                     ├─ structural check
//!     │                     ├─ child flattening
//!     │                     ├─ vocabulary check (promises)
//!     │                     ├─ conditional synthesis
//!     │                     └─ vocabulary check (promises ∪ conditions)
//!     │
//! bundle document ──> Bundle Loader ──> Preprocessor ──> technique IDs
//!     │
//!     └──> Simulation Engine (seeds + system conditions)
//!            └─ stages, objectives, provided, backburner
//! ```

mod error;
mod types;

pub mod audit;
pub mod bundle;
pub mod catalog;
pub mod distance;
pub mod graph;
pub mod nop;
pub mod search;
pub mod simulate;
pub mod vocabulary;

pub use audit::{check_unreachable, Reachability, UnreachableReport};
pub use bundle::{adjust_bundle, preprocess, read_bundle, BundleAdjustment, BundleDocument};
pub use catalog::{build_catalog, read_catalog, CatalogBuild, DataFiles};
pub use error::{GraphError, MissingField, PromiseSuggestion, Result};
pub use graph::DependencyGraph;
pub use nop::{nop_techniques, remove_nops};
pub use simulate::{simulate, stage_rows, StageRow};
pub use types::{
    Catalog, ExpansionMap, RawTechnique, Simulation, Stage, Technique, TechniqueDocument,
    OBJECTIVE_PREFIX,
};
pub use vocabulary::Vocabulary;
