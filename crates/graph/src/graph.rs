use crate::error::{GraphError, Result};
use crate::types::Catalog;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Dependency view over a catalog.
///
/// Nodes are technique IDs. An edge `A -> B` carries a promise that `A`
/// provides and `B` requires.
pub struct DependencyGraph {
    graph: DiGraph<String, String>,

    /// Technique ID -> NodeIndex mapping for fast lookup
    index: HashMap<String, NodeIndex>,
}

impl DependencyGraph {
    pub fn from_catalog(catalog: &Catalog) -> Self {
        let mut graph = DiGraph::new();
        let mut index = HashMap::new();

        let mut providers: BTreeMap<&str, Vec<NodeIndex>> = BTreeMap::new();
        for (id, technique) in catalog.iter() {
            let idx = graph.add_node(id.clone());
            index.insert(id.clone(), idx);
            for promise in &technique.provides {
                providers.entry(promise.as_str()).or_default().push(idx);
            }
        }

        for (id, technique) in catalog.iter() {
            let to = index[id];
            for promise in &technique.requires {
                for &from in providers.get(promise.as_str()).into_iter().flatten() {
                    if from != to {
                        graph.add_edge(from, to, promise.clone());
                    }
                }
            }
        }

        log::debug!(
            "Built dependency graph: {} nodes, {} edges",
            graph.node_count(),
            graph.edge_count()
        );

        Self { graph, index }
    }

    /// Techniques that `id` provides a requirement for, with the promises involved.
    pub fn enables(&self, id: &str) -> Result<BTreeMap<String, BTreeSet<String>>> {
        self.neighbors(id, Direction::Outgoing)
    }

    /// Techniques providing a requirement of `id`, with the promises involved.
    pub fn enabled_by(&self, id: &str) -> Result<BTreeMap<String, BTreeSet<String>>> {
        self.neighbors(id, Direction::Incoming)
    }

    fn neighbors(
        &self,
        id: &str,
        direction: Direction,
    ) -> Result<BTreeMap<String, BTreeSet<String>>> {
        let node = self
            .index
            .get(id)
            .copied()
            .ok_or_else(|| GraphError::UnknownTechnique(id.to_string()))?;

        let mut related: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for edge in self.graph.edges_directed(node, direction) {
            let other = match direction {
                Direction::Outgoing => edge.target(),
                Direction::Incoming => edge.source(),
            };
            related
                .entry(self.graph[other].clone())
                .or_default()
                .insert(edge.weight().clone());
        }
        Ok(related)
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}
