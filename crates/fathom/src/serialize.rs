//! Graph manifest serialization.
//!
//! A graph serializes to the shape of its structure only: node identities
//! and edges. Cached values, store contents and precision windows are not
//! part of the manifest; restoring a graph resets them to the defaults of
//! whatever nodes the caller's factory produces.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{element::Element, error::ErrorState, graph::Graph, node::Node};

/// A serialized node identity.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct NodeRecord {
    /// The node's name.
    pub name: String,
}

/// A serialized directed edge.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct EdgeRecord {
    /// Name of the upstream endpoint.
    pub from: String,
    /// Name of the downstream endpoint.
    pub to: String,
}

/// The serializable shape of a graph: its nodes and edges, sorted by name
/// for deterministic output.
#[derive(
    Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize,
)]
pub struct GraphManifest {
    /// Member node identities.
    pub nodes: Vec<NodeRecord>,
    /// The edge relation.
    pub edges: Vec<EdgeRecord>,
}

impl<T: Element> Graph<T> {
    /// Captures the graph's structure as a manifest.
    #[must_use]
    pub fn manifest(&self) -> GraphManifest {
        let members = self.get_nodes();

        let mut nodes: Vec<_> = members
            .iter()
            .map(|node| NodeRecord { name: node.name().to_owned() })
            .collect();
        nodes.sort();

        let mut edges: Vec<_> = members
            .iter()
            .flat_map(|node| self.get_outgoing_edges(node))
            .map(|edge| EdgeRecord {
                from: edge.from().name().to_owned(),
                to: edge.to().name().to_owned(),
            })
            .collect();
        edges.sort();

        GraphManifest { nodes, edges }
    }

    /// Serializes the graph's structure to JSON.
    ///
    /// # Errors
    ///
    /// `Validation` if JSON encoding fails.
    pub fn to_json(&self) -> Result<String, ErrorState> {
        serde_json::to_string_pretty(&self.manifest()).map_err(|error| {
            ErrorState::validation(format!(
                "failed to serialize graph manifest: {error}"
            ))
        })
    }

    /// Clears the graph and rebuilds it from a manifest.
    ///
    /// Nodes are instantiated through `factory`; names the factory cannot
    /// resolve are skipped, and edges with an unresolved endpoint (or
    /// that a rebuilt topology rejects) are dropped silently.
    pub fn restore(
        &self,
        manifest: &GraphManifest,
        factory: &mut dyn FnMut(&str) -> Option<Arc<Node<T>>>,
    ) {
        self.clear();

        for record in &manifest.nodes {
            if let Some(node) = factory(&record.name) {
                self.add_node(node);
            }
        }

        for record in &manifest.edges {
            let (Some(from), Some(to)) =
                (self.node(&record.from), self.node(&record.to))
            else {
                continue;
            };

            let _ = self.connect(&from, &to);
        }
    }

    /// Clears the graph and rebuilds it from a JSON manifest.
    ///
    /// # Errors
    ///
    /// `Validation` if the JSON does not parse as a manifest; the graph is
    /// left untouched in that case.
    pub fn from_json(
        &self,
        json: &str,
        factory: &mut dyn FnMut(&str) -> Option<Arc<Node<T>>>,
    ) -> Result<(), ErrorState> {
        let manifest: GraphManifest =
            serde_json::from_str(json).map_err(|error| {
                ErrorState::validation(format!(
                    "failed to parse graph manifest: {error}"
                ))
            })?;

        self.restore(&manifest, factory);
        Ok(())
    }
}
