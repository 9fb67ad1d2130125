//! JSON persistence for session graphs.
//!
//! The on-disk document is the boundary artifact produced by the graph
//! builder running on the robot and consumed here:
//!
//! ```json
//! {
//!   "nodes": {
//!     "object_nodes": { "<object-id>": { "name": "...", ... } },
//!     "event_nodes":  { "<event-id>":  { "description": "...", ... } }
//!   },
//!   "edges": {
//!     "event_object_edges": { "<edge-id>": { "from_event": "...", ... } }
//!   }
//! }
//! ```
//!
//! Loading replays every record through [`GraphBuilder`], so a tampered or
//! inconsistent document fails with the same [`GraphError`] a live mutation
//! would.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use scenic_types::{EdgeId, EventId, ObjectId};

use crate::edge::EventObjectEdge;
use crate::node::{EventNode, ObjectNode};
use crate::store::{GraphBuilder, GraphError, SceneGraph};

// ─────────────────────────────────────────────────────────────────────────────
// Document records
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ObjectRecord {
    name: String,
    caption: String,
    location: String,
    first_seen: DateTime<Utc>,
    last_seen: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct EventRecord {
    description: String,
    start: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    end: Option<DateTime<Utc>>,
    location: String,
    #[serde(default)]
    involved_objects: Vec<ObjectId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct EdgeRecord {
    from_event: EventId,
    to_object: ObjectId,
    object_role: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct NodeSection {
    #[serde(default)]
    object_nodes: BTreeMap<ObjectId, ObjectRecord>,
    #[serde(default)]
    event_nodes: BTreeMap<EventId, EventRecord>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct EdgeSection {
    #[serde(default)]
    event_object_edges: BTreeMap<EdgeId, EdgeRecord>,
}

/// The serialized form of one session graph.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphDocument {
    nodes: NodeSection,
    edges: EdgeSection,
}

// ─────────────────────────────────────────────────────────────────────────────
// Conversions
// ─────────────────────────────────────────────────────────────────────────────

impl GraphDocument {
    /// Snapshot a frozen graph into its document form.
    pub fn from_graph(graph: &SceneGraph) -> Self {
        let mut doc = GraphDocument::default();
        for node in graph.iter_objects() {
            doc.nodes.object_nodes.insert(
                node.id,
                ObjectRecord {
                    name: node.name.clone(),
                    caption: node.caption.clone(),
                    location: node.location.clone(),
                    first_seen: node.first_seen,
                    last_seen: node.last_seen,
                },
            );
        }
        for node in graph.iter_events() {
            doc.nodes.event_nodes.insert(
                node.id,
                EventRecord {
                    description: node.description.clone(),
                    start: node.start,
                    end: node.end,
                    location: node.location.clone(),
                    involved_objects: node.involved_objects.clone(),
                },
            );
        }
        for edge in graph.iter_edges() {
            doc.edges.event_object_edges.insert(
                edge.id,
                EdgeRecord {
                    from_event: edge.from_event,
                    to_object: edge.to_object,
                    object_role: edge.object_role.clone(),
                },
            );
        }
        doc
    }

    /// Rebuild and freeze a graph, re-validating every invariant.
    ///
    /// Objects are replayed first, then events, then edges, so referential
    /// integrity checks see their dependencies.
    pub fn into_graph(self) -> Result<SceneGraph, GraphError> {
        let mut builder = GraphBuilder::new();
        for (id, record) in self.nodes.object_nodes {
            builder.add_object(ObjectNode {
                id,
                name: record.name,
                caption: record.caption,
                location: record.location,
                first_seen: record.first_seen,
                last_seen: record.last_seen,
            })?;
        }
        for (id, record) in self.nodes.event_nodes {
            builder.add_event(EventNode {
                id,
                description: record.description,
                start: record.start,
                end: record.end,
                location: record.location,
                involved_objects: record.involved_objects,
            })?;
        }
        for (id, record) in self.edges.event_object_edges {
            builder.add_edge(EventObjectEdge {
                id,
                from_event: record.from_event,
                to_object: record.to_object,
                object_role: record.object_role,
            })?;
        }
        Ok(builder.freeze())
    }

    /// Read a document from disk and rebuild the graph.
    pub fn load_json(path: impl AsRef<Path>) -> Result<SceneGraph, GraphError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let doc: GraphDocument = serde_json::from_str(&raw)?;
        let graph = doc.into_graph()?;
        info!(
            path = %path.as_ref().display(),
            objects = graph.object_count(),
            events = graph.event_count(),
            edges = graph.edge_count(),
            "graph loaded"
        );
        Ok(graph)
    }

    /// Serialize a frozen graph to pretty-printed JSON on disk.
    pub fn save_json(graph: &SceneGraph, path: impl AsRef<Path>) -> Result<(), GraphError> {
        let doc = Self::from_graph(graph);
        let raw = serde_json::to_string_pretty(&doc)?;
        std::fs::write(path.as_ref(), raw)?;
        Ok(())
    }
}
