//! Self-contained query context assembled from selected nodes.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use scenic_types::{EdgeId, EventId, ObjectId};

use crate::edge::EventObjectEdge;
use crate::node::ObjectNode;
use crate::store::{GraphError, SceneGraph};

// ─────────────────────────────────────────────────────────────────────────────
// Visibility
// ─────────────────────────────────────────────────────────────────────────────

/// Which relational detail the assembled context carries.
///
/// Retrieval modes differ in whether the answering oracle may see explicit
/// edges, the events' `involved_objects` adjacency lists, both, or neither;
/// the assembler only needs these two switches, not the mode itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Visibility {
    /// Include event-object edge records.
    pub edges: bool,
    /// Include the `involved_objects` list on event records.
    pub involved_objects: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// Subgraph records
// ─────────────────────────────────────────────────────────────────────────────

/// An event record as it appears in an assembled context.  Unlike
/// [`crate::EventNode`] the adjacency list is optional, because edge-visible
/// modes carry adjacency on the edges instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubgraphEvent {
    pub id: EventId,
    pub description: String,
    pub start: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub involved_objects: Option<Vec<ObjectId>>,
}

/// The minimal self-contained context handed to the answering oracle.
///
/// Invariant: every edge present has both of its endpoints present; no
/// dangling reference ever reaches the answer stage.  Assembly is a pure
/// projection of the frozen graph, nothing is synthesized.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Subgraph {
    pub objects: BTreeMap<ObjectId, ObjectNode>,
    pub events: BTreeMap<EventId, SubgraphEvent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edges: Option<BTreeMap<EdgeId, EventObjectEdge>>,
}

impl Subgraph {
    /// Materialize the selected ids against the frozen graph.
    ///
    /// Edges are included only when `visibility.edges` is set, and then only
    /// those connecting a selected event to a selected object.
    ///
    /// # Errors
    ///
    /// `*NotFound` if a selected id is absent from the graph; selectors only
    /// emit ids taken from the graph, so this indicates a caller bug.
    pub fn assemble(
        graph: &SceneGraph,
        object_ids: &BTreeSet<ObjectId>,
        event_ids: &BTreeSet<EventId>,
        visibility: Visibility,
    ) -> Result<Self, GraphError> {
        let mut objects = BTreeMap::new();
        for id in object_ids {
            objects.insert(*id, graph.object(*id)?.clone());
        }

        let mut events = BTreeMap::new();
        for id in event_ids {
            let node = graph.event(*id)?;
            events.insert(
                *id,
                SubgraphEvent {
                    id: node.id,
                    description: node.description.clone(),
                    start: node.start,
                    end: node.end,
                    location: node.location.clone(),
                    involved_objects: visibility
                        .involved_objects
                        .then(|| node.involved_objects.clone()),
                },
            );
        }

        let edges = if visibility.edges {
            let mut kept = BTreeMap::new();
            for event_id in event_ids {
                for edge_id in graph.edges_for_event(*event_id) {
                    let edge = graph.edge(*edge_id)?;
                    if objects.contains_key(&edge.to_object) {
                        kept.insert(edge.id, edge.clone());
                    }
                }
            }
            Some(kept)
        } else {
            None
        };

        Ok(Self {
            objects,
            events,
            edges,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty() && self.events.is_empty()
    }

    pub fn contains_object(&self, id: ObjectId) -> bool {
        self.objects.contains_key(&id)
    }

    pub fn contains_event(&self, id: EventId) -> bool {
        self.events.contains_key(&id)
    }

    pub fn contains_edge(&self, id: EdgeId) -> bool {
        self.edges
            .as_ref()
            .is_some_and(|edges| edges.contains_key(&id))
    }

    /// The context as the JSON document embedded in oracle prompts.
    pub fn to_json_value(&self) -> serde_json::Value {
        serde_json::json!({
            "nodes": {
                "object_nodes": self.objects,
                "event_nodes": self.events,
            },
            "edges": self.edges.as_ref().map(|edges| serde_json::json!({
                "event_object_edges": edges,
            })),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::EventNode;
    use crate::store::GraphBuilder;
    use chrono::TimeZone;

    fn t(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).unwrap()
    }

    fn cleaning_scene() -> (SceneGraph, ObjectId, ObjectId, EventId, EdgeId) {
        let mut builder = GraphBuilder::new();
        let yellow = builder
            .add_object(ObjectNode::observed("yellow_bowl_0", "yellow bowl", "kitchen", t(9)))
            .unwrap();
        let white = builder
            .add_object(ObjectNode::observed("white_bowl_0", "white bowl", "kitchen", t(9)))
            .unwrap();
        let event = builder
            .add_event(EventNode::new(
                "person cleans the bowl",
                t(10),
                Some(t(10)),
                "kitchen",
                vec![yellow],
            ))
            .unwrap();
        let edge = builder
            .add_edge(EventObjectEdge::new(event, yellow, "being cleaned"))
            .unwrap();
        (builder.freeze(), yellow, white, event, edge)
    }

    #[test]
    fn assembled_edges_have_both_endpoints_present() {
        let (graph, yellow, white, event, edge) = cleaning_scene();
        // Select the event and the *white* bowl only: the edge to the yellow
        // bowl would dangle, so it must be dropped.
        let sub = Subgraph::assemble(
            &graph,
            &BTreeSet::from([white]),
            &BTreeSet::from([event]),
            Visibility { edges: true, involved_objects: false },
        )
        .unwrap();
        assert!(!sub.contains_edge(edge));
        assert!(sub.edges.as_ref().unwrap().is_empty());

        let sub = Subgraph::assemble(
            &graph,
            &BTreeSet::from([yellow]),
            &BTreeSet::from([event]),
            Visibility { edges: true, involved_objects: false },
        )
        .unwrap();
        assert!(sub.contains_edge(edge));
        assert!(sub.contains_object(yellow));
        assert!(sub.contains_event(event));
    }

    #[test]
    fn involved_objects_are_withheld_unless_visible() {
        let (graph, yellow, _, event, _) = cleaning_scene();
        let ids = (BTreeSet::from([yellow]), BTreeSet::from([event]));
        let without = Subgraph::assemble(
            &graph,
            &ids.0,
            &ids.1,
            Visibility { edges: true, involved_objects: false },
        )
        .unwrap();
        assert!(without.events[&event].involved_objects.is_none());

        let with = Subgraph::assemble(
            &graph,
            &ids.0,
            &ids.1,
            Visibility { edges: false, involved_objects: true },
        )
        .unwrap();
        assert_eq!(with.events[&event].involved_objects.as_deref(), Some(&[yellow][..]));
        assert!(with.edges.is_none());
    }

    #[test]
    fn empty_selection_assembles_to_empty_context() {
        let (graph, ..) = cleaning_scene();
        let sub = Subgraph::assemble(
            &graph,
            &BTreeSet::new(),
            &BTreeSet::new(),
            Visibility { edges: true, involved_objects: false },
        )
        .unwrap();
        assert!(sub.is_empty());
    }

    #[test]
    fn json_rendering_uses_the_persistence_section_names() {
        let (graph, yellow, _, event, _) = cleaning_scene();
        let sub = Subgraph::assemble(
            &graph,
            &BTreeSet::from([yellow]),
            &BTreeSet::from([event]),
            Visibility { edges: true, involved_objects: false },
        )
        .unwrap();
        let value = sub.to_json_value();
        assert!(value["nodes"]["object_nodes"].is_object());
        assert!(value["nodes"]["event_nodes"].is_object());
        assert!(value["edges"]["event_object_edges"].is_object());
    }
}
