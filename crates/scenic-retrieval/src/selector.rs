//! Relevance selection, polymorphic over the retrieval mode.
//!
//! The non-pruning modes select everything their mode makes visible; the
//! two-phase `pruning_unified` mode first asks the oracle for a time/
//! location scope (phase 1), filters, then asks it to pick nodes among the
//! surviving candidates (phase 2).  Oracle proposals are never trusted
//! blindly: ids outside the candidate set are dropped, and in edge-visible
//! modes a deterministic reconciliation step narrows the chosen objects to
//! the instances actually linked to a chosen event, which is what keeps two
//! same-class objects apart.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use scenic_graph::SceneGraph;
use scenic_oracle::{
    AnsweringOracle, EventCandidate, ObjectCandidate, OracleError, ScopeHints,
};
use scenic_types::{EventId, ObjectId, Query, TimeWindow};

use crate::filter::filter_scope;
use crate::mode::RetrievalMode;

/// The nodes chosen for the answer context, with per-category rationales
/// kept for auditability.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    pub object_ids: BTreeSet<ObjectId>,
    pub event_ids: BTreeSet<EventId>,
    pub object_rationale: String,
    pub event_rationale: String,
}

impl Selection {
    pub fn is_empty(&self) -> bool {
        self.object_ids.is_empty() && self.event_ids.is_empty()
    }
}

/// A selection plus the window it was scoped to, which the synthesizer
/// needs for citation-recency validation.
#[derive(Debug, Clone, Default)]
pub(crate) struct SelectionOutcome {
    pub selection: Selection,
    pub window: TimeWindow,
}

/// Run relevance selection for one query.
pub(crate) async fn select(
    graph: &SceneGraph,
    mode: RetrievalMode,
    query: &Query,
    oracle: &dyn AnsweringOracle,
    now: DateTime<Utc>,
) -> Result<SelectionOutcome, OracleError> {
    if !mode.two_phase() {
        return Ok(SelectionOutcome {
            selection: select_all_visible(graph, mode),
            window: TimeWindow::unbounded(),
        });
    }

    // Phase 1: oracle-extracted scope, then the pure time/location filter.
    let known_locations: Vec<String> = graph.locations().iter().cloned().collect();
    let hints = oracle
        .extract_scope(&query.text, &known_locations, graph.time_range(), now)
        .await?;
    let window = sanitize_window(hints.clone());
    let scope = filter_scope(graph, &window, &hints.locations);
    debug!(
        objects = scope.object_ids.len(),
        events = scope.event_ids.len(),
        "phase 1 scope"
    );
    if scope.is_empty() {
        return Ok(SelectionOutcome {
            selection: Selection {
                object_rationale: "nothing in the requested time/location scope".into(),
                event_rationale: hints.rationale,
                ..Selection::default()
            },
            window,
        });
    }

    // Phase 2: oracle picks among the scoped candidates.
    let objects: Vec<ObjectCandidate> = scope
        .object_ids
        .iter()
        .filter_map(|id| graph.object(*id).ok())
        .map(|node| ObjectCandidate {
            id: node.id,
            name: node.name.clone(),
            caption: node.caption.clone(),
        })
        .collect();
    let events: Vec<EventCandidate> = scope
        .event_ids
        .iter()
        .filter_map(|id| graph.event(*id).ok())
        .map(|node| EventCandidate {
            id: node.id,
            start: node.start,
            description: node.description.clone(),
        })
        .collect();

    let proposal = oracle.select_nodes(query, &objects, &events).await?;

    // Oracle ids outside the scope are dropped, never invented into scope.
    let mut object_ids: BTreeSet<ObjectId> = proposal
        .object_ids
        .iter()
        .filter(|id| scope.object_ids.contains(id))
        .copied()
        .collect();
    let event_ids: BTreeSet<EventId> = proposal
        .event_ids
        .iter()
        .filter(|id| scope.event_ids.contains(id))
        .copied()
        .collect();
    let dropped =
        (proposal.object_ids.len() - object_ids.len()) + (proposal.event_ids.len() - event_ids.len());
    if dropped > 0 {
        warn!(dropped, "oracle proposed ids outside the filtered scope");
    }

    if mode.edges_visible() {
        object_ids = reconcile_with_edges(graph, object_ids, &event_ids);
    }

    Ok(SelectionOutcome {
        selection: Selection {
            object_ids,
            event_ids,
            object_rationale: proposal.object_rationale,
            event_rationale: proposal.event_rationale,
        },
        window,
    })
}

/// Everything the mode makes visible, for the single-phase strategies.
fn select_all_visible(graph: &SceneGraph, mode: RetrievalMode) -> Selection {
    Selection {
        object_ids: if mode.objects_visible() {
            graph.iter_objects().map(|o| o.id).collect()
        } else {
            BTreeSet::new()
        },
        event_ids: if mode.events_visible() {
            graph.iter_events().map(|e| e.id).collect()
        } else {
            BTreeSet::new()
        },
        object_rationale: format!("mode {mode} retains every visible object node"),
        event_rationale: format!("mode {mode} retains every visible event node"),
    }
}

/// An inverted oracle window constrains nothing.
fn sanitize_window(hints: ScopeHints) -> TimeWindow {
    if hints.window.is_inverted() {
        warn!(window = ?hints.window, "oracle returned an inverted window, ignoring it");
        TimeWindow::unbounded()
    } else {
        hints.window
    }
}

/// Narrow chosen objects to those actually connected to a chosen event,
/// via an explicit edge or an `involved_objects` entry.
///
/// This is the disambiguation step: of two same-class objects, only the one
/// linked to the relevant event survives.  When no chosen object is linked
/// to any chosen event (or no events were chosen) the proposal is kept
/// as-is, since the query may be purely spatial.
fn reconcile_with_edges(
    graph: &SceneGraph,
    object_ids: BTreeSet<ObjectId>,
    event_ids: &BTreeSet<EventId>,
) -> BTreeSet<ObjectId> {
    if event_ids.is_empty() {
        return object_ids;
    }
    let mut linked: BTreeSet<ObjectId> = BTreeSet::new();
    for event_id in event_ids {
        for edge_id in graph.edges_for_event(*event_id) {
            if let Ok(edge) = graph.edge(*edge_id) {
                linked.insert(edge.to_object);
            }
        }
        if let Ok(event) = graph.event(*event_id) {
            linked.extend(event.involved_objects.iter().copied());
        }
    }
    let narrowed: BTreeSet<ObjectId> = object_ids.intersection(&linked).copied().collect();
    if narrowed.is_empty() { object_ids } else { narrowed }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use scenic_graph::{EventNode, EventObjectEdge, GraphBuilder, ObjectNode, Subgraph};
    use scenic_oracle::{Judgement, NodeSelection, OracleAnswer};
    use scenic_types::{LocationSet, Modality};

    fn t(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).unwrap()
    }

    /// Deterministic stand-in for the reasoning oracle: returns canned scope
    /// hints and node proposals.
    struct StubOracle {
        hints: ScopeHints,
        proposal: NodeSelection,
    }

    #[async_trait]
    impl AnsweringOracle for StubOracle {
        async fn extract_scope(
            &self,
            _query: &str,
            _known_locations: &[String],
            _graph_span: Option<(DateTime<Utc>, DateTime<Utc>)>,
            _now: DateTime<Utc>,
        ) -> Result<ScopeHints, OracleError> {
            Ok(self.hints.clone())
        }

        async fn select_nodes(
            &self,
            _query: &Query,
            _objects: &[ObjectCandidate],
            _events: &[EventCandidate],
        ) -> Result<NodeSelection, OracleError> {
            Ok(self.proposal.clone())
        }

        async fn answer(
            &self,
            _query: &Query,
            _context: &Subgraph,
            _now: DateTime<Utc>,
        ) -> Result<OracleAnswer, OracleError> {
            unreachable!("selection tests never reach the answer phase")
        }

        async fn judge(
            &self,
            _query: &str,
            _ground_truth: &str,
            _generated: &str,
        ) -> Result<Judgement, OracleError> {
            unreachable!("selection tests never judge")
        }
    }

    fn bowls_graph() -> (SceneGraph, ObjectId, ObjectId, EventId) {
        let mut builder = GraphBuilder::new();
        let yellow = builder
            .add_object(ObjectNode::observed("yellow_bowl_0", "a yellow bowl", "kitchen", t(9)))
            .unwrap();
        let white = builder
            .add_object(ObjectNode::observed("white_bowl_0", "a white bowl", "kitchen", t(9)))
            .unwrap();
        let clean = builder
            .add_event(EventNode::new(
                "person cleans the bowl",
                t(10),
                Some(t(10)),
                "kitchen",
                vec![yellow],
            ))
            .unwrap();
        builder
            .add_edge(EventObjectEdge::new(clean, yellow, "being cleaned"))
            .unwrap();
        (builder.freeze(), yellow, white, clean)
    }

    #[tokio::test]
    async fn non_pruning_modes_select_all_visible_without_oracle_calls() {
        let (graph, yellow, white, clean) = bowls_graph();
        let oracle = StubOracle {
            hints: ScopeHints::unconstrained(),
            proposal: NodeSelection::default(),
        };
        let query = Query::new("what happened?", Modality::Text);

        let outcome = select(&graph, RetrievalMode::FullUnified, &query, &oracle, t(12))
            .await
            .unwrap();
        assert_eq!(outcome.selection.object_ids, BTreeSet::from([yellow, white]));
        assert_eq!(outcome.selection.event_ids, BTreeSet::from([clean]));
        assert!(outcome.window.is_unbounded());

        let outcome = select(&graph, RetrievalMode::SpatialOnly, &query, &oracle, t(12))
            .await
            .unwrap();
        assert!(outcome.selection.event_ids.is_empty());
        assert!(!outcome.selection.object_ids.is_empty());

        let outcome = select(&graph, RetrievalMode::EventOnly, &query, &oracle, t(12))
            .await
            .unwrap();
        assert!(outcome.selection.object_ids.is_empty());
        assert_eq!(outcome.selection.event_ids, BTreeSet::from([clean]));
    }

    #[tokio::test]
    async fn pruning_disambiguates_same_class_objects_by_edge() {
        let (graph, yellow, white, clean) = bowls_graph();
        // The oracle hedges and proposes both bowls; the linked one wins.
        let oracle = StubOracle {
            hints: ScopeHints::unconstrained(),
            proposal: NodeSelection {
                object_ids: vec![yellow, white],
                event_ids: vec![clean],
                object_rationale: "both bowls match the class".into(),
                event_rationale: "the cleaning event".into(),
            },
        };
        let query = Query::new("What did the person clean?", Modality::Node);
        let outcome = select(&graph, RetrievalMode::PruningUnified, &query, &oracle, t(12))
            .await
            .unwrap();
        assert_eq!(outcome.selection.object_ids, BTreeSet::from([yellow]));
        assert_eq!(outcome.selection.event_ids, BTreeSet::from([clean]));
    }

    #[tokio::test]
    async fn unlinked_proposals_survive_when_no_chosen_object_is_linked() {
        let (graph, _, white, clean) = bowls_graph();
        let oracle = StubOracle {
            hints: ScopeHints::unconstrained(),
            proposal: NodeSelection {
                object_ids: vec![white],
                event_ids: vec![clean],
                ..NodeSelection::default()
            },
        };
        let query = Query::new("where is the white bowl?", Modality::Position);
        let outcome = select(&graph, RetrievalMode::PruningUnified, &query, &oracle, t(12))
            .await
            .unwrap();
        assert_eq!(outcome.selection.object_ids, BTreeSet::from([white]));
    }

    #[tokio::test]
    async fn ids_outside_the_scope_are_dropped() {
        let (graph, yellow, _, clean) = bowls_graph();
        let oracle = StubOracle {
            hints: ScopeHints {
                window: TimeWindow::unbounded(),
                locations: LocationSet::only(["kitchen"]),
                rationale: String::new(),
            },
            proposal: NodeSelection {
                object_ids: vec![yellow, ObjectId::new()],
                event_ids: vec![clean, EventId::new()],
                ..NodeSelection::default()
            },
        };
        let query = Query::new("What did the person clean?", Modality::Node);
        let outcome = select(&graph, RetrievalMode::PruningUnified, &query, &oracle, t(12))
            .await
            .unwrap();
        assert_eq!(outcome.selection.object_ids, BTreeSet::from([yellow]));
        assert_eq!(outcome.selection.event_ids, BTreeSet::from([clean]));
    }

    #[tokio::test]
    async fn empty_phase_one_scope_short_circuits_selection() {
        let (graph, ..) = bowls_graph();
        // Window entirely before any observation.
        let oracle = StubOracle {
            hints: ScopeHints {
                window: TimeWindow::between(t(1), t(2)),
                locations: LocationSet::All,
                rationale: "the query asks about early morning".into(),
            },
            proposal: NodeSelection::default(),
        };
        let query = Query::new("what happened at 1am?", Modality::Text);
        let outcome = select(&graph, RetrievalMode::PruningUnified, &query, &oracle, t(12))
            .await
            .unwrap();
        assert!(outcome.selection.is_empty());
        assert_eq!(outcome.window, TimeWindow::between(t(1), t(2)));
    }

    #[tokio::test]
    async fn inverted_oracle_window_is_ignored() {
        let (graph, yellow, white, clean) = bowls_graph();
        let oracle = StubOracle {
            hints: ScopeHints {
                window: TimeWindow::between(t(12), t(2)),
                locations: LocationSet::All,
                rationale: String::new(),
            },
            proposal: NodeSelection {
                object_ids: vec![yellow, white],
                event_ids: vec![clean],
                ..NodeSelection::default()
            },
        };
        let query = Query::new("what got cleaned?", Modality::Node);
        let outcome = select(&graph, RetrievalMode::PruningUnified, &query, &oracle, t(12))
            .await
            .unwrap();
        assert!(outcome.window.is_unbounded());
        assert!(!outcome.selection.is_empty());
    }
}
