//! The temporal/spatial pre-filter.
//!
//! Pure membership filtering: the output contains exactly the nodes inside
//! the requested time window and location set, never ranked and never
//! trimmed for relevance.  An empty result means "nothing in scope", which
//! is a legitimate signal, not a failure.

use std::collections::BTreeSet;

use scenic_graph::SceneGraph;
use scenic_types::{EventId, LocationSet, ObjectId, TimeWindow};

/// The candidate set surviving the time/location filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scope {
    pub object_ids: BTreeSet<ObjectId>,
    pub event_ids: BTreeSet<EventId>,
}

impl Scope {
    /// Everything in the graph, used by the modes that skip pre-filtering.
    pub fn full(graph: &SceneGraph) -> Self {
        Self {
            object_ids: graph.iter_objects().map(|o| o.id).collect(),
            event_ids: graph.iter_events().map(|e| e.id).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.object_ids.is_empty() && self.event_ids.is_empty()
    }
}

/// Narrow the graph to the window and location set.
///
/// Events pass when their location matches and their temporal extent
/// overlaps the window; objects pass when their location matches and their
/// seen-lifetime overlaps the window.  Both checks run off the frozen
/// indexes, so cost tracks the matching set, not the graph.
pub fn filter_scope(graph: &SceneGraph, window: &TimeWindow, locations: &LocationSet) -> Scope {
    let event_ids: BTreeSet<EventId> = graph
        .events_in_window(window)
        .into_iter()
        .filter(|id| {
            graph
                .event(*id)
                .map(|event| event.in_locations(locations))
                .unwrap_or(false)
        })
        .collect();

    let object_candidates: Vec<ObjectId> = match locations {
        LocationSet::All => graph.iter_objects().map(|o| o.id).collect(),
        LocationSet::Only(set) => set
            .iter()
            .flat_map(|loc| graph.objects_by_location(loc).iter().copied())
            .collect(),
    };
    let object_ids: BTreeSet<ObjectId> = object_candidates
        .into_iter()
        .filter(|id| {
            graph
                .object(*id)
                .map(|object| object.seen_within(window))
                .unwrap_or(false)
        })
        .collect();

    Scope {
        object_ids,
        event_ids,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use scenic_graph::{EventNode, GraphBuilder, ObjectNode};

    fn t(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).unwrap()
    }

    fn house_graph() -> (SceneGraph, ObjectId, ObjectId, EventId, EventId) {
        let mut builder = GraphBuilder::new();
        let mug = builder
            .add_object(ObjectNode::observed("mug_0", "a blue mug", "kitchen", t(9)))
            .unwrap();
        let shoe = builder
            .add_object(ObjectNode::observed("shoe_0", "a running shoe", "hallway", t(7)))
            .unwrap();
        let brew = builder
            .add_event(EventNode::new(
                "person brews coffee",
                t(9),
                Some(t(9)),
                "kitchen",
                vec![mug],
            ))
            .unwrap();
        let leave = builder
            .add_event(EventNode::new(
                "person puts on shoes and leaves",
                t(17),
                Some(t(17)),
                "hallway",
                vec![shoe],
            ))
            .unwrap();
        (builder.freeze(), mug, shoe, brew, leave)
    }

    #[test]
    fn unconstrained_filter_keeps_everything() {
        let (graph, ..) = house_graph();
        let scope = filter_scope(&graph, &TimeWindow::unbounded(), &LocationSet::All);
        assert_eq!(scope, Scope::full(&graph));
    }

    #[test]
    fn window_excludes_non_overlapping_events_and_lifetimes() {
        let (graph, mug, _, brew, _) = house_graph();
        let scope = filter_scope(&graph, &TimeWindow::between(t(8), t(10)), &LocationSet::All);
        assert_eq!(scope.event_ids, BTreeSet::from([brew]));
        // The shoe was last seen at 07:00, outside the window.
        assert_eq!(scope.object_ids, BTreeSet::from([mug]));
    }

    #[test]
    fn location_set_restricts_both_node_kinds() {
        let (graph, _, shoe, _, leave) = house_graph();
        let scope = filter_scope(
            &graph,
            &TimeWindow::unbounded(),
            &LocationSet::only(["hallway"]),
        );
        assert_eq!(scope.object_ids, BTreeSet::from([shoe]));
        assert_eq!(scope.event_ids, BTreeSet::from([leave]));
    }

    #[test]
    fn out_of_range_window_yields_empty_scope_not_error() {
        let (graph, ..) = house_graph();
        let scope = filter_scope(&graph, &TimeWindow::between(t(1), t(2)), &LocationSet::All);
        assert!(scope.is_empty());
    }

    #[test]
    fn unknown_location_yields_empty_scope() {
        let (graph, ..) = house_graph();
        let scope = filter_scope(
            &graph,
            &TimeWindow::unbounded(),
            &LocationSet::only(["attic"]),
        );
        assert!(scope.is_empty());
    }
}
