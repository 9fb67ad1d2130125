//! The graph store: mutable builder and frozen, indexed read handle.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::debug;

use scenic_types::{EdgeId, EventId, ObjectId, TimeWindow};

use crate::edge::EventObjectEdge;
use crate::node::{EventNode, ObjectNode};

// ─────────────────────────────────────────────────────────────────────────────
// Error type
// ─────────────────────────────────────────────────────────────────────────────

/// Errors raised by graph construction and lookup.
///
/// Validation variants are fatal to the offending mutation but never
/// corrupt the store; `*NotFound` variants are recoverable typed results of
/// lookups, not crashes.
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("an object named '{name}' already exists")]
    DuplicateName { name: String },
    #[error("object id {id} already exists")]
    DuplicateObject { id: ObjectId },
    #[error("event id {id} already exists")]
    DuplicateEvent { id: EventId },
    #[error("edge id {id} already exists")]
    DuplicateEdge { id: EdgeId },
    #[error("edge endpoint refers to unknown event {id}")]
    DanglingEvent { id: EventId },
    #[error("edge endpoint refers to unknown object {id}")]
    DanglingObject { id: ObjectId },
    #[error("object {id} not found")]
    ObjectNotFound { id: ObjectId },
    #[error("event {id} not found")]
    EventNotFound { id: EventId },
    #[error("edge {id} not found")]
    EdgeNotFound { id: EdgeId },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// ─────────────────────────────────────────────────────────────────────────────
// GraphBuilder (Building phase)
// ─────────────────────────────────────────────────────────────────────────────

/// The mutable, building-phase form of the graph.
///
/// Each mutation is add-or-reject: validation happens before any state is
/// touched, so a returned [`GraphError`] guarantees the builder is exactly
/// as it was.  Call [`GraphBuilder::freeze`] to end the build phase; after
/// that only the read-only [`SceneGraph`] handle exists.
#[derive(Debug, Default, Clone)]
pub struct GraphBuilder {
    objects: HashMap<ObjectId, ObjectNode>,
    events: HashMap<EventId, EventNode>,
    edges: HashMap<EdgeId, EventObjectEdge>,
    names: HashMap<String, ObjectId>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a newly observed object.
    ///
    /// # Errors
    ///
    /// [`GraphError::DuplicateName`] if another object already carries the
    /// same name, [`GraphError::DuplicateObject`] on an id collision.
    pub fn add_object(&mut self, node: ObjectNode) -> Result<ObjectId, GraphError> {
        if self.objects.contains_key(&node.id) {
            return Err(GraphError::DuplicateObject { id: node.id });
        }
        if self.names.contains_key(&node.name) {
            return Err(GraphError::DuplicateName {
                name: node.name.clone(),
            });
        }
        let id = node.id;
        self.names.insert(node.name.clone(), id);
        self.objects.insert(id, node);
        Ok(id)
    }

    /// Fold a later observation of an existing object into its node:
    /// refreshes `last_seen` and optionally supersedes caption and location.
    pub fn observe_object(
        &mut self,
        id: ObjectId,
        caption: Option<&str>,
        location: Option<&str>,
        seen_at: DateTime<Utc>,
    ) -> Result<(), GraphError> {
        let node = self
            .objects
            .get_mut(&id)
            .ok_or(GraphError::ObjectNotFound { id })?;
        if let Some(caption) = caption {
            node.caption = caption.to_string();
        }
        if let Some(location) = location {
            node.location = location.to_string();
        }
        node.first_seen = node.first_seen.min(seen_at);
        node.last_seen = node.last_seen.max(seen_at);
        Ok(())
    }

    /// Register a detected event.  Every id in `involved_objects` must
    /// already be present in the graph.
    pub fn add_event(&mut self, node: EventNode) -> Result<EventId, GraphError> {
        if self.events.contains_key(&node.id) {
            return Err(GraphError::DuplicateEvent { id: node.id });
        }
        for object_id in &node.involved_objects {
            if !self.objects.contains_key(object_id) {
                return Err(GraphError::DanglingObject { id: *object_id });
            }
        }
        let id = node.id;
        self.events.insert(id, node);
        Ok(id)
    }

    /// Replace an event's caption with a refined one.
    pub fn refine_description(
        &mut self,
        id: EventId,
        description: &str,
    ) -> Result<(), GraphError> {
        let node = self
            .events
            .get_mut(&id)
            .ok_or(GraphError::EventNotFound { id })?;
        node.description = description.to_string();
        Ok(())
    }

    /// Register an event-object edge.  Both endpoints must exist.
    pub fn add_edge(&mut self, edge: EventObjectEdge) -> Result<EdgeId, GraphError> {
        if self.edges.contains_key(&edge.id) {
            return Err(GraphError::DuplicateEdge { id: edge.id });
        }
        if !self.events.contains_key(&edge.from_event) {
            return Err(GraphError::DanglingEvent { id: edge.from_event });
        }
        if !self.objects.contains_key(&edge.to_object) {
            return Err(GraphError::DanglingObject { id: edge.to_object });
        }
        let id = edge.id;
        self.edges.insert(id, edge);
        Ok(id)
    }

    /// Remove an object and, cascading, every edge incident to it.  Sessions
    /// are append-mostly so this is rarely exercised, but an edge must never
    /// outlive an endpoint.
    pub fn remove_object(&mut self, id: ObjectId) -> Result<(), GraphError> {
        let node = self
            .objects
            .remove(&id)
            .ok_or(GraphError::ObjectNotFound { id })?;
        self.names.remove(&node.name);
        self.edges.retain(|_, edge| edge.to_object != id);
        for event in self.events.values_mut() {
            event.involved_objects.retain(|oid| *oid != id);
        }
        Ok(())
    }

    /// Remove an event and, cascading, every edge incident to it.
    pub fn remove_event(&mut self, id: EventId) -> Result<(), GraphError> {
        self.events
            .remove(&id)
            .ok_or(GraphError::EventNotFound { id })?;
        self.edges.retain(|_, edge| edge.from_event != id);
        Ok(())
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// End the building phase: index everything and hand out the read-only
    /// graph.  After this point no mutation is possible.
    pub fn freeze(self) -> SceneGraph {
        let mut name_index = HashMap::with_capacity(self.objects.len());
        let mut object_locations: HashMap<String, Vec<ObjectId>> = HashMap::new();
        let mut event_locations: HashMap<String, Vec<EventId>> = HashMap::new();
        let mut events_by_start: Vec<(DateTime<Utc>, EventId)> = Vec::new();
        let mut event_edges: HashMap<EventId, Vec<EdgeId>> = HashMap::new();
        let mut object_edges: HashMap<ObjectId, Vec<EdgeId>> = HashMap::new();
        let mut locations: BTreeSet<String> = BTreeSet::new();

        for object in self.objects.values() {
            name_index.insert(object.name.clone(), object.id);
            object_locations
                .entry(object.location.clone())
                .or_default()
                .push(object.id);
            locations.insert(object.location.clone());
        }
        for event in self.events.values() {
            event_locations
                .entry(event.location.clone())
                .or_default()
                .push(event.id);
            events_by_start.push((event.start, event.id));
            locations.insert(event.location.clone());
        }
        events_by_start.sort_unstable_by_key(|(start, id)| (*start, *id));
        for edge in self.edges.values() {
            event_edges.entry(edge.from_event).or_default().push(edge.id);
            object_edges.entry(edge.to_object).or_default().push(edge.id);
        }

        let time_range = events_by_start.first().map(|(first_start, _)| {
            let last = self
                .events
                .values()
                .map(|e| e.end.unwrap_or(e.start))
                .max()
                .unwrap_or(*first_start);
            (*first_start, last)
        });

        debug!(
            objects = self.objects.len(),
            events = self.events.len(),
            edges = self.edges.len(),
            "graph frozen"
        );

        SceneGraph {
            objects: self.objects,
            events: self.events,
            edges: self.edges,
            name_index,
            object_locations,
            event_locations,
            events_by_start,
            event_edges,
            object_edges,
            locations,
            time_range,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SceneGraph (Frozen phase)
// ─────────────────────────────────────────────────────────────────────────────

/// The frozen, queryable form of the graph.
///
/// Immutable by construction, `Send + Sync`, and safe to share behind an
/// `Arc` across any number of concurrent query evaluations.  All range and
/// location lookups go through indexes built at freeze time.
#[derive(Debug, Clone)]
pub struct SceneGraph {
    objects: HashMap<ObjectId, ObjectNode>,
    events: HashMap<EventId, EventNode>,
    edges: HashMap<EdgeId, EventObjectEdge>,
    name_index: HashMap<String, ObjectId>,
    object_locations: HashMap<String, Vec<ObjectId>>,
    event_locations: HashMap<String, Vec<EventId>>,
    /// Events sorted by start time; backs the windowed range query.
    events_by_start: Vec<(DateTime<Utc>, EventId)>,
    event_edges: HashMap<EventId, Vec<EdgeId>>,
    object_edges: HashMap<ObjectId, Vec<EdgeId>>,
    locations: BTreeSet<String>,
    time_range: Option<(DateTime<Utc>, DateTime<Utc>)>,
}

impl SceneGraph {
    pub fn object(&self, id: ObjectId) -> Result<&ObjectNode, GraphError> {
        self.objects.get(&id).ok_or(GraphError::ObjectNotFound { id })
    }

    pub fn event(&self, id: EventId) -> Result<&EventNode, GraphError> {
        self.events.get(&id).ok_or(GraphError::EventNotFound { id })
    }

    pub fn edge(&self, id: EdgeId) -> Result<&EventObjectEdge, GraphError> {
        self.edges.get(&id).ok_or(GraphError::EdgeNotFound { id })
    }

    pub fn object_by_name(&self, name: &str) -> Option<&ObjectNode> {
        self.name_index.get(name).and_then(|id| self.objects.get(id))
    }

    /// Objects tagged with a location, in O(matches).
    pub fn objects_by_location(&self, location: &str) -> &[ObjectId] {
        self.object_locations
            .get(location)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Events tagged with a location, in O(matches).
    pub fn events_by_location(&self, location: &str) -> &[EventId] {
        self.event_locations
            .get(location)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Events whose temporal extent overlaps the window.
    ///
    /// Binary-searches the sorted-by-start index for the prefix of events
    /// that begin at or before the window's end, then keeps those whose
    /// extent reaches the window's start.  The result is in start order.
    pub fn events_in_window(&self, window: &TimeWindow) -> Vec<EventId> {
        let upper = match window.end {
            Some(end) => self.events_by_start.partition_point(|(start, _)| *start <= end),
            None => self.events_by_start.len(),
        };
        self.events_by_start[..upper]
            .iter()
            .filter(|(_, id)| {
                let event = &self.events[id];
                window.overlaps(event.start, event.end)
            })
            .map(|(_, id)| *id)
            .collect()
    }

    /// All edges leaving an event, in O(degree).
    pub fn edges_for_event(&self, id: EventId) -> &[EdgeId] {
        self.event_edges.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All edges arriving at an object, in O(degree).
    pub fn edges_for_object(&self, id: ObjectId) -> &[EdgeId] {
        self.object_edges.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every location tag appearing on any node.
    pub fn locations(&self) -> &BTreeSet<String> {
        &self.locations
    }

    /// Earliest event start and latest event end, when any events exist.
    pub fn time_range(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        self.time_range
    }

    pub fn iter_objects(&self) -> impl Iterator<Item = &ObjectNode> {
        self.objects.values()
    }

    pub fn iter_events(&self) -> impl Iterator<Item = &EventNode> {
        self.events.values()
    }

    pub fn iter_edges(&self) -> impl Iterator<Item = &EventObjectEdge> {
        self.edges.values()
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty() && self.events.is_empty()
    }
}
