//! Event-object edges.

use serde::{Deserialize, Serialize};

use scenic_types::{EdgeId, EventId, ObjectId};

/// A typed relation from an event to one object participating in it.
///
/// Edges reference their endpoints by id rather than by direct reference,
/// so events and objects never own each other; the store resolves endpoints
/// on lookup.  Referential integrity (both endpoints exist at creation, an
/// edge never outlives an endpoint) is enforced by
/// [`crate::GraphBuilder::add_edge`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventObjectEdge {
    pub id: EdgeId,
    pub from_event: EventId,
    pub to_object: ObjectId,
    /// What the object is doing in the event, e.g. `"being picked up by the
    /// person"`.
    pub object_role: String,
}

impl EventObjectEdge {
    pub fn new(from_event: EventId, to_object: ObjectId, object_role: impl Into<String>) -> Self {
        Self {
            id: EdgeId::new(),
            from_event,
            to_object,
            object_role: object_role.into(),
        }
    }
}
