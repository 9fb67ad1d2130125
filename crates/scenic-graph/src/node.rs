//! Object and event nodes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use scenic_types::{EventId, LocationSet, ObjectId, TimeWindow};

// ─────────────────────────────────────────────────────────────────────────────
// ObjectNode
// ─────────────────────────────────────────────────────────────────────────────

/// A physical object observed in the scene.
///
/// Created when the object is first seen; later observations of the same
/// physical object update `caption`, `location` and `last_seen` through
/// [`crate::GraphBuilder::observe_object`].  Object nodes are never deleted,
/// only superseded by later state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectNode {
    pub id: ObjectId,
    /// Human-readable label, unique within one graph (e.g. `"yellow_bowl_0"`).
    pub name: String,
    /// Free-text appearance description.
    pub caption: String,
    /// Room or area tag where the object was last seen.
    pub location: String,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

impl ObjectNode {
    /// Construct a node for a first observation: the seen-lifetime collapses
    /// to the single observation instant.
    pub fn observed(
        name: impl Into<String>,
        caption: impl Into<String>,
        location: impl Into<String>,
        seen_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ObjectId::new(),
            name: name.into(),
            caption: caption.into(),
            location: location.into(),
            first_seen: seen_at,
            last_seen: seen_at,
        }
    }

    /// Whether the observed lifetime `[first_seen, last_seen]` overlaps a
    /// query window.
    pub fn seen_within(&self, window: &TimeWindow) -> bool {
        window.overlaps(self.first_seen, Some(self.last_seen))
    }

    /// Whether the object's location passes a location filter.
    pub fn in_locations(&self, locations: &LocationSet) -> bool {
        locations.matches(&self.location)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// EventNode
// ─────────────────────────────────────────────────────────────────────────────

/// An observed action or interaction.
///
/// Immutable after creation apart from caption refinement.  `end` is absent
/// while an event is still being observed (or was seen only for an
/// instant); such events are treated as instantaneous at `start` for
/// temporal filtering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventNode {
    pub id: EventId,
    /// Free-text caption of the observed action.
    pub description: String,
    pub start: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
    /// Room or area tag where the event occurred.
    pub location: String,
    /// Objects directly participating in the event, in observation order.
    #[serde(default)]
    pub involved_objects: Vec<ObjectId>,
}

impl EventNode {
    pub fn new(
        description: impl Into<String>,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
        location: impl Into<String>,
        involved_objects: Vec<ObjectId>,
    ) -> Self {
        Self {
            id: EventId::new(),
            description: description.into(),
            start,
            end,
            location: location.into(),
            involved_objects,
        }
    }

    /// Whether the temporal extent overlaps a query window.
    pub fn in_window(&self, window: &TimeWindow) -> bool {
        window.overlaps(self.start, self.end)
    }

    /// Whether the event's location passes a location filter.
    pub fn in_locations(&self, locations: &LocationSet) -> bool {
        locations.matches(&self.location)
    }

    /// Whether an object participates directly in this event.
    pub fn involves(&self, object_id: ObjectId) -> bool {
        self.involved_objects.contains(&object_id)
    }
}
