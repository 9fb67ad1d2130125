//! Typed identifiers for graph entities.
//!
//! Object, event and edge ids are UUIDs wrapped in distinct newtypes so an
//! event id can never be handed to an object lookup.  Raw UUID values may
//! collide across kinds; the newtype is the kind tag that disambiguates
//! them.

use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! id_newtype {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
            Serialize, Deserialize, JsonSchema,
        )]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a fresh random id.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wrap an existing UUID.
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// The underlying UUID value.
            pub const fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

id_newtype!(
    /// Identifier of an object node.
    ObjectId
);
id_newtype!(
    /// Identifier of an event node.
    EventId
);
id_newtype!(
    /// Identifier of an event-object edge.
    EdgeId
);

/// A node reference that carries its kind tag, used wherever object and
/// event ids share one collection (e.g. answer citations).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum NodeId {
    Object(ObjectId),
    Event(EventId),
}

impl NodeId {
    /// The object id, if this reference points at an object node.
    pub fn as_object(&self) -> Option<ObjectId> {
        match self {
            NodeId::Object(id) => Some(*id),
            NodeId::Event(_) => None,
        }
    }

    /// The event id, if this reference points at an event node.
    pub fn as_event(&self) -> Option<EventId> {
        match self {
            NodeId::Object(_) => None,
            NodeId::Event(id) => Some(*id),
        }
    }
}

impl From<ObjectId> for NodeId {
    fn from(id: ObjectId) -> Self {
        NodeId::Object(id)
    }
}

impl From<EventId> for NodeId {
    fn from(id: EventId) -> Self {
        NodeId::Event(id)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeId::Object(id) => write!(f, "object:{id}"),
            NodeId::Event(id) => write!(f, "event:{id}"),
        }
    }
}
