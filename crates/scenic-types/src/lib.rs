//! `scenic-types` – shared value types for the Scenic scene-graph memory.
//!
//! Every crate in the workspace speaks in terms of these types: typed node
//! and edge identifiers, the closed [`Modality`] enumeration, the typed
//! [`ModalityValue`] answer payload, query time windows, and the
//! [`AnswerResult`] record that every query evaluation produces.

pub mod answer;
pub mod ids;
pub mod modality;
pub mod time;

pub use answer::{AnswerResult, Query};
pub use ids::{EdgeId, EventId, NodeId, ObjectId};
pub use modality::{Modality, ModalityParseError, ModalityValue};
pub use time::{LocationSet, TimeWindow, parse_flexible_timestamp};
