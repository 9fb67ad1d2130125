//! The [`AnsweringOracle`] capability and its request/response types.

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use scenic_graph::Subgraph;
use scenic_types::{
    EdgeId, EventId, LocationSet, Modality, ModalityParseError, ModalityValue, ObjectId, Query,
    TimeWindow,
};

// ─────────────────────────────────────────────────────────────────────────────
// Error type
// ─────────────────────────────────────────────────────────────────────────────

/// Errors that can arise at the oracle boundary.
#[derive(Error, Debug)]
pub enum OracleError {
    /// The HTTP request to the model server failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    /// The response could not be read as the expected JSON shape.
    #[error("malformed oracle response: {0}")]
    BadResponse(String),
    /// The oracle's answer payload does not fit the requested modality.
    #[error("answer does not fit requested modality: {0}")]
    BadAnswerShape(#[from] ModalityParseError),
}

// ─────────────────────────────────────────────────────────────────────────────
// Request/response types
// ─────────────────────────────────────────────────────────────────────────────

/// The time window and location set the oracle extracted from a query
/// (pruning phase 1).  Absent bounds and an empty location list mean the
/// query did not constrain that dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct ScopeHints {
    pub window: TimeWindow,
    pub locations: LocationSet,
    pub rationale: String,
}

impl ScopeHints {
    /// Hints that constrain nothing.
    pub fn unconstrained() -> Self {
        Self {
            window: TimeWindow::unbounded(),
            locations: LocationSet::All,
            rationale: String::new(),
        }
    }
}

/// An object node summary offered to the oracle for selection
/// (pruning phase 2).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectCandidate {
    pub id: ObjectId,
    pub name: String,
    pub caption: String,
}

/// An event node summary offered to the oracle for selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventCandidate {
    pub id: EventId,
    pub start: DateTime<Utc>,
    pub description: String,
}

/// The node ids the oracle judged relevant, with one rationale per
/// category.  The rationales are kept for auditability only.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeSelection {
    pub object_ids: Vec<ObjectId>,
    pub event_ids: Vec<EventId>,
    pub object_rationale: String,
    pub event_rationale: String,
}

/// The oracle's structured answer, parsed but not yet validated against the
/// assembled context (the synthesizer does that).
#[derive(Debug, Clone, PartialEq)]
pub struct OracleAnswer {
    /// Typed answer payload, or `None` when the oracle declined to answer.
    pub answer: Option<ModalityValue>,
    /// The modality the oracle claims to have answered in; must echo the
    /// request.
    pub modality: Modality,
    pub confidence: f32,
    pub explanation: String,
    pub cited_objects: BTreeSet<ObjectId>,
    pub cited_events: BTreeSet<EventId>,
    pub cited_edges: BTreeSet<EdgeId>,
}

/// The evaluation oracle's grade for one generated answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Judgement {
    /// Semantic agreement with the ground truth, in `[0, 1]`.
    pub accuracy: f32,
    pub explanation: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// AnsweringOracle
// ─────────────────────────────────────────────────────────────────────────────

/// The external reasoning capability the pipeline delegates to.
///
/// All four operations are opaque judgment calls; the pipeline treats the
/// implementation as a black box and validates every response.  `now` is
/// passed explicitly so answers can discount stale evidence and so tests
/// are reproducible.
#[async_trait]
pub trait AnsweringOracle: Send + Sync {
    /// Extract the time window and location set a query is scoped to.
    /// `known_locations` and `graph_span` ground the extraction in what the
    /// graph actually covers.
    async fn extract_scope(
        &self,
        query: &str,
        known_locations: &[String],
        graph_span: Option<(DateTime<Utc>, DateTime<Utc>)>,
        now: DateTime<Utc>,
    ) -> Result<ScopeHints, OracleError>;

    /// Pick the candidate nodes worth expanding for a query.
    async fn select_nodes(
        &self,
        query: &Query,
        objects: &[ObjectCandidate],
        events: &[EventCandidate],
    ) -> Result<NodeSelection, OracleError>;

    /// Produce the final typed answer from a self-contained context.
    async fn answer(
        &self,
        query: &Query,
        context: &Subgraph,
        now: DateTime<Utc>,
    ) -> Result<OracleAnswer, OracleError>;

    /// Grade a generated answer against a ground-truth answer.
    async fn judge(
        &self,
        query: &str,
        ground_truth: &str,
        generated: &str,
    ) -> Result<Judgement, OracleError>;
}
