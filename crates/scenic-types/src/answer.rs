//! Query and answer records.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::ids::{EdgeId, NodeId};
use crate::modality::{Modality, ModalityValue};

/// A natural-language question plus the shape the answer must come back in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub text: String,
    pub modality: Modality,
}

impl Query {
    pub fn new(text: impl Into<String>, modality: Modality) -> Self {
        Self {
            text: text.into(),
            modality,
        }
    }
}

/// The validated outcome of one query evaluation.
///
/// `answer = None` is a legitimate result meaning the graph did not contain
/// enough information; it is never an error.  `confidence` is always inside
/// `[0, 1]` after synthesizer validation, and the citation sets only name
/// ids that were actually present in the assembled context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerResult {
    pub answer: Option<ModalityValue>,
    pub modality: Modality,
    pub confidence: f32,
    pub explanation: String,
    #[serde(default)]
    pub cited_nodes: BTreeSet<NodeId>,
    #[serde(default)]
    pub cited_edges: BTreeSet<EdgeId>,
}

impl AnswerResult {
    /// The canonical "insufficient information" result.
    pub fn insufficient(modality: Modality, explanation: impl Into<String>) -> Self {
        Self {
            answer: None,
            modality,
            confidence: 0.0,
            explanation: explanation.into(),
            cited_nodes: BTreeSet::new(),
            cited_edges: BTreeSet::new(),
        }
    }

    /// `true` when the pipeline declined to answer.
    pub fn is_insufficient(&self) -> bool {
        self.answer.is_none()
    }
}
