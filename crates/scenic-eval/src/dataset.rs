//! Question-answer datasets for benchmarking.
//!
//! A dataset is a JSON array of samples, each pairing a question with its
//! expected modality and a ground-truth answer string:
//!
//! ```json
//! [
//!   {"query": "Which bowl did the person clean?", "modality": "node", "answer": "yellow_bowl_0"}
//! ]
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use scenic_graph::SceneGraph;
use scenic_types::{Modality, Query};

use crate::EvalError;

/// One benchmark question with its ground truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaSample {
    pub query: String,
    pub modality: Modality,
    pub answer: String,
}

impl QaSample {
    pub fn to_query(&self) -> Query {
        Query::new(self.query.clone(), self.modality)
    }
}

/// An ordered collection of [`QaSample`]s.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QaDataset {
    pub samples: Vec<QaSample>,
}

impl QaDataset {
    pub fn new(samples: Vec<QaSample>) -> Self {
        Self { samples }
    }

    /// Load a dataset from a JSON file.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, EvalError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let dataset: QaDataset = serde_json::from_str(&text)?;
        info!(path = %path.as_ref().display(), samples = dataset.samples.len(), "dataset loaded");
        Ok(dataset)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Drop node-modality samples whose ground-truth names do not exist in
    /// the graph.  Such samples cannot be answered correctly by any
    /// retrieval strategy and would only poison the aggregate score; each
    /// removal is logged.  Samples in other modalities are kept untouched,
    /// since their ground truth is not a graph reference.
    pub fn validate_against(&mut self, graph: &SceneGraph) -> usize {
        let before = self.samples.len();
        self.samples.retain(|sample| {
            if sample.modality != Modality::Node {
                return true;
            }
            let known = sample
                .answer
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .all(|name| graph.object_by_name(name).is_some());
            if !known {
                warn!(query = %sample.query, answer = %sample.answer, "dropping sample with unknown object name");
            }
            known
        });
        before - self.samples.len()
    }
}
