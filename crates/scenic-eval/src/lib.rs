//! `scenic-eval` – QA datasets, oracle-judged scoring, and the benchmark
//! runner that drives a [`scenic_retrieval::QueryPipeline`] over a whole
//! dataset with bounded concurrency.

pub mod dataset;
pub mod evaluator;
pub mod runner;

use scenic_oracle::OracleError;
use scenic_retrieval::QueryError;

pub use dataset::{QaDataset, QaSample};
pub use evaluator::Evaluator;
pub use runner::{BenchmarkRecord, BenchmarkReport, BenchmarkRunner};

/// Errors from dataset handling and benchmark execution.
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed dataset: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Oracle(#[from] OracleError),
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error("benchmark task panicked: {0}")]
    Join(#[from] tokio::task::JoinError),
}
