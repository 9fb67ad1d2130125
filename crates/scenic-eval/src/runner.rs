//! The benchmark runner: one pipeline, one dataset, bounded concurrency.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::info;

use scenic_retrieval::{QueryPipeline, RetrievalMode};
use scenic_types::{AnswerResult, Modality};

use crate::EvalError;
use crate::dataset::QaDataset;
use crate::evaluator::Evaluator;

/// One sample's outcome: the generated answer plus the judge's verdict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkRecord {
    pub query: String,
    pub modality: Modality,
    pub ground_truth: String,
    pub generated: AnswerResult,
    pub accuracy: f32,
    pub judge_explanation: String,
    pub elapsed_ms: u64,
}

/// The aggregate outcome of one benchmark run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkReport {
    pub mode: RetrievalMode,
    pub mean_accuracy: f32,
    pub records: Vec<BenchmarkRecord>,
}

impl BenchmarkReport {
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<(), EvalError> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), text)?;
        info!(path = %path.as_ref().display(), "benchmark report written");
        Ok(())
    }
}

/// Drives every dataset sample through the pipeline and the judge.
///
/// Samples run concurrently up to the configured limit; a single sample's
/// oracle flake becomes a null answer inside its record, while judge or
/// configuration failures abort the run.
pub struct BenchmarkRunner {
    pipeline: QueryPipeline,
    evaluator: Evaluator,
    concurrency: usize,
}

impl BenchmarkRunner {
    pub fn new(pipeline: QueryPipeline, evaluator: Evaluator, concurrency: usize) -> Self {
        Self {
            pipeline,
            evaluator,
            concurrency: concurrency.max(1),
        }
    }

    /// Run the whole dataset, evaluated at `now`.  Record order follows the
    /// dataset regardless of completion order.
    pub async fn run(
        &self,
        dataset: &QaDataset,
        now: DateTime<Utc>,
    ) -> Result<BenchmarkReport, EvalError> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks: JoinSet<Result<(usize, BenchmarkRecord), EvalError>> = JoinSet::new();

        for (index, sample) in dataset.samples.iter().cloned().enumerate() {
            let semaphore = Arc::clone(&semaphore);
            let pipeline = self.pipeline.clone();
            let evaluator = self.evaluator.clone();
            tasks.spawn(async move {
                // Closed only if the runner is dropped mid-run.
                let _permit = semaphore
                    .acquire()
                    .await
                    .map_err(|e| EvalError::Io(std::io::Error::other(e)))?;
                let started = Instant::now();
                let query = sample.to_query();
                let generated = pipeline.answer_at(&query, now).await?;
                let judgement = evaluator
                    .score(&sample.query, &sample.answer, &generated)
                    .await?;
                Ok((
                    index,
                    BenchmarkRecord {
                        query: sample.query,
                        modality: sample.modality,
                        ground_truth: sample.answer,
                        generated,
                        accuracy: judgement.accuracy,
                        judge_explanation: judgement.explanation,
                        elapsed_ms: started.elapsed().as_millis() as u64,
                    },
                ))
            });
        }

        let mut indexed: Vec<(usize, BenchmarkRecord)> = Vec::with_capacity(dataset.len());
        while let Some(joined) = tasks.join_next().await {
            indexed.push(joined??);
        }
        indexed.sort_by_key(|(index, _)| *index);
        let records: Vec<BenchmarkRecord> = indexed.into_iter().map(|(_, r)| r).collect();

        let mean_accuracy = if records.is_empty() {
            0.0
        } else {
            records.iter().map(|r| r.accuracy).sum::<f32>() / records.len() as f32
        };
        info!(
            mode = %self.pipeline.mode(),
            samples = records.len(),
            mean_accuracy,
            "benchmark complete"
        );
        Ok(BenchmarkReport {
            mode: self.pipeline.mode(),
            mean_accuracy,
            records,
        })
    }
}
