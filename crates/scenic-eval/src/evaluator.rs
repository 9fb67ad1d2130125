//! Oracle-judged answer scoring.

use std::sync::Arc;

use scenic_oracle::{AnsweringOracle, Judgement};
use scenic_types::AnswerResult;

use crate::EvalError;

/// Scores generated answers against ground truth with the judging oracle.
///
/// The judge sees only the rendered answer text, never the citations or the
/// confidence, so a lucky guess with no evidence still scores as correct
/// here; evidence quality is the pipeline's concern, not the judge's.
#[derive(Clone)]
pub struct Evaluator {
    oracle: Arc<dyn AnsweringOracle>,
}

impl Evaluator {
    pub fn new(oracle: Arc<dyn AnsweringOracle>) -> Self {
        Self { oracle }
    }

    /// Judge one generated answer, returning an accuracy in `[0, 1]`.
    pub async fn score(
        &self,
        query: &str,
        ground_truth: &str,
        generated: &AnswerResult,
    ) -> Result<Judgement, EvalError> {
        let rendered = render_answer(generated);
        let mut judgement = self.oracle.judge(query, ground_truth, &rendered).await?;
        judgement.accuracy = judgement.accuracy.clamp(0.0, 1.0);
        Ok(judgement)
    }
}

/// Render an answer the way the judge should see it.  A declined answer is
/// the literal string `None`, which ground truths also use for unanswerable
/// questions, so declining on an unanswerable sample scores full marks.
pub fn render_answer(result: &AnswerResult) -> String {
    match &result.answer {
        Some(value) => value.to_string(),
        None => "None".to_string(),
    }
}
