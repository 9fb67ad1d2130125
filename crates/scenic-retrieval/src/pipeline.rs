//! The end-to-end query pipeline: filter, select, assemble, synthesize.
//!
//! One [`QueryPipeline`] serves one frozen graph and one oracle; it is cheap
//! to clone and safe to drive from many tasks at once.  A query evaluation
//! never surfaces an oracle failure as an error: timeouts, transport
//! failures and malformed replies all degrade to a null [`AnswerResult`]
//! whose explanation names the failure, so a benchmark run over hundreds of
//! queries survives individual flakes.  Only caller mistakes (an inverted
//! scope window, a bad configuration) propagate as [`QueryError`].

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use scenic_graph::{GraphError, SceneGraph, Subgraph};
use scenic_oracle::{AnsweringOracle, OracleAnswer, OracleError};
use scenic_types::{AnswerResult, LocationSet, NodeId, Query, TimeWindow};

use crate::filter::filter_scope;
use crate::mode::RetrievalMode;
use crate::selector::{self, Selection, SelectionOutcome};

/// Errors a query evaluation can surface to the caller.
///
/// Oracle and graph failures during a normal evaluation are absorbed into a
/// null result instead; these variants exist for the scoped entry point and
/// for callers that construct pipelines from configuration.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("invalid pipeline input: {0}")]
    Configuration(String),
    #[error(transparent)]
    Oracle(#[from] OracleError),
    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Tunables for one pipeline instance.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Which retrieval strategy to run.
    pub mode: RetrievalMode,
    /// Wall-clock budget for each oracle call in the answer phase.
    pub oracle_timeout: Duration,
    /// Confidence cap applied when every cited event falls outside the
    /// effective time window.
    pub stale_confidence_ceiling: f32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            mode: RetrievalMode::FullUnified,
            oracle_timeout: Duration::from_secs(120),
            stale_confidence_ceiling: 0.5,
        }
    }
}

/// The retrieval pipeline over one frozen scene graph.
#[derive(Clone)]
pub struct QueryPipeline {
    graph: Arc<SceneGraph>,
    oracle: Arc<dyn AnsweringOracle>,
    config: PipelineConfig,
}

impl QueryPipeline {
    pub fn new(graph: Arc<SceneGraph>, oracle: Arc<dyn AnsweringOracle>, config: PipelineConfig) -> Self {
        Self { graph, oracle, config }
    }

    pub fn graph(&self) -> &SceneGraph {
        &self.graph
    }

    pub fn mode(&self) -> RetrievalMode {
        self.config.mode
    }

    /// Answer a query against the graph, evaluated at the current instant.
    pub async fn answer(&self, query: &Query) -> Result<AnswerResult, QueryError> {
        self.answer_at(query, Utc::now()).await
    }

    /// Answer a query with an explicit evaluation instant, which anchors
    /// recency reasoning and makes benchmark runs reproducible.
    pub async fn answer_at(&self, query: &Query, now: DateTime<Utc>) -> Result<AnswerResult, QueryError> {
        let outcome =
            match selector::select(&self.graph, self.config.mode, query, self.oracle.as_ref(), now)
                .await
            {
                Ok(outcome) => outcome,
                Err(err) => {
                    warn!(error = %err, "selection failed, returning null answer");
                    return Ok(AnswerResult::insufficient(
                        query.modality,
                        format!("retrieval failed during node selection: {err}"),
                    ));
                }
            };
        self.synthesize(query, outcome, now).await
    }

    /// Answer a query inside a caller-supplied time window and location
    /// set, skipping the oracle's own scope extraction.
    pub async fn answer_scoped(
        &self,
        query: &Query,
        window: TimeWindow,
        locations: LocationSet,
        now: DateTime<Utc>,
    ) -> Result<AnswerResult, QueryError> {
        if window.is_inverted() {
            return Err(QueryError::Configuration(format!(
                "scope window ends before it starts: {window:?}"
            )));
        }
        let scope = filter_scope(&self.graph, &window, &locations);
        let mode = self.config.mode;
        let selection = Selection {
            object_ids: if mode.objects_visible() { scope.object_ids } else { BTreeSet::new() },
            event_ids: if mode.events_visible() { scope.event_ids } else { BTreeSet::new() },
            object_rationale: "caller-provided scope".into(),
            event_rationale: "caller-provided scope".into(),
        };
        self.synthesize(query, SelectionOutcome { selection, window }, now).await
    }

    async fn synthesize(
        &self,
        query: &Query,
        outcome: SelectionOutcome,
        now: DateTime<Utc>,
    ) -> Result<AnswerResult, QueryError> {
        let SelectionOutcome { selection, window } = outcome;
        let subgraph = match Subgraph::assemble(
            &self.graph,
            &selection.object_ids,
            &selection.event_ids,
            self.config.mode.visibility(),
        ) {
            Ok(subgraph) => subgraph,
            Err(err) => {
                warn!(error = %err, "context assembly failed, returning null answer");
                return Ok(AnswerResult::insufficient(
                    query.modality,
                    format!("context assembly failed: {err}"),
                ));
            }
        };
        if subgraph.is_empty() {
            debug!("selection produced an empty subgraph, skipping the oracle");
            return Ok(AnswerResult::insufficient(
                query.modality,
                "no relevant nodes survived retrieval",
            ));
        }

        let raw = match tokio::time::timeout(
            self.config.oracle_timeout,
            self.oracle.answer(query, &subgraph, now),
        )
        .await
        {
            Ok(Ok(raw)) => raw,
            Ok(Err(err)) => {
                warn!(error = %err, "answer oracle failed, returning null answer");
                return Ok(AnswerResult::insufficient(
                    query.modality,
                    format!("answer synthesis failed: {err}"),
                ));
            }
            Err(_) => {
                warn!(timeout = ?self.config.oracle_timeout, "answer oracle timed out");
                return Ok(AnswerResult::insufficient(
                    query.modality,
                    format!(
                        "answer synthesis timed out after {}s",
                        self.config.oracle_timeout.as_secs()
                    ),
                ));
            }
        };

        let result = self.validate(query, raw, &subgraph, &window);
        info!(
            modality = %result.modality,
            confidence = result.confidence,
            answered = result.answer.is_some(),
            "query evaluated"
        );
        Ok(result)
    }

    /// Enforce the answer contract on a raw oracle reply: the modality must
    /// match the query, citations must exist in the provided context, an
    /// answered result must cite evidence, and stale evidence caps
    /// confidence.
    fn validate(
        &self,
        query: &Query,
        raw: OracleAnswer,
        subgraph: &Subgraph,
        window: &TimeWindow,
    ) -> AnswerResult {
        if raw.modality != query.modality {
            warn!(expected = %query.modality, got = %raw.modality, "oracle answered in the wrong modality");
            return AnswerResult::insufficient(
                query.modality,
                format!(
                    "oracle answered in modality '{}' where '{}' was required",
                    raw.modality, query.modality
                ),
            );
        }

        let mut cited_nodes: BTreeSet<NodeId> = BTreeSet::new();
        let mut cited_events_in_window = false;
        let mut cited_any_event = false;
        for id in &raw.cited_objects {
            if subgraph.contains_object(*id) {
                cited_nodes.insert(NodeId::Object(*id));
            } else {
                warn!(object = %id, "dropping citation of an object outside the context");
            }
        }
        for id in &raw.cited_events {
            if subgraph.contains_event(*id) {
                cited_nodes.insert(NodeId::Event(*id));
                cited_any_event = true;
                if let Ok(event) = self.graph.event(*id)
                    && event.in_window(window)
                {
                    cited_events_in_window = true;
                }
            } else {
                warn!(event = %id, "dropping citation of an event outside the context");
            }
        }
        let cited_edges = raw
            .cited_edges
            .iter()
            .filter(|id| subgraph.contains_edge(**id))
            .copied()
            .collect::<BTreeSet<_>>();

        let mut confidence = raw.confidence.clamp(0.0, 1.0);
        let mut explanation = raw.explanation;
        if raw.answer.is_some() {
            if cited_nodes.is_empty() && cited_edges.is_empty() {
                confidence = 0.0;
                explanation.push_str(" [no valid citations support this answer]");
            } else if cited_any_event && !cited_events_in_window {
                let ceiling = self.config.stale_confidence_ceiling;
                if confidence > ceiling {
                    confidence = ceiling;
                    explanation.push_str(" [all cited events predate the effective time window]");
                }
            }
        }

        AnswerResult {
            answer: raw.answer,
            modality: query.modality,
            confidence,
            explanation,
            cited_nodes,
            cited_edges,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use scenic_graph::{EventNode, EventObjectEdge, GraphBuilder, ObjectNode};
    use scenic_oracle::{EventCandidate, Judgement, NodeSelection, ObjectCandidate, ScopeHints};
    use scenic_types::{EventId, Modality, ModalityValue, ObjectId};

    fn t(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).unwrap()
    }

    fn bowls_graph() -> (Arc<SceneGraph>, ObjectId, ObjectId, EventId) {
        let mut builder = GraphBuilder::new();
        let yellow = builder
            .add_object(ObjectNode::observed("yellow_bowl_0", "a yellow bowl", "kitchen", t(9)))
            .unwrap();
        let white = builder
            .add_object(ObjectNode::observed("white_bowl_0", "a white bowl", "kitchen", t(9)))
            .unwrap();
        let clean = builder
            .add_event(EventNode::new(
                "person cleans the bowl",
                t(10),
                Some(t(10)),
                "kitchen",
                vec![yellow],
            ))
            .unwrap();
        builder
            .add_edge(EventObjectEdge::new(clean, yellow, "being cleaned"))
            .unwrap();
        (Arc::new(builder.freeze()), yellow, white, clean)
    }

    /// Scripted oracle whose answer phase is a canned reply, optionally
    /// delayed or failed, so the pipeline's validation can be pinned down.
    struct ScriptedOracle {
        reply: Result<OracleAnswer, &'static str>,
        delay: Option<Duration>,
        selection: NodeSelection,
    }

    impl ScriptedOracle {
        fn answering(reply: OracleAnswer) -> Self {
            Self { reply: Ok(reply), delay: None, selection: NodeSelection::default() }
        }

        fn failing(message: &'static str) -> Self {
            Self { reply: Err(message), delay: None, selection: NodeSelection::default() }
        }
    }

    #[async_trait]
    impl AnsweringOracle for ScriptedOracle {
        async fn extract_scope(
            &self,
            _query: &str,
            _known_locations: &[String],
            _graph_span: Option<(DateTime<Utc>, DateTime<Utc>)>,
            _now: DateTime<Utc>,
        ) -> Result<ScopeHints, OracleError> {
            Ok(ScopeHints::unconstrained())
        }

        async fn select_nodes(
            &self,
            _query: &Query,
            _objects: &[ObjectCandidate],
            _events: &[EventCandidate],
        ) -> Result<NodeSelection, OracleError> {
            Ok(self.selection.clone())
        }

        async fn answer(
            &self,
            _query: &Query,
            _context: &Subgraph,
            _now: DateTime<Utc>,
        ) -> Result<OracleAnswer, OracleError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            match &self.reply {
                Ok(raw) => Ok(raw.clone()),
                Err(message) => Err(OracleError::BadResponse((*message).to_string())),
            }
        }

        async fn judge(
            &self,
            _query: &str,
            _ground_truth: &str,
            _generated: &str,
        ) -> Result<Judgement, OracleError> {
            unreachable!("pipeline tests never judge")
        }
    }

    fn pipeline(
        graph: Arc<SceneGraph>,
        oracle: ScriptedOracle,
        mode: RetrievalMode,
    ) -> QueryPipeline {
        QueryPipeline::new(
            graph,
            Arc::new(oracle),
            PipelineConfig { mode, ..PipelineConfig::default() },
        )
    }

    #[tokio::test]
    async fn disambiguated_node_answer_passes_validation() {
        let (graph, yellow, _, clean) = bowls_graph();
        let oracle = ScriptedOracle::answering(OracleAnswer {
            answer: Some(ModalityValue::Node(vec!["yellow_bowl_0".into()])),
            modality: Modality::Node,
            confidence: 0.9,
            explanation: "the edge ties the cleaning event to the yellow bowl".into(),
            cited_objects: BTreeSet::from([yellow]),
            cited_events: BTreeSet::from([clean]),
            cited_edges: BTreeSet::new(),
        });
        let pipeline = pipeline(graph, oracle, RetrievalMode::FullUnified);
        let query = Query::new("Which bowl did the person clean?", Modality::Node);
        let result = pipeline.answer_at(&query, t(12)).await.unwrap();
        assert_eq!(result.answer, Some(ModalityValue::Node(vec!["yellow_bowl_0".into()])));
        assert!((result.confidence - 0.9).abs() < f32::EPSILON);
        assert!(result.cited_nodes.contains(&NodeId::Object(yellow)));
        assert!(result.cited_nodes.contains(&NodeId::Event(clean)));
    }

    #[tokio::test]
    async fn wrong_modality_reply_becomes_a_null_answer() {
        let (graph, yellow, ..) = bowls_graph();
        let oracle = ScriptedOracle::answering(OracleAnswer {
            answer: Some(ModalityValue::Text("the yellow one".into())),
            modality: Modality::Text,
            confidence: 0.8,
            explanation: String::new(),
            cited_objects: BTreeSet::from([yellow]),
            cited_events: BTreeSet::new(),
            cited_edges: BTreeSet::new(),
        });
        let pipeline = pipeline(graph, oracle, RetrievalMode::FullUnified);
        let query = Query::new("Which bowl did the person clean?", Modality::Node);
        let result = pipeline.answer_at(&query, t(12)).await.unwrap();
        assert!(result.is_insufficient());
        assert_eq!(result.modality, Modality::Node);
    }

    #[tokio::test]
    async fn answered_without_citations_gets_zero_confidence() {
        let (graph, ..) = bowls_graph();
        // Citations reference nodes that exist nowhere in the context.
        let oracle = ScriptedOracle::answering(OracleAnswer {
            answer: Some(ModalityValue::Binary(true)),
            modality: Modality::Binary,
            confidence: 0.95,
            explanation: "it happened".into(),
            cited_objects: BTreeSet::from([ObjectId::new()]),
            cited_events: BTreeSet::from([EventId::new()]),
            cited_edges: BTreeSet::new(),
        });
        let pipeline = pipeline(graph, oracle, RetrievalMode::FullUnified);
        let query = Query::new("Did the person clean a bowl?", Modality::Binary);
        let result = pipeline.answer_at(&query, t(12)).await.unwrap();
        assert_eq!(result.answer, Some(ModalityValue::Binary(true)));
        assert_eq!(result.confidence, 0.0);
        assert!(result.cited_nodes.is_empty());
    }

    #[tokio::test]
    async fn stale_event_citations_cap_confidence() {
        let (graph, _, _, clean) = bowls_graph();
        let oracle = ScriptedOracle::answering(OracleAnswer {
            answer: Some(ModalityValue::Binary(true)),
            modality: Modality::Binary,
            confidence: 0.9,
            explanation: "cleaning happened earlier".into(),
            cited_objects: BTreeSet::new(),
            cited_events: BTreeSet::from([clean]),
            cited_edges: BTreeSet::new(),
        });
        let pipeline = pipeline(graph, oracle, RetrievalMode::FullUnified);
        let query = Query::new("Was the bowl cleaned this evening?", Modality::Binary);
        // The cleaning event ran at 10:00, before the caller's window.
        let result = pipeline
            .answer_at_window_for_tests(&query, TimeWindow::since(t(16)), t(20))
            .await;
        assert!((result.confidence - 0.5).abs() < f32::EPSILON);
        assert!(result.explanation.contains("effective time window"));
    }

    #[tokio::test]
    async fn oracle_failure_degrades_to_null_answer() {
        let (graph, ..) = bowls_graph();
        let oracle = ScriptedOracle::failing("model returned garbage");
        let pipeline = pipeline(graph, oracle, RetrievalMode::FullUnified);
        let query = Query::new("Which bowl did the person clean?", Modality::Node);
        let result = pipeline.answer_at(&query, t(12)).await.unwrap();
        assert!(result.is_insufficient());
        assert!(result.explanation.contains("model returned garbage"));
    }

    #[tokio::test]
    async fn oracle_timeout_degrades_to_null_answer() {
        let (graph, yellow, ..) = bowls_graph();
        let oracle = ScriptedOracle {
            reply: Ok(OracleAnswer {
                answer: Some(ModalityValue::Node(vec!["yellow_bowl_0".into()])),
                modality: Modality::Node,
                confidence: 0.9,
                explanation: String::new(),
                cited_objects: BTreeSet::from([yellow]),
                cited_events: BTreeSet::new(),
                cited_edges: BTreeSet::new(),
            }),
            delay: Some(Duration::from_millis(250)),
            selection: NodeSelection::default(),
        };
        let pipeline = QueryPipeline::new(
            graph,
            Arc::new(oracle),
            PipelineConfig {
                mode: RetrievalMode::FullUnified,
                oracle_timeout: Duration::from_millis(10),
                ..PipelineConfig::default()
            },
        );
        let query = Query::new("Which bowl did the person clean?", Modality::Node);
        let result = pipeline.answer_at(&query, t(12)).await.unwrap();
        assert!(result.is_insufficient());
        assert!(result.explanation.contains("timed out"));
    }

    #[tokio::test]
    async fn empty_scope_skips_the_oracle_entirely() {
        let (graph, ..) = bowls_graph();
        // Any oracle call would fail the test through the canned error.
        let oracle = ScriptedOracle::failing("the oracle must not be consulted");
        let pipeline = pipeline(graph, oracle, RetrievalMode::FullUnified);
        let query = Query::new("what happened last year?", Modality::Text);
        let result = pipeline
            .answer_scoped(
                &query,
                TimeWindow::between(t(1), t(2)),
                LocationSet::All,
                t(12),
            )
            .await
            .unwrap();
        assert!(result.is_insufficient());
        assert_eq!(result.confidence, 0.0);
    }

    #[tokio::test]
    async fn inverted_caller_window_is_a_configuration_error() {
        let (graph, ..) = bowls_graph();
        let oracle = ScriptedOracle::failing("unused");
        let pipeline = pipeline(graph, oracle, RetrievalMode::FullUnified);
        let query = Query::new("anything", Modality::Text);
        let err = pipeline
            .answer_scoped(&query, TimeWindow::between(t(12), t(2)), LocationSet::All, t(12))
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::Configuration(_)));
    }

    #[tokio::test]
    async fn selection_of_unknown_ids_degrades_to_null_answer() {
        let (graph, ..) = bowls_graph();
        // Assembly fails before the oracle could run; the canned error
        // would surface if it did.
        let oracle = ScriptedOracle::failing("the oracle must not be consulted");
        let pipeline = pipeline(graph, oracle, RetrievalMode::FullUnified);
        let query = Query::new("anything", Modality::Text);
        let selection = Selection {
            object_ids: BTreeSet::from([ObjectId::new()]),
            ..Selection::default()
        };
        let result = pipeline
            .synthesize(
                &query,
                SelectionOutcome {
                    selection,
                    window: TimeWindow::unbounded(),
                },
                t(12),
            )
            .await
            .unwrap();
        assert!(result.is_insufficient());
        assert_eq!(result.confidence, 0.0);
        assert!(result.explanation.contains("context assembly failed"));
    }

    #[tokio::test]
    async fn spatial_only_context_contains_no_events() {
        let (graph, yellow, white, _) = bowls_graph();
        let oracle = ScriptedOracle::answering(OracleAnswer {
            answer: Some(ModalityValue::Position([1.0, 2.0, 0.0])),
            modality: Modality::Position,
            confidence: 0.7,
            explanation: String::new(),
            cited_objects: BTreeSet::from([yellow, white]),
            cited_events: BTreeSet::new(),
            cited_edges: BTreeSet::new(),
        });
        let pipeline = pipeline(graph.clone(), oracle, RetrievalMode::SpatialOnly);
        let query = Query::new("where are the bowls?", Modality::Position);
        let result = pipeline.answer_at(&query, t(12)).await.unwrap();
        // Both objects are citable, no event ever is.
        assert_eq!(result.cited_nodes.len(), 2);
        assert!(result.cited_nodes.iter().all(|n| n.as_object().is_some()));
    }

    impl QueryPipeline {
        /// Test-only entry that pins the effective window without going
        /// through scope extraction.
        async fn answer_at_window_for_tests(
            &self,
            query: &Query,
            window: TimeWindow,
            now: DateTime<Utc>,
        ) -> AnswerResult {
            let selection = Selection {
                object_ids: self.graph.iter_objects().map(|o| o.id).collect(),
                event_ids: self.graph.iter_events().map(|e| e.id).collect(),
                ..Selection::default()
            };
            self.synthesize(query, SelectionOutcome { selection, window }, now)
                .await
                .unwrap()
        }
    }
}
