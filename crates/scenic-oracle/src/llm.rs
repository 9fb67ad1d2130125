//! [`LlmOracle`] – OpenAI-compatible implementation of [`AnsweringOracle`].
//!
//! Talks to a model server exposing the `/v1/chat/completions` endpoint
//! (Ollama, vLLM, or a hosted provider).  Every request pins
//! `response_format` to a JSON Schema derived from the expected response
//! struct, so the model is constrained to the wire shape this module
//! parses.
//!
//! # Example
//!
//! ```rust,no_run
//! use scenic_oracle::LlmOracle;
//!
//! let oracle = LlmOracle::new("http://localhost:11434", "llama3");
//! // oracle.answer(...) requires a running model server.
//! ```

use std::collections::BTreeSet;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use schemars::{JsonSchema, schema_for};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::{debug, warn};

use scenic_graph::Subgraph;
use scenic_types::{
    EdgeId, EventId, LocationSet, Modality, ModalityValue, ObjectId, Query, TimeWindow,
    parse_flexible_timestamp,
};

use crate::oracle::{
    AnsweringOracle, EventCandidate, Judgement, NodeSelection, ObjectCandidate, OracleAnswer,
    OracleError, ScopeHints,
};
use crate::prompts;

// ─────────────────────────────────────────────────────────────────────────────
// Message types (OpenAI-compatible)
// ─────────────────────────────────────────────────────────────────────────────

/// The role of a participant in a chat conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single message in a chat conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Internal request / response shapes
// ─────────────────────────────────────────────────────────────────────────────

/// `response_format` field enforcing structured JSON Schema output.
#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
    json_schema: serde_json::Value,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    stream: bool,
    response_format: ResponseFormat,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Deserialize, Default)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

// ─────────────────────────────────────────────────────────────────────────────
// Oracle wire shapes
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Deserialize, JsonSchema)]
struct ScopeWire {
    /// Start of the extracted window, `yyyy-mm-dd hh:mm:ss`, or null.
    start: Option<String>,
    /// End of the extracted window, `yyyy-mm-dd hh:mm:ss`, or null.
    end: Option<String>,
    /// Location tags to restrict to; empty means no restriction.
    #[serde(default)]
    locations: Vec<String>,
    #[serde(default)]
    explanation: String,
}

#[derive(Deserialize, JsonSchema)]
struct SelectionWire {
    /// Ids of the relevant object nodes.
    #[serde(default)]
    object_nodes: Vec<String>,
    /// Ids of the relevant event nodes.
    #[serde(default)]
    event_nodes: Vec<String>,
    #[serde(default)]
    explanation_objects: String,
    #[serde(default)]
    explanation_events: String,
}

#[derive(Deserialize, JsonSchema)]
struct AnswerWire {
    /// The answer payload in the requested modality, or null.
    answer: serde_json::Value,
    /// Echo of the requested modality.
    modality: String,
    /// Confidence in `[0, 1]`, discounted for stale evidence.
    confidence: f32,
    /// Natural-language reasoning behind the answer.
    explanation: String,
    /// Which nodes and edges produced the answer, by id.
    #[serde(default)]
    cited_object_ids: Vec<String>,
    #[serde(default)]
    cited_event_ids: Vec<String>,
    #[serde(default)]
    cited_edge_ids: Vec<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct JudgeWire {
    /// Semantic similarity of generated to ground truth, `[0, 1]`.
    accuracy: f32,
    explanation: String,
}

/// Parse ids leniently: entries that are not valid UUIDs are dropped with a
/// warning rather than failing the whole response, since citation sets are
/// re-validated against the context anyway.
fn parse_ids<T: FromStr>(raw: &[String], what: &str) -> BTreeSet<T>
where
    T: Ord,
{
    let mut out = BTreeSet::new();
    for s in raw {
        match s.parse::<T>() {
            Ok(id) => {
                out.insert(id);
            }
            Err(_) => warn!(value = %s, "dropping unparseable {what} id"),
        }
    }
    out
}

// ─────────────────────────────────────────────────────────────────────────────
// LlmOracle
// ─────────────────────────────────────────────────────────────────────────────

/// An async oracle backed by an OpenAI-compatible chat endpoint.
///
/// Construct once and reuse across queries; token usage is accumulated
/// across all calls for benchmark reporting.
pub struct LlmOracle {
    base_url: String,
    model: String,
    temperature: f32,
    client: reqwest::Client,
    prompt_tokens: AtomicU64,
    completion_tokens: AtomicU64,
}

impl LlmOracle {
    /// Create an oracle pointing at `base_url` (e.g.
    /// `"http://localhost:11434"`) using `model` (e.g. `"llama3"`).
    /// Temperature is pinned to 0 for reproducible retrieval.
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            temperature: 0.0,
            client: reqwest::Client::new(),
            prompt_tokens: AtomicU64::new(0),
            completion_tokens: AtomicU64::new(0),
        }
    }

    /// Total `(prompt, completion)` tokens consumed so far.
    pub fn token_usage(&self) -> (u64, u64) {
        (
            self.prompt_tokens.load(Ordering::Relaxed),
            self.completion_tokens.load(Ordering::Relaxed),
        )
    }

    /// Send `messages` and parse the reply as `T`, holding the model to
    /// `T`'s JSON schema via `response_format`.
    async fn complete<T>(&self, messages: &[ChatMessage]) -> Result<T, OracleError>
    where
        T: DeserializeOwned + JsonSchema,
    {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let schema =
            serde_json::to_value(schema_for!(T)).unwrap_or(serde_json::Value::Null);
        let body = ChatRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            stream: false,
            response_format: ResponseFormat {
                kind: "json_schema",
                json_schema: schema,
            },
        };

        let response: ChatResponse = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(usage) = &response.usage {
            self.prompt_tokens.fetch_add(usage.prompt_tokens, Ordering::Relaxed);
            self.completion_tokens
                .fetch_add(usage.completion_tokens, Ordering::Relaxed);
        }

        let content = response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| OracleError::BadResponse("empty choices array".into()))?;
        debug!(len = content.len(), "oracle reply received");
        parse_reply(&content)
    }
}

/// Parse a model reply, tolerating markdown code fences and the
/// single-element-array convention some models fall back to.
fn parse_reply<T: DeserializeOwned>(content: &str) -> Result<T, OracleError> {
    let trimmed = strip_code_fences(content);
    if let Ok(parsed) = serde_json::from_str::<T>(trimmed) {
        return Ok(parsed);
    }
    let value: serde_json::Value = serde_json::from_str(trimmed)
        .map_err(|e| OracleError::BadResponse(format!("not JSON: {e}")))?;
    let candidate = match value {
        serde_json::Value::Array(mut items) if !items.is_empty() => items.remove(0),
        other => other,
    };
    serde_json::from_value(candidate)
        .map_err(|e| OracleError::BadResponse(format!("unexpected shape: {e}")))
}

fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

// ─────────────────────────────────────────────────────────────────────────────
// AnsweringOracle implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl AnsweringOracle for LlmOracle {
    async fn extract_scope(
        &self,
        query: &str,
        known_locations: &[String],
        graph_span: Option<(DateTime<Utc>, DateTime<Utc>)>,
        now: DateTime<Utc>,
    ) -> Result<ScopeHints, OracleError> {
        let messages = prompts::scope_messages(query, known_locations, graph_span, now);
        let wire: ScopeWire = self.complete(&messages).await?;

        let parse_bound = |bound: &Option<String>| -> Option<DateTime<Utc>> {
            let s = bound.as_deref()?.trim();
            if s.is_empty() || s.eq_ignore_ascii_case("none") {
                return None;
            }
            let parsed = parse_flexible_timestamp(s);
            if parsed.is_none() {
                warn!(value = s, "dropping unparseable window bound");
            }
            parsed
        };

        Ok(ScopeHints {
            window: TimeWindow {
                start: parse_bound(&wire.start),
                end: parse_bound(&wire.end),
            },
            locations: LocationSet::only(wire.locations),
            rationale: wire.explanation,
        })
    }

    async fn select_nodes(
        &self,
        query: &Query,
        objects: &[ObjectCandidate],
        events: &[EventCandidate],
    ) -> Result<NodeSelection, OracleError> {
        let messages = prompts::selection_messages(query, objects, events);
        let wire: SelectionWire = self.complete(&messages).await?;
        Ok(NodeSelection {
            object_ids: parse_ids::<ObjectId>(&wire.object_nodes, "object")
                .into_iter()
                .collect(),
            event_ids: parse_ids::<EventId>(&wire.event_nodes, "event")
                .into_iter()
                .collect(),
            object_rationale: wire.explanation_objects,
            event_rationale: wire.explanation_events,
        })
    }

    async fn answer(
        &self,
        query: &Query,
        context: &Subgraph,
        now: DateTime<Utc>,
    ) -> Result<OracleAnswer, OracleError> {
        let messages = prompts::answer_messages(query, context, now);
        let wire: AnswerWire = self.complete(&messages).await?;

        let modality: Modality = wire
            .modality
            .parse()
            .map_err(|_| OracleError::BadResponse(format!("unknown modality '{}'", wire.modality)))?;
        let answer = ModalityValue::from_json(query.modality, &wire.answer)?;

        Ok(OracleAnswer {
            answer,
            modality,
            confidence: wire.confidence,
            explanation: wire.explanation,
            cited_objects: parse_ids(&wire.cited_object_ids, "object"),
            cited_events: parse_ids(&wire.cited_event_ids, "event"),
            cited_edges: parse_ids::<EdgeId>(&wire.cited_edge_ids, "edge"),
        })
    }

    async fn judge(
        &self,
        query: &str,
        ground_truth: &str,
        generated: &str,
    ) -> Result<Judgement, OracleError> {
        let messages = prompts::judge_messages(query, ground_truth, generated);
        let wire: JudgeWire = self.complete(&messages).await?;
        Ok(Judgement {
            accuracy: wire.accuracy.clamp(0.0, 1.0),
            explanation: wire.explanation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_message_serializes_role_lowercase() {
        let msg = ChatMessage::system("hello");
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"system\""));
    }

    #[test]
    fn reply_parses_through_code_fences_and_array_wrapping() {
        let fenced = "```json\n{\"accuracy\": 0.5, \"explanation\": \"ok\"}\n```";
        let wire: JudgeWire = parse_reply(fenced).unwrap();
        assert_eq!(wire.accuracy, 0.5);

        let wrapped = "[{\"accuracy\": 1.0, \"explanation\": \"exact\"}]";
        let wire: JudgeWire = parse_reply(wrapped).unwrap();
        assert_eq!(wire.accuracy, 1.0);

        let err = parse_reply::<JudgeWire>("not json at all").unwrap_err();
        assert!(matches!(err, OracleError::BadResponse(_)));
    }

    #[test]
    fn invalid_cited_ids_are_dropped_not_fatal() {
        let raw = vec!["not-a-uuid".to_string(), ObjectId::new().to_string()];
        let parsed = parse_ids::<ObjectId>(&raw, "object");
        assert_eq!(parsed.len(), 1);
    }

    #[test]
    fn answer_wire_schema_names_its_fields() {
        let schema = serde_json::to_value(schema_for!(AnswerWire)).unwrap();
        let text = schema.to_string();
        assert!(text.contains("answer"));
        assert!(text.contains("confidence"));
        assert!(text.contains("cited_object_ids"));
    }
}
