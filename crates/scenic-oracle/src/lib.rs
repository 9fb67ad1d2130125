//! `scenic-oracle` – the answering-oracle boundary.
//!
//! The pipeline's free-text judgment calls (extracting a time window and
//! location set from a query, picking relevant nodes, producing the final
//! typed answer, grading a generated answer against ground truth) are
//! delegated to an external reasoning capability behind the
//! [`AnsweringOracle`] trait.  The trait keeps the retrieval pipeline and
//! its tests independent of any particular model: production uses
//! [`LlmOracle`] against an OpenAI-compatible chat-completions endpoint,
//! tests substitute deterministic stubs.
//!
//! Everything the oracle receives and returns is structured: requests carry
//! a JSON schema derived from the expected response shape, and responses
//! are validated at this boundary, so malformed model output surfaces as a
//! typed [`OracleError`] instead of leaking free text downstream.

pub mod llm;
pub mod oracle;
pub mod prompts;

pub use llm::{ChatMessage, LlmOracle, Role};
pub use oracle::{
    AnsweringOracle, EventCandidate, Judgement, NodeSelection, ObjectCandidate, OracleAnswer,
    OracleError, ScopeHints,
};
