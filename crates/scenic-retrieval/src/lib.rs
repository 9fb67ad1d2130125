//! `scenic-retrieval` – the query-pruning and retrieval pipeline.
//!
//! Turns one natural-language query over a frozen [`scenic_graph::SceneGraph`]
//! into a validated [`scenic_types::AnswerResult`]:
//!
//! 1. **Filter** – narrow the graph to the nodes inside the query's time
//!    window and location set ([`filter`]).
//! 2. **Select** – choose the minimal relevant node set, polymorphic over
//!    the five [`RetrievalMode`]s ([`selector`]).
//! 3. **Assemble** – materialize the selection into a self-contained
//!    [`scenic_graph::Subgraph`] honoring the mode's edge visibility.
//! 4. **Synthesize** – invoke the answering oracle under a timeout and
//!    validate its response into an `AnswerResult` ([`pipeline`]).
//!
//! Every query evaluation is independent; the pipeline holds the graph
//! behind an `Arc` and may be driven from any number of concurrent tasks.

pub mod filter;
pub mod mode;
pub mod pipeline;
pub mod selector;
pub mod telemetry;

pub use filter::{Scope, filter_scope};
pub use mode::RetrievalMode;
pub use pipeline::{PipelineConfig, QueryError, QueryPipeline};
pub use selector::Selection;
