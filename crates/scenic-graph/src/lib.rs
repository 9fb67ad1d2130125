//! `scenic-graph` – the spatio-temporal scene graph store.
//!
//! Holds the objects a robot has observed, the events it has witnessed, and
//! the typed edges connecting events to the objects that participate in
//! them.  The store has an explicit two-phase lifecycle:
//!
//! 1. **Building** – a [`GraphBuilder`] accepts mutations.  Every mutation
//!    validates the graph invariants (unique object names, unique ids per
//!    kind, no dangling edge endpoints) and is atomic: a rejected mutation
//!    leaves the builder untouched.
//! 2. **Frozen** – [`GraphBuilder::freeze`] produces a [`SceneGraph`], an
//!    immutable handle exposing only reads.  Freezing builds the name,
//!    location, time and adjacency indexes, so lookups during the query
//!    phase cost the size of their result, not the size of the graph, and
//!    the handle can be shared across concurrent query evaluations without
//!    locking.
//!
//! The JSON persistence document ([`GraphDocument`]) is the boundary
//! artifact between the out-of-scope graph-building collaborator and this
//! store; loading re-validates every record through the builder.

pub mod edge;
pub mod node;
pub mod persistence;
pub mod store;
pub mod subgraph;

pub use edge::EventObjectEdge;
pub use node::{EventNode, ObjectNode};
pub use persistence::GraphDocument;
pub use store::{GraphBuilder, GraphError, SceneGraph};
pub use subgraph::{Subgraph, SubgraphEvent, Visibility};
