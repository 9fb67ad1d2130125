//! Retrieval modes: which node and edge kinds the selector may see.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use scenic_graph::Visibility;

/// The closed set of retrieval strategies, chosen per benchmark run.
///
/// | mode | objects | events | edges |
/// |---|---|---|---|
/// | `full_unified` | yes | yes | yes |
/// | `no_edge` | yes | yes | no (adjacency via `involved_objects`) |
/// | `spatial_only` | yes | no | no |
/// | `event_only` | no | yes | no |
/// | `pruning_unified` | yes (two-phase) | yes | yes |
///
/// `pruning_unified` is the only two-phase variant: it pre-filters by time
/// and location before node selection; the others select directly over the
/// whole visible graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalMode {
    FullUnified,
    NoEdge,
    SpatialOnly,
    EventOnly,
    PruningUnified,
}

/// An unrecognized mode name in configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown retrieval mode '{0}' (expected one of full_unified, no_edge, spatial_only, event_only, pruning_unified)")]
pub struct UnknownModeError(pub String);

impl RetrievalMode {
    pub const ALL: [RetrievalMode; 5] = [
        RetrievalMode::FullUnified,
        RetrievalMode::NoEdge,
        RetrievalMode::SpatialOnly,
        RetrievalMode::EventOnly,
        RetrievalMode::PruningUnified,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RetrievalMode::FullUnified => "full_unified",
            RetrievalMode::NoEdge => "no_edge",
            RetrievalMode::SpatialOnly => "spatial_only",
            RetrievalMode::EventOnly => "event_only",
            RetrievalMode::PruningUnified => "pruning_unified",
        }
    }

    /// Whether object nodes are visible to the selector.
    pub fn objects_visible(&self) -> bool {
        !matches!(self, RetrievalMode::EventOnly)
    }

    /// Whether event nodes are visible to the selector.
    pub fn events_visible(&self) -> bool {
        !matches!(self, RetrievalMode::SpatialOnly)
    }

    /// Whether explicit event-object edges are visible.
    pub fn edges_visible(&self) -> bool {
        matches!(self, RetrievalMode::FullUnified | RetrievalMode::PruningUnified)
    }

    /// Whether the mode runs the two-phase time/location pre-filter.
    pub fn two_phase(&self) -> bool {
        matches!(self, RetrievalMode::PruningUnified)
    }

    /// How the subgraph assembler should project adjacency for this mode.
    /// `involved_objects` substitutes for edges exactly when both node
    /// kinds are visible but edges are not.
    pub fn visibility(&self) -> Visibility {
        Visibility {
            edges: self.edges_visible(),
            involved_objects: !self.edges_visible()
                && self.objects_visible()
                && self.events_visible(),
        }
    }
}

impl fmt::Display for RetrievalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RetrievalMode {
    type Err = UnknownModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RetrievalMode::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| UnknownModeError(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visibility_table_matches_the_mode_definitions() {
        assert!(RetrievalMode::FullUnified.edges_visible());
        assert!(RetrievalMode::PruningUnified.edges_visible());
        assert!(!RetrievalMode::NoEdge.edges_visible());
        assert!(!RetrievalMode::SpatialOnly.events_visible());
        assert!(!RetrievalMode::EventOnly.objects_visible());
        assert!(RetrievalMode::PruningUnified.two_phase());
        assert!(!RetrievalMode::FullUnified.two_phase());
    }

    #[test]
    fn involved_objects_substitute_for_edges_only_in_no_edge() {
        assert!(RetrievalMode::NoEdge.visibility().involved_objects);
        assert!(!RetrievalMode::FullUnified.visibility().involved_objects);
        assert!(!RetrievalMode::EventOnly.visibility().involved_objects);
        assert!(!RetrievalMode::SpatialOnly.visibility().involved_objects);
    }

    #[test]
    fn mode_round_trips_through_str_and_serde() {
        for mode in RetrievalMode::ALL {
            assert_eq!(mode.as_str().parse::<RetrievalMode>().unwrap(), mode);
            let json = serde_json::to_string(&mode).unwrap();
            assert_eq!(json, format!("\"{mode}\""));
        }
        assert!("graph_rag".parse::<RetrievalMode>().is_err());
    }
}
