//! Graph analytics engine.
//!
//! In-process analytics over an immutable [`GraphData`] snapshot of a
//! research knowledge graph, built on petgraph and rustworkx-core. Every
//! computation treats edges as undirected and unweighted.
//!
//! ## Architecture
//!
//! ```text
//! GraphData (request payload) ──► KnowledgeGraph::from_data (validation)
//!                                            │
//!          ┌───────────────┬─────────────────┼──────────────┬─────────────┐
//!       centrality      topology          layout        community       paths
//!          └───────────────┴─────────────────┴──────────────┴─────────────┘
//!                                            │
//!                                 result struct (camelCase JSON)
//! ```
//!
//! ## Modules
//!
//! - [`models`]: input snapshot, `KnowledgeGraph`, result and option types
//! - [`paths`]: BFS distances and shortest paths
//! - [`components`]: connected-component partition
//! - [`centrality`]: degree, betweenness, closeness
//! - [`topology`]: density, components, clustering, average path length
//! - [`layout`] / [`quadtree`]: force-directed layout with Barnes-Hut
//! - [`community`]: component and Louvain communities with modularity

pub mod centrality;
pub mod community;
pub mod components;
pub mod layout;
pub mod models;
pub mod paths;
pub mod quadtree;
pub mod topology;

// Re-export primary types for convenience
pub use centrality::calculate_centrality;
pub use community::detect_communities;
pub use layout::optimize_layout;
pub use models::{
    decode_options, CentralityOptions, CentralityResult, CommunityInfo, CommunityMethod,
    CommunityOptions, CommunityResult, EdgeType, GraphData, GraphEdge, GraphNode, KnowledgeGraph,
    LayoutOptions, LayoutResult, NodeType, PathOptions, PathResult, Position, TopologyMetrics,
    TopologyOptions, Validate,
};
pub use paths::{find_path, shortest_path_lengths};
pub use topology::analyze_topology;
