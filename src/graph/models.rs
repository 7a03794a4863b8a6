//! Graph analytics data models.
//!
//! Defines the complete type system for graph analytics:
//!
//! ## Input types (request payload)
//! - [`NodeType`] / [`GraphNode`]: claims, evidence and other research entities
//! - [`EdgeType`] / [`GraphEdge`]: relations between entities
//! - [`GraphData`]: immutable snapshot sent with every request
//! - [`KnowledgeGraph`]: validated petgraph adjacency view with ID ↔ NodeIndex mapping
//!
//! ## Output types (analytics)
//! - [`CentralityResult`]: degree, betweenness and closeness per node
//! - [`TopologyMetrics`]: global shape of the graph
//! - [`LayoutResult`]: force-directed positions per node
//! - [`CommunityResult`] / [`CommunityInfo`]: partition and modularity
//! - [`PathResult`]: one shortest path between two nodes
//!
//! ## Options
//! - [`CentralityOptions`], [`TopologyOptions`], [`LayoutOptions`],
//!   [`CommunityOptions`], [`PathOptions`]: typed per-operation options,
//!   decoded from the open JSON `options` object by [`decode_options`]

use petgraph::graph::{NodeIndex, UnGraph};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{EngineError, Result};

// ============================================================================
// Input types: request payload
// ============================================================================

/// Role of a node in the research knowledge graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Claim,
    Evidence,
    Hypothesis,
    Question,
    Source,
    Concept,
    Method,
    /// Any role this engine has no name for; traversal treats it like the rest
    #[serde(other)]
    Other,
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Claim => write!(f, "claim"),
            Self::Evidence => write!(f, "evidence"),
            Self::Hypothesis => write!(f, "hypothesis"),
            Self::Question => write!(f, "question"),
            Self::Source => write!(f, "source"),
            Self::Concept => write!(f, "concept"),
            Self::Method => write!(f, "method"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// Semantic relation carried by an edge. Traversal ignores it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    Supports,
    Contradicts,
    Relates,
    DerivesFrom,
    Cites,
    Refines,
    #[serde(other)]
    Other,
}

impl std::fmt::Display for EdgeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Supports => write!(f, "supports"),
            Self::Contradicts => write!(f, "contradicts"),
            Self::Relates => write!(f, "relates"),
            Self::DerivesFrom => write!(f, "derives_from"),
            Self::Cites => write!(f, "cites"),
            Self::Refines => write!(f, "refines"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// A 2D point on the layout canvas.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// `node id -> {x, y}`
pub type PositionMap = HashMap<String, Position>;

/// `node id -> hop count`
pub type DistanceMap = HashMap<String, usize>;

/// A research entity (claim, evidence, ...) in the graph snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
    /// Unique identifier within one `GraphData`
    pub id: String,
    /// Display label
    pub label: String,
    /// Role of the node
    #[serde(rename = "type")]
    pub node_type: NodeType,
    /// Confidence scores, each in [0, 1]
    #[serde(default)]
    pub confidence: Vec<f64>,
    /// Open metadata map, passed through untouched (`null` reads as empty)
    #[serde(default, deserialize_with = "null_as_default")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    /// Last known layout position, used as the layout starting point
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
}

/// A relation between two nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub edge_type: EdgeType,
    /// Confidence in [0, 1]
    #[serde(default)]
    pub confidence: f64,
    /// Optional weight (defaults to 1.0)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(default)]
    pub bidirectional: bool,
}

impl GraphEdge {
    /// Edge weight with the default of 1.0 applied.
    pub fn weight(&self) -> f64 {
        self.weight.unwrap_or(1.0)
    }
}

/// Treat an explicit JSON `null` like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Immutable graph snapshot sent with every request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphData {
    #[serde(default)]
    pub nodes: Vec<GraphNode>,
    #[serde(default)]
    pub edges: Vec<GraphEdge>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

// ============================================================================
// KnowledgeGraph: validated petgraph view with ID mapping
// ============================================================================

/// Undirected petgraph view of a [`GraphData`] snapshot.
///
/// Node weights are the node ids, edge weights the edge weights. Node indices
/// follow the order of `GraphData::nodes`, so `NodeIndex::index()` can be used
/// to address per-node vectors. Building the view validates the snapshot:
/// duplicate node ids and edges pointing at unknown nodes are rejected.
#[derive(Debug, Clone)]
pub struct KnowledgeGraph {
    graph: UnGraph<String, f64>,
    id_to_index: HashMap<String, NodeIndex>,
    /// Incident edge count per node (self-loops count twice)
    degrees: Vec<usize>,
    self_loops: usize,
}

impl KnowledgeGraph {
    /// Build and validate the adjacency view of a snapshot.
    pub fn from_data(data: &GraphData) -> Result<Self> {
        let mut graph = UnGraph::with_capacity(data.nodes.len(), data.edges.len());
        let mut id_to_index = HashMap::with_capacity(data.nodes.len());

        for node in &data.nodes {
            if id_to_index.contains_key(&node.id) {
                return Err(EngineError::DuplicateNodeId(node.id.clone()));
            }
            let idx = graph.add_node(node.id.clone());
            id_to_index.insert(node.id.clone(), idx);
        }

        let mut degrees = vec![0usize; data.nodes.len()];
        let mut self_loops = 0;
        for edge in &data.edges {
            let lookup = |node_id: &str| {
                id_to_index
                    .get(node_id)
                    .copied()
                    .ok_or_else(|| EngineError::InvalidGraphReference {
                        edge_id: edge.id.clone(),
                        node_id: node_id.to_string(),
                    })
            };
            let s = lookup(&edge.source)?;
            let t = lookup(&edge.target)?;
            if s == t {
                self_loops += 1;
            }
            degrees[s.index()] += 1;
            degrees[t.index()] += 1;
            graph.add_edge(s, t, edge.weight());
        }

        Ok(Self {
            graph,
            id_to_index,
            degrees,
            self_loops,
        })
    }

    /// The underlying undirected graph.
    pub fn graph(&self) -> &UnGraph<String, f64> {
        &self.graph
    }

    /// Get the NodeIndex for a given ID.
    pub fn get_index(&self, id: &str) -> Option<NodeIndex> {
        self.id_to_index.get(id).copied()
    }

    /// Node id at a given index.
    pub fn id(&self, idx: NodeIndex) -> &str {
        &self.graph[idx]
    }

    /// Number of incident edges (self-loops counted at both ends).
    pub fn degree(&self, idx: NodeIndex) -> usize {
        self.degrees[idx.index()]
    }

    /// Number of nodes in the graph.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of edges in the graph (parallel edges and self-loops included).
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Number of edges whose source equals their target.
    pub fn self_loop_count(&self) -> usize {
        self.self_loops
    }

    /// Build one adjacency list per node index.
    ///
    /// Neighbors are listed in edge insertion order; self-loops are dropped
    /// since they never shorten a path.
    pub fn adjacency(&self) -> Vec<Vec<usize>> {
        let mut adj = vec![Vec::new(); self.node_count()];
        for edge in self.graph.raw_edges() {
            let s = edge.source().index();
            let t = edge.target().index();
            if s == t {
                continue;
            }
            adj[s].push(t);
            adj[t].push(s);
        }
        adj
    }
}

// ============================================================================
// Output types: Analytics results
// ============================================================================

/// Per-node centrality scores. Every map covers every node exactly once.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CentralityResult {
    /// Incident edge count per node (not normalized)
    pub degree: HashMap<String, f64>,
    /// Betweenness centrality normalized to [0, 1]
    pub betweenness: HashMap<String, f64>,
    /// Inverse mean hop distance to reachable nodes (0 when isolated)
    pub closeness: HashMap<String, f64>,
    /// True when betweenness was estimated from a subset of sources
    pub betweenness_approximate: bool,
}

/// Global topology metrics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopologyMetrics {
    pub node_count: usize,
    pub edge_count: usize,
    /// `2E / (V(V-1))`, 0 for fewer than 2 nodes
    pub density: f64,
    /// Number of connected components
    pub components: usize,
    /// Mean local clustering over nodes with degree ≥ 2
    pub clustering_coefficient: f64,
    /// Mean finite pairwise hop distance
    pub average_path_length: f64,
    pub is_connected: bool,
    pub largest_component_size: usize,
    /// Nodes with no incident edge
    pub isolated_nodes: usize,
    pub self_loops: usize,
}

/// Result of a layout run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutResult {
    /// Final position for every node
    pub positions: PositionMap,
    /// Iterations actually simulated
    pub iterations: usize,
    /// Whether repulsion used the Barnes-Hut approximation
    pub used_barnes_hut: bool,
}

/// Metadata about a detected community.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommunityInfo {
    /// Community identifier (0 = largest)
    pub id: u32,
    /// Node IDs belonging to this community
    pub nodes: Vec<String>,
    /// Number of nodes in this community
    pub size: usize,
    /// Label of the best connected member
    pub label: String,
}

/// Result of community detection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunityResult {
    pub communities: Vec<CommunityInfo>,
    /// Newman modularity of the partition
    pub modularity: f64,
    pub community_count: usize,
    /// `node id -> community id`
    pub membership: HashMap<String, u32>,
    pub method: CommunityMethod,
}

/// One shortest path between two nodes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathResult {
    pub source: String,
    pub target: String,
    /// Node ids from source to target, `None` when unreachable
    pub path: Option<Vec<String>>,
    /// Hop count, `None` when unreachable
    pub length: Option<usize>,
}

// ============================================================================
// Options
// ============================================================================

/// Boundary validation for decoded options.
pub trait Validate {
    fn validate(&self) -> Result<()>;
}

/// Decode an open JSON `options` object on top of `defaults`.
///
/// Keys present in `value` override the defaults; a missing or `null` value
/// yields the defaults unchanged. The merged value is then validated.
pub fn decode_options<T>(defaults: &T, value: Option<&serde_json::Value>) -> Result<T>
where
    T: Serialize + DeserializeOwned + Validate,
{
    let mut merged = serde_json::to_value(defaults)?;
    match value {
        None | Some(serde_json::Value::Null) => {}
        Some(serde_json::Value::Object(overrides)) => {
            if let serde_json::Value::Object(base) = &mut merged {
                for (k, v) in overrides {
                    base.insert(k.clone(), v.clone());
                }
            }
        }
        Some(other) => {
            return Err(EngineError::InvalidOptions(format!(
                "options must be an object, got {}",
                other
            )));
        }
    }
    let options: T = serde_json::from_value(merged)?;
    options.validate()?;
    Ok(options)
}

fn ensure_non_negative(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(EngineError::InvalidOptions(format!(
            "{} must be a finite non-negative number, got {}",
            name, value
        )));
    }
    Ok(())
}

/// Options for `CALCULATE_CENTRALITY`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CentralityOptions {
    /// Estimate betweenness from this many sources instead of all nodes
    #[serde(default)]
    pub sample_sources: Option<usize>,
    /// Node count from which closeness runs on the rayon pool
    pub parallel_threshold: usize,
    /// Node count above which betweenness is sampled automatically
    pub sample_threshold: usize,
}

impl Default for CentralityOptions {
    fn default() -> Self {
        Self {
            sample_sources: None,
            parallel_threshold: 200,
            sample_threshold: 2000,
        }
    }
}

impl Validate for CentralityOptions {
    fn validate(&self) -> Result<()> {
        if self.sample_sources == Some(0) {
            return Err(EngineError::InvalidOptions(
                "sampleSources must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Options for `ANALYZE_TOPOLOGY` (none today; unknown keys are ignored).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TopologyOptions {}

impl Validate for TopologyOptions {
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

/// Upper bound on layout iterations accepted from a request.
pub const MAX_LAYOUT_ITERATIONS: usize = 100_000;

/// Options for `OPTIMIZE_LAYOUT`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutOptions {
    /// Number of simulation steps (default: 100)
    pub iterations: usize,
    /// Inverse-square repulsion constant (default: 1000)
    pub repulsion_strength: f64,
    /// Linear spring constant along edges (default: 0.1)
    pub attraction_strength: f64,
    /// Seed for the random initial placement
    #[serde(default)]
    pub seed: Option<u64>,
    /// Barnes-Hut opening angle (default: 0.8)
    pub theta: f64,
    /// Node count above which Barnes-Hut replaces exact repulsion (default: 1000)
    pub barnes_hut_threshold: usize,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            iterations: 100,
            repulsion_strength: 1000.0,
            attraction_strength: 0.1,
            seed: None,
            theta: 0.8,
            barnes_hut_threshold: 1000,
        }
    }
}

impl Validate for LayoutOptions {
    fn validate(&self) -> Result<()> {
        if self.iterations > MAX_LAYOUT_ITERATIONS {
            return Err(EngineError::InvalidOptions(format!(
                "iterations must be at most {}, got {}",
                MAX_LAYOUT_ITERATIONS, self.iterations
            )));
        }
        ensure_non_negative("repulsionStrength", self.repulsion_strength)?;
        ensure_non_negative("attractionStrength", self.attraction_strength)?;
        if !self.theta.is_finite() || self.theta <= 0.0 {
            return Err(EngineError::InvalidOptions(format!(
                "theta must be positive, got {}",
                self.theta
            )));
        }
        Ok(())
    }
}

/// Partitioning strategy for `DETECT_COMMUNITIES`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommunityMethod {
    /// One community per connected component
    #[default]
    Components,
    /// Greedy modularity optimisation (finer than components)
    Louvain,
}

/// Options for `DETECT_COMMUNITIES`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunityOptions {
    pub method: CommunityMethod,
    /// Louvain resolution parameter (default: 1.0, higher = smaller communities)
    pub resolution: f64,
    /// Louvain maximum local-move sweeps (default: 100)
    pub max_iterations: usize,
}

impl Default for CommunityOptions {
    fn default() -> Self {
        Self {
            method: CommunityMethod::Components,
            resolution: 1.0,
            max_iterations: 100,
        }
    }
}

impl Validate for CommunityOptions {
    fn validate(&self) -> Result<()> {
        if !self.resolution.is_finite() || self.resolution <= 0.0 {
            return Err(EngineError::InvalidOptions(format!(
                "resolution must be positive, got {}",
                self.resolution
            )));
        }
        Ok(())
    }
}

/// Options for `FIND_SHORTEST_PATH`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathOptions {
    pub source: String,
    pub target: String,
}

impl Validate for PathOptions {
    fn validate(&self) -> Result<()> {
        if self.source.is_empty() || self.target.is_empty() {
            return Err(EngineError::InvalidOptions(
                "source and target are required".into(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
pub(crate) mod test_graphs {
    //! Graph builders shared by the algorithm tests.

    use super::*;

    pub fn node(id: &str) -> GraphNode {
        GraphNode {
            id: id.to_string(),
            label: format!("Node {}", id),
            node_type: NodeType::Claim,
            confidence: vec![0.5],
            metadata: Default::default(),
            position: None,
        }
    }

    pub fn edge(source: &str, target: &str) -> GraphEdge {
        GraphEdge {
            id: format!("{}-{}", source, target),
            source: source.to_string(),
            target: target.to_string(),
            edge_type: EdgeType::Supports,
            confidence: 0.8,
            weight: None,
            bidirectional: false,
        }
    }

    pub fn graph(nodes: &[&str], edges: &[(&str, &str)]) -> GraphData {
        GraphData {
            nodes: nodes.iter().map(|id| node(id)).collect(),
            edges: edges.iter().map(|(s, t)| edge(s, t)).collect(),
            metadata: None,
        }
    }

    /// A - B - C
    pub fn path3() -> GraphData {
        graph(&["A", "B", "C"], &[("A", "B"), ("B", "C")])
    }

    /// center connected to leaf_0..leaf_{n-1}
    pub fn star(n_leaves: usize) -> GraphData {
        let mut ids = vec!["center".to_string()];
        ids.extend((0..n_leaves).map(|i| format!("leaf_{}", i)));
        let ids_ref: Vec<&str> = ids.iter().map(|s| s.as_str()).collect();
        let edges: Vec<(&str, &str)> = ids_ref[1..].iter().map(|l| ("center", *l)).collect();
        graph(&ids_ref, &edges)
    }

    /// K_n over node_0..node_{n-1}
    pub fn complete(n: usize) -> GraphData {
        let ids: Vec<String> = (0..n).map(|i| format!("node_{}", i)).collect();
        let ids_ref: Vec<&str> = ids.iter().map(|s| s.as_str()).collect();
        let mut edges = Vec::new();
        for i in 0..n {
            for j in (i + 1)..n {
                edges.push((ids_ref[i], ids_ref[j]));
            }
        }
        graph(&ids_ref, &edges)
    }

    /// Chain node_0 - node_1 - ... - node_{n-1}
    pub fn chain(n: usize) -> GraphData {
        let ids: Vec<String> = (0..n).map(|i| format!("node_{}", i)).collect();
        let ids_ref: Vec<&str> = ids.iter().map(|s| s.as_str()).collect();
        let edges: Vec<(&str, &str)> = ids_ref.windows(2).map(|w| (w[0], w[1])).collect();
        graph(&ids_ref, &edges)
    }

    /// Two triangles with no edge between them
    pub fn two_triangles() -> GraphData {
        graph(
            &["a1", "a2", "a3", "b1", "b2", "b3"],
            &[
                ("a1", "a2"),
                ("a2", "a3"),
                ("a3", "a1"),
                ("b1", "b2"),
                ("b2", "b3"),
                ("b3", "b1"),
            ],
        )
    }

    /// Two K4 cliques joined by a single bridge edge a_0 - b_0
    pub fn two_cliques() -> GraphData {
        let a: Vec<String> = (0..4).map(|i| format!("a_{}", i)).collect();
        let b: Vec<String> = (0..4).map(|i| format!("b_{}", i)).collect();
        let ids: Vec<&str> = a.iter().chain(b.iter()).map(|s| s.as_str()).collect();
        let mut edges = Vec::new();
        for clique in [&ids[..4], &ids[4..]] {
            for i in 0..4 {
                for j in (i + 1)..4 {
                    edges.push((clique[i], clique[j]));
                }
            }
        }
        edges.push(("a_0", "b_0"));
        graph(&ids, &edges)
    }

    pub fn build(data: &GraphData) -> KnowledgeGraph {
        KnowledgeGraph::from_data(data).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::test_graphs::*;
    use super::*;
    use serde_json::json;

    // --- Input decoding ---

    #[test]
    fn test_graph_data_from_payload_json() {
        let value = json!({
            "nodes": [
                {"id": "c1", "label": "Sleep improves recall", "type": "claim",
                 "confidence": [0.7, 0.9], "metadata": {"author": "lab"}},
                {"id": "e1", "label": "RCT 2021", "type": "evidence",
                 "confidence": [0.8], "position": {"x": 10.0, "y": 20.0}}
            ],
            "edges": [
                {"id": "r1", "source": "e1", "target": "c1", "type": "supports",
                 "confidence": 0.85, "bidirectional": false}
            ]
        });
        let data: GraphData = serde_json::from_value(value).unwrap();
        assert_eq!(data.nodes.len(), 2);
        assert_eq!(data.nodes[0].node_type, NodeType::Claim);
        assert_eq!(data.nodes[1].position, Some(Position::new(10.0, 20.0)));
        assert_eq!(data.edges[0].edge_type, EdgeType::Supports);
        assert!((data.edges[0].weight() - 1.0).abs() < f64::EPSILON);
        assert!(data.metadata.is_none());
    }

    #[test]
    fn test_unknown_roles_and_null_metadata_decode() {
        let value = json!({
            "nodes": [
                {"id": "r", "label": "Root", "type": "root", "metadata": null},
                {"id": "d", "label": "Dimension", "type": "dimension"}
            ],
            "edges": [
                {"id": "s1", "source": "r", "target": "d", "type": "supportive",
                 "confidence": 0.5}
            ]
        });
        let data: GraphData = serde_json::from_value(value).unwrap();
        assert_eq!(data.nodes[0].node_type, NodeType::Other);
        assert_eq!(data.nodes[1].node_type, NodeType::Other);
        assert!(data.nodes[0].metadata.is_empty());
        assert_eq!(data.edges[0].edge_type, EdgeType::Other);

        // Roles never affect the analysis
        let g = KnowledgeGraph::from_data(&data).unwrap();
        assert_eq!(g.edge_count(), 1);
        assert_eq!(g.degree(g.get_index("r").unwrap()), 1);
    }

    #[test]
    fn test_type_display() {
        assert_eq!(NodeType::Evidence.to_string(), "evidence");
        assert_eq!(EdgeType::DerivesFrom.to_string(), "derives_from");
    }

    // --- KnowledgeGraph ---

    #[test]
    fn test_knowledge_graph_indices_follow_node_order() {
        let g = build(&path3());
        assert_eq!(g.node_count(), 3);
        assert_eq!(g.edge_count(), 2);
        assert_eq!(g.get_index("A").map(|i| i.index()), Some(0));
        assert_eq!(g.get_index("C").map(|i| i.index()), Some(2));
        assert_eq!(g.id(NodeIndex::new(1)), "B");
        assert!(g.get_index("missing").is_none());
    }

    #[test]
    fn test_knowledge_graph_rejects_dangling_edge() {
        let data = graph(&["A", "B"], &[("A", "B"), ("B", "ghost")]);
        let err = KnowledgeGraph::from_data(&data).unwrap_err();
        assert_eq!(
            err,
            EngineError::InvalidGraphReference {
                edge_id: "B-ghost".into(),
                node_id: "ghost".into()
            }
        );
    }

    #[test]
    fn test_knowledge_graph_rejects_duplicate_ids() {
        let data = graph(&["A", "A"], &[]);
        let err = KnowledgeGraph::from_data(&data).unwrap_err();
        assert_eq!(err, EngineError::DuplicateNodeId("A".into()));
    }

    #[test]
    fn test_self_loop_counts_twice_and_skips_adjacency() {
        let data = graph(&["A", "B"], &[("A", "A"), ("A", "B")]);
        let g = build(&data);
        assert_eq!(g.self_loop_count(), 1);
        assert_eq!(g.degree(NodeIndex::new(0)), 3);
        let adj = g.adjacency();
        assert_eq!(adj[0], vec![1]);
        assert_eq!(adj[1], vec![0]);
    }

    // --- Options ---

    #[test]
    fn test_layout_options_defaults() {
        let options = LayoutOptions::default();
        assert_eq!(options.iterations, 100);
        assert!((options.repulsion_strength - 1000.0).abs() < f64::EPSILON);
        assert!((options.attraction_strength - 0.1).abs() < f64::EPSILON);
        assert!(options.seed.is_none());
    }

    #[test]
    fn test_decode_options_merges_over_defaults() {
        let value = json!({"iterations": 25, "seed": 7});
        let options = decode_options(&LayoutOptions::default(), Some(&value)).unwrap();
        assert_eq!(options.iterations, 25);
        assert_eq!(options.seed, Some(7));
        assert!((options.repulsion_strength - 1000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_decode_options_missing_or_null_gives_defaults() {
        let options = decode_options(&CommunityOptions::default(), None).unwrap();
        assert_eq!(options.method, CommunityMethod::Components);
        let options =
            decode_options(&CommunityOptions::default(), Some(&serde_json::Value::Null)).unwrap();
        assert!((options.resolution - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_decode_options_rejects_invalid_values() {
        let defaults = LayoutOptions::default();
        let negative = json!({"repulsionStrength": -5.0});
        assert!(matches!(
            decode_options(&defaults, Some(&negative)),
            Err(EngineError::InvalidOptions(_))
        ));
        let wrong_type = json!({"iterations": "many"});
        assert!(matches!(
            decode_options(&defaults, Some(&wrong_type)),
            Err(EngineError::InvalidOptions(_))
        ));
        let not_object = json!([1, 2]);
        assert!(matches!(
            decode_options(&defaults, Some(&not_object)),
            Err(EngineError::InvalidOptions(_))
        ));
        let too_many = json!({"iterations": MAX_LAYOUT_ITERATIONS + 1});
        assert!(decode_options(&defaults, Some(&too_many)).is_err());
    }

    #[test]
    fn test_topology_options_ignore_unknown_keys() {
        let value = json!({"whatever": 3});
        assert!(decode_options(&TopologyOptions::default(), Some(&value)).is_ok());
    }

    #[test]
    fn test_community_method_from_json() {
        let value = json!({"method": "louvain", "resolution": 0.5});
        let options = decode_options(&CommunityOptions::default(), Some(&value)).unwrap();
        assert_eq!(options.method, CommunityMethod::Louvain);
        assert!((options.resolution - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_path_options_require_endpoints() {
        assert!(decode_options(&PathOptions::default(), None).is_err());
        let value = json!({"source": "A", "target": "C"});
        let options = decode_options(&PathOptions::default(), Some(&value)).unwrap();
        assert_eq!(options.source, "A");
    }

    #[test]
    fn test_topology_metrics_serializes_camel_case() {
        let metrics = TopologyMetrics {
            node_count: 3,
            edge_count: 2,
            is_connected: true,
            ..Default::default()
        };
        let value = serde_json::to_value(&metrics).unwrap();
        assert_eq!(value["nodeCount"], 3);
        assert_eq!(value["isConnected"], true);
        assert!(value.get("clusteringCoefficient").is_some());
        assert!(value.get("averagePathLength").is_some());
    }
}
