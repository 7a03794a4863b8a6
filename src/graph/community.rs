//! Community detection.
//!
//! Two partitioning strategies share one modularity scorer:
//! - **components**: every connected component is one community
//! - **louvain**: greedy local moves that maximise modularity, which can
//!   split a component into several communities
//!
//! Modularity is Newman's `Q = Σ_c [ L_c/m − (d_c / 2m)² ]` where `L_c`
//! counts intra-community edges, `d_c` sums member degrees and `m` is the
//! total edge count.

use petgraph::graph::NodeIndex;
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;

use super::components::connected_components;
use super::models::{
    CommunityInfo, CommunityMethod, CommunityOptions, CommunityResult, GraphData, KnowledgeGraph,
};
use crate::error::{EngineError, Result};

/// Partition the graph and score the partition.
pub fn detect_communities(
    data: &GraphData,
    graph: &KnowledgeGraph,
    options: &CommunityOptions,
    cancel: &CancellationToken,
) -> Result<CommunityResult> {
    let n = graph.node_count();
    if n == 0 {
        return Ok(CommunityResult {
            method: options.method,
            ..Default::default()
        });
    }

    let assignment = match options.method {
        CommunityMethod::Components => connected_components(&graph.adjacency()).component_of,
        CommunityMethod::Louvain => {
            louvain(graph, options.resolution, options.max_iterations, cancel)?
        }
    };

    let community = renumber_by_size(&assignment);
    let modularity = modularity(graph, &community);
    let communities = build_communities(data, graph, &community);

    tracing::debug!(
        method = ?options.method,
        communities = communities.len(),
        modularity,
        "Communities detected"
    );

    let membership = community
        .iter()
        .enumerate()
        .map(|(i, &c)| (graph.id(NodeIndex::new(i)).to_string(), c))
        .collect();

    Ok(CommunityResult {
        community_count: communities.len(),
        communities,
        modularity,
        membership,
        method: options.method,
    })
}

/// Renumber arbitrary labels so that 0 is the largest community.
/// Ties keep the order of first appearance.
fn renumber_by_size(assignment: &[usize]) -> Vec<u32> {
    let mut first_seen: Vec<usize> = Vec::new();
    let mut sizes: HashMap<usize, usize> = HashMap::new();
    for &label in assignment {
        let size = sizes.entry(label).or_insert(0);
        if *size == 0 {
            first_seen.push(label);
        }
        *size += 1;
    }
    // stable sort keeps first-appearance order among equal sizes
    first_seen.sort_by_key(|label| std::cmp::Reverse(sizes[label]));
    let remap: HashMap<usize, u32> = first_seen
        .into_iter()
        .enumerate()
        .map(|(new_id, label)| (label, new_id as u32))
        .collect();
    assignment.iter().map(|label| remap[label]).collect()
}

fn build_communities(
    data: &GraphData,
    graph: &KnowledgeGraph,
    community: &[u32],
) -> Vec<CommunityInfo> {
    let count = community.iter().map(|&c| c as usize + 1).max().unwrap_or(0);
    let mut members: Vec<Vec<usize>> = vec![Vec::new(); count];
    for (i, &c) in community.iter().enumerate() {
        members[c as usize].push(i);
    }

    members
        .into_iter()
        .enumerate()
        .map(|(id, nodes)| {
            let hub = nodes
                .iter()
                .copied()
                .fold(None, |best: Option<usize>, i| match best {
                    Some(b) if graph.degree(NodeIndex::new(b)) >= graph.degree(NodeIndex::new(i)) => {
                        Some(b)
                    }
                    _ => Some(i),
                });
            let label = hub
                .and_then(|i| data.nodes.get(i))
                .map(|node| node.label.clone())
                .unwrap_or_default();
            CommunityInfo {
                id: id as u32,
                size: nodes.len(),
                nodes: nodes
                    .into_iter()
                    .map(|i| graph.id(NodeIndex::new(i)).to_string())
                    .collect(),
                label,
            }
        })
        .collect()
}

/// Newman modularity of a partition given per-node community ids.
pub fn modularity(graph: &KnowledgeGraph, community: &[u32]) -> f64 {
    let m = graph.edge_count() as f64;
    if m == 0.0 {
        return 0.0;
    }

    let mut internal: HashMap<u32, f64> = HashMap::new();
    let mut degree_sum: HashMap<u32, f64> = HashMap::new();

    for edge in graph.graph().raw_edges() {
        let cs = community[edge.source().index()];
        if cs == community[edge.target().index()] {
            *internal.entry(cs).or_default() += 1.0;
        }
    }
    for idx in graph.graph().node_indices() {
        *degree_sum.entry(community[idx.index()]).or_default() += graph.degree(idx) as f64;
    }

    degree_sum
        .iter()
        .map(|(c, &d)| {
            let l = internal.get(c).copied().unwrap_or(0.0);
            l / m - (d / (2.0 * m)).powi(2)
        })
        .sum()
}

/// Louvain local-move phase on the unweighted undirected graph.
///
/// Returns a raw community label per node index.
fn louvain(
    graph: &KnowledgeGraph,
    resolution: f64,
    max_iterations: usize,
    cancel: &CancellationToken,
) -> Result<Vec<usize>> {
    let n = graph.node_count();
    let adj = graph.adjacency();
    let strengths: Vec<f64> = graph
        .graph()
        .node_indices()
        .map(|idx| graph.degree(idx) as f64)
        .collect();
    let total_weight = graph.edge_count() as f64;

    let mut community: Vec<usize> = (0..n).collect();
    if total_weight == 0.0 {
        return Ok(community);
    }

    let mut comm_total_strength: Vec<f64> = strengths.clone();
    let m2 = 2.0 * total_weight;

    let mut improved = true;
    let mut iterations = 0;

    while improved && iterations < max_iterations {
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        improved = false;
        iterations += 1;

        for node in 0..n {
            let current = community[node];

            // Weight from this node to each neighboring community
            let mut comm_weights: HashMap<usize, f64> = HashMap::new();
            for &neighbor in &adj[node] {
                *comm_weights.entry(community[neighbor]).or_default() += 1.0;
            }

            let ki = strengths[node];
            let w_in_current = comm_weights.get(&current).copied().unwrap_or(0.0);
            let remove_cost = w_in_current / m2
                - resolution * ki * (comm_total_strength[current] - ki) / (m2 * m2);

            let mut best = current;
            let mut best_gain = 0.0;
            // Visit candidates in adjacency order so ties resolve deterministically
            for &neighbor in &adj[node] {
                let target = community[neighbor];
                if target == current {
                    continue;
                }
                let insert_cost = comm_weights[&target] / m2
                    - resolution * ki * comm_total_strength[target] / (m2 * m2);
                let gain = insert_cost - remove_cost;
                if gain > best_gain {
                    best_gain = gain;
                    best = target;
                }
            }

            if best != current {
                comm_total_strength[current] -= ki;
                comm_total_strength[best] += ki;
                community[node] = best;
                improved = true;
            }
        }
    }

    tracing::debug!(sweeps = iterations, "Louvain local moves converged");
    Ok(community)
}

// ============================================================================
// Tests
// ============================================================================
