//! Centrality calculator.
//!
//! - **Degree**: incident edge count, not normalized
//! - **Betweenness**: exact Brandes via `rustworkx_core`, or a sampled
//!   Brandes pass over evenly strided sources for large graphs
//! - **Closeness**: inverse mean BFS distance to reachable nodes
//!
//! Closeness and sampled betweenness fan out over rayon; the scores of one
//! request never depend on another request.

use petgraph::graph::NodeIndex;
use rayon::prelude::*;
use std::collections::{HashMap, VecDeque};
use tokio_util::sync::CancellationToken;

use super::models::{CentralityOptions, CentralityResult, KnowledgeGraph};
use super::paths::bfs_distances;
use crate::error::{EngineError, Result};

/// Compute degree, betweenness and closeness for every node.
pub fn calculate_centrality(
    graph: &KnowledgeGraph,
    options: &CentralityOptions,
    cancel: &CancellationToken,
) -> Result<CentralityResult> {
    let n = graph.node_count();
    if n == 0 {
        return Ok(CentralityResult::default());
    }
    let adj = graph.adjacency();

    let degree = degree_centrality(graph);
    let (betweenness, approximate) = betweenness_centrality(graph, &adj, options, cancel)?;
    let closeness = closeness_centrality(graph, &adj, options.parallel_threshold, cancel)?;

    tracing::debug!(
        nodes = n,
        edges = graph.edge_count(),
        approximate,
        "Centrality computed"
    );

    Ok(CentralityResult {
        degree,
        betweenness,
        closeness,
        betweenness_approximate: approximate,
    })
}

/// Incident edge count per node.
pub fn degree_centrality(graph: &KnowledgeGraph) -> HashMap<String, f64> {
    graph
        .graph()
        .node_indices()
        .map(|idx| (graph.id(idx).to_string(), graph.degree(idx) as f64))
        .collect()
}

/// Betweenness normalized to [0, 1]. Returns the scores and whether they
/// were estimated from a subset of sources.
pub fn betweenness_centrality(
    graph: &KnowledgeGraph,
    adj: &[Vec<usize>],
    options: &CentralityOptions,
    cancel: &CancellationToken,
) -> Result<(HashMap<String, f64>, bool)> {
    let n = graph.node_count();
    let sources = match options.sample_sources {
        Some(k) => k.min(n),
        None if n > options.sample_threshold => options.sample_threshold.max(1),
        None => n,
    };

    let (scores, approximate) = if sources < n {
        (sampled_betweenness(adj, sources, cancel)?, true)
    } else {
        let scores = rustworkx_core::centrality::betweenness_centrality(
            graph.graph(),
            false, // include_endpoints
            true,  // normalized
            options.parallel_threshold,
        );
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        (scores.into_iter().map(|s| s.unwrap_or(0.0)).collect(), false)
    };

    Ok((index_scores(graph, &scores), approximate))
}

/// Brandes accumulation from `k` evenly strided sources, rescaled by n/k.
///
/// With `k == n` this is exact betweenness on the undirected graph,
/// normalized by `(n-1)(n-2)` over ordered pairs.
pub(crate) fn sampled_betweenness(
    adj: &[Vec<usize>],
    k: usize,
    cancel: &CancellationToken,
) -> Result<Vec<f64>> {
    let n = adj.len();
    if n <= 2 || k == 0 {
        return Ok(vec![0.0; n]);
    }
    let sources: Vec<usize> = (0..k).map(|i| i * n / k).collect();

    let totals = sources
        .par_iter()
        .fold(
            || vec![0.0f64; n],
            |mut acc, &s| {
                if !cancel.is_cancelled() {
                    for (a, d) in acc.iter_mut().zip(brandes_dependencies(adj, s)) {
                        *a += d;
                    }
                }
                acc
            },
        )
        .reduce(
            || vec![0.0f64; n],
            |mut a, b| {
                for (x, y) in a.iter_mut().zip(b) {
                    *x += y;
                }
                a
            },
        );

    if cancel.is_cancelled() {
        return Err(EngineError::Cancelled);
    }

    let scale = (n as f64 / k as f64) / ((n - 1) * (n - 2)) as f64;
    Ok(totals.into_iter().map(|v| v * scale).collect())
}

/// Single-source dependency accumulation (Brandes 2001) on an unweighted graph.
fn brandes_dependencies(adj: &[Vec<usize>], s: usize) -> Vec<f64> {
    let n = adj.len();
    let mut stack: Vec<usize> = Vec::with_capacity(n);
    let mut predecessors: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut sigma = vec![0.0f64; n];
    let mut dist = vec![-1i64; n];
    let mut delta = vec![0.0f64; n];

    sigma[s] = 1.0;
    dist[s] = 0;
    let mut queue = VecDeque::new();
    queue.push_back(s);

    while let Some(v) = queue.pop_front() {
        stack.push(v);
        for &w in &adj[v] {
            if dist[w] < 0 {
                dist[w] = dist[v] + 1;
                queue.push_back(w);
            }
            if dist[w] == dist[v] + 1 {
                sigma[w] += sigma[v];
                predecessors[w].push(v);
            }
        }
    }

    while let Some(w) = stack.pop() {
        for &v in &predecessors[w] {
            delta[v] += sigma[v] / sigma[w] * (1.0 + delta[w]);
        }
    }
    delta[s] = 0.0;
    delta
}

/// `1 / mean distance` to every reachable node, 0 for isolated nodes.
pub fn closeness_centrality(
    graph: &KnowledgeGraph,
    adj: &[Vec<usize>],
    parallel_threshold: usize,
    cancel: &CancellationToken,
) -> Result<HashMap<String, f64>> {
    let n = adj.len();
    let score = |i: usize| -> f64 {
        if cancel.is_cancelled() {
            return 0.0;
        }
        let (sum, reachable) = bfs_distances(adj, i)
            .into_iter()
            .enumerate()
            .filter(|(j, _)| *j != i)
            .filter_map(|(_, d)| d)
            .fold((0usize, 0usize), |(sum, count), d| (sum + d, count + 1));
        if sum == 0 {
            0.0
        } else {
            reachable as f64 / sum as f64
        }
    };

    let scores: Vec<f64> = if n >= parallel_threshold {
        (0..n).into_par_iter().map(score).collect()
    } else {
        (0..n).map(score).collect()
    };

    if cancel.is_cancelled() {
        return Err(EngineError::Cancelled);
    }
    Ok(index_scores(graph, &scores))
}

fn index_scores(graph: &KnowledgeGraph, scores: &[f64]) -> HashMap<String, f64> {
    scores
        .iter()
        .enumerate()
        .map(|(i, &s)| (graph.id(NodeIndex::new(i)).to_string(), s))
        .collect()
}

// ============================================================================
// Tests
// ============================================================================
