//! Topology analyzer.
//!
//! Global shape metrics of the undirected graph: density, components,
//! mean local clustering and mean shortest-path length.

use petgraph::graph::NodeIndex;
use rayon::prelude::*;
use std::collections::HashSet;
use tokio_util::sync::CancellationToken;

use super::components::connected_components;
use super::models::{KnowledgeGraph, TopologyMetrics, TopologyOptions};
use super::paths::bfs_distances;
use crate::error::{EngineError, Result};

/// Node count from which all-pairs BFS runs on the rayon pool.
const PARALLEL_THRESHOLD: usize = 200;

/// Compute the fixed-shape topology record.
pub fn analyze_topology(
    graph: &KnowledgeGraph,
    _options: &TopologyOptions,
    cancel: &CancellationToken,
) -> Result<TopologyMetrics> {
    let node_count = graph.node_count();
    let edge_count = graph.edge_count();
    let adj = graph.adjacency();

    let parts = connected_components(&adj);
    let clustering = average_clustering(graph, &adj);
    let average_path_length = average_path_length(&adj, cancel)?;

    let isolated_nodes = graph
        .graph()
        .node_indices()
        .filter(|&idx| graph.degree(idx) == 0)
        .count();

    Ok(TopologyMetrics {
        node_count,
        edge_count,
        density: density(node_count, edge_count),
        components: parts.count(),
        clustering_coefficient: clustering,
        average_path_length,
        is_connected: parts.count() == 1,
        largest_component_size: parts.largest_size(),
        isolated_nodes,
        self_loops: graph.self_loop_count(),
    })
}

/// `2E / (V(V-1))` for V > 1, else 0.
pub fn density(node_count: usize, edge_count: usize) -> f64 {
    if node_count < 2 {
        return 0.0;
    }
    2.0 * edge_count as f64 / (node_count as f64 * (node_count - 1) as f64)
}

/// Local clustering coefficient of one node, `None` when it has fewer
/// than two distinct neighbors.
pub fn local_clustering(graph: &KnowledgeGraph, adj: &[Vec<usize>], node: usize) -> Option<f64> {
    let mut seen = HashSet::new();
    let neighbors: Vec<usize> = adj[node]
        .iter()
        .copied()
        .filter(|&n| n != node && seen.insert(n))
        .collect();

    let k = neighbors.len();
    if k < 2 {
        return None;
    }

    let g = graph.graph();
    let mut links = 0usize;
    for i in 0..k {
        for j in (i + 1)..k {
            if g.contains_edge(NodeIndex::new(neighbors[i]), NodeIndex::new(neighbors[j])) {
                links += 1;
            }
        }
    }
    Some(links as f64 / (k * (k - 1) / 2) as f64)
}

/// Mean local clustering over nodes with at least two neighbors.
///
/// Nodes below that degree are left out of the average rather than
/// counted as zero.
pub fn average_clustering(graph: &KnowledgeGraph, adj: &[Vec<usize>]) -> f64 {
    let coefficients: Vec<f64> = (0..adj.len())
        .filter_map(|i| local_clustering(graph, adj, i))
        .collect();
    if coefficients.is_empty() {
        0.0
    } else {
        coefficients.iter().sum::<f64>() / coefficients.len() as f64
    }
}

/// Mean hop distance over all ordered pairs of distinct, mutually reachable nodes.
pub fn average_path_length(adj: &[Vec<usize>], cancel: &CancellationToken) -> Result<f64> {
    let n = adj.len();
    let per_source = |i: usize| -> (usize, usize) {
        if cancel.is_cancelled() {
            return (0, 0);
        }
        bfs_distances(adj, i)
            .into_iter()
            .enumerate()
            .filter(|(j, _)| *j != i)
            .filter_map(|(_, d)| d)
            .fold((0, 0), |(sum, count), d| (sum + d, count + 1))
    };

    let (sum, pairs) = if n >= PARALLEL_THRESHOLD {
        (0..n)
            .into_par_iter()
            .map(per_source)
            .reduce(|| (0, 0), |a, b| (a.0 + b.0, a.1 + b.1))
    } else {
        (0..n)
            .map(per_source)
            .fold((0, 0), |a, b| (a.0 + b.0, a.1 + b.1))
    };

    if cancel.is_cancelled() {
        return Err(EngineError::Cancelled);
    }
    Ok(if pairs == 0 {
        0.0
    } else {
        sum as f64 / pairs as f64
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::models::test_graphs::*;
    use crate::graph::models::GraphData;

    fn run(data: &GraphData) -> TopologyMetrics {
        analyze_topology(
            &build(data),
            &TopologyOptions::default(),
            &CancellationToken::new(),
        )
        .unwrap()
    }

    #[test]
    fn test_path_graph_scenario() {
        let t = run(&path3());
        assert_eq!(t.node_count, 3);
        assert_eq!(t.edge_count, 2);
        assert!((t.density - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(t.components, 1);
        assert!(t.is_connected);
        // pairs: AB=1 AC=2 BC=1, each counted both ways
        assert!((t.average_path_length - 4.0 / 3.0).abs() < 1e-12);
        // only B has two neighbors, and they are not linked
        assert_eq!(t.clustering_coefficient, 0.0);
    }

    #[test]
    fn test_density_edge_cases() {
        assert_eq!(density(1, 0), 0.0);
        assert_eq!(density(0, 0), 0.0);
        assert!((density(2, 1) - 1.0).abs() < f64::EPSILON);

        let t = run(&graph(&["solo"], &[]));
        assert_eq!(t.density, 0.0);
        let t = run(&graph(&["A", "B"], &[("A", "B")]));
        assert!((t.density - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_complete_graph_average_path_length_is_one() {
        for n in [2, 3, 6] {
            let t = run(&complete(n));
            assert!((t.average_path_length - 1.0).abs() < f64::EPSILON);
            assert!((t.clustering_coefficient - if n > 2 { 1.0 } else { 0.0 }).abs() < 1e-12);
        }
    }

    #[test]
    fn test_connected_iff_single_component() {
        for data in [path3(), two_triangles(), graph(&["A", "B"], &[]), complete(4)] {
            let t = run(&data);
            assert_eq!(t.is_connected, t.components == 1);
        }
        let t = run(&two_triangles());
        assert_eq!(t.components, 2);
        assert!(!t.is_connected);
        assert_eq!(t.largest_component_size, 3);
    }

    #[test]
    fn test_unreachable_pairs_not_penalized() {
        // Two disjoint triangles: every reachable pair is at distance 1
        let t = run(&two_triangles());
        assert!((t.average_path_length - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_clustering_excludes_low_degree_nodes() {
        // Triangle plus a pendant leaf on a1: a1 has 3 neighbors (1 link of 3),
        // a2/a3 have coefficient 1, the leaf is excluded
        let data = graph(
            &["a1", "a2", "a3", "leaf"],
            &[("a1", "a2"), ("a2", "a3"), ("a3", "a1"), ("a1", "leaf")],
        );
        let t = run(&data);
        let expected = (1.0 / 3.0 + 1.0 + 1.0) / 3.0;
        assert!((t.clustering_coefficient - expected).abs() < 1e-12);
    }

    #[test]
    fn test_star_center_clustering_zero() {
        let g = build(&star(5));
        let adj = g.adjacency();
        assert_eq!(local_clustering(&g, &adj, 0), Some(0.0));
        assert_eq!(local_clustering(&g, &adj, 1), None);
    }

    #[test]
    fn test_isolated_and_self_loops_counted() {
        let data = graph(&["A", "B", "C"], &[("A", "A"), ("A", "B")]);
        let t = run(&data);
        assert_eq!(t.isolated_nodes, 1);
        assert_eq!(t.self_loops, 1);
        assert_eq!(t.edge_count, 2);
    }

    #[test]
    fn test_empty_graph() {
        let t = run(&graph(&[], &[]));
        assert_eq!(t.node_count, 0);
        assert_eq!(t.components, 0);
        assert!(!t.is_connected);
        assert_eq!(t.average_path_length, 0.0);
    }

    #[test]
    fn test_parallel_path_length_on_large_ring() {
        // Ring of 300 nodes exercises the rayon branch
        let ids: Vec<String> = (0..300).map(|i| format!("n{}", i)).collect();
        let refs: Vec<&str> = ids.iter().map(|s| s.as_str()).collect();
        let mut edges: Vec<(&str, &str)> = refs.windows(2).map(|w| (w[0], w[1])).collect();
        edges.push((refs[299], refs[0]));
        let t = run(&graph(&refs, &edges));
        // Ring of even n: mean distance = n^2/4 / (n-1)
        let expected = (300.0 * 300.0 / 4.0) / 299.0;
        assert!((t.average_path_length - expected).abs() < 1e-9);
        assert!(t.is_connected);
    }
}
