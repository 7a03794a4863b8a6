//! Shortest-path engine.
//!
//! Every edge counts as one hop and is traversed in both directions,
//! whatever its semantic type. All queries are plain breadth-first searches
//! over an adjacency list, O(V + E) per source.

use std::collections::VecDeque;

use super::models::{DistanceMap, KnowledgeGraph, PathOptions, PathResult};

/// Hop distance from `start` to every node index, `None` when unreachable.
pub fn bfs_distances(adj: &[Vec<usize>], start: usize) -> Vec<Option<usize>> {
    let mut dist = vec![None; adj.len()];
    if start >= adj.len() {
        return dist;
    }
    dist[start] = Some(0);
    let mut queue = VecDeque::new();
    queue.push_back(start);

    while let Some(current) = queue.pop_front() {
        let next = dist[current].map(|d| d + 1);
        for &neighbor in &adj[current] {
            if dist[neighbor].is_none() {
                dist[neighbor] = next;
                queue.push_back(neighbor);
            }
        }
    }
    dist
}

/// Minimum hop count from `start_id` to every reachable node.
///
/// The start node maps to 0. Unreachable nodes are absent. An unknown
/// start id yields an empty map.
pub fn shortest_path_lengths(graph: &KnowledgeGraph, start_id: &str) -> DistanceMap {
    let Some(start) = graph.get_index(start_id) else {
        return DistanceMap::new();
    };
    let adj = graph.adjacency();
    bfs_distances(&adj, start.index())
        .into_iter()
        .enumerate()
        .filter_map(|(i, d)| {
            d.map(|d| (graph.id(petgraph::graph::NodeIndex::new(i)).to_string(), d))
        })
        .collect()
}

/// One shortest path from `source_id` to `target_id` as a list of node ids.
///
/// Ties are broken by neighbor discovery order. Returns `None` when either
/// id is unknown or the target is unreachable.
pub fn shortest_path(
    graph: &KnowledgeGraph,
    source_id: &str,
    target_id: &str,
) -> Option<Vec<String>> {
    let source = graph.get_index(source_id)?.index();
    let target = graph.get_index(target_id)?.index();
    let adj = graph.adjacency();

    let mut parent: Vec<Option<usize>> = vec![None; adj.len()];
    let mut visited = vec![false; adj.len()];
    visited[source] = true;
    let mut queue = VecDeque::new();
    queue.push_back(source);

    while let Some(current) = queue.pop_front() {
        if current == target {
            break;
        }
        for &neighbor in &adj[current] {
            if !visited[neighbor] {
                visited[neighbor] = true;
                parent[neighbor] = Some(current);
                queue.push_back(neighbor);
            }
        }
    }

    if !visited[target] {
        return None;
    }

    let mut path = vec![target];
    let mut cursor = target;
    while let Some(p) = parent[cursor] {
        path.push(p);
        cursor = p;
    }
    path.reverse();
    Some(
        path.into_iter()
            .map(|i| graph.id(petgraph::graph::NodeIndex::new(i)).to_string())
            .collect(),
    )
}

/// Answer a `FIND_SHORTEST_PATH` request.
pub fn find_path(graph: &KnowledgeGraph, options: &PathOptions) -> PathResult {
    let path = shortest_path(graph, &options.source, &options.target);
    PathResult {
        source: options.source.clone(),
        target: options.target.clone(),
        length: path.as_ref().map(|p| p.len() - 1),
        path,
    }
}
