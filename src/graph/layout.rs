//! Force-directed layout optimizer.
//!
//! Classic spring-electrical simulation on an 800×600 canvas:
//! inverse-square repulsion between every node pair, linear attraction
//! along edges, a fixed step of `force × 0.01` and a clamp to the
//! `[50, 750] × [50, 550]` box after every step. No convergence check:
//! the full iteration count always runs unless the request is cancelled.
//!
//! Exact repulsion is O(V²) per iteration. Above `barnes_hut_threshold`
//! nodes a [`QuadTree`] approximates it in O(V log V). Forces of one
//! iteration are summed in parallel; iterations stay sequential because
//! each one reads the positions produced by the previous one.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use tokio_util::sync::CancellationToken;

use super::models::{GraphData, KnowledgeGraph, LayoutOptions, LayoutResult, Position};
use super::quadtree::{inverse_square, QuadTree};
use crate::error::{EngineError, Result};

pub const CANVAS_WIDTH: f64 = 800.0;
pub const CANVAS_HEIGHT: f64 = 600.0;
pub const MIN_X: f64 = 50.0;
pub const MAX_X: f64 = 750.0;
pub const MIN_Y: f64 = 50.0;
pub const MAX_Y: f64 = 550.0;

/// Displacement per unit of force.
const STEP: f64 = 0.01;
/// Progress is reported every this many iterations.
const PROGRESS_INTERVAL: usize = 10;
/// Node count from which per-node force sums run on the rayon pool.
const PARALLEL_THRESHOLD: usize = 256;

/// Run the simulation and return a position for every node.
///
/// `progress` receives `i / iterations` every [`PROGRESS_INTERVAL`]
/// iterations, in order, before the function returns.
pub fn optimize_layout(
    data: &GraphData,
    graph: &KnowledgeGraph,
    options: &LayoutOptions,
    progress: &mut dyn FnMut(f64),
    cancel: &CancellationToken,
) -> Result<LayoutResult> {
    let n = graph.node_count();
    let use_barnes_hut = n > options.barnes_hut_threshold;
    let edges: Vec<(usize, usize)> = graph
        .graph()
        .raw_edges()
        .iter()
        .map(|e| (e.source().index(), e.target().index()))
        .filter(|(s, t)| s != t)
        .collect();

    let mut positions = initial_positions(data, options.seed);

    for i in 0..options.iterations {
        if cancel.is_cancelled() {
            tracing::debug!(iteration = i, "Layout cancelled");
            return Err(EngineError::Cancelled);
        }
        if i % PROGRESS_INTERVAL == 0 {
            progress(i as f64 / options.iterations as f64);
        }

        let mut forces = if use_barnes_hut {
            barnes_hut_repulsion(&positions, options.repulsion_strength, options.theta)
        } else {
            exact_repulsion(&positions, options.repulsion_strength)
        };
        apply_attraction(&positions, &edges, options.attraction_strength, &mut forces);

        for (p, (fx, fy)) in positions.iter_mut().zip(forces) {
            *p = step(*p, fx, fy);
        }
    }

    tracing::debug!(
        nodes = n,
        iterations = options.iterations,
        barnes_hut = use_barnes_hut,
        "Layout finished"
    );

    Ok(LayoutResult {
        positions: positions
            .into_iter()
            .enumerate()
            .map(|(i, p)| {
                (
                    graph.id(petgraph::graph::NodeIndex::new(i)).to_string(),
                    p,
                )
            })
            .collect(),
        iterations: options.iterations,
        used_barnes_hut: use_barnes_hut,
    })
}

/// Existing node positions, or a random point on the canvas, clamped to bounds.
fn initial_positions(data: &GraphData, seed: Option<u64>) -> Vec<Position> {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    data.nodes
        .iter()
        .map(|node| {
            let p = node.position.unwrap_or_else(|| {
                Position::new(
                    rng.gen_range(0.0..CANVAS_WIDTH),
                    rng.gen_range(0.0..CANVAS_HEIGHT),
                )
            });
            clamp(p)
        })
        .collect()
}

fn clamp(p: Position) -> Position {
    let x = if p.x.is_finite() { p.x } else { CANVAS_WIDTH / 2.0 };
    let y = if p.y.is_finite() { p.y } else { CANVAS_HEIGHT / 2.0 };
    Position::new(x.clamp(MIN_X, MAX_X), y.clamp(MIN_Y, MAX_Y))
}

/// Move by `force × STEP` and clamp. A non-finite displacement leaves the
/// coordinate where it was.
fn step(p: Position, fx: f64, fy: f64) -> Position {
    let x = p.x + fx * STEP;
    let y = p.y + fy * STEP;
    clamp(Position::new(
        if x.is_finite() { x } else { p.x },
        if y.is_finite() { y } else { p.y },
    ))
}

/// Exact inverse-square repulsion; coincident pairs are skipped.
fn exact_repulsion(positions: &[Position], strength: f64) -> Vec<(f64, f64)> {
    let force_on = |i: usize| -> (f64, f64) {
        let p = positions[i];
        let (mut fx, mut fy) = (0.0, 0.0);
        for (j, q) in positions.iter().enumerate() {
            if i == j {
                continue;
            }
            let (dx, dy) = (p.x - q.x, p.y - q.y);
            let dist2 = dx * dx + dy * dy;
            if dist2 > 0.0 {
                let (ax, ay) = inverse_square(dx, dy, dist2, strength);
                fx += ax;
                fy += ay;
            }
        }
        (fx, fy)
    };

    if positions.len() >= PARALLEL_THRESHOLD {
        (0..positions.len()).into_par_iter().map(force_on).collect()
    } else {
        (0..positions.len()).map(force_on).collect()
    }
}

fn barnes_hut_repulsion(positions: &[Position], strength: f64, theta: f64) -> Vec<(f64, f64)> {
    let tree = QuadTree::build(positions);
    (0..positions.len())
        .into_par_iter()
        .map(|i| tree.repulsion_on(i, strength, theta))
        .collect()
}

/// Spring pull of `strength × distance` along each edge, on both endpoints.
fn apply_attraction(
    positions: &[Position],
    edges: &[(usize, usize)],
    strength: f64,
    forces: &mut [(f64, f64)],
) {
    for &(s, t) in edges {
        let (ps, pt) = (positions[s], positions[t]);
        // strength × distance × unit vector simplifies to strength × delta
        let fx = strength * (pt.x - ps.x);
        let fy = strength * (pt.y - ps.y);
        forces[s].0 += fx;
        forces[s].1 += fy;
        forces[t].0 -= fx;
        forces[t].1 -= fy;
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::models::test_graphs::*;

    fn run(data: &GraphData, options: &LayoutOptions) -> (LayoutResult, Vec<f64>) {
        let g = build(data);
        let mut events = Vec::new();
        let result = optimize_layout(
            data,
            &g,
            options,
            &mut |p: f64| events.push(p),
            &CancellationToken::new(),
        )
        .unwrap();
        (result, events)
    }

    fn seeded(iterations: usize) -> LayoutOptions {
        LayoutOptions {
            iterations,
            seed: Some(42),
            ..Default::default()
        }
    }

    fn assert_in_bounds(result: &LayoutResult) {
        for (id, p) in &result.positions {
            assert!(
                (MIN_X..=MAX_X).contains(&p.x) && (MIN_Y..=MAX_Y).contains(&p.y),
                "{} out of bounds at ({}, {})",
                id,
                p.x,
                p.y
            );
        }
    }

    #[test]
    fn test_positions_for_every_node_in_bounds() {
        for iterations in [0, 1, 10, 100] {
            let (result, _) = run(&two_cliques(), &seeded(iterations));
            assert_eq!(result.positions.len(), 8);
            assert_in_bounds(&result);
        }
    }

    #[test]
    fn test_out_of_bounds_start_is_clamped_with_zero_iterations() {
        let mut data = path3();
        data.nodes[0].position = Some(Position::new(-500.0, 9000.0));
        let (result, events) = run(&data, &seeded(0));
        assert_eq!(result.positions["A"], Position::new(MIN_X, MAX_Y));
        assert!(events.is_empty());
    }

    #[test]
    fn test_existing_positions_are_used() {
        let mut data = graph(&["A"], &[]);
        data.nodes[0].position = Some(Position::new(123.0, 321.0));
        let (result, _) = run(&data, &seeded(0));
        assert_eq!(result.positions["A"], Position::new(123.0, 321.0));
    }

    #[test]
    fn test_progress_every_ten_iterations() {
        let (_, events) = run(&path3(), &seeded(25));
        assert_eq!(events, vec![0.0, 0.4, 0.8]);
        let (_, events) = run(&path3(), &seeded(100));
        assert_eq!(events.len(), 10);
        assert!(events.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_connected_nodes_pull_together() {
        let mut data = graph(&["A", "B"], &[("A", "B")]);
        data.nodes[0].position = Some(Position::new(100.0, 300.0));
        data.nodes[1].position = Some(Position::new(700.0, 300.0));
        let (result, _) = run(&data, &seeded(100));
        let dx = result.positions["B"].x - result.positions["A"].x;
        assert!(dx < 600.0 && dx > 0.0, "distance after layout: {}", dx);
    }

    #[test]
    fn test_unconnected_nodes_push_apart() {
        let mut data = graph(&["A", "B"], &[]);
        data.nodes[0].position = Some(Position::new(390.0, 300.0));
        data.nodes[1].position = Some(Position::new(410.0, 300.0));
        let (result, _) = run(&data, &seeded(50));
        let dx = result.positions["B"].x - result.positions["A"].x;
        assert!(dx > 20.0);
    }

    #[test]
    fn test_coincident_nodes_stay_finite() {
        let mut data = graph(&["A", "B", "C"], &[]);
        for node in &mut data.nodes {
            node.position = Some(Position::new(200.0, 200.0));
        }
        let (result, _) = run(&data, &seeded(20));
        for p in result.positions.values() {
            assert_eq!(*p, Position::new(200.0, 200.0));
        }
    }

    #[test]
    fn test_seed_makes_layout_reproducible() {
        let (a, _) = run(&two_cliques(), &seeded(30));
        let (b, _) = run(&two_cliques(), &seeded(30));
        assert_eq!(a.positions, b.positions);
    }

    #[test]
    fn test_barnes_hut_path_above_threshold() {
        let options = LayoutOptions {
            barnes_hut_threshold: 4,
            ..seeded(20)
        };
        let (result, _) = run(&two_cliques(), &options);
        assert!(result.used_barnes_hut);
        assert_in_bounds(&result);
        let (result, _) = run(&two_cliques(), &seeded(20));
        assert!(!result.used_barnes_hut);
    }

    #[test]
    fn test_huge_strengths_stay_in_bounds() {
        let options = LayoutOptions {
            repulsion_strength: 1e300,
            attraction_strength: 1e300,
            ..seeded(5)
        };
        let (result, _) = run(&two_cliques(), &options);
        assert_in_bounds(&result);
    }

    #[test]
    fn test_cancelled_layout_stops() {
        let data = chain(4);
        let g = build(&data);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = optimize_layout(&data, &g, &seeded(10), &mut |_: f64| {}, &cancel).unwrap_err();
        assert_eq!(err, EngineError::Cancelled);
    }
}
