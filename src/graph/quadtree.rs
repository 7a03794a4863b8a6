//! Barnes-Hut quad-tree for approximate inverse-square repulsion.
//!
//! Cells are stored in a flat arena. A cell far enough from the body
//! (`size / distance < theta`) is treated as one mass at its center of mass;
//! closer cells are opened. The cell containing the body itself is always
//! opened, so a body never repels itself.

use super::models::Position;

/// Below this cell size nodes stop subdividing and keep their bodies in a bucket.
const MAX_DEPTH: usize = 24;

#[derive(Debug, Clone)]
struct Cell {
    cx: f64,
    cy: f64,
    half: f64,
    mass: f64,
    sum_x: f64,
    sum_y: f64,
    children: Option<[usize; 4]>,
    bodies: Vec<usize>,
}

impl Cell {
    fn new(cx: f64, cy: f64, half: f64) -> Self {
        Self {
            cx,
            cy,
            half,
            mass: 0.0,
            sum_x: 0.0,
            sum_y: 0.0,
            children: None,
            bodies: Vec::new(),
        }
    }

    fn contains(&self, p: Position) -> bool {
        (p.x - self.cx).abs() <= self.half && (p.y - self.cy).abs() <= self.half
    }

    fn quadrant(&self, p: Position) -> usize {
        let right = (p.x >= self.cx) as usize;
        let bottom = (p.y >= self.cy) as usize;
        right + 2 * bottom
    }

    fn add(&mut self, p: Position) {
        self.mass += 1.0;
        self.sum_x += p.x;
        self.sum_y += p.y;
    }
}

/// Quad-tree over a fixed slice of points.
#[derive(Debug)]
pub struct QuadTree<'a> {
    cells: Vec<Cell>,
    points: &'a [Position],
}

impl<'a> QuadTree<'a> {
    /// Build the tree over all points.
    pub fn build(points: &'a [Position]) -> Self {
        let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
        let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
        for p in points {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        let root = if points.is_empty() {
            Cell::new(0.0, 0.0, 1.0)
        } else {
            let half = ((max_x - min_x).max(max_y - min_y) / 2.0).max(1.0) * 1.0001;
            Cell::new((min_x + max_x) / 2.0, (min_y + max_y) / 2.0, half)
        };

        let mut tree = Self {
            cells: vec![root],
            points,
        };
        for body in 0..points.len() {
            tree.insert(body);
        }
        tree
    }

    fn insert(&mut self, body: usize) {
        let p = self.points[body];
        let mut cell = 0;
        let mut depth = 0;
        loop {
            self.cells[cell].add(p);
            if let Some(children) = self.cells[cell].children {
                cell = children[self.cells[cell].quadrant(p)];
                depth += 1;
                continue;
            }
            if self.cells[cell].bodies.is_empty() || depth >= MAX_DEPTH {
                self.cells[cell].bodies.push(body);
                return;
            }

            let children = self.subdivide(cell);
            for existing in std::mem::take(&mut self.cells[cell].bodies) {
                let q = self.points[existing];
                let child = children[self.cells[cell].quadrant(q)];
                self.cells[child].add(q);
                self.cells[child].bodies.push(existing);
            }
            cell = children[self.cells[cell].quadrant(p)];
            depth += 1;
        }
    }

    fn subdivide(&mut self, cell: usize) -> [usize; 4] {
        let (cx, cy, half) = {
            let c = &self.cells[cell];
            (c.cx, c.cy, c.half / 2.0)
        };
        let base = self.cells.len();
        // quadrant order: top-left, top-right, bottom-left, bottom-right
        self.cells.push(Cell::new(cx - half, cy - half, half));
        self.cells.push(Cell::new(cx + half, cy - half, half));
        self.cells.push(Cell::new(cx - half, cy + half, half));
        self.cells.push(Cell::new(cx + half, cy + half, half));
        let children = [base, base + 1, base + 2, base + 3];
        self.cells[cell].children = Some(children);
        children
    }

    /// Repulsive force on `body` from every other point.
    pub fn repulsion_on(&self, body: usize, strength: f64, theta: f64) -> (f64, f64) {
        let p = self.points[body];
        let (mut fx, mut fy) = (0.0, 0.0);
        let mut stack = vec![0usize];

        while let Some(idx) = stack.pop() {
            let cell = &self.cells[idx];
            if cell.mass == 0.0 {
                continue;
            }
            match cell.children {
                Some(children) => {
                    let dx = p.x - cell.sum_x / cell.mass;
                    let dy = p.y - cell.sum_y / cell.mass;
                    let dist2 = dx * dx + dy * dy;
                    let size = cell.half * 2.0;
                    if !cell.contains(p) && dist2 > 0.0 && size * size < theta * theta * dist2 {
                        let (ax, ay) = inverse_square(dx, dy, dist2, strength * cell.mass);
                        fx += ax;
                        fy += ay;
                    } else {
                        stack.extend_from_slice(&children);
                    }
                }
                None => {
                    for &other in &cell.bodies {
                        if other == body {
                            continue;
                        }
                        let q = self.points[other];
                        let (dx, dy) = (p.x - q.x, p.y - q.y);
                        let dist2 = dx * dx + dy * dy;
                        if dist2 > 0.0 {
                            let (ax, ay) = inverse_square(dx, dy, dist2, strength);
                            fx += ax;
                            fy += ay;
                        }
                    }
                }
            }
        }
        (fx, fy)
    }
}

/// `strength / d²` along the unit vector (dx, dy) / d.
pub fn inverse_square(dx: f64, dy: f64, dist2: f64, strength: f64) -> (f64, f64) {
    let dist = dist2.sqrt();
    let magnitude = strength / dist2;
    (dx / dist * magnitude, dy / dist * magnitude)
}
