//! Icosahedron wireframe geometry
//!
//! Subdivides the 20 faces of a regular icosahedron into `(detail + 1)^2`
//! triangles each and projects every vertex onto a sphere. Vertices shared
//! between faces are merged by their integer barycentric weights over the
//! twelve base corners, so the merge is exact.

use std::collections::{BTreeSet, HashMap};

/// Viewport-derived mesh size
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshSizing {
    pub radius: f32,
    pub detail: u32,
}

impl MeshSizing {
    /// `radius = min(w, h) / 200`, `detail = floor(radius * 8)`
    pub fn from_viewport(width: f32, height: f32) -> Self {
        let shortest = width.min(height);
        let radius = if shortest.is_finite() && shortest > 0.0 {
            shortest / 200.0
        } else {
            0.0
        };
        let detail = (radius * 8.0).floor() as u32;
        Self { radius, detail }
    }
}

/// Wireframe mesh ready for upload as a line list
#[derive(Debug, Clone)]
pub struct MeshGeometry {
    pub sizing: MeshSizing,
    pub positions: Vec<[f32; 3]>,
    /// Pairs of indices into `positions`, one pair per unique edge
    pub edges: Vec<u32>,
    pub triangle_count: usize,
}

impl MeshGeometry {
    pub fn edge_count(&self) -> usize {
        self.edges.len() / 2
    }
}

const BASE_FACES: [[u8; 3]; 20] = [
    [0, 11, 5],
    [0, 5, 1],
    [0, 1, 7],
    [0, 7, 10],
    [0, 10, 11],
    [1, 5, 9],
    [5, 11, 4],
    [11, 10, 2],
    [10, 7, 6],
    [7, 1, 8],
    [3, 9, 4],
    [3, 4, 2],
    [3, 2, 6],
    [3, 6, 8],
    [3, 8, 9],
    [4, 9, 5],
    [2, 4, 11],
    [6, 2, 10],
    [8, 6, 7],
    [9, 8, 1],
];

fn base_corners() -> [[f32; 3]; 12] {
    let t = (1.0 + 5.0_f32.sqrt()) / 2.0;
    [
        [-1.0, t, 0.0],
        [1.0, t, 0.0],
        [-1.0, -t, 0.0],
        [1.0, -t, 0.0],
        [0.0, -1.0, t],
        [0.0, 1.0, t],
        [0.0, -1.0, -t],
        [0.0, 1.0, -t],
        [t, 0.0, -1.0],
        [t, 0.0, 1.0],
        [-t, 0.0, -1.0],
        [-t, 0.0, 1.0],
    ]
}

/// Canonical identity of a subdivision vertex: non-zero (corner, weight)
/// pairs sorted by corner.
type VertexKey = [(u8, u32); 3];

fn vertex_key(weights: [(u8, u32); 3]) -> VertexKey {
    let mut key = weights;
    for entry in key.iter_mut() {
        if entry.1 == 0 {
            *entry = (u8::MAX, 0);
        }
    }
    key.sort_unstable();
    key
}

struct MeshBuilder {
    corners: [[f32; 3]; 12],
    steps: u32,
    radius: f32,
    lookup: HashMap<VertexKey, u32>,
    positions: Vec<[f32; 3]>,
    edges: BTreeSet<(u32, u32)>,
    triangle_count: usize,
}

impl MeshBuilder {
    fn vertex(&mut self, weights: [(u8, u32); 3]) -> u32 {
        let key = vertex_key(weights);
        if let Some(&index) = self.lookup.get(&key) {
            return index;
        }

        let mut p = [0.0f32; 3];
        for &(corner, weight) in &weights {
            let c = self.corners[corner as usize];
            let w = weight as f32 / self.steps as f32;
            p[0] += c[0] * w;
            p[1] += c[1] * w;
            p[2] += c[2] * w;
        }
        let len = (p[0] * p[0] + p[1] * p[1] + p[2] * p[2]).sqrt();
        let scale = self.radius / len;
        let index = self.positions.len() as u32;
        self.positions.push([p[0] * scale, p[1] * scale, p[2] * scale]);
        self.lookup.insert(key, index);
        index
    }

    fn triangle(&mut self, a: u32, b: u32, c: u32) {
        self.triangle_count += 1;
        for (x, y) in [(a, b), (b, c), (c, a)] {
            self.edges.insert((x.min(y), x.max(y)));
        }
    }

    /// Grid point `(i, j)` of face `abc` has weights
    /// `a: n - i - j`, `b: j`, `c: i`.
    fn subdivide_face(&mut self, [a, b, c]: [u8; 3]) {
        let n = self.steps;
        let mut grid: Vec<Vec<u32>> = Vec::with_capacity(n as usize + 1);
        for i in 0..=n {
            let row = (0..=n - i)
                .map(|j| self.vertex([(a, n - i - j), (b, j), (c, i)]))
                .collect();
            grid.push(row);
        }

        for i in 0..n as usize {
            let span = 2 * (n as usize - i);
            for j in 0..span - 1 {
                let k = j / 2;
                if j % 2 == 0 {
                    self.triangle(grid[i][k + 1], grid[i + 1][k], grid[i][k]);
                } else {
                    self.triangle(grid[i][k + 1], grid[i + 1][k + 1], grid[i + 1][k]);
                }
            }
        }
    }
}

/// Build the subdivided icosahedron for `sizing`
pub fn build_icosahedron(sizing: MeshSizing) -> MeshGeometry {
    let steps = sizing.detail + 1;
    let mut builder = MeshBuilder {
        corners: base_corners(),
        steps,
        radius: sizing.radius,
        lookup: HashMap::new(),
        positions: Vec::with_capacity(10 * (steps * steps) as usize + 2),
        edges: BTreeSet::new(),
        triangle_count: 0,
    };

    for face in BASE_FACES {
        builder.subdivide_face(face);
    }

    let edges = builder
        .edges
        .iter()
        .flat_map(|&(a, b)| [a, b])
        .collect::<Vec<_>>();

    log::debug!(
        "Built icosahedron r={:.2} detail={} ({} vertices, {} edges)",
        sizing.radius,
        sizing.detail,
        builder.positions.len(),
        edges.len() / 2
    );

    MeshGeometry {
        sizing,
        positions: builder.positions,
        edges,
        triangle_count: builder.triangle_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sizing_follows_shortest_side() {
        let sizing = MeshSizing::from_viewport(1920.0, 1080.0);
        assert!((sizing.radius - 5.4).abs() < 1e-5);
        assert_eq!(sizing.detail, 43);

        let sizing = MeshSizing::from_viewport(600.0, 1000.0);
        assert!((sizing.radius - 3.0).abs() < 1e-6);
        assert_eq!(sizing.detail, 24);
    }

    #[test]
    fn test_sizing_degenerate_viewport() {
        assert_eq!(
            MeshSizing::from_viewport(0.0, 900.0),
            MeshSizing { radius: 0.0, detail: 0 }
        );
        assert_eq!(
            MeshSizing::from_viewport(-10.0, 900.0),
            MeshSizing { radius: 0.0, detail: 0 }
        );
    }

    #[test]
    fn test_sizing_is_monotonic() {
        let mut last = MeshSizing::from_viewport(0.0, 0.0);
        for side in (0..4000).step_by(37) {
            let sizing = MeshSizing::from_viewport(side as f32, 5000.0);
            assert!(sizing.radius >= last.radius);
            assert!(sizing.detail >= last.detail);
            assert_eq!(sizing.detail, (side as f32 / 200.0 * 8.0).floor() as u32);
            last = sizing;
        }
    }

    #[test]
    fn test_base_icosahedron_counts() {
        let mesh = build_icosahedron(MeshSizing { radius: 1.0, detail: 0 });
        assert_eq!(mesh.positions.len(), 12);
        assert_eq!(mesh.edge_count(), 30);
        assert_eq!(mesh.triangle_count, 20);
    }

    #[test]
    fn test_subdivided_counts() {
        for detail in [1u32, 2, 5, 12] {
            let mesh = build_icosahedron(MeshSizing { radius: 2.5, detail });
            let n = (detail + 1) as usize;
            assert_eq!(mesh.positions.len(), 10 * n * n + 2, "detail {}", detail);
            assert_eq!(mesh.edge_count(), 30 * n * n, "detail {}", detail);
            assert_eq!(mesh.triangle_count, 20 * n * n, "detail {}", detail);
        }
    }

    #[test]
    fn test_vertices_lie_on_sphere() {
        let mesh = build_icosahedron(MeshSizing { radius: 4.0, detail: 6 });
        for p in &mesh.positions {
            let len = (p[0] * p[0] + p[1] * p[1] + p[2] * p[2]).sqrt();
            assert!((len - 4.0).abs() < 1e-4, "vertex off sphere: {:?}", p);
        }
    }

    #[test]
    fn test_edges_reference_valid_vertices() {
        let mesh = build_icosahedron(MeshSizing { radius: 1.0, detail: 3 });
        assert_eq!(mesh.edges.len() % 2, 0);
        let count = mesh.positions.len() as u32;
        for pair in mesh.edges.chunks_exact(2) {
            assert!(pair[0] < count && pair[1] < count);
            assert_ne!(pair[0], pair[1]);
        }
    }

    #[test]
    fn test_zero_radius_mesh_collapses() {
        let mesh = build_icosahedron(MeshSizing { radius: 0.0, detail: 0 });
        assert!(mesh.positions.iter().all(|p| *p == [0.0, 0.0, 0.0]));
    }
}
