//! Welded triangle topology for silhouette extraction
//!
//! [`ShadowMesh`] turns one submesh's triangle soup into a structure that
//! answers two questions: which triangle shares each of this triangle's
//! edges, and which way does this triangle face. Adjacency is computed on
//! welded vertex indices so coincident vertices (seams, per-face normals)
//! do not break edge matching.

use std::sync::Arc;

use glam::Vec3;

use crate::scene::{Aabb, LeafMesh};

/// One adjacency record: the triangle across an edge and the edge's two
/// welded vertex indices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NeighborEdge {
    pub triangle: u32,
    pub edge: [u32; 2],
}

/// Up to three neighbors of one triangle, stored flat
#[derive(Debug, Clone, Default)]
pub struct TriangleNeighbors {
    slots: [Option<NeighborEdge>; 3],
}

impl TriangleNeighbors {
    pub fn count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NeighborEdge> {
        self.slots.iter().filter_map(|s| s.as_ref())
    }

    /// The triangle across the undirected edge `(a, b)`, if recorded
    pub fn across(&self, a: u32, b: u32) -> Option<u32> {
        self.iter()
            .find(|n| (n.edge == [a, b]) || (n.edge == [b, a]))
            .map(|n| n.triangle)
    }

    fn add(&mut self, neighbor: NeighborEdge) {
        for slot in &mut self.slots {
            if slot.is_none() {
                *slot = Some(neighbor);
                return;
            }
        }
        debug_assert!(false, "triangle already has three neighbors");
    }
}

/// One submesh's static geometry plus derived adjacency and normals
///
/// Positions and indices are shared with the mesh provider; the weld table,
/// normals, and neighbor table are owned and live for the mesh's lifetime.
#[derive(Debug, Clone)]
pub struct ShadowMesh {
    positions: Arc<[Vec3]>,
    indices: Arc<[u32]>,
    /// Original vertex index -> representative welded index
    weld: Vec<u32>,
    bone: usize,
    normals: Option<Vec<Vec3>>,
    neighbors: Option<Vec<TriangleNeighbors>>,
}

impl ShadowMesh {
    /// Build the welded view of a leaf mesh
    ///
    /// Quadratic in vertex count; bounded by the per-submesh vertex budget
    /// enforced upstream.
    pub fn new(leaf: &LeafMesh, weld_epsilon: f32) -> Self {
        let positions = leaf.positions.clone();
        let epsilon_sq = weld_epsilon * weld_epsilon;

        let mut weld = Vec::with_capacity(positions.len());
        for i in 0..positions.len() {
            let mut representative = i as u32;
            for j in 0..i {
                if positions[j].distance_squared(positions[i]) <= epsilon_sq {
                    representative = weld[j];
                    break;
                }
            }
            weld.push(representative);
        }

        Self {
            positions,
            indices: leaf.indices.clone(),
            weld,
            bone: leaf.bone,
            normals: None,
            neighbors: None,
        }
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Number of distinct vertices after welding
    pub fn welded_vertex_count(&self) -> usize {
        let mut count = 0;
        for (i, &rep) in self.weld.iter().enumerate() {
            if rep == i as u32 {
                count += 1;
            }
        }
        count
    }

    pub fn bone(&self) -> usize {
        self.bone
    }

    /// The three welded vertex indices of a triangle
    pub fn polygon_index(&self, triangle: usize) -> [u32; 3] {
        let base = triangle * 3;
        [
            self.weld[self.indices[base] as usize],
            self.weld[self.indices[base + 1] as usize],
            self.weld[self.indices[base + 2] as usize],
        ]
    }

    pub fn vertex(&self, index: u32) -> Vec3 {
        self.positions[index as usize]
    }

    /// Object-space bounds over all vertices
    pub fn object_bounds(&self) -> Aabb {
        Aabb::from_points(self.positions.iter().copied())
    }

    /// Compute and cache one face normal per triangle; no-op when cached
    ///
    /// Normals are unnormalized cross products: only their sign against a
    /// direction matters downstream.
    pub fn build_polygon_normals(&mut self) {
        if self.normals.is_some() {
            return;
        }
        let mut normals = Vec::with_capacity(self.triangle_count());
        for t in 0..self.triangle_count() {
            let [a, b, c] = self.polygon_index(t);
            let v0 = self.vertex(a);
            normals.push((self.vertex(b) - v0).cross(self.vertex(c) - v0));
        }
        self.normals = Some(normals);
    }

    pub fn polygon_normal(&self, triangle: usize) -> Vec3 {
        debug_assert!(self.normals.is_some(), "normals not built");
        self.normals.as_ref().map_or(Vec3::ZERO, |n| n[triangle])
    }

    /// Compute and cache the edge-adjacency table; no-op when cached
    ///
    /// Quadratic pairwise scan: two triangles are neighbors when they share
    /// exactly two welded vertices, the shared edge is traversed in
    /// opposite directions (consistent winding), and the edge is not
    /// already claimed. Coplanar fold-over duplicates (same traversal
    /// direction, near-parallel normals) are rejected; the edge then stays
    /// open and is treated as silhouette-always.
    pub fn build_polygon_neighbors(&mut self) {
        if self.neighbors.is_some() {
            return;
        }
        self.build_polygon_normals();

        let triangle_count = self.triangle_count();
        let mut neighbors = vec![TriangleNeighbors::default(); triangle_count];

        for i in 0..triangle_count {
            let ti = self.polygon_index(i);
            for j in (i + 1)..triangle_count {
                let tj = self.polygon_index(j);

                let Some((a, b)) = shared_edge(ti, tj) else {
                    continue;
                };
                if neighbors[i].across(a, b).is_some() || neighbors[j].across(a, b).is_some() {
                    // A third triangle on this edge; keep the first pairing.
                    continue;
                }

                let same_direction = edge_direction(ti, a, b) == edge_direction(tj, a, b);
                if same_direction {
                    let ni = self.polygon_normal(i).normalize_or_zero();
                    let nj = self.polygon_normal(j).normalize_or_zero();
                    if ni.dot(nj) > 1.0 - 1e-4 {
                        // Coplanar duplicate fold; not a real neighbor.
                        continue;
                    }
                }

                neighbors[i].add(NeighborEdge {
                    triangle: j as u32,
                    edge: [a, b],
                });
                neighbors[j].add(NeighborEdge {
                    triangle: i as u32,
                    edge: [a, b],
                });
            }
        }
        self.neighbors = Some(neighbors);
    }

    pub fn neighbors(&self, triangle: usize) -> &TriangleNeighbors {
        debug_assert!(self.neighbors.is_some(), "neighbors not built");
        static EMPTY: TriangleNeighbors = TriangleNeighbors { slots: [None; 3] };
        self.neighbors
            .as_ref()
            .map_or(&EMPTY, |n| &n[triangle])
    }

    /// The triangle across one directed edge of `triangle`, if any
    pub fn neighbor_across_edge(&self, triangle: usize, a: u32, b: u32) -> Option<u32> {
        self.neighbors(triangle).across(a, b)
    }
}

/// The exactly-two shared welded vertices of a triangle pair, if they share
/// exactly two
fn shared_edge(ti: [u32; 3], tj: [u32; 3]) -> Option<(u32, u32)> {
    let mut shared = [0u32; 3];
    let mut count = 0;
    for &a in &ti {
        if tj.contains(&a) && !shared[..count].contains(&a) {
            if count == 3 {
                return None;
            }
            shared[count] = a;
            count += 1;
        }
    }
    if count == 2 {
        Some((shared[0], shared[1]))
    } else {
        None
    }
}

/// Whether `a -> b` follows the triangle's winding order
fn edge_direction(tri: [u32; 3], a: u32, b: u32) -> bool {
    for k in 0..3 {
        if tri[k] == a && tri[(k + 1) % 3] == b {
            return true;
        }
    }
    false
}
