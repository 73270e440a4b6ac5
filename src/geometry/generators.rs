//! Procedural leaf meshes for tests and demos

use glam::Vec3;

use crate::scene::LeafMesh;

/// Axis-aligned cube centered at the origin, 24 vertices (four per face)
///
/// Vertices are duplicated per face as a mesh exporter would emit them, so
/// the cube exercises welding: adjacency only closes once coincident
/// corners are merged.
pub fn cube(half_extent: f32) -> LeafMesh {
    let h = half_extent;
    let faces: [[Vec3; 4]; 6] = [
        // +Z
        [
            Vec3::new(-h, -h, h),
            Vec3::new(h, -h, h),
            Vec3::new(h, h, h),
            Vec3::new(-h, h, h),
        ],
        // -Z
        [
            Vec3::new(h, -h, -h),
            Vec3::new(-h, -h, -h),
            Vec3::new(-h, h, -h),
            Vec3::new(h, h, -h),
        ],
        // +X
        [
            Vec3::new(h, -h, h),
            Vec3::new(h, -h, -h),
            Vec3::new(h, h, -h),
            Vec3::new(h, h, h),
        ],
        // -X
        [
            Vec3::new(-h, -h, -h),
            Vec3::new(-h, -h, h),
            Vec3::new(-h, h, h),
            Vec3::new(-h, h, -h),
        ],
        // +Y
        [
            Vec3::new(-h, h, h),
            Vec3::new(h, h, h),
            Vec3::new(h, h, -h),
            Vec3::new(-h, h, -h),
        ],
        // -Y
        [
            Vec3::new(-h, -h, -h),
            Vec3::new(h, -h, -h),
            Vec3::new(h, -h, h),
            Vec3::new(-h, -h, h),
        ],
    ];

    let mut positions = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);
    for face in faces {
        let base = positions.len() as u32;
        positions.extend_from_slice(&face);
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
    LeafMesh::new(positions, indices)
}

/// Open single-quad sheet in the XZ plane, facing +Y
pub fn quad_sheet(half_extent: f32) -> LeafMesh {
    let h = half_extent;
    LeafMesh::new(
        vec![
            Vec3::new(-h, 0.0, -h),
            Vec3::new(-h, 0.0, h),
            Vec3::new(h, 0.0, h),
            Vec3::new(h, 0.0, -h),
        ],
        vec![0, 1, 2, 0, 2, 3],
    )
}

/// Two disjoint quad sheets in one mesh, separated along X
///
/// Lit from above this produces two independent silhouette loops.
pub fn double_quad_sheet(half_extent: f32, gap: f32) -> LeafMesh {
    let a = quad_sheet(half_extent);
    let offset = Vec3::new(half_extent * 2.0 + gap, 0.0, 0.0);

    let mut positions: Vec<Vec3> = a.positions.iter().copied().collect();
    positions.extend(a.positions.iter().map(|&p| p + offset));

    let mut indices: Vec<u32> = a.indices.iter().copied().collect();
    let base = a.positions.len() as u32;
    indices.extend(a.indices.iter().map(|&i| i + base));

    LeafMesh::new(positions, indices)
}
