use glam::Vec3;

use crate::mesh::Geometry;

fn calculate_triangle_normal(positions: [Vec3; 3]) -> Vec3 {
    let edge_a = positions[1] - positions[0];
    let edge_b = positions[2] - positions[0];
    edge_a.cross(edge_b).normalize()
}

/// One normal per face, written to all three of its vertices. A vertex
/// shared by several faces keeps the normal of the last face.
pub fn calculate_flat_normals(geometry: &Geometry) -> Vec<Vec3> {
    let mut buffer = vec![Vec3::ZERO; geometry.vertex_count()];
    for triangle in geometry.triangles() {
        let normal = calculate_triangle_normal(triangle.map(|index| geometry.positions[index]));
        for index in triangle {
            buffer[index] = normal;
        }
    }
    buffer
}
