use glam::Vec3;

use crate::mesh::Geometry;

/// Per-face tangents from the UV gradient, orthogonalized against the
/// normal of the face's first vertex. Same last-face-wins layout as
/// [`calculate_flat_normals`](crate::normal::calculate_flat_normals).
///
/// Faces with a degenerate UV mapping divide by zero and produce
/// non-finite tangents.
pub fn calculate_flat_tangents(geometry: &Geometry) -> Vec<Vec3> {
    assert_eq!(geometry.tex_coords.len(), geometry.vertex_count());
    assert_eq!(geometry.normals.len(), geometry.vertex_count());

    let mut buffer = vec![Vec3::ZERO; geometry.vertex_count()];
    for triangle @ [i0, i1, i2] in geometry.triangles() {
        let edge1 = geometry.positions[i1] - geometry.positions[i0];
        let edge2 = geometry.positions[i2] - geometry.positions[i0];
        let delta_uv1 = geometry.tex_coords[i1] - geometry.tex_coords[i0];
        let delta_uv2 = geometry.tex_coords[i2] - geometry.tex_coords[i0];

        let f = 1.0 / (delta_uv1.x * delta_uv2.y - delta_uv2.x * delta_uv1.y);
        let tangent = f * (delta_uv2.y * edge1 - delta_uv1.y * edge2);
        let normal = geometry.normals[i0];
        let tangent = (tangent - normal * normal.dot(tangent)).normalize();

        for index in triangle {
            buffer[index] = tangent;
        }
    }
    buffer
}

#[cfg(test)]
mod test {
    use glam::Vec2;

    use super::*;

    #[test]
    fn test_tangent_follows_u_axis() {
        let geometry = Geometry {
            positions: vec![Vec3::ZERO, Vec3::X, Vec3::Y],
            tex_coords: vec![Vec2::ZERO, Vec2::X, Vec2::Y],
            normals: vec![Vec3::Z; 3],
            ..Default::default()
        };
        let tangents = calculate_flat_tangents(&geometry);
        for tangent in tangents {
            assert!(tangent.abs_diff_eq(Vec3::X, 1e-6), "{tangent}");
        }
    }

    #[test]
    fn test_tangent_is_orthogonal_to_normal() {
        let geometry = Geometry {
            positions: vec![Vec3::ZERO, Vec3::new(1.0, 0.0, 0.5), Vec3::Y],
            tex_coords: vec![Vec2::ZERO, Vec2::X, Vec2::Y],
            normals: vec![Vec3::Z; 3],
            ..Default::default()
        };
        let tangent = calculate_flat_tangents(&geometry)[0];
        assert!(tangent.dot(Vec3::Z).abs() < 1e-6);
        assert!((tangent.length() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_degenerate_uv_gives_non_finite_tangent() {
        let geometry = Geometry {
            positions: vec![Vec3::ZERO, Vec3::X, Vec3::Y],
            tex_coords: vec![Vec2::ONE; 3],
            normals: vec![Vec3::Z; 3],
            ..Default::default()
        };
        let tangents = calculate_flat_tangents(&geometry);
        assert!(tangents.iter().all(|tangent| !tangent.is_finite()));
    }
}
