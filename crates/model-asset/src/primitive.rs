use glam::Vec2;
use log::{trace, warn};

use crate::{
    mesh::Geometry, normal::calculate_flat_normals, scene::ImportedMesh,
    tangent::calculate_flat_tangents,
};

/// Placeholder coordinates handed out to meshes without UVs, cycled by
/// index position. This is not an unwrap.
pub const TEX_COORD_CYCLE: [Vec2; 6] = [
    Vec2::new(0.0, 0.0),
    Vec2::new(0.0, 1.0),
    Vec2::new(1.0, 1.0),
    Vec2::new(1.0, 0.0),
    Vec2::new(1.0, 1.0),
    Vec2::new(0.0, 0.0),
];

/// Copy the vertex streams of `mesh`. Optional streams that do not cover
/// every vertex are dropped so they get synthesized instead.
pub fn extract_geometry(mesh: &ImportedMesh) -> Geometry {
    let vertex_count = mesh.positions.len();

    fn complete_or_empty<T: Clone>(stream: &[T], vertex_count: usize, name: &str) -> Vec<T> {
        if stream.is_empty() || stream.len() == vertex_count {
            stream.to_vec()
        } else {
            warn!(
                "Ignoring {} stream with {} entries for {} vertices",
                name,
                stream.len(),
                vertex_count
            );
            Vec::new()
        }
    }

    Geometry {
        positions: mesh.positions.clone(),
        tex_coords: complete_or_empty(&mesh.tex_coords, vertex_count, "texture coordinate"),
        normals: complete_or_empty(&mesh.normals, vertex_count, "normal"),
        tangents: complete_or_empty(&mesh.tangents, vertex_count, "tangent"),
        indices: mesh.indices.clone(),
        bone_ids: Vec::new(),
        weights: Vec::new(),
    }
}

fn synthesize_tex_coords(geometry: &Geometry) -> Vec<Vec2> {
    let mut buffer = vec![Vec2::ZERO; geometry.vertex_count()];
    for position in 0..geometry.index_count() {
        buffer[geometry.vertex_at(position)] = TEX_COORD_CYCLE[position % TEX_COORD_CYCLE.len()];
    }
    buffer
}

/// Fill in texture coordinates, normals and tangents that the source did
/// not provide. Afterwards all four vertex streams have the same length.
pub fn synthesize_missing_attributes(geometry: &mut Geometry) {
    assert!(!geometry.positions.is_empty(), "geometry without positions");

    if geometry.index_count() % 3 != 0 {
        warn!(
            "Index count {} is not a multiple of three, trailing vertices form no face",
            geometry.index_count()
        );
    }

    if geometry.tex_coords.is_empty() {
        trace!("Calculating missing texcoords");
        geometry.tex_coords = synthesize_tex_coords(geometry);
    }
    if geometry.normals.is_empty() {
        trace!("Calculating missing normals");
        geometry.normals = calculate_flat_normals(geometry);
    }
    if geometry.tangents.is_empty() {
        trace!("Calculating missing tangents");
        geometry.tangents = calculate_flat_tangents(geometry);
    }
}
