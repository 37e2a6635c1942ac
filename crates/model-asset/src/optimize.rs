//! Vertex deduplication over several attribute streams.
//!
//! Vertices are merged only when they are byte-identical in every stream,
//! so the result depends on nothing but the input bytes.

use bytemuck::Pod;
use log::trace;
use meshopt::{generate_vertex_remap_multi, remap_index_buffer, remap_vertex_buffer, VertexStream};

use crate::mesh::Geometry;

/// Remap entry of a vertex no index refers to.
pub const UNUSED_VERTEX: u32 = u32::MAX;

/// Attribute streams of one mesh, all holding `vertex_count` elements.
pub struct VertexStreams<'a> {
    vertex_count: usize,
    streams: Vec<VertexStream<'a>>,
}

impl<'a> VertexStreams<'a> {
    pub fn new(vertex_count: usize) -> Self {
        Self {
            vertex_count,
            streams: Vec::new(),
        }
    }

    /// Add a stream compared byte by byte. Panics if it does not hold
    /// exactly one element per vertex.
    pub fn push<T: Pod>(&mut self, data: &'a [T]) {
        assert_eq!(
            data.len(),
            self.vertex_count,
            "vertex stream {} does not match vertex count {}",
            self.streams.len(),
            self.vertex_count
        );
        self.streams.push(VertexStream::new(data.as_ptr()));
    }

    /// Build a remap table assigning new vertex indices in order of first
    /// reference. Returns the number of unique vertices and the table, with
    /// [`UNUSED_VERTEX`] for unreferenced vertices.
    pub fn generate_remap(&self, indices: Option<&[u32]>) -> (usize, Vec<u32>) {
        generate_vertex_remap_multi(self.vertex_count, &self.streams, indices)
    }
}

/// Deduplicate `geometry` across all of its active streams. The result is
/// always indexed.
pub fn optimize_geometry(geometry: &mut Geometry) {
    geometry.assert_consistent();

    let vertex_count = geometry.vertex_count();
    let index_count = geometry.index_count();
    let indices = geometry.is_indexed().then_some(geometry.indices.as_slice());

    let mut streams = VertexStreams::new(vertex_count);
    streams.push(&geometry.positions);
    streams.push(&geometry.tex_coords);
    streams.push(&geometry.normals);
    streams.push(&geometry.tangents);
    if geometry.is_skinned() {
        streams.push(&geometry.bone_ids);
        streams.push(&geometry.weights);
    }

    let (unique_count, remap) = streams.generate_remap(indices);
    let indices = remap_index_buffer(indices, index_count, &remap);

    let optimized = Geometry {
        positions: remap_vertex_buffer(&geometry.positions, unique_count, &remap),
        tex_coords: remap_vertex_buffer(&geometry.tex_coords, unique_count, &remap),
        normals: remap_vertex_buffer(&geometry.normals, unique_count, &remap),
        tangents: remap_vertex_buffer(&geometry.tangents, unique_count, &remap),
        indices,
        bone_ids: if geometry.is_skinned() {
            remap_vertex_buffer(&geometry.bone_ids, unique_count, &remap)
        } else {
            Vec::new()
        },
        weights: if geometry.is_skinned() {
            remap_vertex_buffer(&geometry.weights, unique_count, &remap)
        } else {
            Vec::new()
        },
    };

    if optimized.indices.len() == geometry.index_count() && unique_count == vertex_count {
        trace!("Optimized mesh. Nothing changed.");
    } else {
        trace!(
            "Optimized mesh. Had {} indices and {} vertices. Has {} indices and {} vertices",
            index_count,
            vertex_count,
            optimized.indices.len(),
            unique_count
        );
    }
    *geometry = optimized;
}

#[cfg(test)]
mod test {
    use glam::{IVec4, Vec2, Vec3, Vec4};

    use super::*;

    fn quad_soup() -> Geometry {
        // Two triangles of a quad with the shared edge duplicated.
        let positions = vec![
            Vec3::ZERO,
            Vec3::X,
            Vec3::Y,
            Vec3::Y,
            Vec3::X,
            Vec3::new(1.0, 1.0, 0.0),
        ];
        Geometry {
            tex_coords: positions.iter().map(|p| p.truncate()).collect(),
            normals: vec![Vec3::Z; 6],
            tangents: vec![Vec3::X; 6],
            positions,
            ..Default::default()
        }
    }

    #[test]
    fn test_duplicates_are_merged() {
        let mut geometry = quad_soup();
        optimize_geometry(&mut geometry);
        assert_eq!(geometry.vertex_count(), 4);
        assert_eq!(geometry.indices, vec![0, 1, 2, 2, 1, 3]);
        assert_eq!(geometry.positions[3], Vec3::new(1.0, 1.0, 0.0));
        geometry.assert_consistent();
    }

    #[test]
    fn test_any_stream_difference_keeps_vertices_apart() {
        let mut geometry = quad_soup();
        geometry.tex_coords[3] = Vec2::new(0.5, 0.5);
        optimize_geometry(&mut geometry);
        assert_eq!(geometry.vertex_count(), 5);
    }

    #[test]
    fn test_bone_streams_take_part() {
        let mut geometry = quad_soup();
        geometry.bone_ids = vec![IVec4::new(0, -1, -1, -1); 6];
        geometry.weights = vec![Vec4::X; 6];
        geometry.bone_ids[4] = IVec4::new(1, -1, -1, -1);
        optimize_geometry(&mut geometry);
        assert_eq!(geometry.vertex_count(), 5);
        assert_eq!(geometry.bone_ids.len(), 5);
        assert_eq!(geometry.weights.len(), 5);
    }

    #[test]
    fn test_unique_input_is_unchanged_and_fixed_point() {
        let mut geometry = quad_soup();
        optimize_geometry(&mut geometry);
        let once = geometry.clone();
        optimize_geometry(&mut geometry);
        assert_eq!(geometry, once);
    }

    #[test]
    fn test_deterministic() {
        let mut first = quad_soup();
        let mut second = quad_soup();
        optimize_geometry(&mut first);
        optimize_geometry(&mut second);
        assert_eq!(first, second);
    }

    #[test]
    fn test_unreferenced_vertices_are_dropped() {
        let positions = [Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::Z];
        let mut streams = VertexStreams::new(4);
        streams.push(&positions);
        let (count, remap) = streams.generate_remap(Some(&[2, 1, 0]));
        assert_eq!(count, 3);
        assert_eq!(remap, vec![2, 1, 0, UNUSED_VERTEX]);
    }

    #[test]
    #[should_panic]
    fn test_stream_mismatch_panics() {
        let positions = [Vec3::ZERO, Vec3::X, Vec3::Y];
        let normals = [Vec3::Z, Vec3::Z];
        let mut streams = VertexStreams::new(3);
        streams.push(&positions);
        streams.push(&normals);
    }
}
