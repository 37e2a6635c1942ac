use glam::{IVec4, Vec2, Vec3, Vec4};

use super::material::MaterialAsset;

/// Marks a bone slot that carries no influence.
pub const NO_BONE: i32 = -1;

/// Bone slots per vertex.
pub const MAX_BONE_INFLUENCES: usize = 4;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Geometry {
    pub positions: Vec<Vec3>,
    pub tex_coords: Vec<Vec2>,
    pub normals: Vec<Vec3>,
    pub tangents: Vec<Vec3>,
    pub indices: Vec<u32>,
    /// Either empty or parallel to `positions`. Unused slots hold [`NO_BONE`].
    pub bone_ids: Vec<IVec4>,
    /// Either empty or parallel to `positions`.
    pub weights: Vec<Vec4>,
}

impl Geometry {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn is_indexed(&self) -> bool {
        !self.indices.is_empty()
    }

    pub fn is_skinned(&self) -> bool {
        !self.bone_ids.is_empty()
    }

    /// Number of vertex references, counting implicit indices of
    /// non-indexed geometry.
    pub fn index_count(&self) -> usize {
        if self.is_indexed() {
            self.indices.len()
        } else {
            self.positions.len()
        }
    }

    /// Vertex index referenced by the `i`-th index position.
    #[inline]
    pub fn vertex_at(&self, i: usize) -> usize {
        if self.is_indexed() {
            self.indices[i] as usize
        } else {
            i
        }
    }

    /// Vertex triples of the triangle list. A trailing incomplete triangle
    /// is ignored.
    pub fn triangles(&self) -> impl Iterator<Item = [usize; 3]> + '_ {
        (0..self.index_count() / 3).map(move |triangle| {
            let first = triangle * 3;
            [
                self.vertex_at(first),
                self.vertex_at(first + 1),
                self.vertex_at(first + 2),
            ]
        })
    }

    /// Panics when the attribute streams disagree in length.
    pub fn assert_consistent(&self) {
        let count = self.positions.len();
        assert_eq!(self.tex_coords.len(), count, "texture coordinate stream length mismatch");
        assert_eq!(self.normals.len(), count, "normal stream length mismatch");
        assert_eq!(self.tangents.len(), count, "tangent stream length mismatch");
        assert_eq!(
            self.bone_ids.len(),
            self.weights.len(),
            "bone id and weight streams are not paired"
        );
        if self.is_skinned() {
            assert_eq!(self.bone_ids.len(), count, "bone stream length mismatch");
        }
        assert!(
            self.indices.iter().all(|index| (*index as usize) < count),
            "index out of range"
        );
    }
}

#[derive(Debug, Clone)]
pub struct MeshAsset {
    pub name: Option<String>,
    pub geometry: Geometry,
    pub material: MaterialAsset,
}
