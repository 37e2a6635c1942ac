use std::collections::HashMap;

use glam::{IVec4, Mat4, Vec4};
use log::trace;

use crate::{
    mesh::{Geometry, MAX_BONE_INFLUENCES, NO_BONE},
    scene::ImportedMesh,
};

/// Weight sums at or below this are treated as "not skinned".
pub const WEIGHT_EPSILON: f32 = 1e-6;

#[derive(Debug, Clone, PartialEq)]
pub struct Skeleton {
    pub global_inverse_transform: Mat4,
    /// Inverse bind matrix per bone.
    pub bind_transforms: Vec<Mat4>,
    /// Rest transform of each bone relative to its node parent.
    pub node_transforms: Vec<Mat4>,
    /// Nearest bone ancestor, `None` for roots.
    pub parents: Vec<Option<usize>>,
    pub bone_map: HashMap<String, usize>,
}

impl Default for Skeleton {
    fn default() -> Self {
        Self {
            global_inverse_transform: Mat4::IDENTITY,
            bind_transforms: Vec::new(),
            node_transforms: Vec::new(),
            parents: Vec::new(),
            bone_map: HashMap::new(),
        }
    }
}

impl Skeleton {
    pub fn bone_count(&self) -> usize {
        self.bone_map.len()
    }

    pub fn bone_id(&self, name: &str) -> Option<usize> {
        self.bone_map.get(name).copied()
    }

    /// Number of bones on the way from `bone` to its root, or `None` if the
    /// parent chain does not terminate within the bone count.
    pub fn depth(&self, bone: usize) -> Option<usize> {
        let mut current = bone;
        for depth in 0..=self.bone_count() {
            match self.parents[current] {
                None => return Some(depth),
                Some(parent) => current = parent,
            }
        }
        None
    }
}

/// Collects bones across all meshes of one model.
#[derive(Debug, Default)]
pub struct SkeletonBuilder {
    bone_map: HashMap<String, usize>,
    bind_transforms: Vec<Mat4>,
}

impl SkeletonBuilder {
    pub fn bone_count(&self) -> usize {
        self.bone_map.len()
    }

    /// Id of the bone called `name`. The first sighting assigns the next id
    /// and records `offset` as its bind transform.
    pub fn bone_id(&mut self, name: &str, offset: Mat4) -> usize {
        if let Some(id) = self.bone_map.get(name) {
            return *id;
        }
        let id = self.bone_map.len();
        self.bone_map.insert(name.to_string(), id);
        self.bind_transforms.push(offset);
        id
    }

    /// Write the bone influences of `mesh` into the bone streams of
    /// `geometry`. Each influence takes the first free of four slots; any
    /// further influence on a full vertex is dropped.
    pub fn add_influences(&mut self, mesh: &ImportedMesh, geometry: &mut Geometry) {
        let vertex_count = geometry.vertex_count();
        geometry.bone_ids = vec![IVec4::splat(NO_BONE); vertex_count];
        geometry.weights = vec![Vec4::ZERO; vertex_count];

        let mut dropped = 0usize;
        for bone in &mesh.bones {
            let id = self.bone_id(&bone.name, bone.offset) as i32;
            for influence in &bone.weights {
                let vertex = influence.vertex as usize;
                assert!(
                    vertex < vertex_count,
                    "bone {:?} influences vertex {} of {}",
                    bone.name,
                    vertex,
                    vertex_count
                );
                let ids = &mut geometry.bone_ids[vertex];
                match (0..MAX_BONE_INFLUENCES).find(|slot| ids[*slot] == NO_BONE) {
                    Some(slot) => {
                        ids[slot] = id;
                        geometry.weights[vertex][slot] = influence.weight;
                    }
                    None => dropped += 1,
                }
            }
        }
        if dropped > 0 {
            trace!("Dropped {} bone influences beyond {} per vertex", dropped, MAX_BONE_INFLUENCES);
        }
    }

    /// Finish with unresolved parents and identity rest transforms.
    pub fn build(self, global_inverse_transform: Mat4) -> Skeleton {
        let bone_count = self.bone_map.len();
        Skeleton {
            global_inverse_transform,
            bind_transforms: self.bind_transforms,
            node_transforms: vec![Mat4::IDENTITY; bone_count],
            parents: vec![None; bone_count],
            bone_map: self.bone_map,
        }
    }
}

/// Rescale every weight quadruple to sum to one. Quadruples summing to
/// [`WEIGHT_EPSILON`] or less are left alone.
pub fn normalize_weights(weights: &mut [Vec4]) {
    for weight in weights {
        let sum = weight.element_sum();
        if sum > WEIGHT_EPSILON {
            *weight /= sum;
        }
    }
}

#[cfg(test)]
mod test {
    use glam::Vec3;

    use super::*;
    use crate::scene::{ImportedBone, VertexWeight};

    fn bone(name: &str, weights: &[(u32, f32)]) -> ImportedBone {
        ImportedBone {
            name: name.to_string(),
            offset: Mat4::from_translation(Vec3::splat(name.len() as f32)),
            weights: weights
                .iter()
                .map(|(vertex, weight)| VertexWeight {
                    vertex: *vertex,
                    weight: *weight,
                })
                .collect(),
        }
    }

    fn mesh(bones: Vec<ImportedBone>) -> ImportedMesh {
        ImportedMesh {
            positions: vec![Vec3::ZERO, Vec3::X, Vec3::Y],
            bones,
            ..Default::default()
        }
    }

    #[test]
    fn test_bone_ids_shared_across_meshes() {
        let mut builder = SkeletonBuilder::default();
        let mut first = Geometry {
            positions: vec![Vec3::ZERO; 3],
            ..Default::default()
        };
        let mut second = first.clone();
        builder.add_influences(&mesh(vec![bone("hip", &[(0, 1.0)]), bone("leg", &[(1, 1.0)])]), &mut first);
        builder.add_influences(&mesh(vec![bone("arm", &[(0, 1.0)]), bone("hip", &[(2, 1.0)])]), &mut second);

        assert_eq!(builder.bone_count(), 3);
        assert_eq!(second.bone_ids[0].x, 2);
        assert_eq!(second.bone_ids[2].x, 0);

        let skeleton = builder.build(Mat4::IDENTITY);
        assert_eq!(skeleton.bone_id("hip"), Some(0));
        assert_eq!(skeleton.bone_id("leg"), Some(1));
        assert_eq!(skeleton.bind_transforms[2], Mat4::from_translation(Vec3::splat(3.0)));
        assert_eq!(skeleton.parents, vec![None; 3]);
    }

    #[test]
    fn test_fifth_influence_is_dropped() {
        let bones = ["a", "b", "c", "d", "e"]
            .iter()
            .map(|name| bone(name, &[(0, 0.2)]))
            .collect();
        let mut geometry = Geometry {
            positions: vec![Vec3::ZERO; 3],
            ..Default::default()
        };
        let mut builder = SkeletonBuilder::default();
        builder.add_influences(&mesh(bones), &mut geometry);

        assert_eq!(geometry.bone_ids[0], IVec4::new(0, 1, 2, 3));
        assert_eq!(geometry.bone_ids[1], IVec4::splat(NO_BONE));
        // The dropped bone still gets an id.
        assert_eq!(builder.bone_count(), 5);
    }

    #[test]
    #[should_panic]
    fn test_influence_out_of_range_panics() {
        let mut geometry = Geometry {
            positions: vec![Vec3::ZERO; 3],
            ..Default::default()
        };
        SkeletonBuilder::default().add_influences(&mesh(vec![bone("a", &[(3, 1.0)])]), &mut geometry);
    }

    #[test]
    fn test_normalize_weights() {
        let mut weights = vec![Vec4::new(0.2, 0.2, 0.0, 0.0), Vec4::ZERO, Vec4::new(3.0, 1.0, 0.0, 0.0)];
        normalize_weights(&mut weights);
        assert!((weights[0].element_sum() - 1.0).abs() < 1e-6);
        assert_eq!(weights[1], Vec4::ZERO);
        assert_eq!(weights[2], Vec4::new(0.75, 0.25, 0.0, 0.0));
    }

    #[test]
    fn test_depth_detects_cycle() {
        let mut skeleton = SkeletonBuilder::default().build(Mat4::IDENTITY);
        skeleton.bone_map.insert("a".into(), 0);
        skeleton.bone_map.insert("b".into(), 1);
        skeleton.parents = vec![None, Some(0)];
        assert_eq!(skeleton.depth(1), Some(1));
        skeleton.parents = vec![Some(1), Some(0)];
        assert_eq!(skeleton.depth(1), None);
    }
}
