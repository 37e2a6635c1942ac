use std::path::Path;

use crate::{animation::AnimationAsset, index::AssetSource, mesh::MeshAsset, skin::Skeleton};

/// A processed model. Static meshes are already in model space; skinned
/// meshes stay in bind space and are placed by `skeleton`.
#[derive(Debug, Clone)]
pub struct ModelAsset {
    pub source: AssetSource,
    pub meshes: Vec<MeshAsset>,
    pub animations: Vec<AnimationAsset>,
    pub skeleton: Skeleton,
}

impl ModelAsset {
    pub fn path(&self) -> Option<&Path> {
        self.source.path()
    }

    pub fn is_skinned(&self) -> bool {
        self.meshes.iter().any(|mesh| mesh.geometry.is_skinned())
    }

    pub fn animation(&self, name: &str) -> Option<&AnimationAsset> {
        self.animations
            .iter()
            .find(|animation| animation.name == name)
    }
}
