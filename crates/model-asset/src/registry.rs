use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use log::debug;

use crate::{
    index::{AssetSource, ModelHandle, TextureHandle},
    material::{MaterialAsset, MaterialProperties, MaterialTextures, TextureSlot},
    model::ModelAsset,
    texture::{Bitmap, TextureAsset},
};

pub const DEFAULT_WHITE: &str = "default/white";
pub const DEFAULT_NORMAL: &str = "default/normal";
pub const DEFAULT_BLACK: &str = "default/black";
pub const DEFAULT_TILE: &str = "default/tile";

/// Owner of every texture and model produced by one loading session.
///
/// File backed assets are deduplicated by path for the lifetime of the
/// registry. Assets loaded from memory are always stored as new entries.
#[derive(Debug, Default)]
pub struct AssetRegistry {
    textures: Vec<TextureAsset>,
    models: Vec<ModelAsset>,
    texture_paths: HashMap<PathBuf, TextureHandle>,
    model_paths: HashMap<PathBuf, ModelHandle>,
    default_material: Option<MaterialAsset>,
}

impl AssetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn texture(&self, handle: TextureHandle) -> Option<&TextureAsset> {
        self.textures.get(handle.index())
    }

    pub fn model(&self, handle: ModelHandle) -> Option<&ModelAsset> {
        self.models.get(handle.index())
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    pub fn model_count(&self) -> usize {
        self.models.len()
    }

    pub fn textures(&self) -> impl Iterator<Item = (TextureHandle, &TextureAsset)> {
        self.textures
            .iter()
            .enumerate()
            .map(|(index, texture)| (TextureHandle(index as u32), texture))
    }

    pub fn models(&self) -> impl Iterator<Item = (ModelHandle, &ModelAsset)> {
        self.models
            .iter()
            .enumerate()
            .map(|(index, model)| (ModelHandle(index as u32), model))
    }

    pub fn texture_by_path(&self, path: &Path) -> Option<TextureHandle> {
        self.texture_paths.get(path).copied()
    }

    pub fn model_by_path(&self, path: &Path) -> Option<ModelHandle> {
        self.model_paths.get(path).copied()
    }

    fn source_key(source: &AssetSource) -> Option<PathBuf> {
        match source {
            AssetSource::File(path) => Some(path.clone()),
            AssetSource::Builtin(name) => Some(PathBuf::from(name)),
            AssetSource::Memory => None,
        }
    }

    /// Store `texture`. A texture with a path already known to the registry
    /// is not stored again; the existing handle is returned instead.
    pub fn insert_texture(&mut self, texture: TextureAsset) -> TextureHandle {
        let key = Self::source_key(&texture.source);
        if let Some(handle) = key.as_ref().and_then(|key| self.texture_paths.get(key)) {
            return *handle;
        }

        let handle = TextureHandle(self.textures.len() as u32);
        debug!(
            "Registered {} from {} ({}x{}, {} components)",
            handle, texture.source, texture.bitmap.size.0, texture.bitmap.size.1, texture.bitmap.components
        );
        self.textures.push(texture);
        if let Some(key) = key {
            self.texture_paths.insert(key, handle);
        }
        handle
    }

    /// Store `model`, with the same path rule as [`insert_texture`](Self::insert_texture).
    pub fn insert_model(&mut self, model: ModelAsset) -> ModelHandle {
        let key = Self::source_key(&model.source);
        if let Some(handle) = key.as_ref().and_then(|key| self.model_paths.get(key)) {
            return *handle;
        }

        let handle = ModelHandle(self.models.len() as u32);
        debug!(
            "Registered {} from {} ({} meshes, {} animations, {} bones)",
            handle,
            model.source,
            model.meshes.len(),
            model.animations.len(),
            model.skeleton.bone_count()
        );
        self.models.push(model);
        if let Some(key) = key {
            self.model_paths.insert(key, handle);
        }
        handle
    }

    fn builtin_texture(&mut self, name: &'static str, bitmap: Bitmap, srgb: bool) -> TextureHandle {
        self.insert_texture(TextureAsset::new(AssetSource::Builtin(name), bitmap, srgb))
    }

    fn build_default_material(&mut self) -> MaterialAsset {
        let white = self.builtin_texture(DEFAULT_WHITE, Bitmap::solid(255), false);
        let normal = self.builtin_texture(DEFAULT_NORMAL, Bitmap::solid(128), false);
        let black = self.builtin_texture(DEFAULT_BLACK, Bitmap::solid(0), false);
        let tile = self.builtin_texture(DEFAULT_TILE, Bitmap::checkerboard(8, 255, 125), true);

        let mut textures = MaterialTextures([white; TextureSlot::COUNT]);
        textures[TextureSlot::Albedo] = tile;
        textures[TextureSlot::Metallic] = black;
        textures[TextureSlot::Roughness] = white;
        textures[TextureSlot::Ambient] = white;
        textures[TextureSlot::Normal] = normal;
        textures[TextureSlot::Displacement] = black;

        MaterialAsset {
            textures,
            properties: MaterialProperties::default(),
        }
    }

    /// The material every unresolved slot falls back to. Built on first use.
    pub fn default_material(&mut self) -> &MaterialAsset {
        let material = match self.default_material.take() {
            Some(material) => material,
            None => self.build_default_material(),
        };
        self.default_material.insert(material)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::skin::Skeleton;

    fn model(source: AssetSource) -> ModelAsset {
        ModelAsset {
            source,
            meshes: Vec::new(),
            animations: Vec::new(),
            skeleton: Skeleton::default(),
        }
    }

    #[test]
    fn test_default_material_is_built_once() {
        let mut registry = AssetRegistry::new();
        let first = registry.default_material().clone();
        let second = registry.default_material().clone();
        assert_eq!(first, second);
        assert_eq!(registry.texture_count(), 4);

        let tile = registry.texture(first.texture(TextureSlot::Albedo)).unwrap();
        assert!(tile.srgb);
        assert_eq!(tile.bitmap.size, (8, 8));
        assert_eq!(tile.mip_levels, 4);

        let normal = registry.texture(first.texture(TextureSlot::Normal)).unwrap();
        assert_eq!(normal.bitmap.pixels, vec![128; 3]);
        assert!(!normal.srgb);
        assert_eq!(
            first.texture(TextureSlot::Metallic),
            first.texture(TextureSlot::Displacement)
        );
        assert_eq!(registry.texture_by_path(Path::new(DEFAULT_WHITE)), Some(first.texture(TextureSlot::Roughness)));
    }

    #[test]
    fn test_file_models_are_deduplicated() {
        let mut registry = AssetRegistry::new();
        let path = PathBuf::from("models/box.obj");
        let first = registry.insert_model(model(AssetSource::File(path.clone())));
        let second = registry.insert_model(model(AssetSource::File(path.clone())));
        assert_eq!(first, second);
        assert_eq!(registry.model_by_path(&path), Some(first));
        assert_eq!(registry.model_count(), 1);
    }

    #[test]
    fn test_memory_models_are_never_deduplicated() {
        let mut registry = AssetRegistry::new();
        let first = registry.insert_model(model(AssetSource::Memory));
        let second = registry.insert_model(model(AssetSource::Memory));
        assert_ne!(first, second);
        assert_eq!(registry.model_count(), 2);
    }
}
