use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use log::{error, trace, warn};

use crate::{
    index::TextureHandle,
    material::{MaterialAsset, MaterialProperties, MaterialTextures, SLOT_SOURCES},
    registry::AssetRegistry,
    scene::{ImportedMaterial, ImportedScene},
};

use super::{
    texture::{ImageDecoder, TextureLoader},
    TextureLoadParams,
};

/// Resolves the materials of one scene. Lives for a single model load.
pub(crate) struct MaterialResolver<'a, D> {
    scene: &'a ImportedScene,
    model_dir: Option<&'a Path>,
    params: &'a TextureLoadParams,
    defaults: MaterialProperties,
    embedded_cache: HashMap<usize, TextureHandle>,
    material_cache: HashMap<usize, MaterialAsset>,
    textures: &'a mut TextureLoader<D>,
}

impl<'a, D: ImageDecoder> MaterialResolver<'a, D> {
    pub fn new(
        scene: &'a ImportedScene,
        model_dir: Option<&'a Path>,
        params: &'a TextureLoadParams,
        defaults: MaterialProperties,
        textures: &'a mut TextureLoader<D>,
    ) -> Self {
        Self {
            scene,
            model_dir,
            params,
            defaults,
            embedded_cache: HashMap::new(),
            material_cache: HashMap::new(),
            textures,
        }
    }

    fn resolve_texture(
        &mut self,
        registry: &mut AssetRegistry,
        reference: &str,
        srgb: bool,
    ) -> Option<TextureHandle> {
        let scene = self.scene;
        if let Some((index, embedded)) = scene.embedded_texture(reference) {
            if let Some(handle) = self.embedded_cache.get(&index) {
                return Some(*handle);
            }
            return match self
                .textures
                .load_embedded(registry, embedded, srgb, self.params)
            {
                Ok(handle) => {
                    self.embedded_cache.insert(index, handle);
                    Some(handle)
                }
                Err(err) => {
                    error!("Failed to load embedded texture {}: {}", reference, err);
                    None
                }
            };
        }
        if reference.starts_with('*') {
            warn!("Embedded texture {} does not exist", reference);
            return None;
        }

        let path = match self.model_dir {
            Some(dir) => dir.join(reference),
            None => PathBuf::from(reference),
        };
        match self
            .textures
            .load_from_file(registry, &path, srgb, self.params)
        {
            Ok(handle) => Some(handle),
            Err(err) => {
                error!("Failed to load texture {}: {}", path.display(), err);
                None
            }
        }
    }

    fn resolve_imported(&mut self, registry: &mut AssetRegistry, material: &ImportedMaterial) -> MaterialAsset {
        let mut textures: MaterialTextures<Option<TextureHandle>> = MaterialTextures::default();
        for (kind, slot) in SLOT_SOURCES {
            if textures[slot].is_some() {
                continue;
            }
            let Some(reference) = material.texture(kind) else {
                continue;
            };
            trace!("Resolving {:?} texture {} for slot {:?}", kind, reference, slot);
            textures[slot] = self.resolve_texture(registry, reference, kind.is_srgb());
        }

        let fallback = registry.default_material().textures;
        MaterialAsset {
            textures: textures.complete(&fallback),
            properties: material.properties.or(&self.defaults),
        }
    }

    /// Material for a mesh referring to `index`. Meshes without a valid
    /// material get the default textures with the default properties.
    pub fn resolve(&mut self, registry: &mut AssetRegistry, index: Option<usize>) -> MaterialAsset {
        let Some(index) = index else {
            return MaterialAsset {
                textures: registry.default_material().textures,
                properties: self.defaults,
            };
        };
        if let Some(material) = self.material_cache.get(&index) {
            return material.clone();
        }

        let scene = self.scene;
        let material = match scene.materials.get(index) {
            Some(imported) => self.resolve_imported(registry, imported),
            None => {
                warn!("Material #{} does not exist, using default material", index);
                MaterialAsset {
                    textures: registry.default_material().textures,
                    properties: self.defaults,
                }
            }
        };
        self.material_cache.insert(index, material.clone());
        material
    }
}
