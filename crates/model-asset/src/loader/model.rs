use std::{
    error::Error,
    fmt::{self, Display, Formatter},
    path::Path,
};

use glam::Mat4;
use log::{debug, error, trace, warn};

use crate::{
    animation::build_animation,
    index::{AssetSource, ModelHandle},
    mesh::MeshAsset,
    model::ModelAsset,
    node::{bake_transform, flatten_hierarchy, resolve_bone_hierarchy},
    optimize::optimize_geometry,
    primitive::{extract_geometry, synthesize_missing_attributes},
    registry::AssetRegistry,
    scene::{ImportedMesh, ImportedScene, SceneImporter},
    skin::{normalize_weights, SkeletonBuilder},
};

use super::{
    material::MaterialResolver,
    texture::{ImageDecoder, TextureLoader},
    ModelLoadParams,
};

#[derive(Debug)]
pub enum ModelLoadError<E> {
    Import(E),
    BadRootNode(usize, usize),
    BadChildNode(usize, usize),
    BadMeshReference(usize, usize),
    BadIndex(usize, u32, usize),
}

impl<E: Display> Display for ModelLoadError<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ModelLoadError::Import(err) => Display::fmt(err, f),
            ModelLoadError::BadRootNode(root, count) => {
                write!(f, "Root node #{} out of bounds of {} nodes", root, count)
            }
            ModelLoadError::BadChildNode(node, child) => {
                write!(f, "Node #{} refers to missing child #{}", node, child)
            }
            ModelLoadError::BadMeshReference(node, mesh) => {
                write!(f, "Node #{} refers to missing mesh #{}", node, mesh)
            }
            ModelLoadError::BadIndex(mesh, index, vertex_count) => write!(
                f,
                "Mesh #{} refers to vertex {} of {}",
                mesh, index, vertex_count
            ),
        }
    }
}

impl<E: Error> Error for ModelLoadError<E> {}

impl<E> ModelLoadError<E> {
    /// Reject scenes whose node arena or index buffers do not hold together.
    fn check_scene(scene: &ImportedScene) -> Result<(), Self> {
        let node_count = scene.nodes.len();
        if scene.root >= node_count {
            return Err(ModelLoadError::BadRootNode(scene.root, node_count));
        }
        for (index, node) in scene.nodes.iter().enumerate() {
            if let Some(child) = node.children.iter().find(|child| **child >= node_count) {
                return Err(ModelLoadError::BadChildNode(index, *child));
            }
            if let Some(mesh) = node.meshes.iter().find(|mesh| **mesh >= scene.meshes.len()) {
                return Err(ModelLoadError::BadMeshReference(index, *mesh));
            }
        }
        for (index, mesh) in scene.meshes.iter().enumerate() {
            let vertex_count = mesh.positions.len();
            let mut indices = mesh.indices.iter();
            if let Some(vertex) = indices.find(|vertex| **vertex as usize >= vertex_count) {
                return Err(ModelLoadError::BadIndex(index, *vertex, vertex_count));
            }
        }
        Ok(())
    }
}

/// Runs the import pipeline for one scene importer and image decoder.
///
/// Every load is synchronous and complete once it returns. Results are
/// stored in the [`AssetRegistry`] passed in, which is also where file
/// paths are deduplicated.
#[derive(Debug, Default)]
pub struct ModelLoader<I, D> {
    importer: I,
    textures: TextureLoader<D>,
}

impl<I: SceneImporter, D: ImageDecoder> ModelLoader<I, D> {
    pub fn new(importer: I, decoder: D) -> Self {
        Self {
            importer,
            textures: TextureLoader::new(decoder),
        }
    }

    pub fn texture_loader_mut(&mut self) -> &mut TextureLoader<D> {
        &mut self.textures
    }

    /// Load the model at `path`, or return the model already loaded from it.
    pub fn load_from_file(
        &mut self,
        registry: &mut AssetRegistry,
        path: impl AsRef<Path>,
        params: &ModelLoadParams,
    ) -> Result<ModelHandle, ModelLoadError<I::Error>> {
        let path = path.as_ref();
        if let Some(handle) = registry.model_by_path(path) {
            debug!("Model {} already loaded as {}", path.display(), handle);
            return Ok(handle);
        }

        trace!("Loading model {}", path.display());
        let scene = self
            .importer
            .import_file(path, &params.import)
            .map_err(ModelLoadError::Import)
            .and_then(|scene| ModelLoadError::check_scene(&scene).map(|_| scene))
            .inspect_err(|err| error!("Failed to load model {}: {}", path.display(), err))?;

        let model = self.process_scene(
            registry,
            &scene,
            AssetSource::File(path.to_path_buf()),
            path.parent(),
            params,
        );
        Ok(registry.insert_model(model))
    }

    /// Load a model from an in-memory file. Texture paths are taken
    /// relative to the working directory. The result is never shared with
    /// other loads.
    pub fn load_from_memory(
        &mut self,
        registry: &mut AssetRegistry,
        data: &[u8],
        params: &ModelLoadParams,
    ) -> Result<ModelHandle, ModelLoadError<I::Error>> {
        trace!("Loading model from {} bytes of memory", data.len());
        let scene = self
            .importer
            .import_memory(data, &params.import)
            .map_err(ModelLoadError::Import)
            .and_then(|scene| ModelLoadError::check_scene(&scene).map(|_| scene))
            .inspect_err(|err| error!("Failed to load model from memory: {}", err))?;

        let model = self.process_scene(registry, &scene, AssetSource::Memory, None, params);
        Ok(registry.insert_model(model))
    }

    fn process_scene(
        &mut self,
        registry: &mut AssetRegistry,
        scene: &ImportedScene,
        source: AssetSource,
        model_dir: Option<&Path>,
        params: &ModelLoadParams,
    ) -> ModelAsset {
        let defaults = params
            .material_defaults
            .unwrap_or_else(|| registry.default_material().properties);
        let mut materials =
            MaterialResolver::new(scene, model_dir, &params.texture, defaults, &mut self.textures);
        let mut skeleton = SkeletonBuilder::default();
        let mut meshes = Vec::new();

        for visit in flatten_hierarchy(scene) {
            for mesh_index in &scene.nodes[visit.node].meshes {
                let mesh = &scene.meshes[*mesh_index];
                if mesh.positions.is_empty() {
                    warn!("Skipping mesh {:?} without vertices", mesh.name);
                    continue;
                }
                let mesh = process_mesh(
                    registry,
                    mesh,
                    visit.global_transform,
                    &mut skeleton,
                    &mut materials,
                );
                meshes.push(mesh);
            }
        }

        let global_inverse_transform = scene.root_node().transform.inverse();
        let mut skeleton = skeleton.build(global_inverse_transform);
        resolve_bone_hierarchy(scene, &mut skeleton);

        let animations = scene
            .animations
            .iter()
            .map(|clip| build_animation(clip, &skeleton))
            .collect();

        ModelAsset {
            source,
            meshes,
            animations,
            skeleton,
        }
    }
}

fn process_mesh<D: ImageDecoder>(
    registry: &mut AssetRegistry,
    mesh: &ImportedMesh,
    global_transform: Mat4,
    skeleton: &mut SkeletonBuilder,
    materials: &mut MaterialResolver<'_, D>,
) -> MeshAsset {
    trace!("Processing mesh {:?}", mesh.name);
    let mut geometry = extract_geometry(mesh);

    if !mesh.bones.is_empty() {
        skeleton.add_influences(mesh, &mut geometry);
        normalize_weights(&mut geometry.weights);
    }

    let material = materials.resolve(registry, mesh.material);

    synthesize_missing_attributes(&mut geometry);
    optimize_geometry(&mut geometry);

    if !geometry.is_skinned() {
        bake_transform(&mut geometry, global_transform);
    }

    MeshAsset {
        name: mesh.name.clone(),
        geometry,
        material,
    }
}

#[cfg(test)]
mod test {
    use std::{convert::Infallible, path::PathBuf};

    use glam::Vec3;

    use super::*;
    use crate::{
        scene::{ImportOptions, ImportedNode},
        texture::Bitmap,
    };

    struct SceneSource(ImportedScene);

    impl SceneImporter for SceneSource {
        type Error = Infallible;

        fn import_file(&mut self, _path: &Path, _options: &ImportOptions) -> Result<ImportedScene, Infallible> {
            Ok(self.0.clone())
        }

        fn import_memory(&mut self, _data: &[u8], _options: &ImportOptions) -> Result<ImportedScene, Infallible> {
            Ok(self.0.clone())
        }
    }

    struct Solid;

    impl ImageDecoder for Solid {
        type Error = Infallible;

        fn decode_file(&mut self, _path: &Path, _flip: bool) -> Result<Bitmap, Infallible> {
            Ok(Bitmap::solid(1))
        }

        fn decode_memory(&mut self, _data: &[u8], _flip: bool) -> Result<Bitmap, Infallible> {
            Ok(Bitmap::solid(1))
        }
    }

    fn triangle() -> ImportedMesh {
        ImportedMesh {
            positions: vec![Vec3::ZERO, Vec3::X, Vec3::Y],
            ..Default::default()
        }
    }

    #[test]
    fn test_static_meshes_are_baked_per_instance() {
        let mut scene = ImportedScene::new("root");
        scene.meshes.push(triangle());
        let mut left = ImportedNode::new("left", Mat4::from_translation(Vec3::NEG_X));
        left.meshes.push(0);
        let mut right = ImportedNode::new("right", Mat4::from_translation(Vec3::X));
        right.meshes.push(0);
        scene.add_node(0, left);
        scene.add_node(0, right);

        let mut registry = AssetRegistry::new();
        let mut loader = ModelLoader::new(SceneSource(scene), Solid);
        let handle = loader
            .load_from_memory(&mut registry, &[], &ModelLoadParams::default())
            .unwrap();
        let model = registry.model(handle).unwrap();

        assert_eq!(model.meshes.len(), 2);
        assert_eq!(model.meshes[0].geometry.positions[0], Vec3::NEG_X);
        assert_eq!(model.meshes[1].geometry.positions[0], Vec3::X);
        assert_eq!(model.meshes[0].geometry.indices, vec![0, 1, 2]);
        assert_eq!(model.path(), None);
    }

    #[test]
    fn test_empty_meshes_are_skipped() {
        let mut scene = ImportedScene::new("root");
        scene.meshes.push(ImportedMesh::default());
        scene.nodes[0].meshes.push(0);

        let mut registry = AssetRegistry::new();
        let mut loader = ModelLoader::new(SceneSource(scene), Solid);
        let handle = loader
            .load_from_file(&mut registry, "empty.obj", &ModelLoadParams::default())
            .unwrap();
        let model = registry.model(handle).unwrap();
        assert!(model.meshes.is_empty());
        assert_eq!(model.path(), Some(PathBuf::from("empty.obj").as_path()));
    }

    #[test]
    fn test_dangling_references_fail_the_load() {
        let mut scene = ImportedScene::new("root");
        scene.nodes[0].meshes.push(3);

        let mut registry = AssetRegistry::new();
        let mut loader = ModelLoader::new(SceneSource(scene), Solid);
        let result = loader.load_from_memory(&mut registry, &[], &ModelLoadParams::default());
        assert!(matches!(result, Err(ModelLoadError::BadMeshReference(0, 3))));
        assert_eq!(registry.model_count(), 0);
    }

    #[test]
    fn test_index_past_vertices_fails_the_load() {
        let mut mesh = triangle();
        mesh.indices = vec![0, 1, 7];
        let mut scene = ImportedScene::new("root");
        scene.meshes.push(mesh);
        scene.nodes[0].meshes.push(0);

        let mut registry = AssetRegistry::new();
        let mut loader = ModelLoader::new(SceneSource(scene), Solid);
        let result = loader.load_from_file(&mut registry, "broken.gltf", &ModelLoadParams::default());
        assert!(matches!(result, Err(ModelLoadError::BadIndex(0, 7, 3))));
        assert_eq!(registry.model_count(), 0);
        assert_eq!(registry.model_by_path(Path::new("broken.gltf")), None);
    }

    #[test]
    fn test_root_transform_sets_global_inverse() {
        let mut scene = ImportedScene::new("root");
        scene.nodes[0].transform = Mat4::from_scale(Vec3::splat(2.0));

        let mut registry = AssetRegistry::new();
        let mut loader = ModelLoader::new(SceneSource(scene), Solid);
        let handle = loader
            .load_from_memory(&mut registry, &[], &ModelLoadParams::default())
            .unwrap();
        let model = registry.model(handle).unwrap();
        assert_eq!(
            model.skeleton.global_inverse_transform,
            Mat4::from_scale(Vec3::splat(0.5))
        );
    }
}
