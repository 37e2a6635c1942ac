use std::{env, error::Error, path::Path, process::ExitCode};

use log::{error, info};
use model_asset::{
    index::ModelHandle,
    loader::{
        gltf::GltfImporter, model::ModelLoader, obj::ObjImporter, texture::ImageCodec,
        ModelLoadParams,
    },
    model::ModelAsset,
    registry::AssetRegistry,
};

struct Loaders {
    gltf: ModelLoader<GltfImporter, ImageCodec>,
    obj: ModelLoader<ObjImporter, ImageCodec>,
    params: ModelLoadParams,
}

impl Loaders {
    fn load(&mut self, registry: &mut AssetRegistry, path: &Path) -> Result<ModelHandle, Box<dyn Error>> {
        let extension = path
            .extension()
            .and_then(|extension| extension.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("gltf" | "glb") => Ok(self.gltf.load_from_file(registry, path, &self.params)?),
            Some("obj") => Ok(self.obj.load_from_file(registry, path, &self.params)?),
            _ => Err(format!("Unknown model format {}", path.display()).into()),
        }
    }
}

fn print_model(model: &ModelAsset) {
    let vertices: usize = model
        .meshes
        .iter()
        .map(|mesh| mesh.geometry.vertex_count())
        .sum();
    let triangles: usize = model
        .meshes
        .iter()
        .map(|mesh| mesh.geometry.index_count() / 3)
        .sum();
    println!("{}", model.source);
    println!(
        "  {} meshes, {} vertices, {} triangles, {} bones",
        model.meshes.len(),
        vertices,
        triangles,
        model.skeleton.bone_count()
    );
    for mesh in &model.meshes {
        println!(
            "  mesh {}: {} vertices{}",
            mesh.name.as_deref().unwrap_or("<unnamed>"),
            mesh.geometry.vertex_count(),
            if mesh.geometry.is_skinned() { ", skinned" } else { "" }
        );
    }
    for animation in &model.animations {
        println!(
            "  animation {}: {:.2}s at {} ticks/s",
            animation.name,
            animation.duration_seconds(),
            animation.ticks_per_second
        );
    }
}

fn main() -> ExitCode {
    env_logger::init();

    let paths: Vec<String> = env::args().skip(1).collect();
    if paths.is_empty() {
        eprintln!("usage: model-asset-inspect <model>...");
        return ExitCode::FAILURE;
    }

    let mut registry = AssetRegistry::new();
    let mut loaders = Loaders {
        gltf: ModelLoader::new(GltfImporter, ImageCodec),
        obj: ModelLoader::new(ObjImporter, ImageCodec),
        params: ModelLoadParams::default(),
    };

    let mut failed = 0usize;
    for path in &paths {
        match loaders.load(&mut registry, Path::new(path)) {
            Ok(handle) => {
                if let Some(model) = registry.model(handle) {
                    print_model(model);
                }
            }
            Err(err) => {
                error!("{}: {}", path, err);
                failed += 1;
            }
        }
    }

    info!(
        "{} models and {} textures in registry",
        registry.model_count(),
        registry.texture_count()
    );
    if failed > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
