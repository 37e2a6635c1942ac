use std::{
    error::Error,
    fmt::{self, Display, Formatter},
    io::Cursor,
    path::Path,
};

use glam::{Mat4, Vec2, Vec3};
use log::{trace, warn};
use tobj::{LoadError, LoadOptions, Material, Model};

use crate::{
    material::{PartialMaterialProperties, SourceTextureKind},
    scene::{
        ImportOptions, ImportedMaterial, ImportedMesh, ImportedNode, ImportedScene,
        ImportedTextureRef, SceneImporter,
    },
};

use super::apply_import_options;

#[derive(Debug)]
pub enum ObjImportError {
    Obj(LoadError),
    NotTriangulated(String),
}

impl Display for ObjImportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ObjImportError::Obj(err) => Display::fmt(&err, f),
            ObjImportError::NotTriangulated(name) => {
                write!(f, "Model {} has polygons and triangulation is disabled", name)
            }
        }
    }
}

impl Error for ObjImportError {}

impl From<LoadError> for ObjImportError {
    fn from(value: LoadError) -> Self {
        ObjImportError::Obj(value)
    }
}

fn chunk_vec3(data: &[f32]) -> Vec<Vec3> {
    data.chunks_exact(3).map(Vec3::from_slice).collect()
}

fn chunk_vec2(data: &[f32]) -> Vec<Vec2> {
    data.chunks_exact(2).map(Vec2::from_slice).collect()
}

fn parse_vec3(value: &str) -> Option<Vec3> {
    let components: Vec<f32> = value
        .split_whitespace()
        .map(str::parse)
        .collect::<Result<_, _>>()
        .ok()?;
    match components.as_slice() {
        [x, y, z] => Some(Vec3::new(*x, *y, *z)),
        // A single value applies to all channels.
        [value] => Some(Vec3::splat(*value)),
        _ => None,
    }
}

/// Texture statements may carry options before the file name.
fn texture_file(statement: &str) -> Option<&str> {
    statement.split_whitespace().last()
}

fn load_material(material: &Material) -> ImportedMaterial {
    let unknown = |key: &str| material.unknown_param.get(key).map(String::as_str);
    let mut textures = Vec::new();
    let mut push = |kind: SourceTextureKind, statement: Option<&str>| {
        if let Some(path) = statement.and_then(texture_file) {
            textures.push(ImportedTextureRef {
                kind,
                path: path.to_string(),
            });
        }
    };

    push(SourceTextureKind::Diffuse, material.diffuse_texture.as_deref());
    push(SourceTextureKind::Normals, unknown("norm"));
    // tobj reports `bump` and `map_bump` as normal texture, they are height maps.
    push(SourceTextureKind::Height, material.normal_texture.as_deref());
    push(SourceTextureKind::Displacement, unknown("disp"));
    push(SourceTextureKind::AmbientOcclusion, material.ambient_texture.as_deref());
    push(SourceTextureKind::DiffuseRoughness, unknown("map_Pr"));
    push(SourceTextureKind::Metalness, unknown("map_Pm"));

    let dissolve = material.dissolve.unwrap_or(1.0);
    ImportedMaterial {
        name: Some(material.name.clone()),
        properties: PartialMaterialProperties {
            ambient: material.ambient.map(Vec3::from_array),
            albedo: material
                .diffuse
                .map(|diffuse| Vec3::from_array(diffuse).extend(dissolve)),
            specular: material.specular.map(Vec3::from_array),
            emission: unknown("Ke").and_then(parse_vec3),
            shininess: material.shininess,
            metallic: unknown("Pm").and_then(|value| value.trim().parse().ok()),
            ior: material.optical_density,
        },
        textures,
    }
}

fn load_model(model: &Model, material_count: usize) -> Result<ImportedMesh, ObjImportError> {
    let mesh = &model.mesh;
    if mesh.face_arities.iter().any(|arity| *arity != 3) {
        return Err(ObjImportError::NotTriangulated(model.name.clone()));
    }

    let material = mesh.material_id.filter(|material| {
        let exists = *material < material_count;
        if !exists {
            warn!("Model {} refers to a missing material #{}", model.name, material);
        }
        exists
    });

    Ok(ImportedMesh {
        name: Some(model.name.clone()),
        positions: chunk_vec3(&mesh.positions),
        normals: chunk_vec3(&mesh.normals),
        tangents: Vec::new(),
        tex_coords: chunk_vec2(&mesh.texcoords),
        indices: mesh.indices.clone(),
        bones: Vec::new(),
        material,
    })
}

fn build_scene(
    models: Vec<Model>,
    materials: Result<Vec<Material>, LoadError>,
    options: &ImportOptions,
) -> Result<ImportedScene, ObjImportError> {
    let materials = materials.unwrap_or_else(|err| {
        warn!("Failed to load materials: {}", err);
        Vec::new()
    });

    let mut scene = ImportedScene::new("root");
    scene.materials = materials.iter().map(load_material).collect();
    for model in &models {
        trace!("Importing model {}", model.name);
        let mut node = ImportedNode::new(model.name.clone(), Mat4::IDENTITY);
        node.meshes.push(scene.meshes.len());
        scene.meshes.push(load_model(model, materials.len())?);
        scene.add_node(scene.root, node);
    }

    apply_import_options(&mut scene, options);
    Ok(scene)
}

fn load_options(options: &ImportOptions) -> LoadOptions {
    LoadOptions {
        single_index: true,
        triangulate: options.triangulate,
        ignore_points: true,
        ignore_lines: true,
        ..Default::default()
    }
}

/// Imports Wavefront OBJ files with their MTL libraries. Material libraries
/// cannot be resolved when importing from memory.
#[derive(Debug, Default, Clone, Copy)]
pub struct ObjImporter;

impl SceneImporter for ObjImporter {
    type Error = ObjImportError;

    fn import_file(&mut self, path: &Path, options: &ImportOptions) -> Result<ImportedScene, ObjImportError> {
        let (models, materials) = tobj::load_obj(path, &load_options(options))?;
        build_scene(models, materials, options)
    }

    fn import_memory(&mut self, data: &[u8], options: &ImportOptions) -> Result<ImportedScene, ObjImportError> {
        let (models, materials) =
            tobj::load_obj_buf(&mut Cursor::new(data), &load_options(options), |_| {
                Err(LoadError::OpenFileFailed)
            })?;
        build_scene(models, materials, options)
    }
}

#[cfg(test)]
mod test {
    use glam::Vec4;

    use super::*;

    const QUAD: &str = "\
o quad
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
vt 0 0
vt 1 0
vt 1 1
vt 0 1
f 1/1 2/2 3/3 4/4
";

    #[test]
    fn test_import_triangulated_quad() {
        let scene = ObjImporter
            .import_memory(QUAD.as_bytes(), &ImportOptions::default())
            .unwrap();
        assert_eq!(scene.meshes.len(), 1);
        let mesh = &scene.meshes[0];
        assert_eq!(mesh.name.as_deref(), Some("quad"));
        assert_eq!(mesh.positions.len(), 4);
        assert_eq!(mesh.tex_coords.len(), 4);
        assert!(mesh.normals.is_empty());
        assert_eq!(mesh.indices.len(), 6);
        assert_eq!(mesh.material, None);

        let node = scene.root_node().children[0];
        assert_eq!(scene.nodes[node].name, "quad");
        assert_eq!(scene.nodes[node].meshes, vec![0]);
    }

    #[test]
    fn test_polygons_need_triangulation() {
        let options = ImportOptions {
            triangulate: false,
            ..Default::default()
        };
        let result = ObjImporter.import_memory(QUAD.as_bytes(), &options);
        assert!(matches!(result, Err(ObjImportError::NotTriangulated(_))));
    }

    #[test]
    fn test_material_keys() {
        let mut material = Material {
            name: "metal".to_string(),
            diffuse: Some([1.0, 0.5, 0.25]),
            dissolve: Some(0.5),
            diffuse_texture: Some("albedo.png".to_string()),
            normal_texture: Some("-bm 0.5 bump.png".to_string()),
            ..Default::default()
        };
        material
            .unknown_param
            .insert("map_Pm".to_string(), "metal.png".to_string());
        material
            .unknown_param
            .insert("Ke".to_string(), "0.1 0.2 0.3".to_string());
        material
            .unknown_param
            .insert("Pm".to_string(), "0.9".to_string());

        let imported = load_material(&material);
        assert_eq!(imported.texture(SourceTextureKind::Diffuse), Some("albedo.png"));
        assert_eq!(imported.texture(SourceTextureKind::Height), Some("bump.png"));
        assert_eq!(imported.texture(SourceTextureKind::Metalness), Some("metal.png"));
        assert_eq!(imported.texture(SourceTextureKind::Normals), None);
        assert_eq!(imported.properties.albedo, Some(Vec4::new(1.0, 0.5, 0.25, 0.5)));
        assert_eq!(imported.properties.emission, Some(Vec3::new(0.1, 0.2, 0.3)));
        assert_eq!(imported.properties.metallic, Some(0.9));
        assert_eq!(imported.properties.ior, None);
    }
}
