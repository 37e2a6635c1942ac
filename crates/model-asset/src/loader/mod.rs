use std::collections::HashSet;

use log::trace;

use crate::{
    material::MaterialProperties,
    mesh::MAX_BONE_INFLUENCES,
    scene::{ImportOptions, ImportedMesh, ImportedScene},
};

/// GLTF and GLB importer with `gltf` crate.
#[cfg(feature = "gltf")]
pub mod gltf;

/// OBJ importer with `tobj` crate.
#[cfg(feature = "obj")]
pub mod obj;

pub(crate) mod material;
pub mod model;
pub mod texture;

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TextureLoadParams {
    /// Store rows bottom to top, as the renderer samples them.
    pub flip_vertically: bool,
}

impl Default for TextureLoadParams {
    fn default() -> Self {
        Self {
            flip_vertically: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ModelLoadParams {
    pub import: ImportOptions,
    pub texture: TextureLoadParams,
    /// Properties used where a material leaves one unset. Defaults to the
    /// properties of the registry's default material.
    pub material_defaults: Option<MaterialProperties>,
}

/// Triangle list of a triangle strip, keeping the winding of the first
/// triangle.
pub(crate) fn triangulate_strip(indices: &[u32]) -> Vec<u32> {
    (0..indices.len().saturating_sub(2))
        .flat_map(|i| {
            if i % 2 == 0 {
                [indices[i], indices[i + 1], indices[i + 2]]
            } else {
                [indices[i], indices[i + 2], indices[i + 1]]
            }
        })
        .collect()
}

/// Triangle list of a triangle fan around its first vertex.
pub(crate) fn triangulate_fan(indices: &[u32]) -> Vec<u32> {
    (0..indices.len().saturating_sub(2))
        .flat_map(|i| [indices[i + 1], indices[i + 2], indices[0]])
        .collect()
}

fn flip_winding_order(mesh: &mut ImportedMesh) {
    if mesh.indices.is_empty() {
        mesh.indices = (0..mesh.positions.len() as u32).collect();
    }
    for triangle in mesh.indices.chunks_exact_mut(3) {
        triangle.swap(1, 2);
    }
}

/// Drop the weakest influences of every vertex with more than `limit`.
/// Returns the number of influences removed.
fn limit_bone_weights(mesh: &mut ImportedMesh, limit: usize) -> usize {
    let mut influences: Vec<Vec<(f32, usize, usize)>> = vec![Vec::new(); mesh.positions.len()];
    for (bone_index, bone) in mesh.bones.iter().enumerate() {
        for (weight_index, weight) in bone.weights.iter().enumerate() {
            if let Some(vertex) = influences.get_mut(weight.vertex as usize) {
                vertex.push((weight.weight, bone_index, weight_index));
            }
        }
    }

    let mut removed = HashSet::new();
    for vertex in &mut influences {
        if vertex.len() > limit {
            vertex.sort_by(|a, b| b.0.total_cmp(&a.0));
            removed.extend(vertex[limit..].iter().map(|(_, bone, weight)| (*bone, *weight)));
        }
    }
    if removed.is_empty() {
        return 0;
    }

    for (bone_index, bone) in mesh.bones.iter_mut().enumerate() {
        let mut weight_index = 0;
        bone.weights.retain(|_| {
            let keep = !removed.contains(&(bone_index, weight_index));
            weight_index += 1;
            keep
        });
    }
    removed.len()
}

/// Post-processing shared by every importer.
pub(crate) fn apply_import_options(scene: &mut ImportedScene, options: &ImportOptions) {
    for mesh in &mut scene.meshes {
        if options.flip_uvs {
            for tex_coord in &mut mesh.tex_coords {
                tex_coord.y = 1.0 - tex_coord.y;
            }
        }
        if options.flip_winding_order {
            flip_winding_order(mesh);
        }
        if options.limit_bone_weights {
            let removed = limit_bone_weights(mesh, MAX_BONE_INFLUENCES);
            if removed > 0 {
                trace!("Removed {} weak bone influences from mesh {:?}", removed, mesh.name);
            }
        }
    }
}
