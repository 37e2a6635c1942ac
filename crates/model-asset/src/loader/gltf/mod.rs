use std::{
    collections::{HashMap, HashSet},
    error::Error,
    fmt::{self, Display, Formatter},
    fs, io,
    path::{Path, PathBuf},
};

use glam::{Mat4, Quat, Vec2, Vec3, Vec4};
use gltf::{
    animation::{util::ReadOutputs, Interpolation},
    mesh::Mode,
    Document, Gltf, Node, Primitive, Skin,
};
use log::{trace, warn};
use scheme::{Scheme, SchemeError};

use crate::{
    material::{PartialMaterialProperties, SourceTextureKind},
    scene::{
        EmbeddedTexture, EmbeddedTextureData, ImportOptions, ImportedAnimation, ImportedBone,
        ImportedChannel, ImportedKey, ImportedMaterial, ImportedMesh, ImportedNode, ImportedScene,
        ImportedTextureRef, SceneImporter, VertexWeight,
    },
};

use super::{apply_import_options, triangulate_fan, triangulate_strip};

pub mod scheme;

/// Animation times are stored in seconds and converted to ticks of this rate.
pub const TICKS_PER_SECOND: f32 = 1000.0;

/// Name of the node holding every scene root.
pub const ROOT_NODE_NAME: &str = "root";

#[derive(Debug)]
pub enum GltfImportError {
    Gltf(gltf::Error),
    Io(PathBuf, io::Error),
    InvalidScheme(SchemeError),
    MissingBinaryChunk,
    ResourceNotFound(String),
    ImageBufferOutOfBounds(usize, usize, usize),
    UnsupportedPrimitiveMode(Mode),
}

impl Display for GltfImportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            GltfImportError::Gltf(error) => Display::fmt(error, f),
            GltfImportError::Io(path, error) => write!(f, "{}: {}", path.display(), error),
            GltfImportError::InvalidScheme(error) => Display::fmt(error, f),
            GltfImportError::MissingBinaryChunk => write!(f, "Buffer refers to a missing GLB chunk"),
            GltfImportError::ResourceNotFound(uri) => write!(f, "Resource {} not found", uri),
            GltfImportError::ImageBufferOutOfBounds(index, end, length) => write!(
                f,
                "Buffer view of image #{} ends at {}, buffer has {} bytes",
                index, end, length
            ),
            GltfImportError::UnsupportedPrimitiveMode(mode) => {
                write!(f, "Unsupported primitive mode: {:?}", mode)
            }
        }
    }
}

impl Error for GltfImportError {}

impl From<gltf::Error> for GltfImportError {
    fn from(value: gltf::Error) -> Self {
        Self::Gltf(value)
    }
}

impl From<SchemeError> for GltfImportError {
    fn from(value: SchemeError) -> Self {
        Self::InvalidScheme(value)
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>, GltfImportError> {
    fs::read(path).map_err(|error| GltfImportError::Io(path.to_path_buf(), error))
}

fn load_buffers(gltf: &mut Gltf, base: Option<&Path>) -> Result<Vec<Vec<u8>>, GltfImportError> {
    let mut blob = gltf.blob.take();
    let mut buffers = Vec::new();
    for buffer in gltf.buffers() {
        let mut data = match buffer.source() {
            gltf::buffer::Source::Bin => blob.take().ok_or(GltfImportError::MissingBinaryChunk)?,
            gltf::buffer::Source::Uri(uri) => match Scheme::try_from(uri)? {
                Scheme::Data(_, data) => data,
                scheme => {
                    let path = scheme
                        .file_path(base)
                        .ok_or_else(|| GltfImportError::ResourceNotFound(uri.to_string()))?;
                    read_file(&path)?
                }
            },
        };
        // Pad the data to 4 bytes with zeroes
        while data.len() % 4 != 0 {
            data.push(0);
        }
        buffers.push(data);
    }
    Ok(buffers)
}

fn node_name(node: &Node) -> String {
    node.name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("node_{}", node.index()))
}

struct GltfSceneBuilder<'a> {
    document: &'a Document,
    buffers: &'a [Vec<u8>],
    options: &'a ImportOptions,
    scene: ImportedScene,
    /// Texture reference per image, either `*<embedded index>` or a path.
    image_refs: Vec<String>,
    mesh_cache: HashMap<(usize, Option<usize>), Vec<usize>>,
}

impl<'a> GltfSceneBuilder<'a> {
    fn new(document: &'a Document, buffers: &'a [Vec<u8>], options: &'a ImportOptions) -> Self {
        Self {
            document,
            buffers,
            options,
            scene: ImportedScene::new(ROOT_NODE_NAME),
            image_refs: Vec::new(),
            mesh_cache: HashMap::new(),
        }
    }

    fn buffer_data(&self) -> impl Clone + Fn(gltf::Buffer) -> Option<&'a [u8]> {
        let buffers = self.buffers;
        move |buffer: gltf::Buffer| buffers.get(buffer.index()).map(Vec::as_slice)
    }

    fn embed(&mut self, name: Option<&str>, data: Vec<u8>) -> String {
        let reference = format!("*{}", self.scene.embedded_textures.len());
        self.scene.embedded_textures.push(EmbeddedTexture {
            name: name.map(str::to_string),
            data: EmbeddedTextureData::Compressed(data),
        });
        reference
    }

    fn load_images(&mut self) -> Result<(), GltfImportError> {
        let document = self.document;
        let buffers = self.buffers;
        for image in document.images() {
            let reference = match image.source() {
                gltf::image::Source::View { view, .. } => {
                    let buffer = &buffers[view.buffer().index()];
                    let end = view.offset() + view.length();
                    let data = buffer.get(view.offset()..end).ok_or(
                        GltfImportError::ImageBufferOutOfBounds(image.index(), end, buffer.len()),
                    )?;
                    self.embed(image.name(), data.to_vec())
                }
                gltf::image::Source::Uri { uri, .. } => match Scheme::try_from(uri)? {
                    Scheme::Data(_, data) => self.embed(image.name(), data),
                    Scheme::Relative(path) | Scheme::Absolute(path) => path.to_string(),
                },
            };
            trace!("Image #{} resolves to {}", image.index(), reference);
            self.image_refs.push(reference);
        }
        Ok(())
    }

    fn texture_ref(&self, kind: SourceTextureKind, texture: gltf::Texture) -> Option<ImportedTextureRef> {
        let path = self.image_refs.get(texture.source().index())?.clone();
        Some(ImportedTextureRef { kind, path })
    }

    fn load_material(&self, material: gltf::Material) -> ImportedMaterial {
        let pbr = material.pbr_metallic_roughness();
        let mut textures = Vec::new();
        if let Some(info) = pbr.base_color_texture() {
            textures.extend(self.texture_ref(SourceTextureKind::Diffuse, info.texture()));
        }
        if let Some(info) = material.normal_texture() {
            textures.extend(self.texture_ref(SourceTextureKind::Normals, info.texture()));
        }
        if let Some(info) = material.occlusion_texture() {
            textures.extend(self.texture_ref(SourceTextureKind::AmbientOcclusion, info.texture()));
        }
        // Roughness lives in G and metalness in B of the same texture.
        if let Some(info) = pbr.metallic_roughness_texture() {
            textures.extend(self.texture_ref(SourceTextureKind::DiffuseRoughness, info.texture()));
            textures.extend(self.texture_ref(SourceTextureKind::Metalness, info.texture()));
        }

        ImportedMaterial {
            name: material.name().map(str::to_string),
            properties: PartialMaterialProperties {
                albedo: Some(Vec4::from_array(pbr.base_color_factor())),
                emission: Some(Vec3::from_array(material.emissive_factor())),
                metallic: Some(pbr.metallic_factor()),
                ..Default::default()
            },
            textures,
        }
    }

    /// Every joint of `skin` in skin order, including joints that weight no
    /// vertex of this primitive.
    fn load_bones(&self, primitive: &Primitive, skin: &Skin, vertex_count: usize) -> Vec<ImportedBone> {
        let reader = skin.reader(self.buffer_data());
        let inverse_bind_matrices: Vec<Mat4> = reader
            .read_inverse_bind_matrices()
            .map(|matrices| matrices.map(|matrix| Mat4::from_cols_array_2d(&matrix)).collect())
            .unwrap_or_default();
        let mut bones: Vec<ImportedBone> = skin
            .joints()
            .enumerate()
            .map(|(index, joint)| ImportedBone {
                name: node_name(&joint),
                offset: inverse_bind_matrices
                    .get(index)
                    .copied()
                    .unwrap_or(Mat4::IDENTITY),
                weights: Vec::new(),
            })
            .collect();

        let reader = primitive.reader(self.buffer_data());
        let (Some(joints), Some(weights)) = (reader.read_joints(0), reader.read_weights(0)) else {
            return bones;
        };
        for (vertex, (joints, weights)) in joints
            .into_u16()
            .zip(weights.into_f32())
            .take(vertex_count)
            .enumerate()
        {
            for (joint, weight) in joints.into_iter().zip(weights) {
                if weight <= 0.0 {
                    continue;
                }
                if let Some(bone) = bones.get_mut(joint as usize) {
                    bone.weights.push(VertexWeight {
                        vertex: vertex as u32,
                        weight,
                    });
                }
            }
        }
        bones
    }

    fn load_primitive(
        &self,
        name: Option<&str>,
        primitive: &Primitive,
        skin: Option<&Skin>,
    ) -> Result<Option<ImportedMesh>, GltfImportError> {
        let reader = primitive.reader(self.buffer_data());
        let Some(positions) = reader.read_positions() else {
            warn!("Primitive #{} of mesh {:?} has no positions", primitive.index(), name);
            return Ok(None);
        };
        let positions: Vec<Vec3> = positions.map(Vec3::from_array).collect();
        let vertex_count = positions.len();
        let sequence = || (0..vertex_count as u32).collect::<Vec<_>>();
        let indices = reader
            .read_indices()
            .map(|indices| indices.into_u32().collect::<Vec<_>>());

        let indices = match primitive.mode() {
            Mode::Triangles => indices.unwrap_or_default(),
            mode @ (Mode::TriangleStrip | Mode::TriangleFan) => {
                if !self.options.triangulate {
                    return Err(GltfImportError::UnsupportedPrimitiveMode(mode));
                }
                let indices = indices.unwrap_or_else(sequence);
                if mode == Mode::TriangleStrip {
                    triangulate_strip(&indices)
                } else {
                    triangulate_fan(&indices)
                }
            }
            mode => {
                warn!("Skipping primitive of mesh {:?} with mode {:?}", name, mode);
                return Ok(None);
            }
        };

        Ok(Some(ImportedMesh {
            name: name.map(str::to_string),
            normals: reader
                .read_normals()
                .map(|normals| normals.map(Vec3::from_array).collect())
                .unwrap_or_default(),
            tangents: reader
                .read_tangents()
                .map(|tangents| tangents.map(|[x, y, z, _w]| Vec3::new(x, y, z)).collect())
                .unwrap_or_default(),
            tex_coords: reader
                .read_tex_coords(0)
                .map(|tex_coords| tex_coords.into_f32().map(Vec2::from_array).collect())
                .unwrap_or_default(),
            indices,
            bones: skin
                .map(|skin| self.load_bones(primitive, skin, vertex_count))
                .unwrap_or_default(),
            material: primitive.material().index(),
            positions,
        }))
    }

    /// Meshes of the scene for one glTF mesh instanced with `skin`. Every
    /// primitive becomes its own mesh.
    fn load_mesh(&mut self, mesh: gltf::Mesh, skin: Option<Skin>) -> Result<Vec<usize>, GltfImportError> {
        let key = (mesh.index(), skin.as_ref().map(Skin::index));
        if let Some(indices) = self.mesh_cache.get(&key) {
            return Ok(indices.clone());
        }

        let mut indices = Vec::new();
        for primitive in mesh.primitives() {
            if let Some(imported) = self.load_primitive(mesh.name(), &primitive, skin.as_ref())? {
                indices.push(self.scene.meshes.len());
                self.scene.meshes.push(imported);
            }
        }
        self.mesh_cache.insert(key, indices.clone());
        Ok(indices)
    }

    fn load_nodes(&mut self) -> Result<(), GltfImportError> {
        let document = self.document;
        let Some(scene) = document.default_scene().or_else(|| document.scenes().next()) else {
            warn!("Document has no scene");
            return Ok(());
        };

        let roots: Vec<Node> = scene.nodes().collect();
        let mut stack: Vec<(Node, usize)> = roots.into_iter().rev().map(|node| (node, self.scene.root)).collect();
        let mut visited = HashSet::new();
        while let Some((node, parent)) = stack.pop() {
            if !visited.insert(node.index()) {
                warn!("Node #{} is reachable more than once, skipping", node.index());
                continue;
            }
            let mut imported = ImportedNode::new(
                node_name(&node),
                Mat4::from_cols_array_2d(&node.transform().matrix()),
            );
            if let Some(mesh) = node.mesh() {
                imported.meshes = self.load_mesh(mesh, node.skin())?;
            }
            let index = self.scene.add_node(parent, imported);
            let children: Vec<Node> = node.children().collect();
            stack.extend(children.into_iter().rev().map(|child| (child, index)));
        }
        Ok(())
    }

    fn load_animation(&self, animation: gltf::Animation) -> ImportedAnimation {
        fn keys<T>(times: &[f32], values: impl Iterator<Item = T>, cubic: bool) -> Vec<ImportedKey<T>> {
            // Cubic spline outputs hold in-tangent, value and out-tangent.
            let (skip, step) = if cubic { (1, 3) } else { (0, 1) };
            times
                .iter()
                .zip(values.skip(skip).step_by(step))
                .map(|(time, value)| ImportedKey { time: *time, value })
                .collect()
        }

        let mut channels: Vec<ImportedChannel> = Vec::new();
        let mut duration_ticks: f32 = 0.0;
        for channel in animation.channels() {
            let reader = channel.reader(self.buffer_data());
            let (Some(inputs), Some(outputs)) = (reader.read_inputs(), reader.read_outputs()) else {
                continue;
            };
            let times: Vec<f32> = inputs.map(|time| time * TICKS_PER_SECOND).collect();
            duration_ticks = times.iter().copied().fold(duration_ticks, f32::max);
            let cubic = channel.sampler().interpolation() == Interpolation::CubicSpline;

            let name = node_name(&channel.target().node());
            let index = match channels.iter().position(|channel| channel.node_name == name) {
                Some(index) => index,
                None => {
                    channels.push(ImportedChannel {
                        node_name: name,
                        ..Default::default()
                    });
                    channels.len() - 1
                }
            };
            let target = &mut channels[index];
            match outputs {
                ReadOutputs::Translations(values) => target
                    .positions
                    .extend(keys(&times, values.map(Vec3::from_array), cubic)),
                ReadOutputs::Rotations(values) => target
                    .rotations
                    .extend(keys(&times, values.into_f32().map(Quat::from_array), cubic)),
                ReadOutputs::Scales(values) => target
                    .scales
                    .extend(keys(&times, values.map(Vec3::from_array), cubic)),
                ReadOutputs::MorphTargetWeights(_) => {
                    trace!("Skipping morph target channel of {}", target.node_name)
                }
            }
        }

        ImportedAnimation {
            name: animation
                .name()
                .map(str::to_string)
                .unwrap_or_else(|| format!("animation_{}", animation.index())),
            duration_ticks,
            ticks_per_second: TICKS_PER_SECOND,
            channels,
        }
    }

    fn build(mut self) -> Result<ImportedScene, GltfImportError> {
        self.load_images()?;
        let document = self.document;
        self.scene.materials = document
            .materials()
            .map(|material| self.load_material(material))
            .collect();
        self.load_nodes()?;
        self.scene.animations = document
            .animations()
            .map(|animation| self.load_animation(animation))
            .collect();

        apply_import_options(&mut self.scene, self.options);
        Ok(self.scene)
    }
}

/// Imports glTF 2.0 files, both JSON with external or embedded buffers and
/// binary GLB.
///
/// Only data URIs, absolute (file://) and relative paths are supported.
/// Relative buffers cannot be resolved when importing from memory.
#[derive(Debug, Default, Clone, Copy)]
pub struct GltfImporter;

impl GltfImporter {
    fn import(&self, data: &[u8], base: Option<&Path>, options: &ImportOptions) -> Result<ImportedScene, GltfImportError> {
        let mut gltf = Gltf::from_slice(data)?;
        let buffers = load_buffers(&mut gltf, base)?;
        GltfSceneBuilder::new(&gltf.document, &buffers, options).build()
    }
}

impl SceneImporter for GltfImporter {
    type Error = GltfImportError;

    fn import_file(&mut self, path: &Path, options: &ImportOptions) -> Result<ImportedScene, GltfImportError> {
        let data = read_file(path)?;
        self.import(&data, path.parent(), options)
    }

    fn import_memory(&mut self, data: &[u8], options: &ImportOptions) -> Result<ImportedScene, GltfImportError> {
        self.import(data, None, options)
    }
}
