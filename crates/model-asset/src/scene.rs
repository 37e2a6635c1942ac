//! Read-only scene description handed over by an importer.
//!
//! This is the boundary between format specific adapters (see
//! [`loader`](crate::loader)) and the processing pipeline. Everything here is
//! raw: attributes may be missing, bones are reported per mesh, and animation
//! keys come in whatever order the file stored them.

use std::{error::Error, path::Path};

use glam::{Mat4, Quat, Vec2, Vec3};

use crate::material::{PartialMaterialProperties, SourceTextureKind};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VertexWeight {
    pub vertex: u32,
    pub weight: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportedBone {
    pub name: String,
    /// Mesh space to bone space in bind pose.
    pub offset: Mat4,
    pub weights: Vec<VertexWeight>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportedMesh {
    pub name: Option<String>,
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub tangents: Vec<Vec3>,
    pub tex_coords: Vec<Vec2>,
    /// Triangle list. Empty means every three consecutive vertices form a
    /// triangle.
    pub indices: Vec<u32>,
    pub bones: Vec<ImportedBone>,
    pub material: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportedTextureRef {
    pub kind: SourceTextureKind,
    /// Either a path relative to the model file or an embedded texture
    /// reference such as `*0`.
    pub path: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportedMaterial {
    pub name: Option<String>,
    pub properties: PartialMaterialProperties,
    pub textures: Vec<ImportedTextureRef>,
}

impl ImportedMaterial {
    /// First texture of the given kind. Additional textures of one kind are
    /// not supported.
    pub fn texture(&self, kind: SourceTextureKind) -> Option<&str> {
        self.textures
            .iter()
            .find(|texture| texture.kind == kind)
            .map(|texture| texture.path.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EmbeddedTextureData {
    /// An encoded image file (PNG, JPEG, ...).
    Compressed(Vec<u8>),
    /// Uncompressed RGBA8 texels, row by row.
    Raw { size: (u32, u32), texels: Vec<[u8; 4]> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedTexture {
    pub name: Option<String>,
    pub data: EmbeddedTextureData,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportedNode {
    pub name: String,
    pub transform: Mat4,
    pub children: Vec<usize>,
    pub meshes: Vec<usize>,
}

impl ImportedNode {
    pub fn new(name: impl Into<String>, transform: Mat4) -> Self {
        Self {
            name: name.into(),
            transform,
            children: Vec::new(),
            meshes: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImportedKey<T> {
    pub time: f32,
    pub value: T,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportedChannel {
    pub node_name: String,
    pub positions: Vec<ImportedKey<Vec3>>,
    pub rotations: Vec<ImportedKey<Quat>>,
    pub scales: Vec<ImportedKey<Vec3>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportedAnimation {
    pub name: String,
    pub duration_ticks: f32,
    pub ticks_per_second: f32,
    pub channels: Vec<ImportedChannel>,
}

impl ImportedAnimation {
    pub fn channel(&self, node_name: &str) -> Option<&ImportedChannel> {
        self.channels
            .iter()
            .find(|channel| channel.node_name == node_name)
    }
}

/// Node tree stored as an arena, `root` indexing into `nodes`.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportedScene {
    pub meshes: Vec<ImportedMesh>,
    pub materials: Vec<ImportedMaterial>,
    pub embedded_textures: Vec<EmbeddedTexture>,
    pub nodes: Vec<ImportedNode>,
    pub root: usize,
    pub animations: Vec<ImportedAnimation>,
}

impl ImportedScene {
    /// A scene holding only an identity root node.
    pub fn new(root_name: impl Into<String>) -> Self {
        Self {
            meshes: Vec::new(),
            materials: Vec::new(),
            embedded_textures: Vec::new(),
            nodes: vec![ImportedNode::new(root_name, Mat4::IDENTITY)],
            root: 0,
            animations: Vec::new(),
        }
    }

    pub fn root_node(&self) -> &ImportedNode {
        &self.nodes[self.root]
    }

    /// Append `node` as the last child of `parent`, returning its index.
    pub fn add_node(&mut self, parent: usize, node: ImportedNode) -> usize {
        let index = self.nodes.len();
        self.nodes.push(node);
        self.nodes[parent].children.push(index);
        index
    }

    /// Look up an embedded texture by `*<index>` reference or by name.
    pub fn embedded_texture(&self, reference: &str) -> Option<(usize, &EmbeddedTexture)> {
        if let Some(index) = reference
            .strip_prefix('*')
            .and_then(|index| index.parse::<usize>().ok())
        {
            return self.embedded_textures.get(index).map(|texture| (index, texture));
        }
        let file_name = Path::new(reference).file_name();
        self.embedded_textures
            .iter()
            .enumerate()
            .find(|(_, texture)| {
                texture.name.as_deref().is_some_and(|name| {
                    name == reference || Path::new(name).file_name() == file_name
                })
            })
    }
}

/// Flags forwarded to the importer.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ImportOptions {
    pub triangulate: bool,
    /// Importers ignore this flag. Missing normals are always synthesized
    /// after import.
    pub generate_normals: bool,
    /// Importers ignore this flag. Missing texture coordinates are always
    /// synthesized after import.
    pub generate_uvs: bool,
    /// Importers ignore this flag, indices are 32 bit and meshes are never
    /// split.
    pub split_large_meshes: bool,
    /// Keep only the four strongest influences per vertex.
    pub limit_bone_weights: bool,
    pub flip_winding_order: bool,
    pub flip_uvs: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            triangulate: true,
            generate_normals: true,
            generate_uvs: true,
            split_large_meshes: true,
            limit_bone_weights: true,
            flip_winding_order: false,
            flip_uvs: false,
        }
    }
}

/// Format parser producing an [`ImportedScene`].
pub trait SceneImporter {
    type Error: Error;

    fn import_file(&mut self, path: &Path, options: &ImportOptions) -> Result<ImportedScene, Self::Error>;

    fn import_memory(&mut self, data: &[u8], options: &ImportOptions) -> Result<ImportedScene, Self::Error>;
}
