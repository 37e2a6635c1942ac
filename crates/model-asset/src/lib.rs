//! Import and processing pipeline for 3D model assets.
//!
//! Scene importers (glTF, OBJ) produce a raw [`scene::ImportedScene`]. The
//! loader completes the geometry of every mesh, collects the skeleton,
//! deduplicates vertices, bakes static transforms, resolves materials and
//! builds animation tracks, then stores the result in an
//! [`registry::AssetRegistry`] that deduplicates models and textures by path.
//!
pub mod animation;
pub mod index;
/// Scene importers, image decoding and the model pipeline
pub mod loader;
pub mod material;
pub mod mesh;
pub mod model;
pub mod node;
pub mod normal;
pub mod optimize;
pub mod primitive;
pub mod registry;
pub mod scene;
pub mod skin;
pub mod tangent;
pub mod texture;
