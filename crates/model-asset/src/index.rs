use std::{
    fmt::{self, Display, Formatter},
    path::{Path, PathBuf},
};

/// Stable handle of a texture owned by an [`AssetRegistry`](crate::registry::AssetRegistry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TextureHandle(pub(crate) u32);

/// Stable handle of a model owned by an [`AssetRegistry`](crate::registry::AssetRegistry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModelHandle(pub(crate) u32);

impl TextureHandle {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl ModelHandle {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl Display for TextureHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "texture #{}", self.0)
    }
}

impl Display for ModelHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "model #{}", self.0)
    }
}

/// Where an asset came from. Only file assets take part in deduplication.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AssetSource {
    File(PathBuf),
    Memory,
    /// Built-in assets such as the default material textures.
    Builtin(&'static str),
}

impl AssetSource {
    pub fn path(&self) -> Option<&Path> {
        match self {
            AssetSource::File(path) => Some(path),
            AssetSource::Memory | AssetSource::Builtin(_) => None,
        }
    }
}

impl Display for AssetSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            AssetSource::File(path) => Display::fmt(&path.display(), f),
            AssetSource::Memory => write!(f, "<memory>"),
            AssetSource::Builtin(name) => write!(f, "{}", name),
        }
    }
}
