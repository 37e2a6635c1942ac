use std::ops::{Index, IndexMut};

use glam::{Vec3, Vec4};

use crate::index::TextureHandle;

/// Texture slots every resolved material carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureSlot {
    Albedo,
    Metallic,
    Roughness,
    Ambient,
    Normal,
    Displacement,
}

impl TextureSlot {
    pub const COUNT: usize = 6;
    pub const ALL: [TextureSlot; TextureSlot::COUNT] = [
        TextureSlot::Albedo,
        TextureSlot::Metallic,
        TextureSlot::Roughness,
        TextureSlot::Ambient,
        TextureSlot::Normal,
        TextureSlot::Displacement,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Texture kinds as the importer reports them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceTextureKind {
    Diffuse,
    Normals,
    Height,
    Displacement,
    AmbientOcclusion,
    DiffuseRoughness,
    Metalness,
}

impl SourceTextureKind {
    /// Only colour data is stored in sRGB.
    pub fn is_srgb(self) -> bool {
        matches!(self, SourceTextureKind::Diffuse)
    }
}

/// Resolution order. A slot filled by an earlier entry is never
/// overwritten, so height maps only land in `Normal` when no normal map
/// exists.
pub const SLOT_SOURCES: [(SourceTextureKind, TextureSlot); 7] = [
    (SourceTextureKind::Diffuse, TextureSlot::Albedo),
    (SourceTextureKind::Normals, TextureSlot::Normal),
    (SourceTextureKind::Height, TextureSlot::Normal),
    (SourceTextureKind::Displacement, TextureSlot::Displacement),
    (SourceTextureKind::AmbientOcclusion, TextureSlot::Ambient),
    (SourceTextureKind::DiffuseRoughness, TextureSlot::Roughness),
    (SourceTextureKind::Metalness, TextureSlot::Metallic),
];

/// One texture per slot, indexed by [`TextureSlot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaterialTextures<T>(pub [T; TextureSlot::COUNT]);

impl<T> Index<TextureSlot> for MaterialTextures<T> {
    type Output = T;

    fn index(&self, slot: TextureSlot) -> &T {
        &self.0[slot.index()]
    }
}

impl<T> IndexMut<TextureSlot> for MaterialTextures<T> {
    fn index_mut(&mut self, slot: TextureSlot) -> &mut T {
        &mut self.0[slot.index()]
    }
}

impl Default for MaterialTextures<Option<TextureHandle>> {
    fn default() -> Self {
        Self([None; TextureSlot::COUNT])
    }
}

impl MaterialTextures<Option<TextureHandle>> {
    /// Fill every empty slot from `fallback`.
    pub fn complete(self, fallback: &MaterialTextures<TextureHandle>) -> MaterialTextures<TextureHandle> {
        MaterialTextures(TextureSlot::ALL.map(|slot| self[slot].unwrap_or(fallback[slot])))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MaterialProperties {
    pub ambient: Vec3,
    pub albedo: Vec4,
    pub specular: Vec3,
    pub emission: Vec3,
    pub shininess: f32,
    pub metallic: f32,
    pub ior: f32,
}

impl Default for MaterialProperties {
    fn default() -> Self {
        Self {
            ambient: Vec3::splat(0.1),
            albedo: Vec4::new(0.8, 0.8, 0.8, 1.0),
            specular: Vec3::splat(0.5),
            emission: Vec3::ZERO,
            shininess: 32.0,
            metallic: 0.0,
            ior: 1.5,
        }
    }
}

/// Material properties as far as the source file specifies them.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PartialMaterialProperties {
    pub ambient: Option<Vec3>,
    pub albedo: Option<Vec4>,
    pub specular: Option<Vec3>,
    pub emission: Option<Vec3>,
    pub shininess: Option<f32>,
    pub metallic: Option<f32>,
    pub ior: Option<f32>,
}

impl PartialMaterialProperties {
    pub fn or(&self, defaults: &MaterialProperties) -> MaterialProperties {
        MaterialProperties {
            ambient: self.ambient.unwrap_or(defaults.ambient),
            albedo: self.albedo.unwrap_or(defaults.albedo),
            specular: self.specular.unwrap_or(defaults.specular),
            emission: self.emission.unwrap_or(defaults.emission),
            shininess: self.shininess.unwrap_or(defaults.shininess),
            metallic: self.metallic.unwrap_or(defaults.metallic),
            ior: self.ior.unwrap_or(defaults.ior),
        }
    }
}

/// A fully resolved material. All six texture slots are always populated.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialAsset {
    pub textures: MaterialTextures<TextureHandle>,
    pub properties: MaterialProperties,
}

impl MaterialAsset {
    pub fn texture(&self, slot: TextureSlot) -> TextureHandle {
        self.textures[slot]
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_complete_keeps_filled_slots() {
        let fallback = MaterialTextures(TextureSlot::ALL.map(|slot| TextureHandle(slot as u32)));
        let mut partial = MaterialTextures::default();
        partial[TextureSlot::Normal] = Some(TextureHandle(42));

        let complete = partial.complete(&fallback);
        assert_eq!(complete[TextureSlot::Normal], TextureHandle(42));
        assert_eq!(complete[TextureSlot::Albedo], TextureHandle(0));
        assert_eq!(complete[TextureSlot::Displacement], TextureHandle(5));
    }

    #[test]
    fn test_partial_properties_fallback() {
        let partial = PartialMaterialProperties {
            shininess: Some(8.0),
            ..Default::default()
        };
        let properties = partial.or(&MaterialProperties::default());
        assert_eq!(properties.shininess, 8.0);
        assert_eq!(properties.ior, 1.5);
        assert_eq!(properties.albedo, Vec4::new(0.8, 0.8, 0.8, 1.0));
    }

    #[test]
    fn test_height_never_overrides_normal() {
        let normal_position = SLOT_SOURCES
            .iter()
            .position(|(kind, _)| *kind == SourceTextureKind::Normals);
        let height_position = SLOT_SOURCES
            .iter()
            .position(|(kind, _)| *kind == SourceTextureKind::Height);
        assert!(normal_position < height_position);
    }
}
