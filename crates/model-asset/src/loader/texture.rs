use std::{
    error::Error,
    fmt::{self, Display, Formatter},
    io::Cursor,
    path::Path,
};

use image::{DynamicImage, GenericImageView, ImageError, ImageReader};
use log::trace;

use crate::{
    index::{AssetSource, TextureHandle},
    registry::AssetRegistry,
    scene::{EmbeddedTexture, EmbeddedTextureData},
    texture::{Bitmap, TextureAsset},
};

use super::TextureLoadParams;

/// Image codec consumed by the texture loader.
pub trait ImageDecoder {
    type Error: Error;

    fn decode_file(&mut self, path: &Path, flip_vertically: bool) -> Result<Bitmap, Self::Error>;

    fn decode_memory(&mut self, data: &[u8], flip_vertically: bool) -> Result<Bitmap, Self::Error>;
}

/// [`ImageDecoder`] backed by the `image` crate. Formats are guessed from
/// the content.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageCodec;

impl ImageCodec {
    fn into_bitmap(image: DynamicImage, flip_vertically: bool) -> Bitmap {
        let image = if flip_vertically { image.flipv() } else { image };
        let size = image.dimensions();
        let (components, pixels) = match image {
            DynamicImage::ImageLuma8(image) => (1, image.into_raw()),
            DynamicImage::ImageLumaA8(image) => (2, image.into_raw()),
            DynamicImage::ImageRgb8(image) => (3, image.into_raw()),
            DynamicImage::ImageRgba8(image) => (4, image.into_raw()),
            image => (4, image.into_rgba8().into_raw()),
        };
        Bitmap::new(pixels, components, size)
    }
}

impl ImageDecoder for ImageCodec {
    type Error = ImageError;

    fn decode_file(&mut self, path: &Path, flip_vertically: bool) -> Result<Bitmap, ImageError> {
        let image = ImageReader::open(path)?.with_guessed_format()?.decode()?;
        Ok(Self::into_bitmap(image, flip_vertically))
    }

    fn decode_memory(&mut self, data: &[u8], flip_vertically: bool) -> Result<Bitmap, ImageError> {
        let reader = ImageReader::new(Cursor::new(data));
        let image = reader.with_guessed_format()?.decode()?;
        Ok(Self::into_bitmap(image, flip_vertically))
    }
}

#[derive(Debug)]
pub enum TextureLoadError<E> {
    Decode(E),
    EmptyImage,
    BadRawTexels(usize, usize),
}

impl<E: Display> Display for TextureLoadError<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            TextureLoadError::Decode(err) => Display::fmt(&err, f),
            TextureLoadError::EmptyImage => write!(f, "Image has no pixels"),
            TextureLoadError::BadRawTexels(expected, actual) => write!(
                f,
                "Raw texture should have {} texels, but got {}",
                expected, actual
            ),
        }
    }
}

impl<E: Error> Error for TextureLoadError<E> {}

/// Loads textures into a registry, reusing textures already loaded from the
/// same path.
#[derive(Debug, Default)]
pub struct TextureLoader<D> {
    decoder: D,
}

impl<D: ImageDecoder> TextureLoader<D> {
    pub fn new(decoder: D) -> Self {
        Self { decoder }
    }

    pub fn decoder(&self) -> &D {
        &self.decoder
    }

    fn check_bitmap(bitmap: Bitmap) -> Result<Bitmap, TextureLoadError<D::Error>> {
        if bitmap.size.0 == 0 || bitmap.size.1 == 0 {
            return Err(TextureLoadError::EmptyImage);
        }
        Ok(bitmap)
    }

    /// Load the image at `path`. The colour space of a cached texture is the
    /// one it was first loaded with.
    pub fn load_from_file(
        &mut self,
        registry: &mut AssetRegistry,
        path: &Path,
        srgb: bool,
        params: &TextureLoadParams,
    ) -> Result<TextureHandle, TextureLoadError<D::Error>> {
        if let Some(handle) = registry.texture_by_path(path) {
            trace!("Texture {} already loaded as {}", path.display(), handle);
            return Ok(handle);
        }

        let bitmap = self
            .decoder
            .decode_file(path, params.flip_vertically)
            .map_err(TextureLoadError::Decode)?;
        let bitmap = Self::check_bitmap(bitmap)?;
        let texture = TextureAsset::new(AssetSource::File(path.to_path_buf()), bitmap, srgb);
        Ok(registry.insert_texture(texture))
    }

    /// Load a texture stored inside a model file. Encoded images go through
    /// the decoder, raw texels are taken as they are.
    pub fn load_embedded(
        &mut self,
        registry: &mut AssetRegistry,
        texture: &EmbeddedTexture,
        srgb: bool,
        params: &TextureLoadParams,
    ) -> Result<TextureHandle, TextureLoadError<D::Error>> {
        let bitmap = match &texture.data {
            EmbeddedTextureData::Compressed(data) => self
                .decoder
                .decode_memory(data, params.flip_vertically)
                .map_err(TextureLoadError::Decode)?,
            EmbeddedTextureData::Raw { size, texels } => {
                let expected = (size.0 * size.1) as usize;
                if texels.len() != expected {
                    return Err(TextureLoadError::BadRawTexels(expected, texels.len()));
                }
                Bitmap::new(texels.iter().flatten().copied().collect(), 4, *size)
            }
        };
        let bitmap = Self::check_bitmap(bitmap)?;
        Ok(registry.insert_texture(TextureAsset::new(AssetSource::Memory, bitmap, srgb)))
    }
}
