use crate::index::AssetSource;

/// Decoded 8-bit pixel data, rows stored top to bottom unless the decoder
/// was asked to flip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    pub pixels: Vec<u8>,
    pub components: u32,
    pub size: (u32, u32),
}

impl Bitmap {
    pub fn new(pixels: Vec<u8>, components: u32, size: (u32, u32)) -> Self {
        debug_assert_eq!(
            pixels.len(),
            (components * size.0 * size.1) as usize,
            "bitmap buffer does not match its dimensions"
        );
        Self {
            pixels,
            components,
            size,
        }
    }

    /// A 1x1 RGB bitmap of a single grey level.
    pub fn solid(value: u8) -> Self {
        Self::new(vec![value; 3], 3, (1, 1))
    }

    /// An RGB checkerboard, `light` on even cells.
    pub fn checkerboard(size: u32, light: u8, dark: u8) -> Self {
        let pixels = (0..size)
            .flat_map(|y| (0..size).map(move |x| (x, y)))
            .flat_map(|(x, y)| {
                let value = if (x + y) % 2 == 0 { light } else { dark };
                [value; 3]
            })
            .collect();
        Self::new(pixels, 3, (size, size))
    }

    pub fn offset_of(&self, x: u32, y: u32) -> usize {
        (self.components * (y * self.size.0 + x)) as usize
    }

    pub fn pixel(&self, x: u32, y: u32) -> &[u8] {
        let offset = self.offset_of(x, y);
        &self.pixels[offset..offset + self.components as usize]
    }
}

#[derive(Debug, Clone)]
pub struct TextureAsset {
    pub source: AssetSource,
    pub bitmap: Bitmap,
    pub srgb: bool,
    pub mip_levels: u32,
}

impl TextureAsset {
    pub fn new(source: AssetSource, bitmap: Bitmap, srgb: bool) -> Self {
        let mip_levels = mip_level_count(bitmap.size);
        Self {
            source,
            bitmap,
            srgb,
            mip_levels,
        }
    }
}

/// Length of the full mip chain down to 1x1.
pub fn mip_level_count((width, height): (u32, u32)) -> u32 {
    let largest = width.max(height).max(1);
    u32::BITS - largest.leading_zeros()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_mip_level_count() {
        assert_eq!(mip_level_count((1, 1)), 1);
        assert_eq!(mip_level_count((8, 8)), 4);
        assert_eq!(mip_level_count((1024, 3)), 11);
        assert_eq!(mip_level_count((5, 3)), 3);
    }

    #[test]
    fn test_checkerboard() {
        let bitmap = Bitmap::checkerboard(8, 255, 125);
        assert_eq!(bitmap.pixels.len(), 8 * 8 * 3);
        assert_eq!(bitmap.pixel(0, 0), &[255, 255, 255]);
        assert_eq!(bitmap.pixel(1, 0), &[125, 125, 125]);
        assert_eq!(bitmap.pixel(0, 1), &[125, 125, 125]);
        assert_eq!(bitmap.pixel(7, 7), &[255, 255, 255]);
    }
}
