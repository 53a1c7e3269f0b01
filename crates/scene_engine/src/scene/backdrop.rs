use serde::{Deserialize, Serialize};

const fn make_tag(a: u8, b: u8, c: u8, d: u8) -> u32 {
    ((a as u32) << 24) | ((b as u32) << 16) | ((c as u32) << 8) | d as u32
}

/// Four-character pixel format tag carried by bitmap headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PixelFormat(pub u32);

impl PixelFormat {
    pub const RGB565: Self = Self(make_tag(b'C', b'B', 0x05, 0x65));
    pub const ARGB8888: Self = Self(make_tag(b'C', b'B', 0x88, 0x88));
    pub const ARGB8008: Self = Self(make_tag(b'C', b'B', 0x80, 0x08));
    pub const RGB888: Self = Self(make_tag(b'C', b'B', 0x08, 0x88));

    pub fn is_high_bit_depth(self) -> bool {
        self == Self::ARGB8888 || self == Self::ARGB8008 || self == Self::RGB888
    }
}

impl Default for PixelFormat {
    fn default() -> Self {
        Self::RGB565
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TileInfo {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

pub const BITMAP_HEADER_LEN: usize = 48;
const BITMAP_HEADER_PREFIX_LEN: usize = 16;

/// Minimal bitmap header handed to the compositor; carries no pixel data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BitmapHeader {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub pixels: u32,
    pub format: PixelFormat,
    pub flags: u32,
}

impl BitmapHeader {
    pub fn to_bytes(&self) -> [u8; BITMAP_HEADER_LEN] {
        let mut out = [0u8; BITMAP_HEADER_LEN];
        let fields = [
            self.x as u32,
            self.y as u32,
            self.width,
            self.height,
            self.pixels,
            self.format.0,
            self.flags,
        ];
        for (slot, value) in fields.iter().enumerate() {
            let start = BITMAP_HEADER_PREFIX_LEN + slot * 4;
            out[start..start + 4].copy_from_slice(&value.to_le_bytes());
        }
        out
    }
}

/// Builds the full-scene backdrop header from a column-major walk of the
/// background tile grid. Tile `(column, row)` lives at `row * parts_x + column`.
///
/// Width sums the last tile of each column; height sums the tiles of the last
/// column. Any high-bit-depth tile tags the whole composite high-bit-depth.
pub fn compose_backdrop(parts_x: u32, parts_y: u32, tiles: &[TileInfo]) -> BitmapHeader {
    let mut high_bit_depth = false;
    let mut width = 0u32;
    let mut height = 0u32;

    for column in 0..parts_x {
        height = 0;
        let mut last = TileInfo::default();
        for row in 0..parts_y {
            let index = (row * parts_x + column) as usize;
            let Some(tile) = tiles.get(index) else {
                continue;
            };
            height = height.saturating_add(tile.height);
            high_bit_depth |= tile.format.is_high_bit_depth();
            last = *tile;
        }
        width = width.saturating_add(last.width);
    }

    BitmapHeader {
        width,
        height,
        format: if high_bit_depth {
            PixelFormat::ARGB8888
        } else {
            PixelFormat::RGB565
        },
        ..BitmapHeader::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tile(format: PixelFormat) -> TileInfo {
        TileInfo {
            width: 400,
            height: 300,
            format,
        }
    }

    #[test]
    fn default_tiles_produce_default_backdrop_format() {
        let tiles = vec![tile(PixelFormat::RGB565); 4];
        let header = compose_backdrop(2, 2, &tiles);
        assert_eq!(header.format, PixelFormat::RGB565);
        assert_eq!(header.width, 800);
        assert_eq!(header.height, 600);
    }

    #[test]
    fn single_high_bit_depth_tile_promotes_backdrop() {
        for high in [
            PixelFormat::ARGB8888,
            PixelFormat::ARGB8008,
            PixelFormat::RGB888,
        ] {
            let mut tiles = vec![tile(PixelFormat::RGB565); 4];
            tiles[3] = tile(high);
            let header = compose_backdrop(2, 2, &tiles);
            assert_eq!(header.format, PixelFormat::ARGB8888);
        }
    }

    #[test]
    fn header_bytes_start_after_zero_prefix() {
        let header = BitmapHeader {
            width: 800,
            height: 600,
            format: PixelFormat::RGB565,
            ..BitmapHeader::default()
        };
        let bytes = header.to_bytes();
        assert!(bytes[..16].iter().all(|byte| *byte == 0));
        assert_eq!(&bytes[24..28], &800u32.to_le_bytes());
        assert_eq!(&bytes[28..32], &600u32.to_le_bytes());
        assert_eq!(&bytes[36..40], &PixelFormat::RGB565.0.to_le_bytes());
    }
}
