//! Memory-mapped display buffer.
//!
//! Layout, as offsets from the base address:
//!
//! | Offset             | Size                  | Contents                           |
//! | ------------------ | --------------------- | ---------------------------------- |
//! | `0`                | 1                     | display mode                       |
//! | `1`                | `columns * rows`      | text cells, one character per byte |
//! | `graphics_offset`  | `width * height * 4`  | pixels, one little-endian word each |
//!
//! `graphics_offset` is the first word-aligned offset after the text cells, so that every pixel
//! can be accessed with a single aligned word access.

use super::Memory;
use crate::address_range::{AddressRange, InvalidBoundsError};
use crate::bus::{AccessWidth, MemoryDevice, MemoryError};
use crate::Alignment;

/// Fixed base address of the video device.
pub const BASE: u32 = 0x2000_0000;

/// Bytes per pixel in the graphics buffer.
pub const BYTES_PER_PIXEL: u32 = 4;

/// Offset of the text cells within the device.
pub const TEXT_OFFSET: u32 = 1;

/// Display modes software can select by writing the mode byte.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Mode {
    Text,
    Graphics,
    /// Any mode byte without a defined meaning.
    Other(u8),
}

impl From<u8> for Mode {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::Text,
            1 => Self::Graphics,
            other => Self::Other(other),
        }
    }
}

/// Geometry of the text and graphics buffers.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct VideoConfig {
    pub text_columns: u32,
    pub text_rows: u32,
    pub width: u32,
    pub height: u32,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            text_columns: 80,
            text_rows: 25,
            width: 320,
            height: 200,
        }
    }
}

impl VideoConfig {
    /// Number of bytes in the text buffer, or `None` on overflow.
    pub fn text_len(&self) -> Option<u32> {
        self.text_columns.checked_mul(self.text_rows)
    }

    /// Offset of the first pixel, or `None` on overflow.
    pub fn graphics_offset(&self) -> Option<u32> {
        TEXT_OFFSET
            .checked_add(self.text_len()?)
            .and_then(|end| Alignment::WORD.align_up(end))
    }

    /// Number of bytes in the graphics buffer, or `None` on overflow.
    pub fn graphics_len(&self) -> Option<u32> {
        self.width
            .checked_mul(self.height)?
            .checked_mul(BYTES_PER_PIXEL)
    }

    /// Total size of the device, or `None` on overflow.
    pub fn size(&self) -> Option<u32> {
        self.graphics_offset()?.checked_add(self.graphics_len()?)
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Video {
    config: VideoConfig,
    memory: Memory,
}

impl Video {
    /// Create a blank display buffer at `base` with the given geometry.
    pub fn new(base: u32, config: VideoConfig) -> Result<Self, InvalidBoundsError> {
        // An overflowing size is passed on as 0, which is rejected as an empty range.
        let size = config.size().unwrap_or(0);
        Ok(Self {
            config,
            memory: Memory::new(base, size)?,
        })
    }

    pub fn config(&self) -> &VideoConfig {
        &self.config
    }

    /// Clears the mode byte and both buffers.
    pub fn reset(&mut self) {
        self.memory.clear();
    }

    pub fn mode(&self) -> Mode {
        Mode::from(self.memory.bytes()[0])
    }

    /// The text cells, row by row.
    pub fn text(&self) -> &[u8] {
        let start = TEXT_OFFSET as usize;
        let len = self.config.text_len().unwrap_or(0) as usize;
        &self.memory.bytes()[start..start + len]
    }

    /// The raw pixel bytes, row by row.
    pub fn framebuffer(&self) -> &[u8] {
        let start = self.config.graphics_offset().unwrap_or(0) as usize;
        &self.memory.bytes()[start..]
    }

    /// Returns the pixel at `(x, y)`, or `None` if it is outside the screen.
    pub fn pixel(&self, x: u32, y: u32) -> Option<u32> {
        if x >= self.config.width || y >= self.config.height {
            return None;
        }
        let offset = (y * self.config.width + x) * BYTES_PER_PIXEL;
        let address = self.base() + self.config.graphics_offset()? + offset;
        self.memory.read(address, AccessWidth::Word).ok()
    }

    /// The raw contents of the whole device, starting at its base address.
    pub fn bytes(&self) -> &[u8] {
        self.memory.bytes()
    }
}

impl MemoryDevice for Video {
    fn range(&self) -> AddressRange {
        self.memory.range()
    }

    fn read(&self, address: u32, width: AccessWidth) -> Result<u32, MemoryError> {
        self.memory.read(address, width)
    }

    fn write(&mut self, address: u32, value: u32, width: AccessWidth) -> Result<(), MemoryError> {
        self.memory.write(address, value, width)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_geometry() {
        let config = VideoConfig::default();
        assert_eq!(Some(2000), config.text_len());
        assert_eq!(Some(2004), config.graphics_offset());
        assert_eq!(Some(320 * 200 * 4), config.graphics_len());
        let video = Video::new(BASE, config).unwrap();
        assert_eq!(BASE, video.base());
        assert_eq!(2004 + 320 * 200 * 4, video.size());
        assert_eq!(2000, video.text().len());
        assert_eq!(320 * 200 * 4, video.framebuffer().len());
    }

    #[test]
    fn test_mode_and_text() {
        let mut video = Video::new(BASE, VideoConfig::default()).unwrap();
        assert_eq!(Mode::Text, video.mode());
        video.write(BASE, 1, AccessWidth::Byte).unwrap();
        assert_eq!(Mode::Graphics, video.mode());
        video.write(BASE + 1, b'H' as u32, AccessWidth::Byte).unwrap();
        video.write(BASE + 2, b'i' as u32, AccessWidth::Byte).unwrap();
        assert_eq!(b"Hi", &video.text()[..2]);
    }

    #[test]
    fn test_pixels() {
        let config = VideoConfig {
            text_columns: 4,
            text_rows: 1,
            width: 2,
            height: 2,
        };
        let mut video = Video::new(BASE, config).unwrap();
        assert_eq!(8 + 16, video.size());
        video.write(BASE + 8 + 12, 0x00FF_8000, AccessWidth::Word).unwrap();
        assert_eq!(Some(0x00FF_8000), video.pixel(1, 1));
        assert_eq!(Some(0), video.pixel(0, 0));
        assert_eq!(None, video.pixel(2, 0));
    }

    #[test]
    fn test_overflowing_geometry_rejected() {
        let config = VideoConfig {
            width: u32::MAX,
            ..VideoConfig::default()
        };
        assert!(Video::new(BASE, config).is_err());
    }
}
