//! The pixel surface handed to the compositor, and its release

use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};
use strum::Display;

/// Pixel layouts a surface can carry.
///
/// Discriminants match the pixelflinger enumeration the compositor expects.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive, Display)]
#[repr(u32)]
pub enum PixelFormat {
    #[strum(to_string = "RGBA_8888")]
    Rgba8888 = 1,
    #[strum(to_string = "RGBX_8888")]
    Rgbx8888 = 2,
    #[strum(to_string = "BGRA_8888")]
    Bgra8888 = 5,
}

/// Byte order of the red and blue channels in the 4-byte output pixel.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelOrder {
    #[default]
    Rgba,
    Bgra,
}

impl ChannelOrder {
    /// Lay out one pixel in this order.
    #[inline(always)]
    pub fn arrange(self, r: u8, g: u8, b: u8, a: u8) -> [u8; 4] {
        match self {
            ChannelOrder::Rgba => [r, g, b, a],
            ChannelOrder::Bgra => [b, g, r, a],
        }
    }

    /// Format tag for sources that carry (or gain) an alpha channel.
    pub fn alpha_format(self) -> PixelFormat {
        match self {
            ChannelOrder::Rgba => PixelFormat::Rgba8888,
            ChannelOrder::Bgra => PixelFormat::Bgra8888,
        }
    }
}

/// Fixed header describing a surface, laid out as the compositor reads it.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(C)]
pub struct SurfaceHeader {
    /// Size of this header in bytes; doubles as the layout version marker.
    pub version: u32,
    pub width: u32,
    pub height: u32,
    /// Pixels per row, not bytes.
    pub stride: u32,
    pub format: PixelFormat,
    /// Offset of the pixel payload from the start of the header.
    pub data_offset: u32,
}

impl SurfaceHeader {
    pub const SIZE: usize = std::mem::size_of::<SurfaceHeader>();

    fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            version: Self::SIZE as u32,
            width,
            height,
            stride: width,
            format,
            data_offset: Self::SIZE as u32,
        }
    }

    fn to_le_bytes(self) -> [u8; SurfaceHeader::SIZE] {
        let fields = [
            self.version,
            self.width,
            self.height,
            self.stride,
            self.format.into(),
            self.data_offset,
        ];
        let mut out = [0u8; Self::SIZE];
        for (chunk, field) in out.chunks_exact_mut(4).zip(fields) {
            chunk.copy_from_slice(&field.to_le_bytes());
        }
        out
    }
}

/// A decoded image: 4 bytes per pixel, row-major, rows packed back to back.
///
/// Surfaces have a single owner and are never cloned; hand one to
/// [`release`] (or drop it) to free the pixel buffer.
#[derive(Debug, PartialEq, Eq)]
pub struct Surface {
    header: SurfaceHeader,
    data: Box<[u8]>,
}

impl Surface {
    pub const BYTES_PER_PIXEL: usize = 4;

    /// Bytes needed for a `width` x `height` payload, or `None` on overflow.
    pub fn payload_size(width: u32, height: u32) -> Option<usize> {
        (width as usize)
            .checked_mul(height as usize)?
            .checked_mul(Self::BYTES_PER_PIXEL)
    }

    /// Header plus payload, the size of the single block a surface occupies.
    pub fn allocation_size(width: u32, height: u32) -> Option<usize> {
        Self::payload_size(width, height)?.checked_add(SurfaceHeader::SIZE)
    }

    pub(crate) fn new(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Self {
        debug_assert_eq!(Some(data.len()), Self::payload_size(width, height));
        Self {
            header: SurfaceHeader::new(width, height, format),
            data: data.into_boxed_slice(),
        }
    }

    pub fn width(&self) -> u32 {
        self.header.width
    }

    pub fn height(&self) -> u32 {
        self.header.height
    }

    pub fn stride(&self) -> u32 {
        self.header.stride
    }

    pub fn format(&self) -> PixelFormat {
        self.header.format
    }

    pub fn format_tag_size(&self) -> u32 {
        self.header.version
    }

    pub fn header(&self) -> &SurfaceHeader {
        &self.header
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn row(&self, y: u32) -> Option<&[u8]> {
        if y >= self.header.height {
            return None;
        }
        let row_bytes = self.header.stride as usize * Self::BYTES_PER_PIXEL;
        let start = y as usize * row_bytes;
        self.data.get(start..start + row_bytes)
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.header.width {
            return None;
        }
        let offset = x as usize * Self::BYTES_PER_PIXEL;
        let px = self.row(y)?.get(offset..offset + Self::BYTES_PER_PIXEL)?;
        Some([px[0], px[1], px[2], px[3]])
    }

    /// Header (little-endian) immediately followed by the pixel payload.
    pub fn to_block(&self) -> Vec<u8> {
        let mut block = Vec::with_capacity(SurfaceHeader::SIZE + self.data.len());
        block.extend_from_slice(&self.header.to_le_bytes());
        block.extend_from_slice(&self.data);
        block
    }
}

/// Free a surface and clear the caller's handle.
///
/// Releasing an empty handle does nothing, so a second call is harmless.
pub fn release(surface: &mut Option<Surface>) {
    let Some(surface) = surface.take() else {
        return;
    };

    let header = surface.header();
    log::debug!(
        "releasing surface: version={} width={} height={} stride={} format={} bytes={}",
        header.version,
        header.width,
        header.height,
        header.stride,
        header.format,
        surface.data().len()
    );
    drop(surface);
}
