//! Signature check and header validation

use std::io::{self, Read};

use png::{BitDepth, ColorType, Transformations};

use crate::error::{DecodeError, ErrorKind};
use crate::surface::{ChannelOrder, PixelFormat};

pub(crate) const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];

/// Read the leading signature block and make sure it is a PNG.
pub(crate) fn check_signature<R: Read>(source: &mut R) -> Result<(), DecodeError> {
    let mut signature = [0u8; PNG_SIGNATURE.len()];
    let mut filled = 0;

    while filled < signature.len() {
        match source.read(&mut signature[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(DecodeError::new(ErrorKind::Truncated).with_source(e)),
        }
    }

    if filled < signature.len() {
        return Err(DecodeError::new(ErrorKind::Truncated).with_message(format!(
            "read {filled} of {} signature bytes",
            signature.len()
        )));
    }

    if signature != PNG_SIGNATURE {
        return Err(DecodeError::new(ErrorKind::BadSignature));
    }

    Ok(())
}

/// Header fields as declared by the source, before any transformation.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) struct ImageHeader {
    pub width: u32,
    pub height: u32,
    pub bit_depth: BitDepth,
    pub color_type: ColorType,
    pub interlaced: bool,
}

impl ImageHeader {
    pub fn from_info(info: &png::Info) -> Self {
        Self {
            width: info.width,
            height: info.height,
            bit_depth: info.bit_depth,
            color_type: info.color_type,
            interlaced: info.interlaced,
        }
    }

    pub fn channels(&self) -> usize {
        self.color_type.samples()
    }

    /// Accept only 8-bit RGB, RGBA and palette sources.
    pub fn encoding(&self) -> Result<SourceEncoding, DecodeError> {
        if self.width == 0 || self.height == 0 {
            return Err(DecodeError::new(ErrorKind::UnsupportedFormat)
                .with_message(format!("zero-sized image {}x{}", self.width, self.height)));
        }

        match (self.bit_depth, self.color_type, self.channels()) {
            (BitDepth::Eight, ColorType::Rgb, 3) => Ok(SourceEncoding::Rgb),
            (BitDepth::Eight, ColorType::Rgba, 4) => Ok(SourceEncoding::Rgba),
            (BitDepth::Eight, ColorType::Indexed, 1) => Ok(SourceEncoding::Palette),
            (depth, color, channels) => Err(DecodeError::new(ErrorKind::UnsupportedFormat)
                .with_message(format!(
                    "{}-bit {color:?} with {channels} channel(s)",
                    depth as u8
                ))),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum SourceEncoding {
    Rgb,
    Rgba,
    Palette,
}

impl SourceEncoding {
    pub fn pixel_format(self, order: ChannelOrder) -> PixelFormat {
        match self {
            SourceEncoding::Rgb => PixelFormat::Rgbx8888,
            SourceEncoding::Rgba | SourceEncoding::Palette => order.alpha_format(),
        }
    }

    /// What the decoding library is asked to do before handing out rows.
    pub fn transformations(self) -> Transformations {
        match self {
            SourceEncoding::Palette => Transformations::EXPAND,
            SourceEncoding::Rgb | SourceEncoding::Rgba => Transformations::IDENTITY,
        }
    }
}
