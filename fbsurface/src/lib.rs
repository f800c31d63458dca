//! Decode PNG resources into pixel surfaces ready to be composited onto a
//! framebuffer.

pub mod config;
pub mod decode;
pub mod error;
pub mod surface;

use std::path::Path;

// Re-export commonly used types
pub use config::DecoderConfig;
pub use decode::SurfaceDecoder;
pub use error::{DecodeError, ErrorKind};
pub use surface::{release, ChannelOrder, PixelFormat, Surface, SurfaceHeader};

/// Decode `path` with the default configuration (RGBA order, no size cap).
pub fn decode(path: impl AsRef<Path>) -> Result<Surface, DecodeError> {
    SurfaceDecoder::default().decode(path)
}
