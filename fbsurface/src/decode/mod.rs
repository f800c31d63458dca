//! Surface decoding: PNG in, framebuffer-ready [`Surface`] out

mod header;
mod normalize;

use std::any::Any;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use png::Transformations;
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};

use crate::config::DecoderConfig;
use crate::error::{DecodeError, ErrorKind};
use crate::surface::{ChannelOrder, Surface};

use header::ImageHeader;
use normalize::RowLayout;

#[derive(Debug, Clone, Default)]
pub struct SurfaceDecoder {
    config: DecoderConfig,
}

impl SurfaceDecoder {
    pub fn new(config: DecoderConfig) -> Self {
        Self { config }
    }

    pub fn with_channel_order(order: ChannelOrder) -> Self {
        Self::new(DecoderConfig::with_channel_order(order))
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Decode the PNG at `path` into a new surface.
    ///
    /// Nothing is left allocated or open when this returns an error.
    #[tracing::instrument(level = "debug", skip_all, fields(path = %path.as_ref().display()))]
    pub fn decode<P: AsRef<Path>>(&self, path: P) -> Result<Surface, DecodeError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            DecodeError::new(ErrorKind::NotFound)
                .with_message(path.display().to_string())
                .with_source(e)
        })?;

        let result = self.decode_reader(BufReader::new(file));
        match &result {
            Ok(surface) => log::debug!(
                "decoded {}: {}x{} {}",
                path.display(),
                surface.width(),
                surface.height(),
                surface.format()
            ),
            Err(e) => log::debug!("failed to decode {}: {}", path.display(), e),
        }
        result
    }

    /// Decode a PNG from any seekable stream positioned at its first byte.
    ///
    /// A panic inside the PNG codec is caught and returned as
    /// [`ErrorKind::DecodeFault`], but the process panic hook still runs
    /// first; with the default hook that prints the panic message to stderr.
    /// Embedders that must stay silent should install their own hook with
    /// [`std::panic::set_hook`].
    pub fn decode_reader<R: Read + Seek>(&self, mut source: R) -> Result<Surface, DecodeError> {
        let start = source.stream_position().map_err(fault)?;
        header::check_signature(&mut source)?;
        source.seek(SeekFrom::Start(start)).map_err(fault)?;

        // Recovery point: a panic inside the decoding library becomes an error.
        match panic::catch_unwind(AssertUnwindSafe(|| self.decode_png(&mut source, start))) {
            Ok(result) => result,
            Err(payload) => Err(DecodeError::new(ErrorKind::DecodeFault)
                .with_message(panic_message(&*payload))),
        }
    }

    /// Decode independent files in parallel. Results keep the input order.
    pub fn decode_batch<P>(&self, paths: &[P]) -> Vec<Result<Surface, DecodeError>>
    where
        P: AsRef<Path> + Sync,
    {
        log::debug!(
            "decoding {} files on {} threads",
            paths.len(),
            rayon::current_num_threads()
        );
        paths.par_iter().map(|path| self.decode(path)).collect()
    }

    fn decode_png<R: Read + Seek>(&self, source: &mut R, start: u64) -> Result<Surface, DecodeError> {
        let header = {
            let reader = open_reader(
                &mut *source,
                Transformations::IDENTITY,
                self.config.png_limits(),
            )?;
            ImageHeader::from_info(reader.info())
        };
        log::trace!("png header: {header:?}");

        let encoding = header.encoding()?;
        let mut data = self.allocate(header.width, header.height)?;
        let order = self.config.channel_order;
        let format = encoding.pixel_format(order);

        // Second pass with the transformations the encoding needs (palette expansion).
        source.seek(SeekFrom::Start(start)).map_err(fault)?;
        let mut reader = open_reader(
            &mut *source,
            encoding.transformations(),
            self.config.png_limits(),
        )?;
        let layout = RowLayout::from_output(reader.output_color_type())?;

        if header.interlaced {
            read_frame(&mut reader, &mut data, layout, order)?;
        } else {
            read_rows(&mut reader, &mut data, header.width as usize, layout, order)?;
        }

        Ok(Surface::new(header.width, header.height, format, data))
    }

    fn allocate(&self, width: u32, height: u32) -> Result<Vec<u8>, DecodeError> {
        let out_of_memory = || DecodeError::new(ErrorKind::OutOfMemory);

        let (Some(len), Some(total)) = (
            Surface::payload_size(width, height),
            Surface::allocation_size(width, height),
        ) else {
            return Err(out_of_memory().with_message(format!("{width}x{height} overflows")));
        };

        if let Some(limit) = self.config.max_surface_bytes {
            if total > limit {
                return Err(out_of_memory()
                    .with_message(format!("{total} bytes exceeds the {limit} byte limit")));
            }
        }

        let mut data = Vec::new();
        data.try_reserve_exact(len)
            .map_err(|e| out_of_memory().with_source(e))?;
        data.resize(len, 0);
        Ok(data)
    }
}

/// Set up the codec and parse everything up to the image data.
///
/// The codec refusing to set up its working buffers within `limits` is
/// reported as [`ErrorKind::DecoderInitFailed`].
fn open_reader<R: Read>(
    source: R,
    transformations: Transformations,
    limits: png::Limits,
) -> Result<png::Reader<R>, DecodeError> {
    let mut decoder = png::Decoder::new_with_limits(source, limits);
    decoder.set_transformations(transformations);
    decoder.read_info().map_err(|e| match e {
        png::DecodingError::LimitsExceeded => {
            DecodeError::new(ErrorKind::DecoderInitFailed).with_source(e)
        }
        e => fault(e),
    })
}

fn read_rows<R: Read>(
    reader: &mut png::Reader<R>,
    data: &mut [u8],
    width: usize,
    layout: RowLayout,
    order: ChannelOrder,
) -> Result<(), DecodeError> {
    let row_bytes = width * Surface::BYTES_PER_PIXEL;
    let src_bytes = width * layout.bytes_per_pixel();

    for (y, row) in data.chunks_exact_mut(row_bytes).enumerate() {
        let decoded = reader.next_row().map_err(fault)?.ok_or_else(|| {
            DecodeError::new(ErrorKind::DecodeFault)
                .with_message(format!("image data ended at row {y}"))
        })?;

        let src = decoded.data();
        if src.len() != src_bytes {
            return Err(DecodeError::new(ErrorKind::DecodeFault).with_message(format!(
                "row {y} is {} bytes, expected {src_bytes}",
                src.len()
            )));
        }

        row[..src_bytes].copy_from_slice(src);
        normalize::normalize(row, layout, order);
    }

    Ok(())
}

// Adam7 rows arrive per pass, so take the whole frame and normalize it as one
// long row: pixel i still sits at i * bytes_per_pixel.
fn read_frame<R: Read>(
    reader: &mut png::Reader<R>,
    data: &mut [u8],
    layout: RowLayout,
    order: ChannelOrder,
) -> Result<(), DecodeError> {
    let len = reader.output_buffer_size();
    let available = data.len();
    let Some(frame) = data.get_mut(..len) else {
        return Err(DecodeError::new(ErrorKind::DecodeFault).with_message(format!(
            "frame needs {len} bytes, surface holds {available}"
        )));
    };

    reader.next_frame(frame).map_err(fault)?;
    normalize::normalize(data, layout, order);
    Ok(())
}

fn fault<E>(e: E) -> DecodeError
where
    E: std::error::Error + Send + Sync + 'static,
{
    DecodeError::new(ErrorKind::DecodeFault).with_source(e)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "decoder panicked".to_string()
    }
}
