//! In-place conversion of decoded rows to the 4-byte surface layout

use png::{BitDepth, ColorType};

use crate::error::{DecodeError, ErrorKind};
use crate::surface::ChannelOrder;

/// Shape of the bytes the decoding library hands back per pixel.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum RowLayout {
    Rgb,
    Rgba,
}

impl RowLayout {
    pub fn from_output((color_type, bit_depth): (ColorType, BitDepth)) -> Result<Self, DecodeError> {
        match (color_type, bit_depth) {
            (ColorType::Rgb, BitDepth::Eight) => Ok(RowLayout::Rgb),
            (ColorType::Rgba, BitDepth::Eight) => Ok(RowLayout::Rgba),
            (color, depth) => Err(DecodeError::new(ErrorKind::DecodeFault).with_message(format!(
                "decoder produced {}-bit {color:?} rows",
                depth as u8
            ))),
        }
    }

    pub fn bytes_per_pixel(self) -> usize {
        match self {
            RowLayout::Rgb => 3,
            RowLayout::Rgba => 4,
        }
    }
}

/// Rewrite `buf` in place from `layout` to 4 bytes per pixel in `order`.
///
/// `buf` spans the destination, `4 * pixels` bytes, with the decoded source
/// packed at its start.
pub(crate) fn normalize(buf: &mut [u8], layout: RowLayout, order: ChannelOrder) {
    match layout {
        RowLayout::Rgb => expand_rgb(buf, order),
        RowLayout::Rgba => {
            if order == ChannelOrder::Bgra {
                swap_red_blue(buf);
            }
        }
    }
}

// Source pixel x sits at 3x and lands at 4x >= 3x, so walking from the last
// pixel down never overwrites a source byte before it is read.
fn expand_rgb(buf: &mut [u8], order: ChannelOrder) {
    let pixels = buf.len() / 4;
    for x in (0..pixels).rev() {
        let sx = x * 3;
        let dx = x * 4;
        let (r, g, b) = (buf[sx], buf[sx + 1], buf[sx + 2]);
        buf[dx..dx + 4].copy_from_slice(&order.arrange(r, g, b, 0xff));
    }
}

fn swap_red_blue(buf: &mut [u8]) {
    for px in buf.chunks_exact_mut(4) {
        px.swap(0, 2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packed_rgb_row(pixels: &[[u8; 3]]) -> Vec<u8> {
        let mut row = vec![0u8; pixels.len() * 4];
        for (i, px) in pixels.iter().enumerate() {
            row[i * 3..i * 3 + 3].copy_from_slice(px);
        }
        row
    }

    #[test]
    fn expands_rgb_in_place() {
        let mut row = packed_rgb_row(&[[255, 0, 0], [0, 255, 0], [0, 0, 255]]);
        normalize(&mut row, RowLayout::Rgb, ChannelOrder::Rgba);
        assert_eq!(
            row,
            [255, 0, 0, 255, 0, 255, 0, 255, 0, 0, 255, 255]
        );
    }

    #[test]
    fn expands_rgb_to_bgra() {
        let mut row = packed_rgb_row(&[[10, 20, 30], [40, 50, 60]]);
        normalize(&mut row, RowLayout::Rgb, ChannelOrder::Bgra);
        assert_eq!(row, [30, 20, 10, 255, 60, 50, 40, 255]);
    }

    #[test]
    fn in_place_matches_scratch_buffer() {
        let pixels: Vec<[u8; 3]> = (0..97u8)
            .map(|i| [i, i.wrapping_mul(7), i.wrapping_add(101)])
            .collect();

        let expected: Vec<u8> = pixels
            .iter()
            .flat_map(|&[r, g, b]| ChannelOrder::Rgba.arrange(r, g, b, 0xff))
            .collect();

        let mut row = packed_rgb_row(&pixels);
        normalize(&mut row, RowLayout::Rgb, ChannelOrder::Rgba);
        assert_eq!(row, expected);
    }

    #[test]
    fn rgba_keeps_alpha_and_swaps_for_bgra() {
        let mut row = vec![10, 20, 30, 40, 50, 60, 70, 80];
        normalize(&mut row, RowLayout::Rgba, ChannelOrder::Rgba);
        assert_eq!(row, [10, 20, 30, 40, 50, 60, 70, 80]);

        normalize(&mut row, RowLayout::Rgba, ChannelOrder::Bgra);
        assert_eq!(row, [30, 20, 10, 40, 70, 60, 50, 80]);
    }

    #[test]
    fn unexpected_output_is_a_fault() {
        let err = RowLayout::from_output((ColorType::Grayscale, BitDepth::Eight)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DecodeFault);
        assert!(RowLayout::from_output((ColorType::Rgb, BitDepth::Sixteen)).is_err());
    }
}
