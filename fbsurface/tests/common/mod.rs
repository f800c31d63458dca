#![allow(dead_code)]

use std::path::PathBuf;

use png::{BitDepth, ColorType};
use tempfile::TempDir;

pub fn encode(width: u32, height: u32, color: ColorType, depth: BitDepth, data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut out, width, height);
        encoder.set_color(color);
        encoder.set_depth(depth);
        let mut writer = encoder.write_header().unwrap();
        writer.write_image_data(data).unwrap();
    }
    out
}

pub fn encode_rgb(width: u32, height: u32, pixels: &[[u8; 3]]) -> Vec<u8> {
    let data: Vec<u8> = pixels.iter().flatten().copied().collect();
    encode(width, height, ColorType::Rgb, BitDepth::Eight, &data)
}

pub fn encode_rgba(width: u32, height: u32, pixels: &[[u8; 4]]) -> Vec<u8> {
    let data: Vec<u8> = pixels.iter().flatten().copied().collect();
    encode(width, height, ColorType::Rgba, BitDepth::Eight, &data)
}

pub fn encode_palette(
    width: u32,
    height: u32,
    palette: &[[u8; 3]],
    trns: Option<&[u8]>,
    indices: &[u8],
) -> Vec<u8> {
    let mut out = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut out, width, height);
        encoder.set_color(ColorType::Indexed);
        encoder.set_depth(BitDepth::Eight);
        encoder.set_palette(palette.iter().flatten().copied().collect::<Vec<u8>>());
        if let Some(trns) = trns {
            encoder.set_trns(trns.to_vec());
        }
        let mut writer = encoder.write_header().unwrap();
        writer.write_image_data(indices).unwrap();
    }
    out
}

/// Deterministic pixel noise so the compressed stream is not trivially short.
pub fn noise_rgb(count: usize) -> Vec<[u8; 3]> {
    let mut state = 0x2545_f491u32;
    (0..count)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            let [a, b, c, _] = state.to_le_bytes();
            [a, b, c]
        })
        .collect()
}

pub fn write_fixture(dir: &TempDir, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}

/// A 2x2 Adam7-interlaced RGB image, assembled by hand since the encoder
/// only writes progressive images.
pub fn adam7_rgb_2x2(pixels: [[u8; 3]; 4]) -> Vec<u8> {
    let [p00, p10, p01, p11] = pixels;

    // pass 1: (0,0); pass 6: (1,0); pass 7: row 1. Passes 2-5 are empty.
    let mut raw = Vec::new();
    raw.push(0);
    raw.extend_from_slice(&p00);
    raw.push(0);
    raw.extend_from_slice(&p10);
    raw.push(0);
    raw.extend_from_slice(&p01);
    raw.extend_from_slice(&p11);

    // zlib stream with a single stored block
    let len = raw.len() as u16;
    let mut zlib = vec![0x78, 0x01, 0x01];
    zlib.extend_from_slice(&len.to_le_bytes());
    zlib.extend_from_slice(&(!len).to_le_bytes());
    zlib.extend_from_slice(&raw);
    zlib.extend_from_slice(&adler32(&raw).to_be_bytes());

    let mut ihdr = Vec::new();
    ihdr.extend_from_slice(&2u32.to_be_bytes());
    ihdr.extend_from_slice(&2u32.to_be_bytes());
    ihdr.extend_from_slice(&[8, 2, 0, 0, 1]);

    let mut out = vec![0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];
    push_chunk(&mut out, b"IHDR", &ihdr);
    push_chunk(&mut out, b"IDAT", &zlib);
    push_chunk(&mut out, b"IEND", &[]);
    out
}

fn push_chunk(out: &mut Vec<u8>, kind: &[u8; 4], data: &[u8]) {
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(kind);
    out.extend_from_slice(data);

    let mut crc = crc32fast::Hasher::new();
    crc.update(kind);
    crc.update(data);
    out.extend_from_slice(&crc.finalize().to_be_bytes());
}

// zlib trailer for the stored block; crc32fast only covers the chunk CRC
fn adler32(bytes: &[u8]) -> u32 {
    let (mut a, mut b) = (1u32, 0u32);
    for &byte in bytes {
        a = (a + byte as u32) % 65521;
        b = (b + a) % 65521;
    }
    (b << 16) | a
}
