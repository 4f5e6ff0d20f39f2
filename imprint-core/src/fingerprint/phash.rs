//! DCT-based 64-bit perceptual hash.
//!
//! Frequency-domain thresholding of a downsampled grayscale image: the
//! image is reduced to 32x32 luma, transformed with a 2-D DCT-II, and the
//! 8x8 low-frequency block is compared against its own median to produce
//! 64 bits. Visually similar images land within a few bits of each other
//! even after re-encoding or mild resizing; the hex rendering is the
//! `perceptual_hash` field of the fingerprint payload.
//!
//! The bit layout is fixed: coefficients are read row-major from the
//! low-frequency block (DC term included), a bit is set when the
//! coefficient exceeds the median, and bits pack MSB-first into a u64
//! rendered as 16 hex characters. Stored hashes depend on this layout, so
//! none of these parameters may change without re-hashing the corpus.

use image::imageops::{self, FilterType};
use image::{GrayImage, Luma, RgbImage};

/// Downsample target edge length before the DCT.
const DCT_SIZE: u32 = 32;

/// Edge length of the retained low-frequency block (8x8 = 64 bits).
const HASH_SIZE: usize = 8;

/// Number of bits in the rendered hash.
pub const PHASH_BITS: u32 = (HASH_SIZE * HASH_SIZE) as u32;

/// Compute the 64-bit perceptual hash of a normalized RGB image,
/// rendered as a 16-character lowercase hex string.
pub fn phash(img: &RgbImage) -> String {
    let gray = to_luma(img);
    let small = imageops::resize(&gray, DCT_SIZE, DCT_SIZE, FilterType::Lanczos3);

    let n = DCT_SIZE as usize;
    let mut pixels = vec![0f64; n * n];
    for (x, y, p) in small.enumerate_pixels() {
        pixels[y as usize * n + x as usize] = f64::from(p.0[0]);
    }

    let freq = dct_2d(&pixels, n);

    // Median of the 8x8 low-frequency block, DC term included.
    let mut low = [0f64; HASH_SIZE * HASH_SIZE];
    for row in 0..HASH_SIZE {
        for col in 0..HASH_SIZE {
            low[row * HASH_SIZE + col] = freq[row * n + col];
        }
    }
    let median = median64(&low);

    let mut bits = 0u64;
    for &coeff in low.iter() {
        bits = (bits << 1) | u64::from(coeff > median);
    }

    let rendered = format!("{:016x}", bits);
    tracing::debug!(phash = %rendered, "computed perceptual hash");
    rendered
}

/// Rec. 601 luma with rounding, matching the reference grayscale
/// conversion rather than the crate's built-in BT.709 weights.
fn to_luma(img: &RgbImage) -> GrayImage {
    let mut gray = GrayImage::new(img.width(), img.height());
    for (x, y, p) in img.enumerate_pixels() {
        let [r, g, b] = p.0;
        let l = (u32::from(r) * 19595 + u32::from(g) * 38470 + u32::from(b) * 7471 + 0x8000) >> 16;
        gray.put_pixel(x, y, Luma([l as u8]));
    }
    gray
}

/// Separable 2-D DCT-II over an n*n matrix: columns first, then rows.
///
/// Coefficients are unnormalized (uniform scale factor), which is
/// sufficient because the hash only compares coefficients against their
/// median.
fn dct_2d(input: &[f64], n: usize) -> Vec<f64> {
    let table = cosine_table(n);
    let mut cols = vec![0f64; n * n];
    for x in 0..n {
        for k in 0..n {
            let mut sum = 0f64;
            for j in 0..n {
                sum += input[j * n + x] * table[k * n + j];
            }
            cols[k * n + x] = sum;
        }
    }
    let mut out = vec![0f64; n * n];
    for y in 0..n {
        for k in 0..n {
            let mut sum = 0f64;
            for j in 0..n {
                sum += cols[y * n + j] * table[k * n + j];
            }
            out[y * n + k] = sum;
        }
    }
    out
}

/// table[k * n + j] = cos(pi * k * (2j + 1) / (2n))
fn cosine_table(n: usize) -> Vec<f64> {
    let mut table = vec![0f64; n * n];
    for k in 0..n {
        for j in 0..n {
            table[k * n + j] =
                (std::f64::consts::PI * k as f64 * (2 * j + 1) as f64 / (2 * n) as f64).cos();
        }
    }
    table
}

/// Median of 64 values: mean of the two middle elements of the sorted
/// sequence.
fn median64(values: &[f64; HASH_SIZE * HASH_SIZE]) -> f64 {
    let mut sorted = *values;
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = sorted.len() / 2;
    (sorted[mid - 1] + sorted[mid]) / 2.0
}
