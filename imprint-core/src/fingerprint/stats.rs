//! Per-channel pixel statistics over a normalized RGB buffer.
//!
//! These are the "cheap" fingerprint features: channel means, population
//! standard deviations, the 768-bin RGB histogram and an 8-bit XOR
//! checksum over the raw pixel bytes. Individually weak, together they
//! make the canonical fingerprint payload sensitive to almost any pixel
//! edit while staying fast to compute.

use image::RgbImage;

use crate::digest::sha256_hex;

/// Number of histogram bins: 256 per channel, three channels.
pub const HISTOGRAM_BINS: usize = 768;

/// Arithmetic mean of each channel, truncated to integer.
pub fn channel_means(img: &RgbImage) -> [u8; 3] {
    let mut sums = [0u64; 3];
    for pixel in img.pixels() {
        for (c, sum) in sums.iter_mut().enumerate() {
            *sum += u64::from(pixel.0[c]);
        }
    }
    let count = (img.width() as u64 * img.height() as u64).max(1) as f64;
    let mut means = [0u8; 3];
    for c in 0..3 {
        means[c] = (sums[c] as f64 / count) as u8;
    }
    means
}

/// Population standard deviation of each channel, rounded to 2 decimals.
pub fn channel_std_devs(img: &RgbImage) -> [f64; 3] {
    let mut sums = [0f64; 3];
    let mut sq_sums = [0f64; 3];
    for pixel in img.pixels() {
        for c in 0..3 {
            let v = f64::from(pixel.0[c]);
            sums[c] += v;
            sq_sums[c] += v * v;
        }
    }
    let count = (img.width() as u64 * img.height() as u64).max(1) as f64;
    let mut stds = [0f64; 3];
    for c in 0..3 {
        let mean = sums[c] / count;
        let variance = (sq_sums[c] / count - mean * mean).max(0.0);
        stds[c] = (variance.sqrt() * 100.0).round() / 100.0;
    }
    stds
}

/// XOR-reduction of every byte in the pixel buffer, as 2-digit hex.
pub fn xor_checksum(img: &RgbImage) -> String {
    let checksum = img.as_raw().iter().fold(0u8, |acc, b| acc ^ b);
    format!("{:02x}", checksum)
}

/// 256-bin-per-channel count histogram in R, G, B channel order.
pub fn histogram(img: &RgbImage) -> Vec<u64> {
    let mut bins = vec![0u64; HISTOGRAM_BINS];
    for pixel in img.pixels() {
        for c in 0..3 {
            bins[c * 256 + pixel.0[c] as usize] += 1;
        }
    }
    bins
}

/// Hash of the histogram, serialized as a compact JSON array.
///
/// The serialization is a plain `[n,n,...]` array with no whitespace, so
/// the digest depends only on the bin counts and their fixed R/G/B order.
pub fn histogram_digest(img: &RgbImage) -> String {
    let bins = histogram(img);
    let serialized = serde_json::to_string(&bins).unwrap_or_default();
    sha256_hex(serialized.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn solid(width: u32, height: u32, color: [u8; 3]) -> RgbImage {
        RgbImage::from_pixel(width, height, Rgb(color))
    }

    #[test]
    fn test_means_solid_color() {
        let img = solid(10, 10, [10, 100, 20]);
        assert_eq!(channel_means(&img), [10, 100, 20]);
    }

    #[test]
    fn test_means_truncate() {
        // Two pixels 0 and 255 per channel: mean 127.5, truncated to 127.
        let mut img = solid(2, 1, [0, 0, 0]);
        img.put_pixel(1, 0, Rgb([255, 255, 255]));
        assert_eq!(channel_means(&img), [127, 127, 127]);
    }

    #[test]
    fn test_std_solid_is_zero() {
        let img = solid(8, 8, [42, 42, 42]);
        assert_eq!(channel_std_devs(&img), [0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_std_two_values() {
        // Values 0 and 255: population std = 127.5 exactly.
        let mut img = solid(2, 1, [0, 0, 0]);
        img.put_pixel(1, 0, Rgb([255, 255, 255]));
        assert_eq!(channel_std_devs(&img), [127.5, 127.5, 127.5]);
    }

    #[test]
    fn test_xor_checksum_even_pixel_count_cancels() {
        // Every byte value appears an even number of times.
        let img = solid(10, 10, [7, 77, 177]);
        assert_eq!(xor_checksum(&img), "00");
    }

    #[test]
    fn test_xor_checksum_odd_pixel_count() {
        // 9 pixels: each channel value survives once, 5 ^ 9 ^ 200 = 0xc4.
        let img = solid(3, 3, [5, 9, 200]);
        assert_eq!(xor_checksum(&img), "c4");
    }

    #[test]
    fn test_histogram_solid() {
        let img = solid(2, 2, [255, 0, 0]);
        let bins = histogram(&img);
        assert_eq!(bins[255], 4); // R channel, bin 255
        assert_eq!(bins[256], 4); // G channel, bin 0
        assert_eq!(bins[512], 4); // B channel, bin 0
        assert_eq!(bins.iter().sum::<u64>(), 12);
    }

    #[test]
    fn test_histogram_digest_sensitivity() {
        let red = solid(4, 4, [255, 0, 0]);
        let blue = solid(4, 4, [0, 0, 255]);
        assert_ne!(histogram_digest(&red), histogram_digest(&blue));
        assert_eq!(histogram_digest(&red), histogram_digest(&red));
    }
}
