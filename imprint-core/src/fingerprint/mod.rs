//! Visual fingerprinting.
//!
//! A [`VisualFingerprint`] is a multi-feature record computed from one
//! decoded image: dimensions, byte length, per-channel statistics, a
//! histogram digest, an XOR checksum, a DCT perceptual hash and the
//! caller-supplied certificate timestamp. Its canonical serialization
//! (sorted keys, compact separators), optionally salted with a
//! server-side pepper, is hashed into a single reproducible digest —
//! the identity that ends up on the issued certificate.
//!
//! All computation here is pure: the same pixels, timestamp and pepper
//! always yield the same record and the same digest.

pub mod phash;
pub mod stats;

use image::{DynamicImage, ImageFormat, RgbImage};
use serde::{Deserialize, Serialize};

use crate::digest::{sha256_hex, ContentDigest};
use crate::error::{ImprintError, Result};

pub use phash::{phash, PHASH_BITS};

/// Image formats accepted for registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceFormat {
    Png,
    Jpeg,
    Gif,
    Bmp,
    Tiff,
    WebP,
}

impl SourceFormat {
    /// Resolve a format from a file extension (without the dot,
    /// case-insensitive).
    pub fn from_extension(ext: &str) -> Result<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "jpg" | "jpeg" => Ok(Self::Jpeg),
            "gif" => Ok(Self::Gif),
            "bmp" => Ok(Self::Bmp),
            "tif" | "tiff" => Ok(Self::Tiff),
            "webp" => Ok(Self::WebP),
            other => Err(ImprintError::UnsupportedFormat(other.to_string())),
        }
    }

    /// Sniff a format from content bytes, for callers without a trusted
    /// extension. Formats the decoder recognizes but the accepted set
    /// excludes are rejected the same way unknown bytes are.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let guessed = image::guess_format(data)
            .map_err(|e| ImprintError::UnsupportedFormat(e.to_string()))?;
        match guessed {
            ImageFormat::Png => Ok(Self::Png),
            ImageFormat::Jpeg => Ok(Self::Jpeg),
            ImageFormat::Gif => Ok(Self::Gif),
            ImageFormat::Bmp => Ok(Self::Bmp),
            ImageFormat::Tiff => Ok(Self::Tiff),
            ImageFormat::WebP => Ok(Self::WebP),
            other => Err(ImprintError::UnsupportedFormat(format!("{:?}", other))),
        }
    }
}

impl From<SourceFormat> for ImageFormat {
    fn from(format: SourceFormat) -> Self {
        match format {
            SourceFormat::Png => ImageFormat::Png,
            SourceFormat::Jpeg => ImageFormat::Jpeg,
            SourceFormat::Gif => ImageFormat::Gif,
            SourceFormat::Bmp => ImageFormat::Bmp,
            SourceFormat::Tiff => ImageFormat::Tiff,
            SourceFormat::WebP => ImageFormat::WebP,
        }
    }
}

/// A decoded upload, normalized to 8-bit RGB.
///
/// Owned by the caller for the duration of one fingerprint/overlay
/// operation; one decode can feed both.
#[derive(Debug, Clone)]
pub struct RawImage {
    rgb: RgbImage,
    file_size: u64,
}

impl RawImage {
    /// Decode encoded bytes in the given accepted format and normalize to
    /// the fixed 3-channel model every statistic is computed over.
    pub fn decode(data: &[u8], format: SourceFormat) -> Result<Self> {
        let decoded = image::load_from_memory_with_format(data, format.into())
            .map_err(|e| ImprintError::Decode(e.to_string()))?;
        Ok(Self {
            rgb: decoded.to_rgb8(),
            file_size: data.len() as u64,
        })
    }

    /// Decode bytes, sniffing the format from content.
    pub fn decode_sniffed(data: &[u8]) -> Result<Self> {
        Self::decode(data, SourceFormat::from_bytes(data)?)
    }

    pub fn width(&self) -> u32 {
        self.rgb.width()
    }

    pub fn height(&self) -> u32 {
        self.rgb.height()
    }

    /// Original encoded byte length.
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// The normalized pixel buffer.
    pub fn pixels(&self) -> &RgbImage {
        &self.rgb
    }

    /// View as a `DynamicImage` for compositing.
    pub fn to_dynamic(&self) -> DynamicImage {
        DynamicImage::ImageRgb8(self.rgb.clone())
    }
}

/// The multi-feature fingerprint record.
///
/// Field declaration order matches the sorted key order of the canonical
/// payload, so serializing with `serde_json` directly yields the
/// canonical compact form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualFingerprint {
    /// Original encoded byte length.
    #[serde(rename = "filesize")]
    pub file_size: u64,
    /// SHA-256 of the serialized 768-bin RGB histogram.
    pub histogram_digest: String,
    /// Truncated per-channel means.
    pub mean_color: [u8; 3],
    /// 64-bit DCT perceptual hash, 16 hex characters.
    pub perceptual_hash: String,
    /// `"{width}x{height}"`.
    #[serde(rename = "size")]
    pub image_size: String,
    /// Per-channel population standard deviations, 2-decimal precision.
    pub std_color: [f64; 3],
    /// Caller-supplied certificate timestamp (ISO-8601).
    pub timestamp: String,
    /// XOR reduction of all pixel bytes, 2 hex digits.
    pub xor_checksum: String,
}

impl VisualFingerprint {
    /// Canonical serialization: sorted keys, compact separators.
    pub fn canonical_payload(&self) -> String {
        // Serialization of a struct with fixed field order cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Final fingerprint digest: SHA-256 of the canonical payload with
    /// the pepper appended after a `|` separator.
    ///
    /// The pepper is a server-side secret mixed in at digest time only;
    /// it never appears in the record itself, so external parties cannot
    /// forge a matching digest without it. `None` behaves as the empty
    /// pepper.
    pub fn digest(&self, pepper: Option<&str>) -> ContentDigest {
        let payload = format!("{}|{}", self.canonical_payload(), pepper.unwrap_or(""));
        ContentDigest::from_hex(sha256_hex(payload.as_bytes()))
    }
}

/// Computes [`VisualFingerprint`] records from decoded images.
#[derive(Debug, Clone, Copy, Default)]
pub struct Fingerprinter;

impl Fingerprinter {
    pub fn new() -> Self {
        Self
    }

    /// Fingerprint a decoded image with the given certificate timestamp.
    ///
    /// Fails with `InvalidTimestamp` if the timestamp is not ISO-8601;
    /// everything else is pure computation over the pixel buffer.
    pub fn fingerprint(&self, image: &RawImage, timestamp: &str) -> Result<VisualFingerprint> {
        validate_timestamp(timestamp)?;

        let pixels = image.pixels();
        let fingerprint = VisualFingerprint {
            file_size: image.file_size(),
            histogram_digest: stats::histogram_digest(pixels),
            mean_color: stats::channel_means(pixels),
            perceptual_hash: phash::phash(pixels),
            image_size: format!("{}x{}", image.width(), image.height()),
            std_color: stats::channel_std_devs(pixels),
            timestamp: timestamp.to_string(),
            xor_checksum: stats::xor_checksum(pixels),
        };
        tracing::debug!(
            size = %fingerprint.image_size,
            phash = %fingerprint.perceptual_hash,
            "computed visual fingerprint"
        );
        Ok(fingerprint)
    }

    /// Decode, fingerprint and digest in one call; returns the record,
    /// its peppered digest and the content digest of the exact bytes.
    pub fn fingerprint_bytes(
        &self,
        data: &[u8],
        format: SourceFormat,
        timestamp: &str,
        pepper: Option<&str>,
    ) -> Result<(VisualFingerprint, ContentDigest, ContentDigest)> {
        let raw = RawImage::decode(data, format)?;
        let fingerprint = self.fingerprint(&raw, timestamp)?;
        let digest = fingerprint.digest(pepper);
        Ok((fingerprint, digest, ContentDigest::from_bytes(data)))
    }
}

/// Accepts RFC 3339 timestamps and timezone-less ISO-8601 date-times.
fn validate_timestamp(ts: &str) -> Result<()> {
    if chrono::DateTime::parse_from_rfc3339(ts).is_ok() {
        return Ok(());
    }
    if ts.parse::<chrono::NaiveDateTime>().is_ok() {
        return Ok(());
    }
    Err(ImprintError::InvalidTimestamp(ts.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use std::io::Cursor;

    const TS: &str = "2026-07-20T19:30:00Z";

    fn encode_png(img: &RgbImage) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img.clone())
            .write_to(&mut buffer, ImageFormat::Png)
            .expect("PNG encoding failed");
        buffer.into_inner()
    }

    fn test_image() -> RgbImage {
        RgbImage::from_fn(48, 32, |x, y| Rgb([(x * 5) as u8, (y * 7) as u8, 90]))
    }

    #[test]
    fn test_source_format_from_extension() {
        assert_eq!(SourceFormat::from_extension("JPG").unwrap(), SourceFormat::Jpeg);
        assert_eq!(SourceFormat::from_extension("png").unwrap(), SourceFormat::Png);
        assert!(matches!(
            SourceFormat::from_extension("svg"),
            Err(ImprintError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_source_format_sniffing() {
        let bytes = encode_png(&test_image());
        assert_eq!(SourceFormat::from_bytes(&bytes).unwrap(), SourceFormat::Png);
        assert!(matches!(
            SourceFormat::from_bytes(b"not an image"),
            Err(ImprintError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_decode_error_on_garbage() {
        assert!(matches!(
            RawImage::decode(b"\x89PNG but not really", SourceFormat::Png),
            Err(ImprintError::Decode(_))
        ));
    }

    #[test]
    fn test_fingerprint_deterministic() {
        let bytes = encode_png(&test_image());
        let raw = RawImage::decode(&bytes, SourceFormat::Png).unwrap();
        let fp1 = Fingerprinter::new().fingerprint(&raw, TS).unwrap();
        let fp2 = Fingerprinter::new().fingerprint(&raw, TS).unwrap();
        assert_eq!(fp1, fp2);
        assert_eq!(fp1.digest(Some("secret")), fp2.digest(Some("secret")));
    }

    #[test]
    fn test_timestamp_changes_digest_not_visual_fields() {
        let bytes = encode_png(&test_image());
        let raw = RawImage::decode(&bytes, SourceFormat::Png).unwrap();
        let fp1 = Fingerprinter::new().fingerprint(&raw, TS).unwrap();
        let fp2 = Fingerprinter::new()
            .fingerprint(&raw, "2026-07-21T00:00:00Z")
            .unwrap();
        assert_eq!(fp1.perceptual_hash, fp2.perceptual_hash);
        assert_eq!(fp1.histogram_digest, fp2.histogram_digest);
        assert_eq!(fp1.mean_color, fp2.mean_color);
        assert_ne!(fp1.digest(None), fp2.digest(None));
    }

    #[test]
    fn test_pepper_changes_digest_only() {
        let bytes = encode_png(&test_image());
        let raw = RawImage::decode(&bytes, SourceFormat::Png).unwrap();
        let fp = Fingerprinter::new().fingerprint(&raw, TS).unwrap();
        assert_ne!(fp.digest(None), fp.digest(Some("pepper")));
        assert_eq!(fp.digest(None), fp.digest(Some("")));
        // The pepper never appears in the visible record.
        assert!(!fp.canonical_payload().contains("pepper"));
    }

    #[test]
    fn test_canonical_payload_key_order() {
        let bytes = encode_png(&test_image());
        let raw = RawImage::decode(&bytes, SourceFormat::Png).unwrap();
        let fp = Fingerprinter::new().fingerprint(&raw, TS).unwrap();
        let payload = fp.canonical_payload();

        let keys = [
            "\"filesize\"",
            "\"histogram_digest\"",
            "\"mean_color\"",
            "\"perceptual_hash\"",
            "\"size\"",
            "\"std_color\"",
            "\"timestamp\"",
            "\"xor_checksum\"",
        ];
        let positions: Vec<usize> = keys.iter().map(|k| payload.find(k).unwrap()).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "keys not sorted");
        // Compact separators: no whitespace anywhere.
        assert!(!payload.contains(' '));
    }

    #[test]
    fn test_image_size_field() {
        let bytes = encode_png(&test_image());
        let raw = RawImage::decode(&bytes, SourceFormat::Png).unwrap();
        let fp = Fingerprinter::new().fingerprint(&raw, TS).unwrap();
        assert_eq!(fp.image_size, "48x32");
        assert_eq!(fp.file_size, bytes.len() as u64);
    }

    #[test]
    fn test_invalid_timestamp_rejected() {
        let bytes = encode_png(&test_image());
        let raw = RawImage::decode(&bytes, SourceFormat::Png).unwrap();
        assert!(matches!(
            Fingerprinter::new().fingerprint(&raw, "yesterday-ish"),
            Err(ImprintError::InvalidTimestamp(_))
        ));
        // Timezone-less ISO-8601 is accepted.
        assert!(Fingerprinter::new()
            .fingerprint(&raw, "2026-07-20T19:30:00")
            .is_ok());
    }

    #[test]
    fn test_fingerprint_bytes_end_to_end() {
        let bytes = encode_png(&test_image());
        let (fp, digest, content) = Fingerprinter::new()
            .fingerprint_bytes(&bytes, SourceFormat::Png, TS, Some("s3cret"))
            .unwrap();
        assert_eq!(digest, fp.digest(Some("s3cret")));
        assert_eq!(content, ContentDigest::from_bytes(&bytes));
        assert_eq!(digest.as_str().len(), 64);
    }
}
