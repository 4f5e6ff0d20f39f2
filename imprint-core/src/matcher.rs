//! Perceptual hash comparison.
//!
//! Hashes are compared as equal-length bit strings; the normalized
//! similarity `1 - distance/bits` is what the similarity search ranks by.
//! Collisions across visually different images are expected — a
//! perceptual hash is a lossy summary, not an identity.

use crate::error::{ImprintError, Result};

/// Hamming distance between two hex-encoded hashes of equal bit length.
///
/// Works nibble-by-nibble so hashes longer than 64 bits compare without
/// overflow.
pub fn hamming_distance(a: &str, b: &str) -> Result<u32> {
    let a_bits = parse_nibbles(a)?;
    let b_bits = parse_nibbles(b)?;
    if a_bits.len() != b_bits.len() {
        return Err(ImprintError::MalformedHash(format!(
            "bit length mismatch: {} vs {}",
            a_bits.len() * 4,
            b_bits.len() * 4
        )));
    }
    Ok(a_bits
        .iter()
        .zip(b_bits.iter())
        .map(|(x, y)| (x ^ y).count_ones())
        .sum())
}

/// Normalized similarity in [0, 1]: `1 - distance/bits`.
///
/// Symmetric and reflexive; 1.0 means the hashes are identical, not that
/// the images are byte-identical.
pub fn similarity(a: &str, b: &str) -> Result<f64> {
    let distance = hamming_distance(a, b)?;
    let bits = (a.len() * 4) as f64;
    if bits == 0.0 {
        return Err(ImprintError::MalformedHash("empty hash".to_string()));
    }
    let score = 1.0 - f64::from(distance) / bits;
    tracing::debug!(distance, bits, score, "perceptual similarity");
    Ok(score)
}

/// Reject hashes that are empty or not valid hexadecimal.
pub fn validate(hash: &str) -> Result<()> {
    parse_nibbles(hash).map(|_| ())
}

fn parse_nibbles(hash: &str) -> Result<Vec<u8>> {
    if hash.is_empty() {
        return Err(ImprintError::MalformedHash("empty hash".to_string()));
    }
    hash.chars()
        .map(|c| {
            c.to_digit(16)
                .map(|d| d as u8)
                .ok_or_else(|| ImprintError::MalformedHash(format!("invalid hex in {:?}", hash)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_similarity_reflexive() {
        let h = "deadbeefcafebabe";
        assert_eq!(similarity(h, h).unwrap(), 1.0);
    }

    #[test]
    fn test_similarity_symmetric() {
        let a = "0000000000000000";
        let b = "00000000000000ff";
        assert_eq!(similarity(a, b).unwrap(), similarity(b, a).unwrap());
    }

    #[test]
    fn test_hamming_distance_known_values() {
        assert_eq!(
            hamming_distance("0000000000000000", "ffffffffffffffff").unwrap(),
            64
        );
        assert_eq!(
            hamming_distance("0000000000000000", "0000000000000001").unwrap(),
            1
        );
        assert_eq!(hamming_distance("abcd", "abcd").unwrap(), 0);
    }

    #[test]
    fn test_similarity_scale() {
        // 8 of 64 bits differ: similarity 0.875.
        let a = "0000000000000000";
        let b = "00000000000000ff";
        assert_eq!(similarity(a, b).unwrap(), 1.0 - 8.0 / 64.0);
        // All bits differ.
        assert_eq!(similarity(a, "ffffffffffffffff").unwrap(), 0.0);
    }

    #[test]
    fn test_malformed_hex_rejected() {
        assert!(matches!(
            similarity("xyz", "abc"),
            Err(ImprintError::MalformedHash(_))
        ));
        assert!(matches!(
            similarity("", ""),
            Err(ImprintError::MalformedHash(_))
        ));
    }

    #[test]
    fn test_length_mismatch_rejected() {
        assert!(matches!(
            similarity("abcd", "abcdef"),
            Err(ImprintError::MalformedHash(_))
        ));
    }

    #[test]
    fn test_uppercase_hex_accepted() {
        assert_eq!(similarity("DEADBEEF", "deadbeef").unwrap(), 1.0);
    }
}
