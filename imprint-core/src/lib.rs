//! Imprint Core - visual fingerprinting, similarity matching and overlay
//! compositing for proof-of-authenticity image registration.
//!
//! This crate is the algorithmic core behind an image registration
//! service: callers hand it raw encoded image bytes and get back a
//! reproducible content identity, a verdict on prior registrations, and a
//! visibly marked copy of the image. Routing, accounts, storage and
//! certificate packaging live in the embedding application.
//!
//! # Components
//!
//! - [`ContentDigest`] - SHA-256 identity of the exact encoded bytes
//! - [`Fingerprinter`] - multi-feature visual fingerprint folded into a
//!   single peppered digest
//! - [`matcher`] - normalized Hamming similarity between perceptual hashes
//! - [`SimilaritySearch`] - capability-probed exact/native/fallback search
//!   over a [`RecordStore`]
//! - [`Compositor`] - ordered alpha-blended text/image overlays
//!
//! # Example
//!
//! ```no_run
//! use imprint_core::{
//!     Compositor, Fingerprinter, Overlay, Position, RawImage, SearchQuery,
//!     SimilaritySearch, MemoryStore, SourceFormat,
//! };
//!
//! # async fn register(bytes: &[u8]) -> imprint_core::Result<()> {
//! // One decode feeds both fingerprinting and compositing.
//! let raw = RawImage::decode(bytes, SourceFormat::Png)?;
//! let fingerprint = Fingerprinter::new().fingerprint(&raw, "2026-07-20T19:30:00Z")?;
//! let digest = fingerprint.digest(Some("server-pepper"));
//!
//! // Check for prior registrations and near-duplicates.
//! let search = SimilaritySearch::new(MemoryStore::new());
//! let query = SearchQuery::by_image(&raw)
//!     .with_digest(imprint_core::ContentDigest::from_bytes(bytes));
//! let matches = search.find_matches(&query).await?;
//! if matches.iter().any(|m| m.is_near_duplicate(None)) {
//!     return Ok(()); // caller rejects or flags the upload
//! }
//!
//! // Mark the image; the caller persists `digest` and the marked bytes.
//! let marked = Compositor::new().apply(
//!     &raw.to_dynamic(),
//!     &[Overlay::Text {
//!         text: "(c) imprint".into(),
//!         position: Position::BottomRight,
//!         color: "#FFFFFF".into(),
//!         opacity: 0.3,
//!     }],
//! )?;
//! let _png = imprint_core::overlay::encode_png(&marked)?;
//! # Ok(())
//! # }
//! ```

pub mod digest;
pub mod error;
pub mod fingerprint;
pub mod matcher;
pub mod overlay;
pub mod search;

// Re-export main types for convenience
pub use digest::{ContentDigest, CONTENT_DIGEST_LEN};
pub use error::{ImprintError, Result};
pub use fingerprint::{
    phash, Fingerprinter, RawImage, SourceFormat, VisualFingerprint, PHASH_BITS,
};
pub use overlay::{encode_png, Compositor, Overlay, OverlayKind, Position, MAX_OVERLAYS};
pub use search::{
    Match, MemoryStore, RecordId, RecordStore, SearchQuery, SimilaritySearch, StoreCapability,
    StoredRecord, NEAR_DUPLICATE_THRESHOLD,
};
