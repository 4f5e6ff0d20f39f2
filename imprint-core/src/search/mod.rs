//! Two-tier similarity search over registered image records.
//!
//! The strategy probes the record store's capability at call time and
//! picks one of three paths:
//!
//! 1. **Exact short-circuit** — a content-digest hit is a stronger signal
//!    than any perceptual score and returns alone with similarity 1.0.
//! 2. **Native fast path** — stores with bitwise aggregate support rank
//!    records by XOR population count themselves; the core only converts
//!    distances back to similarities. Same ordering as the fallback, just
//!    computed store-side.
//! 3. **Exhaustive fallback** — load everything, score with
//!    [`crate::matcher::similarity`], stable-sort descending.
//!
//! The full ordering is the contract; truncation to top-K is a caller
//! concern. Store queries are read-only and bounded by an optional
//! timeout — concurrent registrations may land between the query and the
//! caller's decision, so exact-match uniqueness must be re-validated at
//! write time by the store's own constraints.

pub mod memory;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::digest::ContentDigest;
use crate::error::{ImprintError, Result};
use crate::fingerprint::{phash, RawImage};
use crate::matcher;

pub use memory::MemoryStore;

/// Opaque record identifier assigned by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub u64);

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Minimal view of a registered image the search consumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: RecordId,
    pub content_digest: ContentDigest,
    pub perceptual_hash: String,
}

/// What the store can do natively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreCapability {
    /// The store can rank by XOR population count in a single query.
    NativeBitwise,
    /// No bitwise aggregates; the core must scan.
    None,
}

/// Read-only interface over the caller's record store.
///
/// Implementations translate hex-string hashes to whatever integer
/// representation they persist, consistently in both directions.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Report whether native bitwise aggregation is available. Probed per
    /// call, not cached — capability can change across reconnects.
    async fn probe_capability(&self) -> Result<StoreCapability>;

    /// Look up a record by exact content digest.
    async fn exact_match(&self, digest: &ContentDigest) -> Result<Option<StoredRecord>>;

    /// Rank all records by Hamming distance to the query hash,
    /// ascending; returns `(id, distance)` pairs. Only called when
    /// [`StoreCapability::NativeBitwise`] was probed.
    async fn native_distance_query(&self, perceptual_hash: &str) -> Result<Vec<(RecordId, u32)>>;

    /// Load every record for the exhaustive fallback.
    async fn all_records(&self) -> Result<Vec<StoredRecord>>;
}

/// One search result: a record and its similarity to the query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub id: RecordId,
    /// Normalized similarity in [0, 1]; 1.0 for exact content matches.
    pub similarity: f64,
}

/// Default similarity above which a match counts as a near-duplicate.
pub const NEAR_DUPLICATE_THRESHOLD: f64 = 0.9;

impl Match {
    /// Whether this match should block or flag a new registration.
    pub fn is_near_duplicate(&self, threshold: Option<f64>) -> bool {
        self.similarity >= threshold.unwrap_or(NEAR_DUPLICATE_THRESHOLD)
    }
}

/// What to search for. A content digest enables the exact short-circuit;
/// a perceptual hash enables the approximate tiers. Either may be absent.
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    content_digest: Option<ContentDigest>,
    perceptual_hash: Option<String>,
}

impl SearchQuery {
    /// Query by perceptual hash only.
    pub fn by_phash(perceptual_hash: impl Into<String>) -> Self {
        Self {
            content_digest: None,
            perceptual_hash: Some(perceptual_hash.into()),
        }
    }

    /// Query by exact content digest only.
    pub fn by_digest(content_digest: ContentDigest) -> Self {
        Self {
            content_digest: Some(content_digest),
            perceptual_hash: None,
        }
    }

    /// Query from a decoded image: computes its perceptual hash.
    pub fn by_image(image: &RawImage) -> Self {
        Self::by_phash(phash(image.pixels()))
    }

    /// Add an exact-match digest to a perceptual query (or vice versa).
    pub fn with_digest(mut self, content_digest: ContentDigest) -> Self {
        self.content_digest = Some(content_digest);
        self
    }

    pub fn with_phash(mut self, perceptual_hash: impl Into<String>) -> Self {
        self.perceptual_hash = Some(perceptual_hash.into());
        self
    }
}

/// Capability-probed two-tier similarity search.
pub struct SimilaritySearch<S: RecordStore> {
    store: S,
    timeout: Option<Duration>,
}

impl<S: RecordStore> SimilaritySearch<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            timeout: None,
        }
    }

    /// Bound every store query; an elapsed timeout surfaces as
    /// `StoreUnavailable` instead of hanging the request.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Find candidate matches, most similar first.
    ///
    /// Returns all candidates in similarity order (stable among ties).
    /// A malformed query hash fails with `MalformedHash` before any store
    /// round-trip; a malformed *stored* hash in the fallback is skipped
    /// and logged, never fatal.
    pub async fn find_matches(&self, query: &SearchQuery) -> Result<Vec<Match>> {
        if let Some(digest) = &query.content_digest {
            if let Some(record) = self.bounded(self.store.exact_match(digest)).await? {
                tracing::debug!(id = %record.id, "exact content match, short-circuiting");
                return Ok(vec![Match {
                    id: record.id,
                    similarity: 1.0,
                }]);
            }
        }

        let Some(query_hash) = &query.perceptual_hash else {
            return Ok(Vec::new());
        };
        matcher::validate(query_hash)?;

        match self.bounded(self.store.probe_capability()).await? {
            StoreCapability::NativeBitwise => self.native_search(query_hash).await,
            StoreCapability::None => self.fallback_search(query_hash).await,
        }
    }

    /// Fast path: the store ranks by XOR popcount; convert distances to
    /// the same normalized similarity the fallback produces.
    async fn native_search(&self, query_hash: &str) -> Result<Vec<Match>> {
        let ranked = self
            .bounded(self.store.native_distance_query(query_hash))
            .await?;
        let bits = (query_hash.len() * 4) as f64;
        let matches = ranked
            .into_iter()
            .map(|(id, distance)| Match {
                id,
                similarity: 1.0 - f64::from(distance) / bits,
            })
            .collect::<Vec<_>>();
        tracing::debug!(count = matches.len(), "native bitwise search complete");
        Ok(matches)
    }

    /// Exhaustive scan: score every record, skip malformed stored
    /// hashes, stable-sort descending by similarity.
    async fn fallback_search(&self, query_hash: &str) -> Result<Vec<Match>> {
        let records = self.bounded(self.store.all_records()).await?;
        let mut matches = Vec::with_capacity(records.len());
        for record in records {
            match matcher::similarity(query_hash, &record.perceptual_hash) {
                Ok(similarity) => matches.push(Match {
                    id: record.id,
                    similarity,
                }),
                Err(e) => {
                    tracing::warn!(id = %record.id, error = %e, "skipping record with malformed stored hash");
                }
            }
        }
        matches.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        tracing::debug!(count = matches.len(), "fallback scan complete");
        Ok(matches)
    }

    async fn bounded<T, F>(&self, query: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, query).await.map_err(|_| {
                ImprintError::StoreUnavailable(format!("query timed out after {:?}", limit))
            })?,
            None => query.await,
        }
    }
}
