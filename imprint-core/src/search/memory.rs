//! In-memory record store.
//!
//! Backs tests and embedders that keep their registry in process. The
//! optional native-bitwise mode performs the XOR-popcount ranking
//! store-side, which is how the fast path gets exercised without a real
//! database.

use async_trait::async_trait;

use crate::digest::ContentDigest;
use crate::error::Result;
use crate::matcher;

use super::{RecordId, RecordStore, StoreCapability, StoredRecord};

/// Vec-backed [`RecordStore`].
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: Vec<StoredRecord>,
    native_bitwise: bool,
}

impl MemoryStore {
    /// Store that reports no native capability (exercises the fallback).
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that advertises and implements native bitwise ranking.
    pub fn with_native_bitwise() -> Self {
        Self {
            records: Vec::new(),
            native_bitwise: true,
        }
    }

    pub fn insert(&mut self, record: StoredRecord) {
        self.records.push(record);
    }

    /// Register a record under the next sequential id.
    pub fn register(&mut self, content_digest: ContentDigest, perceptual_hash: String) -> RecordId {
        let id = RecordId(self.records.len() as u64 + 1);
        self.records.push(StoredRecord {
            id,
            content_digest,
            perceptual_hash,
        });
        id
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn probe_capability(&self) -> Result<StoreCapability> {
        Ok(if self.native_bitwise {
            StoreCapability::NativeBitwise
        } else {
            StoreCapability::None
        })
    }

    async fn exact_match(&self, digest: &ContentDigest) -> Result<Option<StoredRecord>> {
        Ok(self
            .records
            .iter()
            .find(|r| &r.content_digest == digest)
            .cloned())
    }

    async fn native_distance_query(&self, perceptual_hash: &str) -> Result<Vec<(RecordId, u32)>> {
        let mut ranked = Vec::with_capacity(self.records.len());
        for record in &self.records {
            match matcher::hamming_distance(perceptual_hash, &record.perceptual_hash) {
                Ok(distance) => ranked.push((record.id, distance)),
                Err(e) => {
                    // Mirrors what a SQL BIT_COUNT query does with rows it
                    // cannot convert: they drop out of the result.
                    tracing::warn!(id = %record.id, error = %e, "native ranking skipped record");
                }
            }
        }
        ranked.sort_by_key(|(_, distance)| *distance);
        Ok(ranked)
    }

    async fn all_records(&self) -> Result<Vec<StoredRecord>> {
        Ok(self.records.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(id: u64, digest: &str, phash: &str) -> StoredRecord {
        StoredRecord {
            id: RecordId(id),
            content_digest: ContentDigest::from_hex(digest),
            perceptual_hash: phash.to_string(),
        }
    }

    #[tokio::test]
    async fn test_capability_reporting() {
        assert_eq!(
            MemoryStore::new().probe_capability().await.unwrap(),
            StoreCapability::None
        );
        assert_eq!(
            MemoryStore::with_native_bitwise()
                .probe_capability()
                .await
                .unwrap(),
            StoreCapability::NativeBitwise
        );
    }

    #[tokio::test]
    async fn test_exact_match_lookup() {
        let mut store = MemoryStore::new();
        store.insert(sample(1, "abc", "0000000000000000"));
        let hit = store
            .exact_match(&ContentDigest::from_hex("abc"))
            .await
            .unwrap();
        assert_eq!(hit.unwrap().id, RecordId(1));
        let miss = store
            .exact_match(&ContentDigest::from_hex("nope"))
            .await
            .unwrap();
        assert!(miss.is_none());
    }

    #[tokio::test]
    async fn test_native_ranking_ascending_and_stable() {
        let mut store = MemoryStore::with_native_bitwise();
        store.insert(sample(1, "a", "ffffffffffffffff"));
        store.insert(sample(2, "b", "0000000000000001"));
        store.insert(sample(3, "c", "0000000000000100")); // ties with 2
        let ranked = store
            .native_distance_query("0000000000000000")
            .await
            .unwrap();
        assert_eq!(
            ranked,
            vec![(RecordId(2), 1), (RecordId(3), 1), (RecordId(1), 64)]
        );
    }

    #[tokio::test]
    async fn test_register_assigns_sequential_ids() {
        let mut store = MemoryStore::new();
        let a = store.register(ContentDigest::from_hex("a"), "00".into());
        let b = store.register(ContentDigest::from_hex("b"), "ff".into());
        assert_eq!((a, b), (RecordId(1), RecordId(2)));
        assert_eq!(store.len(), 2);
    }
}
