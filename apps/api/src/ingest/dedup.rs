//! Three-tier duplicate detection, cheapest and most precise key first.

use std::collections::HashSet;

use serde::Serialize;

use crate::ingest::store::{ImportStore, StoreError};
use crate::ingest::types::RawRecord;

/// Which key matched an existing record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateMatch {
    ExternalId,
    ContentHash,
    Url,
}

impl DuplicateMatch {
    pub fn as_str(&self) -> &'static str {
        match self {
            DuplicateMatch::ExternalId => "external_id",
            DuplicateMatch::ContentHash => "content_hash",
            DuplicateMatch::Url => "url",
        }
    }
}

/// Returns the first tier that finds an existing record.
///
/// Order: `(source, external_id)`, then content fingerprint, then URL.
/// Later tiers are not queried once one matches. The URL tier is skipped for
/// records without a URL. Storage failures propagate: an unreachable store
/// must never be read as "not a duplicate".
pub async fn find_duplicate(
    store: &dyn ImportStore,
    record: &RawRecord,
    content_hash: &str,
) -> Result<Option<DuplicateMatch>, StoreError> {
    if store
        .exists_by_external_id(record.kind, &record.source, &record.external_id)
        .await?
    {
        return Ok(Some(DuplicateMatch::ExternalId));
    }

    if store.exists_by_content_hash(record.kind, content_hash).await? {
        return Ok(Some(DuplicateMatch::ContentHash));
    }

    let url = record.url.trim();
    if !url.is_empty() && store.exists_by_url(record.kind, url).await? {
        return Ok(Some(DuplicateMatch::Url));
    }

    Ok(None)
}

/// Keys of records accepted earlier in the same run. Dry runs write
/// nothing, so repeats inside one batch are caught here instead of by the
/// store.
#[derive(Debug, Default)]
pub struct SeenRecords {
    external_ids: HashSet<(String, String)>,
    hashes: HashSet<String>,
    urls: HashSet<String>,
}

impl SeenRecords {
    /// Same tiers and order as `find_duplicate`.
    pub fn find(&self, record: &RawRecord, content_hash: &str) -> Option<DuplicateMatch> {
        let id_key = (record.source.clone(), record.external_id.clone());
        if self.external_ids.contains(&id_key) {
            return Some(DuplicateMatch::ExternalId);
        }
        if self.hashes.contains(content_hash) {
            return Some(DuplicateMatch::ContentHash);
        }
        let url = record.url.trim();
        if !url.is_empty() && self.urls.contains(url) {
            return Some(DuplicateMatch::Url);
        }
        None
    }

    pub fn remember(&mut self, record: &RawRecord, content_hash: &str) {
        self.external_ids
            .insert((record.source.clone(), record.external_id.clone()));
        self.hashes.insert(content_hash.to_string());
        let url = record.url.trim();
        if !url.is_empty() {
            self.urls.insert(url.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::fingerprint::content_hash;
    use crate::ingest::testing::{enriched, job, MemoryStore};

    #[tokio::test]
    async fn test_new_record_is_not_duplicate() {
        let store = MemoryStore::default();
        let record = job("Fractional CTO", "Acme", Some("London"));
        let hash = content_hash(&record);
        assert_eq!(find_duplicate(&store, &record, &hash).await.unwrap(), None);
        assert_eq!(store.dedup_queries(), vec!["external_id", "content_hash", "url"]);
    }

    #[tokio::test]
    async fn test_external_id_short_circuits() {
        let store = MemoryStore::default();
        let existing = job("Fractional CTO", "Acme", Some("London"));
        store.seed(enriched(&existing));

        let hash = content_hash(&existing);
        assert_eq!(
            find_duplicate(&store, &existing, &hash).await.unwrap(),
            Some(DuplicateMatch::ExternalId)
        );
        assert_eq!(store.dedup_queries(), vec!["external_id"]);
    }

    #[tokio::test]
    async fn test_content_hash_catches_cross_source_repost() {
        let store = MemoryStore::default();
        let existing = job("Fractional CTO", "Acme", Some("London"));
        store.seed(enriched(&existing));

        let mut repost = job("fractional cto ", "ACME", Some("london"));
        repost.source = "apify_linkedin".into();
        repost.external_id = "li-999".into();
        repost.url = "https://linkedin.example/jobs/999".into();

        let hash = content_hash(&repost);
        assert_eq!(
            find_duplicate(&store, &repost, &hash).await.unwrap(),
            Some(DuplicateMatch::ContentHash)
        );
        assert_eq!(store.dedup_queries(), vec!["external_id", "content_hash"]);
    }

    #[tokio::test]
    async fn test_url_is_last_resort() {
        let store = MemoryStore::default();
        let existing = job("Fractional CTO", "Acme", Some("London"));
        store.seed(enriched(&existing));

        let mut retitled = existing.clone();
        retitled.title = "Part-time CTO".into();
        retitled.external_id = "other".into();

        let hash = content_hash(&retitled);
        assert_eq!(
            find_duplicate(&store, &retitled, &hash).await.unwrap(),
            Some(DuplicateMatch::Url)
        );
    }

    #[tokio::test]
    async fn test_empty_url_skips_url_tier() {
        let store = MemoryStore::default();
        let mut record = job("Fractional CTO", "Acme", Some("London"));
        record.url = "  ".into();
        let hash = content_hash(&record);
        assert_eq!(find_duplicate(&store, &record, &hash).await.unwrap(), None);
        assert_eq!(store.dedup_queries(), vec!["external_id", "content_hash"]);
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let store = MemoryStore::default();
        store.fail_lookups();
        let record = job("Fractional CTO", "Acme", Some("London"));
        let hash = content_hash(&record);
        assert!(find_duplicate(&store, &record, &hash).await.is_err());
    }

    #[test]
    fn test_seen_records_follow_tier_order() {
        let mut seen = SeenRecords::default();
        let first = job("Fractional CTO", "Acme", Some("London"));
        assert_eq!(seen.find(&first, &content_hash(&first)), None);
        seen.remember(&first, &content_hash(&first));

        assert_eq!(
            seen.find(&first, &content_hash(&first)),
            Some(DuplicateMatch::ExternalId)
        );

        let mut repost = job("fractional cto", "ACME", Some("london"));
        repost.external_id = "li-7".into();
        repost.url = "https://linkedin.example/7".into();
        assert_eq!(
            seen.find(&repost, &content_hash(&repost)),
            Some(DuplicateMatch::ContentHash)
        );

        let mut moved = first.clone();
        moved.external_id = "other".into();
        moved.title = "Interim CTO".into();
        assert_eq!(seen.find(&moved, &content_hash(&moved)), Some(DuplicateMatch::Url));
    }
}
