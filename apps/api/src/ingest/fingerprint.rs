use sha2::{Digest, Sha256};

use crate::ingest::types::{RawRecord, RecordKind};

/// Computes the content fingerprint used as the fuzzy-duplicate key.
///
/// Jobs hash `title|organization|location`, news hashes `title|source`.
/// Each field is lower-cased and trimmed, so two records that differ only
/// by case or surrounding whitespace share a fingerprint regardless of
/// which fetcher produced them.
pub fn content_hash(record: &RawRecord) -> String {
    let key = match record.kind {
        RecordKind::Job => format!(
            "{}|{}|{}",
            normalize_field(&record.title),
            normalize_field(&record.organization),
            normalize_field(record.location.as_deref().unwrap_or(""))
        ),
        RecordKind::News => format!(
            "{}|{}",
            normalize_field(&record.title),
            normalize_field(&record.organization)
        ),
    };

    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn normalize_field(value: &str) -> String {
    value.trim().to_lowercase()
}
