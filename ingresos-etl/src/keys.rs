//! Deterministic surrogate keys
//!
//! Scheme `sha256-u63-v1`: SHA-256 over the UTF-8 concatenation
//! `concepto ++ fecha ++ cuarto` (no separator, absent values as ""), first
//! eight digest bytes read as a big-endian u64, top bit cleared, rendered in
//! decimal. Any installation following these steps derives the same id for
//! the same business key, which is what makes repeated upserts idempotent.

use sha2::{Digest, Sha256};

use crate::transform::DetailRecord;

/// Name and version of the key derivation
pub const KEY_SCHEME: &str = "sha256-u63-v1";

/// Surrogate key for one business key
pub fn generate_key(concepto: &str, fecha: &str, cuarto: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(concepto.as_bytes());
    hasher.update(fecha.as_bytes());
    hasher.update(cuarto.as_bytes());
    let digest = hasher.finalize();

    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    let value = u64::from_be_bytes(prefix) & (u64::MAX >> 1);
    value.to_string()
}

/// Key for a record's business fields
pub fn record_key(record: &DetailRecord) -> String {
    let cuarto = record.cuarto.map(|q| q.to_string()).unwrap_or_default();
    generate_key(
        record.concepto_str(),
        record.fecha.as_deref().unwrap_or(""),
        &cuarto,
    )
}

/// Fill in `id` on every record
pub fn assign_keys(records: &mut [DetailRecord]) {
    for record in records.iter_mut() {
        record.id = record_key(record);
    }
}
