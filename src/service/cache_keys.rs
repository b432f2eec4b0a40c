//! Utilities for generating annotation cache keys

use sha2::{Digest, Sha256};

use crate::model::Variant;

/// Generate the cache key hash for a variant query
///
/// The key is based on every field a source may put in its query:
/// - bare chromosome, position, reference and alternate alleles
/// - record identifier
/// - gene and HGVS hints
///
/// The chromosome is stripped of its `chr` prefix so `chr17` and `17` share
/// entries.
pub fn generate_annotation_cache_key(variant: &Variant) -> String {
    let key_components = format!(
        "{}|{}|{}|{}|{}|{}|{}|{}",
        variant.bare_chrom(),
        variant.pos,
        variant.reference,
        variant.alternate,
        variant.id.as_deref().unwrap_or_default(),
        variant.gene.as_deref().unwrap_or_default(),
        variant.hgvs_c.as_deref().unwrap_or_default(),
        variant.hgvs_p.as_deref().unwrap_or_default(),
    );

    hash_string(&key_components)
}

/// Hash a string to a hex string using SHA256
fn hash_string(s: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(s.as_bytes());
    format!("{:x}", hasher.finalize())
}
