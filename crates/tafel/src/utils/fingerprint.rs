use crate::types::Fragment;
use ahash::AHasher;
use std::hash::{Hash, Hasher};

/// Compute a hash string from input data.
pub fn compute_hash(data: &str) -> String {
    let mut hasher = AHasher::default();
    data.hash(&mut hasher);
    let hash = hasher.finish();
    format!("{:016x}", hash)
}

/// Content fingerprint of a fragment collection.
///
/// Covers text, page index, exact coordinate bits and font size, in order. Two
/// collections with the same fragments in the same order always share a fingerprint.
pub fn fingerprint_fragments<'a>(fragments: impl IntoIterator<Item = &'a Fragment>) -> String {
    let mut hasher = AHasher::default();
    let mut count = 0usize;
    for fragment in fragments {
        fragment.text().hash(&mut hasher);
        fragment.page_index().hash(&mut hasher);
        let bbox = fragment.bbox();
        for value in [bbox.x, bbox.y, bbox.width, bbox.height, fragment.font_size()] {
            value.to_bits().hash(&mut hasher);
        }
        count += 1;
    }
    count.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}
