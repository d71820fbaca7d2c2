use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};

use crate::types::ids::Id;

/// Content id of an encoded version: BLAKE2b-256 over the stored bytes
pub fn content_id(data: &[u8]) -> Id {
    let mut hasher = Blake2b::<U32>::new();
    hasher.update(data);
    Id::from_digest(hasher.finalize().into())
}
