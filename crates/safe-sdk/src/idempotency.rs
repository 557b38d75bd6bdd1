//! Deterministic identifiers derived from request content.
//!
//! The consensus service deduplicates submissions by request id, so the id
//! must be a pure function of what is being spent: resubmitting the same
//! construction yields the same id and is recognized as one request.

use md5::{Digest, Md5};
use uuid::Uuid;

/// Operation tag appended to the output id when deriving a submission id.
pub const DEFAULT_OPERATION_TAG: &str = "SafeCreateTransactionRequest";

/// Name-based UUID of `data`: MD5 digest with the version nibble forced to 3
/// and the RFC 4122 variant bits set.
pub fn unique_id(data: &[u8]) -> Uuid {
    let mut sum: [u8; 16] = Md5::digest(data).into();
    sum[6] = (sum[6] & 0x0f) | 0x30;
    sum[8] = (sum[8] & 0x3f) | 0x80;
    Uuid::from_bytes(sum)
}

/// Submission request id for a construction spending `output_id` first.
pub fn request_id(output_id: &str, operation_tag: &str) -> Uuid {
    unique_id(format!("{output_id}:{operation_tag}").as_bytes())
}

/// Hint sent with the ghost key request for the output at `index`.
pub(crate) fn ghost_hint(tx_hint: &Uuid, index: u8) -> Uuid {
    unique_id(format!("hint:{tx_hint};index:{index}").as_bytes())
}
