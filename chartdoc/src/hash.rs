//! Hashing utilities.

use sha2::{Digest, Sha256};
use subtle_encoding::hex;

/// Compute the SHA256 hash of the given bytes and return its lowercase
/// hexadecimal representation.
pub fn sha256<B: AsRef<[u8]>>(b: B) -> String {
    let digest = Sha256::digest(b.as_ref());
    String::from_utf8(hex::encode(digest)).unwrap()
}
