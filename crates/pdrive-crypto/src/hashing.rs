//! Keyed hashes sent with move requests.
//!
//! Name hashes and content hashes are HMAC-SHA256 values keyed with the
//! destination parent's (decrypted) hash key, hex encoded.

use hmac::{Hmac, Mac};
use pdrive_core::{DriveError, DriveResult};
use sha2::Sha256;

use crate::digest::FileContentDigest;

type HmacSha256 = Hmac<Sha256>;

fn hmac_hex(key: &[u8], message: &[u8]) -> DriveResult<String> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| DriveError::Other(anyhow::anyhow!("HMAC key setup: {e}")))?;
    mac.update(message);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Lookup hash of a clear node name inside a parent folder.
pub fn name_hash(clear_name: &str, parent_hash_key: &str) -> DriveResult<String> {
    hmac_hex(parent_hash_key.as_bytes(), clear_name.as_bytes())
}

/// Content hash to send when moving a file under a parent with `new_parent_hash_key`.
///
/// A clear digest is rehashed with the new key. A legacy hash can't be, so it is
/// sent unchanged: repeated moves still work but duplicates are not detected.
/// `None` is valid for nodes without content identity (non-photos).
pub fn content_hash_for_move(
    digest: Option<&FileContentDigest>,
    new_parent_hash_key: &str,
) -> DriveResult<Option<String>> {
    match digest {
        Some(FileContentDigest::ContentDigest(clear)) => {
            hmac_hex(new_parent_hash_key.as_bytes(), clear.as_bytes()).map(Some)
        }
        Some(FileContentDigest::ContentHash(previous)) => Ok(Some(previous.clone())),
        None => Ok(None),
    }
}
