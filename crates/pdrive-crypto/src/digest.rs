//! Content digest resolution for file revisions.
//!
//! Newer revisions carry the clear SHA-1 of their content inside the encrypted
//! extended attributes. That value can be rehashed with any parent's hash key,
//! so it survives moves. Older revisions only have a content hash already keyed
//! with the parent they were uploaded to. Resolution happens lazily per
//! revision, there is no migration pass.

use anyhow::Context;
use pdrive_core::{DriveError, DriveResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Content identity of a revision.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FileContentDigest {
    /// Decrypted SHA-1, can be rehashed with a new parent hash key when moving
    ContentDigest(String),
    /// SHA-1 already hashed with the current parent hash key
    ContentHash(String),
}

impl FileContentDigest {
    pub fn value(&self) -> &str {
        match self {
            FileContentDigest::ContentDigest(v) | FileContentDigest::ContentHash(v) => v,
        }
    }

    /// Whether the value can be rehashed against a different parent key.
    pub fn is_portable(&self) -> bool {
        matches!(self, FileContentDigest::ContentDigest(_))
    }
}

impl fmt::Display for FileContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileContentDigest::ContentDigest(v) => write!(f, "digest:{v}"),
            FileContentDigest::ContentHash(v) => write!(f, "hash:{v}"),
        }
    }
}

/// Opaque capability that turns encrypted extended attributes into clear bytes.
pub trait XAttrDecryptor: Send + Sync {
    fn decrypt_xattr(&self, encrypted: &str) -> anyhow::Result<Vec<u8>>;
}

/// Decryptor for extended attributes that are already kept in clear.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClearXAttrDecryptor;

impl XAttrDecryptor for ClearXAttrDecryptor {
    fn decrypt_xattr(&self, encrypted: &str) -> anyhow::Result<Vec<u8>> {
        Ok(encrypted.as_bytes().to_vec())
    }
}

/// Decrypted extended attributes of a revision (only the parts we read).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExtendedAttributes {
    #[serde(default)]
    pub common: Option<CommonAttributes>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CommonAttributes {
    #[serde(default)]
    pub modification_time: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub block_sizes: Option<Vec<u64>>,
    #[serde(default)]
    pub digests: Option<Digests>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Digests {
    #[serde(rename = "SHA1", default)]
    pub sha1: Option<String>,
}

impl ExtendedAttributes {
    /// `Common.Digests.SHA1`, if present.
    pub fn sha1_digest(&self) -> Option<&str> {
        self.common
            .as_ref()
            .and_then(|c| c.digests.as_ref())
            .and_then(|d| d.sha1.as_deref())
    }
}

/// Decrypt and parse a revision's extended attributes.
pub fn decrypt_extended_attributes(
    encrypted: &str,
    decryptor: &dyn XAttrDecryptor,
) -> anyhow::Result<ExtendedAttributes> {
    let clear = decryptor
        .decrypt_xattr(encrypted)
        .context("decrypting extended attributes")?;
    serde_json::from_slice(&clear).context("parsing extended attributes")
}

/// Resolve the content identity of a revision.
///
/// The clear digest wins whenever it can be read. Any failure to read it falls
/// back to the legacy content hash; only the absence of both is an error.
pub fn resolve_content_digest(
    x_attributes: Option<&str>,
    content_hash: Option<&str>,
    decryptor: &dyn XAttrDecryptor,
) -> DriveResult<FileContentDigest> {
    match clear_digest(x_attributes, decryptor) {
        Ok(digest) => return Ok(FileContentDigest::ContentDigest(digest)),
        Err(e) => tracing::debug!(reason = %e, "no clear content digest, falling back to content hash"),
    }

    content_hash
        .map(|hash| FileContentDigest::ContentHash(hash.to_string()))
        .ok_or_else(|| {
            DriveError::MissingContentIdentity(
                "revision has neither a clear digest nor a content hash".into(),
            )
        })
}

fn clear_digest(x_attributes: Option<&str>, decryptor: &dyn XAttrDecryptor) -> anyhow::Result<String> {
    let encrypted = x_attributes.context("missing extended attributes")?;
    let attributes = decrypt_extended_attributes(encrypted, decryptor)?;
    attributes
        .sha1_digest()
        .map(str::to_owned)
        .context("missing clear content hash")
}
