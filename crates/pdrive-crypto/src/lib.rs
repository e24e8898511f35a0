//! pdrive-crypto: content identity of file revisions
//!
//! Encryption itself is an opaque capability supplied by the caller through
//! [`XAttrDecryptor`]. This crate decides which content identity a revision has
//! and derives the keyed hashes a move request carries:
//!
//! ```text
//! extended attributes ──decrypt──► Common.Digests.SHA1 ──► ContentDigest (portable)
//!          │ (absent / undecryptable)
//!          ▼
//! legacy content hash ───────────────────────────────────► ContentHash (bound to parent key)
//! ```

pub mod digest;
pub mod hashing;

pub use digest::{
    decrypt_extended_attributes, resolve_content_digest, ClearXAttrDecryptor, ExtendedAttributes,
    FileContentDigest, XAttrDecryptor,
};
pub use hashing::{content_hash_for_move, name_hash};
