//! Cached entities.
//!
//! Records are plain values. Relationships between them are identifiers, so a
//! record read under one acquisition of the context can't be used to mutate the
//! cache behind its back: writes always go through the store by identifier.

use pdrive_core::types::{NodeState, ShareKind, VolumeType};
use pdrive_core::{DriveResult, NodeIdentifier};
use pdrive_crypto::{resolve_content_digest, FileContentDigest, XAttrDecryptor};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeRecord {
    pub id: String,
    #[serde(default)]
    pub kind: VolumeType,
    #[serde(default)]
    pub max_space: u64,
    #[serde(default)]
    pub used_space: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareRecord {
    pub id: String,
    #[serde(default)]
    pub kind: ShareKind,
    #[serde(default)]
    pub volume_id: Option<String>,
    #[serde(default)]
    pub root_link_id: Option<String>,
    #[serde(default)]
    pub creator: Option<String>,
    #[serde(default)]
    pub address_id: Option<String>,
    #[serde(default)]
    pub locked: bool,
}

/// Immutable content version of a file or photo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionRecord {
    pub id: String,
    /// Encrypted extended attributes (carry the clear content digest)
    #[serde(default)]
    pub x_attributes: Option<String>,
    /// Legacy content hash, keyed with the parent at upload time
    #[serde(default)]
    pub content_hash: Option<String>,
    #[serde(default)]
    pub signature_email: Option<String>,
    #[serde(default)]
    pub create_time: i64,
}

impl RevisionRecord {
    pub fn content_digest(&self, decryptor: &dyn XAttrDecryptor) -> DriveResult<FileContentDigest> {
        resolve_content_digest(
            self.x_attributes.as_deref(),
            self.content_hash.as_deref(),
            decryptor,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeKind {
    Folder {
        #[serde(default)]
        node_hash_key: Option<String>,
    },
    File {
        #[serde(default)]
        active_revision: Option<RevisionRecord>,
    },
    Photo {
        capture_time: i64,
        revision: RevisionRecord,
        /// Albums this photo belongs to (inverse of `AlbumRecord::photos`)
        #[serde(default)]
        albums: BTreeSet<NodeIdentifier>,
    },
}

/// A file, folder or photo in the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub identifier: NodeIdentifier,
    #[serde(default)]
    pub share_id: Option<String>,
    /// Encrypted name
    #[serde(default)]
    pub name: Option<String>,
    pub node_hash: String,
    #[serde(default)]
    pub node_key: String,
    pub node_passphrase: String,
    #[serde(default)]
    pub node_passphrase_signature: String,
    #[serde(default)]
    pub name_signature_email: Option<String>,
    #[serde(default)]
    pub signature_email: Option<String>,
    /// Parent folder
    #[serde(default)]
    pub parent: Option<NodeIdentifier>,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub state: NodeState,
    pub kind: NodeKind,
}

impl NodeRecord {
    pub fn is_folder(&self) -> bool {
        matches!(self.kind, NodeKind::Folder { .. })
    }

    pub fn is_photo(&self) -> bool {
        matches!(self.kind, NodeKind::Photo { .. })
    }

    /// Albums of a photo; empty for other kinds.
    pub fn albums(&self) -> Option<&BTreeSet<NodeIdentifier>> {
        match &self.kind {
            NodeKind::Photo { albums, .. } => Some(albums),
            _ => None,
        }
    }

    pub(crate) fn albums_mut(&mut self) -> Option<&mut BTreeSet<NodeIdentifier>> {
        match &mut self.kind {
            NodeKind::Photo { albums, .. } => Some(albums),
            _ => None,
        }
    }

    /// Revision carrying the content identity: the photo revision, or the
    /// active revision of a file.
    pub fn current_revision(&self) -> Option<&RevisionRecord> {
        match &self.kind {
            NodeKind::Photo { revision, .. } => Some(revision),
            NodeKind::File { active_revision } => active_revision.as_ref(),
            NodeKind::Folder { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlbumRecord {
    pub identifier: NodeIdentifier,
    #[serde(default)]
    pub share_id: Option<String>,
    #[serde(default)]
    pub parent: Option<NodeIdentifier>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub node_hash: String,
    #[serde(default)]
    pub node_key: String,
    #[serde(default)]
    pub node_passphrase: String,
    #[serde(default)]
    pub node_passphrase_signature: String,
    #[serde(default)]
    pub name_signature_email: Option<String>,
    #[serde(default)]
    pub signature_email: Option<String>,
    #[serde(default)]
    pub state: NodeState,
    #[serde(default)]
    pub create_time: i64,
    #[serde(default)]
    pub modify_time: i64,
    #[serde(default)]
    pub x_attributes: Option<String>,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub cover_link_id: Option<String>,
    #[serde(default)]
    pub last_activity_time: i64,
    #[serde(default)]
    pub node_hash_key: Option<String>,
    #[serde(default)]
    pub photo_count: u32,
    #[serde(default)]
    pub cover_photo: Option<NodeIdentifier>,
    #[serde(default)]
    pub photos: BTreeSet<NodeIdentifier>,
    #[serde(default)]
    pub listing: Option<NodeIdentifier>,
}

impl AlbumRecord {
    pub fn new(identifier: NodeIdentifier) -> Self {
        Self {
            identifier,
            share_id: None,
            parent: None,
            name: None,
            node_hash: String::new(),
            node_key: String::new(),
            node_passphrase: String::new(),
            node_passphrase_signature: String::new(),
            name_signature_email: None,
            signature_email: None,
            state: NodeState::Active,
            create_time: 0,
            modify_time: 0,
            x_attributes: None,
            locked: false,
            cover_link_id: None,
            last_activity_time: 0,
            node_hash_key: None,
            photo_count: 0,
            cover_photo: None,
            photos: BTreeSet::new(),
            listing: None,
        }
    }
}

/// Lightweight summary of an album, filled from album listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlbumListingRecord {
    pub identifier: NodeIdentifier,
    #[serde(default)]
    pub share_id: Option<String>,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub cover_link_id: Option<String>,
    #[serde(default)]
    pub last_activity_time: i64,
    #[serde(default)]
    pub photo_count: u32,
    #[serde(default)]
    pub album: Option<NodeIdentifier>,
    /// Photo listings referenced by this album
    #[serde(default)]
    pub photos: BTreeSet<NodeIdentifier>,
}

impl AlbumListingRecord {
    pub fn new(identifier: NodeIdentifier) -> Self {
        Self {
            identifier,
            share_id: None,
            locked: false,
            cover_link_id: None,
            last_activity_time: 0,
            photo_count: 0,
            album: None,
            photos: BTreeSet::new(),
        }
    }
}

/// A photo as listed inside an album; the photo itself may not be cached yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoListingRecord {
    /// Same identifier as the listed photo
    pub identifier: NodeIdentifier,
    #[serde(default)]
    pub capture_time: i64,
    #[serde(default)]
    pub album: Option<NodeIdentifier>,
}

/// Records stored in identifier-keyed tables.
pub trait Keyed {
    type Key: Ord + Clone;

    fn key(&self) -> Self::Key;
}

impl Keyed for VolumeRecord {
    type Key = String;
    fn key(&self) -> String {
        self.id.clone()
    }
}

impl Keyed for ShareRecord {
    type Key = String;
    fn key(&self) -> String {
        self.id.clone()
    }
}

impl Keyed for NodeRecord {
    type Key = NodeIdentifier;
    fn key(&self) -> NodeIdentifier {
        self.identifier.clone()
    }
}

impl Keyed for AlbumRecord {
    type Key = NodeIdentifier;
    fn key(&self) -> NodeIdentifier {
        self.identifier.clone()
    }
}

impl Keyed for AlbumListingRecord {
    type Key = NodeIdentifier;
    fn key(&self) -> NodeIdentifier {
        self.identifier.clone()
    }
}

impl Keyed for PhotoListingRecord {
    type Key = NodeIdentifier;
    fn key(&self) -> NodeIdentifier {
        self.identifier.clone()
    }
}
