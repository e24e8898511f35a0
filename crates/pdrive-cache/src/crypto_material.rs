//! Reads the material a move or rename request needs from a cached node.

use pdrive_core::{DriveError, DriveResult, NodeIdentifier};
use pdrive_crypto::{FileContentDigest, XAttrDecryptor};
use std::sync::Arc;

use crate::context::CacheContext;
use crate::store::CacheStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeCryptoMaterial {
    pub identifier: NodeIdentifier,
    /// No signer recorded; the move has to be signed anonymously
    pub is_anonymous: bool,
    pub old_node_name: String,
    pub old_node_passphrase: String,
    pub old_name_signature_email: Option<String>,
    pub old_signature_email: Option<String>,
    pub old_name_hash: String,
    pub old_parent: NodeIdentifier,
    pub old_parent_key: String,
    /// Photos only
    pub content_digest: Option<FileContentDigest>,
}

pub struct NodeCryptoMaterialReader {
    context: CacheContext,
    decryptor: Arc<dyn XAttrDecryptor>,
}

impl NodeCryptoMaterialReader {
    pub fn new(context: CacheContext, decryptor: Arc<dyn XAttrDecryptor>) -> Self {
        Self { context, decryptor }
    }

    pub async fn read_node(&self, identifier: &NodeIdentifier) -> DriveResult<NodeCryptoMaterial> {
        let decryptor = Arc::clone(&self.decryptor);
        self.context
            .perform(|store| read_node_in(store, identifier, decryptor.as_ref()))
            .await
    }
}

/// Same as [`NodeCryptoMaterialReader::read_node`], for callers already inside
/// the context.
pub fn read_node_in(
    store: &CacheStore,
    identifier: &NodeIdentifier,
    decryptor: &dyn XAttrDecryptor,
) -> DriveResult<NodeCryptoMaterial> {
    let entity = format!("node {identifier}");
    let node = store
        .node(identifier)
        .ok_or_else(|| DriveError::invalid_state(&entity, "node is not cached"))?;

    // photos moved out of the stream still hang off their first album
    let old_parent = node
        .parent
        .clone()
        .or_else(|| node.albums().and_then(|albums| albums.first().cloned()))
        .ok_or_else(|| DriveError::invalid_state(&entity, "The moving node should have a parent."))?;

    let old_parent_key = match store.node(&old_parent) {
        Some(parent) => parent.node_key.clone(),
        None => store
            .album(&old_parent)
            .map(|album| album.node_key.clone())
            .ok_or_else(|| {
                DriveError::invalid_state(&entity, format!("parent {old_parent} is not cached"))
            })?,
    };

    let old_node_name = node
        .name
        .clone()
        .filter(|name| !name.is_empty())
        .ok_or_else(|| {
            DriveError::invalid_state(&entity, "The renaming node should have a valid old name.")
        })?;

    let content_digest = if node.is_photo() {
        node.current_revision()
            .map(|revision| revision.content_digest(decryptor))
            .transpose()?
    } else {
        None
    };

    let is_anonymous = node
        .signature_email
        .as_deref()
        .map_or(true, str::is_empty);

    Ok(NodeCryptoMaterial {
        identifier: identifier.clone(),
        is_anonymous,
        old_node_name,
        old_node_passphrase: node.node_passphrase.clone(),
        old_name_signature_email: node.name_signature_email.clone(),
        old_signature_email: node.signature_email.clone(),
        old_name_hash: node.node_hash.clone(),
        old_parent,
        old_parent_key,
        content_digest,
    })
}
