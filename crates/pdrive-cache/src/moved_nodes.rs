//! Applies a confirmed remote move to the local cache right away instead of
//! waiting for the server event.

use pdrive_core::config::UnconfirmedNodePolicy;
use pdrive_core::{DriveError, DriveResult, MovedLinkInfo, NodeIdentifier};
use tracing::{debug, info, warn};

use crate::context::CacheContext;
use crate::records::NodeRecord;
use crate::store::CacheStore;

pub struct MovedNodesUpdateRepository {
    context: CacheContext,
    policy: UnconfirmedNodePolicy,
}

impl MovedNodesUpdateRepository {
    pub fn new(context: CacheContext) -> Self {
        Self {
            context,
            policy: UnconfirmedNodePolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: UnconfirmedNodePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Move `nodes` under `new_parent` using the metadata the server confirmed
    /// in `infos`. The whole batch is one transaction.
    pub async fn update_local_db(
        &self,
        new_parent: &NodeIdentifier,
        nodes: &[NodeIdentifier],
        infos: &[MovedLinkInfo],
    ) -> DriveResult<()> {
        let policy = self.policy;
        self.context
            .perform(|store| match apply_moves(store, new_parent, nodes, infos, policy) {
                Ok(moved) => {
                    store.save_or_rollback()?;
                    info!(parent = %new_parent, moved, requested = nodes.len(), "moved nodes applied");
                    Ok(())
                }
                Err(e) => {
                    store.rollback();
                    Err(e)
                }
            })
            .await
    }
}

/// Mutate the working tables; returns how many nodes were moved.
fn apply_moves(
    store: &mut CacheStore,
    new_parent: &NodeIdentifier,
    nodes: &[NodeIdentifier],
    infos: &[MovedLinkInfo],
    policy: UnconfirmedNodePolicy,
) -> DriveResult<usize> {
    match store.node(new_parent) {
        Some(parent) if parent.is_folder() => {}
        Some(_) => {
            return Err(DriveError::invalid_state(
                format!("node {new_parent}"),
                "new parent is not a folder",
            ))
        }
        None => {
            return Err(DriveError::invalid_state(
                format!("node {new_parent}"),
                "new parent is not cached",
            ))
        }
    }

    let mut moved = 0;
    for identifier in nodes {
        let node = store
            .node_mut(identifier)
            .ok_or_else(|| DriveError::invalid_state(format!("node {identifier}"), "not cached"))?;

        match infos.iter().find(|info| info.link.link_id == identifier.id) {
            Some(info) => apply_confirmed(node, info),
            None => match policy {
                UnconfirmedNodePolicy::Skip => {
                    warn!(node = %identifier, "move not confirmed by server, node left as is");
                    continue;
                }
                UnconfirmedNodePolicy::Reparent => {
                    warn!(node = %identifier, "move not confirmed by server, reparenting only");
                }
            },
        }
        node.parent = Some(new_parent.clone());

        if node.is_photo() {
            store.detach_photo_from_albums(identifier);
        }
        moved += 1;
    }
    Ok(moved)
}

fn apply_confirmed(node: &mut NodeRecord, info: &MovedLinkInfo) {
    node.name = Some(info.link.name.clone());
    node.node_hash = info.link.hash.clone();
    node.node_passphrase = info.link.node_passphrase.clone();

    if info.is_anonymous {
        if let Some(signature) = &info.link.node_passphrase_signature {
            node.node_passphrase_signature = signature.clone();
        }
        node.name_signature_email = Some(info.signature_email.clone());
        node.signature_email = Some(info.signature_email.clone());
    }
    debug!(node = %node.identifier, anonymous = info.is_anonymous, "confirmed move applied");
}
