//! Cache tables and the transactional store over them.
//!
//! `CacheStore` keeps two copies of the tables: the working set that
//! operations mutate and the last committed snapshot. `save_or_rollback`
//! persists the working set through the backend; a failed save restores the
//! snapshot, so a batch is either fully applied or not at all.

use pdrive_core::{DriveError, DriveResult, NodeIdentifier};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::backend::CacheBackend;
use crate::records::{
    AlbumListingRecord, AlbumRecord, NodeRecord, PhotoListingRecord, ShareRecord, VolumeRecord,
};

/// Every table of the cache, keyed by record identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheTables {
    #[serde(default, with = "keyed_records")]
    pub volumes: BTreeMap<String, VolumeRecord>,
    #[serde(default, with = "keyed_records")]
    pub shares: BTreeMap<String, ShareRecord>,
    #[serde(default, with = "keyed_records")]
    pub nodes: BTreeMap<NodeIdentifier, NodeRecord>,
    #[serde(default, with = "keyed_records")]
    pub albums: BTreeMap<NodeIdentifier, AlbumRecord>,
    #[serde(default, with = "keyed_records")]
    pub album_listings: BTreeMap<NodeIdentifier, AlbumListingRecord>,
    #[serde(default, with = "keyed_records")]
    pub photo_listings: BTreeMap<NodeIdentifier, PhotoListingRecord>,
}

impl CacheTables {
    pub fn is_empty(&self) -> bool {
        self.volumes.is_empty()
            && self.shares.is_empty()
            && self.nodes.is_empty()
            && self.albums.is_empty()
            && self.album_listings.is_empty()
            && self.photo_listings.is_empty()
    }
}

/// Tables are stored as lists of records; the key is recomputed on load.
mod keyed_records {
    use crate::records::Keyed;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::BTreeMap;

    pub fn serialize<S, R>(map: &BTreeMap<R::Key, R>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        R: Keyed + Serialize,
    {
        serializer.collect_seq(map.values())
    }

    pub fn deserialize<'de, D, R>(deserializer: D) -> Result<BTreeMap<R::Key, R>, D::Error>
    where
        D: Deserializer<'de>,
        R: Keyed + Deserialize<'de>,
    {
        let records = Vec::<R>::deserialize(deserializer)?;
        Ok(records.into_iter().map(|r| (r.key(), r)).collect())
    }
}

/// Transactional view of the cache. Only reachable through
/// [`crate::CacheContext`], which serializes access to it.
pub struct CacheStore {
    tables: CacheTables,
    committed: CacheTables,
    backend: Box<dyn CacheBackend>,
    changes: Arc<watch::Sender<u64>>,
}

impl CacheStore {
    /// Load the committed tables from `backend`.
    pub fn load(backend: Box<dyn CacheBackend>) -> DriveResult<Self> {
        let committed = backend.load()?;
        debug!(
            backend = %backend.describe(),
            nodes = committed.nodes.len(),
            albums = committed.albums.len(),
            "cache loaded"
        );
        Ok(Self::with_tables(backend, committed))
    }

    /// Store whose committed state is `committed`, without reading the backend.
    pub fn with_tables(backend: Box<dyn CacheBackend>, committed: CacheTables) -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            tables: committed.clone(),
            committed,
            backend,
            changes: Arc::new(changes),
        }
    }

    pub(crate) fn change_notifier(&self) -> Arc<watch::Sender<u64>> {
        Arc::clone(&self.changes)
    }

    pub fn backend_description(&self) -> String {
        self.backend.describe()
    }

    pub fn tables(&self) -> &CacheTables {
        &self.tables
    }

    // ── Volumes and shares ───────────────────────────────────────────────────

    pub fn volume(&self, id: &str) -> Option<&VolumeRecord> {
        self.tables.volumes.get(id)
    }

    pub fn upsert_volume(&mut self, volume: VolumeRecord) {
        self.tables.volumes.insert(volume.id.clone(), volume);
    }

    pub fn share(&self, id: &str) -> Option<&ShareRecord> {
        self.tables.shares.get(id)
    }

    /// Shares ordered by share ID.
    pub fn shares(&self) -> impl Iterator<Item = &ShareRecord> {
        self.tables.shares.values()
    }

    pub fn upsert_share(&mut self, share: ShareRecord) {
        self.tables.shares.insert(share.id.clone(), share);
    }

    // ── Nodes ────────────────────────────────────────────────────────────────

    pub fn node(&self, identifier: &NodeIdentifier) -> Option<&NodeRecord> {
        self.tables.nodes.get(identifier)
    }

    pub fn node_mut(&mut self, identifier: &NodeIdentifier) -> Option<&mut NodeRecord> {
        self.tables.nodes.get_mut(identifier)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &NodeRecord> {
        self.tables.nodes.values()
    }

    /// The node with this identifier, if it is a photo.
    pub fn photo(&self, identifier: &NodeIdentifier) -> Option<&NodeRecord> {
        self.node(identifier).filter(|node| node.is_photo())
    }

    /// Insert or replace a node. A photo's album memberships are mirrored on
    /// the albums; memberships of albums that are not cached are dropped.
    pub fn upsert_node(&mut self, mut node: NodeRecord) {
        let identifier = node.identifier.clone();
        self.detach_photo_from_albums(&identifier);
        if let Some(albums) = node.albums_mut() {
            albums.retain(|album| match self.tables.albums.get_mut(album) {
                Some(record) => {
                    record.photos.insert(identifier.clone());
                    true
                }
                None => false,
            });
        }
        self.tables.nodes.insert(identifier, node);
    }

    pub fn remove_node(&mut self, identifier: &NodeIdentifier) -> Option<NodeRecord> {
        self.detach_photo_from_albums(identifier);
        for album in self.tables.albums.values_mut() {
            if album.cover_photo.as_ref() == Some(identifier) {
                album.cover_photo = None;
            }
        }
        self.tables.nodes.remove(identifier)
    }

    /// Remove a photo from every album it belongs to, on both sides.
    pub fn detach_photo_from_albums(&mut self, photo: &NodeIdentifier) {
        let Some(albums) = self
            .tables
            .nodes
            .get_mut(photo)
            .and_then(NodeRecord::albums_mut)
        else {
            return;
        };
        let previous = std::mem::take(albums);
        for album in &previous {
            if let Some(record) = self.tables.albums.get_mut(album) {
                record.photos.remove(photo);
            }
        }
        if !previous.is_empty() {
            debug!(%photo, albums = previous.len(), "photo detached from albums");
        }
    }

    // ── Albums and listings ──────────────────────────────────────────────────

    pub fn album(&self, identifier: &NodeIdentifier) -> Option<&AlbumRecord> {
        self.tables.albums.get(identifier)
    }

    pub fn albums(&self) -> impl Iterator<Item = &AlbumRecord> {
        self.tables.albums.values()
    }

    pub fn fetch_or_create_album(&mut self, identifier: &NodeIdentifier) -> &mut AlbumRecord {
        self.tables
            .albums
            .entry(identifier.clone())
            .or_insert_with(|| AlbumRecord::new(identifier.clone()))
    }

    pub fn album_listing(&self, identifier: &NodeIdentifier) -> Option<&AlbumListingRecord> {
        self.tables.album_listings.get(identifier)
    }

    pub fn fetch_or_create_album_listing(
        &mut self,
        identifier: &NodeIdentifier,
    ) -> &mut AlbumListingRecord {
        self.tables
            .album_listings
            .entry(identifier.clone())
            .or_insert_with(|| AlbumListingRecord::new(identifier.clone()))
    }

    /// Point an album and a listing at each other.
    pub fn link_album_listing(
        &mut self,
        album: &NodeIdentifier,
        listing: &NodeIdentifier,
    ) -> DriveResult<()> {
        let listing_record = self
            .tables
            .album_listings
            .get_mut(listing)
            .ok_or_else(|| DriveError::invalid_state(format!("album listing {listing}"), "not cached"))?;
        listing_record.album = Some(album.clone());
        let album_record = self
            .tables
            .albums
            .get_mut(album)
            .ok_or_else(|| DriveError::invalid_state(format!("album {album}"), "not cached"))?;
        album_record.listing = Some(listing.clone());
        Ok(())
    }

    pub fn photo_listing(&self, identifier: &NodeIdentifier) -> Option<&PhotoListingRecord> {
        self.tables.photo_listings.get(identifier)
    }

    /// Insert or replace a photo listing and register it with its album
    /// listing, when that listing is cached.
    pub fn upsert_photo_listing(&mut self, listing: PhotoListingRecord) {
        let identifier = listing.identifier.clone();
        if let Some(previous) = self.tables.photo_listings.get(&identifier) {
            if let Some(album) = previous.album.clone() {
                if let Some(record) = self.tables.album_listings.get_mut(&album) {
                    record.photos.remove(&identifier);
                }
            }
        }
        if let Some(album) = &listing.album {
            if let Some(record) = self.tables.album_listings.get_mut(album) {
                record.photos.insert(identifier.clone());
            }
        }
        self.tables.photo_listings.insert(identifier, listing);
    }

    /// Replace the photos of an album. Identifiers that don't resolve to a
    /// cached photo are ignored; memberships are updated on both sides.
    pub fn set_album_photos(
        &mut self,
        album: &NodeIdentifier,
        photos: impl IntoIterator<Item = NodeIdentifier>,
    ) -> DriveResult<()> {
        let photos: BTreeSet<NodeIdentifier> = photos
            .into_iter()
            .filter(|id| self.photo(id).is_some())
            .collect();
        let record = self
            .tables
            .albums
            .get_mut(album)
            .ok_or_else(|| DriveError::invalid_state(format!("album {album}"), "not cached"))?;
        let previous = std::mem::replace(&mut record.photos, photos.clone());

        for removed in previous.difference(&photos) {
            if let Some(albums) = self
                .tables
                .nodes
                .get_mut(removed)
                .and_then(NodeRecord::albums_mut)
            {
                albums.remove(album);
            }
        }
        for added in &photos {
            if let Some(albums) = self
                .tables
                .nodes
                .get_mut(added)
                .and_then(NodeRecord::albums_mut)
            {
                albums.insert(album.clone());
            }
        }
        Ok(())
    }

    // ── Transactions ─────────────────────────────────────────────────────────

    /// Whether the working tables differ from the last commit.
    pub fn has_changes(&self) -> bool {
        self.tables != self.committed
    }

    /// Persist pending changes. On failure the pending changes are discarded
    /// and the storage error returned.
    pub fn save_or_rollback(&mut self) -> DriveResult<()> {
        if !self.has_changes() {
            return Ok(());
        }
        match self.backend.persist(&self.tables) {
            Ok(()) => {
                self.committed = self.tables.clone();
                self.changes.send_modify(|generation| *generation += 1);
                info!(
                    backend = %self.backend.describe(),
                    generation = *self.changes.borrow(),
                    "cache committed"
                );
                Ok(())
            }
            Err(e) => {
                warn!(backend = %self.backend.describe(), error = %e, "cache save failed, rolling back");
                self.rollback();
                Err(e)
            }
        }
    }

    /// Drop pending changes.
    pub fn rollback(&mut self) {
        if self.has_changes() {
            debug!("rolling back uncommitted cache changes");
            self.tables = self.committed.clone();
        }
    }

    /// Clear every table and persist the empty cache.
    pub fn wipe(&mut self) -> DriveResult<()> {
        info!(backend = %self.backend.describe(), "wiping local cache");
        self.tables = CacheTables::default();
        self.save_or_rollback()
    }
}
