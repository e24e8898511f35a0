//! Folds a remote album link and the locally cached listing and photos into
//! one album record.

use pdrive_core::types::LinkType;
use pdrive_core::{DriveError, DriveResult, Link, NodeIdentifier};
use tracing::{debug, info};

use crate::context::CacheContext;
use crate::records::AlbumRecord;
use crate::store::CacheStore;

pub struct AlbumFactory;

impl AlbumFactory {
    /// Create or update the album identified by the link, its listing, its
    /// photo set and its cover. Changes stay uncommitted.
    pub fn update_or_create_album(store: &mut CacheStore, link: &Link) -> DriveResult<AlbumRecord> {
        if link.link_type != LinkType::Album {
            return Err(DriveError::invalid_state(
                format!("link {}", link.identifier()),
                "not an album link",
            ));
        }
        let identifier = link.identifier();

        apply_link(store.fetch_or_create_album(&identifier), link);

        store.fetch_or_create_album_listing(&identifier);
        store.link_album_listing(&identifier, &identifier)?;

        // photo listings share their photo's identifier
        let photos: Vec<NodeIdentifier> = store
            .album_listing(&identifier)
            .map(|listing| listing.photos.iter().cloned().collect())
            .unwrap_or_default();
        store.set_album_photos(&identifier, photos)?;

        let listing = store.fetch_or_create_album_listing(&identifier);
        listing.share_id = link
            .sharing_details
            .as_ref()
            .map(|details| details.share_id.clone());
        if let Some(properties) = &link.album_properties {
            listing.locked = properties.locked;
            listing.cover_link_id = properties.cover_link_id.clone();
            listing.last_activity_time = properties.last_activity_time;
            listing.photo_count = properties.photo_count;
        }

        let cover = link
            .album_properties
            .as_ref()
            .and_then(|properties| properties.cover_link_id.as_ref())
            .map(|cover_id| NodeIdentifier::new(cover_id.clone(), link.volume_id.clone()))
            .filter(|cover| store.photo(cover).is_some());

        let album = store.fetch_or_create_album(&identifier);
        album.cover_photo = cover;
        debug!(
            album = %identifier,
            photos = album.photos.len(),
            cover = album.cover_photo.is_some(),
            "album reconciled"
        );
        Ok(album.clone())
    }
}

fn apply_link(album: &mut AlbumRecord, link: &Link) {
    album.share_id = link
        .sharing_details
        .as_ref()
        .map(|details| details.share_id.clone());
    album.parent = link
        .parent_link_id
        .as_ref()
        .map(|parent| NodeIdentifier::new(parent.clone(), link.volume_id.clone()));
    album.name = Some(link.name.clone());
    album.node_hash = link.hash.clone();
    album.node_key = link.node_key.clone();
    album.node_passphrase = link.node_passphrase.clone();
    album.node_passphrase_signature = link.node_passphrase_signature.clone();
    album.name_signature_email = link.name_signature_email.clone();
    album.signature_email = Some(link.signature_email.clone()).filter(|email| !email.is_empty());
    album.state = link.state;
    album.create_time = link.create_time;
    album.modify_time = link.modify_time;
    album.x_attributes = link.x_attr.clone();

    if let Some(properties) = &link.album_properties {
        album.locked = properties.locked;
        album.cover_link_id = properties.cover_link_id.clone();
        album.last_activity_time = properties.last_activity_time;
        album.node_hash_key = Some(properties.node_hash_key.clone());
        album.photo_count = properties.photo_count;
    }
}

/// Applies a page of remote album links in one transaction.
pub struct AlbumsUpdater {
    context: CacheContext,
}

impl AlbumsUpdater {
    pub fn new(context: CacheContext) -> Self {
        Self { context }
    }

    pub async fn update_albums(&self, links: &[Link]) -> DriveResult<Vec<AlbumRecord>> {
        self.context
            .perform(|store| {
                let albums = links
                    .iter()
                    .map(|link| AlbumFactory::update_or_create_album(store, link))
                    .collect::<DriveResult<Vec<_>>>();
                match albums {
                    Ok(albums) => {
                        store.save_or_rollback()?;
                        info!(albums = albums.len(), "albums updated");
                        Ok(albums)
                    }
                    Err(e) => {
                        store.rollback();
                        Err(e)
                    }
                }
            })
            .await
    }
}
