//! Album aggregation: remote album links folded with cached listings and photos.

use pdrive_cache::{
    AlbumFactory, AlbumsUpdater, CacheContext, CacheStore, MemoryBackend, NodeKind, NodeRecord,
    PhotoListingRecord, RevisionRecord,
};
use pdrive_core::types::{AlbumProperties, LinkType, NodeState, SharingDetails};
use pdrive_core::{DriveError, Link, NodeIdentifier};
use std::collections::BTreeSet;

const VOLUME: &str = "photo-vol";

fn id(link: &str) -> NodeIdentifier {
    NodeIdentifier::new(link, VOLUME)
}

fn photo(link: &str) -> NodeRecord {
    NodeRecord {
        identifier: id(link),
        share_id: None,
        name: Some(format!("name-{link}")),
        node_hash: format!("hash-{link}"),
        node_key: String::new(),
        node_passphrase: "pass".into(),
        node_passphrase_signature: String::new(),
        name_signature_email: None,
        signature_email: None,
        parent: Some(id("stream-root")),
        mime_type: "image/heic".into(),
        state: NodeState::Active,
        kind: NodeKind::Photo {
            capture_time: 1_700_000_000,
            revision: RevisionRecord {
                id: format!("rev-{link}"),
                x_attributes: None,
                content_hash: Some("legacy".into()),
                signature_email: None,
                create_time: 0,
            },
            albums: BTreeSet::new(),
        },
    }
}

fn album_link(cover: Option<&str>, photo_count: u32) -> Link {
    Link {
        link_id: "album-1".into(),
        parent_link_id: Some("stream-root".into()),
        volume_id: VOLUME.into(),
        link_type: LinkType::Album,
        name: "enc-album-name".into(),
        name_signature_email: Some("owner@proton.test".into()),
        hash: "album-hash".into(),
        state: NodeState::Active,
        size: 0,
        mime_type: "Album".into(),
        node_key: "album-key".into(),
        node_passphrase: "album-pass".into(),
        node_passphrase_signature: "album-sig".into(),
        signature_email: "owner@proton.test".into(),
        create_time: 1,
        modify_time: 2,
        trashed: None,
        x_attr: None,
        sharing_details: Some(SharingDetails {
            share_id: "share-9".into(),
        }),
        album_properties: Some(AlbumProperties {
            locked: false,
            cover_link_id: cover.map(String::from),
            last_activity_time: 1_700_000_100,
            node_hash_key: "album-hash-key".into(),
            photo_count,
        }),
    }
}

fn store_with_photos(photos: &[&str]) -> CacheStore {
    let mut store = CacheStore::load(Box::new(MemoryBackend::new())).unwrap();
    for link in photos {
        store.upsert_node(photo(link));
    }
    store
}

fn list_photo(store: &mut CacheStore, link: &str) {
    store.upsert_photo_listing(PhotoListingRecord {
        identifier: id(link),
        capture_time: 1_700_000_000,
        album: Some(id("album-1")),
    });
}

#[test]
fn creates_album_listing_and_applies_link() {
    let mut store = store_with_photos(&[]);
    let album = AlbumFactory::update_or_create_album(&mut store, &album_link(None, 0)).unwrap();

    assert_eq!(album.identifier, id("album-1"));
    assert_eq!(album.share_id.as_deref(), Some("share-9"));
    assert_eq!(album.parent, Some(id("stream-root")));
    assert_eq!(album.node_hash_key.as_deref(), Some("album-hash-key"));
    assert_eq!(album.listing, Some(id("album-1")));
    assert_eq!(album.cover_photo, None);

    let listing = store.album_listing(&id("album-1")).unwrap();
    assert_eq!(listing.album, Some(id("album-1")));
    assert_eq!(listing.share_id.as_deref(), Some("share-9"));
    assert_eq!(listing.last_activity_time, 1_700_000_100);
}

#[test]
fn second_call_updates_same_album() {
    let mut store = store_with_photos(&["p1", "p2", "p3"]);
    AlbumFactory::update_or_create_album(&mut store, &album_link(None, 0)).unwrap();
    list_photo(&mut store, "p1");
    list_photo(&mut store, "p2");

    let first = AlbumFactory::update_or_create_album(&mut store, &album_link(Some("p1"), 2)).unwrap();
    assert_eq!(first.cover_photo, Some(id("p1")));
    assert_eq!(first.photos, BTreeSet::from([id("p1"), id("p2")]));

    // listing now references p2 and p3 only
    store.upsert_photo_listing(PhotoListingRecord {
        identifier: id("p1"),
        capture_time: 0,
        album: None,
    });
    list_photo(&mut store, "p3");

    let second = AlbumFactory::update_or_create_album(&mut store, &album_link(Some("p3"), 2)).unwrap();
    assert_eq!(store.albums().count(), 1);
    assert_eq!(second.cover_photo, Some(id("p3")));
    assert_eq!(second.photos, BTreeSet::from([id("p2"), id("p3")]));
    assert_eq!(second.photo_count, 2);

    let p1 = store.node(&id("p1")).unwrap();
    assert!(p1.albums().unwrap().is_empty());
    let p3 = store.node(&id("p3")).unwrap();
    assert!(p3.albums().unwrap().contains(&id("album-1")));
}

#[test]
fn uncached_cover_and_listed_photos_are_ignored() {
    let mut store = store_with_photos(&["p1"]);
    AlbumFactory::update_or_create_album(&mut store, &album_link(None, 0)).unwrap();
    list_photo(&mut store, "p1");
    list_photo(&mut store, "not-downloaded");

    let album =
        AlbumFactory::update_or_create_album(&mut store, &album_link(Some("not-downloaded"), 2))
            .unwrap();
    assert_eq!(album.cover_photo, None);
    assert_eq!(album.photos, BTreeSet::from([id("p1")]));
}

#[test]
fn removing_cover_id_clears_cover() {
    let mut store = store_with_photos(&["p1"]);
    let with_cover =
        AlbumFactory::update_or_create_album(&mut store, &album_link(Some("p1"), 1)).unwrap();
    assert_eq!(with_cover.cover_photo, Some(id("p1")));

    let without = AlbumFactory::update_or_create_album(&mut store, &album_link(None, 1)).unwrap();
    assert_eq!(without.cover_photo, None);
}

#[test]
fn non_album_link_is_rejected() {
    let mut store = store_with_photos(&[]);
    let mut link = album_link(None, 0);
    link.link_type = LinkType::Folder;
    let err = AlbumFactory::update_or_create_album(&mut store, &link).unwrap_err();
    assert!(matches!(err, DriveError::InvalidState { .. }));
    assert!(store.album(&id("album-1")).is_none());
}

#[tokio::test]
async fn updater_commits_page_in_one_transaction() {
    let context = CacheContext::in_memory();
    let mut changes = context.subscribe();
    let updater = AlbumsUpdater::new(context.clone());

    let mut second = album_link(None, 0);
    second.link_id = "album-2".into();
    let albums = updater
        .update_albums(&[album_link(None, 0), second])
        .await
        .unwrap();
    assert_eq!(albums.len(), 2);

    changes.changed().await.unwrap();
    assert_eq!(*changes.borrow(), 1);
    assert!(!context.perform(|store| store.has_changes()).await);
}

#[tokio::test]
async fn updater_rolls_back_on_bad_link() {
    let context = CacheContext::in_memory();
    let updater = AlbumsUpdater::new(context.clone());

    let mut folder = album_link(None, 0);
    folder.link_id = "folder".into();
    folder.link_type = LinkType::Folder;
    let result = updater.update_albums(&[album_link(None, 0), folder]).await;
    assert!(result.is_err());

    let count = context.perform(|store| store.albums().count()).await;
    assert_eq!(count, 0);
}
