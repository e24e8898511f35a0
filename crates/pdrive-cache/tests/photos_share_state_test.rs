//! Live photos share state: classification, deduplication and delivery on a
//! caller-supplied runtime.

use futures::StreamExt;
use pdrive_cache::{
    CacheContext, PhotosShareState, PhotosShareStateObserver, PhotosShareStateStream, ShareRecord,
    VolumeRecord,
};
use pdrive_core::types::{ShareKind, VolumeType};
use std::time::Duration;
use tokio::runtime::Handle;

fn photos_share(volume_id: &str, locked: bool) -> ShareRecord {
    ShareRecord {
        id: "photos-share".into(),
        kind: ShareKind::Photos,
        volume_id: Some(volume_id.into()),
        root_link_id: Some("stream-root".into()),
        creator: Some("owner@proton.test".into()),
        address_id: None,
        locked,
    }
}

fn volume(id: &str, kind: VolumeType) -> VolumeRecord {
    VolumeRecord {
        id: id.into(),
        kind,
        max_space: 0,
        used_space: 0,
    }
}

async fn commit(context: &CacheContext, volume_record: VolumeRecord, share: ShareRecord) {
    context
        .perform(|store| {
            store.upsert_volume(volume_record);
            store.upsert_share(share);
            store.save_or_rollback()
        })
        .await
        .unwrap();
}

async fn next_state(stream: &mut PhotosShareStateStream) -> PhotosShareState {
    tokio::time::timeout(Duration::from_secs(5), stream.next())
        .await
        .expect("state delivered in time")
        .expect("stream open")
}

async fn assert_quiet(stream: &mut PhotosShareStateStream) {
    let outcome = tokio::time::timeout(Duration::from_millis(300), stream.next()).await;
    assert!(outcome.is_err(), "unexpected state: {outcome:?}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn empty_cache_is_not_found() {
    let context = CacheContext::in_memory();
    let observer = PhotosShareStateObserver::new(context).await;
    let mut states = observer.state(&Handle::current());
    assert_eq!(next_state(&mut states).await, PhotosShareState::NotFound);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn follows_share_and_volume_changes() {
    let context = CacheContext::in_memory();
    let observer = PhotosShareStateObserver::new(context.clone()).await;
    let mut states = observer.state(&Handle::current());
    assert_eq!(next_state(&mut states).await, PhotosShareState::NotFound);

    commit(
        &context,
        volume("photo-vol", VolumeType::Photo),
        photos_share("photo-vol", false),
    )
    .await;
    assert_eq!(next_state(&mut states).await, PhotosShareState::PhotoVolume);

    commit(
        &context,
        volume("main-vol", VolumeType::Main),
        photos_share("main-vol", false),
    )
    .await;
    assert_eq!(next_state(&mut states).await, PhotosShareState::LegacyShare);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn identical_classifications_are_emitted_once() {
    let context = CacheContext::in_memory();
    commit(
        &context,
        volume("photo-vol", VolumeType::Photo),
        photos_share("photo-vol", false),
    )
    .await;

    let observer = PhotosShareStateObserver::new(context.clone()).await;
    let mut states = observer.state(&Handle::current());
    assert_eq!(next_state(&mut states).await, PhotosShareState::PhotoVolume);

    // the share changes, its classification does not
    commit(
        &context,
        volume("photo-vol", VolumeType::Photo),
        photos_share("photo-vol", true),
    )
    .await;
    assert_quiet(&mut states).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn non_photo_shares_are_ignored() {
    let context = CacheContext::in_memory();
    let observer = PhotosShareStateObserver::new(context.clone()).await;
    let mut states = observer.state(&Handle::current());
    assert_eq!(next_state(&mut states).await, PhotosShareState::NotFound);

    let mut main_share = photos_share("main-vol", false);
    main_share.id = "main-share".into();
    main_share.kind = ShareKind::Main;
    commit(&context, volume("main-vol", VolumeType::Main), main_share).await;
    assert_quiet(&mut states).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn volume_cached_after_share_reclassifies() {
    let context = CacheContext::in_memory();
    let observer = PhotosShareStateObserver::new(context.clone()).await;
    let mut states = observer.state(&Handle::current());
    assert_eq!(next_state(&mut states).await, PhotosShareState::NotFound);

    context
        .perform(|store| {
            store.upsert_share(photos_share("photo-vol", false));
            store.save_or_rollback()
        })
        .await
        .unwrap();
    assert_eq!(next_state(&mut states).await, PhotosShareState::LegacyShare);

    context
        .perform(|store| {
            store.upsert_volume(volume("photo-vol", VolumeType::Photo));
            store.save_or_rollback()
        })
        .await
        .unwrap();
    assert_eq!(next_state(&mut states).await, PhotosShareState::PhotoVolume);
}

#[test]
fn delivers_on_the_delivery_runtime() {
    let delivery = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .unwrap();
    let observing = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .unwrap();

    observing.block_on(async move {
        let context = CacheContext::in_memory();
        commit(
            &context,
            volume("photo-vol", VolumeType::Photo),
            photos_share("photo-vol", false),
        )
        .await;
        let observer = PhotosShareStateObserver::new(context.clone()).await;
        let mut states = observer.state(delivery.handle());
        assert_eq!(next_state(&mut states).await, PhotosShareState::PhotoVolume);

        // with the delivery runtime gone, new classifications have no writer
        delivery.shutdown_background();
        commit(
            &context,
            volume("main-vol", VolumeType::Main),
            photos_share("main-vol", false),
        )
        .await;
        let after = tokio::time::timeout(Duration::from_secs(5), states.next())
            .await
            .expect("stream closes in time");
        assert_eq!(after, None);
    });
}
