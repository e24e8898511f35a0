//! Which photo backend the account uses, observed live from cached shares.
//!
//! ```text
//! commits ─► FetchedResultsObserver<Vec<(ShareRecord, Option<VolumeType>)>>
//!                 │ (result changed)
//!                 ▼
//!        classify on blocking pool ──perform_blocking──► volume type
//!                 │ mpsc
//!                 ▼
//!        delivery task (caller runtime) ─ drop consecutive duplicates ─► stream
//! ```

use futures::Stream;
use pdrive_core::types::{ShareKind, VolumeType};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{info, warn};

use crate::context::CacheContext;
use crate::observer::FetchedResultsObserver;
use crate::records::ShareRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhotosShareState {
    /// No photos share cached
    NotFound,
    /// Photos share on a regular volume
    LegacyShare,
    /// Photos share on a dedicated photo volume
    PhotoVolume,
}

impl fmt::Display for PhotosShareState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PhotosShareState::NotFound => "not_found",
            PhotosShareState::LegacyShare => "legacy_share",
            PhotosShareState::PhotoVolume => "photo_volume",
        };
        f.write_str(s)
    }
}

pub struct PhotosShareStateObserver {
    context: CacheContext,
    shares: FetchedResultsObserver<Vec<ObservedShare>>,
}

/// A photos share with the type of its volume at fetch time, so caching the
/// volume after the share still changes the observed result.
type ObservedShare = (ShareRecord, Option<VolumeType>);

impl PhotosShareStateObserver {
    pub async fn new(context: CacheContext) -> Self {
        let shares = FetchedResultsObserver::start(context.clone(), |store| {
            store
                .shares()
                .filter(|share| share.kind == ShareKind::Photos)
                .map(|share| {
                    let volume = share
                        .volume_id
                        .as_deref()
                        .and_then(|id| store.volume(id))
                        .map(|volume| volume.kind);
                    (share.clone(), volume)
                })
                .collect::<Vec<_>>()
        })
        .await;
        Self { context, shares }
    }

    /// Stream of share states, without consecutive duplicates.
    ///
    /// Classification runs on the blocking pool of the current runtime;
    /// states are delivered by a task spawned on `delivery`. Dropping the
    /// stream stops both.
    pub fn state(&self, delivery: &Handle) -> PhotosShareStateStream {
        let mut shares = self.shares.results();
        let context = self.context.clone();
        let (classified_tx, mut classified_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = mpsc::unbounded_channel();

        let producer = tokio::spawn(async move {
            loop {
                let current = shares.borrow_and_update().clone();
                let blocking_context = context.clone();
                let state = match tokio::task::spawn_blocking(move || {
                    classify(&blocking_context, &current)
                })
                .await
                {
                    Ok(state) => state,
                    Err(e) => {
                        warn!(error = %e, "photos share classification failed");
                        PhotosShareState::NotFound
                    }
                };
                if classified_tx.send(state).is_err() {
                    break;
                }
                if shares.changed().await.is_err() {
                    break;
                }
            }
        });

        let delivery_task = delivery.spawn(async move {
            let mut last = None;
            while let Some(state) = classified_rx.recv().await {
                if last == Some(state) {
                    continue;
                }
                last = Some(state);
                info!(%state, "photos share state");
                if state_tx.send(state).is_err() {
                    break;
                }
            }
        });

        PhotosShareStateStream {
            states: UnboundedReceiverStream::new(state_rx),
            tasks: [producer.abort_handle(), delivery_task.abort_handle()],
        }
    }
}

/// Synchronously classify the first photos share. Must run off the async
/// workers since it blocks on the context.
fn classify(context: &CacheContext, shares: &[ObservedShare]) -> PhotosShareState {
    let Some((share, _)) = shares.first() else {
        return PhotosShareState::NotFound;
    };
    context.perform_blocking(|store| {
        let kind = share
            .volume_id
            .as_deref()
            .and_then(|id| store.volume(id))
            .map(|volume| volume.kind);
        match kind {
            Some(VolumeType::Photo) => PhotosShareState::PhotoVolume,
            _ => PhotosShareState::LegacyShare,
        }
    })
}

pub struct PhotosShareStateStream {
    states: UnboundedReceiverStream<PhotosShareState>,
    tasks: [AbortHandle; 2],
}

impl Stream for PhotosShareStateStream {
    type Item = PhotosShareState;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.states).poll_next(cx)
    }
}

impl Drop for PhotosShareStateStream {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}
