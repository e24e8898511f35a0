//! Live query results over the cache.

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::context::CacheContext;
use crate::store::CacheStore;

/// Re-runs a fetch after every committed save and publishes the result when it
/// differs from the previous one. Dropping the observer stops it.
pub struct FetchedResultsObserver<T> {
    results: watch::Receiver<T>,
    task: JoinHandle<()>,
}

impl<T> FetchedResultsObserver<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Perform the initial fetch and start following commits.
    pub async fn start<F>(context: CacheContext, fetch: F) -> Self
    where
        F: Fn(&CacheStore) -> T + Send + Sync + 'static,
    {
        // subscribe first so a commit racing the initial fetch is not lost
        let mut changes = context.subscribe();
        let initial = context.perform(|store| fetch(store)).await;
        let (tx, results) = watch::channel(initial);

        let task = tokio::spawn(async move {
            while changes.changed().await.is_ok() {
                let generation = *changes.borrow_and_update();
                let next = context.perform(|store| fetch(store)).await;
                let published = tx.send_if_modified(|current| {
                    if *current == next {
                        false
                    } else {
                        *current = next;
                        true
                    }
                });
                debug!(generation, published, "fetched results refreshed");
                if tx.is_closed() {
                    break;
                }
            }
        });

        Self { results, task }
    }

    /// Receiver of the current result set; `changed()` fires on every new one.
    pub fn results(&self) -> watch::Receiver<T> {
        self.results.clone()
    }

    pub fn current(&self) -> T {
        self.results.borrow().clone()
    }
}

impl<T> Drop for FetchedResultsObserver<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}
