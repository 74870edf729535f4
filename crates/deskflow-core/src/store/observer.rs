// ── Mounted consumers ──
//
// A `QueryObserver` is what a page holds while it displays a key. It keeps
// the entry out of garbage collection, registers the loader used for
// active refetches, and streams data changes.

use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use super::entry::{EntrySnapshot, FetchOptions};
use super::key::QueryKey;
use super::query_cache::{Loader, QueryCache};
use crate::error::CoreError;

pub struct QueryObserver<T>
where
    T: Clone + Send + Sync + 'static,
{
    cache: QueryCache<T>,
    key: QueryKey,
    loader: Loader<T>,
    options: FetchOptions,
    receiver: watch::Receiver<Option<T>>,
}

impl<T> QueryObserver<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(
        cache: QueryCache<T>,
        key: QueryKey,
        loader: Loader<T>,
        options: FetchOptions,
        receiver: watch::Receiver<Option<T>>,
    ) -> Self {
        Self {
            cache,
            key,
            loader,
            options,
            receiver,
        }
    }

    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    /// Fetch through the cache with this observer's loader and options.
    pub async fn fetch(&self) -> Result<T, CoreError> {
        self.cache
            .fetch_with(&self.key, self.loader.clone(), self.options)
            .await
    }

    /// Last data published for the key.
    pub fn latest(&self) -> Option<T> {
        self.receiver.borrow().clone()
    }

    /// Wait for the next data change. `None` means the entry was reset or
    /// the cache dropped it.
    pub async fn changed(&mut self) -> Option<T> {
        self.receiver.changed().await.ok()?;
        self.receiver.borrow_and_update().clone()
    }

    pub fn snapshot(&self) -> Option<EntrySnapshot<T>> {
        self.cache.get(&self.key)
    }

    /// Data changes as a stream, starting with the current value.
    pub fn stream(&self) -> WatchStream<Option<T>> {
        WatchStream::new(self.receiver.clone())
    }
}

impl<T> Drop for QueryObserver<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn drop(&mut self) {
        self.cache.unobserve(&self.key);
    }
}
