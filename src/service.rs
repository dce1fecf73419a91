//! Public catalog operations
//!
//! [`CatalogService`] answers "give me the categories" from the cache while it
//! is fresh, refetches when it is not, and falls back to the last good catalog
//! when a fetch fails. Concurrent callers that find the cache stale share one
//! fetch.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use crate::cache::{CacheStore, CatalogSnapshot, DiskCache};
use crate::config::CatalogConfig;
use crate::data::{CatalogClient, CatalogSource, CategoryRecord, CategoryTreeNode, FetchError};

/// How the catalog in a [`CatalogView`] was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogStatus {
    /// Served from a cache entry still inside its TTL
    Fresh,
    /// A fetch just succeeded
    Refreshed,
    /// The fetch failed; the last good catalog was served instead
    Stale,
    /// The fetch failed and there was nothing to fall back to
    Unavailable,
}

/// What a caller gets back: the data, how it was obtained, and an error only
/// when there was no catalog to serve
#[derive(Debug, Clone)]
pub struct CatalogView<T> {
    pub data: T,
    pub status: CatalogStatus,
    /// `Some` only when `status` is [`CatalogStatus::Unavailable`]
    pub error: Option<FetchError>,
    /// When the served catalog was fetched
    pub fetched_at: Option<DateTime<Utc>>,
}

impl<T> CatalogView<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> CatalogView<U> {
        CatalogView {
            data: f(self.data),
            status: self.status,
            error: self.error,
            fetched_at: self.fetched_at,
        }
    }

    pub fn is_unavailable(&self) -> bool {
        self.status == CatalogStatus::Unavailable
    }
}

type SharedFetch = Shared<BoxFuture<'static, Result<Arc<CatalogSnapshot>, FetchError>>>;

/// The fetch currently running on behalf of every caller that wants it
struct InFlight {
    fetch: SharedFetch,
    task: AbortHandle,
}

/// What a caller gets from [`CatalogService::join_fetch`]
enum Joined {
    /// The cache turned fresh while the caller was waiting for the lock
    Fresh(Arc<CatalogSnapshot>),
    Fetch(SharedFetch),
}

/// Serves the category catalog with TTL caching, single-flight refresh and
/// stale fallback
///
/// The [`CacheStore`] is injected, so several services (or other readers) can
/// share one snapshot. Its TTL decides freshness.
///
/// Fetches run as tokio tasks: the service must be used from inside a tokio
/// runtime. Dropping a caller's future does not cancel the fetch; the result
/// still lands in the cache.
pub struct CatalogService<S: CatalogSource = CatalogClient> {
    source: Arc<S>,
    store: Arc<CacheStore>,
    disk: Option<DiskCache>,
    config: CatalogConfig,
    inflight: Mutex<Option<InFlight>>,
    disk_checked: AtomicBool,
}

impl CatalogService<CatalogClient> {
    /// Builds an HTTP-backed service with its own cache
    pub fn from_config(config: CatalogConfig) -> Self {
        let client = CatalogClient::with_timeout(config.endpoint.clone(), config.timeout);
        let store = Arc::new(CacheStore::new(config.ttl));
        Self::new(Arc::new(client), store, config)
    }
}

impl<S: CatalogSource> CatalogService<S> {
    pub fn new(source: Arc<S>, store: Arc<CacheStore>, config: CatalogConfig) -> Self {
        Self {
            source,
            store,
            disk: config.disk_cache.clone().map(DiskCache::with_dir),
            config,
            inflight: Mutex::new(None),
            disk_checked: AtomicBool::new(false),
        }
    }

    pub fn store(&self) -> &Arc<CacheStore> {
        &self.store
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    /// Current cached snapshot, without fetching
    pub fn snapshot(&self) -> Option<Arc<CatalogSnapshot>> {
        self.store.read()
    }

    /// Top-level categories, in the order the catalog lists them
    pub async fn get_root_categories(&self) -> CatalogView<Arc<[CategoryRecord]>> {
        self.load().await.map(|snapshot| match snapshot {
            Some(snapshot) => Arc::clone(&snapshot.root_categories),
            None => Arc::from(Vec::new()),
        })
    }

    /// The full catalog as an ordered forest
    pub async fn get_category_tree(&self) -> CatalogView<Arc<[CategoryTreeNode]>> {
        self.load().await.map(tree_or_empty)
    }

    /// Fetches now, ignoring the TTL
    ///
    /// Joins a fetch that is already running instead of starting another.
    /// Failure falls back to the cached catalog the same way as the getters.
    pub async fn refetch(&self) -> CatalogView<Arc<[CategoryTreeNode]>> {
        self.resolve(true).await.map(tree_or_empty)
    }

    /// The whole snapshot, fetching first if the cache is not fresh
    pub async fn load(&self) -> CatalogView<Option<Arc<CatalogSnapshot>>> {
        self.resolve(false).await
    }

    async fn resolve(&self, force: bool) -> CatalogView<Option<Arc<CatalogSnapshot>>> {
        self.seed_from_disk();

        if !force && self.store.is_fresh(Utc::now()) {
            if let Some(snapshot) = self.store.read() {
                debug!(fetched_at = %snapshot.fetched_at, "serving fresh catalog from cache");
                return view(Some(snapshot), CatalogStatus::Fresh, None);
            }
        }

        let fetch = match self.join_fetch(force) {
            Joined::Fresh(snapshot) => return view(Some(snapshot), CatalogStatus::Fresh, None),
            Joined::Fetch(fetch) => fetch,
        };

        match fetch.await {
            Ok(snapshot) => view(Some(snapshot), CatalogStatus::Refreshed, None),
            Err(err) => match self.store.read() {
                Some(stale) => {
                    warn!(error = %err, fetched_at = %stale.fetched_at, "catalog fetch failed, serving cached catalog");
                    view(Some(stale), CatalogStatus::Stale, None)
                }
                None => {
                    warn!(error = %err, "catalog fetch failed with nothing cached");
                    view(None, CatalogStatus::Unavailable, Some(err))
                }
            },
        }
    }

    /// Returns the running fetch, starting one if none is running
    ///
    /// Unless `force` is set, freshness is checked again under the lock: a
    /// fetch that finished after the caller's first check is not repeated.
    fn join_fetch(&self, force: bool) -> Joined {
        let mut inflight = self.inflight.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(running) = inflight.as_ref() {
            if !running.task.is_finished() {
                debug!("joining catalog fetch already in flight");
                return Joined::Fetch(running.fetch.clone());
            }
        }

        if !force && self.store.is_fresh(Utc::now()) {
            if let Some(snapshot) = self.store.read() {
                debug!(fetched_at = %snapshot.fetched_at, "catalog refreshed meanwhile, not fetching");
                return Joined::Fresh(snapshot);
            }
        }

        let task = tokio::spawn(run_fetch(
            Arc::clone(&self.source),
            Arc::clone(&self.store),
            self.disk.clone(),
            self.config.clone(),
        ));
        let abort = task.abort_handle();
        let fetch = async move {
            match task.await {
                Ok(result) => result,
                Err(err) => Err(FetchError::Aborted(err.to_string())),
            }
        }
        .boxed()
        .shared();

        *inflight = Some(InFlight {
            fetch: fetch.clone(),
            task: abort,
        });
        Joined::Fetch(fetch)
    }

    /// Loads the on-disk catalog into an empty cache, once per service
    fn seed_from_disk(&self) {
        let Some(disk) = &self.disk else {
            return;
        };
        if self.disk_checked.swap(true, Ordering::AcqRel) || self.store.read().is_some() {
            return;
        }

        match disk.read() {
            Ok(Some(stored)) => {
                let snapshot = self
                    .store
                    .write_if_empty(CatalogSnapshot::build(&stored.records, stored.fetched_at));
                info!(
                    path = %disk.dir().display(),
                    fetched_at = %snapshot.fetched_at,
                    "loaded cached catalog from disk"
                );
            }
            Ok(None) => debug!(path = %disk.dir().display(), "no catalog stored on disk"),
            Err(err) => warn!(error = %err, "ignoring unreadable catalog on disk"),
        }
    }
}

fn view(
    snapshot: Option<Arc<CatalogSnapshot>>,
    status: CatalogStatus,
    error: Option<FetchError>,
) -> CatalogView<Option<Arc<CatalogSnapshot>>> {
    let fetched_at = snapshot.as_ref().map(|snapshot| snapshot.fetched_at);
    CatalogView {
        data: snapshot,
        status,
        error,
        fetched_at,
    }
}

fn tree_or_empty(snapshot: Option<Arc<CatalogSnapshot>>) -> Arc<[CategoryTreeNode]> {
    match snapshot {
        Some(snapshot) => Arc::clone(&snapshot.tree),
        None => Arc::from(Vec::new()),
    }
}

/// One refresh: fetch, build, publish. Runs detached from any caller.
async fn run_fetch<S: CatalogSource>(
    source: Arc<S>,
    store: Arc<CacheStore>,
    disk: Option<DiskCache>,
    config: CatalogConfig,
) -> Result<Arc<CatalogSnapshot>, FetchError> {
    let records = fetch_with_retries(source.as_ref(), &config).await?;
    let fetched_at = Utc::now();

    let snapshot = store.write(CatalogSnapshot::build(&records, fetched_at));
    info!(
        received = records.len(),
        placed = snapshot.len(),
        roots = snapshot.root_categories.len(),
        "catalog refreshed"
    );

    if let Some(disk) = disk {
        if let Err(err) = disk.write(&records, fetched_at) {
            warn!(error = %err, "failed to store catalog on disk");
        }
    }

    Ok(snapshot)
}

async fn fetch_with_retries<S: CatalogSource>(
    source: &S,
    config: &CatalogConfig,
) -> Result<Vec<CategoryRecord>, FetchError> {
    let mut attempt = 0;
    loop {
        let result = match tokio::time::timeout(config.timeout, source.fetch_categories()).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(config.timeout)),
        };

        match result {
            Ok(records) => return Ok(records),
            Err(err) if attempt < config.retries => {
                attempt += 1;
                let delay = config.backoff_for(attempt);
                warn!(error = %err, attempt, ?delay, "catalog fetch failed, retrying");
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}
