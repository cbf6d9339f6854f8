use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use folio_core::{ErrorKind, FileRecord, FolderRecord, Gateway};
use futures_util::future::{self, BoxFuture, FutureExt, Shared};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::cache::Freshness;
use crate::config::CacheSettings;
use crate::error::DocsError;
use crate::state::SharedState;
use crate::view::{Filter, sort_newest_first};

type FolderFetch = Shared<BoxFuture<'static, Result<Arc<[FileRecord]>, DocsError>>>;

struct InFlight {
    id: u64,
    epoch: u64,
    fetch: FolderFetch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeState {
    Empty,
    Fetching,
    Fresh,
    Stale,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderFailure {
    pub folder_id: String,
    pub error: DocsError,
}

/// Result of merging every known folder. Folders that could not be
/// refetched contribute their retained entry, if any, and are listed in
/// `failures`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergedFiles {
    pub files: Vec<FileRecord>,
    pub failures: Vec<FolderFailure>,
}

impl MergedFiles {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Published after every filter-triggered reload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReloadReport {
    pub sequence: u64,
    pub filter: Filter,
    pub result: Result<usize, DocsError>,
}

/// Answers "which files does this scope have" with as few gateway calls as
/// possible: fresh entries are served from the cache, concurrent requests
/// for one folder share a single fetch, and filter changes are debounced.
pub struct QueryCoordinator {
    gateway: Arc<dyn Gateway>,
    state: SharedState,
    settings: CacheSettings,
    in_flight: Arc<Mutex<HashMap<String, InFlight>>>,
    next_fetch: AtomicU64,
    reload_sequence: AtomicU64,
    pending_reload: Mutex<Option<JoinHandle<()>>>,
    reloads: watch::Sender<Option<ReloadReport>>,
}

impl QueryCoordinator {
    pub fn new(gateway: Arc<dyn Gateway>, state: SharedState, settings: CacheSettings) -> Self {
        let (reloads, _) = watch::channel(None);
        Self {
            gateway,
            state,
            settings,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            next_fetch: AtomicU64::new(0),
            reload_sequence: AtomicU64::new(0),
            pending_reload: Mutex::new(None),
            reloads,
        }
    }

    /// Returns the folder's files, from the cache when fresh and `force` is
    /// not set. A failed fetch leaves the previous entry in place.
    pub async fn load_folder(
        &self,
        folder_id: &str,
        force: bool,
    ) -> Result<Arc<[FileRecord]>, DocsError> {
        let folder_id = folder_id.trim();
        if folder_id.is_empty() {
            return Err(DocsError::validation("folder id is required"));
        }

        let epoch = {
            let cache = self.state.cache.read().await;
            if !force && let Some(entry) = cache.get_fresh(folder_id, Instant::now()) {
                debug!(folder_id, files = entry.files.len(), "serving cached folder listing");
                return Ok(Arc::clone(&entry.files));
            }
            cache.epoch(folder_id)
        };

        self.fetch_folder(folder_id, epoch).await
    }

    /// Merges every registered folder into one list, newest first. The merge
    /// is recomputed on every call and never cached on its own.
    pub async fn load_all(&self, force: bool) -> Result<MergedFiles, DocsError> {
        if !self.state.registry.read().await.is_loaded() {
            self.refresh_folders().await?;
        }
        let folder_ids = self.state.registry.read().await.folder_ids();

        let results = future::join_all(folder_ids.iter().map(|folder_id| async move {
            (folder_id, self.load_folder(folder_id, force).await)
        }))
        .await;

        let mut merged = MergedFiles::default();
        for (folder_id, result) in results {
            match result {
                Ok(files) => merged.files.extend(files.iter().cloned()),
                Err(error) => {
                    if let Some(entry) = self.state.cache.read().await.get(folder_id) {
                        merged.files.extend(entry.files.iter().cloned());
                    }
                    merged.failures.push(FolderFailure {
                        folder_id: folder_id.clone(),
                        error,
                    });
                }
            }
        }
        sort_newest_first(&mut merged.files);

        if !merged.failures.is_empty() {
            warn!(
                folders = folder_ids.len(),
                failed = merged.failures.len(),
                "merged listing is partly stale"
            );
        }
        Ok(merged)
    }

    /// Reloads the folder listing. Counts of folders with a fresh cache entry
    /// are recomputed from that entry; entries of folders that no longer
    /// exist are dropped.
    pub async fn refresh_folders(&self) -> Result<Vec<FolderRecord>, DocsError> {
        let folders = self.gateway.list_folders().await.map_err(|err| {
            let err = DocsError::from(err);
            warn!(error = %err, "failed to list folders");
            err
        })?;
        let known: HashSet<&str> = folders.iter().map(|folder| folder.id.as_str()).collect();

        let mut cache = self.state.cache.write().await;
        for folder_id in cache.folder_ids() {
            if !known.contains(folder_id.as_str()) {
                debug!(folder_id, "dropping cache entry of vanished folder");
                cache.invalidate(&folder_id);
            }
        }

        let mut registry = self.state.registry.write().await;
        registry.replace_all(folders, &cache, Instant::now());
        info!(folders = registry.folders().len(), "folder listing refreshed");
        Ok(registry.folders().to_vec())
    }

    pub async fn scope_state(&self, folder_id: &str) -> ScopeState {
        if lock(&self.in_flight).contains_key(folder_id) {
            return ScopeState::Fetching;
        }
        match self
            .state
            .cache
            .read()
            .await
            .freshness(folder_id, Instant::now())
        {
            Freshness::Missing => ScopeState::Empty,
            Freshness::Fresh => ScopeState::Fresh,
            Freshness::Stale => ScopeState::Stale,
        }
    }

    /// Sets the active filter and schedules a reload once the debounce window
    /// has passed without another call. A reload that has started is never
    /// aborted.
    pub async fn set_filter_and_reload(self: &Arc<Self>, filter: Filter) {
        self.state.view.write().await.set_filter(filter);
        let sequence = self.reload_sequence.fetch_add(1, Ordering::SeqCst) + 1;

        let coordinator = Arc::clone(self);
        let delay = self.settings.debounce;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if coordinator.reload_sequence.load(Ordering::SeqCst) != sequence {
                return;
            }
            tokio::spawn(async move { coordinator.run_reload(sequence).await });
        });

        if let Some(previous) = lock(&self.pending_reload).replace(handle) {
            previous.abort();
            debug!(sequence, "rescheduled filter reload");
        }
    }

    /// Drops a scheduled reload that has not fired yet.
    pub fn cancel_pending_reload(&self) {
        self.reload_sequence.fetch_add(1, Ordering::SeqCst);
        if let Some(pending) = lock(&self.pending_reload).take() {
            pending.abort();
        }
    }

    /// Reloads the active filter immediately, replacing any scheduled reload.
    pub async fn reload_now(&self) -> Result<usize, DocsError> {
        self.cancel_pending_reload();
        let filter = self.state.view.read().await.filter().clone();
        self.reload_filter(&filter).await
    }

    pub fn subscribe_reloads(&self) -> watch::Receiver<Option<ReloadReport>> {
        self.reloads.subscribe()
    }

    async fn run_reload(&self, sequence: u64) {
        let filter = self.state.view.read().await.filter().clone();
        let result = self.reload_filter(&filter).await;
        match &result {
            Ok(count) => debug!(sequence, documents = count, "filter reload finished"),
            Err(err) => warn!(sequence, error = %err, "filter reload failed"),
        }
        self.reloads.send_replace(Some(ReloadReport {
            sequence,
            filter,
            result,
        }));
    }

    /// Loads `filter` and writes the result into the document list, unless
    /// the filter changed while loading.
    async fn reload_filter(&self, filter: &Filter) -> Result<usize, DocsError> {
        let documents = match filter {
            Filter::All => self.load_all(false).await?.files,
            Filter::Folder(folder_id) => {
                let mut files = self.load_folder(folder_id, false).await?.to_vec();
                sort_newest_first(&mut files);
                files
            }
        };
        let count = documents.len();

        let mut view = self.state.view.write().await;
        if view.filter() != filter {
            debug!("filter changed during reload, result discarded");
            return Ok(count);
        }
        view.replace_documents(documents);
        Ok(count)
    }

    /// Joins the fetch already running for this folder and cache epoch, or
    /// starts one. The fetch runs on its own task so it settles even when
    /// every caller waiting on it has gone away.
    fn fetch_folder(&self, folder_id: &str, epoch: u64) -> FolderFetch {
        let mut in_flight = lock(&self.in_flight);
        if let Some(running) = in_flight.get(folder_id)
            && running.epoch == epoch
        {
            debug!(folder_id, "joining in-flight fetch");
            return running.fetch.clone();
        }

        // The task removes its own map entry, which waits on this guard, so
        // the entry is always inserted first.
        let id = self.next_fetch.fetch_add(1, Ordering::Relaxed);
        let task = tokio::spawn(fetch_and_store(
            Arc::clone(&self.gateway),
            self.state.clone(),
            Arc::clone(&self.in_flight),
            folder_id.to_string(),
            id,
            epoch,
        ));
        let fetch = task
            .map(|joined| {
                joined.unwrap_or_else(|err| {
                    Err(DocsError::new(
                        ErrorKind::Unknown,
                        format!("folder fetch task ended: {err}"),
                    ))
                })
            })
            .boxed()
            .shared();
        in_flight.insert(
            folder_id.to_string(),
            InFlight {
                id,
                epoch,
                fetch: fetch.clone(),
            },
        );
        fetch
    }
}

async fn fetch_and_store(
    gateway: Arc<dyn Gateway>,
    state: SharedState,
    in_flight: Arc<Mutex<HashMap<String, InFlight>>>,
    folder_id: String,
    id: u64,
    epoch: u64,
) -> Result<Arc<[FileRecord]>, DocsError> {
    debug!(folder_id, "fetching folder listing");
    let result = match gateway.list_files_in_folder(&folder_id).await {
        Ok(mut files) => {
            {
                let registry = state.registry.read().await;
                for file in &mut files {
                    registry.decorate(file);
                }
            }
            let stored = state.cache.write().await.put_if_unchanged(
                &folder_id,
                files.clone(),
                Instant::now(),
                epoch,
            );
            match stored {
                Some(entry) => {
                    state
                        .registry
                        .write()
                        .await
                        .recompute_from(&folder_id, &entry.files);
                    debug!(folder_id, files = entry.files.len(), "folder listing cached");
                    Ok(Arc::clone(&entry.files))
                }
                None => {
                    debug!(folder_id, "folder invalidated while fetching, listing not cached");
                    Ok(Arc::from(files))
                }
            }
        }
        Err(err) => {
            let err = DocsError::from(err);
            warn!(folder_id, error = %err, "folder fetch failed, keeping previous entry");
            Err(err)
        }
    };

    let mut in_flight = lock(&in_flight);
    if in_flight.get(&folder_id).is_some_and(|running| running.id == id) {
        in_flight.remove(&folder_id);
    }
    result
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
