use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;

use crate::cache::FileCache;
use crate::registry::FolderRegistry;
use crate::view::{BusySet, ViewModel};

/// The mutable state shared by the coordinator and the upload orchestrator.
///
/// Locks are always taken in the order cache, registry, view and are never
/// held across a gateway call.
#[derive(Clone)]
pub struct SharedState {
    pub cache: Arc<RwLock<FileCache>>,
    pub registry: Arc<RwLock<FolderRegistry>>,
    pub view: Arc<RwLock<ViewModel>>,
    pub busy: BusySet,
}

impl SharedState {
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: Arc::new(RwLock::new(FileCache::new(ttl))),
            registry: Arc::new(RwLock::new(FolderRegistry::new())),
            view: Arc::new(RwLock::new(ViewModel::default())),
            busy: BusySet::default(),
        }
    }
}
