use std::sync::Arc;

use folio_core::{FileRecord, FolderRecord, Gateway};

use crate::config::CacheSettings;
use crate::coordinator::{QueryCoordinator, ScopeState};
use crate::state::SharedState;
use crate::upload::UploadOrchestrator;
use crate::view::{Filter, ViewMode};

/// Wires one gateway to a cache, registry and document list shared by the
/// coordinator and the upload orchestrator.
pub struct DocumentHub {
    state: SharedState,
    coordinator: Arc<QueryCoordinator>,
    uploads: UploadOrchestrator,
}

impl DocumentHub {
    pub fn new(gateway: Arc<dyn Gateway>, settings: CacheSettings) -> Self {
        let state = SharedState::new(settings.ttl);
        Self {
            coordinator: Arc::new(QueryCoordinator::new(
                Arc::clone(&gateway),
                state.clone(),
                settings,
            )),
            uploads: UploadOrchestrator::new(gateway, state.clone()),
            state,
        }
    }

    pub fn coordinator(&self) -> &Arc<QueryCoordinator> {
        &self.coordinator
    }

    pub fn uploads(&self) -> &UploadOrchestrator {
        &self.uploads
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    pub async fn documents(&self) -> Arc<Vec<FileRecord>> {
        self.state.view.read().await.documents()
    }

    pub async fn folders(&self) -> Vec<FolderRecord> {
        self.state.registry.read().await.folders().to_vec()
    }

    pub async fn filter(&self) -> Filter {
        self.state.view.read().await.filter().clone()
    }

    pub async fn set_view_mode(&self, view_mode: ViewMode) {
        self.state.view.write().await.set_view_mode(view_mode);
    }

    pub async fn scope_state(&self, folder_id: &str) -> ScopeState {
        self.coordinator.scope_state(folder_id).await
    }

    pub fn is_busy(&self, file_id: &str) -> bool {
        self.state.busy.contains(file_id)
    }
}
