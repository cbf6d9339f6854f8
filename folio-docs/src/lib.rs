pub mod cache;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod hub;
pub mod logger;
pub mod registry;
pub mod state;
pub mod upload;
pub mod view;

#[cfg(test)]
mod test_support;

pub use cache::{CacheEntry, FileCache, Freshness};
pub use config::{CacheSettings, DocsConfig};
pub use coordinator::{FolderFailure, MergedFiles, QueryCoordinator, ReloadReport, ScopeState};
pub use error::DocsError;
pub use hub::DocumentHub;
pub use registry::FolderRegistry;
pub use state::SharedState;
pub use upload::{FailedUpload, UploadOrchestrator, UploadOutcome};
pub use view::{BusyGuard, BusySet, Filter, ViewMode, ViewModel};
