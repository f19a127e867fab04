use std::path::PathBuf;
use std::sync::Arc;

use crate::common::AppConfig;
use crate::receive::SessionRegistry;

/// Shared state for the receiving server.
///
/// The registry is the only mutable piece; everything else is fixed at
/// startup. Cheap to clone per request.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SessionRegistry>,
    /// Validated, absolute base directory all destinations resolve under.
    pub base_dir: PathBuf,
    pub read_only: bool,
}

impl AppState {
    pub fn new(base_dir: PathBuf, config: &AppConfig) -> Self {
        Self {
            registry: Arc::new(SessionRegistry::new()),
            base_dir,
            read_only: config.server.read_only,
        }
    }
}
