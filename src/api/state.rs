use std::sync::Arc;

use tokio::sync::RwLock;

use crate::services::{Engine, ProgressSummary, RunContext};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    /// Applied when a request does not say
    pub default_dry_run: bool,
    pub shuffle_seed: Option<u64>,
    /// Context of the most recent run, for progress polling
    pub current_run: Arc<RwLock<Option<RunContext>>>,
}

impl AppState {
    pub fn new(engine: Engine) -> Self {
        Self {
            engine: Arc::new(engine),
            default_dry_run: false,
            shuffle_seed: None,
            current_run: Arc::new(RwLock::new(None)),
        }
    }

    pub fn with_defaults(mut self, dry_run: bool, shuffle_seed: Option<u64>) -> Self {
        self.default_dry_run = dry_run;
        self.shuffle_seed = shuffle_seed;
        self
    }

    pub fn run_context(&self, dry_run: Option<bool>) -> RunContext {
        RunContext::new(dry_run.unwrap_or(self.default_dry_run)).with_shuffle_seed(self.shuffle_seed)
    }

    pub async fn progress(&self) -> Option<ProgressSummary> {
        self.current_run.read().await.as_ref().map(RunContext::progress)
    }
}
