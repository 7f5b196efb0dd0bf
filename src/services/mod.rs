pub mod activation;
pub mod approval;
pub mod bootstrap;
pub mod context;
pub mod downloads;
pub mod ledger;
pub mod orchestrator;
pub mod pipeline;
pub mod providers;
pub mod reconciler;
pub mod report;
pub mod retry;
pub mod shuffle;

pub use context::{ProgressSummary, RunContext};
pub use orchestrator::execute;
pub use pipeline::{Engine, EngineSettings};
