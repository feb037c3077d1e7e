pub mod client;
pub mod config;
pub mod dryrun;
pub mod export;
pub mod gemini;
pub mod prompt;
pub mod reference;
mod runner;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{default_client_registry, RenderClient, RenderClientRegistry, RenderRequest};
pub use config::SessionConfig;
pub use export::{export_snapshot, ExportReport};
pub use reference::ReferenceImage;
pub use session::{DrainOutcome, Progress, ProgressObserver, ProgressUpdate, StageController};
