pub mod bundle;
pub mod codec;
pub mod completion;
pub mod display;
pub mod errors;
pub mod models;
pub mod mutation;
pub mod query;
pub mod reader;
pub mod settings;

pub use bundle::{Bundle, TermSets};
pub use errors::{JotError, JotResult};
pub use models::{NewNote, Note, NotePatch, TagSet, Term};
pub use query::{Criterion, CriterionKind, MatchMode, Query};
pub use reader::LogReader;
pub use settings::JotSettings;

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;

static LOG_GUARD: std::sync::OnceLock<WorkerGuard> = std::sync::OnceLock::new();

// RUST_LOG overrides the info default
pub fn init_tracing(log_dir: &Path) -> Result<(), String> {
    std::fs::create_dir_all(log_dir).map_err(|error| error.to_string())?;
    let file_appender = tracing_appender::rolling::daily(log_dir, "jotlog.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let _ = LOG_GUARD.set(guard);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .json()
        .with_writer(non_blocking)
        .try_init()
        .map_err(|error| error.to_string())
}
