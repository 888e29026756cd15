//! Run-level error taxonomy (§7). Declaration and dependency errors abort
//! the whole run (mapped by callers to exit code `2`); a generator's own
//! failure is captured in its [`crate::executor::GeneratorReport`] instead
//! of propagated, so sibling generators with no dependency on it still run.

use dbgen_core::{GraphError, SchedulerError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    /// Missing meta-schema, unknown generator name in a filter, etc. (§6
    /// "Exit conditions": configuration errors map to exit code `2`).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A meta-DB or main-DB write failed at the infrastructure level. The
    /// run aborts; per-row repeats are only ever recorded after a
    /// successful commit, so no partial state is left inconsistent (§7).
    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("run cancelled")]
    Cancelled,
}
