#![forbid(unsafe_code)]
#![doc = include_str!("../README.md")]

mod action;
mod callable;
mod compose;
mod error;
#[cfg(feature = "fingerprint")]
pub mod fingerprint;
mod record;
mod uptodate;
mod utils;

pub use crate::action::{Action, Base, Param};
pub use crate::callable::{Callable, Predicate, TASK_PREFIX, TaskRef, normalize_task_reference};
pub use crate::compose::{ComposeTask, Field, TaskAction, Update};
pub use crate::error::*;
pub use crate::record::{CompiledAction, TaskRecord};
pub use crate::uptodate::{Check, Config, UpToDate};
pub use crate::utils::command;

/// Install a `fmt` subscriber filtered by `RUST_LOG`, falling back to
/// `default_level` for this crate when the variable is unset.
#[cfg(feature = "logging")]
pub fn init_logging(default_level: tracing::Level) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("taskweave={default_level}")));

    // A subscriber may already be installed by the embedding application.
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}
