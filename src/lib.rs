pub mod backends;
pub mod cli;
pub mod config;
pub mod duration;
pub mod schedule;
mod utils;

pub use crate::{
    backends::{Backend, BackendKind},
    config::{ConfigError, PollConfig},
    duration::{parse as parse_seconds, ParseError},
    schedule::{PollOutcome, PollState, Poller, TerminationReason},
};

/// Blocks until no process matches `config`, or its deadline passes.
pub fn wait_for_name(config: &PollConfig, backend: BackendKind) -> TerminationReason {
    Poller::new(config.clone(), backend.backend()).run()
}

#[cfg(feature = "async")]
pub async fn wait_for_name_async(config: &PollConfig, backend: BackendKind) -> TerminationReason {
    Poller::new(config.clone(), backend.backend())
        .run_async()
        .await
        .reason
}

#[cfg(not(target_os = "linux"))]
compile_error!("waitpname only supports Linux");
