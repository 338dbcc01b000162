use clap::{ArgAction, Parser};

use crate::{
    backends::BackendKind,
    config::{ConfigError, PollConfig},
    duration,
    schedule::{Poller, TerminationReason},
};

/// Wait until no process with the given name is running.
#[derive(Parser, Debug)]
#[command(name = "waitpname", version, args_override_self = true)]
pub struct Opts {
    /// Name of the process to wait for
    #[arg(short, long, value_name = "NAME")]
    pub process_name: Option<String>,

    /// Seconds between two checks of the process
    #[arg(
        short,
        long,
        value_name = "SECONDS",
        env = "WAITPNAME_INTERVAL",
        default_value = "1.0",
        allow_hyphen_values = true
    )]
    pub interval: String,

    /// Give up after this many seconds; a negative value means never
    #[arg(
        short,
        long,
        value_name = "SECONDS",
        env = "WAITPNAME_ABORT",
        allow_hyphen_values = true
    )]
    pub abort: Option<String>,

    /// How to look the process up
    #[arg(short, long, value_enum, default_value_t = BackendKind::Auto)]
    pub backend: BackendKind,

    /// Log each poll; repeat for more detail
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Opts {
    /// Validates the raw arguments, interval first, then abort time, then
    /// the name.
    pub fn to_config(&self) -> Result<PollConfig, ConfigError> {
        let interval = duration::parse(&self.interval).map_err(ConfigError::InvalidInterval)?;
        let abort = self
            .abort
            .as_deref()
            .map(duration::parse)
            .transpose()
            .map_err(ConfigError::InvalidAbort)?;

        let mut builder = PollConfig::builder().interval(interval);
        if let Some(name) = &self.process_name {
            builder = builder.process_name(name.as_str());
        }
        if let Some(abort) = abort {
            builder = builder.abort(abort);
        }

        builder.build()
    }

    /// Default log filter, overridden by `RUST_LOG`.
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

/// Primary entrypoint to run the executable based on input options
pub fn run(opts: &Opts) -> Result<TerminationReason, ConfigError> {
    let config = opts.to_config()?;

    Ok(Poller::new(config, opts.backend.backend()).run())
}
