use std::process::ExitCode;

use clap::Parser;
use env_logger::Env;
use waitpname::{cli::Opts, ConfigError};

fn main() -> ExitCode {
    let opts = Opts::parse();
    env_logger::Builder::from_env(Env::default().default_filter_or(opts.log_filter())).init();

    match waitpname::cli::run(&opts) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            if e == ConfigError::MissingProcessName {
                eprintln!("    Use option [-h, --help] to see the usage");
            }
            ExitCode::FAILURE
        }
    }
}
