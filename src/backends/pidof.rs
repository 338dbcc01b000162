use std::process::{Command, Stdio};

use log::debug;
use rustix::process::getpid;

use super::Backend;

/// Asks `pidof -x`, treating any failure to run it as "not found".
#[derive(Debug, Default, Clone, Copy)]
pub struct PidofBackend;

impl Backend for PidofBackend {
    fn is_alive(&self, name: &str) -> bool {
        let status = Command::new("pidof")
            .arg("-x")
            .arg("-o")
            .arg(getpid().as_raw_nonzero().to_string())
            .arg(name)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match status {
            Ok(status) => status.success(),
            Err(e) => {
                debug!("cannot run pidof: {e}");
                false
            }
        }
    }
}
