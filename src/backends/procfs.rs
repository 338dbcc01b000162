use std::{
    ffi::CStr,
    fs::File,
    io::{Read, Result},
    os::fd::OwnedFd,
};

use log::{trace, warn};
use rustix::{
    fs::{openat, Dir, Mode, OFlags, CWD},
    process::{getpid, Pid},
};

use super::Backend;
use crate::utils::{needs_cmdline, parse_stat, process_matches};

const PROC_ROOT: &str = "/proc";

/// Looks the name up by walking `/proc`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcFsBackend;

impl ProcFsBackend {
    /// Returns whether some process other than the caller answers to `name`.
    ///
    /// Fails only when `/proc` itself cannot be listed; processes vanishing
    /// mid-scan are skipped.
    pub fn scan(&self, name: &str) -> Result<bool> {
        scan_in(PROC_ROOT, name)
    }
}

impl Backend for ProcFsBackend {
    fn is_alive(&self, name: &str) -> bool {
        alive_in(PROC_ROOT, name)
    }
}

fn alive_in(proc_root: &str, name: &str) -> bool {
    scan_in(proc_root, name).unwrap_or_else(|e| {
        warn!("cannot scan {proc_root}: {e}");
        false
    })
}

fn scan_in(proc_root: &str, name: &str) -> Result<bool> {
    let root = openat(
        CWD,
        proc_root,
        OFlags::RDONLY | OFlags::DIRECTORY | OFlags::CLOEXEC,
        Mode::empty(),
    )?;
    let me = getpid();

    for entry in Dir::read_from(&root)? {
        let entry = entry?;
        let Some(pid) = parse_pid(entry.file_name()) else {
            continue;
        };
        if pid == me {
            continue;
        }

        match inspect(&root, pid, name.as_bytes()) {
            Ok(true) => {
                trace!("{name:?} alive as pid {}", pid.as_raw_nonzero());
                return Ok(true);
            }
            Ok(false) => (),
            // exited between readdir and open
            Err(e) => trace!("skip pid {}: {e}", pid.as_raw_nonzero()),
        }
    }

    Ok(false)
}

fn parse_pid(file_name: &CStr) -> Option<Pid> {
    file_name
        .to_str()
        .ok()?
        .parse()
        .ok()
        .filter(|raw| *raw > 0)
        .and_then(Pid::from_raw)
}

fn inspect(root: &OwnedFd, pid: Pid, name: &[u8]) -> Result<bool> {
    let pid = pid.as_raw_nonzero().get();

    let stat = read_entry(root, &format!("{pid}/stat"))?;
    let Some((comm, state)) = parse_stat(&stat) else {
        return Ok(false);
    };
    // zombie or dead
    if matches!(state, b'Z' | b'X') {
        return Ok(false);
    }

    if !needs_cmdline(name, comm) {
        return Ok(true);
    }

    let cmdline = read_entry(root, &format!("{pid}/cmdline"))?;
    Ok(process_matches(name, comm, &cmdline))
}

fn read_entry(root: &OwnedFd, path: &str) -> Result<Vec<u8>> {
    let fd = openat(root, path, OFlags::RDONLY | OFlags::CLOEXEC, Mode::empty())?;
    let mut buf = Vec::new();
    File::from(fd).read_to_end(&mut buf)?;

    Ok(buf)
}
