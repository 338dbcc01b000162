mod pidof;
mod procfs;

use clap::ValueEnum;
use log::debug;

pub use self::{pidof::PidofBackend, procfs::ProcFsBackend};

/// Answers whether a process with the given name is running.
///
/// Implementations never fail: anything that prevents an answer counts as
/// "no such process".
pub trait Backend {
    fn is_alive(&self, name: &str) -> bool;
}

impl<B: Backend + ?Sized> Backend for &B {
    #[inline]
    fn is_alive(&self, name: &str) -> bool {
        (**self).is_alive(name)
    }
}

impl<B: Backend + ?Sized> Backend for Box<B> {
    #[inline]
    fn is_alive(&self, name: &str) -> bool {
        (**self).is_alive(name)
    }
}

/// Procfs first, `pidof` when `/proc` is not available.
#[derive(Debug, Default, Clone, Copy)]
pub struct AutoBackend;

impl Backend for AutoBackend {
    fn is_alive(&self, name: &str) -> bool {
        // 1. try procfs
        match ProcFsBackend.scan(name) {
            Ok(found) => found,
            // procfs not mounted or hidden, try pidof
            Err(e) => {
                debug!("procfs unavailable ({e}), asking pidof");
                PidofBackend.is_alive(name)
            }
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendKind {
    #[default]
    Auto,
    Procfs,
    Pidof,
}

impl BackendKind {
    pub fn backend(self) -> Box<dyn Backend> {
        match self {
            Self::Auto => Box::new(AutoBackend),
            Self::Procfs => Box::new(ProcFsBackend),
            Self::Pidof => Box::new(PidofBackend),
        }
    }
}
