//! sources of open-file and i/o samples for a single process.

use {
    crate::{
        counters::{self, IoCounters},
        launch::{Exit, LaunchError},
        process,
        registry::FileRegistry,
        time::Timestamp,
    },
    nix::unistd::Pid,
    std::io,
    thiserror::Error,
};

pub use self::{lsof::LsofSampler, procfs::ProcSampler};

pub mod lsof;
pub mod procfs;

#[cfg(test)]
pub mod mock;

/// inspects one process.
///
/// implementations are bound to a pid and carry its display label. the registries they refresh
/// are owned by the caller and passed in on each call.
pub trait Sampler {
    fn pid(&self) -> Pid;

    fn label(&self) -> &str;

    /// refreshes the offsets, sizes, and names of the process's open files.
    ///
    /// every file is marked unseen, then each open file is reconciled against `files`. returns
    /// whether a new file was inserted. a process with no open regular files is a successful,
    /// empty sample; an error means the process could not be inspected at all.
    fn refresh_files(
        &mut self,
        files: &mut FileRegistry,
        now: Timestamp,
    ) -> Result<bool, SampleError>;

    /// samples the process's i/o counters. returns `false` if they could not be read.
    fn refresh_io(&mut self, counters: &mut IoCounters, now: Timestamp) -> bool {
        counters.record(counters::read(self.pid()), now)
    }

    /// lists the process's direct children.
    fn children(&self) -> io::Result<Vec<Pid>> {
        process::children(self.pid())
    }
}

/// the sampling strategies.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Strategy {
    /// inspect `/proc/<pid>/fd` and `/proc/<pid>/fdinfo` directly.
    Proc {
        /// track every descriptor, not only regular files.
        force: bool,
    },
    /// run `lsof(8)` and parse its field output.
    Lsof,
}

#[derive(Debug, Error)]
pub enum SampleError {
    #[error("cannot inspect process {pid}")]
    Inspect {
        pid: Pid,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Launch(#[from] LaunchError),
    #[error("cannot read lsof output")]
    Read(#[source] io::Error),
    #[error("lsof terminated with {0}")]
    Tool(Exit),
    #[error("lsof could not list the descriptors of process {pid}")]
    NoDescriptors { pid: Pid },
}

// === impl Strategy ===

impl Strategy {
    /// creates a sampler for `pid`.
    pub fn sampler(self, pid: Pid, numeric: bool) -> Box<dyn Sampler> {
        let label = process::label(pid, numeric);
        match self {
            Self::Proc { force } => Box::new(ProcSampler::new(pid, label, force)),
            Self::Lsof => Box::new(LsofSampler::new(pid, label)),
        }
    }
}
