//! direct inspection of `/proc/<pid>/fd` and `/proc/<pid>/fdinfo`.

use {
    super::{SampleError, Sampler},
    crate::{
        process,
        registry::{FileRegistry, Observation},
        time::Timestamp,
    },
    nix::unistd::Pid,
    std::{
        fs,
        os::unix::fs::MetadataExt,
        path::{Path, PathBuf},
        str::FromStr,
    },
    thiserror::Error,
    tracing::trace,
};


/// samples a process through `/proc`.
pub struct ProcSampler {
    pid: Pid,
    label: String,
    /// `/proc/<pid>/fd`
    fd: PathBuf,
    /// `/proc/<pid>/fdinfo`
    fdinfo: PathBuf,
    /// track every descriptor, not only regular files.
    force: bool,
}

/// the parts of a `/proc/<pid>/fdinfo/<fd>` entry we care about.
///
/// see `proc_pid_fdinfo(5)`.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct FdInfo {
    /// the file offset.
    pub pos: i64,
    /// the file access mode and status flags.
    pub flags: i32,
}

#[derive(Debug, Error, Eq, PartialEq)]
pub enum FdInfoError {
    #[error("invalid {label} value: {value:?}")]
    Value { label: &'static str, value: String },
    #[error("missing pos entry")]
    MissingPos,
}

// === impl ProcSampler ===

impl ProcSampler {
    pub fn new(pid: Pid, label: String, force: bool) -> Self {
        Self {
            pid,
            label,
            fd: process::proc_path(pid, "fd"),
            fdinfo: process::proc_path(pid, "fdinfo"),
            force,
        }
    }

    /// inspects one entry of the `fd` directory. returns `None` for anything we skip: entries
    /// that vanished, that are not regular files, or whose fdinfo is unreadable.
    fn inspect(&self, files: &FileRegistry, name: &str) -> Option<Observation> {
        let fd = name.parse::<i32>().ok()?;
        let link = self.fd.join(name);

        // follows the link, describing the open file itself.
        let meta = fs::metadata(&link).ok()?;
        if !self.force && !meta.is_file() {
            return None;
        }

        let info = fs::read_to_string(self.fdinfo.join(name))
            .ok()?
            .parse::<FdInfo>()
            .ok()?;

        let inode = meta.ino();
        let known = files.find(fd, inode).is_some();
        Some(Observation {
            fd,
            inode,
            offset: info.pos,
            size: Some(meta.size() as i64),
            name: (!known).then(|| resolve(&link)),
            writable: info.writable(),
        })
    }
}

/// resolves a descriptor link into the path of the file it refers to.
fn resolve(link: &Path) -> String {
    fs::read_link(link)
        .map(|target| target.to_string_lossy().into_owned())
        .unwrap_or_default()
}

impl Sampler for ProcSampler {
    fn pid(&self) -> Pid {
        self.pid
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn refresh_files(
        &mut self,
        files: &mut FileRegistry,
        now: Timestamp,
    ) -> Result<bool, SampleError> {
        // a process that cannot be listed has none of its files open.
        files.begin_cycle();
        let entries = fs::read_dir(&self.fd).map_err(|source| SampleError::Inspect {
            pid: self.pid,
            source,
        })?;

        let mut inserted = false;
        for entry in entries {
            let Ok(entry) = entry else {
                continue;
            };
            let name = entry.file_name();
            let Some(observation) = name.to_str().and_then(|n| self.inspect(files, n)) else {
                trace!(pid = %self.pid, fd = ?name, "skipping descriptor");
                continue;
            };
            inserted |= files.observe(observation, now);
        }

        Ok(inserted)
    }
}

// === impl FdInfo ===

impl FdInfo {
    /// whether the descriptor was opened write-only or read-write.
    pub fn writable(&self) -> bool {
        matches!(self.flags & libc::O_ACCMODE, libc::O_WRONLY | libc::O_RDWR)
    }
}

impl FromStr for FdInfo {
    type Err = FdInfoError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut pos = None;
        let mut flags = 0;

        for line in s.lines() {
            let mut tokens = line.split_whitespace();
            let (Some(label), Some(value)) = (tokens.next(), tokens.next()) else {
                continue;
            };
            let invalid = |label| FdInfoError::Value {
                label,
                value: value.to_owned(),
            };

            match label {
                "pos:" => pos = Some(value.parse().map_err(|_| invalid("pos"))?),
                "flags:" => {
                    flags = i32::from_str_radix(value, 8).map_err(|_| invalid("flags"))?;
                }
                // mnt_id, ino, and the lines specific to eventfd, epoll, inotify, and friends.
                _ => {}
            }
        }

        Ok(Self {
            pos: pos.ok_or(FdInfoError::MissingPos)?,
            flags,
        })
    }
}
