//! sampling through the field output of `lsof(8)`.
//!
//! `-F` output is one line per process set or file set. each line is a sequence of fields, each
//! field a one-character tag followed by its value and terminated by a nul byte (`-F0`).

use {
    super::{SampleError, Sampler},
    crate::{
        launch::Launch,
        registry::{FileRegistry, Observation},
        time::Timestamp,
    },
    nix::unistd::Pid,
    std::{
        fs::File,
        io::{self, BufRead, BufReader},
        iter,
        str::FromStr,
    },
    thiserror::Error,
    tracing::{debug, trace},
};

#[cfg(test)]
mod tests;

/// the program run to list open files. looked up in `$PATH`.
const LSOF: &str = "lsof";

/// samples a process by running `lsof`.
pub struct LsofSampler {
    pid: Pid,
    label: String,
}

/// one file set line of `lsof -F` output.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Entry {
    pub fd: i32,
    pub inode: u64,
    pub offset: Option<i64>,
    pub size: Option<i64>,
    pub name: Option<String>,
    pub writable: bool,
}

/// why a line of `lsof -F` output does not describe a regular file we can track.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum LineError {
    #[error("process set line")]
    Process,
    #[error("not a numeric descriptor: {0:?}")]
    Descriptor(String),
    #[error("lsof could not list the descriptors")]
    NoDescriptors,
    #[error("not a regular file: {0:?}")]
    Type(String),
    #[error("unsupported access mode: {0:?}")]
    Access(String),
    #[error("unknown field tag {0:?}")]
    UnknownField(char),
    #[error("invalid {label} value: {value:?}")]
    Value { label: &'static str, value: String },
    #[error("missing {0} field")]
    Missing(&'static str),
}

// === impl LsofSampler ===

impl LsofSampler {
    pub fn new(pid: Pid, label: String) -> Self {
        Self { pid, label }
    }
}

impl Sampler for LsofSampler {
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
        let pid = self.pid;
        let pid_arg = pid.to_string();
        let inserted = run(&["-p", &pid_arg, "-o", "-Ffaiot0"], |output| {
            read_offsets(output, pid, files, now)
        })?;

        // sizes and names are only printed without `-o`. ask for them for the files we have not
        // named yet, which are usually just the ones inserted above.
        let unnamed = files
            .iter()
            .filter(|f| f.seen && f.name.is_empty())
            .map(|f| f.fd.to_string())
            .collect::<Vec<_>>();
        if !unnamed.is_empty() {
            let fds = unnamed.join(",");
            let named = run(&["-p", &pid_arg, "-a", "-d", &fds, "-Ffaisn0"], |output| {
                read_names(output, pid, files)
            });
            if let Err(error) = named {
                // the files may have been closed in between. retried on the next sample.
                debug!(%pid, %error, "failed to name files");
            }
        }

        Ok(inserted > 0)
    }
}

/// runs `lsof` with `args`, parsing its standard output with `parse`.
///
/// the exit status is checked once the output has been consumed.
fn run<T>(
    args: &[&str],
    parse: impl FnOnce(BufReader<File>) -> Result<T, SampleError>,
) -> Result<T, SampleError> {
    let mut child = Launch::new(iter::once(LSOF).chain(args.iter().copied()))?
        .capture_stdout()
        .quiet_stderr()
        .spawn()?;
    let output = child
        .take_stdout()
        .ok_or_else(|| SampleError::Read(io::Error::other("lsof output is not captured")))?;

    // the output is dropped before waiting, so an early parse failure cannot block the child.
    let parsed = parse(BufReader::new(output));
    let exit = child.wait()?;
    let parsed = parsed?;

    if !exit.success() {
        return Err(SampleError::Tool(exit));
    }
    Ok(parsed)
}

/// reconciles the offsets listed in `output` against `files`.
///
/// every file is marked unseen first. returns the number of inserted files.
pub fn read_offsets(
    output: impl BufRead,
    pid: Pid,
    files: &mut FileRegistry,
    now: Timestamp,
) -> Result<usize, SampleError> {
    files.begin_cycle();

    let mut inserted = 0;
    for entry in entries(output, pid) {
        let Entry {
            fd,
            inode,
            offset,
            size,
            name,
            writable,
        } = entry?;
        let Some(offset) = offset else {
            trace!(%pid, fd, "no offset listed");
            continue;
        };

        let observation = Observation {
            fd,
            inode,
            offset,
            size,
            name,
            writable,
        };
        if files.observe(observation, now) {
            inserted += 1;
        }
    }

    Ok(inserted)
}

/// fills in the sizes and names listed in `output` for the files already in `files`.
pub fn read_names(
    output: impl BufRead,
    pid: Pid,
    files: &mut FileRegistry,
) -> Result<(), SampleError> {
    for entry in entries(output, pid) {
        let entry = entry?;
        let Some(file) = files.find_mut(entry.fd, entry.inode) else {
            continue;
        };
        if let Some(size) = entry.size {
            file.size = size;
        }
        if let Some(name) = entry.name {
            file.name = name;
        }
    }

    Ok(())
}

/// the file entries of `output`. lines that are not trackable files are skipped.
fn entries(output: impl BufRead, pid: Pid) -> impl Iterator<Item = Result<Entry, SampleError>> {
    output.split(b'\n').filter_map(move |line| {
        let line = match line {
            Ok(line) => line,
            Err(error) => return Some(Err(SampleError::Read(error))),
        };

        match String::from_utf8_lossy(&line).parse::<Entry>() {
            Ok(entry) => Some(Ok(entry)),
            Err(LineError::NoDescriptors) => Some(Err(SampleError::NoDescriptors { pid })),
            Err(error) => {
                trace!(%pid, %error, "skipping lsof line");
                None
            }
        }
    })
}

// === impl Entry ===

impl FromStr for Entry {
    type Err = LineError;
    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut fd = None;
        let mut inode = None;
        let mut entry = Self::default();

        for field in line.split('\0').filter(|f| !f.is_empty()) {
            let mut chars = field.chars();
            let Some(tag) = chars.next() else {
                continue;
            };
            let value = chars.as_str();

            match tag {
                'p' => return Err(LineError::Process),
                'f' => fd = Some(Self::parse_fd(value)?),
                'a' => entry.writable = Self::parse_access(value)?,
                't' if value == "REG" => {}
                't' => return Err(LineError::Type(value.to_owned())),
                'o' => entry.offset = Some(Self::parse_offset(value)?),
                's' => entry.size = Some(parse_value("size", value)?),
                'i' => inode = Some(parse_value("inode", value)?),
                'n' => entry.name = Some(value.to_owned()),
                other => return Err(LineError::UnknownField(other)),
            }
        }

        Ok(Self {
            fd: fd.ok_or(LineError::Missing("descriptor"))?,
            inode: inode.ok_or(LineError::Missing("inode"))?,
            ..entry
        })
    }
}

impl Entry {
    fn parse_fd(value: &str) -> Result<i32, LineError> {
        match value {
            "NOFD" => Err(LineError::NoDescriptors),
            // `cwd`, `txt`, `mem`, `rtd`, and friends.
            _ => value
                .parse()
                .map_err(|_| LineError::Descriptor(value.to_owned())),
        }
    }

    /// whether the access mode is writable.
    fn parse_access(value: &str) -> Result<bool, LineError> {
        match value {
            "r" => Ok(false),
            "w" | "u" => Ok(true),
            _ => Err(LineError::Access(value.to_owned())),
        }
    }

    /// offsets are printed as `0x` hexadecimal, `0t` decimal, or plain decimal.
    fn parse_offset(value: &str) -> Result<i64, LineError> {
        let parsed = if let Some(hex) = value.strip_prefix("0x") {
            i64::from_str_radix(hex, 16)
        } else {
            value.strip_prefix("0t").unwrap_or(value).parse()
        };
        parsed.map_err(|_| LineError::Value {
            label: "offset",
            value: value.to_owned(),
        })
    }
}

fn parse_value<T: FromStr>(label: &'static str, value: &str) -> Result<T, LineError> {
    value.parse().map_err(|_| LineError::Value {
        label,
        value: value.to_owned(),
    })
}
