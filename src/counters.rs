//! aggregate i/o accounting of a process.
//!
//! this file provides tools to interact with `/proc/<pid>/io`. see `proc_pid_io(5)`.

use {
    crate::{process, time::Timestamp},
    nix::unistd::Pid,
    std::{fs, io, num::ParseIntError, str::FromStr},
    thiserror::Error,
};


/// a pair of counters, one per direction.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Traffic {
    pub read: u64,
    pub write: u64,
}

/// a pair of rates, in units per second, one per direction.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Throughput {
    pub read: f64,
    pub write: f64,
}

/// one value for each accounting layer of `/proc/<pid>/io`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Layers<T> {
    /// logical i/o: bytes passed to `read(2)`, `write(2)`, and friends (`rchar`, `wchar`).
    pub chars: T,
    /// the number of read and write system calls (`syscr`, `syscw`).
    pub syscalls: T,
    /// bytes actually fetched from, or sent to, the storage layer (`read_bytes`, `write_bytes`).
    pub device: T,
}

/// the rates derived from two or more samples.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rates {
    /// the rates between the two most recent samples.
    pub speed: Layers<Throughput>,
    /// the rates since tracking began.
    pub average: Layers<Throughput>,
}

/// one reading of `/proc/<pid>/io`, taken at a moment in time.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Sample {
    counters: Layers<Traffic>,
    time: Timestamp,
}

/// the i/o counters of one tracked process.
///
/// the first successful sample only seeds the baselines; rates become available from the second
/// sample onward.
#[derive(Clone, Debug, Default)]
pub struct IoCounters {
    /// the sample taken when tracking began.
    start: Option<Sample>,
    /// the most recent sample.
    last: Option<Sample>,
    /// the rates computed from the most recent sample.
    rates: Option<Rates>,
    /// the number of consecutive failed samples.
    failures: u32,
}

#[derive(Debug, Error, Eq, PartialEq)]
pub enum CounterParseError {
    #[error("malformed line: {line:?}")]
    Malformed { line: String },
    #[error("invalid value for {field}")]
    Value {
        field: String,
        #[source]
        source: ParseIntError,
    },
    #[error("missing field: {0}")]
    Missing(&'static str),
}

#[derive(Debug, Error)]
pub enum CounterReadError {
    #[error("could not read i/o counters")]
    Io(#[from] io::Error),
    #[error("could not parse i/o counters")]
    Parse(#[from] CounterParseError),
}

// === impl Layers ===

impl<T> Layers<T> {
    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> Layers<U> {
        let Self {
            chars,
            syscalls,
            device,
        } = self;
        Layers {
            chars: f(chars),
            syscalls: f(syscalls),
            device: f(device),
        }
    }

    pub fn zip<U>(self, other: Layers<U>) -> Layers<(T, U)> {
        Layers {
            chars: (self.chars, other.chars),
            syscalls: (self.syscalls, other.syscalls),
            device: (self.device, other.device),
        }
    }

    /// pairs each layer with its short display name.
    pub fn named(self) -> [(&'static str, T); 3] {
        let Self {
            chars,
            syscalls,
            device,
        } = self;
        [("char", chars), ("sysc", syscalls), ("disk", device)]
    }
}

impl FromStr for Layers<Traffic> {
    type Err = CounterParseError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut fields: [Option<u64>; 6] = [None; 6];

        for line in s.lines().filter(|l| !l.trim().is_empty()) {
            let Some((label, value)) = line.split_once(':') else {
                return Err(CounterParseError::Malformed {
                    line: line.to_owned(),
                });
            };

            let slot = match label.trim() {
                "rchar" => 0,
                "wchar" => 1,
                "syscr" => 2,
                "syscw" => 3,
                "read_bytes" => 4,
                "write_bytes" => 5,
                // `cancelled_write_bytes`, and anything newer kernels may add.
                _ => continue,
            };

            let value = value
                .trim()
                .parse::<u64>()
                .map_err(|source| CounterParseError::Value {
                    field: label.trim().to_owned(),
                    source,
                })?;
            fields[slot] = Some(value);
        }

        const NAMES: [&str; 6] = [
            "rchar",
            "wchar",
            "syscr",
            "syscw",
            "read_bytes",
            "write_bytes",
        ];
        let mut values = [0; 6];
        for (i, field) in fields.into_iter().enumerate() {
            values[i] = field.ok_or(CounterParseError::Missing(NAMES[i]))?;
        }

        let [rchar, wchar, syscr, syscw, read_bytes, write_bytes] = values;
        Ok(Layers {
            chars: Traffic {
                read: rchar,
                write: wchar,
            },
            syscalls: Traffic {
                read: syscr,
                write: syscw,
            },
            device: Traffic {
                read: read_bytes,
                write: write_bytes,
            },
        })
    }
}

/// reads the i/o counters of `pid`.
pub fn read(pid: Pid) -> Result<Layers<Traffic>, CounterReadError> {
    let contents = fs::read_to_string(process::proc_path(pid, "io"))?;
    contents.parse().map_err(CounterReadError::from)
}

// === impl Throughput ===

impl Throughput {
    fn between(a: Traffic, b: Traffic, elapsed: Timestamp) -> Self {
        let secs = elapsed.as_secs_f64();
        // counters only grow, except when a pid is reused; report that as a negative rate.
        let rate = |a: u64, b: u64| (b as f64 - a as f64) / secs;
        Self {
            read: rate(a.read, b.read),
            write: rate(a.write, b.write),
        }
    }
}

// === impl IoCounters ===

impl IoCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// folds a reading into the counters.
    ///
    /// on success, returns `true`: the first reading seeds the baselines, later ones update the
    /// rates. on failure, returns `false`, bumps the failure streak, and leaves the baselines
    /// untouched.
    pub fn record<E>(&mut self, reading: Result<Layers<Traffic>, E>, now: Timestamp) -> bool {
        let Ok(counters) = reading else {
            self.failures += 1;
            return false;
        };

        self.failures = 0;
        let sample = Sample {
            counters,
            time: now,
        };

        let (Some(start), Some(last)) = (self.start, self.last) else {
            self.start = Some(sample);
            self.last = Some(sample);
            return true;
        };

        let elapsed = now - last.time;
        let lifetime = now - start.time;
        if elapsed.is_positive() && lifetime.is_positive() {
            let step = |pair: (Traffic, Traffic), span| Throughput::between(pair.0, pair.1, span);
            self.rates = Some(Rates {
                speed: last.counters.zip(counters).map(|p| step(p, elapsed)),
                average: start.counters.zip(counters).map(|p| step(p, lifetime)),
            });
        }
        self.last = Some(sample);

        true
    }

    /// returns the rates, once two samples have been recorded.
    pub fn rates(&self) -> Option<&Rates> {
        self.rates.as_ref()
    }

    /// returns the most recently recorded counters.
    pub fn current(&self) -> Option<Layers<Traffic>> {
        self.last.map(|s| s.counters)
    }

    /// returns when tracking began, if any sample has been recorded.
    pub fn started(&self) -> Option<Timestamp> {
        self.start.map(|s| s.time)
    }

    /// returns when the last successful sample was taken.
    pub fn updated(&self) -> Option<Timestamp> {
        self.last.map(|s| s.time)
    }

    /// the number of consecutive failed samples.
    pub fn failures(&self) -> u32 {
        self.failures
    }
}
