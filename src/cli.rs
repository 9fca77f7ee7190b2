//! command-line arguments.

use {
    crate::{render, sampler::Strategy, time::Timestamp, tracker::Policy},
    clap::Parser,
    nix::unistd::Pid,
    thiserror::Error,
};


/// shows the progress of the files a process is reading or writing.
///
/// every sampling period, lists the regular files the processes have open with their offset,
/// size, throughput, and estimated time to completion. send `SIGUSR1` to toggle the display.
#[derive(Debug, Parser)]
#[command(name = "pvof", version, about, long_about = None)]
pub struct Args {
    /// track this process. may be repeated.
    #[arg(short, long = "pid", value_name = "PID")]
    pub pids: Vec<i32>,

    /// seconds between samples. fractions are allowed.
    #[arg(short, long, value_name = "SECS", default_value_t = 1.0)]
    pub seconds: f64,

    /// print to this file descriptor, instead of the first terminal among stderr, stdout, and
    /// stdin.
    #[arg(short = 'd', long = "fd", value_name = "FD")]
    pub fd: Option<i32>,

    /// track every descriptor, not only regular files.
    #[arg(short = 'F', long, conflicts_with = "lsof")]
    pub force: bool,

    /// list open files with `lsof` instead of reading `/proc`.
    #[arg(short, long)]
    pub lsof: bool,

    /// also track the children the processes spawn.
    #[arg(short = 'c', long)]
    pub follow: bool,

    /// stop tracking a process after more than N failed samples in a row.
    #[arg(short, long, value_name = "N")]
    pub retire: Option<u32>,

    /// label processes with their pid rather than their name.
    #[arg(short, long)]
    pub numeric: bool,

    /// do not color the output.
    #[arg(short = 'C', long)]
    pub no_color: bool,

    /// forget files closed for more than N samples. 0 keeps them forever.
    #[arg(short, long, value_name = "N", default_value_t = 10)]
    pub evict_after: u32,

    /// show the i/o counters of the processes instead of their files.
    #[arg(short, long)]
    pub io: bool,

    /// run this command and track it. its exit status becomes ours.
    #[arg(last = true, value_name = "COMMAND")]
    pub command: Vec<String>,
}

/// where to print.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Output {
    /// an explicit file descriptor.
    Fd(i32),
    /// the first terminal among stderr, stdout, and stdin.
    Terminal,
}

/// validated settings.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub pids: Vec<Pid>,
    /// the command to launch. empty if none.
    pub command: Vec<String>,
    pub period: Timestamp,
    pub output: Output,
    pub strategy: Strategy,
    pub policy: Policy,
    pub numeric: bool,
    pub render: render::Options,
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("a process id or a command to run is required")]
    NoTarget,
    #[error("invalid process id: {0}")]
    Pid(i32),
    #[error("the sampling period must be a positive number of seconds, not {0}")]
    Period(f64),
    #[error("invalid file descriptor: {0}")]
    Fd(i32),
}

// === impl Args ===

impl Args {
    /// checks the arguments, and turns them into a [`Config`].
    pub fn validate(self) -> Result<Config, ConfigError> {
        let Self {
            pids,
            seconds,
            fd,
            force,
            lsof,
            follow,
            retire,
            numeric,
            no_color,
            evict_after,
            io,
            command,
        } = self;

        if pids.is_empty() && command.is_empty() {
            return Err(ConfigError::NoTarget);
        }

        let pids = pids
            .into_iter()
            .map(|pid| match pid {
                1.. => Ok(Pid::from_raw(pid)),
                _ => Err(ConfigError::Pid(pid)),
            })
            .collect::<Result<Vec<_>, _>>()?;

        let period = Some(seconds)
            .filter(|s| s.is_finite())
            .map(Timestamp::from_secs_f64)
            .filter(Timestamp::is_positive)
            .ok_or(ConfigError::Period(seconds))?;

        let output = match fd {
            Some(fd) if fd < 0 => return Err(ConfigError::Fd(fd)),
            Some(fd) => Output::Fd(fd),
            None => Output::Terminal,
        };

        let strategy = if lsof {
            Strategy::Lsof
        } else {
            Strategy::Proc { force }
        };

        Ok(Config {
            pids,
            command,
            period,
            output,
            strategy,
            policy: Policy {
                follow_children: follow,
                retire_after: retire,
                evict_after: (evict_after > 0).then_some(evict_after),
            },
            numeric,
            render: render::Options {
                color: !no_color,
                io,
            },
        })
    }
}
