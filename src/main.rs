//! shows the progress of the files a process is reading or writing.

use {
    anyhow::{Context, bail},
    clap::{CommandFactory, Parser, error::ErrorKind},
    crossterm::tty::IsTty,
    pvof::{
        cli::{Args, Config, ConfigError, Output},
        launch::{self, Child, Exit, Launch},
        poll::Poller,
        signals,
        time::SystemClock,
        tracker::ProcessSet,
        tty::{TtyWriter, WidthSource},
    },
    std::{
        fs::{File, OpenOptions},
        io::{self, BufWriter},
        process::ExitCode,
    },
    tracing::{debug, warn},
    tracing_subscriber::EnvFilter,
};

/// how long the command is given to terminate once monitoring stopped, in seconds.
const GRACE: u32 = 1;

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let config = Args::parse().validate().unwrap_or_else(|error| {
        let kind = match error {
            ConfigError::NoTarget => ErrorKind::MissingRequiredArgument,
            _ => ErrorKind::ValueValidation,
        };
        Args::command().error(kind, error).exit()
    });

    match run(config) {
        Ok(Some(exit)) => launch::mirror(exit),
        Ok(None) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("pvof: {error:#}");
            ExitCode::FAILURE
        }
    }
}

/// monitors the configured processes. returns how the launched command terminated, if any.
fn run(config: Config) -> anyhow::Result<Option<Exit>> {
    let Config {
        pids,
        command,
        period,
        output,
        strategy,
        policy,
        numeric,
        render,
    } = config;

    signals::install_all().context("failed to install signal handlers")?;

    let mut child = match spawn(&command) {
        Ok(child) => child,
        Err(error) if pids.is_empty() => return Err(error),
        Err(error) => {
            warn!("{error:#}");
            None
        }
    };

    let Some(display) = open_display(output)? else {
        let Some(mut child) = child else {
            bail!("no terminal to display on");
        };
        eprintln!("pvof: no terminal to display on");
        return child
            .wait()
            .map(Some)
            .context("failed to wait for the command");
    };

    let mut set = ProcessSet::new(move |pid| strategy.sampler(pid, numeric), policy);
    for pid in pids {
        set.track(pid);
    }
    if let Some(child) = &child {
        set.track(child.pid());
    }

    let mut tty = TtyWriter::new(BufWriter::new(display), WidthSource::Terminal);
    let stop = Poller::new(SystemClock, period).run(&mut set, &mut tty, render, child.as_mut())?;
    debug!(?stop, "monitoring stopped");

    let Some(mut child) = child else {
        return Ok(None);
    };
    match child.wait_timeout(GRACE)? {
        Some(exit) => Ok(Some(exit)),
        None => {
            let pid = child.detach();
            warn!(%pid, "the command is still running");
            Ok(None)
        }
    }
}

/// launches the command, if there is one.
fn spawn(command: &[String]) -> anyhow::Result<Option<Child>> {
    if command.is_empty() {
        return Ok(None);
    }

    let child = Launch::new(command.iter().map(String::as_str))?.spawn()?;
    Ok(Some(child))
}

/// opens the descriptor to print to. returns `None` if no terminal was found.
fn open_display(output: Output) -> anyhow::Result<Option<File>> {
    let fd = match output {
        Output::Fd(fd) => fd,
        Output::Terminal => {
            let terminals = [
                (2, io::stderr().is_tty()),
                (1, io::stdout().is_tty()),
                (0, io::stdin().is_tty()),
            ];
            match terminals.into_iter().find_map(|(fd, tty)| tty.then_some(fd)) {
                Some(fd) => fd,
                None => return Ok(None),
            }
        }
    };

    OpenOptions::new()
        .write(true)
        .open(format!("/proc/self/fd/{fd}"))
        .map(Some)
        .with_context(|| format!("cannot write to descriptor {fd}"))
}
