//! the sampling loop.

use {
    crate::{
        launch::{Child, LaunchError},
        render::{self, Options},
        signals,
        time::{Clock, Timestamp},
        tracker::ProcessSet,
        tty::TtyWriter,
    },
    std::io::{self, Write},
    thiserror::Error,
    tracing::{debug, info},
};


/// samples and renders on a fixed period.
pub struct Poller<C> {
    clock: C,
    period: Timestamp,
}

/// why the loop ended.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Stop {
    /// a termination signal arrived.
    Terminated,
    /// no tracked process could be sampled.
    Idle,
}

#[derive(Debug, Error)]
pub enum PollError {
    #[error("failed to write to the display")]
    Display(#[from] io::Error),
    #[error(transparent)]
    Launch(#[from] LaunchError),
}

/// when to wake up next.
///
/// deadlines are spaced by `period` from the previous one, so a loop that keeps up does not
/// drift. one that fell behind restarts from `now` instead of trying to catch up.
pub fn next_deadline(previous: Timestamp, now: Timestamp, period: Timestamp) -> Timestamp {
    previous.max(now) + period
}

// === impl Poller ===

impl<C: Clock> Poller<C> {
    pub fn new(clock: C, period: Timestamp) -> Self {
        Self { clock, period }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// samples `set` and renders it to `tty` until a termination signal arrives or nothing is
    /// left to sample.
    ///
    /// `command` is the launched child, if any. it is untracked as soon as it has been reaped.
    /// without a retirement threshold, the loop also ends on the first cycle where no process
    /// could be sampled.
    pub fn run<W: Write>(
        &self,
        set: &mut ProcessSet,
        tty: &mut TtyWriter<W>,
        options: Options,
        mut command: Option<&mut Child>,
    ) -> Result<Stop, PollError> {
        let Self { clock, period } = self;
        let retiring = set.policy().retire_after.is_some();

        let mut deadline = Timestamp::ZERO;
        let stop = loop {
            if signals::terminated() {
                break Stop::Terminated;
            }

            if let Some(child) = command.as_deref_mut() {
                if let Some(exit) = child.try_wait()? {
                    info!(pid = %child.pid(), %exit, "command terminated");
                    set.untrack(child.pid());
                    command = None;
                }
            }

            if set.is_empty() {
                break Stop::Idle;
            }

            let progress = set.sample(clock.now());
            if set.is_empty() || !(progress || retiring) {
                debug!("no process could be sampled");
                break Stop::Idle;
            }

            if !signals::paused() {
                render::frame(tty, set, options)?;
            }

            deadline = next_deadline(deadline, clock.now(), *period);
            clock.sleep_until(deadline);
        };

        tty.close()?;
        Ok(stop)
    }
}
