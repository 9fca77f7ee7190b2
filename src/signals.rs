//! process-wide signal flags.
//!
//! handlers only store to atomics: no allocation, no i/o. the poll loop reads the flags once per
//! iteration.

use {
    nix::{
        errno::Errno,
        sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal, sigaction},
    },
    std::sync::atomic::{AtomicBool, Ordering},
};

#[cfg(test)]
mod tests;

/// set when a termination signal arrived.
static TERMINATE: AtomicBool = AtomicBool::new(false);
/// flipped by `SIGUSR1`. rendering is suspended while set.
static PAUSED: AtomicBool = AtomicBool::new(false);
/// set when the terminal was resized. the window width must be queried again.
static RESIZED: AtomicBool = AtomicBool::new(true);
/// set when an alarm went off.
static ALARM: AtomicBool = AtomicBool::new(false);

extern "C" fn on_terminate(_: libc::c_int) {
    TERMINATE.store(true, Ordering::Relaxed);
}

extern "C" fn on_toggle(_: libc::c_int) {
    PAUSED.fetch_xor(true, Ordering::Relaxed);
}

extern "C" fn on_resize(_: libc::c_int) {
    RESIZED.store(true, Ordering::Relaxed);
}

extern "C" fn on_alarm(_: libc::c_int) {
    ALARM.store(true, Ordering::Relaxed);
}

/// installs `handler` for `signal`.
///
/// only `SIGWINCH` restarts interrupted system calls. the others must interrupt the poll loop's
/// sleep and the bounded wait.
fn install(signal: Signal, handler: extern "C" fn(libc::c_int)) -> Result<(), Errno> {
    let flags = match signal {
        Signal::SIGWINCH => SaFlags::SA_RESTART,
        _ => SaFlags::empty(),
    };
    let action = SigAction::new(SigHandler::Handler(handler), flags, SigSet::empty());
    // SAFETY: every handler in this module only stores to an atomic.
    unsafe { sigaction(signal, &action) }.map(drop)
}

/// installs the handlers used by the poll loop.
pub fn install_all() -> Result<(), Errno> {
    for signal in [Signal::SIGTERM, Signal::SIGQUIT, Signal::SIGINT] {
        install(signal, on_terminate)?;
    }
    install(Signal::SIGUSR1, on_toggle)?;
    install(Signal::SIGWINCH, on_resize)?;
    install_alarm()
}

/// installs the `SIGALRM` handler used to bound waits.
pub fn install_alarm() -> Result<(), Errno> {
    install(Signal::SIGALRM, on_alarm)
}

/// whether a termination signal has been received.
pub fn terminated() -> bool {
    TERMINATE.load(Ordering::Relaxed)
}

/// whether the display has been toggled off.
pub fn paused() -> bool {
    PAUSED.load(Ordering::Relaxed)
}

/// consumes a pending resize notification.
pub fn take_resize() -> bool {
    RESIZED.swap(false, Ordering::Relaxed)
}

/// consumes a pending alarm.
pub fn take_alarm() -> bool {
    ALARM.swap(false, Ordering::Relaxed)
}
