//! starting subprocesses without a shell.
//!
//! a failed `execvp(3)` is reported through a close-on-exec pipe: the parent's read returns no
//! bytes when the exec succeeded (the kernel closed the pipe), or the child's `errno` when it
//! failed. this tells "the program could not be started" apart from "the program ran and exited".

use {
    crate::signals,
    nix::{
        errno::Errno,
        fcntl::OFlag,
        sys::{
            signal::{self, SaFlags, SigAction, SigHandler, SigSet, Signal},
            wait::{WaitPidFlag, WaitStatus, waitpid},
        },
        unistd::{ForkResult, Pid, alarm, fork, pipe2},
    },
    std::{
        ffi::{CString, NulError},
        fmt,
        fs::{File, OpenOptions},
        io::{self, Read},
        os::fd::{AsRawFd, OwnedFd},
        ptr,
    },
    thiserror::Error,
    tracing::debug,
};

#[cfg(test)]
mod tests;

/// a command to launch.
#[derive(Debug)]
pub struct Launch {
    argv: Vec<CString>,
    capture_stdout: bool,
    quiet_stderr: bool,
}

/// a launched child process.
///
/// the child is reaped when this is dropped, if it has not been already.
#[derive(Debug)]
pub struct Child {
    pid: Pid,
    stdout: Option<File>,
    exit: Option<Exit>,
}

/// how a child process terminated.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Exit {
    /// the process exited with this code.
    Code(i32),
    /// the process was killed by this signal.
    Signal(Signal),
}

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("empty command line")]
    Empty,
    #[error("command line contains a nul byte")]
    Nul(#[from] NulError),
    #[error("failed to prepare `{program}`")]
    Setup {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to start `{program}`")]
    Exec {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to wait for process {pid}")]
    Wait {
        pid: Pid,
        #[source]
        source: Errno,
    },
}

// === impl Launch ===

impl Launch {
    pub fn new<I, S>(argv: I) -> Result<Self, LaunchError>
    where
        I: IntoIterator<Item = S>,
        S: Into<Vec<u8>>,
    {
        let argv = argv
            .into_iter()
            .map(CString::new)
            .collect::<Result<Vec<_>, _>>()?;
        if argv.is_empty() {
            return Err(LaunchError::Empty);
        }

        Ok(Self {
            argv,
            capture_stdout: false,
            quiet_stderr: false,
        })
    }

    /// connects the child's standard output to a pipe, readable through [`Child::take_stdout`].
    pub fn capture_stdout(mut self) -> Self {
        self.capture_stdout = true;
        self
    }

    /// sends the child's standard error to `/dev/null`.
    pub fn quiet_stderr(mut self) -> Self {
        self.quiet_stderr = true;
        self
    }

    fn program(&self) -> String {
        self.argv[0].to_string_lossy().into_owned()
    }

    /// forks and execs the command.
    ///
    /// returns [`LaunchError::Exec`] if the program could not be executed; no [`Child`] is
    /// returned in that case, and the failed child has already been reaped.
    pub fn spawn(self) -> Result<Child, LaunchError> {
        let setup = |source: io::Error| LaunchError::Setup {
            program: self.program(),
            source,
        };

        // everything the child needs is allocated before forking: only async-signal-safe calls
        // are allowed between `fork` and `execvp`.
        let mut argv = self.argv.iter().map(|a| a.as_ptr()).collect::<Vec<_>>();
        argv.push(ptr::null());

        let (exec_rx, exec_tx) = pipe2(OFlag::O_CLOEXEC).map_err(|e| setup(e.into()))?;
        let stdout = self
            .capture_stdout
            .then(|| pipe2(OFlag::O_CLOEXEC))
            .transpose()
            .map_err(|e| setup(e.into()))?;
        let devnull = self
            .quiet_stderr
            .then(|| OpenOptions::new().write(true).open("/dev/null"))
            .transpose()
            .map_err(setup)?;

        // SAFETY: the child only calls async-signal-safe functions before exec'ing or exiting.
        match unsafe { fork() }.map_err(|e| setup(e.into()))? {
            ForkResult::Child => {
                let stdout = stdout.as_ref().map(|(_, tx)| tx.as_raw_fd());
                let stderr = devnull.as_ref().map(AsRawFd::as_raw_fd);
                // SAFETY: see above. `exec_child` never returns.
                unsafe { exec_child(&argv, exec_tx.as_raw_fd(), stdout, stderr) }
            }
            ForkResult::Parent { child } => {
                drop(exec_tx);
                let stdout = stdout.map(|(rx, tx)| {
                    drop(tx);
                    File::from(rx)
                });

                match exec_status(exec_rx) {
                    Ok(None) => {
                        debug!(pid = %child, program = %self.program(), "launched");
                        Ok(Child {
                            pid: child,
                            stdout,
                            exit: None,
                        })
                    }
                    Ok(Some(source)) | Err(source) => {
                        // the child is gone (or about to be); do not leave a zombie behind.
                        let _ = waitpid(child, None);
                        Err(LaunchError::Exec {
                            program: self.program(),
                            source,
                        })
                    }
                }
            }
        }
    }
}

/// waits for the exec-failure pipe to close, returning the child's `errno` if it reported one.
fn exec_status(rx: OwnedFd) -> io::Result<Option<io::Error>> {
    let mut pipe = File::from(rx);
    let mut buf = [0u8; size_of::<i32>()];
    let mut len = 0;

    while len < buf.len() {
        match pipe.read(&mut buf[len..]) {
            Ok(0) => break,
            Ok(n) => len += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }

    Ok(match len {
        0 => None,
        n if n == buf.len() => Some(io::Error::from_raw_os_error(i32::from_ne_bytes(buf))),
        _ => Some(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "truncated exec status",
        )),
    })
}

/// the child side of [`Launch::spawn`].
///
/// # Safety
///
/// must only be called in a freshly forked child. `argv` must be a null-terminated array of
/// pointers to nul-terminated strings.
unsafe fn exec_child(
    argv: &[*const libc::c_char],
    exec_tx: libc::c_int,
    stdout: Option<libc::c_int>,
    stderr: Option<libc::c_int>,
) -> ! {
    // SAFETY: these are raw libc calls on descriptors owned by this process.
    unsafe {
        let redirected = stdout.is_none_or(|fd| libc::dup2(fd, libc::STDOUT_FILENO) != -1)
            && stderr.is_none_or(|fd| libc::dup2(fd, libc::STDERR_FILENO) != -1);
        if redirected {
            libc::execvp(argv[0], argv.as_ptr());
        }

        // if we got here, something failed. report it to the parent.
        let errno = (Errno::last() as i32).to_ne_bytes();
        while libc::write(exec_tx, errno.as_ptr().cast(), errno.len()) == -1 {
            if Errno::last() != Errno::EINTR {
                break;
            }
        }
        libc::_exit(127)
    }
}

// === impl Child ===

impl Child {
    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// takes the read end of the child's standard output, if it was captured.
    pub fn take_stdout(&mut self) -> Option<File> {
        self.stdout.take()
    }

    /// how the child terminated, if it has been reaped.
    pub fn exit(&self) -> Option<Exit> {
        self.exit
    }

    /// blocks until the child terminates. signals delivered meanwhile do not end the wait.
    pub fn wait(&mut self) -> Result<Exit, LaunchError> {
        loop {
            match self.reap(None) {
                Ok(Some(exit)) => return Ok(exit),
                Ok(None)
                | Err(LaunchError::Wait {
                    source: Errno::EINTR,
                    ..
                }) => {}
                Err(error) => return Err(error),
            }
        }
    }

    /// reaps the child if it has terminated, without blocking.
    pub fn try_wait(&mut self) -> Result<Option<Exit>, LaunchError> {
        self.reap(Some(WaitPidFlag::WNOHANG))
    }

    /// waits for the child for at most `secs` seconds. returns `None` if it is still running.
    ///
    /// the wait is bounded by `alarm(2)`: the `SIGALRM` handler interrupts `waitpid(2)`. this
    /// must be called from the thread that would receive the signal, which is the main thread in
    /// a single-threaded program.
    pub fn wait_timeout(&mut self, secs: u32) -> Result<Option<Exit>, LaunchError> {
        if let Some(exit) = self.exit {
            return Ok(Some(exit));
        }

        signals::install_alarm().map_err(|source| LaunchError::Wait {
            pid: self.pid,
            source,
        })?;
        signals::take_alarm();
        alarm::set(secs.max(1));
        let result = loop {
            match self.reap(None) {
                // another signal interrupted the wait; only the alarm ends it.
                Err(LaunchError::Wait {
                    source: Errno::EINTR,
                    ..
                }) if !signals::take_alarm() => continue,
                Err(LaunchError::Wait {
                    source: Errno::EINTR,
                    ..
                }) => break Ok(None),
                other => break other,
            }
        };
        alarm::cancel();

        result
    }

    /// gives up on the child, leaving it running and unreaped.
    pub fn detach(mut self) -> Pid {
        drop(self.stdout.take());
        let pid = self.pid;
        std::mem::forget(self);
        pid
    }

    fn reap(&mut self, flags: Option<WaitPidFlag>) -> Result<Option<Exit>, LaunchError> {
        if let Some(exit) = self.exit {
            return Ok(Some(exit));
        }

        let status = waitpid(self.pid, flags).map_err(|source| LaunchError::Wait {
            pid: self.pid,
            source,
        })?;
        self.exit = Exit::from_status(status);
        Ok(self.exit)
    }
}

impl Drop for Child {
    fn drop(&mut self) {
        // close our end first, so a child blocked writing to the pipe sees EPIPE.
        drop(self.stdout.take());
        while self.exit.is_none() {
            match self.reap(None) {
                Ok(_) => {}
                Err(LaunchError::Wait {
                    source: Errno::EINTR,
                    ..
                }) => {}
                Err(_) => break,
            }
        }
    }
}

// === impl Exit ===

impl Exit {
    fn from_status(status: WaitStatus) -> Option<Self> {
        match status {
            WaitStatus::Exited(_, code) => Some(Self::Code(code)),
            WaitStatus::Signaled(_, signal, _) => Some(Self::Signal(signal)),
            _ => None,
        }
    }

    pub fn success(&self) -> bool {
        *self == Self::Code(0)
    }
}

impl fmt::Display for Exit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Code(code) => write!(f, "exit({code})"),
            Self::Signal(signal) => write!(f, "kill({})", signal.as_str()),
        }
    }
}

/// terminates this process the same way a child did.
///
/// an exit code is passed through as-is. for a signal, its default disposition is restored and
/// the signal is raised against ourselves, so whoever supervises us sees the same status.
pub fn mirror(exit: Exit) -> ! {
    match exit {
        Exit::Code(code) => std::process::exit(code),
        Exit::Signal(sig) => {
            let default = SigAction::new(SigHandler::SigDfl, SaFlags::empty(), SigSet::empty());
            // SAFETY: restoring the default disposition installs no handler.
            let _ = unsafe { signal::sigaction(sig, &default) };
            let _ = signal::raise(sig);
            // unreachable for fatal signals; exit with a failure otherwise.
            std::process::exit(128 + sig as i32)
        }
    }
}
