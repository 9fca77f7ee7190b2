use {
    super::*,
    std::io::{BufRead, BufReader},
};

fn lines(child: &mut Child) -> Vec<String> {
    let stdout = child.take_stdout().expect("stdout is captured");
    BufReader::new(stdout)
        .lines()
        .collect::<Result<_, _>>()
        .expect("stdout is readable")
}

#[test]
fn echo() {
    let mut child = Launch::new(["/bin/echo", "Hello there"])
        .unwrap()
        .capture_stdout()
        .spawn()
        .unwrap();

    assert_eq!(lines(&mut child), vec!["Hello there"]);
    assert_eq!(child.wait().unwrap(), Exit::Code(0));
}

#[test]
fn echo_multiple_lines() {
    let mut child = Launch::new(["/bin/echo", "-e", "Line one\nSecond line"])
        .unwrap()
        .capture_stdout()
        .spawn()
        .unwrap();

    assert_eq!(lines(&mut child), vec!["Line one", "Second line"]);
}

#[test]
fn status() {
    let mut yes = Launch::new(["true"]).unwrap().spawn().unwrap();
    assert!(yes.wait().unwrap().success());

    let mut no = Launch::new(["false"]).unwrap().spawn().unwrap();
    assert_eq!(no.wait().unwrap(), Exit::Code(1));
    assert_eq!(no.exit(), Some(Exit::Code(1)));
}

#[test]
fn killed_by_a_signal() {
    let mut child = Launch::new(["sh", "-c", "kill -TERM $$"])
        .unwrap()
        .spawn()
        .unwrap();
    assert_eq!(child.wait().unwrap(), Exit::Signal(Signal::SIGTERM));
}

#[test]
fn missing_program_is_a_launch_failure() {
    // hopefully, this command does not exist.
    let err = Launch::new(["qwertyuiopasdfghjklzxcvbnm"])
        .unwrap()
        .capture_stdout()
        .spawn()
        .unwrap_err();

    match err {
        LaunchError::Exec { program, source } => {
            assert_eq!(program, "qwertyuiopasdfghjklzxcvbnm");
            assert_eq!(source.kind(), io::ErrorKind::NotFound);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn not_executable_is_a_launch_failure() {
    let err = Launch::new(["/dev/null"]).unwrap().spawn().unwrap_err();
    assert!(matches!(
        err,
        LaunchError::Exec { source, .. } if source.kind() == io::ErrorKind::PermissionDenied
    ));
}

#[test]
fn empty_command() {
    assert!(matches!(
        Launch::new(Vec::<String>::new()),
        Err(LaunchError::Empty)
    ));
}

#[test]
fn nul_in_argument() {
    assert!(matches!(
        Launch::new(["echo", "a\0b"]),
        Err(LaunchError::Nul(_))
    ));
}

#[test]
fn quiet_stderr() {
    let mut child = Launch::new(["sh", "-c", "echo oops >&2; echo fine"])
        .unwrap()
        .capture_stdout()
        .quiet_stderr()
        .spawn()
        .unwrap();
    assert_eq!(lines(&mut child), vec!["fine"]);
}

#[test]
fn try_wait_then_wait() {
    let mut child = Launch::new(["sh", "-c", "exit 3"]).unwrap().spawn().unwrap();
    let exit = loop {
        if let Some(exit) = child.try_wait().unwrap() {
            break exit;
        }
        std::thread::sleep(std::time::Duration::from_millis(10));
    };
    assert_eq!(exit, Exit::Code(3));
    // a reaped child keeps reporting its status.
    assert_eq!(child.wait().unwrap(), Exit::Code(3));
}

#[test]
fn bounded_wait_on_a_quick_child() {
    let mut child = Launch::new(["true"]).unwrap().spawn().unwrap();
    assert_eq!(child.wait_timeout(5).unwrap(), Some(Exit::Code(0)));
}

#[test]
fn display() {
    assert_eq!(Exit::Code(2).to_string(), "exit(2)");
    assert_eq!(Exit::Signal(Signal::SIGKILL).to_string(), "kill(SIGKILL)");
}

#[test]
fn detached_child_is_left_unreaped() {
    let child = Launch::new(["sh", "-c", "exit 4"]).unwrap().spawn().unwrap();
    let pid = child.detach();
    assert_eq!(waitpid(pid, None).unwrap(), WaitStatus::Exited(pid, 4));
}

#[test]
fn wait_outlasts_interrupting_signals() {
    extern "C" fn ignore(_: libc::c_int) {}
    let action = SigAction::new(SigHandler::Handler(ignore), SaFlags::empty(), SigSet::empty());
    // SAFETY: the handler does nothing.
    unsafe { signal::sigaction(Signal::SIGUSR2, &action) }.unwrap();

    let mut child = Launch::new(["sh", "-c", "sleep 0.5; exit 4"])
        .unwrap()
        .spawn()
        .unwrap();
    let waiter = nix::sys::pthread::pthread_self();
    let interrupter = std::thread::spawn(move || {
        for _ in 0..3 {
            std::thread::sleep(std::time::Duration::from_millis(100));
            nix::sys::pthread::pthread_kill(waiter, Signal::SIGUSR2).unwrap();
        }
    });

    assert_eq!(child.wait().unwrap(), Exit::Code(4));
    interrupter.join().unwrap();
}
