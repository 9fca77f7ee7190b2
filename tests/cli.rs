use {
    assert_cmd::{Command, cargo::cargo_bin},
    nix::{
        sys::signal::{Signal, kill},
        unistd::Pid,
    },
    predicates::prelude::*,
    std::{
        fs,
        os::unix::process::ExitStatusExt,
        process::{self, Stdio},
        thread,
        time::{Duration, Instant},
    },
};

fn pvof() -> Command {
    Command::cargo_bin("pvof").unwrap()
}

/// starts pvof in the background, then sends it `signal` once it is up.
fn signaled(args: &[&str], stdout: Stdio, stderr: Stdio, signal: Signal) -> process::Child {
    let child = process::Command::new(cargo_bin("pvof"))
        .args(args)
        .stdin(Stdio::null())
        .stdout(stdout)
        .stderr(stderr)
        .spawn()
        .unwrap();
    thread::sleep(Duration::from_millis(300));
    kill(Pid::from_raw(child.id() as i32), signal).unwrap();
    child
}

#[test]
fn a_target_is_required() {
    pvof()
        .assert()
        .code(2)
        .stderr(predicate::str::contains("a process id or a command to run is required"));
}

#[test]
fn invalid_arguments_are_usage_errors() {
    pvof().args(["-p", "0"]).assert().code(2);
    pvof().args(["-p", "1", "-s", "0"]).assert().code(2);
    pvof().args(["-p", "1", "--lsof", "--force"]).assert().code(2);
    pvof().args(["--frobnicate"]).assert().code(2);
}

#[test]
fn missing_command_is_fatal() {
    pvof()
        .args(["--fd", "1", "--", "qwertyuiopasdfghjklzxcvbnm"])
        .assert()
        .code(1)
        .stderr(predicate::str::starts_with(
            "pvof: failed to start `qwertyuiopasdfghjklzxcvbnm`",
        ));
}

#[test]
fn exit_code_is_mirrored() {
    pvof()
        .args(["--fd", "1", "-s", "0.1", "--", "sh", "-c", "exit 3"])
        .assert()
        .code(3);
}

#[test]
fn killing_signal_is_mirrored() {
    let output = pvof()
        .args(["--fd", "1", "-s", "0.1", "--", "sh", "-c", "kill -TERM $$"])
        .output()
        .unwrap();
    assert_eq!(output.status.signal(), Some(libc::SIGTERM));
}

#[test]
fn without_a_terminal_the_command_still_runs() {
    // standard streams are pipes here, so there is nothing to display on.
    pvof()
        .args(["--", "sh", "-c", "echo ran; exit 5"])
        .assert()
        .code(5)
        .stdout("ran\n")
        .stderr(predicate::str::contains("pvof: no terminal to display on"));
}

#[test]
fn without_a_terminal_monitoring_alone_fails() {
    let pid = std::process::id().to_string();
    pvof()
        .args(["-p", &pid])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("pvof: no terminal to display on"));
}

#[test]
fn open_files_are_shown() {
    let manifest = concat!(env!("CARGO_MANIFEST_DIR"), "/Cargo.toml");
    let script = format!("exec 3< '{manifest}'; sleep 1");
    pvof()
        .args(["--fd", "1", "-s", "0.1", "--no-color", "--", "sh", "-c", &script])
        .assert()
        .success()
        .stdout(predicate::str::contains("Cargo.toml"));
}

#[test]
fn without_a_terminal_signals_do_not_end_the_wait() {
    let child = signaled(
        &["--", "sh", "-c", "sleep 1; exit 4"],
        Stdio::piped(),
        Stdio::piped(),
        Signal::SIGUSR1,
    );
    let output = child.wait_with_output().unwrap();
    assert_eq!(output.status.code(), Some(4));
    assert!(!String::from_utf8_lossy(&output.stderr).contains("failed to wait"));
}

#[test]
fn a_command_still_running_after_a_stop_is_left_behind() {
    // the command inherits these streams, so they must not be pipes we read to the end.
    let stderr = tempfile::NamedTempFile::new().unwrap();
    let started = Instant::now();
    let mut child = signaled(
        &["--fd", "1", "-s", "0.1", "--", "sleep", "5"],
        Stdio::null(),
        Stdio::from(stderr.reopen().unwrap()),
        Signal::SIGTERM,
    );

    let status = child.wait().unwrap();
    assert!(started.elapsed() < Duration::from_secs(3), "{:?}", started.elapsed());
    assert!(status.success(), "{status:?}");
    let log = fs::read_to_string(stderr.path()).unwrap();
    assert!(log.contains("the command is still running"), "{log}");
}
