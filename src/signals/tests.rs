use {super::*, nix::sys::signal::raise};

#[test]
fn toggle_flips_the_display() {
    install(Signal::SIGUSR1, on_toggle).unwrap();
    let before = paused();
    raise(Signal::SIGUSR1).unwrap();
    assert_ne!(paused(), before);
    raise(Signal::SIGUSR1).unwrap();
    assert_eq!(paused(), before);
}

#[test]
fn alarm_is_consumed() {
    install_alarm().unwrap();
    raise(Signal::SIGALRM).unwrap();
    assert!(take_alarm());
    assert!(!take_alarm());
}
