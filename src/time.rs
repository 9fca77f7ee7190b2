//! high-resolution timestamps and the clocks that produce them.

use {
    nix::{
        sys::time::TimeSpec,
        time::{ClockId, ClockNanosleepFlags, clock_gettime, clock_nanosleep},
    },
    std::{
        cell::RefCell,
        collections::VecDeque,
        ops::{Add, AddAssign, Sub},
    },
};

pub use self::clock::*;


const NANOS_PER_SEC: i64 = 1_000_000_000;

/// a point on the monotonic clock, or the signed span between two such points.
///
/// `nanos` is kept normalized to `0..1_000_000_000`, so the derived ordering (seconds first,
/// then nanoseconds) is the chronological one, negative spans included.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Timestamp {
    secs: i64,
    nanos: u32,
}

// === impl Timestamp ===

impl Timestamp {
    pub const ZERO: Self = Self { secs: 0, nanos: 0 };

    /// creates a timestamp, carrying any nanosecond overflow (or underflow) into the seconds.
    pub const fn new(secs: i64, nanos: i64) -> Self {
        let secs = secs + nanos.div_euclid(NANOS_PER_SEC);
        let nanos = nanos.rem_euclid(NANOS_PER_SEC) as u32;
        Self { secs, nanos }
    }

    /// converts a fractional number of seconds, rounding to the nearest nanosecond.
    pub fn from_secs_f64(secs: f64) -> Self {
        let total = (secs * NANOS_PER_SEC as f64).round() as i64;
        Self::new(0, total)
    }

    pub const fn secs(&self) -> i64 {
        self.secs
    }

    pub const fn subsec_nanos(&self) -> u32 {
        self.nanos
    }

    pub fn as_secs_f64(&self) -> f64 {
        let Self { secs, nanos } = *self;
        secs as f64 + f64::from(nanos) / NANOS_PER_SEC as f64
    }

    pub fn is_positive(&self) -> bool {
        *self > Self::ZERO
    }
}

impl Add for Timestamp {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        let (Self { secs: ls, nanos: ln }, Self { secs: rs, nanos: rn }) = (self, rhs);
        Self::new(ls + rs, i64::from(ln) + i64::from(rn))
    }
}

impl AddAssign for Timestamp {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sub for Timestamp {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        let (Self { secs: ls, nanos: ln }, Self { secs: rs, nanos: rn }) = (self, rhs);
        Self::new(ls - rs, i64::from(ln) - i64::from(rn))
    }
}

impl From<TimeSpec> for Timestamp {
    fn from(spec: TimeSpec) -> Self {
        Self::new(spec.tv_sec() as i64, spec.tv_nsec() as i64)
    }
}

impl From<Timestamp> for TimeSpec {
    fn from(Timestamp { secs, nanos }: Timestamp) -> Self {
        TimeSpec::new(secs as _, nanos as _)
    }
}

mod clock {
    use super::*;

    /// a source of timestamps, and a way to wait for one.
    pub trait Clock {
        fn now(&self) -> Timestamp;

        /// blocks until `deadline`, or until a signal interrupts the wait.
        fn sleep_until(&self, deadline: Timestamp);
    }

    /// the system's monotonic clock.
    #[derive(Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> Timestamp {
            // the monotonic clock cannot fail on linux; fall back to the epoch regardless.
            clock_gettime(ClockId::CLOCK_MONOTONIC)
                .map(Timestamp::from)
                .unwrap_or_default()
        }

        fn sleep_until(&self, deadline: Timestamp) {
            // an interrupted sleep is how signals wake the poll loop, so errors are expected.
            let _ = clock_nanosleep(
                ClockId::CLOCK_MONOTONIC,
                ClockNanosleepFlags::TIMER_ABSTIME,
                &TimeSpec::from(deadline),
            );
        }
    }

    /// a mock clock, handing out preset times and recording requested deadlines.
    #[derive(Default)]
    #[allow(dead_code, reason = "this is a testing utility.")]
    pub struct MockClock {
        times: RefCell<VecDeque<Timestamp>>,
        sleeps: RefCell<Vec<Timestamp>>,
    }

    #[allow(dead_code, reason = "this is a testing utility.")]
    impl MockClock {
        pub fn new(times: impl IntoIterator<Item = Timestamp>) -> Self {
            Self {
                times: RefCell::new(times.into_iter().collect()),
                sleeps: RefCell::default(),
            }
        }

        /// the deadlines passed to [`Clock::sleep_until`], in order.
        pub fn sleeps(&self) -> Vec<Timestamp> {
            self.sleeps.borrow().clone()
        }
    }

    impl Clock for MockClock {
        fn now(&self) -> Timestamp {
            let MockClock { times, .. } = self;

            times
                .borrow_mut()
                .pop_front()
                .expect("mock times should not be empty")
        }

        fn sleep_until(&self, deadline: Timestamp) {
            self.sleeps.borrow_mut().push(deadline);
        }
    }
}
