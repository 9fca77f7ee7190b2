//! a scripted sampler, for tests.

use {
    super::{SampleError, Sampler},
    crate::{
        counters::{IoCounters, Layers, Traffic},
        registry::{FileRegistry, Observation},
        time::Timestamp,
    },
    nix::unistd::Pid,
    std::io,
};

/// how a mock process responds to sampling.
#[derive(Clone, Debug)]
pub struct Behavior {
    /// whether its i/o counters can be read.
    pub io: bool,
    /// its open files, or `None` if they cannot be listed.
    pub files: Option<Vec<Observation>>,
    /// how many bytes per second every file advances.
    pub rate: i64,
    /// when the files get closed, in seconds.
    pub closes_at: Option<i64>,
    /// when the process goes away and cannot be sampled anymore, in seconds.
    pub exits_at: Option<i64>,
    pub children: Vec<Pid>,
}

pub struct MockSampler {
    pid: Pid,
    label: String,
    behavior: Behavior,
}

#[allow(dead_code, reason = "this is a testing utility.")]
impl Behavior {
    /// a process that cannot be sampled at all.
    pub fn failing() -> Self {
        Self {
            io: false,
            files: None,
            ..Self::default()
        }
    }

    pub fn with_children(children: impl IntoIterator<Item = i32>) -> Self {
        Self {
            children: children.into_iter().map(Pid::from_raw).collect(),
            ..Self::default()
        }
    }
}

impl Default for Behavior {
    /// a process with one file open.
    fn default() -> Self {
        Self {
            io: true,
            files: Some(vec![Observation {
                fd: 3,
                inode: 1,
                ..Observation::default()
            }]),
            rate: 0,
            closes_at: None,
            exits_at: None,
            children: Vec::new(),
        }
    }
}

impl MockSampler {
    pub fn new(pid: Pid, behavior: Behavior) -> Self {
        Self {
            pid,
            label: format!("mock{pid}"),
            behavior,
        }
    }

    fn alive(&self, now: Timestamp) -> bool {
        self.behavior.exits_at.is_none_or(|at| now.secs() < at)
    }
}

impl Sampler for MockSampler {
    fn pid(&self) -> Pid {
        self.pid
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn refresh_files(
        &mut self,
        files: &mut FileRegistry,
        now: Timestamp,
    ) -> Result<bool, SampleError> {
        files.begin_cycle();
        let Some(observations) = self.behavior.files.as_ref().filter(|_| self.alive(now)) else {
            return Err(SampleError::NoDescriptors { pid: self.pid });
        };

        if self.behavior.closes_at.is_some_and(|at| now.secs() >= at) {
            return Ok(false);
        }

        let mut inserted = false;
        for observation in observations {
            let observation = Observation {
                offset: observation.offset + self.behavior.rate * now.secs(),
                ..observation.clone()
            };
            inserted |= files.observe(observation, now);
        }
        Ok(inserted)
    }

    fn refresh_io(&mut self, counters: &mut IoCounters, now: Timestamp) -> bool {
        let reading = if self.behavior.io && self.alive(now) {
            let bytes = (self.behavior.rate * now.secs()).max(0) as u64;
            Ok(Layers::<Traffic>::default().map(|_| Traffic {
                read: bytes,
                write: bytes / 2,
            }))
        } else {
            Err(())
        };
        counters.record(reading, now)
    }

    fn children(&self) -> io::Result<Vec<Pid>> {
        Ok(self.behavior.children.clone())
    }
}
