//! the set of processes being monitored.

use {
    crate::{
        counters::IoCounters,
        registry::FileRegistry,
        sampler::Sampler,
        time::Timestamp,
    },
    nix::unistd::Pid,
    tracing::{debug, info},
};


/// builds the sampler of a newly tracked process.
pub type Factory = Box<dyn Fn(Pid) -> Box<dyn Sampler>>;

/// how the set of tracked processes evolves.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Policy {
    /// start tracking the children of tracked processes as they appear.
    pub follow_children: bool,
    /// stop tracking a process after more than this many consecutive failed i/o samples.
    pub retire_after: Option<u32>,
    /// forget files that went unseen for more than this many consecutive samples.
    pub evict_after: Option<u32>,
}

/// one monitored process.
pub struct Tracked {
    sampler: Box<dyn Sampler>,
    files: FileRegistry,
    counters: IoCounters,
}

/// the monitored processes, in the order they were added.
pub struct ProcessSet {
    processes: Vec<Tracked>,
    factory: Factory,
    policy: Policy,
}

// === impl Tracked ===

impl Tracked {
    fn new(sampler: Box<dyn Sampler>) -> Self {
        Self {
            sampler,
            files: FileRegistry::new(),
            counters: IoCounters::new(),
        }
    }

    pub fn pid(&self) -> Pid {
        self.sampler.pid()
    }

    pub fn label(&self) -> &str {
        self.sampler.label()
    }

    pub fn files(&self) -> &FileRegistry {
        &self.files
    }

    pub fn counters(&self) -> &IoCounters {
        &self.counters
    }

    /// samples this process once. returns whether either of its samples succeeded.
    fn sample(&mut self, now: Timestamp, evict_after: Option<u32>) -> bool {
        let Self {
            sampler,
            files,
            counters,
        } = self;
        let pid = sampler.pid();

        let io = sampler.refresh_io(counters, now);
        if !io {
            debug!(%pid, failures = counters.failures(), "failed to sample i/o counters");
        }

        let listed = match sampler.refresh_files(files, now) {
            Ok(_) => {
                let evicted = files.sweep(evict_after);
                if evicted > 0 {
                    debug!(%pid, evicted, "forgot closed files");
                }
                true
            }
            Err(error) => {
                debug!(%pid, %error, "failed to sample open files");
                false
            }
        };

        io || listed
    }
}

// === impl ProcessSet ===

impl ProcessSet {
    pub fn new(factory: impl Fn(Pid) -> Box<dyn Sampler> + 'static, policy: Policy) -> Self {
        Self {
            processes: Vec::new(),
            factory: Box::new(factory),
            policy,
        }
    }

    /// starts tracking `pid`. returns `false` if it already was.
    pub fn track(&mut self, pid: Pid) -> bool {
        if self.contains(pid) {
            return false;
        }

        let sampler = (self.factory)(pid);
        info!(%pid, label = sampler.label(), "tracking process");
        self.processes.push(Tracked::new(sampler));
        true
    }

    /// stops tracking `pid`. returns `false` if it was not tracked.
    pub fn untrack(&mut self, pid: Pid) -> bool {
        let before = self.processes.len();
        self.processes.retain(|p| p.pid() != pid);
        before != self.processes.len()
    }

    pub fn policy(&self) -> Policy {
        self.policy
    }

    pub fn contains(&self, pid: Pid) -> bool {
        self.processes.iter().any(|p| p.pid() == pid)
    }

    pub fn len(&self) -> usize {
        self.processes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tracked> {
        self.processes.iter()
    }

    /// runs one sampling cycle over every tracked process.
    ///
    /// children are discovered after sampling, and their i/o baselines are seeded right away so
    /// that their rates are available on the next cycle. processes whose failure streak exceeds
    /// the retirement threshold are dropped last. returns whether any process made progress.
    pub fn sample(&mut self, now: Timestamp) -> bool {
        let Policy {
            follow_children,
            retire_after,
            evict_after,
        } = self.policy;

        let mut progress = false;
        for process in self.processes.iter_mut() {
            progress |= process.sample(now, evict_after);
        }

        if follow_children {
            self.follow(now);
        }

        if let Some(limit) = retire_after {
            self.processes.retain(|p| {
                let failures = p.counters.failures();
                let retire = failures > limit;
                if retire {
                    info!(pid = %p.pid(), failures, "retiring process");
                }
                !retire
            });
        }

        progress
    }

    fn follow(&mut self, now: Timestamp) {
        let mut discovered = Vec::new();
        for process in &self.processes {
            match process.sampler.children() {
                Ok(children) => discovered.extend(children),
                Err(error) => debug!(pid = %process.pid(), %error, "failed to list children"),
            }
        }

        for child in discovered {
            if !self.track(child) {
                continue;
            }
            if let Some(Tracked {
                sampler, counters, ..
            }) = self.processes.last_mut()
            {
                sampler.refresh_io(counters, now);
            }
        }
    }
}

impl<'a> IntoIterator for &'a ProcessSet {
    type Item = &'a Tracked;
    type IntoIter = std::slice::Iter<'a, Tracked>;
    fn into_iter(self) -> Self::IntoIter {
        self.processes.iter()
    }
}
