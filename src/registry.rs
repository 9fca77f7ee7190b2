//! the per-process collection of tracked open files.

use crate::time::Timestamp;


/// one tracked open file.
#[derive(Clone, Debug, PartialEq)]
pub struct FileRecord {
    /// the descriptor number within the owning process.
    pub fd: i32,
    /// the inode of the underlying file.
    pub inode: u64,
    /// the path of the file, filled in lazily. empty until known.
    pub name: String,
    /// the current offset.
    pub offset: i64,
    /// the offset when tracking began.
    pub start_offset: i64,
    /// the size of the file. meaningless for writable files.
    pub size: i64,
    /// whether the descriptor was opened for writing.
    pub writable: bool,
    /// bytes per second between the two most recent samples.
    pub speed: f64,
    /// bytes per second since tracking began.
    pub average: f64,
    /// whether the file was present in the most recent sample.
    pub seen: bool,
    /// how many consecutive sweeps found this file missing.
    pub unseen: u32,
    /// when the file was last updated.
    pub stamp: Timestamp,
    /// when the file was first observed.
    pub start: Timestamp,
}

/// what a sampler learned about one open descriptor during a sample.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Observation {
    pub fd: i32,
    pub inode: u64,
    pub offset: i64,
    pub size: Option<i64>,
    pub name: Option<String>,
    pub writable: bool,
}

/// the open files of one process, in the order they were first observed.
///
/// files are uniquely identified by their `(fd, inode)` pair. a descriptor reused for another
/// file is a new record, and the old record simply stops being seen.
#[derive(Clone, Debug, Default)]
pub struct FileRegistry {
    files: Vec<FileRecord>,
}

// === impl FileRecord ===

impl FileRecord {
    fn new(
        Observation {
            fd,
            inode,
            offset,
            size,
            name,
            writable,
        }: Observation,
        now: Timestamp,
    ) -> Self {
        Self {
            fd,
            inode,
            name: name.unwrap_or_default(),
            offset,
            start_offset: offset,
            size: size.unwrap_or_default(),
            writable,
            speed: 0.0,
            average: 0.0,
            seen: true,
            unseen: 0,
            stamp: now,
            start: now,
        }
    }

    /// folds a new offset into this record, updating its rates.
    fn update(&mut self, offset: i64, now: Timestamp) {
        let elapsed = now - self.stamp;
        if elapsed.is_positive() {
            self.speed = speed(self.offset, offset, elapsed);
        }

        let lifetime = now - self.start;
        if lifetime.is_positive() {
            self.average = speed(self.start_offset, offset, lifetime);
        }

        self.offset = offset;
        self.stamp = now;
        self.seen = true;
    }
}

/// the rate at which an offset moved from `from` to `to` over `elapsed`, in bytes per second.
///
/// `elapsed` must be positive.
pub fn speed(from: i64, to: i64, elapsed: Timestamp) -> f64 {
    debug_assert!(elapsed.is_positive());
    (to - from) as f64 / elapsed.as_secs_f64()
}

// === impl FileRegistry ===

impl FileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FileRecord> {
        self.files.iter()
    }

    pub fn find(&self, fd: i32, inode: u64) -> Option<&FileRecord> {
        self.files.iter().find(|f| f.fd == fd && f.inode == inode)
    }

    pub fn find_mut(&mut self, fd: i32, inode: u64) -> Option<&mut FileRecord> {
        self.files.iter_mut().find(|f| f.fd == fd && f.inode == inode)
    }

    /// marks every file as unseen, ahead of a new sample.
    pub fn begin_cycle(&mut self) {
        self.files.iter_mut().for_each(|f| f.seen = false);
    }

    /// reconciles one observation against the registry.
    ///
    /// a known file has its offset, rates, and timestamp updated in place; an unknown file is
    /// appended. returns `true` if a new record was inserted.
    pub fn observe(&mut self, observation: Observation, now: Timestamp) -> bool {
        let Some(file) = self.find_mut(observation.fd, observation.inode) else {
            self.files.push(FileRecord::new(observation, now));
            return true;
        };

        file.update(observation.offset, now);
        if let Some(size) = observation.size {
            file.size = size;
        }
        if let Some(name) = observation.name {
            file.name = name;
        }

        false
    }

    /// counts how long each file has gone unseen, forgetting files that have been missing for
    /// more than `evict_after` consecutive sweeps. `None` keeps every file forever.
    ///
    /// returns the number of evicted files.
    pub fn sweep(&mut self, evict_after: Option<u32>) -> usize {
        for file in self.files.iter_mut() {
            file.unseen = if file.seen { 0 } else { file.unseen + 1 };
        }

        let Some(limit) = evict_after else {
            return 0;
        };

        let before = self.files.len();
        self.files.retain(|f| f.unseen <= limit);
        before - self.files.len()
    }
}

impl<'a> IntoIterator for &'a FileRegistry {
    type Item = &'a FileRecord;
    type IntoIter = std::slice::Iter<'a, FileRecord>;
    fn into_iter(self) -> Self::IntoIter {
        self.files.iter()
    }
}
