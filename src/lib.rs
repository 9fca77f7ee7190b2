//! a live view of the progress of a process's open files.
//!
//! every sampling period, the open descriptors and i/o counters of a set of processes are read,
//! and each file's offset, size, throughput, and estimated time to completion are redrawn in
//! place on the terminal.

/// command-line arguments.
pub mod cli;

/// per-process i/o counters, from `/proc/<pid>/io`.
pub mod counters;

/// fixed-width number, duration, and name formatting.
pub mod format;

/// spawning and reaping a command.
pub mod launch;

/// the sampling loop.
pub mod poll;

/// process names and children.
pub mod process;

/// the files a process has open, and their progress.
pub mod registry;

/// frames.
pub mod render;

/// the strategies used to list a process's open files.
pub mod sampler;

/// signal flags.
pub mod signals;

/// timestamps and clocks.
pub mod time;

/// the set of monitored processes.
pub mod tracker;

/// in-place terminal output.
pub mod tty;
