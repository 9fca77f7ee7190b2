//! process identity: labels and child listings, read from `/proc`.

use {
    nix::unistd::Pid,
    std::{
        fs, io,
        path::{Path, PathBuf},
    },
};


/// the root of the process information pseudo-filesystem.
pub const PROC: &str = "/proc";

/// returns the path of `name` within the `/proc` directory of `pid`.
pub fn proc_path(pid: Pid, name: &str) -> PathBuf {
    Path::new(PROC).join(pid.to_string()).join(name)
}

/// derives a human-readable label for a process.
///
/// this is the basename of the first word of its command line, or its pid when `numeric` is set
/// or when the command line is unavailable (a kernel thread, a zombie, or a vanished process).
pub fn label(pid: Pid, numeric: bool) -> String {
    let fallback = || pid.to_string();
    if numeric {
        return fallback();
    }

    let Ok(cmdline) = fs::read(proc_path(pid, "cmdline")) else {
        return fallback();
    };

    let program = cmdline.split(|b| *b == 0).next().unwrap_or_default();
    let basename = program
        .rsplit(|b| *b == b'/')
        .next()
        .unwrap_or_default();

    if basename.is_empty() {
        fallback()
    } else {
        String::from_utf8_lossy(basename).into_owned()
    }
}

/// lists the direct children of `pid`, across all of its threads.
///
/// NB: `/proc/<pid>/task/<tid>/children` requires a kernel built with `CONFIG_PROC_CHILDREN`.
pub fn children(pid: Pid) -> io::Result<Vec<Pid>> {
    let mut children = Vec::new();

    for task in fs::read_dir(proc_path(pid, "task"))? {
        let path = task?.path().join("children");
        // a thread may exit between listing and reading.
        let Ok(listing) = fs::read_to_string(&path) else {
            continue;
        };
        children.extend(parse_children(&listing));
    }

    Ok(children)
}

/// parses a whitespace-separated `children` listing, ignoring anything that is not a pid.
fn parse_children(listing: &str) -> impl Iterator<Item = Pid> + '_ {
    listing
        .split_whitespace()
        .filter_map(|token| token.parse().ok())
        .map(Pid::from_raw)
}
