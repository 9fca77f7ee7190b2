//! builds the frame printed on each sampling cycle.
//!
//! a file line reads `offset/size:speed/s:eta:avg_eta  [label:]name`. the eta is estimated from
//! the instantaneous speed, the avg_eta from the speed averaged since tracking began.

use {
    crate::{
        counters::{IoCounters, Throughput, Traffic},
        format::{self, UNKNOWN},
        registry::FileRecord,
        tracker::{ProcessSet, Tracked},
        tty::{Session, TtyWriter},
    },
    crossterm::{
        Command, QueueableCommand,
        style::{Attribute, Color, ResetColor, SetAttribute, SetForegroundColor},
    },
    std::io::{self, Write},
};


/// the columns taken by everything before the file name.
pub const HEADER_WIDTH: usize = 6 // offset
    + 1 // slash
    + 6 // size
    + 1 // colon
    + 8 // speed
    + 1 // colon
    + 6 // eta
    + 1 // colon
    + 6 // avg_eta
    + 2; // spaces

const READ: Color = Color::Green;
const WRITE: Color = Color::Yellow;

/// printed in place of the file list when no file is open.
pub const NO_FILES: &str = " --- No regular file open ---";

/// what to show, and how.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Options {
    /// color reads, writes, stale files, and headers.
    pub color: bool,
    /// show the i/o counters of each process instead of its files.
    pub io: bool,
}

/// prints one frame over the previous one.
pub fn frame<W: Write>(
    tty: &mut TtyWriter<W>,
    set: &ProcessSet,
    options: Options,
) -> io::Result<()> {
    let name_width = usize::from(tty.width()).saturating_sub(HEADER_WIDTH);
    let mut session = tty.session()?;
    let many = set.len() > 1;

    let mut files = 0;
    for process in set {
        if options.io || many {
            header(&mut session, process, options)?;
        }

        if options.io {
            counters(&mut session, process.counters(), options)?;
            continue;
        }

        let prefix = if many {
            format!("{}:", process.label())
        } else {
            String::new()
        };
        for file in process.files() {
            session.line(|out| file_line(out, file, &prefix, name_width, options))?;
            files += 1;
        }
    }

    if !options.io && files == 0 {
        session.line(|out| out.write_all(NO_FILES.as_bytes()))?;
    }

    session.finish()
}

/// queues `command` only when colors are enabled.
fn style(out: &mut impl Write, options: Options, command: impl Command) -> io::Result<()> {
    if options.color {
        out.queue(command)?;
    }
    Ok(())
}

/// `label (pid)  r: speed/s (avg/s)  w: speed/s (avg/s)`, from the logical i/o counters.
fn header<W: Write>(
    session: &mut Session<'_, W>,
    process: &Tracked,
    options: Options,
) -> io::Result<()> {
    let rates = process.counters().rates();
    let speed = rates.map(|r| r.speed.chars);
    let average = rates.map(|r| r.average.chars);

    session.line(|out| {
        style(out, options, SetAttribute(Attribute::Bold))?;
        write!(out, "{} ({})", process.label(), process.pid())?;
        style(out, options, SetAttribute(Attribute::NormalIntensity))?;

        let read = |t: Option<Throughput>| t.map(|t| t.read);
        let write = |t: Option<Throughput>| t.map(|t| t.write);
        direction(out, options, READ, 'r', read(speed), read(average))?;
        direction(out, options, WRITE, 'w', write(speed), write(average))
    })
}

fn direction(
    out: &mut impl Write,
    options: Options,
    color: Color,
    tag: char,
    speed: Option<f64>,
    average: Option<f64>,
) -> io::Result<()> {
    let rate = |r: Option<f64>| match r {
        Some(r) => format::numeric_field(r),
        None => UNKNOWN.to_owned(),
    };

    write!(out, "  ")?;
    style(out, options, SetForegroundColor(color))?;
    write!(out, "{tag}:{}/s ({}/s)", rate(speed), rate(average))?;
    style(out, options, ResetColor)
}

/// one line per accounting layer: `name r total speed/s:avg/s  w total speed/s:avg/s`.
fn counters<W: Write>(
    session: &mut Session<'_, W>,
    counters: &IoCounters,
    options: Options,
) -> io::Result<()> {
    let Some(current) = counters.current() else {
        return session.line(|out| write!(out, "  {}", UNKNOWN));
    };
    let rates = counters.rates();
    let speed = rates.map(|r| r.speed.map(Some)).unwrap_or_default();
    let average = rates.map(|r| r.average.map(Some)).unwrap_or_default();

    let layers = current.zip(speed.zip(average)).named();
    for (name, (Traffic { read, write }, (speed, average))) in layers {
        session.line(|out| {
            write!(out, "  {name}")?;
            let total = |value: u64| format::numeric_field(value as f64);
            for (color, tag, value, speed, average) in [
                (READ, 'r', read, speed.map(|t| t.read), average.map(|t| t.read)),
                (WRITE, 'w', write, speed.map(|t| t.write), average.map(|t| t.write)),
            ] {
                write!(out, "  {}", total(value))?;
                direction(out, options, color, tag, speed, average)?;
            }
            Ok(())
        })?;
    }

    Ok(())
}

fn file_line(
    out: &mut impl Write,
    file: &FileRecord,
    prefix: &str,
    name_width: usize,
    options: Options,
) -> io::Result<()> {
    let FileRecord {
        name,
        offset,
        size,
        writable,
        speed,
        average,
        seen,
        ..
    } = file;

    let size = if *writable {
        UNKNOWN.to_owned()
    } else {
        format::numeric_field(*size as f64)
    };
    style(out, options, SetForegroundColor(if *writable { WRITE } else { READ }))?;
    write!(
        out,
        "{}/{}:{}/s:{}:{}",
        format::numeric_field(*offset as f64),
        size,
        format::numeric_field(*speed),
        format::eta(*writable, file.size, *offset, *speed),
        format::eta(*writable, file.size, *offset, *average),
    )?;
    style(out, options, ResetColor)?;

    write!(out, "  ")?;
    if !seen {
        style(out, options, SetAttribute(Attribute::Reverse))?;
    }
    let label = format!("{prefix}{name}");
    write!(out, "{}", format::shorten(&label, name_width))?;
    if !seen {
        style(out, options, SetAttribute(Attribute::NoReverse))?;
    }

    Ok(())
}
