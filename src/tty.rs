//! repaints a block of lines in place.
//!
//! each sampling cycle opens a [`Session`] that moves the cursor back to the top of the block
//! printed by the previous one, then overwrites it line by line. a block that grew scrolls the
//! terminal through plain newlines; rows left over from a taller block are blanked.

use {
    crate::signals,
    crossterm::{
        QueueableCommand, cursor,
        style::{Attribute, SetAttribute},
        terminal::{self, Clear, ClearType},
    },
    std::io::{self, Write},
};


/// the width assumed when the terminal cannot tell.
pub const DEFAULT_WIDTH: u16 = 80;

/// where the window width comes from.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum WidthSource {
    /// ask the terminal, again after each `SIGWINCH`.
    Terminal,
    /// always use this width.
    Fixed(u16),
}

/// writes sessions of lines over themselves.
pub struct TtyWriter<W: Write> {
    out: W,
    source: WidthSource,
    /// the cached window width.
    width: Option<u16>,
    /// the number of rows printed by the previous session.
    rows: usize,
    /// whether any session has been started.
    printed: bool,
}

/// one repaint of the block.
///
/// the number of lines started is recorded when this is dropped, even if writing failed midway,
/// so the next session moves the cursor up by the right amount.
pub struct Session<'a, W: Write> {
    writer: &'a mut TtyWriter<W>,
    lines: usize,
}

// === impl TtyWriter ===

impl<W: Write> TtyWriter<W> {
    pub fn new(out: W, source: WidthSource) -> Self {
        Self {
            out,
            source,
            width: None,
            rows: 0,
            printed: false,
        }
    }

    /// the width of the window, in columns.
    pub fn width(&mut self) -> u16 {
        if let WidthSource::Fixed(width) = self.source {
            return width;
        }
        let cached = if signals::take_resize() { None } else { self.width };

        *self.width.insert(cached.unwrap_or_else(|| {
            terminal::size()
                .map(|(cols, _)| cols)
                .ok()
                .filter(|cols| *cols > 0)
                .unwrap_or(DEFAULT_WIDTH)
        }))
    }

    /// starts a repaint, moving the cursor to the start of the previous block.
    pub fn session(&mut self) -> io::Result<Session<'_, W>> {
        self.printed = true;
        if self.rows > 1 {
            self.out.queue(cursor::MoveUp(rows_u16(self.rows - 1)))?;
        }
        self.out.queue(cursor::MoveToColumn(0))?;

        Ok(Session {
            writer: self,
            lines: 0,
        })
    }

    /// resets attributes and leaves the cursor below the block.
    pub fn close(&mut self) -> io::Result<()> {
        self.out.queue(SetAttribute(Attribute::Reset))?;
        if self.printed {
            self.out.write_all(b"\n")?;
        }
        self.printed = false;
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

fn rows_u16(rows: usize) -> u16 {
    u16::try_from(rows).unwrap_or(u16::MAX)
}

// === impl Session ===

impl<W: Write> Session<'_, W> {
    /// prints one line. `print` writes its contents; the rest of the row is cleared afterwards.
    pub fn line(&mut self, print: impl FnOnce(&mut W) -> io::Result<()>) -> io::Result<()> {
        let out = &mut self.writer.out;
        if self.lines > 0 {
            out.write_all(b"\n")?;
        }
        self.lines += 1;

        print(out)?;
        out.queue(Clear(ClearType::UntilNewLine))?
            .queue(SetAttribute(Attribute::Reset))
            .map(drop)
    }

    /// the number of lines started so far.
    pub fn lines(&self) -> usize {
        self.lines
    }

    /// blanks the rows left over from a taller previous block, then flushes.
    pub fn finish(self) -> io::Result<()> {
        let previous = self.writer.rows;
        let out = &mut self.writer.out;

        for row in self.lines..previous {
            if row > 0 {
                out.write_all(b"\n")?;
            }
            out.queue(Clear(ClearType::UntilNewLine))?;
        }
        // return to the last line printed.
        let blanked = previous.saturating_sub(self.lines.max(1));
        if blanked > 0 {
            out.queue(cursor::MoveUp(rows_u16(blanked)))?;
        }

        out.queue(SetAttribute(Attribute::Reset))?;
        out.flush()
    }
}

impl<W: Write> Drop for Session<'_, W> {
    fn drop(&mut self) {
        self.writer.rows = self.lines;
    }
}
