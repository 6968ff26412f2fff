// Copyright 2024-2026 tfw-harness Contributors
// SPDX-License-Identifier: Apache-2.0

//! Console progress for the test suite.
//!
//! One line per test: the start banner is written without a newline, and the
//! verdict completes it. Names are padded to a fixed column so the verdicts
//! line up. Rendering never feeds back into the protocol; write failures
//! are logged and otherwise ignored.

use std::fmt;
use std::io::{self, IsTerminal, Stdout, Write};
use std::time::Duration;

use unicode_width::UnicodeWidthStr;

use crate::link::{TestName, MAX_NAME_LEN};
use crate::session::RunTally;

/// ANSI color codes for terminal output
pub mod colors {
    pub const RESET: &str = "\x1b[0m";
    pub const RED: &str = "\x1b[31m";
    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
}

pub const ELLIPSIS: &str = "...";

/// Width reserved for a name plus its trailing ellipsis.
pub const NAME_COLUMN_WIDTH: usize = MAX_NAME_LEN + ELLIPSIS.len();

/// Format an elapsed duration for the verdict column.
///
/// Under one second: whole milliseconds. Otherwise seconds with one decimal,
/// after rounding to the nearest 10 ms.
pub fn format_elapsed(elapsed: Duration) -> String {
    let ms = elapsed.as_millis();
    if ms < 1000 {
        return format!("{} ms", ms);
    }
    let centis = (ms + 5) / 10;
    let tenths = (centis + 5) / 10;
    format!("{}.{} s", tenths / 10, tenths % 10)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tone {
    Neutral,
    Green,
    Red,
    Yellow,
}

impl Tone {
    fn code(self) -> &'static str {
        match self {
            Tone::Neutral => "",
            Tone::Green => colors::GREEN,
            Tone::Red => colors::RED,
            Tone::Yellow => colors::YELLOW,
        }
    }
}

pub struct Reporter<W: Write = Stdout> {
    out: W,
    color: bool,
}

impl Reporter<Stdout> {
    /// Reporter on stdout, colored when stdout is a terminal.
    pub fn stdout() -> Self {
        let out = io::stdout();
        let color = out.is_terminal();
        Self::new(out, color)
    }
}

impl<W: Write> Reporter<W> {
    pub fn new(out: W, color: bool) -> Self {
        Self { out, color }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn test_started(&mut self, name: &TestName) {
        // Pad by rendered width; lossy decoding can change the byte count.
        let shown = name.to_string();
        let pad = NAME_COLUMN_WIDTH.saturating_sub(shown.width());
        self.emit(
            Tone::Neutral,
            format_args!("Starting test '{}'{:<pad$} ", shown, ELLIPSIS, pad = pad),
            false,
        );
    }

    pub fn test_passed(&mut self, elapsed: Duration) {
        self.emit(
            Tone::Green,
            format_args!("passed ({})", format_elapsed(elapsed)),
            true,
        );
    }

    pub fn test_failed(&mut self, elapsed: Duration) {
        self.emit(
            Tone::Red,
            format_args!("failed ({})", format_elapsed(elapsed)),
            true,
        );
    }

    pub fn test_skipped(&mut self) {
        self.emit(Tone::Yellow, format_args!("skipped (nightly only)"), true);
    }

    pub fn suite_completed(&mut self, tally: RunTally) {
        self.emit(Tone::Neutral, format_args!(""), true);
        self.emit(
            Tone::Neutral,
            format_args!("All test cases are completed!"),
            true,
        );
        self.summary(tally);
    }

    pub fn suite_aborted(&mut self, tally: RunTally) {
        self.emit(Tone::Neutral, format_args!(""), true);
        self.emit(
            Tone::Red,
            format_args!("Stopping after first failure (--stop-on-error)"),
            true,
        );
        self.summary(tally);
    }

    fn summary(&mut self, tally: RunTally) {
        let tone = if tally.failed > 0 { Tone::Red } else { Tone::Green };
        self.emit(
            tone,
            format_args!(
                "{} passed, {} failed, {} skipped ({} total)",
                tally.passed,
                tally.failed,
                tally.skipped,
                tally.total()
            ),
            true,
        );
    }

    fn emit(&mut self, tone: Tone, text: fmt::Arguments<'_>, end_line: bool) {
        let result = self.write_colored(tone, text, end_line);
        if let Err(e) = result {
            tracing::debug!(error = %e, "console write failed");
        }
    }

    fn write_colored(
        &mut self,
        tone: Tone,
        text: fmt::Arguments<'_>,
        end_line: bool,
    ) -> io::Result<()> {
        let colored = self.color && tone != Tone::Neutral;
        if colored {
            self.out.write_all(tone.code().as_bytes())?;
        }
        self.out.write_fmt(text)?;
        if colored {
            self.out.write_all(colors::RESET.as_bytes())?;
        }
        if end_line {
            self.out.write_all(b"\n")?;
        }
        self.out.flush()
    }
}
