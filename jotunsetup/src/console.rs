// SPDX-License-Identifier: JOSSL-1.0
// Copyright (C) 2025 The Jotunheim Project
//! User-visible console: teletype output plus keyboard input.
//!
//! Separate from the log sink; this is what the person at the machine sees.

use core::fmt;

/// Seconds the video menu waits for a key before taking the default.
pub const KEY_TIMEOUT_SECS: u32 = 30;

pub trait Console: fmt::Write {
    /// Block until a key arrives; returns its ASCII code.
    fn getchar(&mut self) -> u8;

    /// Wait up to [`KEY_TIMEOUT_SECS`] for a key.
    fn getchar_timeout(&mut self) -> Option<u8>;

    /// Drop any keys typed ahead.
    fn kbd_flush(&mut self);

    fn beep(&mut self) {
        let _ = self.write_char('\x07');
    }
}

/// Status line writer that honours the terse-output option.
pub struct Status<'c, C: Console + ?Sized> {
    con: &'c mut C,
    quiet: bool,
}

impl<'c, C: Console + ?Sized> Status<'c, C> {
    pub fn new(con: &'c mut C, quiet: bool) -> Self {
        Self { con, quiet }
    }
}

impl<C: Console + ?Sized> fmt::Write for Status<'_, C> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        if self.quiet {
            return Ok(());
        }
        self.con.write_str(s)
    }
}
