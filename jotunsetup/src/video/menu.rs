// SPDX-License-Identifier: JOSSL-1.0
// Copyright (C) 2025 The Jotunheim Project
//! Interactive mode menu.

use super::{VIDEO_CURRENT_MODE, VideoManager};
use crate::bios::Firmware;
use crate::bootparams::ScreenInfo;
use crate::console::Console;
use core::fmt::Write;
use heapless::{String, Vec};

/// At this many modes the table switches to three columns.
const THREE_COLUMN_THRESHOLD: usize = 20;

const MAX_ENTRY: usize = 4;

const BACKSPACE: u8 = 0x08;

/// What the user typed at the mode prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entry {
    /// Nothing typed: keep the current mode.
    Current,
    /// "scan": probe the unsafe adapters and show the menu again.
    Scan,
    Mode(u16),
}

/// Labels run `0`-`9`, `a`-`z`, then stay blank.
fn next_label(ch: char) -> char {
    match ch {
        '9' => 'a',
        'z' | ' ' => ' ',
        c => (c as u8 + 1) as char,
    }
}

fn hex_digit(key: u8) -> u32 {
    let key = key | 0x20;
    if key > b'9' {
        (key - b'a' + 10) as u32
    } else {
        (key - b'0') as u32
    }
}

/// Read up to four alphanumerics, editing with backspace, until ENTER.
pub fn get_entry<C: Console + ?Sized>(con: &mut C) -> Entry {
    let mut buf: Vec<u8, MAX_ENTRY> = Vec::new();
    loop {
        match con.getchar() {
            b'\r' => break,
            BACKSPACE => {
                if buf.pop().is_some() {
                    let _ = con.write_str("\x08 \x08");
                }
            }
            key if key.is_ascii_alphanumeric() => {
                if buf.push(key).is_ok() {
                    let _ = con.write_char(key as char);
                }
            }
            _ => {}
        }
    }
    let _ = con.write_char('\n');

    if buf.is_empty() {
        return Entry::Current;
    }
    if buf.eq_ignore_ascii_case(b"scan") {
        return Entry::Scan;
    }
    // Letters past 'f' are accepted and weighted like the wider digits they
    // would be; the result is truncated to 16 bits.
    let v = buf.iter().fold(0u32, |v, &k| (v << 4) + hex_digit(k));
    Entry::Mode(v as u16)
}

impl VideoManager<'_> {
    /// Print the visible modes of every adapter, labelled by menu position.
    pub fn display_menu<C: Console + ?Sized>(&self, con: &mut C) {
        let per_line = if self.mode_count() >= THREE_COLUMN_THRESHOLD { 3 } else { 1 };
        for _ in 0..per_line {
            let _ = con.write_str("Mode: Resolution:  Type: ");
        }
        let _ = con.write_char('\n');

        let mut col = 0;
        let mut label = '0';
        for slot in self.slots.iter() {
            for mi in slot.modes.iter().filter(|m| m.is_visible()) {
                let mut res: String<32> = String::new();
                let _ = if mi.depth != 0 {
                    write!(res, "{}x{}", mi.y, mi.depth)
                } else {
                    write!(res, "{}", mi.y)
                };
                let _ = write!(
                    con,
                    "{} {:03X} {:4}x{:<7} {:<6}",
                    label,
                    mi.id(),
                    mi.x,
                    res.as_str(),
                    slot.card.name()
                );
                col += 1;
                if col >= per_line {
                    let _ = con.write_char('\n');
                    col = 0;
                }
                label = next_label(label);
            }
        }
        if col != 0 {
            let _ = con.write_char('\n');
        }
    }

    /// Offer the menu; returns the mode the user asked for.
    pub fn mode_menu<F, C>(&mut self, fw: &mut F, con: &mut C, screen: &mut ScreenInfo) -> u16
    where
        F: Firmware,
        C: Console + ?Sized,
    {
        let _ = con.write_str(
            "Press <ENTER> to see video modes available, <SPACE> to continue, or wait 30 sec\n",
        );
        con.kbd_flush();
        loop {
            match con.getchar_timeout() {
                None | Some(b' ') | Some(0) => return VIDEO_CURRENT_MODE,
                Some(b'\r') => break,
                Some(_) => con.beep(),
            }
        }

        loop {
            self.display_menu(con);
            let _ = con.write_str("Enter a video mode or \"scan\" to scan for additional modes: ");
            match get_entry(con) {
                Entry::Current => return VIDEO_CURRENT_MODE,
                Entry::Mode(mode) => return mode,
                Entry::Scan => self.probe_cards(fw, screen, true),
            }
        }
    }
}
