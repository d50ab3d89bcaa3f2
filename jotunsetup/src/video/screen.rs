// SPDX-License-Identifier: JOSSL-1.0
// Copyright (C) 2025 The Jotunheim Project
//! Text screen state: cursor and mode queries, snapshot and replay.

use crate::bios::{FarWindow, Firmware, vector};
use crate::bootparams::{ScreenFlags, ScreenInfo};
use crate::heap::ScratchHeap;
use log::debug;

pub const MONO_SEGMENT: u16 = 0xb000;
pub const COLOR_SEGMENT: u16 = 0xb800;

/// Space, light grey on black.
pub const BLANK_CELL: u16 = 0x0720;

/// BIOS data area offsets (segment 0).
pub const BDA_COLUMNS: u16 = 0x44a;
pub const BDA_ROWS_MINUS_ONE: u16 = 0x484;
pub const BDA_FONT_POINTS: u16 = 0x485;

/// Cursor-start register bit that hides the cursor.
const CURSOR_DISABLE: u8 = 0x20;

pub fn text_segment(mode: u8) -> u16 {
    if mode == 0x07 { MONO_SEGMENT } else { COLOR_SEGMENT }
}

pub fn store_cursor_position<F: Firmware + ?Sized>(fw: &mut F, si: &mut ScreenInfo) {
    let mut ireg = fw.initregs();
    ireg.set_ah(0x03);
    let oreg = fw.intcall(vector::VIDEO, &ireg, None);

    si.orig_x = oreg.dl();
    si.orig_y = oreg.dh();
    if oreg.ch() & CURSOR_DISABLE != 0 || (oreg.ch() & 0x1f) > (oreg.cl() & 0x1f) {
        si.flags |= ScreenFlags::NO_CURSOR.bits();
    }
}

pub fn store_video_mode<F: Firmware + ?Sized>(fw: &mut F, si: &mut ScreenInfo) {
    let mut ireg = fw.initregs();
    ireg.set_ah(0x0f);
    let oreg = fw.intcall(vector::VIDEO, &ireg, None);

    // Some BIOSes leave the "don't clear" bit in AL.
    si.orig_video_mode = oreg.al() & 0x7f;
    si.orig_video_page = oreg.bh() as u16;
}

/// The text screen as it was before the mode change.
pub struct SavedScreen<'a> {
    pub x: u16,
    pub y: u16,
    pub curx: u16,
    pub cury: u16,
    /// Character/attribute pairs, row by row; `None` if the heap was too small.
    pub data: Option<&'a mut [u8]>,
}

/// Snapshot the current screen onto the heap, if it fits.
pub fn save_screen<'a, F: Firmware + ?Sized>(
    fw: &mut F,
    si: &ScreenInfo,
    segment: u16,
    heap: &'a mut ScratchHeap<'_>,
) -> SavedScreen<'a> {
    let x = si.orig_video_cols as u16;
    let y = si.orig_video_lines as u16;
    let mut data = heap.alloc(x as usize * y as usize * 2);
    if let Some(buf) = data.as_deref_mut() {
        FarWindow::new(fw, segment).copy_to_slice(0, buf);
    }
    SavedScreen {
        x,
        y,
        curx: si.orig_x as u16,
        cury: si.orig_y as u16,
        data,
    }
}

/// Replay `saved` onto the current text mode described by `si`, clipping to
/// the smaller geometry and blanking the rest, then put the cursor back.
pub fn restore_screen<F: Firmware + ?Sized>(
    fw: &mut F,
    saved: &SavedScreen<'_>,
    si: &mut ScreenInfo,
    segment: u16,
) {
    let Some(src) = saved.data.as_deref() else {
        return;
    };
    let xs = si.orig_video_cols as u16;
    let ys = si.orig_video_lines as u16;
    let copy = xs.min(saved.x) as usize;
    let row_bytes = saved.x as usize * 2;

    let mut win = FarWindow::new(fw, segment);
    let mut dst = 0u16;
    for row in 0..ys {
        let npad = if row < saved.y {
            let from = row as usize * row_bytes;
            win.copy_from_slice(dst, &src[from..from + copy * 2]);
            dst = dst.wrapping_add((copy * 2) as u16);
            xs.saturating_sub(saved.x)
        } else {
            xs
        };
        dst = win.fill16(dst, npad as usize, BLANK_CELL);
    }

    let curx = saved.curx.min(xs.saturating_sub(1));
    let cury = saved.cury.min(ys.saturating_sub(1));
    debug!(
        "video: restored {}x{} onto {}x{}, cursor {},{}",
        saved.x, saved.y, xs, ys, curx, cury
    );

    let mut ireg = fw.initregs();
    ireg.set_ah(0x02);
    ireg.set_dh(cury as u8);
    ireg.set_dl(curx as u8);
    fw.intcall(vector::VIDEO, &ireg, None);
    store_cursor_position(fw, si);
}
