// SPDX-License-Identifier: JOSSL-1.0
// Copyright (C) 2025 The Jotunheim Project
//! Video mode selection.
//!
//! The manager stores the current text parameters, probes the adapters for
//! their modes, lets the user pick one if asked to, applies it, and replays
//! the old screen contents onto the new mode.

pub mod card;
pub mod menu;
pub mod screen;
pub mod vga;

use crate::bios::{FarWindow, Firmware};
use crate::bootparams::{BootParams, ScreenInfo};
use crate::console::Console;
use crate::heap::ScratchHeap;
use card::{Adapter, CardEnv, ModeInfo, ModeList, ModeSet, VideoCard};
use core::fmt;
use heapless::Vec as HVec;
use log::{debug, info, warn};

pub const VIDEO_FIRST_MENU: u16 = 0x0000;
pub const VIDEO_FIRST_BIOS: u16 = 0x0100;
pub const VIDEO_FIRST_VESA: u16 = 0x0200;
pub const VIDEO_FIRST_SPECIAL: u16 = 0x0f00;
pub const VIDEO_80X25: u16 = 0x0f00;
pub const VIDEO_8POINT: u16 = 0x0f01;
pub const VIDEO_80X43: u16 = 0x0f02;
pub const VIDEO_80X28: u16 = 0x0f03;
pub const VIDEO_CURRENT_MODE: u16 = 0x0f04;
/// Recalculate vertical timings; stripped before lookup.
pub const VIDEO_RECALC: u16 = 0x8000;

/// `vid_mode` aliases a loader may pass.
pub const NORMAL_VGA: u16 = 0xffff;
pub const EXTENDED_VGA: u16 = 0xfffe;
pub const ASK_VGA: u16 = 0xfffd;

/// Adapters the manager can hold.
pub const MAX_CARDS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoError {
    UndefinedMode(u16),
    /// The firmware did not switch to the basic text mode we asked for.
    ModeRejected { wanted: u8, got: u8 },
}

impl fmt::Display for VideoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VideoError::UndefinedMode(m) => write!(f, "undefined video mode {m:#x}"),
            VideoError::ModeRejected { wanted, got } => {
                write!(f, "BIOS refused mode {wanted:#04x} (still {got:#04x})")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoPhase {
    Uninitialized,
    ParametersStored,
    CardsProbed,
    ModeSelected,
    ModeSet,
    ScreenRestored,
}

/// Parameters carried between the steps of `set_video`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoState {
    pub adapter: Adapter,
    /// Geometry reported in place of the BIOS data area; zero means "ask the BIOS".
    pub force: (u16, u16),
    pub do_restore: bool,
    pub graphic: bool,
    /// Text buffer segment.
    pub segment: u16,
}

impl Default for VideoState {
    fn default() -> Self {
        Self {
            adapter: Adapter::Cga,
            force: (0, 0),
            do_restore: false,
            graphic: false,
            segment: screen::COLOR_SEGMENT,
        }
    }
}

pub(crate) struct CardSlot<'c> {
    pub(crate) card: &'c mut dyn VideoCard,
    pub(crate) modes: ModeList,
}

pub struct VideoManager<'c> {
    slots: HVec<CardSlot<'c>, MAX_CARDS>,
    probed: [bool; 2],
    state: VideoState,
    phase: VideoPhase,
}

impl<'c> VideoManager<'c> {
    /// Adapters are probed and searched in the order given.
    pub fn new<I>(cards: I) -> Self
    where
        I: IntoIterator<Item = &'c mut dyn VideoCard>,
    {
        let mut slots = HVec::new();
        for card in cards {
            let stored = slots
                .push(CardSlot {
                    card,
                    modes: ModeList::new(),
                })
                .is_ok();
            if !stored {
                warn!("video: more than {MAX_CARDS} adapters, ignoring the rest");
                break;
            }
        }
        Self {
            slots,
            probed: [false; 2],
            state: VideoState::default(),
            phase: VideoPhase::Uninitialized,
        }
    }

    pub fn phase(&self) -> VideoPhase {
        self.phase
    }

    pub fn state(&self) -> &VideoState {
        &self.state
    }

    fn advance(&mut self, next: VideoPhase) {
        debug!("video: {:?} -> {:?}", self.phase, next);
        self.phase = next;
    }

    /// Modes of every adapter, hidden ones included.
    pub fn mode_count(&self) -> usize {
        self.slots.iter().map(|s| s.modes.len()).sum()
    }

    /// Probe the safe (`unsafe_ == false`) or the unsafe adapters, at most once each.
    pub fn probe_cards<F: Firmware>(&mut self, fw: &mut F, screen: &mut ScreenInfo, unsafe_: bool) {
        let pass = unsafe_ as usize;
        if self.probed[pass] {
            return;
        }
        self.probed[pass] = true;

        for slot in self.slots.iter_mut() {
            if slot.card.is_unsafe() != unsafe_ {
                continue;
            }
            let mut env = CardEnv {
                screen: &mut *screen,
                adapter: &mut self.state.adapter,
            };
            slot.modes = slot.card.probe(fw, &mut env);
            debug!("video: {} offers {} modes", slot.card.name(), slot.modes.len());
        }
    }

    /// Record cursor, mode and geometry of the current text mode.
    pub fn store_mode_params<F: Firmware>(&mut self, fw: &mut F, si: &mut ScreenInfo) {
        // A graphic mode's driver fills these itself.
        if self.state.graphic {
            return;
        }
        screen::store_cursor_position(fw, si);
        screen::store_video_mode(fw, si);
        self.state.segment = screen::text_segment(si.orig_video_mode);

        let mut bda = FarWindow::new(fw, 0);
        si.orig_video_points = bda.read16(screen::BDA_FONT_POINTS);
        let mut x = bda.read16(screen::BDA_COLUMNS);
        let mut y = if self.state.adapter == Adapter::Cga {
            25
        } else {
            bda.read8(screen::BDA_ROWS_MINUS_ONE) as u16 + 1
        };
        let (fx, fy) = self.state.force;
        if fx != 0 {
            x = fx;
        }
        if fy != 0 {
            y = fy;
        }
        si.orig_video_cols = x as u8;
        si.orig_video_lines = y as u8;
    }

    /// Apply `mode` and return the canonical id to report.
    pub fn set_mode<F: Firmware>(&mut self, fw: &mut F, mode: u16) -> Result<u16, VideoError> {
        let mode = match mode {
            VIDEO_CURRENT_MODE => return Ok(VIDEO_CURRENT_MODE),
            NORMAL_VGA => VIDEO_80X25,
            EXTENDED_VGA => VIDEO_8POINT,
            m => m,
        };
        if mode & VIDEO_RECALC != 0 {
            debug!("video: vertical recalculation not supported, ignoring");
        }
        self.raw_set_mode(fw, mode & !VIDEO_RECALC)
    }

    /// Look `mode` up by menu position, fixed id or resolution, then by each
    /// adapter's exceptional range.
    fn raw_set_mode<F: Firmware>(&mut self, fw: &mut F, mode: u16) -> Result<u16, VideoError> {
        let mut position = 0u16;
        let mut hit = None;
        'search: for (i, slot) in self.slots.iter().enumerate() {
            for mi in slot.modes.iter() {
                let visible = mi.is_visible();
                if (visible && (mode == position || mode == (mi.y << 8).wrapping_add(mi.x)))
                    || (mi.mode != 0 && mode == mi.mode)
                {
                    hit = Some((i, *mi));
                    break 'search;
                }
                if visible {
                    position += 1;
                }
            }
        }
        if hit.is_none() {
            hit = self
                .slots
                .iter()
                .position(|s| s.card.extra_modes().contains(&mode))
                .map(|i| (i, ModeInfo::text(mode, 0, 0)));
        }
        let (i, mi) = hit.ok_or(VideoError::UndefinedMode(mode))?;

        let slot = &mut self.slots[i];
        let set = slot.card.set_mode(fw, &mi)?;
        info!("video: {} mode {:#06x} set", slot.card.name(), mi.id());
        self.apply(set);
        Ok(mi.id())
    }

    fn apply(&mut self, set: ModeSet) {
        self.state.graphic = set.graphic;
        if let Some(force) = set.force {
            self.state.force = force;
        }
        if set.restore {
            self.state.do_restore = true;
        }
    }

    /// The whole video step of setup. Undefined modes re-prompt; nothing here is fatal.
    pub fn set_video<F, C>(
        &mut self,
        fw: &mut F,
        con: &mut C,
        params: &mut BootParams,
        heap: &mut ScratchHeap<'_>,
    ) where
        F: Firmware,
        C: Console + ?Sized,
    {
        let mut mode = params.hdr.vid_mode;

        heap.reset();
        self.store_mode_params(fw, &mut params.screen_info);
        self.advance(VideoPhase::ParametersStored);

        let saved = screen::save_screen(fw, &params.screen_info, self.state.segment, heap);
        if saved.data.is_none() {
            debug!("video: no heap for a screen snapshot");
        }

        self.probe_cards(fw, &mut params.screen_info, false);
        self.advance(VideoPhase::CardsProbed);

        let canonical = loop {
            if mode == ASK_VGA {
                mode = self.mode_menu(fw, con, &mut params.screen_info);
            }
            self.advance(VideoPhase::ModeSelected);
            match self.set_mode(fw, mode) {
                Ok(real) => break real,
                Err(e) => {
                    let _ = writeln!(con, "Undefined video mode number: {mode:x}");
                    warn!("video: {e}");
                    mode = ASK_VGA;
                }
            }
        };
        params.hdr.vid_mode = canonical;
        self.advance(VideoPhase::ModeSet);

        self.store_mode_params(fw, &mut params.screen_info);

        if self.state.do_restore && !self.state.graphic && saved.data.is_some() {
            screen::restore_screen(fw, &saved, &mut params.screen_info, self.state.segment);
            self.advance(VideoPhase::ScreenRestored);
        }
    }
}
