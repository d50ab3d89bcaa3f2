// SPDX-License-Identifier: JOSSL-1.0
// Copyright (C) 2025 The Jotunheim Project
//! Adapter capability: probe for modes, set one of them.

use super::VideoError;
use crate::bios::Firmware;
use crate::bootparams::ScreenInfo;
use core::ops::Range;
use heapless::Vec;

/// Modes a single adapter may advertise.
pub const MAX_MODES_PER_CARD: usize = 16;

pub type ModeList = Vec<ModeInfo, MAX_MODES_PER_CARD>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeInfo {
    /// Fixed mode id; 0 means "identified by resolution".
    pub mode: u16,
    pub x: u16,
    pub y: u16,
    /// Bits per pixel for graphic modes, 0 for text.
    pub depth: u16,
}

impl ModeInfo {
    pub const fn text(mode: u16, x: u16, y: u16) -> Self {
        Self { mode, x, y, depth: 0 }
    }

    /// Hidden modes stay in the catalog but are not listed or numbered.
    pub const fn is_visible(&self) -> bool {
        self.x != 0 && self.y != 0
    }

    /// The id a user types: the fixed id, or `(rows << 8) + cols`.
    pub const fn id(&self) -> u16 {
        if self.mode != 0 {
            self.mode
        } else {
            (self.y << 8).wrapping_add(self.x)
        }
    }
}

/// Display adapter family, narrowed by the first probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Adapter {
    #[default]
    Cga,
    Ega,
    Vga,
}

/// Outcome of a successful mode set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ModeSet {
    /// The screen is now a graphic framebuffer; text parameters are not ours to fill.
    pub graphic: bool,
    /// Geometry to report regardless of what the firmware data area says.
    pub force: Option<(u16, u16)>,
    /// The old text should be replayed onto the new screen.
    pub restore: bool,
}

/// What a probe may update besides its own mode list.
pub struct CardEnv<'a> {
    pub screen: &'a mut ScreenInfo,
    pub adapter: &'a mut Adapter,
}

pub trait VideoCard {
    fn name(&self) -> &str;

    /// Probing may hang some hardware; only done on an explicit "scan".
    fn is_unsafe(&self) -> bool {
        false
    }

    /// Ids accepted by `set_mode` even though no probe listed them.
    fn extra_modes(&self) -> Range<u16> {
        0..0
    }

    fn probe(&mut self, fw: &mut dyn Firmware, env: &mut CardEnv<'_>) -> ModeList;

    fn set_mode(&mut self, fw: &mut dyn Firmware, mode: &ModeInfo) -> Result<ModeSet, VideoError>;
}
