// SPDX-License-Identifier: JOSSL-1.0
// Copyright (C) 2025 The Jotunheim Project
//! Standard CGA/EGA/VGA text modes through the video BIOS.

use super::card::{Adapter, CardEnv, ModeInfo, ModeList, ModeSet, VideoCard};
use super::{VIDEO_8POINT, VIDEO_80X25, VIDEO_80X28, VIDEO_80X43, VideoError};
use crate::bios::{BiosRegs, Firmware, vector};
use log::{debug, trace};

const CGA_MODES: &[ModeInfo] = &[ModeInfo::text(VIDEO_80X25, 80, 25)];

const EGA_MODES: &[ModeInfo] = &[
    ModeInfo::text(VIDEO_80X25, 80, 25),
    ModeInfo::text(VIDEO_8POINT, 80, 43),
];

const VGA_MODES: &[ModeInfo] = &[
    ModeInfo::text(VIDEO_80X25, 80, 25),
    ModeInfo::text(VIDEO_8POINT, 80, 50),
    ModeInfo::text(VIDEO_80X43, 80, 43),
    ModeInfo::text(VIDEO_80X28, 80, 28),
];

fn modes_for(adapter: Adapter) -> &'static [ModeInfo] {
    match adapter {
        Adapter::Cga => CGA_MODES,
        Adapter::Ega => EGA_MODES,
        Adapter::Vga => VGA_MODES,
    }
}

fn name_for(adapter: Adapter) -> &'static str {
    match adapter {
        Adapter::Cga => "CGA/MDA/HGC",
        Adapter::Ega => "EGA",
        Adapter::Vga => "VGA",
    }
}

pub struct VgaCard {
    adapter: Adapter,
}

impl VgaCard {
    pub const fn new() -> Self {
        Self {
            adapter: Adapter::Cga,
        }
    }
}

impl Default for VgaCard {
    fn default() -> Self {
        Self::new()
    }
}

fn video(fw: &mut dyn Firmware, ax: u16, bx: u16, cx: u16) -> BiosRegs {
    let mut ireg = fw.initregs();
    ireg.set_ax(ax);
    ireg.set_bx(bx);
    ireg.set_cx(cx);
    trace!("vga: int10 ax={ax:#06x} bx={bx:#06x} cx={cx:#06x}");
    fw.intcall(vector::VIDEO, &ireg, None)
}

fn current_mode(fw: &mut dyn Firmware) -> u8 {
    video(fw, 0x0f00, 0, 0).al() & 0x7f
}

/// Reset to plain text mode 3, or 7 on a monochrome adapter.
fn set_basic_mode(fw: &mut dyn Firmware) -> Result<u8, VideoError> {
    let mode = match current_mode(fw) {
        m @ (3 | 7) => m,
        _ => 3,
    };
    video(fw, mode as u16, 0, 0);
    match current_mode(fw) {
        got if got == mode => Ok(mode),
        got => Err(VideoError::ModeRejected { wanted: mode, got }),
    }
}

/// Common tail of the font loads: alternate print screen, no cursor
/// emulation, then the cursor shape.
fn font_fixups(fw: &mut dyn Firmware, cursor: u16) {
    video(fw, 0x1200, 0x0020, 0);
    video(fw, 0x1201, 0x0034, 0);
    video(fw, 0x0100, 0, cursor);
}

fn set_8font(fw: &mut dyn Firmware) {
    video(fw, 0x1112, 0, 0);
    font_fixups(fw, 0x0607);
}

fn set_14font(fw: &mut dyn Firmware) {
    video(fw, 0x1111, 0, 0);
    font_fixups(fw, 0x0b0c);
}

fn set_80x43(fw: &mut dyn Firmware) {
    // 350 scan lines take effect on the next mode set.
    video(fw, 0x1201, 0x0030, 0);
    video(fw, 0x0003, 0, 0);
    set_8font(fw);
}

impl VideoCard for VgaCard {
    fn name(&self) -> &str {
        name_for(self.adapter)
    }

    fn probe(&mut self, fw: &mut dyn Firmware, env: &mut CardEnv<'_>) -> ModeList {
        // AH=12 BL=10 is an EGA/VGA-only query; a CGA BIOS leaves BL alone.
        let oreg = video(fw, 0x1200, 0x0010, 0);
        env.screen.orig_video_ega_bx = oreg.bx();
        self.adapter = if oreg.bl() == 0x10 {
            Adapter::Cga
        } else if video(fw, 0x1a00, 0, 0).al() == 0x1a {
            env.screen.orig_video_is_vga = 1;
            Adapter::Vga
        } else {
            Adapter::Ega
        };
        *env.adapter = self.adapter;
        debug!("vga: adapter {:?}", self.adapter);
        modes_for(self.adapter).iter().copied().collect()
    }

    fn set_mode(&mut self, fw: &mut dyn Firmware, mode: &ModeInfo) -> Result<ModeSet, VideoError> {
        if !modes_for(self.adapter).iter().any(|m| m.mode == mode.mode) {
            return Err(VideoError::UndefinedMode(mode.mode));
        }
        set_basic_mode(fw)?;
        match mode.mode {
            VIDEO_8POINT => set_8font(fw),
            VIDEO_80X43 => set_80x43(fw),
            VIDEO_80X28 => set_14font(fw),
            _ => {}
        }
        Ok(ModeSet {
            graphic: false,
            force: Some((mode.x, mode.y)),
            restore: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bootparams::BootParams;
    use crate::testing::{MockBios, ok};

    fn probe(fw: &mut MockBios) -> (VgaCard, ModeList, Adapter, BootParams) {
        let mut card = VgaCard::new();
        let mut bp = BootParams::zeroed();
        let mut adapter = Adapter::Cga;
        let modes = {
            let mut env = CardEnv {
                screen: &mut bp.screen_info,
                adapter: &mut adapter,
            };
            card.probe(fw, &mut env)
        };
        (card, modes, adapter, bp)
    }

    fn ax_sequence(fw: &MockBios) -> Vec<u16> {
        fw.calls_to(vector::VIDEO).iter().map(|r| r.ax()).collect()
    }

    #[test]
    fn vga_detected() {
        let mut fw = MockBios::vga();
        let (card, modes, adapter, bp) = probe(&mut fw);
        assert_eq!(adapter, Adapter::Vga);
        assert_eq!(card.name(), "VGA");
        assert_eq!(modes.len(), 4);
        assert_eq!(bp.screen_info.orig_video_is_vga, 1);
        assert_eq!({ bp.screen_info.orig_video_ega_bx }, 3);
    }

    #[test]
    fn ega_without_display_combination_code() {
        let mut fw = MockBios::new();
        fw.on(vector::VIDEO, |_, r, _| {
            let mut o = ok(r);
            if r.ax() == 0x1200 {
                o.set_bx(0x0003);
            }
            o
        });
        let (card, modes, adapter, bp) = probe(&mut fw);
        assert_eq!(adapter, Adapter::Ega);
        assert_eq!(card.name(), "EGA");
        assert_eq!(modes.as_slice(), EGA_MODES);
        assert_eq!(bp.screen_info.orig_video_is_vga, 0);
    }

    #[test]
    fn untouched_bl_means_cga() {
        let mut fw = MockBios::new();
        let (card, modes, adapter, _) = probe(&mut fw);
        assert_eq!(adapter, Adapter::Cga);
        assert_eq!(card.name(), "CGA/MDA/HGC");
        assert_eq!(modes.len(), 1);
        assert_eq!(fw.calls.len(), 1);
    }

    #[test]
    fn eight_point_font_sequence() {
        let mut fw = MockBios::vga();
        let (mut card, _, _, _) = probe(&mut fw);
        fw.calls.clear();
        let set = card
            .set_mode(&mut fw, &ModeInfo::text(VIDEO_8POINT, 80, 50))
            .unwrap();
        assert_eq!(set.force, Some((80, 50)));
        assert!(set.restore && !set.graphic);
        assert_eq!(
            ax_sequence(&fw),
            vec![0x0f00, 0x0003, 0x0f00, 0x1112, 0x1200, 0x1201, 0x0100]
        );
        let cursor = *fw.calls_to(vector::VIDEO).last().unwrap();
        assert_eq!(cursor.cx(), 0x0607);
        assert_eq!(fw.peek(0, 0x484, 1), vec![49]);
    }

    #[test]
    fn eighty_by_43_uses_350_lines() {
        let mut fw = MockBios::vga();
        let (mut card, _, _, _) = probe(&mut fw);
        card.set_mode(&mut fw, &ModeInfo::text(VIDEO_80X43, 80, 43))
            .unwrap();
        assert_eq!(fw.peek(0, 0x484, 1), vec![42]);
    }

    #[test]
    fn mono_mode_is_kept() {
        let mut fw = MockBios::vga();
        fw.poke(0, 0x449, &[0x07]);
        let (mut card, _, _, _) = probe(&mut fw);
        fw.calls.clear();
        card.set_mode(&mut fw, &ModeInfo::text(VIDEO_80X28, 80, 28))
            .unwrap();
        let seq = ax_sequence(&fw);
        assert_eq!(seq[1], 0x0007);
        assert_eq!(seq[3], 0x1111);
        assert_eq!(fw.peek(0, 0x485, 1), vec![14]);
    }

    #[test]
    fn mode_outside_adapter_list_rejected() {
        let mut fw = MockBios::new();
        let (mut card, _, _, _) = probe(&mut fw);
        fw.calls.clear();
        assert_eq!(
            card.set_mode(&mut fw, &ModeInfo::text(VIDEO_8POINT, 80, 43)),
            Err(VideoError::UndefinedMode(VIDEO_8POINT))
        );
        assert!(fw.calls.is_empty());
    }

    #[test]
    fn refused_basic_mode_reported() {
        let mut fw = MockBios::vga();
        fw.poke(0, 0x449, &[0x13]);
        fw.on(vector::VIDEO, |mem, r, _| {
            let mut o = ok(r);
            match r.ah() {
                0x0f => o.set_al(mem[0x449]),
                0x12 => o.set_bx(0x0003),
                0x1a => o.set_al(0x1a),
                _ => {}
            }
            o
        });
        let (mut card, _, _, _) = probe(&mut fw);
        assert_eq!(
            card.set_mode(&mut fw, &ModeInfo::text(VIDEO_80X25, 80, 25)),
            Err(VideoError::ModeRejected { wanted: 3, got: 0x13 })
        );
    }
}
