// SPDX-License-Identifier: JOSSL-1.0
// Copyright (C) 2025 The Jotunheim Project
//! The setup sequence: probe the firmware, pick a video mode, leave real mode.

use crate::apm::query_apm_bios;
use crate::bios::Firmware;
use crate::bootparams::BootParams;
use crate::config::SetupConfig;
use crate::console::Console;
use crate::edd::query_edd;
use crate::heap::ScratchHeap;
use crate::mca::query_mca;
use crate::pm::{A20Gate, Cpu, go_to_protected_mode};
use crate::video::VideoManager;
use crate::video::card::VideoCard;
use crate::video::vga::VgaCard;
use log::{debug, info};

/// Everything the setup stage works on, handed over by the runtime.
pub struct SetupContext<'s, F, C, P, A>
where
    F: Firmware,
    C: Console + ?Sized,
    P: Cpu + ?Sized,
    A: A20Gate + ?Sized,
{
    pub fw: &'s mut F,
    pub con: &'s mut C,
    pub cpu: &'s mut P,
    pub a20: &'s mut A,
    pub params: &'s mut BootParams,
    pub heap: ScratchHeap<'s>,
    pub config: SetupConfig,
}

impl<F, C, P, A> SetupContext<'_, F, C, P, A>
where
    F: Firmware,
    C: Console + ?Sized,
    P: Cpu + ?Sized,
    A: A20Gate + ?Sized,
{
    fn probe_system_description(&mut self) {
        match query_mca(self.fw, &mut self.params.sys_desc_table) {
            Ok(len) => info!("system description table: {len} bytes"),
            Err(e) => debug!("{e}"),
        }
    }

    fn probe_power_management(&mut self) {
        match query_apm_bios(self.fw) {
            Ok(info) => self.params.apm_bios_info = info,
            Err(e) => debug!("{e}"),
        }
    }

    fn probe_disks(&mut self) {
        query_edd(
            self.fw,
            &mut self.heap,
            self.params,
            self.config.edd,
            self.con,
            self.config.quiet,
        );
    }

    fn set_video(&mut self) {
        let mut vga = VgaCard::new();
        let cards: [&mut dyn VideoCard; 1] = [&mut vga];
        let mut video = VideoManager::new(cards);
        video.set_video(self.fw, self.con, self.params, &mut self.heap);
    }

    /// Run every step in order and jump to the next stage.
    pub fn run(mut self) -> ! {
        info!("setup: {:?}", self.config);
        self.probe_system_description();
        self.probe_power_management();
        self.probe_disks();
        self.set_video();
        go_to_protected_mode(self.cpu, self.a20, self.con, self.params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bios::{BiosRegs, vector};
    use crate::config::EddMode;
    use crate::edd::{EDD_MAGIC_OUT, MBR_SIG_OFFSET};
    use crate::testing::{Halted, Handoff, MockA20, MockBios, MockConsole, MockCpu, fail, ok, run_to_end};
    use crate::video::{VIDEO_80X28, VIDEO_CURRENT_MODE};

    /// VGA text adapter; disk 0x80 with EDD, disk 0x81 legacy only.
    fn machine() -> MockBios {
        let mut fw = MockBios::vga();
        fw.on(vector::DISK, |_, r: &BiosRegs, buf| match (r.ah(), r.dl()) {
            (0x41, 0x80) => {
                let mut o = ok(r);
                o.set_bx(EDD_MAGIC_OUT);
                o.set_ah(0x21);
                o.set_cx(0x0001);
                o
            }
            (0x48, 0x80) => {
                if let Some(b) = buf {
                    b[0..2].copy_from_slice(&0x1au16.to_le_bytes());
                }
                ok(r)
            }
            (0x08, 0x80 | 0x81) => ok(r),
            (0x02, 0x80 | 0x81) => {
                if let Some(b) = buf {
                    b[MBR_SIG_OFFSET..MBR_SIG_OFFSET + 4]
                        .copy_from_slice(&(0x1234_0000u32 | r.dl() as u32).to_le_bytes());
                    b[510] = 0x55;
                    b[511] = 0xaa;
                }
                ok(r)
            }
            _ => fail(r, 0x01),
        });
        fw
    }

    fn boot(
        fw: &mut MockBios,
        con: &mut MockConsole,
        a20: &mut MockA20,
        bp: &mut BootParams,
        config: SetupConfig,
    ) -> (Box<dyn std::any::Any + Send>, MockCpu) {
        let mut mem = vec![0u8; 16384];
        let mut cpu = MockCpu::new();
        let end = run_to_end(|| {
            SetupContext {
                fw,
                con,
                cpu: &mut cpu,
                a20,
                params: bp,
                heap: ScratchHeap::new(0x8000, &mut mem),
                config,
            }
            .run()
        });
        (end, cpu)
    }

    #[test]
    fn full_sequence_reaches_handoff() {
        let mut fw = machine();
        let mut con = MockConsole::new();
        let mut bp = BootParams::zeroed();
        // Ids below 0x100 are menu positions; the fourth VGA entry is 80x28.
        bp.hdr.vid_mode = 3;
        bp.hdr.code32_start = 0x0010_0000;
        let config = SetupConfig {
            edd: EddMode::On,
            quiet: false,
        };
        let (end, _) = boot(&mut fw, &mut con, &mut MockA20::working(), &mut bp, config);

        let handoff = end.downcast::<Handoff>().expect("hand-off");
        assert_eq!(handoff.entry, 0x0010_0000);

        assert!(!bp.has_apm());
        assert_eq!({ bp.sys_desc_table.length }, 0);
        assert_eq!(bp.eddbuf_entries, 1);
        assert!(bp.edd_mbr_sig_buf_entries <= 2);
        assert_eq!(bp.mbr_signature(1), Some(0x1234_0081));
        assert_eq!({ bp.hdr.vid_mode }, VIDEO_80X28);
        assert_eq!(bp.screen_info.orig_video_lines, 28);
        assert_eq!(con.output, "Probing EDD (edd=off to disable)... ok\n");

        // System description, then power management, then disks, then video.
        let first = |v: u8| fw.calls.iter().position(|(n, _)| *n == v).unwrap();
        assert!(first(vector::SYSTEM) < first(vector::DISK));
        assert!(first(vector::DISK) < first(vector::VIDEO));
        let system: Vec<u8> = fw.calls_to(vector::SYSTEM).iter().map(|r| r.ah()).collect();
        assert_eq!(system, vec![0xc0, 0x53]);
    }

    #[test]
    fn disabled_disk_probe_is_silent() {
        let mut fw = machine();
        let mut con = MockConsole::new();
        let mut bp = BootParams::zeroed();
        bp.hdr.vid_mode = VIDEO_CURRENT_MODE;
        let config = SetupConfig {
            edd: EddMode::Off,
            quiet: false,
        };
        let (end, _) = boot(&mut fw, &mut con, &mut MockA20::working(), &mut bp, config);
        assert!(end.is::<Handoff>());
        assert!(fw.calls_to(vector::DISK).is_empty());
        assert_eq!(bp.eddbuf_entries, 0);
        assert!(con.output.is_empty());
    }

    #[test]
    fn a20_failure_halts_after_probing() {
        let mut fw = machine();
        let mut con = MockConsole::new();
        let mut bp = BootParams::zeroed();
        bp.hdr.vid_mode = VIDEO_CURRENT_MODE;
        let config = SetupConfig {
            edd: EddMode::SkipMbr,
            quiet: true,
        };
        let (end, cpu) = boot(&mut fw, &mut con, &mut MockA20::broken(), &mut bp, config);
        assert!(end.is::<Halted>());
        assert_eq!(bp.eddbuf_entries, 1);
        assert_eq!(bp.edd_mbr_sig_buf_entries, 0);
        assert_eq!(con.output, "A20 gate not responding, unable to boot...\n");
        assert!(cpu.port_writes_excluding_delay().iter().all(|&(p, _)| p == 0x70));
    }
}
