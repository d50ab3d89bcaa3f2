// SPDX-License-Identifier: JOSSL-1.0
// Copyright (C) 2025 The Jotunheim Project
//! Scripted firmware, console and CPU for host tests.

use crate::bios::{BiosRegs, EFlags, FarPtr, Firmware};
use crate::console::Console;
use crate::pm::gdt::DescriptorTablePointer;
use crate::pm::{A20Error, A20Gate, Cpu, IO_DELAY_PORT};
use crate::video::VideoError;
use crate::video::card::{CardEnv, MAX_MODES_PER_CARD, ModeInfo, ModeList, ModeSet, VideoCard};
use core::fmt;
use core::ops::Range;
use std::any::Any;
use std::collections::{HashMap, VecDeque};

/// Conventional memory plus the high memory area.
pub const MEM_SIZE: usize = 0x11_0000;

pub type Handler = Box<dyn FnMut(&mut [u8], &BiosRegs, Option<&mut [u8]>) -> BiosRegs>;

fn lin(seg: u16, off: u16) -> usize {
    ((seg as usize) << 4) + off as usize
}

/// Firmware whose services are closures keyed by interrupt vector.
///
/// A vector without a handler returns the input frame unchanged, so the
/// preset carry flag reads as "service absent".
pub struct MockBios {
    mem: Vec<u8>,
    handlers: HashMap<u8, Handler>,
    pub calls: Vec<(u8, BiosRegs)>,
}

impl MockBios {
    pub fn new() -> Self {
        Self {
            mem: vec![0; MEM_SIZE],
            handlers: HashMap::new(),
            calls: Vec::new(),
        }
    }

    /// A colour VGA in mode 3 with the cursor at column 5, row 10.
    pub fn vga() -> Self {
        let mut fw = Self::new();
        fw.poke(0, 0x449, &[0x03]);
        fw.poke(0, 0x44a, &80u16.to_le_bytes());
        fw.poke(0, 0x450, &[5, 10]);
        fw.poke(0, 0x460, &[0x07, 0x06]);
        fw.poke(0, 0x484, &[24]);
        fw.poke(0, 0x485, &16u16.to_le_bytes());
        fw.on(crate::bios::vector::VIDEO, vga_bios);
        fw
    }

    pub fn on<H>(&mut self, vector: u8, handler: H) -> &mut Self
    where
        H: FnMut(&mut [u8], &BiosRegs, Option<&mut [u8]>) -> BiosRegs + 'static,
    {
        self.handlers.insert(vector, Box::new(handler));
        self
    }

    pub fn poke(&mut self, seg: u16, off: u16, data: &[u8]) {
        let at = lin(seg, off);
        self.mem[at..at + data.len()].copy_from_slice(data);
    }

    pub fn peek(&self, seg: u16, off: u16, len: usize) -> Vec<u8> {
        let at = lin(seg, off);
        self.mem[at..at + len].to_vec()
    }

    pub fn calls_to(&self, vector: u8) -> Vec<BiosRegs> {
        self.calls
            .iter()
            .filter(|(v, _)| *v == vector)
            .map(|(_, r)| *r)
            .collect()
    }
}

impl Firmware for MockBios {
    fn intcall(&mut self, vector: u8, ireg: &BiosRegs, buf: Option<&mut [u8]>) -> BiosRegs {
        self.calls.push((vector, *ireg));
        match self.handlers.get_mut(&vector) {
            Some(h) => h(&mut self.mem, ireg, buf),
            None => *ireg,
        }
    }

    fn far_read(&mut self, seg: u16, off: u16, out: &mut [u8]) {
        let at = lin(seg, off);
        out.copy_from_slice(&self.mem[at..at + out.len()]);
    }

    fn far_write(&mut self, seg: u16, off: u16, data: &[u8]) {
        self.poke(seg, off, data);
    }
}

/// Copy of `r` with carry cleared.
pub fn ok(r: &BiosRegs) -> BiosRegs {
    let mut o = *r;
    o.eflags &= !EFlags::CARRY.bits();
    o
}

/// Copy of `r` with carry set and status `ah`.
pub fn fail(r: &BiosRegs, ah: u8) -> BiosRegs {
    let mut o = *r;
    o.eflags |= EFlags::CARRY.bits();
    o.set_ah(ah);
    o
}

fn rd16(mem: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([mem[at], mem[at + 1]])
}

fn wr16(mem: &mut [u8], at: usize, v: u16) {
    mem[at..at + 2].copy_from_slice(&v.to_le_bytes());
}

/// Byte the mock uses to remember a pending 350-scanline request.
const SCANLINES_350: usize = 0x4ff;

/// Video services of a colour VGA, kept in the BIOS data area.
pub fn vga_bios(mem: &mut [u8], r: &BiosRegs, _buf: Option<&mut [u8]>) -> BiosRegs {
    let mut o = ok(r);
    match r.ah() {
        0x00 => {
            let mode = r.al() & 0x7f;
            if mode == 3 || mode == 7 {
                mem[0x449] = mode;
                wr16(mem, 0x44a, 80);
                mem[0x484] = 24;
                wr16(mem, 0x485, 16);
                mem[0x450] = 0;
                mem[0x451] = 0;
            }
        }
        0x01 => {
            mem[0x461] = r.ch();
            mem[0x460] = r.cl();
        }
        0x02 => {
            mem[0x450] = r.dl();
            mem[0x451] = r.dh();
        }
        0x03 => {
            o.set_dl(mem[0x450]);
            o.set_dh(mem[0x451]);
            o.set_ch(mem[0x461]);
            o.set_cl(mem[0x460]);
        }
        0x0f => {
            o.set_al(mem[0x449]);
            o.set_ah(rd16(mem, 0x44a) as u8);
            o.set_bh(mem[0x462]);
        }
        0x11 => match r.al() {
            0x12 => {
                mem[0x484] = if mem[SCANLINES_350] != 0 { 42 } else { 49 };
                mem[SCANLINES_350] = 0;
                wr16(mem, 0x485, 8);
            }
            0x11 => {
                mem[0x484] = 27;
                wr16(mem, 0x485, 14);
            }
            _ => {}
        },
        0x12 => match (r.al(), r.bl()) {
            (0x00, 0x10) => o.set_bx(0x0003),
            (0x01, 0x30) => mem[SCANLINES_350] = 1,
            _ => {}
        },
        0x1a if r.al() == 0x00 => {
            o.set_al(0x1a);
            o.set_bx(0x0008);
        }
        _ => {}
    }
    o
}

/// Keys queued in advance; output captured as a string.
pub struct MockConsole {
    keys: VecDeque<u8>,
    pub output: String,
    pub flushes: usize,
}

impl MockConsole {
    pub fn new() -> Self {
        Self {
            keys: VecDeque::new(),
            output: String::new(),
            flushes: 0,
        }
    }

    pub fn with_keys(keys: &str) -> Self {
        let mut con = Self::new();
        con.keys.extend(keys.bytes());
        con
    }
}

impl fmt::Write for MockConsole {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.output.push_str(s);
        Ok(())
    }
}

impl Console for MockConsole {
    /// An exhausted script reads as ENTER, so prompts always terminate.
    fn getchar(&mut self) -> u8 {
        self.keys.pop_front().unwrap_or(b'\r')
    }

    fn getchar_timeout(&mut self) -> Option<u8> {
        self.keys.pop_front()
    }

    fn kbd_flush(&mut self) {
        self.flushes += 1;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuEvent {
    Outb(u16, u8),
    Cli,
    CallFar(FarPtr),
    LoadIdt(DescriptorTablePointer),
    LoadGdt(DescriptorTablePointer),
    Die,
}

/// Panic payload carrying the final jump.
#[derive(Debug)]
pub struct Handoff {
    pub entry: u32,
    pub boot_params: u32,
}

/// Panic payload of `die()`.
#[derive(Debug)]
pub struct Halted;

pub struct MockCpu {
    pub events: Vec<CpuEvent>,
    pub ds_base: u32,
}

impl MockCpu {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            ds_base: 0x9_0000,
        }
    }

    pub fn port_writes_excluding_delay(&self) -> Vec<(u16, u8)> {
        self.events
            .iter()
            .filter_map(|e| match *e {
                CpuEvent::Outb(p, v) if p != IO_DELAY_PORT => Some((p, v)),
                _ => None,
            })
            .collect()
    }
}

impl Cpu for MockCpu {
    fn outb(&mut self, port: u16, value: u8) {
        self.events.push(CpuEvent::Outb(port, value));
    }

    fn cli(&mut self) {
        self.events.push(CpuEvent::Cli);
    }

    unsafe fn call_far(&mut self, target: FarPtr) {
        self.events.push(CpuEvent::CallFar(target));
    }

    fn load_idt(&mut self, ptr: &'static DescriptorTablePointer) {
        self.events.push(CpuEvent::LoadIdt(*ptr));
    }

    fn load_gdt(&mut self, ptr: &'static DescriptorTablePointer) {
        self.events.push(CpuEvent::LoadGdt(*ptr));
    }

    fn linear(&self, near: usize) -> u32 {
        (near as u32).wrapping_add(self.ds_base)
    }

    fn jump_to_protected_mode(&mut self, entry: u32, boot_params: u32) -> ! {
        std::panic::panic_any(Handoff { entry, boot_params })
    }

    fn die(&mut self) -> ! {
        self.events.push(CpuEvent::Die);
        std::panic::panic_any(Halted)
    }
}

/// Run a diverging sequence and return the payload it ended with.
pub fn run_to_end<R>(f: impl FnOnce() -> R) -> Box<dyn Any + Send> {
    match std::panic::catch_unwind(std::panic::AssertUnwindSafe(f)) {
        Ok(_) => panic!("terminal sequence returned"),
        Err(payload) => payload,
    }
}

pub struct MockA20 {
    works: bool,
    pub attempts: usize,
}

impl MockA20 {
    pub fn working() -> Self {
        Self { works: true, attempts: 0 }
    }

    pub fn broken() -> Self {
        Self { works: false, attempts: 0 }
    }
}

impl A20Gate for MockA20 {
    fn enable(&mut self) -> Result<(), A20Error> {
        self.attempts += 1;
        if self.works {
            Ok(())
        } else {
            Err(A20Error::NotResponding)
        }
    }
}

/// Adapter with a fixed mode list that forces the advertised geometry.
pub struct MockCard {
    pub name: &'static str,
    pub unsafe_probe: bool,
    pub modes: Vec<ModeInfo>,
    pub extra: Range<u16>,
    pub probes: usize,
    pub sets: Vec<ModeInfo>,
}

impl MockCard {
    pub fn new(name: &'static str, modes: &[ModeInfo]) -> Self {
        Self {
            name,
            unsafe_probe: false,
            modes: modes.to_vec(),
            extra: 0..0,
            probes: 0,
            sets: Vec::new(),
        }
    }
}

impl VideoCard for MockCard {
    fn name(&self) -> &str {
        self.name
    }

    fn is_unsafe(&self) -> bool {
        self.unsafe_probe
    }

    fn extra_modes(&self) -> Range<u16> {
        self.extra.clone()
    }

    fn probe(&mut self, _fw: &mut dyn Firmware, _env: &mut CardEnv<'_>) -> ModeList {
        self.probes += 1;
        self.modes.iter().copied().take(MAX_MODES_PER_CARD).collect()
    }

    fn set_mode(&mut self, _fw: &mut dyn Firmware, mode: &ModeInfo) -> Result<ModeSet, VideoError> {
        self.sets.push(*mode);
        Ok(ModeSet {
            graphic: false,
            force: mode.is_visible().then_some((mode.x, mode.y)),
            restore: false,
        })
    }
}
