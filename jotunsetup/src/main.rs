// SPDX-License-Identifier: JOSSL-1.0
// Copyright (C) 2025 The Jotunheim Project
#![no_std]
#![no_main]

use core::arch::asm;
use jotunsetup::arch::x86::a20::A20;
use jotunsetup::arch::x86::cpu::RealModeCpu;
use jotunsetup::arch::x86::intcall::RealModeBios;
use jotunsetup::arch::x86::tty::BiosConsole;
use jotunsetup::arch::x86::{ds, serial, sp};
use jotunsetup::bios::{FarPtr, Firmware};
use jotunsetup::bootparams::{BootParams, LoadFlags, SetupHeader};
use jotunsetup::config::SetupConfig;
use jotunsetup::heap::{HeapBounds, ScratchHeap};
use jotunsetup::logger;
use jotunsetup::setup::SetupContext;
use log::{error, info, warn};
use spin::Mutex;

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    error!("setup panic: {info}");
    loop {
        unsafe { asm!("hlt") }
    }
}

/// The zero page handed to the next stage.
static BOOT_PARAMS: Mutex<BootParams> = Mutex::new(BootParams::zeroed());

unsafe extern "C" {
    /// Setup header inside the image, as completed by the loader.
    static hdr: SetupHeader;
    /// First byte past the image; the heap starts here.
    static _end: u8;
}

/// Only this much of the command line is scanned for our options.
const CMDLINE_SCAN: usize = 256;

fn read_cmdline<'b>(fw: &mut RealModeBios, ptr: u32, buf: &'b mut [u8; CMDLINE_SCAN]) -> &'b str {
    // Real mode cannot reach a command line above 1 MiB.
    if ptr == 0 || ptr >= 0x10_0000 {
        return "";
    }
    let at = FarPtr::from_linear(ptr);
    fw.far_read(at.seg, at.off, buf);
    let len = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    match core::str::from_utf8(&buf[..len]) {
        Ok(s) => s,
        Err(e) => {
            warn!("command line is not UTF-8 past byte {}", e.valid_up_to());
            // Valid prefix, so this cannot fail.
            core::str::from_utf8(&buf[..e.valid_up_to()]).unwrap_or("")
        }
    }
}

fn heap_region(params: &BootParams) -> ScratchHeap<'static> {
    if !params.hdr.loadflags().contains(LoadFlags::CAN_USE_HEAP) {
        return ScratchHeap::unusable();
    }
    let start = unsafe { &raw const _end } as usize as u16;
    let Some(bounds) = HeapBounds::from_loader(start, params.hdr.heap_end_ptr, sp()) else {
        warn!("heap_end_ptr {:#x} leaves no heap past {start:#x}", { params.hdr.heap_end_ptr });
        return ScratchHeap::unusable();
    };
    // SAFETY: the loader reserved [_end, heap_end_ptr + 0x200) of our data
    // segment for us, `bounds` stops short of the live stack, and nothing
    // else in the image references those bytes.
    let region = unsafe { core::slice::from_raw_parts_mut(start as usize as *mut u8, bounds.len()) };
    ScratchHeap::from_bounds(ds(), bounds, region)
}

#[unsafe(no_mangle)]
pub extern "C" fn setup_main() -> ! {
    unsafe { serial::init() };
    let _ = logger::init(&serial::SERIAL);

    let mut params = BOOT_PARAMS.lock();
    params.hdr = unsafe { hdr };
    info!("jotunsetup: ds={:#06x}, protocol {:#06x}", ds(), { params.hdr.version });

    let mut fw = RealModeBios;
    let mut cmdline = [0u8; CMDLINE_SCAN];
    let config = SetupConfig::from_cmdline(read_cmdline(&mut fw, params.hdr.cmd_line_ptr, &mut cmdline));
    logger::set_quiet(config.quiet);

    let heap = heap_region(&params);
    if !heap.is_usable() {
        warn!("no heap: MBR signatures and screen restore are skipped");
    }

    let mut con = BiosConsole::new();
    let mut cpu = RealModeCpu;
    let mut a20 = A20::new();
    SetupContext {
        fw: &mut fw,
        con: &mut con,
        cpu: &mut cpu,
        a20: &mut a20,
        params: &mut params,
        heap,
        config,
    }
    .run()
}
