// SPDX-License-Identifier: JOSSL-1.0
// Copyright (C) 2025 The Jotunheim Project
//! COM1 log sink (QEMU `-serial stdio`).

use super::{inb, outb};
use crate::logger::LogSink;

const COM1: u16 = 0x3f8;
const LSR_THR_EMPTY: u8 = 0x20;

/// 115200 8N1, FIFOs on.
pub unsafe fn init() {
    unsafe {
        outb(COM1 + 1, 0x00);
        outb(COM1 + 3, 0x80);
        outb(COM1, 0x01);
        outb(COM1 + 1, 0x00);
        outb(COM1 + 3, 0x03);
        outb(COM1 + 2, 0xc7);
        outb(COM1 + 4, 0x0b);
    }
}

fn putc(c: u8) {
    unsafe {
        while inb(COM1 + 5) & LSR_THR_EMPTY == 0 {}
        outb(COM1, c);
    }
}

pub struct SerialSink;

impl LogSink for SerialSink {
    fn write_str(&self, s: &str) {
        s.bytes().for_each(putc);
    }
}

pub static SERIAL: SerialSink = SerialSink;
