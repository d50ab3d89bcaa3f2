// SPDX-License-Identifier: JOSSL-1.0
// Copyright (C) 2025 The Jotunheim Project
//! Boot descriptor table used for the switch to protected mode.

use bitflags::bitflags;
use core::mem::size_of;

bitflags! {
    /// Access byte (low 8 bits) and granularity nibble (bits 12..16) of a
    /// segment descriptor, in the packed `flags` form used by `GDT_ENTRY`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DescriptorFlags: u16 {
        const ACCESSED = 1 << 0;
        const READ_WRITE = 1 << 1;
        const EXECUTABLE = 1 << 3;
        const USER_SEGMENT = 1 << 4;
        const PRESENT = 1 << 7;
        const DEFAULT_SIZE = 1 << 14;
        const GRANULARITY = 1 << 15;

        /// System type 0x9: available 32-bit TSS.
        const TSS_AVAILABLE = 0x9;
    }
}

const FLAT: DescriptorFlags = DescriptorFlags::GRANULARITY
    .union(DescriptorFlags::DEFAULT_SIZE)
    .union(DescriptorFlags::PRESENT)
    .union(DescriptorFlags::USER_SEGMENT)
    .union(DescriptorFlags::ACCESSED);

/// 0xc09b
pub const BOOT_CS_FLAGS: DescriptorFlags = FLAT
    .union(DescriptorFlags::EXECUTABLE)
    .union(DescriptorFlags::READ_WRITE);
/// 0xc093
pub const BOOT_DS_FLAGS: DescriptorFlags = FLAT.union(DescriptorFlags::READ_WRITE);
/// 0x0089
pub const BOOT_TSS_FLAGS: DescriptorFlags =
    DescriptorFlags::PRESENT.union(DescriptorFlags::TSS_AVAILABLE);

pub const GDT_ENTRY_BOOT_CS: usize = 2;
pub const GDT_ENTRY_BOOT_DS: usize = 3;
pub const GDT_ENTRY_BOOT_TSS: usize = 4;

pub const BOOT_CS: u16 = (GDT_ENTRY_BOOT_CS * 8) as u16;
pub const BOOT_DS: u16 = (GDT_ENTRY_BOOT_DS * 8) as u16;
pub const BOOT_TSS: u16 = (GDT_ENTRY_BOOT_TSS * 8) as u16;

#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentDescriptor(u64);

impl SegmentDescriptor {
    pub const NULL: Self = Self(0);

    /// Encode `base`/`limit` with the packed access+granularity `flags`.
    pub const fn new(flags: DescriptorFlags, base: u32, limit: u32) -> Self {
        let flags = flags.bits() as u64 & 0xf0ff;
        let base = base as u64;
        let limit = limit as u64;
        Self(
            ((base & 0xff00_0000) << (56 - 24))
                | (flags << 40)
                | ((limit & 0x000f_0000) << (48 - 16))
                | ((base & 0x00ff_ffff) << 16)
                | (limit & 0x0000_ffff),
        )
    }

    pub const fn bits(&self) -> u64 {
        self.0
    }

    pub const fn base(&self) -> u32 {
        (((self.0 >> 16) & 0x00ff_ffff) | ((self.0 >> 32) & 0xff00_0000)) as u32
    }

    pub const fn limit(&self) -> u32 {
        ((self.0 & 0xffff) | ((self.0 >> 32) & 0x000f_0000)) as u32
    }

    pub const fn flags(&self) -> DescriptorFlags {
        DescriptorFlags::from_bits_retain(((self.0 >> 40) & 0xf0ff) as u16)
    }
}

/// Null, null, flat code, flat data, placeholder TSS.
///
/// The TSS is never loaded; some virtualisation hosts refuse a GDT without one.
#[repr(C, align(16))]
pub struct BootGdt(pub [SegmentDescriptor; 5]);

pub static BOOT_GDT: BootGdt = BootGdt([
    SegmentDescriptor::NULL,
    SegmentDescriptor::NULL,
    SegmentDescriptor::new(BOOT_CS_FLAGS, 0, 0xfffff),
    SegmentDescriptor::new(BOOT_DS_FLAGS, 0, 0xfffff),
    SegmentDescriptor::new(BOOT_TSS_FLAGS, 4096, 103),
]);

impl BootGdt {
    // The alignment pads the struct past the last descriptor.
    pub const LIMIT: u16 = (size_of::<[SegmentDescriptor; 5]>() - 1) as u16;
}

/// Operand of `lgdt`/`lidt`: 16-bit limit followed by a 32-bit linear base.
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorTablePointer {
    pub limit: u16,
    pub base: u32,
}

const _: () = assert!(size_of::<DescriptorTablePointer>() == 6);

impl DescriptorTablePointer {
    pub const NULL: Self = Self { limit: 0, base: 0 };

    pub const fn new(limit: u16, base: u32) -> Self {
        Self { limit, base }
    }
}

/// Empty interrupt table: any interrupt from here on triple-faults.
pub static NULL_IDT: DescriptorTablePointer = DescriptorTablePointer::NULL;
