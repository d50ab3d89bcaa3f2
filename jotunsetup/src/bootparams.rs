// SPDX-License-Identifier: JOSSL-1.0
// Copyright (C) 2025 The Jotunheim Project
//! The Boot Parameter Record ("zero page") handed to the next stage.
//!
//! Layout is ABI: every structure here is `repr(C, packed)` and its offsets
//! are asserted at compile time. Multi-byte fields of packed structures must
//! be read by value (`{ rec.field }`), never by reference.

use bitflags::bitflags;
use core::mem::{offset_of, size_of};

/// Geometry entries the record can hold.
pub const EDDMAXNR: usize = 6;
/// Signature slots, one per probed disk id.
pub const EDD_MBR_SIG_MAX: usize = 16;

/// "HdrS"
pub const HDR_MAGIC: u32 = 0x5372_6448;

/// Plain-old-data records that may be viewed as raw bytes.
///
/// # Safety
/// Implementors must be `repr(C, packed)` and built only from integers and
/// byte arrays, so that every bit pattern is valid and there is no padding.
pub unsafe trait Record: Copy + Sized {
    fn zeroed() -> Self {
        // SAFETY: all-zero is a valid value of every integer-only record.
        unsafe { core::mem::zeroed() }
    }

    fn as_bytes(&self) -> &[u8] {
        // SAFETY: packed POD, no padding, lifetime tied to `self`.
        unsafe { core::slice::from_raw_parts(self as *const Self as *const u8, size_of::<Self>()) }
    }

    fn as_bytes_mut(&mut self) -> &mut [u8] {
        // SAFETY: as above; any byte pattern is a valid record.
        unsafe { core::slice::from_raw_parts_mut(self as *mut Self as *mut u8, size_of::<Self>()) }
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ScreenFlags: u8 {
        const NO_CURSOR = 1 << 0;
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct LoadFlags: u8 {
        const LOADED_HIGH = 1 << 0;
        const KASLR = 1 << 1;
        const QUIET = 1 << 5;
        const KEEP_SEGMENTS = 1 << 6;
        const CAN_USE_HEAP = 1 << 7;
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ApmFlags: u16 {
        const SUPPORT_16_BIT = 1 << 0;
        const SUPPORT_32_BIT = 1 << 1;
        const IDLE_SLOWS_CLOCK = 1 << 2;
        const BIOS_DISABLED = 1 << 3;
        const BIOS_DISENGAGED = 1 << 4;
    }

    /// Function subsets reported by the EDD presence check (CX).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct EddSupport: u16 {
        const FIXED_DISK_ACCESS = 1 << 0;
        const DEVICE_LOCKING_AND_EJECTING = 1 << 1;
        const ENHANCED_DISK_DRIVE = 1 << 2;
        const EXTENSIONS_64BIT = 1 << 3;
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct EddInfoFlags: u16 {
        const DMA_BOUNDARY_TRANSPARENT = 1 << 0;
        const GEOMETRY_VALID = 1 << 1;
        const REMOVABLE = 1 << 2;
        const WRITE_VERIFY = 1 << 3;
        const CHANGE_LINE = 1 << 4;
        const LOCKABLE = 1 << 5;
        const NO_MEDIA_PRESENT = 1 << 6;
        const USE_INT13_FN50 = 1 << 7;
    }
}

#[repr(C, packed)]
#[derive(Debug, Clone, Copy)]
pub struct ScreenInfo {
    pub orig_x: u8,
    pub orig_y: u8,
    pub ext_mem_k: u16,
    pub orig_video_page: u16,
    pub orig_video_mode: u8,
    pub orig_video_cols: u8,
    pub flags: u8,
    _unused2: u8,
    pub orig_video_ega_bx: u16,
    _unused3: u16,
    pub orig_video_lines: u8,
    pub orig_video_is_vga: u8,
    pub orig_video_points: u16,
    /// Framebuffer description, filled only by graphic-mode drivers.
    pub lfb: [u8; 0x2e],
}

impl ScreenInfo {
    pub fn flags(&self) -> ScreenFlags {
        ScreenFlags::from_bits_retain(self.flags)
    }
}

#[repr(C, packed)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApmBiosInfo {
    pub version: u16,
    pub cseg: u16,
    pub offset: u32,
    pub cseg_16: u16,
    pub dseg: u16,
    pub flags: u16,
    pub cseg_len: u16,
    pub cseg_16_len: u16,
    pub dseg_len: u16,
}

impl ApmBiosInfo {
    pub fn flags(&self) -> ApmFlags {
        ApmFlags::from_bits_retain(self.flags)
    }
}

/// Length-prefixed system description table, truncated to 16 bytes.
#[repr(C, packed)]
#[derive(Debug, Clone, Copy)]
pub struct SysDescTable {
    pub length: u16,
    pub table: [u8; 14],
}

/// EDD "Get Device Parameters" result buffer; self-describing by `length`.
#[repr(C, packed)]
#[derive(Debug, Clone, Copy)]
pub struct EddDeviceParams {
    pub length: u16,
    pub info_flags: u16,
    pub num_default_cylinders: u32,
    pub num_default_heads: u32,
    pub sectors_per_track: u32,
    pub number_of_sectors: u64,
    pub bytes_per_sector: u16,
    pub dpte_ptr: u32,
    pub key: u16,
    pub device_path_info_length: u8,
    _reserved2: u8,
    _reserved3: u16,
    pub host_bus_type: [u8; 4],
    pub interface_type: [u8; 8],
    pub interface_path: [u8; 8],
    pub device_path: [u8; 16],
    _reserved4: u8,
    pub checksum: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EddRevision {
    V1,
    V2,
    V3,
    Unknown(u16),
}

impl EddDeviceParams {
    /// EDD level implied by how much of the buffer the firmware filled.
    pub fn revision(&self) -> EddRevision {
        match self.length {
            0x42..=u16::MAX => EddRevision::V3,
            0x1e..=0x41 => EddRevision::V2,
            0x1a..=0x1d => EddRevision::V1,
            other => EddRevision::Unknown(other),
        }
    }

    pub fn info_flags(&self) -> EddInfoFlags {
        EddInfoFlags::from_bits_retain(self.info_flags)
    }
}

#[repr(C, packed)]
#[derive(Debug, Clone, Copy)]
pub struct EddInfo {
    pub device: u8,
    pub version: u8,
    pub interface_support: u16,
    pub legacy_max_cylinder: u16,
    pub legacy_max_head: u8,
    pub legacy_sectors_per_track: u8,
    pub params: EddDeviceParams,
}

impl EddInfo {
    pub fn support(&self) -> EddSupport {
        EddSupport::from_bits_retain(self.interface_support)
    }
}

/// Setup header as laid down by the image and completed by the loader.
#[repr(C, packed)]
#[derive(Debug, Clone, Copy)]
pub struct SetupHeader {
    pub setup_sects: u8,
    pub root_flags: u16,
    pub syssize: u32,
    pub ram_size: u16,
    pub vid_mode: u16,
    pub root_dev: u16,
    pub boot_flag: u16,
    pub jump: u16,
    pub header: u32,
    pub version: u16,
    /// Far pointer (`seg << 16 | off`) to the loader's pre-switch hook, or 0.
    pub realmode_swtch: u32,
    pub start_sys_seg: u16,
    pub kernel_version: u16,
    pub type_of_loader: u8,
    pub loadflags: u8,
    pub setup_move_size: u16,
    /// Linear entry point of the 32-bit stage.
    pub code32_start: u32,
    pub ramdisk_image: u32,
    pub ramdisk_size: u32,
    pub bootsect_kludge: u32,
    /// Data-segment offset where the loader-granted heap ends.
    pub heap_end_ptr: u16,
    pub ext_loader_ver: u8,
    pub ext_loader_type: u8,
    pub cmd_line_ptr: u32,
    pub initrd_addr_max: u32,
    pub kernel_alignment: u32,
    pub relocatable_kernel: u8,
    pub min_alignment: u8,
    pub xloadflags: u16,
    pub cmdline_size: u32,
    pub hardware_subarch: u32,
    pub hardware_subarch_data: u64,
    pub payload_offset: u32,
    pub payload_length: u32,
    pub setup_data: u64,
    pub pref_address: u64,
    pub init_size: u32,
    pub handover_offset: u32,
    pub kernel_info_offset: u32,
}

impl SetupHeader {
    pub fn loadflags(&self) -> LoadFlags {
        LoadFlags::from_bits_retain(self.loadflags)
    }
}

#[repr(C, packed)]
#[derive(Clone, Copy)]
pub struct BootParams {
    pub screen_info: ScreenInfo,
    pub apm_bios_info: ApmBiosInfo,
    _reserved_054: [u8; 0x4c],
    pub sys_desc_table: SysDescTable,
    _reserved_0b0: [u8; 0x138],
    pub e820_entries: u8,
    pub eddbuf_entries: u8,
    pub edd_mbr_sig_buf_entries: u8,
    pub kbd_status: u8,
    _reserved_1ec: [u8; 5],
    pub hdr: SetupHeader,
    _reserved_26c: [u8; 0x24],
    /// Little-endian 32-bit signatures, slot `id - 0x80`.
    pub edd_mbr_sig_buffer: [[u8; 4]; EDD_MBR_SIG_MAX],
    /// Memory map area; filled by a different stage.
    _e820_table: [u8; 0xa00],
    _reserved_cd0: [u8; 0x30],
    pub eddbuf: [EddInfo; EDDMAXNR],
    _reserved_eec: [u8; 0x114],
}

unsafe impl Record for ScreenInfo {}
unsafe impl Record for ApmBiosInfo {}
unsafe impl Record for SysDescTable {}
unsafe impl Record for EddDeviceParams {}
unsafe impl Record for EddInfo {}
unsafe impl Record for SetupHeader {}
unsafe impl Record for BootParams {}

const _: () = {
    assert!(size_of::<ScreenInfo>() == 0x40);
    assert!(size_of::<ApmBiosInfo>() == 0x14);
    assert!(size_of::<SysDescTable>() == 0x10);
    assert!(size_of::<EddDeviceParams>() == 74);
    assert!(size_of::<EddInfo>() == 82);
    assert!(size_of::<SetupHeader>() == 0x7b);
    assert!(size_of::<BootParams>() == 0x1000);

    assert!(offset_of!(ScreenInfo, orig_video_lines) == 0x0e);
    assert!(offset_of!(ScreenInfo, orig_video_points) == 0x10);
    assert!(offset_of!(BootParams, apm_bios_info) == 0x040);
    assert!(offset_of!(BootParams, sys_desc_table) == 0x0a0);
    assert!(offset_of!(BootParams, eddbuf_entries) == 0x1e9);
    assert!(offset_of!(BootParams, edd_mbr_sig_buf_entries) == 0x1ea);
    assert!(offset_of!(BootParams, hdr) == 0x1f1);
    assert!(offset_of!(BootParams, edd_mbr_sig_buffer) == 0x290);
    assert!(offset_of!(BootParams, eddbuf) == 0xd00);

    assert!(offset_of!(SetupHeader, vid_mode) == 0x1fa - 0x1f1);
    assert!(offset_of!(SetupHeader, realmode_swtch) == 0x208 - 0x1f1);
    assert!(offset_of!(SetupHeader, loadflags) == 0x211 - 0x1f1);
    assert!(offset_of!(SetupHeader, code32_start) == 0x214 - 0x1f1);
    assert!(offset_of!(SetupHeader, heap_end_ptr) == 0x224 - 0x1f1);
    assert!(offset_of!(SetupHeader, cmd_line_ptr) == 0x228 - 0x1f1);
};

/// Saturating view over an (array, count) pair of the record.
///
/// Inserts past capacity are dropped and leave the count untouched.
pub struct BoundedTable<'a, T> {
    slots: &'a mut [T],
    count: &'a mut u8,
}

impl<'a, T: Copy> BoundedTable<'a, T> {
    pub fn new(slots: &'a mut [T], count: &'a mut u8) -> Self {
        Self { slots, count }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        (*self.count as usize).min(self.slots.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity()
    }

    /// Append `item`; returns `false` (and stores nothing) when full.
    pub fn push(&mut self, item: T) -> bool {
        let n = self.len();
        if n >= self.capacity() {
            return false;
        }
        self.slots[n] = item;
        *self.count = (n + 1) as u8;
        true
    }

    /// Fill positional slot `index`, raising the count to cover it.
    pub fn set(&mut self, index: usize, item: T) -> bool {
        if index >= self.capacity() {
            return false;
        }
        self.slots[index] = item;
        if self.len() < index + 1 {
            *self.count = (index + 1) as u8;
        }
        true
    }

    pub fn get(&self, index: usize) -> Option<T> {
        if index < self.len() {
            Some(self.slots[index])
        } else {
            None
        }
    }
}

impl BootParams {
    pub const fn zeroed() -> Self {
        // SAFETY: integer-only record; all-zero is valid.
        unsafe { core::mem::zeroed() }
    }

    pub fn edd_table(&mut self) -> BoundedTable<'_, EddInfo> {
        BoundedTable::new(&mut self.eddbuf, &mut self.eddbuf_entries)
    }

    pub fn mbr_sig_table(&mut self) -> BoundedTable<'_, [u8; 4]> {
        BoundedTable::new(&mut self.edd_mbr_sig_buffer, &mut self.edd_mbr_sig_buf_entries)
    }

    pub fn edd_entry(&self, index: usize) -> Option<EddInfo> {
        if index < (self.eddbuf_entries as usize).min(EDDMAXNR) {
            Some(self.eddbuf[index])
        } else {
            None
        }
    }

    /// Signature recorded for slot `index`; zero means "not read".
    pub fn mbr_signature(&self, index: usize) -> Option<u32> {
        if index < (self.edd_mbr_sig_buf_entries as usize).min(EDD_MBR_SIG_MAX) {
            Some(u32::from_le_bytes(self.edd_mbr_sig_buffer[index]))
        } else {
            None
        }
    }

    /// The power-management record is written only after a verified connect.
    pub fn has_apm(&self) -> bool {
        let version = self.apm_bios_info.version;
        version != 0
    }
}
