// SPDX-License-Identifier: JOSSL-1.0
// Copyright (C) 2025 The Jotunheim Project
//! Scratch heap between the end of the image and the loader's `heap_end_ptr`.
//!
//! Everything here is best effort: a `None` means "do without", never an error.

/// Headroom kept free below the heap end (stack grows towards it).
pub const HEAP_HEADROOM: usize = 512;

/// Slack the loader grants past `heap_end_ptr`.
pub const HEAP_SLACK: usize = 0x200;

/// Stack kept clear of the heap, measured down from the stack pointer.
pub const STACK_SIZE: usize = 1024;

/// Where the heap lies in the data segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapBounds {
    /// First byte past the image.
    pub start: u16,
    /// The loader's `heap_end_ptr`. Firmware transfer buffers end here.
    pub declared_end: u16,
    /// Allocation limit: `heap_end_ptr` plus slack, below the live stack.
    pub end: u16,
}

impl HeapBounds {
    /// Bounds for a heap starting at `start`, given the loader's
    /// `heap_end_ptr` and the current stack pointer. `None` when nothing is left.
    pub fn from_loader(start: u16, heap_end_ptr: u16, sp: u16) -> Option<Self> {
        let end = (heap_end_ptr as usize + HEAP_SLACK).min((sp as usize).saturating_sub(STACK_SIZE));
        if end <= start as usize {
            return None;
        }
        Some(Self {
            start,
            declared_end: heap_end_ptr.min(end as u16),
            end: end as u16,
        })
    }

    pub fn len(&self) -> usize {
        (self.end - self.start) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Bump allocator over the loader-granted heap.
pub struct ScratchHeap<'h> {
    /// Linear address of offset 0 in the data segment.
    seg_base: u32,
    /// Data-segment offset of `region[0]`.
    base: u16,
    /// Data-segment offset past which no firmware buffer may reach.
    declared_end: usize,
    region: &'h mut [u8],
    next: usize,
    usable: bool,
}

/// A buffer at a known data-segment offset, for firmware transfers.
pub struct Scratch<'a> {
    pub offset: u16,
    pub buf: &'a mut [u8],
}

impl<'h> ScratchHeap<'h> {
    /// A heap in segment 0 whose whole region may hold firmware buffers.
    pub fn new(base: u16, region: &'h mut [u8]) -> Self {
        Self {
            seg_base: 0,
            base,
            declared_end: base as usize + region.len(),
            region,
            next: 0,
            usable: true,
        }
    }

    /// The heap `bounds` describes, in data segment `ds`. `region` backs
    /// `bounds.start..bounds.end` and is cut to that length.
    pub fn from_bounds(ds: u16, bounds: HeapBounds, region: &'h mut [u8]) -> Self {
        let len = region.len().min(bounds.len());
        Self {
            seg_base: (ds as u32) << 4,
            base: bounds.start,
            declared_end: bounds.declared_end as usize,
            region: &mut region[..len],
            next: 0,
            usable: true,
        }
    }

    /// The loader did not set `CAN_USE_HEAP`.
    pub fn unusable() -> Self {
        Self {
            seg_base: 0,
            base: 0,
            declared_end: 0,
            region: &mut [],
            next: 0,
            usable: false,
        }
    }

    pub fn is_usable(&self) -> bool {
        self.usable
    }

    /// Bytes left before the end of the heap.
    pub fn free(&self) -> usize {
        self.region.len() - self.next
    }

    /// A temporary buffer past the bump pointer whose linear address is
    /// `align`-aligned and which ends at or before `heap_end_ptr`. Nothing
    /// is consumed; the next call may hand out the same bytes.
    pub fn aligned_scratch(&mut self, align: usize, len: usize) -> Option<Scratch<'_>> {
        if !self.usable || !align.is_power_of_two() {
            return None;
        }
        let seg_base = self.seg_base as usize;
        let linear = seg_base + self.base as usize + self.next;
        let offset = (linear.checked_add(align - 1)? & !(align - 1)) - seg_base;
        let end = offset.checked_add(len)?;
        if end > self.declared_end || end > self.base as usize + self.region.len() || end > 0x1_0000 {
            return None;
        }
        let start = offset - self.base as usize;
        Some(Scratch {
            offset: offset as u16,
            buf: &mut self.region[start..start + len],
        })
    }

    /// Take `len` bytes for good, provided [`HEAP_HEADROOM`] stays free.
    pub fn alloc(&mut self, len: usize) -> Option<&mut [u8]> {
        if !self.usable || self.free() < len.checked_add(HEAP_HEADROOM)? {
            return None;
        }
        let start = self.next;
        self.next += len;
        Some(&mut self.region[start..start + len])
    }

    pub fn reset(&mut self) {
        self.next = 0;
    }
}
