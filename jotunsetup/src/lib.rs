// SPDX-License-Identifier: JOSSL-1.0
// Copyright (C) 2025 The Jotunheim Project
//! Real-mode setup stage of the Jotunheim boot chain.
//!
//! Runs after the loader has placed the image below 1 MiB: interrogates the
//! legacy firmware (power management, disks, system description), selects a
//! text mode and finally switches the CPU to 32-bit protected mode, handing
//! the filled [`bootparams::BootParams`] to the next stage.
//!
//! Everything except `arch` is target independent and tested on the host.

#![cfg_attr(not(test), no_std)]

pub mod apm;
pub mod bios;
pub mod bootparams;
pub mod config;
pub mod console;
pub mod edd;
pub mod heap;
pub mod logger;
pub mod mca;
pub mod pm;
pub mod setup;
pub mod video;

#[cfg(all(feature = "bios", target_arch = "x86"))]
pub mod arch;

#[cfg(test)]
pub(crate) mod testing;
