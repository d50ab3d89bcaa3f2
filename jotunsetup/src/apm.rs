// SPDX-License-Identifier: JOSSL-1.0
// Copyright (C) 2025 The Jotunheim Project
//! APM BIOS discovery and 32-bit protected-mode interface connect.

use crate::bios::{BiosError, Firmware, vector};
use crate::bootparams::{ApmBiosInfo, ApmFlags};
use core::fmt;
use log::{debug, info};

/// "PM" as returned in BX by the installation check.
pub const APM_SIGNATURE: u16 = 0x504d;

const APM_FUNC: u8 = 0x53;
const INSTALLATION_CHECK: u8 = 0x00;
const CONNECT_32BIT: u8 = 0x03;
const DISCONNECT: u8 = 0x04;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApmError {
    NotPresent(BiosError),
    BadSignature(u16),
    No32BitSupport,
    ConnectFailed(BiosError),
    /// The installation check failed after a successful connect.
    Unverified,
}

impl fmt::Display for ApmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApmError::NotPresent(e) => write!(f, "APM BIOS not present: {e}"),
            ApmError::BadSignature(bx) => write!(f, "bad APM signature {bx:#06x}"),
            ApmError::No32BitSupport => f.write_str("APM BIOS lacks 32-bit support"),
            ApmError::ConnectFailed(e) => write!(f, "APM 32-bit connect failed: {e}"),
            ApmError::Unverified => f.write_str("APM check after connect failed"),
        }
    }
}

fn disconnect<F: Firmware>(fw: &mut F) {
    let mut ireg = fw.initregs();
    ireg.set_ah(APM_FUNC);
    ireg.set_al(DISCONNECT);
    let _ = fw.intcall(vector::SYSTEM, &ireg, None);
}

/// Run the handshake and return the record to store.
///
/// The record is only produced once the whole sequence has succeeded; on any
/// failure after the connect the interface is disconnected again.
pub fn query_apm_bios<F: Firmware>(fw: &mut F) -> Result<ApmBiosInfo, ApmError> {
    let mut ireg = fw.initregs();
    ireg.set_ah(APM_FUNC);
    ireg.set_al(INSTALLATION_CHECK);
    let oreg = fw.call(vector::SYSTEM, &ireg, None).map_err(ApmError::NotPresent)?;
    if oreg.bx() != APM_SIGNATURE {
        return Err(ApmError::BadSignature(oreg.bx()));
    }
    if !ApmFlags::from_bits_retain(oreg.cx()).contains(ApmFlags::SUPPORT_32_BIT) {
        return Err(ApmError::No32BitSupport);
    }

    disconnect(fw);

    ireg.set_al(CONNECT_32BIT);
    let oreg = fw.call(vector::SYSTEM, &ireg, None).map_err(ApmError::ConnectFailed)?;
    let mut info = ApmBiosInfo {
        version: 0,
        cseg: oreg.ax(),
        offset: oreg.ebx,
        cseg_16: oreg.cx(),
        dseg: oreg.dx(),
        flags: 0,
        cseg_len: oreg.si(),
        cseg_16_len: oreg.hsi(),
        dseg_len: oreg.di(),
    };

    // Some BIOSes only report the real flags once connected.
    ireg.set_al(INSTALLATION_CHECK);
    let oreg = match fw.call(vector::SYSTEM, &ireg, None) {
        Ok(o) if o.bx() == APM_SIGNATURE => o,
        _ => {
            disconnect(fw);
            return Err(ApmError::Unverified);
        }
    };
    info.version = oreg.ax();
    info.flags = oreg.cx();

    info!(
        "APM {}.{} connected, flags {:#x}",
        info.version >> 8,
        info.version & 0xff,
        { info.flags }
    );
    debug!(
        "APM cseg {:#06x} off {:#x} dseg {:#06x}",
        { info.cseg },
        { info.offset },
        { info.dseg }
    );
    Ok(info)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bios::BiosRegs;
    use crate::testing::{MockBios, fail, ok};
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct ApmState {
        connected: bool,
        connect_fails: bool,
        recheck_fails: bool,
        checks: usize,
    }

    fn apm_bios(state: Rc<RefCell<ApmState>>) -> MockBios {
        let mut fw = MockBios::new();
        fw.on(vector::SYSTEM, move |_, r: &BiosRegs, _| {
            let mut s = state.borrow_mut();
            if r.ah() != APM_FUNC {
                return *r;
            }
            match r.al() {
                INSTALLATION_CHECK => {
                    s.checks += 1;
                    if s.checks > 1 && s.recheck_fails {
                        return fail(r, 0x86);
                    }
                    let mut o = ok(r);
                    o.set_ax(0x0102);
                    o.set_bx(APM_SIGNATURE);
                    o.set_cx(if s.connected { 0x0003 } else { 0x0002 });
                    o
                }
                DISCONNECT => {
                    s.connected = false;
                    ok(r)
                }
                CONNECT_32BIT => {
                    if s.connect_fails {
                        return fail(r, 0x05);
                    }
                    s.connected = true;
                    let mut o = ok(r);
                    o.set_ax(0xf000);
                    o.ebx = 0x0000_8000;
                    o.set_cx(0xf000);
                    o.set_dx(0x0040);
                    o.esi = 0xfff0_ffff;
                    o.set_di(0x0400);
                    o
                }
                _ => fail(r, 0x86),
            }
        });
        fw
    }

    #[test]
    fn full_handshake_records_connection() {
        let state = Rc::new(RefCell::new(ApmState::default()));
        let mut fw = apm_bios(state.clone());
        let info = query_apm_bios(&mut fw).unwrap();
        assert_eq!({ info.version }, 0x0102);
        assert_eq!(info.flags(), ApmFlags::SUPPORT_16_BIT | ApmFlags::SUPPORT_32_BIT);
        assert_eq!({ info.cseg }, 0xf000);
        assert_eq!({ info.offset }, 0x8000);
        assert_eq!({ info.dseg }, 0x0040);
        assert_eq!({ info.cseg_len }, 0xffff);
        assert_eq!({ info.cseg_16_len }, 0xfff0);
        assert_eq!({ info.dseg_len }, 0x0400);
        assert!(state.borrow().connected);
        let seq: Vec<u8> = fw.calls_to(vector::SYSTEM).iter().map(|r| r.al()).collect();
        assert_eq!(seq, vec![0x00, 0x04, 0x03, 0x00]);
    }

    #[test]
    fn missing_bios_is_not_present() {
        let mut fw = MockBios::new();
        assert!(matches!(query_apm_bios(&mut fw), Err(ApmError::NotPresent(_))));
        assert_eq!(fw.calls.len(), 1);
    }

    #[test]
    fn wrong_signature_or_16bit_only_rejected() {
        let mut fw = MockBios::new();
        fw.on(vector::SYSTEM, |_, r, _| {
            let mut o = ok(r);
            o.set_bx(0x1234);
            o
        });
        assert_eq!(query_apm_bios(&mut fw), Err(ApmError::BadSignature(0x1234)));

        let mut fw = MockBios::new();
        fw.on(vector::SYSTEM, |_, r, _| {
            let mut o = ok(r);
            o.set_bx(APM_SIGNATURE);
            o.set_cx(0x0001);
            o
        });
        assert_eq!(query_apm_bios(&mut fw), Err(ApmError::No32BitSupport));
        assert_eq!(fw.calls.len(), 1);
    }

    #[test]
    fn connect_failure_leaves_interface_disconnected() {
        let state = Rc::new(RefCell::new(ApmState {
            connected: true,
            connect_fails: true,
            ..Default::default()
        }));
        let mut fw = apm_bios(state.clone());
        assert!(matches!(query_apm_bios(&mut fw), Err(ApmError::ConnectFailed(_))));
        assert!(!state.borrow().connected);
        assert_eq!(fw.calls.len(), 3);
    }

    #[test]
    fn failed_recheck_disconnects_again() {
        let state = Rc::new(RefCell::new(ApmState {
            recheck_fails: true,
            ..Default::default()
        }));
        let mut fw = apm_bios(state.clone());
        assert_eq!(query_apm_bios(&mut fw), Err(ApmError::Unverified));
        assert!(!state.borrow().connected);
        let last = *fw.calls_to(vector::SYSTEM).last().unwrap();
        assert_eq!(last.al(), DISCONNECT);
    }
}
