use bitvec::{field::BitField, order::Lsb0, view::BitView};

use crate::RawPrivilegeLevel;

/// Provides the mstatus register.
///
/// > The mstatus register is an MXLEN-bit read/write register [...]. The mstatus register keeps
/// > track of and controls the hart’s current operating state.
///
/// Only the machine-mode interrupt fields are interpreted by this core. Every other bit is stored
/// as written, so software reads back what it wrote.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Status {
    mstatus: u32,
}

impl Status {
    pub fn new() -> Self {
        Self { mstatus: 0 }
    }

    /// Returns the raw register value.
    pub fn bits(&self) -> u32 {
        self.mstatus
    }

    /// Replaces the raw register value.
    pub fn set_bits(&mut self, value: u32) {
        self.mstatus = value;
    }

    /// Returns `true` if the MIE (M-mode Interrupt Enable) bit is set.
    pub fn mie(&self) -> bool {
        self.mstatus.view_bits::<Lsb0>()[idx::MIE]
    }

    /// Sets the MIE (M-mode Interrupt Enable) bit to `value`.
    pub fn set_mie(&mut self, value: bool) {
        self.mstatus.view_bits_mut::<Lsb0>().set(idx::MIE, value);
    }

    /// Returns `true` if the MPIE (M-mode Previous Interrupt Enable) bit is set.
    pub fn mpie(&self) -> bool {
        self.mstatus.view_bits::<Lsb0>()[idx::MPIE]
    }

    /// Sets the MPIE (M-mode Previous Interrupt Enable) bit to `value`.
    pub fn set_mpie(&mut self, value: bool) {
        self.mstatus.view_bits_mut::<Lsb0>().set(idx::MPIE, value);
    }

    /// Returns the privilege level encoded by the MPP (M-mode Previous Privilege level) field.
    pub fn mpp(&self) -> RawPrivilegeLevel {
        RawPrivilegeLevel::from_u2(
            self.mstatus.view_bits::<Lsb0>()[idx::MPP..(idx::MPP + 2)].load_le(),
        )
    }

    /// Sets the privilege level encoded by the MPP (M-mode Previous Privilege level) field to
    /// `value`.
    pub fn set_mpp(&mut self, value: RawPrivilegeLevel) {
        self.mstatus.view_bits_mut::<Lsb0>()[idx::MPP..(idx::MPP + 2)].store_le(value as u8);
    }
}

/// Bit indices into mstatus register.
mod idx {
    pub const MIE: usize = 3;
    pub const MPIE: usize = 7;
    pub const MPP: usize = 11;
}
