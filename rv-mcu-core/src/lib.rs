#[macro_use]
extern crate static_assertions;

use std::fmt;

pub mod address_range;
pub mod alu;
pub mod bus;
pub mod core;
pub mod instruction;
pub mod next_pc;
pub mod registers;
pub mod resources;

/// Re-export of [`AddressRange`] for convenience.
pub use address_range::AddressRange;

/// Re-export of the execution engine and its configuration, the main entry points of this crate.
pub use crate::core::{Config, Core, TickError};

/// List of all possible privilege levels for RISC-V, as encoded in a 2-bit field such as MPP.
///
/// Only machine mode is ever entered by this core, but the other encodings can still be written to
/// (and read back from) mstatus by software.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd)]
pub enum RawPrivilegeLevel {
    User = 0,
    Supervisor = 1,
    /// Privilege level `0b10` is reserved in the base ISA.
    Reserved = 2,
    Machine = 3,
}

impl RawPrivilegeLevel {
    /// Convert a 2-bit value into a [`RawPrivilegeLevel`].
    /// Only the two lowest bits of `value_u2` are considered.
    pub fn from_u2(value_u2: u8) -> Self {
        match value_u2 & 0b11 {
            0 => Self::User,
            1 => Self::Supervisor,
            2 => Self::Reserved,
            _ => Self::Machine,
        }
    }
}

impl fmt::Display for RawPrivilegeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match *self {
            RawPrivilegeLevel::User => "U",
            RawPrivilegeLevel::Supervisor => "S",
            RawPrivilegeLevel::Reserved => "2",
            RawPrivilegeLevel::Machine => "M",
        })
    }
}

pub mod unit {
    //! Collection of the units in which memory can be addressed (in bytes).

    /// A _byte_ is 8 bits.
    pub const BYTE: u32 = 1;

    /// A _halfword_ is 16 bits (2 bytes).
    pub const HALFWORD: u32 = 2;

    /// A _word_ is 32 bits (4 bytes).
    pub const WORD: u32 = 4;
}

/// Address alignment ranging from no alignment (`1`) to word alignment (`4`), which is the largest
/// unit this core ever accesses.
// Maintains the invariant that self.0 is a power of two.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Alignment(u32);

impl Alignment {
    /// Byte alignment is equivalent to no alignment.
    pub const BYTE: Self = Self(unit::BYTE);

    /// Halfword alignment means the address is a multiple of 2 (`address & 0b1 == 0`).
    pub const HALFWORD: Self = Self(unit::HALFWORD);

    /// Word alignment means the address is a multiple of 4 (`address & 0b11 == 0`).
    pub const WORD: Self = Self(unit::WORD);

    /// Returns `true` if `address` is aligned to this alignment.
    pub fn is_aligned(self, address: u32) -> bool {
        address & self.0.wrapping_sub(1) == 0
    }

    /// Rounds `address` up to the next multiple of this alignment, or returns `None` on overflow.
    pub fn align_up(self, address: u32) -> Option<u32> {
        let mask = self.0 - 1;
        address.checked_add(mask).map(|a| a & !mask)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alignment() {
        assert!(Alignment::BYTE.is_aligned(0x1001));
        assert!(!Alignment::HALFWORD.is_aligned(0x1001));
        assert!(Alignment::HALFWORD.is_aligned(0x1002));
        assert!(!Alignment::WORD.is_aligned(0x1002));
        assert!(Alignment::WORD.is_aligned(0x1004));
    }

    #[test]
    fn test_align_up() {
        assert_eq!(Some(0x7d4), Alignment::WORD.align_up(0x7d1));
        assert_eq!(Some(0x7d4), Alignment::WORD.align_up(0x7d4));
        assert_eq!(None, Alignment::WORD.align_up(u32::MAX));
    }

    #[test]
    fn test_raw_privilege_level() {
        assert_eq!(RawPrivilegeLevel::Machine, RawPrivilegeLevel::from_u2(3));
        assert_eq!(RawPrivilegeLevel::Reserved, RawPrivilegeLevel::from_u2(2));
        assert_eq!("M", RawPrivilegeLevel::Machine.to_string());
    }
}
