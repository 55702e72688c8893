//! Core Local Interruptor
//!
//! Provides the cycle counter, the timer compare register, and the software interrupt flag. The
//! registers live in a little-endian byte buffer, so software may access them with any width.

use super::Memory;
use crate::address_range::{AddressRange, InvalidBoundsError};
use crate::bus::{AccessWidth, MemoryDevice, MemoryError};
use crate::core::csr::Csr;
use crate::core::Interrupt;

/// Fixed base address of the CLINT.
pub const BASE: u32 = 0x3000_0000;

pub const MCYCLE_LO: u32 = 0x0;
pub const MCYCLE_HI: u32 = MCYCLE_LO + 4;
pub const MTIMECMP_LO: u32 = 0x8;
pub const MTIMECMP_HI: u32 = MTIMECMP_LO + 4;
/// Reserved scratch word.
pub const RESERVED: u32 = 0x10;
pub const MSIP: u32 = 0x14;

/// Size of the register window, up to and including the msip word.
pub const SIZE: u32 = MSIP + 4;

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Clint {
    memory: Memory,
}

impl Clint {
    /// Create a new CLINT in reset state: all registers zero.
    pub fn new(base: u32) -> Result<Self, InvalidBoundsError> {
        Ok(Self {
            memory: Memory::new(base, SIZE)?,
        })
    }

    /// Restart the CLINT, setting every register to zero.
    pub fn reset(&mut self) {
        self.memory.clear();
    }

    pub fn mcycle(&self) -> u64 {
        self.memory.doubleword(MCYCLE_LO as usize)
    }

    pub fn mtimecmp(&self) -> u64 {
        self.memory.doubleword(MTIMECMP_LO as usize)
    }

    /// Returns `true` if the msip register holds exactly `1`.
    pub fn msip(&self) -> bool {
        self.memory.word(MSIP as usize) == 1
    }

    /// Advances the cycle counter by one and updates the MTIP bit in `csr`'s mip register.
    ///
    /// The MSIP bit of mip mirrors the msip register.
    pub fn advance_cycle(&mut self, csr: &mut Csr) {
        let mcycle = self.mcycle().wrapping_add(1);
        self.memory.set_doubleword(MCYCLE_LO as usize, mcycle);
        let pending = csr.pending_mut();
        pending.set_m_timer(mcycle >= self.mtimecmp());
        pending.set_m_soft(self.msip());
    }

    /// Returns the interrupt to take now, if any.
    ///
    /// Nothing is taken while mstatus.MIE is clear. Otherwise a pending software interrupt takes
    /// precedence over a pending timer interrupt, and each requires its enable bit in mie.
    pub fn poll_interrupts(&self, csr: &Csr) -> Option<Interrupt> {
        if !csr.status().mie() {
            return None;
        }
        let enabled = csr.enabled();
        if self.msip() && enabled.m_soft() {
            Some(Interrupt::MachineSoftwareInterrupt)
        } else if csr.pending().m_timer() && enabled.m_timer() {
            Some(Interrupt::MachineTimerInterrupt)
        } else {
            None
        }
    }

    /// The raw register window, starting at the CLINT base address.
    pub fn bytes(&self) -> &[u8] {
        self.memory.bytes()
    }
}

impl MemoryDevice for Clint {
    fn range(&self) -> AddressRange {
        self.memory.range()
    }

    fn read(&self, address: u32, width: AccessWidth) -> Result<u32, MemoryError> {
        self.memory.read(address, width)
    }

    fn write(&mut self, address: u32, value: u32, width: AccessWidth) -> Result<(), MemoryError> {
        self.memory.write(address, value, width)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enable_all(csr: &mut Csr) {
        csr.status_mut().set_mie(true);
        csr.enabled_mut().set_m_timer(true);
        csr.enabled_mut().set_m_soft(true);
    }

    #[test]
    fn test_register_layout() {
        let mut clint = Clint::new(BASE).unwrap();
        clint
            .write(BASE + MTIMECMP_LO, 0x8765_4321, AccessWidth::Word)
            .unwrap();
        clint
            .write(BASE + MTIMECMP_HI, 0x1, AccessWidth::Word)
            .unwrap();
        assert_eq!(0x1_8765_4321, clint.mtimecmp());
        clint.write(BASE + MSIP, 1, AccessWidth::Word).unwrap();
        assert!(clint.msip());
        assert_eq!(Ok(1), clint.read(BASE + MSIP, AccessWidth::Byte));
        assert_eq!(0x18, clint.size());
    }

    #[test]
    fn test_advance_cycle_sets_mtip() {
        let mut clint = Clint::new(BASE).unwrap();
        let mut csr = Csr::new();
        clint
            .write(BASE + MTIMECMP_LO, 2, AccessWidth::Word)
            .unwrap();
        clint.advance_cycle(&mut csr);
        assert_eq!(1, clint.mcycle());
        assert!(!csr.pending().m_timer());
        clint.advance_cycle(&mut csr);
        assert_eq!(2, clint.mcycle());
        assert!(csr.pending().m_timer());
        // Moving the compare value ahead clears the pending bit again.
        clint
            .write(BASE + MTIMECMP_LO, 10, AccessWidth::Word)
            .unwrap();
        clint.advance_cycle(&mut csr);
        assert!(!csr.pending().m_timer());
    }

    #[test]
    fn test_mcycle_carries_into_high_word() {
        let mut clint = Clint::new(BASE).unwrap();
        let mut csr = Csr::new();
        clint
            .write(BASE + MCYCLE_LO, u32::MAX, AccessWidth::Word)
            .unwrap();
        clint
            .write(BASE + MTIMECMP_HI, u32::MAX, AccessWidth::Word)
            .unwrap();
        clint.advance_cycle(&mut csr);
        assert_eq!(Ok(0), clint.read(BASE + MCYCLE_LO, AccessWidth::Word));
        assert_eq!(Ok(1), clint.read(BASE + MCYCLE_HI, AccessWidth::Word));
    }

    #[test]
    fn test_poll_requires_global_enable() {
        let mut clint = Clint::new(BASE).unwrap();
        let mut csr = Csr::new();
        enable_all(&mut csr);
        csr.status_mut().set_mie(false);
        clint.advance_cycle(&mut csr);
        assert!(csr.pending().m_timer());
        assert_eq!(None, clint.poll_interrupts(&csr));
        csr.status_mut().set_mie(true);
        assert_eq!(
            Some(Interrupt::MachineTimerInterrupt),
            clint.poll_interrupts(&csr)
        );
    }

    #[test]
    fn test_poll_requires_individual_enable() {
        let mut clint = Clint::new(BASE).unwrap();
        let mut csr = Csr::new();
        csr.status_mut().set_mie(true);
        clint.write(BASE + MSIP, 1, AccessWidth::Word).unwrap();
        clint.advance_cycle(&mut csr);
        assert_eq!(None, clint.poll_interrupts(&csr));
        csr.enabled_mut().set_m_timer(true);
        assert_eq!(
            Some(Interrupt::MachineTimerInterrupt),
            clint.poll_interrupts(&csr)
        );
    }

    #[test]
    fn test_software_before_timer() {
        let mut clint = Clint::new(BASE).unwrap();
        let mut csr = Csr::new();
        enable_all(&mut csr);
        clint.write(BASE + MSIP, 1, AccessWidth::Word).unwrap();
        clint.advance_cycle(&mut csr);
        assert!(csr.pending().m_timer());
        assert!(csr.pending().m_soft());
        assert_eq!(
            Some(Interrupt::MachineSoftwareInterrupt),
            clint.poll_interrupts(&csr)
        );
        clint.write(BASE + MSIP, 0, AccessWidth::Word).unwrap();
        assert_eq!(
            Some(Interrupt::MachineTimerInterrupt),
            clint.poll_interrupts(&csr)
        );
    }

    #[test]
    fn test_msip_requires_exactly_one() {
        let mut clint = Clint::new(BASE).unwrap();
        let mut csr = Csr::new();
        enable_all(&mut csr);
        clint
            .write(BASE + MTIMECMP_HI, u32::MAX, AccessWidth::Word)
            .unwrap();
        clint.write(BASE + MSIP, 3, AccessWidth::Word).unwrap();
        assert!(!clint.msip());
        clint.advance_cycle(&mut csr);
        assert!(!csr.pending().m_soft());
        assert_eq!(None, clint.poll_interrupts(&csr));
        clint.write(BASE + MSIP + 1, 1, AccessWidth::Byte).unwrap();
        clint.write(BASE + MSIP, 1, AccessWidth::Byte).unwrap();
        assert!(!clint.msip());
        clint.write(BASE + MSIP, 1, AccessWidth::Word).unwrap();
        assert!(clint.msip());
    }

    #[test]
    fn test_reset() {
        let mut clint = Clint::new(BASE).unwrap();
        let mut csr = Csr::new();
        clint.advance_cycle(&mut csr);
        clint.reset();
        assert_eq!(0, clint.mcycle());
    }
}
