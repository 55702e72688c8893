use bitvec::{order::Lsb0, view::BitView};

use super::Interrupt;

const MACHINE_SOFTWARE_INTERRUPT: usize = Interrupt::MachineSoftwareInterrupt as usize;
const MACHINE_TIMER_INTERRUPT: usize = Interrupt::MachineTimerInterrupt as usize;

/// Layout shared by the mie and mip registers: one bit per interrupt, at the index of the
/// interrupt's code.
///
/// In mie the bits are the MSIE/MTIE/MEIE enable fields, in mip the MSIP/MTIP/MEIP pending fields.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct InterruptBits(u32);

impl InterruptBits {
    pub fn new() -> Self {
        Self(0)
    }

    /// Returns the raw register value.
    pub fn bits(&self) -> u32 {
        self.0
    }

    /// Replaces the raw register value.
    pub fn set_bits(&mut self, value: u32) {
        self.0 = value;
    }

    /// MSIE in mie, MSIP in mip.
    pub fn m_soft(&self) -> bool {
        self.0.view_bits::<Lsb0>()[MACHINE_SOFTWARE_INTERRUPT]
    }

    pub fn set_m_soft(&mut self, value: bool) {
        self.0
            .view_bits_mut::<Lsb0>()
            .set(MACHINE_SOFTWARE_INTERRUPT, value);
    }

    /// MTIE in mie, MTIP in mip.
    pub fn m_timer(&self) -> bool {
        self.0.view_bits::<Lsb0>()[MACHINE_TIMER_INTERRUPT]
    }

    pub fn set_m_timer(&mut self, value: bool) {
        self.0
            .view_bits_mut::<Lsb0>()
            .set(MACHINE_TIMER_INTERRUPT, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_positions() {
        let mut bits = InterruptBits::new();
        bits.set_m_soft(true);
        assert_eq!(1 << 3, bits.bits());
        bits.set_m_timer(true);
        assert_eq!(1 << 3 | 1 << 7, bits.bits());
        bits.set_m_soft(false);
        assert_eq!(1 << 7, bits.bits());
    }

    #[test]
    fn test_set_bits() {
        let mut bits = InterruptBits::new();
        bits.set_bits(0x80);
        assert!(bits.m_timer());
        assert!(!bits.m_soft());
    }
}
