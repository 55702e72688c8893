//! General purpose registers and the program counter.

use std::fmt;
use std::fmt::Formatter;

/// The type of a single `x` register.
pub type X = u32;

/// The bit width of the `x` registers.
pub const XLEN: u32 = X::BITS;

/// The number of `x` registers available (indices start at `0` for `x0`)
pub const LEN: u8 = 32;

/// ABI mnemonics of the `x` registers, indexed by register number.
const ABI_NAMES: [&str; LEN as usize] = [
    "zero", "ra", "sp", "gp", "tp", "t0", "t1", "t2", "s0", "s1", "a0", "a1", "a2", "a3", "a4",
    "a5", "a6", "a7", "s2", "s3", "s4", "s5", "s6", "s7", "s8", "s9", "s10", "s11", "t3", "t4",
    "t5", "t6",
];

/// The register file of the core together with its program counter.
///
/// There are 32 `x` word-size (32 bit) registers, named `x0` up to `x31`.
/// The register `x0` (aka `zero`) is always zero. Writes to it are ignored.
/// There is also the `pc` register which holds the address of the instruction to fetch next.
///
/// > For RV32I, the 32 x registers are each 32 bits wide, i.e., XLEN=32. Register x0 is hardwired
/// > with all bits equal to 0.
///
/// It is not possible to get a mutable reference to an `x` register, since that would allow
/// unchecked writes to register `x0`.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Registers {
    x_registers: [X; LEN as usize],
    pc: u32,
}

impl Default for Registers {
    fn default() -> Self {
        Self::new(0)
    }
}

impl Registers {
    /// Returns a fresh set of all-zero `x` registers with the `pc` set to `initial_pc`.
    pub fn new(initial_pc: u32) -> Self {
        Self {
            x_registers: [0; LEN as usize],
            pc: initial_pc,
        }
    }

    /// Returns the value of an `x` register.
    pub fn x(&self, specifier: Specifier) -> u32 {
        self.x_registers[usize::from(specifier)]
    }

    /// Sets the value of an `x` register.
    ///
    /// Writes to register `x0` are ignored.
    pub fn set_x(&mut self, specifier: Specifier, value: u32) {
        self.replace_x(specifier, value);
    }

    /// Replaces the value of an `x` register, returning its old value.
    ///
    /// Writes to register `x0` are ignored.
    pub fn replace_x(&mut self, specifier: Specifier, value: u32) -> u32 {
        if specifier == Specifier::X0 {
            0
        } else {
            std::mem::replace(&mut self.x_registers[usize::from(specifier)], value)
        }
    }

    /// Returns all `x` registers in order, `x0` included.
    pub fn all_x(&self) -> &[X; LEN as usize] {
        &self.x_registers
    }

    /// Returns the value of the `pc` register.
    pub fn pc(&self) -> u32 {
        self.pc
    }

    /// Returns a mutable reference to the `pc` register value.
    pub fn pc_mut(&mut self) -> &mut u32 {
        &mut self.pc
    }
}

/// An `x` register specifier. Can take values in the range `0..LEN`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Specifier(u8);

impl Specifier {
    /// Register `x0`, a.k.a. register `zero`, always returns `0` on read, and ignores any writes.
    pub const X0: Self = Specifier(0);

    /// Create a register specifier from its index, returning `None` if `index > 31`.
    pub fn new<U: TryInto<u8>>(index: U) -> Option<Self> {
        let index = index.try_into().ok()?;
        (index < LEN).then_some(Self(index))
    }

    /// Convert a 5-bit register field into a register specifier.
    /// Bits above the lowest five are ignored, so any instruction field can be passed directly.
    pub fn from_u5(value_u5: u32) -> Self {
        const_assert_eq!(LEN, 32);
        Self((value_u5 & 0b1_1111) as u8)
    }

    /// Return an iterator over all register specifier, starting at x0 up to x31.
    pub fn iter_all() -> impl Iterator<Item = Self> {
        (0..LEN).map(Self)
    }

    /// Returns the calling convention name of this register, e.g. `a0` for `x10`.
    pub fn abi_name(self) -> &'static str {
        ABI_NAMES[usize::from(self)]
    }
}

impl From<Specifier> for u8 {
    fn from(value: Specifier) -> Self {
        value.0
    }
}

impl From<Specifier> for u32 {
    fn from(value: Specifier) -> Self {
        value.0 as u32
    }
}

impl From<Specifier> for usize {
    fn from(value: Specifier) -> Self {
        value.0 as usize
    }
}

impl fmt::Display for Specifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "x{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants() {
        assert_eq!(32, XLEN);
        const_assert!(LEN > 1);
    }

    #[test]
    fn test_write_to_zero() {
        let mut registers = Registers::default();
        for value in [0, 1, 0x8000_0000, 0xDEAD_BEEF, u32::MAX] {
            registers.set_x(Specifier::X0, value);
            assert_eq!(0, registers.x(Specifier::X0));
        }
        assert_eq!(0, registers.pc());
    }

    #[test]
    fn test_write_to_pc() {
        let mut registers = Registers::new(0x100);
        assert_eq!(0x100, registers.pc());
        *registers.pc_mut() = 0xDEADBEEF;
        assert_eq!(0xDEADBEEF, registers.pc());
        assert_eq!(0, registers.x(Specifier::X0));
    }

    #[test]
    fn test_set_x() {
        let mut registers = Registers::default();
        registers.set_x(Specifier::X0, 1);
        for i in 1..LEN {
            registers.set_x(Specifier::from_u5(i as u32), i as u32 + 1);
        }
        assert_eq!(0, registers.x(Specifier::X0));
        for i in 1..LEN {
            assert_eq!(i as u32 + 1, registers.x(Specifier::from_u5(i as u32)));
        }
    }

    #[test]
    fn test_replace_x() {
        let mut registers = Registers::default();
        assert_eq!(0, registers.replace_x(Specifier::X0, 7));
        for i in 1..LEN {
            assert_eq!(0, registers.replace_x(Specifier::from_u5(i as u32), i as u32));
        }
        for i in 1..LEN {
            assert_eq!(
                i as u32,
                registers.replace_x(Specifier::from_u5(i as u32), i as u32 + 1)
            );
        }
        assert_eq!(0, registers.x(Specifier::X0));
    }

    #[test]
    fn test_specifier() {
        assert_eq!(None, Specifier::new(32));
        assert_eq!(Some(Specifier::X0), Specifier::new(0));
        assert_eq!(Specifier::new(11).unwrap(), Specifier::from_u5(11 | 0b10_0000));
        assert_eq!("a1", Specifier::from_u5(11).abi_name());
        assert_eq!("x11", Specifier::from_u5(11).to_string());
        assert_eq!(32, Specifier::iter_all().count());
    }
}
