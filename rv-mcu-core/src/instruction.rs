//! Instruction field extraction and immediate generation.
//!
//! Decoding stops at the field level: which operation a `(opcode, funct3, funct7)` triple selects
//! is decided by the control units in [`crate::alu`] and by the executor.

use crate::registers::Specifier;
use thiserror::Error;

/// Major opcodes (bits `[6:0]`) supported by this core.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Opcode {
    Lui,
    Auipc,
    Jal,
    Jalr,
    Branch,
    Load,
    Store,
    OpImm,
    Op,
    MiscMem,
    System,
}

impl Opcode {
    /// Maps the lowest seven bits of `raw_instruction` onto an opcode, returning `None` for any
    /// opcode outside RV32I.
    #[allow(clippy::unusual_byte_groupings)]
    pub fn decode(raw_instruction: u32) -> Option<Self> {
        // Grouped as inst[6:5] inst[4:2] inst[1:0], like the opcode map in the ISA manual.
        match raw_instruction & 0x7f {
            0b00_000_11 => Some(Self::Load),
            0b00_011_11 => Some(Self::MiscMem),
            0b00_100_11 => Some(Self::OpImm),
            0b00_101_11 => Some(Self::Auipc),
            0b01_000_11 => Some(Self::Store),
            0b01_100_11 => Some(Self::Op),
            0b01_101_11 => Some(Self::Lui),
            0b11_000_11 => Some(Self::Branch),
            0b11_001_11 => Some(Self::Jalr),
            0b11_011_11 => Some(Self::Jal),
            0b11_100_11 => Some(Self::System),
            _ => None,
        }
    }
}

/// The 12-bit `funct12` immediates of the `SYSTEM` instructions with `funct3 == 0`.
pub mod funct12 {
    pub const ECALL: u32 = 0x000;
    pub const EBREAK: u32 = 0x001;
    /// Returns from a user-mode trap handler, which does not exist in this profile.
    pub const URET: u32 = 0x002;
    pub const WFI: u32 = 0x105;
    pub const MRET: u32 = 0x302;
}

/// An instruction word split into its fields.
///
/// Which fields are meaningful depends on the instruction format, but all of them are always
/// extracted. `immediate` holds the output of [`immediate`] for this word.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Fields {
    pub raw: u32,
    pub opcode: Opcode,
    pub funct3: u32,
    pub funct7: u32,
    pub rd: Specifier,
    pub rs1: Specifier,
    pub rs2: Specifier,
    pub immediate: u32,
}

impl Fields {
    /// Splits `raw_instruction` into its fields.
    ///
    /// Only the opcode is validated here; reserved `funct3`/`funct7` combinations are rejected
    /// when the instruction is executed.
    pub fn decode(raw_instruction: u32) -> Result<Self, DecodeError> {
        let opcode = Opcode::decode(raw_instruction)
            .ok_or(DecodeError::UnsupportedOpcode(raw_instruction & 0x7f))?;
        Ok(Self {
            raw: raw_instruction,
            opcode,
            funct3: funct3(raw_instruction),
            funct7: funct7(raw_instruction),
            rd: Specifier::from_u5(raw_instruction >> 7),
            rs1: Specifier::from_u5(raw_instruction >> 15),
            rs2: Specifier::from_u5(raw_instruction >> 20),
            immediate: immediate(opcode, raw_instruction),
        })
    }

    /// Returns the 12-bit CSR specifier of a `SYSTEM` instruction.
    pub fn csr(&self) -> u16 {
        (self.raw >> 20) as u16
    }
}

#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum DecodeError {
    #[error("unsupported opcode {0:#09b}")]
    UnsupportedOpcode(u32),
}

/// Generates the immediate operand encoded in `raw_instruction`.
///
/// The result is a sign-extended 32-bit value for every format except:
/// - U-type, which returns bits `[31:12]` in place with the low 12 bits zeroed,
/// - the shift-by-immediate instructions, which return the 5-bit shift amount,
/// - `SYSTEM`, which returns the zero-extended 12-bit CSR specifier (or `funct12`).
///
/// Opcodes without an immediate yield `0`.
pub fn immediate(opcode: Opcode, raw_instruction: u32) -> u32 {
    match opcode {
        Opcode::Lui | Opcode::Auipc => u_imm(raw_instruction),
        Opcode::Jal => j_imm(raw_instruction) as u32,
        Opcode::OpImm if matches!(funct3(raw_instruction), 0b001 | 0b101) => {
            shamt(raw_instruction)
        }
        Opcode::OpImm | Opcode::Jalr | Opcode::Load => i_imm(raw_instruction) as u32,
        Opcode::Branch => b_imm(raw_instruction) as u32,
        Opcode::Store => s_imm(raw_instruction) as u32,
        Opcode::System => raw_instruction >> 20,
        Opcode::Op | Opcode::MiscMem => 0,
    }
}

fn funct3(raw_instruction: u32) -> u32 {
    (raw_instruction >> 12) & 0b111
}

fn funct7(raw_instruction: u32) -> u32 {
    raw_instruction >> 25
}

fn shamt(raw_instruction: u32) -> u32 {
    (raw_instruction >> 20) & 0b1_1111
}

/// Extracts the sign-extended I-type immediate: `inst[31:20]`.
fn i_imm(raw_instruction: u32) -> i32 {
    raw_instruction as i32 >> 20
}

/// Extracts the sign-extended S-type immediate: `inst[31:25] | inst[11:7]`.
fn s_imm(raw_instruction: u32) -> i32 {
    let imm_11_5 = raw_instruction & 0xFE00_0000;
    let imm_4_0 = raw_instruction & 0x0000_0F80;
    (imm_11_5 | (imm_4_0 << 13)) as i32 >> 20
}

/// Extracts the sign-extended B-type immediate: `inst[31] | inst[7] | inst[30:25] | inst[11:8]`,
/// shifted left by one.
fn b_imm(raw_instruction: u32) -> i32 {
    let imm_12 = raw_instruction & 0x8000_0000;
    let imm_10_5 = raw_instruction & 0x7E00_0000;
    let imm_4_1 = raw_instruction & 0x0000_0F00;
    let imm_11 = raw_instruction & 0x0000_0080;
    (imm_12 | (imm_11 << 23) | (imm_10_5 >> 1) | (imm_4_1 << 12)) as i32 >> 19
}

/// Extracts the U-type immediate: `inst[31:12] << 12`.
fn u_imm(raw_instruction: u32) -> u32 {
    raw_instruction & 0xFFFF_F000
}

/// Extracts the sign-extended J-type immediate: `inst[31] | inst[19:12] | inst[20] | inst[30:21]`,
/// shifted left by one.
fn j_imm(raw_instruction: u32) -> i32 {
    let imm_20 = raw_instruction & 0x8000_0000;
    let imm_10_1 = raw_instruction & 0x7FE0_0000;
    let imm_11 = raw_instruction & 0x0010_0000;
    let imm_19_12 = raw_instruction & 0x000F_F000;
    (imm_20 | (imm_19_12 << 11) | (imm_11 << 2) | (imm_10_1 >> 9)) as i32 >> 11
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fields() {
        // add a2, a1, a0
        let fields = Fields::decode(0x00a5_8633).unwrap();
        assert_eq!(Opcode::Op, fields.opcode);
        assert_eq!(0, fields.funct3);
        assert_eq!(0, fields.funct7);
        assert_eq!(Specifier::new(12).unwrap(), fields.rd);
        assert_eq!(Specifier::new(11).unwrap(), fields.rs1);
        assert_eq!(Specifier::new(10).unwrap(), fields.rs2);
        // sub a2, a1, a0
        let fields = Fields::decode(0x40a5_8633).unwrap();
        assert_eq!(0b010_0000, fields.funct7);
    }

    #[test]
    fn test_unsupported_opcode() {
        // flw f0, 0(a0) (F extension)
        assert_eq!(
            Err(DecodeError::UnsupportedOpcode(0b000_0111)),
            Fields::decode(0x0005_2007)
        );
        assert!(Fields::decode(0).is_err());
    }

    #[test]
    fn test_i_imm() {
        // addi a1, a1, 15
        assert_eq!(15, immediate(Opcode::OpImm, 0x00f5_8593));
        // addi a0, zero, -1
        assert_eq!(0xFFFF_FFFF, immediate(Opcode::OpImm, 0xfff0_0513));
        // lw t2, 0(t0)
        assert_eq!(0, immediate(Opcode::Load, 0x0002_a383));
        // jalr zero, -4(ra)
        assert_eq!(-4i32 as u32, immediate(Opcode::Jalr, 0xffc0_8067));
    }

    #[test]
    fn test_shift_imm() {
        // srai a0, a0, 31
        assert_eq!(31, immediate(Opcode::OpImm, 0x41f5_5513));
        // slli a0, a0, 3
        assert_eq!(3, immediate(Opcode::OpImm, 0x0035_1513));
    }

    #[test]
    fn test_s_imm() {
        // sb t3, 3(t0)
        assert_eq!(3, immediate(Opcode::Store, 0x01c2_81a3));
        // sw t2, 8(t1)
        assert_eq!(8, immediate(Opcode::Store, 0x0073_2423));
        // sw a0, -4(sp)
        assert_eq!(-4i32 as u32, immediate(Opcode::Store, 0xfea1_2e23));
        // sw a0, 2047(sp)
        assert_eq!(2047, immediate(Opcode::Store, 0x7ea1_2fa3));
    }

    #[test]
    fn test_b_imm() {
        // beq a0, a1, 8
        assert_eq!(8, immediate(Opcode::Branch, 0x00b5_0463));
        // bne a0, a1, -8
        assert_eq!(-8i32 as u32, immediate(Opcode::Branch, 0xfeb5_1ce3));
        // blt a0, a1, 2048
        assert_eq!(2048, immediate(Opcode::Branch, 0x00b5_4063 | 1 << 7));
        // bge a0, a1, -4096
        assert_eq!(-4096i32 as u32, immediate(Opcode::Branch, 0x80b5_5063));
    }

    #[test]
    fn test_u_imm() {
        // lui t0, 0x80000
        assert_eq!(0x8000_0000, immediate(Opcode::Lui, 0x8000_02b7));
        // auipc a0, 0x12345
        assert_eq!(0x1234_5000, immediate(Opcode::Auipc, 0x1234_5517));
    }

    #[test]
    fn test_j_imm() {
        // jal zero, 0
        assert_eq!(0, immediate(Opcode::Jal, 0x0000_006f));
        // jal ra, 2048
        assert_eq!(2048, immediate(Opcode::Jal, 0x0010_00ef));
        // jal zero, -8
        assert_eq!(-8i32 as u32, immediate(Opcode::Jal, 0xff9f_f06f));
        // jal zero, -1048576
        assert_eq!(-1_048_576i32 as u32, immediate(Opcode::Jal, 0x8000_006f));
    }

    #[test]
    fn test_system_imm() {
        // csrrw zero, mtvec, t0
        let fields = Fields::decode(0x3052_9073).unwrap();
        assert_eq!(0x305, fields.immediate);
        assert_eq!(0x305, fields.csr());
        // csrrs a0, mhartid, zero
        assert_eq!(0xF14, immediate(Opcode::System, 0xf140_2573));
        assert_eq!(funct12::MRET, immediate(Opcode::System, 0x3020_0073));
        assert_eq!(funct12::ECALL, immediate(Opcode::System, 0x0000_0073));
    }
}
