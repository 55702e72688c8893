//! The arithmetic/logic unit and the two small control decoders feeding the datapath.

use crate::bus::AccessWidth;
use crate::instruction::Opcode;
use std::fmt;

/// Operation selector for [`execute`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum AluOp {
    Add,
    Sub,
    Or,
    And,
    Xor,
    /// Logical right shift.
    Srl,
    /// Arithmetic right shift.
    Sra,
    Sll,
    /// Signed less-than.
    Slt,
    /// Unsigned less-than.
    Sltu,
}

impl fmt::Display for AluOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AluOp::Add => "add",
            AluOp::Sub => "sub",
            AluOp::Or => "or",
            AluOp::And => "and",
            AluOp::Xor => "xor",
            AluOp::Srl => "srl",
            AluOp::Sra => "sra",
            AluOp::Sll => "sll",
            AluOp::Slt => "slt",
            AluOp::Sltu => "sltu",
        })
    }
}

/// Computes `a op b`.
///
/// > Arithmetic overflow is ignored and the result is simply the low XLEN bits of the result.
///
/// Shift amounts are the lowest five bits of `b`.
pub fn execute(a: u32, b: u32, op: AluOp) -> u32 {
    let shamt = b & 0b1_1111;
    match op {
        AluOp::Add => a.wrapping_add(b),
        AluOp::Sub => a.wrapping_sub(b),
        AluOp::Or => a | b,
        AluOp::And => a & b,
        AluOp::Xor => a ^ b,
        AluOp::Srl => a >> shamt,
        AluOp::Sra => ((a as i32) >> shamt) as u32,
        AluOp::Sll => a << shamt,
        AluOp::Slt => ((a as i32) < (b as i32)) as u32,
        AluOp::Sltu => (a < b) as u32,
    }
}

/// Selects the ALU operation for an instruction.
///
/// Address computations (loads, stores, jumps, `auipc`) and `lui` add, branches subtract.
/// Register-immediate and register-register instructions select by `funct3`, where `funct7` bit 5
/// distinguishes `sub` from `add` (register-register only) and `sra` from `srl`.
pub fn control(opcode: Opcode, funct7: u32, funct3: u32) -> AluOp {
    let alternate = funct7 & 0b010_0000 != 0;
    match opcode {
        Opcode::Branch => AluOp::Sub,
        Opcode::Op | Opcode::OpImm => match funct3 & 0b111 {
            0b000 if opcode == Opcode::Op && alternate => AluOp::Sub,
            0b000 => AluOp::Add,
            0b001 => AluOp::Sll,
            0b010 => AluOp::Slt,
            0b011 => AluOp::Sltu,
            0b100 => AluOp::Xor,
            0b101 if alternate => AluOp::Sra,
            0b101 => AluOp::Srl,
            0b110 => AluOp::Or,
            _ => AluOp::And,
        },
        Opcode::Lui
        | Opcode::Auipc
        | Opcode::Jal
        | Opcode::Jalr
        | Opcode::Load
        | Opcode::Store
        | Opcode::MiscMem
        | Opcode::System => AluOp::Add,
    }
}

/// Returns the memory access width selected by the `funct3` field of a load or store, or `None` for
/// the reserved encodings.
pub fn access_width(funct3: u32) -> Option<AccessWidth> {
    match funct3 & 0b011 {
        0b00 => Some(AccessWidth::Byte),
        0b01 => Some(AccessWidth::Halfword),
        0b10 => Some(AccessWidth::Word),
        _ => None,
    }
}

/// Returns `true` if a load with this `funct3` zero-extends rather than sign-extends.
pub fn is_unsigned_load(funct3: u32) -> bool {
    funct3 & 0b100 != 0
}
