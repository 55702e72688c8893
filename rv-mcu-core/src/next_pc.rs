//! Next-pc selection and branch resolution.

use crate::core::{Exception, Fault};
use crate::instruction::{funct12, Opcode};
use crate::Alignment;

/// Returns `true` if a conditional branch with this `funct3` is taken for operands `a` and `b`.
///
/// The reserved encodings `0b010` and `0b011` are never taken.
pub fn branch_taken(funct3: u32, a: u32, b: u32) -> bool {
    match funct3 {
        0b000 => a == b,
        0b001 => a != b,
        0b100 => (a as i32) < (b as i32),
        0b101 => (a as i32) >= (b as i32),
        0b110 => a < b,
        0b111 => a >= b,
        _ => false,
    }
}

/// Computes the address of the instruction following the one at `pc`.
///
/// `offset` is the instruction's immediate, `a` and `b` are the values of `rs1` and `rs2`.
/// Jumps and taken branches are relative to `pc`, except `jalr` which is relative to `a`. `mret`
/// continues at `mepc`. Everything else falls through to `pc + 4`.
///
/// Fails with an instruction-address-misaligned fault carrying the target if it is not
/// word-aligned.
pub fn calculate(
    pc: u32,
    offset: u32,
    opcode: Opcode,
    funct3: u32,
    a: u32,
    b: u32,
    mepc: u32,
) -> Result<u32, Fault> {
    let sequential = pc.wrapping_add(4);
    let target = match opcode {
        Opcode::Jal => pc.wrapping_add(offset),
        Opcode::Jalr => a.wrapping_add(offset),
        Opcode::Branch if branch_taken(funct3, a, b) => pc.wrapping_add(offset),
        Opcode::System if funct3 == 0 && offset == funct12::MRET => mepc,
        _ => sequential,
    };
    if Alignment::WORD.is_aligned(target) {
        Ok(target)
    } else {
        Err(Fault::new(Exception::InstructionAddressMisaligned, target))
    }
}
