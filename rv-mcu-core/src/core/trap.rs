//! Trap causes and trap entry.

use super::csr::Csr;
use crate::registers::Registers;
use crate::RawPrivilegeLevel;
use std::fmt;

/// Bit set in mcause for interrupts.
pub const INTERRUPT_BIT: u32 = 0x8000_0000;

/// Trap-table slot of exception code `0`. Exceptions are vectored behind the 16 interrupt slots.
pub const EXCEPTION_VECTOR_BASE: u32 = 16;

/// Synchronous traps, with their exception codes as discriminants.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Exception {
    /// Instruction address is not on a four-byte aligned boundary in memory.
    InstructionAddressMisaligned = 0,
    InstructionAccessFault = 1,
    /// Generic exception used to communicate one of many possible scenarios:
    ///
    /// - Attempt to decode an unsupported or reserved instruction.
    /// - Attempt to access a non-existent CSR.
    /// - Attempt to write to read-only memory.
    IllegalInstruction = 2,
    Breakpoint = 3,
    LoadAddressMisaligned = 4,
    LoadAccessFault = 5,
    StoreAddressMisaligned = 6,
    StoreAccessFault = 7,
    EnvironmentCallFromUMode = 8,
    EnvironmentCallFromSMode = 9,
    EnvironmentCallFromMMode = 11,
}

impl Exception {
    /// Returns the exception code (cause) for this exception.
    pub fn code(self) -> u32 {
        self as u32
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::InstructionAddressMisaligned => "instruction address misaligned",
            Self::InstructionAccessFault => "instruction access fault",
            Self::IllegalInstruction => "illegal instruction",
            Self::Breakpoint => "breakpoint",
            Self::LoadAddressMisaligned => "load address misaligned",
            Self::LoadAccessFault => "load access fault",
            Self::StoreAddressMisaligned => "store address misaligned",
            Self::StoreAccessFault => "store access fault",
            Self::EnvironmentCallFromUMode => "environment call from U-mode",
            Self::EnvironmentCallFromSMode => "environment call from S-mode",
            Self::EnvironmentCallFromMMode => "environment call from M-mode",
        })
    }
}

/// Asynchronous traps, with their interrupt codes as discriminants.
///
/// The discriminant is also the bit index of the interrupt in the mie and mip registers.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Interrupt {
    SupervisorSoftwareInterrupt = 1,
    MachineSoftwareInterrupt = 3,
    SupervisorTimerInterrupt = 5,
    MachineTimerInterrupt = 7,
    SupervisorExternalInterrupt = 9,
    MachineExternalInterrupt = 11,
}

impl Interrupt {
    /// Returns the exception code (cause) for this interrupt, without the interrupt bit.
    pub fn code(self) -> u32 {
        self as u32
    }
}

impl fmt::Display for Interrupt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::SupervisorSoftwareInterrupt => "supervisor software interrupt",
            Self::MachineSoftwareInterrupt => "machine software interrupt",
            Self::SupervisorTimerInterrupt => "supervisor timer interrupt",
            Self::MachineTimerInterrupt => "machine timer interrupt",
            Self::SupervisorExternalInterrupt => "supervisor external interrupt",
            Self::MachineExternalInterrupt => "machine external interrupt",
        })
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum TrapCause {
    Exception(Exception),
    Interrupt(Interrupt),
}

impl TrapCause {
    /// Returns the value written to mcause for this trap.
    pub fn code(self) -> u32 {
        match self {
            Self::Exception(exception) => exception.code(),
            Self::Interrupt(interrupt) => INTERRUPT_BIT | interrupt.code(),
        }
    }
}

impl fmt::Display for TrapCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exception(exception) => exception.fmt(f),
            Self::Interrupt(interrupt) => interrupt.fmt(f),
        }
    }
}

impl From<Exception> for TrapCause {
    fn from(value: Exception) -> Self {
        Self::Exception(value)
    }
}

impl From<Interrupt> for TrapCause {
    fn from(value: Interrupt) -> Self {
        Self::Interrupt(value)
    }
}

/// An exception together with the value destined for mtval.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Fault {
    pub exception: Exception,
    /// Faulting address for misaligned and access faults, the instruction word for illegal
    /// instructions, `0` otherwise.
    pub tval: u32,
}

impl Fault {
    pub fn new(exception: Exception, tval: u32) -> Self {
        Self { exception, tval }
    }
}

impl From<Exception> for Fault {
    fn from(exception: Exception) -> Self {
        Self::new(exception, 0)
    }
}

/// Returns the trap-table slot for an mcause value.
///
/// Interrupts use their code directly, exceptions are placed after the interrupt slots.
pub fn vector_offset(cause: u32) -> u32 {
    if cause & INTERRUPT_BIT != 0 {
        cause & !INTERRUPT_BIT
    } else {
        EXCEPTION_VECTOR_BASE + cause
    }
}

/// Returns the address the core jumps to when taking a trap with mcause value `cause`.
pub fn vector_address(mtvec: u32, cause: u32) -> u32 {
    mtvec.wrapping_add(vector_offset(cause).wrapping_mul(4))
}

/// Performs trap entry: saves the return address and cause, disables interrupts, and points the
/// `pc` at the trap vector.
///
/// The return address is the `pc` of the trapping instruction, except for an environment call from
/// M-mode, which resumes after the `ecall`.
pub fn take_trap(csr: &mut Csr, registers: &mut Registers, cause: TrapCause, tval: u32) {
    let pc = registers.pc();
    let mepc = match cause {
        TrapCause::Exception(Exception::EnvironmentCallFromMMode) => pc.wrapping_add(4),
        _ => pc,
    };
    let code = cause.code();
    csr.set_mepc(mepc);
    csr.set_mcause(code);
    csr.set_mtval(tval);

    let status = csr.status_mut();
    if status.mie() {
        status.set_mpie(true);
    }
    status.set_mie(false);
    status.set_mpp(RawPrivilegeLevel::Machine);

    let target = vector_address(csr.mtvec(), code);
    log::debug!("trap: {cause} (mcause {code:#010x}) at pc {pc:#010x}, vectoring to {target:#010x}");
    *registers.pc_mut() = target;
}

/// Returns from a machine-mode trap handler: restores MIE from MPIE, sets MPIE, and leaves MPP at
/// machine mode.
///
/// Only the status update happens here; the `pc` is redirected to mepc by the next-pc logic.
pub fn return_from_trap(csr: &mut Csr) {
    let status = csr.status_mut();
    let mpie = status.mpie();
    status.set_mie(mpie);
    status.set_mpie(true);
    status.set_mpp(RawPrivilegeLevel::Machine);
}
