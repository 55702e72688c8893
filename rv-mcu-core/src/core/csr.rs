//! The machine-mode control and status registers.
//!
//! Only the registers listed in [`SUPPORTED`] exist. Each of them is plain read/write storage;
//! the interrupt-related fields of mstatus, mie and mip are only interpreted through the bitfield
//! accessors of [`Status`] and [`InterruptBits`].

use super::interrupts::InterruptBits;
use super::status::Status;
use thiserror::Error;

/// General 12-bit value representing a CSR specifier. Note that this can hold any 12-bit value,
/// even if the value represents an unsupported or non-existent CSR.
pub type CsrSpecifier = u16;

//
// Machine information registers (`0xF11..=0xF14`).
//
/// Vendor ID.
pub const MVENDORID: CsrSpecifier = 0xF11;
/// Architecture ID.
pub const MARCHID: CsrSpecifier = 0xF12;
/// Implementation ID.
pub const MIMPID: CsrSpecifier = 0xF13;
/// Hardware thread ID.
pub const MHARTID: CsrSpecifier = 0xF14;

//
// Machine trap setup (`0x300..=0x305`).
//
/// Machine status register.
pub const MSTATUS: CsrSpecifier = 0x300;
/// ISA and extensions
pub const MISA: CsrSpecifier = 0x301;
/// Machine interrupt-enable register.
pub const MIE: CsrSpecifier = 0x304;
/// Machine trap-handler base address.
pub const MTVEC: CsrSpecifier = 0x305;

//
// Machine trap handling (`0x340..=0x344`).
//
/// Scratch register for machine trap handlers.
pub const MSCRATCH: CsrSpecifier = 0x340;
/// Machine exception program counter.
pub const MEPC: CsrSpecifier = 0x341;
/// Machine trap cause.
pub const MCAUSE: CsrSpecifier = 0x342;
/// Machine bad address or instruction.
pub const MTVAL: CsrSpecifier = 0x343;
/// Machine interrupt pending.
pub const MIP: CsrSpecifier = 0x344;

/// Every CSR this core implements.
pub const SUPPORTED: [CsrSpecifier; 13] = [
    MSTATUS, MISA, MIE, MTVEC, MSCRATCH, MEPC, MCAUSE, MTVAL, MIP, MVENDORID, MARCHID, MIMPID,
    MHARTID,
];

/// Reset value of misa: MXL=1 (32-bit), extension "I".
pub const MISA_RV32I: u32 = 0x4000_0100;

/// Returns the conventional assembler name of a supported CSR.
pub fn name(specifier: CsrSpecifier) -> Option<&'static str> {
    Some(match specifier {
        MSTATUS => "mstatus",
        MISA => "misa",
        MIE => "mie",
        MTVEC => "mtvec",
        MSCRATCH => "mscratch",
        MEPC => "mepc",
        MCAUSE => "mcause",
        MTVAL => "mtval",
        MIP => "mip",
        MVENDORID => "mvendorid",
        MARCHID => "marchid",
        MIMPID => "mimpid",
        MHARTID => "mhartid",
        _ => return None,
    })
}

#[derive(Error, Debug, Clone, Copy, Eq, PartialEq)]
pub enum CsrError {
    #[error("illegal CSR address {0:#05x}")]
    IllegalCsrAddress(CsrSpecifier),
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Csr {
    status: Status,
    misa: u32,
    mie: InterruptBits,
    mtvec: u32,
    mscratch: u32,
    mepc: u32,
    mcause: u32,
    mtval: u32,
    mip: InterruptBits,
    mvendorid: u32,
    marchid: u32,
    mimpid: u32,
    mhartid: u32,
}

impl Default for Csr {
    fn default() -> Self {
        Self::new()
    }
}

impl Csr {
    /// Returns all registers in their reset state.
    pub fn new() -> Self {
        Self {
            status: Status::new(),
            misa: MISA_RV32I,
            mie: InterruptBits::new(),
            mtvec: 0,
            mscratch: 0,
            mepc: 0,
            mcause: 0,
            mtval: 0,
            mip: InterruptBits::new(),
            mvendorid: 0,
            marchid: 0,
            mimpid: 0,
            mhartid: 0,
        }
    }

    /// Reads the CSR identified by `specifier`.
    pub fn read(&self, specifier: CsrSpecifier) -> Result<u32, CsrError> {
        Ok(match specifier {
            MSTATUS => self.status.bits(),
            MISA => self.misa,
            MIE => self.mie.bits(),
            MTVEC => self.mtvec,
            MSCRATCH => self.mscratch,
            MEPC => self.mepc,
            MCAUSE => self.mcause,
            MTVAL => self.mtval,
            MIP => self.mip.bits(),
            MVENDORID => self.mvendorid,
            MARCHID => self.marchid,
            MIMPID => self.mimpid,
            MHARTID => self.mhartid,
            _ => return Err(CsrError::IllegalCsrAddress(specifier)),
        })
    }

    /// Writes `value` to the CSR identified by `specifier`.
    pub fn write(&mut self, specifier: CsrSpecifier, value: u32) -> Result<(), CsrError> {
        match specifier {
            MSTATUS => self.status.set_bits(value),
            MISA => self.misa = value,
            MIE => self.mie.set_bits(value),
            MTVEC => self.mtvec = value,
            MSCRATCH => self.mscratch = value,
            MEPC => self.mepc = value,
            MCAUSE => self.mcause = value,
            MTVAL => self.mtval = value,
            MIP => self.mip.set_bits(value),
            MVENDORID => self.mvendorid = value,
            MARCHID => self.marchid = value,
            MIMPID => self.mimpid = value,
            MHARTID => self.mhartid = value,
            _ => return Err(CsrError::IllegalCsrAddress(specifier)),
        }
        Ok(())
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    pub fn status_mut(&mut self) -> &mut Status {
        &mut self.status
    }

    /// The mie register.
    pub fn enabled(&self) -> &InterruptBits {
        &self.mie
    }

    pub fn enabled_mut(&mut self) -> &mut InterruptBits {
        &mut self.mie
    }

    /// The mip register.
    pub fn pending(&self) -> &InterruptBits {
        &self.mip
    }

    pub fn pending_mut(&mut self) -> &mut InterruptBits {
        &mut self.mip
    }

    pub fn mtvec(&self) -> u32 {
        self.mtvec
    }

    pub fn mepc(&self) -> u32 {
        self.mepc
    }

    pub fn set_mepc(&mut self, value: u32) {
        self.mepc = value;
    }

    pub fn mcause(&self) -> u32 {
        self.mcause
    }

    pub fn set_mcause(&mut self, value: u32) {
        self.mcause = value;
    }

    pub fn set_mtval(&mut self, value: u32) {
        self.mtval = value;
    }
}
