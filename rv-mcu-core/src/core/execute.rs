use super::csr::Csr;
use super::trap::{self, Exception, Fault};
use crate::alu;
use crate::bus::{AccessWidth, Bus};
use crate::instruction::{funct12, Fields, Opcode};
use crate::registers::{Registers, Specifier};

/// Result of executing an instruction, before it is committed.
///
/// The destination register is only written once the next `pc` is known to be valid, so a jump to
/// a misaligned target leaves `rd` untouched.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub(super) struct Retired {
    /// Value for `rd`, if the instruction writes one.
    pub writeback: Option<u32>,
    /// First operand as seen by the next-pc logic (the value of `rs1`).
    pub a: u32,
    /// Second operand as seen by the next-pc logic (the value of `rs2`).
    pub b: u32,
}

impl Retired {
    fn write(value: u32) -> Self {
        Self {
            writeback: Some(value),
            ..Self::default()
        }
    }
}

/// Executes one decoded instruction against the architectural state.
///
/// Memory and CSR side effects happen here; register writeback and the `pc` update are left to the
/// caller.
#[derive(Debug)]
pub(super) struct Executor<'a> {
    pub pc: u32,
    pub registers: &'a Registers,
    pub csr: &'a mut Csr,
    pub bus: &'a mut Bus,
}

impl<'a> Executor<'a> {
    pub fn execute(&mut self, fields: &Fields) -> Result<Retired, Fault> {
        match fields.opcode {
            Opcode::Lui => Ok(Retired::write(fields.immediate)),
            Opcode::Auipc => self.auipc(fields),
            Opcode::Jal => self.jal(fields),
            Opcode::Jalr => self.jalr(fields),
            Opcode::Branch => self.branch(fields),
            Opcode::Load => self.load(fields),
            Opcode::Store => self.store(fields),
            Opcode::OpImm => self.op_imm(fields),
            Opcode::Op => self.op(fields),
            Opcode::MiscMem => self.misc_mem(fields),
            Opcode::System => self.system(fields),
        }
    }

    /// > AUIPC (add upper immediate to pc) is used to build pc-relative addresses and uses the
    /// > U-type format. AUIPC forms a 32-bit offset from the U-immediate, filling in the lowest 12
    /// > bits with zeros, adds this offset to the address of the AUIPC instruction, then places
    /// > the result in register rd.
    fn auipc(&mut self, fields: &Fields) -> Result<Retired, Fault> {
        let op = alu::control(fields.opcode, fields.funct7, fields.funct3);
        Ok(Retired::write(alu::execute(self.pc, fields.immediate, op)))
    }

    /// Writes the return address; the jump itself is resolved by the next-pc logic.
    fn jal(&mut self, fields: &Fields) -> Result<Retired, Fault> {
        Ok(Retired::write(self.link(fields)))
    }

    fn jalr(&mut self, fields: &Fields) -> Result<Retired, Fault> {
        if fields.funct3 != 0 {
            return Err(illegal(fields));
        }
        Ok(Retired {
            writeback: Some(self.link(fields)),
            a: self.x(fields.rs1),
            b: 0,
        })
    }

    /// Address of the instruction following the jump, computed with the pre-jump `pc`.
    fn link(&self, fields: &Fields) -> u32 {
        let op = alu::control(fields.opcode, fields.funct7, fields.funct3);
        alu::execute(self.pc, 4, op)
    }

    /// Branches only supply operands; whether the branch is taken is decided by the next-pc logic.
    fn branch(&mut self, fields: &Fields) -> Result<Retired, Fault> {
        if matches!(fields.funct3, 0b010 | 0b011) {
            return Err(illegal(fields));
        }
        Ok(Retired {
            writeback: None,
            a: self.x(fields.rs1),
            b: self.x(fields.rs2),
        })
    }

    /// Executes `lb`, `lh`, `lw`, `lbu`, or `lhu`.
    ///
    /// > The LW instruction loads a 32-bit value from memory into rd. LH loads a 16-bit value from
    /// > memory, then sign-extends to 32-bits before storing in rd. LHU loads a 16-bit value from
    /// > memory but then zero extends to 32-bits before storing in rd. LB and LBU are defined
    /// > analogously for 8-bit values.
    fn load(&mut self, fields: &Fields) -> Result<Retired, Fault> {
        if !matches!(fields.funct3, 0b000 | 0b001 | 0b010 | 0b100 | 0b101) {
            return Err(illegal(fields));
        }
        let width = alu::access_width(fields.funct3).ok_or_else(|| illegal(fields))?;
        let address = self.effective_address(fields);
        let value = self
            .bus
            .read(address, width)
            .map_err(|exception| Fault::new(exception, address))?;
        let value = if alu::is_unsigned_load(fields.funct3) {
            value
        } else {
            sign_extend(value, width)
        };
        Ok(Retired::write(value))
    }

    /// Executes `sb`, `sh`, or `sw`, storing the low bits of `rs2`.
    fn store(&mut self, fields: &Fields) -> Result<Retired, Fault> {
        if fields.funct3 > 0b010 {
            return Err(illegal(fields));
        }
        let width = alu::access_width(fields.funct3).ok_or_else(|| illegal(fields))?;
        let address = self.effective_address(fields);
        let value = self.x(fields.rs2);
        self.bus
            .write(address, value, width)
            .map_err(|exception| match exception {
                // Writes to read-only memory are reported like any other illegal instruction.
                Exception::IllegalInstruction => illegal(fields),
                _ => Fault::new(exception, address),
            })?;
        Ok(Retired::default())
    }

    fn effective_address(&self, fields: &Fields) -> u32 {
        let op = alu::control(fields.opcode, fields.funct7, fields.funct3);
        alu::execute(self.x(fields.rs1), fields.immediate, op)
    }

    /// Executes a register-immediate instruction.
    ///
    /// For the shifts, the upper immediate bits act as `funct7`: `slli` requires them to be zero,
    /// `srli`/`srai` are told apart by bit 5.
    fn op_imm(&mut self, fields: &Fields) -> Result<Retired, Fault> {
        let valid = match fields.funct3 {
            0b001 => fields.funct7 == 0,
            0b101 => matches!(fields.funct7, 0b000_0000 | 0b010_0000),
            _ => true,
        };
        if !valid {
            return Err(illegal(fields));
        }
        let op = alu::control(fields.opcode, fields.funct7, fields.funct3);
        Ok(Retired::write(alu::execute(
            self.x(fields.rs1),
            fields.immediate,
            op,
        )))
    }

    /// Executes a register-register instruction.
    fn op(&mut self, fields: &Fields) -> Result<Retired, Fault> {
        let valid = match fields.funct7 {
            0b000_0000 => true,
            0b010_0000 => matches!(fields.funct3, 0b000 | 0b101),
            _ => false,
        };
        if !valid {
            return Err(illegal(fields));
        }
        let op = alu::control(fields.opcode, fields.funct7, fields.funct3);
        Ok(Retired::write(alu::execute(
            self.x(fields.rs1),
            self.x(fields.rs2),
            op,
        )))
    }

    /// `fence` and `fence.i`.
    fn misc_mem(&mut self, fields: &Fields) -> Result<Retired, Fault> {
        match fields.funct3 {
            // With a single hart and no caches, both are equivalent to a nop instruction.
            0b000 | 0b001 => Ok(Retired::default()),
            _ => Err(illegal(fields)),
        }
    }

    fn system(&mut self, fields: &Fields) -> Result<Retired, Fault> {
        match fields.funct3 {
            0b000 => self.privileged(fields),
            0b100 => Err(illegal(fields)),
            _ => self.csr_op(fields),
        }
    }

    fn privileged(&mut self, fields: &Fields) -> Result<Retired, Fault> {
        match fields.immediate {
            funct12::ECALL => Err(Exception::EnvironmentCallFromMMode.into()),
            funct12::EBREAK => Err(Fault::new(Exception::Breakpoint, self.pc)),
            funct12::MRET => {
                trap::return_from_trap(self.csr);
                Ok(Retired::default())
            }
            // Waiting is indistinguishable from retiring immediately, since interrupts are polled
            // every tick.
            funct12::WFI => Ok(Retired::default()),
            // There is no user mode to return to.
            funct12::URET => Err(illegal(fields)),
            _ => Err(illegal(fields)),
        }
    }

    /// Executes `csrrw`, `csrrs`, `csrrc` and their immediate forms.
    ///
    /// The old value of the CSR is always read and written to `rd`. The set and clear forms do not
    /// write the CSR when `rs1` (or `uimm`) is zero.
    fn csr_op(&mut self, fields: &Fields) -> Result<Retired, Fault> {
        let specifier = fields.csr();
        let source = if fields.funct3 & 0b100 != 0 {
            u32::from(fields.rs1)
        } else {
            self.x(fields.rs1)
        };
        let old = self.csr.read(specifier).map_err(|err| {
            log::debug!("{err}");
            illegal(fields)
        })?;
        let modifies = fields.rs1 != Specifier::X0;
        let new = match fields.funct3 & 0b011 {
            0b01 => Some(source),
            0b10 => modifies.then_some(old | source),
            _ => modifies.then_some(old & !source),
        };
        if let Some(new) = new {
            self.csr.write(specifier, new).map_err(|err| {
                log::debug!("{err}");
                illegal(fields)
            })?;
        }
        Ok(Retired::write(old))
    }

    fn x(&self, specifier: Specifier) -> u32 {
        self.registers.x(specifier)
    }
}

fn illegal(fields: &Fields) -> Fault {
    Fault::new(Exception::IllegalInstruction, fields.raw)
}

fn sign_extend(value: u32, width: AccessWidth) -> u32 {
    match width {
        AccessWidth::Byte => value as u8 as i8 as i32 as u32,
        AccessWidth::Halfword => value as u16 as i16 as i32 as u32,
        AccessWidth::Word => value,
    }
}
