//! Provides a cycle-stepped RV32I core with machine-mode traps.

pub mod csr;
mod execute;
pub mod interrupts;
pub mod status;
pub mod trap;

pub use trap::{Exception, Fault, Interrupt, TrapCause};

use crate::address_range::InvalidBoundsError;
use crate::bus::{Bus, MemoryDevice, OverlapError, Resource};
use crate::instruction::Fields;
use crate::next_pc;
use crate::registers::Registers;
use crate::resources::clint::{self, Clint};
use crate::resources::ram::Ram;
use crate::resources::rom::Rom;
use crate::resources::video::{self, Video, VideoConfig};
use crate::Alignment;
use csr::Csr;
use execute::Executor;
use thiserror::Error;

/// Memory layout of the machine.
///
/// The video device and the CLINT always live at their fixed base addresses; ROM and RAM can be
/// placed anywhere that does not overlap them.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Config {
    pub rom_base: u32,
    pub rom_size: u32,
    pub ram_base: u32,
    pub ram_size: u32,
    /// Address to which the core's PC register is reset. Defaults to the start of ROM.
    pub reset_vector: Option<u32>,
    pub video: VideoConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rom_base: 0x0000_0000,
            rom_size: 64 * 1024,
            ram_base: 0x8000_0000,
            ram_size: 64 * 1024,
            reset_vector: None,
            video: VideoConfig::default(),
        }
    }
}

impl Config {
    /// The address execution starts at after a reset.
    pub fn reset_vector(&self) -> u32 {
        self.reset_vector.unwrap_or(self.rom_base)
    }
}

#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum ConfigError {
    #[error("invalid {resource} region")]
    InvalidRegion {
        resource: Resource,
        #[source]
        source: InvalidBoundsError,
    },
    #[error(transparent)]
    Overlap(#[from] OverlapError),
    #[error("reset vector {0:#010x} is not word-aligned")]
    MisalignedResetVector(u32),
}

fn region(resource: Resource) -> impl FnOnce(InvalidBoundsError) -> ConfigError {
    move |source| ConfigError::InvalidRegion { resource, source }
}

#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum FlashError {
    #[error("{len} bytes at {address:#010x} do not fit in rom or ram")]
    OutOfRange { address: u32, len: usize },
}

/// Errors that stop a [`Core::tick`] from completing normally.
///
/// The architectural state is still consistent when one of these is returned: every trap that was
/// raised has been taken.
#[derive(Error, Debug, Copy, Clone, Eq, PartialEq)]
pub enum TickError {
    /// A second trap was raised while entering a handler during the same tick.
    ///
    /// This usually means mtvec does not point at valid code.
    #[error("{second} at pc {pc:#010x} while handling {first}")]
    NestedTrap {
        first: TrapCause,
        second: TrapCause,
        pc: u32,
    },
}

/// RV32I core together with the devices on its bus.
///
/// Every call to [`tick`](Self::tick) is one clock cycle: the CLINT counts it, a pending interrupt
/// may be taken, and one instruction is executed.
#[derive(Debug)]
pub struct Core {
    config: Config,
    registers: Registers,
    csr: Csr,
    bus: Bus,
    ticks: u64,
}

impl Core {
    /// Builds a core in reset state from `config`.
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        let rom = Rom::new(config.rom_base, config.rom_size).map_err(region(Resource::Rom))?;
        let ram = Ram::new(config.ram_base, config.ram_size).map_err(region(Resource::Ram))?;
        let video = Video::new(video::BASE, config.video).map_err(region(Resource::Video))?;
        let clint = Clint::new(clint::BASE).map_err(region(Resource::Clint))?;
        let bus = Bus::new(rom, ram, video, clint)?;

        let reset_vector = config.reset_vector();
        if !Alignment::WORD.is_aligned(reset_vector) {
            return Err(ConfigError::MisalignedResetVector(reset_vector));
        }

        log::debug!(
            "rom {}, ram {}, reset vector {reset_vector:#010x}",
            bus.rom().range(),
            bus.ram().range()
        );
        Ok(Self {
            registers: Registers::new(reset_vector),
            csr: Csr::new(),
            bus,
            ticks: 0,
            config,
        })
    }

    /// Returns the core to its reset state.
    ///
    /// ROM contents are kept; RAM, video memory, and the CLINT are cleared.
    pub fn reset(&mut self) {
        self.registers = Registers::new(self.config.reset_vector());
        self.csr = Csr::new();
        self.bus.ram_mut().reset();
        self.bus.video_mut().reset();
        self.bus.clint_mut().reset();
        self.ticks = 0;
    }

    /// Writes `buf` directly into ROM or RAM at `address`, bypassing the bus.
    ///
    /// The whole buffer must fit inside a single device.
    pub fn flash(&mut self, address: u32, buf: &[u8]) -> Result<(), FlashError> {
        if self.bus.rom_mut().load(address, buf) || self.bus.ram_mut().load(address, buf) {
            log::debug!("flashed {} bytes at {address:#010x}", buf.len());
            Ok(())
        } else {
            Err(FlashError::OutOfRange {
                address,
                len: buf.len(),
            })
        }
    }

    /// Advances the machine by a single clock cycle.
    ///
    /// At most one trap is entered before the instruction executed in this cycle. If the handler's
    /// first instruction traps as well, that trap is still taken, but the tick ends with
    /// [`TickError::NestedTrap`].
    pub fn tick(&mut self) -> Result<(), TickError> {
        self.ticks = self.ticks.wrapping_add(1);
        self.bus.clint_mut().advance_cycle(&mut self.csr);

        let mut entered = None;
        if let Some(interrupt) = self.bus.clint().poll_interrupts(&self.csr) {
            let cause = TrapCause::from(interrupt);
            trap::take_trap(&mut self.csr, &mut self.registers, cause, 0);
            entered = Some(cause);
        }

        loop {
            let pc = self.registers.pc();
            let Err(fault) = self.step_instruction() else {
                return Ok(());
            };
            let cause = TrapCause::from(fault.exception);
            trap::take_trap(&mut self.csr, &mut self.registers, cause, fault.tval);
            if let Some(first) = entered {
                log::warn!("{cause} at {pc:#010x} while entering the handler for {first}");
                return Err(TickError::NestedTrap {
                    first,
                    second: cause,
                    pc,
                });
            }
            entered = Some(cause);
        }
    }

    /// Single-step entry point for debuggers. Identical to [`tick`](Self::tick): the core has no
    /// breakpoint concept, callers compare the `pc` between steps.
    pub fn step_one(&mut self) -> Result<(), TickError> {
        self.tick()
    }

    /// Executes the instruction at `pc` and commits its results.
    ///
    /// On error nothing has been committed except memory and CSR side effects of the instruction
    /// itself, and the `pc` still points at the faulting instruction.
    fn step_instruction(&mut self) -> Result<(), Fault> {
        let pc = self.registers.pc();
        if !Alignment::WORD.is_aligned(pc) {
            return Err(Fault::new(Exception::InstructionAddressMisaligned, pc));
        }
        let raw = self
            .bus
            .fetch(pc)
            .map_err(|exception| Fault::new(exception, pc))?;
        let fields = Fields::decode(raw)
            .map_err(|_| Fault::new(Exception::IllegalInstruction, raw))?;
        log::trace!("{pc:#010x}: {raw:#010x} ({:?})", fields.opcode);

        let retired = Executor {
            pc,
            registers: &self.registers,
            csr: &mut self.csr,
            bus: &mut self.bus,
        }
        .execute(&fields)?;

        let next = next_pc::calculate(
            pc,
            fields.immediate,
            fields.opcode,
            fields.funct3,
            retired.a,
            retired.b,
            self.csr.mepc(),
        )?;
        if let Some(value) = retired.writeback {
            self.registers.set_x(fields.rd, value);
        }
        *self.registers.pc_mut() = next;
        Ok(())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registers(&self) -> &Registers {
        &self.registers
    }

    pub fn pc(&self) -> u32 {
        self.registers.pc()
    }

    pub fn csr(&self) -> &Csr {
        &self.csr
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Number of ticks since the last reset.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::AccessWidth;
    use crate::registers::Specifier;

    const NOP: u32 = 0x0000_0013;
    const JAL_SELF: u32 = 0x0000_006f;

    fn flash_words(core: &mut Core, address: u32, words: &[u32]) {
        let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();
        core.flash(address, &bytes).unwrap();
    }

    #[test]
    fn test_reset_state() {
        let core = Core::new(Config::default()).unwrap();
        assert_eq!(0, core.pc());
        assert!(core.registers().all_x().iter().all(|&x| x == 0));
        assert_eq!(Ok(csr::MISA_RV32I), core.csr().read(csr::MISA));
        assert_eq!(0, core.ticks());
    }

    #[test]
    fn test_config_errors() {
        let config = Config {
            ram_base: 0x0000_8000,
            ..Config::default()
        };
        assert!(matches!(Core::new(config), Err(ConfigError::Overlap(_))));

        let config = Config {
            reset_vector: Some(0x2),
            ..Config::default()
        };
        assert_eq!(
            Some(ConfigError::MisalignedResetVector(0x2)),
            Core::new(config).err()
        );

        let config = Config {
            ram_size: 0,
            ..Config::default()
        };
        assert!(matches!(
            Core::new(config),
            Err(ConfigError::InvalidRegion {
                resource: Resource::Ram,
                ..
            })
        ));
    }

    #[test]
    fn test_flash() {
        let mut core = Core::new(Config::default()).unwrap();
        core.flash(0x10, &[1, 2, 3, 4]).unwrap();
        core.flash(0x8000_0000, &[5]).unwrap();
        assert_eq!(Ok(0x0403_0201), core.bus().read_debug(0x10, AccessWidth::Word));
        assert_eq!(Ok(5), core.bus().read_debug(0x8000_0000, AccessWidth::Byte));
        assert_eq!(
            Err(FlashError::OutOfRange {
                address: 0xFFFE,
                len: 4
            }),
            core.flash(0xFFFE, &[0; 4])
        );
    }

    #[test]
    fn test_reset_keeps_rom() {
        let mut core = Core::new(Config::default()).unwrap();
        flash_words(&mut core, 0, &[0x00f58593]);
        core.flash(0x8000_0000, &[0xAA]).unwrap();
        core.tick().unwrap();
        assert_eq!(4, core.pc());
        core.reset();
        assert_eq!(0, core.pc());
        assert_eq!(0, core.ticks());
        assert_eq!(0, core.registers().x(Specifier::from_u5(11)));
        assert_eq!(0, core.bus().ram().bytes()[0]);
        assert_eq!(0x93, core.bus().rom().bytes()[0]);
    }

    #[test]
    fn test_timer_interrupt_taken_before_instruction() {
        let mut core = Core::new(Config::default()).unwrap();
        flash_words(&mut core, 0, &[NOP, NOP, NOP, NOP]);
        flash_words(&mut core, 0x100 + 4 * 7, &[JAL_SELF]);
        core.csr.write(csr::MTVEC, 0x100).unwrap();
        core.csr.enabled_mut().set_m_timer(true);
        core.csr.status_mut().set_mie(true);
        core.bus
            .write(clint::BASE + clint::MTIMECMP_LO, 3, AccessWidth::Word)
            .unwrap();

        core.tick().unwrap();
        core.tick().unwrap();
        assert_eq!(8, core.pc());
        // mcycle reaches mtimecmp in the third tick; the trap is entered and the jump at the
        // vector slot executes in the same tick.
        core.tick().unwrap();
        assert_eq!(0x8000_0007, core.csr().mcause());
        assert_eq!(8, core.csr().mepc());
        assert_eq!(0x11c, core.pc());
        assert!(!core.csr().status().mie());
        assert!(core.csr().status().mpie());
        // Interrupts stay masked inside the handler.
        core.tick().unwrap();
        assert_eq!(0x11c, core.pc());
    }

    #[test]
    fn test_fault_then_handler_runs_in_same_tick() {
        let mut core = Core::new(Config::default()).unwrap();
        // The all-zero word is not a valid instruction.
        flash_words(&mut core, 0, &[0x0000_0000]);
        flash_words(&mut core, 0x40 + 4 * (16 + 2), &[JAL_SELF]);
        core.csr.write(csr::MTVEC, 0x40).unwrap();
        core.tick().unwrap();
        assert_eq!(2, core.csr().mcause());
        assert_eq!(0, core.csr().mepc());
        assert_eq!(0x88, core.pc());
    }

    #[test]
    fn test_nested_trap() {
        let mut core = Core::new(Config::default()).unwrap();
        // ecall, with mtvec pointing at unmapped memory
        flash_words(&mut core, 0, &[0x0000_0073]);
        core.csr.write(csr::MTVEC, 0x1000_0000).unwrap();
        let target = 0x1000_0000 + 4 * (16 + 11);
        assert_eq!(
            Err(TickError::NestedTrap {
                first: Exception::EnvironmentCallFromMMode.into(),
                second: Exception::InstructionAccessFault.into(),
                pc: target,
            }),
            core.tick()
        );
        assert_eq!(1, core.csr().mcause());
        assert_eq!(target, core.csr().mepc());
        assert_eq!(0x1000_0000 + 4 * (16 + 1), core.pc());
    }
}
