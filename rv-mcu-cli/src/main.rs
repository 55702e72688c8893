use clap::Parser;
use goblin::elf::program_header::{PF_W, PT_LOAD};
use goblin::elf::Elf;
use log::{debug, info};
use rv_mcu_core::bus::{AccessWidth, MemoryError};
use rv_mcu_core::core::{csr, ConfigError, FlashError};
use rv_mcu_core::registers::Specifier;
use rv_mcu_core::{Alignment, Config, Core, TickError};
use std::fmt;
use std::fs::File;
use std::io::{self, Read, Write};
use std::num::ParseIntError;
use thiserror::Error;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Base address of RAM.
    #[arg(long, value_parser = parse_address)]
    ram_base: Option<u32>,
    /// Size of RAM in bytes.
    #[arg(long, value_parser = parse_address)]
    ram_size: Option<u32>,
    /// Stop after this many ticks.
    #[arg(long, default_value_t = 1_000_000)]
    max_ticks: u64,
    /// Stop when the pc reaches this address. May be repeated.
    #[arg(long = "break", value_parser = parse_address)]
    breakpoints: Vec<u32>,
    /// Signature file to output signature to.
    #[arg(long, short)]
    signature: Option<String>,
    /// Increase logging verbosity. May be repeated.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
    /// Elf file to run.
    elf: String,
}

#[derive(Error, Debug)]
enum RunError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("failed to parse elf file")]
    Elf(#[from] goblin::error::Error),
    #[error("segment address {0:#x} does not fit in 32 bits")]
    AddressOverflow(u64),
    #[error("segment data at file offset {offset:#x} with size {size:#x} lies outside the file")]
    SegmentOutOfBounds { offset: u64, size: u64 },
    #[error("missing symbol `{0}`")]
    MissingSymbol(&'static str),
    #[error("invalid signature bounds [{start:#010x}, {end:#010x})")]
    SignatureBounds { start: u32, end: u32 },
    #[error("guest memory error while reading signature at {address:#010x}")]
    Signature {
        address: u32,
        #[source]
        source: MemoryError,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Flash(#[from] FlashError),
    #[error(transparent)]
    Logger(#[from] log::SetLoggerError),
    #[error(transparent)]
    Tick(#[from] TickError),
}

/// Why the run loop returned.
#[derive(Debug)]
enum Stop {
    Breakpoint(u32),
    MaxTicks,
    /// The pc did not change during the last tick, e.g. a `j .` at the end of a program.
    SelfLoop(u32),
    Fault(TickError),
}

impl fmt::Display for Stop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Breakpoint(pc) => write!(f, "breakpoint at {pc:#010x}"),
            Self::MaxTicks => write!(f, "tick limit reached"),
            Self::SelfLoop(pc) => write!(f, "self-loop at {pc:#010x}"),
            Self::Fault(err) => write!(f, "{err}"),
        }
    }
}

fn parse_address(s: &str) -> Result<u32, ParseIntError> {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(&hex.replace('_', ""), 16),
        None => s.replace('_', "").parse(),
    }
}

fn main() -> Result<(), RunError> {
    let args = Args::parse();

    stderrlog::new()
        .verbosity(usize::from(args.verbose) + 1)
        .modules([module_path!(), "rv_mcu_core"])
        .init()?;

    let mut buf = Vec::new();
    let mut file = File::open(&args.elf)?;
    file.read_to_end(&mut buf)?;

    let elf = Elf::parse(&buf)?;
    let mut core = load_elf(&elf, &buf, &args)?;

    let stop = run(&mut core, &args);
    dump(&core, &stop);

    if let Some(path) = &args.signature {
        write_signature(&elf, &core, path)?;
    }

    match stop {
        Stop::Fault(err) => Err(err.into()),
        _ => Ok(()),
    }
}

fn u32_address(address: u64) -> Result<u32, RunError> {
    u32::try_from(address).map_err(|_| RunError::AddressOverflow(address))
}

/// Returns the first address past a segment of `size` bytes at `address`.
fn segment_end(address: u64, size: u64) -> Result<u32, RunError> {
    let end = address
        .checked_add(size)
        .ok_or(RunError::AddressOverflow(address))?;
    u32_address(end)
}

/// Returns the file contents of a segment.
fn segment_bytes(buf: &[u8], offset: u64, size: u64) -> Result<&[u8], RunError> {
    let start = usize::try_from(offset).ok();
    let len = usize::try_from(size).ok();
    start
        .zip(len)
        .and_then(|(start, len)| buf.get(start..start.checked_add(len)?))
        .ok_or(RunError::SegmentOutOfBounds { offset, size })
}

/// Builds a core whose ROM covers the read-only loadable segments, then flashes every loadable
/// segment in program-header order.
fn load_elf(elf: &Elf, buf: &[u8], args: &Args) -> Result<Core, RunError> {
    let segments: Vec<_> = elf
        .program_headers
        .iter()
        .filter(|h| h.p_type == PT_LOAD)
        .collect();

    let mut config = Config::default();
    let mut rom: Option<(u32, u32)> = None;
    for h in segments.iter().filter(|h| h.p_flags & PF_W == 0) {
        let start = u32_address(h.p_paddr)?;
        let end = segment_end(h.p_paddr, h.p_memsz)?;
        rom = Some(match rom {
            Some((lo, hi)) => (lo.min(start), hi.max(end)),
            None => (start, end),
        });
    }
    if let Some((start, end)) = rom {
        let end = Alignment::WORD
            .align_up(end)
            .ok_or(RunError::AddressOverflow(u64::from(end)))?;
        config.rom_base = start;
        config.rom_size = end - start;
    }
    if let Some(ram_base) = args.ram_base {
        config.ram_base = ram_base;
    }
    if let Some(ram_size) = args.ram_size {
        config.ram_size = ram_size;
    }
    config.reset_vector = Some(u32_address(elf.entry)?);
    debug!("{config:?}");

    let mut core = Core::new(config)?;
    for h in segments {
        let address = u32_address(h.p_paddr)?;
        let end = segment_end(h.p_paddr, h.p_filesz)?;
        debug!("loading segment into memory at [{address:#010x}..{end:#010x}]");
        core.flash(address, segment_bytes(buf, h.p_offset, h.p_filesz)?)?;
    }
    Ok(core)
}

fn run(core: &mut Core, args: &Args) -> Stop {
    loop {
        if core.ticks() >= args.max_ticks {
            return Stop::MaxTicks;
        }
        let pc = core.pc();
        if let Err(err) = core.step_one() {
            return Stop::Fault(err);
        }
        let next = core.pc();
        if next == pc {
            return Stop::SelfLoop(pc);
        }
        if args.breakpoints.contains(&next) {
            return Stop::Breakpoint(next);
        }
    }
}

fn dump(core: &Core, stop: &Stop) {
    info!("stopped: {stop}");
    println!("stopped: {stop}");
    println!("pc: {:#010x}  ticks: {}", core.pc(), core.ticks());
    let registers = core.registers();
    for (i, specifier) in Specifier::iter_all().enumerate() {
        let name = format!("{specifier}/{}", specifier.abi_name());
        print!("{name:>8}: {:#010x}", registers.x(specifier));
        if i % 4 == 3 {
            println!();
        }
    }
    for specifier in csr::SUPPORTED {
        if let (Some(name), Ok(value)) = (csr::name(specifier), core.csr().read(specifier)) {
            println!("{name:>9}: {value:#010x}");
        }
    }
}

fn write_signature(elf: &Elf, core: &Core, path: &str) -> Result<(), RunError> {
    let mut signature_start = None;
    let mut signature_end = None;
    for sym in elf.syms.iter() {
        let Some(name) = elf.strtab.get_at(sym.st_name) else {
            continue;
        };
        if name == "begin_signature" {
            signature_start = Some(u32_address(sym.st_value)?);
        } else if name == "end_signature" {
            signature_end = Some(u32_address(sym.st_value)?);
        }
    }
    let start = signature_start.ok_or(RunError::MissingSymbol("begin_signature"))?;
    let end = signature_end.ok_or(RunError::MissingSymbol("end_signature"))?;
    if start % 4 != 0 || end % 4 != 0 || start > end {
        return Err(RunError::SignatureBounds { start, end });
    }

    let mut file = File::create(path)?;
    for address in (start..end).step_by(4) {
        let word = core
            .bus()
            .read_debug(address, AccessWidth::Word)
            .map_err(|source| RunError::Signature { address, source })?;
        writeln!(file, "{word:08x}")?;
    }
    Ok(())
}
