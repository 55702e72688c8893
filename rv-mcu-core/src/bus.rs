//! The system bus and the interface every memory-mapped device implements.

use crate::address_range::AddressRange;
use crate::core::Exception;
use crate::resources::clint::Clint;
use crate::resources::ram::Ram;
use crate::resources::rom::Rom;
use crate::resources::video::Video;
use crate::{unit, Alignment};
use std::fmt;
use thiserror::Error;

/// Size of a single bus access.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum AccessWidth {
    Byte,
    Halfword,
    Word,
}

impl AccessWidth {
    /// Returns the number of bytes transferred.
    pub fn bytes(self) -> u32 {
        match self {
            Self::Byte => unit::BYTE,
            Self::Halfword => unit::HALFWORD,
            Self::Word => unit::WORD,
        }
    }

    /// Returns the natural alignment an access of this width requires.
    pub fn alignment(self) -> Alignment {
        match self {
            Self::Byte => Alignment::BYTE,
            Self::Halfword => Alignment::HALFWORD,
            Self::Word => Alignment::WORD,
        }
    }
}

impl fmt::Display for AccessWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Byte => "byte",
            Self::Halfword => "halfword",
            Self::Word => "word",
        })
    }
}

/// Which kind of access was made, used to turn a [`MemoryError`] into the matching exception.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AccessType {
    /// Regular reads.
    Read,
    /// Regular writes.
    Write,
    /// Instruction fetches.
    Execute,
}

#[derive(Error, Debug, Copy, Clone, Eq, PartialEq)]
pub enum MemoryError {
    #[error("address is not aligned to the access width")]
    MisalignedAccess,
    #[error("address is not mapped")]
    AccessFault,
    #[error("write to read-only memory")]
    ReadOnly,
}

impl MemoryError {
    /// Returns the exception raised when an access of type `access` fails with this error.
    pub fn to_exception(self, access: AccessType) -> Exception {
        match (self, access) {
            (Self::ReadOnly, _) => Exception::IllegalInstruction,
            (Self::MisalignedAccess, AccessType::Read) => Exception::LoadAddressMisaligned,
            (Self::MisalignedAccess, AccessType::Write) => Exception::StoreAddressMisaligned,
            (Self::MisalignedAccess, AccessType::Execute) => {
                Exception::InstructionAddressMisaligned
            }
            (Self::AccessFault, AccessType::Read) => Exception::LoadAccessFault,
            (Self::AccessFault, AccessType::Write) => Exception::StoreAccessFault,
            (Self::AccessFault, AccessType::Execute) => Exception::InstructionAccessFault,
        }
    }
}

/// A device mapped into the physical address space.
///
/// Addresses passed to [`read`](Self::read) and [`write`](Self::write) are absolute bus addresses
/// that lie within [`range`](Self::range). Implementors must validate alignment before touching
/// any state, and serialize values in little-endian byte order.
pub trait MemoryDevice: fmt::Debug {
    /// The address range this device responds to.
    fn range(&self) -> AddressRange;

    /// Reads `width` bytes at `address`, zero-extended to 32 bits. Reads have no side effects.
    fn read(&self, address: u32, width: AccessWidth) -> Result<u32, MemoryError>;

    /// Writes the low `width` bytes of `value` at `address`.
    fn write(&mut self, address: u32, value: u32, width: AccessWidth) -> Result<(), MemoryError>;

    /// Returns the first address of this device.
    fn base(&self) -> u32 {
        self.range().start()
    }

    /// Returns the number of bytes mapped by this device.
    fn size(&self) -> u64 {
        self.range().size()
    }
}

/// Enum that uniquely identifies every device attached to the [`Bus`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Resource {
    Rom,
    Ram,
    Video,
    Clint,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Rom => "rom",
            Self::Ram => "ram",
            Self::Video => "video",
            Self::Clint => "clint",
        })
    }
}

/// Order in which device ranges are tested during dispatch.
const PRIORITY: [Resource; 4] = [Resource::Rom, Resource::Ram, Resource::Video, Resource::Clint];

#[derive(Error, Debug, Clone, Eq, PartialEq)]
#[error("{first} at {first_range} overlaps {second} at {second_range}")]
pub struct OverlapError {
    pub first: Resource,
    pub first_range: AddressRange,
    pub second: Resource,
    pub second_range: AddressRange,
}

/// The system bus, owning every device and routing each access to exactly one of them.
///
/// Vacant regions are allowed; accessing them results in an access fault.
#[derive(Debug)]
pub struct Bus {
    rom: Rom,
    ram: Ram,
    video: Video,
    clint: Clint,
}

impl Bus {
    /// Connects the devices, failing if any two of them share an address.
    pub fn new(rom: Rom, ram: Ram, video: Video, clint: Clint) -> Result<Self, OverlapError> {
        let bus = Self {
            rom,
            ram,
            video,
            clint,
        };
        for (i, &first) in PRIORITY.iter().enumerate() {
            for &second in &PRIORITY[i + 1..] {
                let first_range = bus.device(first).range();
                let second_range = bus.device(second).range();
                if first_range.overlaps(second_range) {
                    return Err(OverlapError {
                        first,
                        first_range,
                        second,
                        second_range,
                    });
                }
            }
        }
        Ok(bus)
    }

    fn device(&self, resource: Resource) -> &dyn MemoryDevice {
        match resource {
            Resource::Rom => &self.rom,
            Resource::Ram => &self.ram,
            Resource::Video => &self.video,
            Resource::Clint => &self.clint,
        }
    }

    fn device_mut(&mut self, resource: Resource) -> &mut dyn MemoryDevice {
        match resource {
            Resource::Rom => &mut self.rom,
            Resource::Ram => &mut self.ram,
            Resource::Video => &mut self.video,
            Resource::Clint => &mut self.clint,
        }
    }

    /// Returns the device `address` is mapped to, if any.
    pub fn resource_at(&self, address: u32) -> Option<Resource> {
        PRIORITY
            .into_iter()
            .find(|&resource| self.device(resource).range().contains(address))
    }

    /// Reads `width` bytes at `address` without mapping the error onto an exception.
    ///
    /// Like every read this has no side effects, so it is safe to use from debuggers.
    pub fn read_debug(&self, address: u32, width: AccessWidth) -> Result<u32, MemoryError> {
        let resource = self.resource_at(address).ok_or(MemoryError::AccessFault)?;
        self.device(resource).read(address, width)
    }

    /// Performs a load of `width` bytes at `address`.
    pub fn read(&self, address: u32, width: AccessWidth) -> Result<u32, Exception> {
        self.read_debug(address, width)
            .map_err(|err| err.to_exception(AccessType::Read))
    }

    /// Fetches the instruction word at `address`.
    pub fn fetch(&self, address: u32) -> Result<u32, Exception> {
        self.read_debug(address, AccessWidth::Word)
            .map_err(|err| err.to_exception(AccessType::Execute))
    }

    /// Performs a store of the low `width` bytes of `value` at `address`.
    pub fn write(&mut self, address: u32, value: u32, width: AccessWidth) -> Result<(), Exception> {
        let resource = self
            .resource_at(address)
            .ok_or(Exception::StoreAccessFault)?;
        log::trace!("{width} store of {value:#010x} to {resource} at {address:#010x}");
        self.device_mut(resource)
            .write(address, value, width)
            .map_err(|err| err.to_exception(AccessType::Write))
    }

    pub fn rom(&self) -> &Rom {
        &self.rom
    }

    pub fn ram(&self) -> &Ram {
        &self.ram
    }

    pub fn video(&self) -> &Video {
        &self.video
    }

    pub fn clint(&self) -> &Clint {
        &self.clint
    }

    pub(crate) fn rom_mut(&mut self) -> &mut Rom {
        &mut self.rom
    }

    pub(crate) fn ram_mut(&mut self) -> &mut Ram {
        &mut self.ram
    }

    pub(crate) fn video_mut(&mut self) -> &mut Video {
        &mut self.video
    }

    pub(crate) fn clint_mut(&mut self) -> &mut Clint {
        &mut self.clint
    }
}
