use std::fmt;
use std::fmt::{Display, Formatter};
use std::ops::RangeInclusive;
use thiserror::Error;

/// A non-empty range in a 32-bit address space bounded inclusively below and above.
///
/// Enforces the invariant that `self.start() <= self.end()`.
///
/// Every memory device occupies exactly one such range. The inclusive upper bound means a device
/// may end at `0xFFFF_FFFF` without the bounds overflowing.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct AddressRange {
    start: u32,
    end: u32,
}

impl Display for AddressRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "[{:#010x}, {:#010x}]", self.start, self.end)
    }
}

impl AddressRange {
    pub fn new(start: u32, end: u32) -> Result<Self, InvalidBoundsError> {
        (start <= end)
            .then_some(Self { start, end })
            .ok_or(InvalidBoundsError { start, end })
    }

    /// Create the range `[base, base + size)`.
    ///
    /// Fails if `size` is zero, or if the range would extend past `0xFFFF_FFFF`.
    pub fn from_base_size(base: u32, size: u32) -> Result<Self, InvalidBoundsError> {
        let end = size
            .checked_sub(1)
            .and_then(|delta| base.checked_add(delta))
            .ok_or(InvalidBoundsError {
                start: base,
                end: base.wrapping_add(size),
            })?;
        Self::new(base, end)
    }

    pub fn start(self) -> u32 {
        self.start
    }

    pub fn end(self) -> u32 {
        self.end
    }

    /// Check if an address is contained within this address range.
    pub fn contains(self, address: u32) -> bool {
        self.start <= address && address <= self.end
    }

    /// Check if all `len` bytes starting at `address` are contained within this range.
    ///
    /// An empty access is contained if `address` itself is.
    pub fn contains_span(self, address: u32, len: u32) -> bool {
        self.contains(address)
            && len
                .checked_sub(1)
                .map(|delta| self.end - address >= delta)
                .unwrap_or(true)
    }

    /// Returns `true` if at least one address is contained in both ranges.
    pub fn overlaps(self, other: Self) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    /// Returns the offset of `address` from the start of this range, or `None` if `address` is
    /// outside the range.
    pub fn offset_of(self, address: u32) -> Option<usize> {
        const_assert!(usize::BITS >= 32);
        self.contains(address)
            .then(|| (address - self.start) as usize)
    }

    /// Returns `self.end() - self.start()`, which is the size minus 1.
    pub fn delta(self) -> u32 {
        self.end - self.start
    }

    /// Returns the number of addresses in this range.
    ///
    /// Uses `u64` since the full 32-bit range holds `1 << 32` addresses.
    pub fn size(self) -> u64 {
        self.delta() as u64 + 1
    }
}

impl TryFrom<RangeInclusive<u32>> for AddressRange {
    type Error = InvalidBoundsError;

    fn try_from(value: RangeInclusive<u32>) -> Result<Self, Self::Error> {
        Self::new(*value.start(), *value.end())
    }
}

impl From<AddressRange> for RangeInclusive<u32> {
    fn from(value: AddressRange) -> Self {
        value.start..=value.end
    }
}

#[derive(Error, Debug, Clone, Eq, PartialEq)]
#[error("bounds [{start:#x}, {end:#x}] do not form a valid 32-bit address range")]
pub struct InvalidBoundsError {
    start: u32,
    end: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_base_size() {
        let range = AddressRange::from_base_size(0x2000_0000, 0x10).unwrap();
        assert_eq!(0x2000_0000, range.start());
        assert_eq!(0x2000_000f, range.end());
        assert_eq!(0x10, range.size());
        assert!(AddressRange::from_base_size(0x1000, 0).is_err());
        assert!(AddressRange::from_base_size(0xFFFF_FFF0, 0x20).is_err());
        let top = AddressRange::from_base_size(0xFFFF_FFF0, 0x10).unwrap();
        assert_eq!(u32::MAX, top.end());
    }

    #[test]
    fn test_contains_span() {
        let range = AddressRange::new(0x100, 0x1ff).unwrap();
        assert!(range.contains_span(0x1fc, 4));
        assert!(!range.contains_span(0x1fd, 4));
        assert!(!range.contains_span(0xff, 1));
        assert!(range.contains_span(0x1ff, 0));
    }

    #[test]
    fn test_overlaps() {
        let a = AddressRange::new(0x100, 0x1ff).unwrap();
        let b = AddressRange::new(0x1ff, 0x2ff).unwrap();
        let c = AddressRange::new(0x200, 0x2ff).unwrap();
        assert!(a.overlaps(b));
        assert!(b.overlaps(a));
        assert!(!a.overlaps(c));
        assert!(!c.overlaps(a));
    }

    #[test]
    fn test_offset_of() {
        let range = AddressRange::new(0x100, 0x1ff).unwrap();
        assert_eq!(Some(0), range.offset_of(0x100));
        assert_eq!(Some(0xff), range.offset_of(0x1ff));
        assert_eq!(None, range.offset_of(0x200));
    }
}
