//! Byte order handling.
//!
//! ELF files declare their byte order in the identification, but the reader
//! may decide on a different effective byte order (see
//! [`Reader::read_header`](crate::read::elf::Reader::read_header)), so the
//! byte order is a run-time value rather than a type parameter.

/// An endianness that is selectable at run-time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endianness {
    /// Little endian byte order.
    Little,
    /// Big endian byte order.
    Big,
}

impl Default for Endianness {
    #[cfg(target_endian = "little")]
    #[inline]
    fn default() -> Endianness {
        Endianness::Little
    }

    #[cfg(target_endian = "big")]
    #[inline]
    fn default() -> Endianness {
        Endianness::Big
    }
}

impl Endianness {
    /// Construct from a flag that is true for big endian.
    #[inline]
    pub fn from_big_endian(big_endian: bool) -> Self {
        if big_endian {
            Endianness::Big
        } else {
            Endianness::Little
        }
    }

    /// Return true for big endian byte order.
    #[inline]
    pub fn is_big_endian(self) -> bool {
        self == Endianness::Big
    }

    /// Return true for little endian byte order.
    #[inline]
    pub fn is_little_endian(self) -> bool {
        self == Endianness::Little
    }

    /// Return the opposite byte order.
    #[inline]
    pub fn swapped(self) -> Self {
        match self {
            Endianness::Little => Endianness::Big,
            Endianness::Big => Endianness::Little,
        }
    }

    /// Converts an unaligned `u16` from this endianness to native.
    #[inline]
    pub fn read_u16_bytes(self, n: [u8; 2]) -> u16 {
        match self {
            Endianness::Little => u16::from_le_bytes(n),
            Endianness::Big => u16::from_be_bytes(n),
        }
    }

    /// Converts an unaligned `u32` from this endianness to native.
    #[inline]
    pub fn read_u32_bytes(self, n: [u8; 4]) -> u32 {
        match self {
            Endianness::Little => u32::from_le_bytes(n),
            Endianness::Big => u32::from_be_bytes(n),
        }
    }

    /// Converts an unaligned `u64` from this endianness to native.
    #[inline]
    pub fn read_u64_bytes(self, n: [u8; 8]) -> u64 {
        match self {
            Endianness::Little => u64::from_le_bytes(n),
            Endianness::Big => u64::from_be_bytes(n),
        }
    }

    /// Converts a native `u16` to bytes in this endianness.
    #[inline]
    pub fn write_u16_bytes(self, n: u16) -> [u8; 2] {
        match self {
            Endianness::Little => n.to_le_bytes(),
            Endianness::Big => n.to_be_bytes(),
        }
    }

    /// Converts a native `u32` to bytes in this endianness.
    #[inline]
    pub fn write_u32_bytes(self, n: u32) -> [u8; 4] {
        match self {
            Endianness::Little => n.to_le_bytes(),
            Endianness::Big => n.to_be_bytes(),
        }
    }

    /// Converts a native `u64` to bytes in this endianness.
    #[inline]
    pub fn write_u64_bytes(self, n: u64) -> [u8; 8] {
        match self {
            Endianness::Little => n.to_le_bytes(),
            Endianness::Big => n.to_be_bytes(),
        }
    }
}
