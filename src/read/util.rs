use core::fmt;

use crate::endian::Endianness;

/// A newtype for byte slices.
///
/// It provides endian-aware reads of the scalar types used by in-memory
/// ELF structures (notes, version records, frame records, packed relocations).
/// Every failed read empties the cursor.
#[derive(Default, Clone, Copy, PartialEq, Eq)]
pub struct Bytes<'data>(pub &'data [u8]);

impl<'data> fmt::Debug for Bytes<'data> {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut list = fmt.debug_list();
        list.entries(self.0.iter().take(8).map(|x| DebugByte(*x)));
        if self.0.len() > 8 {
            list.entry(&DebugLen(self.0.len()));
        }
        list.finish()
    }
}

struct DebugByte(u8);

impl fmt::Debug for DebugByte {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "0x{:02x}", self.0)
    }
}

struct DebugLen(usize);

impl fmt::Debug for DebugLen {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "...; {}", self.0)
    }
}

impl<'data> Bytes<'data> {
    /// Return the number of bytes remaining.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Return true if no bytes remain.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Skip over the given number of bytes.
    #[inline]
    pub fn skip(&mut self, offset: usize) -> Option<()> {
        match self.0.get(offset..) {
            Some(tail) => {
                self.0 = tail;
                Some(())
            }
            None => {
                self.0 = &[];
                None
            }
        }
    }

    /// Read the given number of bytes.
    #[inline]
    pub fn read_bytes(&mut self, count: usize) -> Option<Bytes<'data>> {
        match (self.0.get(..count), self.0.get(count..)) {
            (Some(head), Some(tail)) => {
                self.0 = tail;
                Some(Bytes(head))
            }
            _ => {
                self.0 = &[];
                None
            }
        }
    }

    /// Read the given number of bytes at an offset.
    #[inline]
    pub fn read_bytes_at(mut self, offset: usize, count: usize) -> Option<Bytes<'data>> {
        self.skip(offset)?;
        self.read_bytes(count)
    }

    #[inline]
    fn read_array<const N: usize>(&mut self) -> Option<[u8; N]> {
        let bytes = self.read_bytes(N)?;
        let mut array = [0; N];
        array.copy_from_slice(bytes.0);
        Some(array)
    }

    /// Read a byte.
    #[inline]
    pub fn read_u8(&mut self) -> Option<u8> {
        let [byte] = self.read_array::<1>()?;
        Some(byte)
    }

    /// Read a `u16` in the given byte order.
    #[inline]
    pub fn read_u16(&mut self, endian: Endianness) -> Option<u16> {
        self.read_array().map(|b| endian.read_u16_bytes(b))
    }

    /// Read a `u32` in the given byte order.
    #[inline]
    pub fn read_u32(&mut self, endian: Endianness) -> Option<u32> {
        self.read_array().map(|b| endian.read_u32_bytes(b))
    }

    /// Read a `u64` in the given byte order.
    #[inline]
    pub fn read_u64(&mut self, endian: Endianness) -> Option<u64> {
        self.read_array().map(|b| endian.read_u64_bytes(b))
    }

    /// Read a 32-bit or 64-bit word, widened to `u64`.
    #[inline]
    pub fn read_word(&mut self, endian: Endianness, is_64: bool) -> Option<u64> {
        if is_64 {
            self.read_u64(endian)
        } else {
            self.read_u32(endian).map(u64::from)
        }
    }

    /// Read a null terminated string.
    ///
    /// Does not assume any encoding.
    /// Reads past the null byte, but doesn't return it.
    #[inline]
    pub fn read_string(&mut self) -> Option<&'data [u8]> {
        match memchr::memchr(b'\0', self.0) {
            Some(null) => {
                // These will never fail.
                let bytes = self.read_bytes(null)?;
                self.skip(1)?;
                Some(bytes.0)
            }
            None => {
                self.0 = &[];
                None
            }
        }
    }

    /// Read a null terminated string at an offset.
    ///
    /// Does not assume any encoding. Does not return the null byte.
    #[inline]
    pub fn read_string_at(mut self, offset: usize) -> Option<&'data [u8]> {
        self.skip(offset)?;
        self.read_string()
    }

    /// Read an unsigned LEB128 number.
    ///
    /// Bits beyond the 64th are discarded.
    pub fn read_uleb128(&mut self) -> Option<u64> {
        let mut result = 0;
        let mut shift = 0;

        loop {
            let byte = self.read_u8()?;
            if shift < 64 {
                result |= u64::from(byte & 0x7f) << shift;
            }
            shift += 7;

            if byte & 0x80 == 0 {
                return Some(result);
            }
        }
    }

    /// Read a signed LEB128 number.
    ///
    /// Bits beyond the 64th are discarded.
    pub fn read_sleb128(&mut self) -> Option<i64> {
        let mut result = 0;
        let mut shift = 0;

        loop {
            let byte = self.read_u8()?;
            if shift < 64 {
                result |= i64::from(byte & 0x7f) << shift;
            }
            shift += 7;

            if byte & 0x80 == 0 {
                if shift < 64 && byte & 0x40 != 0 {
                    // Sign extend.
                    result |= !0 << shift;
                }
                return Some(result);
            }
        }
    }
}

/// Round `offset` up to the next multiple of `align`, which must be a power of two.
#[inline]
pub(crate) fn align(offset: usize, align: usize) -> usize {
    (offset + (align - 1)) & !(align - 1)
}

/// Encode bytes as lowercase hexadecimal.
pub fn hex_string(bytes: &[u8]) -> String {
    const DIGITS: &[u8; 16] = b"0123456789abcdef";
    let mut s = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        s.push(char::from(DIGITS[usize::from(byte >> 4)]));
        s.push(char::from(DIGITS[usize::from(byte & 0xf)]));
    }
    s
}
