use std::io::{Read, Seek};

#[cfg(feature = "logging")]
use log::warn;

use crate::elf;
use crate::read::Result;

use super::{DynamicEntry, Reader};

/// The placeholder returned when there is no string table.
pub const NO_STRING_TABLE: &str = "{no string table}";

/// Appended to a string that runs into the end of the file or its table.
pub const TRUNCATED_NAME: &str = "{truncated name}";

/// The maximum number of bytes read for one string.
pub const MAX_STRING_LENGTH: u64 = 0x1_0000;

// Strings are read in chunks of this size until a NUL is found.
const STRING_CHUNK: usize = 100;

/// The location of a string table in the file.
///
/// A size of 0 means the size is unknown, and names are not bounds checked.
/// Some Cisco IOS images have string sections like this.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StringTable {
    /// The file offset of the table.
    pub offset: u64,
    /// The virtual address of the table, if known.
    pub addr: u64,
    /// The size of the table in bytes.
    pub size: u64,
}

impl StringTable {
    /// Construct a string table location.
    pub fn new(offset: u64, addr: u64, size: u64) -> Self {
        StringTable { offset, addr, size }
    }

    /// Return true if the table has a location.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.offset != 0
    }

    pub(crate) fn from_section(section: &elf::SectionHeader) -> Self {
        StringTable::new(section.sh_offset, section.sh_addr, section.sh_size)
    }
}

impl From<DynamicEntry> for StringTable {
    fn from(entry: DynamicEntry) -> Self {
        StringTable::new(entry.offset, entry.addr, entry.size)
    }
}

/// The string tables a symbol name can come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StringTableKind {
    Symbols,
    Dynamic,
}

impl StringTableKind {
    #[cfg(feature = "logging")]
    fn describe(self) -> &'static str {
        match self {
            StringTableKind::Symbols => "",
            StringTableKind::Dynamic => "dynamic linking ",
        }
    }
}

// Section types that can never hold strings.
fn is_illegal_string_table_type(sh_type: u32) -> bool {
    match sh_type {
        elf::SHT_NULL
        | elf::SHT_REL
        | elf::SHT_RELA
        | elf::SHT_DYNAMIC
        | elf::SHT_DYNSYM
        | elf::SHT_SYMTAB => true,
        _ => false,
    }
}

impl<R: Read + Seek> Reader<R> {
    /// Read a NUL terminated string at a file offset.
    ///
    /// A string that runs into the end of the file, or is longer than
    /// [`MAX_STRING_LENGTH`], is returned with [`TRUNCATED_NAME`] appended.
    pub fn get_string_at(&mut self, offset: u64) -> Result<String> {
        self.read_string_at(offset, MAX_STRING_LENGTH)
    }

    // Read at most `limit` bytes looking for the NUL.
    fn read_string_at(&mut self, offset: u64, limit: u64) -> Result<String> {
        let mut this = self.excursion();
        this.seek(offset)?;

        let mut bytes = Vec::new();
        let mut chunk = [0; STRING_CHUNK];
        let mut left = limit;
        loop {
            let want = (STRING_CHUNK as u64).min(left) as usize;
            let read = this.source.read(&mut chunk[..want]);
            let chunk = &chunk[..read];
            if let Some(end) = memchr::memchr(0, chunk) {
                bytes.extend_from_slice(&chunk[..end]);
                return Ok(String::from_utf8_lossy(&bytes).into_owned());
            }
            bytes.extend_from_slice(chunk);
            left -= read as u64;
            if read < want || left == 0 {
                let mut name = String::from_utf8_lossy(&bytes).into_owned();
                name.push_str(TRUNCATED_NAME);
                return Ok(name);
            }
        }
    }

    /// Return the string at `index` in a string table.
    ///
    /// Name lookups never fail: a missing table or a bad index give a
    /// placeholder string instead.
    pub fn get_name(&mut self, strtab: &StringTable, index: u32) -> String {
        let index = u64::from(index);
        if !strtab.is_valid() {
            return NO_STRING_TABLE.into();
        }
        let offset = strtab.offset.wrapping_add(index);
        if strtab.size != 0 && index >= strtab.size {
            return format!("bad offset {:08x}", offset as u32);
        }
        let limit = if strtab.size != 0 {
            (strtab.size - index).min(MAX_STRING_LENGTH)
        } else {
            MAX_STRING_LENGTH
        };
        match self.read_string_at(offset, limit) {
            Ok(name) => name,
            Err(_) => format!("bad offset {:08x}", offset as u32),
        }
    }

    // Use a string table section, unless it is of a type that cannot hold
    // strings. With `replace`, a section named by `sh_link` overrides a
    // table found by name.
    pub(crate) fn set_sh_strtab(
        &mut self,
        kind: StringTableKind,
        section: &elf::SectionHeader,
        replace: bool,
    ) {
        if is_illegal_string_table_type(section.sh_type) {
            #[cfg(feature = "logging")]
            warn!(
                "Illegal type {:#x} of the string table section",
                section.sh_type
            );
            return;
        }
        if section.sh_offset == 0 {
            #[cfg(feature = "logging")]
            warn!("Illegal offset of the string table section");
            return;
        }
        let table = match kind {
            StringTableKind::Symbols => &mut self.sym_strtab,
            StringTableKind::Dynamic => &mut self.dyn_strtab,
        };
        if table.is_valid() {
            if table.offset == section.sh_offset {
                return;
            }
            #[cfg(feature = "logging")]
            warn!(
                "More than one string table for {}symbols, using one at offset {:08X}",
                kind.describe(),
                if replace { section.sh_offset } else { table.offset }
            );
            if !replace {
                return;
            }
        }
        *table = StringTable::from_section(section);
    }

    /// Use the dynamic string table found by `DT_STRTAB`.
    ///
    /// It replaces any table found through the section headers.
    pub fn set_di_strtab(&mut self, entry: &DynamicEntry) {
        if !entry.is_valid() {
            return;
        }
        if self.dyn_strtab.is_valid() {
            if self.dyn_strtab.offset == entry.offset {
                return;
            }
            #[cfg(feature = "logging")]
            warn!(
                "The dynamic section string table from section header ({:08X}) differs from DT_STRTAB's one ({:08X}), using the latter",
                self.dyn_strtab.offset, entry.offset
            );
        }
        self.dyn_strtab = StringTable::from(*entry);
    }

    /// Return the string for a string-valued dynamic tag such as `DT_NEEDED`.
    ///
    /// Returns `None` for tags whose value is not a string table offset.
    pub fn dynamic_string(&mut self, tag: i64, value: u64) -> Option<String> {
        if !elf::tag_is_string(tag) {
            return None;
        }
        let strtab = self.dyn_strtab;
        Some(self.get_name(&strtab, value as u32))
    }

    pub(crate) fn string_table(&self, kind: StringTableKind) -> StringTable {
        match kind {
            StringTableKind::Symbols => self.sym_strtab,
            StringTableKind::Dynamic => self.dyn_strtab,
        }
    }
}
