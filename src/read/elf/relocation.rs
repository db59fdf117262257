use std::io::{Read, Seek};

use crate::elf;
use crate::endian::Endianness;
use crate::read::Result;

use super::{decode_packed_relocations, DynamicInfo, DynamicKind, Reader};

// The number of fixed-size entries fetched by one read.
const PAGE_ENTRIES: usize = 512;

// The size of an entry once widened: `r_offset`, `r_info` and `r_addend`
// as native-endian 64-bit values.
const WIDE_ENTRY: usize = 24;

/// The layout of the entries of a relocation table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelocationFormat {
    /// `SHT_REL` entries, without an addend.
    Rel,
    /// `SHT_RELA` entries, with an addend.
    Rela,
    /// Android packed relocations (`SHT_ANDROID_REL`, `SHT_ANDROID_RELA`).
    Packed,
}

impl RelocationFormat {
    /// Select the format for a section type.
    ///
    /// Returns `None` if the section does not contain relocations.
    pub fn from_section_type(sh_type: u32) -> Option<Self> {
        match sh_type {
            elf::SHT_REL => Some(RelocationFormat::Rel),
            elf::SHT_RELA => Some(RelocationFormat::Rela),
            elf::SHT_ANDROID_REL | elf::SHT_ANDROID_RELA => Some(RelocationFormat::Packed),
            _ => None,
        }
    }

    fn entry_size_is_valid(self, entsize: u64) -> bool {
        match self {
            RelocationFormat::Rel => entsize == 8 || entsize == 16,
            RelocationFormat::Rela => entsize == 12 || entsize == 24,
            RelocationFormat::Packed => true,
        }
    }
}

/// A lazy stream of the relocations of one table.
///
/// Fixed-size entries are read a page at a time. Packed relocations are
/// decoded all at once on the first call to [`next_rela`](Self::next_rela).
/// The stream can be restarted from the beginning with
/// [`rewind`](Self::rewind), but not repositioned otherwise.
#[derive(Debug)]
pub struct RelocationStream<'r, R: Read + Seek> {
    reader: &'r mut Reader<R>,
    format: RelocationFormat,
    offset: u64,
    // Entries for fixed-size tables, bytes for packed tables.
    count: u64,
    entsize: u64,
    // The number of entries fetched so far.
    fetched: u64,
    page: Vec<u8>,
    page_len: usize,
    cur: usize,
    unpacked: Option<Vec<elf::Rela>>,
}

impl<'r, R: Read + Seek> RelocationStream<'r, R> {
    /// The format of the entries.
    #[inline]
    pub fn format(&self) -> RelocationFormat {
        self.format
    }

    /// The number of entries in a fixed-size table.
    ///
    /// For packed relocations this is the size of the table in bytes.
    #[inline]
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Restart the stream from the first entry.
    pub fn rewind(&mut self) {
        self.fetched = 0;
        self.page_len = 0;
        self.cur = 0;
        self.unpacked = None;
    }

    /// Return the next relocation, with `Rel` entries given a zero addend.
    ///
    /// Returns `Ok(None)` at the end of the table, and also when the entry
    /// size is not valid for the format.
    pub fn next_rela(&mut self) -> Result<Option<elf::Rela>> {
        if self.format == RelocationFormat::Packed {
            return self.next_packed();
        }
        if self.cur >= self.page_len {
            if !self.fetch_page()? {
                return Ok(None);
            }
        }
        let entry = &self.page[self.cur * WIDE_ENTRY..][..WIDE_ENTRY];
        self.cur += 1;
        Ok(Some(elf::Rela {
            r_offset: u64::from_ne_bytes(field(entry, 0)),
            r_info: u64::from_ne_bytes(field(entry, 1)),
            r_addend: i64::from_ne_bytes(field(entry, 2)),
        }))
    }

    /// Return the next relocation without its addend.
    pub fn next_rel(&mut self) -> Result<Option<elf::Rel>> {
        Ok(self.next_rela()?.map(|rela| elf::Rel {
            r_offset: rela.r_offset,
            r_info: rela.r_info,
        }))
    }

    /// Read the remaining relocations.
    pub fn collect_rela(&mut self) -> Result<Vec<elf::Rela>> {
        let mut relocations = Vec::new();
        while let Some(rela) = self.next_rela()? {
            relocations.push(rela);
        }
        Ok(relocations)
    }

    fn fetch_page(&mut self) -> Result<bool> {
        if !self.format.entry_size_is_valid(self.entsize) {
            return Ok(false);
        }
        let left = self.count - self.fetched;
        if left == 0 {
            return Ok(false);
        }
        let entries = left.min(PAGE_ENTRIES as u64) as usize;
        let entsize = self.entsize as usize;
        let position = self.offset + self.fetched * self.entsize;

        self.page.resize(entries * WIDE_ENTRY, 0);
        {
            let mut this = self.reader.excursion();
            this.seek(position)?;
            this.read_exact(&mut self.page[..entries * entsize])?;
        }
        let endian = self.reader.endian;
        widen_entries(&mut self.page, entries, entsize, endian);

        self.fetched += entries as u64;
        self.page_len = entries;
        self.cur = 0;
        Ok(true)
    }

    fn next_packed(&mut self) -> Result<Option<elf::Rela>> {
        if self.unpacked.is_none() {
            let data = self.reader.read_bytes_at(self.offset, self.count)?;
            let relocations = match decode_packed_relocations(&data, self.count) {
                Ok(relocations) => relocations,
                Err(diagnostic) => return Err(self.reader.fail(diagnostic)),
            };
            self.unpacked = Some(relocations);
            self.cur = 0;
        }
        let rela = self
            .unpacked
            .as_ref()
            .and_then(|relocations| relocations.get(self.cur))
            .copied();
        if rela.is_some() {
            self.cur += 1;
        }
        Ok(rela)
    }
}

fn field(entry: &[u8], index: usize) -> [u8; 8] {
    let mut bytes = [0; 8];
    bytes.copy_from_slice(&entry[index * 8..][..8]);
    bytes
}

/// Convert `count` entries of `entsize` bytes in file byte order at the
/// start of `buf` into native-endian 64-bit entries of `WIDE_ENTRY` bytes.
///
/// Entries only grow, so converting from the last entry down never
/// overwrites an entry that has not been converted yet.
fn widen_entries(buf: &mut [u8], count: usize, entsize: usize, endian: Endianness) {
    let word = if entsize == 8 || entsize == 12 { 4 } else { 8 };
    let has_addend = entsize == 3 * word;
    for i in (0..count).rev() {
        let src = &buf[i * entsize..][..entsize];
        let read = |index: usize| -> u64 {
            let bytes = &src[index * word..][..word];
            if word == 4 {
                let mut array = [0; 4];
                array.copy_from_slice(bytes);
                u64::from(endian.read_u32_bytes(array))
            } else {
                let mut array = [0; 8];
                array.copy_from_slice(bytes);
                endian.read_u64_bytes(array)
            }
        };
        let r_offset = read(0);
        let r_info = read(1);
        let r_addend = match (has_addend, word) {
            (false, _) => 0,
            // Sign extend 32-bit addends.
            (true, 4) => i64::from(read(2) as u32 as i32),
            (true, _) => read(2) as i64,
        };
        let dst = &mut buf[i * WIDE_ENTRY..][..WIDE_ENTRY];
        dst[..8].copy_from_slice(&r_offset.to_ne_bytes());
        dst[8..16].copy_from_slice(&r_info.to_ne_bytes());
        dst[16..].copy_from_slice(&r_addend.to_ne_bytes());
    }
}

impl<R: Read + Seek> Reader<R> {
    /// Create a stream over the relocations described by a section header.
    ///
    /// The format is chosen from the section type. The number of entries is
    /// derived from the size of the section that is present in the file.
    /// Returns `None` if the section does not contain relocations.
    pub fn relocations(
        &mut self,
        section: &elf::SectionHeader,
    ) -> Option<RelocationStream<'_, R>> {
        let format = RelocationFormat::from_section_type(section.sh_type)?;
        let size = match self.sections.iter().position(|s| s == section) {
            Some(index) => self.sections.size_in_file(index as u32),
            None => section
                .sh_size
                .min(self.size().saturating_sub(section.sh_offset)),
        };
        let (count, entsize) = match format {
            RelocationFormat::Packed => (size, 0),
            _ if section.sh_entsize == 0 => (0, 0),
            _ => (size / section.sh_entsize, section.sh_entsize),
        };
        Some(self.relocation_stream(format, section.sh_offset, count, entsize))
    }

    /// Create a stream over a table located by dynamic tags.
    ///
    /// `kind` must be one of the relocation kinds: `Rel`, `Rela`, `Plt`,
    /// `AndroidRel` or `AndroidRela`.
    pub fn dynamic_relocations(
        &mut self,
        info: &DynamicInfo,
        kind: DynamicKind,
    ) -> Option<RelocationStream<'_, R>> {
        match kind {
            DynamicKind::Rel
            | DynamicKind::Rela
            | DynamicKind::Plt
            | DynamicKind::AndroidRel
            | DynamicKind::AndroidRela => {}
            _ => return None,
        }
        let mut section = info.fill_section_header(kind)?;
        if kind == DynamicKind::AndroidRel {
            section.sh_type = elf::SHT_ANDROID_REL;
        } else if kind == DynamicKind::AndroidRela {
            section.sh_type = elf::SHT_ANDROID_RELA;
        }
        self.relocations(&section)
    }

    /// Create a stream over `count` entries at `offset`.
    ///
    /// For packed relocations, `count` is the size of the table in bytes and
    /// `entsize` is ignored.
    pub fn relocation_stream(
        &mut self,
        format: RelocationFormat,
        offset: u64,
        count: u64,
        entsize: u64,
    ) -> RelocationStream<'_, R> {
        RelocationStream {
            reader: self,
            format,
            offset,
            count,
            entsize,
            fetched: 0,
            page: Vec::new(),
            page_len: 0,
            cur: 0,
            unpacked: None,
        }
    }

    /// Read all of the relocations described by a section header.
    ///
    /// Returns an empty list if the section does not contain relocations.
    pub fn read_relocations(&mut self, section: &elf::SectionHeader) -> Result<Vec<elf::Rela>> {
        match self.relocations(section) {
            Some(mut stream) => stream.collect_rela(),
            None => Ok(Vec::new()),
        }
    }
}
