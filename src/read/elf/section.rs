use std::io::{Read, Seek};
use std::slice;

#[cfg(feature = "logging")]
use log::warn;

use crate::elf;
use crate::read::{ParseDiagnostic, Result};

use super::{DynamicLinkingTables, Reader, Stage, StringTable, StringTableKind};

/// A section that the reader locates while reading the section headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WellKnownSection {
    /// The `SHT_SYMTAB` section.
    Symtab,
    /// The `SHT_DYNSYM` section.
    Dynsym,
    /// The `SHT_SYMTAB_SHNDX` section linked to the symbol table.
    SymtabShndx,
    /// The `SHT_SYMTAB_SHNDX` section linked to the dynamic symbol table.
    DynsymShndx,
    /// `.interp`
    Interp,
    /// `.got`
    Got,
    /// `.got.plt`, or `.got` if there is no `.got.plt`.
    GotPlt,
    /// `.plt`
    Plt,
    /// `.plt.got`
    PltGot,
    /// `.plt.sec`
    PltSec,
    /// `.gnu_debugdata`
    GnuDebugdata,
    /// `.gnu_debuglink`
    GnuDebuglink,
    /// `.eh_frame`
    EhFrame,
    /// `.opd`, the function descriptors of 64-bit PowerPC.
    Opd,
    /// The `SHT_GNU_VERDEF` section.
    Verdef,
    /// The `SHT_GNU_VERNEED` section.
    Verneed,
    /// The `SHT_GNU_VERSYM` section.
    Versym,
}

impl WellKnownSection {
    const COUNT: usize = 17;
}

/// The section header table of a file.
///
/// Section 0 is always present once the table has been read. Names are
/// resolved when the table is read, using the section name string table.
#[derive(Debug, Clone)]
pub struct SectionTable {
    initialized: bool,
    file_size: u64,
    shoff: u64,
    shentsize: u16,
    headers: Vec<elf::SectionHeader>,
    names: Vec<String>,
    strtab: StringTable,
    well_known: [u32; WellKnownSection::COUNT],
    dlt: Option<DynamicLinkingTables>,
}

impl SectionTable {
    pub(crate) fn new(file_size: u64) -> Self {
        SectionTable {
            initialized: false,
            file_size,
            shoff: 0,
            shentsize: 0,
            headers: Vec::new(),
            names: Vec::new(),
            strtab: StringTable::default(),
            well_known: [0; WellKnownSection::COUNT],
            dlt: None,
        }
    }

    pub(crate) fn reset(&mut self, shoff: u64, shentsize: u16) {
        *self = SectionTable {
            shoff,
            shentsize,
            ..SectionTable::new(self.file_size)
        };
    }

    /// Return true if the section headers have been read.
    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// The number of sections, including section 0.
    #[inline]
    pub fn len(&self) -> usize {
        self.headers.len()
    }

    /// Return true if there are no sections.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Iterate over the section headers, including section 0.
    #[inline]
    pub fn iter(&self) -> slice::Iter<'_, elf::SectionHeader> {
        self.headers.iter()
    }

    /// The file offset of the section header at an index.
    #[inline]
    pub fn header_offset(&self, index: u32) -> u64 {
        self.shoff + u64::from(index) * u64::from(self.shentsize)
    }

    /// Return the section header at an index.
    pub fn get(&self, index: u32) -> Option<&elf::SectionHeader> {
        self.headers.get(index as usize)
    }

    /// Return the name of the section at an index.
    ///
    /// The name is empty if there is no section name string table.
    pub fn name(&self, index: u32) -> Option<&str> {
        self.names.get(index as usize).map(String::as_str)
    }

    /// The location of the section name string table.
    #[inline]
    pub fn strtab(&self) -> &StringTable {
        &self.strtab
    }

    /// Find the first section with the given type and name.
    pub fn by_type_and_name(&self, sh_type: u32, name: &str) -> Option<(u32, &elf::SectionHeader)> {
        self.headers
            .iter()
            .zip(self.names.iter())
            .enumerate()
            .find(|(_, (section, section_name))| {
                section.sh_type == sh_type && section_name.as_str() == name
            })
            .map(|(index, (section, _))| (index as u32, section))
    }

    /// Find the relocation section that applies to the section at `index`.
    ///
    /// Returns the index of the relocation section, its header, and true if
    /// it is `SHT_RELA`.
    pub fn rel_for(&self, index: u32) -> Option<(u32, &elf::SectionHeader, bool)> {
        if index == 0 {
            return None;
        }
        self.headers
            .iter()
            .enumerate()
            .find(|(_, section)| {
                section.sh_info == index
                    && (section.sh_type == elf::SHT_REL || section.sh_type == elf::SHT_RELA)
            })
            .map(|(i, section)| (i as u32, section, section.sh_type == elf::SHT_RELA))
    }

    /// Return the index of a well-known section, or 0 if it was not found.
    #[inline]
    pub fn index_of(&self, section: WellKnownSection) -> u32 {
        self.well_known[section as usize]
    }

    /// Return the header of a well-known section.
    pub fn well_known(&self, section: WellKnownSection) -> Option<&elf::SectionHeader> {
        match self.index_of(section) {
            0 => None,
            index => self.get(index),
        }
    }

    fn set_index(&mut self, section: WellKnownSection, index: u32) {
        self.well_known[section as usize] = index;
    }

    /// The number of bytes of a section that are present in the file.
    ///
    /// This is bounded by the file size, and by the offset of the next
    /// section if it starts later. `SHT_NOBITS` sections have no bytes.
    pub fn size_in_file(&self, index: u32) -> u64 {
        let section = match self.get(index) {
            Some(section) => section,
            None => return 0,
        };
        if section.sh_type == elf::SHT_NOBITS {
            return 0;
        }
        let mut boundary = self.file_size;
        if let Some(next) = self.get(index + 1) {
            if next.sh_offset < boundary && next.sh_offset >= section.sh_offset {
                boundary = next.sh_offset;
            }
        }
        if section.sh_offset >= boundary {
            return 0;
        }
        section.sh_size.min(boundary - section.sh_offset)
    }

    /// The location of the dynamic linking tables given by the first
    /// `SHT_DYNAMIC` section.
    #[inline]
    pub fn dynamic_linking_tables(&self) -> Option<DynamicLinkingTables> {
        self.dlt
    }
}

impl<R: Read + Seek> Reader<R> {
    /// Read the section header table.
    ///
    /// Returns `Ok(false)` if the file has no usable section header table.
    /// Besides the headers, this locates the symbol and dynamic string
    /// tables, the section name string table, and the well-known sections.
    pub fn read_section_headers(&mut self) -> Result<bool> {
        if !self.header.has_sht() {
            return Ok(false);
        }
        let shnum = self.header.real_shnum;
        let shoff = self.header.e_shoff;
        let shentsize = u64::from(self.header.e_shentsize);

        self.sections.reset(shoff, self.header.e_shentsize);
        self.sections.initialized = true;

        let mut headers = Vec::with_capacity(shnum.min(self.size() / shentsize.max(1)) as usize);
        {
            let mut this = self.excursion();
            for i in 0..shnum {
                let offset = this.sections.header_offset(i as u32);
                this.seek(offset)?;
                headers.push(this.read_section_header()?);
            }
        }
        // `sh_size` and `sh_link` of section 0 may hold the count escapes.
        if let Some(zero) = headers.first_mut() {
            let escapes = elf::SectionHeader {
                sh_size: zero.sh_size,
                sh_link: zero.sh_link,
                ..Default::default()
            };
            if *zero != escapes {
                self.report(ParseDiagnostic::BadSectionZero)?;
                *zero = elf::SectionHeader::default();
            }
        }
        self.sections.headers = headers;
        if self.stage < Stage::TablesRead {
            self.stage = Stage::TablesRead;
        }

        // The symbol string tables are linked from their symbol tables, and
        // must be known before the second pass.
        for index in 1..self.sections.len() as u32 {
            let section = self.sections.headers[index as usize];
            if section.sh_size == 0 {
                continue;
            }
            let linked = self.sections.get(section.sh_link).copied();
            match section.sh_type {
                elf::SHT_SYMTAB => {
                    self.sections.set_index(WellKnownSection::Symtab, index);
                    match linked {
                        Some(strtab) => self.set_sh_strtab(StringTableKind::Symbols, &strtab, true),
                        None => {
                            #[cfg(feature = "logging")]
                            warn!(
                                "Illegal link section {} of the string table for symbols",
                                section.sh_link
                            );
                        }
                    }
                }
                elf::SHT_DYNSYM => {
                    self.sections.set_index(WellKnownSection::Dynsym, index);
                    match linked {
                        Some(strtab) => self.set_sh_strtab(StringTableKind::Dynamic, &strtab, true),
                        None => {
                            #[cfg(feature = "logging")]
                            warn!(
                                "Illegal link section {} of the string table for dynamic linking symbols",
                                section.sh_link
                            );
                        }
                    }
                }
                elf::SHT_DYNAMIC => {
                    if self.sections.dlt.is_none() {
                        self.sections.dlt = Some(DynamicLinkingTables {
                            offset: section.sh_offset,
                            addr: section.sh_addr,
                            size: section.sh_size,
                            link: Some(section.sh_link),
                        });
                    }
                    match linked {
                        // OAT files link `.dynamic` to `.dynsym`.
                        Some(strtab) if strtab.sh_type == elf::SHT_DYNSYM => {}
                        Some(strtab) => self.set_sh_strtab(StringTableKind::Dynamic, &strtab, true),
                        None => {
                            #[cfg(feature = "logging")]
                            warn!(
                                "Illegal link section {} of the dynamic linking information section",
                                section.sh_link
                            );
                        }
                    }
                }
                _ => {}
            }
        }

        // The type of the section name string table is not checked, since it
        // is not always `SHT_STRTAB`.
        let shstrndx = self.header.real_shstrndx;
        if shstrndx != 0 {
            if let Some(shstrtab) = self.sections.get(shstrndx) {
                self.sections.strtab = StringTable::from_section(shstrtab);
            }
        }

        let strtab = self.sections.strtab;
        let mut names = Vec::with_capacity(self.sections.len());
        for index in 0..self.sections.len() {
            let sh_name = self.sections.headers[index].sh_name;
            if strtab.is_valid() {
                names.push(self.get_name(&strtab, sh_name));
            } else {
                names.push(String::new());
            }
        }
        self.sections.names = names;

        for index in 1..self.sections.len() as u32 {
            let section = self.sections.headers[index as usize];
            if section.sh_size == 0 {
                continue;
            }
            let name = self.sections.names[index as usize].clone();
            self.classify_section(index, &section, &name);
        }

        let got = self.sections.index_of(WellKnownSection::Got);
        if self.sections.index_of(WellKnownSection::GotPlt) == 0 {
            self.sections.set_index(WellKnownSection::GotPlt, got);
        } else if got == 0 {
            // A `.got.plt` without a `.got` is not supported.
            self.sections.set_index(WellKnownSection::GotPlt, 0);
        }

        Ok(true)
    }

    fn classify_section(&mut self, index: u32, section: &elf::SectionHeader, name: &str) {
        use WellKnownSection::*;

        let well_known = match section.sh_type {
            elf::SHT_STRTAB => {
                // Lower priority than a table named by `sh_link`.
                match name {
                    ".strtab" => self.set_sh_strtab(StringTableKind::Symbols, section, false),
                    ".dynstr" => self.set_sh_strtab(StringTableKind::Dynamic, section, false),
                    _ => {}
                }
                return;
            }
            elf::SHT_SYMTAB_SHNDX => {
                if section.sh_link != 0 {
                    if section.sh_link == self.sections.index_of(Symtab) {
                        self.sections.set_index(SymtabShndx, index);
                    }
                    if section.sh_link == self.sections.index_of(Dynsym) {
                        self.sections.set_index(DynsymShndx, index);
                    }
                }
                return;
            }
            elf::SHT_GNU_VERDEF => Some(Verdef),
            elf::SHT_GNU_VERNEED => Some(Verneed),
            elf::SHT_GNU_VERSYM => Some(Versym),
            elf::SHT_PROGBITS => match name {
                ".interp" => Some(Interp),
                ".got" => Some(Got),
                ".got.plt" => Some(GotPlt),
                ".plt.got" => Some(PltGot),
                ".plt.sec" => Some(PltSec),
                ".gnu_debugdata" => Some(GnuDebugdata),
                ".gnu_debuglink" => Some(GnuDebuglink),
                ".eh_frame" => Some(EhFrame),
                ".opd" if self.is_64 => Some(Opd),
                ".plt" => Some(Plt),
                _ => None,
            },
            elf::SHT_NOBITS if name == ".plt" => Some(Plt),
            _ => None,
        };
        if let Some(well_known) = well_known {
            self.sections.set_index(well_known, index);
        }
    }

    /// Read the contents of a section.
    ///
    /// The size is limited to the end of the file.
    pub fn read_section_contents(&mut self, section: &elf::SectionHeader) -> Result<Vec<u8>> {
        self.read_bytes_at(section.sh_offset, section.sh_size)
    }
}
