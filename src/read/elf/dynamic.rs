use std::io::{Read, Seek};

use crate::elf;
use crate::read::{Bytes, ParseDiagnostic, Result};

use super::{DynamicLinkingTables, Reader};

/// The tables that can be located by dynamic tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DynamicKind {
    /// `DT_STRTAB` and `DT_STRSZ`.
    Strtab,
    /// `DT_SYMTAB` and `DT_SYMENT`.
    Symtab,
    /// `DT_REL`, `DT_RELSZ` and `DT_RELENT`.
    Rel,
    /// `DT_RELA`, `DT_RELASZ` and `DT_RELAENT`.
    Rela,
    /// `DT_ANDROID_REL` and `DT_ANDROID_RELSZ`.
    AndroidRel,
    /// `DT_ANDROID_RELA` and `DT_ANDROID_RELASZ`.
    AndroidRela,
    /// `DT_JMPREL` and `DT_PLTRELSZ`.
    Plt,
    /// `DT_HASH`.
    Hash,
    /// `DT_GNU_HASH`.
    GnuHash,
    /// `DT_PREINIT_ARRAY` and `DT_PREINIT_ARRAYSZ`.
    PreinitArray,
    /// `DT_INIT_ARRAY` and `DT_INIT_ARRAYSZ`.
    InitArray,
    /// `DT_FINI_ARRAY` and `DT_FINI_ARRAYSZ`.
    FiniArray,
    /// `DT_VERDEF` and `DT_VERDEFNUM`.
    Verdef,
    /// `DT_VERNEED` and `DT_VERNEEDNUM`.
    Verneed,
    /// `DT_VERSYM`.
    Versym,
}

impl DynamicKind {
    const COUNT: usize = 15;

    /// All kinds, in declaration order.
    pub const ALL: [DynamicKind; DynamicKind::COUNT] = [
        DynamicKind::Strtab,
        DynamicKind::Symtab,
        DynamicKind::Rel,
        DynamicKind::Rela,
        DynamicKind::AndroidRel,
        DynamicKind::AndroidRela,
        DynamicKind::Plt,
        DynamicKind::Hash,
        DynamicKind::GnuHash,
        DynamicKind::PreinitArray,
        DynamicKind::InitArray,
        DynamicKind::FiniArray,
        DynamicKind::Verdef,
        DynamicKind::Verneed,
        DynamicKind::Versym,
    ];

    fn from_address_tag(tag: i64, android: bool) -> Option<Self> {
        Some(match tag {
            elf::DT_STRTAB => DynamicKind::Strtab,
            elf::DT_SYMTAB => DynamicKind::Symtab,
            elf::DT_REL => DynamicKind::Rel,
            elf::DT_RELA => DynamicKind::Rela,
            elf::DT_JMPREL => DynamicKind::Plt,
            elf::DT_HASH => DynamicKind::Hash,
            elf::DT_GNU_HASH => DynamicKind::GnuHash,
            elf::DT_PREINIT_ARRAY => DynamicKind::PreinitArray,
            elf::DT_INIT_ARRAY => DynamicKind::InitArray,
            elf::DT_FINI_ARRAY => DynamicKind::FiniArray,
            elf::DT_VERDEF => DynamicKind::Verdef,
            elf::DT_VERNEED => DynamicKind::Verneed,
            elf::DT_VERSYM => DynamicKind::Versym,
            elf::DT_ANDROID_REL if android => DynamicKind::AndroidRel,
            elf::DT_ANDROID_RELA if android => DynamicKind::AndroidRela,
            _ => return None,
        })
    }

    fn from_size_tag(tag: i64) -> Option<Self> {
        Some(match tag {
            elf::DT_STRSZ => DynamicKind::Strtab,
            elf::DT_RELSZ => DynamicKind::Rel,
            elf::DT_RELASZ => DynamicKind::Rela,
            elf::DT_ANDROID_RELSZ => DynamicKind::AndroidRel,
            elf::DT_ANDROID_RELASZ => DynamicKind::AndroidRela,
            elf::DT_PLTRELSZ => DynamicKind::Plt,
            elf::DT_PREINIT_ARRAYSZ => DynamicKind::PreinitArray,
            elf::DT_INIT_ARRAYSZ => DynamicKind::InitArray,
            elf::DT_FINI_ARRAYSZ => DynamicKind::FiniArray,
            _ => return None,
        })
    }

    fn from_entsize_tag(tag: i64) -> Option<Self> {
        Some(match tag {
            elf::DT_SYMENT => DynamicKind::Symtab,
            elf::DT_RELENT => DynamicKind::Rel,
            elf::DT_RELAENT => DynamicKind::Rela,
            _ => return None,
        })
    }

    fn from_count_tag(tag: i64) -> Option<Self> {
        Some(match tag {
            elf::DT_VERDEFNUM => DynamicKind::Verdef,
            elf::DT_VERNEEDNUM => DynamicKind::Verneed,
            _ => return None,
        })
    }
}

/// The location of a table given by dynamic tags.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DynamicEntry {
    /// The file offset, or 0 if unknown.
    pub offset: u64,
    /// The virtual address.
    pub addr: u64,
    /// The size in bytes, or 0 if unknown.
    pub size: u64,
    /// The size of each entry, or 0 if unknown.
    pub entsize: u64,
    /// The number of entries for the version tables.
    pub info: u32,
}

impl DynamicEntry {
    /// Return true if the table has both a location and a size.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.offset > 0 && self.size != 0
    }

    /// Set the size to the distance to the nearest offset after this table.
    ///
    /// The size becomes 0 if no offset is after this table. This is only an
    /// estimate: the table may end before the next known table starts.
    pub fn guess_size(&mut self, offsets: &[u64]) {
        self.size = if self.offset == 0 {
            0
        } else {
            offsets
                .iter()
                .filter(|&&offset| offset > self.offset)
                .map(|&offset| offset - self.offset)
                .min()
                .unwrap_or(0)
        };
    }
}

/// The tables located by the dynamic tags of a file.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DynamicInfo {
    entries: [DynamicEntry; DynamicKind::COUNT],
    /// The type of the PLT relocations, from `DT_PLTREL`.
    pub plt_rel_type: u32,
}

impl DynamicInfo {
    /// Return the entry for a kind of table.
    #[inline]
    pub fn entry(&self, kind: DynamicKind) -> &DynamicEntry {
        &self.entries[kind as usize]
    }

    /// Return the mutable entry for a kind of table.
    #[inline]
    pub fn entry_mut(&mut self, kind: DynamicKind) -> &mut DynamicEntry {
        &mut self.entries[kind as usize]
    }

    /// Iterate over the valid entries.
    pub fn iter(&self) -> impl Iterator<Item = (DynamicKind, &DynamicEntry)> + '_ {
        DynamicKind::ALL
            .iter()
            .map(move |&kind| (kind, self.entry(kind)))
            .filter(|(_, entry)| entry.is_valid())
    }

    /// The dynamic string table.
    #[inline]
    pub fn strtab(&self) -> &DynamicEntry {
        self.entry(DynamicKind::Strtab)
    }

    /// The dynamic symbol table.
    #[inline]
    pub fn symtab(&self) -> &DynamicEntry {
        self.entry(DynamicKind::Symtab)
    }

    /// Build a section header describing a table.
    ///
    /// This allows tables to be read with the same code whether they were
    /// located by a section header or by a dynamic tag. Returns `None` for
    /// an invalid entry, or for a kind that does not correspond to a
    /// section type.
    pub fn fill_section_header(&self, kind: DynamicKind) -> Option<elf::SectionHeader> {
        let sh_type = match kind {
            DynamicKind::Symtab => elf::SHT_DYNSYM,
            DynamicKind::Rel | DynamicKind::AndroidRel => elf::SHT_REL,
            DynamicKind::Rela | DynamicKind::AndroidRela => elf::SHT_RELA,
            DynamicKind::Verdef => elf::SHT_GNU_VERDEF,
            DynamicKind::Verneed => elf::SHT_GNU_VERNEED,
            DynamicKind::Versym => elf::SHT_GNU_VERSYM,
            DynamicKind::Plt => {
                if i64::from(self.plt_rel_type) == elf::DT_RELA {
                    elf::SHT_RELA
                } else {
                    elf::SHT_REL
                }
            }
            _ => return None,
        };
        let entry = self.entry(kind);
        if !entry.is_valid() {
            return None;
        }
        // Packed relocations have no fixed entry size.
        let sh_entsize = match kind {
            DynamicKind::AndroidRel | DynamicKind::AndroidRela => 0,
            _ if sh_type == elf::SHT_DYNSYM => entry.entsize,
            _ if sh_type == elf::SHT_RELA => self.entry(DynamicKind::Rela).entsize,
            _ => self.entry(DynamicKind::Rel).entsize,
        };
        Some(elf::SectionHeader {
            sh_type,
            sh_addr: entry.addr,
            sh_offset: entry.offset,
            sh_size: entry.size,
            sh_info: entry.info,
            sh_entsize,
            ..Default::default()
        })
    }
}

impl<R: Read + Seek> Reader<R> {
    /// Read the dynamic tags from the dynamic linking tables.
    ///
    /// Reading stops after `DT_NULL`, or at the end of the table. Returns an
    /// empty list if the table is empty.
    pub fn read_dynamic_info_tags(&mut self, dlt: &DynamicLinkingTables) -> Result<Vec<elf::Dyn>> {
        if !dlt.is_valid() || dlt.size == 0 {
            return Ok(Vec::new());
        }
        let data = self.read_bytes_at(dlt.offset, dlt.size)?;
        let entsize = usize::from(self.sizes.dyn_);
        let mut tags = Vec::with_capacity(data.len() / entsize);

        let endian = self.endian;
        let is_64 = self.is_64;
        let mut data = Bytes(&data);
        while data.len() >= entsize {
            let d_tag = match data.read_word(endian, is_64) {
                Some(tag) if is_64 => tag as i64,
                Some(tag) => i64::from(tag as u32 as i32),
                None => break,
            };
            let d_val = match data.read_word(endian, is_64) {
                Some(value) => value,
                None => break,
            };
            tags.push(elf::Dyn { d_tag, d_val });
            if d_tag == elf::DT_NULL {
                break;
            }
        }
        Ok(tags)
    }

    /// Locate the dynamic linking tables using the dynamic tags.
    ///
    /// Addresses are translated to file offsets using the program headers.
    /// Tables with no size tag have their size guessed from the offsets of
    /// the other tables.
    pub fn parse_dynamic_info(&mut self, tags: &[elf::Dyn]) -> Result<DynamicInfo> {
        let mut info = DynamicInfo::default();
        info.entry_mut(DynamicKind::Symtab).entsize = u64::from(self.sizes.sym);
        info.entry_mut(DynamicKind::Rel).entsize = u64::from(self.sizes.rel);
        info.entry_mut(DynamicKind::Rela).entsize = u64::from(self.sizes.rela);

        let android = self.arch.android_packed_relocations;
        let mut offsets = Vec::new();
        for tag in tags {
            if let Some(kind) = DynamicKind::from_address_tag(tag.d_tag, android) {
                let offset = self.file_offset(tag.d_val);
                let entry = info.entry_mut(kind);
                entry.offset = offset.unwrap_or(0);
                entry.addr = tag.d_val;
                offsets.extend(offset);
            } else if let Some(kind) = DynamicKind::from_size_tag(tag.d_tag) {
                info.entry_mut(kind).size = tag.d_val;
            } else if let Some(kind) = DynamicKind::from_entsize_tag(tag.d_tag) {
                info.entry_mut(kind).entsize = tag.d_val;
            } else if let Some(kind) = DynamicKind::from_count_tag(tag.d_tag) {
                info.entry_mut(kind).info = tag.d_val as u32;
            } else {
                match tag.d_tag {
                    elf::DT_PLTREL => {
                        info.plt_rel_type = tag.d_val as u32;
                        let plt_rel_type = i64::from(info.plt_rel_type);
                        if plt_rel_type != elf::DT_REL && plt_rel_type != elf::DT_RELA {
                            self.report(ParseDiagnostic::BadDynPltType { value: tag.d_val })?;
                        }
                    }
                    elf::DT_INIT | elf::DT_FINI | elf::DT_PLTGOT => {
                        offsets.extend(self.file_offset(tag.d_val));
                    }
                    elf::DT_NULL => break,
                    _ => {}
                }
            }
        }

        for &kind in &[
            DynamicKind::Symtab,
            DynamicKind::Hash,
            DynamicKind::GnuHash,
            DynamicKind::Verdef,
            DynamicKind::Verneed,
            DynamicKind::Versym,
        ] {
            info.entry_mut(kind).guess_size(&offsets);
        }
        Ok(info)
    }

    /// Read and parse the dynamic tags, and use the dynamic string table
    /// they give.
    ///
    /// Returns `None` if the file has no dynamic linking tables.
    pub fn read_dynamic_info(&mut self) -> Result<Option<(Vec<elf::Dyn>, DynamicInfo)>> {
        let dlt = match self.dynamic_linking_tables() {
            Some(dlt) if dlt.is_valid() => dlt,
            _ => return Ok(None),
        };
        let tags = self.read_dynamic_info_tags(&dlt)?;
        if tags.is_empty() {
            return Ok(None);
        }
        let info = self.parse_dynamic_info(&tags)?;
        self.set_di_strtab(info.strtab());
        Ok(Some((tags, info)))
    }
}
