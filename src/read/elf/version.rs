use std::collections::BTreeMap;
use std::io::{Read, Seek};

use hashbrown::HashSet;

use crate::elf;
use crate::endian::Endianness;
use crate::read::{Bytes, Result};

use super::{DynamicInfo, DynamicKind, Reader, SliceKind, SymbolCache, WellKnownSection};

/// A version index, as stored in `SHT_GNU_VERSYM`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VersionIndex(pub u16);

impl VersionIndex {
    /// Return the version index without the hidden bit.
    #[inline]
    pub fn index(&self) -> u16 {
        self.0 & !elf::VERSYM_HIDDEN
    }

    /// Return true if it is the local index.
    #[inline]
    pub fn is_local(&self) -> bool {
        self.index() == elf::VER_NDX_LOCAL
    }

    /// Return true if it is the global index.
    #[inline]
    pub fn is_global(&self) -> bool {
        self.index() == elf::VER_NDX_GLOBAL
    }

    /// Return the hidden flag.
    #[inline]
    pub fn is_hidden(&self) -> bool {
        self.0 & elf::VERSYM_HIDDEN != 0
    }
}

/// A version definition, from `SHT_GNU_VERDEF`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct VersionDefinition {
    /// The offset of the entry in the section.
    pub offset: u64,
    /// `vd_flags`.
    pub flags: u16,
    /// `vd_ndx`.
    pub index: u16,
    /// For each auxiliary entry, its offset in the section and the index of
    /// its name in [`SymbolVersions::version_names`].
    pub names: Vec<(u64, usize)>,
}

/// A file that versions are required from, from `SHT_GNU_VERNEED`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct VersionRequirement {
    /// The offset of the entry in the section.
    pub offset: u64,
    /// The index of the file name in [`SymbolVersions::file_names`].
    pub file: usize,
    /// The versions required from the file.
    pub versions: Vec<RequiredVersion>,
}

/// A version required from a file.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RequiredVersion {
    /// The offset of the entry in the section.
    pub offset: u64,
    /// The index of the name in [`SymbolVersions::version_names`].
    pub name: usize,
    /// `vna_other`, the version index used in `SHT_GNU_VERSYM`.
    pub other: u16,
}

/// The file and version that a version index refers to.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct VersionMapItem {
    /// The index in [`SymbolVersions::file_names`], if known.
    pub file: Option<usize>,
    /// The index in [`SymbolVersions::version_names`].
    pub version: usize,
}

/// The symbol versioning information of a file.
#[derive(Debug, Default, Clone)]
pub struct SymbolVersions {
    /// The version definitions.
    pub defs: Vec<VersionDefinition>,
    /// The version requirements.
    pub reqs: Vec<VersionRequirement>,
    /// The version index of each dynamic symbol.
    pub symbols: Vec<VersionIndex>,
    /// The names of the files that define or require versions.
    pub file_names: Vec<String>,
    /// The names of the versions.
    pub version_names: Vec<String>,
    /// The index in `file_names` of this file's own name, given by the
    /// definition with `VER_FLG_BASE`.
    pub def_base: Option<usize>,
    /// The file and version for each version index.
    pub vermap: BTreeMap<u16, VersionMapItem>,
}

impl SymbolVersions {
    /// Return true if no versioning information was found.
    pub fn is_empty(&self) -> bool {
        self.defs.is_empty() && self.reqs.is_empty() && self.symbols.is_empty()
    }

    /// Return the file name and version name of a dynamic symbol.
    ///
    /// Returns `None` for local and global symbols, and for unknown indices.
    pub fn version_of(&self, symbol_index: usize) -> Option<(Option<&str>, &str)> {
        let index = self.symbols.get(symbol_index)?;
        if index.is_local() || index.is_global() {
            return None;
        }
        let item = self.vermap.get(&index.index())?;
        let file = item
            .file
            .and_then(|file| self.file_names.get(file))
            .map(String::as_str);
        let version = self.version_names.get(item.version)?;
        Some((file, version.as_str()))
    }
}

// A variable-length record that links to a list of auxiliary records.
trait VersionRecord: Sized {
    type Aux: AuxRecord;

    fn parse(data: &mut Bytes<'_>, endian: Endianness) -> Option<Self>;
    fn aux(&self) -> u32;
    fn count(&self) -> u16;
    fn next(&self) -> u32;
}

trait AuxRecord: Sized {
    fn parse(data: &mut Bytes<'_>, endian: Endianness) -> Option<Self>;
    fn next(&self) -> u32;
}

impl VersionRecord for elf::Verdef {
    type Aux = elf::Verdaux;

    fn parse(data: &mut Bytes<'_>, endian: Endianness) -> Option<Self> {
        Some(elf::Verdef {
            vd_version: data.read_u16(endian)?,
            vd_flags: data.read_u16(endian)?,
            vd_ndx: data.read_u16(endian)?,
            vd_cnt: data.read_u16(endian)?,
            vd_hash: data.read_u32(endian)?,
            vd_aux: data.read_u32(endian)?,
            vd_next: data.read_u32(endian)?,
        })
    }

    fn aux(&self) -> u32 {
        self.vd_aux
    }

    fn count(&self) -> u16 {
        self.vd_cnt
    }

    fn next(&self) -> u32 {
        self.vd_next
    }
}

impl AuxRecord for elf::Verdaux {
    fn parse(data: &mut Bytes<'_>, endian: Endianness) -> Option<Self> {
        Some(elf::Verdaux {
            vda_name: data.read_u32(endian)?,
            vda_next: data.read_u32(endian)?,
        })
    }

    fn next(&self) -> u32 {
        self.vda_next
    }
}

impl VersionRecord for elf::Verneed {
    type Aux = elf::Vernaux;

    fn parse(data: &mut Bytes<'_>, endian: Endianness) -> Option<Self> {
        Some(elf::Verneed {
            vn_version: data.read_u16(endian)?,
            vn_cnt: data.read_u16(endian)?,
            vn_file: data.read_u32(endian)?,
            vn_aux: data.read_u32(endian)?,
            vn_next: data.read_u32(endian)?,
        })
    }

    fn aux(&self) -> u32 {
        self.vn_aux
    }

    fn count(&self) -> u16 {
        self.vn_cnt
    }

    fn next(&self) -> u32 {
        self.vn_next
    }
}

impl AuxRecord for elf::Vernaux {
    fn parse(data: &mut Bytes<'_>, endian: Endianness) -> Option<Self> {
        Some(elf::Vernaux {
            vna_hash: data.read_u32(endian)?,
            vna_flags: data.read_u16(endian)?,
            vna_other: data.read_u16(endian)?,
            vna_name: data.read_u32(endian)?,
            vna_next: data.read_u32(endian)?,
        })
    }

    fn next(&self) -> u32 {
        self.vna_next
    }
}

// A record with its offset, and its auxiliary records with their offsets.
type WalkedRecord<E> = (E, u64, Vec<(<E as VersionRecord>::Aux, u64)>);

/// Walk the records of a version section and their auxiliary records.
///
/// Offsets are relative to the start of `data` and wrap at 32 bits, so a
/// `next` link can point backwards. Each list stops at the end of the data,
/// at an offset that was already visited, or at a record that cannot be
/// read. An auxiliary list also stops after `count` records.
fn walk_version_records<E: VersionRecord>(data: &[u8], endian: Endianness) -> Vec<WalkedRecord<E>> {
    let end = data.len() as u64;
    let mut records = Vec::new();
    let mut offset = 0u32;
    let mut entry_seen = HashSet::new();
    while u64::from(offset) < end && entry_seen.insert(offset) {
        let mut bytes = Bytes(data);
        let entry = match bytes
            .skip(offset as usize)
            .and_then(|()| E::parse(&mut bytes, endian))
        {
            Some(entry) => entry,
            None => break,
        };

        let mut auxs = Vec::new();
        let mut aux_offset = offset.wrapping_add(entry.aux());
        let mut aux_seen = HashSet::new();
        while u64::from(aux_offset) < end
            && aux_seen.insert(aux_offset)
            && auxs.len() < usize::from(entry.count())
        {
            let mut bytes = Bytes(data);
            let aux = match bytes
                .skip(aux_offset as usize)
                .and_then(|()| E::Aux::parse(&mut bytes, endian))
            {
                Some(aux) => aux,
                None => break,
            };
            let next = aux_offset.wrapping_add(aux.next());
            auxs.push((aux, u64::from(aux_offset)));
            aux_offset = next;
        }

        let next = offset.wrapping_add(entry.next());
        records.push((entry, u64::from(offset), auxs));
        offset = next;
    }
    records
}

impl<R: Read + Seek> Reader<R> {
    /// Locate a version section and the symbol table it applies to.
    ///
    /// With `use_pht`, the section is synthesized from the dynamic tags and
    /// applies to the dynamic symbols. Otherwise the section header is used,
    /// provided it is linked to a symbol table that has symbols.
    pub fn version_section(
        &self,
        cache: &SymbolCache,
        section: WellKnownSection,
        info: Option<&DynamicInfo>,
        use_pht: bool,
    ) -> Option<(elf::SectionHeader, SliceKind)> {
        if use_pht {
            let kind = match section {
                WellKnownSection::Verdef => DynamicKind::Verdef,
                WellKnownSection::Verneed => DynamicKind::Verneed,
                WellKnownSection::Versym => DynamicKind::Versym,
                _ => return None,
            };
            let header = info?.fill_section_header(kind)?;
            return Some((header, SliceKind::Dynsym));
        }

        let header = *self.sections.well_known(section)?;
        let symtab = self.sections.index_of(WellKnownSection::Symtab);
        let dynsym = self.sections.index_of(WellKnownSection::Dynsym);
        if header.sh_link == symtab && cache.slice_len(SliceKind::Symtab) != 0 {
            Some((header, SliceKind::Symtab))
        } else if header.sh_link == dynsym && cache.slice_len(SliceKind::Dynsym) != 0 {
            Some((header, SliceKind::Dynsym))
        } else {
            None
        }
    }

    /// Read the version requirements, definitions and symbol versions.
    ///
    /// Names are resolved with the string table of the symbol table that each
    /// section applies to. Malformed records end the list they are in.
    pub fn read_symbol_versions(
        &mut self,
        cache: &SymbolCache,
        info: Option<&DynamicInfo>,
        use_pht: bool,
    ) -> Result<SymbolVersions> {
        let mut versions = SymbolVersions::default();
        let endian = self.endian;

        if let Some((section, kind)) =
            self.version_section(cache, WellKnownSection::Verneed, info, use_pht)
        {
            let data = self.read_bytes_at(section.sh_offset, section.sh_size)?;
            let strtab = self.string_table(kind.string_table());
            for (entry, offset, auxs) in walk_version_records::<elf::Verneed>(&data, endian) {
                let file = versions.file_names.len();
                versions.file_names.push(self.get_name(&strtab, entry.vn_file));
                let mut requirement = VersionRequirement {
                    offset,
                    file,
                    versions: Vec::new(),
                };
                for (aux, offset) in auxs {
                    let name = versions.version_names.len();
                    versions.version_names.push(self.get_name(&strtab, aux.vna_name));
                    requirement.versions.push(RequiredVersion {
                        offset,
                        name,
                        other: aux.vna_other,
                    });
                    let index = aux.vna_other & !elf::VERSYM_HIDDEN;
                    if index != 0 {
                        versions.vermap.insert(
                            index,
                            VersionMapItem {
                                file: Some(file),
                                version: name,
                            },
                        );
                    }
                }
                versions.reqs.push(requirement);
            }
        }

        if let Some((section, kind)) =
            self.version_section(cache, WellKnownSection::Verdef, info, use_pht)
        {
            let data = self.read_bytes_at(section.sh_offset, section.sh_size)?;
            let strtab = self.string_table(kind.string_table());
            for (entry, offset, auxs) in walk_version_records::<elf::Verdef>(&data, endian) {
                let mut definition = VersionDefinition {
                    offset,
                    flags: entry.vd_flags,
                    index: entry.vd_ndx,
                    names: Vec::new(),
                };
                for (aux, offset) in auxs {
                    let name = self.get_name(&strtab, aux.vda_name);
                    if definition.flags & elf::VER_FLG_BASE != 0 {
                        versions.def_base = Some(versions.file_names.len());
                        versions.file_names.push(name.clone());
                    }
                    let version = versions.version_names.len();
                    versions.version_names.push(name);
                    definition.names.push((offset, version));
                    // Only the first name is the version; the rest are parents.
                    if definition.index != 0 && definition.names.len() == 1 {
                        versions.vermap.insert(
                            definition.index,
                            VersionMapItem {
                                file: versions.def_base,
                                version,
                            },
                        );
                    }
                }
                versions.defs.push(definition);
            }
        }

        if let Some((section, _)) =
            self.version_section(cache, WellKnownSection::Versym, info, use_pht)
        {
            let data = self.read_bytes_at(section.sh_offset, section.sh_size)?;
            let mut bytes = Bytes(&data);
            while let Some(index) = bytes.read_u16(endian) {
                versions.symbols.push(VersionIndex(index));
            }
        }

        Ok(versions)
    }
}
