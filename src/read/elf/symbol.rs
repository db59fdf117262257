use std::io::{Read, Seek};
use std::mem;

use crate::elf;
use crate::read::{Bytes, ParseDiagnostic, Result};

use super::{DynamicInfo, DynamicKind, Reader, StringTable, StringTableKind, WellKnownSection};

/// A symbol read from a symbol table.
///
/// `original` is the entry as stored in the file. The other fields are
/// derived from it: the binding is normalized, the value includes the load
/// bias, and the section index has any `SHN_XINDEX` escape resolved.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Symbol {
    /// The entry as stored in the file.
    pub original: elf::Sym,
    /// The name, resolved when the symbol was read.
    pub name: String,
    /// The size.
    pub size: u64,
    /// The value, including the load bias.
    pub value: u64,
    /// The index of the section the symbol is defined in.
    ///
    /// This is 0 for undefined symbols and for symbols in special sections.
    pub section: u32,
    /// The binding. One of the `STB_*` values, or `STB_INVALID`.
    pub binding: u8,
    /// The type. One of the `STT_*` values.
    pub symbol_type: u8,
    /// Flags such as [`Symbol::THUMB_FUNCTION`].
    pub flags: u8,
}

impl Symbol {
    /// The symbol is a Thumb function.
    pub const THUMB_FUNCTION: u8 = 0x01;

    /// Return true if the symbol is defined in a reserved section index
    /// such as `SHN_ABS` or `SHN_COMMON`.
    #[inline]
    pub fn defined_in_special_section(&self) -> bool {
        self.section == 0 && self.original.st_shndx >= elf::SHN_LORESERVE
    }

    /// Return true if `offset` in a section is within the symbol.
    pub fn overlaps(&self, section: u32, offset: u64) -> bool {
        self.section == section
            && offset >= self.value
            && offset - self.value < self.size
    }

    /// Return true if the symbol is a Thumb function.
    #[inline]
    pub fn is_thumb_function(&self) -> bool {
        self.flags & Symbol::THUMB_FUNCTION != 0
    }

    /// Format the section index for display.
    ///
    /// Special sections are shown as the raw `st_shndx` in hex.
    pub fn section_str(&self) -> String {
        if self.defined_in_special_section() {
            format!("{:04X}", self.original.st_shndx)
        } else {
            self.section.to_string()
        }
    }
}

/// The symbol tables of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SliceKind {
    /// The `SHT_SYMTAB` symbols.
    Symtab,
    /// The `SHT_DYNSYM` symbols, or those found by `DT_SYMTAB`.
    Dynsym,
}

impl SliceKind {
    pub(crate) fn string_table(self) -> StringTableKind {
        match self {
            SliceKind::Symtab => StringTableKind::Symbols,
            SliceKind::Dynsym => StringTableKind::Dynamic,
        }
    }

    fn shndx_section(self) -> WellKnownSection {
        match self {
            SliceKind::Symtab => WellKnownSection::SymtabShndx,
            SliceKind::Dynsym => WellKnownSection::DynsymShndx,
        }
    }
}

/// The position of a symbol: its table and its index in that table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SymbolIndex {
    /// The table.
    pub kind: SliceKind,
    /// The index in the table.
    pub index: u32,
}

/// Storage for the symbols of both symbol tables.
///
/// The symbols are stored in one vector: the `SHT_SYMTAB` symbols first,
/// followed by the dynamic symbols. Symbol 0 of each table is stored like
/// any other symbol.
#[derive(Debug, Default, Clone)]
pub struct SymbolCache {
    symbols: Vec<Symbol>,
    dynsym_start: usize,
}

impl SymbolCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        SymbolCache::default()
    }

    fn slice_range(&self, kind: SliceKind) -> std::ops::Range<usize> {
        match kind {
            SliceKind::Symtab => 0..self.dynsym_start,
            SliceKind::Dynsym => self.dynsym_start..self.symbols.len(),
        }
    }

    /// The number of symbols in a table.
    pub fn slice_len(&self, kind: SliceKind) -> u32 {
        self.slice_range(kind).len() as u32
    }

    /// The symbols of a table.
    pub fn slice(&self, kind: SliceKind) -> &[Symbol] {
        &self.symbols[self.slice_range(kind)]
    }

    /// The total number of symbols.
    #[inline]
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Return true if there are no symbols.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Return the symbol at an index in a table.
    pub fn get(&self, kind: SliceKind, index: u32) -> Option<&Symbol> {
        self.slice(kind).get(index as usize)
    }

    /// Return the mutable symbol at an index in a table.
    pub fn get_mut(&mut self, kind: SliceKind, index: u32) -> Option<&mut Symbol> {
        let range = self.slice_range(kind);
        self.symbols[range].get_mut(index as usize)
    }

    /// Append a symbol to a table.
    pub fn append(&mut self, kind: SliceKind, symbol: Symbol) -> SymbolIndex {
        let end = self.slice_range(kind).end;
        let index = (end - self.slice_range(kind).start) as u32;
        self.symbols.insert(end, symbol);
        if kind == SliceKind::Symtab {
            self.dynsym_start += 1;
        }
        SymbolIndex { kind, index }
    }

    /// Append symbols to a table.
    ///
    /// The symbols are inserted in one step, so appending to `Symtab` moves
    /// the dynamic symbols only once.
    pub fn extend<I: IntoIterator<Item = Symbol>>(&mut self, kind: SliceKind, symbols: I) {
        let end = self.slice_range(kind).end;
        let before = self.symbols.len();
        self.symbols.splice(end..end, symbols);
        if kind == SliceKind::Symtab {
            self.dynsym_start += self.symbols.len() - before;
        }
    }

    /// Remove all symbols of a table.
    pub fn clear_slice(&mut self, kind: SliceKind) {
        let range = self.slice_range(kind);
        let removed = range.len();
        self.symbols.drain(range);
        if kind == SliceKind::Symtab {
            self.dynsym_start -= removed;
        }
    }

    /// Return the position of a symbol stored in this cache.
    ///
    /// The symbol is identified by its address, so this returns `None` for a
    /// copy of a stored symbol.
    pub fn index_of(&self, symbol: &Symbol) -> Option<SymbolIndex> {
        let size = mem::size_of::<Symbol>();
        let start = self.symbols.as_ptr() as usize;
        let address = symbol as *const Symbol as usize;
        if address < start || (address - start) % size != 0 {
            return None;
        }
        let position = (address - start) / size;
        if position >= self.symbols.len() {
            return None;
        }
        Some(if position < self.dynsym_start {
            SymbolIndex {
                kind: SliceKind::Symtab,
                index: position as u32,
            }
        } else {
            SymbolIndex {
                kind: SliceKind::Dynsym,
                index: (position - self.dynsym_start) as u32,
            }
        })
    }

    /// Iterate over the symbols of a table, skipping symbol 0.
    pub fn iter(&self, kind: SliceKind) -> impl Iterator<Item = (SymbolIndex, &Symbol)> + '_ {
        self.slice(kind)
            .iter()
            .enumerate()
            .skip(1)
            .map(move |(index, symbol)| {
                (
                    SymbolIndex {
                        kind,
                        index: index as u32,
                    },
                    symbol,
                )
            })
    }
}

/// Resolve the name of a symbol from a string table.
///
/// This is the name lookup done while reading symbols, exposed for callers
/// that construct symbols themselves.
pub fn resolve_name<R: Read + Seek>(
    reader: &mut Reader<R>,
    symbol: &Symbol,
    strtab: &StringTable,
) -> String {
    reader.get_name(strtab, symbol.original.st_name)
}

impl<R: Read + Seek> Reader<R> {
    /// Read the symbols of a table located by the section headers.
    ///
    /// Any symbols already in the cache for this table are replaced.
    /// Returns the number of symbols read, which is 0 if there is no such
    /// table.
    pub fn load_symbols(&mut self, cache: &mut SymbolCache, kind: SliceKind) -> Result<u32> {
        let well_known = match kind {
            SliceKind::Symtab => WellKnownSection::Symtab,
            SliceKind::Dynsym => WellKnownSection::Dynsym,
        };
        let section = match self.sections.well_known(well_known) {
            Some(section) => *section,
            None => return Ok(0),
        };
        self.load_symbols_from(cache, kind, &section)
    }

    /// Read the dynamic symbols located by `DT_SYMTAB`.
    ///
    /// This is used when there are no section headers. The number of symbols
    /// is derived from the guessed size of the table.
    pub fn load_dynamic_symbols(
        &mut self,
        cache: &mut SymbolCache,
        info: &DynamicInfo,
    ) -> Result<u32> {
        match info.fill_section_header(DynamicKind::Symtab) {
            Some(section) => self.load_symbols_from(cache, SliceKind::Dynsym, &section),
            None => Ok(0),
        }
    }

    /// Read the symbols of a table described by a section header.
    pub fn load_symbols_from(
        &mut self,
        cache: &mut SymbolCache,
        kind: SliceKind,
        section: &elf::SectionHeader,
    ) -> Result<u32> {
        cache.clear_slice(kind);

        let sym_size = u64::from(self.sizes.sym);
        let entsize = if section.sh_entsize >= sym_size {
            section.sh_entsize
        } else {
            sym_size
        };
        let data = self.read_bytes_at(section.sh_offset, section.sh_size)?;
        let count = data.len() as u64 / entsize;
        let mut symbols =
            Vec::with_capacity(count.min(self.options.max_symbols_hint as u64) as usize);

        (self.arch.on_start_symbols)(&mut self.arch_state);
        let strtab = self.string_table(kind.string_table());

        for index in 0..count {
            let offset = (index * entsize) as usize;
            let original = match self.parse_symbol(Bytes(&data[offset..])) {
                Some(original) => original,
                None => break,
            };
            symbols.push(self.make_symbol(kind, index as u32, original, &strtab)?);
        }
        let read = symbols.len() as u32;
        cache.extend(kind, symbols);
        Ok(read)
    }

    fn parse_symbol(&self, mut data: Bytes<'_>) -> Option<elf::Sym> {
        let endian = self.endian;
        let mut sym = elf::Sym::default();
        if self.is_64 {
            sym.st_name = data.read_u32(endian)?;
            sym.st_info = data.read_u8()?;
            sym.st_other = data.read_u8()?;
            sym.st_shndx = data.read_u16(endian)?;
            sym.st_value = data.read_u64(endian)?;
            sym.st_size = data.read_u64(endian)?;
        } else {
            sym.st_name = data.read_u32(endian)?;
            sym.st_value = data.read_u32(endian)?.into();
            sym.st_size = data.read_u32(endian)?.into();
            sym.st_info = data.read_u8()?;
            sym.st_other = data.read_u8()?;
            sym.st_shndx = data.read_u16(endian)?;
        }
        Some(sym)
    }

    fn make_symbol(
        &mut self,
        kind: SliceKind,
        index: u32,
        original: elf::Sym,
        strtab: &StringTable,
    ) -> Result<Symbol> {
        let mut binding = original.st_bind();
        if binding > elf::STB_WEAK {
            if let Some(translated) = (self.arch.translate_binding)(binding) {
                binding = translated;
            } else if binding < elf::STB_LOOS {
                self.report(ParseDiagnostic::BadSymbolBinding {
                    symbol: index,
                    binding,
                })?;
                binding = elf::STB_INVALID;
            }
        }

        let mut symbol = Symbol {
            original,
            name: String::new(),
            size: original.st_size,
            value: original.st_value.wrapping_add(self.options.load_bias),
            section: 0,
            binding,
            symbol_type: original.st_type(),
            flags: 0,
        };
        symbol.section = self.symbol_section_index(kind, index, &original)?;
        symbol.name = self.get_name(strtab, original.st_name);
        (self.arch.on_symbol_read)(&mut self.arch_state, &mut symbol);
        Ok(symbol)
    }

    // The section index, with `SHN_XINDEX` resolved through the extended
    // section index table. Special sections give 0.
    fn symbol_section_index(&mut self, kind: SliceKind, index: u32, sym: &elf::Sym) -> Result<u32> {
        if sym.st_shndx == elf::SHN_XINDEX {
            let offset = u64::from(index) * 4;
            let location = self
                .sections
                .well_known(kind.shndx_section())
                .filter(|shndx| shndx.sh_offset != 0 && offset + 4 <= shndx.sh_size)
                .map(|shndx| shndx.sh_offset + offset);
            let section = match location {
                Some(location) => self.read_u32_at(location).unwrap_or(0),
                None => 0,
            };
            if section == 0 {
                self.report(ParseDiagnostic::BadSymbolSectionIndex { symbol: index })?;
            }
            Ok(section)
        } else if sym.st_shndx < elf::SHN_LORESERVE {
            Ok(u32::from(sym.st_shndx))
        } else {
            Ok(0)
        }
    }
}
