//! Support for reading ELF files.
//!
//! The entry point is [`Reader`]. Reading happens in stages, and each stage
//! relies on the results of the previous ones:
//!
//! 1. [`Reader::read_ident`]
//! 2. [`Reader::read_header`]
//! 3. [`Reader::read_program_headers`] and/or [`Reader::read_section_headers`]
//! 4. [`Reader::read_dynamic_info_tags`] and [`Reader::parse_dynamic_info`]
//! 5. symbols, relocations, notes, versions and frame information.
//!
//! Every operation that moves the read position restores it before
//! returning, whether it succeeds or fails.

use std::fmt;
use std::fs::File;
use std::io::{self, Read, Seek};
use std::ops::{Deref, DerefMut};
use std::path::Path;

#[cfg(feature = "logging")]
use log::{error, warn};

use crate::elf;
use crate::endian::Endianness;
use crate::read::{silent_policy, Action, ParseDiagnostic, Policy, Result, Source};

mod arch;
pub use arch::*;

mod header;

mod section;
pub use section::*;

mod segment;
pub use segment::*;

mod string;
pub use string::*;

mod dynamic;
pub use dynamic::*;

mod symbol;
pub use symbol::*;

mod relocation;
pub use relocation::*;

mod packed;
pub use packed::*;

mod note;
pub use note::*;

mod version;
pub use version::*;

mod eh_frame;
pub use eh_frame::*;

/// Options that change how a [`Reader`] interprets a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderOptions {
    /// Correct the byte order of x86 files whose identification disagrees
    /// with their header. Enabled by default.
    pub check_ident: bool,
    /// Added to the value of every symbol.
    pub load_bias: u64,
    /// Use ARM mapping symbols to detect Thumb functions. Enabled by default.
    pub track_mapping_symbols: bool,
    /// The maximum number of symbols to reserve space for up front.
    pub max_symbols_hint: usize,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        ReaderOptions {
            check_ident: true,
            load_bias: 0,
            track_mapping_symbols: true,
            max_symbols_hint: 65536,
        }
    }
}

impl ReaderOptions {
    /// Set `check_ident`.
    pub fn check_ident(mut self, check_ident: bool) -> Self {
        self.check_ident = check_ident;
        self
    }

    /// Set `load_bias`.
    pub fn load_bias(mut self, load_bias: u64) -> Self {
        self.load_bias = load_bias;
        self
    }

    /// Set `track_mapping_symbols`.
    pub fn track_mapping_symbols(mut self, track: bool) -> Self {
        self.track_mapping_symbols = track;
        self
    }

    /// Set `max_symbols_hint`.
    pub fn max_symbols_hint(mut self, max: usize) -> Self {
        self.max_symbols_hint = max;
        self
    }
}

/// How far a [`Reader`] has progressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    /// Nothing has been read.
    Unstarted,
    /// The identification has been read.
    IdentRead,
    /// The file header has been read.
    HeaderRead,
    /// At least one of the header tables has been read.
    TablesRead,
}

/// A reader for an ELF file.
///
/// The reader exclusively owns the byte source and every table derived from
/// it. Diagnostics are passed to a policy, which defaults to
/// [`silent_policy`].
pub struct Reader<R: Read + Seek> {
    source: Source<R>,
    options: ReaderOptions,
    policy: Policy,
    stage: Stage,
    ident: elf::Ident,
    header: elf::FileHeader,
    endian: Endianness,
    is_64: bool,
    segment_64: bool,
    sizes: elf::StructSizes,
    arch: &'static ArchOps,
    arch_state: ArchState,
    sections: SectionTable,
    segments: ProgramHeaders,
    sym_strtab: StringTable,
    dyn_strtab: StringTable,
}

impl<R: Read + Seek> fmt::Debug for Reader<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reader")
            .field("size", &self.source.size())
            .field("stage", &self.stage)
            .field("ident", &self.ident)
            .field("header", &self.header)
            .field("endian", &self.endian)
            .field("is_64", &self.is_64)
            .field("arch", &self.arch.name)
            .finish_non_exhaustive()
    }
}

impl Reader<File> {
    /// Open a file by path.
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        Reader::new(File::open(path)?)
    }
}

impl<R: Read + Seek> Reader<R> {
    /// Create a reader with the default options.
    pub fn new(inner: R) -> io::Result<Self> {
        Self::with_options(inner, ReaderOptions::default())
    }

    /// Create a reader with the given options.
    pub fn with_options(inner: R, options: ReaderOptions) -> io::Result<Self> {
        let source = Source::new(inner)?;
        let size = source.size();
        Ok(Reader {
            source,
            options,
            policy: Box::new(silent_policy),
            stage: Stage::Unstarted,
            ident: elf::Ident::default(),
            header: elf::FileHeader::default(),
            endian: Endianness::Little,
            is_64: false,
            segment_64: false,
            sizes: elf::StructSizes::ELF32,
            arch: &ArchOps::GENERIC,
            arch_state: ArchState::new(options.track_mapping_symbols),
            sections: SectionTable::new(size),
            segments: ProgramHeaders::new(size),
            sym_strtab: StringTable::default(),
            dyn_strtab: StringTable::default(),
        })
    }

    /// Replace the diagnostic policy.
    pub fn set_policy<F>(&mut self, policy: F)
    where
        F: FnMut(&ParseDiagnostic) -> Action + 'static,
    {
        self.policy = Box::new(policy);
    }

    /// Consume the reader and return the byte source.
    pub fn into_inner(self) -> R {
        self.source.into_inner()
    }

    /// The options this reader was created with.
    #[inline]
    pub fn options(&self) -> &ReaderOptions {
        &self.options
    }

    /// How far reading has progressed.
    #[inline]
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// The identification, as declared in the file.
    #[inline]
    pub fn ident(&self) -> &elf::Ident {
        &self.ident
    }

    /// The file header.
    #[inline]
    pub fn header(&self) -> &elf::FileHeader {
        &self.header
    }

    /// The effective byte order, which may differ from the declared one.
    #[inline]
    pub fn endianness(&self) -> Endianness {
        self.endian
    }

    /// Return true if the effective byte order is big endian.
    #[inline]
    pub fn is_msb(&self) -> bool {
        self.endian.is_big_endian()
    }

    /// Return true if the effective class is ELF64.
    #[inline]
    pub fn is_64(&self) -> bool {
        self.is_64
    }

    /// Return true if segments should be treated as 64-bit.
    ///
    /// This can differ from [`is_64`](Self::is_64), for example for AArch64 ILP32.
    #[inline]
    pub fn segments_are_64(&self) -> bool {
        self.segment_64
    }

    /// The on-disk sizes of the fixed-size structures.
    #[inline]
    pub fn struct_sizes(&self) -> &elf::StructSizes {
        &self.sizes
    }

    /// The machine-specific behaviour selected from `e_machine`.
    #[inline]
    pub fn arch(&self) -> &'static ArchOps {
        self.arch
    }

    /// The machine-specific state collected while reading symbols.
    #[inline]
    pub fn arch_state(&self) -> &ArchState {
        &self.arch_state
    }

    /// Return true for ARM and AArch64 files.
    #[inline]
    pub fn is_arm(&self) -> bool {
        self.header.e_machine == elf::EM_ARM || self.header.e_machine == elf::EM_AARCH64
    }

    /// Return true for MIPS files.
    #[inline]
    pub fn is_mips(&self) -> bool {
        self.header.e_machine == elf::EM_MIPS
    }

    /// The size of the file.
    #[inline]
    pub fn size(&self) -> u64 {
        self.source.size()
    }

    /// The current read position.
    #[inline]
    pub fn tell(&self) -> u64 {
        self.source.tell()
    }

    /// The section header table.
    #[inline]
    pub fn sections(&self) -> &SectionTable {
        &self.sections
    }

    /// The program header table.
    #[inline]
    pub fn segments(&self) -> &ProgramHeaders {
        &self.segments
    }

    /// The string table for `SHT_SYMTAB` symbols.
    #[inline]
    pub fn symbol_strings(&self) -> &StringTable {
        &self.sym_strtab
    }

    /// The string table for dynamic symbols and dynamic tags.
    #[inline]
    pub fn dynamic_strings(&self) -> &StringTable {
        &self.dyn_strtab
    }

    /// Pass a diagnostic to the policy.
    ///
    /// Returns `Ok` only for a warning that the policy chose to continue after.
    pub(crate) fn report(&mut self, diagnostic: ParseDiagnostic) -> Result<()> {
        let action = (self.policy)(&diagnostic);
        if diagnostic.is_warning() && action == Action::Continue {
            #[cfg(feature = "logging")]
            warn!("{}", diagnostic);
            Ok(())
        } else {
            #[cfg(feature = "logging")]
            error!("{}", diagnostic);
            Err(diagnostic)
        }
    }

    /// Pass an error to the policy and return it.
    ///
    /// Errors fail the operation whatever the policy decides.
    pub(crate) fn fail(&mut self, diagnostic: ParseDiagnostic) -> ParseDiagnostic {
        let _ = (self.policy)(&diagnostic);
        #[cfg(feature = "logging")]
        error!("{}", diagnostic);
        diagnostic
    }

    /// Start a scope whose end restores the current read position.
    pub fn excursion(&mut self) -> Excursion<'_, R> {
        let position = self.source.tell();
        Excursion {
            reader: self,
            position,
        }
    }

    pub(crate) fn seek(&mut self, position: u64) -> Result<()> {
        match self.source.seek(position) {
            Ok(_) => Ok(()),
            Err(_) => Err(self.fail(ParseDiagnostic::Malformed {
                what: "Seek failed",
                offset: position,
            })),
        }
    }

    /// Fill `buf` from the current position, failing on a short read.
    pub(crate) fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        let position = self.source.tell();
        let actual = self.source.read(buf);
        if actual == buf.len() {
            Ok(())
        } else {
            Err(self.fail(ParseDiagnostic::Read {
                expected: buf.len() as u64,
                actual: actual as u64,
                position,
            }))
        }
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buf = [0; N];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8> {
        let [byte] = self.read_array::<1>()?;
        Ok(byte)
    }

    pub(crate) fn read_u16(&mut self) -> Result<u16> {
        let bytes = self.read_array()?;
        Ok(self.endian.read_u16_bytes(bytes))
    }

    pub(crate) fn read_u32(&mut self) -> Result<u32> {
        let bytes = self.read_array()?;
        Ok(self.endian.read_u32_bytes(bytes))
    }

    pub(crate) fn read_u64(&mut self) -> Result<u64> {
        let bytes = self.read_array()?;
        Ok(self.endian.read_u64_bytes(bytes))
    }

    /// Read an address, offset or `xword`, whose width depends on the class.
    pub(crate) fn read_word(&mut self) -> Result<u64> {
        if self.is_64 {
            self.read_u64()
        } else {
            self.read_u32().map(u64::from)
        }
    }

    /// Read a signed `sxword`.
    pub(crate) fn read_sword(&mut self) -> Result<i64> {
        if self.is_64 {
            self.read_u64().map(|x| x as i64)
        } else {
            self.read_u32().map(|x| i64::from(x as i32))
        }
    }

    /// Read up to `size` bytes at `offset`, limited to the end of the file.
    ///
    /// Returns the bytes read, which may be fewer than requested if the
    /// range extends past the end of the file.
    pub fn read_bytes_at(&mut self, offset: u64, size: u64) -> Result<Vec<u8>> {
        let available = self.size().saturating_sub(offset);
        let size = size.min(available) as usize;
        let mut this = self.excursion();
        this.seek(offset)?;
        let mut buf = vec![0; size];
        this.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Read a `u32` at `offset`, in the effective byte order.
    pub fn read_u32_at(&mut self, offset: u64) -> Result<u32> {
        let mut this = self.excursion();
        this.seek(offset)?;
        this.read_u32()
    }

    /// The symbol index of a relocation.
    pub fn r_sym(&self, rela: &elf::Rela) -> u32 {
        (self.arch.split_rel_info)(rela.r_info, self.is_64, self.is_msb()).0
    }

    /// The type of a relocation.
    pub fn r_type(&self, rela: &elf::Rela) -> u32 {
        (self.arch.split_rel_info)(rela.r_info, self.is_64, self.is_msb()).1
    }

    /// Replace the symbol index of a relocation.
    pub fn set_r_sym(&self, rela: &mut elf::Rela, sym: u32) {
        let r_type = self.r_type(rela);
        rela.r_info = (self.arch.make_rel_info)(sym, r_type, self.is_64, self.is_msb());
    }

    /// Replace the type of a relocation.
    pub fn set_r_type(&self, rela: &mut elf::Rela, r_type: u32) {
        let sym = self.r_sym(rela);
        rela.r_info = (self.arch.make_rel_info)(sym, r_type, self.is_64, self.is_msb());
    }

    /// Translate a virtual address to a file offset using the `PT_LOAD` mappings.
    #[inline]
    pub fn file_offset(&self, address: u64) -> Option<u64> {
        self.segments.file_offset(address)
    }

    /// Translate a file offset to a virtual address using the `PT_LOAD` mappings.
    #[inline]
    pub fn file_vaddr(&self, offset: u64) -> Option<u64> {
        self.segments.file_vaddr(offset)
    }

    /// The location of the dynamic linking tables.
    ///
    /// The `SHT_DYNAMIC` section is preferred over the `PT_DYNAMIC` segment.
    pub fn dynamic_linking_tables(&self) -> Option<DynamicLinkingTables> {
        self.sections
            .dynamic_linking_tables()
            .or_else(|| self.segments.dynamic_linking_tables())
    }

    /// Read the base address recorded by `prelink` at the end of the file.
    ///
    /// Returns `None` if the file does not end with the `"PRE "` marker.
    pub fn read_prelink_base(&mut self) -> Result<Option<u32>> {
        let size = self.size();
        if size < 8 {
            return Ok(None);
        }
        let tag = self.read_bytes_at(size - 4, 4)?;
        if tag != b"PRE " {
            return Ok(None);
        }
        self.read_u32_at(size - 8).map(Some)
    }
}

/// A scope that restores the read position of a [`Reader`] when dropped.
///
/// It dereferences to the reader, so reads can be made through it.
#[derive(Debug)]
pub struct Excursion<'r, R: Read + Seek> {
    reader: &'r mut Reader<R>,
    position: u64,
}

impl<'r, R: Read + Seek> Excursion<'r, R> {
    /// The position that will be restored.
    pub fn saved_position(&self) -> u64 {
        self.position
    }
}

impl<'r, R: Read + Seek> Deref for Excursion<'r, R> {
    type Target = Reader<R>;

    fn deref(&self) -> &Reader<R> {
        self.reader
    }
}

impl<'r, R: Read + Seek> DerefMut for Excursion<'r, R> {
    fn deref_mut(&mut self) -> &mut Reader<R> {
        self.reader
    }
}

impl<'r, R: Read + Seek> Drop for Excursion<'r, R> {
    fn drop(&mut self) {
        // Nothing useful can be done if this fails; the next read will report it.
        let _ = self.reader.source.seek(self.position);
    }
}
