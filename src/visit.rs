//! A driver that reports the interesting parts of an ELF file to a visitor.
//!
//! [`visit_elf_symbols`] opens a file, reads its headers and tables, and then
//! passes dynamic tags, the interpreter, symbols, the build-id and the debug
//! link to a [`SymbolVisitor`], in that order, as selected by the `VISIT_*`
//! flags.
//!
//! Reading is serialized through a process-wide lock. The image base is
//! carried in the call and nothing survives between calls.

use std::io::{Read, Seek};
use std::path::Path;
use std::sync::{Mutex, PoisonError};

#[cfg(feature = "logging")]
use log::{debug, warn};

use crate::elf;
use crate::read::elf::{DynamicInfo, Reader, SliceKind, Symbol, SymbolCache, WellKnownSection};

/// Report symbols with [`SymbolVisitor::visit_symbol`].
pub const VISIT_SYMBOLS: u32 = 0x0001;
/// Report the program interpreter with [`SymbolVisitor::visit_interp`].
pub const VISIT_INTERP: u32 = 0x0002;
/// Report allocated sections with [`SymbolVisitor::visit_segment`].
pub const VISIT_SEGMENTS: u32 = 0x0004;
/// Report every dynamic tag with [`SymbolVisitor::visit_dyninfo`].
pub const VISIT_DYNINFO: u32 = 0x0008;
/// Report the GNU build-id with [`SymbolVisitor::visit_buildid`].
pub const VISIT_BUILDID: u32 = 0x0010;
/// Report the `.gnu_debuglink` section with [`SymbolVisitor::visit_debuglink`].
pub const VISIT_DEBUGLINK: u32 = 0x0020;
/// Everything.
pub const VISIT_ALL: u32 =
    VISIT_SYMBOLS | VISIT_INTERP | VISIT_SEGMENTS | VISIT_DYNINFO | VISIT_BUILDID | VISIT_DEBUGLINK;

/// The result of [`visit_elf_symbols`] for a file that is not a readable ELF file.
pub const NOT_ELF: i32 = -1;

/// Receives the parts of a file found by [`visit_elf_symbols`].
///
/// Each callback returns 0 to continue. Any other value stops the visit and
/// is returned from the driver.
pub trait SymbolVisitor {
    /// A named function or object symbol.
    ///
    /// `address` is relative to the image base if the file has one.
    fn visit_symbol(&mut self, address: u64, name: &str) -> i32 {
        let _ = (address, name);
        0
    }

    /// The path of the program interpreter.
    fn visit_interp(&mut self, path: &str) -> i32 {
        let _ = path;
        0
    }

    /// An allocated section.
    ///
    /// `start` is relative to the image base if the file has one.
    fn visit_segment(&mut self, start: u64, size: u64, name: &str) -> i32 {
        let _ = (start, size, name);
        0
    }

    /// A dynamic tag, including the terminating `DT_NULL`.
    ///
    /// `name` is the string referred to by `DT_NEEDED`, `DT_SONAME`,
    /// `DT_RPATH` and `DT_RUNPATH`, and is empty for other tags.
    fn visit_dyninfo(&mut self, tag: i64, name: &str, value: u64) -> i32 {
        let _ = (tag, name, value);
        0
    }

    /// The GNU build-id, as lowercase hex.
    fn visit_buildid(&mut self, build_id: &str) -> i32 {
        let _ = build_id;
        0
    }

    /// The name and CRC32 from the `.gnu_debuglink` section.
    fn visit_debuglink(&mut self, name: &str, crc: u32) -> i32 {
        let _ = (name, crc);
        0
    }
}

static ELF_LOCK: Mutex<()> = Mutex::new(());

/// Read the file at `path` and report its contents to `visitor`.
///
/// Returns [`NOT_ELF`] if the file cannot be opened, or its headers or program
/// header table cannot be read. A section header table that cannot be read is
/// ignored, and the dynamic tables are then located by the program headers. Otherwise returns the code of the callback that stopped the visit,
/// or 0 if every callback returned 0.
pub fn visit_elf_symbols<P, V>(path: P, flags: u32, visitor: &mut V) -> i32
where
    P: AsRef<Path>,
    V: SymbolVisitor + ?Sized,
{
    let _guard = ELF_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
    let mut reader = match Reader::open(path) {
        Ok(reader) => reader,
        Err(_e) => {
            #[cfg(feature = "logging")]
            warn!("Failed to open ELF file: {}", _e);
            return NOT_ELF;
        }
    };
    visit_reader(&mut reader, flags, visitor)
}

/// Report the contents of a file to `visitor`, using an existing reader.
///
/// The reader must not have been used yet. The caller is responsible for
/// serializing access to the source. The result is as for
/// [`visit_elf_symbols`].
pub fn visit_reader<R, V>(reader: &mut Reader<R>, flags: u32, visitor: &mut V) -> i32
where
    R: Read + Seek,
    V: SymbolVisitor + ?Sized,
{
    if reader.read_ident().is_err() || reader.read_header().is_err() {
        return NOT_ELF;
    }
    if reader.read_program_headers().is_err() {
        return NOT_ELF;
    }
    if let Err(_e) = reader.read_section_headers() {
        #[cfg(feature = "logging")]
        debug!("Ignoring section headers: {}", _e);
    }
    let context = VisitContext {
        flags,
        image_base: reader.segments().image_base(),
    };
    match context.run(reader, visitor) {
        Ok(()) => 0,
        Err(code) => code,
    }
}

// A nonzero callback result.
type Stop = i32;

fn check(code: i32) -> Result<(), Stop> {
    if code == 0 {
        Ok(())
    } else {
        Err(code)
    }
}

struct VisitContext {
    flags: u32,
    image_base: Option<u64>,
}

impl VisitContext {
    fn wants(&self, flag: u32) -> bool {
        self.flags & flag != 0
    }

    fn relative(&self, address: u64) -> u64 {
        match self.image_base {
            Some(base) => address.wrapping_sub(base),
            None => address,
        }
    }

    fn run<R, V>(&self, reader: &mut Reader<R>, visitor: &mut V) -> Result<(), Stop>
    where
        R: Read + Seek,
        V: SymbolVisitor + ?Sized,
    {
        if self.wants(VISIT_SEGMENTS) {
            self.visit_sections(reader, visitor)?;
        }
        // The dynamic tags are needed both for reporting and for locating the
        // dynamic symbols of files without section headers.
        let dynamic = if self.wants(VISIT_SYMBOLS | VISIT_DYNINFO) {
            read_dynamic_or_skip(reader)
        } else {
            None
        };
        if self.wants(VISIT_DYNINFO) {
            if let Some((tags, _)) = &dynamic {
                for tag in tags {
                    let name = match tag.d_tag {
                        elf::DT_SONAME | elf::DT_RPATH | elf::DT_RUNPATH | elf::DT_NEEDED => {
                            reader.dynamic_string(tag.d_tag, tag.d_val).unwrap_or_default()
                        }
                        _ => String::new(),
                    };
                    check(visitor.visit_dyninfo(tag.d_tag, &name, tag.d_val))?;
                }
            }
        }
        if self.wants(VISIT_INTERP) {
            if let Some(path) = read_interp(reader) {
                check(visitor.visit_interp(&path))?;
            }
        }
        if self.wants(VISIT_SYMBOLS) {
            let info = dynamic.as_ref().map(|(_, info)| info);
            self.visit_symbols(reader, info, visitor)?;
        }
        if self.wants(VISIT_BUILDID) {
            if let Ok(notes) = reader.read_notes() {
                if let Some(build_id) = notes.build_id() {
                    check(visitor.visit_buildid(&build_id))?;
                }
            }
        }
        if self.wants(VISIT_DEBUGLINK) {
            if let Ok(Some(link)) = reader.read_gnu_debuglink() {
                check(visitor.visit_debuglink(&link.name, link.crc))?;
            }
        }
        Ok(())
    }

    fn visit_sections<R, V>(&self, reader: &Reader<R>, visitor: &mut V) -> Result<(), Stop>
    where
        R: Read + Seek,
        V: SymbolVisitor + ?Sized,
    {
        let sections = reader.sections();
        for (index, section) in sections.iter().enumerate().skip(1) {
            if section.sh_flags & elf::SHF_ALLOC == 0 || section.sh_size == 0 {
                continue;
            }
            let name = sections.name(index as u32).unwrap_or_default();
            check(visitor.visit_segment(self.relative(section.sh_addr), section.sh_size, name))?;
        }
        Ok(())
    }

    fn visit_symbols<R, V>(
        &self,
        reader: &mut Reader<R>,
        info: Option<&DynamicInfo>,
        visitor: &mut V,
    ) -> Result<(), Stop>
    where
        R: Read + Seek,
        V: SymbolVisitor + ?Sized,
    {
        let mut cache = SymbolCache::new();
        let mut loaded = load_or_skip(reader.load_symbols(&mut cache, SliceKind::Symtab));
        loaded += load_or_skip(reader.load_symbols(&mut cache, SliceKind::Dynsym));
        if loaded == 0 {
            if let Some(info) = info {
                load_or_skip(reader.load_dynamic_symbols(&mut cache, info));
            }
        }
        for kind in [SliceKind::Symtab, SliceKind::Dynsym] {
            for (_, symbol) in cache.iter(kind) {
                if is_reportable(symbol) {
                    check(visitor.visit_symbol(self.relative(symbol.value), &symbol.name))?;
                }
            }
        }
        Ok(())
    }
}

fn read_dynamic_or_skip<R: Read + Seek>(
    reader: &mut Reader<R>,
) -> Option<(Vec<elf::Dyn>, DynamicInfo)> {
    match reader.read_dynamic_info() {
        Ok(dynamic) => dynamic,
        Err(_e) => {
            #[cfg(feature = "logging")]
            debug!("Ignoring dynamic linking information: {}", _e);
            None
        }
    }
}

fn load_or_skip(result: crate::read::Result<u32>) -> u32 {
    match result {
        Ok(count) => count,
        Err(_e) => {
            #[cfg(feature = "logging")]
            debug!("Ignoring symbol table: {}", _e);
            0
        }
    }
}

fn is_reportable(symbol: &Symbol) -> bool {
    match symbol.original.st_shndx {
        elf::SHN_UNDEF | elf::SHN_LOPROC | elf::SHN_HIPROC | elf::SHN_ABS => return false,
        _ => {}
    }
    if symbol.name.is_empty() {
        return false;
    }
    symbol.symbol_type == elf::STT_FUNC || symbol.symbol_type == elf::STT_OBJECT
}

// The interpreter path, from `.interp` or else from `PT_INTERP`.
fn read_interp<R: Read + Seek>(reader: &mut Reader<R>) -> Option<String> {
    let data = match reader.sections().well_known(WellKnownSection::Interp).copied() {
        Some(section) => reader.read_section_contents(&section).ok()?,
        None => {
            let segment = reader
                .segments()
                .iter()
                .find(|segment| segment.p_type == elf::PT_INTERP)
                .copied()?;
            reader.read_segment_contents(&segment).ok()?
        }
    };
    let path = match memchr::memchr(0, &data) {
        Some(end) => &data[..end],
        None => &data[..],
    };
    if path.is_empty() {
        return None;
    }
    Some(String::from_utf8_lossy(path).into_owned())
}
