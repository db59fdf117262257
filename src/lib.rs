//! # `elfread`
//!
//! The `elfread` crate provides a seek-based reader for ELF files that tolerates malformed input.
//!
//! It decodes ELF32 and ELF64 files of either byte order: the identification
//! and file header, the section and program header tables, dynamic-linking
//! metadata, symbol tables, relocation streams (including Android packed
//! relocations), symbol versioning, notes, and `.eh_frame` call frame
//! information.
//!
//! Malformed input is reported through [`read::ParseDiagnostic`]. Each
//! diagnostic is either a warning, which has a documented fallback, or an
//! error. A caller supplied policy decides whether a warning is tolerated.
//!
//! ## Example
//!
//! ```no_run
//! use elfread::read::elf::Reader;
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let file = std::fs::File::open("/bin/ls")?;
//! let mut reader = Reader::new(file)?;
//! reader.read_ident()?;
//! reader.read_header()?;
//! reader.read_program_headers()?;
//! reader.read_section_headers()?;
//! let sections = reader.sections();
//! for (index, section) in sections.iter().enumerate() {
//!     let name = sections.name(index as u32).unwrap_or_default();
//!     println!("{} {} {:#x}", index, name, section.sh_offset);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! The [`visit`] module provides a higher level driver that reports symbols,
//! the interpreter, dynamic tags, the build-id and the debug link to a
//! visitor.

#![deny(missing_docs)]
#![deny(missing_debug_implementations)]

pub mod elf;

pub mod endian;
pub use endian::Endianness;

pub mod read;

#[cfg(feature = "visit")]
pub mod visit;
