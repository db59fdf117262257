//! Interface for reading ELF files.
//!
//! The [`elf::Reader`] decodes a file from a seekable byte source. Problems
//! in the input are reported as [`ParseDiagnostic`] values; see
//! [`Action`] for how a caller controls recovery.

mod diagnostic;
pub use diagnostic::*;

mod source;
pub use source::*;

mod util;
pub use util::{hex_string, Bytes};
pub(crate) use util::align;

pub mod elf;
