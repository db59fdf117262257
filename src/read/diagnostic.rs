use core::{fmt, result};
use std::error;

/// A notification raised while reading an ELF file.
///
/// Every variant is either a warning or an error; see
/// [`is_warning`](ParseDiagnostic::is_warning). A warning has a documented
/// fallback that is applied when the caller's policy returns
/// [`Action::Continue`]. An error always fails the current operation.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ParseDiagnostic {
    /// `EI_CLASS` is neither `ELFCLASS32` nor `ELFCLASS64`.
    ///
    /// Fallback: the class bit of the identification is used as is.
    BadClass {
        /// The declared class.
        class: u8,
    },
    /// `e_ehsize` does not match the size of the header for the class.
    ///
    /// Fallback: the expected size is used.
    BadEhsize {
        /// The declared size.
        actual: u16,
        /// The size of the header for the class.
        expected: u16,
    },
    /// The byte order is unknown, or does not match the machine.
    ///
    /// Fallback: the byte order implied by the machine is used.
    BadEndianness {
        /// The declared `EI_DATA` value.
        data: u8,
        /// The machine for which the byte order was corrected, if any.
        machine: Option<u16>,
    },
    /// `e_phentsize` does not match the size of a program header.
    ///
    /// Fallback: the standard size is used, provided the declared size is larger.
    BadPhentsize {
        /// The declared size.
        actual: u16,
        /// The standard size.
        expected: u16,
    },
    /// `e_phoff` and `e_phnum` disagree about the presence of a program header table.
    ///
    /// Fallback: the program header table is ignored.
    BadPhloc {
        /// The declared offset.
        phoff: u64,
        /// The declared count.
        phnum: u16,
    },
    /// `e_shentsize` does not match the size of a section header.
    ///
    /// Fallback: the section header table is ignored.
    BadShentsize {
        /// The declared size.
        actual: u16,
        /// The standard size.
        expected: u16,
    },
    /// The section header table size or offset is invalid.
    ///
    /// Fallback: the section header table is ignored.
    BadShloc {
        /// The declared offset.
        shoff: u64,
        /// The number of entries, after resolving the section 0 escape.
        shnum: u64,
    },
    /// Section 0 is not an all-zero `SHT_NULL` entry.
    ///
    /// Fallback: section 0 is ignored.
    BadSectionZero,
    /// `DT_PLTREL` is neither `DT_REL` nor `DT_RELA`.
    ///
    /// Fallback: the value is kept.
    BadDynPltType {
        /// The value of the tag.
        value: u64,
    },
    /// A symbol binding is outside the legal range.
    ///
    /// Fallback: the binding becomes `STB_INVALID`.
    BadSymbolBinding {
        /// The index of the symbol in its table.
        symbol: u32,
        /// The declared binding.
        binding: u8,
    },
    /// `e_shstrndx` is out of bounds.
    ///
    /// Fallback: sections are unnamed.
    BadShstrndx {
        /// The declared index.
        index: u32,
        /// The number of sections.
        max: u64,
    },
    /// An `ET_REL` file has a program header table.
    ///
    /// Fallback: the program header table is kept.
    ConflictingFileType,
    /// A symbol with `SHN_XINDEX` has no valid extended section index.
    ///
    /// Fallback: the section index is 0.
    BadSymbolSectionIndex {
        /// The index of the symbol in its table.
        symbol: u32,
    },
    /// A read from the source returned fewer bytes than required.
    Read {
        /// The number of bytes requested.
        expected: u64,
        /// The number of bytes obtained.
        actual: u64,
        /// The file position of the read.
        position: u64,
    },
    /// The identification is not a valid ELF identification.
    InvalidIdent,
    /// A structure is malformed in a way that has no fallback.
    Malformed {
        /// A description of the structure.
        what: &'static str,
        /// The file offset of the structure.
        offset: u64,
    },
    /// Packed relocations use an encoding other than `APS2`.
    UnsupportedPackedRelocations {
        /// The magic bytes.
        magic: [u8; 4],
    },
}

impl ParseDiagnostic {
    /// Return true if this is a warning, which has a fallback.
    ///
    /// The division between warnings and errors is fixed.
    pub fn is_warning(&self) -> bool {
        match self {
            ParseDiagnostic::BadClass { .. }
            | ParseDiagnostic::BadEhsize { .. }
            | ParseDiagnostic::BadEndianness { .. }
            | ParseDiagnostic::BadPhentsize { .. }
            | ParseDiagnostic::BadPhloc { .. }
            | ParseDiagnostic::BadShentsize { .. }
            | ParseDiagnostic::BadShloc { .. }
            | ParseDiagnostic::BadSectionZero
            | ParseDiagnostic::BadDynPltType { .. }
            | ParseDiagnostic::BadSymbolBinding { .. }
            | ParseDiagnostic::BadShstrndx { .. }
            | ParseDiagnostic::ConflictingFileType
            | ParseDiagnostic::BadSymbolSectionIndex { .. } => true,
            ParseDiagnostic::Read { .. }
            | ParseDiagnostic::InvalidIdent
            | ParseDiagnostic::Malformed { .. }
            | ParseDiagnostic::UnsupportedPackedRelocations { .. } => false,
        }
    }

    /// Return true if this is an error.
    #[inline]
    pub fn is_error(&self) -> bool {
        !self.is_warning()
    }
}

impl fmt::Display for ParseDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ParseDiagnostic::BadClass { class } => write!(
                f,
                "Unknown ELF class {} (should be 1 for 32-bit, 2 for 64-bit)",
                class
            ),
            ParseDiagnostic::BadEhsize { actual, expected } => write!(
                f,
                "The ELF header entry size is invalid ({}, expected {})",
                actual, expected
            ),
            ParseDiagnostic::BadEndianness {
                data,
                machine: None,
            } => write!(f, "Unknown ELF byte sex {}", data),
            ParseDiagnostic::BadEndianness {
                data,
                machine: Some(_),
            } => write!(f, "Bad ELF byte sex {} for the indicated machine", data),
            ParseDiagnostic::BadPhentsize { actual, expected } => write!(
                f,
                "PHT entry size is invalid: {}. Falling back to {}",
                actual, expected
            ),
            ParseDiagnostic::BadPhloc { .. } => f.write_str("The PHT table size or offset is invalid"),
            ParseDiagnostic::BadShentsize { .. } => f.write_str("The SHT entry size is invalid"),
            ParseDiagnostic::BadShloc { .. } => f.write_str("SHT table size or offset is invalid"),
            ParseDiagnostic::BadSectionZero => {
                f.write_str("The first section header is not an empty SHT_NULL entry")
            }
            ParseDiagnostic::BadDynPltType { value } => {
                write!(f, "Bad DT_PLTREL value ({})", value)
            }
            ParseDiagnostic::BadSymbolBinding { symbol, binding } => {
                write!(f, "Bad symbol binding {} for symbol {}", binding, symbol)
            }
            ParseDiagnostic::BadShstrndx { index, max } => write!(
                f,
                "Section header string table index {} is out of bounds (max {})",
                index, max
            ),
            ParseDiagnostic::ConflictingFileType => {
                f.write_str("ELF file with PHT cannot be ET_REL")
            }
            ParseDiagnostic::BadSymbolSectionIndex { symbol } => {
                write!(f, "Illegal section indirect index for symbol {}", symbol)
            }
            ParseDiagnostic::Read { position, .. } => {
                write!(f, "Bad file structure or read error (offset {})", position)
            }
            ParseDiagnostic::InvalidIdent => f.write_str("Invalid ELF identification"),
            ParseDiagnostic::Malformed { what, offset } => {
                write!(f, "{} (offset {:#x})", what, offset)
            }
            ParseDiagnostic::UnsupportedPackedRelocations { magic } => write!(
                f,
                "Unsupported packed relocations format {:?}",
                String::from_utf8_lossy(&magic)
            ),
        }
    }
}

impl error::Error for ParseDiagnostic {}

/// The result type used within the read module.
pub type Result<T> = result::Result<T, ParseDiagnostic>;

/// The decision returned by a diagnostic policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Apply the fallback for a warning and keep going.
    Continue,
    /// Fail the current operation.
    Abort,
}

/// A caller supplied policy that decides what happens after a diagnostic.
pub type Policy = Box<dyn FnMut(&ParseDiagnostic) -> Action>;

/// Resume after any warning and abort on any error.
///
/// This is the default policy of a [`Reader`](crate::read::elf::Reader).
pub fn silent_policy(diagnostic: &ParseDiagnostic) -> Action {
    if diagnostic.is_warning() {
        Action::Continue
    } else {
        Action::Abort
    }
}

/// Abort on every diagnostic.
pub fn strict_policy(_diagnostic: &ParseDiagnostic) -> Action {
    Action::Abort
}

pub(crate) trait ReadError<T> {
    fn read_error(self, what: &'static str, offset: u64) -> Result<T>;
}

impl<T> ReadError<T> for result::Result<T, ()> {
    fn read_error(self, what: &'static str, offset: u64) -> Result<T> {
        self.map_err(|()| ParseDiagnostic::Malformed { what, offset })
    }
}

impl<T> ReadError<T> for Option<T> {
    fn read_error(self, what: &'static str, offset: u64) -> Result<T> {
        self.ok_or(ParseDiagnostic::Malformed { what, offset })
    }
}
