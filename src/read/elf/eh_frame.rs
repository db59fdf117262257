use std::convert::TryFrom;
use std::io::{Read, Seek};

use crate::elf;
use crate::endian::Endianness;
use crate::read::{Bytes, ParseDiagnostic, ReadError, Result};

use super::{Reader, WellKnownSection};

/// A decoded call frame instruction.
///
/// Offsets that the instruction encodes as multiples of the data alignment
/// factor are given already multiplied, and location advances are given
/// already multiplied by the code alignment factor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallFrameInstruction {
    /// `DW_CFA_advance_loc`, `DW_CFA_advance_loc1/2/4`.
    AdvanceLoc {
        /// The advance in bytes.
        delta: u64,
        /// The location after the advance, when decoding an FDE.
        location: Option<u64>,
    },
    /// `DW_CFA_set_loc`.
    SetLoc {
        /// The new location.
        address: u64,
    },
    /// `DW_CFA_offset`, `DW_CFA_offset_extended`, `DW_CFA_offset_extended_sf`
    /// and `DW_CFA_GNU_negative_offset_extended`.
    Offset {
        /// The register.
        register: u64,
        /// The offset from the CFA.
        offset: i64,
    },
    /// `DW_CFA_val_offset` and `DW_CFA_val_offset_sf`.
    ValOffset {
        /// The register.
        register: u64,
        /// The offset from the CFA.
        offset: i64,
    },
    /// `DW_CFA_restore` and `DW_CFA_restore_extended`.
    Restore {
        /// The register.
        register: u64,
    },
    /// `DW_CFA_undefined`.
    Undefined {
        /// The register.
        register: u64,
    },
    /// `DW_CFA_same_value`.
    SameValue {
        /// The register.
        register: u64,
    },
    /// `DW_CFA_register`.
    Register {
        /// The register.
        register: u64,
        /// The register that holds its value.
        from: u64,
    },
    /// `DW_CFA_remember_state`.
    RememberState,
    /// `DW_CFA_restore_state`.
    RestoreState,
    /// `DW_CFA_def_cfa` and `DW_CFA_def_cfa_sf`.
    DefCfa {
        /// The register.
        register: u64,
        /// The offset.
        offset: i64,
    },
    /// `DW_CFA_def_cfa_register`.
    DefCfaRegister {
        /// The register.
        register: u64,
    },
    /// `DW_CFA_def_cfa_offset` and `DW_CFA_def_cfa_offset_sf`.
    DefCfaOffset {
        /// The offset.
        offset: i64,
    },
    /// `DW_CFA_def_cfa_expression`.
    DefCfaExpression {
        /// The DWARF expression.
        expression: Vec<u8>,
    },
    /// `DW_CFA_expression`.
    Expression {
        /// The register.
        register: u64,
        /// The DWARF expression.
        expression: Vec<u8>,
    },
    /// `DW_CFA_val_expression`.
    ValExpression {
        /// The register.
        register: u64,
        /// The DWARF expression.
        expression: Vec<u8>,
    },
    /// `DW_CFA_GNU_args_size`.
    ArgsSize {
        /// The size of the arguments pushed on the stack.
        size: u64,
    },
    /// `DW_CFA_nop`.
    Nop,
    /// `DW_CFA_lo_user`, which has no operands.
    LoUser,
}

/// The parameters of a CIE that affect how instructions are decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CfiContext {
    /// The code alignment factor.
    pub code_alignment_factor: u64,
    /// The data alignment factor.
    pub data_alignment_factor: i64,
    /// The byte order of fixed-size operands.
    pub endian: Endianness,
    /// The size of an address, for `DW_CFA_set_loc`.
    pub address_size: u8,
}

/// Decode one call frame instruction.
///
/// `location` is the location accumulator of an FDE. It is `None` when
/// decoding the initial instructions of a CIE, in which case advances are
/// decoded but not accumulated. Returns `None` for an unknown opcode or if
/// the operands are truncated.
pub fn decode_cfi(
    data: &mut Bytes<'_>,
    context: &CfiContext,
    location: Option<&mut u64>,
) -> Option<CallFrameInstruction> {
    use CallFrameInstruction as Cfi;

    let factored = |value: i64| value.wrapping_mul(context.data_alignment_factor);
    let advance = |delta: u64, location: Option<&mut u64>| {
        let delta = delta.wrapping_mul(context.code_alignment_factor);
        let location = location.map(|location| {
            *location = location.wrapping_add(delta);
            *location
        });
        Cfi::AdvanceLoc { delta, location }
    };

    let instruction = data.read_u8()?;
    let operand = u64::from(instruction & 0x3f);
    match instruction & 0xc0 {
        elf::DW_CFA_advance_loc => return Some(advance(operand, location)),
        elf::DW_CFA_offset => {
            let offset = data.read_uleb128()?;
            return Some(Cfi::Offset {
                register: operand,
                offset: factored(offset as i64),
            });
        }
        elf::DW_CFA_restore => return Some(Cfi::Restore { register: operand }),
        _ => {}
    }

    let endian = context.endian;
    Some(match instruction {
        elf::DW_CFA_nop => Cfi::Nop,
        elf::DW_CFA_lo_user => Cfi::LoUser,
        elf::DW_CFA_remember_state => Cfi::RememberState,
        elf::DW_CFA_restore_state => Cfi::RestoreState,
        elf::DW_CFA_set_loc => {
            let address = data.read_word(endian, context.address_size == 8)?;
            if let Some(location) = location {
                *location = address;
            }
            Cfi::SetLoc { address }
        }
        elf::DW_CFA_advance_loc1 => advance(data.read_u8()?.into(), location),
        elf::DW_CFA_advance_loc2 => advance(data.read_u16(endian)?.into(), location),
        elf::DW_CFA_advance_loc4 => advance(data.read_u32(endian)?.into(), location),
        elf::DW_CFA_offset_extended => Cfi::Offset {
            register: data.read_uleb128()?,
            offset: factored(data.read_uleb128()? as i64),
        },
        elf::DW_CFA_offset_extended_sf => Cfi::Offset {
            register: data.read_uleb128()?,
            offset: factored(data.read_sleb128()?),
        },
        elf::DW_CFA_GNU_negative_offset_extended => Cfi::Offset {
            register: data.read_uleb128()?,
            offset: factored((data.read_uleb128()? as i64).wrapping_neg()),
        },
        elf::DW_CFA_val_offset => Cfi::ValOffset {
            register: data.read_uleb128()?,
            offset: factored(data.read_uleb128()? as i64),
        },
        elf::DW_CFA_val_offset_sf => Cfi::ValOffset {
            register: data.read_uleb128()?,
            offset: factored(data.read_sleb128()?),
        },
        elf::DW_CFA_restore_extended => Cfi::Restore {
            register: data.read_uleb128()?,
        },
        elf::DW_CFA_undefined => Cfi::Undefined {
            register: data.read_uleb128()?,
        },
        elf::DW_CFA_same_value => Cfi::SameValue {
            register: data.read_uleb128()?,
        },
        elf::DW_CFA_register => Cfi::Register {
            register: data.read_uleb128()?,
            from: data.read_uleb128()?,
        },
        elf::DW_CFA_def_cfa => Cfi::DefCfa {
            register: data.read_uleb128()?,
            offset: data.read_uleb128()? as i64,
        },
        elf::DW_CFA_def_cfa_sf => Cfi::DefCfa {
            register: data.read_uleb128()?,
            offset: factored(data.read_sleb128()?),
        },
        elf::DW_CFA_def_cfa_register => Cfi::DefCfaRegister {
            register: data.read_uleb128()?,
        },
        elf::DW_CFA_def_cfa_offset => Cfi::DefCfaOffset {
            offset: data.read_uleb128()? as i64,
        },
        elf::DW_CFA_def_cfa_offset_sf => Cfi::DefCfaOffset {
            offset: factored(data.read_sleb128()?),
        },
        elf::DW_CFA_def_cfa_expression => Cfi::DefCfaExpression {
            expression: read_block(data)?,
        },
        elf::DW_CFA_expression => Cfi::Expression {
            register: data.read_uleb128()?,
            expression: read_block(data)?,
        },
        elf::DW_CFA_val_expression => Cfi::ValExpression {
            register: data.read_uleb128()?,
            expression: read_block(data)?,
        },
        elf::DW_CFA_GNU_args_size => Cfi::ArgsSize {
            size: data.read_uleb128()?,
        },
        _ => return None,
    })
}

fn read_block(data: &mut Bytes<'_>) -> Option<Vec<u8>> {
    let len = data.read_uleb128()?;
    let block = data.read_bytes(usize::try_from(len).ok()?)?;
    Some(block.0.to_vec())
}

fn decode_program(
    mut data: Bytes<'_>,
    context: &CfiContext,
    mut location: Option<u64>,
    offset: u64,
) -> Result<Vec<CallFrameInstruction>> {
    let mut instructions = Vec::new();
    while !data.is_empty() {
        let instruction = decode_cfi(&mut data, context, location.as_mut())
            .read_error("Invalid call frame instruction", offset)?;
        instructions.push(instruction);
    }
    Ok(instructions)
}

/// A Common Information Entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cie {
    /// The offset of the entry in the section.
    pub offset: u64,
    /// The length of the entry, not including the length field.
    pub length: u32,
    /// The version.
    pub version: u8,
    /// The augmentation string.
    pub augmentation: String,
    /// The code alignment factor.
    pub code_alignment_factor: u64,
    /// The data alignment factor.
    pub data_alignment_factor: i64,
    /// The return address register.
    pub return_address_register: u64,
    /// The augmentation data, present if the augmentation starts with `z`.
    pub augmentation_data: Vec<u8>,
    /// The `DW_EH_PE_*` encoding of FDE locations, given by `R`.
    pub fde_encoding: u8,
    /// The `DW_EH_PE_*` encoding of LSDA pointers, given by `L`.
    pub lsda_encoding: Option<u8>,
    /// The personality routine, given by `P`.
    pub personality: Option<u64>,
    /// True if `S` marks the frames as signal handlers.
    pub signal_frame: bool,
    /// The initial instructions.
    pub instructions: Vec<CallFrameInstruction>,
}

impl Cie {
    /// Return true if FDE locations are relative to their own address.
    pub fn has_pc_relative_locations(&self) -> bool {
        self.fde_encoding != elf::DW_EH_PE_omit
            && self.fde_encoding & 0x70 == elf::DW_EH_PE_pcrel
    }
}

// The parts of the CIE augmentation data selected by the augmentation string.
#[derive(Debug, Default)]
struct Augmentation {
    fde_encoding: u8,
    lsda_encoding: Option<u8>,
    personality: Option<u64>,
    signal_frame: bool,
}

impl Augmentation {
    // `address` is the address of the augmentation data. Parsing stops at the
    // first unknown character, whose data cannot be skipped.
    fn parse(augmentation: &str, mut data: Bytes<'_>, address: u64, pointers: Pointers) -> Option<Self> {
        let len = data.len();
        let mut parsed = Augmentation::default();
        for c in augmentation.chars().skip(1) {
            match c {
                'R' => parsed.fde_encoding = data.read_u8()?,
                'L' => parsed.lsda_encoding = Some(data.read_u8()?),
                'P' => {
                    let encoding = data.read_u8()?;
                    let pc = address.wrapping_add((len - data.len()) as u64);
                    parsed.personality = Some(pointers.read(&mut data, encoding, pc)?);
                }
                'S' => parsed.signal_frame = true,
                _ => break,
            }
        }
        Some(parsed)
    }
}

// Reads values encoded with `DW_EH_PE_*`.
#[derive(Debug, Clone, Copy)]
struct Pointers {
    endian: Endianness,
    address_size: u8,
}

impl Pointers {
    // Read the value without applying the encoding's base.
    fn read_value(&self, data: &mut Bytes<'_>, encoding: u8) -> Option<u64> {
        let endian = self.endian;
        Some(match encoding & 0x0f {
            elf::DW_EH_PE_absptr => data.read_word(endian, self.address_size == 8)?,
            elf::DW_EH_PE_uleb128 => data.read_uleb128()?,
            elf::DW_EH_PE_udata2 => data.read_u16(endian)?.into(),
            elf::DW_EH_PE_udata4 => data.read_u32(endian)?.into(),
            elf::DW_EH_PE_udata8 => data.read_u64(endian)?,
            elf::DW_EH_PE_sleb128 => data.read_sleb128()? as u64,
            elf::DW_EH_PE_sdata2 => data.read_u16(endian)? as i16 as i64 as u64,
            elf::DW_EH_PE_sdata4 => data.read_u32(endian)? as i32 as i64 as u64,
            elf::DW_EH_PE_sdata8 => data.read_u64(endian)?,
            _ => return None,
        })
    }

    // Read a pointer, where `pc` is the address of the encoded value. Only
    // absolute and PC-relative pointers are supported. For an indirect
    // pointer, the address holding the pointer is returned.
    fn read(&self, data: &mut Bytes<'_>, encoding: u8, pc: u64) -> Option<u64> {
        if encoding == elf::DW_EH_PE_omit {
            return Some(0);
        }
        let value = self.read_value(data, encoding)?;
        match encoding & 0x70 {
            elf::DW_EH_PE_absptr => Some(value),
            elf::DW_EH_PE_pcrel => Some(pc.wrapping_add(value)),
            _ => None,
        }
    }
}

// The address of the next byte of `body`, a record at `offset` with `length`.
fn position(address: u64, offset: u64, length: u32, body: &Bytes<'_>) -> u64 {
    address.wrapping_add(offset + 4 + u64::from(length) - body.len() as u64)
}

/// A Frame Description Entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fde {
    /// The offset of the entry in the section.
    pub offset: u64,
    /// The length of the entry, not including the length field.
    pub length: u32,
    /// The offset of the CIE in the section.
    pub cie_offset: u64,
    /// The first location covered.
    pub initial_location: u64,
    /// The number of bytes covered.
    pub address_range: u64,
    /// The augmentation data, present if the CIE augmentation starts with `z`.
    pub augmentation_data: Vec<u8>,
    /// The language specific data area, if the CIE gives an LSDA encoding.
    pub lsda: Option<u64>,
    /// The instructions.
    pub instructions: Vec<CallFrameInstruction>,
}

impl Fde {
    /// The location after the last location covered.
    #[inline]
    pub fn final_location(&self) -> u64 {
        self.initial_location.wrapping_add(self.address_range)
    }
}

/// The entries of an `.eh_frame` section.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EhFrame {
    /// The CIEs, in section order.
    pub cies: Vec<Cie>,
    /// The FDEs, in section order.
    pub fdes: Vec<Fde>,
}

impl EhFrame {
    /// Return the CIE at an offset in the section.
    pub fn cie_at(&self, offset: u64) -> Option<&Cie> {
        self.cies.iter().find(|cie| cie.offset == offset)
    }

    /// Parse the contents of an `.eh_frame` section.
    ///
    /// `address` is the address of the section, used for PC-relative
    /// locations. Parsing stops at a zero length terminator or at the end of
    /// the data. The 64-bit format is not supported.
    pub fn parse(data: &[u8], address: u64, endian: Endianness, address_size: u8) -> Result<EhFrame> {
        let mut frame = EhFrame::default();
        let mut offset = 0u64;
        while offset < data.len() as u64 {
            let mut record = Bytes(data);
            record
                .skip(offset as usize)
                .read_error("Truncated .eh_frame record", offset)?;
            let length = record
                .read_u32(endian)
                .read_error("Truncated .eh_frame record", offset)?;
            if length == 0 {
                break;
            }
            if length >= 0xffff_fff0 {
                return Err(ParseDiagnostic::Malformed {
                    what: "Unsupported 64-bit .eh_frame record",
                    offset,
                });
            }
            let mut body = record
                .read_bytes(length as usize)
                .read_error("Truncated .eh_frame record", offset)?;
            let id = body
                .read_u32(endian)
                .read_error("Truncated .eh_frame record", offset)?;
            if id == 0 {
                let cie = frame.parse_cie(body, offset, length, address, endian, address_size)?;
                frame.cies.push(cie);
            } else {
                let id_offset = offset + 4;
                let cie_offset = id_offset
                    .checked_sub(u64::from(id))
                    .read_error("Invalid .eh_frame CIE pointer", offset)?;
                let fde =
                    frame.parse_fde(body, offset, length, cie_offset, address, endian, address_size)?;
                frame.fdes.push(fde);
            }
            offset += 4 + u64::from(length);
        }
        Ok(frame)
    }

    #[allow(clippy::too_many_arguments)]
    fn parse_cie(
        &self,
        mut body: Bytes<'_>,
        offset: u64,
        length: u32,
        address: u64,
        endian: Endianness,
        address_size: u8,
    ) -> Result<Cie> {
        let malformed = "Invalid .eh_frame CIE";
        let version = body.read_u8().read_error(malformed, offset)?;
        let augmentation = body.read_string().read_error(malformed, offset)?;
        let augmentation = String::from_utf8_lossy(augmentation).into_owned();
        let code_alignment_factor = body.read_uleb128().read_error(malformed, offset)?;
        let data_alignment_factor = body.read_sleb128().read_error(malformed, offset)?;
        let return_address_register = if version == 1 {
            body.read_u8().map(u64::from)
        } else {
            body.read_uleb128()
        }
        .read_error(malformed, offset)?;
        let mut augmentation_data = Vec::new();
        let mut parsed = Augmentation::default();
        if augmentation.starts_with('z') {
            let len = body.read_uleb128().read_error(malformed, offset)?;
            let data_address = position(address, offset, length, &body);
            let data = usize::try_from(len)
                .ok()
                .and_then(|len| body.read_bytes(len))
                .read_error(malformed, offset)?;
            augmentation_data = data.0.to_vec();
            let pointers = Pointers {
                endian,
                address_size,
            };
            parsed = Augmentation::parse(&augmentation, data, data_address, pointers)
                .read_error("Invalid .eh_frame CIE augmentation", offset)?;
        }
        let context = CfiContext {
            code_alignment_factor,
            data_alignment_factor,
            endian,
            address_size,
        };
        let instructions = decode_program(body, &context, None, offset)?;
        Ok(Cie {
            offset,
            length,
            version,
            augmentation,
            code_alignment_factor,
            data_alignment_factor,
            return_address_register,
            augmentation_data,
            fde_encoding: parsed.fde_encoding,
            lsda_encoding: parsed.lsda_encoding,
            personality: parsed.personality,
            signal_frame: parsed.signal_frame,
            instructions,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn parse_fde(
        &self,
        mut body: Bytes<'_>,
        offset: u64,
        length: u32,
        cie_offset: u64,
        address: u64,
        endian: Endianness,
        address_size: u8,
    ) -> Result<Fde> {
        let malformed = "Invalid .eh_frame FDE";
        let cie = self
            .cie_at(cie_offset)
            .read_error("Unknown .eh_frame CIE", offset)?;
        let pointers = Pointers {
            endian,
            address_size,
        };
        let pc = position(address, offset, length, &body);
        let initial_location = pointers
            .read(&mut body, cie.fde_encoding, pc)
            .read_error(malformed, offset)?;
        let address_range = pointers
            .read_value(&mut body, cie.fde_encoding)
            .read_error(malformed, offset)?;
        let mut augmentation_data = Vec::new();
        let mut lsda = None;
        if cie.augmentation.starts_with('z') {
            let len = body.read_uleb128().read_error(malformed, offset)?;
            let pc = position(address, offset, length, &body);
            let mut data = usize::try_from(len)
                .ok()
                .and_then(|len| body.read_bytes(len))
                .read_error(malformed, offset)?;
            augmentation_data = data.0.to_vec();
            if let Some(encoding) = cie.lsda_encoding {
                if !data.is_empty() {
                    lsda = Some(
                        pointers
                            .read(&mut data, encoding, pc)
                            .read_error(malformed, offset)?,
                    );
                }
            }
        }
        let context = CfiContext {
            code_alignment_factor: cie.code_alignment_factor,
            data_alignment_factor: cie.data_alignment_factor,
            endian,
            address_size,
        };
        let instructions = decode_program(body, &context, Some(initial_location), offset)?;
        Ok(Fde {
            offset,
            length,
            cie_offset,
            initial_location,
            address_range,
            augmentation_data,
            lsda,
            instructions,
        })
    }
}

impl<R: Read + Seek> Reader<R> {
    /// Read and decode the `.eh_frame` section.
    ///
    /// Returns `None` if there is no `.eh_frame` section.
    pub fn read_eh_frame(&mut self) -> Result<Option<EhFrame>> {
        let section = match self.sections.well_known(WellKnownSection::EhFrame) {
            Some(section) => *section,
            None => return Ok(None),
        };
        let data = self.read_section_contents(&section)?;
        let address_size = self.sizes.word;
        match EhFrame::parse(&data, section.sh_addr, self.endian, address_size) {
            Ok(frame) => Ok(Some(frame)),
            Err(diagnostic) => Err(self.fail(match diagnostic {
                ParseDiagnostic::Malformed { what, offset } => ParseDiagnostic::Malformed {
                    what,
                    offset: section.sh_offset + offset,
                },
                diagnostic => diagnostic,
            })),
        }
    }
}
