use std::collections::BTreeMap;

use crate::elf;
use crate::read::elf::Symbol;

/// Machine-specific behaviour of the reader.
///
/// Each supported machine family is described by a static table of function
/// pointers. The table is selected by [`ArchOps::for_machine`] after the file
/// header has been read.
#[derive(Debug, Clone, Copy)]
pub struct ArchOps {
    /// A short name for the machine family.
    pub name: &'static str,
    /// Translate a symbol binding above `STB_WEAK`.
    ///
    /// Returns `None` if the binding has no machine-specific meaning.
    pub translate_binding: fn(binding: u8) -> Option<u8>,
    /// Split `r_info` into the symbol index and relocation type.
    pub split_rel_info: fn(info: u64, is_64: bool, big_endian: bool) -> (u32, u32),
    /// Combine a symbol index and relocation type into `r_info`.
    pub make_rel_info: fn(sym: u32, r_type: u32, is_64: bool, big_endian: bool) -> u64,
    /// Decide the bitness of segments, given the header and the ELF bitness.
    pub segment_64: fn(header: &elf::FileHeader, is_64: bool) -> bool,
    /// Whether Android packed relocation tags are recognized.
    pub android_packed_relocations: bool,
    /// Called before the first symbol of a table is read.
    pub on_start_symbols: fn(state: &mut ArchState),
    /// Called after a symbol has been read and named.
    pub on_symbol_read: fn(state: &mut ArchState, symbol: &mut Symbol),
}

impl ArchOps {
    /// Behaviour shared by every machine without special handling.
    pub const GENERIC: ArchOps = ArchOps {
        name: "generic",
        translate_binding: no_binding,
        split_rel_info,
        make_rel_info,
        segment_64: same_bitness,
        android_packed_relocations: false,
        on_start_symbols: nothing_to_start,
        on_symbol_read: nothing_to_read,
    };

    /// 32-bit ARM.
    pub const ARM: ArchOps = ArchOps {
        name: "arm",
        translate_binding: arm_binding,
        android_packed_relocations: true,
        on_start_symbols: arm_start_symbols,
        on_symbol_read: arm_symbol_read,
        ..ArchOps::GENERIC
    };

    /// AArch64. Segments are always 64-bit, even in ELF32 (ILP32) files.
    pub const AARCH64: ArchOps = ArchOps {
        name: "aarch64",
        segment_64: always_64,
        android_packed_relocations: true,
        on_start_symbols: arm_start_symbols,
        on_symbol_read: arm_symbol_read,
        ..ArchOps::GENERIC
    };

    /// MIPS, including the Cisco router variants.
    pub const MIPS: ArchOps = ArchOps {
        name: "mips",
        split_rel_info: mips_split_rel_info,
        make_rel_info: mips_make_rel_info,
        segment_64: mips_segment_64,
        ..ArchOps::GENERIC
    };

    /// Select the behaviour for a value of `e_machine`.
    pub fn for_machine(machine: u16) -> &'static ArchOps {
        match machine {
            elf::EM_ARM => &ArchOps::ARM,
            elf::EM_AARCH64 => &ArchOps::AARCH64,
            elf::EM_MIPS | elf::EM_CISCO7200 | elf::EM_CISCO3620 => &ArchOps::MIPS,
            _ => &ArchOps::GENERIC,
        }
    }
}

fn no_binding(_binding: u8) -> Option<u8> {
    None
}

// Some ARM toolchains use binding 14 the way others use weak.
fn arm_binding(binding: u8) -> Option<u8> {
    if binding == elf::STB_LOPROC + 1 {
        Some(elf::STB_WEAK)
    } else {
        None
    }
}

fn split_rel_info(info: u64, is_64: bool, _big_endian: bool) -> (u32, u32) {
    if is_64 {
        ((info >> 32) as u32, info as u32)
    } else {
        ((info >> 8) as u32, (info & 0xff) as u32)
    }
}

fn make_rel_info(sym: u32, r_type: u32, is_64: bool, _big_endian: bool) -> u64 {
    if is_64 {
        elf::r_info64(sym, r_type)
    } else {
        u64::from(elf::r_info32(sym, r_type as u8))
    }
}

// MIPS64 stores `r_sym` at the lower address and the type bytes in big
// endian order, so a little endian read puts them in the opposite halves.
fn mips_split_rel_info(info: u64, is_64: bool, big_endian: bool) -> (u32, u32) {
    if is_64 && !big_endian {
        (info as u32, ((info >> 32) as u32).swap_bytes())
    } else {
        split_rel_info(info, is_64, big_endian)
    }
}

fn mips_make_rel_info(sym: u32, r_type: u32, is_64: bool, big_endian: bool) -> u64 {
    if is_64 && !big_endian {
        (u64::from(r_type.swap_bytes()) << 32) | u64::from(sym)
    } else {
        make_rel_info(sym, r_type, is_64, big_endian)
    }
}

fn same_bitness(_header: &elf::FileHeader, is_64: bool) -> bool {
    is_64
}

fn always_64(_header: &elf::FileHeader, _is_64: bool) -> bool {
    true
}

fn mips_segment_64(header: &elf::FileHeader, is_64: bool) -> bool {
    is_64 || header.e_flags & elf::EF_MIPS_ABI == elf::E_MIPS_ABI_O64
}

fn nothing_to_start(_state: &mut ArchState) {}

fn nothing_to_read(_state: &mut ArchState, _symbol: &mut Symbol) {}

/// The instruction set in effect at an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Isa {
    /// ARM or A64 instructions.
    Arm,
    /// Thumb instructions.
    Thumb,
}

/// Mutable machine-specific state collected while reading symbols.
#[derive(Debug, Default, Clone)]
pub struct ArchState {
    track_mapping_symbols: bool,
    has_mapping_symbols: bool,
    // section index -> (start address -> isa)
    isa_ranges: BTreeMap<u32, BTreeMap<u64, Isa>>,
}

impl ArchState {
    pub(crate) fn new(track_mapping_symbols: bool) -> Self {
        ArchState {
            track_mapping_symbols,
            ..ArchState::default()
        }
    }

    /// Return true if the last symbol table read contained ARM mapping symbols.
    pub fn has_mapping_symbols(&self) -> bool {
        self.has_mapping_symbols
    }

    /// Record the instruction set starting at `address` in a section.
    pub fn set_isa(&mut self, section: u32, address: u64, isa: Isa) {
        self.isa_ranges
            .entry(section)
            .or_default()
            .insert(address, isa);
    }

    /// Return the instruction set in effect at `address` in a section.
    ///
    /// This is the instruction set of the last range starting at or before
    /// the address, or ARM if there is none.
    pub fn isa_at(&self, section: u32, address: u64) -> Isa {
        self.isa_ranges
            .get(&section)
            .and_then(|ranges| ranges.range(..=address).next_back())
            .map(|(_, isa)| *isa)
            .unwrap_or(Isa::Arm)
    }
}

/// Return true if `name` is an ARM mapping symbol such as `$a` or `$d.realdata`.
pub fn is_mapping_symbol(name: &str) -> bool {
    let bytes = name.as_bytes();
    if bytes.len() < 2 || bytes[0] != b'$' {
        return false;
    }
    if bytes.len() > 2 && bytes[2] != b'.' {
        return false;
    }
    match bytes[1] {
        b'a' | b't' | b'b' | b'd' | b'p' | b'f' | b'x' => true,
        _ => false,
    }
}

fn arm_start_symbols(state: &mut ArchState) {
    state.has_mapping_symbols = false;
}

fn arm_symbol_read(state: &mut ArchState, symbol: &mut Symbol) {
    if is_mapping_symbol(&symbol.name) {
        state.has_mapping_symbols = true;
        let isa = match symbol.name.as_bytes()[1] {
            b'a' | b'x' => Isa::Arm,
            b't' => Isa::Thumb,
            _ => return,
        };
        if isa == Isa::Thumb {
            symbol.flags |= Symbol::THUMB_FUNCTION;
        }
        if state.track_mapping_symbols {
            state.set_isa(symbol.section, symbol.original.st_value, isa);
        }
        return;
    }

    let original_type = symbol.original.st_type();
    if original_type != elf::STT_FUNC
        && original_type != elf::STT_ARM_TFUNC
        && original_type != elf::STT_ARM_16BIT
    {
        return;
    }
    if symbol.binding != elf::STB_LOCAL
        && symbol.binding != elf::STB_GLOBAL
        && symbol.binding != elf::STB_WEAK
    {
        return;
    }

    symbol.value &= !1;
    if original_type == elf::STT_ARM_TFUNC {
        symbol.symbol_type = elf::STT_FUNC;
    }
    if original_type == elf::STT_ARM_TFUNC
        || original_type == elf::STT_ARM_16BIT
        || symbol.original.st_value & 1 != 0
    {
        symbol.flags |= Symbol::THUMB_FUNCTION;
    } else if state.track_mapping_symbols
        && state.isa_at(symbol.section, symbol.original.st_value) == Isa::Thumb
    {
        symbol.flags |= Symbol::THUMB_FUNCTION;
    }
}
