//! ELF definitions.
//!
//! These definitions are independent of read support.
//!
//! The record types in this module are the normalized in-memory form of the
//! on-disk structures: every field is widened to its ELF64 size and already
//! converted to native byte order, so callers never need to care about the
//! class or byte order of the file they came from.

#![allow(missing_docs)]
#![allow(non_upper_case_globals)]

/// The size of the ELF identification.
pub const EI_NIDENT: usize = 16;

/// File identification bytes 0..4.
pub const ELFMAG: [u8; 4] = [0x7f, b'E', b'L', b'F'];

/// File class byte index.
pub const EI_CLASS: usize = 4;
/// Invalid class.
pub const ELFCLASSNONE: u8 = 0;
/// 32-bit objects.
pub const ELFCLASS32: u8 = 1;
/// 64-bit objects.
pub const ELFCLASS64: u8 = 2;

/// Data encoding byte index.
pub const EI_DATA: usize = 5;
/// Invalid data encoding.
pub const ELFDATANONE: u8 = 0;
/// 2's complement, little endian.
pub const ELFDATA2LSB: u8 = 1;
/// 2's complement, big endian.
pub const ELFDATA2MSB: u8 = 2;

/// File version byte index.
pub const EI_VERSION: usize = 6;
/// Current ELF version.
pub const EV_CURRENT: u8 = 1;

/// OS ABI identification byte index.
pub const EI_OSABI: usize = 7;
/// ABI version byte index.
pub const EI_ABIVERSION: usize = 8;

/// UNIX System V ABI.
pub const ELFOSABI_NONE: u8 = 0;
/// HP-UX.
pub const ELFOSABI_HPUX: u8 = 1;
/// NetBSD.
pub const ELFOSABI_NETBSD: u8 = 2;
/// Object uses GNU ELF extensions.
pub const ELFOSABI_GNU: u8 = 3;
/// Sun Solaris.
pub const ELFOSABI_SOLARIS: u8 = 6;
/// IBM AIX.
pub const ELFOSABI_AIX: u8 = 7;
/// SGI Irix.
pub const ELFOSABI_IRIX: u8 = 8;
/// FreeBSD.
pub const ELFOSABI_FREEBSD: u8 = 9;
/// Compaq TRU64 UNIX.
pub const ELFOSABI_TRU64: u8 = 10;
/// Novell Modesto.
pub const ELFOSABI_MODESTO: u8 = 11;
/// OpenBSD.
pub const ELFOSABI_OPENBSD: u8 = 12;
/// ARM EABI.
pub const ELFOSABI_ARM_AEABI: u8 = 64;
/// ARM.
pub const ELFOSABI_ARM: u8 = 97;
/// PS3 lv2 OS.
pub const ELFOSABI_CELLOSLV2: u8 = 102;
/// ChromeOS Native Client.
pub const ELFOSABI_NACL: u8 = 123;
/// Standalone (embedded) application.
pub const ELFOSABI_STANDALONE: u8 = 255;

// Values for `FileHeader::e_type`.
/// No file type.
pub const ET_NONE: u16 = 0;
/// Relocatable file.
pub const ET_REL: u16 = 1;
/// Executable file.
pub const ET_EXEC: u16 = 2;
/// Shared object file.
pub const ET_DYN: u16 = 3;
/// Core file.
pub const ET_CORE: u16 = 4;
/// OS-specific range start.
pub const ET_LOOS: u16 = 0xfe00;
/// OS-specific range end.
pub const ET_HIOS: u16 = 0xfeff;
/// Processor-specific range start.
pub const ET_LOPROC: u16 = 0xff00;
/// Processor-specific range end.
pub const ET_HIPROC: u16 = 0xffff;

// Values for `FileHeader::e_machine`.
/// No machine
pub const EM_NONE: u16 = 0;
/// AT&T WE 32100
pub const EM_M32: u16 = 1;
/// SUN SPARC
pub const EM_SPARC: u16 = 2;
/// Intel 80386
pub const EM_386: u16 = 3;
/// Motorola m68k family
pub const EM_68K: u16 = 4;
/// Motorola m88k family
pub const EM_88K: u16 = 5;
/// Intel 80486, used by some legacy Linux producers
pub const EM_486: u16 = 6;
/// Intel 80860
pub const EM_860: u16 = 7;
/// MIPS R3000 big-endian
pub const EM_MIPS: u16 = 8;
/// IBM System/370
pub const EM_S370: u16 = 9;
/// MIPS R3000 little-endian
pub const EM_MIPS_RS3_LE: u16 = 10;
/// HPPA
pub const EM_PARISC: u16 = 15;
/// Sun's "v8plus"
pub const EM_SPARC32PLUS: u16 = 18;
/// Intel 80960
pub const EM_960: u16 = 19;
/// PowerPC
pub const EM_PPC: u16 = 20;
/// PowerPC 64-bit
pub const EM_PPC64: u16 = 21;
/// IBM S390
pub const EM_S390: u16 = 22;
/// Cisco 7200 Series Router (MIPS)
pub const EM_CISCO7200: u16 = 25;
/// Cisco 3620/3640 Router (MIPS)
pub const EM_CISCO3620: u16 = 30;
/// ARM
pub const EM_ARM: u16 = 40;
/// Hitachi SH
pub const EM_SH: u16 = 42;
/// SPARC v9 64-bit
pub const EM_SPARCV9: u16 = 43;
/// Intel Merced
pub const EM_IA_64: u16 = 50;
/// AMD x86-64 architecture
pub const EM_X86_64: u16 = 62;
/// Atmel AVR 8-bit microcontroller
pub const EM_AVR: u16 = 83;
/// Tensilica Xtensa Architecture
pub const EM_XTENSA: u16 = 94;
/// ARM AARCH64
pub const EM_AARCH64: u16 = 183;
/// RISC-V
pub const EM_RISCV: u16 = 243;
/// Linux BPF -- in-kernel virtual machine
pub const EM_BPF: u16 = 247;
/// LoongArch
pub const EM_LOONGARCH: u16 = 258;

// Special values for section header indices.
/// Undefined section.
pub const SHN_UNDEF: u16 = 0;
/// OS-specific range start.
///
/// Start of reserved section indices.
pub const SHN_LORESERVE: u16 = 0xff00;
/// Start of processor-specific section indices.
pub const SHN_LOPROC: u16 = 0xff00;
/// End of processor-specific section indices.
pub const SHN_HIPROC: u16 = 0xff1f;
/// Start of OS-specific section indices.
pub const SHN_LOOS: u16 = 0xff20;
/// End of OS-specific section indices.
pub const SHN_HIOS: u16 = 0xff3f;
/// Associated symbol is absolute.
pub const SHN_ABS: u16 = 0xfff1;
/// Associated symbol is common.
pub const SHN_COMMON: u16 = 0xfff2;
/// Section index is in the `SHT_SYMTAB_SHNDX` section.
pub const SHN_XINDEX: u16 = 0xffff;
/// End of reserved section indices.
pub const SHN_HIRESERVE: u16 = 0xffff;

// Values for `SectionHeader::sh_type`.
/// Section header table entry is unused.
pub const SHT_NULL: u32 = 0;
/// Program data.
pub const SHT_PROGBITS: u32 = 1;
/// Symbol table.
pub const SHT_SYMTAB: u32 = 2;
/// String table.
pub const SHT_STRTAB: u32 = 3;
/// Relocation entries with explicit addends.
pub const SHT_RELA: u32 = 4;
/// Symbol hash table.
pub const SHT_HASH: u32 = 5;
/// Dynamic linking information.
pub const SHT_DYNAMIC: u32 = 6;
/// Notes.
pub const SHT_NOTE: u32 = 7;
/// Program space with no data (bss).
pub const SHT_NOBITS: u32 = 8;
/// Relocation entries without explicit addends.
pub const SHT_REL: u32 = 9;
/// Reserved section type.
pub const SHT_SHLIB: u32 = 10;
/// Dynamic linker symbol table.
pub const SHT_DYNSYM: u32 = 11;
/// Array of constructors.
pub const SHT_INIT_ARRAY: u32 = 14;
/// Array of destructors.
pub const SHT_FINI_ARRAY: u32 = 15;
/// Array of pre-constructors.
pub const SHT_PREINIT_ARRAY: u32 = 16;
/// Section group.
pub const SHT_GROUP: u32 = 17;
/// Extended section indices for a symbol table.
pub const SHT_SYMTAB_SHNDX: u32 = 18;
/// Start of OS-specific section types.
pub const SHT_LOOS: u32 = 0x6000_0000;
/// Android packed relocation entries without explicit addends.
pub const SHT_ANDROID_REL: u32 = 0x6000_0001;
/// Android packed relocation entries with explicit addends.
pub const SHT_ANDROID_RELA: u32 = 0x6000_0002;
/// Object attributes.
pub const SHT_GNU_ATTRIBUTES: u32 = 0x6fff_fff5;
/// GNU-style hash table.
pub const SHT_GNU_HASH: u32 = 0x6fff_fff6;
/// Prelink library list
pub const SHT_GNU_LIBLIST: u32 = 0x6fff_fff7;
/// Version definition section.
pub const SHT_GNU_VERDEF: u32 = 0x6fff_fffd;
/// Version needs section.
pub const SHT_GNU_VERNEED: u32 = 0x6fff_fffe;
/// Version symbol table.
pub const SHT_GNU_VERSYM: u32 = 0x6fff_ffff;
/// End of OS-specific section types.
pub const SHT_HIOS: u32 = 0x6fff_ffff;
/// Start of processor-specific section types.
pub const SHT_LOPROC: u32 = 0x7000_0000;
/// ARM unwind section.
pub const SHT_ARM_EXIDX: u32 = 0x7000_0001;
/// ARM build attributes.
pub const SHT_ARM_ATTRIBUTES: u32 = 0x7000_0003;
/// MIPS register usage information.
pub const SHT_MIPS_REGINFO: u32 = 0x7000_0006;
/// MIPS miscellaneous options.
pub const SHT_MIPS_OPTIONS: u32 = 0x7000_000d;
/// x86-64 unwind information.
pub const SHT_X86_64_UNWIND: u32 = 0x7000_0001;
/// End of processor-specific section types.
pub const SHT_HIPROC: u32 = 0x7fff_ffff;

// Values for `SectionHeader::sh_flags`.
/// Section is writable.
pub const SHF_WRITE: u64 = 1 << 0;
/// Section occupies memory during execution.
pub const SHF_ALLOC: u64 = 1 << 1;
/// Section is executable.
pub const SHF_EXECINSTR: u64 = 1 << 2;
/// Might be merged
pub const SHF_MERGE: u64 = 1 << 4;
/// Contains nul-terminated strings.
pub const SHF_STRINGS: u64 = 1 << 5;
/// `sh_info` contains SHT index.
pub const SHF_INFO_LINK: u64 = 1 << 6;
/// Section holds thread-local storage.
pub const SHF_TLS: u64 = 1 << 10;
/// Section is compressed.
pub const SHF_COMPRESSED: u64 = 1 << 11;

// Values for `ProgramHeader::p_type`.
/// Program header table entry is unused.
pub const PT_NULL: u32 = 0;
/// Loadable program segment.
pub const PT_LOAD: u32 = 1;
/// Dynamic linking information.
pub const PT_DYNAMIC: u32 = 2;
/// Program interpreter.
pub const PT_INTERP: u32 = 3;
/// Auxiliary information.
pub const PT_NOTE: u32 = 4;
/// Reserved.
pub const PT_SHLIB: u32 = 5;
/// Segment contains the program header table.
pub const PT_PHDR: u32 = 6;
/// Thread-local storage segment.
pub const PT_TLS: u32 = 7;
/// Start of OS-specific segment types.
pub const PT_LOOS: u32 = 0x6000_0000;
/// GCC `.eh_frame_hdr` segment.
pub const PT_GNU_EH_FRAME: u32 = 0x6474_e550;
/// Indicates stack executability.
pub const PT_GNU_STACK: u32 = 0x6474_e551;
/// Read-only after relocation.
pub const PT_GNU_RELRO: u32 = 0x6474_e552;
/// Segment containing `.note.gnu.property` section.
pub const PT_GNU_PROPERTY: u32 = 0x6474_e553;
/// PaX flags.
pub const PT_PAX_FLAGS: u32 = 0x6504_1580;
/// End of OS-specific segment types.
pub const PT_HIOS: u32 = 0x6fff_ffff;
/// Start of processor-specific segment types.
pub const PT_LOPROC: u32 = 0x7000_0000;
/// ARM unwind segment.
pub const PT_ARM_EXIDX: u32 = 0x7000_0001;
/// MIPS register usage information.
pub const PT_MIPS_REGINFO: u32 = 0x7000_0000;
/// MIPS ABI flags.
pub const PT_MIPS_ABIFLAGS: u32 = 0x7000_0003;
/// End of processor-specific segment types.
pub const PT_HIPROC: u32 = 0x7fff_ffff;

// Values for `ProgramHeader::p_flags`.
/// Segment is executable.
pub const PF_X: u32 = 1 << 0;
/// Segment is writable.
pub const PF_W: u32 = 1 << 1;
/// Segment is readable.
pub const PF_R: u32 = 1 << 2;

// Values for `Dyn::d_tag`.
/// Marks end of dynamic section
pub const DT_NULL: i64 = 0;
/// Name of needed library
pub const DT_NEEDED: i64 = 1;
/// Size in bytes of PLT relocs
pub const DT_PLTRELSZ: i64 = 2;
/// Processor defined value
pub const DT_PLTGOT: i64 = 3;
/// Address of symbol hash table
pub const DT_HASH: i64 = 4;
/// Address of string table
pub const DT_STRTAB: i64 = 5;
/// Address of symbol table
pub const DT_SYMTAB: i64 = 6;
/// Address of Rela relocs
pub const DT_RELA: i64 = 7;
/// Total size of Rela relocs
pub const DT_RELASZ: i64 = 8;
/// Size of one Rela reloc
pub const DT_RELAENT: i64 = 9;
/// Size of string table
pub const DT_STRSZ: i64 = 10;
/// Size of one symbol table entry
pub const DT_SYMENT: i64 = 11;
/// Address of init function
pub const DT_INIT: i64 = 12;
/// Address of termination function
pub const DT_FINI: i64 = 13;
/// Name of shared object
pub const DT_SONAME: i64 = 14;
/// Library search path (deprecated)
pub const DT_RPATH: i64 = 15;
/// Start symbol search here
pub const DT_SYMBOLIC: i64 = 16;
/// Address of Rel relocs
pub const DT_REL: i64 = 17;
/// Total size of Rel relocs
pub const DT_RELSZ: i64 = 18;
/// Size of one Rel reloc
pub const DT_RELENT: i64 = 19;
/// Type of reloc in PLT
pub const DT_PLTREL: i64 = 20;
/// For debugging; unspecified
pub const DT_DEBUG: i64 = 21;
/// Reloc might modify .text
pub const DT_TEXTREL: i64 = 22;
/// Address of PLT relocs
pub const DT_JMPREL: i64 = 23;
/// Process relocations of object
pub const DT_BIND_NOW: i64 = 24;
/// Array with addresses of init fct
pub const DT_INIT_ARRAY: i64 = 25;
/// Array with addresses of fini fct
pub const DT_FINI_ARRAY: i64 = 26;
/// Size in bytes of DT_INIT_ARRAY
pub const DT_INIT_ARRAYSZ: i64 = 27;
/// Size in bytes of DT_FINI_ARRAY
pub const DT_FINI_ARRAYSZ: i64 = 28;
/// Library search path
pub const DT_RUNPATH: i64 = 29;
/// Flags for the object being loaded
pub const DT_FLAGS: i64 = 30;
/// Array with addresses of preinit fct
pub const DT_PREINIT_ARRAY: i64 = 32;
/// size in bytes of DT_PREINIT_ARRAY
pub const DT_PREINIT_ARRAYSZ: i64 = 33;
/// Address of SYMTAB_SHNDX section
pub const DT_SYMTAB_SHNDX: i64 = 34;
/// Start of OS-specific
pub const DT_LOOS: i64 = 0x6000_000d;
/// Android packed relocations without addends (ARM only).
pub const DT_ANDROID_REL: i64 = 0x6000_000f;
/// Size of the Android packed relocations without addends.
pub const DT_ANDROID_RELSZ: i64 = 0x6000_0010;
/// Android packed relocations with addends (ARM only).
pub const DT_ANDROID_RELA: i64 = 0x6000_0011;
/// Size of the Android packed relocations with addends.
pub const DT_ANDROID_RELASZ: i64 = 0x6000_0012;
/// End of OS-specific
pub const DT_HIOS: i64 = 0x6fff_f000;
/// Prelinking timestamp
pub const DT_GNU_PRELINKED: i64 = 0x6fff_fdf5;
/// Size of conflict section
pub const DT_GNU_CONFLICTSZ: i64 = 0x6fff_fdf6;
/// Size of library list
pub const DT_GNU_LIBLISTSZ: i64 = 0x6fff_fdf7;
pub const DT_CHECKSUM: i64 = 0x6fff_fdf8;
pub const DT_PLTPADSZ: i64 = 0x6fff_fdf9;
pub const DT_MOVEENT: i64 = 0x6fff_fdfa;
pub const DT_MOVESZ: i64 = 0x6fff_fdfb;
/// Feature selection (DTF_*).
pub const DT_FEATURE_1: i64 = 0x6fff_fdfc;
/// Flags for DT_* entries, effecting the following DT_* entry.
pub const DT_POSFLAG_1: i64 = 0x6fff_fdfd;
/// Size of syminfo table (in bytes)
pub const DT_SYMINSZ: i64 = 0x6fff_fdfe;
/// Entry size of syminfo
pub const DT_SYMINENT: i64 = 0x6fff_fdff;
/// GNU-style hash table.
pub const DT_GNU_HASH: i64 = 0x6fff_fef5;
pub const DT_TLSDESC_PLT: i64 = 0x6fff_fef6;
pub const DT_TLSDESC_GOT: i64 = 0x6fff_fef7;
/// Start of conflict section
pub const DT_GNU_CONFLICT: i64 = 0x6fff_fef8;
/// Library list
pub const DT_GNU_LIBLIST: i64 = 0x6fff_fef9;
/// Configuration information.
pub const DT_CONFIG: i64 = 0x6fff_fefa;
/// Dependency auditing.
pub const DT_DEPAUDIT: i64 = 0x6fff_fefb;
/// Object auditing.
pub const DT_AUDIT: i64 = 0x6fff_fefc;
/// PLT padding.
pub const DT_PLTPAD: i64 = 0x6fff_fefd;
/// Move table.
pub const DT_MOVETAB: i64 = 0x6fff_fefe;
/// Syminfo table.
pub const DT_SYMINFO: i64 = 0x6fff_feff;
pub const DT_VERSYM: i64 = 0x6fff_fff0;
pub const DT_RELACOUNT: i64 = 0x6fff_fff9;
pub const DT_RELCOUNT: i64 = 0x6fff_fffa;
/// State flags, see DF_1_* below.
pub const DT_FLAGS_1: i64 = 0x6fff_fffb;
/// Address of version definition table
pub const DT_VERDEF: i64 = 0x6fff_fffc;
/// Number of version definitions
pub const DT_VERDEFNUM: i64 = 0x6fff_fffd;
/// Address of table with needed versions
pub const DT_VERNEED: i64 = 0x6fff_fffe;
/// Number of needed versions
pub const DT_VERNEEDNUM: i64 = 0x6fff_ffff;
/// Shared object to load before self
pub const DT_AUXILIARY: i64 = 0x7fff_fffd;
pub const DT_USED: i64 = 0x7fff_fffe;
/// Shared object to get values from
pub const DT_FILTER: i64 = 0x7fff_ffff;
/// Start of processor-specific
pub const DT_LOPROC: i64 = 0x7000_0000;
/// End of processor-specific
pub const DT_HIPROC: i64 = 0x7fff_ffff;

// Values for `st_info` binding.
/// Local symbol.
pub const STB_LOCAL: u8 = 0;
/// Global symbol.
pub const STB_GLOBAL: u8 = 1;
/// Weak symbol.
pub const STB_WEAK: u8 = 2;
/// Start of OS-specific symbol binding.
pub const STB_LOOS: u8 = 10;
/// Unique symbol.
pub const STB_GNU_UNIQUE: u8 = 10;
/// End of OS-specific symbol binding.
pub const STB_HIOS: u8 = 12;
/// Start of processor-specific symbol binding.
pub const STB_LOPROC: u8 = 13;
/// End of processor-specific symbol binding.
pub const STB_HIPROC: u8 = 15;
/// Sentinel for a binding that was out of the legal range.
///
/// This value never appears in a file.
pub const STB_INVALID: u8 = 254;

// Values for `st_info` type.
/// Symbol type is unspecified.
pub const STT_NOTYPE: u8 = 0;
/// Symbol is a data object.
pub const STT_OBJECT: u8 = 1;
/// Symbol is a code object.
pub const STT_FUNC: u8 = 2;
/// Symbol is associated with a section.
pub const STT_SECTION: u8 = 3;
/// Symbol's name is a file name.
pub const STT_FILE: u8 = 4;
/// Symbol is a common data object.
pub const STT_COMMON: u8 = 5;
/// Symbol is a thread-local storage object.
pub const STT_TLS: u8 = 6;
/// Symbol is an indirect code object.
pub const STT_GNU_IFUNC: u8 = 10;
/// Start of processor-specific symbol types.
pub const STT_LOPROC: u8 = 13;
/// A Thumb function.
pub const STT_ARM_TFUNC: u8 = 13;
/// A Thumb label.
pub const STT_ARM_16BIT: u8 = 15;
/// End of processor-specific symbol types.
pub const STT_HIPROC: u8 = 15;

// Values for `Verdef::vd_flags`.
/// Version definition of file itself
pub const VER_FLG_BASE: u16 = 0x1;
/// Weak version identifier
pub const VER_FLG_WEAK: u16 = 0x2;

// Special values for the version index.
/// Symbol is local.
pub const VER_NDX_LOCAL: u16 = 0;
/// Symbol is global.
pub const VER_NDX_GLOBAL: u16 = 1;
/// Hidden bit of a `Vernaux::vna_other` or versym entry.
pub const VERSYM_HIDDEN: u16 = 0x8000;

// Note types.
/// GNU ABI tag.
pub const NT_GNU_ABI_TAG: u32 = 1;
/// Synthetic hwcap information.
pub const NT_GNU_HWCAP: u32 = 2;
/// Build ID bits as generated by `ld --build-id`.
pub const NT_GNU_BUILD_ID: u32 = 3;
/// Version note generated by GNU gold containing a version string.
pub const NT_GNU_GOLD_VERSION: u32 = 4;
/// Program property.
pub const NT_GNU_PROPERTY_TYPE_0: u32 = 5;
/// Name of the owner of GNU notes.
pub const ELF_NOTE_GNU: &[u8] = b"GNU";

// MIPS values for `FileHeader::e_flags`.
/// The ABI of the file.
pub const EF_MIPS_ABI: u32 = 0x0000_f000;
/// O32 extended to work on 64 bit architectures.
pub const E_MIPS_ABI_O64: u32 = 0x0000_2000;

/// The page size assumed when computing the image base.
pub const ELF_PAGE_SIZE: u64 = 0x1000;

// DWARF call frame instruction opcodes.
/// High 2 bits: advance location by the 6-bit operand.
pub const DW_CFA_advance_loc: u8 = 0x40;
/// High 2 bits: register in the low 6 bits saved at offset.
pub const DW_CFA_offset: u8 = 0x80;
/// High 2 bits: restore the register in the low 6 bits.
pub const DW_CFA_restore: u8 = 0xc0;
pub const DW_CFA_nop: u8 = 0x00;
pub const DW_CFA_set_loc: u8 = 0x01;
pub const DW_CFA_advance_loc1: u8 = 0x02;
pub const DW_CFA_advance_loc2: u8 = 0x03;
pub const DW_CFA_advance_loc4: u8 = 0x04;
pub const DW_CFA_offset_extended: u8 = 0x05;
pub const DW_CFA_restore_extended: u8 = 0x06;
pub const DW_CFA_undefined: u8 = 0x07;
pub const DW_CFA_same_value: u8 = 0x08;
pub const DW_CFA_register: u8 = 0x09;
pub const DW_CFA_remember_state: u8 = 0x0a;
pub const DW_CFA_restore_state: u8 = 0x0b;
pub const DW_CFA_def_cfa: u8 = 0x0c;
pub const DW_CFA_def_cfa_register: u8 = 0x0d;
pub const DW_CFA_def_cfa_offset: u8 = 0x0e;
pub const DW_CFA_def_cfa_expression: u8 = 0x0f;
pub const DW_CFA_expression: u8 = 0x10;
pub const DW_CFA_offset_extended_sf: u8 = 0x11;
pub const DW_CFA_def_cfa_sf: u8 = 0x12;
pub const DW_CFA_def_cfa_offset_sf: u8 = 0x13;
pub const DW_CFA_val_offset: u8 = 0x14;
pub const DW_CFA_val_offset_sf: u8 = 0x15;
pub const DW_CFA_val_expression: u8 = 0x16;
pub const DW_CFA_lo_user: u8 = 0x1c;
pub const DW_CFA_GNU_args_size: u8 = 0x2e;
pub const DW_CFA_GNU_negative_offset_extended: u8 = 0x2f;
pub const DW_CFA_hi_user: u8 = 0x3f;

// `.eh_frame` pointer encodings.
/// A pointer of the address size.
pub const DW_EH_PE_absptr: u8 = 0x00;
pub const DW_EH_PE_uleb128: u8 = 0x01;
pub const DW_EH_PE_udata2: u8 = 0x02;
pub const DW_EH_PE_udata4: u8 = 0x03;
pub const DW_EH_PE_udata8: u8 = 0x04;
pub const DW_EH_PE_sleb128: u8 = 0x09;
pub const DW_EH_PE_sdata2: u8 = 0x0a;
pub const DW_EH_PE_sdata4: u8 = 0x0b;
pub const DW_EH_PE_sdata8: u8 = 0x0c;
/// Relative to the address of the encoded value.
pub const DW_EH_PE_pcrel: u8 = 0x10;
pub const DW_EH_PE_textrel: u8 = 0x20;
pub const DW_EH_PE_datarel: u8 = 0x30;
pub const DW_EH_PE_funcrel: u8 = 0x40;
pub const DW_EH_PE_aligned: u8 = 0x50;
/// The value is the address of the pointer.
pub const DW_EH_PE_indirect: u8 = 0x80;
/// No value is present.
pub const DW_EH_PE_omit: u8 = 0xff;

/// The identification bytes at the start of an ELF file.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Ident {
    /// Magic number. Must be `ELFMAG`.
    pub magic: [u8; 4],
    /// File class. One of the `ELFCLASS*` values.
    pub class: u8,
    /// Data encoding. One of the `ELFDATA*` values.
    pub data: u8,
    /// ELF version. Must be `EV_CURRENT`.
    pub version: u8,
    /// OS ABI identification. One of the `ELFOSABI*` values.
    pub os_abi: u8,
    /// ABI version.
    pub abi_version: u8,
    /// Padding bytes.
    pub padding: [u8; 7],
}

impl Ident {
    /// Parse the identification from the first `EI_NIDENT` bytes of a file.
    pub fn parse(bytes: [u8; EI_NIDENT]) -> Self {
        let mut magic = [0; 4];
        magic.copy_from_slice(&bytes[..4]);
        let mut padding = [0; 7];
        padding.copy_from_slice(&bytes[9..]);
        Ident {
            magic,
            class: bytes[EI_CLASS],
            data: bytes[EI_DATA],
            version: bytes[EI_VERSION],
            os_abi: bytes[EI_OSABI],
            abi_version: bytes[EI_ABIVERSION],
            padding,
        }
    }

    /// Return true if the class and data encoding have legal values.
    pub fn is_valid(&self) -> bool {
        self.magic == ELFMAG
            && (self.class == ELFCLASS32 || self.class == ELFCLASS64)
            && (self.data == ELFDATA2LSB || self.data == ELFDATA2MSB)
    }

    /// Return true if the declared class is `ELFCLASS64`.
    #[inline]
    pub fn is_64(&self) -> bool {
        self.class == ELFCLASS64
    }

    /// Return true if the declared data encoding is big endian.
    #[inline]
    pub fn is_msb(&self) -> bool {
        self.data == ELFDATA2MSB
    }
}

/// The ELF file header.
///
/// `real_shnum` and `real_shstrndx` are not part of the file format. They hold
/// the section count and section name string table index after resolving the
/// escapes that store large values in section 0.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    pub e_type: u16,
    pub e_machine: u16,
    pub e_version: u32,
    pub e_entry: u64,
    pub e_phoff: u64,
    pub e_shoff: u64,
    pub e_flags: u32,
    pub e_ehsize: u16,
    pub e_phentsize: u16,
    pub e_phnum: u16,
    pub e_shentsize: u16,
    pub e_shnum: u16,
    pub e_shstrndx: u16,
    /// The number of section headers, taking `sh_size` of section 0 into account.
    pub real_shnum: u64,
    /// The section name string table index, taking `sh_link` of section 0 into account.
    pub real_shstrndx: u32,
}

impl FileHeader {
    /// Return true if the file has a program header table.
    #[inline]
    pub fn has_pht(&self) -> bool {
        self.e_phoff != 0
    }

    /// Return true if the file has a section header table.
    #[inline]
    pub fn has_sht(&self) -> bool {
        self.e_shoff != 0
    }

    /// Forget the program header table.
    pub fn set_no_pht(&mut self) {
        self.e_phoff = 0;
        self.e_phnum = 0;
    }

    /// Forget the section header table.
    pub fn set_no_sht(&mut self) {
        self.e_shoff = 0;
        self.e_shnum = 0;
        self.real_shnum = 0;
        self.real_shstrndx = 0;
    }

    /// Return true for `ET_EXEC` and `ET_DYN` files.
    #[inline]
    pub fn is_exec_or_dyn(&self) -> bool {
        self.e_type == ET_EXEC || self.e_type == ET_DYN
    }
}

/// A section header.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SectionHeader {
    pub sh_name: u32,
    pub sh_type: u32,
    pub sh_flags: u64,
    pub sh_addr: u64,
    pub sh_offset: u64,
    pub sh_size: u64,
    pub sh_link: u32,
    pub sh_info: u32,
    pub sh_addralign: u64,
    pub sh_entsize: u64,
}

/// A program header.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ProgramHeader {
    pub p_type: u32,
    pub p_flags: u32,
    pub p_offset: u64,
    pub p_vaddr: u64,
    pub p_paddr: u64,
    pub p_filesz: u64,
    pub p_memsz: u64,
    pub p_align: u64,
}

/// A symbol table entry.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Sym {
    pub st_name: u32,
    pub st_info: u8,
    pub st_other: u8,
    pub st_shndx: u16,
    pub st_value: u64,
    pub st_size: u64,
}

impl Sym {
    /// Get the binding from `st_info`.
    #[inline]
    pub fn st_bind(&self) -> u8 {
        st_bind(self.st_info)
    }

    /// Get the type from `st_info`.
    #[inline]
    pub fn st_type(&self) -> u8 {
        st_type(self.st_info)
    }
}

/// Get the binding from `st_info`.
#[inline]
pub fn st_bind(info: u8) -> u8 {
    info >> 4
}

/// Get the type from `st_info`.
#[inline]
pub fn st_type(info: u8) -> u8 {
    info & 0xf
}

/// Set `st_info` from a binding and type.
#[inline]
pub fn st_info(bind: u8, typ: u8) -> u8 {
    (bind << 4) | (typ & 0xf)
}

/// A relocation without an explicit addend.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Rel {
    pub r_offset: u64,
    pub r_info: u64,
}

/// A relocation with an explicit addend.
///
/// `Rel` entries are promoted to this form with a zero addend.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Rela {
    pub r_offset: u64,
    pub r_info: u64,
    pub r_addend: i64,
}

impl From<Rel> for Rela {
    fn from(rel: Rel) -> Rela {
        Rela {
            r_offset: rel.r_offset,
            r_info: rel.r_info,
            r_addend: 0,
        }
    }
}

/// Calculate `r_info` for a 32-bit relocation.
#[inline]
pub fn r_info32(sym: u32, r_type: u8) -> u32 {
    (sym << 8) | u32::from(r_type)
}

/// Calculate `r_info` for a 64-bit relocation.
#[inline]
pub fn r_info64(sym: u32, r_type: u32) -> u64 {
    (u64::from(sym) << 32) | u64::from(r_type)
}

/// Version definition entry, in `SHT_GNU_VERDEF`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Verdef {
    pub vd_version: u16,
    pub vd_flags: u16,
    pub vd_ndx: u16,
    /// Number of `Verdaux` entries.
    pub vd_cnt: u16,
    pub vd_hash: u32,
    /// Offset in bytes to the first `Verdaux` entry.
    pub vd_aux: u32,
    /// Offset in bytes to the next `Verdef` entry.
    pub vd_next: u32,
}

/// Auxiliary version definition entry.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Verdaux {
    /// Offset of the name in the linked string table.
    pub vda_name: u32,
    /// Offset in bytes to the next `Verdaux` entry.
    pub vda_next: u32,
}

/// Version requirement entry, in `SHT_GNU_VERNEED`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Verneed {
    pub vn_version: u16,
    /// Number of `Vernaux` entries.
    pub vn_cnt: u16,
    /// Offset of the file name in the linked string table.
    pub vn_file: u32,
    /// Offset in bytes to the first `Vernaux` entry.
    pub vn_aux: u32,
    /// Offset in bytes to the next `Verneed` entry.
    pub vn_next: u32,
}

/// Auxiliary version requirement entry.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Vernaux {
    pub vna_hash: u32,
    pub vna_flags: u16,
    /// The version index used in `SHT_GNU_VERSYM`.
    pub vna_other: u16,
    /// Offset of the version name in the linked string table.
    pub vna_name: u32,
    /// Offset in bytes to the next `Vernaux` entry.
    pub vna_next: u32,
}

/// A dynamic section entry.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Dyn {
    pub d_tag: i64,
    pub d_val: u64,
}

/// Return true if the value of the dynamic tag is an offset into the
/// dynamic string table.
pub fn tag_is_string(tag: i64) -> bool {
    match tag {
        DT_NEEDED | DT_SONAME | DT_RPATH | DT_RUNPATH | DT_AUXILIARY | DT_FILTER | DT_CONFIG
        | DT_DEPAUDIT | DT_AUDIT => true,
        _ => false,
    }
}

/// The on-disk sizes of the fixed-size structures for one file class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StructSizes {
    pub ehdr: u16,
    pub phdr: u16,
    pub shdr: u16,
    pub sym: u16,
    pub dyn_: u16,
    pub rel: u16,
    pub rela: u16,
    /// Size of an address, offset, `xword` or `sxword` field.
    pub word: u8,
}

impl StructSizes {
    /// The sizes for ELF32.
    pub const ELF32: StructSizes = StructSizes {
        ehdr: 52,
        phdr: 32,
        shdr: 40,
        sym: 16,
        dyn_: 8,
        rel: 8,
        rela: 12,
        word: 4,
    };

    /// The sizes for ELF64.
    pub const ELF64: StructSizes = StructSizes {
        ehdr: 64,
        phdr: 56,
        shdr: 64,
        sym: 24,
        dyn_: 16,
        rel: 16,
        rela: 24,
        word: 8,
    };

    /// Select the sizes for a class.
    #[inline]
    pub fn new(is_64: bool) -> Self {
        if is_64 {
            Self::ELF64
        } else {
            Self::ELF32
        }
    }
}
