use std::io::{Read, Seek};

use elfread::elf::*;
use elfread::read::elf::{
    DynamicInfo, DynamicKind, EhFrame, Notes, Reader, SliceKind, Symbol, SymbolCache,
    SymbolVersions, WellKnownSection,
};

use super::*;

pub(super) fn print_elf<R: Read + Seek>(p: &mut Printer<'_>, reader: &mut Reader<R>) {
    if reader.read_ident().print_err(p).is_none() {
        return;
    }
    if reader.read_header().print_err(p).is_none() {
        return;
    }
    p.field(
        "Format",
        format!(
            "ELF {}-bit {}",
            if reader.is_64() { 64 } else { 32 },
            if reader.is_msb() { "big endian" } else { "little endian" }
        ),
    );
    if p.options.file {
        print_ident(p, reader.ident());
        print_file_header(p, reader.header());
    }

    // Either table may be missing. The other one is still useful.
    let has_segments = reader.read_program_headers().print_err(p).unwrap_or(false);
    let has_sections = reader.read_section_headers().print_err(p).unwrap_or(false);
    if !has_segments && !has_sections {
        return;
    }

    if p.options.segments {
        print_program_headers(p, reader);
    }
    if p.options.sections {
        print_section_headers(p, reader);
    }

    let dynamic = reader.read_dynamic_info().print_err(p).flatten();
    let mut cache = SymbolCache::new();
    reader.load_symbols(&mut cache, SliceKind::Symtab).print_err(p);
    if reader.sections().well_known(WellKnownSection::Dynsym).is_some() {
        reader.load_symbols(&mut cache, SliceKind::Dynsym).print_err(p);
    } else if let Some((_, info)) = &dynamic {
        reader.load_dynamic_symbols(&mut cache, info).print_err(p);
    }
    let info = dynamic.as_ref().map(|(_, info)| info);
    let versions = reader
        .read_symbol_versions(&cache, info, !has_sections)
        .print_err(p)
        .unwrap_or_default();

    if p.options.symbols {
        print_symbols(p, &cache, SliceKind::Symtab, None);
    }
    if p.options.dynamic_symbols {
        print_symbols(p, &cache, SliceKind::Dynsym, Some(&versions));
    }
    if p.options.relocations {
        print_relocations(p, reader, &cache);
    }
    if let Some((tags, info)) = &dynamic {
        if p.options.dynamic {
            print_dynamic(p, reader, tags);
        }
        if p.options.dynamic_relocations {
            print_dynamic_relocations(p, reader, &cache, info);
        }
    }
    if p.options.versions {
        print_versions(p, &versions);
    }
    if p.options.notes {
        if let Some(notes) = reader.read_notes().print_err(p) {
            print_notes(p, &notes);
        }
        if let Some(Some(link)) = reader.read_gnu_debuglink().print_err(p) {
            p.group("GnuDebugLink", |p| {
                p.field_inline_string("Name", link.name.as_bytes());
                p.field_hex("Crc", link.crc);
            });
        }
        if let Some(Some(base)) = reader.read_prelink_base().print_err(p) {
            p.field_hex("PrelinkBase", base);
        }
    }
    if p.options.eh_frame {
        if let Some(Some(frame)) = reader.read_eh_frame().print_err(p) {
            print_eh_frame(p, &frame);
        }
    }
}

fn print_ident(p: &mut Printer<'_>, ident: &Ident) {
    p.group("Ident", |p| {
        p.field_bytes("Magic", &ident.magic);
        p.field_enum("Class", ident.class, FLAGS_EI_CLASS);
        p.field_enum("Data", ident.data, FLAGS_EI_DATA);
        p.field_enum("Version", ident.version, FLAGS_EV);
        p.field_enum("OsAbi", ident.os_abi, FLAGS_EI_OSABI);
        p.field_hex("AbiVersion", ident.abi_version);
        p.field_bytes("Unused", &ident.padding);
    });
}

fn print_file_header(p: &mut Printer<'_>, header: &FileHeader) {
    p.group("FileHeader", |p| {
        p.field_enum("Type", header.e_type, FLAGS_ET);
        p.field_enum("Machine", header.e_machine, FLAGS_EM);
        p.field_hex("Version", header.e_version);
        p.field_hex("Entry", header.e_entry);
        p.field_hex("ProgramHeaderOffset", header.e_phoff);
        p.field_hex("SectionHeaderOffset", header.e_shoff);
        p.field_hex("Flags", header.e_flags);
        p.field_hex("HeaderSize", header.e_ehsize);
        p.field_hex("ProgramHeaderEntrySize", header.e_phentsize);
        p.field("ProgramHeaderCount", header.e_phnum);
        p.field_hex("SectionHeaderEntrySize", header.e_shentsize);
        p.field("SectionHeaderCount", header.real_shnum);
        p.field("SectionHeaderStringTableIndex", header.real_shstrndx);
    });
}

fn print_program_headers<R: Read + Seek>(p: &mut Printer<'_>, reader: &mut Reader<R>) {
    let machine = reader.header().e_machine;
    let segments: Vec<ProgramHeader> = reader.segments().iter().copied().collect();
    for segment in &segments {
        p.group("ProgramHeader", |p| {
            let proc = match machine {
                EM_ARM => FLAGS_PT_ARM,
                EM_MIPS => FLAGS_PT_MIPS,
                _ => &[],
            };
            p.field_enums("Type", segment.p_type, &[FLAGS_PT, proc]);
            p.field_hex("Offset", segment.p_offset);
            p.field_hex("VirtualAddress", segment.p_vaddr);
            p.field_hex("PhysicalAddress", segment.p_paddr);
            p.field_hex("FileSize", segment.p_filesz);
            p.field_hex("MemorySize", segment.p_memsz);
            p.field_hex("Flags", segment.p_flags);
            p.flags(segment.p_flags, FLAGS_PF);
            p.field_hex("Align", segment.p_align);
            if segment.p_type == PT_INTERP {
                if let Some(data) = reader.read_segment_contents(segment).print_err(p) {
                    let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
                    p.field_inline_string("Interpreter", &data[..end]);
                }
            }
        });
    }
    if let Some(base) = reader.segments().image_base() {
        p.field_hex("ImageBase", base);
    }
}

fn print_section_headers<R: Read + Seek>(p: &mut Printer<'_>, reader: &Reader<R>) {
    let machine = reader.header().e_machine;
    let sections = reader.sections();
    for (index, section) in sections.iter().enumerate() {
        p.group("SectionHeader", |p| {
            p.field("Index", index);
            p.field_string_option("Name", section.sh_name, sections.name(index as u32));
            let proc = match machine {
                EM_ARM => FLAGS_SHT_ARM,
                EM_MIPS => FLAGS_SHT_MIPS,
                EM_X86_64 => FLAGS_SHT_X86_64,
                _ => &[],
            };
            p.field_enums("Type", section.sh_type, &[FLAGS_SHT, proc]);
            p.field_hex("Flags", section.sh_flags);
            p.flags(section.sh_flags, FLAGS_SHF);
            p.field_hex("Address", section.sh_addr);
            p.field_hex("Offset", section.sh_offset);
            p.field_hex("Size", section.sh_size);
            p.field("Link", section.sh_link);
            p.field("Info", section.sh_info);
            p.field_hex("AddressAlign", section.sh_addralign);
            p.field_hex("EntrySize", section.sh_entsize);
        });
    }
}

fn print_symbols(
    p: &mut Printer<'_>,
    cache: &SymbolCache,
    kind: SliceKind,
    versions: Option<&SymbolVersions>,
) {
    if cache.slice_len(kind) == 0 {
        return;
    }
    let name = match kind {
        SliceKind::Symtab => "SymbolTable",
        SliceKind::Dynsym => "DynamicSymbolTable",
    };
    p.group(name, |p| {
        for (index, symbol) in cache.iter(kind) {
            p.group("Symbol", |p| {
                p.field("Index", index.index);
                print_symbol(p, symbol);
                if let Some((file, version)) =
                    versions.and_then(|v| v.version_of(index.index as usize))
                {
                    p.field_inline_string("Version", version.as_bytes());
                    if let Some(file) = file {
                        p.field_inline_string("VersionFile", file.as_bytes());
                    }
                }
            });
        }
    });
}

fn print_symbol(p: &mut Printer<'_>, symbol: &Symbol) {
    p.field_inline_string("Name", symbol.name.as_bytes());
    p.field_hex("Value", symbol.value);
    p.field_hex("Size", symbol.size);
    p.field_enums("Type", symbol.symbol_type, &[FLAGS_STT, FLAGS_STT_ARM]);
    p.field_enum("Bind", symbol.binding, FLAGS_STB);
    p.field_hex("Other", symbol.original.st_other);
    if symbol.defined_in_special_section() {
        p.field_enum("SectionIndex", symbol.original.st_shndx, FLAGS_SHN);
    } else {
        p.field("SectionIndex", symbol.section);
    }
    if symbol.is_thumb_function() {
        p.field("Thumb", "yes");
    }
}

fn print_relocations<R: Read + Seek>(
    p: &mut Printer<'_>,
    reader: &mut Reader<R>,
    cache: &SymbolCache,
) {
    let dynsym = reader.sections().index_of(WellKnownSection::Dynsym);
    let sections: Vec<(u32, SectionHeader, String)> = reader
        .sections()
        .iter()
        .enumerate()
        .filter(|(_, section)| {
            matches!(
                section.sh_type,
                SHT_REL | SHT_RELA | SHT_ANDROID_REL | SHT_ANDROID_RELA
            )
        })
        .map(|(index, section)| {
            let name = reader.sections().name(index as u32).unwrap_or_default();
            (index as u32, *section, name.to_string())
        })
        .collect();
    for (index, section, name) in sections {
        let kind = if dynsym != 0 && section.sh_link == dynsym {
            SliceKind::Dynsym
        } else {
            SliceKind::Symtab
        };
        let relocations = reader.read_relocations(&section).print_err(p);
        p.group("Relocations", |p| {
            p.field("Section", index);
            p.field_inline_string("Name", name.as_bytes());
            for rela in relocations.iter().flatten() {
                print_relocation(p, reader, cache, kind, rela);
            }
        });
    }
}

fn print_dynamic_relocations<R: Read + Seek>(
    p: &mut Printer<'_>,
    reader: &mut Reader<R>,
    cache: &SymbolCache,
    info: &DynamicInfo,
) {
    for &kind in &DynamicKind::ALL {
        let relocations = match reader.dynamic_relocations(info, kind) {
            Some(mut stream) => stream.collect_rela(),
            None => continue,
        };
        if let Some(relocations) = relocations.print_err(p) {
            p.group("DynamicRelocations", |p| {
                p.field_debug("Kind", kind);
                for rela in &relocations {
                    print_relocation(p, reader, cache, SliceKind::Dynsym, rela);
                }
            });
        }
    }
}

fn print_relocation<R: Read + Seek>(
    p: &mut Printer<'_>,
    reader: &Reader<R>,
    cache: &SymbolCache,
    kind: SliceKind,
    rela: &Rela,
) {
    p.group("Relocation", |p| {
        p.field_hex("Offset", rela.r_offset);
        p.field_hex("Type", reader.r_type(rela));
        let sym = reader.r_sym(rela);
        let name = cache
            .get(kind, sym)
            .filter(|_| sym != 0)
            .map(|symbol| symbol.name.as_str());
        p.field_string_option("Symbol", sym, name);
        p.field_hex("Addend", rela.r_addend);
    });
}

fn print_dynamic<R: Read + Seek>(p: &mut Printer<'_>, reader: &mut Reader<R>, tags: &[Dyn]) {
    for tag in tags {
        p.group("Dynamic", |p| {
            p.field_enum("Tag", tag.d_tag, FLAGS_DT);
            let name = reader.dynamic_string(tag.d_tag, tag.d_val);
            p.field_string_option("Value", tag.d_val, name.as_deref());
        });
    }
}

fn print_versions(p: &mut Printer<'_>, versions: &SymbolVersions) {
    let version_name = |index: usize| {
        versions
            .version_names
            .get(index)
            .map(String::as_bytes)
            .unwrap_or_default()
    };
    for def in &versions.defs {
        p.group("VersionDefinition", |p| {
            p.field_hex("Offset", def.offset);
            p.field_hex("Flags", def.flags);
            p.flags(def.flags, FLAGS_VER_FLG);
            p.field("Index", def.index);
            for &(offset, name) in &def.names {
                p.group("Name", |p| {
                    p.field_hex("Offset", offset);
                    p.field_inline_string("Name", version_name(name));
                });
            }
        });
    }
    for req in &versions.reqs {
        p.group("VersionRequirement", |p| {
            p.field_hex("Offset", req.offset);
            let file = versions.file_names.get(req.file).map(String::as_bytes);
            p.field_inline_string("File", file.unwrap_or_default());
            for version in &req.versions {
                p.group("Version", |p| {
                    p.field_hex("Offset", version.offset);
                    p.field_inline_string("Name", version_name(version.name));
                    p.field("Index", version.other);
                });
            }
        });
    }
}

fn print_notes(p: &mut Printer<'_>, notes: &Notes) {
    for note in notes.iter() {
        p.group("Note", |p| {
            p.field_inline_string("Name", note.name_lossy().as_bytes());
            if note.is_gnu() {
                p.field_enum("Type", note.n_type, FLAGS_NT_GNU);
            } else {
                p.field_hex("Type", note.n_type);
            }
            p.field_bytes("Desc", &note.desc);
        });
    }
    if let Some(build_id) = notes.build_id() {
        p.field("BuildId", build_id);
    }
}

fn print_eh_frame(p: &mut Printer<'_>, frame: &EhFrame) {
    for cie in &frame.cies {
        p.group("Cie", |p| {
            p.field_hex("Offset", cie.offset);
            p.field_hex("Length", cie.length);
            p.field("Version", cie.version);
            p.field_inline_string("Augmentation", cie.augmentation.as_bytes());
            p.field("CodeAlignmentFactor", cie.code_alignment_factor);
            p.field("DataAlignmentFactor", cie.data_alignment_factor);
            p.field("ReturnAddressRegister", cie.return_address_register);
            if !cie.augmentation_data.is_empty() {
                p.field_bytes("AugmentationData", &cie.augmentation_data);
            }
            if !cie.augmentation.is_empty() {
                p.field_hex("FdeEncoding", cie.fde_encoding);
            }
            if let Some(encoding) = cie.lsda_encoding {
                p.field_hex("LsdaEncoding", encoding);
            }
            if let Some(personality) = cie.personality {
                p.field_hex("Personality", personality);
            }
            if cie.signal_frame {
                p.field("SignalFrame", true);
            }
            for instruction in &cie.instructions {
                p.field_debug("Instruction", instruction);
            }
        });
    }
    for fde in &frame.fdes {
        p.group("Fde", |p| {
            p.field_hex("Offset", fde.offset);
            p.field_hex("Length", fde.length);
            p.field_hex("CieOffset", fde.cie_offset);
            p.field_hex("InitialLocation", fde.initial_location);
            p.field_hex("AddressRange", fde.address_range);
            if let Some(lsda) = fde.lsda {
                p.field_hex("Lsda", lsda);
            }
            for instruction in &fde.instructions {
                p.field_debug("Instruction", instruction);
            }
        });
    }
}

static FLAGS_EI_CLASS: &[Flag<u8>] = &flags!(ELFCLASSNONE, ELFCLASS32, ELFCLASS64);
static FLAGS_EI_DATA: &[Flag<u8>] = &flags!(ELFDATANONE, ELFDATA2LSB, ELFDATA2MSB);
static FLAGS_EV: &[Flag<u8>] = &flags!(EV_CURRENT);
static FLAGS_EI_OSABI: &[Flag<u8>] = &flags!(
    ELFOSABI_NONE,
    ELFOSABI_HPUX,
    ELFOSABI_NETBSD,
    ELFOSABI_GNU,
    ELFOSABI_SOLARIS,
    ELFOSABI_AIX,
    ELFOSABI_IRIX,
    ELFOSABI_FREEBSD,
    ELFOSABI_TRU64,
    ELFOSABI_MODESTO,
    ELFOSABI_OPENBSD,
    ELFOSABI_ARM_AEABI,
    ELFOSABI_ARM,
    ELFOSABI_CELLOSLV2,
    ELFOSABI_NACL,
    ELFOSABI_STANDALONE,
);
static FLAGS_ET: &[Flag<u16>] = &flags!(ET_NONE, ET_REL, ET_EXEC, ET_DYN, ET_CORE);
static FLAGS_EM: &[Flag<u16>] = &flags!(
    EM_NONE,
    EM_M32,
    EM_SPARC,
    EM_386,
    EM_68K,
    EM_88K,
    EM_486,
    EM_860,
    EM_MIPS,
    EM_S370,
    EM_MIPS_RS3_LE,
    EM_PARISC,
    EM_SPARC32PLUS,
    EM_960,
    EM_PPC,
    EM_PPC64,
    EM_S390,
    EM_CISCO7200,
    EM_CISCO3620,
    EM_ARM,
    EM_SH,
    EM_SPARCV9,
    EM_IA_64,
    EM_X86_64,
    EM_AVR,
    EM_XTENSA,
    EM_AARCH64,
    EM_RISCV,
    EM_BPF,
    EM_LOONGARCH,
);
static FLAGS_PT: &[Flag<u32>] = &flags!(
    PT_NULL,
    PT_LOAD,
    PT_DYNAMIC,
    PT_INTERP,
    PT_NOTE,
    PT_SHLIB,
    PT_PHDR,
    PT_TLS,
    PT_GNU_EH_FRAME,
    PT_GNU_STACK,
    PT_GNU_RELRO,
    PT_GNU_PROPERTY,
    PT_PAX_FLAGS,
);
static FLAGS_PT_ARM: &[Flag<u32>] = &flags!(PT_ARM_EXIDX);
static FLAGS_PT_MIPS: &[Flag<u32>] = &flags!(PT_MIPS_REGINFO, PT_MIPS_ABIFLAGS);
static FLAGS_PF: &[Flag<u32>] = &flags!(PF_X, PF_W, PF_R);
static FLAGS_SHT: &[Flag<u32>] = &flags!(
    SHT_NULL,
    SHT_PROGBITS,
    SHT_SYMTAB,
    SHT_STRTAB,
    SHT_RELA,
    SHT_HASH,
    SHT_DYNAMIC,
    SHT_NOTE,
    SHT_NOBITS,
    SHT_REL,
    SHT_SHLIB,
    SHT_DYNSYM,
    SHT_INIT_ARRAY,
    SHT_FINI_ARRAY,
    SHT_PREINIT_ARRAY,
    SHT_GROUP,
    SHT_SYMTAB_SHNDX,
    SHT_ANDROID_REL,
    SHT_ANDROID_RELA,
    SHT_GNU_ATTRIBUTES,
    SHT_GNU_HASH,
    SHT_GNU_LIBLIST,
    SHT_GNU_VERDEF,
    SHT_GNU_VERNEED,
    SHT_GNU_VERSYM,
);
static FLAGS_SHT_ARM: &[Flag<u32>] = &flags!(SHT_ARM_EXIDX, SHT_ARM_ATTRIBUTES);
static FLAGS_SHT_MIPS: &[Flag<u32>] = &flags!(SHT_MIPS_REGINFO, SHT_MIPS_OPTIONS);
static FLAGS_SHT_X86_64: &[Flag<u32>] = &flags!(SHT_X86_64_UNWIND);
static FLAGS_SHF: &[Flag<u64>] = &flags!(
    SHF_WRITE,
    SHF_ALLOC,
    SHF_EXECINSTR,
    SHF_MERGE,
    SHF_STRINGS,
    SHF_INFO_LINK,
    SHF_TLS,
    SHF_COMPRESSED,
);
static FLAGS_SHN: &[Flag<u16>] = &flags!(SHN_UNDEF, SHN_ABS, SHN_COMMON, SHN_XINDEX);
static FLAGS_STT: &[Flag<u8>] = &flags!(
    STT_NOTYPE,
    STT_OBJECT,
    STT_FUNC,
    STT_SECTION,
    STT_FILE,
    STT_COMMON,
    STT_TLS,
    STT_GNU_IFUNC,
);
static FLAGS_STT_ARM: &[Flag<u8>] = &flags!(STT_ARM_TFUNC, STT_ARM_16BIT);
static FLAGS_STB: &[Flag<u8>] = &flags!(
    STB_LOCAL,
    STB_GLOBAL,
    STB_WEAK,
    STB_GNU_UNIQUE,
    STB_INVALID
);
static FLAGS_DT: &[Flag<i64>] = &flags!(
    DT_NULL,
    DT_NEEDED,
    DT_PLTRELSZ,
    DT_PLTGOT,
    DT_HASH,
    DT_STRTAB,
    DT_SYMTAB,
    DT_RELA,
    DT_RELASZ,
    DT_RELAENT,
    DT_STRSZ,
    DT_SYMENT,
    DT_INIT,
    DT_FINI,
    DT_SONAME,
    DT_RPATH,
    DT_SYMBOLIC,
    DT_REL,
    DT_RELSZ,
    DT_RELENT,
    DT_PLTREL,
    DT_DEBUG,
    DT_TEXTREL,
    DT_JMPREL,
    DT_BIND_NOW,
    DT_INIT_ARRAY,
    DT_FINI_ARRAY,
    DT_INIT_ARRAYSZ,
    DT_FINI_ARRAYSZ,
    DT_RUNPATH,
    DT_FLAGS,
    DT_PREINIT_ARRAY,
    DT_PREINIT_ARRAYSZ,
    DT_SYMTAB_SHNDX,
    DT_ANDROID_REL,
    DT_ANDROID_RELSZ,
    DT_ANDROID_RELA,
    DT_ANDROID_RELASZ,
    DT_GNU_PRELINKED,
    DT_GNU_CONFLICTSZ,
    DT_GNU_LIBLISTSZ,
    DT_CHECKSUM,
    DT_PLTPADSZ,
    DT_MOVEENT,
    DT_MOVESZ,
    DT_FEATURE_1,
    DT_POSFLAG_1,
    DT_SYMINSZ,
    DT_SYMINENT,
    DT_GNU_HASH,
    DT_TLSDESC_PLT,
    DT_TLSDESC_GOT,
    DT_GNU_CONFLICT,
    DT_GNU_LIBLIST,
    DT_CONFIG,
    DT_DEPAUDIT,
    DT_AUDIT,
    DT_PLTPAD,
    DT_MOVETAB,
    DT_SYMINFO,
    DT_VERSYM,
    DT_RELACOUNT,
    DT_RELCOUNT,
    DT_FLAGS_1,
    DT_VERDEF,
    DT_VERDEFNUM,
    DT_VERNEED,
    DT_VERNEEDNUM,
    DT_AUXILIARY,
    DT_FILTER,
);
static FLAGS_NT_GNU: &[Flag<u32>] = &flags!(
    NT_GNU_ABI_TAG,
    NT_GNU_HWCAP,
    NT_GNU_BUILD_ID,
    NT_GNU_GOLD_VERSION,
    NT_GNU_PROPERTY_TYPE_0,
);
static FLAGS_VER_FLG: &[Flag<u16>] = &flags!(VER_FLG_BASE, VER_FLG_WEAK);
