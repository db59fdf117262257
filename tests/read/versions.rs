use elfread::elf;
use elfread::read::elf::{SliceKind, SymbolCache, VersionIndex, WellKnownSection};
use elfread::Endianness;

use crate::common::{string_table, DynValue, ElfBuilder, Encoder};

// Names in `.dynstr` after the symbol names.
const NAMES: [&str; 4] = ["libc.so.6", "GLIBC_2.2.5", "libfoo.so.1", "FOO_1.0"];

fn verneed(enc: Encoder, out: &mut Vec<u8>, cnt: u16, file: u32, aux: u32, next: u32) {
    enc.u16(out, 1);
    enc.u16(out, cnt);
    enc.u32(out, file);
    enc.u32(out, aux);
    enc.u32(out, next);
}

fn vernaux(enc: Encoder, out: &mut Vec<u8>, other: u16, name: u32, next: u32) {
    enc.u32(out, 0);
    enc.u16(out, 0);
    enc.u16(out, other);
    enc.u32(out, name);
    enc.u32(out, next);
}

fn verdef(enc: Encoder, out: &mut Vec<u8>, flags: u16, ndx: u16, name: u32, next: u32) {
    enc.u16(out, 1);
    enc.u16(out, flags);
    enc.u16(out, ndx);
    enc.u16(out, 1);
    enc.u32(out, 0);
    enc.u32(out, 20);
    enc.u32(out, next);
    // The single auxiliary entry.
    enc.u32(out, name);
    enc.u32(out, 0);
}

// A library that requires `GLIBC_2.2.5` from libc and defines `FOO_1.0`.
fn library(endian: Endianness, verneed_data: Option<Vec<u8>>) -> ElfBuilder {
    let mut builder = ElfBuilder::new(endian, true);
    builder.e_type = elf::ET_DYN;
    builder.load_base = Some(0x10_0000);
    let func = elf::st_info(elf::STB_GLOBAL, elf::STT_FUNC);
    builder.symbols(
        elf::SHT_DYNSYM,
        ".dynsym",
        ".dynstr",
        &[("puts", 0, 0, func, 0), ("foo", 0x10_0800, 8, func, 0), ("bar", 0x10_0810, 8, func, 0)],
    );
    let enc = builder.enc;

    let dynstr = builder.index_of(".dynstr") as usize - 1;
    let base = builder.sections[dynstr].data.len() as u32 - 1;
    let (names, offsets) = string_table(&NAMES);
    builder.sections[dynstr].data.extend_from_slice(&names[1..]);
    let name = |i: usize| base + offsets[i];

    let mut versym = Vec::new();
    for &index in &[0, 3, 2, 1] {
        enc.u16(&mut versym, index);
    }
    let section = builder.section(".gnu.version", elf::SHT_GNU_VERSYM, versym);
    section.header.sh_addralign = 2;
    section.link = Some(".dynsym".into());

    let mut defs = Vec::new();
    verdef(enc, &mut defs, elf::VER_FLG_BASE, 1, name(2), 28);
    verdef(enc, &mut defs, 0, 2, name(3), 0);
    let section = builder.section(".gnu.version_d", elf::SHT_GNU_VERDEF, defs);
    section.header.sh_addralign = 4;
    section.link = Some(".dynsym".into());

    let needs = verneed_data.unwrap_or_else(|| {
        let mut needs = Vec::new();
        verneed(enc, &mut needs, 1, name(0), 16, 0);
        vernaux(enc, &mut needs, 3, name(1), 0);
        needs
    });
    let section = builder.section(".gnu.version_r", elf::SHT_GNU_VERNEED, needs);
    section.header.sh_addralign = 4;
    section.link = Some(".dynsym".into());

    builder.section(".text", elf::SHT_PROGBITS, vec![0xc3; 16]);
    builder.dynamic(
        vec![
            (elf::DT_STRTAB, DynValue::Address(".dynstr")),
            (elf::DT_STRSZ, DynValue::Size(".dynstr")),
            (elf::DT_SYMTAB, DynValue::Address(".dynsym")),
            (elf::DT_VERSYM, DynValue::Address(".gnu.version")),
            (elf::DT_VERDEF, DynValue::Address(".gnu.version_d")),
            (elf::DT_VERDEFNUM, DynValue::Value(2)),
            (elf::DT_VERNEED, DynValue::Address(".gnu.version_r")),
            (elf::DT_VERNEEDNUM, DynValue::Value(1)),
            (elf::DT_INIT, DynValue::Address(".text")),
        ],
        Some(".dynstr"),
    );
    builder
}

#[test]
fn versions_from_sections() {
    for &endian in &[Endianness::Little, Endianness::Big] {
        let image = library(endian, None).build();
        let mut reader = image.open();
        let mut cache = SymbolCache::new();

        // The version sections only apply to a table that has been read.
        let versions = reader.read_symbol_versions(&cache, None, false).unwrap();
        assert!(versions.is_empty());

        reader.load_symbols(&mut cache, SliceKind::Dynsym).unwrap();
        let versions = reader.read_symbol_versions(&cache, None, false).unwrap();
        assert_eq!(versions.file_names, ["libc.so.6", "libfoo.so.1"]);
        assert_eq!(versions.version_names, ["GLIBC_2.2.5", "libfoo.so.1", "FOO_1.0"]);
        assert_eq!(versions.def_base, Some(1));
        assert_eq!(versions.reqs.len(), 1);
        assert_eq!(versions.reqs[0].versions[0].other, 3);
        assert_eq!(versions.reqs[0].versions[0].offset, 16);
        assert_eq!(versions.defs.len(), 2);
        assert_eq!(versions.defs[1].offset, 28);
        assert_eq!(versions.defs[1].names, [(48, 2)]);
        assert_eq!(versions.symbols.len(), 4);
        assert!(versions.symbols[3].is_global());

        assert_eq!(versions.version_of(0), None);
        assert_eq!(versions.version_of(1), Some((Some("libc.so.6"), "GLIBC_2.2.5")));
        assert_eq!(versions.version_of(2), Some((Some("libfoo.so.1"), "FOO_1.0")));
        assert_eq!(versions.version_of(3), None);
    }
}

#[test]
fn versions_from_dynamic_tags() {
    let image = library(Endianness::Little, None).build();
    let mut reader = image.open();
    let (_, info) = reader.read_dynamic_info().unwrap().unwrap();

    let (header, kind) = reader
        .version_section(&SymbolCache::new(), WellKnownSection::Verneed, Some(&info), true)
        .unwrap();
    assert_eq!(kind, SliceKind::Dynsym);
    assert_eq!(header.sh_type, elf::SHT_GNU_VERNEED);
    assert_eq!(header.sh_offset, image.section(".gnu.version_r").sh_offset);
    assert_eq!(header.sh_info, 1);

    let versions = reader
        .read_symbol_versions(&SymbolCache::new(), Some(&info), true)
        .unwrap();
    assert_eq!(versions.reqs.len(), 1);
    assert_eq!(versions.defs.len(), 2);
    // The guessed size of `.gnu.version` may include padding.
    assert!(versions.symbols.len() >= 4);
    assert_eq!(versions.version_of(1), Some((Some("libc.so.6"), "GLIBC_2.2.5")));
    assert_eq!(versions.version_of(2), Some((Some("libfoo.so.1"), "FOO_1.0")));
}

#[test]
fn cyclic_requirements() {
    let enc = Encoder::new(Endianness::Little, true);
    let mut needs = Vec::new();
    // An entry that links to itself, with 100 auxiliary entries claimed
    // and an auxiliary entry that also links to itself.
    verneed(enc, &mut needs, 100, 1, 16, 0);
    vernaux(enc, &mut needs, 3, 1, 0);
    let image = library(Endianness::Little, Some(needs)).build();
    let mut reader = image.open();
    let mut cache = SymbolCache::new();
    reader.load_symbols(&mut cache, SliceKind::Dynsym).unwrap();

    let versions = reader.read_symbol_versions(&cache, None, false).unwrap();
    assert_eq!(versions.reqs.len(), 1);
    assert_eq!(versions.reqs[0].versions.len(), 1);
    assert_eq!(versions.file_names[0], "puts");
    assert!(VersionIndex(0x8003).is_hidden());
    assert_eq!(VersionIndex(0x8003).index(), 3);
}
