use std::cell::RefCell;
use std::io::Cursor;
use std::rc::Rc;

use elfread::elf;
use elfread::read::elf::{Reader, ReaderOptions, SliceKind, Symbol, SymbolCache};
use elfread::read::{Action, ParseDiagnostic};
use elfread::Endianness;

use crate::common::{ElfBuilder, Image};

fn open_with(image: &Image, options: ReaderOptions) -> Reader<Cursor<Vec<u8>>> {
    let mut reader = Reader::with_options(Cursor::new(image.data.clone()), options).unwrap();
    reader.read_ident().unwrap();
    reader.read_header().unwrap();
    reader.read_program_headers().unwrap();
    reader.read_section_headers().unwrap();
    reader
}

fn recording(reader: &mut Reader<Cursor<Vec<u8>>>) -> Rc<RefCell<Vec<ParseDiagnostic>>> {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let log = seen.clone();
    reader.set_policy(move |diagnostic| {
        log.borrow_mut().push(diagnostic.clone());
        Action::Continue
    });
    seen
}

fn executable() -> Image {
    let mut builder = ElfBuilder::new(Endianness::Little, true);
    builder.load_base = Some(0x40_0000);
    builder
        .section(".text", elf::SHT_PROGBITS, vec![0xc3; 64])
        .header
        .sh_flags = elf::SHF_ALLOC | elf::SHF_EXECINSTR;
    builder.symbols(
        elf::SHT_SYMTAB,
        ".symtab",
        ".strtab",
        &[
            ("counter", 0x40_2000, 4, elf::st_info(elf::STB_LOCAL, elf::STT_OBJECT), 1),
            ("main", 0x40_1000, 0x20, elf::st_info(elf::STB_GLOBAL, elf::STT_FUNC), 1),
            ("version", 0x2a, 0, elf::st_info(elf::STB_GLOBAL, elf::STT_NOTYPE), elf::SHN_ABS),
            ("puts", 0, 0, elf::st_info(elf::STB_GLOBAL, elf::STT_FUNC), elf::SHN_UNDEF),
        ],
    );
    builder.build()
}

#[test]
fn names_values_and_sections() {
    let image = executable();
    let mut reader = image.open();
    let mut cache = SymbolCache::new();
    assert_eq!(reader.load_symbols(&mut cache, SliceKind::Symtab), Ok(5));
    assert_eq!(reader.load_symbols(&mut cache, SliceKind::Dynsym), Ok(0));
    assert_eq!(cache.slice_len(SliceKind::Symtab), 5);
    assert_eq!(cache.get(SliceKind::Symtab, 0), Some(&Symbol::default()));

    let main = cache.get(SliceKind::Symtab, 2).unwrap();
    assert_eq!(main.name, "main");
    assert_eq!(main.value, 0x40_1000);
    assert_eq!(main.size, 0x20);
    assert_eq!(main.section, 1);
    assert_eq!(main.binding, elf::STB_GLOBAL);
    assert_eq!(main.symbol_type, elf::STT_FUNC);
    assert!(!main.is_thumb_function());

    let version = cache.get(SliceKind::Symtab, 3).unwrap();
    assert_eq!(version.section, 0);
    assert!(version.defined_in_special_section());
    assert_eq!(version.section_str(), "FFF1");

    let puts = cache.get(SliceKind::Symtab, 4).unwrap();
    assert_eq!(puts.section, 0);
    assert!(!puts.defined_in_special_section());

    let names: Vec<_> = cache
        .iter(SliceKind::Symtab)
        .map(|(_, symbol)| symbol.name.as_str())
        .collect();
    assert_eq!(names, ["counter", "main", "version", "puts"]);
}

#[test]
fn load_bias() {
    let image = executable();
    let mut reader = open_with(&image, ReaderOptions::default().load_bias(0x1000));
    let mut cache = SymbolCache::new();
    reader.load_symbols(&mut cache, SliceKind::Symtab).unwrap();
    let main = cache.get(SliceKind::Symtab, 2).unwrap();
    assert_eq!(main.value, 0x40_2000);
    assert_eq!(main.original.st_value, 0x40_1000);
}

#[test]
fn extended_section_indices() {
    let mut builder = ElfBuilder::new(Endianness::Big, false);
    builder.e_type = elf::ET_REL;
    builder.section(".text", elf::SHT_PROGBITS, vec![0; 16]);
    builder.symbols(
        elf::SHT_SYMTAB,
        ".symtab",
        ".strtab",
        &[
            ("far", 0x10, 0, elf::st_info(elf::STB_GLOBAL, elf::STT_FUNC), elf::SHN_XINDEX),
            ("lost", 0, 0, elf::st_info(elf::STB_GLOBAL, elf::STT_NOTYPE), elf::SHN_XINDEX),
        ],
    );
    let enc = builder.enc;
    let mut shndx = Vec::new();
    for &index in &[0, 70000, 0] {
        enc.u32(&mut shndx, index);
    }
    let section = builder.section(".symtab_shndx", elf::SHT_SYMTAB_SHNDX, shndx);
    section.header.sh_entsize = 4;
    section.link = Some(".symtab".into());
    let image = builder.build();

    let mut reader = image.open();
    let seen = recording(&mut reader);
    let mut cache = SymbolCache::new();
    assert_eq!(reader.load_symbols(&mut cache, SliceKind::Symtab), Ok(3));
    assert_eq!(cache.get(SliceKind::Symtab, 1).unwrap().section, 70000);
    assert_eq!(cache.get(SliceKind::Symtab, 2).unwrap().section, 0);
    assert_eq!(
        *seen.borrow(),
        vec![ParseDiagnostic::BadSymbolSectionIndex { symbol: 2 }]
    );
}

#[test]
fn extended_section_index_past_the_table() {
    let mut builder = ElfBuilder::new(Endianness::Big, false);
    builder.e_type = elf::ET_REL;
    builder.section(".text", elf::SHT_PROGBITS, vec![0; 16]);
    builder.symbols(
        elf::SHT_SYMTAB,
        ".symtab",
        ".strtab",
        &[
            ("far", 0x10, 0, elf::st_info(elf::STB_GLOBAL, elf::STT_FUNC), elf::SHN_XINDEX),
            ("cut", 0x20, 0, elf::st_info(elf::STB_GLOBAL, elf::STT_FUNC), elf::SHN_XINDEX),
        ],
    );
    let enc = builder.enc;
    let mut shndx = Vec::new();
    enc.u32(&mut shndx, 0);
    enc.u32(&mut shndx, 70000);
    // Half of the entry for `cut`, directly followed by another section.
    shndx.extend_from_slice(&[0, 1]);
    let section = builder.section(".symtab_shndx", elf::SHT_SYMTAB_SHNDX, shndx);
    section.header.sh_entsize = 4;
    section.link = Some(".symtab".into());
    builder.section(".data", elf::SHT_PROGBITS, vec![0x23, 0x45, 0x67, 0x89]);
    let image = builder.build();
    assert_eq!(image.section(".symtab_shndx").sh_size, 10);
    assert_eq!(
        image.section(".data").sh_offset,
        image.section(".symtab_shndx").sh_offset + 10
    );

    let mut reader = image.open();
    let seen = recording(&mut reader);
    let mut cache = SymbolCache::new();
    assert_eq!(reader.load_symbols(&mut cache, SliceKind::Symtab), Ok(3));
    assert_eq!(cache.get(SliceKind::Symtab, 1).unwrap().section, 70000);
    assert_eq!(cache.get(SliceKind::Symtab, 2).unwrap().section, 0);
    assert_eq!(
        *seen.borrow(),
        vec![ParseDiagnostic::BadSymbolSectionIndex { symbol: 2 }]
    );
}

#[test]
fn bad_binding() {
    let mut builder = ElfBuilder::new(Endianness::Little, true);
    builder.symbols(
        elf::SHT_SYMTAB,
        ".symtab",
        ".strtab",
        &[
            ("odd", 0x10, 0, elf::st_info(5, elf::STT_FUNC), 0),
            ("unique", 0x20, 0, elf::st_info(elf::STB_GNU_UNIQUE, elf::STT_OBJECT), 0),
        ],
    );
    let image = builder.build();

    let mut reader = image.open();
    let seen = recording(&mut reader);
    let mut cache = SymbolCache::new();
    reader.load_symbols(&mut cache, SliceKind::Symtab).unwrap();
    assert_eq!(cache.get(SliceKind::Symtab, 1).unwrap().binding, elf::STB_INVALID);
    assert_eq!(cache.get(SliceKind::Symtab, 2).unwrap().binding, elf::STB_GNU_UNIQUE);
    assert_eq!(
        *seen.borrow(),
        vec![ParseDiagnostic::BadSymbolBinding {
            symbol: 1,
            binding: 5
        }]
    );

    reader.set_policy(|_| Action::Abort);
    assert!(matches!(
        reader.load_symbols(&mut cache, SliceKind::Symtab),
        Err(ParseDiagnostic::BadSymbolBinding { symbol: 1, .. })
    ));
}

#[test]
fn arm_thumb_functions() {
    let mut builder = ElfBuilder::new(Endianness::Little, false);
    assert_eq!(builder.e_machine, elf::EM_ARM);
    builder.section(".text", elf::SHT_PROGBITS, vec![0; 0x400]);
    let local = elf::st_info(elf::STB_LOCAL, elf::STT_NOTYPE);
    let func = elf::st_info(elf::STB_GLOBAL, elf::STT_FUNC);
    builder.symbols(
        elf::SHT_SYMTAB,
        ".symtab",
        ".strtab",
        &[
            ("$t", 0x100, 0, local, 1),
            ("by_mapping", 0x100, 8, func, 1),
            ("by_bit", 0x201, 8, func, 1),
            ("$a", 0x300, 0, local, 1),
            ("arm", 0x300, 8, func, 1),
            ("weakish", 0x380, 8, elf::st_info(14, elf::STT_FUNC), 1),
        ],
    );
    let image = builder.build();

    let mut reader = image.open();
    let mut cache = SymbolCache::new();
    reader.load_symbols(&mut cache, SliceKind::Symtab).unwrap();
    assert!(reader.arch_state().has_mapping_symbols());

    let get = |index| cache.get(SliceKind::Symtab, index).unwrap();
    assert!(get(1).is_thumb_function());
    assert!(get(2).is_thumb_function());
    assert_eq!(get(2).value, 0x100);
    assert!(get(3).is_thumb_function());
    assert_eq!(get(3).value, 0x200);
    assert!(!get(5).is_thumb_function());
    assert_eq!(get(6).binding, elf::STB_WEAK);
    assert!(!get(6).is_thumb_function());

    // Without tracking, only the low bit marks Thumb functions.
    let options = ReaderOptions::default().track_mapping_symbols(false);
    let mut reader = open_with(&image, options);
    let mut cache = SymbolCache::new();
    reader.load_symbols(&mut cache, SliceKind::Symtab).unwrap();
    assert!(!cache.get(SliceKind::Symtab, 2).unwrap().is_thumb_function());
    assert!(cache.get(SliceKind::Symtab, 3).unwrap().is_thumb_function());
}

#[test]
fn both_tables_share_the_cache() {
    let mut builder = ElfBuilder::new(Endianness::Little, true);
    builder.symbols(
        elf::SHT_SYMTAB,
        ".symtab",
        ".strtab",
        &[("local_helper", 0x10, 4, elf::st_info(elf::STB_LOCAL, elf::STT_FUNC), 0)],
    );
    builder.symbols(
        elf::SHT_DYNSYM,
        ".dynsym",
        ".dynstr",
        &[
            ("exported", 0x20, 4, elf::st_info(elf::STB_GLOBAL, elf::STT_FUNC), 0),
            ("imported", 0, 0, elf::st_info(elf::STB_GLOBAL, elf::STT_FUNC), 0),
        ],
    );
    let image = builder.build();
    let mut reader = image.open();

    let mut cache = SymbolCache::new();
    reader.load_symbols(&mut cache, SliceKind::Dynsym).unwrap();
    reader.load_symbols(&mut cache, SliceKind::Symtab).unwrap();
    assert_eq!(cache.len(), 5);
    assert_eq!(cache.slice(SliceKind::Symtab)[1].name, "local_helper");
    assert_eq!(cache.slice(SliceKind::Dynsym)[2].name, "imported");

    for &kind in &[SliceKind::Symtab, SliceKind::Dynsym] {
        for (index, symbol) in cache.iter(kind) {
            assert_eq!(cache.index_of(symbol), Some(index));
        }
    }

    // Reloading a table replaces it without disturbing the other.
    reader.load_symbols(&mut cache, SliceKind::Symtab).unwrap();
    assert_eq!(cache.len(), 5);
    assert_eq!(cache.get(SliceKind::Dynsym, 1).unwrap().name, "exported");
}
