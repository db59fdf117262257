use std::cell::RefCell;
use std::rc::Rc;

use elfread::elf;
use elfread::read::elf::{DynamicKind, SliceKind, SymbolCache};
use elfread::read::{Action, ParseDiagnostic};
use elfread::Endianness;

use crate::common::{string_table, DynValue, ElfBuilder};

// A shared library with `.hash`, `.dynsym`, `.dynstr` and `.dynamic`.
fn library(endian: Endianness, is_64: bool, extra: Vec<(i64, DynValue)>) -> ElfBuilder {
    let mut builder = ElfBuilder::new(endian, is_64);
    builder.e_type = elf::ET_DYN;
    builder.load_base = Some(0x1_0000);
    builder.section(".hash", elf::SHT_HASH, vec![0; 16]).header.sh_addralign = 4;
    builder.symbols(
        elf::SHT_DYNSYM,
        ".dynsym",
        ".dynstr",
        &[
            ("libfoo_init", 0x1_0400, 16, elf::st_info(elf::STB_GLOBAL, elf::STT_FUNC), 1),
            ("libfoo_data", 0x1_0800, 8, elf::st_info(elf::STB_GLOBAL, elf::STT_OBJECT), 1),
        ],
    );
    // Move `.dynstr` after `.dynsym`, and append the library names to it.
    let dynstr = builder.index_of(".dynstr") as usize - 1;
    let mut strings = builder.sections.remove(dynstr);
    let (names, _) = string_table(&["libc.so.6", "libfoo.so.1"]);
    strings.data.extend_from_slice(&names[1..]);
    let dynsym = builder.index_of(".dynsym") as usize - 1;
    builder.sections.insert(dynsym + 1, strings);

    let mut entries = vec![
        (elf::DT_HASH, DynValue::Address(".hash")),
        (elf::DT_STRTAB, DynValue::Address(".dynstr")),
        (elf::DT_SYMTAB, DynValue::Address(".dynsym")),
        (elf::DT_STRSZ, DynValue::Size(".dynstr")),
    ];
    entries.extend(extra);
    builder.dynamic(entries, Some(".dynstr"));
    builder
}

// The offsets of the library names appended to `.dynstr`.
fn needed_offsets(builder: &ElfBuilder) -> (u64, u64) {
    let dynstr = &builder.sections[builder.index_of(".dynstr") as usize - 1].data;
    let libc = dynstr
        .windows(9)
        .position(|w| w == b"libc.so.6")
        .unwrap() as u64;
    let libfoo = dynstr
        .windows(11)
        .position(|w| w == b"libfoo.so.1")
        .unwrap() as u64;
    (libc, libfoo)
}

#[test]
fn symbol_table_size_is_guessed() {
    for &(endian, is_64) in &[(Endianness::Little, true), (Endianness::Big, false)] {
        let image = library(endian, is_64, Vec::new()).build();
        let mut reader = image.open();

        let dlt = reader.dynamic_linking_tables().unwrap();
        assert_eq!(dlt.offset, image.section(".dynamic").sh_offset);
        assert_eq!(dlt.link, Some(image.names.iter().position(|n| n == ".dynstr").unwrap() as u32));
        let tags = reader.read_dynamic_info_tags(&dlt).unwrap();
        assert_eq!(tags.len(), 5);
        assert_eq!(tags.last().unwrap().d_tag, elf::DT_NULL);

        let info = reader.parse_dynamic_info(&tags).unwrap();
        let dynsym = image.section(".dynsym");
        let symtab = info.symtab();
        assert_eq!(symtab.offset, dynsym.sh_offset);
        assert_eq!(symtab.addr, dynsym.sh_addr);
        // No `DT_SYMENT`, so the standard entry size is used.
        assert_eq!(symtab.entsize, u64::from(reader.struct_sizes().sym));
        // The nearest of `DT_STRTAB` and `DT_HASH` after the table.
        let dynstr = image.section(".dynstr");
        let hash = image.section(".hash");
        assert!(hash.sh_offset < dynsym.sh_offset);
        assert_eq!(symtab.size, dynstr.sh_offset - dynsym.sh_offset);
        assert!(symtab.size >= dynsym.sh_size);

        // `.dynstr` has an explicit size, and `.hash` is followed by `.dynsym`.
        assert_eq!(info.strtab().size, dynstr.sh_size);
        assert_eq!(
            info.entry(DynamicKind::Hash).size,
            dynsym.sh_offset - hash.sh_offset
        );
        assert!(!info.entry(DynamicKind::Rela).is_valid());
    }
}

#[test]
fn dynamic_symbols_without_sections() {
    let image = library(Endianness::Little, true, Vec::new()).build();
    let mut reader = image.reader();
    reader.read_ident().unwrap();
    reader.read_header().unwrap();
    reader.read_program_headers().unwrap();

    // Only the program headers locate the tables.
    let (_, info) = reader.read_dynamic_info().unwrap().unwrap();
    assert_eq!(reader.dynamic_strings().offset, image.section(".dynstr").sh_offset);

    let mut cache = SymbolCache::new();
    let count = reader.load_dynamic_symbols(&mut cache, &info).unwrap();
    assert_eq!(count, 3);
    let names: Vec<_> = cache
        .iter(SliceKind::Dynsym)
        .map(|(_, symbol)| symbol.name.as_str())
        .take(2)
        .collect();
    assert_eq!(names, ["libfoo_init", "libfoo_data"]);
}

#[test]
fn string_tags() {
    let builder = library(Endianness::Big, true, Vec::new());
    let (libc, libfoo) = needed_offsets(&builder);
    let image = library(
        Endianness::Big,
        true,
        vec![
            (elf::DT_NEEDED, DynValue::Value(libc)),
            (elf::DT_SONAME, DynValue::Value(libfoo)),
            (elf::DT_FLAGS, DynValue::Value(libc)),
        ],
    )
    .build();
    let mut reader = image.open();
    let (tags, _) = reader.read_dynamic_info().unwrap().unwrap();
    let strings: Vec<_> = tags
        .iter()
        .filter_map(|tag| reader.dynamic_string(tag.d_tag, tag.d_val))
        .collect();
    assert_eq!(strings, ["libc.so.6", "libfoo.so.1"]);
}

#[test]
fn bad_plt_relocation_type() {
    let image = library(
        Endianness::Little,
        false,
        vec![(elf::DT_PLTREL, DynValue::Value(5))],
    )
    .build();
    let mut reader = image.open();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let log = seen.clone();
    reader.set_policy(move |diagnostic| {
        log.borrow_mut().push(diagnostic.clone());
        Action::Continue
    });
    let (_, info) = reader.read_dynamic_info().unwrap().unwrap();
    assert_eq!(info.plt_rel_type, 5);
    assert_eq!(*seen.borrow(), vec![ParseDiagnostic::BadDynPltType { value: 5 }]);

    reader.set_policy(|_| Action::Abort);
    assert!(matches!(
        reader.read_dynamic_info(),
        Err(ParseDiagnostic::BadDynPltType { value: 5 })
    ));
}
