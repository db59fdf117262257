use std::cell::RefCell;
use std::io::Cursor;
use std::rc::Rc;

use elfread::elf;
use elfread::read::elf::{Reader, ReaderOptions, Stage, WellKnownSection};
use elfread::read::{strict_policy, Action, ParseDiagnostic};
use elfread::Endianness;

use crate::common::ElfBuilder;

fn small(endian: Endianness, is_64: bool) -> ElfBuilder {
    let mut builder = ElfBuilder::new(endian, is_64);
    builder.load_base = Some(0x1_0000);
    builder.e_entry = 0x1_0100;
    builder
        .section(".text", elf::SHT_PROGBITS, vec![0x90; 32])
        .header
        .sh_flags = elf::SHF_ALLOC | elf::SHF_EXECINSTR;
    builder.section(".comment", elf::SHT_PROGBITS, b"hello\0".to_vec());
    builder
}

// Collects every diagnostic passed to the policy.
fn recording(reader: &mut Reader<Cursor<Vec<u8>>>) -> Rc<RefCell<Vec<ParseDiagnostic>>> {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let log = seen.clone();
    reader.set_policy(move |diagnostic| {
        log.borrow_mut().push(diagnostic.clone());
        Action::Continue
    });
    seen
}

#[test]
fn both_classes_and_byte_orders() {
    for &(endian, is_64) in &[
        (Endianness::Little, true),
        (Endianness::Big, true),
        (Endianness::Little, false),
        (Endianness::Big, false),
    ] {
        let image = small(endian, is_64).build();
        let reader = image.open();
        assert_eq!(reader.stage(), Stage::TablesRead);
        assert_eq!(reader.endianness(), endian);
        assert_eq!(reader.is_64(), is_64);
        assert_eq!(reader.ident().is_msb(), endian.is_big_endian());

        let header = reader.header();
        assert_eq!(header.e_type, elf::ET_EXEC);
        assert_eq!(header.e_entry, 0x1_0100);
        assert_eq!(header.e_phnum, 1);
        assert_eq!(header.real_shnum, 4);
        assert_eq!(header.real_shstrndx, 3);

        let sections = reader.sections();
        assert_eq!(sections.len(), 4);
        assert_eq!(sections.name(1), Some(".text"));
        assert_eq!(sections.name(2), Some(".comment"));
        assert_eq!(sections.name(3), Some(".shstrtab"));
        assert_eq!(sections.get(1), Some(image.section(".text")));
    }
}

#[test]
fn section_count_escapes() {
    let mut builder = small(Endianness::Little, true);
    builder.escape_counts = true;
    let image = builder.build();
    let reader = image.open();
    let header = reader.header();
    assert_eq!(header.e_shnum, 0);
    assert_eq!(header.e_shstrndx, elf::SHN_XINDEX);
    // With the escape engaged, the count is exactly `sh_size` of section 0.
    assert_eq!(header.real_shnum, image.sections[0].sh_size);
    assert_eq!(header.real_shnum, 4);
    assert_eq!(header.real_shstrndx, 3);
    assert_eq!(reader.sections().name(2), Some(".comment"));
}

#[test]
fn invalid_identification() {
    let mut reader = Reader::new(Cursor::new(vec![0x7f, b'E', b'L'])).unwrap();
    assert_eq!(reader.read_ident(), Err(ParseDiagnostic::InvalidIdent));
    assert_eq!(reader.stage(), Stage::Unstarted);

    let mut image = small(Endianness::Little, true).build();
    image.data[0] = 0;
    assert_eq!(image.reader().read_ident(), Err(ParseDiagnostic::InvalidIdent));

    // Too short for the declared class.
    let image = small(Endianness::Little, true).build();
    let mut reader = Reader::new(Cursor::new(image.data[..40].to_vec())).unwrap();
    assert_eq!(reader.read_ident(), Err(ParseDiagnostic::InvalidIdent));

    // The header needs the identification.
    let mut reader = image.reader();
    assert_eq!(reader.read_header(), Err(ParseDiagnostic::InvalidIdent));
}

#[test]
fn header_size_warning() {
    let mut image = small(Endianness::Big, false).build();
    // `e_ehsize` of ELF32.
    image.data[0x28..0x2a].copy_from_slice(&60u16.to_be_bytes());

    let mut reader = image.reader();
    let seen = recording(&mut reader);
    reader.read_ident().unwrap();
    reader.read_header().unwrap();
    assert_eq!(
        *seen.borrow(),
        vec![ParseDiagnostic::BadEhsize {
            actual: 60,
            expected: 52
        }]
    );

    let mut reader = image.reader();
    reader.set_policy(strict_policy);
    reader.read_ident().unwrap();
    assert!(matches!(
        reader.read_header(),
        Err(ParseDiagnostic::BadEhsize { .. })
    ));
}

#[test]
fn legacy_x86_byte_order() {
    let mut builder = small(Endianness::Little, false);
    builder.e_machine = elf::EM_386;
    let mut image = builder.build();
    // Declare the wrong byte order.
    image.data[elf::EI_DATA] = elf::ELFDATA2MSB;

    let mut reader = image.reader();
    let seen = recording(&mut reader);
    reader.read_ident().unwrap();
    reader.read_header().unwrap();
    assert_eq!(reader.endianness(), Endianness::Little);
    assert_eq!(reader.header().e_machine, elf::EM_386);
    assert_eq!(reader.header().e_type, elf::ET_EXEC);
    assert!(seen.borrow().contains(&ParseDiagnostic::BadEndianness {
        data: elf::ELFDATA2MSB,
        machine: Some(elf::EM_386),
    }));
    assert!(reader.read_section_headers().unwrap());
    assert_eq!(reader.sections().name(1), Some(".text"));

    let options = ReaderOptions::default().check_ident(false);
    let mut reader = Reader::with_options(Cursor::new(image.data.clone()), options).unwrap();
    reader.read_ident().unwrap();
    let _ = reader.read_header();
    assert_eq!(reader.endianness(), Endianness::Big);
    assert_eq!(reader.header().e_machine, elf::EM_386.swap_bytes());
}

#[test]
fn section_headers_past_end_of_file() {
    let mut image = small(Endianness::Little, true).build();
    let past = image.data.len() as u64 + 0x1000;
    image.set_shoff(past);

    let mut reader = image.reader();
    let seen = recording(&mut reader);
    reader.read_ident().unwrap();
    reader.read_header().unwrap();
    assert!(matches!(
        seen.borrow()[0],
        ParseDiagnostic::BadShloc { shoff, .. } if shoff == past
    ));
    assert_eq!(reader.read_section_headers(), Ok(false));
    assert!(reader.sections().is_empty());
    for &section in &[
        WellKnownSection::Symtab,
        WellKnownSection::Dynsym,
        WellKnownSection::Interp,
        WellKnownSection::Got,
        WellKnownSection::GotPlt,
        WellKnownSection::EhFrame,
        WellKnownSection::Versym,
    ] {
        assert!(reader.sections().well_known(section).is_none());
    }

    // The program headers are unaffected.
    assert_eq!(reader.read_program_headers(), Ok(true));
    assert_eq!(reader.segments().image_base(), Some(0x1_0000));
}

#[test]
fn position_is_restored() {
    let image = small(Endianness::Big, true).build();
    let mut reader = image.reader();
    assert_eq!(reader.tell(), 0);
    reader.read_ident().unwrap();
    assert_eq!(reader.tell(), 0);
    reader.read_header().unwrap();
    assert_eq!(reader.tell(), 0);
    reader.read_program_headers().unwrap();
    reader.read_section_headers().unwrap();
    assert_eq!(reader.tell(), 0);

    let text = *image.section(".text");
    assert_eq!(reader.read_section_contents(&text).unwrap(), vec![0x90; 32]);
    assert_eq!(reader.tell(), 0);

    // A failing read leaves the position alone too.
    let size = reader.size();
    assert!(matches!(
        reader.read_u32_at(size - 2),
        Err(ParseDiagnostic::Read { expected: 4, actual: 2, .. })
    ));
    assert_eq!(reader.tell(), 0);

    {
        let excursion = reader.excursion();
        assert_eq!(excursion.saved_position(), 0);
    }
    assert_eq!(reader.tell(), 0);
}

#[test]
fn relocatable_with_program_headers() {
    let mut builder = small(Endianness::Little, true);
    builder.e_type = elf::ET_REL;
    let image = builder.build();
    let mut reader = image.reader();
    let seen = recording(&mut reader);
    reader.read_ident().unwrap();
    reader.read_header().unwrap();
    assert_eq!(*seen.borrow(), vec![ParseDiagnostic::ConflictingFileType]);
}
