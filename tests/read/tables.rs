use std::convert::TryInto;
use std::io::{self, Cursor, Read, Seek, SeekFrom};

use elfread::elf;
use elfread::read::elf::{
    Reader, StringTable, WellKnownSection, MAX_STRING_LENGTH, NO_STRING_TABLE, TRUNCATED_NAME,
};
use elfread::read::ParseDiagnostic;
use elfread::Endianness;

use crate::common::{ElfBuilder, Segment};

#[test]
fn well_known_sections() {
    let mut builder = ElfBuilder::new(Endianness::Little, true);
    builder.load_base = Some(0x40_0000);
    builder.section(".interp", elf::SHT_PROGBITS, b"/lib/ld.so\0".to_vec());
    builder.section(".plt", elf::SHT_PROGBITS, vec![0; 32]);
    builder.section(".got", elf::SHT_PROGBITS, vec![0; 16]);
    builder.section(".eh_frame", elf::SHT_PROGBITS, vec![0; 4]);
    builder.section(".bss", elf::SHT_NOBITS, Vec::new()).header.sh_size = 0x100;
    builder.section(".empty", elf::SHT_PROGBITS, Vec::new());
    let image = builder.build();
    let reader = image.open();
    let sections = reader.sections();

    assert_eq!(sections.index_of(WellKnownSection::Interp), 1);
    assert_eq!(sections.index_of(WellKnownSection::Plt), 2);
    assert_eq!(sections.index_of(WellKnownSection::Got), 3);
    // Without a `.got.plt`, `.got` is used.
    assert_eq!(sections.index_of(WellKnownSection::GotPlt), 3);
    assert_eq!(sections.index_of(WellKnownSection::EhFrame), 4);
    assert_eq!(sections.index_of(WellKnownSection::Symtab), 0);
    assert!(sections.well_known(WellKnownSection::Opd).is_none());

    let (index, bss) = sections.by_type_and_name(elf::SHT_NOBITS, ".bss").unwrap();
    assert_eq!(index, 5);
    assert_eq!(bss.sh_size, 0x100);
    assert!(sections.by_type_and_name(elf::SHT_PROGBITS, ".bss").is_none());

    assert_eq!(sections.size_in_file(1), 11);
    assert_eq!(sections.size_in_file(5), 0);
    assert_eq!(sections.size_in_file(6), 0);
    assert_eq!(sections.size_in_file(100), 0);
}

#[test]
fn got_plt_without_got_is_ignored() {
    let mut builder = ElfBuilder::new(Endianness::Big, false);
    builder.section(".got.plt", elf::SHT_PROGBITS, vec![0; 12]);
    let image = builder.build();
    let reader = image.open();
    assert!(reader.sections().well_known(WellKnownSection::GotPlt).is_none());
}

#[test]
fn program_headers() {
    let mut builder = ElfBuilder::new(Endianness::Big, false);
    builder.load_base = Some(0x8000_1234);
    builder.section(".interp", elf::SHT_PROGBITS, b"/system/bin/linker\0".to_vec());
    builder.segments.push(Segment {
        header: elf::ProgramHeader {
            p_type: elf::PT_INTERP,
            ..Default::default()
        },
        section: Some(".interp".into()),
    });
    let image = builder.build();
    let mut reader = image.open();

    let segments = reader.segments();
    assert!(segments.is_initialized());
    assert_eq!(segments.len(), 2);
    assert_eq!(segments.image_base(), Some(0x8000_1000));
    assert_eq!(segments.mappings().len(), 1);
    let interp = *image.section(".interp");
    // The load segment is cut short by the next segment.
    assert_eq!(segments.size_in_file(0), interp.sh_offset);
    assert_eq!(segments.size_in_file(1), interp.sh_size);

    assert_eq!(reader.file_offset(interp.sh_addr), Some(interp.sh_offset));
    assert_eq!(reader.file_vaddr(interp.sh_offset), Some(interp.sh_addr));
    assert_eq!(reader.file_offset(0x1000), None);

    let segment = *reader.segments().get(1).unwrap();
    assert_eq!(segment.p_type, elf::PT_INTERP);
    assert_eq!(
        reader.read_segment_contents(&segment).unwrap(),
        b"/system/bin/linker\0"
    );
}

// Reports a size larger than its data, so reads near the end come up short.
struct Overstated {
    inner: Cursor<Vec<u8>>,
    extra: u64,
}

impl Read for Overstated {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Seek for Overstated {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match pos {
            SeekFrom::End(offset) => {
                let end = self.inner.get_ref().len() as u64 + self.extra;
                self.inner.seek(SeekFrom::Start((end as i64 + offset) as u64))
            }
            pos => self.inner.seek(pos),
        }
    }
}

#[test]
fn short_program_header_read_keeps_leading_entries() {
    let mut builder = ElfBuilder::new(Endianness::Little, true);
    builder.load_base = Some(0x40_0000);
    builder.section(".interp", elf::SHT_PROGBITS, b"/lib/ld.so\0".to_vec());
    builder.segments.push(Segment {
        header: elf::ProgramHeader {
            p_type: elf::PT_INTERP,
            ..Default::default()
        },
        section: Some(".interp".into()),
    });
    let image = builder.build();
    let phoff = u64::from_le_bytes(image.data[0x20..0x28].try_into().unwrap());
    let phentsize = u64::from(elf::StructSizes::ELF64.phdr);
    // Cut the second entry after its `p_type`.
    let mut data = image.data.clone();
    data.truncate((phoff + phentsize + 4) as usize);

    let source = Overstated {
        inner: Cursor::new(data),
        extra: 0x1000,
    };
    let mut reader = Reader::new(source).unwrap();
    reader.read_ident().unwrap();
    reader.read_header().unwrap();
    assert_eq!(
        reader.read_program_headers(),
        Err(ParseDiagnostic::Read {
            expected: 4,
            actual: 0,
            position: phoff + phentsize + 4,
        })
    );
    let segments = reader.segments();
    assert!(segments.is_initialized());
    assert_eq!(segments.len(), 1);
    assert_eq!(segments.get(0).unwrap().p_type, elf::PT_LOAD);
    assert_eq!(segments.image_base(), Some(0x40_0000));
}

#[test]
fn no_program_headers() {
    let mut builder = ElfBuilder::new(Endianness::Little, true);
    builder.e_type = elf::ET_REL;
    builder.section(".text", elf::SHT_PROGBITS, vec![0xc3]);
    let image = builder.build();
    let mut reader = image.reader();
    reader.read_ident().unwrap();
    reader.read_header().unwrap();
    assert_eq!(reader.read_program_headers(), Ok(false));
    assert_eq!(reader.segments().image_base(), None);
    assert!(reader.dynamic_linking_tables().is_none());
}

#[test]
fn string_tables() {
    let mut builder = ElfBuilder::new(Endianness::Little, true);
    builder.symbols(elf::SHT_SYMTAB, ".symtab", ".strtab", &[("main", 0, 0, 0, 0)]);
    let image = builder.build();
    let mut reader = image.open();

    let strtab = *reader.symbol_strings();
    assert!(strtab.is_valid());
    assert_eq!(strtab.offset, image.section(".strtab").sh_offset);
    assert!(!reader.dynamic_strings().is_valid());

    assert_eq!(reader.get_name(&strtab, 1), "main");
    assert_eq!(reader.get_name(&strtab, 0), "");
    let bad = strtab.offset + 100;
    assert_eq!(
        reader.get_name(&strtab, 100),
        format!("bad offset {:08x}", bad as u32)
    );
    let dynstr = *reader.dynamic_strings();
    assert_eq!(reader.get_name(&dynstr, 1), NO_STRING_TABLE);
}

#[test]
fn truncated_string() {
    let mut builder = ElfBuilder::new(Endianness::Little, true);
    builder.section(".text", elf::SHT_PROGBITS, vec![0xc3]);
    let mut image = builder.build();
    let mut reader = image.reader();
    assert_eq!(reader.get_string_at(1).unwrap(), "ELF\u{2}\u{1}\u{1}");

    // Put a string without a terminator at the very end of the file.
    let len = image.data.len();
    image.data[len - 3..].copy_from_slice(b"abc");
    let mut reader = image.reader();
    assert_eq!(
        reader.get_string_at(len as u64 - 3).unwrap(),
        format!("abc{}", TRUNCATED_NAME)
    );
    assert_eq!(reader.tell(), 0);
}

#[test]
fn unterminated_string_table() {
    let mut builder = ElfBuilder::new(Endianness::Little, true);
    builder.section(".strtab", elf::SHT_STRTAB, b"\0abcdef".to_vec());
    builder.section(".text", elf::SHT_PROGBITS, b"ghi\0".to_vec());
    let image = builder.build();
    let mut reader = image.open();
    let section = *image.section(".strtab");
    let strtab = StringTable::new(section.sh_offset, 0, section.sh_size);
    // The name stops at the end of its table, not at the next NUL.
    assert_eq!(reader.get_name(&strtab, 1), format!("abcdef{}", TRUNCATED_NAME));
    assert_eq!(reader.get_name(&strtab, 6), format!("f{}", TRUNCATED_NAME));
    let r#unsized = StringTable::new(strtab.offset, 0, 0);
    assert_eq!(reader.get_name(&r#unsized, 1), "abcdefghi");
}

#[test]
fn long_string_is_capped() {
    let mut builder = ElfBuilder::new(Endianness::Little, true);
    let mut data = vec![b'x'; MAX_STRING_LENGTH as usize + 10];
    data.push(0);
    builder.section(".comment", elf::SHT_PROGBITS, data);
    let image = builder.build();
    let mut reader = image.open();
    let offset = image.section(".comment").sh_offset;
    let name = reader.get_string_at(offset).unwrap();
    assert_eq!(name.len(), MAX_STRING_LENGTH as usize + TRUNCATED_NAME.len());
    assert!(name.ends_with(TRUNCATED_NAME));
    assert_eq!(reader.get_string_at(offset + 20).unwrap().len(), MAX_STRING_LENGTH as usize - 10);
}

#[test]
fn relocation_section_lookup() {
    let mut builder = ElfBuilder::new(Endianness::Little, true);
    builder.e_type = elf::ET_REL;
    builder.section(".text", elf::SHT_PROGBITS, vec![0; 16]);
    let rela = builder.section(".rela.text", elf::SHT_RELA, vec![0; 24]);
    rela.header.sh_entsize = 24;
    rela.info = Some(".text".into());
    let image = builder.build();
    let reader = image.open();
    let (index, header, is_rela) = reader.sections().rel_for(1).unwrap();
    assert_eq!(index, 2);
    assert_eq!(header.sh_info, 1);
    assert!(is_rela);
}
