use std::convert::TryInto;
use std::io::Cursor;

use elfread::elf;
use elfread::read::elf::Reader;
use elfread::read::strict_policy;
use elfread::visit::{
    visit_elf_symbols, visit_reader, SymbolVisitor, NOT_ELF, VISIT_ALL, VISIT_BUILDID,
    VISIT_DYNINFO, VISIT_SEGMENTS, VISIT_SYMBOLS,
};
use elfread::Endianness;

use crate::common::{string_table, DynValue, ElfBuilder, Encoder, Image};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Event {
    Symbol(u64, String),
    Interp(String),
    Segment(u64, u64, String),
    Dyninfo(i64, String, u64),
    BuildId(String),
    DebugLink(String, u32),
}

// Records every callback, and stops with `stop_code` at event `stop_at`.
#[derive(Debug, Default)]
struct Recorder {
    events: Vec<Event>,
    stop_at: Option<usize>,
    stop_code: i32,
}

impl Recorder {
    fn record(&mut self, event: Event) -> i32 {
        self.events.push(event);
        if self.stop_at == Some(self.events.len() - 1) {
            self.stop_code
        } else {
            0
        }
    }
}

impl SymbolVisitor for Recorder {
    fn visit_symbol(&mut self, address: u64, name: &str) -> i32 {
        self.record(Event::Symbol(address, name.into()))
    }

    fn visit_interp(&mut self, path: &str) -> i32 {
        self.record(Event::Interp(path.into()))
    }

    fn visit_segment(&mut self, start: u64, size: u64, name: &str) -> i32 {
        self.record(Event::Segment(start, size, name.into()))
    }

    fn visit_dyninfo(&mut self, tag: i64, name: &str, value: u64) -> i32 {
        self.record(Event::Dyninfo(tag, name.into(), value))
    }

    fn visit_buildid(&mut self, build_id: &str) -> i32 {
        self.record(Event::BuildId(build_id.into()))
    }

    fn visit_debuglink(&mut self, name: &str, crc: u32) -> i32 {
        self.record(Event::DebugLink(name.into(), crc))
    }
}

fn visit(image: &Image, flags: u32, recorder: &mut Recorder) -> i32 {
    let mut reader = Reader::new(Cursor::new(image.data.clone())).unwrap();
    visit_reader(&mut reader, flags, recorder)
}

fn executable() -> ElfBuilder {
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
        &[("main", 0x40_1000, 0x40, elf::st_info(elf::STB_GLOBAL, elf::STT_FUNC), 1)],
    );
    builder
}

fn note(enc: Encoder, n_type: u32, desc: &[u8]) -> Vec<u8> {
    let mut data = Vec::new();
    enc.u32(&mut data, 4);
    enc.u32(&mut data, desc.len() as u32);
    enc.u32(&mut data, n_type);
    data.extend_from_slice(b"GNU\0");
    data.extend_from_slice(desc);
    data
}

// The dynamic tags of `full`, as reported.
fn dynamic_events(image: &Image, libc: u64) -> Vec<Event> {
    let dynstr = image.section(".dynstr");
    let dynsym = image.section(".dynsym");
    vec![
        Event::Dyninfo(elf::DT_NEEDED, "libc.so.6".into(), libc),
        Event::Dyninfo(elf::DT_STRTAB, String::new(), dynstr.sh_addr),
        Event::Dyninfo(elf::DT_STRSZ, String::new(), dynstr.sh_size),
        Event::Dyninfo(elf::DT_SYMTAB, String::new(), dynsym.sh_addr),
        Event::Dyninfo(elf::DT_NULL, String::new(), 0),
    ]
}

// An executable with everything the driver can report.
fn full() -> (Image, u64) {
    let mut builder = ElfBuilder::new(Endianness::Little, true);
    builder.load_base = Some(0x40_0000);
    let enc = builder.enc;
    builder
        .section(".interp", elf::SHT_PROGBITS, b"/lib64/ld-linux-x86-64.so.2\0".to_vec())
        .header
        .sh_flags = elf::SHF_ALLOC;
    builder
        .section(".text", elf::SHT_PROGBITS, vec![0xc3; 64])
        .header
        .sh_flags = elf::SHF_ALLOC | elf::SHF_EXECINSTR;
    let func = elf::st_info(elf::STB_GLOBAL, elf::STT_FUNC);
    let object = elf::st_info(elf::STB_LOCAL, elf::STT_OBJECT);
    builder.symbols(
        elf::SHT_SYMTAB,
        ".symtab",
        ".strtab",
        &[
            ("crtstuff.c", 0, 0, elf::st_info(elf::STB_LOCAL, elf::STT_FILE), elf::SHN_ABS),
            ("main", 0x40_1000, 0x40, func, 2),
            ("state", 0x40_2000, 8, object, 2),
        ],
    );
    builder.symbols(
        elf::SHT_DYNSYM,
        ".dynsym",
        ".dynstr",
        &[("puts", 0, 0, func, elf::SHN_UNDEF), ("exported", 0x40_0800, 4, func, 2)],
    );
    // `.dynstr` follows `.dynsym`, so the size of the symbol table can be
    // guessed from the dynamic tags alone.
    let dynstr = builder.index_of(".dynstr") as usize - 1;
    let mut strings = builder.sections.remove(dynstr);
    let libc = strings.data.len() as u64;
    let (names, _) = string_table(&["libc.so.6"]);
    strings.data.extend_from_slice(&names[1..]);
    let dynsym = builder.index_of(".dynsym") as usize - 1;
    builder.sections.insert(dynsym + 1, strings);

    builder.section(
        ".note.gnu.build-id",
        elf::SHT_NOTE,
        note(enc, elf::NT_GNU_BUILD_ID, &[0xab, 0xcd, 0xef, 0x01]),
    );
    let mut link = b"app.debug\0\0\0".to_vec();
    enc.u32(&mut link, 0x1234_5678);
    builder.section(".gnu_debuglink", elf::SHT_PROGBITS, link);
    builder.dynamic(
        vec![
            (elf::DT_NEEDED, DynValue::Value(libc)),
            (elf::DT_STRTAB, DynValue::Address(".dynstr")),
            (elf::DT_STRSZ, DynValue::Size(".dynstr")),
            (elf::DT_SYMTAB, DynValue::Address(".dynsym")),
        ],
        Some(".dynstr"),
    );
    (builder.build(), libc)
}

#[test]
fn single_symbol_relative_to_image_base() {
    let image = executable().build();
    let mut recorder = Recorder::default();
    assert_eq!(visit(&image, VISIT_SYMBOLS, &mut recorder), 0);
    assert_eq!(recorder.events, [Event::Symbol(0x1000, "main".into())]);
}

#[test]
fn relocatable_addresses_are_absolute() {
    let mut builder = executable();
    builder.load_base = None;
    builder.e_type = elf::ET_REL;
    let image = builder.build();
    let mut recorder = Recorder::default();
    assert_eq!(visit(&image, VISIT_SYMBOLS, &mut recorder), 0);
    assert_eq!(recorder.events, [Event::Symbol(0x40_1000, "main".into())]);
}

#[test]
fn everything() {
    let (image, libc) = full();
    let mut recorder = Recorder::default();
    assert_eq!(visit(&image, VISIT_ALL, &mut recorder), 0);

    let segment = |name: &str| {
        let section = image.section(name);
        Event::Segment(section.sh_addr - 0x40_0000, section.sh_size, name.into())
    };
    let mut expected = vec![segment(".interp"), segment(".text"), segment(".dynamic")];
    expected.extend(dynamic_events(&image, libc));
    expected.extend(vec![
        Event::Interp("/lib64/ld-linux-x86-64.so.2".into()),
        Event::Symbol(0x1000, "main".into()),
        Event::Symbol(0x2000, "state".into()),
        Event::Symbol(0x800, "exported".into()),
        Event::BuildId("abcdef01".into()),
        Event::DebugLink("app.debug".into(), 0x1234_5678),
    ]);
    assert_eq!(recorder.events, expected);
}

#[test]
fn selected_parts_only() {
    let (image, libc) = full();
    let mut recorder = Recorder::default();
    assert_eq!(visit(&image, VISIT_DYNINFO | VISIT_BUILDID, &mut recorder), 0);
    let mut expected = dynamic_events(&image, libc);
    expected.push(Event::BuildId("abcdef01".into()));
    assert_eq!(recorder.events, expected);
}

#[test]
fn callback_stops_the_visit() {
    let (image, libc) = full();
    let mut recorder = Recorder {
        stop_at: Some(9),
        stop_code: 7,
        ..Default::default()
    };
    assert_eq!(visit(&image, VISIT_ALL, &mut recorder), 7);
    assert_eq!(recorder.events.len(), 10);
    assert_eq!(recorder.events[9], Event::Symbol(0x1000, "main".into()));

    // Stopping at a dynamic tag skips the interpreter and the symbols.
    let mut recorder = Recorder {
        stop_at: Some(0),
        stop_code: 3,
        ..Default::default()
    };
    assert_eq!(visit(&image, VISIT_ALL & !VISIT_SEGMENTS, &mut recorder), 3);
    assert_eq!(recorder.events, [dynamic_events(&image, libc)[0].clone()]);
}

#[test]
fn unreadable_section_headers_use_program_headers() {
    let (mut image, libc) = full();
    // A section 0 that is not null aborts the section headers under the
    // strict policy.
    let shoff = u64::from_le_bytes(image.data[0x28..0x30].try_into().unwrap()) as usize;
    image.data[shoff + 4] = elf::SHT_PROGBITS as u8;

    let mut reader = image.reader();
    reader.set_policy(strict_policy);
    let mut recorder = Recorder::default();
    assert_eq!(
        visit_reader(&mut reader, VISIT_DYNINFO | VISIT_SYMBOLS | VISIT_BUILDID, &mut recorder),
        0
    );
    assert!(reader.sections().is_empty());

    let mut expected = dynamic_events(&image, libc);
    expected.push(Event::Symbol(0x800, "exported".into()));
    // The build-id is found through the note segment, and there is none.
    assert_eq!(recorder.events, expected);
}

#[test]
fn files() {
    let (image, _) = full();
    let dir = std::env::temp_dir();
    let elf_path = dir.join(format!("elfread-visit-{}", std::process::id()));
    let text_path = dir.join(format!("elfread-visit-{}.txt", std::process::id()));
    std::fs::write(&elf_path, &image.data).unwrap();
    std::fs::write(&text_path, b"not an ELF file at all, just some text").unwrap();

    let mut recorder = Recorder::default();
    let found = visit_elf_symbols(&elf_path, VISIT_SYMBOLS, &mut recorder);
    let not_elf = visit_elf_symbols(&text_path, VISIT_ALL, &mut Recorder::default());
    let missing = visit_elf_symbols(dir.join("elfread-no-such-file"), VISIT_ALL, &mut Recorder::default());
    let _ = std::fs::remove_file(&elf_path);
    let _ = std::fs::remove_file(&text_path);

    assert_eq!(found, 0);
    assert_eq!(recorder.events.len(), 3);
    assert_eq!(not_elf, NOT_ELF);
    assert_eq!(missing, NOT_ELF);
}
