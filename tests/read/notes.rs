use elfread::elf;
use elfread::read::elf::DebugLink;
use elfread::Endianness;

use crate::common::{align, ElfBuilder, Encoder, Segment};

fn note(enc: Encoder, name: &[u8], n_type: u32, desc: &[u8]) -> Vec<u8> {
    let mut data = Vec::new();
    enc.u32(&mut data, name.len() as u32);
    enc.u32(&mut data, desc.len() as u32);
    enc.u32(&mut data, n_type);
    data.extend_from_slice(name);
    data.resize(align(data.len() as u64, 4) as usize, 0);
    data.extend_from_slice(desc);
    data.resize(align(data.len() as u64, 4) as usize, 0);
    data
}

fn debuglink(name: &str, crc: [u8; 4]) -> Vec<u8> {
    let mut data = name.as_bytes().to_vec();
    data.push(0);
    data.resize(align(data.len() as u64, 4) as usize, 0);
    data.extend_from_slice(&crc);
    data
}

#[test]
fn build_id_from_sections_and_segments() {
    let mut builder = ElfBuilder::new(Endianness::Big, true);
    builder.load_base = Some(0x1000_0000);
    let enc = builder.enc;
    let id = [0x5e, 0xed, 0x00, 0x42, 0x9a];
    let mut data = note(enc, b"GNU\0", elf::NT_GNU_ABI_TAG, &[0; 16]);
    data.extend(note(enc, b"GNU\0", elf::NT_GNU_BUILD_ID, &id));
    builder.section(".note.gnu.build-id", elf::SHT_NOTE, data).header.sh_addralign = 4;
    builder.section(".note.go", elf::SHT_NOTE, note(enc, b"Go\0", 4, b"v1.21"));
    builder.segments.push(Segment {
        header: elf::ProgramHeader {
            p_type: elf::PT_NOTE,
            ..Default::default()
        },
        section: Some(".note.gnu.build-id".into()),
    });
    let image = builder.build();
    let mut reader = image.open();

    let notes = reader.read_notes().unwrap();
    // The segment repeats the notes of the first section.
    assert_eq!(notes.len(), 5);
    assert_eq!(notes.build_id().as_deref(), Some("5eed00429a"));
    let go: Vec<_> = notes.iter().filter(|note| !note.is_gnu()).collect();
    assert_eq!(go.len(), 1);
    assert_eq!(go[0].name_lossy(), "Go");
    assert_eq!(go[0].desc, b"v1.21");
}

#[test]
fn no_notes() {
    let mut builder = ElfBuilder::new(Endianness::Little, true);
    builder.section(".text", elf::SHT_PROGBITS, vec![0xc3]);
    let mut reader = builder.build().open();
    let notes = reader.read_notes().unwrap();
    assert!(notes.is_empty());
    assert_eq!(notes.build_id(), None);
    assert_eq!(reader.read_gnu_debuglink(), Ok(None));
}

#[test]
fn gnu_debuglink() {
    let mut builder = ElfBuilder::new(Endianness::Big, false);
    let data = debuglink("app.debug", 0xcbf4_3926u32.to_be_bytes());
    builder.section(".gnu_debuglink", elf::SHT_PROGBITS, data);
    let mut reader = builder.build().open();
    let link = reader.read_gnu_debuglink().unwrap().unwrap();
    assert_eq!(
        link,
        DebugLink {
            name: "app.debug".into(),
            crc: 0xcbf4_3926,
        }
    );
    #[cfg(feature = "crc")]
    assert!(link.matches(b"123456789"));
}

#[test]
fn debuglink_uses_declared_byte_order() {
    // A little endian x86 file whose identification claims big endian.
    let mut builder = ElfBuilder::new(Endianness::Little, false);
    builder.e_machine = elf::EM_386;
    builder.section(
        ".gnu_debuglink",
        elf::SHT_PROGBITS,
        debuglink("x.debug", 0x0102_0304u32.to_be_bytes()),
    );
    let mut image = builder.build();
    image.data[elf::EI_DATA] = elf::ELFDATA2MSB;

    let mut reader = image.reader();
    reader.set_policy(elfread::read::silent_policy);
    reader.read_ident().unwrap();
    reader.read_header().unwrap();
    reader.read_section_headers().unwrap();
    assert_eq!(reader.endianness(), Endianness::Little);
    let link = reader.read_gnu_debuglink().unwrap().unwrap();
    assert_eq!(link.name, "x.debug");
    assert_eq!(link.crc, 0x0102_0304);
}

#[cfg(feature = "crc")]
#[test]
fn verify_debug_file() {
    let path = std::env::temp_dir().join(format!("elfread-debuglink-{}", std::process::id()));
    std::fs::write(&path, b"123456789").unwrap();
    let link = DebugLink {
        name: "x".into(),
        crc: 0xcbf4_3926,
    };
    let verified = link.verify(&path);
    let _ = std::fs::remove_file(&path);
    assert!(verified.unwrap());
}
