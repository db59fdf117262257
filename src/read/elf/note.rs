use std::io::{Read, Seek};
use std::slice;

use crate::elf;
use crate::endian::Endianness;
use crate::read::{align, hex_string, Bytes, Result};

use super::{Reader, WellKnownSection};

/// A note entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    /// The owner name, without the null terminator.
    pub name: Vec<u8>,
    /// The type of the note, interpreted according to the owner.
    pub n_type: u32,
    /// The descriptor.
    pub desc: Vec<u8>,
}

impl Note {
    /// Return true if the owner is `"GNU"`.
    #[inline]
    pub fn is_gnu(&self) -> bool {
        self.name == elf::ELF_NOTE_GNU
    }

    /// The owner name, lossily converted to a string.
    pub fn name_lossy(&self) -> String {
        String::from_utf8_lossy(&self.name).into_owned()
    }
}

/// Parse the note entries in a buffer.
///
/// Each entry is the three 32-bit words `namesz`, `descsz` and `type`,
/// followed by the name and the descriptor, each padded to a multiple of 4.
/// Parsing stops at the first entry that does not fit in the buffer.
pub fn parse_notes(data: &[u8], endian: Endianness) -> Vec<Note> {
    let mut notes = Vec::new();
    let mut offset = 0;
    while offset < data.len() {
        match parse_note(data, offset, endian) {
            Some((note, next)) => {
                notes.push(note);
                offset = next;
            }
            None => break,
        }
    }
    notes
}

// Parse the entry at `offset`, returning it with the offset of the next entry.
fn parse_note(data: &[u8], offset: usize, endian: Endianness) -> Option<(Note, usize)> {
    let mut header = Bytes(data);
    header.skip(offset)?;
    let namesz = header.read_u32(endian)? as usize;
    let descsz = header.read_u32(endian)? as usize;
    let n_type = header.read_u32(endian)?;

    let name_offset = offset.checked_add(12)?;
    let name = Bytes(data).read_bytes_at(name_offset, namesz)?.0;
    let name = match memchr::memchr(0, name) {
        Some(end) => &name[..end],
        None => name,
    };
    let desc_offset = name_offset.checked_add(align(namesz, 4))?;
    let desc = Bytes(data).read_bytes_at(desc_offset, descsz)?.0;
    let next = desc_offset.checked_add(align(descsz, 4))?;
    Some((
        Note {
            name: name.to_vec(),
            n_type,
            desc: desc.to_vec(),
        },
        next,
    ))
}

/// The notes of a file, from every `SHT_NOTE` section and `PT_NOTE` segment.
#[derive(Debug, Default, Clone)]
pub struct Notes {
    notes: Vec<Note>,
}

impl Notes {
    /// Add the notes parsed from a buffer.
    pub fn add(&mut self, data: &[u8], endian: Endianness) {
        self.notes.extend(parse_notes(data, endian));
    }

    /// The number of notes.
    #[inline]
    pub fn len(&self) -> usize {
        self.notes.len()
    }

    /// Return true if there are no notes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Iterate over the notes.
    #[inline]
    pub fn iter(&self) -> slice::Iter<'_, Note> {
        self.notes.iter()
    }

    /// The GNU build ID, as lowercase hex.
    pub fn build_id(&self) -> Option<String> {
        self.notes
            .iter()
            .find(|note| note.is_gnu() && note.n_type == elf::NT_GNU_BUILD_ID)
            .map(|note| hex_string(&note.desc))
    }
}

/// The contents of a `.gnu_debuglink` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugLink {
    /// The file name of the separate debug file.
    pub name: String,
    /// The CRC32 of the separate debug file.
    pub crc: u32,
}

impl DebugLink {
    /// Parse the contents of a `.gnu_debuglink` section.
    ///
    /// The CRC is stored in the last 4 bytes, in the byte order declared by
    /// the file identification. Returns `None` if the data is too short.
    pub fn parse(data: &[u8], endian: Endianness) -> Option<DebugLink> {
        if data.len() <= 4 {
            return None;
        }
        let (name, crc) = data.split_at(data.len() - 4);
        let mut crc = Bytes(crc);
        let crc = crc.read_u32(endian)?;
        let name = match memchr::memchr(0, name) {
            Some(end) => &name[..end],
            None => name,
        };
        Some(DebugLink {
            name: String::from_utf8_lossy(name).into_owned(),
            crc,
        })
    }

    /// Return true if the CRC32 of `data` matches the recorded CRC.
    #[cfg(feature = "crc")]
    pub fn matches(&self, data: &[u8]) -> bool {
        crc32fast::hash(data) == self.crc
    }

    /// Return true if the CRC32 of a candidate debug file matches.
    #[cfg(feature = "crc")]
    pub fn verify<P: AsRef<std::path::Path>>(&self, path: P) -> std::io::Result<bool> {
        let mut file = std::fs::File::open(path)?;
        let mut hasher = crc32fast::Hasher::new();
        let mut buf = vec![0; 64 * 1024];
        loop {
            let n = file.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(hasher.finalize() == self.crc)
    }
}

impl<R: Read + Seek> Reader<R> {
    /// Read the notes of every `SHT_NOTE` section and `PT_NOTE` segment.
    ///
    /// Notes that appear in both a section and a segment are listed twice.
    pub fn read_notes(&mut self) -> Result<Notes> {
        let mut notes = Notes::default();
        let endian = self.endian;

        let sections: Vec<_> = self
            .sections
            .iter()
            .filter(|section| section.sh_type == elf::SHT_NOTE)
            .copied()
            .collect();
        for section in &sections {
            let data = self.read_section_contents(section)?;
            notes.add(&data, endian);
        }

        let segments: Vec<_> = self
            .segments
            .iter()
            .filter(|segment| segment.p_type == elf::PT_NOTE)
            .copied()
            .collect();
        for segment in &segments {
            let data = self.read_segment_contents(segment)?;
            notes.add(&data, endian);
        }
        Ok(notes)
    }

    /// Read the `.gnu_debuglink` section.
    ///
    /// Returns `None` if there is no such section or it is too short.
    pub fn read_gnu_debuglink(&mut self) -> Result<Option<DebugLink>> {
        let section = match self.sections.well_known(WellKnownSection::GnuDebuglink) {
            Some(section) => *section,
            None => return Ok(None),
        };
        let data = self.read_section_contents(&section)?;
        let declared = Endianness::from_big_endian(self.ident.is_msb());
        Ok(DebugLink::parse(&data, declared))
    }
}
