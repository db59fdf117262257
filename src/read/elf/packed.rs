use crate::elf;
use crate::read::{Bytes, ParseDiagnostic, Result};

/// The magic of the Android `APS2` packed relocation encoding.
pub const APS2_MAGIC: [u8; 4] = *b"APS2";

const GROUPED_BY_INFO: i64 = 1;
const GROUPED_BY_OFFSET_DELTA: i64 = 2;
const GROUPED_BY_ADDEND: i64 = 4;
const GROUP_HAS_ADDEND: i64 = 8;

/// Decode a table of Android packed relocations.
///
/// `data` holds the whole table, starting with the 4-byte magic, and `size`
/// is the declared size of the table. A declared relocation count that is
/// not positive, or not smaller than `size`, gives an empty list. Only the
/// `APS2` encoding is supported.
pub fn decode_packed_relocations(data: &[u8], size: u64) -> Result<Vec<elf::Rela>> {
    let mut bytes = Bytes(data);
    let magic = match bytes.read_bytes(4) {
        Some(magic) => magic.0,
        None => return Ok(Vec::new()),
    };
    let count = match bytes.read_sleb128() {
        Some(count) if count > 0 && (count as u64) < size => count as u64,
        _ => return Ok(Vec::new()),
    };
    if magic != APS2_MAGIC {
        let mut unsupported = [0; 4];
        unsupported.copy_from_slice(magic);
        return Err(ParseDiagnostic::UnsupportedPackedRelocations { magic: unsupported });
    }
    Ok(decode_aps2(bytes, count))
}

/// Decode the body of an `APS2` table, which follows the magic and the count.
///
/// The offset and addend are running totals across all groups. Decoding
/// stops after `count` relocations, or at the first value that cannot be
/// decoded, in which case only the complete relocations are returned.
pub fn decode_aps2(mut data: Bytes<'_>, count: u64) -> Vec<elf::Rela> {
    let mut relocations = Vec::with_capacity(count.min(data.len() as u64) as usize);
    let mut rela = elf::Rela::default();
    rela.r_offset = match data.read_sleb128() {
        Some(offset) => offset as u64,
        None => return relocations,
    };

    while (relocations.len() as u64) < count {
        let group = match Group::read(&mut data, &mut rela) {
            Some(group) => group,
            None => break,
        };
        for _ in 0..group.count {
            if group.decode_next(&mut data, &mut rela).is_none() {
                return relocations;
            }
            relocations.push(rela);
            if relocations.len() as u64 == count {
                break;
            }
        }
    }
    relocations
}

#[derive(Debug)]
struct Group {
    count: i64,
    flags: i64,
    offset_delta: i64,
}

impl Group {
    // Read a group header, applying the values it shares to `rela`.
    fn read(data: &mut Bytes<'_>, rela: &mut elf::Rela) -> Option<Group> {
        let count = data.read_sleb128()?;
        let flags = data.read_sleb128()?;
        let mut group = Group {
            count,
            flags,
            offset_delta: 0,
        };
        if group.has(GROUPED_BY_OFFSET_DELTA) {
            group.offset_delta = data.read_sleb128()?;
        }
        if group.has(GROUPED_BY_INFO) {
            rela.r_info = data.read_sleb128()? as u64;
        }
        if group.has(GROUPED_BY_ADDEND) && group.has(GROUP_HAS_ADDEND) {
            rela.r_addend = rela.r_addend.wrapping_add(data.read_sleb128()?);
        } else if !group.has(GROUP_HAS_ADDEND) {
            rela.r_addend = 0;
        }
        Some(group)
    }

    fn has(&self, flag: i64) -> bool {
        self.flags & flag != 0
    }

    fn decode_next(&self, data: &mut Bytes<'_>, rela: &mut elf::Rela) -> Option<()> {
        let offset_delta = if self.has(GROUPED_BY_OFFSET_DELTA) {
            self.offset_delta
        } else {
            data.read_sleb128()?
        };
        rela.r_offset = rela.r_offset.wrapping_add(offset_delta as u64);
        if !self.has(GROUPED_BY_INFO) {
            rela.r_info = data.read_sleb128()? as u64;
        }
        if self.has(GROUP_HAS_ADDEND) && !self.has(GROUPED_BY_ADDEND) {
            rela.r_addend = rela.r_addend.wrapping_add(data.read_sleb128()?);
        }
        Some(())
    }
}
