use std::io::{Read, Seek};
use std::slice;

use crate::elf;
use crate::read::Result;

use super::{Reader, Stage};

/// The location of the dynamic linking tables (`.dynamic`).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DynamicLinkingTables {
    /// The file offset, or 0 if the address is not mapped by any segment.
    pub offset: u64,
    /// The virtual address.
    pub addr: u64,
    /// The size in bytes.
    pub size: u64,
    /// The section index of the string table, if given by a section header.
    pub link: Option<u32>,
}

impl DynamicLinkingTables {
    /// Return true if the location is usable.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.offset != 0
    }
}

/// A range of the file that is loaded at a virtual address.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Mapping {
    /// The file offset.
    pub offset: u64,
    /// The size in the file.
    pub size: u64,
    /// The virtual address.
    pub addr: u64,
}

impl Mapping {
    fn contains_addr(&self, addr: u64) -> bool {
        self.addr <= addr && addr - self.addr < self.size
    }

    fn contains_offset(&self, offset: u64) -> bool {
        self.offset <= offset && offset - self.offset < self.size
    }
}

/// The program header table of a file.
#[derive(Debug, Clone)]
pub struct ProgramHeaders {
    initialized: bool,
    file_size: u64,
    headers: Vec<elf::ProgramHeader>,
    mappings: Vec<Mapping>,
    image_base: Option<u64>,
    dlt: Option<DynamicLinkingTables>,
}

impl ProgramHeaders {
    pub(crate) fn new(file_size: u64) -> Self {
        ProgramHeaders {
            initialized: false,
            file_size,
            headers: Vec::new(),
            mappings: Vec::new(),
            image_base: None,
            dlt: None,
        }
    }

    pub(crate) fn reset(&mut self) {
        *self = ProgramHeaders::new(self.file_size);
    }

    /// Return true if the program headers have been read.
    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// The number of program headers.
    #[inline]
    pub fn len(&self) -> usize {
        self.headers.len()
    }

    /// Return true if there are no program headers.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Iterate over the program headers.
    #[inline]
    pub fn iter(&self) -> slice::Iter<'_, elf::ProgramHeader> {
        self.headers.iter()
    }

    /// Return the program header at an index.
    pub fn get(&self, index: usize) -> Option<&elf::ProgramHeader> {
        self.headers.get(index)
    }

    /// The `PT_LOAD` mappings, in file order.
    #[inline]
    pub fn mappings(&self) -> &[Mapping] {
        &self.mappings
    }

    /// The lowest `PT_LOAD` address, rounded down to a page boundary.
    ///
    /// Returns `None` if there are no `PT_LOAD` segments.
    #[inline]
    pub fn image_base(&self) -> Option<u64> {
        self.image_base
    }

    /// The location of the dynamic linking tables given by `PT_DYNAMIC`.
    #[inline]
    pub fn dynamic_linking_tables(&self) -> Option<DynamicLinkingTables> {
        self.dlt
    }

    /// Translate a virtual address to a file offset.
    pub fn file_offset(&self, addr: u64) -> Option<u64> {
        self.mappings
            .iter()
            .find(|m| m.contains_addr(addr))
            .map(|m| addr - m.addr + m.offset)
    }

    /// Translate a file offset to a virtual address.
    pub fn file_vaddr(&self, offset: u64) -> Option<u64> {
        self.mappings
            .iter()
            .find(|m| m.contains_offset(offset))
            .map(|m| offset - m.offset + m.addr)
    }

    /// The number of bytes of a segment that are present in the file.
    ///
    /// Only `PT_LOAD`, `PT_INTERP`, `PT_NOTE` and `PT_PHDR` segments have
    /// contents. The size is bounded by the file size, and by the offset of
    /// the next segment if it starts later.
    pub fn size_in_file(&self, index: usize) -> u64 {
        let segment = match self.get(index) {
            Some(segment) => segment,
            None => return 0,
        };
        match segment.p_type {
            elf::PT_LOAD | elf::PT_INTERP | elf::PT_NOTE | elf::PT_PHDR => {}
            _ => return 0,
        }
        if segment.p_offset >= self.file_size {
            return 0;
        }
        let mut boundary = self.file_size;
        if let Some(next) = self.get(index + 1) {
            if next.p_offset >= segment.p_offset {
                boundary = next.p_offset;
            }
        }
        segment.p_filesz.min(boundary.saturating_sub(segment.p_offset))
    }

    fn add_mapping(&mut self, segment: &elf::ProgramHeader) {
        self.mappings.push(Mapping {
            offset: segment.p_offset,
            size: segment.p_filesz,
            addr: segment.p_vaddr,
        });
        let base = segment.p_vaddr & !(elf::ELF_PAGE_SIZE - 1);
        if self.image_base.map_or(true, |image_base| base < image_base) {
            self.image_base = Some(base);
        }
    }
}

impl<R: Read + Seek> Reader<R> {
    /// Read the program header table.
    ///
    /// Returns `Ok(false)` if the file has no program header table. If an
    /// entry cannot be read, the table is truncated before it and the read
    /// error is returned.
    pub fn read_program_headers(&mut self) -> Result<bool> {
        if !self.header.has_pht() {
            return Ok(false);
        }
        let phoff = self.header.e_phoff;
        let phentsize = u64::from(self.header.e_phentsize);
        // Never trust the count further than the file size allows.
        let available = self.size().saturating_sub(phoff) / phentsize.max(1);
        let count = u64::from(self.header.e_phnum).min(available) as usize;

        self.segments.reset();
        self.segments.initialized = true;
        if self.stage < Stage::TablesRead {
            self.stage = Stage::TablesRead;
        }

        let mut headers = Vec::with_capacity(count);
        let mut failure = None;
        {
            let mut this = self.excursion();
            for i in 0..count {
                let segment = this
                    .seek(phoff + i as u64 * phentsize)
                    .and_then(|()| this.read_program_header());
                match segment {
                    Ok(segment) => headers.push(segment),
                    Err(error) => {
                        failure = Some(error);
                        break;
                    }
                }
            }
        }

        let mut dynamic = None;
        for segment in &headers {
            match segment.p_type {
                elf::PT_LOAD => self.segments.add_mapping(segment),
                elf::PT_DYNAMIC => dynamic = Some(*segment),
                _ => {}
            }
        }
        self.segments.headers = headers;
        if let Some(error) = failure {
            return Err(error);
        }

        if let Some(dynamic) = dynamic {
            // Some producers leave `p_filesz` as 0, and `p_offset` can be
            // wrong, so locate the table by its address.
            self.segments.dlt = Some(DynamicLinkingTables {
                offset: self.segments.file_offset(dynamic.p_vaddr).unwrap_or(0),
                addr: dynamic.p_vaddr,
                size: dynamic.p_filesz.max(dynamic.p_memsz),
                link: None,
            });
        }
        Ok(true)
    }

    fn read_program_header(&mut self) -> Result<elf::ProgramHeader> {
        let mut segment = elf::ProgramHeader::default();
        segment.p_type = self.read_u32()?;
        if self.is_64 {
            segment.p_flags = self.read_u32()?;
        }
        segment.p_offset = self.read_word()?;
        segment.p_vaddr = self.read_word()?;
        segment.p_paddr = self.read_word()?;
        segment.p_filesz = self.read_word()?;
        segment.p_memsz = self.read_word()?;
        if !self.is_64 {
            segment.p_flags = self.read_u32()?;
        }
        segment.p_align = self.read_word()?;
        Ok(segment)
    }

    /// Read the contents of a segment.
    ///
    /// The size is limited to the end of the file.
    pub fn read_segment_contents(&mut self, segment: &elf::ProgramHeader) -> Result<Vec<u8>> {
        self.read_bytes_at(segment.p_offset, segment.p_filesz)
    }
}
