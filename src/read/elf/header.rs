use std::io::{Read, Seek};

use crate::elf;
use crate::endian::Endianness;
use crate::read::{ParseDiagnostic, Result};

use super::{ArchOps, ArchState, Reader, Stage};

// Machines whose loaders ignore the class and byte order in the
// identification: (machine, big endian, 64-bit).
const IDENT_OVERRIDES: &[(u16, bool, bool)] = &[
    (elf::EM_386, false, false),
    (elf::EM_486, false, false),
    (elf::EM_X86_64, false, true),
];

fn is_exec_or_dyn(e_type: u16) -> bool {
    e_type == elf::ET_EXEC || e_type == elf::ET_DYN
}

impl<R: Read + Seek> Reader<R> {
    /// Read and validate the identification.
    ///
    /// The file must be long enough to hold an ELF header of the declared
    /// class, and must have a valid magic, class and data encoding. On failure
    /// no state is retained.
    pub fn read_ident(&mut self) -> Result<()> {
        self.ident = elf::Ident::default();
        self.stage = Stage::Unstarted;

        let size = self.size();
        if size < elf::EI_NIDENT as u64 {
            return Err(ParseDiagnostic::InvalidIdent);
        }
        let mut bytes = [0; elf::EI_NIDENT];
        {
            let mut this = self.excursion();
            this.seek(0)?;
            this.read_exact(&mut bytes)?;
        }
        let ident = elf::Ident::parse(bytes);
        if !ident.is_valid() || ident.version != elf::EV_CURRENT {
            return Err(ParseDiagnostic::InvalidIdent);
        }
        let ehdr_size = elf::StructSizes::new(ident.is_64()).ehdr;
        if size < u64::from(ehdr_size) {
            return Err(ParseDiagnostic::InvalidIdent);
        }

        self.ident = ident;
        self.stage = Stage::IdentRead;
        Ok(())
    }

    /// Read and validate the file header.
    ///
    /// This decides the effective class and byte order, resolves the large
    /// section count and string table index escapes, and selects the
    /// machine-specific behaviour. Inconsistent table locations and entry
    /// sizes are reported as warnings; if the policy continues, the affected
    /// table is disabled or the standard entry size is used.
    pub fn read_header(&mut self) -> Result<()> {
        if self.stage < Stage::IdentRead {
            return Err(ParseDiagnostic::InvalidIdent);
        }

        let class = self.ident.class;
        if class != elf::ELFCLASS32 && class != elf::ELFCLASS64 {
            self.report(ParseDiagnostic::BadClass { class })?;
        }
        let data = self.ident.data;
        if data != elf::ELFDATA2LSB && data != elf::ELFDATA2MSB {
            self.report(ParseDiagnostic::BadEndianness {
                data,
                machine: None,
            })?;
        }

        let mut this = self.excursion();
        this.read_header_fields()
    }

    fn read_header_fields(&mut self) -> Result<()> {
        self.seek(elf::EI_NIDENT as u64)?;

        self.endian = Endianness::from_big_endian(self.ident.data == elf::ELFDATA2MSB);
        self.is_64 = self.ident.class == elf::ELFCLASS64;
        self.segment_64 = self.is_64;

        let mut header = elf::FileHeader::default();
        header.e_type = self.read_u16()?;
        header.e_machine = self.read_u16()?;

        if self.options.check_ident {
            self.check_ident(&mut header)?;
        }

        self.sizes = elf::StructSizes::new(self.is_64);
        let sizes = self.sizes;

        header.e_version = self.read_u32()?;
        header.e_entry = self.read_word()?;
        header.e_phoff = self.read_word()?;
        header.e_shoff = self.read_word()?;
        header.e_flags = self.read_u32()?;
        header.e_ehsize = self.read_u16()?;
        header.e_phentsize = self.read_u16()?;
        header.e_phnum = self.read_u16()?;
        header.e_shentsize = self.read_u16()?;
        header.e_shnum = self.read_u16()?;
        header.e_shstrndx = self.read_u16()?;

        if header.e_ehsize != sizes.ehdr {
            self.report(ParseDiagnostic::BadEhsize {
                actual: header.e_ehsize,
                expected: sizes.ehdr,
            })?;
        }

        // Program header table.
        if (header.e_phnum == 0) != (header.e_phoff == 0) {
            self.report(ParseDiagnostic::BadPhloc {
                phoff: header.e_phoff,
                phnum: header.e_phnum,
            })?;
            header.set_no_pht();
        }
        if header.has_pht() && header.e_phentsize != sizes.phdr {
            self.report(ParseDiagnostic::BadPhentsize {
                actual: header.e_phentsize,
                expected: sizes.phdr,
            })?;
            if header.e_phentsize < sizes.phdr {
                return Err(ParseDiagnostic::BadPhentsize {
                    actual: header.e_phentsize,
                    expected: sizes.phdr,
                });
            }
            header.e_phentsize = sizes.phdr;
        }

        // If the real section count does not fit in `e_shnum`, it is stored in
        // `sh_size` of section 0.
        let mut section_zero = None;
        if header.e_shnum == 0 && header.e_shoff != 0 && header.e_shoff < self.size() {
            self.seek(header.e_shoff)?;
            if let Ok(sh0) = self.read_section_header() {
                if sh0.sh_type == elf::SHT_NULL {
                    section_zero = Some(sh0);
                }
            }
        }
        header.real_shnum = match section_zero {
            Some(sh0) => sh0.sh_size,
            None => u64::from(header.e_shnum),
        };

        // Section header table.
        if (header.real_shnum == 0) != (header.e_shoff == 0) {
            self.report(ParseDiagnostic::BadShloc {
                shoff: header.e_shoff,
                shnum: header.real_shnum,
            })?;
            header.set_no_sht();
        }
        if header.has_sht() && header.e_shentsize != sizes.shdr {
            let vetoed = self
                .report(ParseDiagnostic::BadShentsize {
                    actual: header.e_shentsize,
                    expected: sizes.shdr,
                })
                .is_err();
            if vetoed || header.e_shentsize < sizes.shdr {
                header.set_no_sht();
            }
        }
        if header.has_sht() {
            let start = header.e_shoff;
            let finish = header
                .real_shnum
                .checked_mul(u64::from(header.e_shentsize))
                .and_then(|len| len.checked_add(start));
            let in_bounds = match finish {
                Some(finish) => start <= finish && finish <= self.size(),
                None => false,
            };
            if !in_bounds {
                self.report(ParseDiagnostic::BadShloc {
                    shoff: header.e_shoff,
                    shnum: header.real_shnum,
                })?;
                header.set_no_sht();
            }
        }

        if header.has_sht() {
            // If the real index does not fit in `e_shstrndx`, it is stored in
            // `sh_link` of section 0.
            header.real_shstrndx = match section_zero {
                Some(sh0) if header.e_shstrndx == elf::SHN_XINDEX && sh0.sh_link != 0 => {
                    sh0.sh_link
                }
                _ => u32::from(header.e_shstrndx),
            };
            if header.real_shstrndx > 0 && u64::from(header.real_shstrndx) >= header.real_shnum {
                self.report(ParseDiagnostic::BadShstrndx {
                    index: header.real_shstrndx,
                    max: header.real_shnum,
                })?;
                header.real_shstrndx = 0;
            }
        }

        if header.has_pht() && header.e_type == elf::ET_REL {
            self.report(ParseDiagnostic::ConflictingFileType)?;
        }

        self.arch = ArchOps::for_machine(header.e_machine);
        self.arch_state = ArchState::new(self.options.track_mapping_symbols);
        self.segment_64 = (self.arch.segment_64)(&header, self.segment_64);

        self.sections.reset(header.e_shoff, header.e_shentsize);
        self.segments.reset();
        self.header = header;
        self.stage = Stage::HeaderRead;
        Ok(())
    }

    // Some loaders ignore the class and byte order fields for x86, so files
    // exist whose identification disagrees with their contents. Decide the
    // effective byte order and class from the machine instead.
    fn check_ident(&mut self, header: &mut elf::FileHeader) -> Result<()> {
        let big_endian = self.endian.is_big_endian();
        for &(machine, machine_msb, machine_64) in IDENT_OVERRIDES {
            let swap = if big_endian == machine_msb
                && header.e_machine == machine
                && is_exec_or_dyn(header.e_type)
            {
                false
            } else if big_endian != machine_msb
                && header.e_machine.swap_bytes() == machine
                && is_exec_or_dyn(header.e_type.swap_bytes())
            {
                true
            } else {
                continue;
            };

            if swap {
                header.e_machine = header.e_machine.swap_bytes();
                header.e_type = header.e_type.swap_bytes();
                self.report(ParseDiagnostic::BadEndianness {
                    data: self.ident.data,
                    machine: Some(machine),
                })?;
                self.endian = Endianness::from_big_endian(machine_msb);
            }
            // The segment bitness follows the machine, and 32-bit x86 files
            // are always read as ELF32.
            self.segment_64 = machine_64;
            if !machine_64 {
                self.is_64 = false;
            }
            break;
        }
        Ok(())
    }

    pub(crate) fn read_section_header(&mut self) -> Result<elf::SectionHeader> {
        Ok(elf::SectionHeader {
            sh_name: self.read_u32()?,
            sh_type: self.read_u32()?,
            sh_flags: self.read_word()?,
            sh_addr: self.read_word()?,
            sh_offset: self.read_word()?,
            sh_size: self.read_word()?,
            sh_link: self.read_u32()?,
            sh_info: self.read_u32()?,
            sh_addralign: self.read_word()?,
            sh_entsize: self.read_word()?,
        })
    }
}
