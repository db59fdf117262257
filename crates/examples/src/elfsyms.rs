use std::io::{Cursor, Write};
use std::path::Path;

use elfread::elf;
use elfread::read::elf::Reader;
use elfread::visit::{visit_elf_symbols, visit_reader, SymbolVisitor, NOT_ELF};

/// Returned from a callback once the symbol limit is reached.
pub const LIMIT_REACHED: i32 = 1;

/// Writes one line for each callback.
pub struct LinePrinter<'a> {
    w: &'a mut dyn Write,
    limit: Option<usize>,
    symbols: usize,
}

impl<'a> LinePrinter<'a> {
    pub fn new(w: &'a mut dyn Write, limit: Option<usize>) -> Self {
        LinePrinter {
            w,
            limit,
            symbols: 0,
        }
    }
}

impl<'a> SymbolVisitor for LinePrinter<'a> {
    fn visit_symbol(&mut self, address: u64, name: &str) -> i32 {
        if self.limit == Some(self.symbols) {
            return LIMIT_REACHED;
        }
        self.symbols += 1;
        writeln!(self.w, "symbol 0x{:x} {}", address, name).unwrap();
        0
    }

    fn visit_interp(&mut self, path: &str) -> i32 {
        writeln!(self.w, "interp {}", path).unwrap();
        0
    }

    fn visit_segment(&mut self, start: u64, size: u64, name: &str) -> i32 {
        writeln!(self.w, "segment 0x{:x} 0x{:x} {}", start, size, name).unwrap();
        0
    }

    fn visit_dyninfo(&mut self, tag: i64, name: &str, value: u64) -> i32 {
        let kind = match tag {
            elf::DT_NEEDED => "needed",
            elf::DT_SONAME => "soname",
            elf::DT_RPATH => "rpath",
            elf::DT_RUNPATH => "runpath",
            _ => {
                writeln!(self.w, "dynamic 0x{:x} 0x{:x}", tag, value).unwrap();
                return 0;
            }
        };
        writeln!(self.w, "{} {}", kind, name).unwrap();
        0
    }

    fn visit_buildid(&mut self, build_id: &str) -> i32 {
        writeln!(self.w, "buildid {}", build_id).unwrap();
        0
    }

    fn visit_debuglink(&mut self, name: &str, crc: u32) -> i32 {
        writeln!(self.w, "debuglink {} 0x{:08x}", name, crc).unwrap();
        0
    }
}

/// Print the parts of the file at `path` selected by `flags`.
pub fn print_file<P: AsRef<Path>>(
    w: &mut dyn Write,
    path: P,
    flags: u32,
    limit: Option<usize>,
) -> i32 {
    visit_elf_symbols(path, flags, &mut LinePrinter::new(w, limit))
}

/// Print the parts of an in-memory file selected by `flags`.
pub fn print(w: &mut dyn Write, file: &[u8], flags: u32, limit: Option<usize>) -> i32 {
    let mut reader = match Reader::new(Cursor::new(file)) {
        Ok(reader) => reader,
        Err(_) => return NOT_ELF,
    };
    visit_reader(&mut reader, flags, &mut LinePrinter::new(w, limit))
}
