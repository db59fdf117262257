use std::io::{Cursor, Write};
use std::{fmt, str};

use elfread::read::elf::Reader;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrintOptions {
    pub file: bool,
    pub segments: bool,
    pub sections: bool,
    pub symbols: bool,
    pub relocations: bool,
    pub dynamic: bool,
    pub dynamic_symbols: bool,
    pub dynamic_relocations: bool,
    pub versions: bool,
    pub notes: bool,
    pub eh_frame: bool,
    /// Abort on the first warning instead of applying its fallback.
    pub strict: bool,
}

impl PrintOptions {
    pub fn all() -> Self {
        Self {
            file: true,
            segments: true,
            sections: true,
            symbols: true,
            relocations: true,
            dynamic: true,
            dynamic_symbols: true,
            dynamic_relocations: true,
            versions: true,
            notes: true,
            eh_frame: true,
            strict: false,
        }
    }

    pub fn none() -> Self {
        Self {
            file: false,
            segments: false,
            sections: false,
            symbols: false,
            relocations: false,
            dynamic: false,
            dynamic_symbols: false,
            dynamic_relocations: false,
            versions: false,
            notes: false,
            eh_frame: false,
            strict: false,
        }
    }
}

pub fn print(w: &'_ mut dyn Write, e: &'_ mut dyn Write, file: &[u8], options: &PrintOptions) {
    let mut printer = Printer::new(w, e, options);
    let mut reader = match Reader::new(Cursor::new(file)) {
        Ok(reader) => reader,
        Err(err) => {
            writeln!(printer.e, "Failed to create reader: {}", err).unwrap();
            return;
        }
    };
    if options.strict {
        reader.set_policy(elfread::read::strict_policy);
    }
    elf::print_elf(&mut printer, &mut reader);
}

struct Printer<'a> {
    w: &'a mut dyn Write,
    e: &'a mut dyn Write,
    options: &'a PrintOptions,
    indent: usize,
}

impl<'a> Printer<'a> {
    fn new(w: &'a mut dyn Write, e: &'a mut dyn Write, options: &'a PrintOptions) -> Self {
        Self {
            w,
            e,
            options,
            indent: 0,
        }
    }

    fn blank(&mut self) {
        writeln!(self.w).unwrap();
    }

    fn print_indent(&mut self) {
        if self.indent != 0 {
            write!(self.w, "{:-1$}", " ", self.indent * 4).unwrap();
        }
    }

    fn print_string(&mut self, s: &[u8]) {
        if let Ok(s) = str::from_utf8(s) {
            write!(self.w, "\"{}\"", s).unwrap();
        } else {
            write!(self.w, "{:X?}", s).unwrap();
        }
    }

    fn indent<F: FnOnce(&mut Self)>(&mut self, f: F) {
        self.indent += 1;
        f(self);
        self.indent -= 1;
    }

    fn group<F: FnOnce(&mut Self)>(&mut self, name: &str, f: F) {
        self.print_indent();
        writeln!(self.w, "{} {{", name).unwrap();
        self.indent(f);
        self.print_indent();
        writeln!(self.w, "}}").unwrap();
    }

    fn field_name(&mut self, name: &str) {
        self.print_indent();
        if !name.is_empty() {
            write!(self.w, "{}: ", name).unwrap();
        }
    }

    fn field<T: fmt::Display>(&mut self, name: &str, value: T) {
        self.field_name(name);
        writeln!(self.w, "{}", value).unwrap();
    }

    fn field_hex<T: fmt::UpperHex>(&mut self, name: &str, value: T) {
        self.field_name(name);
        writeln!(self.w, "0x{:X}", value).unwrap();
    }

    fn field_bytes(&mut self, name: &str, value: &[u8]) {
        self.field_name(name);
        writeln!(self.w, "{:X?}", value).unwrap();
    }

    fn field_debug<T: fmt::Debug>(&mut self, name: &str, value: T) {
        self.field_name(name);
        writeln!(self.w, "{:?}", value).unwrap();
    }

    fn field_string_option<T: fmt::UpperHex>(&mut self, name: &str, value: T, s: Option<&str>) {
        if let Some(s) = s {
            self.field_name(name);
            self.print_string(s.as_bytes());
            writeln!(self.w, " (0x{:X})", value).unwrap();
        } else {
            self.field_hex(name, value);
        }
    }

    fn field_inline_string(&mut self, name: &str, s: &[u8]) {
        self.field_name(name);
        self.print_string(s);
        writeln!(self.w).unwrap();
    }

    fn field_enum<T: Eq + fmt::UpperHex>(&mut self, name: &str, value: T, flags: &[Flag<T>]) {
        for flag in flags {
            if value == flag.value {
                self.field_name(name);
                writeln!(self.w, "{} (0x{:X})", flag.name, value).unwrap();
                return;
            }
        }
        self.field_hex(name, value);
    }

    fn field_enums<T: Eq + fmt::UpperHex>(&mut self, name: &str, value: T, enums: &[&[Flag<T>]]) {
        for flags in enums {
            for flag in *flags {
                if value == flag.value {
                    self.field_name(name);
                    writeln!(self.w, "{} (0x{:X})", flag.name, value).unwrap();
                    return;
                }
            }
        }
        self.field_hex(name, value);
    }

    fn flags<T: Into<u64>, U: Copy + Into<u64>>(&mut self, value: T, flags: &[Flag<U>]) {
        let value = value.into();
        self.indent(|p| {
            let mut known = 0;
            for flag in flags {
                let bits = flag.value.into();
                if value & bits == bits {
                    known |= bits;
                    p.print_indent();
                    writeln!(p.w, "{} (0x{:X})", flag.name, bits).unwrap();
                }
            }
            if value & !known != 0 {
                p.print_indent();
                writeln!(p.w, "<unknown> (0x{:X})", value & !known).unwrap();
            }
        });
    }
}

struct Flag<T> {
    value: T,
    name: &'static str,
}

macro_rules! flags {
    ($($name:ident),+ $(,)?) => ( [ $(Flag { value: $name, name: stringify!($name), }),+ ] )
}

trait PrintErr<T> {
    fn print_err(self, p: &mut Printer<'_>) -> Option<T>;
}

impl<T, E: fmt::Display> PrintErr<T> for Result<T, E> {
    fn print_err(self, p: &mut Printer<'_>) -> Option<T> {
        match self {
            Ok(val) => Some(val),
            Err(err) => {
                writeln!(p.e, "Error: {}", err).unwrap();
                None
            }
        }
    }
}

mod elf;
