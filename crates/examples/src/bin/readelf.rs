//! Example that dumps the structure of ELF files.

use clap::{Arg, ArgAction, Command};
use elfread_examples::readelf;
use std::path::PathBuf;
use std::{fs, io};

fn main() {
    let matches = Command::new("readelf")
        .arg(
            Arg::new("file")
                .action(ArgAction::Append)
                .required(true)
                .value_parser(clap::value_parser!(PathBuf))
                .help("The file to read"),
        )
        .arg(
            Arg::new("file-header")
                .long("file-header")
                .action(ArgAction::SetTrue)
                .help("Print the identification and file header"),
        )
        .arg(
            Arg::new("segments")
                .long("segments")
                .action(ArgAction::SetTrue)
                .help("Print the program headers"),
        )
        .arg(
            Arg::new("sections")
                .long("sections")
                .action(ArgAction::SetTrue)
                .help("Print the section headers"),
        )
        .arg(
            Arg::new("symbols")
                .long("symbols")
                .action(ArgAction::SetTrue)
                .help("Print the symbol table"),
        )
        .arg(
            Arg::new("dynamic-symbols")
                .long("dynamic-symbols")
                .action(ArgAction::SetTrue)
                .help("Print the dynamic symbols and their versions"),
        )
        .arg(
            Arg::new("relocations")
                .long("relocations")
                .action(ArgAction::SetTrue)
                .help("Print the relocation sections"),
        )
        .arg(
            Arg::new("dynamic")
                .long("dynamic")
                .action(ArgAction::SetTrue)
                .help("Print the dynamic tags"),
        )
        .arg(
            Arg::new("dynamic-relocations")
                .long("dynamic-relocations")
                .action(ArgAction::SetTrue)
                .help("Print the relocations located by dynamic tags"),
        )
        .arg(
            Arg::new("version-info")
                .long("version-info")
                .action(ArgAction::SetTrue)
                .help("Print the version definitions and requirements"),
        )
        .arg(
            Arg::new("notes")
                .long("notes")
                .action(ArgAction::SetTrue)
                .help("Print the notes, debug link and prelink base"),
        )
        .arg(
            Arg::new("eh-frame")
                .long("eh-frame")
                .action(ArgAction::SetTrue)
                .help("Print the .eh_frame call frame information"),
        )
        .arg(
            Arg::new("strict")
                .long("strict")
                .action(ArgAction::SetTrue)
                .help("Stop at the first malformed structure"),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .action(ArgAction::SetTrue)
                .help("Log diagnostics to stderr"),
        )
        .get_matches();
    let mut options = readelf::PrintOptions {
        file: matches.get_flag("file-header"),
        segments: matches.get_flag("segments"),
        sections: matches.get_flag("sections"),
        symbols: matches.get_flag("symbols"),
        dynamic_symbols: matches.get_flag("dynamic-symbols"),
        relocations: matches.get_flag("relocations"),
        dynamic: matches.get_flag("dynamic"),
        dynamic_relocations: matches.get_flag("dynamic-relocations"),
        versions: matches.get_flag("version-info"),
        notes: matches.get_flag("notes"),
        eh_frame: matches.get_flag("eh-frame"),
        ..readelf::PrintOptions::none()
    };
    if options == readelf::PrintOptions::none() {
        options = readelf::PrintOptions::all();
    }
    options.strict = matches.get_flag("strict");

    if matches.get_flag("verbose") {
        env_logger::builder()
            .format_level(false)
            .format_target(false)
            .filter_module("elfread", log::LevelFilter::Debug)
            .init();
    }

    let file_paths = matches.get_many::<PathBuf>("file").unwrap();
    let file_count = file_paths.len();
    for file_path in file_paths {
        if file_count > 1 {
            println!();
            println!("{}:", file_path.display());
        }

        let file = match fs::File::open(file_path) {
            Ok(file) => file,
            Err(err) => {
                println!("Failed to open file '{}': {}", file_path.display(), err);
                continue;
            }
        };
        let mmap = match unsafe { memmap2::Mmap::map(&file) } {
            Ok(mmap) => mmap,
            Err(err) => {
                println!("Failed to map file '{}': {}", file_path.display(), err);
                continue;
            }
        };
        let stdout = io::stdout();
        let stderr = io::stderr();
        readelf::print(&mut stdout.lock(), &mut stderr.lock(), &mmap, &options);
    }
}
