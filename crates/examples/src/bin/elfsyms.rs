//! Example that reports symbols and linking metadata through the visitor driver.

use std::io;
use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Arg, ArgAction, Command};
use elfread::visit::{
    NOT_ELF, VISIT_ALL, VISIT_BUILDID, VISIT_DEBUGLINK, VISIT_DYNINFO, VISIT_INTERP,
    VISIT_SEGMENTS, VISIT_SYMBOLS,
};
use elfread_examples::elfsyms;

const FLAGS: &[(&str, u32, &str)] = &[
    ("symbols", VISIT_SYMBOLS, "Print function and object symbols"),
    ("interp", VISIT_INTERP, "Print the program interpreter"),
    ("segments", VISIT_SEGMENTS, "Print the allocated sections"),
    ("dyninfo", VISIT_DYNINFO, "Print the dynamic tags"),
    ("buildid", VISIT_BUILDID, "Print the GNU build-id"),
    ("debuglink", VISIT_DEBUGLINK, "Print the .gnu_debuglink name and CRC"),
];

fn main() -> Result<()> {
    let mut command = Command::new("elfsyms")
        .arg(
            Arg::new("file")
                .required(true)
                .value_parser(clap::value_parser!(PathBuf))
                .help("The file to read"),
        )
        .arg(
            Arg::new("limit")
                .long("limit")
                .value_name("count")
                .value_parser(clap::value_parser!(usize))
                .help("Stop after printing <count> symbols"),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .action(ArgAction::SetTrue)
                .help("Log diagnostics to stderr"),
        );
    for &(name, _, help) in FLAGS {
        command = command.arg(
            Arg::new(name)
                .long(name)
                .action(ArgAction::SetTrue)
                .help(help),
        );
    }
    let matches = command.get_matches();

    if matches.get_flag("verbose") {
        env_logger::builder()
            .format_level(false)
            .format_target(false)
            .filter_module("elfread", log::LevelFilter::Debug)
            .init();
    }

    let mut flags = FLAGS
        .iter()
        .filter(|&&(name, _, _)| matches.get_flag(name))
        .fold(0u32, |flags, &(_, flag, _)| flags | flag);
    if flags == 0 {
        flags = VISIT_ALL;
    }
    let limit = matches.get_one::<usize>("limit").copied();
    let path = matches.get_one::<PathBuf>("file").unwrap();

    let stdout = io::stdout();
    match elfsyms::print_file(&mut stdout.lock(), path, flags, limit) {
        0 | elfsyms::LIMIT_REACHED => Ok(()),
        NOT_ELF => bail!("'{}' is not a readable ELF file", path.display()),
        code => bail!("Visit of '{}' stopped with code {}", path.display(), code),
    }
}
