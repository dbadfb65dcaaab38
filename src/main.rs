//! Binary entry point: parses the CLI, then for each input file runs queries and
//! mutations in sequence and persists the result atomically.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};

use elfpatch::cli::{build_options, Cli};
use elfpatch::error::Error;
use elfpatch::ops::{self, execstack, interp, needed, osabi, rpath, soname};
use elfpatch::{io, logging, ElfFile};

fn main() -> ExitCode {
    let argv: Vec<String> = std::env::args().collect();
    match run(argv) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("patchelf: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(argv: Vec<String>) -> Result<()> {
    let cli = Cli::parse_argv(argv).context("parsing arguments")?;
    logging::init(cli.debug);

    if cli.output.is_some() && cli.inputs.len() != 1 {
        return Err(Error::OutputRequiresSingleInput.into());
    }

    let options = build_options(&cli)?;
    for input in &cli.inputs {
        process_one(&cli, &options, input).with_context(|| input.display().to_string())?;
    }
    Ok(())
}

fn process_one(cli: &Cli, options: &ops::Options, path: &PathBuf) -> Result<()> {
    let bytes = io::read(path)?;
    let mut file = ElfFile::parse(bytes)?;

    run_queries(cli, &file)?;
    ops::apply(&mut file, options)?;

    let out = file.serialize()?;
    let destination = cli.output.as_ref().unwrap_or(path);
    io::write_atomic(destination, &out)?;
    log::info!("patched {}", path.display());
    Ok(())
}

/// Print-only flags are evaluated against the file's state *before* any mutation in
/// this invocation, matching how the original tool reports "what was here", not "what
/// this run produced"
fn run_queries(cli: &Cli, file: &ElfFile) -> Result<()> {
    if cli.print_interpreter {
        println!("{}", interp::print(file)?);
    }
    if cli.print_os_abi {
        println!("{}", osabi::print(file));
    }
    if cli.print_soname {
        if let Some(name) = soname::print(file)? {
            println!("{name}");
        }
    }
    if cli.print_rpath {
        println!("{}", rpath::print(file)?);
    }
    if cli.print_needed {
        for name in needed::print(file)? {
            println!("{name}");
        }
    }
    if cli.print_execstack {
        println!("{}", execstack::print(file));
    }
    Ok(())
}
