//! Command-line surface (§6): a `clap`-derived argument struct, `@file` argument
//! indirection, and the two-token-per-line rename map file format.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use clap::Parser;

use crate::error::{Error, Result};
use crate::ops::{Options, RpathOp};

/// Every flag and positional argument this tool accepts, before validation
#[derive(Parser, Debug)]
#[command(
    name = "elfpatch",
    version,
    about = "Modify properties of already-linked ELF executables and shared objects in place"
)]
pub struct Cli {
    /// Replace `.interp`
    #[arg(long = "set-interpreter", value_name = "PATH")]
    pub set_interpreter: Option<String>,
    /// Print `.interp` minus its trailing NUL
    #[arg(long = "print-interpreter")]
    pub print_interpreter: bool,

    /// Override the machine-derived page size
    #[arg(long = "page-size", value_name = "N")]
    pub page_size: Option<u64>,

    /// Print the current `e_ident[EI_OSABI]` name
    #[arg(long = "print-os-abi")]
    pub print_os_abi: bool,
    /// Set `e_ident[EI_OSABI]` from a known name
    #[arg(long = "set-os-abi", value_name = "NAME")]
    pub set_os_abi: Option<String>,

    /// Print the current `DT_SONAME`
    #[arg(long = "print-soname")]
    pub print_soname: bool,
    /// Set `DT_SONAME`
    #[arg(long = "set-soname", value_name = "S")]
    pub set_soname: Option<String>,

    /// Set `DT_RPATH`/`DT_RUNPATH` verbatim
    #[arg(long = "set-rpath", value_name = "R")]
    pub set_rpath: Option<String>,
    /// Append to the existing rpath
    #[arg(long = "add-rpath", value_name = "R")]
    pub add_rpath: Option<String>,
    /// Remove `DT_RPATH`/`DT_RUNPATH` entirely
    #[arg(long = "remove-rpath")]
    pub remove_rpath: bool,
    /// Drop rpath directories that hold no needed library
    #[arg(long = "shrink-rpath")]
    pub shrink_rpath: bool,
    /// Print the current rpath/runpath
    #[arg(long = "print-rpath")]
    pub print_rpath: bool,
    /// Restrict `--shrink-rpath` removal to directories under these prefixes
    #[arg(long = "allowed-rpath-prefixes", value_name = "P:P:...", value_delimiter = ':')]
    pub allowed_rpath_prefixes: Vec<String>,
    /// Keep (or convert to) `DT_RPATH` rather than the default `DT_RUNPATH`
    #[arg(long = "force-rpath")]
    pub force_rpath: bool,

    /// Add a `DT_NEEDED` entry
    #[arg(long = "add-needed", value_name = "L")]
    pub add_needed: Vec<String>,
    /// Remove matching `DT_NEEDED` entries
    #[arg(long = "remove-needed", value_name = "L")]
    pub remove_needed: Vec<String>,
    /// Repoint `DT_NEEDED` entries naming OLD at NEW, given as `OLD NEW` pairs
    #[arg(long = "replace-needed", value_names = ["OLD", "NEW"], num_args = 2)]
    pub replace_needed: Vec<String>,
    /// Print the current `DT_NEEDED` libraries
    #[arg(long = "print-needed")]
    pub print_needed: bool,

    /// Force the named dynamic symbol's version to the base/local version
    #[arg(long = "clear-symbol-version", value_name = "SYM")]
    pub clear_symbol_version: Vec<String>,
    /// Rename dynamic symbols from a two-token-per-line map file
    #[arg(long = "rename-dynamic-symbols", value_name = "FILE")]
    pub rename_dynamic_symbols: Option<PathBuf>,

    /// Ensure a `DT_DEBUG` entry exists
    #[arg(long = "add-debug-tag")]
    pub add_debug_tag: bool,
    /// Set `DF_1_NODEFLIB`
    #[arg(long = "no-default-lib")]
    pub no_default_lib: bool,

    /// Print whether the stack is executable
    #[arg(long = "print-execstack")]
    pub print_execstack: bool,
    /// Clear `PT_GNU_STACK`'s `PF_X` bit
    #[arg(long = "clear-execstack")]
    pub clear_execstack: bool,
    /// Set `PT_GNU_STACK`'s `PF_X` bit
    #[arg(long = "set-execstack")]
    pub set_execstack: bool,

    /// Skip the program/section header sort
    #[arg(long = "no-sort")]
    pub no_sort: bool,

    /// Write the result to a distinct path (requires exactly one input)
    #[arg(long = "output", value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Verbose logging (also enabled via `PATCHELF_DEBUG`)
    #[arg(long = "debug")]
    pub debug: bool,

    /// Input ELF files
    pub inputs: Vec<PathBuf>,
}

impl Cli {
    /// Parse `argv` after expanding any `@file` arguments
    pub fn parse_argv(argv: Vec<String>) -> Result<Self> {
        let expanded = expand_at_files(argv)?;
        Self::try_parse_from(expanded).map_err(|e| Error::malformed(e.to_string()))
    }
}

/// Replace any argument beginning with `@` with the whitespace-separated contents of
/// the file it names
fn expand_at_files(args: Vec<String>) -> Result<Vec<String>> {
    let mut out = Vec::with_capacity(args.len());
    for arg in args {
        match arg.strip_prefix('@') {
            Some(path) => {
                let contents = std::fs::read_to_string(path)?;
                out.extend(contents.split_whitespace().map(str::to_string));
            }
            None => out.push(arg),
        }
    }
    Ok(out)
}

/// Parse a `--rename-dynamic-symbols` map file: one `OLD NEW` pair per line,
/// whitespace-separated, blank lines and `#`-prefixed comments ignored
fn parse_rename_map(path: &Path) -> Result<BTreeMap<String, String>> {
    let contents = std::fs::read_to_string(path)?;
    let mut map = BTreeMap::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut tokens = line.split_whitespace();
        let old = tokens.next().ok_or_else(|| Error::malformed("rename map line missing old name"))?;
        let new = tokens.next().ok_or_else(|| Error::malformed("rename map line missing new name"))?;
        if new.contains('@') {
            return Err(Error::VersionedRenameName(new.to_string()));
        }
        if map.insert(old.to_string(), new.to_string()).is_some() {
            return Err(Error::DuplicateRenameKey(old.to_string()));
        }
    }
    Ok(map)
}

/// Validate the rpath flags and turn the parsed CLI into the [`Options`] plan
/// [`crate::ops::apply`] consumes
pub fn build_options(cli: &Cli) -> Result<Options> {
    let rpath_flag_count = [cli.set_rpath.is_some(), cli.add_rpath.is_some(), cli.remove_rpath, cli.shrink_rpath]
        .into_iter()
        .filter(|set| *set)
        .count();
    if rpath_flag_count > 1 {
        return Err(Error::ConflictingOptions(
            "at most one of --set-rpath/--add-rpath/--remove-rpath/--shrink-rpath".to_string(),
        ));
    }

    let rpath = if let Some(r) = &cli.set_rpath {
        Some(RpathOp::Set(r.clone()))
    } else if let Some(r) = &cli.add_rpath {
        Some(RpathOp::Add(r.clone()))
    } else if cli.remove_rpath {
        Some(RpathOp::Remove)
    } else if cli.shrink_rpath {
        Some(RpathOp::Shrink { needed: Vec::new(), allowed_prefixes: cli.allowed_rpath_prefixes.clone() })
    } else {
        None
    };

    let replace_needed: Vec<(String, String)> =
        cli.replace_needed.chunks(2).map(|pair| (pair[0].clone(), pair[1].clone())).collect();

    let rename_dynamic_symbols = cli.rename_dynamic_symbols.as_deref().map(parse_rename_map).transpose()?;

    let execstack = match (cli.set_execstack, cli.clear_execstack) {
        (true, true) => {
            return Err(Error::ConflictingOptions("--set-execstack and --clear-execstack".to_string()))
        }
        (true, false) => Some(true),
        (false, true) => Some(false),
        (false, false) => None,
    };

    Ok(Options::builder()
        .set_interpreter(cli.set_interpreter.clone())
        .page_size(cli.page_size)
        .set_os_abi(cli.set_os_abi.clone())
        .set_soname(cli.set_soname.clone())
        .rpath(rpath)
        .force_rpath(cli.force_rpath)
        .allowed_rpath_prefixes(cli.allowed_rpath_prefixes.clone())
        .add_needed(cli.add_needed.clone())
        .remove_needed(cli.remove_needed.clone())
        .replace_needed(replace_needed)
        .clear_symbol_version(cli.clear_symbol_version.clone())
        .rename_dynamic_symbols(rename_dynamic_symbols)
        .add_debug_tag(cli.add_debug_tag)
        .no_default_lib(cli.no_default_lib)
        .execstack(execstack)
        .no_sort(cli.no_sort)
        .build())
}
