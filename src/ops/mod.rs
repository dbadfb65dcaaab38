//! Operation handlers (§4.4): one module per `.dynamic`/program-header concern the CLI
//! exposes. Handlers read current state through [`ElfFile`]'s accessors and queue edits
//! through its `SectionStore`/program-header mutation helpers; none of them touch file
//! offsets or virtual addresses directly, which is [`crate::layout`]'s job after every
//! handler has run.

pub mod execstack;
pub mod interp;
pub mod misc;
pub mod needed;
pub mod osabi;
pub mod rename;
pub mod rpath;
pub mod soname;
pub mod symver;

use std::collections::BTreeMap;

use typed_builder::TypedBuilder;

use crate::error::Result;
use crate::model::ElfFile;

pub use rpath::RpathOp;

/// The parsed, validated set of flags for one input file, collected by the CLI layer
/// into the strongly-typed plan every handler below consumes. Every field defaults to
/// "do nothing" so a no-flag invocation is the round-trip identity case (§8 scenario 1).
#[derive(Debug, Clone, Default, TypedBuilder)]
#[builder(field_defaults(default))]
pub struct Options {
    /// `--set-interpreter`
    pub set_interpreter: Option<String>,
    /// `--page-size`
    pub page_size: Option<u64>,
    /// `--set-os-abi`
    pub set_os_abi: Option<String>,
    /// `--set-soname`
    pub set_soname: Option<String>,
    /// `--set-rpath`/`--add-rpath`/`--remove-rpath`/`--shrink-rpath`, mutually exclusive
    pub rpath: Option<RpathOp>,
    /// `--force-rpath`
    pub force_rpath: bool,
    /// `--allowed-rpath-prefixes`, only meaningful alongside `Rpath::Shrink`
    pub allowed_rpath_prefixes: Vec<String>,
    /// `--add-needed`
    pub add_needed: Vec<String>,
    /// `--remove-needed`
    pub remove_needed: Vec<String>,
    /// `--replace-needed OLD NEW`
    pub replace_needed: Vec<(String, String)>,
    /// `--clear-symbol-version`
    pub clear_symbol_version: Vec<String>,
    /// `--rename-dynamic-symbols`, parsed into an old→new map by the CLI layer
    pub rename_dynamic_symbols: Option<BTreeMap<String, String>>,
    /// `--add-debug-tag`
    pub add_debug_tag: bool,
    /// `--no-default-lib`
    pub no_default_lib: bool,
    /// `--set-execstack`/`--clear-execstack`
    pub execstack: Option<bool>,
    /// `--no-sort`
    pub no_sort: bool,
}

/// Apply every mutation named in `options` to `file`, in the fixed order laid out by
/// §4.4: interpreter and OS/ABI first (header-only, no hash-table implications),
/// then soname/needed/rpath, then the symbol-table-affecting operations, then the
/// flag toggles, so that a rename always acts on the final `DT_NEEDED`/`DT_SONAME`
/// state rather than a stale one.
pub fn apply(file: &mut ElfFile, options: &Options) -> Result<()> {
    if let Some(page_size) = options.page_size {
        file.set_page_size(page_size)?;
    }
    if let Some(path) = &options.set_interpreter {
        interp::set(file, path);
    }
    if let Some(name) = &options.set_os_abi {
        osabi::set(file, name)?;
    }
    if let Some(name) = &options.set_soname {
        soname::set(file, name)?;
    }
    if let Some(op) = options.rpath.clone() {
        apply_rpath(file, op, options)?;
    }
    if !options.add_needed.is_empty() {
        needed::add(file, &options.add_needed)?;
    }
    if !options.remove_needed.is_empty() {
        needed::remove(file, &options.remove_needed)?;
    }
    for (old, new) in &options.replace_needed {
        needed::replace(file, old, new)?;
    }
    if !options.clear_symbol_version.is_empty() {
        symver::clear(file, &options.clear_symbol_version)?;
    }
    if let Some(map) = &options.rename_dynamic_symbols {
        rename::rename(file, map)?;
    }
    if options.add_debug_tag {
        misc::add_debug_tag(file)?;
    }
    if options.no_default_lib {
        misc::set_no_default_lib(file)?;
    }
    if let Some(executable) = options.execstack {
        execstack::set(file, executable);
    }
    crate::layout::rewrite_sections(file)?;
    if !options.no_sort {
        file.sort_program_headers();
    }
    Ok(())
}

fn apply_rpath(file: &mut ElfFile, op: RpathOp, options: &Options) -> Result<()> {
    match op {
        RpathOp::Shrink { allowed_prefixes, .. } => {
            let Some((_, current)) = rpath::current(file)? else { return Ok(()) };
            let prefixes = if allowed_prefixes.is_empty() { options.allowed_rpath_prefixes.clone() } else { allowed_prefixes };
            let needed_libs = needed::print(file)?;
            let machine = file.header.e_machine;
            let shrunk = rpath::shrink(&current, &needed_libs, &prefixes, machine, |dir, lib, machine| {
                let path = std::path::Path::new(dir).join(lib);
                let Ok(bytes) = std::fs::read(&path) else { return false };
                crate::header::elf::ElfHeader::peek_machine(&bytes).map(|m| m == machine).unwrap_or(false)
            });
            rpath::apply(file, RpathOp::Set(shrunk), options.force_rpath)
        }
        other => rpath::apply(file, other, options.force_rpath),
    }
}
