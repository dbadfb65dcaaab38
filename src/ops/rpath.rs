//! `--set-rpath`/`--add-rpath`/`--remove-rpath`/`--shrink-rpath`/`--print-rpath`:
//! manages `DT_RPATH`/`DT_RUNPATH`. `DT_RPATH` is read in preference to `DT_RUNPATH`
//! when both happen to be present; on write, the result is promoted to `DT_RUNPATH`
//! unless `--force-rpath` asked to keep it as `DT_RPATH`.

use crate::error::Result;
use crate::header::dynamic::dt;
use crate::model::ElfFile;

/// The requested mutation, mirroring the CLI's mutually-exclusive rpath flags
#[derive(Debug, Clone)]
pub enum RpathOp {
    /// `--print-rpath`
    Print,
    /// `--remove-rpath`
    Remove,
    /// `--shrink-rpath`, filtered against `needed` and `allowed_prefixes`
    Shrink {
        /// The `DT_NEEDED` library names this binary requires
        needed: Vec<String>,
        /// If non-empty, only absolute directories under one of these prefixes are
        /// ever considered for removal; others are always kept
        allowed_prefixes: Vec<String>,
    },
    /// `--add-rpath R`
    Add(String),
    /// `--set-rpath R`
    Set(String),
}

/// The current `DT_RPATH`/`DT_RUNPATH` string, and which tag it came from
pub fn current(file: &ElfFile) -> Result<Option<(i64, String)>> {
    if let Some(v) = file.dynamic_value(dt::RPATH)? {
        return Ok(Some((dt::RPATH, file.dynstr_at(v as u32)?)));
    }
    if let Some(v) = file.dynamic_value(dt::RUNPATH)? {
        return Ok(Some((dt::RUNPATH, file.dynstr_at(v as u32)?)));
    }
    Ok(None)
}

/// The current rpath/runpath string, or empty if neither tag is present
pub fn print(file: &ElfFile) -> Result<String> {
    Ok(current(file)?.map(|(_, s)| s).unwrap_or_default())
}

/// Keep only the entries of `current` that are non-absolute (`$ORIGIN`-relative etc.,
/// always kept) or absolute and actually contain one of `needed` with a matching
/// `e_machine`, restricted to `allowed_prefixes` when non-empty. A directory holding
/// only a wrong-architecture library with the right name doesn't count: the loader
/// would never actually resolve the need there. `library_exists` is injected so this
/// stays a pure function over strings; the CLI layer wires it to real filesystem and
/// ELF-header checks, passing `machine` through unchanged so the check can compare it
/// against the candidate library's own `e_machine`.
pub fn shrink(
    current: &str,
    needed: &[String],
    allowed_prefixes: &[String],
    machine: u16,
    library_exists: impl Fn(&str, &str, u16) -> bool,
) -> String {
    current
        .split(':')
        .filter(|entry| !entry.is_empty())
        .filter(|entry| {
            if !entry.starts_with('/') {
                return true;
            }
            if !allowed_prefixes.is_empty() && !allowed_prefixes.iter().any(|p| entry.starts_with(p.as_str())) {
                return false;
            }
            needed.iter().any(|lib| library_exists(entry, lib, machine))
        })
        .collect::<Vec<_>>()
        .join(":")
}

/// Apply a non-[`RpathOp::Print`]/[`RpathOp::Shrink`] mutation (shrink's filesystem
/// dependency is resolved by the caller via [`shrink`], then applied through
/// [`RpathOp::Set`])
pub fn apply(file: &mut ElfFile, op: RpathOp, force_rpath: bool) -> Result<()> {
    let existing = current(file)?;
    match op {
        RpathOp::Print | RpathOp::Shrink { .. } => Ok(()),
        RpathOp::Remove => file.remove_dynamic_entries(&[dt::RPATH, dt::RUNPATH]),
        RpathOp::Add(addition) => {
            let new_value = match &existing {
                Some((_, cur)) if !cur.is_empty() => format!("{cur}:{addition}"),
                _ => addition,
            };
            write(file, &new_value, force_rpath)
        }
        RpathOp::Set(new_value) => write(file, &new_value, force_rpath),
    }
}

fn write(file: &mut ElfFile, value: &str, force_rpath: bool) -> Result<()> {
    let offset = file.append_dynstr(value)?;
    let tag = if force_rpath { dt::RPATH } else { dt::RUNPATH };
    let other = if force_rpath { dt::RUNPATH } else { dt::RPATH };
    file.remove_dynamic_entries(&[other])?;
    file.set_dynamic_value(tag, offset as u64)
}

#[cfg(test)]
mod test {
    use super::*;

    const X86_64: u16 = crate::header::elf::em::X86_64;
    const AARCH64: u16 = crate::header::elf::em::AARCH64;

    #[test]
    fn shrink_keeps_origin_relative_entries() {
        let result = shrink("$ORIGIN/../lib:/a:/b", &["libfoo.so".into()], &[], X86_64, |dir, lib, _| {
            dir == "/b" && lib == "libfoo.so"
        });
        assert_eq!(result, "$ORIGIN/../lib:/b");
    }

    #[test]
    fn shrink_drops_directories_without_a_needed_library() {
        let result =
            shrink("/a:/b:/c", &["libfoo.so".into()], &[], X86_64, |dir, lib, _| dir == "/b" && lib == "libfoo.so");
        assert_eq!(result, "/b");
    }

    #[test]
    fn shrink_respects_allowed_prefixes() {
        let result =
            shrink("/opt/lib:/usr/lib", &["libfoo.so".into()], &["/usr".into()], X86_64, |_, _, _| true);
        assert_eq!(result, "/usr/lib");
    }

    #[test]
    fn shrink_drops_a_directory_whose_library_is_the_wrong_machine_type() {
        // a directory can hold a file with the right name but the wrong architecture;
        // that shouldn't count as satisfying the need
        let result = shrink("/a:/b", &["libfoo.so".into()], &[], X86_64, |dir, lib, machine| {
            dir == "/b" && lib == "libfoo.so" && machine == AARCH64
        });
        assert_eq!(result, "");
    }
}
