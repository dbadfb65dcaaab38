//! `--add-needed`/`--remove-needed`/`--replace-needed`/`--print-needed`: manages
//! `DT_NEEDED` entries.

use crate::error::Result;
use crate::header::dynamic::dt;
use crate::model::{read_cstr, ElfFile};

/// The current `DT_NEEDED` library names, in `.dynamic` order
pub fn print(file: &ElfFile) -> Result<Vec<String>> {
    let dynstr = file.dynstr_bytes().unwrap_or_default();
    Ok(file
        .dynamic_entries()?
        .iter()
        .filter(|e| e.tag == dt::NEEDED)
        .map(|e| read_cstr(&dynstr, e.value as u32))
        .collect())
}

/// Add each name in `names` not already present, each as its own `.dynstr` entry and
/// its own `DT_NEEDED` tag
pub fn add(file: &mut ElfFile, names: &[String]) -> Result<()> {
    let existing = print(file)?;
    for name in names {
        if existing.contains(name) {
            continue;
        }
        let offset = file.append_dynstr(name)?;
        file.insert_dynamic_entry(dt::NEEDED, offset as u64)?;
    }
    Ok(())
}

/// Remove every `DT_NEEDED` entry naming one of `names`
pub fn remove(file: &mut ElfFile, names: &[String]) -> Result<()> {
    let dynstr = file.dynstr_bytes().unwrap_or_default();
    let targets: Vec<u64> = file
        .dynamic_entries()?
        .iter()
        .filter(|e| e.tag == dt::NEEDED)
        .filter(|e| names.contains(&read_cstr(&dynstr, e.value as u32)))
        .map(|e| e.value)
        .collect();
    for value in targets {
        file.remove_dynamic_entry(dt::NEEDED, value)?;
    }
    Ok(())
}

/// Repoint every `DT_NEEDED` entry naming `old` at a freshly-appended `.dynstr` entry
/// for `new`. Unlike [`remove`]/[`add`], this keeps the entry's original position.
pub fn replace(file: &mut ElfFile, old: &str, new: &str) -> Result<()> {
    let dynstr = file.dynstr_bytes().unwrap_or_default();
    let mut entries = file.dynamic_entries()?;
    let matches: Vec<usize> = entries
        .iter()
        .enumerate()
        .filter(|(_, e)| e.tag == dt::NEEDED && read_cstr(&dynstr, e.value as u32) == old)
        .map(|(i, _)| i)
        .collect();
    if matches.is_empty() {
        return Ok(());
    }
    let new_offset = file.append_dynstr(new)?;
    let mut entries = file.dynamic_entries()?;
    for idx in matches {
        entries[idx].value = u64::from(new_offset);
    }
    let bytes = crate::header::dynamic::write_all(&entries, &file.codec)?;
    file.sections.replace(".dynamic", bytes);
    Ok(())
}
