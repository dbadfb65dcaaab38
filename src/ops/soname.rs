//! `--set-soname`/`--print-soname`: `DT_SONAME`. Only meaningful for `ET_DYN`; the CLI
//! layer rejects the flag on an `ET_EXEC` input before calling here.

use crate::error::Result;
use crate::header::dynamic::dt;
use crate::model::ElfFile;

/// The current `DT_SONAME`, if any
pub fn print(file: &ElfFile) -> Result<Option<String>> {
    match file.dynamic_value(dt::SONAME)? {
        Some(offset) => Ok(Some(file.dynstr_at(offset as u32)?)),
        None => Ok(None),
    }
}

/// Set `DT_SONAME` to `name`, appending it to `.dynstr`
pub fn set(file: &mut ElfFile, name: &str) -> Result<()> {
    let offset = file.append_dynstr(name)?;
    file.set_dynamic_value(dt::SONAME, offset as u64)
}
