//! `--set-interpreter`/`--print-interpreter`: `.interp` and its `PT_INTERP` segment.
//! The segment itself is re-synced to the section by the layout engine
//! ([`crate::layout::write_sections`]); this handler only ever touches the section
//! bytes.

use crate::error::Result;
use crate::model::ElfFile;

/// The current interpreter path, with the trailing NUL stripped
pub fn print(file: &ElfFile) -> Result<String> {
    let bytes = file.section_bytes(".interp")?;
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    Ok(String::from_utf8_lossy(&bytes[..end]).into_owned())
}

/// Replace `.interp` with `path` plus a terminating NUL
pub fn set(file: &mut ElfFile, path: &str) {
    let mut bytes = path.as_bytes().to_vec();
    bytes.push(0);
    file.sections.replace(".interp", bytes);
}
