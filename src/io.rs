//! Atomic persistence of a rewritten file image: write to a temporary file in the
//! destination directory, copy over the original's permission bits, then rename into
//! place. A reader of the destination path never observes a partially-written file.

use std::fs::Permissions;
use std::io::Write as _;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::Result;

/// Read an entire ELF file into memory
pub fn read(path: &Path) -> Result<Vec<u8>> {
    Ok(std::fs::read(path)?)
}

/// Write `data` to `path` atomically: a same-directory temp file is written, given
/// `path`'s existing permission bits (or the process's default for a brand-new
/// `--output` path), then renamed over `path`.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.flush()?;

    let mode = std::fs::metadata(path).map(|m| m.permissions().mode()).unwrap_or(0o755);
    std::fs::set_permissions(tmp.path(), Permissions::from_mode(mode))?;

    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
