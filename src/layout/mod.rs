//! The layout engine (§4.5): turns pending section-content edits into a fully
//! consistent file image by choosing where replaced sections that outgrew their slot
//! should live, and patching every structure that pointed at their old location.

pub mod executable;
pub mod library;
pub mod notes;
pub mod shift;
pub mod write_sections;

use crate::error::Result;
use crate::model::ElfFile;

/// Entry point operation handlers call after queuing their edits: flushes pending
/// section replacements and normalizes `PT_NOTE` segments, choosing the executable or
/// library growth strategy as needed. A no-op if nothing is pending.
pub fn rewrite_sections(file: &mut ElfFile) -> Result<()> {
    write_sections::write_replaced_sections(file)
}
