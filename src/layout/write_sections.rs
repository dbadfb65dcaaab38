//! Driver for §4.5.4: once operation handlers have queued their section-content edits
//! in [`crate::model::ElfFile::sections`], this decides which replacements fit back
//! into their old slot unchanged and which need the layout engine to find them a new
//! home, re-synchronizes `PT_INTERP`/`PT_DYNAMIC`/`PT_MIPS_ABIFLAGS`/`PT_GNU_PROPERTY`
//! to whichever of those sections moved or changed size, and patches `.dynamic`'s
//! address-valued entries to follow any section that got relocated.

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::header::dynamic;
use crate::header::program::PtType;
use crate::layout::library::PlacedSection;
use crate::layout::{executable, library, notes};
use crate::model::ElfFile;
use crate::rewrite;

/// Sections whose backing program header must be re-synchronized to the section's
/// offset/address/size whenever the section itself moves or changes size, per §4.5.4.
const SYNCED_SEGMENTS: &[(&str, PtType)] = &[
    (".interp", PtType::Interp),
    (".dynamic", PtType::Dynamic),
    (".MIPS.abiflags", PtType::MipsAbiflags),
    (".note.gnu.property", PtType::GnuProperty),
];

/// Flush every pending section replacement in `file.sections` into the file image.
/// A no-op if nothing is pending and [`ElfFile::force_rewrite`] was never set.
pub fn write_replaced_sections(file: &mut ElfFile) -> Result<()> {
    if !file.needs_layout() {
        return Ok(());
    }

    let pending: Vec<(String, Vec<u8>)> = file
        .sections
        .iter()
        .map(|(name, bytes)| (name.to_string(), bytes.to_vec()))
        .collect();

    let mut in_place = Vec::new();
    let mut relocate = Vec::new();
    for (name, bytes) in pending {
        match file.section_index_by_name(&name) {
            Some(idx) if (bytes.len() as u64) <= file.section_headers[idx].size => {
                in_place.push((name, bytes));
            }
            _ => relocate.push((name, bytes)),
        }
    }

    for (name, bytes) in &in_place {
        let idx = file
            .section_index_by_name(name)
            .expect("classified in-place because the section already exists");
        let start = file.section_headers[idx].offset as usize;
        let old_size = file.section_headers[idx].size as usize;
        file.data[start..start + bytes.len()].copy_from_slice(bytes);
        for byte in &mut file.data[start + bytes.len()..start + old_size] {
            *byte = 0;
        }
        file.section_headers[idx].size = bytes.len() as u64;
    }

    let mut address_map = BTreeMap::new();
    if !relocate.is_empty() {
        address_map = relocate_sections(file, &relocate)?;
    }

    let touched: Vec<&str> = in_place.iter().chain(relocate.iter()).map(|(name, _)| name.as_str()).collect();
    sync_program_headers(file, &touched);

    if !relocate.is_empty() {
        patch_cross_references(file, &address_map)?;
    }

    notes::normalize_note_segments(file)?;
    file.sections.clear();
    file.force_rewrite = false;
    file.check_invariants()?;
    Ok(())
}

/// Re-synchronize the program header backing each of [`SYNCED_SEGMENTS`] to its
/// section's current offset/address/size, for every section named in `touched`. A
/// section's header is the only place its new location and size are recorded once
/// [`write_replaced_sections`] has written it (in place or relocated); the matching
/// program header otherwise keeps pointing at the old, possibly now-wrong-sized slot.
fn sync_program_headers(file: &mut ElfFile, touched: &[&str]) {
    for (name, pt_type) in SYNCED_SEGMENTS {
        if !touched.contains(name) {
            continue;
        }
        let Some(section) = file.section_by_name(name) else { continue };
        let (offset, addr, size) = (section.offset, section.addr, section.size);
        if let Some(ph) = file.program_headers.iter_mut().find(|p| p.p_type == *pt_type) {
            ph.offset = offset;
            ph.vaddr = addr;
            ph.paddr = addr;
            ph.filesz = size;
            ph.memsz = size;
        }
    }
}

/// Hand the sections that didn't fit in place to the strategy matching the object's
/// type, then sync their section headers to the new location. Returns the map from
/// every relocated section's old `sh_addr` to its new one, for [`patch_cross_references`].
fn relocate_sections(file: &mut ElfFile, relocate: &[(String, Vec<u8>)]) -> Result<BTreeMap<u64, u64>> {
    let old_addrs: Vec<u64> = relocate
        .iter()
        .map(|(name, _)| file.section_by_name(name).map(|s| s.addr).unwrap_or(0))
        .collect();

    let placed: Vec<PlacedSection> = if file.is_executable() {
        executable::grow_for_executable(file, relocate)?
    } else {
        library::grow_for_library(file, relocate)?
    };

    let mut address_map = BTreeMap::new();
    for ((placement, old_addr), (name, bytes)) in placed.iter().zip(old_addrs.iter()).zip(relocate.iter()) {
        if *old_addr != 0 {
            address_map.insert(*old_addr, placement.addr);
        }
        if let Some(idx) = file.section_index_by_name(name) {
            file.section_headers[idx].offset = placement.offset;
            file.section_headers[idx].addr = placement.addr;
            file.section_headers[idx].size = bytes.len() as u64;
        }
    }

    Ok(address_map)
}

/// Patch `.dynamic`'s address-valued entries to follow their sections' new locations.
/// Reads and writes through `.dynamic`'s *section header* rather than `PT_DYNAMIC`,
/// so this keeps working even if a future caller ever reorders it ahead of
/// [`sync_program_headers`]. Symbol and relocation
/// fixups for a plain relocation (no renaming involved) are limited to `.dynamic`,
/// since this engine never changes a symbol's `st_shndx` or a relocation's referenced
/// symbol index outside of `--rename-dynamic-symbols`
/// ([`crate::hash::rebuild_gnu_hash_table`]'s permutation is applied separately by
/// that operation handler).
fn patch_cross_references(file: &mut ElfFile, address_map: &BTreeMap<u64, u64>) -> Result<()> {
    let Some(section) = file.section_by_name(".dynamic") else {
        return Ok(());
    };
    let start = section.offset as usize;
    let size = section.size as usize;
    let raw = file
        .data
        .get(start..start + size)
        .ok_or_else(|| Error::malformed(".dynamic out of bounds"))?
        .to_vec();
    let mut entries = dynamic::parse_all(&raw, &file.codec)?;
    rewrite::patch_dynamic_addresses(&mut entries, address_map);
    let bytes = dynamic::write_all(&entries, &file.codec)?;
    file.data[start..start + bytes.len()].copy_from_slice(&bytes);
    Ok(())
}
