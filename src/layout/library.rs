//! Library layout strategy (§4.5.1): `ET_DYN` objects have no fixed load address, so
//! new content is simply appended past the current end of the file and the end of the
//! mapped address range, in one new page-aligned `PT_LOAD` segment.

use crate::error::Result;
use crate::header::program::{PFlags, PtType, ProgramHeader};
use crate::model::ElfFile;

/// Where a relocated section landed
#[derive(Debug)]
pub struct PlacedSection {
    /// The section's name
    pub name: String,
    /// Its new `sh_offset`
    pub offset: u64,
    /// Its new `sh_addr`
    pub addr: u64,
}

/// Append `sections` (in the given order) after the current end of the file image and
/// the current end of the mapped address range, then synthesize one `PT_LOAD`
/// covering the whole appended region. Each entry is padded to an 8-byte boundary;
/// the region as a whole is padded out to a page boundary.
pub fn grow_for_library(file: &mut ElfFile, sections: &[(String, Vec<u8>)]) -> Result<Vec<PlacedSection>> {
    let file_end = file.data.len() as u64;
    let max_vaddr_end = file
        .program_headers
        .iter()
        .filter(|p| p.p_type == PtType::Load)
        .map(|p| p.vaddr + p.memsz)
        .max()
        .unwrap_or(0);

    let region_start_off = file.page_align_up(file_end);
    let region_start_addr = file.page_align_up(max_vaddr_end);
    file.data.resize(region_start_off as usize, 0);

    let mut placed = Vec::with_capacity(sections.len());
    let mut cursor = region_start_off;
    for (name, bytes) in sections {
        placed.push(PlacedSection {
            name: name.clone(),
            offset: cursor,
            addr: region_start_addr + (cursor - region_start_off),
        });
        file.data.extend_from_slice(bytes);
        let pad = (8 - (bytes.len() % 8)) % 8;
        file.data.extend(std::iter::repeat(0u8).take(pad));
        cursor += bytes.len() as u64 + pad as u64;
    }

    let region_end_off = file.page_align_up(cursor);
    file.data.resize(region_end_off as usize, 0);
    let region_size = region_end_off - region_start_off;

    file.program_headers.push(ProgramHeader {
        p_type: PtType::Load,
        flags: PFlags::R,
        offset: region_start_off,
        vaddr: region_start_addr,
        paddr: region_start_addr,
        filesz: region_size,
        memsz: region_size,
        align: file.page_size,
    });
    file.header.e_phnum = file.program_headers.len() as u16;

    Ok(placed)
}
