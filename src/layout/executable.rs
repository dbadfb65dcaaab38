//! Executable layout strategy (§4.5.2): an `ET_EXEC` object has fixed load addresses
//! chosen by the linker, so new content can't simply be appended past the last segment
//! the way [`crate::layout::library`] does it — there is no guarantee anything maps
//! above the last segment at all. Instead room is carved out just before the
//! lowest-addressed `PT_LOAD`, growing the object "downward": the old content is
//! pushed up to higher file offsets and addresses via [`shift_file`], and the new
//! sections fill the gap this leaves at the old, now-vacated, low end.

use crate::error::{Error, Result};
use crate::header::program::{PFlags, PtType, ProgramHeader};
use crate::layout::shift::shift_file;
use crate::layout::library::PlacedSection;
use crate::model::ElfFile;

/// Carve `needed` bytes of room below the lowest `PT_LOAD` and place `sections` there
/// in order. Fails with [`Error::AddressSpaceUnderrun`] if the lowest load address
/// doesn't leave enough room below it — this engine never relocates an `ET_EXEC`'s
/// existing segments to different addresses, only shifts them uniformly upward.
pub fn grow_for_executable(file: &mut ElfFile, sections: &[(String, Vec<u8>)]) -> Result<Vec<PlacedSection>> {
    let lowest = file
        .program_headers
        .iter()
        .filter(|p| p.p_type == PtType::Load)
        .min_by_key(|p| p.vaddr)
        .cloned()
        .ok_or_else(|| Error::malformed("executable has no PT_LOAD segments"))?;

    let raw_size: u64 = sections.iter().map(|(_, b)| b.len() as u64).sum();
    let padded_size = raw_size + sections.len() as u64 * 8;
    let needed = file.page_align_up(padded_size).max(file.page_size);

    if needed > lowest.vaddr {
        return Err(Error::AddressSpaceUnderrun {
            needed,
            available: lowest.vaddr,
        });
    }

    shift_file(file, lowest.offset, lowest.vaddr, needed)?;

    let region_off = lowest.offset;
    let region_addr = lowest.vaddr;
    let mut placed = Vec::with_capacity(sections.len());
    let mut cursor = 0u64;
    for (name, bytes) in sections {
        let off = region_off + cursor;
        file.data[off as usize..off as usize + bytes.len()].copy_from_slice(bytes);
        placed.push(PlacedSection {
            name: name.clone(),
            offset: off,
            addr: region_addr + cursor,
        });
        let pad = (8 - (bytes.len() % 8)) % 8;
        cursor += bytes.len() as u64 + pad as u64;
    }

    file.program_headers.push(ProgramHeader {
        p_type: PtType::Load,
        flags: PFlags::R,
        offset: region_off,
        vaddr: region_addr,
        paddr: region_addr,
        filesz: needed,
        memsz: needed,
        align: file.page_size,
    });
    file.header.e_phnum = file.program_headers.len() as u16;

    Ok(placed)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::base::{Codec, Endian, Width};
    use crate::header::elf::em;
    use crate::header::elf::identification::{ElfClass, ElfDataEncoding};
    use crate::header::elf::{ElfHeader, ElfType};

    fn toy_file() -> ElfFile {
        let header = ElfHeader {
            class: ElfClass::Elf64,
            data_encoding: ElfDataEncoding::LittleEndian,
            os_abi_raw: 0,
            abi_version: 0,
            e_type: ElfType::Executable,
            e_machine: em::X86_64,
            e_version: 1,
            e_entry: 0x401000,
            e_phoff: 0x40,
            e_shoff: 0,
            e_flags: 0,
            e_ehsize: 64,
            e_phentsize: 56,
            e_phnum: 1,
            e_shentsize: 64,
            e_shnum: 0,
            e_shstrndx: 0,
        };
        ElfFile {
            data: vec![0u8; 0x2000],
            codec: Codec::new(Width::Elf64, Endian::Little),
            header,
            program_headers: vec![ProgramHeader {
                p_type: PtType::Load,
                flags: PFlags::R,
                offset: 0,
                vaddr: 0x400000,
                paddr: 0x400000,
                filesz: 0x2000,
                memsz: 0x2000,
                align: 0x1000,
            }],
            section_headers: vec![],
            sections: crate::model::SectionStore::default(),
            page_size: 0x1000,
            force_rewrite: false,
        }
    }

    #[test]
    fn carves_room_below_the_lowest_load_segment() {
        let mut file = toy_file();
        let placed = grow_for_executable(&mut file, &[(".interp".into(), vec![1, 2, 3])]).unwrap();
        assert_eq!(placed[0].offset, 0);
        assert_eq!(placed[0].addr, 0x400000 - 0x1000);
        // the original segment was pushed up by one page
        let original = file
            .program_headers
            .iter()
            .find(|p| p.p_type == PtType::Load && p.vaddr == 0x400000 + 0x1000)
            .unwrap();
        assert_eq!(original.offset, 0x1000);
    }

    #[test]
    fn rejects_growth_when_there_is_no_room_below() {
        let mut file = toy_file();
        file.program_headers[0].vaddr = 0x100;
        file.program_headers[0].paddr = 0x100;
        let err = grow_for_executable(&mut file, &[("x".into(), vec![0; 5000])]).unwrap_err();
        assert!(matches!(err, Error::AddressSpaceUnderrun { .. }));
    }
}
