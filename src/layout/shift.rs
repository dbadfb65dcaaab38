//! Shifting the tail of a file to make room somewhere in the middle: the primitive
//! both the library and executable layout strategies build on when a table (program
//! headers, section headers, a relocated section) needs more room than the gap after
//! it currently provides.

use crate::error::Result;
use crate::model::ElfFile;

/// Insert `delta` zero bytes at file offset `pivot_off` and shift every file offset at
/// or beyond `pivot_off`, and every virtual address at or beyond `pivot_addr`, up by
/// `delta`. `p_offset` and `p_vaddr` are unrelated numbers in general (a segment's file
/// offset and its mapped address differ by whatever the linker chose as the load bias),
/// so the two kinds of pivot are tracked separately rather than compared against one
/// shared value. `e_phoff`/`e_shoff` and every program and section header are updated.
pub fn shift_file(file: &mut ElfFile, pivot_off: u64, pivot_addr: u64, delta: u64) -> Result<()> {
    if delta == 0 {
        return Ok(());
    }

    let insert_at = (pivot_off as usize).min(file.data.len());
    file.data
        .splice(insert_at..insert_at, std::iter::repeat(0u8).take(delta as usize));

    if file.header.e_phoff >= pivot_off {
        file.header.e_phoff += delta;
    }
    if file.header.e_shoff >= pivot_off {
        file.header.e_shoff += delta;
    }

    for ph in &mut file.program_headers {
        if ph.offset >= pivot_off {
            ph.offset += delta;
        }
        if ph.vaddr >= pivot_addr {
            ph.vaddr += delta;
            ph.paddr += delta;
        }
    }

    for sh in &mut file.section_headers {
        if sh.offset >= pivot_off {
            sh.offset += delta;
        }
        if sh.addr != 0 && sh.addr >= pivot_addr {
            sh.addr += delta;
        }
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::base::{Codec, Endian, Width};
    use crate::header::elf::identification::ElfDataEncoding;
    use crate::header::elf::{ElfHeader, ElfType};
    use crate::header::program::{PFlags, ProgramHeader, PtType};
    use crate::header::section::{ShFlags, ShType, SectionHeader};
    use crate::header::elf::identification::ElfClass;
    use crate::header::elf::em;

    fn toy_file() -> ElfFile {
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
        let program_headers = vec![ProgramHeader {
            p_type: PtType::Load,
            flags: PFlags::R,
            offset: 0,
            vaddr: 0,
            paddr: 0,
            filesz: 0x300,
            memsz: 0x300,
            align: 0x1000,
        }];
        let section_headers = vec![SectionHeader {
            name_offset: 0,
            name: String::new(),
            sh_type: ShType::ProgBits,
            flags: ShFlags::ALLOC,
            addr: 0x100,
            offset: 0x100,
            size: 0x10,
            link: 0,
            info: 0,
            addralign: 1,
            entsize: 0,
        }];
        ElfFile {
            data: vec![0u8; 0x300],
            codec: Codec::new(Width::Elf64, Endian::Little),
            header,
            program_headers,
            section_headers,
            sections: crate::model::SectionStore::default(),
            page_size: 0x1000,
            force_rewrite: false,
        }
    }

    #[test]
    fn shifting_past_pivot_moves_offsets_and_addresses() {
        let mut file = toy_file();
        shift_file(&mut file, 0x80, 0x80, 0x1000).unwrap();
        assert_eq!(file.header.e_shoff, 0x1200);
        assert_eq!(file.section_headers[0].offset, 0x1100);
        assert_eq!(file.section_headers[0].addr, 0x1100);
        assert_eq!(file.data.len(), 0x300 + 0x1000);
    }

    #[test]
    fn shifting_before_pivot_is_unaffected() {
        let mut file = toy_file();
        shift_file(&mut file, 0x200, 0x200, 0x1000).unwrap();
        assert_eq!(file.header.e_phoff, 0x40);
        assert_eq!(file.section_headers[0].offset, 0x100);
    }

    #[test]
    fn zero_delta_is_a_no_op() {
        let mut file = toy_file();
        let before = file.data.len();
        shift_file(&mut file, 0x80, 0x80, 0).unwrap();
        assert_eq!(file.data.len(), before);
    }

    #[test]
    fn offset_and_address_pivots_are_tracked_independently() {
        let mut file = toy_file();
        // section sits at file offset 0x100 but (hypothetically) a much higher vaddr
        file.section_headers[0].addr = 0x5000;
        shift_file(&mut file, 0x80, 0x4000, 0x1000).unwrap();
        assert_eq!(file.section_headers[0].offset, 0x1100);
        assert_eq!(file.section_headers[0].addr, 0x6000);
    }
}
