//! Small standalone `.dynamic` flag toggles that don't warrant their own module:
//! `--no-default-lib` (`DF_1_NODEFLIB`) and `--add-debug-tag` (`DT_DEBUG`).

use crate::error::Result;
use crate::header::dynamic::{dt, Flags1};
use crate::model::ElfFile;

/// Set `DF_1_NODEFLIB` in `DT_FLAGS_1`, inserting the tag if the file doesn't carry
/// one yet
pub fn set_no_default_lib(file: &mut ElfFile) -> Result<()> {
    let current = file.dynamic_value(dt::FLAGS_1)?.unwrap_or(0);
    let flags = Flags1::from_bits_truncate(current) | Flags1::NODEFLIB;
    file.set_dynamic_value(dt::FLAGS_1, flags.bits())
}

/// Ensure a `DT_DEBUG` entry exists, used by debuggers to locate the link map at
/// runtime. A no-op if one is already present; the inserted value is `0`, filled in by
/// the dynamic linker at load time.
pub fn add_debug_tag(file: &mut ElfFile) -> Result<()> {
    if file.dynamic_value(dt::DEBUG)?.is_some() {
        return Ok(());
    }
    file.insert_dynamic_entry(dt::DEBUG, 0)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::base::{Codec, Endian, Width};
    use crate::header::dynamic::DynEntry;
    use crate::header::elf::em;
    use crate::header::elf::identification::{ElfClass, ElfDataEncoding};
    use crate::header::elf::{ElfHeader, ElfType};
    use crate::header::program::{PFlags, ProgramHeader, PtType};

    fn file_with_dynamic(entries: Vec<DynEntry>) -> ElfFile {
        let codec = Codec::new(Width::Elf64, Endian::Little);
        let mut entries = entries;
        entries.push(DynEntry { tag: dt::NULL, value: 0 });
        let dynamic_bytes = crate::header::dynamic::write_all(&entries, &codec).unwrap();

        let mut data = vec![0u8; 0x1000];
        data[0x200..0x200 + dynamic_bytes.len()].copy_from_slice(&dynamic_bytes);

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
            data,
            codec,
            header,
            program_headers: vec![ProgramHeader {
                p_type: PtType::Dynamic,
                flags: PFlags::R,
                offset: 0x200,
                vaddr: 0x200,
                paddr: 0x200,
                filesz: dynamic_bytes.len() as u64,
                memsz: dynamic_bytes.len() as u64,
                align: 8,
            }],
            section_headers: vec![],
            sections: crate::model::SectionStore::default(),
            page_size: 0x1000,
            force_rewrite: false,
        }
    }

    #[test]
    fn sets_nodeflib_without_an_existing_flags1_entry() {
        let mut file = file_with_dynamic(vec![]);
        set_no_default_lib(&mut file).unwrap();
        let bytes = file.sections.get(".dynamic").unwrap();
        let entries = crate::header::dynamic::parse_all(bytes, &file.codec).unwrap();
        let flags = entries.iter().find(|e| e.tag == dt::FLAGS_1).unwrap();
        assert!(Flags1::from_bits_truncate(flags.value).contains(Flags1::NODEFLIB));
    }

    #[test]
    fn preserves_other_flags1_bits() {
        let mut file = file_with_dynamic(vec![DynEntry { tag: dt::FLAGS_1, value: 0x4 }]);
        set_no_default_lib(&mut file).unwrap();
        let bytes = file.sections.get(".dynamic").unwrap();
        let entries = crate::header::dynamic::parse_all(bytes, &file.codec).unwrap();
        let flags = entries.iter().find(|e| e.tag == dt::FLAGS_1).unwrap();
        assert_eq!(flags.value, 0x4 | Flags1::NODEFLIB.bits());
    }

    #[test]
    fn add_debug_tag_is_idempotent() {
        let mut file = file_with_dynamic(vec![DynEntry { tag: dt::DEBUG, value: 0 }]);
        add_debug_tag(&mut file).unwrap();
        assert!(!file.sections.have_replaced(".dynamic"));
    }

    #[test]
    fn add_debug_tag_inserts_when_missing() {
        let mut file = file_with_dynamic(vec![]);
        add_debug_tag(&mut file).unwrap();
        let bytes = file.sections.get(".dynamic").unwrap();
        let entries = crate::header::dynamic::parse_all(bytes, &file.codec).unwrap();
        assert!(entries.iter().any(|e| e.tag == dt::DEBUG));
    }
}
