//! `--print-os-abi`/`--set-os-abi`: `e_ident[EI_OSABI]`.

use crate::error::Result;
use crate::header::elf::identification::ElfOsAbi;
use crate::model::ElfFile;

/// The current OS/ABI's display name, or the raw byte formatted as `<N>` if it falls
/// outside the known set
pub fn print(file: &ElfFile) -> String {
    match file.header.os_abi() {
        Some(abi) => abi.name().to_string(),
        None => format!("<{}>", file.header.os_abi_raw),
    }
}

/// Set `e_ident[EI_OSABI]` from a known name (§6's fixed table)
pub fn set(file: &mut ElfFile, name: &str) -> Result<()> {
    file.header.os_abi_raw = ElfOsAbi::from_name(name)? as u8;
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::base::{Codec, Endian, Width};
    use crate::header::elf::em;
    use crate::header::elf::identification::{ElfClass, ElfDataEncoding};
    use crate::header::elf::{ElfHeader, ElfType};

    fn toy_file(os_abi_raw: u8) -> ElfFile {
        let header = ElfHeader {
            class: ElfClass::Elf64,
            data_encoding: ElfDataEncoding::LittleEndian,
            os_abi_raw,
            abi_version: 0,
            e_type: ElfType::SharedObject,
            e_machine: em::X86_64,
            e_version: 1,
            e_entry: 0,
            e_phoff: 0,
            e_shoff: 0,
            e_flags: 0,
            e_ehsize: 64,
            e_phentsize: 56,
            e_phnum: 0,
            e_shentsize: 64,
            e_shnum: 0,
            e_shstrndx: 0,
        };
        ElfFile {
            data: vec![0u8; 64],
            codec: Codec::new(Width::Elf64, Endian::Little),
            header,
            program_headers: vec![],
            section_headers: vec![],
            sections: crate::model::SectionStore::default(),
            page_size: 0x1000,
            force_rewrite: false,
        }
    }

    #[test]
    fn prints_known_and_unknown_abis() {
        assert_eq!(print(&toy_file(3)), "Linux");
        assert_eq!(print(&toy_file(200)), "<200>");
    }

    #[test]
    fn set_rejects_unknown_names() {
        let mut file = toy_file(0);
        assert!(set(&mut file, "plan9").is_err());
        set(&mut file, "FreeBSD").unwrap();
        assert_eq!(file.header.os_abi_raw, 9);
    }
}
