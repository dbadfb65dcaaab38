//! `--clear-symbol-version`: forces the listed dynamic symbols back to the base,
//! unversioned definition by setting their `.gnu.version` entry to `VER_NDX_GLOBAL`.

use crate::error::{Error, Result};
use crate::model::ElfFile;

/// `VER_NDX_GLOBAL`: the symbol is bound to the base version of the library, not a
/// specific `@VERS` suffix
const VER_NDX_GLOBAL: u16 = 1;

/// Set the `.gnu.version` entry of every symbol named in `names` to `VER_NDX_GLOBAL`.
/// A no-op if the file carries no `.gnu.version` table at all.
pub fn clear(file: &mut ElfFile, names: &[String]) -> Result<()> {
    let symbols = file.dynsym_entries()?;
    let mut versyms = match file.gnu_version_entries() {
        Ok(v) if v.len() == symbols.len() => v,
        _ => return Ok(()),
    };

    for name in names {
        let index = symbols
            .iter()
            .position(|s| &s.name == name)
            .ok_or_else(|| Error::UnknownSymbol(name.clone()))?;
        versyms[index] = VER_NDX_GLOBAL;
    }

    file.set_gnu_version_entries(&versyms)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::base::{Codec, Endian, Width};
    use crate::header::elf::em;
    use crate::header::elf::identification::{ElfClass, ElfDataEncoding};
    use crate::header::elf::{ElfHeader, ElfType};
    use crate::header::symbol::{make_st_info, Symbol};

    fn file_with_versioned_symbols(names: &[&str], versions: &[u16]) -> ElfFile {
        let codec = Codec::new(Width::Elf64, Endian::Little);
        let mut dynstr = vec![0u8];
        let mut dynsym_bytes = Vec::new();
        for name in names {
            let off = dynstr.len() as u32;
            dynstr.extend_from_slice(name.as_bytes());
            dynstr.push(0);
            let sym = Symbol {
                name_offset: off,
                name: String::new(),
                info: make_st_info(1, 0),
                other: 0,
                shndx: 1,
                value: 0,
                size: 0,
            };
            let mut buf = vec![0u8; Symbol::entsize_for(&codec)];
            sym.write(&mut buf, 0, &codec).unwrap();
            dynsym_bytes.extend_from_slice(&buf);
        }
        let mut versym_bytes = Vec::new();
        for v in versions {
            versym_bytes.extend_from_slice(&v.to_le_bytes());
        }

        let mut data = vec![0u8; 0x2000];
        data[0x100..0x100 + dynstr.len()].copy_from_slice(&dynstr);
        data[0x200..0x200 + dynsym_bytes.len()].copy_from_slice(&dynsym_bytes);
        data[0x300..0x300 + versym_bytes.len()].copy_from_slice(&versym_bytes);

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
            e_phnum: 0,
            e_shentsize: 64,
            e_shnum: 0,
            e_shstrndx: 0,
        };
        ElfFile {
            data,
            codec,
            header,
            program_headers: vec![],
            section_headers: vec![
                crate::header::section::SectionHeader {
                    name_offset: 0,
                    name: ".dynstr".into(),
                    sh_type: crate::header::section::ShType::StrTab,
                    flags: crate::header::section::ShFlags::ALLOC,
                    addr: 0x100,
                    offset: 0x100,
                    size: dynstr.len() as u64,
                    link: 0,
                    info: 0,
                    addralign: 1,
                    entsize: 0,
                },
                crate::header::section::SectionHeader {
                    name_offset: 0,
                    name: ".dynsym".into(),
                    sh_type: crate::header::section::ShType::DynSym,
                    flags: crate::header::section::ShFlags::ALLOC,
                    addr: 0x200,
                    offset: 0x200,
                    size: dynsym_bytes.len() as u64,
                    link: 0,
                    info: 0,
                    addralign: 8,
                    entsize: Symbol::entsize_for(&codec) as u64,
                },
                crate::header::section::SectionHeader {
                    name_offset: 0,
                    name: ".gnu.version".into(),
                    sh_type: crate::header::section::ShType::Unknown(0x6fff_ffff),
                    flags: crate::header::section::ShFlags::ALLOC,
                    addr: 0x300,
                    offset: 0x300,
                    size: versym_bytes.len() as u64,
                    link: 0,
                    info: 0,
                    addralign: 2,
                    entsize: 2,
                },
            ],
            sections: crate::model::SectionStore::default(),
            page_size: 0x1000,
            force_rewrite: false,
        }
    }

    #[test]
    fn clears_the_named_symbol_to_global() {
        let mut file = file_with_versioned_symbols(&["foo", "bar"], &[2, 3]);
        clear(&mut file, &["bar".to_string()]).unwrap();
        let versyms = file.gnu_version_entries().unwrap();
        assert_eq!(versyms, vec![2, VER_NDX_GLOBAL]);
    }

    #[test]
    fn rejects_unknown_symbol_names() {
        let mut file = file_with_versioned_symbols(&["foo"], &[2]);
        assert!(clear(&mut file, &["missing".to_string()]).is_err());
    }
}
