//! Cross-reference rewriting: once the layout engine has assigned new file offsets
//! and virtual addresses to replaced sections, every other structure that pointed at
//! the old location has to be patched to point at the new one.

use std::collections::BTreeMap;

use crate::base::{Codec, Width};
use crate::error::Result;
use crate::header::dynamic::{dt, DynEntry};

/// `.dynamic` tags whose value is a virtual address this engine may need to relocate
/// when the section backing it moves
const ADDRESS_TAGS: &[i64] = &[
    dt::STRTAB,
    dt::SYMTAB,
    dt::HASH,
    dt::GNU_HASH,
    dt::JMPREL,
    dt::REL,
    dt::RELA,
    dt::VERNEED,
    dt::VERSYM,
    dt::DEBUG,
];

/// Rewrite every `.dynamic` entry whose value equals an old address present in
/// `address_map` to the corresponding new address. `DT_DEBUG`'s placeholder value of 0
/// is left untouched (the loader fills it in at runtime, nothing in the file ever
/// points there).
pub fn patch_dynamic_addresses(entries: &mut [DynEntry], address_map: &BTreeMap<u64, u64>) {
    for entry in entries.iter_mut() {
        if entry.tag == dt::DEBUG {
            continue;
        }
        if !ADDRESS_TAGS.contains(&entry.tag) {
            continue;
        }
        if let Some(&new_addr) = address_map.get(&entry.value) {
            entry.value = new_addr;
        }
    }
}

/// Extract the symbol index out of a packed `r_info` field
pub fn relocation_symbol_index(r_info: u64, codec: &Codec) -> u32 {
    match codec.width {
        Width::Elf32 => (r_info >> 8) as u32,
        Width::Elf64 => (r_info >> 32) as u32,
    }
}

/// Extract the relocation type out of a packed `r_info` field
pub fn relocation_type(r_info: u64, codec: &Codec) -> u32 {
    match codec.width {
        Width::Elf32 => (r_info & 0xff) as u32,
        Width::Elf64 => (r_info & 0xffff_ffff) as u32,
    }
}

/// Repack a symbol index and relocation type into `r_info`
pub fn make_r_info(symbol_index: u32, r#type: u32, codec: &Codec) -> u64 {
    match codec.width {
        Width::Elf32 => (u64::from(symbol_index) << 8) | u64::from(r#type & 0xff),
        Width::Elf64 => (u64::from(symbol_index) << 32) | u64::from(r#type),
    }
}

/// Rewrite every relocation's symbol index in a `SHT_REL`/`SHT_RELA` section's raw
/// bytes, following a permutation of the dynamic symbol table (as produced by
/// [`crate::hash::rebuild_gnu_hash_table`] when dynamic symbols are renamed).
/// `is_rela` selects the 12-byte (`Elf64_Rela`)/8-byte entry stride over plain `Rel`.
pub fn remap_relocation_symbols(
    buf: &mut [u8],
    is_rela: bool,
    codec: &Codec,
    old_to_new: &BTreeMap<u32, u32>,
) -> Result<()> {
    let word = codec.width.word_size();
    let entsize = if is_rela { word * 3 } else { word * 2 };
    let mut off = 0;
    while off + entsize <= buf.len() {
        let r_info = codec.read_native(buf, off + word)?;
        let old_index = relocation_symbol_index(r_info, codec);
        if let Some(&new_index) = old_to_new.get(&old_index) {
            let r#type = relocation_type(r_info, codec);
            let new_info = make_r_info(new_index, r#type, codec);
            codec.write_native(buf, off + word, new_info)?;
        }
        off += entsize;
    }
    Ok(())
}
