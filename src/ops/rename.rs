//! `--rename-dynamic-symbols`: rewrites `.dynsym` names and, since both hash tables
//! bucket symbols by a hash of their name, rebuilds `.gnu.hash` and `.hash` afterward
//! (§4.7). GNU hash additionally requires the renamed tail of the symbol table to be
//! regrouped by bucket, so every parallel table indexed the same way — `.gnu.version`,
//! and the symbol index embedded in `.rela.dyn`/`.rela.plt`/`.rel.dyn`/`.rel.plt` — is
//! permuted in lockstep.

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::hash;
use crate::header::symbol::Symbol;
use crate::model::ElfFile;
use crate::rewrite;

const RELOCATION_SECTIONS: &[(&str, bool)] =
    &[(".rela.dyn", true), (".rela.plt", true), (".rel.dyn", false), (".rel.plt", false)];

/// Rename every dynamic symbol named as a key of `map` to its value, rebuilding hash
/// tables and permuting relocation symbol indices to match. Rejects `map` entries
/// whose new name contains `@` (a versioned name can't be a rename target) or whose
/// old name isn't a known dynamic symbol.
pub fn rename(file: &mut ElfFile, map: &BTreeMap<String, String>) -> Result<()> {
    for new_name in map.values() {
        if new_name.contains('@') {
            return Err(Error::VersionedRenameName(new_name.clone()));
        }
    }

    let mut symbols = file.dynsym_entries()?;
    for old_name in map.keys() {
        if !symbols.iter().any(|s| &s.name == old_name) {
            return Err(Error::UnknownSymbol(old_name.clone()));
        }
    }
    for sym in &mut symbols {
        if let Some(new_name) = map.get(&sym.name) {
            let offset = file.append_dynstr(new_name)?;
            sym.name_offset = offset;
            sym.name = new_name.clone();
        }
    }
    file.set_dynsym_entries(&symbols)?;

    if let Ok(gnu_bytes) = file.section_bytes(".gnu.hash") {
        if !gnu_bytes.is_empty() {
            permute_for_gnu_hash(file, &symbols, &gnu_bytes)?;
        }
    }

    if let Ok(sysv_bytes) = file.section_bytes(".hash") {
        if !sysv_bytes.is_empty() {
            let nbuckets = hash::read_sysv_hash_header(&sysv_bytes, file.codec.endian)?;
            let names: Vec<String> = file.dynsym_entries()?.iter().map(|s| s.name.clone()).collect();
            let rebuilt = hash::rebuild_sysv_hash_table(&names, nbuckets, file.codec.endian);
            file.sections.replace(".hash", rebuilt);
        }
    }

    Ok(())
}

fn permute_for_gnu_hash(file: &mut ElfFile, symbols: &[Symbol], gnu_bytes: &[u8]) -> Result<()> {
    let (nbuckets, symoffset) = hash::read_gnu_hash_header(gnu_bytes, file.codec.endian)?;
    let symoffset = symoffset as usize;
    let names: Vec<String> = symbols.iter().map(|s| s.name.clone()).collect();
    let table = hash::rebuild_gnu_hash_table(&names, symoffset, nbuckets, &file.codec)?;

    let mut new_symbols = symbols[..symoffset].to_vec();
    new_symbols.extend(table.permutation.iter().map(|&old_pos| symbols[symoffset + old_pos].clone()));

    let mut old_to_new = BTreeMap::new();
    for (new_pos, &old_pos) in table.permutation.iter().enumerate() {
        old_to_new.insert((symoffset + old_pos) as u32, (symoffset + new_pos) as u32);
    }

    if let Ok(versyms) = file.gnu_version_entries() {
        if versyms.len() == symbols.len() {
            let mut new_versyms = versyms[..symoffset].to_vec();
            new_versyms.extend(table.permutation.iter().map(|&old_pos| versyms[symoffset + old_pos]));
            file.set_gnu_version_entries(&new_versyms)?;
        }
    }

    file.set_dynsym_entries(&new_symbols)?;
    file.sections.replace(".gnu.hash", table.bytes);

    for (name, is_rela) in RELOCATION_SECTIONS {
        if let Ok(mut bytes) = file.section_bytes(name) {
            if !bytes.is_empty() {
                rewrite::remap_relocation_symbols(&mut bytes, *is_rela, &file.codec, &old_to_new)?;
                file.sections.replace(*name, bytes);
            }
        }
    }

    Ok(())
}
