//! Implementation of `.dynamic`: the array of tagged values the dynamic loader reads
//! to find the symbol table, string table, dependency list, rpath, and hash table.

use bitflags::bitflags;

use crate::base::Codec;
use crate::error::Result;

/// Numeric `d_tag` constants this engine reads or writes
pub mod dt {
    /// DT_NULL — terminates the array
    pub const NULL: i64 = 0;
    /// DT_NEEDED
    pub const NEEDED: i64 = 1;
    /// DT_STRTAB
    pub const STRTAB: i64 = 5;
    /// DT_SYMTAB
    pub const SYMTAB: i64 = 6;
    /// DT_RELA
    pub const RELA: i64 = 7;
    /// DT_STRSZ
    pub const STRSZ: i64 = 10;
    /// DT_DEBUG
    pub const DEBUG: i64 = 21;
    /// DT_JMPREL
    pub const JMPREL: i64 = 23;
    /// DT_RPATH
    pub const RPATH: i64 = 15;
    /// DT_REL
    pub const REL: i64 = 17;
    /// DT_SONAME
    pub const SONAME: i64 = 14;
    /// DT_RUNPATH
    pub const RUNPATH: i64 = 29;
    /// DT_FLAGS
    pub const FLAGS: i64 = 30;
    /// DT_VERNEED
    pub const VERNEED: i64 = 0x6fff_fffe;
    /// DT_VERNEEDNUM
    pub const VERNEEDNUM: i64 = 0x6fff_ffff;
    /// DT_VERSYM
    pub const VERSYM: i64 = 0x6fff_fff0;
    /// DT_FLAGS_1
    pub const FLAGS_1: i64 = 0x6fff_fffb;
    /// DT_HASH
    pub const HASH: i64 = 4;
    /// DT_GNU_HASH
    pub const GNU_HASH: i64 = 0x6fff_fef5;
    /// DT_MIPS_RLD_MAP_REL (vendor-extension-range tag used only on MIPS)
    pub const MIPS_RLD_MAP_REL: i64 = 0x7000_0035;
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    /// `DT_FLAGS_1` values; only the bit this engine sets/reads is named
    pub struct Flags1: u64 {
        /// DF_1_NODEFLIB — ignore the default library search path
        const NODEFLIB = 0x0000_0800;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// One entry of the `.dynamic` array, with `d_val`/`d_ptr` collapsed into a single
/// 64-bit field the way this engine always treats it (the union's meaning is decided
/// by the tag, never by the field's own type)
pub struct DynEntry {
    /// `d_tag`
    pub tag: i64,
    /// `d_un.d_val` or `d_un.d_ptr`
    pub value: u64,
}

impl DynEntry {
    /// Size in bytes of one `Elf32_Dyn`/`Elf64_Dyn` entry
    pub fn entsize_for(codec: &Codec) -> usize {
        2 * codec.width.word_size()
    }

    /// Parse one entry at `off`
    pub fn parse(buf: &[u8], off: usize, codec: &Codec) -> Result<Self> {
        let tag = codec.read_native(buf, off)? as i64;
        let value = codec.read_native(buf, off + codec.width.word_size())?;
        Ok(Self { tag, value })
    }

    /// Serialize this entry at `off`
    pub fn write(&self, buf: &mut [u8], off: usize, codec: &Codec) -> Result<()> {
        codec.write_native(buf, off, self.tag as u64)?;
        codec.write_native(buf, off + codec.width.word_size(), self.value)
    }
}

/// Parse a `.dynamic` section's bytes into entries, stopping at (and including) the
/// first `DT_NULL`, matching how the loader itself treats the array as null-terminated
/// rather than bounded purely by the section's recorded size.
pub fn parse_all(buf: &[u8], codec: &Codec) -> Result<Vec<DynEntry>> {
    let entsize = DynEntry::entsize_for(codec);
    let mut entries = Vec::new();
    let mut off = 0;
    while off + entsize <= buf.len() {
        let entry = DynEntry::parse(buf, off, codec)?;
        let is_null = entry.tag == dt::NULL;
        entries.push(entry);
        if is_null {
            break;
        }
        off += entsize;
    }
    Ok(entries)
}

/// Serialize entries back into a fresh byte buffer of exactly the size they need
pub fn write_all(entries: &[DynEntry], codec: &Codec) -> Result<Vec<u8>> {
    let entsize = DynEntry::entsize_for(codec);
    let mut buf = vec![0u8; entries.len() * entsize];
    for (i, entry) in entries.iter().enumerate() {
        entry.write(&mut buf, i * entsize, codec)?;
    }
    Ok(buf)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::base::{Endian, Width};

    #[test]
    fn round_trips_entries() {
        let codec = Codec::new(Width::Elf64, Endian::Little);
        let entries = vec![
            DynEntry { tag: dt::NEEDED, value: 11 },
            DynEntry { tag: dt::STRTAB, value: 0x400 },
            DynEntry { tag: dt::NULL, value: 0 },
        ];
        let buf = write_all(&entries, &codec).unwrap();
        let parsed = parse_all(&buf, &codec).unwrap();
        assert_eq!(parsed, entries);
    }

    #[test]
    fn parsing_stops_at_null() {
        let codec = Codec::new(Width::Elf64, Endian::Little);
        let entries = vec![
            DynEntry { tag: dt::NEEDED, value: 1 },
            DynEntry { tag: dt::NULL, value: 0 },
            DynEntry { tag: dt::NEEDED, value: 2 },
        ];
        let buf = write_all(&entries, &codec).unwrap();
        let parsed = parse_all(&buf, &codec).unwrap();
        assert_eq!(parsed.len(), 2);
    }

    #[test]
    fn nodeflib_bit() {
        let flags = Flags1::from_bits_truncate(0x0000_0801);
        assert!(flags.contains(Flags1::NODEFLIB));
    }
}
