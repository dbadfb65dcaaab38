//! GNU hash (`.gnu.hash`) and SysV hash (`.hash`) table rebuilding.
//!
//! Renaming a dynamic symbol invalidates any hash table built from the old name, since
//! both formats bucket symbols by a hash of their name. Both tables are always written
//! as arrays of 32-bit words regardless of the object's class (`Elf32_Word`/`Elf64_Word`
//! are both 4 bytes here), so this module talks to the byte buffer directly rather than
//! going through [`crate::base::Codec`]'s native-word helpers.

use crate::base::{Codec, Endian};
use crate::error::{Error, Result};

fn read_u32(buf: &[u8], off: usize, endian: Endian) -> Result<u32> {
    let bytes: [u8; 4] = buf
        .get(off..off + 4)
        .ok_or_else(|| Error::malformed("hash table read out of bounds"))?
        .try_into()
        .expect("length checked above");
    Ok(match endian {
        Endian::Little => u32::from_le_bytes(bytes),
        Endian::Big => u32::from_be_bytes(bytes),
    })
}

fn write_u32(buf: &mut Vec<u8>, value: u32, endian: Endian) {
    buf.extend_from_slice(&match endian {
        Endian::Little => value.to_le_bytes(),
        Endian::Big => value.to_be_bytes(),
    });
}

/// The DJB2-derived hash GNU hash tables bucket symbol names by
pub fn gnu_hash(name: &str) -> u32 {
    let mut h: u32 = 5381;
    for byte in name.bytes() {
        h = h.wrapping_mul(33).wrapping_add(u32::from(byte));
    }
    h
}

/// The PJW-style hash classic SysV `.hash` tables bucket symbol names by
pub fn sysv_hash(name: &str) -> u32 {
    let mut h: u32 = 0;
    for byte in name.bytes() {
        h = (h << 4).wrapping_add(u32::from(byte));
        let high = h & 0xf000_0000;
        if high != 0 {
            h ^= high >> 24;
        }
        h &= !high;
    }
    h
}

/// Result of rebuilding `.gnu.hash`: the new section bytes, and the permutation that
/// must be applied to every dynsym-indexed table (`.dynsym`, `.gnu.version`, and any
/// relocation's symbol index) because GNU hash requires symbols past `symoffset` to be
/// grouped contiguously by bucket.
pub struct GnuHashTable {
    /// The new `.gnu.hash` section bytes
    pub bytes: Vec<u8>,
    /// `permutation[new_index] == old_index` for the reordered `names[symoffset..]` tail;
    /// indices below `symoffset` are untouched and not present in this vector
    pub permutation: Vec<usize>,
}

/// Rebuild `.gnu.hash` for dynamic symbol table `names[0..]`, where `names[..symoffset]`
/// are the local/undefined symbols GNU hash never indexes (they stay in place) and
/// `names[symoffset..]` are the symbols that get hashed, bucketed, and reordered.
pub fn rebuild_gnu_hash_table(
    names: &[String],
    symoffset: usize,
    nbuckets: u32,
    codec: &Codec,
) -> Result<GnuHashTable> {
    let nbuckets = nbuckets.max(1);
    let hashed: Vec<(usize, u32)> = names[symoffset..]
        .iter()
        .enumerate()
        .map(|(i, n)| (i, gnu_hash(n)))
        .collect();

    let mut ordered = hashed.clone();
    ordered.sort_by_key(|(i, h)| (h % nbuckets, *i));
    let permutation: Vec<usize> = ordered.iter().map(|(i, _)| *i).collect();

    let n = ordered.len();
    let maskbits: u32 = match codec.width {
        crate::base::Width::Elf32 => 32,
        crate::base::Width::Elf64 => 64,
    };
    let bloom_shift: u32 = if maskbits == 64 { 6 } else { 5 };
    let mut bloom_size: u32 = 1;
    while (bloom_size as usize) * maskbits as usize / 2 < n.max(1) {
        bloom_size *= 2;
    }

    let mut bloom_words = vec![0u64; bloom_size as usize];
    let mut buckets = vec![0u32; nbuckets as usize];
    let mut chain = vec![0u32; n];

    for (pos, (_, hash)) in ordered.iter().enumerate() {
        let word_index = ((*hash / maskbits) % bloom_size) as usize;
        let bit1 = hash % maskbits;
        let bit2 = (hash >> bloom_shift) % maskbits;
        bloom_words[word_index] |= (1u64 << bit1) | (1u64 << bit2);

        let bucket = (*hash % nbuckets) as usize;
        if buckets[bucket] == 0 {
            buckets[bucket] = (symoffset + pos) as u32;
        }
        let is_last_in_bucket = ordered
            .get(pos + 1)
            .map(|(_, h)| h % nbuckets != *hash % nbuckets)
            .unwrap_or(true);
        chain[pos] = (hash & !1) | u32::from(is_last_in_bucket);
    }

    let mut bytes = Vec::new();
    write_u32(&mut bytes, nbuckets, codec.endian);
    write_u32(&mut bytes, symoffset as u32, codec.endian);
    write_u32(&mut bytes, bloom_size, codec.endian);
    write_u32(&mut bytes, bloom_shift, codec.endian);
    for word in &bloom_words {
        match codec.width {
            crate::base::Width::Elf32 => write_u32(&mut bytes, *word as u32, codec.endian),
            crate::base::Width::Elf64 => {
                let (lo, hi) = match codec.endian {
                    Endian::Little => (*word as u32, (*word >> 32) as u32),
                    Endian::Big => ((*word >> 32) as u32, *word as u32),
                };
                write_u32(&mut bytes, lo, codec.endian);
                write_u32(&mut bytes, hi, codec.endian);
            }
        }
    }
    for bucket in &buckets {
        write_u32(&mut bytes, *bucket, codec.endian);
    }
    for value in &chain {
        write_u32(&mut bytes, *value, codec.endian);
    }

    Ok(GnuHashTable { bytes, permutation })
}

/// Parse an existing `.gnu.hash` section just far enough to recover `nbuckets` and
/// `symoffset`, needed to rebuild it with the same shape after a rename
pub fn read_gnu_hash_header(bytes: &[u8], endian: Endian) -> Result<(u32, u32)> {
    let nbuckets = read_u32(bytes, 0, endian)?;
    let symoffset = read_u32(bytes, 4, endian)?;
    Ok((nbuckets, symoffset))
}

/// Rebuild classic SysV `.hash` for a dynamic symbol table (`names[0]` is always the
/// empty `STN_UNDEF` entry). Unlike GNU hash this format does not require reordering
/// the symbol table: `chain[i]` simply links same-bucket symbols by index.
pub fn rebuild_sysv_hash_table(names: &[String], nbuckets: u32, endian: Endian) -> Vec<u8> {
    let nbuckets = nbuckets.max(1);
    let nchain = names.len() as u32;
    let mut buckets = vec![0u32; nbuckets as usize];
    let mut chain = vec![0u32; nchain as usize];

    for (index, name) in names.iter().enumerate().skip(1) {
        let bucket = (sysv_hash(name) % nbuckets) as usize;
        chain[index] = buckets[bucket];
        buckets[bucket] = index as u32;
    }

    let mut bytes = Vec::new();
    write_u32(&mut bytes, nbuckets, endian);
    write_u32(&mut bytes, nchain, endian);
    for bucket in &buckets {
        write_u32(&mut bytes, *bucket, endian);
    }
    for value in &chain {
        write_u32(&mut bytes, *value, endian);
    }
    bytes
}

/// Parse an existing `.hash` section just far enough to recover `nbuckets`
pub fn read_sysv_hash_header(bytes: &[u8], endian: Endian) -> Result<u32> {
    read_u32(bytes, 0, endian)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::base::Width;

    #[test]
    fn gnu_hash_matches_known_vector() {
        assert_eq!(gnu_hash(""), 5381);
        assert_eq!(gnu_hash("printf"), 0x156b_2bb8);
    }

    #[test]
    fn sysv_hash_matches_known_vector() {
        assert_eq!(sysv_hash(""), 0);
        assert_eq!(sysv_hash("printf"), 0x0779_05a6);
    }

    #[test]
    fn gnu_hash_table_round_trips_header() {
        let codec = Codec::new(Width::Elf64, Endian::Little);
        let names: Vec<String> = vec!["".into(), "foo".into(), "bar".into(), "baz".into()];
        let table = rebuild_gnu_hash_table(&names, 1, 4, &codec).unwrap();
        let (nbuckets, symoffset) = read_gnu_hash_header(&table.bytes, Endian::Little).unwrap();
        assert_eq!(nbuckets, 4);
        assert_eq!(symoffset, 1);
        assert_eq!(table.permutation.len(), 3);
    }

    #[test]
    fn sysv_hash_table_finds_every_symbol() {
        let names: Vec<String> = vec!["".into(), "alpha".into(), "beta".into(), "gamma".into()];
        let bytes = rebuild_sysv_hash_table(&names, 3, Endian::Little);
        let nbuckets = read_sysv_hash_header(&bytes, Endian::Little).unwrap();
        assert_eq!(nbuckets, 3);

        for (index, name) in names.iter().enumerate().skip(1) {
            let bucket = (sysv_hash(name) % nbuckets) as usize;
            let mut cursor = read_u32(&bytes, 8 + bucket * 4, Endian::Little).unwrap();
            let mut found = false;
            while cursor != 0 {
                if cursor as usize == index {
                    found = true;
                    break;
                }
                cursor = read_u32(&bytes, 8 + (4 + nbuckets as usize) * 4 + cursor as usize * 4, Endian::Little).unwrap();
            }
            assert!(found, "{name} not reachable via hash chain");
        }
    }
}
