//! Implementation of `.dynsym`: the dynamic symbol table whose entries get renamed
//! (and reordered, when the hash tables are rebuilt) by `--rename-dynamic-symbols`.

use crate::base::{Codec, Width};
use crate::error::Result;

/// SHN_UNDEF
pub const SHN_UNDEF: u16 = 0;
/// SHN_ABS: the symbol has an absolute value not affected by relocation
pub const SHN_ABS: u16 = 0xfff1;
/// SHN_COMMON
pub const SHN_COMMON: u16 = 0xfff2;
/// SHN_LORESERVE: indices at or above this are reserved, never real section indices
pub const SHN_LORESERVE: u16 = 0xff00;

/// Compose `st_info` from bind and type
pub fn make_st_info(bind: u8, r#type: u8) -> u8 {
    (bind << 4) | (r#type & 0xf)
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// One entry of `.dynsym` (or `.symtab`)
pub struct Symbol {
    /// `st_name`: byte offset into the associated string table
    pub name_offset: u32,
    /// The symbol's name, resolved after parsing
    pub name: String,
    /// `st_info`, kept packed exactly as stored; use [`st_type`]/[`st_bind`] to decode
    pub info: u8,
    /// `st_other`
    pub other: u8,
    /// `st_shndx`: the section this symbol is defined in, or one of the `SHN_*` specials
    pub shndx: u16,
    /// `st_value`
    pub value: u64,
    /// `st_size`
    pub size: u64,
}

impl Symbol {
    /// Size in bytes of one symbol table entry of this class
    pub fn entsize_for(codec: &Codec) -> usize {
        match codec.width {
            Width::Elf32 => 16,
            Width::Elf64 => 24,
        }
    }

    /// Parse one entry at `off`. ELF32 and ELF64 both place `st_name` first but order
    /// the remaining fields differently.
    pub fn parse(buf: &[u8], off: usize, codec: &Codec) -> Result<Self> {
        match codec.width {
            Width::Elf32 => {
                let name_offset = codec.read_u32(buf, off)?;
                let value = codec.read_u32(buf, off + 4)? as u64;
                let size = codec.read_u32(buf, off + 8)? as u64;
                let info = buf[off + 12];
                let other = buf[off + 13];
                let shndx = codec.read_u16(buf, off + 14)?;
                Ok(Self {
                    name_offset,
                    name: String::new(),
                    info,
                    other,
                    shndx,
                    value,
                    size,
                })
            }
            Width::Elf64 => {
                let name_offset = codec.read_u32(buf, off)?;
                let info = buf[off + 4];
                let other = buf[off + 5];
                let shndx = codec.read_u16(buf, off + 6)?;
                let value = codec.read_u64(buf, off + 8)?;
                let size = codec.read_u64(buf, off + 16)?;
                Ok(Self {
                    name_offset,
                    name: String::new(),
                    info,
                    other,
                    shndx,
                    value,
                    size,
                })
            }
        }
    }

    /// Serialize this entry at `off`
    pub fn write(&self, buf: &mut [u8], off: usize, codec: &Codec) -> Result<()> {
        match codec.width {
            Width::Elf32 => {
                codec.write_u32(buf, off, self.name_offset)?;
                codec.write_native(buf, off + 4, self.value)?;
                codec.write_native(buf, off + 8, self.size)?;
                buf[off + 12] = self.info;
                buf[off + 13] = self.other;
                codec.write_u16(buf, off + 14, self.shndx)?;
            }
            Width::Elf64 => {
                codec.write_u32(buf, off, self.name_offset)?;
                buf[off + 4] = self.info;
                buf[off + 5] = self.other;
                codec.write_u16(buf, off + 6, self.shndx)?;
                codec.write_u64(buf, off + 8, self.value)?;
                codec.write_u64(buf, off + 16, self.size)?;
            }
        }
        Ok(())
    }

}

#[cfg(test)]
mod test {
    use super::*;
    use crate::base::Endian;

    #[test]
    fn round_trips_elf64() {
        let codec = Codec::new(Width::Elf64, Endian::Little);
        let mut buf = vec![0u8; Symbol::entsize_for(&codec)];
        let sym = Symbol {
            name_offset: 5,
            name: String::new(),
            info: make_st_info(1, 1),
            other: 0,
            shndx: 3,
            value: 0x2000,
            size: 0,
        };
        sym.write(&mut buf, 0, &codec).unwrap();
        let parsed = Symbol::parse(&buf, 0, &codec).unwrap();
        assert_eq!(parsed.shndx, 3);
        assert_eq!(parsed.info, make_st_info(1, 1));
    }

    #[test]
    fn round_trips_elf32() {
        let codec = Codec::new(Width::Elf32, Endian::Big);
        let mut buf = vec![0u8; Symbol::entsize_for(&codec)];
        let sym = Symbol {
            name_offset: 1,
            name: String::new(),
            info: make_st_info(2, 1),
            other: 0,
            shndx: SHN_UNDEF,
            value: 0,
            size: 4,
        };
        sym.write(&mut buf, 0, &codec).unwrap();
        let parsed = Symbol::parse(&buf, 0, &codec).unwrap();
        assert_eq!(parsed, Symbol { name: String::new(), ..sym });
        assert_eq!(parsed.shndx, SHN_UNDEF);
    }
}
