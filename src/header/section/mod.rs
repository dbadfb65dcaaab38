//! Implementation of the ELF section header table

use bitflags::bitflags;

use crate::base::Codec;
use crate::error::{Error, Result};

/// Numeric `sh_type` constants this engine has specific behavior for. Any other value
/// parses into [`ShType::Unknown`] and is preserved byte-for-byte on rewrite, since the
/// engine only needs to understand the handful of section kinds it rewrites.
pub mod sht {
    /// SHT_NULL
    pub const NULL: u32 = 0;
    /// SHT_PROGBITS
    pub const PROGBITS: u32 = 1;
    /// SHT_SYMTAB
    pub const SYMTAB: u32 = 2;
    /// SHT_STRTAB
    pub const STRTAB: u32 = 3;
    /// SHT_RELA
    pub const RELA: u32 = 4;
    /// SHT_HASH
    pub const HASH: u32 = 5;
    /// SHT_DYNAMIC
    pub const DYNAMIC: u32 = 6;
    /// SHT_NOTE
    pub const NOTE: u32 = 7;
    /// SHT_NOBITS
    pub const NOBITS: u32 = 8;
    /// SHT_REL
    pub const REL: u32 = 9;
    /// SHT_DYNSYM
    pub const DYNSYM: u32 = 11;
    /// SHT_GNU_HASH
    pub const GNU_HASH: u32 = 0x6fff_fff6;
    /// SHT_GNU_verdef
    pub const GNU_VERDEF: u32 = 0x6fff_fffd;
    /// SHT_GNU_verneed
    pub const GNU_VERNEED: u32 = 0x6fff_fffe;
    /// SHT_GNU_versym
    pub const GNU_VERSYM: u32 = 0x6fff_ffff;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
/// `sh_type`, the interpretation of a section's contents
pub enum ShType {
    /// SHT_NULL
    Null,
    /// SHT_PROGBITS
    ProgBits,
    /// SHT_SYMTAB
    SymTab,
    /// SHT_STRTAB
    StrTab,
    /// SHT_RELA
    Rela,
    /// SHT_HASH
    Hash,
    /// SHT_DYNAMIC
    Dynamic,
    /// SHT_NOTE
    Note,
    /// SHT_NOBITS
    NoBits,
    /// SHT_REL
    Rel,
    /// SHT_DYNSYM
    DynSym,
    /// SHT_GNU_HASH
    GnuHash,
    /// SHT_GNU_verdef
    GnuVerdef,
    /// SHT_GNU_verneed
    GnuVerneed,
    /// SHT_GNU_versym
    GnuVersym,
    /// Anything else, carried through unmodified
    Unknown(u32),
}

impl ShType {
    /// Decode a raw `sh_type` value
    pub fn from_raw(value: u32) -> Self {
        match value {
            sht::NULL => ShType::Null,
            sht::PROGBITS => ShType::ProgBits,
            sht::SYMTAB => ShType::SymTab,
            sht::STRTAB => ShType::StrTab,
            sht::RELA => ShType::Rela,
            sht::HASH => ShType::Hash,
            sht::DYNAMIC => ShType::Dynamic,
            sht::NOTE => ShType::Note,
            sht::NOBITS => ShType::NoBits,
            sht::REL => ShType::Rel,
            sht::DYNSYM => ShType::DynSym,
            sht::GNU_HASH => ShType::GnuHash,
            sht::GNU_VERDEF => ShType::GnuVerdef,
            sht::GNU_VERNEED => ShType::GnuVerneed,
            sht::GNU_VERSYM => ShType::GnuVersym,
            other => ShType::Unknown(other),
        }
    }

    /// Encode back to the raw `sh_type` value
    pub fn to_raw(self) -> u32 {
        match self {
            ShType::Null => sht::NULL,
            ShType::ProgBits => sht::PROGBITS,
            ShType::SymTab => sht::SYMTAB,
            ShType::StrTab => sht::STRTAB,
            ShType::Rela => sht::RELA,
            ShType::Hash => sht::HASH,
            ShType::Dynamic => sht::DYNAMIC,
            ShType::Note => sht::NOTE,
            ShType::NoBits => sht::NOBITS,
            ShType::Rel => sht::REL,
            ShType::DynSym => sht::DYNSYM,
            ShType::GnuHash => sht::GNU_HASH,
            ShType::GnuVerdef => sht::GNU_VERDEF,
            ShType::GnuVerneed => sht::GNU_VERNEED,
            ShType::GnuVersym => sht::GNU_VERSYM,
            ShType::Unknown(raw) => raw,
        }
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    /// `sh_flags`
    pub struct ShFlags: u64 {
        /// SHF_WRITE
        const WRITE = 0x1;
        /// SHF_ALLOC — the section occupies memory at run time and must live inside
        /// some `PT_LOAD` segment
        const ALLOC = 0x2;
        /// SHF_EXECINSTR
        const EXECINSTR = 0x4;
        /// SHF_MERGE
        const MERGE = 0x10;
        /// SHF_STRINGS
        const STRINGS = 0x20;
        /// SHF_INFO_LINK
        const INFO_LINK = 0x40;
        /// SHF_LINK_ORDER
        const LINK_ORDER = 0x80;
        /// SHF_TLS
        const TLS = 0x400;
    }
}

/// Size in bytes of one ELF32 section header entry
pub const SHENTSIZE32: u16 = 40;
/// Size in bytes of one ELF64 section header entry
pub const SHENTSIZE64: u16 = 64;

/// SHN_UNDEF
pub const SHN_UNDEF: u16 = 0;
/// SHN_LORESERVE: the first reserved section index; real indices never reach this high
pub const SHN_LORESERVE: u16 = 0xff00;

#[derive(Debug, Clone, PartialEq, Eq)]
/// A single entry of the section header table
pub struct SectionHeader {
    /// `sh_name`: byte offset into `.shstrtab`
    pub name_offset: u32,
    /// The section's name, resolved from `.shstrtab` after parsing
    pub name: String,
    /// `sh_type`
    pub sh_type: ShType,
    /// `sh_flags`
    pub flags: ShFlags,
    /// `sh_addr`
    pub addr: u64,
    /// `sh_offset`
    pub offset: u64,
    /// `sh_size`
    pub size: u64,
    /// `sh_link`
    pub link: u32,
    /// `sh_info`
    pub info: u32,
    /// `sh_addralign`
    pub addralign: u64,
    /// `sh_entsize`
    pub entsize: u64,
}

impl SectionHeader {
    /// Size in bytes of one entry of this header's class, per `codec.width`
    pub fn entsize_for(codec: &Codec) -> u16 {
        match codec.width {
            crate::base::Width::Elf32 => SHENTSIZE32,
            crate::base::Width::Elf64 => SHENTSIZE64,
        }
    }

    /// Parse one section header entry at `off`; `name` is left empty, resolved later
    /// once `.shstrtab`'s bytes are known.
    pub fn parse(buf: &[u8], off: usize, codec: &Codec) -> Result<Self> {
        use crate::base::Width;
        let name_offset = codec.read_u32(buf, off)?;
        let sh_type = ShType::from_raw(codec.read_u32(buf, off + 4)?);
        match codec.width {
            Width::Elf32 => {
                let flags = codec.read_u32(buf, off + 8)? as u64;
                let addr = codec.read_u32(buf, off + 12)? as u64;
                let offset = codec.read_u32(buf, off + 16)? as u64;
                let size = codec.read_u32(buf, off + 20)? as u64;
                let link = codec.read_u32(buf, off + 24)?;
                let info = codec.read_u32(buf, off + 28)?;
                let addralign = codec.read_u32(buf, off + 32)? as u64;
                let entsize = codec.read_u32(buf, off + 36)? as u64;
                Ok(Self {
                    name_offset,
                    name: String::new(),
                    sh_type,
                    flags: ShFlags::from_bits_truncate(flags),
                    addr,
                    offset,
                    size,
                    link,
                    info,
                    addralign,
                    entsize,
                })
            }
            Width::Elf64 => {
                let flags = codec.read_u64(buf, off + 8)?;
                let addr = codec.read_u64(buf, off + 16)?;
                let offset = codec.read_u64(buf, off + 24)?;
                let size = codec.read_u64(buf, off + 32)?;
                let link = codec.read_u32(buf, off + 40)?;
                let info = codec.read_u32(buf, off + 44)?;
                let addralign = codec.read_u64(buf, off + 48)?;
                let entsize = codec.read_u64(buf, off + 56)?;
                Ok(Self {
                    name_offset,
                    name: String::new(),
                    sh_type,
                    flags: ShFlags::from_bits_truncate(flags),
                    addr,
                    offset,
                    size,
                    link,
                    info,
                    addralign,
                    entsize,
                })
            }
        }
    }

    /// Serialize this entry at `off` in `buf`
    pub fn write(&self, buf: &mut [u8], off: usize, codec: &Codec) -> Result<()> {
        use crate::base::Width;
        codec.write_u32(buf, off, self.name_offset)?;
        codec.write_u32(buf, off + 4, self.sh_type.to_raw())?;
        match codec.width {
            Width::Elf32 => {
                let truncate = |v: u64, field: &str| -> Result<u32> {
                    u32::try_from(v).map_err(|_| {
                        Error::malformed(format!("{field} does not fit in 32 bits"))
                    })
                };
                codec.write_u32(buf, off + 8, truncate(self.flags.bits(), "sh_flags")?)?;
                codec.write_u32(buf, off + 12, truncate(self.addr, "sh_addr")?)?;
                codec.write_u32(buf, off + 16, truncate(self.offset, "sh_offset")?)?;
                codec.write_u32(buf, off + 20, truncate(self.size, "sh_size")?)?;
                codec.write_u32(buf, off + 24, self.link)?;
                codec.write_u32(buf, off + 28, self.info)?;
                codec.write_u32(buf, off + 32, truncate(self.addralign, "sh_addralign")?)?;
                codec.write_u32(buf, off + 36, truncate(self.entsize, "sh_entsize")?)?;
            }
            Width::Elf64 => {
                codec.write_u64(buf, off + 8, self.flags.bits())?;
                codec.write_u64(buf, off + 16, self.addr)?;
                codec.write_u64(buf, off + 24, self.offset)?;
                codec.write_u64(buf, off + 32, self.size)?;
                codec.write_u32(buf, off + 40, self.link)?;
                codec.write_u32(buf, off + 44, self.info)?;
                codec.write_u64(buf, off + 48, self.addralign)?;
                codec.write_u64(buf, off + 56, self.entsize)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::base::{Endian, Width};

    #[test]
    fn round_trips_elf64() {
        let codec = Codec::new(Width::Elf64, Endian::Little);
        let mut buf = vec![0u8; SHENTSIZE64 as usize];
        let header = SectionHeader {
            name_offset: 11,
            name: String::new(),
            sh_type: ShType::Dynamic,
            flags: ShFlags::WRITE | ShFlags::ALLOC,
            addr: 0x2000,
            offset: 0x2000,
            size: 0xa0,
            link: 4,
            info: 0,
            addralign: 8,
            entsize: 16,
        };
        header.write(&mut buf, 0, &codec).unwrap();
        let parsed = SectionHeader::parse(&buf, 0, &codec).unwrap();
        assert_eq!(parsed.sh_type, ShType::Dynamic);
        assert_eq!(parsed.flags, ShFlags::WRITE | ShFlags::ALLOC);
        assert_eq!(parsed.addr, 0x2000);
    }

    #[test]
    fn unknown_type_round_trips_unchanged() {
        assert_eq!(ShType::from_raw(0x7000_0001), ShType::Unknown(0x7000_0001));
        assert_eq!(ShType::Unknown(0x7000_0001).to_raw(), 0x7000_0001);
    }

    #[test]
    fn gnu_hash_type_is_recognized() {
        assert_eq!(ShType::from_raw(sht::GNU_HASH), ShType::GnuHash);
    }
}
