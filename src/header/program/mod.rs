//! Implementation of the ELF program header table: the segment view of the file that
//! the dynamic loader actually maps and interprets.

use bitflags::bitflags;

use crate::base::{Codec, Width};
use crate::error::Result;

/// Numeric `p_type` constants
pub mod pt {
    /// PT_NULL
    pub const NULL: u32 = 0;
    /// PT_LOAD
    pub const LOAD: u32 = 1;
    /// PT_DYNAMIC
    pub const DYNAMIC: u32 = 2;
    /// PT_INTERP
    pub const INTERP: u32 = 3;
    /// PT_NOTE
    pub const NOTE: u32 = 4;
    /// PT_PHDR
    pub const PHDR: u32 = 6;
    /// PT_GNU_EH_FRAME
    pub const GNU_EH_FRAME: u32 = 0x6474_e550;
    /// PT_GNU_STACK
    pub const GNU_STACK: u32 = 0x6474_e551;
    /// PT_GNU_RELRO
    pub const GNU_RELRO: u32 = 0x6474_e552;
    /// PT_GNU_PROPERTY
    pub const GNU_PROPERTY: u32 = 0x6474_e553;
    /// PT_MIPS_ABIFLAGS
    pub const MIPS_ABIFLAGS: u32 = 0x7000_0003;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
/// `p_type`, the kind of segment this header describes
pub enum PtType {
    /// PT_NULL — an unused entry, the engine's preferred way to retire a program
    /// header it no longer needs without shifting every later index
    Null,
    /// PT_LOAD
    Load,
    /// PT_DYNAMIC
    Dynamic,
    /// PT_INTERP
    Interp,
    /// PT_NOTE
    Note,
    /// PT_PHDR
    Phdr,
    /// PT_GNU_EH_FRAME
    GnuEhFrame,
    /// PT_GNU_STACK — presence and `PF_X` govern `--print-execstack`/`--set-execstack`
    GnuStack,
    /// PT_GNU_RELRO
    GnuRelro,
    /// PT_GNU_PROPERTY
    GnuProperty,
    /// PT_MIPS_ABIFLAGS
    MipsAbiflags,
    /// Anything else, carried through unmodified
    Unknown(u32),
}

impl PtType {
    /// Decode a raw `p_type` value
    pub fn from_raw(value: u32) -> Self {
        match value {
            pt::NULL => PtType::Null,
            pt::LOAD => PtType::Load,
            pt::DYNAMIC => PtType::Dynamic,
            pt::INTERP => PtType::Interp,
            pt::NOTE => PtType::Note,
            pt::PHDR => PtType::Phdr,
            pt::GNU_EH_FRAME => PtType::GnuEhFrame,
            pt::GNU_STACK => PtType::GnuStack,
            pt::GNU_RELRO => PtType::GnuRelro,
            pt::GNU_PROPERTY => PtType::GnuProperty,
            pt::MIPS_ABIFLAGS => PtType::MipsAbiflags,
            other => PtType::Unknown(other),
        }
    }

    /// Encode back to the raw `p_type` value
    pub fn to_raw(self) -> u32 {
        match self {
            PtType::Null => pt::NULL,
            PtType::Load => pt::LOAD,
            PtType::Dynamic => pt::DYNAMIC,
            PtType::Interp => pt::INTERP,
            PtType::Note => pt::NOTE,
            PtType::Phdr => pt::PHDR,
            PtType::GnuEhFrame => pt::GNU_EH_FRAME,
            PtType::GnuStack => pt::GNU_STACK,
            PtType::GnuRelro => pt::GNU_RELRO,
            PtType::GnuProperty => pt::GNU_PROPERTY,
            PtType::MipsAbiflags => pt::MIPS_ABIFLAGS,
            PtType::Unknown(raw) => raw,
        }
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    /// `p_flags`
    pub struct PFlags: u32 {
        /// PF_X — executable; toggled by `--clear-execstack`/`--set-execstack` on `PT_GNU_STACK`
        const X = 0x1;
        /// PF_W
        const W = 0x2;
        /// PF_R
        const R = 0x4;
    }
}

/// Size in bytes of one ELF32 program header entry
pub const PHENTSIZE32: u16 = 32;
/// Size in bytes of one ELF64 program header entry
pub const PHENTSIZE64: u16 = 56;

#[derive(Debug, Clone, PartialEq, Eq)]
/// A single entry of the program header table
pub struct ProgramHeader {
    /// `p_type`
    pub p_type: PtType,
    /// `p_flags`
    pub flags: PFlags,
    /// `p_offset`
    pub offset: u64,
    /// `p_vaddr`
    pub vaddr: u64,
    /// `p_paddr`
    pub paddr: u64,
    /// `p_filesz`
    pub filesz: u64,
    /// `p_memsz`
    pub memsz: u64,
    /// `p_align`
    pub align: u64,
}

impl ProgramHeader {
    /// Size in bytes of one entry of this header's class, per `codec.width`
    pub fn entsize_for(codec: &Codec) -> u16 {
        match codec.width {
            Width::Elf32 => PHENTSIZE32,
            Width::Elf64 => PHENTSIZE64,
        }
    }

    /// Parse one program header entry at `off`. ELF32 and ELF64 lay fields out in a
    /// different order (`p_flags` moves from the end to right after `p_type`), so the
    /// two branches read genuinely different byte offsets rather than sharing code.
    pub fn parse(buf: &[u8], off: usize, codec: &Codec) -> Result<Self> {
        match codec.width {
            Width::Elf32 => {
                let p_type = PtType::from_raw(codec.read_u32(buf, off)?);
                let offset = codec.read_u32(buf, off + 4)? as u64;
                let vaddr = codec.read_u32(buf, off + 8)? as u64;
                let paddr = codec.read_u32(buf, off + 12)? as u64;
                let filesz = codec.read_u32(buf, off + 16)? as u64;
                let memsz = codec.read_u32(buf, off + 20)? as u64;
                let flags = codec.read_u32(buf, off + 24)?;
                let align = codec.read_u32(buf, off + 28)? as u64;
                Ok(Self {
                    p_type,
                    flags: PFlags::from_bits_truncate(flags),
                    offset,
                    vaddr,
                    paddr,
                    filesz,
                    memsz,
                    align,
                })
            }
            Width::Elf64 => {
                let p_type = PtType::from_raw(codec.read_u32(buf, off)?);
                let flags = codec.read_u32(buf, off + 4)?;
                let offset = codec.read_u64(buf, off + 8)?;
                let vaddr = codec.read_u64(buf, off + 16)?;
                let paddr = codec.read_u64(buf, off + 24)?;
                let filesz = codec.read_u64(buf, off + 32)?;
                let memsz = codec.read_u64(buf, off + 40)?;
                let align = codec.read_u64(buf, off + 48)?;
                Ok(Self {
                    p_type,
                    flags: PFlags::from_bits_truncate(flags),
                    offset,
                    vaddr,
                    paddr,
                    filesz,
                    memsz,
                    align,
                })
            }
        }
    }

    /// Serialize this entry at `off` in `buf`
    pub fn write(&self, buf: &mut [u8], off: usize, codec: &Codec) -> Result<()> {
        match codec.width {
            Width::Elf32 => {
                codec.write_u32(buf, off, self.p_type.to_raw())?;
                codec.write_native(buf, off + 4, self.offset)?;
                codec.write_native(buf, off + 8, self.vaddr)?;
                codec.write_native(buf, off + 12, self.paddr)?;
                codec.write_native(buf, off + 16, self.filesz)?;
                codec.write_native(buf, off + 20, self.memsz)?;
                codec.write_u32(buf, off + 24, self.flags.bits())?;
                codec.write_native(buf, off + 28, self.align)?;
            }
            Width::Elf64 => {
                codec.write_u32(buf, off, self.p_type.to_raw())?;
                codec.write_u32(buf, off + 4, self.flags.bits())?;
                codec.write_u64(buf, off + 8, self.offset)?;
                codec.write_u64(buf, off + 16, self.vaddr)?;
                codec.write_u64(buf, off + 24, self.paddr)?;
                codec.write_u64(buf, off + 32, self.filesz)?;
                codec.write_u64(buf, off + 40, self.memsz)?;
                codec.write_u64(buf, off + 48, self.align)?;
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
        let mut buf = vec![0u8; PHENTSIZE64 as usize];
        let header = ProgramHeader {
            p_type: PtType::Load,
            flags: PFlags::R | PFlags::X,
            offset: 0,
            vaddr: 0x400000,
            paddr: 0x400000,
            filesz: 0x1000,
            memsz: 0x1000,
            align: 0x1000,
        };
        header.write(&mut buf, 0, &codec).unwrap();
        let parsed = ProgramHeader::parse(&buf, 0, &codec).unwrap();
        assert_eq!(parsed, header);
    }

    #[test]
    fn round_trips_elf32() {
        let codec = Codec::new(Width::Elf32, Endian::Big);
        let mut buf = vec![0u8; PHENTSIZE32 as usize];
        let header = ProgramHeader {
            p_type: PtType::Interp,
            flags: PFlags::R,
            offset: 0x34,
            vaddr: 0x8048034,
            paddr: 0x8048034,
            filesz: 0x13,
            memsz: 0x13,
            align: 1,
        };
        header.write(&mut buf, 0, &codec).unwrap();
        let parsed = ProgramHeader::parse(&buf, 0, &codec).unwrap();
        assert_eq!(parsed, header);
    }

    #[test]
    fn unknown_type_round_trips() {
        assert_eq!(PtType::from_raw(0x1234), PtType::Unknown(0x1234));
        assert_eq!(PtType::Unknown(0x1234).to_raw(), 0x1234);
    }
}
