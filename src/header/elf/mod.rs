//! The ELF file header: the fixed-size record at offset 0 that describes how to
//! locate every other header table in the file.

use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::FromPrimitive;

use crate::base::Codec;
use crate::error::{Error, Result};

pub mod identification;

use identification::{ElfClass, ElfDataEncoding, ElfOsAbi, ELF_MAGIC, EV_CURRENT};

/// Size in bytes of `e_ident`
pub const EI_NIDENT: usize = 16;
/// Size in bytes of the fixed part of an ELF32 header
pub const EHSIZE32: u16 = 52;
/// Size in bytes of the fixed part of an ELF64 header
pub const EHSIZE64: u16 = 64;

#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[non_exhaustive]
/// `e_type`: the object file's kind
pub enum ElfType {
    /// ET_NONE
    None = 0,
    /// ET_REL — relocatable object, out of scope for this engine
    Relocatable = 1,
    /// ET_EXEC — statically positioned executable
    Executable = 2,
    /// ET_DYN — position-independent executable or shared object
    SharedObject = 3,
    /// ET_CORE — core dump, out of scope for this engine
    Core = 4,
}

impl ElfType {
    /// Parse `e_type`, accepting only the two kinds this engine patches
    pub fn from_supported(value: u16) -> Result<Self> {
        match Self::from_u16(value) {
            Some(t @ (ElfType::Executable | ElfType::SharedObject)) => Ok(t),
            _ => Err(Error::UnsupportedElfType(value)),
        }
    }
}

/// Well-known `e_machine` values used to pick a default page size (§4.5, arch table)
pub mod em {
    /// EM_386
    pub const I386: u16 = 3;
    /// EM_MIPS
    pub const MIPS: u16 = 8;
    /// EM_PPC
    pub const PPC: u16 = 20;
    /// EM_PPC64
    pub const PPC64: u16 = 21;
    /// EM_ARM
    pub const ARM: u16 = 40;
    /// EM_X86_64
    pub const X86_64: u16 = 62;
    /// EM_AARCH64
    pub const AARCH64: u16 = 183;
    /// EM_RISCV
    pub const RISCV: u16 = 243;
}

/// Default page size for an `e_machine` value, used unless overridden by `--page-size`
pub fn default_page_size(machine: u16) -> u64 {
    match machine {
        em::MIPS | em::PPC64 | em::AARCH64 | em::RISCV => 0x10000,
        em::PPC => 0x10000,
        _ => 0x1000,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// The decoded ELF file header
pub struct ElfHeader {
    /// `e_ident[EI_CLASS]`
    pub class: ElfClass,
    /// `e_ident[EI_DATA]`
    pub data_encoding: ElfDataEncoding,
    /// `e_ident[EI_OSABI]`, kept as the raw byte since files may use values outside
    /// [`ElfOsAbi`]'s fixed, print/set-able set
    pub os_abi_raw: u8,
    /// `e_ident[EI_ABIVERSION]`
    pub abi_version: u8,
    /// `e_type`
    pub e_type: ElfType,
    /// `e_machine`
    pub e_machine: u16,
    /// `e_version`
    pub e_version: u32,
    /// `e_entry`
    pub e_entry: u64,
    /// `e_phoff`
    pub e_phoff: u64,
    /// `e_shoff`
    pub e_shoff: u64,
    /// `e_flags`
    pub e_flags: u32,
    /// `e_ehsize`
    pub e_ehsize: u16,
    /// `e_phentsize`
    pub e_phentsize: u16,
    /// `e_phnum`
    pub e_phnum: u16,
    /// `e_shentsize`
    pub e_shentsize: u16,
    /// `e_shnum`
    pub e_shnum: u16,
    /// `e_shstrndx`
    pub e_shstrndx: u16,
}

impl ElfHeader {
    /// Parse `e_ident` only, enough to build a [`Codec`] for the rest of the header.
    /// Returns `(class, data_encoding, codec)`.
    pub fn parse_ident(buf: &[u8]) -> Result<(ElfClass, ElfDataEncoding, Codec)> {
        if buf.len() < EI_NIDENT {
            return Err(Error::TooShort);
        }
        if buf[0..4] != ELF_MAGIC {
            return Err(Error::BadMagic);
        }
        let class = ElfClass::from_byte(buf[4])?;
        let data_encoding = ElfDataEncoding::from_byte(buf[5])?;
        let ei_version = buf[6];
        if ei_version != EV_CURRENT {
            return Err(Error::UnsupportedVersion(ei_version));
        }
        let codec = Codec::new(class.width(), data_encoding.endian());
        Ok((class, data_encoding, codec))
    }

    /// Read just `e_machine` out of a candidate file's bytes, without validating
    /// `e_type` or requiring the rest of the header to describe an object kind this
    /// engine patches. Used by `--shrink-rpath` to check a candidate library's machine
    /// type against the binary being patched, without pulling in the full parse
    /// pipeline for a file this engine never otherwise touches.
    pub fn peek_machine(buf: &[u8]) -> Result<u16> {
        let (_, _, codec) = Self::parse_ident(buf)?;
        codec.read_u16(buf, EI_NIDENT + 2)
    }

    /// Parse the fixed-size ELF header, including `e_ident`
    pub fn parse(buf: &[u8]) -> Result<Self> {
        let (class, data_encoding, codec) = Self::parse_ident(buf)?;
        let min_size = match class {
            ElfClass::Elf32 => EHSIZE32,
            ElfClass::Elf64 => EHSIZE64,
        } as usize;
        if buf.len() < min_size {
            return Err(Error::TooShort);
        }

        let os_abi_raw = buf[7];
        let abi_version = buf[8];

        let mut off = EI_NIDENT;
        let e_type_raw = codec.read_u16(buf, off)?;
        off += 2;
        let e_machine = codec.read_u16(buf, off)?;
        off += 2;
        let e_version = codec.read_u32(buf, off)?;
        off += 4;
        let e_entry = codec.read_native(buf, off)?;
        off += codec.width.word_size();
        let e_phoff = codec.read_native(buf, off)?;
        off += codec.width.word_size();
        let e_shoff = codec.read_native(buf, off)?;
        off += codec.width.word_size();
        let e_flags = codec.read_u32(buf, off)?;
        off += 4;
        let e_ehsize = codec.read_u16(buf, off)?;
        off += 2;
        let e_phentsize = codec.read_u16(buf, off)?;
        off += 2;
        let e_phnum = codec.read_u16(buf, off)?;
        off += 2;
        let e_shentsize = codec.read_u16(buf, off)?;
        off += 2;
        let e_shnum = codec.read_u16(buf, off)?;
        off += 2;
        let e_shstrndx = codec.read_u16(buf, off)?;

        let e_type = ElfType::from_supported(e_type_raw)?;
        if e_version != EV_CURRENT as u32 {
            return Err(Error::UnsupportedVersion(e_version as u8));
        }

        Ok(Self {
            class,
            data_encoding,
            os_abi_raw,
            abi_version,
            e_type,
            e_machine,
            e_version,
            e_entry,
            e_phoff,
            e_shoff,
            e_flags,
            e_ehsize,
            e_phentsize,
            e_phnum,
            e_shentsize,
            e_shnum,
            e_shstrndx,
        })
    }

    /// Serialize the header back into `buf` at offset 0, using `codec` for endianness
    pub fn write(&self, buf: &mut [u8], codec: &Codec) -> Result<()> {
        buf[0..4].copy_from_slice(&ELF_MAGIC);
        buf[4] = self.class as u8;
        buf[5] = self.data_encoding as u8;
        buf[6] = EV_CURRENT;
        buf[7] = self.os_abi_raw;
        buf[8] = self.abi_version;
        for b in &mut buf[9..EI_NIDENT] {
            *b = 0;
        }

        let mut off = EI_NIDENT;
        codec.write_u16(buf, off, self.e_type as u16)?;
        off += 2;
        codec.write_u16(buf, off, self.e_machine)?;
        off += 2;
        codec.write_u32(buf, off, self.e_version)?;
        off += 4;
        codec.write_native(buf, off, self.e_entry)?;
        off += codec.width.word_size();
        codec.write_native(buf, off, self.e_phoff)?;
        off += codec.width.word_size();
        codec.write_native(buf, off, self.e_shoff)?;
        off += codec.width.word_size();
        codec.write_u32(buf, off, self.e_flags)?;
        off += 4;
        codec.write_u16(buf, off, self.e_ehsize)?;
        off += 2;
        codec.write_u16(buf, off, self.e_phentsize)?;
        off += 2;
        codec.write_u16(buf, off, self.e_phnum)?;
        off += 2;
        codec.write_u16(buf, off, self.e_shentsize)?;
        off += 2;
        codec.write_u16(buf, off, self.e_shnum)?;
        off += 2;
        codec.write_u16(buf, off, self.e_shstrndx)?;
        Ok(())
    }

    /// `EI_OSABI` as a named [`ElfOsAbi`], if it falls within the fixed set this tool
    /// can print by name; otherwise `None` (callers fall back to the raw byte).
    pub fn os_abi(&self) -> Option<ElfOsAbi> {
        ElfOsAbi::from_u8(self.os_abi_raw)
    }
}
