//! The `e_ident` field of the ELF header: magic, class, data encoding, version, and
//! OS ABI. Unlike the rest of the header this is always decoded byte-by-byte, with no
//! regard to class or endianness, since it is what determines both of those.

use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::FromPrimitive;

use crate::base::{Endian, Width};
use crate::error::{Error, Result};

/// `e_ident[EI_MAG0..EI_MAG3]`
pub const ELF_MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive)]
/// `e_ident[EI_CLASS]`: whether the object is 32- or 64-bit
pub enum ElfClass {
    /// ELFCLASS32
    Elf32 = 1,
    /// ELFCLASS64
    Elf64 = 2,
}

impl ElfClass {
    /// Convert to the runtime [`Width`] used by the [`crate::base::Codec`]
    pub fn width(self) -> Width {
        match self {
            ElfClass::Elf32 => Width::Elf32,
            ElfClass::Elf64 => Width::Elf64,
        }
    }

    /// Parse `e_ident[EI_CLASS]`, rejecting `ELFCLASSNONE` and anything unrecognized
    pub fn from_byte(value: u8) -> Result<Self> {
        Self::from_u8(value).ok_or(Error::UnsupportedClass(value))
    }
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive)]
/// `e_ident[EI_DATA]`: the object's byte order
pub enum ElfDataEncoding {
    /// ELFDATA2LSB
    LittleEndian = 1,
    /// ELFDATA2MSB
    BigEndian = 2,
}

impl ElfDataEncoding {
    /// Convert to the runtime [`Endian`] used by the [`crate::base::Codec`]
    pub fn endian(self) -> Endian {
        match self {
            ElfDataEncoding::LittleEndian => Endian::Little,
            ElfDataEncoding::BigEndian => Endian::Big,
        }
    }

    /// Parse `e_ident[EI_DATA]`, rejecting `ELFDATANONE` and anything unrecognized
    pub fn from_byte(value: u8) -> Result<Self> {
        Self::from_u8(value).ok_or(Error::UnsupportedDataEncoding(value))
    }
}

/// `EV_CURRENT`
pub const EV_CURRENT: u8 = 1;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[non_exhaustive]
/// `e_ident[EI_OSABI]`: the fixed set of names `--print-os-abi`/`--set-os-abi` understand.
///
/// This is intentionally the exact closed set the original tool supports, not the
/// full ELF OS/ABI enumeration: an unrecognized byte in a parsed file is displayed as
/// its raw numeric value rather than rejected.
pub enum ElfOsAbi {
    /// System V
    SystemV = 0,
    /// HP-UX
    HpUx = 1,
    /// NetBSD
    NetBsd = 2,
    /// Linux / GNU extensions
    Linux = 3,
    /// GNU Hurd
    Hurd = 4,
    /// Sun Solaris
    Solaris = 6,
    /// IBM AIX
    Aix = 7,
    /// SGI IRIX
    Irix = 8,
    /// FreeBSD
    FreeBsd = 9,
    /// Compaq TRU64 UNIX
    Tru64 = 10,
    /// OpenBSD
    OpenBsd = 12,
    /// Open VMS
    OpenVms = 13,
}

impl ElfOsAbi {
    /// Map a CLI-facing name (as accepted by `--set-os-abi`) to its numeric code.
    pub fn from_name(name: &str) -> Result<Self> {
        Ok(match name {
            "System V" | "SysV" | "none" => ElfOsAbi::SystemV,
            "HP-UX" => ElfOsAbi::HpUx,
            "NetBSD" => ElfOsAbi::NetBsd,
            "Linux" | "GNU" => ElfOsAbi::Linux,
            "Hurd" => ElfOsAbi::Hurd,
            "Solaris" => ElfOsAbi::Solaris,
            "AIX" => ElfOsAbi::Aix,
            "IRIX" => ElfOsAbi::Irix,
            "FreeBSD" => ElfOsAbi::FreeBsd,
            "TRU64" | "Tru64" => ElfOsAbi::Tru64,
            "OpenBSD" => ElfOsAbi::OpenBsd,
            "OpenVMS" | "VMS" => ElfOsAbi::OpenVms,
            other => return Err(Error::UnknownOsAbi(other.to_string())),
        })
    }

    /// The canonical display name `--print-os-abi` prints, the inverse of [`Self::from_name`]
    pub fn name(self) -> &'static str {
        match self {
            ElfOsAbi::SystemV => "System V",
            ElfOsAbi::HpUx => "HP-UX",
            ElfOsAbi::NetBsd => "NetBSD",
            ElfOsAbi::Linux => "Linux",
            ElfOsAbi::Hurd => "Hurd",
            ElfOsAbi::Solaris => "Solaris",
            ElfOsAbi::Aix => "AIX",
            ElfOsAbi::Irix => "IRIX",
            ElfOsAbi::FreeBsd => "FreeBSD",
            ElfOsAbi::Tru64 => "TRU64",
            ElfOsAbi::OpenBsd => "OpenBSD",
            ElfOsAbi::OpenVms => "OpenVMS",
        }
    }
}
