//! Bit-exact endian/width adapter
//!
//! Every read or write of a multi-byte field anywhere in the engine goes through a
//! [`Codec`]. It is the only place that knows whether the file is little- or
//! big-endian, and the only place that knows whether a "native word" field is 4 or 8
//! bytes wide. Nothing else in this crate calls `from_le_bytes`/`from_be_bytes` directly.

use crate::error::{Error, Result};

/// The file's class: whether addresses/offsets are 32 or 64 bits wide
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    /// ELFCLASS32
    Elf32,
    /// ELFCLASS64
    Elf64,
}

impl Width {
    /// Size in bytes of a native word (address, offset, or `Elf32_Word`/`Elf64_Xword`-class field)
    pub fn word_size(self) -> usize {
        match self {
            Width::Elf32 => 4,
            Width::Elf64 => 8,
        }
    }
}

/// The file's byte order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    /// ELFDATA2LSB
    Little,
    /// ELFDATA2MSB
    Big,
}

/// Reads and writes integers of a given width in a given byte order against a byte
/// buffer, truncation-checking every write against its destination width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Codec {
    /// 32- or 64-bit object
    pub width: Width,
    /// little- or big-endian
    pub endian: Endian,
}

impl Codec {
    /// Build a codec for the given class and data encoding
    pub fn new(width: Width, endian: Endian) -> Self {
        Self { width, endian }
    }

    fn slice<'a>(buf: &'a [u8], off: usize, len: usize) -> Result<&'a [u8]> {
        buf.get(off..off + len)
            .ok_or_else(|| Error::malformed(format!("read out of bounds at offset {off}")))
    }

    /// Read an unsigned 16-bit field (`Elf32_Half`/`Elf64_Half`)
    pub fn read_u16(&self, buf: &[u8], off: usize) -> Result<u16> {
        let b = Self::slice(buf, off, 2)?;
        let arr: [u8; 2] = b.try_into().expect("slice length checked above");
        Ok(match self.endian {
            Endian::Little => u16::from_le_bytes(arr),
            Endian::Big => u16::from_be_bytes(arr),
        })
    }

    /// Read an unsigned 32-bit field (`Elf32_Word`/`Elf64_Word`)
    pub fn read_u32(&self, buf: &[u8], off: usize) -> Result<u32> {
        let b = Self::slice(buf, off, 4)?;
        let arr: [u8; 4] = b.try_into().expect("slice length checked above");
        Ok(match self.endian {
            Endian::Little => u32::from_le_bytes(arr),
            Endian::Big => u32::from_be_bytes(arr),
        })
    }

    /// Read an unsigned 64-bit field (`Elf64_Xword`, or a zero-extended `Elf32_Word`)
    pub fn read_u64(&self, buf: &[u8], off: usize) -> Result<u64> {
        let b = Self::slice(buf, off, 8)?;
        let arr: [u8; 8] = b.try_into().expect("slice length checked above");
        Ok(match self.endian {
            Endian::Little => u64::from_le_bytes(arr),
            Endian::Big => u64::from_be_bytes(arr),
        })
    }

    /// Read a "native word" field: 4 bytes zero-extended to `u64` for ELF32, or a raw
    /// 8-byte read for ELF64. Used for addresses, offsets, and `Elf32_Word`/`Elf64_Xword`
    /// pairs that this engine always carries widened to `u64` in its in-memory model.
    pub fn read_native(&self, buf: &[u8], off: usize) -> Result<u64> {
        match self.width {
            Width::Elf32 => self.read_u32(buf, off).map(u64::from),
            Width::Elf64 => self.read_u64(buf, off),
        }
    }

    /// Write an unsigned 16-bit field
    pub fn write_u16(&self, buf: &mut [u8], off: usize, val: u16) -> Result<()> {
        let bytes = match self.endian {
            Endian::Little => val.to_le_bytes(),
            Endian::Big => val.to_be_bytes(),
        };
        let dst = buf
            .get_mut(off..off + 2)
            .ok_or_else(|| Error::malformed(format!("write out of bounds at offset {off}")))?;
        dst.copy_from_slice(&bytes);
        Ok(())
    }

    /// Write an unsigned 32-bit field
    pub fn write_u32(&self, buf: &mut [u8], off: usize, val: u32) -> Result<()> {
        let bytes = match self.endian {
            Endian::Little => val.to_le_bytes(),
            Endian::Big => val.to_be_bytes(),
        };
        let dst = buf
            .get_mut(off..off + 4)
            .ok_or_else(|| Error::malformed(format!("write out of bounds at offset {off}")))?;
        dst.copy_from_slice(&bytes);
        Ok(())
    }

    /// Write an unsigned 64-bit field
    pub fn write_u64(&self, buf: &mut [u8], off: usize, val: u64) -> Result<()> {
        let bytes = match self.endian {
            Endian::Little => val.to_le_bytes(),
            Endian::Big => val.to_be_bytes(),
        };
        let dst = buf
            .get_mut(off..off + 8)
            .ok_or_else(|| Error::malformed(format!("write out of bounds at offset {off}")))?;
        dst.copy_from_slice(&bytes);
        Ok(())
    }

    /// Write a native word field, truncation-checking against the file's class when
    /// narrowing a `u64` value down to 32 bits.
    pub fn write_native(&self, buf: &mut [u8], off: usize, val: u64) -> Result<()> {
        match self.width {
            Width::Elf32 => {
                let narrow = u32::try_from(val).map_err(|_| Error::ValueTruncation {
                    value: val,
                    width: 32,
                })?;
                self.write_u32(buf, off, narrow)
            }
            Width::Elf64 => self.write_u64(buf, off, val),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn round_trips_le_and_be() {
        let le = Codec::new(Width::Elf64, Endian::Little);
        let be = Codec::new(Width::Elf64, Endian::Big);
        let mut buf = [0u8; 8];

        le.write_u32(&mut buf, 0, 0x0102_0304).unwrap();
        assert_eq!(&buf[..4], &[0x04, 0x03, 0x02, 0x01]);
        assert_eq!(le.read_u32(&buf, 0).unwrap(), 0x0102_0304);

        be.write_u32(&mut buf, 0, 0x0102_0304).unwrap();
        assert_eq!(&buf[..4], &[0x01, 0x02, 0x03, 0x04]);
        assert_eq!(be.read_u32(&buf, 0).unwrap(), 0x0102_0304);
    }

    #[test]
    fn native_word_width_follows_class() {
        let c32 = Codec::new(Width::Elf32, Endian::Little);
        let c64 = Codec::new(Width::Elf64, Endian::Little);
        assert_eq!(c32.width.word_size(), 4);
        assert_eq!(c64.width.word_size(), 8);
    }

    #[test]
    fn truncation_is_rejected() {
        let c32 = Codec::new(Width::Elf32, Endian::Little);
        let mut buf = [0u8; 4];
        assert!(c32.write_native(&mut buf, 0, u64::from(u32::MAX) + 1).is_err());
        assert!(c32.write_native(&mut buf, 0, 0xdead_beef).is_ok());
    }

    #[test]
    fn out_of_bounds_reads_fail() {
        let c = Codec::new(Width::Elf64, Endian::Little);
        let buf = [0u8; 4];
        assert!(c.read_u64(&buf, 0).is_err());
    }
}
