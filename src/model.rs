//! The in-memory ELF object: an owned byte buffer plus the parsed header tables and
//! pending-edit store every operation handler and the layout engine work against.

use std::collections::BTreeMap;

use crate::base::Codec;
use crate::error::{Error, Result};
use crate::header::dynamic::{self, DynEntry};
use crate::header::elf::identification::ElfClass;
use crate::header::elf::{ElfHeader, ElfType};
use crate::header::program::{PFlags, ProgramHeader, PtType};
use crate::header::section::{ShFlags, ShType, SectionHeader};
use crate::header::symbol::Symbol;

/// Read a NUL-terminated string out of a string table section's bytes at `offset`
pub fn read_cstr(strtab: &[u8], offset: u32) -> String {
    let offset = offset as usize;
    if offset >= strtab.len() {
        return String::new();
    }
    let end = strtab[offset..]
        .iter()
        .position(|&b| b == 0)
        .map(|p| offset + p)
        .unwrap_or(strtab.len());
    String::from_utf8_lossy(&strtab[offset..end]).into_owned()
}

#[derive(Debug, Default, Clone)]
/// Pending section-content replacements, keyed by section name, recorded by operation
/// handlers before the layout engine assigns them real file/virtual addresses.
///
/// Handlers never touch file offsets or virtual addresses; they call
/// [`SectionStore::replace`] and let the layout engine (§4.5) do the rest.
pub struct SectionStore {
    replaced: BTreeMap<String, Vec<u8>>,
}

impl SectionStore {
    /// Record that `name` should be replaced with `bytes` the next time the layout
    /// engine runs. Calling this a second time for the same name overwrites the
    /// pending bytes rather than stacking edits.
    pub fn replace(&mut self, name: impl Into<String>, bytes: Vec<u8>) {
        self.replaced.insert(name.into(), bytes);
    }

    /// Whether `name` has a pending replacement
    pub fn have_replaced(&self, name: &str) -> bool {
        self.replaced.contains_key(name)
    }

    /// The pending bytes for `name`, if any
    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.replaced.get(name).map(Vec::as_slice)
    }

    /// Iterate pending replacements in section-name order (deterministic layout)
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.replaced.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Whether any replacement is pending
    pub fn is_empty(&self) -> bool {
        self.replaced.is_empty()
    }

    /// Drop every pending replacement, e.g. after the layout engine has consumed them
    pub fn clear(&mut self) {
        self.replaced.clear();
    }
}

#[derive(Debug, Clone)]
/// A fully parsed ELF executable or shared object, owning its byte buffer
pub struct ElfFile {
    /// The raw file bytes. Operation handlers never write to this directly except
    /// through [`SectionStore`]; the layout engine is the only code that resizes it.
    pub data: Vec<u8>,
    /// The endian/width codec derived from `e_ident`
    pub codec: Codec,
    /// The parsed ELF header
    pub header: ElfHeader,
    /// Program header table, in file order
    pub program_headers: Vec<ProgramHeader>,
    /// Section header table, in file order, with `name` resolved from `.shstrtab`
    pub section_headers: Vec<SectionHeader>,
    /// Pending section-content edits from operation handlers
    pub sections: SectionStore,
    /// Original page size the file appears to have been linked for; `--page-size`
    /// overrides this when set
    pub page_size: u64,
    /// Whether the layout engine must run even though no section was replaced
    /// (e.g. `PT_GNU_STACK` needs to be added where none existed)
    pub force_rewrite: bool,
}

impl ElfFile {
    /// Parse `data` into a full [`ElfFile`], validating every invariant in §3/§4.1:
    /// magic, class, data encoding, version, object type, and that the program and
    /// section header tables actually fit inside the file.
    pub fn parse(data: Vec<u8>) -> Result<Self> {
        let header = ElfHeader::parse(&data)?;
        let codec = Codec::new(header.class.width(), header.data_encoding.endian());

        let mut program_headers = Vec::with_capacity(header.e_phnum as usize);
        let phentsize = ProgramHeader::entsize_for(&codec) as u64;
        if header.e_phnum > 0 && u64::from(header.e_phentsize) != phentsize {
            return Err(Error::malformed(format!(
                "e_phentsize {} does not match expected {phentsize}",
                header.e_phentsize
            )));
        }
        for i in 0..header.e_phnum as u64 {
            let off = header
                .e_phoff
                .checked_add(i * phentsize)
                .ok_or_else(|| Error::malformed("program header offset overflow"))?;
            program_headers.push(ProgramHeader::parse(&data, off as usize, &codec)?);
        }

        let mut section_headers = Vec::with_capacity(header.e_shnum as usize);
        let shentsize = SectionHeader::entsize_for(&codec) as u64;
        if header.e_shnum > 0 && u64::from(header.e_shentsize) != shentsize {
            return Err(Error::malformed(format!(
                "e_shentsize {} does not match expected {shentsize}",
                header.e_shentsize
            )));
        }
        for i in 0..header.e_shnum as u64 {
            let off = header
                .e_shoff
                .checked_add(i * shentsize)
                .ok_or_else(|| Error::malformed("section header offset overflow"))?;
            section_headers.push(SectionHeader::parse(&data, off as usize, &codec)?);
        }

        if let Some(shstrtab) = section_headers.get(header.e_shstrndx as usize) {
            let start = shstrtab.offset as usize;
            let end = start
                .checked_add(shstrtab.size as usize)
                .ok_or_else(|| Error::malformed(".shstrtab size overflows"))?;
            let bytes = data
                .get(start..end)
                .ok_or_else(|| Error::malformed(".shstrtab out of bounds"))?;
            for section in &mut section_headers {
                section.name = read_cstr(bytes, section.name_offset);
            }
        }

        let page_size = crate::header::elf::default_page_size(header.e_machine);

        let file = Self {
            data,
            codec,
            header,
            program_headers,
            section_headers,
            sections: SectionStore::default(),
            page_size,
            force_rewrite: false,
        };
        file.check_invariants()?;
        Ok(file)
    }

    /// Whether this object is `ET_EXEC` (as opposed to `ET_DYN`): the layout engine
    /// uses this to choose between the library and executable strategies (§4.5)
    pub fn is_executable(&self) -> bool {
        self.header.e_type == ElfType::Executable
    }

    /// Look up a section header by name
    pub fn section_by_name(&self, name: &str) -> Option<&SectionHeader> {
        self.section_headers.iter().find(|s| s.name == name)
    }

    /// Look up a section header's index by name
    pub fn section_index_by_name(&self, name: &str) -> Option<usize> {
        self.section_headers.iter().position(|s| s.name == name)
    }

    /// The bytes of a section: its pending replacement if one exists, otherwise its
    /// current on-disk content (or an empty slice for `SHT_NOBITS`)
    pub fn section_bytes(&self, name: &str) -> Result<Vec<u8>> {
        if let Some(replaced) = self.sections.get(name) {
            return Ok(replaced.to_vec());
        }
        let section = self
            .section_by_name(name)
            .ok_or_else(|| Error::MissingSection(name.to_string()))?;
        if section.sh_type == ShType::NoBits {
            return Ok(Vec::new());
        }
        let start = section.offset as usize;
        let end = start + section.size as usize;
        self.data
            .get(start..end)
            .map(<[u8]>::to_vec)
            .ok_or_else(|| Error::malformed(format!("section {name} out of bounds")))
    }

    /// The first program header of type `PT_DYNAMIC`, if any
    pub fn dynamic_segment(&self) -> Option<&ProgramHeader> {
        self.program_headers.iter().find(|p| p.p_type == PtType::Dynamic)
    }

    /// Parse `.dynamic`'s entries, following the `PT_DYNAMIC` segment rather than the
    /// `.dynamic` section header, since only the segment is guaranteed present on a
    /// stripped binary
    pub fn dynamic_entries(&self) -> Result<Vec<DynEntry>> {
        let segment = self
            .dynamic_segment()
            .ok_or_else(|| Error::MissingSection(".dynamic".to_string()))?;
        let start = segment.offset as usize;
        let end = start + segment.filesz as usize;
        let bytes = self
            .data
            .get(start..end)
            .ok_or_else(|| Error::malformed("PT_DYNAMIC out of bounds"))?;
        dynamic::parse_all(bytes, &self.codec)
    }

    /// The value of the first `.dynamic` entry with the given tag
    pub fn dynamic_value(&self, tag: i64) -> Result<Option<u64>> {
        Ok(self
            .dynamic_entries()?
            .into_iter()
            .find(|e| e.tag == tag)
            .map(|e| e.value))
    }

    /// Resolve `.dynstr`'s bytes, needed to turn `DT_NEEDED`/`DT_RPATH`/`DT_SONAME`
    /// offsets into strings
    pub fn dynstr_bytes(&self) -> Result<Vec<u8>> {
        self.section_bytes(".dynstr")
    }

    /// Read a NUL-terminated string out of `.dynstr` at `offset`
    pub fn dynstr_at(&self, offset: u32) -> Result<String> {
        Ok(read_cstr(&self.dynstr_bytes()?, offset))
    }

    /// Parse `.dynsym`'s entries, resolving each symbol's name from `.dynstr`
    pub fn dynsym_entries(&self) -> Result<Vec<Symbol>> {
        let bytes = self.section_bytes(".dynsym")?;
        let dynstr = self.dynstr_bytes().unwrap_or_default();
        let entsize = Symbol::entsize_for(&self.codec);
        let mut symbols = Vec::with_capacity(bytes.len() / entsize.max(1));
        let mut off = 0;
        while off + entsize <= bytes.len() {
            let mut sym = Symbol::parse(&bytes, off, &self.codec)?;
            sym.name = read_cstr(&dynstr, sym.name_offset);
            symbols.push(sym);
            off += entsize;
        }
        Ok(symbols)
    }

    /// Append `s` plus a terminating NUL to `.dynstr` and return the offset it was
    /// written at. Per §9's "shared strings" note, this engine never attempts to reuse
    /// an existing suffix — every append grows `.dynstr`, which is always safe, if not
    /// maximally compact.
    pub fn append_dynstr(&mut self, s: &str) -> Result<u32> {
        let mut bytes = self.dynstr_bytes().unwrap_or_default();
        let offset = bytes.len() as u32;
        bytes.extend_from_slice(s.as_bytes());
        bytes.push(0);
        self.sections.replace(".dynstr", bytes);
        Ok(offset)
    }

    /// Set `.dynamic`'s entry for `tag` to `value`, inserting a new entry just before
    /// the `DT_NULL` terminator if none exists yet
    pub fn set_dynamic_value(&mut self, tag: i64, value: u64) -> Result<()> {
        let mut entries = self.dynamic_entries()?;
        if let Some(entry) = entries.iter_mut().find(|e| e.tag == tag) {
            entry.value = value;
        } else {
            let null_pos = entries
                .iter()
                .position(|e| e.tag == dynamic::dt::NULL)
                .unwrap_or(entries.len());
            entries.insert(null_pos, DynEntry { tag, value });
        }
        self.write_dynamic_entries(&entries)
    }

    /// Drop every `.dynamic` entry whose tag is in `tags`, keeping the `DT_NULL`
    /// terminator (re-adding one if the removal happened to take it out)
    pub fn remove_dynamic_entries(&mut self, tags: &[i64]) -> Result<()> {
        let mut entries = self.dynamic_entries()?;
        entries.retain(|e| !tags.contains(&e.tag));
        if !entries.iter().any(|e| e.tag == dynamic::dt::NULL) {
            entries.push(DynEntry { tag: dynamic::dt::NULL, value: 0 });
        }
        self.write_dynamic_entries(&entries)
    }

    fn write_dynamic_entries(&mut self, entries: &[DynEntry]) -> Result<()> {
        let bytes = dynamic::write_all(entries, &self.codec)?;
        self.sections.replace(".dynamic", bytes);
        Ok(())
    }

    /// Insert a new `.dynamic` entry immediately before the `DT_NULL` terminator,
    /// without deduplicating by tag — needed for `DT_NEEDED`, which may repeat
    pub fn insert_dynamic_entry(&mut self, tag: i64, value: u64) -> Result<()> {
        let mut entries = self.dynamic_entries()?;
        let null_pos = entries
            .iter()
            .position(|e| e.tag == dynamic::dt::NULL)
            .unwrap_or(entries.len());
        entries.insert(null_pos, DynEntry { tag, value });
        self.write_dynamic_entries(&entries)
    }

    /// Remove every `.dynamic` entry matching both `tag` and `value` exactly, e.g. one
    /// specific `DT_NEEDED` among several sharing the tag
    pub fn remove_dynamic_entry(&mut self, tag: i64, value: u64) -> Result<()> {
        let mut entries = self.dynamic_entries()?;
        entries.retain(|e| !(e.tag == tag && e.value == value));
        self.write_dynamic_entries(&entries)
    }

    /// Overwrite `.dynsym` with `symbols`, re-encoded with the current codec. Callers
    /// are responsible for keeping `symbols.len()` equal to the original entry count;
    /// this engine never adds or removes dynamic symbols, only edits their fields.
    pub fn set_dynsym_entries(&mut self, symbols: &[Symbol]) -> Result<()> {
        let entsize = Symbol::entsize_for(&self.codec);
        let mut bytes = vec![0u8; symbols.len() * entsize];
        for (i, sym) in symbols.iter().enumerate() {
            sym.write(&mut bytes, i * entsize, &self.codec)?;
        }
        self.sections.replace(".dynsym", bytes);
        Ok(())
    }

    /// Parse `.gnu.version`'s `Elf_Versym` array (one `u16` per `.dynsym` entry)
    pub fn gnu_version_entries(&self) -> Result<Vec<u16>> {
        let bytes = self.section_bytes(".gnu.version")?;
        let mut out = Vec::with_capacity(bytes.len() / 2);
        let mut off = 0;
        while off + 2 <= bytes.len() {
            out.push(self.codec.read_u16(&bytes, off)?);
            off += 2;
        }
        Ok(out)
    }

    /// Overwrite `.gnu.version` with `versyms`
    pub fn set_gnu_version_entries(&mut self, versyms: &[u16]) -> Result<()> {
        let mut bytes = vec![0u8; versyms.len() * 2];
        for (i, v) in versyms.iter().enumerate() {
            self.codec.write_u16(&mut bytes, i * 2, *v)?;
        }
        self.sections.replace(".gnu.version", bytes);
        Ok(())
    }

    /// Mark that the layout engine must run on the next write even though no section
    /// has a pending replacement (e.g. adding `PT_GNU_STACK` where none existed)
    pub fn force_rewrite(&mut self) {
        self.force_rewrite = true;
    }

    /// Whether any operation has asked the layout engine to run
    pub fn needs_layout(&self) -> bool {
        self.force_rewrite || !self.sections.is_empty()
    }

    /// Check every invariant from §3: no duplicate section names used as load-bearing
    /// keys for this engine's own bookkeeping, `PT_PHDR`'s file image (if present)
    /// matches `e_phoff`/`e_phnum`, and every section marked `SHF_ALLOC` with nonzero
    /// size falls inside some `PT_LOAD` segment's file image. Called at integration
    /// points (after parse, before/after layout), not on every mutation.
    pub fn check_invariants(&self) -> Result<()> {
        if let Some(phdr) = self.program_headers.iter().find(|p| p.p_type == PtType::Phdr) {
            let expected_size =
                self.program_headers.len() as u64 * u64::from(ProgramHeader::entsize_for(&self.codec));
            if phdr.offset != self.header.e_phoff || phdr.filesz != expected_size {
                return Err(Error::malformed(
                    "PT_PHDR does not match the program header table's actual location",
                ));
            }
        }

        for section in &self.section_headers {
            if !section.flags.contains(ShFlags::ALLOC) || section.size == 0 {
                continue;
            }
            let covered = self.program_headers.iter().any(|p| {
                p.p_type == PtType::Load
                    && section.addr >= p.vaddr
                    && section.addr + section.size <= p.vaddr + p.memsz
            });
            if !covered {
                return Err(Error::malformed(format!(
                    "allocated section {} is not covered by any PT_LOAD segment",
                    section.name
                )));
            }
        }

        Ok(())
    }

    /// Page-align `value` up to the next multiple of [`Self::page_size`]
    pub fn page_align_up(&self, value: u64) -> u64 {
        let mask = self.page_size - 1;
        (value + mask) & !mask
    }

    /// `e_machine`/`e_flags`-implied page size, overridden by `--page-size`
    pub fn set_page_size(&mut self, page_size: u64) -> Result<()> {
        if page_size == 0 || page_size & (page_size - 1) != 0 {
            return Err(Error::InvalidPageSize);
        }
        self.page_size = page_size;
        Ok(())
    }

    /// Sort program headers with `PT_PHDR` always first, the rest by ascending
    /// `p_paddr` (§5). A stable sort, so equal-`p_paddr` entries keep their relative
    /// file order.
    pub fn sort_program_headers(&mut self) {
        self.program_headers.sort_by_key(|p| if p.p_type == PtType::Phdr { (0, 0) } else { (1, p.paddr) });
    }

    /// Write the parsed header, program header table, and section header table back
    /// into the byte image and hand over ownership of it. Called once, after every
    /// operation handler and the layout engine have finished mutating this `ElfFile`.
    pub fn serialize(&mut self) -> Result<Vec<u8>> {
        self.header.e_phnum = self.program_headers.len() as u16;
        self.header.e_shnum = self.section_headers.len() as u16;

        let phentsize = ProgramHeader::entsize_for(&self.codec) as usize;
        let ph_end = self.header.e_phoff as usize + self.program_headers.len() * phentsize;
        if self.data.len() < ph_end {
            self.data.resize(ph_end, 0);
        }
        for (i, ph) in self.program_headers.iter().enumerate() {
            ph.write(&mut self.data, self.header.e_phoff as usize + i * phentsize, &self.codec)?;
        }

        if !self.section_headers.is_empty() {
            let shentsize = SectionHeader::entsize_for(&self.codec) as usize;
            let sh_end = self.header.e_shoff as usize + self.section_headers.len() * shentsize;
            if self.data.len() < sh_end {
                self.data.resize(sh_end, 0);
            }
            for (i, sh) in self.section_headers.iter().enumerate() {
                sh.write(&mut self.data, self.header.e_shoff as usize + i * shentsize, &self.codec)?;
            }
        }

        let ehsize = self.header.e_ehsize as usize;
        if self.data.len() < ehsize {
            self.data.resize(ehsize, 0);
        }
        self.header.write(&mut self.data, &self.codec)?;

        Ok(std::mem::take(&mut self.data))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::base::{Endian, Width};
    use crate::header::elf::em;

    fn minimal_elf64() -> Vec<u8> {
        let codec = Codec::new(Width::Elf64, Endian::Little);
        let ehsize = crate::header::elf::EHSIZE64 as usize;
        let phentsize = ProgramHeader::entsize_for(&codec) as usize;
        let shentsize = SectionHeader::entsize_for(&codec) as usize;

        let phoff = ehsize;
        let load = ProgramHeader {
            p_type: PtType::Load,
            flags: PFlags::R | PFlags::X,
            offset: 0,
            vaddr: 0,
            paddr: 0,
            filesz: 0x200,
            memsz: 0x200,
            align: 0x1000,
        };

        let shoff = phoff + phentsize;
        let null_section = SectionHeader {
            name_offset: 0,
            name: String::new(),
            sh_type: ShType::Null,
            flags: ShFlags::empty(),
            addr: 0,
            offset: 0,
            size: 0,
            link: 0,
            info: 0,
            addralign: 0,
            entsize: 0,
        };
        let text_section = SectionHeader {
            name_offset: 1,
            name: String::new(),
            sh_type: ShType::ProgBits,
            flags: ShFlags::ALLOC | ShFlags::EXECINSTR,
            addr: 0x10,
            offset: 0x10,
            size: 0x10,
            link: 0,
            info: 0,
            addralign: 1,
            entsize: 0,
        };

        let shstrtab_bytes: &[u8] = b"\0.text\0.shstrtab\0";
        let shstrtab_off = shoff + 3 * shentsize;
        let shstrtab_section = SectionHeader {
            name_offset: 7,
            name: String::new(),
            sh_type: ShType::StrTab,
            flags: ShFlags::empty(),
            addr: 0,
            offset: shstrtab_off as u64,
            size: shstrtab_bytes.len() as u64,
            link: 0,
            info: 0,
            addralign: 1,
            entsize: 0,
        };

        let total_size = shstrtab_off + shstrtab_bytes.len();
        let mut buf = vec![0u8; total_size.max(0x200)];

        let header = ElfHeader {
            class: ElfClass::Elf64,
            data_encoding: crate::header::elf::identification::ElfDataEncoding::LittleEndian,
            os_abi_raw: 0,
            abi_version: 0,
            e_type: ElfType::SharedObject,
            e_machine: em::X86_64,
            e_version: 1,
            e_entry: 0,
            e_phoff: phoff as u64,
            e_shoff: shoff as u64,
            e_flags: 0,
            e_ehsize: ehsize as u16,
            e_phentsize: phentsize as u16,
            e_phnum: 1,
            e_shentsize: shentsize as u16,
            e_shnum: 3,
            e_shstrndx: 2,
        };
        header.write(&mut buf, &codec).unwrap();
        load.write(&mut buf, phoff, &codec).unwrap();
        null_section.write(&mut buf, shoff, &codec).unwrap();
        text_section.write(&mut buf, shoff + shentsize, &codec).unwrap();
        shstrtab_section.write(&mut buf, shoff + 2 * shentsize, &codec).unwrap();
        buf[shstrtab_off..shstrtab_off + shstrtab_bytes.len()].copy_from_slice(shstrtab_bytes);
        buf
    }

    #[test]
    fn parses_minimal_shared_object() {
        let file = ElfFile::parse(minimal_elf64()).unwrap();
        assert!(!file.is_executable());
        assert_eq!(file.section_headers.len(), 3);
        assert_eq!(file.section_by_name(".text").unwrap().addr, 0x10);
        assert!(file.section_by_name(".shstrtab").is_some());
    }

    #[test]
    fn rejects_truncated_file() {
        let buf = minimal_elf64();
        assert!(ElfFile::parse(buf[..10].to_vec()).is_err());
    }

    #[test]
    fn page_size_follows_machine_and_override() {
        let mut file = ElfFile::parse(minimal_elf64()).unwrap();
        assert_eq!(file.page_size, 0x1000);
        file.set_page_size(0x4000).unwrap();
        assert_eq!(file.page_size, 0x4000);
        assert!(file.set_page_size(0).is_err());
        assert!(file.set_page_size(3).is_err());
    }

    #[test]
    fn section_store_tracks_pending_replacements() {
        let mut file = ElfFile::parse(minimal_elf64()).unwrap();
        assert!(!file.needs_layout());
        file.sections.replace(".dynstr", vec![0u8; 4]);
        assert!(file.needs_layout());
        assert!(file.sections.have_replaced(".dynstr"));
        assert_eq!(file.sections.get(".dynstr").unwrap().len(), 4);
    }

    #[test]
    fn page_align_rounds_up() {
        let file = ElfFile::parse(minimal_elf64()).unwrap();
        assert_eq!(file.page_align_up(0), 0);
        assert_eq!(file.page_align_up(1), 0x1000);
        assert_eq!(file.page_align_up(0x1000), 0x1000);
        assert_eq!(file.page_align_up(0x1001), 0x2000);
    }
}
