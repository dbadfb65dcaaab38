//! `--print-execstack`/`--clear-execstack`/`--set-execstack`: governed entirely by
//! `PT_GNU_STACK`'s presence and its `PF_X` bit.

use crate::header::program::{PFlags, ProgramHeader, PtType};
use crate::model::ElfFile;

/// `'X'` if the stack is executable, `'-'` if it is not, `'?'` if the file carries no
/// `PT_GNU_STACK` at all (its absence means the stack's executability is left to the
/// dynamic linker's default, which this tool can't know in advance)
pub fn print(file: &ElfFile) -> char {
    match file.program_headers.iter().find(|p| p.p_type == PtType::GnuStack) {
        Some(segment) if segment.flags.contains(PFlags::X) => 'X',
        Some(_) => '-',
        None => '?',
    }
}

/// Set or clear `PF_X` on `PT_GNU_STACK`, creating the segment (by reusing a `PT_NULL`
/// slot, or appending a new entry) if none exists yet
pub fn set(file: &mut ElfFile, executable: bool) {
    let flags = if executable { PFlags::R | PFlags::W | PFlags::X } else { PFlags::R | PFlags::W };

    if let Some(segment) = file.program_headers.iter_mut().find(|p| p.p_type == PtType::GnuStack) {
        if segment.flags.contains(PFlags::X) != executable {
            segment.flags = flags;
            file.force_rewrite();
        }
        return;
    }

    let new_segment = ProgramHeader {
        p_type: PtType::GnuStack,
        flags,
        offset: 0,
        vaddr: 0,
        paddr: 0,
        filesz: 0,
        memsz: 0,
        align: 1,
    };
    if let Some(slot) = file.program_headers.iter_mut().find(|p| p.p_type == PtType::Null) {
        *slot = new_segment;
    } else {
        file.program_headers.push(new_segment);
        file.header.e_phnum += 1;
    }
    file.force_rewrite();
}
