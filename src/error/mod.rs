//! Error type for the patching engine

use std::io;

/// The result type used throughout this crate
pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
/// Errors raised while parsing, laying out, or rewriting an ELF object file
pub enum Error {
    #[error("input file is too short to hold an ELF header")]
    /// The file is shorter than the minimal ELF header
    TooShort,
    #[error("not an ELF file (bad magic)")]
    /// The magic number at offset 0 is not `\x7fELF`
    BadMagic,
    #[error("ELF executable or library of unsupported class {0}")]
    /// `e_ident[EI_CLASS]` is neither `ELFCLASS32` nor `ELFCLASS64`
    UnsupportedClass(u8),
    #[error("ELF executable or library of unsupported data encoding {0}")]
    /// `e_ident[EI_DATA]` is neither `ELFDATA2LSB` nor `ELFDATA2MSB`
    UnsupportedDataEncoding(u8),
    #[error("unsupported ELF version {0}")]
    /// `e_ident[EI_VERSION]` or `e_version` is not `EV_CURRENT`
    UnsupportedVersion(u8),
    #[error("wrong ELF type, expected ET_EXEC or ET_DYN, got {0}")]
    /// The object is `ET_REL`, `ET_CORE`, or otherwise unhandled
    UnsupportedElfType(u16),
    #[error("malformed ELF file: {0}")]
    /// Any other structural inconsistency caught while parsing
    MalformedElf(String),
    #[error("value {value} does not fit in the {width}-bit field it is being written to")]
    /// A field write would silently truncate the value
    ValueTruncation {
        /// the value that was being written
        value: u64,
        /// the destination field width, in bits
        width: u8,
    },
    #[error("executable cannot grow downward far enough to accommodate new sections: need {needed} bytes, only {available} available below the first segment")]
    /// An `ET_EXEC` rewrite ran out of room before the first existing segment
    AddressSpaceUnderrun {
        /// Bytes of room the new sections require, page-aligned
        needed: u64,
        /// Bytes available between address zero and the lowest `PT_LOAD`'s `p_vaddr`
        available: u64,
    },
    #[error("unsupported PT_NOTE/SHT_NOTE layout: {0}")]
    /// A `PT_NOTE` segment partially overlaps the `SHT_NOTE` sections inside it
    UnsupportedNoteLayout(String),
    #[error("cannot find section {0}")]
    /// A requested section does not exist (e.g. `.dynamic` on a static binary)
    MissingSection(String),
    #[error("unknown OS ABI name: {0}")]
    /// `--set-os-abi` was given a name not in the known table
    UnknownOsAbi(String),
    #[error("symbol {0} not found in the dynamic symbol table")]
    /// `--clear-symbol-version` or `--rename-dynamic-symbols` named an unknown symbol
    UnknownSymbol(String),
    #[error("duplicate key {0} in rename map")]
    /// The same old name appears twice in a `--rename-dynamic-symbols` map file
    DuplicateRenameKey(String),
    #[error("name {0} contains '@', which is not allowed in a dynamic symbol rename")]
    /// Versioned names (`foo@VERS`) cannot be targets of a rename
    VersionedRenameName(String),
    #[error("--output requires exactly one input file")]
    /// `--output` was combined with more than one positional argument
    OutputRequiresSingleInput,
    #[error("conflicting options: {0}")]
    /// Two mutually exclusive flags were both given (e.g. `--set-rpath` and `--add-rpath`)
    ConflictingOptions(String),
    #[error("page size must be greater than zero")]
    /// `--page-size 0` or a negative value was given
    InvalidPageSize,
    #[error("I/O error: {0}")]
    /// Wraps a [`std::io::Error`] from the file collaborator
    Io(#[from] io::Error),
}

impl Error {
    /// Build a [`Error::MalformedElf`] from a formattable reason
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedElf(reason.into())
    }
}
