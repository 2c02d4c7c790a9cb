//! Error types for ELF handling and the rewrite pipeline. Every error here
//! is fatal to the tool: nothing is retried and no partial output is written.

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq, Hash)]
/// Error type for all failures during binary rewriting
pub enum Error {
    #[error("An I/O error occurred: {kind}")]
    /// An underlying I/O operation failed
    Io {
        /// The kind of I/O error
        kind: std::io::ErrorKind,
    },
    #[error("Not an ELF")]
    /// The input does not begin with the ELF magic
    NotElf,
    #[error("Unsupported ELF bitness {bitness}")]
    /// The input is not a 32-bit ELF
    UnsupportedBitness {
        /// Bitness implied by the ident class byte (the raw class value when
        /// it maps to no known bitness)
        bitness: u32,
    },
    #[error("Incompatible writable ELF layout: PHT is not next to the header")]
    /// Writable mode requires the program header table directly after the ELF header
    PhtNotAdjacent,
    #[error("Incompatible writable ELF layout: SHT is not at the end")]
    /// Writable mode requires the section header table to be the final structure in the file
    ShtNotAtEnd,
    #[error("Truncated {what} at offset {offset:#X}")]
    /// A table or payload extends past the end of the file
    Truncated {
        /// The structure that could not be read in full
        what: &'static str,
        /// File offset the structure starts at
        offset: usize,
    },
    #[error("The requested string {index:#X} has no terminating NULL")]
    /// A string table entry runs off the end of its section
    StringUnterminated {
        /// Byte index of the string inside the string table
        index: usize,
    },
    #[error("Found symbol table without string table")]
    /// `.symtab` is present but `.strtab` is not
    SymtabWithoutStrtab,
    #[error("Section index {index} is out of range")]
    /// A section index does not refer to an entry of the section table
    SectionIndexOutOfRange {
        /// The offending index
        index: usize,
    },
    #[error("No __data_init_table symbol found. Please check your .ld script.")]
    /// The data-initialization table symbol is missing from the binary
    MissingInitTable,
    #[error("Init table address {addr:#X} is not aligned to 4")]
    /// The table symbol's value is not 4-byte aligned
    MisalignedInitTable {
        /// The symbol value
        addr: u32,
    },
    #[error(".idata section at {section_addr:#X} doesn't start at table address {addr:#X}")]
    /// The section holding the init table does not begin at the table symbol
    InitTableSectionMismatch {
        /// The table symbol's value
        addr: u32,
        /// Address of the section the symbol points into
        section_addr: u32,
    },
    #[error("Read @{va:X}[{size:X}] is out of bounds or crosses region boundaries")]
    /// A virtual-address read extends past the containing segment or section
    ReadOutOfBounds {
        /// Start of the read
        va: u32,
        /// Length of the read
        size: u32,
    },
    #[error("Read @{va:X}[{size:X}] does not belong to any segment/section")]
    /// A virtual-address read hits no known region
    ReadUnmapped {
        /// Start of the read
        va: u32,
        /// Length of the read
        size: u32,
    },
    #[error("Write @{va:X}[{size:X}] is out of bounds or crosses region boundaries")]
    /// A virtual-address write extends past a containing segment or section
    WriteOutOfBounds {
        /// Start of the write
        va: u32,
        /// Length of the write
        size: u32,
    },
    #[error("Write @{va:X}[{size:X}] does not belong to any segment/section")]
    /// A virtual-address write hits no known region
    WriteUnmapped {
        /// Start of the write
        va: u32,
        /// Length of the write
        size: u32,
    },
    #[error("Can't compress entry {index} ({size:#X} bytes)")]
    /// No codec produced an encoding for a non-empty init entry
    Incompressible {
        /// Index of the entry in the input table
        index: u32,
        /// Decompressed size of the entry
        size: u32,
    },
    #[error(
        "Can't fit the resulting init image of size {needed:#X} into .idata section of size {available:#X}"
    )]
    /// The rewritten table, decompressor code and payloads exceed the original section
    CapacityExceeded {
        /// Size of the assembled image
        needed: usize,
        /// Size of the original section
        available: usize,
    },
    #[error("Decompressor for algo {name} is not registered")]
    /// A table entry was requested for a codec never registered with the manager
    DecompressorNotRegistered {
        /// The codec name
        name: &'static str,
    },
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io { kind: err.kind() }
    }
}

/// Result type alias over [`Error`]
pub type Result<T> = std::result::Result<T, Error>;
