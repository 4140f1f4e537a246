//! Error types that can be emitted from this library

use miette::Diagnostic;
use thiserror::Error;

/// Error type for library
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// Transparent warpper for [`std::io::Error`]
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    /// Transparent warpper for [`binrw::Error`]
    #[error(transparent)]
    BinRWError(#[from] binrw::Error),

    /// A structural field violates a hard invariant of the format
    #[error("malformed header: {0}")]
    #[diagnostic(code(fo_dat::malformed_header))]
    MalformedHeader(String),

    /// Neither DAT1 nor DAT2 detection accepts the stream
    #[error("file is not a known dat archive")]
    #[diagnostic(code(fo_dat::unknown_format))]
    UnknownFormat,

    /// A file record declares a compression mode outside of the known set
    #[error("unknown compression mode {0:#X}")]
    #[diagnostic(code(fo_dat::unknown_compression_mode))]
    UnknownCompressionMode(u32),

    /// A file record declares a known compression mode which cannot be read
    #[error("compression mode {0:#X} is not implemented")]
    #[diagnostic(code(fo_dat::not_implemented_compression_mode))]
    NotImplementedCompressionMode(u32),

    /// Lengths stored in the archive point past the end of the stream
    #[error("stream truncated: expected {expected} bytes, stream has {actual}")]
    #[diagnostic(code(fo_dat::truncated_stream))]
    TruncatedStream {
        /// Length required by the archive
        expected: u64,
        /// Actual length of the stream
        actual: u64,
    },

    /// LZSS input ended before the output was complete
    #[error("lzss input exhausted before decoding finished")]
    #[diagnostic(code(fo_dat::truncated_input))]
    TruncatedInput,

    /// A LZSS block header declares a size of zero
    #[error("block header at packed offset {offset} declares an empty block")]
    #[diagnostic(code(fo_dat::corrupt_block_header))]
    CorruptBlockHeader {
        /// Offset of the header from the start of the packed data
        offset: u64,
    },

    /// LZSS blocks do not add up to the packed size of the file
    #[error("blocks do not match packed size, {remaining} bytes left over")]
    #[diagnostic(code(fo_dat::block_accounting))]
    BlockAccountingError {
        /// Packed bytes left unaccounted once segmentation stopped
        remaining: i64,
    },

    /// Decompressed data length differs from the size stored in the archive
    #[error("decompressed size mismatch: expected {expected}, got {actual}")]
    #[diagnostic(code(fo_dat::decompressed_size_mismatch))]
    DecompressedSizeMismatch {
        /// Size stored in the file record
        expected: u64,
        /// Size produced by the decompressor
        actual: u64,
    },

    /// LZSS parameters cannot describe a working dictionary
    #[error("invalid lzss parameters: {0}")]
    #[diagnostic(code(fo_dat::invalid_parameters))]
    InvalidParameters(String),

    /// unable to find requested file
    #[error("unable to find requested file")]
    FileNotFound(#[from] FileNotFoundError),
}

/// Error type to provide further information when a file has not been found
#[derive(Error, Diagnostic, Debug)]
#[error("unable to find requested file")]
pub enum FileNotFoundError {
    /// at index {0}
    #[error("at index {0}")]
    Index(usize),

    /// by path {0}
    #[error("by path {0}")]
    Path(String),
}

/// Generic result type with crate's Error as its error variant
pub type Result<T> = core::result::Result<T, Error>;
