//! Base types for structure of DAT files.
//!
//! DAT1 stores every integer in big endian format, DAT2 in little endian format.

use binrw::{BinRead, BinWrite};
use std::borrow::Cow;

/// String prefixed with a single length byte, as used by DAT1 names
#[derive(BinRead, BinWrite, Debug, Clone, Default, PartialEq)]
#[brw(big)]
pub struct ShortString {
    /// The number of bytes in the string
    pub len: u8,

    /// The raw bytes of the string
    #[br(count = len)]
    pub bytes: Vec<u8>,
}

impl ShortString {
    /// Number of bytes taken by the string in the file, including the length byte
    pub fn encoded_len(&self) -> u64 {
        1 + self.len as u64
    }

    /// Decode the string, replacing invalid UTF-8 sequences
    pub fn to_string_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes)
    }
}

impl From<&str> for ShortString {
    fn from(value: &str) -> Self {
        let bytes = value.as_bytes()[..value.len().min(u8::MAX as usize)].to_vec();
        Self {
            len: bytes.len() as u8,
            bytes,
        }
    }
}

/// String prefixed with a 32-bit length, as used by DAT2 paths
#[derive(BinRead, BinWrite, Debug, Clone, Default, PartialEq)]
#[brw(little)]
pub struct LongString {
    /// The number of bytes in the string
    pub len: u32,

    /// The raw bytes of the string
    #[br(count = len)]
    pub bytes: Vec<u8>,
}

impl LongString {
    /// Number of bytes taken by the string in the file, including the length
    pub fn encoded_len(&self) -> u64 {
        4 + self.len as u64
    }

    /// Decode the string, replacing invalid UTF-8 sequences
    pub fn to_string_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes)
    }
}

impl From<&str> for LongString {
    fn from(value: &str) -> Self {
        Self {
            len: value.len() as u32,
            bytes: value.as_bytes().to_vec(),
        }
    }
}

/// DAT1 file header
///
/// Starts the file, and is followed by the names of all directories.
#[derive(BinRead, BinWrite, Debug, Copy, Clone, Default, PartialEq)]
#[brw(big)]
pub struct Dat1Header {
    /// The number of directories stored in the file
    pub dirs_count: i32,

    /// Unknown values, the first one identifies the archive
    pub header: [i32; 3],
}

impl Dat1Header {
    /// Size of the header in the file
    pub const SIZE: u64 = 16;
}

/// DAT1 directory header
///
/// Precedes the file records of a single directory.
#[derive(BinRead, BinWrite, Debug, Copy, Clone, Default, PartialEq)]
#[brw(big)]
pub struct Dat1DirHeader {
    /// The number of files stored in the directory
    pub files_count: i32,

    /// Unknown values, the second one is usually 0x10
    pub header: [i32; 3],
}

impl Dat1DirHeader {
    /// Size of the directory header in the file
    pub const SIZE: u64 = 16;
}

/// DAT1 file record
#[derive(BinRead, BinWrite, Debug, Clone, Default, PartialEq)]
#[brw(big)]
pub struct Dat1FileRecord {
    /// The base name of the file
    pub name: ShortString,

    /// The raw compression mode, see [`crate::compression::CompressionMethod::from_dat1`]
    pub compress_mode: u32,

    /// The offset to the data for this file from the start of the archive
    pub offset: u32,

    /// The size of the data for this file before compression
    pub size_real: u32,

    /// The size of the data for this file after compression, 0 for uncompressed files
    pub size_packed: u32,
}

impl Dat1FileRecord {
    /// Number of bytes taken by the record in the file
    pub fn encoded_len(&self) -> u64 {
        self.name.encoded_len() + 16
    }
}

/// DAT2 trailer
///
/// The last 8 bytes of a DAT2 file.
#[derive(BinRead, BinWrite, Debug, Copy, Clone, Default, PartialEq)]
#[brw(little)]
pub struct Dat2Trailer {
    /// The size of the file tree, counted backwards from the trailer
    pub size_tree: u32,

    /// The size of the whole archive, trailer included
    pub size_dat: u32,
}

impl Dat2Trailer {
    /// Size of the trailer in the file
    pub const SIZE: u64 = 8;
}

/// DAT2 file record
#[derive(BinRead, BinWrite, Debug, Clone, Default, PartialEq)]
#[brw(little)]
pub struct Dat2FileRecord {
    /// The full path of the file, usually with `\` separators
    pub path: LongString,

    /// 0 when the data is stored as is, deflated otherwise
    pub compress_flag: u8,

    /// The size of the data for this file before compression
    pub size_real: u32,

    /// The size of the data for this file after compression
    pub size_packed: u32,

    /// The offset to the data for this file from the start of the archive
    pub offset: u32,
}

impl Dat2FileRecord {
    /// Number of bytes taken by the record in the file
    pub fn encoded_len(&self) -> u64 {
        self.path.encoded_len() + 13
    }
}
