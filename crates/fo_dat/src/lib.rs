//! This library handles reading **DAT** archives used by *Fallout* and *Fallout 2*.
//!
//! # DAT Archive Format Documentation
//!
//! DAT archives store every asset of the games: graphics, sounds, maps, scripts and texts. The two
//! games use two incompatible layouts, referred to as **DAT1** and **DAT2**. Both are handled by
//! [`DatArchive`], which detects the layout of a stream when opening it.
//!
//! ## DAT1
//!
//! Used by *Fallout*. Every integer is a **big-endian** 32-bit value, the tree is stored at the
//! start of the file.
//!
//! | Offset (bytes) | Field                  | Description                                                |
//! |----------------|------------------------|------------------------------------------------------------|
//! | 0x0000         | Directory Count        | 4 bytes: Number of directories, at least 1                 |
//! | 0x0004         | Header                 | 12 bytes: First value is `0x5E`, `0x0A` or `0x2E`, then 0  |
//! | 0x0010         | Directory Names        | One length-prefixed name per directory                     |
//! | ...            | Directory Contents     | One directory header and its file records per directory   |
//!
//! ### Directory Names
//!
//! Each name is a single length byte followed by that many bytes, using `\` as separator. The root
//! directory is named `.`.
//!
//! ### Directory Contents
//!
//! For each directory, in the same order as the names:
//!
//! - **Files Count**: A 4-byte integer with the number of file records that follow.
//! - **Header**: 12 bytes, usually `0`, `0x10`, `0`.
//! - **File Records**: `Files Count` records with the following structure:
//!
//! | Offset (bytes) | Field                  | Description                                             |
//! |----------------|------------------------|---------------------------------------------------------|
//! | 0x0000         | Name                   | 1 byte length, then the name                            |
//! | +0x0000        | Compression            | 4 bytes: `0x20` for none, `0x40` for LZSS               |
//! | +0x0004        | Data Offset            | 4 bytes: Offset of the data from the start of the file  |
//! | +0x0008        | Real Size              | 4 bytes: Size of the data when uncompressed             |
//! | +0x000C        | Packed Size            | 4 bytes: Size of the data in the archive, 0 when stored |
//!
//! LZSS compressed data is split into blocks, see [`block`].
//!
//! ## DAT2
//!
//! Used by *Fallout 2*. Every integer is a **little-endian** 32-bit value, the tree is stored at the
//! end of the file, just before an 8 byte trailer.
//!
//! | Offset (bytes)             | Field        | Description                                      |
//! |----------------------------|--------------|--------------------------------------------------|
//! | 0x0000                     | File Data    | Data of every file                               |
//! | Size - 8 - Tree Size       | Files Count  | 4 bytes: Number of file records                  |
//! | ...                        | File Records | `Files Count` records                            |
//! | Size - 8                   | Tree Size    | 4 bytes: Size of the count and the file records  |
//! | Size - 4                   | Archive Size | 4 bytes: Size of the whole archive               |
//!
//! Each file record has the following structure:
//!
//! | Offset (bytes) | Field                  | Description                                             |
//! |----------------|------------------------|---------------------------------------------------------|
//! | 0x0000         | Path                   | 4 bytes length, then the path using `\` as separator    |
//! | +0x0000        | Compression            | 1 byte: `0` for none, anything else for zlib            |
//! | +0x0001        | Real Size              | 4 bytes: Size of the data when uncompressed             |
//! | +0x0005        | Packed Size            | 4 bytes: Size of the data in the archive                |
//! | +0x0009        | Data Offset            | 4 bytes: Offset of the data from the start of the file  |
//!
//! DAT2 has no directories: they are rebuilt from the paths, ignoring case, and sorted.
//!
//! ## Additional Information
//!
//! - **File Extension**: `.dat`
//! - **Compression Methods**:
//!   - DAT1: LZSS with a 4096 bytes dictionary, see [`lzss`]
//!   - DAT2: zlib
//!

pub mod block;
pub mod compression;
pub mod dat1;
pub mod dat2;
pub mod dbg;
pub mod error;
pub mod lzss;
pub mod read;
pub mod types;

pub use compression::CompressionMethod;
pub use lzss::Lzss;
pub use read::DatArchive;
