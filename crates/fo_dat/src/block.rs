//! Block segmentation of LZSS compressed DAT1 files.
//!
//! A compressed DAT1 file is not a single LZSS stream. The packed data is split into blocks,
//! each starting with a big endian `i16`:
//!
//! - a negative size marks a block of `-size` bytes stored as is
//! - a positive size marks a block of `size` bytes of LZSS data
//!
//! The size of the last block is often wrong for files made of multiple blocks, sometimes by
//! tens of kilobytes. Block sizes are therefore clamped against the packed bytes left in the file.

use std::io::{Read, Seek, SeekFrom};

use byteorder::{BigEndian, ReadBytesExt};
use tracing::{debug, instrument, trace};

use crate::error::{Error, Result};
use crate::lzss::Lzss;
use crate::read::with_restored_position;

/// Size of the header preceding every block
pub const BLOCK_HEADER_SIZE: u64 = 2;

/// How the data of a block is stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    /// Data is copied as is
    Stored,

    /// Data is compressed with [`Lzss::DAT1`]
    Compressed,
}

/// A single block of a compressed DAT1 file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    /// How the block data is stored
    pub kind: BlockKind,

    /// The size found in the block header
    pub declared: i16,

    /// Offset of the block data from the start of the packed data, header excluded
    pub offset: u64,

    /// Number of bytes of block data, after clamping
    pub size: u64,
}

impl Block {
    /// Whether the declared size had to be reduced to fit in the packed data
    pub fn is_clamped(&self) -> bool {
        self.declared.unsigned_abs() as u64 != self.size
    }

    /// The clamped size, negative for stored blocks
    pub fn signed_size(&self) -> i64 {
        match self.kind {
            BlockKind::Stored => -(self.size as i64),
            BlockKind::Compressed => self.size as i64,
        }
    }
}

/// Read the layout of all blocks of a file.
///
/// `reader` must be positioned at the start of the packed data, and its position is restored
/// before returning.
#[instrument(skip(reader), err)]
pub fn read_blocks<R: Read + Seek>(reader: &mut R, size_packed: u64) -> Result<Vec<Block>> {
    with_restored_position(reader, |reader| {
        let mut blocks = Vec::new();
        let mut remaining = size_packed as i64;
        let mut offset = 0u64;

        while remaining >= BLOCK_HEADER_SIZE as i64 {
            let declared = reader.read_i16::<BigEndian>()?;
            remaining -= BLOCK_HEADER_SIZE as i64;
            offset += BLOCK_HEADER_SIZE;

            if declared == 0 {
                return Err(Error::CorruptBlockHeader {
                    offset: offset - BLOCK_HEADER_SIZE,
                });
            }

            let kind = if declared < 0 {
                BlockKind::Stored
            } else {
                BlockKind::Compressed
            };
            let size = (declared.unsigned_abs() as i64).min(remaining) as u64;

            let block = Block {
                kind,
                declared,
                offset,
                size,
            };
            if block.is_clamped() {
                debug!(declared, size, "clamped block size");
            } else {
                trace!(?block, "block");
            }

            reader.seek(SeekFrom::Current(size as i64))?;
            remaining -= size as i64;
            offset += size;
            blocks.push(block);
        }

        if remaining != 0 {
            return Err(Error::BlockAccountingError { remaining });
        }

        Ok(blocks)
    })
}

/// Read the raw data of all blocks of a file.
///
/// `reader` must be positioned at the start of the packed data, and its position is restored
/// before returning.
pub fn read_block_data<R: Read + Seek>(
    reader: &mut R,
    size_packed: u64,
) -> Result<Vec<(Block, Vec<u8>)>> {
    let blocks = read_blocks(reader, size_packed)?;

    with_restored_position(reader, |reader| {
        let start = reader.stream_position()?;
        blocks
            .into_iter()
            .map(|block| -> Result<(Block, Vec<u8>)> {
                reader.seek(SeekFrom::Start(start + block.offset))?;
                let mut data = vec![0u8; block.size as usize];
                reader.read_exact(&mut data)?;
                Ok((block, data))
            })
            .collect()
    })
}

/// Decompress a DAT1 file made of blocks.
///
/// `reader` must be positioned at the start of the packed data, and is left at its end.
#[instrument(skip(reader, lzss), err)]
pub fn decompress_blocks<R: Read + Seek>(
    reader: &mut R,
    size_packed: u64,
    lzss: &Lzss,
) -> Result<Vec<u8>> {
    let start = reader.stream_position()?;
    let blocks = read_blocks(reader, size_packed)?;

    let mut output = Vec::new();
    for block in &blocks {
        reader.seek(SeekFrom::Start(start + block.offset))?;
        match block.kind {
            BlockKind::Stored => {
                let mut data = vec![0u8; block.size as usize];
                reader.read_exact(&mut data)?;
                output.extend_from_slice(&data);
            }
            BlockKind::Compressed => {
                output.extend(lzss.decompress(reader, block.size)?);
            }
        }
    }

    reader.seek(SeekFrom::Start(start + size_packed))?;
    Ok(output)
}

#[cfg(test)]
mod test {
    use std::io::{Cursor, Seek, SeekFrom};

    use pretty_assertions::assert_eq;

    use crate::block::{decompress_blocks, read_block_data, read_blocks, Block, BlockKind};
    use crate::error::{Error, Result};
    use crate::lzss::Lzss;

    fn literals(data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        for chunk in data.chunks(8) {
            out.push(0xFF >> (8 - chunk.len()));
            out.extend_from_slice(chunk);
        }
        out
    }

    fn block(size: i16, data: &[u8]) -> Vec<u8> {
        let mut out = size.to_be_bytes().to_vec();
        out.extend_from_slice(data);
        out
    }

    #[test]
    fn single_compressed_block() -> Result<()> {
        let packed = literals(b"fallout");
        let input = block(packed.len() as i16, &packed);

        let output = decompress_blocks(&mut Cursor::new(&input), input.len() as u64, &Lzss::DAT1)?;
        assert_eq!(output, b"fallout".to_vec());
        Ok(())
    }

    #[test]
    fn stored_and_compressed_blocks() -> Result<()> {
        let packed = literals(b"world");
        let mut input = block(-6, b"hello ");
        input.extend(block(packed.len() as i16, &packed));

        let mut reader = Cursor::new(&input);
        let blocks = read_blocks(&mut reader, input.len() as u64)?;
        assert_eq!(
            blocks,
            vec![
                Block {
                    kind: BlockKind::Stored,
                    declared: -6,
                    offset: 2,
                    size: 6,
                },
                Block {
                    kind: BlockKind::Compressed,
                    declared: packed.len() as i16,
                    offset: 10,
                    size: packed.len() as u64,
                },
            ]
        );
        assert_eq!(reader.position(), 0);

        let accounted: u64 = blocks.iter().map(|b| b.size + 2).sum();
        assert_eq!(accounted, input.len() as u64);

        let output = decompress_blocks(&mut reader, input.len() as u64, &Lzss::DAT1)?;
        assert_eq!(output, b"hello world".to_vec());
        assert_eq!(reader.position(), input.len() as u64);
        Ok(())
    }

    #[test]
    fn clamps_last_compressed_block() -> Result<()> {
        let packed = literals(b"12345678");
        let mut input = block(0x7FFF, &packed);
        // bytes of the next file must not be touched
        input.extend_from_slice(&[0xFF; 16]);
        let size_packed = 2 + packed.len() as u64;

        let blocks = read_blocks(&mut Cursor::new(&input), size_packed)?;
        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].is_clamped());
        assert_eq!(blocks[0].size, packed.len() as u64);
        assert_eq!(blocks[0].kind, BlockKind::Compressed);

        let mut reader = Cursor::new(&input);
        let output = decompress_blocks(&mut reader, size_packed, &Lzss::DAT1)?;
        assert_eq!(output, b"12345678".to_vec());
        assert_eq!(reader.position(), size_packed);
        Ok(())
    }

    #[test]
    fn clamps_last_stored_block_keeping_sign() -> Result<()> {
        let mut input = block(-3, b"abc");
        input.extend(block(-100, b"defg"));

        let blocks = read_blocks(&mut Cursor::new(&input), input.len() as u64)?;
        assert_eq!(blocks[1].kind, BlockKind::Stored);
        assert_eq!(blocks[1].signed_size(), -4);
        assert_eq!(blocks[1].declared, -100);

        let output = decompress_blocks(&mut Cursor::new(&input), input.len() as u64, &Lzss::DAT1)?;
        assert_eq!(output, b"abcdefg".to_vec());
        Ok(())
    }

    #[test]
    fn block_data() -> Result<()> {
        let mut input = block(-2, b"ab");
        input.extend(block(3, &[0x00, 0x00, 0x00]));

        let mut reader = Cursor::new(&input);
        let data = read_block_data(&mut reader, input.len() as u64)?;
        assert_eq!(data.len(), 2);
        assert_eq!(data[0].1, b"ab".to_vec());
        assert_eq!(data[1].1, vec![0x00, 0x00, 0x00]);
        assert_eq!(reader.position(), 0);
        Ok(())
    }

    #[test]
    fn zero_block_header() {
        let mut input = block(-2, b"ab");
        input.extend(block(0, &[]));

        let result = read_blocks(&mut Cursor::new(&input), input.len() as u64);
        assert!(matches!(result, Err(Error::CorruptBlockHeader { offset: 4 })));
    }

    #[test]
    fn leftover_byte() {
        let mut input = block(-2, b"ab");
        input.push(0x00);

        let result = read_blocks(&mut Cursor::new(&input), input.len() as u64);
        assert!(matches!(
            result,
            Err(Error::BlockAccountingError { remaining: 1 })
        ));
    }

    #[test]
    fn position_restored_on_error() -> Result<()> {
        let input = block(0, &[0x00; 4]);
        let mut reader = Cursor::new(&input);
        reader.seek(SeekFrom::Start(0))?;

        assert!(read_blocks(&mut reader, input.len() as u64).is_err());
        assert_eq!(reader.position(), 0);
        Ok(())
    }
}
