//! LZSS decompression.
//!
//! The variant used by DAT1 archives is the classic Okumura layout:
//!
//! - a circular dictionary of 4096 bytes, filled with spaces, with the write cursor starting at
//!   `dictionary_size - max_match`
//! - a flag byte precedes every group of 8 tokens, least significant bit first
//! - a set bit is a literal byte
//! - a clear bit is a two byte reference: the low 8 bits of the dictionary offset, followed by
//!   a byte holding the high 4 bits of the offset and the match length minus `min_match`

use std::io::Read;

use bon::Builder;
use byteorder::ReadBytesExt;
use tracing::{instrument, trace};

use crate::error::{Error, Result};

/// Parameters of the LZSS dictionary
///
/// ```
/// use fo_dat::lzss::Lzss;
///
/// let lzss = Lzss::builder().build();
/// assert_eq!(lzss, Lzss::DAT1);
///
/// let output = lzss.decompress_slice(&[0xFF, b'f', b'a', b'l', b'l', b'o', b'u', b't', b'!'])?;
/// assert_eq!(output, b"fallout!");
/// # Ok::<(), fo_dat::error::Error>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Builder)]
pub struct Lzss {
    /// Size of the circular dictionary in bytes
    #[builder(default = 4096)]
    pub dictionary_size: u16,

    /// Length of the shortest back reference
    #[builder(default = 3)]
    pub min_match: u8,

    /// Length of the longest back reference
    #[builder(default = 18)]
    pub max_match: u8,
}

impl Default for Lzss {
    fn default() -> Self {
        Self::DAT1
    }
}

impl Lzss {
    /// Parameters used by every compressed block of a DAT1 archive
    pub const DAT1: Lzss = Lzss {
        dictionary_size: 4096,
        min_match: 3,
        max_match: 18,
    };

    /// Check that the parameters describe a usable dictionary.
    pub fn validate(&self) -> Result<()> {
        if self.dictionary_size == 0 {
            return Err(Error::InvalidParameters("dictionary size is 0".into()));
        }
        if self.min_match == 0 || self.max_match == 0 {
            return Err(Error::InvalidParameters("match length is 0".into()));
        }
        if self.min_match > self.max_match {
            return Err(Error::InvalidParameters(format!(
                "min match {} is larger than max match {}",
                self.min_match, self.max_match
            )));
        }
        if self.max_match as u16 >= self.dictionary_size {
            return Err(Error::InvalidParameters(format!(
                "max match {} does not fit dictionary of {} bytes",
                self.max_match, self.dictionary_size
            )));
        }
        Ok(())
    }

    /// Decompress exactly `packed_size` bytes taken from `reader`.
    ///
    /// Running out of packed bytes in the middle of a token is an [`Error::TruncatedInput`],
    /// while a reader that ends before `packed_size` bytes were consumed is an
    /// [`Error::IOError`].
    #[instrument(skip(self, reader), err)]
    pub fn decompress<R: Read>(&self, reader: &mut R, packed_size: u64) -> Result<Vec<u8>> {
        self.validate()?;

        let size = self.dictionary_size as usize;
        let mut dictionary = vec![b' '; size];
        let mut cursor = size - self.max_match as usize;

        let mut input = PackedInput {
            reader,
            remaining: packed_size,
        };
        let mut output = Vec::with_capacity(packed_size.min(u16::MAX as u64) as usize);
        let mut flags: u16 = 0;

        while !input.is_empty() {
            flags >>= 1;
            if flags & 0x100 == 0 {
                flags = input.next()? as u16 | 0xFF00;
            }

            if flags & 1 == 1 {
                let byte = input.next()?;
                output.push(byte);
                dictionary[cursor] = byte;
                cursor = (cursor + 1) % size;
            } else {
                let low = input.next()? as usize;
                let high = input.next()? as usize;

                let offset = low | ((high & 0xF0) << 4);
                let length = (high & 0x0F) + self.min_match as usize;
                trace!(offset, length, "back reference");

                for idx in 0..length {
                    let byte = dictionary[(offset + idx) % size];
                    output.push(byte);
                    dictionary[cursor] = byte;
                    cursor = (cursor + 1) % size;
                }
            }
        }

        Ok(output)
    }

    /// Decompress a whole in-memory buffer.
    pub fn decompress_slice(&self, data: &[u8]) -> Result<Vec<u8>> {
        self.decompress(&mut &data[..], data.len() as u64)
    }
}

struct PackedInput<'a, R: Read> {
    reader: &'a mut R,
    remaining: u64,
}

impl<R: Read> PackedInput<'_, R> {
    fn is_empty(&self) -> bool {
        self.remaining == 0
    }

    fn next(&mut self) -> Result<u8> {
        if self.remaining == 0 {
            return Err(Error::TruncatedInput);
        }
        let byte = self.reader.read_u8()?;
        self.remaining -= 1;
        Ok(byte)
    }
}
