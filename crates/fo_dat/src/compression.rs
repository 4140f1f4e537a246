//! Compression methods and decompression handling.

use std::fmt;
use std::io::{Cursor, Read};

use flate2::read::ZlibDecoder;
use tracing::instrument;

use crate::block::decompress_blocks;
use crate::error::{Error, Result};
use crate::lzss::Lzss;

/// Raw DAT1 value of [`CompressionMethod::Store`]
pub const DAT1_COMPRESS_STORE: u32 = 0x10;

/// Raw DAT1 value of [`CompressionMethod::None`]
pub const DAT1_COMPRESS_NONE: u32 = 0x20;

/// Raw DAT1 value of [`CompressionMethod::Lzss`]
pub const DAT1_COMPRESS_LZSS: u32 = 0x40;

/// Identifies the storage format used for the data of a file inside a DAT archive
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum CompressionMethod {
    /// Stores the data as it is
    #[default]
    None,

    /// Known DAT1 mode with an unknown meaning, never seen in released archives
    Store,

    /// DAT1 only, blocks of [`Lzss::DAT1`] data
    Lzss,

    /// DAT2 only, a zlib stream
    Deflate,
}

impl CompressionMethod {
    /// Interpret the compression mode of a DAT1 file record.
    pub fn from_dat1(mode: u32) -> Result<Self> {
        match mode {
            DAT1_COMPRESS_NONE => Ok(CompressionMethod::None),
            DAT1_COMPRESS_LZSS => Ok(CompressionMethod::Lzss),
            DAT1_COMPRESS_STORE => Err(Error::NotImplementedCompressionMode(mode)),
            _ => Err(Error::UnknownCompressionMode(mode)),
        }
    }

    /// Interpret the compression flag of a DAT2 file record.
    pub fn from_dat2(flag: u8) -> Self {
        match flag {
            0 => CompressionMethod::None,
            _ => CompressionMethod::Deflate,
        }
    }

    /// Whether data has to go through a decompressor
    pub fn is_packed(&self) -> bool {
        *self != CompressionMethod::None
    }

    /// Decompress the packed data of a file.
    ///
    /// The output length is not checked here, see [`crate::read::FileEntry::read_real`].
    #[instrument(skip(packed), fields(packed = packed.len()), err)]
    pub fn decompress(&self, packed: &[u8]) -> Result<Vec<u8>> {
        match self {
            CompressionMethod::None => Ok(packed.to_vec()),
            CompressionMethod::Store => Err(Error::NotImplementedCompressionMode(DAT1_COMPRESS_STORE)),
            CompressionMethod::Lzss => decompress_blocks(
                &mut Cursor::new(packed),
                packed.len() as u64,
                &Lzss::DAT1,
            ),
            CompressionMethod::Deflate => {
                let mut output = Vec::new();
                ZlibDecoder::new(packed).read_to_end(&mut output)?;
                Ok(output)
            }
        }
    }
}

impl fmt::Display for CompressionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CompressionMethod::None => "none",
            CompressionMethod::Store => "store",
            CompressionMethod::Lzss => "lzss",
            CompressionMethod::Deflate => "deflate",
        })
    }
}

#[cfg(test)]
mod test {
    use std::io::Write;

    use flate2::{write::ZlibEncoder, Compression};
    use pretty_assertions::assert_eq;

    use crate::compression::CompressionMethod;
    use crate::error::{Error, Result};

    #[test]
    fn dat1_modes() {
        assert!(matches!(
            CompressionMethod::from_dat1(0x20),
            Ok(CompressionMethod::None)
        ));
        assert!(matches!(
            CompressionMethod::from_dat1(0x40),
            Ok(CompressionMethod::Lzss)
        ));
        assert!(matches!(
            CompressionMethod::from_dat1(0x10),
            Err(Error::NotImplementedCompressionMode(0x10))
        ));
        assert!(matches!(
            CompressionMethod::from_dat1(0x99),
            Err(Error::UnknownCompressionMode(0x99))
        ));
        assert!(matches!(
            CompressionMethod::from_dat1(0),
            Err(Error::UnknownCompressionMode(0))
        ));
    }

    #[test]
    fn dat2_flags() {
        assert_eq!(CompressionMethod::from_dat2(0), CompressionMethod::None);
        assert_eq!(CompressionMethod::from_dat2(1), CompressionMethod::Deflate);
        assert_eq!(CompressionMethod::from_dat2(0xFF), CompressionMethod::Deflate);
    }

    #[test]
    fn none_is_identity() -> Result<()> {
        assert_eq!(CompressionMethod::None.decompress(b"raw")?, b"raw".to_vec());
        Ok(())
    }

    #[test]
    fn deflate() -> Result<()> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"Hello World")?;
        let packed = encoder.finish()?;

        assert_eq!(
            CompressionMethod::Deflate.decompress(&packed)?,
            b"Hello World".to_vec()
        );
        Ok(())
    }

    #[test]
    fn deflate_garbage() {
        let result = CompressionMethod::Deflate.decompress(&[0x00, 0x01, 0x02]);
        assert!(matches!(result, Err(Error::IOError(_))));
    }

    #[test]
    fn lzss_blocks() -> Result<()> {
        let packed = [0x00, 0x04, 0x07, b'a', b'b', b'c'];
        assert_eq!(CompressionMethod::Lzss.decompress(&packed)?, b"abc".to_vec());
        Ok(())
    }

    #[test]
    fn store_is_not_implemented() {
        let result = CompressionMethod::Store.decompress(b"data");
        assert!(matches!(
            result,
            Err(Error::NotImplementedCompressionMode(0x10))
        ));
    }
}
