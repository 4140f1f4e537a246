//! Reading of DAT2 archives, as shipped with Fallout 2.
//!
//! The tree is stored at the end of the file, just before an 8 byte trailer. It's a flat list of
//! file paths: directories are rebuilt from the paths.

use std::io::{Read, Seek, SeekFrom};

use binrw::BinRead;
use byteorder::{LittleEndian, ReadBytesExt};
use indexmap::IndexMap;
use tracing::{debug, instrument, trace};

use crate::{
    compression::CompressionMethod,
    error::{Error, Result},
    read::{
        split_path, with_restored_position, ArchiveHeader, DatArchive, DirectoryData,
        DirectoryRecord, FileData, FileRecord,
    },
    types::{Dat2FileRecord, Dat2Trailer},
};

/// Smallest possible DAT2 archive: an empty tree and the trailer
pub const MIN_SIZE: u64 = 4 + Dat2Trailer::SIZE;

/// Whether the stream ends with a DAT2 trailer matching its length.
///
/// The position of `reader` is restored before returning.
pub fn detect<R: Read + Seek>(reader: &mut R) -> Result<bool> {
    with_restored_position(reader, |reader| {
        let length = reader.seek(SeekFrom::End(0))?;
        if length < MIN_SIZE {
            return Ok(false);
        }

        reader.seek(SeekFrom::End(-(Dat2Trailer::SIZE as i64)))?;
        let trailer = Dat2Trailer::read(reader)?;
        Ok(trailer.size_dat as u64 == length)
    })
}

/// Whether the stream ends with a well formed DAT2 trailer whose archive size doesn't match.
///
/// This is how a truncated or padded DAT2 archive looks. The trailer must declare a tree holding
/// at least the files count, fitting in the stream, and a non-zero archive size. The position of
/// `reader` is restored before returning.
pub fn detect_resized<R: Read + Seek>(reader: &mut R) -> Result<bool> {
    with_restored_position(reader, |reader| {
        let length = reader.seek(SeekFrom::End(0))?;
        if length < MIN_SIZE {
            return Ok(false);
        }

        reader.seek(SeekFrom::End(-(Dat2Trailer::SIZE as i64)))?;
        let trailer = Dat2Trailer::read(reader)?;
        Ok(trailer.size_dat != 0
            && trailer.size_tree >= 4
            && trailer.size_tree as u64 + Dat2Trailer::SIZE <= length)
    })
}

struct SynthesizedDirectory {
    path: String,
    files: Vec<(usize, String, Dat2FileRecord)>,
}

/// Read the whole tree of a DAT2 archive.
#[instrument(skip(reader), err)]
pub fn read<R: Read + Seek>(reader: &mut R) -> Result<DatArchive> {
    let length = reader.seek(SeekFrom::End(0))?;
    if length < MIN_SIZE {
        return Err(Error::TruncatedStream {
            expected: MIN_SIZE,
            actual: length,
        });
    }

    reader.seek(SeekFrom::End(-(Dat2Trailer::SIZE as i64)))?;
    let trailer = Dat2Trailer::read(reader)?;
    if trailer.size_dat as u64 != length {
        return Err(Error::TruncatedStream {
            expected: trailer.size_dat as u64,
            actual: length,
        });
    }

    let tree_start = length
        .checked_sub(trailer.size_tree as u64 + Dat2Trailer::SIZE)
        .ok_or_else(|| {
            Error::MalformedHeader(format!(
                "tree size {} is larger than the archive",
                trailer.size_tree
            ))
        })?;

    reader.seek(SeekFrom::Start(tree_start))?;
    let files_count = reader.read_u32::<LittleEndian>()?;
    debug!(files_count, ?trailer, "read dat2 trailer");

    // keyed by the uppercased path, the first file seen decides how the directory is written
    let mut synthesized: IndexMap<String, SynthesizedDirectory> = IndexMap::new();
    for index in 0..files_count as usize {
        let record = Dat2FileRecord::read(reader)?;
        let (path, name) = split_path(&record.path.to_string_lossy());
        trace!(?record, "read dat2 file");

        synthesized
            .entry(path.to_uppercase())
            .or_insert_with(|| {
                debug!(%path, "synthesized directory");
                SynthesizedDirectory {
                    path,
                    files: Vec::new(),
                }
            })
            .files
            .push((index, name, record));
    }

    let tree_end = reader.stream_position()?;
    if tree_end != length - Dat2Trailer::SIZE {
        debug!(tree_end, "tree does not end at the trailer");
    }

    synthesized.sort_keys();

    let mut directories = Vec::with_capacity(synthesized.len());
    let mut files = Vec::new();
    for (dir_index, directory) in synthesized.into_values().enumerate() {
        let mut dir_files = Vec::with_capacity(directory.files.len());
        for (index, name, record) in directory.files {
            dir_files.push(files.len());
            files.push(FileData {
                directory: dir_index,
                name,
                compression_method: CompressionMethod::from_dat2(record.compress_flag),
                record: FileRecord::Dat2 { record, index },
            });
        }

        directories.push(DirectoryData {
            path: directory.path,
            record: DirectoryRecord::Dat2,
            files: dir_files,
        });
    }

    Ok(DatArchive::from_parts(
        ArchiveHeader::Dat2 {
            files_count,
            trailer,
        },
        directories,
        files,
    ))
}

#[cfg(test)]
mod test {
    use std::io::{Cursor, Write};

    use binrw::BinWrite;
    use byteorder::{LittleEndian, WriteBytesExt};
    use flate2::{write::ZlibEncoder, Compression};
    use pretty_assertions::assert_eq;

    use crate::compression::CompressionMethod;
    use crate::dat2::{detect, detect_resized, read};
    use crate::error::{Error, Result};
    use crate::read::{ArchiveHeader, FileRecord};
    use crate::types::{Dat2FileRecord, Dat2Trailer};

    fn build(files: &[(&str, bool, &str)]) -> Result<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::new());
        let mut records = Vec::new();
        for (path, compress, content) in files {
            let packed = if *compress {
                let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
                encoder.write_all(content.as_bytes())?;
                encoder.finish()?
            } else {
                content.as_bytes().to_vec()
            };

            records.push(Dat2FileRecord {
                path: (*path).into(),
                compress_flag: *compress as u8,
                size_real: content.len() as u32,
                size_packed: packed.len() as u32,
                offset: cursor.position() as u32,
            });
            cursor.write_all(&packed)?;
        }

        let tree_start = cursor.position();
        cursor.write_u32::<LittleEndian>(records.len() as u32)?;
        for record in &records {
            record.write(&mut cursor)?;
        }

        Dat2Trailer {
            size_tree: (cursor.position() - tree_start) as u32,
            size_dat: (cursor.position() + Dat2Trailer::SIZE) as u32,
        }
        .write(&mut cursor)?;

        Ok(cursor.into_inner())
    }

    #[test]
    fn read_files() -> Result<()> {
        let input = build(&[
            ("art\\intrface\\a.frm", true, "aaaaaaaaaaaaaaaaaaaaaaaa"),
            ("text\\english\\b.msg", false, "{100}{}{hello}"),
        ])?;
        assert!(detect(&mut Cursor::new(&input))?);

        let mut reader = Cursor::new(input);
        let dat = read(&mut reader)?;
        assert!(matches!(
            dat.header(),
            ArchiveHeader::Dat2 { files_count: 2, .. }
        ));

        let a = dat.by_path("ART/INTRFACE/A.FRM")?;
        assert_eq!(a.name(), "a.frm");
        assert_eq!(a.compression_method(), CompressionMethod::Deflate);
        assert_eq!(a.raw_mode(), 1);
        assert_eq!(a.read_real(&mut reader)?, b"aaaaaaaaaaaaaaaaaaaaaaaa".to_vec());

        let b = dat.by_path("text/english/b.msg")?;
        assert_eq!(b.compression_method(), CompressionMethod::None);
        assert_eq!(b.read_real(&mut reader)?, b.read_packed(&mut reader)?);
        Ok(())
    }

    #[test]
    fn directories_ignore_case() -> Result<()> {
        let input = build(&[
            ("Foo\\A.txt", false, "a"),
            ("foo\\B.txt", false, "b"),
            ("FOO\\C.txt", false, "c"),
        ])?;

        let dat = read(&mut Cursor::new(input))?;
        assert_eq!(dat.directories().len(), 1);

        let dir = dat.directory(0).expect("directory");
        assert_eq!(dir.path(), "Foo");
        let paths = dir.files().map(|f| f.path()).collect::<Vec<_>>();
        assert_eq!(paths, vec!["Foo/A.txt", "Foo/B.txt", "Foo/C.txt"]);
        Ok(())
    }

    #[test]
    fn directories_are_sorted() -> Result<()> {
        let input = build(&[
            ("sound\\sfx\\x.acm", false, "x"),
            ("Art\\y.frm", false, "y"),
            ("z.txt", false, "z"),
            ("art\\w.frm", false, "w"),
        ])?;

        let dat = read(&mut Cursor::new(input))?;
        let paths = dat.directories().map(|d| d.path()).collect::<Vec<_>>();
        assert_eq!(paths, vec![".", "Art", "sound/sfx"]);

        let order = dat
            .files()
            .map(|f| match f.record() {
                FileRecord::Dat2 { index, .. } => *index,
                FileRecord::Dat1(_) => usize::MAX,
            })
            .collect::<Vec<_>>();
        assert_eq!(order, vec![2, 1, 3, 0]);
        assert_eq!(dat.by_path("z.txt")?.directory().path(), ".");
        Ok(())
    }

    #[test]
    fn empty_archive() -> Result<()> {
        let input = build(&[])?;
        assert_eq!(input.len(), 12);

        let dat = read(&mut Cursor::new(input))?;
        assert!(dat.is_empty());
        assert_eq!(dat.directories().len(), 0);
        Ok(())
    }

    #[test]
    fn size_mismatch() -> Result<()> {
        let mut input = build(&[("a.txt", false, "abc")])?;
        input.insert(0, 0x00);

        assert!(!detect(&mut Cursor::new(&input))?);
        assert!(detect_resized(&mut Cursor::new(&input))?);
        assert!(matches!(
            read(&mut Cursor::new(&input)),
            Err(Error::TruncatedStream { expected, actual }) if expected + 1 == actual
        ));
        Ok(())
    }

    #[test]
    fn resized_needs_a_plausible_trailer() -> Result<()> {
        assert!(!detect_resized(&mut Cursor::new(vec![0x00; 64]))?);

        // tree larger than the stream
        let mut input = build(&[])?;
        input[4..8].copy_from_slice(&0xFFFFu32.to_le_bytes());
        input[8..12].copy_from_slice(&999u32.to_le_bytes());
        assert!(!detect_resized(&mut Cursor::new(input))?);

        let mut input = build(&[])?;
        input[8..12].copy_from_slice(&999u32.to_le_bytes());
        assert!(detect_resized(&mut Cursor::new(input))?);
        Ok(())
    }

    #[test]
    fn tree_larger_than_archive() -> Result<()> {
        let mut input = build(&[])?;
        input[4..8].copy_from_slice(&0xFFFFu32.to_le_bytes());

        assert!(matches!(
            read(&mut Cursor::new(input)),
            Err(Error::MalformedHeader(_))
        ));
        Ok(())
    }

    #[test]
    fn too_small() {
        let input = vec![0x00; 8];
        assert!(matches!(detect(&mut Cursor::new(&input)), Ok(false)));
        assert!(matches!(
            read(&mut Cursor::new(&input)),
            Err(Error::TruncatedStream {
                expected: 12,
                actual: 8
            })
        ));
    }

    #[test]
    fn size_mismatch_after_decompression() -> Result<()> {
        let mut input = build(&[("a.txt", true, "abcabcabc")])?;
        // size_real of the only record
        let position = input.len() - 8 - 12;
        input[position..position + 4].copy_from_slice(&5u32.to_le_bytes());

        let mut reader = Cursor::new(input);
        let dat = read(&mut reader)?;
        assert!(matches!(
            dat.by_index(0)?.read_real(&mut reader),
            Err(Error::DecompressedSizeMismatch {
                expected: 5,
                actual: 9
            })
        ));
        Ok(())
    }
}
