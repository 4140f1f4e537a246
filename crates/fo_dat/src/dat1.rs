//! Reading of DAT1 archives, as shipped with Fallout.
//!
//! The tree is stored at the start of the file: the names of all directories, followed by the
//! file records of each directory in the same order.

use std::io::{Read, Seek, SeekFrom};

use binrw::BinRead;
use tracing::{debug, instrument, trace};

use crate::{
    compression::CompressionMethod,
    error::{Error, Result},
    read::{
        clean_path, with_restored_position, ArchiveHeader, DatArchive, DirectoryData,
        DirectoryRecord, FileData, FileRecord,
    },
    types::{Dat1DirHeader, Dat1FileRecord, Dat1Header, ShortString},
};

/// Known values of the first header field
///
/// - `0x5E`: MASTER.DAT
/// - `0x0A`: CRITTER.DAT
/// - `0x2E`: FALLDEMO.DAT
pub const KNOWN_MAGIC: [i32; 3] = [0x5E, 0x0A, 0x2E];

fn validate_header(header: &Dat1Header) -> Result<()> {
    if header.dirs_count < 1 {
        return Err(Error::MalformedHeader(format!(
            "directory count {} is less than 1",
            header.dirs_count
        )));
    }

    if !KNOWN_MAGIC.contains(&header.header[0]) {
        debug!(header = ?header.header, "unknown dat1 magic");
        return Err(Error::UnknownFormat);
    }

    if header.header[1] != 0 {
        return Err(Error::MalformedHeader(format!(
            "second header field is {:#X}, expected 0",
            header.header[1]
        )));
    }

    Ok(())
}

/// Whether the stream starts with a DAT1 header holding a known magic value.
///
/// The other header fields are left to [`read`], which reports them as malformed. The position of
/// `reader` is restored before returning.
pub fn detect<R: Read + Seek>(reader: &mut R) -> Result<bool> {
    with_restored_position(reader, |reader| {
        reader.seek(SeekFrom::Start(0))?;
        let Ok(header) = Dat1Header::read(reader) else {
            return Ok(false);
        };
        Ok(KNOWN_MAGIC.contains(&header.header[0]))
    })
}

/// Read the whole tree of a DAT1 archive.
#[instrument(skip(reader), err)]
pub fn read<R: Read + Seek>(reader: &mut R) -> Result<DatArchive> {
    reader.seek(SeekFrom::Start(0))?;

    let header = Dat1Header::read(reader)?;
    validate_header(&header)?;
    debug!(dirs = header.dirs_count, header = ?header.header, "read dat1 header");

    // the length byte is kept as read, offsets of the tree are derived from it
    let names = (0..header.dirs_count)
        .map(|_| ShortString::read(reader))
        .collect::<binrw::BinResult<Vec<_>>>()?;

    let mut directories = Vec::with_capacity(names.len());
    let mut files = Vec::new();

    for (index, name) in names.into_iter().enumerate() {
        let dir_header = Dat1DirHeader::read(reader)?;
        if dir_header.files_count < 0 {
            return Err(Error::MalformedHeader(format!(
                "directory {} has {} files",
                name.to_string_lossy(),
                dir_header.files_count
            )));
        }

        let path = clean_path(&name.to_string_lossy());
        trace!(%path, files = dir_header.files_count, "read dat1 directory");

        let mut dir_files = Vec::new();
        for _ in 0..dir_header.files_count {
            let record = Dat1FileRecord::read(reader)?;
            let compression_method = CompressionMethod::from_dat1(record.compress_mode)?;
            trace!(?record, "read dat1 file");

            // names are cleaned like paths, so lookups by path still find them
            dir_files.push(files.len());
            files.push(FileData {
                directory: index,
                name: clean_path(&record.name.to_string_lossy()),
                compression_method,
                record: FileRecord::Dat1(record),
            });
        }

        directories.push(DirectoryData {
            path,
            record: DirectoryRecord::Dat1 {
                name,
                header: dir_header,
            },
            files: dir_files,
        });
    }

    Ok(DatArchive::from_parts(
        ArchiveHeader::Dat1(header),
        directories,
        files,
    ))
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use binrw::BinWrite;
    use pretty_assertions::assert_eq;

    use crate::dat1::{detect, read};
    use crate::error::{Error, Result};
    use crate::read::{ArchiveHeader, DirectoryRecord};
    use crate::types::{Dat1DirHeader, Dat1FileRecord, Dat1Header, ShortString};

    fn build(header: [i32; 3], dirs: &[(&str, Vec<Dat1FileRecord>)]) -> Result<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::new());
        Dat1Header {
            dirs_count: dirs.len() as i32,
            header,
        }
        .write(&mut cursor)?;
        for (name, _) in dirs {
            ShortString::from(*name).write(&mut cursor)?;
        }
        for (_, files) in dirs {
            Dat1DirHeader {
                files_count: files.len() as i32,
                header: [0, 0x10, 0],
            }
            .write(&mut cursor)?;
            for file in files {
                file.write(&mut cursor)?;
            }
        }
        Ok(cursor.into_inner())
    }

    fn record(name: &str, compress_mode: u32) -> Dat1FileRecord {
        Dat1FileRecord {
            name: name.into(),
            compress_mode,
            offset: 0,
            size_real: 4,
            size_packed: 0,
        }
    }

    #[test]
    fn read_tree() -> Result<()> {
        let input = build(
            [0x0A, 0, 0],
            &[
                (".", vec![record("A.TXT", 0x20)]),
                ("ART\\CRITTERS", vec![record("B.FRM", 0x40), record("C.FRM", 0x20)]),
                ("EMPTY", vec![]),
            ],
        )?;

        let dat = read(&mut Cursor::new(input))?;
        assert!(matches!(dat.header(), ArchiveHeader::Dat1(h) if h.header == [0x0A, 0, 0]));

        let paths = dat.directories().map(|d| d.path()).collect::<Vec<_>>();
        assert_eq!(paths, vec![".", "ART/CRITTERS", "EMPTY"]);

        let files = dat.files().map(|f| f.path()).collect::<Vec<_>>();
        assert_eq!(files, vec!["A.TXT", "ART/CRITTERS/B.FRM", "ART/CRITTERS/C.FRM"]);

        let critters = dat.directory(1).expect("directory");
        assert_eq!(critters.name(), "CRITTERS");
        assert_eq!(critters.len(), 2);
        assert!(matches!(
            critters.record(),
            DirectoryRecord::Dat1 { name, .. } if name.bytes == b"ART\\CRITTERS"
        ));
        assert!(dat.directory(2).expect("directory").is_empty());
        Ok(())
    }

    #[test]
    fn zero_dirs() -> Result<()> {
        let input = build([0x5E, 0, 0], &[])?;
        assert!(detect(&mut Cursor::new(&input))?);
        assert!(matches!(
            read(&mut Cursor::new(&input)),
            Err(Error::MalformedHeader(_))
        ));
        Ok(())
    }

    #[test]
    fn unknown_magic() -> Result<()> {
        for magic in [0, 0x5F] {
            let input = build([magic, 0, 0], &[(".", vec![])])?;
            assert!(!detect(&mut Cursor::new(&input))?);
            assert!(matches!(
                read(&mut Cursor::new(&input)),
                Err(Error::UnknownFormat)
            ));
        }
        Ok(())
    }

    #[test]
    fn second_header_field() -> Result<()> {
        let input = build([0x2E, 1, 0], &[(".", vec![])])?;
        assert!(detect(&mut Cursor::new(&input))?);
        assert!(matches!(
            read(&mut Cursor::new(input)),
            Err(Error::MalformedHeader(_))
        ));
        Ok(())
    }

    #[test]
    fn unknown_compression_mode() -> Result<()> {
        let input = build([0x5E, 0, 0], &[(".", vec![record("A", 0x99)])])?;
        assert!(matches!(
            read(&mut Cursor::new(input)),
            Err(Error::UnknownCompressionMode(0x99))
        ));
        Ok(())
    }

    #[test]
    fn store_compression_mode() -> Result<()> {
        let input = build([0x5E, 0, 0], &[(".", vec![record("A", 0x10)])])?;
        assert!(matches!(
            read(&mut Cursor::new(input)),
            Err(Error::NotImplementedCompressionMode(0x10))
        ));
        Ok(())
    }

    #[test]
    fn truncated_tree() -> Result<()> {
        let mut input = build([0x5E, 0, 0], &[("ART", vec![record("A", 0x20)])])?;
        input.truncate(input.len() - 3);
        assert!(read(&mut Cursor::new(input)).is_err());
        Ok(())
    }

    #[test]
    fn names_with_separators() -> Result<()> {
        let input = build([0x5E, 0, 0], &[("ART", vec![record("SUB\\X.FRM", 0x20)])])?;
        let dat = read(&mut Cursor::new(input))?;

        let file = dat.by_path("art\\sub\\x.frm")?;
        assert_eq!(file.path(), "ART/SUB/X.FRM");
        assert_eq!(file.name_raw(), b"SUB\\X.FRM");
        Ok(())
    }

    #[test]
    fn packed_size_defaults_to_real_size() -> Result<()> {
        let input = build([0x5E, 0, 0], &[(".", vec![record("A", 0x20)])])?;
        let dat = read(&mut Cursor::new(input))?;
        let file = dat.by_index(0)?;
        assert_eq!(file.size_packed(), file.size_real());
        assert_eq!(file.raw_mode(), 0x20);
        assert!(!file.is_packed());
        Ok(())
    }
}
