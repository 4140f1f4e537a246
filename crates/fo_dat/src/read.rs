//! Types for reading DAT archives
//!

use bon::Builder;
use indexmap::IndexMap;
use std::{
    fmt::{self, Debug},
    io::{Read, Seek, SeekFrom},
};
use tracing::{debug, instrument};

use crate::{
    block::{self, Block},
    compression::CompressionMethod,
    dat1, dat2,
    error::{Error, FileNotFoundError, Result},
    types::{Dat1DirHeader, Dat1FileRecord, Dat1Header, Dat2FileRecord, Dat2Trailer, ShortString},
};

/// The two incompatible DAT layouts
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Generation {
    /// Fallout, big endian, stores directories
    Dat1 = 1,

    /// Fallout 2, little endian, stores a flat list of paths at the end of the file
    Dat2 = 2,
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DAT{}", *self as u8)
    }
}

/// Options for how a DAT archive should be read
#[derive(Debug, Clone, Copy, Default, Builder)]
pub struct ReadOptions {
    /// Read the archive as this generation instead of detecting it
    pub generation: Option<Generation>,
}

/// Archive-wide fields, as stored in the file
#[derive(Debug, Clone, PartialEq)]
pub enum ArchiveHeader {
    /// Header found at the start of a DAT1 archive
    Dat1(Dat1Header),

    /// Trailer found at the end of a DAT2 archive
    Dat2 {
        /// The number of files, stored at the start of the tree
        files_count: u32,

        /// The last 8 bytes of the archive
        trailer: Dat2Trailer,
    },
}

/// Directory fields, as stored in the file
#[derive(Debug, Clone, PartialEq)]
pub enum DirectoryRecord {
    /// DAT1 stores directory names first, then a header before the files of each directory
    Dat1 {
        /// The name stored at the start of the archive
        name: ShortString,

        /// The header preceding the file records
        header: Dat1DirHeader,
    },

    /// DAT2 directories only exist in memory
    Dat2,
}

/// File fields, as stored in the file
#[derive(Debug, Clone, PartialEq)]
pub enum FileRecord {
    /// A DAT1 file record
    Dat1(Dat1FileRecord),

    /// A DAT2 file record
    Dat2 {
        /// The record itself
        record: Dat2FileRecord,

        /// Position of the record in the tree, which has no particular order
        index: usize,
    },
}

#[derive(Debug, Clone)]
pub(crate) struct DirectoryData {
    pub(crate) path: String,
    pub(crate) record: DirectoryRecord,
    pub(crate) files: Vec<usize>,
}

#[derive(Debug, Clone)]
pub(crate) struct FileData {
    pub(crate) directory: usize,
    pub(crate) name: String,
    pub(crate) compression_method: CompressionMethod,
    pub(crate) record: FileRecord,
}

/// DAT archive reader
///
/// The archive only holds the parsed tree. Data is read through a stream provided by the caller,
/// so one archive can be shared between threads each using their own stream.
///
/// ```no_run
/// use std::io::prelude::*;
///
/// fn list_dat_contents(mut reader: impl Read + Seek) -> fo_dat::error::Result<()> {
///     let dat = fo_dat::DatArchive::open(&mut reader)?;
///
///     for dir in dat.directories() {
///         for file in dir.files() {
///             println!("Filename: {}", file.path());
///             std::io::stdout().write_all(&file.read_real(&mut reader)?)?;
///         }
///     }
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct DatArchive {
    pub(crate) header: ArchiveHeader,
    pub(crate) directories: Vec<DirectoryData>,
    pub(crate) files: Vec<FileData>,
    paths: IndexMap<Box<str>, usize>,
}

impl DatArchive {
    /// Read a DAT archive of either generation, collecting the files it contains.
    ///
    /// DAT2 is tried first as it is anchored at the end of the stream. The position of `reader`
    /// is restored before returning.
    pub fn open<R: Read + Seek>(reader: &mut R) -> Result<DatArchive> {
        Self::open_with(reader, ReadOptions::default())
    }

    /// Read a DAT archive using the given options.
    #[instrument(skip(reader), err)]
    pub fn open_with<R: Read + Seek>(reader: &mut R, options: ReadOptions) -> Result<DatArchive> {
        with_restored_position(reader, |reader| {
            let generation = match options.generation {
                Some(generation) => generation,
                None => detect(reader)?.ok_or(Error::UnknownFormat)?,
            };
            debug!(%generation, "reading archive");

            match generation {
                Generation::Dat1 => dat1::read(reader),
                Generation::Dat2 => dat2::read(reader),
            }
        })
    }

    /// Read a DAT1 archive without detection.
    pub fn open_dat1<R: Read + Seek>(reader: &mut R) -> Result<DatArchive> {
        Self::open_with(reader, ReadOptions::builder().generation(Generation::Dat1).build())
    }

    /// Read a DAT2 archive without detection.
    pub fn open_dat2<R: Read + Seek>(reader: &mut R) -> Result<DatArchive> {
        Self::open_with(reader, ReadOptions::builder().generation(Generation::Dat2).build())
    }

    pub(crate) fn from_parts(
        header: ArchiveHeader,
        directories: Vec<DirectoryData>,
        files: Vec<FileData>,
    ) -> DatArchive {
        let mut archive = DatArchive {
            header,
            directories,
            files,
            paths: IndexMap::new(),
        };

        let paths = archive
            .files()
            .map(|file| (file.path().to_uppercase().into_boxed_str(), file.index()))
            .collect::<Vec<_>>();
        archive.paths.reserve(paths.len());
        for (path, index) in paths {
            archive.paths.entry(path).or_insert(index);
        }

        archive
    }

    /// The layout of this archive
    pub fn generation(&self) -> Generation {
        match self.header {
            ArchiveHeader::Dat1(_) => Generation::Dat1,
            ArchiveHeader::Dat2 { .. } => Generation::Dat2,
        }
    }

    /// Archive-wide fields, as stored in the file
    pub fn header(&self) -> &ArchiveHeader {
        &self.header
    }

    /// Iterate over all directories, in archive order for DAT1 and sorted by path for DAT2
    pub fn directories(&self) -> impl ExactSizeIterator<Item = Directory<'_>> {
        (0..self.directories.len()).map(move |index| Directory {
            archive: self,
            index,
        })
    }

    /// Get a directory by index
    pub fn directory(&self, index: usize) -> Option<Directory<'_>> {
        (index < self.directories.len()).then_some(Directory {
            archive: self,
            index,
        })
    }

    /// Iterate over all files, directory by directory
    pub fn files(&self) -> impl ExactSizeIterator<Item = FileEntry<'_>> {
        (0..self.files.len()).map(move |index| FileEntry {
            archive: self,
            index,
        })
    }

    /// Number of files contained in this DAT.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether this DAT archive contains no files
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total size of the files in the archive once extracted, if it fits.
    pub fn decompressed_size(&self) -> Option<u128> {
        let mut total = 0u128;
        for file in self.files() {
            total = total.checked_add(file.size_real() as u128)?;
        }
        Some(total)
    }

    /// Get a file by index
    pub fn by_index(&self, index: usize) -> Result<FileEntry<'_>> {
        if index >= self.files.len() {
            return Err(Error::FileNotFound(FileNotFoundError::Index(index)));
        }
        Ok(FileEntry {
            archive: self,
            index,
        })
    }

    /// Search for a file by path, ignoring case and the kind of separators used
    pub fn by_path(&self, path: &str) -> Result<FileEntry<'_>> {
        let key = clean_path(path).to_uppercase();
        let Some(&index) = self.paths.get(key.as_str()) else {
            return Err(Error::FileNotFound(FileNotFoundError::Path(path.to_owned())));
        };
        self.by_index(index)
    }
}

/// A directory of a DAT archive
#[derive(Clone, Copy)]
pub struct Directory<'a> {
    archive: &'a DatArchive,
    index: usize,
}

impl Debug for Directory<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Directory({:#?})", self.data())
    }
}

impl<'a> Directory<'a> {
    /// The archive holding this directory
    pub fn archive(&self) -> &'a DatArchive {
        self.archive
    }

    /// Position of the directory in [`DatArchive::directories`]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Full path of the directory with `/` separators, `.` for the root directory
    pub fn path(&self) -> &'a str {
        &self.data().path
    }

    /// Last component of the path
    pub fn name(&self) -> &'a str {
        let path = self.path();
        path.rsplit('/').next().unwrap_or(path)
    }

    /// Directory fields, as stored in the file
    pub fn record(&self) -> &'a DirectoryRecord {
        &self.data().record
    }

    /// Number of files in this directory
    pub fn len(&self) -> usize {
        self.data().files.len()
    }

    /// Whether this directory contains no files
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate over the files of this directory
    pub fn files(&self) -> impl ExactSizeIterator<Item = FileEntry<'a>> {
        let archive = self.archive;
        self.data()
            .files
            .iter()
            .map(move |&index| FileEntry { archive, index })
    }

    fn data(&self) -> &'a DirectoryData {
        &self.archive.directories[self.index]
    }
}

/// A file of a DAT archive
#[derive(Clone, Copy)]
pub struct FileEntry<'a> {
    archive: &'a DatArchive,
    index: usize,
}

impl Debug for FileEntry<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "FileEntry({:#?})", self.data())
    }
}

/// Methods for retrieving information on DAT file entries
impl<'a> FileEntry<'a> {
    /// The archive holding this file
    pub fn archive(&self) -> &'a DatArchive {
        self.archive
    }

    /// The directory holding this file
    pub fn directory(&self) -> Directory<'a> {
        Directory {
            archive: self.archive,
            index: self.data().directory,
        }
    }

    /// Position of the file in [`DatArchive::files`]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Get the base name of the file
    pub fn name(&self) -> &'a str {
        &self.data().name
    }

    /// Get the name of the file, in the raw (internal) byte representation.
    ///
    /// For DAT2 this is the full path as stored in the archive.
    pub fn name_raw(&self) -> &'a [u8] {
        match &self.data().record {
            FileRecord::Dat1(record) => &record.name.bytes,
            FileRecord::Dat2 { record, .. } => &record.path.bytes,
        }
    }

    /// Get the full path of the file with `/` separators
    ///
    /// # Warnings
    ///
    /// The path is cleaned of `.` and `..` components, but comes from the archive: treat it as
    /// untrusted input when building paths on disk.
    pub fn path(&self) -> String {
        let directory = self.directory().path();
        if directory == ROOT {
            self.name().to_owned()
        } else {
            format!("{}/{}", directory, self.name())
        }
    }

    /// Get the offset of the data from the start of the archive
    pub fn offset(&self) -> u64 {
        match &self.data().record {
            FileRecord::Dat1(record) => record.offset as u64,
            FileRecord::Dat2 { record, .. } => record.offset as u64,
        }
    }

    /// Get the size of the file, in bytes, when uncompressed
    pub fn size_real(&self) -> u64 {
        match &self.data().record {
            FileRecord::Dat1(record) => record.size_real as u64,
            FileRecord::Dat2 { record, .. } => record.size_real as u64,
        }
    }

    /// Get the size of the file, in bytes, in the archive
    ///
    /// DAT1 stores 0 for uncompressed files, in which case this is the real size.
    pub fn size_packed(&self) -> u64 {
        match &self.data().record {
            FileRecord::Dat1(record) if record.size_packed == 0 => record.size_real as u64,
            FileRecord::Dat1(record) => record.size_packed as u64,
            FileRecord::Dat2 { record, .. } => record.size_packed as u64,
        }
    }

    /// Get the compression method used for this file
    pub fn compression_method(&self) -> CompressionMethod {
        self.data().compression_method
    }

    /// Get the compression mode exactly as stored in the file record
    pub fn raw_mode(&self) -> u32 {
        match &self.data().record {
            FileRecord::Dat1(record) => record.compress_mode,
            FileRecord::Dat2 { record, .. } => record.compress_flag as u32,
        }
    }

    /// Whether the data has to be decompressed
    pub fn is_packed(&self) -> bool {
        self.compression_method().is_packed()
    }

    /// File fields, as stored in the file
    pub fn record(&self) -> &'a FileRecord {
        &self.data().record
    }

    /// Read the data of the file as stored in the archive.
    ///
    /// The position of `reader` is restored before returning.
    #[instrument(skip(reader), err)]
    pub fn read_packed<R: Read + Seek>(&self, reader: &mut R) -> Result<Vec<u8>> {
        with_restored_position(reader, |reader| {
            self.seek_data(reader)?;
            let mut data = vec![0u8; self.size_packed() as usize];
            reader.read_exact(&mut data)?;
            Ok(data)
        })
    }

    /// Read the data of the file, decompressed if needed.
    ///
    /// Fails with [`Error::DecompressedSizeMismatch`] when the result doesn't match
    /// [`FileEntry::size_real`]. The position of `reader` is restored before returning.
    #[instrument(skip(reader), err)]
    pub fn read_real<R: Read + Seek>(&self, reader: &mut R) -> Result<Vec<u8>> {
        let packed = self.read_packed(reader)?;
        let real = self.compression_method().decompress(&packed)?;

        if real.len() as u64 != self.size_real() {
            return Err(Error::DecompressedSizeMismatch {
                expected: self.size_real(),
                actual: real.len() as u64,
            });
        }

        Ok(real)
    }

    /// Read the block layout of a LZSS compressed file, empty for other methods.
    ///
    /// The position of `reader` is restored before returning.
    pub fn blocks<R: Read + Seek>(&self, reader: &mut R) -> Result<Vec<Block>> {
        if self.compression_method() != CompressionMethod::Lzss {
            return Ok(Vec::new());
        }
        with_restored_position(reader, |reader| {
            self.seek_data(reader)?;
            block::read_blocks(reader, self.size_packed())
        })
    }

    /// Read the raw data of every block of a LZSS compressed file, empty for other methods.
    ///
    /// The position of `reader` is restored before returning.
    pub fn block_data<R: Read + Seek>(&self, reader: &mut R) -> Result<Vec<(Block, Vec<u8>)>> {
        if self.compression_method() != CompressionMethod::Lzss {
            return Ok(Vec::new());
        }
        with_restored_position(reader, |reader| {
            self.seek_data(reader)?;
            block::read_block_data(reader, self.size_packed())
        })
    }

    /// Make sure the whole data is in the stream, then seek to its start
    fn seek_data<R: Read + Seek>(&self, reader: &mut R) -> Result<()> {
        let end = self.offset() + self.size_packed();
        let length = reader.seek(SeekFrom::End(0))?;
        if end > length {
            return Err(Error::TruncatedStream {
                expected: end,
                actual: length,
            });
        }

        reader.seek(SeekFrom::Start(self.offset()))?;
        Ok(())
    }

    fn data(&self) -> &'a FileData {
        &self.archive.files[self.index]
    }
}

/// Path of the directory holding files without a directory
pub const ROOT: &str = ".";

/// DAT2 with a matching trailer, then DAT1, then DAT2 with a trailer that doesn't match the
/// stream length, so a damaged DAT2 archive reports its size instead of an unknown format.
fn detect<R: Read + Seek>(reader: &mut R) -> Result<Option<Generation>> {
    if dat2::detect(reader)? {
        return Ok(Some(Generation::Dat2));
    }
    if dat1::detect(reader)? {
        return Ok(Some(Generation::Dat1));
    }
    if dat2::detect_resized(reader)? {
        return Ok(Some(Generation::Dat2));
    }
    Ok(None)
}

/// Run `f`, then seek `reader` back to where it was, even when `f` failed
pub(crate) fn with_restored_position<R: Seek, T>(
    reader: &mut R,
    f: impl FnOnce(&mut R) -> Result<T>,
) -> Result<T> {
    let position = reader.stream_position()?;
    let result = f(reader);
    let restored = reader.seek(SeekFrom::Start(position));

    let value = result?;
    restored?;
    Ok(value)
}

/// Normalize a stored path: `/` separators, no empty, `.` or `..` components
pub(crate) fn clean_path(path: &str) -> String {
    let mut components: Vec<&str> = Vec::new();
    for component in path.split(['/', '\\']) {
        match component {
            "" | "." => {}
            ".." => {
                components.pop();
            }
            _ => components.push(component),
        }
    }

    if components.is_empty() {
        ROOT.to_owned()
    } else {
        components.join("/")
    }
}

/// Split a stored path into its cleaned directory and base name
pub(crate) fn split_path(path: &str) -> (String, String) {
    let path = clean_path(path);
    match path.rsplit_once('/') {
        Some((directory, name)) => (directory.to_owned(), name.to_owned()),
        None => (ROOT.to_owned(), path),
    }
}
