//! Diagnostics about the layout of an archive.
//!
//! Everything here is derived from the parsed tree: offsets are rebuilt from the length prefixed
//! records without reading the stream again. Nothing in this module is needed to extract files.

use std::fmt;

use indexmap::IndexMap;

use crate::read::{ArchiveHeader, DatArchive, DirectoryRecord, FileEntry, FileRecord};
use crate::types::{Dat1DirHeader, Dat1Header, Dat2Trailer};

/// Extension used for files without one
pub const NO_EXTENSION: &str = ".?";

/// A single diagnostics value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DebugValue {
    /// An offset, a size or a count
    Number(u64),
    /// A raw signed field, as stored
    Signed(i64),
    /// A name or a path
    Text(String),
    /// The three unknown DAT1 header values
    Header([i32; 3]),
}

impl fmt::Display for DebugValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DebugValue::Number(value) => write!(f, "{value}"),
            DebugValue::Signed(value) => write!(f, "{value}"),
            DebugValue::Text(value) => write!(f, "{value:?}"),
            DebugValue::Header([a, b, c]) => write!(f, "[{a:#X}, {b:#X}, {c:#X}]"),
        }
    }
}

impl From<u64> for DebugValue {
    fn from(value: u64) -> Self {
        DebugValue::Number(value)
    }
}

impl From<u32> for DebugValue {
    fn from(value: u32) -> Self {
        DebugValue::Number(value as u64)
    }
}

impl From<i32> for DebugValue {
    fn from(value: i32) -> Self {
        DebugValue::Signed(value as i64)
    }
}

impl From<String> for DebugValue {
    fn from(value: String) -> Self {
        DebugValue::Text(value)
    }
}

/// Ordered `key => value` pairs
pub type DebugMap = IndexMap<String, DebugValue>;

/// Sizes of a group of files
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContentStats {
    /// Number of files in the group
    pub count: u64,
    /// Sum of the extracted sizes
    pub real: u64,
    /// Sum of the stored sizes
    pub packed: u64,
}

impl ContentStats {
    fn add(&mut self, file: &FileEntry<'_>) {
        self.count += 1;
        self.real += file.size_real();
        self.packed += file.size_packed();
    }

    /// Mean real size, 0 for an empty group
    pub fn mean_real(&self) -> u64 {
        self.real.checked_div(self.count).unwrap_or(0)
    }

    /// Mean packed size, 0 for an empty group
    pub fn mean_packed(&self) -> u64 {
        self.packed.checked_div(self.count).unwrap_or(0)
    }
}

/// Sizes of files, in total and by uppercased extension
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stats {
    /// Every file of the group
    pub all: ContentStats,

    /// Keyed by the uppercased extension, dot included, or [`NO_EXTENSION`]
    pub by_extension: IndexMap<String, ContentStats>,
}

impl Stats {
    fn add(&mut self, file: &FileEntry<'_>) {
        self.all.add(file);
        self.by_extension
            .entry(extension(file.name()))
            .or_default()
            .add(file);
    }
}

/// Fields and statistics of an archive or a directory
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Section {
    /// Offsets and sizes of the records, in file order
    pub fields: DebugMap,

    /// Sizes of the files below
    pub stats: Stats,
}

/// Diagnostics of a whole archive, see [`DatArchive::debug_info`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DebugInfo {
    /// The header or trailer, and every file of the archive
    pub archive: Section,

    /// Same order as [`DatArchive::directories`]
    pub directories: Vec<Section>,

    /// Same order as [`DatArchive::files`]
    pub files: Vec<DebugMap>,
}

fn extension(name: &str) -> String {
    match name.rfind('.') {
        Some(position) if position + 1 < name.len() => name[position..].to_uppercase(),
        _ => NO_EXTENSION.to_owned(),
    }
}

fn insert(map: &mut DebugMap, key: &str, value: impl Into<DebugValue>) {
    map.insert(key.to_owned(), value.into());
}

impl DatArchive {
    /// Collect the on-disk offsets and sizes of every record, and size statistics of the files.
    pub fn debug_info(&self) -> DebugInfo {
        let mut info = DebugInfo {
            archive: Section::default(),
            directories: vec![Section::default(); self.directories.len()],
            files: vec![DebugMap::new(); self.files.len()],
        };

        for dir in self.directories() {
            for (position, file) in dir.files().enumerate() {
                info.archive.stats.add(&file);
                info.directories[dir.index()].stats.add(&file);
                insert(&mut info.files[file.index()], "Idx:Dir", position as u64);
            }
        }

        match &self.header {
            ArchiveHeader::Dat1(header) => self.dat1_debug_info(header, &mut info),
            ArchiveHeader::Dat2 {
                files_count,
                trailer,
            } => self.dat2_debug_info(*files_count, trailer, &mut info),
        }

        for stats in std::iter::once(&mut info.archive.stats)
            .chain(info.directories.iter_mut().map(|section| &mut section.stats))
        {
            stats.by_extension.sort_keys();
        }

        info
    }

    fn dat1_debug_info(&self, header: &Dat1Header, info: &mut DebugInfo) {
        let fields = &mut info.archive.fields;
        insert(fields, "DAT1:0:DirsCount", header.dirs_count);
        fields.insert("DAT1:1:Header".to_owned(), DebugValue::Header(header.header));

        let names_start = Dat1Header::SIZE;
        let names_size: u64 = self
            .directories()
            .map(|dir| match dir.record() {
                DirectoryRecord::Dat1 { name, .. } => name.encoded_len(),
                DirectoryRecord::Dat2 => 0,
            })
            .sum();

        let mut offset = names_start + names_size;
        let dirs_start = offset;
        for dir in self.directories() {
            let DirectoryRecord::Dat1 { name, header } = dir.record() else {
                continue;
            };

            let dir_start = offset;
            let fields = &mut info.directories[dir.index()].fields;
            insert(fields, "Idx", dir.index() as u64);
            insert(fields, "DAT1:0:FilesCount", header.files_count);
            fields.insert("DAT1:1:Header".to_owned(), DebugValue::Header(header.header));
            insert(fields, "DAT1:2:Name", name.to_string_lossy().into_owned());
            insert(fields, "Offset:0:Info", dir_start);
            offset += Dat1DirHeader::SIZE;
            insert(fields, "Offset:1:Files", offset);

            for file in dir.files() {
                let FileRecord::Dat1(record) = file.record() else {
                    continue;
                };

                let fields = &mut info.files[file.index()];
                insert(fields, "Idx:Dat", file.index() as u64);
                insert(fields, "DAT1:0:NameLength", record.name.len as u64);
                insert(fields, "DAT1:1:Name", record.name.to_string_lossy().into_owned());
                insert(fields, "DAT1:2:PackedMode", record.compress_mode);
                insert(fields, "DAT1:3:Offset", record.offset);
                insert(fields, "DAT1:4:SizeReal", record.size_real);
                insert(fields, "DAT1:5:SizePacked", record.size_packed);
                insert(fields, "Offset:0:Name", offset);
                insert(fields, "Offset:1:Info", offset + record.name.encoded_len());
                insert(fields, "Offset:2:End", offset + record.encoded_len());
                insert(fields, "Size:FileEntry:Total", record.encoded_len());
                offset += record.encoded_len();
            }

            let fields = &mut info.directories[dir.index()].fields;
            insert(fields, "Offset:2:End", offset);
            insert(fields, "Size:DirEntry:Total", offset - dir_start);
        }

        let fields = &mut info.archive.fields;
        insert(fields, "Offset:0:Info", 0u64);
        insert(fields, "Offset:1:DirsNames", names_start);
        insert(fields, "Offset:2:DirsData", dirs_start);
        insert(fields, "Offset:3:FilesContent", offset);
        insert(fields, "Size:Tree:Info", names_start);
        insert(fields, "Size:Tree:DirsNames", names_size);
        insert(fields, "Size:Tree:DirsData", offset - dirs_start);
        insert(fields, "Size:Tree:Total", offset);
    }

    fn dat2_debug_info(&self, files_count: u32, trailer: &Dat2Trailer, info: &mut DebugInfo) {
        let end = trailer.size_dat as u64;
        let trailer_start = end.saturating_sub(Dat2Trailer::SIZE);
        let tree_start = trailer_start.saturating_sub(trailer.size_tree as u64);

        let fields = &mut info.archive.fields;
        insert(fields, "DAT2:0:FilesCount", files_count);
        insert(fields, "DAT2:1:SizeTree", trailer.size_tree);
        insert(fields, "DAT2:2:SizeDat", trailer.size_dat);
        insert(fields, "Offset:0:Begin", 0u64);
        insert(fields, "Offset:1:Tree", tree_start);
        insert(fields, "Offset:2:SizeData", trailer_start);
        insert(fields, "Offset:3:End", end);

        for dir in self.directories() {
            insert(&mut info.directories[dir.index()].fields, "Idx", dir.index() as u64);
        }

        // records are laid out in tree order, not in directory order
        let mut records = self
            .files()
            .filter_map(|file| match file.record() {
                FileRecord::Dat2 { record, index } => Some((*index, file.index(), record)),
                FileRecord::Dat1(_) => None,
            })
            .collect::<Vec<_>>();
        records.sort_by_key(|(index, _, _)| *index);

        let mut offset = tree_start + 4;
        for (index, file, record) in records {
            let fields = &mut info.files[file];
            insert(fields, "Idx:Dat", index as u64);
            insert(fields, "DAT2:0:PathLength", record.path.len);
            insert(fields, "DAT2:1:Path", record.path.to_string_lossy().into_owned());
            insert(fields, "DAT2:2:PackedMode", record.compress_flag as u32);
            insert(fields, "DAT2:3:SizeReal", record.size_real);
            insert(fields, "DAT2:4:SizePacked", record.size_packed);
            insert(fields, "DAT2:5:Offset", record.offset);
            insert(fields, "Offset:0:Path", offset);
            insert(fields, "Offset:1:Info", offset + record.path.encoded_len());
            insert(fields, "Offset:2:End", offset + record.encoded_len());
            insert(fields, "Size:FileEntry:Total", record.encoded_len());
            offset += record.encoded_len();
        }
    }
}
