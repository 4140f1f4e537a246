pub mod dump;
pub mod list;
pub mod unpack;

use std::{fs::File, path::Path};

use clap::ValueEnum;
use fo_dat::read::{DatArchive, Generation, ReadOptions};
use miette::{Context, IntoDiagnostic, Result};
use tracing::debug;

#[derive(clap::Subcommand)]
pub enum DatCommands {
    /// List the directories and files of a DAT file
    List(list::ListArgs),
    /// Extract a DAT file into a directory
    Unpack(unpack::UnpackArgs),
    /// Print offsets, sizes and statistics of a DAT file
    Dump(dump::DumpArgs),
}

impl DatCommands {
    pub fn handle(&self) -> Result<()> {
        match self {
            DatCommands::List(list) => list.handle(),
            DatCommands::Unpack(unpack) => unpack.handle(),
            DatCommands::Dump(dump) => dump.handle(),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum GenerationArg {
    /// Fallout
    #[value(name = "1")]
    Dat1,
    /// Fallout 2
    #[value(name = "2")]
    Dat2,
}

impl From<GenerationArg> for Generation {
    fn from(value: GenerationArg) -> Self {
        match value {
            GenerationArg::Dat1 => Generation::Dat1,
            GenerationArg::Dat2 => Generation::Dat2,
        }
    }
}

/// Open a DAT file, keeping the file around to read data from
fn open(path: &Path, generation: Option<GenerationArg>) -> Result<(File, DatArchive)> {
    let mut f = File::open(path)
        .into_diagnostic()
        .context(format!("path: {}", path.display()))?;

    let options = ReadOptions::builder()
        .maybe_generation(generation.map(Generation::from))
        .build();
    let dat = DatArchive::open_with(&mut f, options)
        .context(format!("reading {}", path.display()))?;
    debug!(generation = %dat.generation(), files = dat.len(), "opened archive");

    Ok((f, dat))
}

/// Share of the real size kept after packing, `-` for empty files
fn ratio(size_packed: u64, size_real: u64) -> String {
    if size_real == 0 {
        return "-".to_owned();
    }
    format!("{:.1}%", size_packed as f64 * 100.0 / size_real as f64)
}
