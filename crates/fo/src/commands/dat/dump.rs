use clap::Args;
use fo_dat::{
    block::BlockKind,
    dbg::{DebugMap, Stats},
};
use miette::{Context, Result};
use owo_colors::OwoColorize;
use std::path::PathBuf;

use super::{open, ratio, GenerationArg};

#[derive(Args)]
pub struct DumpArgs {
    /// An input DAT file
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// Read the file as this generation instead of detecting it
    #[arg(short, long, value_name = "GENERATION")]
    generation: Option<GenerationArg>,

    /// List the blocks of LZSS compressed files
    #[arg(long, default_value_t = false)]
    blocks: bool,
}

impl DumpArgs {
    pub fn handle(&self) -> Result<()> {
        let (mut f, dat) = open(&self.file, self.generation)?;
        let info = dat.debug_info();

        println!("{}", self.file.display().bold());
        print_fields(1, &info.archive.fields);
        print_stats(1, &info.archive.stats);

        for dir in dat.directories() {
            let section = &info.directories[dir.index()];
            println!("{}", dir.path().bold());
            print_fields(1, &section.fields);
            print_stats(1, &section.stats);

            for file in dir.files() {
                println!("  {}", file.name().cyan());
                print_fields(2, &info.files[file.index()]);

                if !self.blocks {
                    continue;
                }

                let blocks = file
                    .blocks(&mut f)
                    .context(format!("reading blocks of {}", file.path()))?;
                for block in blocks {
                    let kind = match block.kind {
                        BlockKind::Stored => "stored",
                        BlockKind::Compressed => "lzss",
                    };
                    let clamped = if block.is_clamped() {
                        format!(" (declared {})", block.declared).yellow().to_string()
                    } else {
                        String::new()
                    };
                    println!(
                        "      {:<6} {:>7} at +{:#X}{}",
                        kind,
                        block.signed_size(),
                        block.offset,
                        clamped
                    );
                }
            }
        }

        Ok(())
    }
}

fn print_fields(depth: usize, fields: &DebugMap) {
    for (key, value) in fields {
        println!("{:indent$}{} = {}", "", key.dimmed(), value, indent = depth * 2);
    }
}

fn print_stats(depth: usize, stats: &Stats) {
    if stats.all.count == 0 {
        return;
    }

    let groups = std::iter::once(("All", &stats.all))
        .chain(stats.by_extension.iter().map(|(ext, s)| (ext.as_str(), s)));
    for (name, s) in groups {
        println!(
            "{:indent$}{} {} files, {} real, {} packed ({}), mean {} / {}",
            "",
            format!("{name}:").dimmed(),
            s.count,
            s.real,
            s.packed,
            ratio(s.packed, s.real),
            s.mean_real(),
            s.mean_packed(),
            indent = depth * 2
        );
    }
}
