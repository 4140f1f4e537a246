use clap::Args;
use miette::Result;
use owo_colors::OwoColorize;
use std::path::PathBuf;

use super::{open, ratio, GenerationArg};

#[derive(Args)]
pub struct ListArgs {
    /// An input DAT file
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// Read the file as this generation instead of detecting it
    #[arg(short, long, value_name = "GENERATION")]
    generation: Option<GenerationArg>,
}

impl ListArgs {
    pub fn handle(&self) -> Result<()> {
        let (_, dat) = open(&self.file, self.generation)?;

        println!(
            "{} {} files in {} directories",
            dat.generation().bold(),
            dat.len(),
            dat.directories().len()
        );

        for dir in dat.directories() {
            println!("{} {}", format!("[{}]", dir.index()).dimmed(), dir.path().bold());

            for file in dir.files() {
                let saved = file.size_real() as i64 - file.size_packed() as i64;
                println!(
                    "  {:<16} {:<8} {:>#10X} {:>10} {:>10} {:>10} {:>7}",
                    file.name(),
                    file.compression_method().to_string(),
                    file.offset(),
                    file.size_real(),
                    file.size_packed(),
                    saved,
                    ratio(file.size_packed(), file.size_real()),
                );
            }
        }

        if let Some(total) = dat.decompressed_size() {
            println!("{} bytes once extracted", total.green());
        }

        Ok(())
    }
}
