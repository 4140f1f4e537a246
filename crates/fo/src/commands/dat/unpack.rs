use clap::Args;
use fo_dat::DatArchive;
use itertools::Itertools;
use miette::{miette, Context, IntoDiagnostic, Result};
use std::{
    fs::File,
    io::Write,
    path::{Component, Path, PathBuf},
};
use tracing::{info, warn};

use super::{open, GenerationArg};

#[derive(Args)]
pub struct UnpackArgs {
    /// An input DAT file
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// A target directory
    #[arg(short, long, value_name = "DIR")]
    directory: PathBuf,

    /// Allow overwriting the target
    #[arg(long, default_value_t = false)]
    overwrite: bool,

    /// Skip names which are not in the archive instead of failing
    #[arg(long, default_value_t = false)]
    ignore_missing: bool,

    /// Read the file as this generation instead of detecting it
    #[arg(short, long, value_name = "GENERATION")]
    generation: Option<GenerationArg>,

    /// Files or directories to extract, everything when empty. `@list.txt` reads one name per line
    #[arg(value_name = "NAMES")]
    names: Vec<String>,
}

impl UnpackArgs {
    pub fn handle(&self) -> Result<()> {
        let (mut f, dat) = open(&self.file, self.generation)?;

        let names = expand_names(&self.names)?;
        let selected = select(&dat, &names, self.ignore_missing)?;

        for index in selected {
            let f_dat = dat.by_index(index)?;
            let path = f_dat.path();

            let p = safe_join(&self.directory, &path)
                .ok_or_else(|| miette!("refusing to write {} outside of the target", path))?;
            info!("writing {}", p.display());

            if let Some(parent) = p.parent() {
                std::fs::create_dir_all(parent)
                    .into_diagnostic()
                    .context(format!("creating {}", parent.display()))?;
            }

            let data = f_dat
                .read_real(&mut f)
                .context(format!("extracting {}", path))?;

            let mut out = if !self.overwrite {
                File::create_new(&p)
                    .into_diagnostic()
                    .context(format!("creating {}", &p.display()))?
            } else {
                File::create(&p)
                    .into_diagnostic()
                    .context(format!("creating {}", &p.display()))?
            };

            out.write_all(&data).into_diagnostic()?;
        }
        Ok(())
    }
}

/// Replace every `@file` argument with the names listed in that file
fn expand_names(names: &[String]) -> Result<Vec<String>> {
    let mut expanded = Vec::new();
    for name in names {
        match name.strip_prefix('@') {
            Some(list) => {
                let content = std::fs::read_to_string(list)
                    .into_diagnostic()
                    .context(format!("reading names from {}", list))?;
                expanded.extend(
                    content
                        .lines()
                        .map(str::trim)
                        .filter(|line| !line.is_empty())
                        .map(str::to_owned),
                );
            }
            None => expanded.push(name.clone()),
        }
    }
    Ok(expanded)
}

/// Indexes of the files matching `names`, as file paths or directory paths, ignoring case
fn select(dat: &DatArchive, names: &[String], ignore_missing: bool) -> Result<Vec<usize>> {
    if names.is_empty() {
        return Ok((0..dat.len()).collect());
    }

    let mut selected = Vec::new();
    for name in names {
        let key = name.replace('\\', "/").trim_matches('/').to_uppercase();
        let prefix = format!("{key}/");

        let matches = dat
            .files()
            .filter(|file| {
                let path = file.path().to_uppercase();
                path == key || path.starts_with(&prefix)
            })
            .map(|file| file.index())
            .collect_vec();

        if matches.is_empty() {
            if ignore_missing {
                warn!("{} is not in the archive", name);
                continue;
            }
            return Err(miette!("{} is not in the archive", name));
        }
        selected.extend(matches);
    }

    Ok(selected.into_iter().unique().collect())
}

/// Join an archive path to `base`, refusing anything but plain components
fn safe_join(base: &Path, path: &str) -> Option<PathBuf> {
    let mut joined = base.to_path_buf();
    for part in path.split('/') {
        match Path::new(part).components().collect_vec().as_slice() {
            [Component::Normal(part)] => joined.push(part),
            _ => return None,
        }
    }
    Some(joined)
}
