use clap::Args;
use miette::{Context, IntoDiagnostic, Result};
use std::{fs::File, io::Write, path::PathBuf};
use tdr_pak::{path, ExtractOptions};
use tracing::{info, warn};

#[derive(Args)]
pub struct ExtractArgs {
    /// An input PAK file
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// A target directory
    #[arg(short, long, value_name = "DIR")]
    directory: PathBuf,

    /// Only extract these entries
    #[arg(short, long = "entry", value_name = "NAME")]
    entries: Vec<String>,

    /// Allow overwriting existing files
    #[arg(long, default_value_t = false)]
    overwrite: bool,

    /// Write every file directly into the target directory
    #[arg(long, default_value_t = false)]
    flatten: bool,

    /// Drop a leading folder named like the archive
    #[arg(long, default_value_t = false)]
    strip_root: bool,
}

impl ExtractArgs {
    pub fn handle(&self) -> Result<()> {
        let archive = super::open(&self.file)?;

        if self.entries.is_empty() {
            let options = ExtractOptions::builder()
                .flatten(self.flatten)
                .overwrite(self.overwrite)
                .strip_archive_root(self.strip_root)
                .build();
            let written = archive
                .unpack(&self.directory, &options)
                .context(format!("extracting into {}", self.directory.display()))?;
            println!("extracted {written} files into {}", self.directory.display());
            return Ok(());
        }

        let table = archive.entries();
        for name in &self.entries {
            let entry = table.by_name(name).context(format!("looking up {name}"))?;
            let target = if self.strip_root {
                path::normalize_archive_path(&entry.name, archive.pak_path())
            } else {
                entry.name.clone()
            };
            let Some(relative) = path::safe_relative_path(&target, self.flatten) else {
                warn!("skipping {name:?}, nothing left of its name");
                continue;
            };

            let p = self.directory.join(relative);
            info!("writing {}", p.display());

            if let Some(parent) = p.parent() {
                std::fs::create_dir_all(parent)
                    .into_diagnostic()
                    .context(format!("creating {}", parent.display()))?;
            }
            let mut out = if !self.overwrite {
                File::create_new(&p)
                    .into_diagnostic()
                    .context(format!("creating {}", &p.display()))?
            } else {
                File::create(&p)
                    .into_diagnostic()
                    .context(format!("creating {}", &p.display()))?
            };

            let data = archive.extract(entry)?;
            out.write_all(&data).into_diagnostic()?;
        }

        Ok(())
    }
}
