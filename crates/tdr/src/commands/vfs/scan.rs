use clap::Args;
use itertools::Itertools;
use miette::{Context, Result};
use owo_colors::OwoColorize;
use std::path::PathBuf;
use tdr_pak::Vfs;

#[derive(Args)]
pub struct ScanArgs {
    /// The game directory
    #[arg(short, long, value_name = "DIR")]
    directory: PathBuf,

    /// List every indexed file with the archive providing it
    #[arg(short, long, default_value_t = false)]
    long: bool,
}

impl ScanArgs {
    pub fn handle(&self) -> Result<()> {
        let vfs = Vfs::index_directory(&self.directory)
            .context(format!("scanning {}", self.directory.display()))?;

        for archive in vfs.archives() {
            println!("{}", archive.pak_path().display());
        }

        if self.long {
            for (archive, entry) in vfs.iter().sorted_by(|a, b| a.1.name.cmp(&b.1.name)) {
                println!(
                    "  {} {}",
                    entry.name,
                    archive.pak_path().display().dimmed()
                );
            }
        }

        println!(
            "{} files in {} archives",
            vfs.len().bold(),
            vfs.archives().len().bold()
        );
        Ok(())
    }
}
