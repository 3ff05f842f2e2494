use clap::Args;
use miette::{Context, Result};
use std::path::PathBuf;
use tdr_pak::PakArchive;
use tracing::info;

#[derive(Args)]
pub struct NewArgs {
    /// The PAK file to create, the DIR file is placed next to it
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,
}

impl NewArgs {
    pub fn handle(&self) -> Result<()> {
        let archive = PakArchive::create(&self.file)
            .context(format!("creating {}", self.file.display()))?;
        info!(
            "created {} and {}",
            archive.pak_path().display(),
            archive.dir_path().display()
        );
        Ok(())
    }
}
