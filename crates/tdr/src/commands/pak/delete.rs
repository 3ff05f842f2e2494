use clap::Args;
use miette::{Context, IntoDiagnostic, Result};
use owo_colors::OwoColorize;
use std::{fs, path::PathBuf};
use tdr_pak::DeleteTarget;

#[derive(Args)]
pub struct DeleteArgs {
    /// An input PAK file
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// Treat every name as a folder and remove everything inside it
    #[arg(long, default_value_t = false)]
    folder: bool,

    /// Names to remove
    #[arg(required = true, value_name = "NAME")]
    names: Vec<String>,
}

impl DeleteArgs {
    pub fn handle(&self) -> Result<()> {
        let archive = super::open(&self.file)?;

        let targets = self
            .names
            .iter()
            .map(|name| {
                if self.folder {
                    DeleteTarget::subtree(name.as_str())
                } else {
                    DeleteTarget::file(name.as_str())
                }
            })
            .collect::<Vec<_>>();

        let before = archive.entries().len();
        let entries = archive
            .delete(&targets)
            .context(format!("deleting from {}", self.file.display()))?;
        let payload = fs::metadata(archive.pak_path()).into_diagnostic()?.len();

        println!(
            "removed {} entries, {} remain",
            before.saturating_sub(entries.len()),
            entries.len()
        );
        println!(
            "{}",
            format!(
                "{} keeps its size of {payload} bytes, removed data is not reclaimed",
                archive.pak_path().display()
            )
            .yellow()
        );
        Ok(())
    }
}
