pub mod delete;
pub mod extract;
pub mod info;
pub mod lint;
pub mod list;
pub mod new;
pub mod pack;

use std::path::Path;

use miette::{miette, Result};
use tdr_pak::PakArchive;

#[derive(clap::Subcommand)]
pub enum PakCommands {
    /// Create an empty PAK/DIR pair
    New(new::NewArgs),
    /// List the entries of an archive
    List(list::ListArgs),
    /// Summarize an archive
    Info(info::InfoArgs),
    /// Extract an archive into a directory
    Extract(extract::ExtractArgs),
    /// Pack a directory into an archive
    Pack(pack::PackArgs),
    /// Remove entries from an archive's index
    Delete(delete::DeleteArgs),
    /// Check entry names against the archive conventions
    Lint(lint::LintArgs),
}

impl PakCommands {
    pub fn handle(&self) -> miette::Result<()> {
        match self {
            PakCommands::New(new) => new.handle(),
            PakCommands::List(list) => list.handle(),
            PakCommands::Info(info) => info.handle(),
            PakCommands::Extract(extract) => extract.handle(),
            PakCommands::Pack(pack) => pack.handle(),
            PakCommands::Delete(delete) => delete.handle(),
            PakCommands::Lint(lint) => lint.handle(),
        }
    }
}

/// Refer to an archive that has to exist already
fn open(file: &Path) -> Result<PakArchive> {
    let archive = PakArchive::new(file);
    if !archive.exists() {
        return Err(miette!(
            help = "both the .pak and the .dir file are needed",
            "{} is not a complete archive",
            file.display()
        ));
    }
    Ok(archive)
}
