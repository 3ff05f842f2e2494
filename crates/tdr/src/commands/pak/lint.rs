use clap::Args;
use miette::{miette, Result};
use owo_colors::OwoColorize;
use std::path::PathBuf;
use tdr_pak::path;

#[derive(Args)]
pub struct LintArgs {
    /// An input PAK file
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,
}

impl LintArgs {
    pub fn handle(&self) -> Result<()> {
        let archive = super::open(&self.file)?;
        let entries = archive.entries();

        let violations = entries
            .iter()
            .filter_map(|entry| path::validate(&entry.name).err().map(|v| (entry, v)))
            .collect::<Vec<_>>();

        for (entry, violation) in &violations {
            println!("{} {}: {}", "x".red(), entry.name, violation);
            println!("  suggested: {}", path::sanitize(&entry.name).green());
        }

        if violations.is_empty() {
            println!("{} all {} names are valid", "ok".green(), entries.len());
            return Ok(());
        }

        Err(miette!(
            help = "repack the affected files without --keep-names",
            "{} of {} names break the archive conventions",
            violations.len(),
            entries.len()
        ))
    }
}
