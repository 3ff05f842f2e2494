use clap::Args;
use miette::{IntoDiagnostic, Result};
use owo_colors::OwoColorize;
use std::{fs, path::PathBuf};

#[derive(Args)]
pub struct InfoArgs {
    /// An input PAK file
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,
}

impl InfoArgs {
    pub fn handle(&self) -> Result<()> {
        let archive = super::open(&self.file)?;
        let entries = archive.entries();

        let payload = fs::metadata(archive.pak_path()).into_diagnostic()?.len();
        let stored = entries.total_size();
        let original: u64 = entries
            .iter()
            .filter_map(|entry| archive.metadata(entry))
            .map(|meta| u64::from(meta.original_size))
            .sum();

        println!("{:>14} {}", "payload:".bold(), archive.pak_path().display());
        println!("{:>14} {}", "index:".bold(), archive.dir_path().display());
        println!("{:>14} {}", "entries:".bold(), entries.len());
        println!("{:>14} {} bytes", "payload size:".bold(), payload);
        println!("{:>14} {} bytes", "referenced:".bold(), stored);
        println!(
            "{:>14} {} bytes",
            "unreferenced:".bold(),
            payload.saturating_sub(stored).yellow()
        );
        println!("{:>14} {} bytes", "original:".bold(), original);
        if original > 0 {
            println!(
                "{:>14} {:.1}%",
                "ratio:".bold(),
                stored as f64 / original as f64 * 100.0
            );
        }

        Ok(())
    }
}
