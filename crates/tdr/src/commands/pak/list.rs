use clap::Args;
use miette::Result;
use owo_colors::OwoColorize;
use std::path::PathBuf;
use tdr_pak::tree::Folder;
use tracing::info;

#[derive(Args)]
pub struct ListArgs {
    /// An input PAK file
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// Group entries into folders
    #[arg(long, default_value_t = false)]
    tree: bool,

    /// Show offsets, sizes and header details
    #[arg(short, long, default_value_t = false)]
    long: bool,
}

impl ListArgs {
    pub fn handle(&self) -> Result<()> {
        let archive = super::open(&self.file)?;
        let entries = archive.entries();
        let count = entries.len();

        if self.tree {
            print!("{}", Folder::from_entries(entries));
        } else if self.long {
            println!(
                "{:>10} {:>10} {:>10} {:>7} {:>4}  {}",
                "offset", "stored", "original", "ratio", "key", "name"
            );
            for entry in entries.iter() {
                let Some(meta) = archive.metadata(entry) else {
                    println!(
                        "{:#010X} {:>10} {:>10} {:>7} {:>4}  {}",
                        entry.offset,
                        entry.size,
                        "?",
                        "?",
                        "?",
                        entry.name.red()
                    );
                    continue;
                };
                let ratio = meta
                    .ratio(entry.size)
                    .map(|r| format!("{r:.1}%"))
                    .unwrap_or_else(|| "-".into());
                println!(
                    "{:#010X} {:>10} {:>10} {:>7} {:>4}  {}",
                    entry.offset,
                    entry.size,
                    meta.original_size,
                    ratio,
                    format!("{:02X}", meta.key),
                    entry.name
                );
            }
        } else {
            for name in entries.names() {
                println!("{name}");
            }
        }

        info!("{count} entries in {}", self.file.display());
        Ok(())
    }
}
