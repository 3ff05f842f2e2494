use clap::{Args, ValueEnum};
use itertools::Itertools;
use miette::{miette, Context, IntoDiagnostic, Result};
use owo_colors::OwoColorize;
use std::path::PathBuf;
use tdr_pak::{
    archive::{resolve_conflicts, Conflict},
    path, CompressionMethod, PackFile, PackOptions, PakArchive,
};
use tracing::{info, warn};
use walkdir::WalkDir;

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Compression {
    /// Store files as they are
    None,
    /// Raw deflate, as written by the game
    #[default]
    Deflate,
    /// Zlib wrapped deflate
    Zlib,
}

impl From<Compression> for CompressionMethod {
    fn from(value: Compression) -> Self {
        match value {
            Compression::None => CompressionMethod::None,
            Compression::Deflate => CompressionMethod::Deflate,
            Compression::Zlib => CompressionMethod::Zlib,
        }
    }
}

#[derive(Args)]
pub struct PackArgs {
    /// A target PAK file, created when missing
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// An input directory
    #[arg(short, long, value_name = "DIR")]
    directory: PathBuf,

    /// Folder inside the archive to place the files in
    #[arg(short, long, value_name = "PATH")]
    prefix: Option<String>,

    /// Replace entries that already exist
    #[arg(long, default_value_t = false)]
    overwrite: bool,

    /// Store names exactly as found on disk instead of sanitizing them
    #[arg(long, default_value_t = false)]
    keep_names: bool,

    /// How to store the files
    #[arg(short, long, value_enum, default_value_t = Compression::Deflate)]
    compression: Compression,
}

impl PackArgs {
    fn entry_name(&self, relative: &std::path::Path) -> String {
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .join("/");
        let name = match &self.prefix {
            Some(prefix) => format!("{}/{}", prefix.trim_end_matches('/'), name),
            None => name,
        };

        if self.keep_names {
            name
        } else {
            path::sanitize(&name)
        }
    }

    pub fn handle(&self) -> Result<()> {
        let files = WalkDir::new(&self.directory)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| !e.file_type().is_dir())
            .collect::<Vec<_>>();

        if files.is_empty() {
            return Err(miette!("directory is empty"));
        }

        let archive = PakArchive::new(&self.file);
        let existing = archive.entries();

        let mut incoming = Vec::with_capacity(files.len());
        for file in &files {
            let relative = file
                .path()
                .strip_prefix(&self.directory)
                .into_diagnostic()?;
            let name = self.entry_name(relative);
            if name.is_empty() {
                warn!("no usable name for {}, skipping", file.path().display());
                continue;
            }
            if self.keep_names {
                if let Err(violation) = path::validate(&name) {
                    warn!("{name:?} {violation}");
                }
            } else {
                path::require_valid(&name)
                    .context(format!("naming {}", file.path().display()))?;
            }
            incoming.push(PackFile::from_path(name, file.path()));
        }

        let total = incoming.len();
        let resolved = resolve_conflicts(&existing, incoming, |file| {
            if self.overwrite {
                info!("replacing {}", file.name);
                Conflict::Overwrite
            } else {
                warn!("{} already exists, skipping", file.name);
                Conflict::KeepExisting
            }
        });
        let packed = resolved.len();

        let options = PackOptions::builder()
            .compression(CompressionMethod::from(self.compression))
            .build();
        let entries = archive
            .pack(resolved, &options)
            .context(format!("packing into {}", self.file.display()))?;

        println!(
            "{} packed {packed} files, skipped {}, {} entries in {}",
            "done:".green(),
            total - packed,
            entries.len(),
            self.file.display()
        );
        Ok(())
    }
}
