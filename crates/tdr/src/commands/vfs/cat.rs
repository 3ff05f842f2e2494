use clap::Args;
use miette::{Context, IntoDiagnostic, Result};
use std::{
    fs::File,
    io::{self, Write},
    path::PathBuf,
};
use tdr_pak::Vfs;
use tracing::info;

#[derive(Args)]
pub struct CatArgs {
    /// The game directory
    #[arg(short, long, value_name = "DIR")]
    directory: PathBuf,

    /// The file to look up, only its final name segment is used
    #[arg(value_name = "NAME")]
    name: String,

    /// Write into this file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Allow overwriting the output file
    #[arg(long, default_value_t = false)]
    overwrite: bool,
}

impl CatArgs {
    pub fn handle(&self) -> Result<()> {
        let vfs = Vfs::index_directory(&self.directory)
            .context(format!("scanning {}", self.directory.display()))?;
        let data = vfs
            .load(&self.name)
            .context(format!("loading {}", self.name))?;

        match &self.output {
            Some(p) => {
                info!("writing {} bytes to {}", data.len(), p.display());
                let mut out = if !self.overwrite {
                    File::create_new(p)
                        .into_diagnostic()
                        .context(format!("creating {}", p.display()))?
                } else {
                    File::create(p)
                        .into_diagnostic()
                        .context(format!("creating {}", p.display()))?
                };
                out.write_all(&data).into_diagnostic()?;
            }
            None => io::stdout().lock().write_all(&data).into_diagnostic()?,
        }

        Ok(())
    }
}
