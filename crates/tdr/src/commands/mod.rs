pub mod pak;
pub mod vfs;

#[derive(clap::Subcommand)]
pub enum Commands {
    /// Handle PAK/DIR archives
    Pak {
        #[command(subcommand)]
        command: pak::PakCommands,
    },
    /// Look up files across every archive of an installation
    Vfs {
        #[command(subcommand)]
        command: vfs::VfsCommands,
    },
}

impl Commands {
    pub fn handle(&self) -> miette::Result<()> {
        match self {
            Commands::Pak { command } => command.handle(),
            Commands::Vfs { command } => command.handle(),
        }
    }
}
