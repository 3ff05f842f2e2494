pub mod cat;
pub mod scan;

#[derive(clap::Subcommand)]
pub enum VfsCommands {
    /// Index every archive below a directory
    Scan(scan::ScanArgs),
    /// Write a file found by name in any archive
    Cat(cat::CatArgs),
}

impl VfsCommands {
    pub fn handle(&self) -> miette::Result<()> {
        match self {
            VfsCommands::Scan(scan) => scan.handle(),
            VfsCommands::Cat(cat) => cat.handle(),
        }
    }
}
