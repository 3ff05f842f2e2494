//! Error types that can be emitted from this library

use miette::Diagnostic;
use thiserror::Error;

use crate::path::PathViolation;

/// Error type for library
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// Transparent warpper for [`std::io::Error`]
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    /// Transparent warpper for [`binrw::Error`]
    #[error(transparent)]
    BinRWError(#[from] binrw::Error),

    /// unable to find requested file
    #[error("unable to find requested file")]
    FileNotFound(#[from] FileNotFoundError),

    /// entry name {0:?} is not allowed: {1}
    #[error("entry name {0:?} is not allowed: {1}")]
    #[diagnostic(help("archive names use lowercase ascii and forward slashes"))]
    InvalidName(String, PathViolation),

    /// unable to read source for {name}
    #[error("unable to read source for {name}")]
    SourceUnreadable {
        /// The target name inside the archive
        name: String,
        /// The underlying read failure
        #[source]
        source: std::io::Error,
    },

    /// payload offset {0:#x} does not fit in 32 bits
    #[error("payload offset {0:#x} does not fit in 32 bits")]
    OffsetOverflow(u64),

    /// entry of {0} bytes does not fit in 32 bits
    #[error("entry of {0} bytes does not fit in 32 bits")]
    EntryTooLarge(usize),
}

/// Error type to provide further information when a file has not been found
#[derive(Error, Diagnostic, Debug)]
#[error("unable to find requested file")]
pub enum FileNotFoundError {
    /// at index {0}
    #[error("at index {0}")]
    Index(usize),

    /// by name {0}
    #[error("by name {0}")]
    Name(String),
}

/// Generic result type with crate's Error as its error variant
pub type Result<T> = core::result::Result<T, Error>;
