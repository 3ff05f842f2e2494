//! Rules for entry names and for turning them into paths on disk.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::error;

/// Why a name does not follow the conventions of the game's archives
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum PathViolation {
    /// The engine looks names up in lowercase
    #[error("contains uppercase characters")]
    UppercaseDetected,

    /// Separators are always forward slashes
    #[error("contains backslashes")]
    BackslashUsage,

    /// Parent directory references
    #[error("contains a '..' sequence")]
    PathTraversal,

    /// Empty path segments
    #[error("contains an empty segment")]
    DoubleSeparator,

    /// Control characters or anything outside printable ascii
    #[error("contains characters outside printable ascii")]
    NonAscii,
}

/// Check a name against the archive conventions, reporting the first violation found
pub fn validate(name: &str) -> Result<(), PathViolation> {
    if name.chars().any(char::is_uppercase) {
        return Err(PathViolation::UppercaseDetected);
    }
    if name.contains('\\') {
        return Err(PathViolation::BackslashUsage);
    }
    if name.contains("..") {
        return Err(PathViolation::PathTraversal);
    }
    if name.contains("//") {
        return Err(PathViolation::DoubleSeparator);
    }
    if name.chars().any(|c| !(' '..='~').contains(&c)) {
        return Err(PathViolation::NonAscii);
    }
    Ok(())
}

/// Like [`validate`], reporting a violation as [`error::Error::InvalidName`]
pub fn require_valid(name: &str) -> error::Result<()> {
    validate(name).map_err(|violation| error::Error::InvalidName(name.to_owned(), violation))
}

/// Rewrite a name into the canonical archive form
///
/// ```
/// assert_eq!(tdr_pak::path::sanitize(r".\Data\\Cars/../Eagle.TXT"), "data/cars/__/eagle.txt");
/// ```
pub fn sanitize(name: &str) -> String {
    if name.trim().is_empty() {
        return String::new();
    }

    let mut result = name.replace('\\', "/").to_lowercase();
    if let Some(rest) = result.strip_prefix("./") {
        result = rest.to_owned();
    }
    while result.contains("//") {
        result = result.replace("//", "/");
    }
    if result.contains("..") {
        result = result.replace("..", "__");
    }

    result.trim_matches('/').to_owned()
}

/// Strip a leading `<archive stem>/` segment from a name
///
/// Archives are frequently packed from a folder named like the archive itself; this removes that
/// redundant level when unpacking next to other archives.
pub fn normalize_archive_path(name: &str, archive: &Path) -> String {
    let clean = sanitize(name);
    let Some(stem) = archive.file_stem().map(|s| s.to_string_lossy().to_lowercase()) else {
        return clean;
    };

    let root = format!("{stem}/");
    match clean.strip_prefix(&root) {
        Some(rest) => rest.to_owned(),
        None => clean,
    }
}

/// Turn a name into a relative path that stays below the directory it is joined to
///
/// Backslashes count as separators, empty and `.` segments are dropped and `..` is replaced with
/// `__`. With `flatten` only the final segment is kept. Returns `None` when nothing is left.
pub fn safe_relative_path(name: &str, flatten: bool) -> Option<PathBuf> {
    let segments: Vec<String> = name
        .split(['/', '\\'])
        .filter(|s| !s.is_empty() && *s != ".")
        .map(|s| s.replace("..", "__"))
        .collect();

    let segments = if flatten {
        segments.last().map(std::slice::from_ref)?
    } else {
        segments.as_slice()
    };

    if segments.is_empty() {
        return None;
    }
    Some(segments.iter().collect())
}
