//! Lookup of files by name across every archive of a game installation.
//!
//! The game resolves textures and models by their bare file name, whatever folder or archive they
//! were packed into. [`Vfs`] mirrors that: entries are keyed by their lowercase final name segment
//! and the first archive that provides a name wins.

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use indexmap::IndexMap;
use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

use crate::{
    archive::PakArchive,
    error::{FileNotFoundError, Result},
    types::Entry,
};

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .is_some_and(|ext| ext.to_string_lossy().eq_ignore_ascii_case(extension))
}

/// Find every `.pak` file in `dir` that has a `.dir` index next to it
///
/// Extensions are matched without regard to case and subdirectories are not searched. The result
/// is sorted by path.
pub fn find_archives(dir: impl AsRef<Path>) -> Result<Vec<PakArchive>> {
    let mut paks = Vec::new();
    // index files by lowercase stem
    let mut indexes: HashMap<String, PathBuf> = HashMap::new();

    for item in fs::read_dir(dir)? {
        let path = item?.path();
        if !path.is_file() {
            continue;
        }
        if has_extension(&path, "pak") {
            paks.push(path);
        } else if has_extension(&path, "dir") {
            if let Some(stem) = path.file_stem() {
                indexes.insert(stem.to_string_lossy().to_lowercase(), path);
            }
        }
    }

    paks.sort();
    let archives = paks
        .into_iter()
        .filter_map(|pak| {
            let stem = pak.file_stem()?.to_string_lossy().to_lowercase();
            match indexes.get(&stem) {
                Some(index) => Some(PakArchive::with_index(&pak, index)),
                None => {
                    debug!("{} has no index, skipping", pak.display());
                    None
                }
            }
        })
        .collect();

    Ok(archives)
}

/// Name lookup over many archives
#[derive(Debug, Default)]
pub struct Vfs {
    archives: Vec<PakArchive>,
    files: IndexMap<String, (usize, Entry)>,
}

impl Vfs {
    /// Index every archive found anywhere below `root`
    ///
    /// Directories are visited in name order. Directories that cannot be read are logged and
    /// skipped.
    #[instrument(skip(root), fields(root = %root.as_ref().display()), err)]
    pub fn index_directory(root: impl AsRef<Path>) -> Result<Self> {
        let mut vfs = Vfs::default();

        let directories = WalkDir::new(root.as_ref())
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| match e {
                Ok(e) => Some(e),
                Err(e) => {
                    warn!("unable to walk {}: {e}", root.as_ref().display());
                    None
                }
            })
            .filter(|e| e.file_type().is_dir());

        for directory in directories {
            match find_archives(directory.path()) {
                Ok(archives) => archives.into_iter().for_each(|a| vfs.add_archive(a)),
                Err(e) => warn!("unable to scan {}: {e}", directory.path().display()),
            }
        }

        info!(
            archives = vfs.archives.len(),
            files = vfs.files.len(),
            "indexed archives"
        );
        Ok(vfs)
    }

    /// Add the entries of an archive; names that are already known keep their first source
    pub fn add_archive(&mut self, archive: PakArchive) {
        let index = self.archives.len();
        let entries = archive.entries();

        let mut shadowed = 0usize;
        for entry in entries {
            let key = entry.file_name().to_lowercase();
            if self.files.contains_key(&key) {
                shadowed += 1;
                continue;
            }
            self.files.insert(key, (index, entry));
        }

        debug!(shadowed, "added {}", archive.pak_path().display());
        self.archives.push(archive);
    }

    fn key(name: &str) -> String {
        name.rsplit(['/', '\\'])
            .next()
            .unwrap_or(name)
            .to_lowercase()
    }

    /// Whether any archive provides a file with this name
    pub fn contains(&self, name: &str) -> bool {
        self.files.contains_key(&Self::key(name))
    }

    /// The archive and entry providing a file name
    ///
    /// Only the final segment of `name` is used and case is ignored.
    pub fn get(&self, name: &str) -> Option<(&PakArchive, &Entry)> {
        let (index, entry) = self.files.get(&Self::key(name))?;
        Some((&self.archives[*index], entry))
    }

    /// Extract and decode the file providing this name
    pub fn load(&self, name: &str) -> Result<Vec<u8>> {
        let (archive, entry) = self
            .get(name)
            .ok_or_else(|| FileNotFoundError::Name(name.to_owned()))?;
        archive.extract(entry)
    }

    /// The indexed archives, in the order they were added
    pub fn archives(&self) -> &[PakArchive] {
        &self.archives
    }

    /// Iterate over every known file with the archive providing it
    pub fn iter(&self) -> impl Iterator<Item = (&PakArchive, &Entry)> {
        self.files
            .values()
            .map(|(index, entry)| (&self.archives[*index], entry))
    }

    /// Number of distinct file names
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether no file is known
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}
