//! Reading and mutating PAK/DIR archive pairs
//!

use std::{
    fmt::{self, Debug},
    fs::{self, File, OpenOptions},
    io::{self, BufReader, Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

use bon::Builder;
use indexmap::IndexMap;
use tempfile::NamedTempFile;
use tracing::{debug, error, info, instrument, warn};

use crate::{
    compression::CompressionMethod,
    error::{Error, FileNotFoundError, Result},
    path, trie,
    types::{Entry, EntryMetadata},
    zig,
};

const ALIGNMENT: u64 = 4;

/// Options for how files are stored by [`PakArchive::pack`]
#[derive(Debug, Clone, Copy, Default, Builder)]
pub struct PackOptions {
    /// How every packed blob is stored
    #[builder(default)]
    pub compression: CompressionMethod,
}

/// Options for [`PakArchive::unpack`]
#[derive(Debug, Clone, Copy, Default, Builder)]
pub struct ExtractOptions {
    /// Write every entry directly into the target directory, dropping its folders
    #[builder(default)]
    pub flatten: bool,

    /// Replace files that already exist in the target directory
    #[builder(default)]
    pub overwrite: bool,

    /// Drop a leading folder named like the archive itself
    #[builder(default)]
    pub strip_archive_root: bool,
}

/// The in memory entry rows of an archive, keyed by name
///
/// Inserting a name that is already present replaces its row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryTable {
    entries: IndexMap<String, Entry>,
}

impl EntryTable {
    /// Insert or replace the row for `entry.name`, returning the replaced row
    pub fn insert(&mut self, entry: Entry) -> Option<Entry> {
        self.entries.insert(entry.name.clone(), entry)
    }

    /// Get a row by name
    pub fn get(&self, name: &str) -> Option<&Entry> {
        self.entries.get(name)
    }

    /// Get a row by name, failing when it does not exist
    pub fn by_name(&self, name: &str) -> Result<&Entry> {
        self.get(name)
            .ok_or_else(|| FileNotFoundError::Name(name.to_owned()).into())
    }

    /// Get a row by its position in the table
    pub fn by_index(&self, index: usize) -> Result<&Entry> {
        self.entries
            .get_index(index)
            .map(|(_, entry)| entry)
            .ok_or_else(|| FileNotFoundError::Index(index).into())
    }

    /// Whether a row with this name exists
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Remove a row by name
    pub fn remove(&mut self, name: &str) -> Option<Entry> {
        self.entries.shift_remove(name)
    }

    /// Keep only the rows matching the predicate
    pub fn retain(&mut self, mut keep: impl FnMut(&Entry) -> bool) {
        self.entries.retain(|_, entry| keep(entry));
    }

    /// Order the rows by name
    pub fn sort(&mut self) {
        self.entries.sort_keys();
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no rows
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over the rows in table order
    pub fn iter(&self) -> impl Iterator<Item = &Entry> {
        self.entries.values()
    }

    /// Iterate over the names in table order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Sum of the stored sizes of every row
    pub fn total_size(&self) -> u64 {
        self.iter().map(|e| u64::from(e.size)).sum()
    }

    /// Serialize the table into index bytes
    pub fn to_index_bytes(&self) -> Result<Vec<u8>> {
        trie::serialize(self.iter())
    }
}

impl FromIterator<Entry> for EntryTable {
    fn from_iter<T: IntoIterator<Item = Entry>>(iter: T) -> Self {
        let mut table = EntryTable::default();
        for entry in iter {
            table.insert(entry);
        }
        table
    }
}

impl IntoIterator for EntryTable {
    type Item = Entry;
    type IntoIter = indexmap::map::IntoValues<String, Entry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_values()
    }
}

impl<'a> IntoIterator for &'a EntryTable {
    type Item = &'a Entry;
    type IntoIter = indexmap::map::Values<'a, String, Entry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.values()
    }
}

/// Where the content of a packed file comes from
#[derive(Clone, PartialEq, Eq)]
pub enum PackSource {
    /// Content already in memory
    Bytes(Vec<u8>),
    /// Content read from disk when the file is packed
    Path(PathBuf),
}

impl PackSource {
    fn read(&self) -> io::Result<Vec<u8>> {
        match self {
            PackSource::Bytes(data) => Ok(data.clone()),
            PackSource::Path(path) => fs::read(path),
        }
    }
}

impl Debug for PackSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackSource::Bytes(data) => write!(f, "Bytes({} bytes)", data.len()),
            PackSource::Path(path) => write!(f, "Path({})", path.display()),
        }
    }
}

/// A file to be stored under `name`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackFile {
    /// Target name inside the archive
    pub name: String,
    /// The content to store
    pub source: PackSource,
}

impl PackFile {
    /// Store in memory content under `name`
    pub fn from_bytes(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            source: PackSource::Bytes(data.into()),
        }
    }

    /// Store the file at `path` under `name`
    pub fn from_path(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            source: PackSource::Path(path.into()),
        }
    }
}

/// What to do with an incoming file whose name is already in the archive
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Conflict {
    /// Leave the stored entry alone and drop the incoming file
    KeepExisting,
    /// Replace the stored entry with the incoming file
    Overwrite,
}

/// Apply a decision to every incoming file whose name already exists
///
/// `decide` is only called for clashing names. The returned list is what [`PakArchive::pack`]
/// expects: every remaining file is meant to be written.
pub fn resolve_conflicts(
    existing: &EntryTable,
    files: impl IntoIterator<Item = PackFile>,
    mut decide: impl FnMut(&PackFile) -> Conflict,
) -> Vec<PackFile> {
    files
        .into_iter()
        .filter(|file| !existing.contains(&file.name) || decide(file) == Conflict::Overwrite)
        .collect()
}

/// Which rows a [`DeleteTarget`] removes
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TargetKind {
    /// The row with exactly this name
    File,
    /// Every row below this folder
    Subtree,
}

/// A name to remove from the index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteTarget {
    /// A file name or a folder path
    pub name: String,
    /// How `name` is matched
    pub kind: TargetKind,
}

impl DeleteTarget {
    /// Remove the entry with exactly this name
    pub fn file(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: TargetKind::File,
        }
    }

    /// Remove every entry inside this folder
    pub fn subtree(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: TargetKind::Subtree,
        }
    }

    fn apply(&self, table: &mut EntryTable) {
        match self.kind {
            TargetKind::File => {
                table.remove(&self.name);
            }
            TargetKind::Subtree => {
                let prefix = format!("{}/", self.name.trim_end_matches('/'));
                table.retain(|entry| !entry.name.starts_with(&prefix));
            }
        }
    }
}

/// A PAK payload file together with its DIR index
///
/// The archive keeps no state besides the two paths. Every operation reads the index from disk,
/// so changes made by other tools between calls are picked up. Mutations are not safe to run
/// concurrently against the same pair.
///
/// ```no_run
/// # fn doit() -> tdr_pak::error::Result<()> {
/// use tdr_pak::archive::{PackFile, PackOptions, PakArchive};
///
/// let archive = PakArchive::new("data/cars.pak");
/// archive.pack(
///     [PackFile::from_bytes("cars/eagle.txt", b"EAGLE R".to_vec())],
///     &PackOptions::default(),
/// )?;
///
/// for entry in archive.entries().iter() {
///     let data = archive.extract(entry)?;
///     println!("{}: {} bytes", entry.name, data.len());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PakArchive {
    pak_path: PathBuf,
    dir_path: PathBuf,
}

impl PakArchive {
    /// Refer to the archive at `pak`, with the index next to it using the `dir` extension
    pub fn new(pak: impl Into<PathBuf>) -> Self {
        let pak_path = pak.into();
        let dir_path = pak_path.with_extension("dir");
        Self { pak_path, dir_path }
    }

    /// Refer to an archive whose index does not follow the naming convention
    pub fn with_index(pak: impl Into<PathBuf>, dir: impl Into<PathBuf>) -> Self {
        Self {
            pak_path: pak.into(),
            dir_path: dir.into(),
        }
    }

    /// Create an empty archive, failing if either file already exists
    #[instrument(skip(pak), fields(pak = %pak.as_ref().display()), err)]
    pub fn create(pak: impl AsRef<Path>) -> Result<Self> {
        let archive = Self::new(pak.as_ref());
        File::create_new(&archive.pak_path)?;
        File::create_new(&archive.dir_path)?;
        info!("created empty archive");
        Ok(archive)
    }

    /// Path of the payload file
    pub fn pak_path(&self) -> &Path {
        &self.pak_path
    }

    /// Path of the index file
    pub fn dir_path(&self) -> &Path {
        &self.dir_path
    }

    /// Whether both files of the pair exist
    pub fn exists(&self) -> bool {
        self.pak_path.is_file() && self.dir_path.is_file()
    }

    /// Read the current entries from the index
    ///
    /// A missing or unreadable index is logged and reads as an empty table.
    pub fn entries(&self) -> EntryTable {
        self.read_index().unwrap_or_else(|e| {
            error!("unable to read index {}: {e}", self.dir_path.display());
            EntryTable::default()
        })
    }

    fn read_index(&self) -> Result<EntryTable> {
        let file = match File::open(&self.dir_path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!("index {} does not exist", self.dir_path.display());
                return Ok(EntryTable::default());
            }
            Err(e) => return Err(e.into()),
        };

        let table: EntryTable = trie::read(BufReader::new(file))?.into_iter().collect();
        debug!(count = table.len(), "parsed index {}", self.dir_path.display());
        Ok(table)
    }

    fn write_index(&self, table: &EntryTable) -> Result<()> {
        let data = table.to_index_bytes()?;
        let parent = match self.dir_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut temp = NamedTempFile::new_in(parent)?;
        temp.write_all(&data)?;
        temp.as_file().sync_all()?;
        temp.persist(&self.dir_path).map_err(|e| e.error)?;

        debug!(count = table.len(), size = data.len(), "wrote index");
        Ok(())
    }

    /// Append files to the payload and register them in the index
    ///
    /// Files are written in order, each at the next 4 byte aligned offset. A name that is already
    /// present is replaced; the bytes of the old entry stay in the payload file. The index is
    /// rewritten once at the end, also when the batch stops early: if a source cannot be read, the
    /// files packed before it stay committed and [`Error::SourceUnreadable`] is returned. The payload
    /// is synced before the index is rewritten, so the index never points past the written bytes.
    #[instrument(skip_all, fields(pak = %self.pak_path.display()), err)]
    pub fn pack(
        &self,
        files: impl IntoIterator<Item = PackFile>,
        options: &PackOptions,
    ) -> Result<EntryTable> {
        let mut table = self.read_index()?;

        let mut payload = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.pak_path)?;
        let position = payload.metadata()?.len();
        let outcome = append_files(&mut payload, position, &mut table, files, options.compression);
        payload.sync_data()?;

        table.sort();
        self.write_index(&table)?;
        let packed = outcome?;

        info!(packed, total = table.len(), "packed files");
        Ok(table)
    }

    /// Read and decode the blob of an entry
    pub fn extract(&self, entry: &Entry) -> Result<Vec<u8>> {
        let mut payload = File::open(&self.pak_path)?;
        read_entry(&mut payload, entry)
    }

    /// Look up an entry in the index and extract it
    pub fn extract_by_name(&self, name: &str) -> Result<Vec<u8>> {
        let table = self.read_index()?;
        self.extract(table.by_name(name)?)
    }

    /// Extract every entry below `target`, returning how many files were written
    ///
    /// Names are turned into relative paths with [`path::safe_relative_path`] before anything is
    /// written. Existing files are skipped unless [`ExtractOptions::overwrite`] is set.
    #[instrument(skip(self, target), fields(pak = %self.pak_path.display(), target = %target.as_ref().display()), err)]
    pub fn unpack(&self, target: impl AsRef<Path>, options: &ExtractOptions) -> Result<usize> {
        let target = target.as_ref();
        let table = self.read_index()?;
        let mut payload = BufReader::new(File::open(&self.pak_path)?);

        let mut written = 0;
        for entry in &table {
            let name = if options.strip_archive_root {
                path::normalize_archive_path(&entry.name, &self.pak_path)
            } else {
                entry.name.clone()
            };
            let Some(relative) = path::safe_relative_path(&name, options.flatten) else {
                warn!("skipping {:?}, nothing left of its name", entry.name);
                continue;
            };
            let destination = target.join(relative);

            if let Some(parent) = destination.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut file = if options.overwrite {
                File::create(&destination)?
            } else {
                match File::create_new(&destination) {
                    Ok(file) => file,
                    Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                        warn!("skipping existing file {}", destination.display());
                        continue;
                    }
                    Err(e) => return Err(e.into()),
                }
            };

            file.write_all(&read_entry(&mut payload, entry)?)?;
            debug!("extracted {} to {}", entry.name, destination.display());
            written += 1;
        }

        info!(written, total = table.len(), "unpacked archive");
        Ok(written)
    }

    /// Remove entries from the index
    ///
    /// The payload file is never touched, so it does not shrink. Targets that match nothing are
    /// ignored.
    #[instrument(skip(self), fields(pak = %self.pak_path.display()), err)]
    pub fn delete(&self, targets: &[DeleteTarget]) -> Result<EntryTable> {
        let mut table = self.read_index()?;
        let before = table.len();

        for target in targets {
            target.apply(&mut table);
        }

        self.write_index(&table)?;
        info!(
            removed = before - table.len(),
            remaining = table.len(),
            "deleted entries, payload space is not reclaimed"
        );
        Ok(table)
    }

    /// Read the original size and key of an entry without decoding it
    ///
    /// Failures are logged and yield `None`.
    pub fn metadata(&self, entry: &Entry) -> Option<EntryMetadata> {
        match File::open(&self.pak_path) {
            Ok(mut payload) => zig::peek_metadata(&mut payload, u64::from(entry.offset)),
            Err(e) => {
                error!("unable to open {}: {e}", self.pak_path.display());
                None
            }
        }
    }
}

/// Write every file to `payload`, which ends at `position`, returning how many were written
///
/// Blobs go straight to the writer and an entry is only added to `table` once its blob is fully
/// written.
fn append_files<W: Write>(
    payload: &mut W,
    mut position: u64,
    table: &mut EntryTable,
    files: impl IntoIterator<Item = PackFile>,
    compression: CompressionMethod,
) -> Result<usize> {
    let mut packed = 0;

    for file in files {
        if file.name.is_empty() {
            warn!("skipping file without a target name");
            continue;
        }

        let data = file
            .source
            .read()
            .map_err(|source| Error::SourceUnreadable {
                name: file.name.clone(),
                source,
            })?;
        let blob = zig::encode(&data, compression)?;

        let padding = (ALIGNMENT - position % ALIGNMENT) % ALIGNMENT;
        let offset = position + padding;
        let entry_offset = u32::try_from(offset).map_err(|_| Error::OffsetOverflow(offset))?;
        let size = u32::try_from(blob.len()).map_err(|_| Error::EntryTooLarge(blob.len()))?;

        payload.write_all(&[0u8; ALIGNMENT as usize][..padding as usize])?;
        payload.write_all(&blob)?;
        position = offset + u64::from(size);

        debug!(name = %file.name, offset, size, padding, "packed entry");
        if let Some(old) = table.insert(Entry::new(file.name, entry_offset, size)) {
            debug!("superseded entry at {:#X}", old.offset);
        }
        packed += 1;
    }

    Ok(packed)
}

/// Read the stored blob of an entry and decode it
///
/// The read is bounded by the payload, so a corrupt size fails without allocating for it.
fn read_entry<R: Read + Seek>(reader: &mut R, entry: &Entry) -> Result<Vec<u8>> {
    reader.seek(SeekFrom::Start(u64::from(entry.offset)))?;
    let mut blob = Vec::new();
    reader
        .by_ref()
        .take(u64::from(entry.size))
        .read_to_end(&mut blob)?;
    if blob.len() != entry.size as usize {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!(
                "{} needs {} bytes at {:#X}, payload holds {}",
                entry.name,
                entry.size,
                entry.offset,
                blob.len()
            ),
        )
        .into());
    }
    Ok(zig::decode(&blob).into_owned())
}
