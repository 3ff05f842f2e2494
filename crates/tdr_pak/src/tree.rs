//! Folder view over the flat entry list.

use std::collections::BTreeMap;
use std::fmt;

use crate::types::Entry;

/// A virtual folder built from the `/` separated segments of entry names
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Folder {
    /// The final segment of this folder's path, empty for the root
    pub name: String,
    /// The full path of this folder inside the archive, empty for the root
    pub path: String,
    /// Sub folders by name
    pub folders: BTreeMap<String, Folder>,
    /// Entries directly inside this folder by their final name segment
    pub files: BTreeMap<String, Entry>,
}

impl Folder {
    /// Group entries into folders
    ///
    /// ```
    /// use tdr_pak::{tree::Folder, Entry};
    ///
    /// let root = Folder::from_entries([
    ///     Entry::new("cars/eagle.txt", 0, 12),
    ///     Entry::new("readme.txt", 12, 20),
    /// ]);
    /// assert_eq!(root.files.len(), 1);
    /// assert_eq!(root.folders["cars"].files["eagle.txt"].offset, 0);
    /// ```
    pub fn from_entries(entries: impl IntoIterator<Item = Entry>) -> Self {
        let mut root = Folder::default();
        for entry in entries {
            root.insert(entry);
        }
        root
    }

    fn insert(&mut self, entry: Entry) {
        let mut segments: Vec<&str> = entry.name.split('/').collect();
        let file_name = segments.pop().unwrap_or_default().to_owned();

        let mut folder = self;
        for segment in segments {
            let path = if folder.path.is_empty() {
                segment.to_owned()
            } else {
                format!("{}/{}", folder.path, segment)
            };
            folder = folder
                .folders
                .entry(segment.to_owned())
                .or_insert_with(|| Folder {
                    name: segment.to_owned(),
                    path,
                    ..Default::default()
                });
        }
        folder.files.insert(file_name, entry);
    }

    /// Look up a sub folder by its path relative to this folder
    pub fn folder(&self, path: &str) -> Option<&Folder> {
        path.split('/')
            .filter(|s| !s.is_empty())
            .try_fold(self, |folder, segment| folder.folders.get(segment))
    }

    /// Whether the folder contains neither files nor folders
    pub fn is_empty(&self) -> bool {
        self.folders.is_empty() && self.files.is_empty()
    }

    /// Every entry in this folder and below, folders first
    pub fn entries(&self) -> Vec<&Entry> {
        let mut out = Vec::new();
        self.collect(&mut out);
        out
    }

    fn collect<'a>(&'a self, out: &mut Vec<&'a Entry>) {
        for folder in self.folders.values() {
            folder.collect(out);
        }
        out.extend(self.files.values());
    }

    fn render(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let indent = "  ".repeat(depth);
        for folder in self.folders.values() {
            writeln!(f, "{indent}[DIR] {}", folder.name)?;
            folder.render(f, depth + 1)?;
        }
        for (name, entry) in &self.files {
            writeln!(f, "{indent}[FILE] {name} ({} bytes)", entry.size)?;
        }
        Ok(())
    }
}

impl fmt::Display for Folder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.render(f, 0)
    }
}
