//! Serialization of the name index stored in DIR files.
//!
//! The index is a depth first, pre order dump of a byte trie over all entry names. Each node is a
//! name byte followed by a flags byte and, for nodes that end a name, the [`NodeMeta`] of the
//! entry. There is no header and no length anywhere; the three flags alone describe the shape.

use std::collections::BTreeMap;
use std::io::{Cursor, Read};

use binrw::{BinRead, BinWrite};
use byteorder::{ReadBytesExt, WriteBytesExt};
use tracing::{debug, warn};

use crate::{error::Result, types::Entry, types::NodeMeta};

/// The node ends a name and is followed by its [`NodeMeta`]
pub const FLAG_FILE: u8 = 0x08;

/// The node is followed by its first child
pub const FLAG_CHILDREN: u8 = 0x40;

/// Another node follows at the same level once this node's subtree is done
pub const FLAG_SIBLING: u8 = 0x80;

#[derive(Debug, Default)]
struct TrieNode {
    entry: Option<NodeMeta>,
    children: BTreeMap<u8, TrieNode>,
}

impl TrieNode {
    fn insert(&mut self, name: &[u8], meta: NodeMeta) {
        let mut node = self;
        for byte in name {
            node = node.children.entry(*byte).or_default();
        }
        node.entry = Some(meta);
    }

    fn write_children(&self, out: &mut Cursor<Vec<u8>>) -> Result<()> {
        let last = self.children.len().saturating_sub(1);
        for (i, (byte, child)) in self.children.iter().enumerate() {
            let mut flags = 0;
            if child.entry.is_some() {
                flags |= FLAG_FILE;
            }
            if !child.children.is_empty() {
                flags |= FLAG_CHILDREN;
            }
            if i < last {
                flags |= FLAG_SIBLING;
            }

            out.write_u8(*byte)?;
            out.write_u8(flags)?;
            if let Some(meta) = child.entry {
                meta.write(out)?;
            }
            child.write_children(out)?;
        }
        Ok(())
    }
}

/// Serialize entries into index bytes
///
/// Entries are deduplicated by name with the last one winning. Siblings are written in byte order,
/// so the output only depends on the set of entries and not on their order. Entries with an empty
/// name cannot be represented and are skipped.
pub fn serialize<'a>(entries: impl IntoIterator<Item = &'a Entry>) -> Result<Vec<u8>> {
    let mut root = TrieNode::default();
    let mut count = 0usize;
    for entry in entries {
        let name = entry.name_bytes();
        if name.is_empty() {
            warn!("skipping entry without a name at {:#X}", entry.offset);
            continue;
        }
        root.insert(name, entry.meta());
        count += 1;
    }

    let mut out = Cursor::new(Vec::new());
    root.write_children(&mut out)?;
    debug!(count, size = out.get_ref().len(), "serialized index");

    Ok(out.into_inner())
}

/// Reader for index bytes
///
/// ```
/// use tdr_pak::trie::TrieParser;
///
/// #[rustfmt::skip]
/// let index = [
///     b'a', 0x08, 0x00, 0x00, 0x00, 0x00, 0x10, 0x00, 0x00, 0x00,
/// ];
///
/// let entries = TrieParser::new(&index).parse();
/// assert_eq!(entries.len(), 1);
/// assert_eq!(entries[0].name, "a");
/// assert_eq!(entries[0].size, 16);
/// ```
pub struct TrieParser<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> TrieParser<'a> {
    /// Create a parser positioned at the start of `data`
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(data),
        }
    }

    /// Current position in the buffer
    pub fn position(&self) -> u64 {
        self.cursor.position()
    }

    fn remaining(&self) -> usize {
        let data = *self.cursor.get_ref();
        data.len().saturating_sub(self.cursor.position() as usize)
    }

    fn read_node(&mut self) -> Option<(u8, u8)> {
        let byte = self.cursor.read_u8().ok()?;
        let flags = self.cursor.read_u8().ok()?;
        Some((byte, flags))
    }

    fn read_meta(&mut self) -> Option<NodeMeta> {
        NodeMeta::read(&mut self.cursor).ok()
    }

    /// Walk the whole trie and return every entry it names
    ///
    /// A buffer that ends in the middle of a node stops the walk; everything read up to that point
    /// is returned. Bytes after the last top level node are ignored.
    pub fn parse(mut self) -> Vec<Entry> {
        let mut entries = Vec::new();
        if self.remaining() == 0 {
            return entries;
        }

        let mut name: Vec<u8> = Vec::new();
        // prefix length of every level still expecting a node, innermost last
        let mut pending = vec![0usize];

        while let Some(depth) = pending.pop() {
            let Some((byte, flags)) = self.read_node() else {
                warn!(position = self.position(), "index ends in the middle of a node");
                break;
            };
            name.truncate(depth);
            name.push(byte);

            if flags & FLAG_FILE != 0 {
                let Some(meta) = self.read_meta() else {
                    warn!(position = self.position(), "index ends in the middle of an entry");
                    break;
                };
                entries.push(Entry::from_raw_name(&name, meta.offset, meta.size));
            }

            if flags & FLAG_SIBLING != 0 {
                pending.push(depth);
            }
            if flags & FLAG_CHILDREN != 0 {
                pending.push(depth + 1);
            }
        }

        if self.remaining() > 0 {
            debug!(trailing = self.remaining(), "ignoring bytes after the index");
        }

        entries
    }
}

/// Parse index bytes into entries
pub fn parse(data: &[u8]) -> Vec<Entry> {
    TrieParser::new(data).parse()
}

/// Parse an index from any reader
pub fn read<R: Read>(mut reader: R) -> Result<Vec<Entry>> {
    let mut data = Vec::new();
    reader.read_to_end(&mut data)?;
    Ok(parse(&data))
}
