//! This library handles reading from and creating **PAK/DIR** archives used by *Carmageddon TDR 2000*.
//!
//! # PAK/DIR Archive Format Documentation
//!
//! An archive is a pair of files sharing a stem: a `.pak` payload file holding the stored blobs
//! back to back, and a `.dir` index file mapping every name to the location of its blob. The payload
//! has no directory of its own; without the index its blobs cannot be told apart.
//!
//! ## Payload File
//!
//! Every blob starts on an offset that is a multiple of 4, gaps are filled with zero bytes. Blobs are
//! only ever appended. Replacing or deleting an entry changes the index and leaves the old bytes in
//! place.
//!
//! ### Blob Header
//!
//! | Offset (bytes) | Field        | Description                                                    |
//! |----------------|--------------|----------------------------------------------------------------|
//! | 0x0000         | Key          | 1 byte: random masking key, 1 to 254                           |
//! | 0x0001         | Signature    | 3 bytes: `zIG` or `RAW`, each byte XORed with the key          |
//! | 0x0004         | Size         | 4 bytes: little endian original size, each byte XORed with the |
//! |                |              | key rotated right by 3 bits                                    |
//!
//! - **zIG**: The payload following the header is a deflate stream of the original content. The
//!   engine writes headerless (raw) deflate streams; zlib wrapped streams are accepted when reading.
//! - **RAW**: The payload following the header is the original content.
//!
//! ## Index File
//!
//! The index is a byte trie over all names, dumped depth first in pre order. There is no header, no
//! count and no checksum. Each node is:
//!
//! | Offset (bytes) | Field        | Description                                                    |
//! |----------------|--------------|----------------------------------------------------------------|
//! | 0x0000         | Byte         | 1 byte: next byte of the name                                  |
//! | 0x0001         | Flags        | 1 byte: combination of the flags below                         |
//! | 0x0002         | Offset       | 4 bytes: only with `0x08`, offset of the blob header           |
//! | 0x0006         | Size         | 4 bytes: only with `0x08`, stored size of header and payload   |
//!
//! - `0x08`: The node ends a name and carries its offset and size.
//! - `0x40`: The first child of the node follows directly.
//! - `0x80`: Another node of the same level follows once this node's children are done.
//!
//! Siblings are sorted by byte value. An index cut short is read up to the last complete node.
//!
//! ## Additional Information
//!
//! - **File Extensions**: `.pak` and `.dir`
//! - **Endianness**: Little-endian for all multi-byte integers
//! - **Names**: lowercase ascii separated by forward slashes, see [`path::validate`]
//!

pub mod archive;
pub mod compression;
pub mod error;
pub mod path;
pub mod tree;
pub mod trie;
pub mod types;
pub mod vfs;
pub mod zig;

pub use archive::{
    DeleteTarget, EntryTable, ExtractOptions, PackFile, PackOptions, PakArchive, TargetKind,
};
pub use compression::CompressionMethod;
pub use types::{Entry, EntryMetadata};
pub use vfs::Vfs;
