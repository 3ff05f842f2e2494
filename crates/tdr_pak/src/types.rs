//! Base types for the structure of PAK and DIR files.

use std::fmt;

use binrw::{BinRead, BinWrite};

/// Size in bytes of the header in front of every stored blob
pub const HEADER_SIZE: usize = 8;

/// Signature of a compressed container
pub const ZIG_SIGNATURE: [u8; 3] = *b"zIG";

/// Signature of an uncompressed container
pub const RAW_SIGNATURE: [u8; 3] = *b"RAW";

/// Rotate a byte three bits to the right, used to derive the size key from the header key
pub const fn rotate_right_3(value: u8) -> u8 {
    value.rotate_right(3)
}

/// Rotate a byte three bits to the left, the inverse of [`rotate_right_3`]
pub const fn rotate_left_3(value: u8) -> u8 {
    value.rotate_left(3)
}

/// Container signature recovered from a header
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Signature {
    /// `zIG`, the payload is deflate compressed
    Zig,
    /// `RAW`, the payload is stored verbatim
    Raw,
    /// Anything else, the blob is not a container
    Unknown([u8; 3]),
}

impl Signature {
    /// The three plain signature bytes
    pub const fn bytes(self) -> [u8; 3] {
        match self {
            Signature::Zig => ZIG_SIGNATURE,
            Signature::Raw => RAW_SIGNATURE,
            Signature::Unknown(bytes) => bytes,
        }
    }
}

impl From<[u8; 3]> for Signature {
    fn from(value: [u8; 3]) -> Self {
        match value {
            ZIG_SIGNATURE => Signature::Zig,
            RAW_SIGNATURE => Signature::Raw,
            other => Signature::Unknown(other),
        }
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.bytes()))
    }
}

/// Container header
///
/// Every blob in the payload file starts with these 8 bytes. The signature is masked with the key
/// byte and every byte of the little endian original size is masked with the key rotated right by
/// three bits.
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq, Eq)]
#[brw(little)]
pub struct ZigHeader {
    /// The random masking key, between 1 and 254 when written by this library
    pub key: u8,

    /// The signature, each byte XORed with [`ZigHeader::key`]
    pub masked_signature: [u8; 3],

    /// The little endian original size, each byte XORed with [`ZigHeader::meta_key`]
    pub masked_size: [u8; 4],
}

impl ZigHeader {
    /// Build a header masking the signature and size with `key`
    pub fn new(key: u8, signature: Signature, original_size: u32) -> Self {
        let meta_key = rotate_right_3(key);
        Self {
            key,
            masked_signature: signature.bytes().map(|b| b ^ key),
            masked_size: original_size.to_le_bytes().map(|b| b ^ meta_key),
        }
    }

    /// The key used to mask the size field
    pub const fn meta_key(&self) -> u8 {
        rotate_right_3(self.key)
    }

    /// The unmasked container signature
    pub fn signature(&self) -> Signature {
        Signature::from(self.masked_signature.map(|b| b ^ self.key))
    }

    /// The unmasked size of the content before compression
    pub fn original_size(&self) -> u32 {
        let meta_key = self.meta_key();
        u32::from_le_bytes(self.masked_size.map(|b| b ^ meta_key))
    }
}

/// Location of an entry inside the payload file, as stored in the index
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq, Eq)]
#[brw(little)]
pub struct NodeMeta {
    /// The offset of the entry header from the start of the payload file
    pub offset: u32,

    /// The stored size of header and payload
    pub size: u32,
}

/// An entry of the archive
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Entry {
    /// Slash separated name, unique inside an archive
    ///
    /// # Warnings
    ///
    /// It is dangerous to use this name directly when extracting an archive.
    /// It may contain an absolute path (`/etc/shadow`), or break out of the
    /// current directory (`../runtime`). Use [`crate::path::safe_relative_path`]
    /// before writing anywhere.
    pub name: String,

    /// Raw name bytes as stored in the index, when they are not valid UTF-8
    ///
    /// Such names are decoded with one char per byte. The bytes are kept so that rewriting the
    /// index stores the name unchanged.
    pub name_raw: Option<Box<[u8]>>,

    /// The offset of the entry header from the start of the payload file
    pub offset: u32,

    /// The stored size of header and payload
    pub size: u32,
}

impl Entry {
    /// Create an entry
    pub fn new(name: impl Into<String>, offset: u32, size: u32) -> Self {
        Self {
            name: name.into(),
            name_raw: None,
            offset,
            size,
        }
    }

    /// Create an entry from name bytes read from an index
    ///
    /// The engine writes single byte code pages, so bytes that are not UTF-8 each become their
    /// own char.
    pub fn from_raw_name(raw: &[u8], offset: u32, size: u32) -> Self {
        match std::str::from_utf8(raw) {
            Ok(name) => Self::new(name, offset, size),
            Err(_) => Self {
                name: raw.iter().map(|&b| char::from(b)).collect(),
                name_raw: Some(raw.into()),
                offset,
                size,
            },
        }
    }

    /// The bytes to store for this name in an index
    ///
    /// These are the raw bytes the entry was read with, unless [`Entry::name`] has been changed
    /// since.
    pub fn name_bytes(&self) -> &[u8] {
        match &self.name_raw {
            Some(raw) if raw.iter().map(|&b| char::from(b)).eq(self.name.chars()) => raw,
            _ => self.name.as_bytes(),
        }
    }

    /// The index record for this entry
    pub const fn meta(&self) -> NodeMeta {
        NodeMeta {
            offset: self.offset,
            size: self.size,
        }
    }

    /// The final segment of the name
    pub fn file_name(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }
}

/// Header information read without decoding the payload
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct EntryMetadata {
    /// The size of the content before compression
    pub original_size: u32,

    /// The masking key of the header
    pub key: u8,
}

impl EntryMetadata {
    /// Stored size relative to the original size, in percent
    pub fn ratio(&self, stored_size: u32) -> Option<f64> {
        (self.original_size > 0)
            .then(|| f64::from(stored_size) / f64::from(self.original_size) * 100.0)
    }
}

impl From<ZigHeader> for EntryMetadata {
    fn from(header: ZigHeader) -> Self {
        Self {
            original_size: header.original_size(),
            key: header.key,
        }
    }
}
