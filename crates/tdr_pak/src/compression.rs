//! Payload compression and decompression handling.

use std::fmt;
use std::io::{self, Read, Write};

use flate2::{
    read::{DeflateDecoder, ZlibDecoder},
    write::{DeflateEncoder, ZlibEncoder},
    Compression,
};
use tracing::instrument;

/// Identifies how the payload following a container header is stored
///
/// Both compressing methods produce a `zIG` container. The engine itself writes headerless deflate
/// streams, while some community tools only understand the zlib framing, so both can be written
/// and both are accepted when reading.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum CompressionMethod {
    /// Stores the data as it is inside a `RAW` container
    None,

    /// Compress the data as a raw deflate stream
    #[default]
    Deflate,

    /// Compress the data as a zlib wrapped deflate stream
    Zlib,
}

impl CompressionMethod {
    /// Whether this method produces a compressed (`zIG`) container
    pub const fn is_compressed(self) -> bool {
        !matches!(self, CompressionMethod::None)
    }
}

impl From<bool> for CompressionMethod {
    fn from(compress: bool) -> Self {
        if compress {
            CompressionMethod::Deflate
        } else {
            CompressionMethod::None
        }
    }
}

impl fmt::Display for CompressionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompressionMethod::None => write!(f, "none"),
            CompressionMethod::Deflate => write!(f, "deflate"),
            CompressionMethod::Zlib => write!(f, "zlib"),
        }
    }
}

pub(crate) enum ZigBlockWriter<W: Write> {
    Raw(W, usize),
    Deflate(Box<DeflateEncoder<W>>),
    Zlib(Box<ZlibEncoder<W>>),
}

impl<W: Write> ZigBlockWriter<W> {
    #[tracing::instrument(skip(writer))]
    pub fn new(writer: W, compression: CompressionMethod) -> Self {
        match compression {
            CompressionMethod::None => ZigBlockWriter::Raw(writer, 0),
            CompressionMethod::Deflate => ZigBlockWriter::Deflate(Box::new(DeflateEncoder::new(
                writer,
                Compression::best(),
            ))),
            CompressionMethod::Zlib => {
                ZigBlockWriter::Zlib(Box::new(ZlibEncoder::new(writer, Compression::best())))
            }
        }
    }

    #[instrument(skip(self), err)]
    pub fn finalize(self) -> io::Result<W> {
        match self {
            ZigBlockWriter::Raw(w, _) => Ok(w),
            ZigBlockWriter::Deflate(w) => w.finish(),
            ZigBlockWriter::Zlib(w) => w.finish(),
        }
    }

    pub fn total_in(&self) -> u64 {
        match self {
            ZigBlockWriter::Raw(_, c) => *c as u64,
            ZigBlockWriter::Deflate(w) => w.total_in(),
            ZigBlockWriter::Zlib(w) => w.total_in(),
        }
    }
}

impl<W: Write> Write for ZigBlockWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            ZigBlockWriter::Raw(w, c) => {
                let written = w.write(buf)?;
                *c += written;
                Ok(written)
            }
            ZigBlockWriter::Deflate(w) => w.write(buf),
            ZigBlockWriter::Zlib(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            ZigBlockWriter::Raw(w, _) => w.flush(),
            ZigBlockWriter::Deflate(w) => w.flush(),
            ZigBlockWriter::Zlib(w) => w.flush(),
        }
    }
}

/// Framing of a compressed `zIG` payload
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum Framing {
    Raw,
    Zlib,
}

pub(crate) enum ZigBlockReader<R: Read> {
    Raw(DeflateDecoder<R>),
    Zlib(ZlibDecoder<R>),
}

impl<R: Read> ZigBlockReader<R> {
    pub fn new(reader: R, framing: Framing) -> Self {
        match framing {
            Framing::Raw => ZigBlockReader::Raw(DeflateDecoder::new(reader)),
            Framing::Zlib => ZigBlockReader::Zlib(ZlibDecoder::new(reader)),
        }
    }
}

impl<R: Read> Read for ZigBlockReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            ZigBlockReader::Raw(r) => r.read(buf),
            ZigBlockReader::Zlib(r) => r.read(buf),
        }
    }
}

/// Inflate a complete payload using the requested framing
pub(crate) fn inflate(payload: &[u8], framing: Framing, size_hint: usize) -> io::Result<Vec<u8>> {
    let mut output = Vec::with_capacity(size_hint);
    ZigBlockReader::new(payload, framing).read_to_end(&mut output)?;
    Ok(output)
}
