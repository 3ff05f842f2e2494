//! Encoding and decoding of single blobs stored in the payload file.
//!
//! A blob is an 8 byte [`ZigHeader`] followed by the payload, which is either the original content
//! (`RAW`) or a deflate stream of it (`zIG`).

use std::borrow::Cow;
use std::io::{Cursor, Read, Seek, SeekFrom, Write};

use binrw::{BinRead, BinWrite};
use rand::Rng;
use tracing::{debug, error, warn};

use crate::{
    compression::{inflate, CompressionMethod, Framing, ZigBlockWriter},
    error::{Error, Result},
    types::{EntryMetadata, Signature, ZigHeader, HEADER_SIZE},
};

/// Pick a random masking key in `1..=254`
pub fn random_key() -> u8 {
    rand::thread_rng().gen_range(1..=254)
}

/// Wrap `data` into a container with a random key
///
/// ```
/// # fn doit() -> tdr_pak::error::Result<()> {
/// use tdr_pak::{zig, CompressionMethod};
///
/// let blob = zig::encode(b"HELLO WORLD", CompressionMethod::Deflate)?;
/// assert_eq!(&*zig::decode(&blob), b"HELLO WORLD");
/// # Ok(())
/// # }
/// # doit().unwrap();
/// ```
pub fn encode(data: &[u8], compression: CompressionMethod) -> Result<Vec<u8>> {
    encode_with_key(data, compression, random_key())
}

/// Wrap `data` into a container masked with the given key
pub fn encode_with_key(data: &[u8], compression: CompressionMethod, key: u8) -> Result<Vec<u8>> {
    let original_size = u32::try_from(data.len()).map_err(|_| Error::EntryTooLarge(data.len()))?;
    let signature = if compression.is_compressed() {
        Signature::Zig
    } else {
        Signature::Raw
    };

    let mut out = Cursor::new(Vec::with_capacity(HEADER_SIZE + data.len() / 2));
    ZigHeader::new(key, signature, original_size).write(&mut out)?;

    let mut block = ZigBlockWriter::new(out.into_inner(), compression);
    block.write_all(data)?;
    debug_assert_eq!(block.total_in(), u64::from(original_size));
    let blob = block.finalize()?;

    debug!(
        key,
        original_size,
        stored_size = blob.len(),
        %compression,
        "encoded blob"
    );

    Ok(blob)
}

/// Recover the original content of a blob
///
/// Decoding never fails. Blobs shorter than a header, blobs with an unknown signature and `zIG`
/// blobs whose payload does not inflate are returned unchanged. A `RAW` blob is returned without its
/// header.
pub fn decode(blob: &[u8]) -> Cow<'_, [u8]> {
    let Some(header) = read_header(blob) else {
        return Cow::Borrowed(blob);
    };
    let payload = &blob[HEADER_SIZE..];

    match header.signature() {
        Signature::Raw => Cow::Borrowed(payload),
        Signature::Zig => {
            let size_hint = header.original_size() as usize;
            match inflate(payload, Framing::Raw, size_hint) {
                Ok(data) => Cow::Owned(check_size(data, &header)),
                Err(e) => {
                    warn!("zIG decompression failed (raw deflate): {e}");
                    match inflate(payload, Framing::Zlib, size_hint) {
                        Ok(data) => Cow::Owned(check_size(data, &header)),
                        Err(e) => {
                            error!("zIG decompression failed (zlib): {e}");
                            Cow::Borrowed(blob)
                        }
                    }
                }
            }
        }
        Signature::Unknown(sig) => {
            debug!(?sig, "blob is not a container, returning it unchanged");
            Cow::Borrowed(blob)
        }
    }
}

/// Read the header of a blob without decoding the payload
pub fn read_header(blob: &[u8]) -> Option<ZigHeader> {
    if blob.len() < HEADER_SIZE {
        return None;
    }
    ZigHeader::read(&mut Cursor::new(&blob[..HEADER_SIZE])).ok()
}

/// Read the header stored at `offset` and return the original size and key
///
/// Any failure, including a header cut short by the end of the file, is logged and yields `None`.
pub fn peek_metadata<R: Read + Seek>(reader: &mut R, offset: u64) -> Option<EntryMetadata> {
    let mut header = [0u8; HEADER_SIZE];
    let read = reader
        .seek(SeekFrom::Start(offset))
        .and_then(|_| read_up_to(reader, &mut header));

    match read {
        Ok(HEADER_SIZE) => read_header(&header).map(EntryMetadata::from),
        Ok(n) => {
            debug!(offset, available = n, "not enough bytes for a header");
            None
        }
        Err(e) => {
            error!("failed to read zIG metadata at {offset:#X}: {e}");
            None
        }
    }
}

fn read_up_to<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

fn check_size(data: Vec<u8>, header: &ZigHeader) -> Vec<u8> {
    if data.len() != header.original_size() as usize {
        warn!(
            expected = header.original_size(),
            actual = data.len(),
            "decoded size does not match header"
        );
    }
    data
}

#[cfg(test)]
mod test {
    use std::io::{Cursor, Write};

    use flate2::{write::ZlibEncoder, Compression};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use proptest::test_runner::TestCaseError;
    use tracing_test::traced_test;

    use crate::compression::CompressionMethod;
    use crate::error::Result;
    use crate::types::{Signature, ZigHeader};
    use crate::zig::{decode, encode, encode_with_key, peek_metadata, read_header};

    #[test]
    fn hello_world_round_trip() -> Result<()> {
        let blob = encode(b"HELLO WORLD", CompressionMethod::Deflate)?;
        assert_eq!(&*decode(&blob), b"HELLO WORLD");
        Ok(())
    }

    #[test]
    fn header_layout() -> Result<()> {
        let blob = encode_with_key(b"HELLO WORLD", CompressionMethod::Deflate, 0x2A)?;

        #[rustfmt::skip]
        let expected_header = [
            0x2A,
            0x50, 0x63, 0x6D,
            0x4E, 0x45, 0x45, 0x45,
        ];
        assert_eq!(&blob[..8], &expected_header);

        Ok(())
    }

    #[test]
    fn raw_container_keeps_payload_verbatim() -> Result<()> {
        let blob = encode_with_key(b"Hello World", CompressionMethod::None, 0x01)?;

        #[rustfmt::skip]
        let expected = [
            0x01,
            0x53, 0x40, 0x56,
            0x2B, 0x20, 0x20, 0x20,
            0x48, 0x65, 0x6C, 0x6C, 0x6F, 0x20, 0x57, 0x6F, 0x72, 0x6C, 0x64,
        ];
        assert_eq!(blob, expected);
        assert_eq!(&*decode(&blob), b"Hello World");

        Ok(())
    }

    #[test]
    fn keys_stay_in_range() -> Result<()> {
        for _ in 0..512 {
            let blob = encode(b"", CompressionMethod::None)?;
            assert!((1..=254).contains(&blob[0]));
        }
        Ok(())
    }

    #[test]
    fn short_blob_is_unchanged() {
        let blob = [0x01, 0x02, 0x03];
        assert_eq!(&*decode(&blob), &blob);
    }

    #[test]
    fn unknown_signature_is_unchanged() {
        let blob = b"plain old file contents";
        assert_eq!(&*decode(blob), blob);
    }

    #[test]
    fn zlib_payload_is_read_through_fallback() -> Result<()> {
        let blob = encode_with_key(b"HELLO WORLD", CompressionMethod::Zlib, 0x77)?;
        assert_eq!(&*decode(&blob), b"HELLO WORLD");
        Ok(())
    }

    #[test]
    fn externally_zlib_compressed_payload() -> Result<()> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"legacy tooling")?;
        let payload = encoder.finish()?;

        let mut blob = Vec::new();
        let header = ZigHeader::new(0x10, Signature::Zig, 14);
        binrw::BinWrite::write(&header, &mut Cursor::new(&mut blob))?;
        blob.extend_from_slice(&payload);

        assert_eq!(&*decode(&blob), b"legacy tooling");
        Ok(())
    }

    #[traced_test]
    #[test]
    fn corrupt_payload_is_returned_unchanged() -> Result<()> {
        let mut blob = Vec::new();
        let header = ZigHeader::new(0x33, Signature::Zig, 16);
        binrw::BinWrite::write(&header, &mut Cursor::new(&mut blob))?;
        blob.extend_from_slice(&[0xFF; 16]);

        assert_eq!(&*decode(&blob), blob.as_slice());
        assert!(logs_contain("zIG decompression failed"));
        Ok(())
    }

    #[test]
    fn peek_reads_size_and_key() -> Result<()> {
        let mut payload = vec![0u8; 4];
        payload.extend(encode_with_key(&[7u8; 300], CompressionMethod::Deflate, 0xC3)?);

        let meta = peek_metadata(&mut Cursor::new(&payload), 4).expect("header is present");
        assert_eq!(meta.original_size, 300);
        assert_eq!(meta.key, 0xC3);
        Ok(())
    }

    #[test]
    fn peek_ignores_signature() {
        let data = [0x05u8, 0, 0, 0, 0xA0, 0xA0, 0xA0, 0xA0];
        let meta = peek_metadata(&mut Cursor::new(&data), 0).expect("header is present");
        assert_eq!(meta.key, 0x05);
        assert_eq!(meta.original_size, 0);
    }

    #[test]
    fn peek_past_end_is_none() {
        let data = [0u8; 10];
        assert!(peek_metadata(&mut Cursor::new(&data), 4).is_none());
        assert!(peek_metadata(&mut Cursor::new(&data), 100).is_none());
    }

    #[test]
    fn read_header_needs_eight_bytes() {
        assert!(read_header(&[1, 2, 3, 4, 5, 6, 7]).is_none());
        assert!(read_header(&[1, 2, 3, 4, 5, 6, 7, 8]).is_some());
    }

    proptest! {
        #[test]
        fn compressed_round_trip(data in prop::collection::vec(any::<u8>(), 0..4096)) {
            let blob = encode(&data, CompressionMethod::Deflate).map_err(|e| TestCaseError::fail(e.to_string()))?;
            prop_assert_eq!(decode(&blob).into_owned(), data);
        }

        #[test]
        fn stored_round_trip(data in prop::collection::vec(any::<u8>(), 0..4096)) {
            let blob = encode(&data, CompressionMethod::None).map_err(|e| TestCaseError::fail(e.to_string()))?;
            prop_assert_eq!(blob.len(), data.len() + 8);
            prop_assert_eq!(decode(&blob).into_owned(), data);
        }

        #[test]
        fn header_records_original_size(data in prop::collection::vec(any::<u8>(), 0..2048), key in 1u8..=254) {
            let blob = encode_with_key(&data, CompressionMethod::Zlib, key).map_err(|e| TestCaseError::fail(e.to_string()))?;
            let header = read_header(&blob).expect("blob has a header");
            prop_assert_eq!(header.key, key);
            prop_assert_eq!(header.signature(), Signature::Zig);
            prop_assert_eq!(header.original_size() as usize, data.len());
        }
    }
}
