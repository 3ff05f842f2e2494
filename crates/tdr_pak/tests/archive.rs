use std::fs;
use std::path::Path;

use miette::{IntoDiagnostic, Result};
use pretty_assertions::assert_eq;
use tdr_pak::{
    archive::{resolve_conflicts, Conflict},
    error::Error,
    trie, zig, CompressionMethod, DeleteTarget, Entry, ExtractOptions, PackFile, PackOptions,
    PakArchive,
};
use tracing_test::traced_test;

fn payload_len(archive: &PakArchive) -> Result<u64> {
    Ok(fs::metadata(archive.pak_path()).into_diagnostic()?.len())
}

fn scenario_archive(dir: &Path) -> Result<PakArchive> {
    let archive = PakArchive::create(dir.join("test.pak"))?;
    archive.pack(
        [
            PackFile::from_bytes("a.txt", vec![b'a'; 10]),
            PackFile::from_bytes("sub/b.txt", vec![b'b'; 20]),
        ],
        &PackOptions::default(),
    )?;
    Ok(archive)
}

#[traced_test]
#[test]
fn create_empty_pair() -> Result<()> {
    let dir = tempfile::tempdir().into_diagnostic()?;
    let archive = PakArchive::create(dir.path().join("empty.pak"))?;

    assert!(archive.exists());
    assert_eq!(payload_len(&archive)?, 0);
    assert_eq!(fs::metadata(archive.dir_path()).into_diagnostic()?.len(), 0);
    assert!(archive.entries().is_empty());

    assert!(PakArchive::create(dir.path().join("empty.pak")).is_err());
    Ok(())
}

#[traced_test]
#[test]
fn pack_into_empty_archive() -> Result<()> {
    let dir = tempfile::tempdir().into_diagnostic()?;
    let archive = scenario_archive(dir.path())?;

    let entries = archive.entries();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries.names().collect::<Vec<_>>(), vec!["a.txt", "sub/b.txt"]);

    for entry in entries.iter() {
        assert_eq!(entry.offset % 4, 0, "{} is not aligned", entry.name);
    }
    assert_eq!(entries.by_name("a.txt")?.offset, 0);

    assert_eq!(archive.extract_by_name("a.txt")?, vec![b'a'; 10]);
    assert_eq!(archive.extract_by_name("sub/b.txt")?, vec![b'b'; 20]);

    let meta = archive
        .metadata(entries.by_name("sub/b.txt")?)
        .expect("header is readable");
    assert_eq!(meta.original_size, 20);
    assert!((1..=254).contains(&meta.key));

    Ok(())
}

#[traced_test]
#[test]
fn pack_without_existing_files() -> Result<()> {
    let dir = tempfile::tempdir().into_diagnostic()?;
    let archive = PakArchive::new(dir.path().join("fresh.pak"));
    assert!(!archive.exists());

    archive.pack(
        [PackFile::from_bytes("fresh.txt", b"fresh".to_vec())],
        &PackOptions::default(),
    )?;

    assert!(archive.exists());
    assert_eq!(archive.extract_by_name("fresh.txt")?, b"fresh");
    Ok(())
}

#[traced_test]
#[test]
fn stored_entries_are_padded() -> Result<()> {
    let dir = tempfile::tempdir().into_diagnostic()?;
    let archive = PakArchive::create(dir.path().join("raw.pak"))?;

    let options = PackOptions::builder()
        .compression(CompressionMethod::None)
        .build();
    let files = (1..=9u8).map(|n| PackFile::from_bytes(format!("f{n}"), vec![n; n as usize]));
    let entries = archive.pack(files, &options)?;

    // every stored blob is its content plus an 8 byte header
    let mut expected_offset = 0u32;
    for n in 1..=9u32 {
        let entry = entries.by_name(&format!("f{n}"))?;
        assert_eq!(entry.offset, expected_offset);
        assert_eq!(entry.size, n + 8);
        expected_offset = (entry.offset + entry.size).next_multiple_of(4);
    }

    let payload = fs::read(archive.pak_path()).into_diagnostic()?;
    let last = entries.by_name("f9")?;
    assert_eq!((last.offset, last.size), (112, 17));
    assert_eq!(payload.len(), 129);
    let first = entries.by_name("f1")?;
    assert_eq!(&payload[9..12], &[0, 0, 0]);
    assert_eq!(&*zig::decode(&payload[..first.size as usize]), &[1]);

    for n in 1..=9u8 {
        assert_eq!(archive.extract_by_name(&format!("f{n}"))?, vec![n; n as usize]);
    }
    Ok(())
}

#[traced_test]
#[test]
fn offsets_stay_aligned_across_calls() -> Result<()> {
    let dir = tempfile::tempdir().into_diagnostic()?;
    let archive = PakArchive::create(dir.path().join("many.pak"))?;

    for round in 0..5usize {
        let files = (0..3).map(|i| {
            PackFile::from_bytes(format!("r{round}/{i}.bin"), vec![round as u8; round * 7 + i])
        });
        archive.pack(files, &PackOptions::default())?;
    }

    let entries = archive.entries();
    assert_eq!(entries.len(), 15);
    assert!(entries.iter().all(|e| e.offset % 4 == 0));
    Ok(())
}

#[traced_test]
#[test]
fn delete_keeps_payload() -> Result<()> {
    let dir = tempfile::tempdir().into_diagnostic()?;
    let archive = scenario_archive(dir.path())?;
    let before = archive.entries();
    let length = payload_len(&archive)?;

    let after = archive.delete(&[DeleteTarget::file("sub/b.txt")])?;

    assert_eq!(payload_len(&archive)?, length);
    assert_eq!(after, archive.entries());
    assert_eq!(after.len(), 1);
    assert_eq!(after.get("a.txt"), before.get("a.txt"));
    assert!(logs_contain("payload space is not reclaimed"));

    Ok(())
}

#[traced_test]
#[test]
fn delete_subtree() -> Result<()> {
    let dir = tempfile::tempdir().into_diagnostic()?;
    let archive = PakArchive::create(dir.path().join("tree.pak"))?;
    archive.pack(
        [
            PackFile::from_bytes("sub/a.txt", b"1".to_vec()),
            PackFile::from_bytes("sub/deep/b.txt", b"2".to_vec()),
            PackFile::from_bytes("subway.txt", b"3".to_vec()),
            PackFile::from_bytes("top.txt", b"4".to_vec()),
        ],
        &PackOptions::default(),
    )?;

    archive.delete(&[DeleteTarget::subtree("sub"), DeleteTarget::file("missing.txt")])?;

    let names: Vec<_> = archive.entries().names().map(str::to_owned).collect();
    assert_eq!(names, vec!["subway.txt", "top.txt"]);
    Ok(())
}

#[traced_test]
#[test]
fn repack_supersedes_entry() -> Result<()> {
    let dir = tempfile::tempdir().into_diagnostic()?;
    let archive = PakArchive::create(dir.path().join("twice.pak"))?;

    archive.pack(
        [PackFile::from_bytes("a.txt", b"first version".to_vec())],
        &PackOptions::default(),
    )?;
    let old = archive.entries().by_name("a.txt")?.clone();

    archive.pack(
        [PackFile::from_bytes("a.txt", b"second version".to_vec())],
        &PackOptions::default(),
    )?;
    let entries = archive.entries();
    let new = entries.by_name("a.txt")?;

    assert_eq!(entries.len(), 1);
    assert!(new.offset > old.offset);
    assert_eq!(archive.extract(new)?, b"second version");

    // the old blob is still physically there
    assert_eq!(archive.extract(&old)?, b"first version");
    Ok(())
}

#[traced_test]
#[test]
fn unreadable_source_stops_batch() -> Result<()> {
    let dir = tempfile::tempdir().into_diagnostic()?;
    let archive = PakArchive::create(dir.path().join("partial.pak"))?;

    let result = archive.pack(
        [
            PackFile::from_bytes("one.txt", b"one".to_vec()),
            PackFile::from_path("two.txt", dir.path().join("does-not-exist.txt")),
            PackFile::from_bytes("three.txt", b"three".to_vec()),
        ],
        &PackOptions::default(),
    );

    match result {
        Err(Error::SourceUnreadable { name, .. }) => assert_eq!(name, "two.txt"),
        other => panic!("expected a source failure, got {other:?}"),
    }

    let entries = archive.entries();
    assert_eq!(entries.names().collect::<Vec<_>>(), vec!["one.txt"]);
    let one = entries.by_name("one.txt")?;
    assert_eq!(payload_len(&archive)?, u64::from(one.offset + one.size));
    assert_eq!(archive.extract_by_name("one.txt")?, b"one");
    Ok(())
}

#[traced_test]
#[test]
fn latin1_names_survive_index_rewrite() -> Result<()> {
    let dir = tempfile::tempdir().into_diagnostic()?;
    let archive = scenario_archive(dir.path())?;

    // a single byte code page name pointing at the blob of a.txt
    let a = archive.entries().by_name("a.txt")?.clone();
    let index = trie::serialize([&Entry::from_raw_name(b"caf\xE9.txt", a.offset, a.size)])?;
    assert!(index.contains(&0xE9));
    fs::write(archive.dir_path(), &index).into_diagnostic()?;

    archive.delete(&[DeleteTarget::file("nothing.txt")])?;
    assert_eq!(fs::read(archive.dir_path()).into_diagnostic()?, index);

    let entries = archive.entries();
    assert_eq!(entries.names().collect::<Vec<_>>(), vec!["caf\u{e9}.txt"]);
    assert_eq!(archive.extract_by_name("caf\u{e9}.txt")?, vec![b'a'; 10]);
    Ok(())
}

#[traced_test]
#[test]
fn corrupt_size_fails_extract() -> Result<()> {
    let dir = tempfile::tempdir().into_diagnostic()?;
    let archive = scenario_archive(dir.path())?;

    let a = archive.entries().by_name("a.txt")?.clone();
    let corrupt = Entry::new("a.txt", a.offset, u32::MAX);
    fs::write(archive.dir_path(), trie::serialize([&corrupt])?).into_diagnostic()?;

    assert!(matches!(
        archive.extract_by_name("a.txt"),
        Err(Error::IOError(_))
    ));
    Ok(())
}

#[traced_test]
#[test]
fn pack_from_disk() -> Result<()> {
    let dir = tempfile::tempdir().into_diagnostic()?;
    let source = dir.path().join("source.bin");
    let content: Vec<u8> = (0..5000u32).map(|i| (i % 251) as u8).collect();
    fs::write(&source, &content).into_diagnostic()?;

    let archive = PakArchive::create(dir.path().join("disk.pak"))?;
    let options = PackOptions::builder()
        .compression(CompressionMethod::Zlib)
        .build();
    archive.pack([PackFile::from_path("data/source.bin", &source)], &options)?;

    let entry = archive.entries().by_name("data/source.bin")?.clone();
    assert!(entry.size < 5000);
    assert_eq!(archive.extract(&entry)?, content);
    Ok(())
}

#[traced_test]
#[test]
fn missing_index_reads_empty() {
    let dir = tempfile::tempdir().expect("temp dir");
    let archive = PakArchive::new(dir.path().join("nothing.pak"));

    assert!(archive.entries().is_empty());
    assert!(logs_contain("does not exist"));
    assert!(archive.metadata(&Entry::new("a", 0, 8)).is_none());
}

#[traced_test]
#[test]
fn truncated_index_keeps_complete_entries() -> Result<()> {
    let dir = tempfile::tempdir().into_diagnostic()?;
    let archive = scenario_archive(dir.path())?;

    let index = fs::read(archive.dir_path()).into_diagnostic()?;
    fs::write(archive.dir_path(), &index[..index.len() - 3]).into_diagnostic()?;

    let entries = archive.entries();
    assert_eq!(entries.names().collect::<Vec<_>>(), vec!["a.txt"]);
    assert!(logs_contain("index ends in the middle"));
    Ok(())
}

#[traced_test]
#[test]
fn index_file_matches_table() -> Result<()> {
    let dir = tempfile::tempdir().into_diagnostic()?;
    let archive = scenario_archive(dir.path())?;

    let index = fs::read(archive.dir_path()).into_diagnostic()?;
    let table = archive.entries();
    assert_eq!(index, table.to_index_bytes()?);
    assert_eq!(trie::parse(&index), table.into_iter().collect::<Vec<_>>());
    Ok(())
}

#[traced_test]
#[test]
fn conflicts_resolved_before_pack() -> Result<()> {
    let dir = tempfile::tempdir().into_diagnostic()?;
    let archive = scenario_archive(dir.path())?;
    let old = archive.entries();

    let files = resolve_conflicts(
        &old,
        [
            PackFile::from_bytes("a.txt", b"replaced".to_vec()),
            PackFile::from_bytes("sub/b.txt", b"ignored".to_vec()),
        ],
        |file| {
            if file.name == "a.txt" {
                Conflict::Overwrite
            } else {
                Conflict::KeepExisting
            }
        },
    );
    archive.pack(files, &PackOptions::default())?;

    assert_eq!(archive.extract_by_name("a.txt")?, b"replaced");
    assert_eq!(archive.extract_by_name("sub/b.txt")?, vec![b'b'; 20]);
    assert_eq!(archive.entries().get("sub/b.txt"), old.get("sub/b.txt"));
    Ok(())
}

#[traced_test]
#[test]
fn unpack_to_directory() -> Result<()> {
    let dir = tempfile::tempdir().into_diagnostic()?;
    let archive = PakArchive::create(dir.path().join("Cars.pak"))?;
    archive.pack(
        [
            PackFile::from_bytes("cars/eagle/body.txt", b"body".to_vec()),
            PackFile::from_bytes("cars/readme.txt", b"readme".to_vec()),
            PackFile::from_bytes("../evil.txt", b"evil".to_vec()),
        ],
        &PackOptions::default(),
    )?;

    let out = dir.path().join("out");
    assert_eq!(archive.unpack(&out, &ExtractOptions::default())?, 3);
    assert_eq!(fs::read(out.join("cars/eagle/body.txt")).into_diagnostic()?, b"body");
    assert_eq!(fs::read(out.join("cars/readme.txt")).into_diagnostic()?, b"readme");
    assert_eq!(fs::read(out.join("__/evil.txt")).into_diagnostic()?, b"evil");
    assert!(!dir.path().join("evil.txt").exists());

    // existing files are left alone unless asked
    fs::write(out.join("cars/readme.txt"), b"changed").into_diagnostic()?;
    assert_eq!(archive.unpack(&out, &ExtractOptions::default())?, 0);
    assert_eq!(fs::read(out.join("cars/readme.txt")).into_diagnostic()?, b"changed");

    let overwrite = ExtractOptions::builder().overwrite(true).build();
    assert_eq!(archive.unpack(&out, &overwrite)?, 3);
    assert_eq!(fs::read(out.join("cars/readme.txt")).into_diagnostic()?, b"readme");

    Ok(())
}

#[traced_test]
#[test]
fn unpack_flat_and_stripped() -> Result<()> {
    let dir = tempfile::tempdir().into_diagnostic()?;
    let archive = PakArchive::create(dir.path().join("Cars.pak"))?;
    archive.pack(
        [
            PackFile::from_bytes("cars/eagle/body.txt", b"body".to_vec()),
            PackFile::from_bytes("cars/readme.txt", b"readme".to_vec()),
        ],
        &PackOptions::default(),
    )?;

    let stripped = dir.path().join("stripped");
    let options = ExtractOptions::builder().strip_archive_root(true).build();
    assert_eq!(archive.unpack(&stripped, &options)?, 2);
    assert!(stripped.join("eagle/body.txt").is_file());
    assert!(stripped.join("readme.txt").is_file());

    let flat = dir.path().join("flat");
    let options = ExtractOptions::builder().flatten(true).build();
    assert_eq!(archive.unpack(&flat, &options)?, 2);
    assert!(flat.join("body.txt").is_file());
    assert!(flat.join("readme.txt").is_file());

    Ok(())
}
