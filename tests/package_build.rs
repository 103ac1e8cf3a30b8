//! End-to-end package build tests
//!
//! Build packages through the public API, write them to disk and read them
//! back, checking the layout byte for byte where the format pins it down.

use md5::{Digest, Md5};
use rpmkit::core::cpio::TRAILER;
use rpmkit::core::header::HeaderStructure;
use rpmkit::core::io::ByteReader;
use rpmkit::core::lead::{Lead, LEAD_MAGIC, LEAD_SIZE};
use rpmkit::{
    DependencyFlags, DependencyKind, FileBuilder, FileFlags, PackageBuilder, PayloadCompressor,
    RpmError, RpmPackage, Tag,
};
use tempfile::TempDir;

fn demo_builder() -> PackageBuilder {
    let mut builder = PackageBuilder::new();
    builder
        .set_name("demo")
        .unwrap()
        .set_version("1.0")
        .unwrap()
        .set_release("1")
        .unwrap()
        .set_arch("noarch")
        .unwrap()
        .set_os("linux")
        .unwrap()
        .add_file(
            FileBuilder::regular("/opt/demo/bin/run", b"#!/bin/sh\necho hi\n".to_vec())
                .mode(0o755)
                .user("root")
                .group("root"),
        )
        .unwrap();
    builder
}

/// Offset of the metadata header: lead, signature header, padding to 8
fn signed_start(bytes: &[u8]) -> usize {
    let mut reader = ByteReader::new(bytes);
    Lead::read(&mut reader).unwrap();
    HeaderStructure::load(&mut reader, true).unwrap();
    reader.align(8);
    reader.position()
}

#[test]
fn test_demo_package_end_to_end() {
    let dir = TempDir::new().unwrap();
    let path = demo_builder().build(dir.path()).unwrap();
    assert_eq!(path, dir.path().join("demo-1.0-1.rpm"));

    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(bytes[..4], LEAD_MAGIC);
    assert_eq!(bytes[..4], [0xed, 0xab, 0xee, 0xdb]);

    let package = RpmPackage::open(&path).unwrap();
    assert_eq!(package.get_string(Tag::Name).unwrap(), "demo");
    assert_eq!(package.get_string(Tag::Version).unwrap(), "1.0");
    assert_eq!(package.get_string(Tag::Release).unwrap(), "1");

    let entries = package.entries().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].name, "/opt/demo/bin/run");
    assert_eq!(entries[0].namesize(), "/opt/demo/bin/run".len() + 1);
    assert_eq!(entries[0].mode, 0o100755);
    assert_eq!(entries[0].content, b"#!/bin/sh\necho hi\n");
    assert!(entries[1].is_trailer());
    assert_eq!(entries[1].name, TRAILER);

    package.verify().unwrap();
}

#[test]
fn test_layout_offsets() {
    let bytes = demo_builder().assemble().unwrap().bytes;
    let start = signed_start(&bytes);

    // Signature header begins right after the lead, metadata header on an 8-byte boundary
    assert_eq!(bytes[LEAD_SIZE..LEAD_SIZE + 3], [0x8e, 0xad, 0xe8]);
    assert_eq!(start % 8, 0);
    assert_eq!(bytes[start..start + 4], [0x8e, 0xad, 0xe8, 0x01]);
}

#[test]
fn test_signature_digests_cover_header_and_payload() {
    let bytes = demo_builder().assemble().unwrap().bytes;
    let start = signed_start(&bytes);
    let package = RpmPackage::from_bytes(&bytes).unwrap();

    let stored = package.signature().get_binary(Tag::SigMd5).unwrap();
    assert_eq!(stored, Md5::digest(&bytes[start..]).as_slice());
    assert_eq!(
        package.signature().get_int32(Tag::SigSize).unwrap() as usize,
        bytes.len() - start
    );
    assert_eq!(
        package.signature().get_int32(Tag::SigPayloadSize).unwrap() as usize,
        package.archive().unwrap().len()
    );
    assert_eq!(package.signature().get_string(Tag::SigSha256).unwrap().len(), 64);
}

#[test]
fn test_archive_ends_with_single_trailer() {
    let mut builder = demo_builder();
    builder
        .add_file(FileBuilder::directory("/opt/demo"))
        .unwrap()
        .add_file(FileBuilder::symlink("/usr/bin/demo", "/opt/demo/bin/run"))
        .unwrap();
    let package = RpmPackage::from_bytes(&builder.assemble().unwrap().bytes).unwrap();

    let entries = package.entries().unwrap();
    let trailers = entries.iter().filter(|e| e.is_trailer()).count();
    assert_eq!(trailers, 1);
    let last = entries.last().unwrap();
    assert!(last.is_trailer());
    assert_eq!(last.namesize(), 11);
    assert!(last.content.is_empty());
    assert_eq!(last.filesize(), 0);

    // Inode numbers follow addition order
    let inodes: Vec<u32> = entries[..3].iter().map(|e| e.ino).collect();
    assert_eq!(inodes, vec![1, 2, 3]);
    assert_eq!(package.get_int32_array(Tag::FileInodes).unwrap(), &[1, 2, 3]);
}

#[test]
fn test_per_file_tags_are_parallel() {
    let mut builder = demo_builder();
    builder
        .add_file(FileBuilder::regular("/opt/demo/README", "read me").flags(FileFlags::DOC))
        .unwrap()
        .add_file(FileBuilder::regular("/etc/demo.conf", "x=1\n").flags(FileFlags::CONFIG))
        .unwrap();
    let package = RpmPackage::from_bytes(&builder.assemble().unwrap().bytes).unwrap();

    let n = package.get_string_array(Tag::BaseNames).unwrap().len();
    assert_eq!(n, 3);
    assert_eq!(package.get_int32_array(Tag::DirIndexes).unwrap().len(), n);
    assert_eq!(package.get_int32_array(Tag::FileSizes).unwrap().len(), n);
    assert_eq!(package.get_int16_array(Tag::FileModes).unwrap().len(), n);
    assert_eq!(package.get_string_array(Tag::FileMd5s).unwrap().len(), n);
    assert_eq!(package.get_string_array(Tag::FileUserName).unwrap().len(), n);

    // Shared directories are stored once
    assert_eq!(
        package.get_string_array(Tag::DirNames).unwrap(),
        &["/opt/demo/bin/", "/opt/demo/", "/etc/"]
    );
    assert_eq!(
        package.file_names().unwrap(),
        vec!["/opt/demo/bin/run", "/opt/demo/README", "/etc/demo.conf"]
    );
    assert_eq!(package.get_int32(Tag::Size).unwrap(), 18 + 7 + 4);
}

#[test]
fn test_header_tags_sorted_by_id() {
    let mut builder = demo_builder();
    builder.set_summary("Demo package").unwrap();
    let package = RpmPackage::from_bytes(&builder.assemble().unwrap().bytes).unwrap();
    let ids: Vec<u32> = package.header().tags().map(|t| t.id()).collect();
    let mut sorted = ids.clone();
    sorted.sort_unstable();
    assert_eq!(ids, sorted);
    assert_eq!(ids[0], Tag::HeaderI18nTable.id());
}

#[test]
fn test_zstd_package() {
    let mut builder = demo_builder();
    builder.set_compressor(PayloadCompressor::Zstd);
    let package = RpmPackage::from_bytes(&builder.assemble().unwrap().bytes).unwrap();

    assert_eq!(package.get_string(Tag::PayloadCompressor).unwrap(), "zstd");
    assert_eq!(package.get_string(Tag::PayloadFlags).unwrap(), "19");
    assert_eq!(package.compressor().unwrap(), PayloadCompressor::Zstd);
    let requires = package.dependencies(DependencyKind::Requires).unwrap();
    assert!(requires.iter().any(|d| d.name == "rpmlib(PayloadIsZstd)"));
    assert_eq!(package.files().unwrap()[0].content, b"#!/bin/sh\necho hi\n");
    package.verify().unwrap();
}

#[test]
fn test_gzip_is_default() {
    let package = RpmPackage::from_bytes(&demo_builder().assemble().unwrap().bytes).unwrap();
    assert_eq!(package.get_string(Tag::PayloadCompressor).unwrap(), "gzip");
    assert_eq!(package.get_string(Tag::PayloadFlags).unwrap(), "9");
    assert_eq!(package.get_string(Tag::PayloadFormat).unwrap(), "cpio");
    // gzip magic
    assert_eq!(package.payload()[..2], [0x1f, 0x8b]);
}

#[test]
fn test_scriptlets_require_interpreter() {
    let mut builder = demo_builder();
    builder
        .set_post_install("echo installed", "/bin/sh")
        .unwrap()
        .set_pre_uninstall("echo bye", "/bin/sh")
        .unwrap();
    let package = RpmPackage::from_bytes(&builder.assemble().unwrap().bytes).unwrap();

    assert_eq!(package.get_string(Tag::PostIn).unwrap(), "echo installed");
    assert_eq!(package.get_string(Tag::PostInProg).unwrap(), "/bin/sh");
    let interpreters: Vec<_> = package
        .dependencies(DependencyKind::Requires)
        .unwrap()
        .into_iter()
        .filter(|d| d.name == "/bin/sh")
        .collect();
    assert_eq!(interpreters.len(), 1);
    assert!(interpreters[0].flags.contains(DependencyFlags::INTERP));
}

#[test]
fn test_versioned_dependency_adds_rpmlib_requirement() {
    let mut builder = demo_builder();
    builder
        .add_require("glibc", "2.17", DependencyFlags::GREATER | DependencyFlags::EQUAL)
        .unwrap()
        .add_conflict("olddemo", "", DependencyFlags::NONE)
        .unwrap();
    let package = RpmPackage::from_bytes(&builder.assemble().unwrap().bytes).unwrap();
    let requires = package.dependencies(DependencyKind::Requires).unwrap();

    let rpmlib = requires
        .iter()
        .find(|d| d.name == "rpmlib(VersionedDependencies)")
        .unwrap();
    assert_eq!(rpmlib.version, "3.0.3-1");
    assert!(rpmlib.flags.contains(DependencyFlags::RPMLIB));
    assert_eq!(
        requires.iter().filter(|d| d.name == "rpmlib(VersionedDependencies)").count(),
        1
    );
    let conflicts = package.dependencies(DependencyKind::Conflicts).unwrap();
    assert_eq!(conflicts[0].name, "olddemo");
    assert!(conflicts[0].version.is_empty());
}

#[test]
fn test_missing_required_tags() {
    let mut builder = PackageBuilder::new();
    builder.set_name("demo").unwrap();
    match builder.assemble() {
        Err(RpmError::MissingTags(tags)) => {
            assert_eq!(tags, vec![Tag::Version, Tag::Release]);
        }
        other => panic!("expected MissingTags, got {:?}", other),
    }

    let mut builder = PackageBuilder::new();
    builder
        .set_name("demo")
        .unwrap()
        .set_version("1")
        .unwrap()
        .set_release("1")
        .unwrap();
    match builder.assemble() {
        Err(RpmError::MissingTags(tags)) => assert_eq!(tags, vec![Tag::Arch, Tag::Os]),
        other => panic!("expected MissingTags, got {:?}", other),
    }
}

#[test]
fn test_duplicate_target_rejected() {
    let mut builder = demo_builder();
    let err = builder
        .add_file(FileBuilder::regular("/opt/demo/bin/run", "again"))
        .unwrap_err();
    assert!(matches!(err, RpmError::DuplicateTarget(_)));
    assert!(err.is_validation());
}

#[test]
fn test_single_valued_tags_set_once() {
    let mut builder = demo_builder();
    assert!(matches!(
        builder.set_summary("one").and_then(|b| b.set_summary("two")),
        Err(RpmError::SingleValueViolation(Tag::Summary))
    ));
    assert!(matches!(
        builder.set_version("2.0"),
        Err(RpmError::SingleValueViolation(Tag::Version))
    ));
}

#[test]
fn test_build_time_set_once() {
    let mut builder = demo_builder();
    builder.set_build_time(1).unwrap();
    assert!(matches!(
        builder.set_build_time(2),
        Err(RpmError::SingleValueViolation(Tag::BuildTime))
    ));
    let package = RpmPackage::from_bytes(&builder.assemble().unwrap().bytes).unwrap();
    assert_eq!(package.get_int32_array(Tag::BuildTime).unwrap(), &[1]);
}
