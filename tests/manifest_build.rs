//! Manifest-driven builds
//!
//! Write a manifest plus source files into a temporary directory, build it
//! and read the package back.

use rpmkit::{
    build_from_manifest, list_entries, DependencyFlags, DependencyKind, FileFlags,
    PackageManifest, PayloadCompressor, RpmError, RpmPackage, Tag,
};
use std::fs;
use tempfile::TempDir;

const MANIFEST: &str = r##"
name = "hello-tool"
version = "2.3.1"
release = "4"
arch = "x86_64"
summary = "Says hello"
description = "A tiny tool that says hello."
license = "MIT"
group = "Applications/System"
url = "https://example.org/hello"
compressor = "zstd"

requires = [
    { name = "glibc", version = "2.17", op = ">=" },
    { name = "coreutils" },
]
obsoletes = [{ name = "hello-old", version = "1.0", op = "<" }]

[scripts]
post_install = "ldconfig"
pre_uninstall = "echo bye"

[[files]]
target = "/usr/share/hello-tool"
kind = "dir"

[[files]]
target = "/usr/bin/hello"
source = "bin/hello"
mode = "0755"
mtime = 1700000000

[[files]]
target = "/etc/hello.conf"
content = "greeting = hi\n"
flags = ["config", "noreplace"]

[[files]]
target = "/usr/share/hello-tool/hello"
kind = "symlink"
link_target = "/usr/bin/hello"
"##;

fn write_project() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("bin")).unwrap();
    fs::write(dir.path().join("bin/hello"), "#!/bin/sh\necho hello\n").unwrap();
    fs::write(dir.path().join("hello.toml"), MANIFEST).unwrap();
    dir
}

#[test]
fn test_build_from_manifest() {
    let dir = write_project();
    let out = dir.path().join("out");
    fs::create_dir_all(&out).unwrap();

    let path = build_from_manifest(dir.path().join("hello.toml"), &out).unwrap();
    assert_eq!(path, out.join("hello-tool-2.3.1-4.rpm"));

    let package = RpmPackage::open(&path).unwrap();
    package.verify().unwrap();
    assert_eq!(package.nevr().unwrap(), "hello-tool-2.3.1-4");
    assert_eq!(package.get_string(Tag::Summary).unwrap(), "Says hello");
    assert_eq!(package.get_string(Tag::Group).unwrap(), "Applications/System");
    assert_eq!(package.get_string(Tag::Url).unwrap(), "https://example.org/hello");
    assert_eq!(package.get_string_array(Tag::HeaderI18nTable).unwrap(), &["C"]);
    assert_eq!(package.compressor().unwrap(), PayloadCompressor::Zstd);
    assert_eq!(package.get_string(Tag::PostIn).unwrap(), "ldconfig");
    assert_eq!(package.get_string(Tag::PreUnProg).unwrap(), "/bin/sh");
}

#[test]
fn test_manifest_dependencies() {
    let dir = write_project();
    let path = build_from_manifest(dir.path().join("hello.toml"), dir.path()).unwrap();
    let package = RpmPackage::open(path).unwrap();

    let requires = package.dependencies(DependencyKind::Requires).unwrap();
    let glibc = requires.iter().find(|d| d.name == "glibc").unwrap();
    assert_eq!(glibc.to_string(), "glibc >= 2.17");
    let coreutils = requires.iter().find(|d| d.name == "coreutils").unwrap();
    assert!(coreutils.version.is_empty());
    assert!(requires.iter().any(|d| d.name == "rpmlib(VersionedDependencies)"));

    let shell = requires.iter().find(|d| d.name == "/bin/sh").unwrap();
    assert!(shell.flags.contains(DependencyFlags::INTERP));

    let obsoletes = package.dependencies(DependencyKind::Obsoletes).unwrap();
    assert_eq!(obsoletes[0].to_string(), "hello-old < 1.0");

    let provides = package.dependencies(DependencyKind::Provides).unwrap();
    assert!(provides.iter().any(|d| d.to_string() == "hello-tool = 2.3.1-4"));
}

#[test]
fn test_manifest_entries() {
    let dir = write_project();
    let path = build_from_manifest(dir.path().join("hello.toml"), dir.path()).unwrap();
    let package = RpmPackage::open(path).unwrap();
    let entries = list_entries(&package).unwrap();

    let paths: Vec<&str> = entries.iter().map(|e| e.path.as_str()).collect();
    assert_eq!(
        paths,
        vec![
            "/etc/hello.conf",
            "/usr/bin/hello",
            "/usr/share/hello-tool",
            "/usr/share/hello-tool/hello",
        ]
    );

    let conf = &entries[0];
    assert_eq!(conf.flags, FileFlags::CONFIG | FileFlags::NOREPLACE);
    assert_eq!(conf.mode, 0o100644);

    let hello = &entries[1];
    assert_eq!(hello.mode, 0o100755);
    assert_eq!(hello.mtime, 1_700_000_000);
    assert_eq!(hello.size, 21);
    assert_eq!(hello.digest.len(), 32);

    assert!(entries[2].is_dir());
    assert_eq!(entries[2].size, 0);
    assert!(entries[3].is_symlink());
    assert_eq!(entries[3].link_target, "/usr/bin/hello");

    let payload = package.files().unwrap();
    let script = payload.iter().find(|e| e.name == "/usr/bin/hello").unwrap();
    assert_eq!(script.content, b"#!/bin/sh\necho hello\n");
}

#[test]
fn test_missing_source_file() {
    let dir = write_project();
    fs::remove_file(dir.path().join("bin/hello")).unwrap();
    let err = build_from_manifest(dir.path().join("hello.toml"), dir.path()).unwrap_err();
    assert!(matches!(err, RpmError::Io(_)));
    assert!(!dir.path().join("hello-tool-2.3.1-4.rpm").exists());
}

#[test]
fn test_invalid_manifest_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let manifest = dir.path().join("bad.toml");
    fs::write(
        &manifest,
        "name = \"bad\"\nversion = \"1 0\"\narch = \"noarch\"\n",
    )
    .unwrap();
    let err = build_from_manifest(&manifest, dir.path()).unwrap_err();
    assert!(matches!(err, RpmError::ManifestValidation(_)));
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[test]
fn test_manifest_roundtrips_through_toml() {
    let manifest = PackageManifest::from_toml_str(MANIFEST).unwrap();
    let text = manifest.to_toml_string().unwrap();
    let again = PackageManifest::from_toml_str(&text).unwrap();
    assert_eq!(again.version, "2.3.1");
    assert_eq!(again.obsoletes, manifest.obsoletes);
    assert_eq!(again.files.len(), 4);
}
