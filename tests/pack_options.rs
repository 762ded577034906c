//! Dotfile filtering, ordering manifests and unpack rules

use asar_rs::{CrawlMetadata, HeaderCache, PackOptions};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn write(root: &Path, rel: &str, data: &[u8]) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, data).unwrap();
}

#[test]
fn test_dotfiles_excluded_with_subtree() {
    let dir = TempDir::new().unwrap();
    let src = dir.path().join("app");
    write(&src, "index.js", b"x");
    write(&src, ".env", b"SECRET=1");
    write(&src, ".git/HEAD", b"ref");
    write(&src, "lib/.cache/blob", b"c");

    let archive = dir.path().join("app.asar");
    asar_rs::pack(&src, &archive, &PackOptions::default()).unwrap();
    let paths = asar_rs::list_package(&mut HeaderCache::new(), &archive, false).unwrap();
    assert_eq!(paths, vec!["/index.js", "/lib"]);

    let archive = dir.path().join("dot.asar");
    asar_rs::pack(&src, &archive, &PackOptions::new().with_dot(true)).unwrap();
    let paths = asar_rs::list_package(&mut HeaderCache::new(), &archive, false).unwrap();
    assert!(paths.contains(&"/.env".to_string()));
    assert!(paths.contains(&"/.git/HEAD".to_string()));
    assert!(paths.contains(&"/lib/.cache/blob".to_string()));
}

#[test]
fn test_dot_filter_applies_to_explicit_inputs() {
    let dir = TempDir::new().unwrap();
    let src = dir.path().join("app");
    write(&src, "a.txt", b"a");
    write(&src, ".hidden/b.txt", b"b");

    let files: Vec<PathBuf> = ["a.txt", ".hidden", ".hidden/b.txt"]
        .iter()
        .map(|p| src.join(p))
        .collect();
    let ns = asar_rs::pack_from_files(
        &src,
        &dir.path().join("app.asar"),
        &files,
        &mut CrawlMetadata::new(),
        &PackOptions::default(),
    )
    .unwrap();
    assert_eq!(ns.list_paths(false), vec!["/a.txt"]);
}

#[test]
fn test_ordering_manifest_controls_layout() {
    let dir = TempDir::new().unwrap();
    let src = dir.path().join("app");
    write(&src, "a/file1", b"11111");
    write(&src, "b/file2", b"22");
    write(&src, "c/file3", b"333");

    let manifest = dir.path().join("order.txt");
    fs::write(&manifest, "b/file2\nstartup: /a/file1\n").unwrap();

    let archive = dir.path().join("app.asar");
    let ns = asar_rs::pack(&src, &archive, &PackOptions::new().with_ordering(&manifest)).unwrap();

    let order: Vec<String> = ns.packed_files().into_iter().map(|(path, _)| path).collect();
    assert_eq!(order, vec!["/b/file2", "/a/file1", "/c/file3"]);
    assert_eq!(ns.get_file("b/file2", false).unwrap().offset, Some(0));
    assert_eq!(ns.get_file("a/file1", false).unwrap().offset, Some(2));
    assert_eq!(ns.get_file("c/file3", false).unwrap().offset, Some(7));

    let bytes = fs::read(&archive).unwrap();
    assert!(bytes.ends_with(b"2211111333"));
}

#[test]
fn test_missing_ordering_manifest_is_fatal() {
    let dir = TempDir::new().unwrap();
    let src = dir.path().join("app");
    write(&src, "a.txt", b"a");

    let options = PackOptions::new().with_ordering(dir.path().join("nope.txt"));
    let err = asar_rs::pack(&src, &dir.path().join("app.asar"), &options).unwrap_err();
    assert!(matches!(err, asar_rs::AsarError::Io { .. }));
}

#[test]
fn test_unpack_by_basename() {
    let dir = TempDir::new().unwrap();
    let src = dir.path().join("app");
    write(&src, "index.js", b"main");
    write(&src, "build/Release/addon.node", b"\x7fELF");

    let archive = dir.path().join("app.asar");
    let ns = asar_rs::pack(&src, &archive, &PackOptions::new().with_unpack("*.node")).unwrap();

    let addon = ns.get_file("build/Release/addon.node", false).unwrap();
    assert!(addon.unpacked);
    assert_eq!(addon.offset, None);
    assert!(addon.integrity.is_some());
    assert_eq!(ns.packed_size(), 4);

    let side = dir.path().join("app.asar.unpacked/build/Release/addon.node");
    assert_eq!(fs::read(&side).unwrap(), b"\x7fELF");

    let mut cache = HeaderCache::new();
    let listed = asar_rs::list_package(&mut cache, &archive, true).unwrap();
    assert!(listed.contains(&"unpacked : /build/Release/addon.node".to_string()));
    assert!(listed.contains(&"packed   : /build".to_string()));

    let content =
        asar_rs::extract_file(&mut cache, &archive, "build/Release/addon.node", true).unwrap();
    assert_eq!(content, b"\x7fELF");

    let out = dir.path().join("out");
    asar_rs::extract_all(&mut cache, &archive, &out).unwrap();
    assert_eq!(fs::read(out.join("build/Release/addon.node")).unwrap(), b"\x7fELF");
}

#[test]
fn test_unpack_dir_inherited_by_descendants() {
    let dir = TempDir::new().unwrap();
    let src = dir.path().join("app");
    write(&src, "assets/logo.png", b"png");
    write(&src, "assets/icons/app.ico", b"ico");
    write(&src, "src/main.js", b"js");

    let archive = dir.path().join("app.asar");
    let ns = asar_rs::pack(&src, &archive, &PackOptions::new().with_unpack_dir("assets")).unwrap();

    assert!(ns.lookup("assets", false).unwrap().is_unpacked());
    assert!(ns.lookup("assets/icons", false).unwrap().is_unpacked());
    assert!(ns.get_file("assets/logo.png", false).unwrap().unpacked);
    assert!(ns.get_file("assets/icons/app.ico", false).unwrap().unpacked);
    assert!(!ns.get_file("src/main.js", false).unwrap().unpacked);
    assert_eq!(ns.packed_size(), 2);

    let side = dir.path().join("app.asar.unpacked");
    assert!(side.join("assets/logo.png").is_file());
    assert!(side.join("assets/icons/app.ico").is_file());
    assert!(!side.join("src").exists());
}

#[test]
fn test_options_from_toml_file() {
    let dir = TempDir::new().unwrap();
    let src = dir.path().join("app");
    write(&src, "a.node", b"n");
    write(&src, ".rc", b"r");

    let config = dir.path().join("asar.toml");
    fs::write(&config, "dot = true\nunpack = \"*.node\"\n").unwrap();
    let options = PackOptions::from_toml_file(&config).unwrap();

    let ns = asar_rs::pack(&src, &dir.path().join("app.asar"), &options).unwrap();
    assert!(ns.get_file(".rc", false).is_ok());
    assert!(ns.get_file("a.node", false).unwrap().unpacked);
}

#[cfg(unix)]
#[test]
fn test_unpacked_link_recreated_in_side_directory() {
    let dir = TempDir::new().unwrap();
    let src = dir.path().join("app");
    write(&src, "native/lib.so.1", b"so");
    std::os::unix::fs::symlink("lib.so.1", src.join("native/lib.so")).unwrap();

    let archive = dir.path().join("app.asar");
    let options = PackOptions::new().with_unpack_dir("native");
    asar_rs::pack(&src, &archive, &options).unwrap();

    let link = dir.path().join("app.asar.unpacked/native/lib.so");
    assert_eq!(fs::read_link(&link).unwrap(), Path::new("lib.so.1"));

    // packing again replaces the stale link
    asar_rs::pack(&src, &archive, &options).unwrap();
    assert_eq!(fs::read_link(&link).unwrap(), Path::new("lib.so.1"));
}
