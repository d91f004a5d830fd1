//! Tests for the image store layout.
//!
//! Validates path derivation and the reset contract: after a reset the
//! image directory holds exactly one empty rootfs and nothing else.

use gocker::ImageStore;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use tempfile::TempDir;

// =============================================================================
// Path Derivation
// =============================================================================

#[test]
fn test_path_layout() {
    let store = ImageStore::with_base("/data/images".into());

    assert_eq!(store.base_dir(), Path::new("/data/images"));
    assert_eq!(store.image_dir("alpine"), Path::new("/data/images/alpine"));
    assert_eq!(
        store.rootfs_dir("alpine"),
        Path::new("/data/images/alpine/rootfs")
    );
    assert_eq!(
        store.config_path("alpine"),
        Path::new("/data/images/alpine/.config.json")
    );
}

#[test]
fn test_config_file_is_hidden() {
    let store = ImageStore::with_base("/data/images".into());
    let file_name = store.config_path("alpine");
    let file_name = file_name.file_name().unwrap().to_str().unwrap();

    assert!(file_name.starts_with('.'));
}

// =============================================================================
// Reset Semantics
// =============================================================================

#[test]
fn test_reset_creates_rootfs_under_missing_base() {
    let temp = TempDir::new().unwrap();
    let store = ImageStore::with_base(temp.path().join("deep").join("images"));

    let rootfs = store.reset("alpine").unwrap();

    assert!(rootfs.is_dir());
    assert_eq!(rootfs, store.rootfs_dir("alpine"));
}

#[test]
fn test_reset_returns_empty_rootfs() {
    let temp = TempDir::new().unwrap();
    let store = ImageStore::with_base(temp.path().to_path_buf());

    let rootfs = store.reset("alpine").unwrap();

    assert_eq!(fs::read_dir(&rootfs).unwrap().count(), 0);
}

#[test]
fn test_reset_wipes_previous_image_state() {
    let temp = TempDir::new().unwrap();
    let store = ImageStore::with_base(temp.path().to_path_buf());

    // Simulate a previous pull
    let rootfs = store.reset("alpine").unwrap();
    fs::create_dir_all(rootfs.join("etc")).unwrap();
    fs::write(rootfs.join("etc/os-release"), "ID=alpine\n").unwrap();
    fs::write(store.config_path("alpine"), "{}").unwrap();

    let rootfs = store.reset("alpine").unwrap();

    assert!(!rootfs.join("etc").exists());
    assert!(!store.config_path("alpine").exists());
    assert_eq!(fs::read_dir(&rootfs).unwrap().count(), 0);
}

#[test]
fn test_reset_does_not_touch_other_images() {
    let temp = TempDir::new().unwrap();
    let store = ImageStore::with_base(temp.path().to_path_buf());

    let other = store.reset("busybox").unwrap();
    fs::write(other.join("marker"), b"keep me").unwrap();

    store.reset("alpine").unwrap();

    assert!(other.join("marker").exists());
}

#[test]
fn test_reset_applies_rootfs_mode() {
    let temp = TempDir::new().unwrap();
    let store = ImageStore::with_base(temp.path().to_path_buf());

    let rootfs = store.reset("alpine").unwrap();

    let mode = fs::metadata(&rootfs).unwrap().permissions().mode();
    assert_eq!(mode & 0o7777, 0o755);
}

// =============================================================================
// Name Validation
// =============================================================================

#[test]
fn test_reset_rejects_traversal_names() {
    let temp = TempDir::new().unwrap();
    let store = ImageStore::with_base(temp.path().to_path_buf());

    assert!(store.reset("../outside").is_err());
    assert!(store.reset("").is_err());
    assert!(store.reset("a/b").is_err());
}
