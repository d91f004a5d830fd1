//! Tests for engine constants.
//!
//! The cgroup limits, registry endpoints, and store layout are part of the
//! engine's external contract; these tests pin the exact values.

use gocker::{
    validate_image_name, BASE_ENV, CGROUP_CPU_MAX, CGROUP_MEMORY_MAX, CGROUP_NAME_PREFIX,
    CGROUP_ROOT, CHILD_ENV, CONFIG_FILE, DEFAULT_AUTH_BASE, DEFAULT_REGISTRY_BASE, DEFAULT_TAG,
    HOSTNAME_SUFFIX, MANIFEST_ACCEPT, RELATIVE_IMAGES_PATH, ROOTFS_DIR,
};

// =============================================================================
// Registry Endpoint Constants
// =============================================================================

#[test]
fn test_registry_endpoints() {
    assert_eq!(DEFAULT_AUTH_BASE, "https://auth.docker.io");
    assert_eq!(DEFAULT_REGISTRY_BASE, "https://registry-1.docker.io");
}

#[test]
fn test_manifest_accept_header() {
    assert_eq!(
        MANIFEST_ACCEPT,
        "application/vnd.docker.distribution.manifest.v2+json"
    );
}

#[test]
fn test_default_tag() {
    assert_eq!(DEFAULT_TAG, "latest");
}

// =============================================================================
// Store Layout Constants
// =============================================================================

#[test]
fn test_store_layout() {
    assert_eq!(RELATIVE_IMAGES_PATH, ".local/share/gocker/images");
    assert_eq!(ROOTFS_DIR, "rootfs");
    assert_eq!(CONFIG_FILE, ".config.json");

    // Relative to HOME, never absolute
    assert!(!RELATIVE_IMAGES_PATH.starts_with('/'));
}

// =============================================================================
// Cgroup Constants
// =============================================================================

#[test]
fn test_cgroup_limits() {
    // Fixed limits: 50M memory, 20% of one CPU
    assert_eq!(CGROUP_MEMORY_MAX, "50M");
    assert_eq!(CGROUP_CPU_MAX, "20000 100000");
}

#[test]
fn test_cgroup_location() {
    assert_eq!(CGROUP_ROOT, "/sys/fs/cgroup");
    assert_eq!(CGROUP_NAME_PREFIX, "gocker");
}

// =============================================================================
// Runtime Environment Constants
// =============================================================================

#[test]
fn test_child_sentinel_name() {
    assert_eq!(CHILD_ENV, "IS_CHILD");
}

#[test]
fn test_base_env_set() {
    assert_eq!(
        BASE_ENV,
        ["HOME=/root", "USER=root", "SHELL=/bin/sh", "TERM=xterm"]
    );
}

#[test]
fn test_hostname_suffix() {
    assert_eq!(HOSTNAME_SUFFIX, "-container");
}

// =============================================================================
// Image Name Validation
// =============================================================================

#[test]
fn test_image_name_validation_accepts_official_names() {
    for name in ["alpine", "busybox", "hello-world", "nginx", "amazonlinux.2"] {
        assert!(
            validate_image_name(name).is_ok(),
            "'{}' should be a valid image name",
            name
        );
    }
}

#[test]
fn test_image_name_validation_rejects_path_components() {
    for name in ["", "../alpine", "a/b", "alpine:latest", "alp ine", "Alpine"] {
        assert!(
            validate_image_name(name).is_err(),
            "'{}' should be rejected",
            name
        );
    }
}
