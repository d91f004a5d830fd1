//! Constants for the container engine.
//!
//! All endpoints, limits, and well-known file names are defined here to
//! ensure consistency and prevent magic strings throughout the codebase.

// =============================================================================
// Registry Endpoints
// =============================================================================

/// Docker Hub token service base URL.
pub const DEFAULT_AUTH_BASE: &str = "https://auth.docker.io";

/// Docker Hub registry base URL.
pub const DEFAULT_REGISTRY_BASE: &str = "https://registry-1.docker.io";

/// Service name presented to the token endpoint.
pub const AUTH_SERVICE: &str = "registry.docker.io";

/// Repository namespace for official images.
pub const DEFAULT_REPOSITORY_PREFIX: &str = "library";

/// Tag used when the caller does not supply one.
pub const DEFAULT_TAG: &str = "latest";

// =============================================================================
// Media Types
// =============================================================================

/// Accept header value for manifest requests (Docker schema v2).
pub const MANIFEST_ACCEPT: &str = "application/vnd.docker.distribution.manifest.v2+json";

/// OCI Image Index media type.
pub const OCI_IMAGE_INDEX_MEDIA_TYPE: &str = "application/vnd.oci.image.index.v1+json";

/// Docker manifest list media type.
pub const DOCKER_MANIFEST_LIST_MEDIA_TYPE: &str =
    "application/vnd.docker.distribution.manifest.list.v2+json";

// =============================================================================
// Image Store Layout
// =============================================================================

/// Images directory relative to the user's home directory.
pub const RELATIVE_IMAGES_PATH: &str = ".local/share/gocker/images";

/// Subdirectory holding the extracted image filesystem.
pub const ROOTFS_DIR: &str = "rootfs";

/// Persisted image config file name.
pub const CONFIG_FILE: &str = ".config.json";

// =============================================================================
// Pull Limits
// =============================================================================

/// Maximum number of layers in an image manifest.
pub const MAX_LAYERS: usize = 128;

/// Maximum size of a single compressed layer (512 MiB).
/// Layers are buffered in memory until digest verification succeeds.
pub const MAX_LAYER_SIZE: u64 = 512 * 1024 * 1024;

/// Valid characters for image names.
///
/// The image name is interpolated into store paths and registry URLs,
/// so anything outside this set is rejected up front.
pub const IMAGE_NAME_VALID_CHARS: &str = "abcdefghijklmnopqrstuvwxyz0123456789._-";

// =============================================================================
// Runtime
// =============================================================================

/// Cgroup v2 unified hierarchy mount point.
pub const CGROUP_ROOT: &str = "/sys/fs/cgroup";

/// Prefix for per-invocation cgroup directories (`gocker<pid>`).
pub const CGROUP_NAME_PREFIX: &str = "gocker";

/// Container memory limit written to `memory.max`.
pub const CGROUP_MEMORY_MAX: &str = "50M";

/// Container CPU limit written to `cpu.max` ("<max> <period>" in
/// microseconds; 20000/100000 is 20% of one CPU).
pub const CGROUP_CPU_MAX: &str = "20000 100000";

/// Sentinel environment variable discriminating the runner's two phases.
/// Unset in the parent, `1` in the re-exec'd child.
pub const CHILD_ENV: &str = "IS_CHILD";

/// Minimal base environment for the containerized process. Image config
/// entries are appended after these and shadow them per standard env
/// semantics.
pub const BASE_ENV: [&str; 4] = [
    "HOME=/root",
    "USER=root",
    "SHELL=/bin/sh",
    "TERM=xterm",
];

/// Hostname suffix applied when the image config does not set one.
pub const HOSTNAME_SUFFIX: &str = "-container";

/// Validates an image name against [`IMAGE_NAME_VALID_CHARS`].
///
/// Returns a static reason string on rejection so callers can wrap it in
/// their own error variant.
pub fn validate_image_name(name: &str) -> Result<(), &'static str> {
    if name.is_empty() {
        return Err("image name is empty");
    }
    if !name.chars().all(|c| IMAGE_NAME_VALID_CHARS.contains(c)) {
        return Err("image name contains invalid characters");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_image_name() {
        assert!(validate_image_name("alpine").is_ok());
        assert!(validate_image_name("hello-world").is_ok());
        assert!(validate_image_name("registry.local").is_ok());

        assert!(validate_image_name("").is_err());
        assert!(validate_image_name("../etc").is_err());
        assert!(validate_image_name("Alpine").is_err());
        assert!(validate_image_name("a b").is_err());
    }
}
