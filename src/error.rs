//! Error types for the container engine.

use std::path::PathBuf;

/// Result type alias for container engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while pulling or running an image.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    // =========================================================================
    // Registry Errors
    // =========================================================================
    /// Transport failure before a status line was received.
    #[error("request to {url} failed: {reason}")]
    Network { url: String, reason: String },

    /// Non-200 response from the registry.
    #[error("unexpected status {status} from {url}")]
    Http { url: String, status: u16 },

    /// Malformed JSON in a registry response.
    #[error("failed to decode {what}: {reason}")]
    Decode { what: String, reason: String },

    /// Layer bytes do not hash to the advertised digest.
    #[error("digest mismatch for layer {expected}: computed {computed}")]
    DigestMismatch { expected: String, computed: String },

    /// No manifest in the index matches the host platform.
    #[error("no manifest for platform {os}/{arch} in index")]
    PlatformUnavailable { os: String, arch: String },

    /// A concurrent download was aborted by the shared cancellation handle.
    #[error("download cancelled")]
    Cancelled,

    /// Invalid image reference.
    #[error("invalid image name '{name}': {reason}")]
    InvalidImageName { name: String, reason: String },

    /// Manifest violates a pull limit or carries a malformed descriptor.
    #[error("invalid manifest for '{reference}': {reason}")]
    InvalidManifest { reference: String, reason: String },

    // =========================================================================
    // Store / Extraction Errors
    // =========================================================================
    /// Image store could not be located or initialized.
    #[error("image store unavailable: {0}")]
    StoreUnavailable(String),

    /// OS-level file or directory operation failed.
    #[error("filesystem operation failed at {path}: {reason}")]
    Filesystem { path: PathBuf, reason: String },

    /// Layer extraction failed (bad gzip stream or tar header).
    #[error("failed to extract layer {digest}: {reason}")]
    LayerExtraction { digest: String, reason: String },

    // =========================================================================
    // Runtime Errors
    // =========================================================================
    /// Missing or unparseable `.config.json` at run time.
    #[error("container config unavailable at {path}: {reason}")]
    ConfigUnavailable { path: PathBuf, reason: String },

    /// Cgroup setup failed.
    #[error("cgroup setup failed at {path}: {reason}")]
    Cgroup { path: PathBuf, reason: String },

    /// Namespace syscall failed.
    #[error("namespace setup failed: {0}")]
    Namespace(String),

    /// Mount syscall failed.
    #[error("failed to mount {target}: {reason}")]
    Mount { target: String, reason: String },

    /// Change-root failed.
    #[error("failed to change root to {path}: {reason}")]
    Chroot { path: PathBuf, reason: String },

    /// Spawning or waiting on the container process failed.
    #[error("failed to spawn container process: {0}")]
    Spawn(String),

    // =========================================================================
    // I/O Errors
    // =========================================================================
    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// Internal error (should not happen).
    #[error("internal error: {0}")]
    Internal(String),
}
