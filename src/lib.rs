//! # gocker
//!
//! **Minimal Container Engine**
//!
//! Pulls OCI/Docker images from the Docker Hub registry into a
//! content-addressed local store and launches isolated processes from them
//! using Linux namespaces, a change-root, a mounted proc, and a v2 cgroup.
//!
//! # Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          gocker                              │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ImagePuller                      Runner                     │
//! │  auth → manifest → layers ─┐      parent: cgroup + clone     │
//! │  (concurrent, digest-      │      child:  namespaces →       │
//! │   verified) → extract →    │             chroot → /proc →    │
//! │   config                   │             exec                │
//! ├────────────────────────────┼─────────────────────────────────┤
//! │  HttpClient │ wire types   │  Container (env, workdir,       │
//! │  (reqwest)  │ (serde)      │  hostname from .config.json)    │
//! ├────────────────────────────┴─────────────────────────────────┤
//! │  ImageStore:  $HOME/.local/share/gocker/images/<image>/      │
//! │               ├── rootfs/        extracted filesystem        │
//! │               └── .config.json   persisted image config      │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Pull Pipeline
//!
//! Layer downloads run concurrently with per-layer SHA-256 verification
//! over the raw compressed bytes; the first failure cancels the rest.
//! Extraction is strictly serial in manifest order because overlay
//! semantics depend on it. See [`ImagePuller`].
//!
//! # Two-Phase Runner
//!
//! The parent cannot both clone into new namespaces and keep executing its
//! own code inside them, so the runner re-execs `/proc/self/exe` with the
//! `IS_CHILD` sentinel set and finishes setup in the child. See
//! [`Runner`].
//!
//! # Security Properties
//!
//! - Layer bytes are verified against their manifest digest before any
//!   filesystem change is made for that layer
//! - Tar entry targets are normalized; entries escaping the rootfs are
//!   skipped
//! - Container UID/GID 0 map to the invoking user's real IDs (size-1
//!   identity mapping, setgroups disabled)
//! - Fixed resource limits: 50M memory, 20% of one CPU
//!
//! # Example
//!
//! ```rust,ignore
//! use gocker::{Container, ImagePuller, Runner};
//!
//! // Pull (async)
//! let puller = ImagePuller::new("alpine")?;
//! puller.pull().await?;
//!
//! // Run (sync; re-execs itself for the child phase)
//! let container = Container::new("alpine", "echo", vec!["hello".into()])?;
//! let exit_code = Runner::new(container).run()?;
//! std::process::exit(exit_code);
//! ```

mod constants;
mod container;
mod error;
mod http;
mod manifest;
mod platform;
mod registry;
mod runtime;
mod storage;

pub use constants::{
    validate_image_name, BASE_ENV, CGROUP_CPU_MAX, CGROUP_MEMORY_MAX, CGROUP_NAME_PREFIX,
    CGROUP_ROOT, CHILD_ENV, CONFIG_FILE, DEFAULT_AUTH_BASE, DEFAULT_REGISTRY_BASE, DEFAULT_TAG,
    HOSTNAME_SUFFIX, IMAGE_NAME_VALID_CHARS, MANIFEST_ACCEPT, MAX_LAYERS, MAX_LAYER_SIZE,
    RELATIVE_IMAGES_PATH, ROOTFS_DIR,
};
pub use container::Container;
pub use error::{Error, Result};
pub use http::HttpClient;
pub use manifest::{
    is_valid_digest, Descriptor, ImageConfig, IndexEntry, Manifest, ManifestIndex, PlatformSpec,
    RuntimeConfig, TokenResponse,
};
pub use platform::{Arch, Os, Platform};
pub use registry::{extract_layer, ImagePuller, ImageRef};
pub use runtime::Runner;
pub use storage::ImageStore;
