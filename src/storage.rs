//! # Image Store Layout
//!
//! Deterministic on-disk layout for pulled images under the user's data
//! directory:
//!
//! ```text
//! $HOME/.local/share/gocker/images/
//! └── <image>/
//!     ├── rootfs/          extracted image filesystem
//!     └── .config.json     persisted image config
//! ```
//!
//! A pull owns the whole `<image>/` directory: [`ImageStore::reset`]
//! removes it recursively and recreates an empty `rootfs/` before any
//! layer is extracted. On a failed pull the directory contents are
//! undefined and the caller must re-pull.

use crate::constants::{validate_image_name, CONFIG_FILE, RELATIVE_IMAGES_PATH, ROOTFS_DIR};
use crate::error::{Error, Result};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Image store rooted at `$HOME/.local/share/gocker/images`.
#[derive(Debug, Clone)]
pub struct ImageStore {
    base_dir: PathBuf,
}

impl ImageStore {
    /// Creates a store rooted at the default location under the user's
    /// home directory.
    pub fn new() -> Result<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| Error::StoreUnavailable("home directory not set".to_string()))?;

        Ok(Self {
            base_dir: home.join(RELATIVE_IMAGES_PATH),
        })
    }

    /// Creates a store rooted at a specific directory.
    pub fn with_base(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Returns the store's base directory.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Returns the directory for the given image.
    pub fn image_dir(&self, name: &str) -> PathBuf {
        self.base_dir.join(name)
    }

    /// Returns the rootfs directory for the given image.
    pub fn rootfs_dir(&self, name: &str) -> PathBuf {
        self.image_dir(name).join(ROOTFS_DIR)
    }

    /// Returns the persisted config path for the given image.
    pub fn config_path(&self, name: &str) -> PathBuf {
        self.image_dir(name).join(CONFIG_FILE)
    }

    /// Removes any existing data for the image and recreates an empty
    /// `rootfs/` with mode 0755. Returns the rootfs path.
    ///
    /// Not atomic across failures: a pull that dies after this point
    /// leaves a partially populated directory behind.
    pub fn reset(&self, name: &str) -> Result<PathBuf> {
        validate_image_name(name).map_err(|reason| Error::InvalidImageName {
            name: name.to_string(),
            reason: reason.to_string(),
        })?;

        let image_dir = self.image_dir(name);
        if image_dir.exists() {
            debug!("Removing existing image dir: {}", image_dir.display());
            fs::remove_dir_all(&image_dir).map_err(|e| Error::Filesystem {
                path: image_dir.clone(),
                reason: e.to_string(),
            })?;
        }

        let rootfs = self.rootfs_dir(name);
        fs::create_dir_all(&rootfs).map_err(|e| Error::Filesystem {
            path: rootfs.clone(),
            reason: e.to_string(),
        })?;

        for dir in [&image_dir, &rootfs] {
            fs::set_permissions(dir, fs::Permissions::from_mode(0o755)).map_err(|e| {
                Error::Filesystem {
                    path: dir.clone(),
                    reason: e.to_string(),
                }
            })?;
        }

        debug!("Image rootfs created at: {}", rootfs.display());
        Ok(rootfs)
    }
}
