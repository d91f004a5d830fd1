//! # Container Assembly
//!
//! Builds the runtime parameters for one container invocation from the
//! image's persisted `.config.json`: environment, working directory,
//! hostname, and the per-invocation cgroup path.
//!
//! The environment is the fixed base set (`HOME`, `USER`, `SHELL`, `TERM`)
//! with the image config's `Env` entries appended. Nothing is deduplicated;
//! later entries shadow earlier ones per standard env semantics.

use crate::constants::{
    validate_image_name, BASE_ENV, CGROUP_NAME_PREFIX, CGROUP_ROOT, HOSTNAME_SUFFIX,
};
use crate::error::{Error, Result};
use crate::manifest::ImageConfig;
use crate::storage::ImageStore;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Execution parameters for one container invocation.
///
/// Lifetime is a single `run` call; the struct is consumed by the runner
/// and destroyed on exec or exit.
#[derive(Debug, Clone)]
pub struct Container {
    /// Image the container is created from.
    pub image_name: String,
    /// Extracted image filesystem that becomes `/`.
    pub rootfs: PathBuf,
    /// Per-invocation cgroup directory (`/sys/fs/cgroup/gocker<pid>`).
    pub cgroup_dir: PathBuf,
    /// Target command.
    pub command: String,
    /// Target command arguments.
    pub args: Vec<String>,
    /// Environment in `KEY=VALUE` form, base set plus image config.
    pub env: Vec<String>,
    /// Working directory inside the container.
    pub working_dir: String,
    /// Hostname inside the UTS namespace.
    pub hostname: String,
}

impl Container {
    /// Creates a container for an image in the default store.
    pub fn new(image_name: &str, command: &str, args: Vec<String>) -> Result<Self> {
        Self::with_store(image_name, command, args, &ImageStore::new()?)
    }

    /// Creates a container for an image in a specific store.
    pub fn with_store(
        image_name: &str,
        command: &str,
        args: Vec<String>,
        store: &ImageStore,
    ) -> Result<Self> {
        validate_image_name(image_name).map_err(|reason| Error::InvalidImageName {
            name: image_name.to_string(),
            reason: reason.to_string(),
        })?;

        let config = Self::load_config(&store.config_path(image_name))?;

        let mut env: Vec<String> = BASE_ENV.iter().map(|entry| entry.to_string()).collect();
        env.extend(config.config.env.iter().cloned());

        let working_dir = if config.config.working_dir.is_empty() {
            "/".to_string()
        } else {
            config.config.working_dir.clone()
        };

        let hostname = if config.config.hostname.is_empty() {
            format!("{}{}", image_name, HOSTNAME_SUFFIX)
        } else {
            config.config.hostname.clone()
        };

        let cgroup_dir = PathBuf::from(CGROUP_ROOT).join(format!(
            "{}{}",
            CGROUP_NAME_PREFIX,
            std::process::id()
        ));

        Ok(Self {
            image_name: image_name.to_string(),
            rootfs: store.rootfs_dir(image_name),
            cgroup_dir,
            command: command.to_string(),
            args,
            env,
            working_dir,
            hostname,
        })
    }

    /// Reads and parses the persisted image config.
    fn load_config(path: &Path) -> Result<ImageConfig> {
        let file = File::open(path).map_err(|e| Error::ConfigUnavailable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        serde_json::from_reader(file).map_err(|e| Error::ConfigUnavailable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}
