//! # Docker Hub Image Puller
//!
//! Pulls an image from the Docker Hub registry into the local image store:
//!
//! 1. **Auth**: fetch a pull-scoped bearer token from the token service
//! 2. **Manifest**: fetch the manifest, resolving a multi-platform index
//!    to the host platform's entry when one is returned
//! 3. **Reset**: wipe and recreate the image's store directory
//! 4. **Download**: fetch all layer blobs concurrently, verifying each
//!    SHA-256 digest over the raw compressed bytes before it is accepted
//! 5. **Extract**: apply the layers serially in manifest order
//!    (gzip → tar) into `rootfs/`
//! 6. **Config**: fetch the config blob and persist it as `.config.json`
//!
//! ## Concurrency Model
//!
//! Layer downloads run as one task per manifest entry. The tasks share a
//! buffer map under a mutex and a [`CancellationToken`]; the first failure
//! fills a single-slot error channel and cancels the token, and the other
//! tasks abort promptly. Extraction starts only after every download has
//! finished, because overlay semantics depend on manifest order.
//!
//! ## Security Model
//!
//! - Image names and every digest are validated before they are
//!   interpolated into URLs or store paths
//! - Layer bytes are buffered and digest-verified before any filesystem
//!   change is made for that layer
//! - Tar entry targets are normalized component-by-component; entries that
//!   would escape the rootfs are skipped
//! - Layer count and advertised sizes are bounded by `MAX_LAYERS` and
//!   `MAX_LAYER_SIZE`
//!
//! Whiteout entries (`.wh.*`) are not interpreted; a layer that deletes
//! files from an earlier layer leaves them in place.

use crate::constants::{
    validate_image_name, AUTH_SERVICE, DEFAULT_AUTH_BASE, DEFAULT_REGISTRY_BASE,
    DEFAULT_REPOSITORY_PREFIX, DEFAULT_TAG, DOCKER_MANIFEST_LIST_MEDIA_TYPE, MANIFEST_ACCEPT,
    MAX_LAYERS, MAX_LAYER_SIZE, OCI_IMAGE_INDEX_MEDIA_TYPE,
};
use crate::error::{Error, Result};
use crate::http::HttpClient;
use crate::manifest::{is_valid_digest, ImageConfig, Manifest, ManifestIndex, TokenResponse};
use crate::platform::Platform;
use crate::storage::ImageStore;
use flate2::read::GzDecoder;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex};
use tar::{Archive, EntryType};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Reference to an official Docker Hub image. Immutable after construction.
#[derive(Debug, Clone)]
pub struct ImageRef {
    /// Image name as given on the command line (e.g. `alpine`).
    pub name: String,
    /// Tag; always the default, the CLI does not accept one.
    pub tag: String,
    /// Repository path on the registry (`library/<name>`).
    pub repository: String,
}

impl ImageRef {
    /// Creates a reference for an official image, defaulting the tag.
    pub fn new(name: &str) -> Result<Self> {
        validate_image_name(name).map_err(|reason| Error::InvalidImageName {
            name: name.to_string(),
            reason: reason.to_string(),
        })?;

        Ok(Self {
            name: name.to_string(),
            tag: DEFAULT_TAG.to_string(),
            repository: format!("{}/{}", DEFAULT_REPOSITORY_PREFIX, name),
        })
    }
}

/// Pulls and unpacks one image per instance.
pub struct ImagePuller {
    image: ImageRef,
    store: ImageStore,
    http: HttpClient,
    platform: Platform,
    auth_base: String,
    registry_base: String,
}

impl ImagePuller {
    /// Creates a puller against Docker Hub and the default image store.
    pub fn new(name: &str) -> Result<Self> {
        Self::with_endpoints(
            name,
            ImageStore::new()?,
            DEFAULT_AUTH_BASE,
            DEFAULT_REGISTRY_BASE,
        )
    }

    /// Creates a puller against specific endpoints and store.
    ///
    /// The endpoint bases exist so tests can point the puller at a fixture
    /// registry; production callers use [`ImagePuller::new`].
    pub fn with_endpoints(
        name: &str,
        store: ImageStore,
        auth_base: &str,
        registry_base: &str,
    ) -> Result<Self> {
        Ok(Self {
            image: ImageRef::new(name)?,
            store,
            http: HttpClient::new()?,
            platform: Platform::detect(),
            auth_base: auth_base.trim_end_matches('/').to_string(),
            registry_base: registry_base.trim_end_matches('/').to_string(),
        })
    }

    /// Returns the image reference this puller was built for.
    pub fn image(&self) -> &ImageRef {
        &self.image
    }

    fn auth_url(&self) -> String {
        format!(
            "{}/token?service={}&scope=repository:{}:pull",
            self.auth_base, AUTH_SERVICE, self.image.repository
        )
    }

    fn manifest_url(&self, reference: &str) -> String {
        format!(
            "{}/v2/{}/manifests/{}",
            self.registry_base, self.image.repository, reference
        )
    }

    fn blob_url(&self, digest: &str) -> String {
        format!(
            "{}/v2/{}/blobs/{}",
            self.registry_base, self.image.repository, digest
        )
    }

    /// Performs the whole pull sequence.
    ///
    /// On success the image's store directory holds a fully extracted
    /// `rootfs/` and a readable `.config.json`. On failure the directory
    /// contents are undefined; re-pull to recover.
    pub async fn pull(&self) -> Result<()> {
        println!(
            "Pulling from {} using default tag: {}",
            self.image.repository, self.image.tag
        );

        let token = self.authenticate().await?;
        let manifest = self.fetch_manifest(&token).await?;
        let rootfs = self.store.reset(&self.image.name)?;
        let buffers = self.download_layers(&token, &manifest).await?;
        self.extract_image(&manifest, &buffers, &rootfs)?;
        self.fetch_config(&token, &manifest).await?;

        println!(
            "Status: Downloaded image for {}:{}",
            self.image.name, self.image.tag
        );
        Ok(())
    }

    /// Retrieves a pull-scoped access token from the auth service.
    async fn authenticate(&self) -> Result<String> {
        let response: TokenResponse = self.http.get_json(&self.auth_url(), &[]).await?;
        Ok(response.token)
    }

    /// Retrieves the image manifest, resolving a manifest index to the
    /// host platform's entry when the registry returns one.
    async fn fetch_manifest(&self, token: &str) -> Result<Manifest> {
        let url = self.manifest_url(&self.image.tag);
        let auth = format!("Bearer {}", token);
        let headers = [("Authorization", auth.as_str()), ("Accept", MANIFEST_ACCEPT)];

        let response = self.http.get(&url, &headers).await?;
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|value| value.to_str().ok())
            .map(|value| value.split(';').next().unwrap_or("").trim().to_string())
            .unwrap_or_default();
        let body = HttpClient::read_body(&url, response).await?;

        let manifest = if content_type == OCI_IMAGE_INDEX_MEDIA_TYPE
            || content_type == DOCKER_MANIFEST_LIST_MEDIA_TYPE
        {
            let index: ManifestIndex =
                serde_json::from_slice(&body).map_err(|e| Error::Decode {
                    what: "manifest index".to_string(),
                    reason: e.to_string(),
                })?;

            info!(
                "Received index, contains {} platform manifests",
                index.manifests.len()
            );
            self.resolve_index(&index, &auth).await?
        } else {
            serde_json::from_slice(&body).map_err(|e| Error::Decode {
                what: "image manifest".to_string(),
                reason: e.to_string(),
            })?
        };

        self.validate_manifest(&manifest)?;
        info!("Found {} layers to download", manifest.layers.len());
        Ok(manifest)
    }

    /// Picks the first index entry matching the host platform and fetches
    /// the manifest it points at.
    async fn resolve_index(&self, index: &ManifestIndex, auth: &str) -> Result<Manifest> {
        let os = self.platform.os_name();
        let arch = self.platform.arch_name();

        let entry = index
            .manifests
            .iter()
            .find(|entry| {
                entry
                    .platform
                    .as_ref()
                    .is_some_and(|p| p.os == os && p.architecture == arch)
            })
            .ok_or_else(|| Error::PlatformUnavailable {
                os: os.to_string(),
                arch: arch.to_string(),
            })?;

        if !is_valid_digest(&entry.digest) {
            return Err(Error::InvalidManifest {
                reference: self.image.repository.clone(),
                reason: format!("malformed index entry digest '{}'", entry.digest),
            });
        }

        debug!("Digest for {}/{}: {}", os, arch, entry.digest);

        let url = self.manifest_url(&entry.digest);
        let headers = [("Authorization", auth), ("Accept", MANIFEST_ACCEPT)];
        self.http.get_json(&url, &headers).await
    }

    /// Rejects manifests that violate pull limits or carry malformed
    /// digests, before any of them reach a URL or the filesystem.
    fn validate_manifest(&self, manifest: &Manifest) -> Result<()> {
        if manifest.layers.len() > MAX_LAYERS {
            return Err(Error::InvalidManifest {
                reference: self.image.repository.clone(),
                reason: format!("too many layers: {} > {}", manifest.layers.len(), MAX_LAYERS),
            });
        }

        if !is_valid_digest(&manifest.config.digest) {
            return Err(Error::InvalidManifest {
                reference: self.image.repository.clone(),
                reason: format!("malformed config digest '{}'", manifest.config.digest),
            });
        }

        for layer in &manifest.layers {
            if !is_valid_digest(&layer.digest) {
                return Err(Error::InvalidManifest {
                    reference: self.image.repository.clone(),
                    reason: format!("malformed layer digest '{}'", layer.digest),
                });
            }
            if layer.size > MAX_LAYER_SIZE {
                return Err(Error::InvalidManifest {
                    reference: self.image.repository.clone(),
                    reason: format!(
                        "layer {} exceeds size limit: {} > {}",
                        layer.digest, layer.size, MAX_LAYER_SIZE
                    ),
                });
            }
        }

        Ok(())
    }

    /// Downloads all layers concurrently into a `digest → bytes` map.
    ///
    /// The first failing task publishes its error on a single-slot channel
    /// and fires the shared cancellation token; the remaining tasks observe
    /// it and abort. Completion order is unspecified, the map makes
    /// ordering irrelevant.
    async fn download_layers(
        &self,
        token: &str,
        manifest: &Manifest,
    ) -> Result<HashMap<String, Vec<u8>>> {
        let buffers = Arc::new(Mutex::new(HashMap::new()));
        if manifest.layers.is_empty() {
            return Ok(HashMap::new());
        }

        let cancel = CancellationToken::new();
        let (err_tx, mut err_rx) = mpsc::channel::<Error>(1);
        let total = manifest.layers.len();

        for (index, layer) in manifest.layers.iter().enumerate() {
            let http = self.http.clone();
            let url = self.blob_url(&layer.digest);
            let auth = format!("Bearer {}", token);
            let digest = layer.digest.clone();
            let cancel = cancel.clone();
            let err_tx = err_tx.clone();
            let buffers = Arc::clone(&buffers);

            tokio::spawn(async move {
                info!("Downloading layer {}/{}...", index + 1, total);

                if let Err(e) = download_layer(&http, &cancel, &url, &auth, &digest, &buffers).await
                {
                    // Only the first error wins the slot and cancels the rest
                    if err_tx.try_send(e).is_ok() {
                        cancel.cancel();
                    }
                }
            });
        }
        drop(err_tx);

        // Resolves with the first error as soon as it is published, or with
        // `None` once every task has finished and dropped its sender.
        if let Some(err) = err_rx.recv().await {
            return Err(err);
        }

        let mut buffers = buffers
            .lock()
            .map_err(|_| Error::Internal("layer buffer lock poisoned".to_string()))?;
        Ok(std::mem::take(&mut *buffers))
    }

    /// Extracts the buffered layers serially in manifest order.
    fn extract_image(
        &self,
        manifest: &Manifest,
        buffers: &HashMap<String, Vec<u8>>,
        rootfs: &Path,
    ) -> Result<()> {
        for (index, layer) in manifest.layers.iter().enumerate() {
            let data = buffers.get(&layer.digest).ok_or_else(|| {
                Error::Internal(format!("layer data for {} not found", layer.digest))
            })?;

            debug!(
                "Extracting layer {}/{} ({})",
                index + 1,
                manifest.layers.len(),
                layer.digest
            );

            extract_layer(data, rootfs).map_err(|e| Error::LayerExtraction {
                digest: layer.digest.clone(),
                reason: e.to_string(),
            })?;
        }

        Ok(())
    }

    /// Fetches the config blob and persists it as indented JSON.
    async fn fetch_config(&self, token: &str, manifest: &Manifest) -> Result<()> {
        info!("Downloading config file...");

        let url = self.blob_url(&manifest.config.digest);
        let auth = format!("Bearer {}", token);
        let headers = [("Authorization", auth.as_str())];

        let config: ImageConfig = self.http.get_json(&url, &headers).await?;

        let data = serde_json::to_string_pretty(&config).map_err(|e| Error::Decode {
            what: "image config".to_string(),
            reason: e.to_string(),
        })?;

        let path = self.store.config_path(&self.image.name);
        fs::write(&path, data).map_err(|e| Error::Filesystem {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).map_err(|e| {
            Error::Filesystem {
                path,
                reason: e.to_string(),
            }
        })?;

        Ok(())
    }
}

/// Downloads a single layer blob and verifies its digest before the bytes
/// become visible in the shared buffer map.
async fn download_layer(
    http: &HttpClient,
    cancel: &CancellationToken,
    url: &str,
    auth: &str,
    digest: &str,
    buffers: &Mutex<HashMap<String, Vec<u8>>>,
) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }

    let headers = [("Authorization", auth)];
    let response = http.get_with_cancel(cancel, url, &headers).await?;
    let data = HttpClient::read_body_with_cancel(cancel, url, response).await?;

    let computed = format!("sha256:{}", hex::encode(Sha256::digest(&data)));
    if computed != digest {
        return Err(Error::DigestMismatch {
            expected: digest.to_string(),
            computed,
        });
    }

    debug!("Layer {} verified ({} bytes)", digest, data.len());

    buffers
        .lock()
        .map_err(|_| Error::Internal("layer buffer lock poisoned".to_string()))?
        .insert(digest.to_string(), data);

    Ok(())
}

/// Unpacks one gzipped tar layer into the rootfs.
///
/// Entry handling follows overlay extraction rules:
/// - entries whose normalized target escapes the rootfs are skipped
/// - directories are created recursively with the entry's mode
/// - regular files are created (`O_CREATE|O_RDWR`) with the entry's mode
///   and the tar body copied in; parent directories appear as 0755
/// - symlinks and hardlinks that already exist are silently kept;
///   hardlink sources resolve inside the rootfs
/// - all other entry types (devices, fifos, whiteouts) are ignored
pub fn extract_layer(data: &[u8], rootfs: &Path) -> Result<()> {
    let decoder = GzDecoder::new(data);
    let mut archive = Archive::new(decoder);

    let entries = archive.entries().map_err(|e| Error::Decode {
        what: "tar archive".to_string(),
        reason: e.to_string(),
    })?;

    for entry in entries {
        let mut entry = entry.map_err(|e| Error::Decode {
            what: "tar entry".to_string(),
            reason: e.to_string(),
        })?;

        let path = entry
            .path()
            .map_err(|e| Error::Decode {
                what: "tar entry path".to_string(),
                reason: e.to_string(),
            })?
            .into_owned();

        let Some(target) = secure_join(rootfs, &path) else {
            debug!("Skipping entry escaping rootfs: {}", path.display());
            continue;
        };

        let mode = entry.header().mode().unwrap_or(0o644) & 0o7777;

        match entry.header().entry_type() {
            EntryType::Directory => {
                fs::create_dir_all(&target).map_err(|e| filesystem_error(&target, e))?;
                fs::set_permissions(&target, fs::Permissions::from_mode(mode))
                    .map_err(|e| filesystem_error(&target, e))?;
            }
            EntryType::Regular => {
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent).map_err(|e| filesystem_error(parent, e))?;
                }

                let mut file = fs::OpenOptions::new()
                    .create(true)
                    .read(true)
                    .write(true)
                    .mode(mode)
                    .open(&target)
                    .map_err(|e| filesystem_error(&target, e))?;

                io::copy(&mut entry, &mut file).map_err(|e| filesystem_error(&target, e))?;
            }
            EntryType::Symlink => {
                let link = entry.link_name().map_err(|e| Error::Decode {
                    what: "tar symlink target".to_string(),
                    reason: e.to_string(),
                })?;
                let Some(link) = link else { continue };

                match std::os::unix::fs::symlink(&link, &target) {
                    Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
                    result => result.map_err(|e| filesystem_error(&target, e))?,
                }
            }
            EntryType::Link => {
                let link = entry.link_name().map_err(|e| Error::Decode {
                    what: "tar hardlink target".to_string(),
                    reason: e.to_string(),
                })?;
                let Some(link) = link else { continue };

                let Some(source) = secure_join(rootfs, &link) else {
                    debug!("Skipping hardlink escaping rootfs: {}", link.display());
                    continue;
                };

                match fs::hard_link(&source, &target) {
                    Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
                    result => result.map_err(|e| filesystem_error(&target, e))?,
                }
            }
            _ => {}
        }
    }

    Ok(())
}

fn filesystem_error(path: &Path, source: io::Error) -> Error {
    Error::Filesystem {
        path: path.to_path_buf(),
        reason: source.to_string(),
    }
}

/// Joins a tar entry path onto the rootfs, normalizing components.
///
/// Returns `None` when the entry would escape the rootfs via `..`.
/// Absolute entry names are treated as relative to the rootfs. A naive
/// string prefix check is insufficient here; normalization happens per
/// component.
fn secure_join(rootfs: &Path, relative: &Path) -> Option<PathBuf> {
    let mut target = rootfs.to_path_buf();
    let mut depth = 0usize;

    for component in relative.components() {
        match component {
            Component::Normal(part) => {
                target.push(part);
                depth += 1;
            }
            Component::ParentDir => {
                if depth == 0 {
                    return None;
                }
                target.pop();
                depth -= 1;
            }
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
        }
    }

    Some(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_puller() -> ImagePuller {
        let store = ImageStore::with_base(PathBuf::from("/tmp/gocker-test"));
        ImagePuller::with_endpoints(
            "alpine",
            store,
            "https://auth.example/",
            "https://registry.example",
        )
        .unwrap()
    }

    #[test]
    fn test_image_ref_defaults() {
        let image = ImageRef::new("alpine").unwrap();
        assert_eq!(image.name, "alpine");
        assert_eq!(image.tag, "latest");
        assert_eq!(image.repository, "library/alpine");
    }

    #[test]
    fn test_image_ref_rejects_invalid_names() {
        assert!(ImageRef::new("").is_err());
        assert!(ImageRef::new("../etc").is_err());
        assert!(ImageRef::new("UPPER").is_err());
    }

    #[test]
    fn test_url_construction() {
        let puller = test_puller();

        assert_eq!(
            puller.auth_url(),
            "https://auth.example/token?service=registry.docker.io&scope=repository:library/alpine:pull"
        );
        assert_eq!(
            puller.manifest_url("latest"),
            "https://registry.example/v2/library/alpine/manifests/latest"
        );
        assert_eq!(
            puller.blob_url("sha256:abcd"),
            "https://registry.example/v2/library/alpine/blobs/sha256:abcd"
        );
    }

    #[test]
    fn test_secure_join_normalizes() {
        let rootfs = Path::new("/images/alpine/rootfs");

        assert_eq!(
            secure_join(rootfs, Path::new("etc/os-release")).unwrap(),
            rootfs.join("etc/os-release")
        );
        assert_eq!(
            secure_join(rootfs, Path::new("./usr/./bin/sh")).unwrap(),
            rootfs.join("usr/bin/sh")
        );
        assert_eq!(
            secure_join(rootfs, Path::new("usr/../etc/passwd")).unwrap(),
            rootfs.join("etc/passwd")
        );
        // Absolute names land inside the rootfs
        assert_eq!(
            secure_join(rootfs, Path::new("/etc/passwd")).unwrap(),
            rootfs.join("etc/passwd")
        );
    }

    #[test]
    fn test_secure_join_rejects_escapes() {
        let rootfs = Path::new("/images/alpine/rootfs");

        assert!(secure_join(rootfs, Path::new("../../etc/passwd")).is_none());
        assert!(secure_join(rootfs, Path::new("usr/../../escape")).is_none());
    }

    #[test]
    fn test_validate_manifest_limits() {
        let puller = test_puller();
        let digest = format!("sha256:{}", "ab".repeat(32));

        let manifest = Manifest {
            schema_version: 2,
            media_type: String::new(),
            config: crate::manifest::Descriptor {
                media_type: String::new(),
                size: 100,
                digest: digest.clone(),
            },
            layers: vec![crate::manifest::Descriptor {
                media_type: String::new(),
                size: MAX_LAYER_SIZE + 1,
                digest,
            }],
        };

        let result = puller.validate_manifest(&manifest);
        assert!(result.is_err(), "oversized layer should be rejected");
    }

    #[test]
    fn test_extract_layer_rejects_bad_gzip() {
        let temp = TempDir::new().unwrap();
        let result = extract_layer(b"definitely not gzip", temp.path());
        assert!(result.is_err());
    }
}
