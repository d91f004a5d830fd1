//! # Registry Wire Types
//!
//! Typed representations of the documents exchanged with a Docker registry:
//! the auth token response, image manifests (schema v2), multi-platform
//! manifest indexes, and the image config blob.
//!
//! ## Round-Trip Preservation
//!
//! [`ImageConfig`] is persisted back to disk after a pull. Fields the
//! runtime does not interpret are captured in flattened maps so the
//! re-serialized `.config.json` keeps everything the registry sent.

use serde::{Deserialize, Serialize};

/// Token response from the Docker Hub auth service.
///
/// The token is an opaque bearer credential scoped to one repository pull.
/// It lives for the duration of a single pull operation and is never
/// persisted.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

/// Content descriptor: a blob reference by media type, size, and digest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub media_type: String,
    #[serde(default)]
    pub size: u64,
    pub digest: String,
}

/// Platform-specific image manifest (schema v2).
///
/// `layers` are ordered base-to-top; extraction must apply them in this
/// order for overlay semantics to hold.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    #[serde(default)]
    pub schema_version: u32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub media_type: String,
    pub config: Descriptor,
    #[serde(default)]
    pub layers: Vec<Descriptor>,
}

/// Multi-platform manifest index (OCI index or Docker manifest list).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestIndex {
    #[serde(default)]
    pub schema_version: u32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub media_type: String,
    #[serde(default)]
    pub manifests: Vec<IndexEntry>,
}

/// One entry of a [`ManifestIndex`], mapping a platform to a manifest digest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexEntry {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub media_type: String,
    pub digest: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<PlatformSpec>,
}

/// Platform selector inside an index entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformSpec {
    #[serde(default)]
    pub architecture: String,
    #[serde(default)]
    pub os: String,
}

/// Image config blob.
///
/// Only `config` is interpreted at run time; everything else
/// (architecture, history, rootfs diff IDs, ...) is carried in `extra`
/// purely so the persisted file round-trips.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageConfig {
    #[serde(default)]
    pub config: RuntimeConfig,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Runtime subset of the image config (Docker-capitalized keys).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(rename = "Hostname", default, skip_serializing_if = "String::is_empty")]
    pub hostname: String,
    #[serde(rename = "User", default, skip_serializing_if = "String::is_empty")]
    pub user: String,
    #[serde(rename = "Env", default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<String>,
    #[serde(rename = "Cmd", default, skip_serializing_if = "Vec::is_empty")]
    pub cmd: Vec<String>,
    #[serde(rename = "Entrypoint", default, skip_serializing_if = "Vec::is_empty")]
    pub entrypoint: Vec<String>,
    #[serde(rename = "WorkingDir", default, skip_serializing_if = "String::is_empty")]
    pub working_dir: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Checks that a digest has the form `sha256:` + 64 hex characters.
///
/// Digests are interpolated into blob URLs and compared against computed
/// hashes, so anything else is rejected before use.
pub fn is_valid_digest(digest: &str) -> bool {
    match digest.strip_prefix("sha256:") {
        Some(hash) => hash.len() == 64 && hash.chars().all(|c| c.is_ascii_hexdigit()),
        None => false,
    }
}
