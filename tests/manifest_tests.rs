//! Tests for registry wire types.
//!
//! Validates decoding of real-shaped registry documents and the
//! round-trip guarantee for persisted image configs.

use gocker::{is_valid_digest, ImageConfig, Manifest, ManifestIndex, TokenResponse};

// =============================================================================
// Token Response
// =============================================================================

#[test]
fn test_token_response_decode() {
    let json = r#"{"token":"abc123","expires_in":300,"issued_at":"2024-01-01T00:00:00Z"}"#;

    let response: TokenResponse = serde_json::from_str(json).unwrap();
    assert_eq!(response.token, "abc123");
}

// =============================================================================
// Manifest
// =============================================================================

#[test]
fn test_manifest_decode_layer_order_preserved() {
    let json = r#"{
        "schemaVersion": 2,
        "config": { "digest": "sha256:0000000000000000000000000000000000000000000000000000000000000000" },
        "layers": [
            { "digest": "sha256:1111111111111111111111111111111111111111111111111111111111111111", "size": 10 },
            { "digest": "sha256:2222222222222222222222222222222222222222222222222222222222222222", "size": 20 },
            { "digest": "sha256:3333333333333333333333333333333333333333333333333333333333333333", "size": 30 }
        ]
    }"#;

    let manifest: Manifest = serde_json::from_str(json).unwrap();

    // Base-to-top order must survive decoding; extraction depends on it
    let digests: Vec<&str> = manifest
        .layers
        .iter()
        .map(|layer| layer.digest.as_str())
        .collect();
    assert!(digests[0].starts_with("sha256:1111"));
    assert!(digests[1].starts_with("sha256:2222"));
    assert!(digests[2].starts_with("sha256:3333"));
}

#[test]
fn test_manifest_decode_empty_layers() {
    let json = r#"{
        "schemaVersion": 2,
        "config": { "digest": "sha256:0000000000000000000000000000000000000000000000000000000000000000" }
    }"#;

    let manifest: Manifest = serde_json::from_str(json).unwrap();
    assert!(manifest.layers.is_empty());
}

#[test]
fn test_manifest_decode_rejects_missing_config() {
    let json = r#"{ "schemaVersion": 2, "layers": [] }"#;

    let result: Result<Manifest, _> = serde_json::from_str(json);
    assert!(result.is_err(), "manifest without config should not decode");
}

// =============================================================================
// Manifest Index
// =============================================================================

#[test]
fn test_index_decode_with_platforms() {
    let json = r#"{
        "schemaVersion": 2,
        "mediaType": "application/vnd.docker.distribution.manifest.list.v2+json",
        "manifests": [
            { "digest": "sha256:aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa",
              "platform": { "architecture": "amd64", "os": "linux" } },
            { "digest": "sha256:bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb",
              "platform": { "architecture": "arm64", "os": "linux", "variant": "v8" } },
            { "digest": "sha256:cccccccccccccccccccccccccccccccccccccccccccccccccccccccccccccccc" }
        ]
    }"#;

    let index: ManifestIndex = serde_json::from_str(json).unwrap();
    assert_eq!(index.manifests.len(), 3);

    // Entries without a platform decode as None rather than failing
    assert!(index.manifests[2].platform.is_none());

    // Unknown platform fields (variant) are tolerated
    let arm = index.manifests[1].platform.as_ref().unwrap();
    assert_eq!(arm.architecture, "arm64");
}

// =============================================================================
// Image Config Round-Trip
// =============================================================================

#[test]
fn test_image_config_runtime_fields() {
    let json = r#"{
        "config": {
            "Hostname": "webserver",
            "Env": ["PATH=/usr/sbin:/usr/bin", "NGINX_VERSION=1.25"],
            "Cmd": ["nginx", "-g", "daemon off;"],
            "WorkingDir": "/usr/share/nginx"
        }
    }"#;

    let config: ImageConfig = serde_json::from_str(json).unwrap();
    assert_eq!(config.config.hostname, "webserver");
    assert_eq!(config.config.env.len(), 2);
    assert_eq!(config.config.cmd[0], "nginx");
    assert_eq!(config.config.working_dir, "/usr/share/nginx");
}

#[test]
fn test_image_config_defaults_for_absent_fields() {
    let config: ImageConfig = serde_json::from_str(r#"{ "config": {} }"#).unwrap();

    assert!(config.config.hostname.is_empty());
    assert!(config.config.working_dir.is_empty());
    assert!(config.config.env.is_empty());
}

#[test]
fn test_image_config_round_trip_preserves_everything() {
    let original = r#"{
        "architecture": "amd64",
        "config": {
            "Env": ["PATH=/bin"],
            "Labels": { "maintainer": "someone" },
            "WorkingDir": "/srv"
        },
        "created": "2024-05-01T10:00:00Z",
        "history": [ { "created_by": "RUN apk add curl" } ],
        "os": "linux",
        "rootfs": {
            "type": "layers",
            "diff_ids": ["sha256:dddddddddddddddddddddddddddddddddddddddddddddddddddddddddddddddd"]
        }
    }"#;

    let config: ImageConfig = serde_json::from_str(original).unwrap();
    let reencoded = serde_json::to_string_pretty(&config).unwrap();
    let decoded_again: serde_json::Value = serde_json::from_str(&reencoded).unwrap();
    let original_value: serde_json::Value = serde_json::from_str(original).unwrap();

    // Persisting then re-reading must lose nothing the registry sent
    assert_eq!(decoded_again, original_value);
}

// =============================================================================
// Digest Validation
// =============================================================================

#[test]
fn test_valid_digest_shapes() {
    assert!(is_valid_digest(&format!("sha256:{}", "0f".repeat(32))));
    assert!(is_valid_digest(&format!("sha256:{}", "a".repeat(64))));
}

#[test]
fn test_invalid_digest_shapes() {
    // Wrong algorithm, wrong length, bad characters, missing prefix
    assert!(!is_valid_digest(&format!("sha512:{}", "a".repeat(64))));
    assert!(!is_valid_digest("sha256:abc"));
    assert!(!is_valid_digest(&format!("sha256:{}", "g".repeat(64))));
    assert!(!is_valid_digest(&"a".repeat(64)));
    assert!(!is_valid_digest(""));
    assert!(!is_valid_digest("sha256:../../../etc/passwd"));
}
