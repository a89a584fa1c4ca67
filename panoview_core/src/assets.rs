//! Asset path resolution.
//!
//! Load commands carry either a `data:` URL (uploads from the control UI) or
//! a path that is looked up in the configured search locations.

use crate::error::{CoreError, CoreResult};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use std::path::{Path, PathBuf};

/// A resolved asset, ready to be handed to the decoding backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetSource {
    /// A file that exists on this node
    File(PathBuf),
    /// Inline bytes decoded from a `data:` URL
    Inline { mime: String, bytes: Vec<u8> },
}

impl AssetSource {
    /// Short description for logs and error messages.
    pub fn describe(&self) -> String {
        match self {
            AssetSource::File(path) => path.display().to_string(),
            AssetSource::Inline { mime, bytes } => format!("inline {} ({} bytes)", mime, bytes.len()),
        }
    }
}

/// Resolves `name` against `search_paths`.
///
/// Data URLs are kept as they are. Otherwise each search path is tried in
/// order, then `name` itself. Returns `None` when nothing exists.
pub fn resolve_file(name: &str, search_paths: &[PathBuf]) -> Option<String> {
    if name.starts_with("data:") {
        return Some(name.to_string());
    }

    for dir in search_paths {
        let candidate = dir.join(name);
        if candidate.exists() {
            return Some(candidate.to_string_lossy().into_owned());
        }
    }

    if Path::new(name).exists() {
        return Some(name.to_string());
    }

    None
}

/// Resolves `name` and turns it into an [`AssetSource`].
///
/// # Errors
/// * `ResourceNotFound` - no search path (nor the name itself) exists
/// * `InvalidDataUrl` - the `data:` URL is malformed
pub fn resolve_source(name: &str, search_paths: &[PathBuf]) -> CoreResult<AssetSource> {
    let resolved =
        resolve_file(name, search_paths).ok_or_else(|| CoreError::ResourceNotFound(name.to_string()))?;

    if resolved.starts_with("data:") {
        let (mime, bytes) = decode_data_url(&resolved)?;
        Ok(AssetSource::Inline { mime, bytes })
    } else {
        Ok(AssetSource::File(PathBuf::from(resolved)))
    }
}

/// Decodes a base64 `data:` URL into its media type and bytes.
pub fn decode_data_url(url: &str) -> CoreResult<(String, Vec<u8>)> {
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| CoreError::InvalidDataUrl("missing data: prefix".into()))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| CoreError::InvalidDataUrl("missing ',' separator".into()))?;
    let mime = header
        .strip_suffix(";base64")
        .ok_or_else(|| CoreError::InvalidDataUrl("only base64 payloads are supported".into()))?;

    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|e| CoreError::InvalidDataUrl(e.to_string()))?;

    let mime = if mime.is_empty() { "application/octet-stream" } else { mime };
    Ok((mime.to_string(), bytes))
}

/// Encodes bytes as a base64 `data:` URL.
pub fn encode_data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}
