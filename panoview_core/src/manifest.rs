//! Per-directory asset manifests.
//!
//! A search path may contain `manifest.json`, a flat object mapping file
//! names to either a stereo mode, `[stereoMode, framerate]`, or `"ignore"`:
//!
//! ```json
//! {
//!     "dome_tb.jpg": "top-bottom",
//!     "clip.mp4": ["mono", 60],
//!     "scratch.png": "ignore"
//! }
//! ```

use crate::error::{CoreError, CoreResult};
use crate::protocol::StereoMode;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

/// File name looked up in every search path.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Framerate for videos the manifest does not mention.
pub const DEFAULT_FRAMERATE: f64 = 30.0;

/// One manifest value.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(try_from = "RawEntry")]
pub enum ManifestEntry {
    /// Excluded from listings
    Ignore,
    Stereo(StereoMode),
    Video { stereo_mode: StereoMode, framerate: f64 },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawEntry {
    Single(String),
    Pair(StereoMode, f64),
}

impl TryFrom<RawEntry> for ManifestEntry {
    type Error = String;

    fn try_from(raw: RawEntry) -> Result<Self, Self::Error> {
        match raw {
            RawEntry::Single(s) if s == "ignore" => Ok(ManifestEntry::Ignore),
            RawEntry::Single(s) => s
                .parse::<StereoMode>()
                .map(ManifestEntry::Stereo)
                .map_err(|e| e.to_string()),
            RawEntry::Pair(stereo_mode, framerate) => {
                if framerate.is_finite() && framerate > 0.0 {
                    Ok(ManifestEntry::Video {
                        stereo_mode,
                        framerate,
                    })
                } else {
                    Err(format!("framerate must be positive, got {}", framerate))
                }
            }
        }
    }
}

/// The parsed manifest of one directory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Manifest {
    entries: HashMap<String, ManifestEntry>,
}

impl Manifest {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parses manifest text. `path` is only used for the error.
    pub fn parse(path: &Path, text: &str) -> CoreResult<Self> {
        let entries = serde_json::from_str(text).map_err(|source| CoreError::ManifestParse {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self { entries })
    }

    /// Loads `dir/manifest.json`.
    ///
    /// A missing file is an empty manifest. An unreadable or malformed one is
    /// logged and also treated as empty, so one bad directory does not hide
    /// the others.
    pub fn load(dir: &Path) -> Self {
        let path = dir.join(MANIFEST_FILE);
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Self::empty(),
            Err(e) => {
                warn!("cannot read {}: {}", path.display(), e);
                return Self::empty();
            }
        };

        match Self::parse(&path, &text) {
            Ok(manifest) => {
                debug!("{}: {} entries", path.display(), manifest.len());
                manifest
            }
            Err(e) => {
                warn!("ignoring manifest: {}", e);
                Self::empty()
            }
        }
    }

    pub fn get(&self, filename: &str) -> Option<ManifestEntry> {
        self.entries.get(filename).copied()
    }

    /// Stereo mode for an image, or `None` when it is ignored.
    pub fn image_mode(&self, filename: &str) -> Option<StereoMode> {
        match self.get(filename) {
            None => Some(StereoMode::Mono),
            Some(ManifestEntry::Ignore) => None,
            Some(ManifestEntry::Stereo(mode)) => Some(mode),
            Some(ManifestEntry::Video { stereo_mode, .. }) => Some(stereo_mode),
        }
    }

    /// Stereo mode and framerate for a video, or `None` when it is ignored.
    pub fn video_mode(&self, filename: &str) -> Option<(StereoMode, f64)> {
        match self.get(filename) {
            None => Some((StereoMode::Mono, DEFAULT_FRAMERATE)),
            Some(ManifestEntry::Ignore) => None,
            Some(ManifestEntry::Stereo(mode)) => Some((mode, DEFAULT_FRAMERATE)),
            Some(ManifestEntry::Video {
                stereo_mode,
                framerate,
            }) => Some((stereo_mode, framerate)),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
