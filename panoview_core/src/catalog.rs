//! Asset listings and thumbnails served to the control UI.

use crate::assets::{encode_data_url, resolve_file};
use crate::error::{CoreError, CoreResult};
use crate::manifest::Manifest;
use crate::protocol::StereoMode;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Extensions listed by `getImages`.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Extensions listed by `getVideos`.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "mkv", "webm", "avi"];

/// Thumbnail width in pixels. Height keeps the aspect ratio.
pub const THUMBNAIL_WIDTH: u32 = 400;

/// Suffix of the cached thumbnail stored next to an image.
pub const THUMBNAIL_SUFFIX: &str = ".thumbnail";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageInfo {
    pub filename: String,
    pub dirname: String,
    pub stereo_mode: StereoMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoInfo {
    pub filename: String,
    pub dirname: String,
    pub stereo_mode: StereoMode,
    pub framerate: f64,
}

/// Produces PNG thumbnails.
pub trait ThumbnailGenerator: Send + Sync {
    /// Returns PNG bytes of `source` scaled to `width` pixels wide.
    fn generate(&self, source: &Path, width: u32) -> CoreResult<Vec<u8>>;
}

/// Default generator: sniffs JPEG or PNG from the file header and
/// downscales with a triangle filter.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageThumbnailer;

impl ThumbnailGenerator for ImageThumbnailer {
    fn generate(&self, source: &Path, width: u32) -> CoreResult<Vec<u8>> {
        let decode_error = |e: image::ImageError| CoreError::Decode {
            path: source.display().to_string(),
            reason: e.to_string(),
        };
        let img = image::ImageReader::open(source)?
            .with_guessed_format()?
            .decode()
            .map_err(decode_error)?;
        let scaled = img.resize(width, u32::MAX, image::imageops::FilterType::Triangle);

        let mut bytes = Vec::new();
        scaled
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .map_err(decode_error)?;
        Ok(bytes)
    }
}

/// Directory scanner over the configured search paths.
#[derive(Clone, Default)]
pub struct AssetCatalog {
    search_paths: Vec<PathBuf>,
    thumbnails: Option<Arc<dyn ThumbnailGenerator>>,
}

impl AssetCatalog {
    pub fn new(search_paths: Vec<PathBuf>) -> Self {
        Self {
            search_paths,
            thumbnails: None,
        }
    }

    pub fn with_thumbnail_generator(mut self, generator: Arc<dyn ThumbnailGenerator>) -> Self {
        self.thumbnails = Some(generator);
        self
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// Images in every search path, minus manifest exclusions.
    pub fn list_images(&self) -> Vec<ImageInfo> {
        let mut result = Vec::new();
        for dir in &self.search_paths {
            let manifest = Manifest::load(dir);
            for filename in files_with_extension(dir, IMAGE_EXTENSIONS) {
                if let Some(stereo_mode) = manifest.image_mode(&filename) {
                    result.push(ImageInfo {
                        filename,
                        dirname: dir.to_string_lossy().into_owned(),
                        stereo_mode,
                    });
                }
            }
        }
        result.sort_by_cached_key(|info| sort_key(&info.dirname, &info.filename));
        result
    }

    /// Videos in every search path, minus manifest exclusions.
    pub fn list_videos(&self) -> Vec<VideoInfo> {
        let mut result = Vec::new();
        for dir in &self.search_paths {
            let manifest = Manifest::load(dir);
            for filename in files_with_extension(dir, VIDEO_EXTENSIONS) {
                if let Some((stereo_mode, framerate)) = manifest.video_mode(&filename) {
                    result.push(VideoInfo {
                        filename,
                        dirname: dir.to_string_lossy().into_owned(),
                        stereo_mode,
                        framerate,
                    });
                }
            }
        }
        result.sort_by_cached_key(|info| sort_key(&info.dirname, &info.filename));
        result
    }

    /// Thumbnail of `name` as a PNG data URL.
    ///
    /// Returns `Ok(None)` when `name` does not resolve. A cached
    /// `<file>.thumbnail` is reused; otherwise the generator (if any) writes
    /// one.
    pub fn thumbnail(&self, name: &str) -> CoreResult<Option<String>> {
        let Some(resolved) = resolve_file(name, &self.search_paths) else {
            return Ok(None);
        };
        if resolved.starts_with("data:") {
            return Ok(Some(resolved));
        }

        let sidecar = PathBuf::from(format!("{}{}", resolved, THUMBNAIL_SUFFIX));
        if !sidecar.exists() {
            let Some(generator) = self.thumbnails.as_ref() else {
                debug!("no thumbnail for {} and no generator", resolved);
                return Ok(None);
            };
            let png = generator.generate(Path::new(&resolved), THUMBNAIL_WIDTH)?;
            std::fs::write(&sidecar, png)?;
            debug!("wrote {}", sidecar.display());
        }

        let bytes = std::fs::read(&sidecar)?;
        Ok(Some(encode_data_url("image/png", &bytes)))
    }
}

fn sort_key(dirname: &str, filename: &str) -> (String, String) {
    (dirname.to_lowercase(), filename.to_lowercase())
}

/// Plain files in `dir` whose extension matches case-insensitively.
fn files_with_extension(dir: &Path, extensions: &[&str]) -> Vec<String> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("cannot list {}: {}", dir.display(), e);
            return Vec::new();
        }
    };

    entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| {
            Path::new(name)
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| extensions.iter().any(|known| ext.eq_ignore_ascii_case(known)))
                .unwrap_or(false)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{DEFAULT_FRAMERATE, MANIFEST_FILE};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn scratch_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("panoview-{}-{}", tag, uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    struct FixedPng {
        calls: AtomicUsize,
    }

    impl ThumbnailGenerator for FixedPng {
        fn generate(&self, source: &Path, width: u32) -> CoreResult<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if source.to_string_lossy().contains("corrupt") {
                return Err(CoreError::Decode {
                    path: source.display().to_string(),
                    reason: "bad header".into(),
                });
            }
            assert_eq!(width, THUMBNAIL_WIDTH);
            Ok(vec![0x89, b'P', b'N', b'G'])
        }
    }

    #[test]
    fn test_list_images_filters_and_sorts() {
        let dir = scratch_dir("catalog");
        for name in ["b.JPG", "A.png", "c.jpeg", "notes.txt", "clip.mp4", "skip.jpg"] {
            std::fs::write(dir.join(name), b"x").unwrap();
        }
        std::fs::create_dir(dir.join("nested.jpg")).unwrap();
        std::fs::write(
            dir.join(MANIFEST_FILE),
            r#"{"skip.jpg": "ignore", "c.jpeg": "top-bottom"}"#,
        )
        .unwrap();

        let images = AssetCatalog::new(vec![dir.clone()]).list_images();
        let names: Vec<&str> = images.iter().map(|i| i.filename.as_str()).collect();
        assert_eq!(names, vec!["A.png", "b.JPG", "c.jpeg"]);
        assert_eq!(images[0].stereo_mode, StereoMode::Mono);
        assert_eq!(images[2].stereo_mode, StereoMode::TopBottom);
        assert_eq!(images[0].dirname, dir.to_string_lossy());
    }

    #[test]
    fn test_list_videos_uses_manifest_framerate() {
        let dir = scratch_dir("catalog");
        for name in ["fast.mp4", "plain.mov", "still.jpg"] {
            std::fs::write(dir.join(name), b"x").unwrap();
        }
        std::fs::write(dir.join(MANIFEST_FILE), r#"{"fast.mp4": ["bottom-top", 60]}"#).unwrap();

        let videos = AssetCatalog::new(vec![dir]).list_videos();
        assert_eq!(videos.len(), 2);
        assert_eq!(videos[0].filename, "fast.mp4");
        assert_eq!(videos[0].stereo_mode, StereoMode::BottomTop);
        assert_eq!(videos[0].framerate, 60.0);
        assert_eq!(videos[1].stereo_mode, StereoMode::Mono);
        assert_eq!(videos[1].framerate, DEFAULT_FRAMERATE);
    }

    #[test]
    fn test_bad_manifest_only_affects_its_directory() {
        let good = scratch_dir("catalog");
        let bad = scratch_dir("catalog");
        std::fs::write(good.join("g.jpg"), b"x").unwrap();
        std::fs::write(good.join("h.jpg"), b"x").unwrap();
        std::fs::write(good.join(MANIFEST_FILE), r#"{"h.jpg": "ignore"}"#).unwrap();
        std::fs::write(bad.join("b.jpg"), b"x").unwrap();
        std::fs::write(bad.join(MANIFEST_FILE), "not json").unwrap();

        let images = AssetCatalog::new(vec![good, bad]).list_images();
        let mut names: Vec<&str> = images.iter().map(|i| i.filename.as_str()).collect();
        names.sort();
        assert_eq!(names, vec!["b.jpg", "g.jpg"]);
    }

    #[test]
    fn test_missing_search_path_is_skipped() {
        let catalog = AssetCatalog::new(vec![std::env::temp_dir().join("panoview-does-not-exist")]);
        assert!(catalog.list_images().is_empty());
    }

    #[test]
    fn test_thumbnail_generated_once_then_cached() {
        let dir = scratch_dir("thumbs");
        std::fs::write(dir.join("pano.jpg"), b"x").unwrap();
        let generator = Arc::new(FixedPng {
            calls: AtomicUsize::new(0),
        });
        let catalog = AssetCatalog::new(vec![dir.clone()]).with_thumbnail_generator(generator.clone());

        let first = catalog.thumbnail("pano.jpg").unwrap().unwrap();
        assert!(first.starts_with("data:image/png;base64,"));
        assert!(dir.join("pano.jpg.thumbnail").exists());

        let second = catalog.thumbnail("pano.jpg").unwrap().unwrap();
        assert_eq!(first, second);
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_thumbnail_of_unknown_file_is_none() {
        let catalog = AssetCatalog::new(vec![scratch_dir("thumbs")]);
        assert_eq!(catalog.thumbnail("missing.jpg").unwrap(), None);
    }

    #[test]
    fn test_image_thumbnailer_keeps_aspect_ratio() {
        let dir = scratch_dir("thumbs");
        image::RgbImage::from_pixel(800, 400, image::Rgb([10, 20, 30]))
            .save(dir.join("wide.png"))
            .unwrap();
        let catalog =
            AssetCatalog::new(vec![dir.clone()]).with_thumbnail_generator(Arc::new(ImageThumbnailer));

        let url = catalog.thumbnail("wide.png").unwrap().unwrap();
        assert!(url.starts_with("data:image/png;base64,"));

        let png = std::fs::read(dir.join("wide.png.thumbnail")).unwrap();
        let thumb = image::load_from_memory(&png).unwrap();
        assert_eq!((thumb.width(), thumb.height()), (THUMBNAIL_WIDTH, 200));
    }

    #[test]
    fn test_image_thumbnailer_rejects_garbage() {
        let dir = scratch_dir("thumbs");
        std::fs::write(dir.join("noise.jpg"), b"not a jpeg").unwrap();
        let result = ImageThumbnailer.generate(&dir.join("noise.jpg"), THUMBNAIL_WIDTH);
        assert!(matches!(result, Err(CoreError::Decode { .. })));
    }

    #[test]
    fn test_thumbnail_generator_error_propagates() {
        let dir = scratch_dir("thumbs");
        std::fs::write(dir.join("corrupt.jpg"), b"x").unwrap();
        let catalog = AssetCatalog::new(vec![dir]).with_thumbnail_generator(Arc::new(FixedPng {
            calls: AtomicUsize::new(0),
        }));
        assert!(matches!(catalog.thumbnail("corrupt.jpg"), Err(CoreError::Decode { .. })));
    }
}
