//! Image files on disk: originals plus lazily generated resized variants.
//!
//! Layout under the upload root:
//!
//! ```text
//! originals/<recipe_id>/<uuid>.<ext>
//! variants/<size>/<recipe_id>/<uuid>.<ext>
//! ```

mod stats;

pub use stats::{storage_stats, StorageStats};

use crate::error::{Result, TastebaseError};
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat};
use log::{debug, info, warn};
use serde::Serialize;
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use uuid::Uuid;

const ORIGINALS_DIR: &str = "originals";
const VARIANTS_DIR: &str = "variants";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VariantSize {
    Thumbnail,
    Medium,
    Large,
    Original,
}

impl VariantSize {
    pub const RESIZED: [VariantSize; 3] =
        [VariantSize::Thumbnail, VariantSize::Medium, VariantSize::Large];

    /// Longest edge in pixels, `None` for the original
    pub fn max_edge(&self) -> Option<u32> {
        match self {
            VariantSize::Thumbnail => Some(200),
            VariantSize::Medium => Some(600),
            VariantSize::Large => Some(1200),
            VariantSize::Original => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VariantSize::Thumbnail => "thumbnail",
            VariantSize::Medium => "medium",
            VariantSize::Large => "large",
            VariantSize::Original => "original",
        }
    }
}

impl fmt::Display for VariantSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VariantSize {
    type Err = TastebaseError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "thumbnail" | "thumb" => Ok(VariantSize::Thumbnail),
            "medium" => Ok(VariantSize::Medium),
            "large" => Ok(VariantSize::Large),
            "original" | "" => Ok(VariantSize::Original),
            other => Err(TastebaseError::InvalidInput(format!(
                "unknown image size '{other}'"
            ))),
        }
    }
}

/// What `ImageStore::save` wrote
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredImage {
    pub filename: String,
    pub content_type: String,
    pub size: u64,
}

/// Accepted upload formats and the extension each is stored under
fn accepted_format(format: ImageFormat) -> Option<(&'static str, &'static str)> {
    match format {
        ImageFormat::Jpeg => Some(("jpg", "image/jpeg")),
        ImageFormat::Png => Some(("png", "image/png")),
        ImageFormat::WebP => Some(("webp", "image/webp")),
        ImageFormat::Gif => Some(("gif", "image/gif")),
        _ => None,
    }
}

fn sniff_format(bytes: &[u8]) -> Result<(ImageFormat, &'static str, &'static str)> {
    let format = image::guess_format(bytes)
        .map_err(|_| TastebaseError::UnsupportedImage("unrecognized image data".into()))?;
    let (ext, content_type) = accepted_format(format).ok_or_else(|| {
        TastebaseError::UnsupportedImage(format!("{format:?} images are not accepted"))
    })?;
    Ok((format, ext, content_type))
}

/// Content type of an accepted image, judged from its magic bytes
pub fn sniff_content_type(bytes: &[u8]) -> Result<&'static str> {
    sniff_format(bytes).map(|(_, _, content_type)| content_type)
}

/// Content type for a stored file name
pub fn content_type_for(filename: &str) -> &'static str {
    match Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "application/octet-stream",
    }
}

/// One path segment: no separators, no `..`, no hidden files.
fn safe_segment<'a>(kind: &str, value: &'a str) -> Result<&'a str> {
    let ok = !value.is_empty()
        && value.len() <= 128
        && !value.starts_with('.')
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if ok {
        Ok(value)
    } else {
        Err(TastebaseError::InvalidInput(format!("invalid {kind} '{value}'")))
    }
}

#[derive(Debug, Clone)]
pub struct ImageStore {
    root: PathBuf,
    max_bytes: usize,
}

impl ImageStore {
    pub fn new(root: impl Into<PathBuf>, max_bytes: usize) -> Self {
        Self {
            root: root.into(),
            max_bytes,
        }
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    fn original_path(&self, recipe_id: &str, filename: &str) -> Result<PathBuf> {
        Ok(self
            .root
            .join(ORIGINALS_DIR)
            .join(safe_segment("recipe id", recipe_id)?)
            .join(safe_segment("filename", filename)?))
    }

    fn variant_path(&self, size: VariantSize, recipe_id: &str, filename: &str) -> Result<PathBuf> {
        Ok(self
            .root
            .join(VARIANTS_DIR)
            .join(size.as_str())
            .join(safe_segment("recipe id", recipe_id)?)
            .join(safe_segment("filename", filename)?))
    }

    /// Check and store an upload. The format is sniffed from the bytes;
    /// whatever the client claimed is ignored.
    pub async fn save(&self, recipe_id: &str, bytes: &[u8]) -> Result<StoredImage> {
        if bytes.len() > self.max_bytes {
            return Err(TastebaseError::PayloadTooLarge {
                size: bytes.len(),
                limit: self.max_bytes,
            });
        }
        if bytes.is_empty() {
            return Err(TastebaseError::UnsupportedImage("empty upload".into()));
        }

        let (format, ext, content_type) = sniff_format(bytes)?;

        // Reject files that only carry a valid magic number.
        let owned = bytes.to_vec();
        tokio::task::spawn_blocking(move || {
            image::load_from_memory_with_format(&owned, format).map(|_| ())
        })
        .await
        .map_err(|e| TastebaseError::Io(std::io::Error::other(e)))?
        .map_err(|e| TastebaseError::UnsupportedImage(e.to_string()))?;

        let filename = format!("{}.{ext}", Uuid::new_v4());
        let path = self.original_path(recipe_id, &filename)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        info!("Stored {} ({} bytes) for recipe {}", filename, bytes.len(), recipe_id);

        Ok(StoredImage {
            filename,
            content_type: content_type.to_string(),
            size: bytes.len() as u64,
        })
    }

    /// Path to the requested rendition, generating it on first use.
    pub async fn open_variant(
        &self,
        recipe_id: &str,
        filename: &str,
        size: VariantSize,
    ) -> Result<PathBuf> {
        let original = self.original_path(recipe_id, filename)?;
        if !tokio::fs::try_exists(&original).await? {
            return Err(TastebaseError::NotFound(format!("image file {filename}")));
        }
        let Some(max_edge) = size.max_edge() else {
            return Ok(original);
        };

        let variant = self.variant_path(size, recipe_id, filename)?;
        if tokio::fs::try_exists(&variant).await? {
            return Ok(variant);
        }

        debug!("Generating {} variant of {}", size, filename);
        let target = variant.clone();
        tokio::task::spawn_blocking(move || write_variant(&original, &target, max_edge))
            .await
            .map_err(|e| TastebaseError::Io(std::io::Error::other(e)))??;
        Ok(variant)
    }

    /// Remove an original and every variant made from it.
    pub async fn delete(&self, recipe_id: &str, filename: &str) -> Result<()> {
        remove_if_present(&self.original_path(recipe_id, filename)?).await?;
        for size in VariantSize::RESIZED {
            remove_if_present(&self.variant_path(size, recipe_id, filename)?).await?;
        }
        Ok(())
    }

    /// Remove all files for a recipe.
    pub async fn delete_recipe(&self, recipe_id: &str) -> Result<()> {
        let recipe_id = safe_segment("recipe id", recipe_id)?;
        let mut dirs = vec![self.root.join(ORIGINALS_DIR).join(recipe_id)];
        for size in VariantSize::RESIZED {
            dirs.push(self.root.join(VARIANTS_DIR).join(size.as_str()).join(recipe_id));
        }
        for dir in dirs {
            match tokio::fs::remove_dir_all(&dir).await {
                Ok(()) => debug!("Removed {}", dir.display()),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    pub fn stats(&self) -> Result<StorageStats> {
        storage_stats(&self.root)
    }
}

async fn remove_if_present(path: &Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn write_variant(original: &Path, target: &Path, max_edge: u32) -> Result<()> {
    let format = ImageFormat::from_path(original)?;
    let img = image::open(original)?;
    let resized = shrink_to_fit(img, max_edge);

    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)?;
    }
    // Write next to the target and rename so a reader never sees half a file.
    let partial = target.with_extension(format!("partial-{}", Uuid::new_v4().simple()));
    let written = match format {
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(resized.to_rgb8()).save_with_format(&partial, format),
        _ => resized.save_with_format(&partial, format),
    };
    if let Err(e) = written {
        warn!("Failed to write variant {}: {}", target.display(), e);
        let _ = std::fs::remove_file(&partial);
        return Err(e.into());
    }
    std::fs::rename(&partial, target)?;
    Ok(())
}

/// Scale so the longest edge is at most `max_edge`. Never upscales.
fn shrink_to_fit(img: DynamicImage, max_edge: u32) -> DynamicImage {
    let (width, height) = img.dimensions();
    if width.max(height) <= max_edge {
        return img;
    }
    img.resize(max_edge, max_edge, FilterType::Lanczos3)
}

#[cfg(test)]
pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba([200, 80, 40, 255]));
    let mut out = std::io::Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(img)
        .write_to(&mut out, ImageFormat::Png)
        .unwrap();
    out.into_inner()
}
