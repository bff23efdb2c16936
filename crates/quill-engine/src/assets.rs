//! Asset lifecycle: stage, commit, remove and resolve record images.
//!
//! Staging is local and never touches the blob store, so a draft can be
//! abandoned without leaving anything behind. Removal is best effort and
//! reports its result instead of failing.

use std::{
  io::Cursor,
  path::Path,
  sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
  },
};

use base64::{Engine as _, engine::general_purpose::STANDARD};
use bytes::Bytes;
use chrono::Utc;
use image::{DynamicImage, ImageFormat, ImageReader, imageops::FilterType};
use quill_core::{AssetLocator, BlobStore, Category, ImageRef};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::{EngineConfig, Error, Result};

/// Blob path prefix for story covers.
const COVER_PREFIX: &str = "storyImages";

// ─── Types ───────────────────────────────────────────────────────────────────

/// A file chosen by the user, before any processing.
#[derive(Debug, Clone)]
pub struct SourceFile {
  pub file_name: String,
  pub bytes:     Bytes,
}

impl SourceFile {
  pub fn new(file_name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
    Self { file_name: file_name.into(), bytes: bytes.into() }
  }

  /// Read a file from disk, keeping only its final path segment as the name.
  pub async fn read(path: &Path) -> std::io::Result<Self> {
    let bytes = tokio::fs::read(path).await?;
    let file_name = path
      .file_name()
      .map(|n| n.to_string_lossy().into_owned())
      .unwrap_or_default();
    Ok(Self::new(file_name, bytes))
  }
}

/// A normalised image held locally until the record is saved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedAsset {
  pub file_name:    String,
  pub format:       ImageFormat,
  pub media_type:   String,
  pub bytes:        Bytes,
  pub width:        u32,
  pub height:       u32,
  /// Hex SHA-256 of `bytes`.
  pub content_hash: String,
  /// `false` when the source already fit and was kept byte-for-byte.
  pub resized:      bool,
}

impl StagedAsset {
  /// A `data:` URL for showing the image before it is committed.
  pub fn preview(&self) -> String {
    format!("data:{};base64,{}", self.media_type, STANDARD.encode(&self.bytes))
  }
}

/// What happened when an asset was removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetCleanup {
  Removed,
  /// Nothing to remove: a placeholder or no image.
  Skipped,
  /// The blob store refused; the record operation went ahead regardless.
  Failed(String),
}

impl AssetCleanup {
  pub fn is_failure(&self) -> bool { matches!(self, Self::Failed(_)) }
}

// ─── Normalisation ───────────────────────────────────────────────────────────

/// Target size for an image of `width` x `height` so that neither side
/// exceeds `max`, preserving aspect ratio. `None` when it already fits.
pub fn fit_within(width: u32, height: u32, max: u32) -> Option<(u32, u32)> {
  if width <= max && height <= max {
    return None;
  }
  let scale = |side: u32, long: u32| -> u32 {
    let scaled = (u64::from(side) * u64::from(max) + u64::from(long) / 2) / u64::from(long);
    u32::try_from(scaled).unwrap_or(max).max(1)
  };
  if width >= height {
    Some((max, scale(height, width)))
  } else {
    Some((scale(width, height), max))
  }
}

/// Decode `file`, downsample it to fit `max_dimension` and re-encode it in
/// its original format. Images that already fit pass through unchanged.
pub fn normalize(file: SourceFile, max_dimension: u32) -> Result<StagedAsset> {
  let reader = ImageReader::new(Cursor::new(file.bytes.as_ref()))
    .with_guessed_format()
    .map_err(|e| Error::AssetResize(e.to_string()))?;
  let format = reader.format().ok_or_else(|| {
    Error::AssetResize(format!("{} is not a recognised image", file.file_name))
  })?;
  let image = reader
    .decode()
    .map_err(|e| Error::AssetResize(format!("{}: {e}", file.file_name)))?;

  let (width, height, bytes, resized) =
    match fit_within(image.width(), image.height(), max_dimension) {
      None => (image.width(), image.height(), file.bytes, false),
      Some((w, h)) => {
        let scaled = image.resize_exact(w, h, FilterType::Triangle);
        (w, h, Bytes::from(encode(scaled, format)?), true)
      }
    };

  Ok(StagedAsset {
    file_name: file.file_name,
    format,
    media_type: format.to_mime_type().to_owned(),
    content_hash: hex::encode(Sha256::digest(&bytes)),
    bytes,
    width,
    height,
    resized,
  })
}

fn encode(image: DynamicImage, format: ImageFormat) -> Result<Vec<u8>> {
  // JPEG has no alpha channel.
  let image = match format {
    ImageFormat::Jpeg => DynamicImage::ImageRgb8(image.to_rgb8()),
    _ => image,
  };
  let mut out = Cursor::new(Vec::new());
  image
    .write_to(&mut out, format)
    .map_err(|e| Error::AssetResize(e.to_string()))?;
  Ok(out.into_inner())
}

/// Reduce a user-supplied file name to characters safe in a blob path.
fn sanitize(file_name: &str) -> String {
  let cleaned: String = file_name
    .chars()
    .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
    .collect();
  let cleaned = cleaned.trim_matches('.');
  if cleaned.is_empty() { "image".to_owned() } else { cleaned.to_owned() }
}

// ─── Manager ─────────────────────────────────────────────────────────────────

/// Moves images between the local draft and the blob store.
pub struct AssetManager<B> {
  blobs:  Arc<B>,
  config: EngineConfig,
  seq:    AtomicU64,
}

impl<B: BlobStore> AssetManager<B> {
  pub fn new(blobs: Arc<B>, config: EngineConfig) -> Self {
    Self { blobs, config, seq: AtomicU64::new(0) }
  }

  pub fn config(&self) -> &EngineConfig { &self.config }

  /// Normalise a chosen file. Decoding runs on the blocking pool.
  pub async fn stage(&self, file: SourceFile) -> Result<StagedAsset> {
    let max = self.config.max_image_dimension;
    let name = file.file_name.clone();
    let staged = tokio::task::spawn_blocking(move || normalize(file, max))
      .await
      .map_err(|e| Error::AssetResize(format!("{name}: {e}")))??;
    debug!(
      file = %staged.file_name,
      width = staged.width,
      height = staged.height,
      resized = staged.resized,
      "image staged"
    );
    Ok(staged)
  }

  /// Upload a staged image for a record of `category` in `story_id`.
  pub async fn commit(
    &self,
    category: Category,
    story_id: &str,
    staged: &StagedAsset,
  ) -> Result<AssetLocator> {
    let path = format!("{category}/{story_id}/{}", self.unique_name(&staged.file_name));
    self.upload(path, staged).await
  }

  /// Upload a staged image as the cover of `story_id`.
  pub async fn commit_cover(&self, story_id: &str, staged: &StagedAsset) -> Result<AssetLocator> {
    let path = format!("{COVER_PREFIX}/{story_id}/{}", self.unique_name(&staged.file_name));
    self.upload(path, staged).await
  }

  async fn upload(&self, path: String, staged: &StagedAsset) -> Result<AssetLocator> {
    let timeout = self.config.upload_timeout();
    let put = self.blobs.put(path, staged.bytes.clone(), staged.media_type.clone());
    match tokio::time::timeout(timeout, put).await {
      Err(_) => Err(Error::AssetUploadTimeout(timeout)),
      Ok(Err(e)) => Err(Error::AssetUpload(Box::new(e))),
      Ok(Ok(locator)) => {
        debug!(%locator, size = staged.bytes.len(), "image committed");
        Ok(locator)
      }
    }
  }

  /// `{millis}-{seq}-{name}`: unique within this process even when two
  /// commits land in the same millisecond.
  fn unique_name(&self, file_name: &str) -> String {
    let seq = self.seq.fetch_add(1, Ordering::Relaxed);
    format!("{}-{seq}-{}", Utc::now().timestamp_millis(), sanitize(file_name))
  }

  /// Delete a committed asset. Placeholders are never deleted.
  pub async fn remove(&self, locator: &AssetLocator) -> AssetCleanup {
    if Category::ALL.iter().any(|c| c.is_placeholder(locator.as_str())) {
      return AssetCleanup::Skipped;
    }
    match self.blobs.delete(locator.clone()).await {
      Ok(()) => {
        debug!(%locator, "image removed");
        AssetCleanup::Removed
      }
      Err(e) => {
        warn!(%locator, error = %e, "failed to remove image; continuing");
        AssetCleanup::Failed(e.to_string())
      }
    }
  }

  /// [`AssetManager::remove`] for a record's image slot.
  pub async fn remove_image(&self, image: &ImageRef) -> AssetCleanup {
    match image.asset() {
      Some(locator) => self.remove(locator).await,
      None => AssetCleanup::Skipped,
    }
  }

  /// A URL to render `image` from. An asset that cannot be resolved renders
  /// as the category placeholder.
  pub async fn resolve(&self, category: Category, image: &ImageRef) -> String {
    let Some(locator) = image.asset() else {
      return category.default_asset_path().to_owned();
    };
    match self.blobs.resolve(locator.clone()).await {
      Ok(url) => url,
      Err(e) => {
        warn!(%locator, error = %e, "image could not be resolved; showing placeholder");
        category.default_asset_path().to_owned()
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use image::{Rgb, RgbImage, Rgba, RgbaImage};

  use super::*;

  fn encoded(image: DynamicImage, format: ImageFormat) -> Bytes {
    let mut out = Cursor::new(Vec::new());
    image.write_to(&mut out, format).unwrap();
    Bytes::from(out.into_inner())
  }

  fn jpeg(width: u32, height: u32) -> Bytes {
    let img = RgbImage::from_pixel(width, height, Rgb([120, 40, 200]));
    encoded(DynamicImage::ImageRgb8(img), ImageFormat::Jpeg)
  }

  fn png(width: u32, height: u32) -> Bytes {
    let img = RgbaImage::from_pixel(width, height, Rgba([10, 200, 30, 128]));
    encoded(DynamicImage::ImageRgba8(img), ImageFormat::Png)
  }

  #[test]
  fn fit_within_scales_the_longer_side() {
    assert_eq!(fit_within(4000, 3000, 1200), Some((1200, 900)));
    assert_eq!(fit_within(3000, 4000, 1200), Some((900, 1200)));
    assert_eq!(fit_within(2400, 2400, 1200), Some((1200, 1200)));
    assert_eq!(fit_within(5000, 1, 1200), Some((1200, 1)));
    assert_eq!(fit_within(1200, 1200, 1200), None);
    assert_eq!(fit_within(800, 600, 1200), None);
  }

  #[test]
  fn large_jpeg_is_downsampled() {
    let staged = normalize(SourceFile::new("big.jpg", jpeg(4000, 3000)), 1200).unwrap();
    assert_eq!((staged.width, staged.height), (1200, 900));
    assert!(staged.resized);
    assert_eq!(staged.format, ImageFormat::Jpeg);
    assert_eq!(staged.media_type, "image/jpeg");

    let reread = image::load_from_memory(&staged.bytes).unwrap();
    assert_eq!((reread.width(), reread.height()), (1200, 900));
  }

  #[test]
  fn small_image_passes_through_unchanged() {
    let bytes = png(800, 600);
    let staged = normalize(SourceFile::new("small.png", bytes.clone()), 1200).unwrap();
    assert!(!staged.resized);
    assert_eq!((staged.width, staged.height), (800, 600));
    assert_eq!(staged.bytes, bytes);
    assert_eq!(staged.content_hash, hex::encode(Sha256::digest(&bytes)));
  }

  #[test]
  fn portrait_png_keeps_its_format() {
    let staged = normalize(SourceFile::new("tall.png", png(300, 1500)), 1200).unwrap();
    assert_eq!((staged.width, staged.height), (240, 1200));
    assert_eq!(staged.format, ImageFormat::Png);
    assert!(staged.preview().starts_with("data:image/png;base64,"));
  }

  #[test]
  fn non_image_is_rejected() {
    let err = normalize(SourceFile::new("notes.txt", &b"just some text"[..]), 1200)
      .unwrap_err();
    assert!(matches!(err, Error::AssetResize(_)));
  }

  #[test]
  fn file_names_are_sanitised() {
    assert_eq!(sanitize("my cover (1).png"), "my_cover__1_.png");
    assert_eq!(sanitize("../../etc/passwd"), "_.._etc_passwd");
    assert_eq!(sanitize(""), "image");
    assert_eq!(sanitize("..."), "image");
  }
}
