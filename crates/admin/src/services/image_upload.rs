//! Product image uploads.
//!
//! Files land in `<uploads_dir>/products/<uuid>.<ext>`; the storefront serves
//! the same directory under `/uploads`. Only the path relative to the uploads
//! directory is stored on the product.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use uuid::Uuid;

/// Subdirectory of the uploads directory holding product images.
const PRODUCTS_DIR: &str = "products";

/// Errors from validating or storing an upload.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("no file was uploaded")]
    Empty,

    #[error("file is larger than {max_bytes} bytes")]
    TooLarge { max_bytes: usize },

    #[error("only JPEG, PNG, WebP and GIF images are accepted")]
    UnsupportedType,

    #[error("file extension does not match its content type")]
    ExtensionMismatch,

    #[error("storage error: {0}")]
    Io(#[from] std::io::Error),
}

impl UploadError {
    /// Whether the error is the uploader's fault rather than ours.
    #[must_use]
    pub const fn is_user_error(&self) -> bool {
        !matches!(self, Self::Io(_))
    }
}

/// Accepted image formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
    Webp,
    Gif,
}

impl ImageKind {
    /// Format for a MIME type, ignoring parameters and case.
    #[must_use]
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let mime = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match mime.as_str() {
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/png" => Some(Self::Png),
            "image/webp" => Some(Self::Webp),
            "image/gif" => Some(Self::Gif),
            _ => None,
        }
    }

    /// Format for a file name's extension.
    #[must_use]
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let ext = Path::new(file_name)
            .extension()?
            .to_str()?
            .to_ascii_lowercase();
        match ext.as_str() {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "webp" => Some(Self::Webp),
            "gif" => Some(Self::Gif),
            _ => None,
        }
    }

    /// Extension used for stored files.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Webp => "webp",
            Self::Gif => "gif",
        }
    }
}

/// A file part taken from a multipart form.
#[derive(Debug)]
pub struct Upload<'a> {
    pub file_name: &'a str,
    pub content_type: &'a str,
    pub bytes: &'a [u8],
}

/// Validates and stores product images.
#[derive(Debug, Clone)]
pub struct ImageUploadService {
    uploads_dir: PathBuf,
    max_bytes: usize,
}

impl ImageUploadService {
    #[must_use]
    pub const fn new(uploads_dir: PathBuf, max_bytes: usize) -> Self {
        Self {
            uploads_dir,
            max_bytes,
        }
    }

    /// Check an upload without touching the filesystem.
    ///
    /// # Errors
    ///
    /// Returns the first rule the upload breaks.
    pub fn validate(&self, upload: &Upload<'_>) -> Result<ImageKind, UploadError> {
        if upload.bytes.is_empty() {
            return Err(UploadError::Empty);
        }
        if upload.bytes.len() > self.max_bytes {
            return Err(UploadError::TooLarge {
                max_bytes: self.max_bytes,
            });
        }
        let kind =
            ImageKind::from_content_type(upload.content_type).ok_or(UploadError::UnsupportedType)?;
        match ImageKind::from_file_name(upload.file_name) {
            Some(by_name) if by_name == kind => Ok(kind),
            Some(_) => Err(UploadError::ExtensionMismatch),
            None => Err(UploadError::UnsupportedType),
        }
    }

    /// Validate and write an upload, returning its path relative to the
    /// uploads directory.
    ///
    /// # Errors
    ///
    /// Returns a validation error, or `UploadError::Io` if the write fails.
    pub async fn save(&self, upload: &Upload<'_>) -> Result<String, UploadError> {
        let kind = self.validate(upload)?;
        let relative = format!("{PRODUCTS_DIR}/{}.{}", Uuid::new_v4(), kind.extension());

        let dir = self.uploads_dir.join(PRODUCTS_DIR);
        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::write(self.uploads_dir.join(&relative), upload.bytes).await?;

        tracing::info!(path = %relative, bytes = upload.bytes.len(), "stored product image");
        Ok(relative)
    }

    /// Delete a previously stored image. A missing file is not an error, and
    /// paths outside the uploads directory are ignored.
    ///
    /// # Errors
    ///
    /// Returns `UploadError::Io` if the file exists but cannot be removed.
    pub async fn remove(&self, relative: &str) -> Result<(), UploadError> {
        if !is_contained(relative) {
            tracing::warn!(path = %relative, "refusing to remove image outside uploads");
            return Ok(());
        }
        match tokio::fs::remove_file(self.uploads_dir.join(relative)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Only plain relative paths without `..` stay inside the uploads directory.
fn is_contained(relative: &str) -> bool {
    let path = Path::new(relative);
    !relative.is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn service(dir: PathBuf) -> ImageUploadService {
        ImageUploadService::new(dir, 16)
    }

    fn upload<'a>(file_name: &'a str, content_type: &'a str, bytes: &'a [u8]) -> Upload<'a> {
        Upload {
            file_name,
            content_type,
            bytes,
        }
    }

    fn scratch_dir() -> PathBuf {
        std::env::temp_dir().join(format!("meridian-uploads-{}", Uuid::new_v4()))
    }

    #[test]
    fn test_validate_accepts_matching_type_and_extension() {
        let svc = service(scratch_dir());
        assert_eq!(
            svc.validate(&upload("Front.JPEG", "image/jpeg", b"data")).unwrap(),
            ImageKind::Jpeg
        );
        assert_eq!(
            svc.validate(&upload("a.webp", "image/webp; charset=binary", b"data"))
                .unwrap(),
            ImageKind::Webp
        );
    }

    #[test]
    fn test_validate_rejects_bad_uploads() {
        let svc = service(scratch_dir());
        assert!(matches!(
            svc.validate(&upload("a.png", "image/png", b"")),
            Err(UploadError::Empty)
        ));
        assert!(matches!(
            svc.validate(&upload("a.png", "image/png", &[0_u8; 17])),
            Err(UploadError::TooLarge { max_bytes: 16 })
        ));
        assert!(matches!(
            svc.validate(&upload("a.svg", "image/svg+xml", b"<svg/>")),
            Err(UploadError::UnsupportedType)
        ));
        assert!(matches!(
            svc.validate(&upload("a.png", "image/gif", b"GIF89a")),
            Err(UploadError::ExtensionMismatch)
        ));
        assert!(matches!(
            svc.validate(&upload("noext", "image/png", b"png")),
            Err(UploadError::UnsupportedType)
        ));
    }

    #[test]
    fn test_is_contained() {
        assert!(is_contained("products/abc.png"));
        assert!(!is_contained("../secrets.txt"));
        assert!(!is_contained("products/../../etc/passwd"));
        assert!(!is_contained("/etc/passwd"));
        assert!(!is_contained(""));
    }

    #[tokio::test]
    async fn test_save_then_remove() {
        let dir = scratch_dir();
        let svc = service(dir.clone());

        let relative = svc.save(&upload("a.gif", "image/gif", b"GIF89a")).await.unwrap();
        assert!(relative.starts_with("products/"));
        assert!(relative.ends_with(".gif"));
        assert_eq!(tokio::fs::read(dir.join(&relative)).await.unwrap(), b"GIF89a");

        svc.remove(&relative).await.unwrap();
        assert!(!dir.join(&relative).exists());

        // Second removal finds nothing and still succeeds
        svc.remove(&relative).await.unwrap();

        let _ = tokio::fs::remove_dir_all(&dir).await;
    }
}
