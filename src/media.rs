//! Profile image storage.
//!
//! Uploads are checked before touching disk: byte ceiling, filename
//! extension, a full decode, and agreement between the type the extension
//! claims and the decoded format. Accepted files are written as
//! `<media root>/profile-images/<uuid>.<ext>` and referenced from the
//! database by that relative path.

use std::path::{Component, Path, PathBuf};

use image::ImageFormat;
use thiserror::Error;
use uuid::Uuid;

pub const DEFAULT_MAX_IMAGE_BYTES: usize = 20 * 1024 * 1024;
pub const IMAGE_SUBDIR: &str = "profile-images";
pub const MEDIA_URL_PREFIX: &str = "/media";

const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif"];

#[derive(Error, Debug)]
pub enum MediaError {
    #[error("File size too large. Maximum allowed size: {} Mb", .max_bytes / (1024 * 1024))]
    TooLarge { max_bytes: usize },

    #[error("File extension \"{extension}\" is not allowed. Allowed extensions are: jpg, jpeg, png, gif.")]
    UnsupportedExtension { extension: String },

    #[error("Upload a valid image. The file you uploaded was either not an image or a corrupted image.")]
    NotAnImage,

    #[error("File extension \"{extension}\" does not match the uploaded {detected} content.")]
    ExtensionMismatch {
        extension: String,
        detected: &'static str,
    },

    #[error("No file was submitted.")]
    Missing,

    #[error("The submitted file is empty.")]
    Empty,

    #[error("Invalid media path: {0}")]
    InvalidPath(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MediaError {
    /// Whether the client caused this error (as opposed to the server's disk).
    pub fn is_client_error(&self) -> bool {
        !matches!(self, MediaError::Io(_) | MediaError::InvalidPath(_))
    }
}

/// A file received from a client, before validation.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub filename: Option<String>,
    pub bytes: Vec<u8>,
}

/// Checked upload, ready to be written.
#[derive(Debug)]
pub struct ValidImage {
    bytes: Vec<u8>,
    extension: &'static str,
}

impl ValidImage {
    pub fn extension(&self) -> &'static str {
        self.extension
    }
}

#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
    max_image_bytes: usize,
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>, max_image_bytes: usize) -> Self {
        Self {
            root: root.into(),
            max_image_bytes,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn max_image_bytes(&self) -> usize {
        self.max_image_bytes
    }

    pub fn validate(&self, upload: ImageUpload) -> Result<ValidImage, MediaError> {
        if upload.bytes.is_empty() {
            return Err(MediaError::Empty);
        }
        if upload.bytes.len() > self.max_image_bytes {
            return Err(MediaError::TooLarge {
                max_bytes: self.max_image_bytes,
            });
        }

        let extension = upload
            .filename
            .as_deref()
            .and_then(|name| Path::new(name).extension())
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
            return Err(MediaError::UnsupportedExtension { extension });
        }
        let claimed = mime_guess::from_ext(&extension).first_or_octet_stream();

        let format = image::guess_format(&upload.bytes).map_err(|_| MediaError::NotAnImage)?;
        let (detected, stored_extension) = match format {
            ImageFormat::Jpeg => ("image/jpeg", "jpg"),
            ImageFormat::Png => ("image/png", "png"),
            ImageFormat::Gif => ("image/gif", "gif"),
            _ => return Err(MediaError::NotAnImage),
        };
        image::load_from_memory_with_format(&upload.bytes, format)
            .map_err(|_| MediaError::NotAnImage)?;

        if claimed.essence_str() != detected {
            return Err(MediaError::ExtensionMismatch { extension, detected });
        }

        Ok(ValidImage {
            bytes: upload.bytes,
            extension: stored_extension,
        })
    }

    /// Write a validated image and return its path relative to the root.
    pub fn store(&self, image: ValidImage) -> Result<String, MediaError> {
        let dir = self.root.join(IMAGE_SUBDIR);
        std::fs::create_dir_all(&dir)?;
        let name = format!("{}.{}", Uuid::new_v4(), image.extension);
        std::fs::write(dir.join(&name), &image.bytes)?;
        tracing::info!(file = %name, size = image.bytes.len(), "Stored profile image");
        Ok(format!("{IMAGE_SUBDIR}/{name}"))
    }

    /// Remove a stored file. A file that is already gone is not an error.
    pub fn delete(&self, relative: &str) -> Result<(), MediaError> {
        let path = self.resolve(relative)?;
        match std::fs::remove_file(&path) {
            Ok(()) => {
                tracing::info!(file = %relative, "Deleted profile image");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Absolute path of a stored file. Rejects anything escaping the root.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf, MediaError> {
        let rel = Path::new(relative);
        let safe = !relative.is_empty()
            && rel
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(MediaError::InvalidPath(relative.to_string()));
        }
        Ok(self.root.join(rel))
    }
}

/// Public URL of a stored media file.
pub fn media_url(relative: &str) -> String {
    format!("{MEDIA_URL_PREFIX}/{relative}")
}

#[cfg(test)]
pub(crate) fn png_fixture() -> Vec<u8> {
    let img = image::DynamicImage::ImageRgb8(image::RgbImage::new(4, 4));
    let mut buf = Vec::new();
    img.write_to(&mut buf, image::ImageOutputFormat::Png).unwrap();
    buf
}
