//! Uploaded images: decoding and scratch files.

use crate::error::UploadError;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use image::ImageFormat;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

const DATA_URL_MARKER: &str = ";base64,";

/// One uploaded file as received from the browser or the JSON API.
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub content: UploadContent,
}

#[derive(Debug, Clone)]
pub enum UploadContent {
    /// `data:<media type>;base64,<payload>`
    DataUrl(String),
    /// Raw file bytes from a multipart form.
    Bytes(Vec<u8>),
}

impl Upload {
    pub fn data_url(filename: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            content: UploadContent::DataUrl(content.into()),
        }
    }

    pub fn bytes(filename: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            content: UploadContent::Bytes(data),
        }
    }

    /// Decode the upload into raw image bytes.
    pub fn decode(&self) -> Result<Vec<u8>, UploadError> {
        match &self.content {
            UploadContent::DataUrl(url) => decode_data_url(&self.filename, url),
            UploadContent::Bytes(data) => Ok(data.clone()),
        }
    }
}

/// Decode the base64 payload that follows the `;base64,` marker.
pub fn decode_data_url(filename: &str, content: &str) -> Result<Vec<u8>, UploadError> {
    let (_, payload) =
        content
            .split_once(DATA_URL_MARKER)
            .ok_or_else(|| UploadError::InvalidDataUrl {
                filename: filename.to_string(),
            })?;

    BASE64
        .decode(payload.trim())
        .map_err(|source| UploadError::InvalidBase64 {
            filename: filename.to_string(),
            source,
        })
}

/// Guess the media type from magic bytes. Unknown formats are sent as JPEG.
pub fn sniff_media_type(data: &[u8]) -> &'static str {
    match image::guess_format(data) {
        Ok(ImageFormat::Png) => "image/png",
        Ok(ImageFormat::Gif) => "image/gif",
        Ok(ImageFormat::WebP) => "image/webp",
        Ok(ImageFormat::Bmp) => "image/bmp",
        Ok(ImageFormat::Tiff) => "image/tiff",
        Ok(ImageFormat::Avif) => "image/avif",
        _ => "image/jpeg",
    }
}

/// A uniquely named scratch copy of an upload, removed on drop.
#[derive(Debug)]
pub struct TempImage {
    file: NamedTempFile,
}

impl TempImage {
    /// Write `data` to a fresh file in `dir`, keeping the upload's extension.
    pub async fn write(dir: &Path, filename: &str, data: &[u8]) -> Result<Self, UploadError> {
        let suffix = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e.to_lowercase()))
            .unwrap_or_default();

        let file = tempfile::Builder::new()
            .prefix("vocab-")
            .suffix(&suffix)
            .tempfile_in(dir)
            .map_err(|source| UploadError::Io {
                path: dir.to_path_buf(),
                source,
            })?;

        tokio::fs::write(file.path(), data)
            .await
            .map_err(|source| UploadError::Io {
                path: file.path().to_path_buf(),
                source,
            })?;
        debug!("TempImage: wrote {} ({} bytes)", file.path().display(), data.len());

        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub async fn read(&self) -> Result<Vec<u8>, UploadError> {
        tokio::fs::read(self.path()).await.map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                UploadError::ImageNotFound {
                    path: self.path().to_path_buf(),
                }
            } else {
                UploadError::Io {
                    path: self.path().to_path_buf(),
                    source,
                }
            }
        })
    }
}
