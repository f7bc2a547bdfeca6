//! Image intake: read a user-supplied file and encode it as an inline data URL
//!
//! The prediction service expects `data:<mime>;base64,<payload>` and strips
//! everything up to the first comma itself.

use base64::{engine::general_purpose, Engine as _};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("Image file is empty")]
    Empty,

    #[error("File is not a recognized image ({0})")]
    NotAnImage(String),

    #[error("Image is {size} bytes; the limit is {max} bytes")]
    TooLarge { size: u64, max: u64 },

    #[error("Could not read image: {0}")]
    Io(#[from] std::io::Error),
}

/// Encoded image ready for submission
#[derive(Clone, PartialEq, Eq)]
pub struct ImagePayload {
    data_url: String,
    mime_type: String,
    byte_len: usize,
    file_name: Option<String>,
}

impl ImagePayload {
    /// Sniff the content type, check the size limit, and encode
    pub fn from_bytes(
        bytes: &[u8],
        file_name: Option<String>,
        max_bytes: u64,
    ) -> Result<Self, ImageError> {
        if bytes.is_empty() {
            return Err(ImageError::Empty);
        }
        let size = bytes.len() as u64;
        if size > max_bytes {
            return Err(ImageError::TooLarge { size, max: max_bytes });
        }

        let kind = infer::get(bytes);
        let mime_type = match kind {
            Some(kind) if kind.matcher_type() == infer::MatcherType::Image => kind.mime_type(),
            Some(kind) => return Err(ImageError::NotAnImage(kind.mime_type().to_string())),
            None => return Err(ImageError::NotAnImage("unknown content".to_string())),
        };

        let encoded = general_purpose::STANDARD.encode(bytes);
        Ok(Self {
            data_url: format!("data:{};base64,{}", mime_type, encoded),
            mime_type: mime_type.to_string(),
            byte_len: bytes.len(),
            file_name,
        })
    }

    /// Read and encode a file from disk
    pub async fn from_path(path: &Path, max_bytes: u64) -> Result<Self, ImageError> {
        let metadata = tokio::fs::metadata(path).await?;
        if metadata.len() > max_bytes {
            return Err(ImageError::TooLarge { size: metadata.len(), max: max_bytes });
        }
        let bytes = tokio::fs::read(path).await?;
        let file_name = path.file_name().map(|n| n.to_string_lossy().into_owned());
        Self::from_bytes(&bytes, file_name, max_bytes)
    }

    pub fn data_url(&self) -> &str {
        &self.data_url
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Size of the source file in bytes
    pub fn byte_len(&self) -> usize {
        self.byte_len
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    /// Decode the payload part of a data URL back into bytes
    pub fn decode_data_url(data_url: &str) -> Option<Vec<u8>> {
        let (header, payload) = data_url.split_once(',')?;
        if !header.starts_with("data:") || !header.ends_with(";base64") {
            return None;
        }
        general_purpose::STANDARD.decode(payload).ok()
    }
}

// Payloads run to megabytes; keep them out of logs
impl std::fmt::Debug for ImagePayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImagePayload")
            .field("mime_type", &self.mime_type)
            .field("byte_len", &self.byte_len)
            .field("file_name", &self.file_name)
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Smallest byte sequence `infer` recognizes as PNG
    pub(crate) const PNG_BYTES: &[u8] = &[
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52,
    ];

    #[test]
    fn test_png_encoded_as_data_url() {
        let payload = ImagePayload::from_bytes(PNG_BYTES, Some("eye.png".to_string()), 1024).unwrap();
        assert_eq!(payload.mime_type(), "image/png");
        assert!(payload.data_url().starts_with("data:image/png;base64,iVBORw0KGgo"));
        assert_eq!(payload.byte_len(), PNG_BYTES.len());
        assert_eq!(payload.file_name(), Some("eye.png"));
        assert_eq!(ImagePayload::decode_data_url(payload.data_url()).unwrap(), PNG_BYTES);
    }

    #[test]
    fn test_rejects_empty() {
        assert!(matches!(ImagePayload::from_bytes(&[], None, 1024), Err(ImageError::Empty)));
    }

    #[test]
    fn test_rejects_non_image() {
        let pdf = b"%PDF-1.7\n%\xE2\xE3\xCF\xD3\n";
        assert!(matches!(ImagePayload::from_bytes(pdf, None, 1024), Err(ImageError::NotAnImage(_))));
        assert!(matches!(
            ImagePayload::from_bytes(b"plain text", None, 1024),
            Err(ImageError::NotAnImage(_))
        ));
    }

    #[test]
    fn test_rejects_oversized() {
        let result = ImagePayload::from_bytes(PNG_BYTES, None, 8);
        assert!(matches!(result, Err(ImageError::TooLarge { size: 16, max: 8 })));
    }

    #[tokio::test]
    async fn test_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("retina.png");
        std::fs::write(&path, PNG_BYTES).unwrap();

        let payload = ImagePayload::from_path(&path, 1024).await.unwrap();
        assert_eq!(payload.file_name(), Some("retina.png"));

        let missing = ImagePayload::from_path(&dir.path().join("absent.png"), 1024).await;
        assert!(matches!(missing, Err(ImageError::Io(_))));
    }

    #[test]
    fn test_debug_omits_payload() {
        let payload = ImagePayload::from_bytes(PNG_BYTES, None, 1024).unwrap();
        assert!(!format!("{:?}", payload).contains("base64"));
    }
}
