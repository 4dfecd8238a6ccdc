use std::path::Path;

use image::ImageFormat;
use tracing::info;

use super::types::UploadedImage;
use crate::api::{ApiRequest, AuthorizedClient, FilePart};
use crate::error::ClientError;

pub const UPLOAD_PATH: &str = "api/images/upload/";
/// Multipart field name the server reads the file from.
pub const UPLOAD_FIELD: &str = "image";

/// An image file ready to upload, with its MIME type resolved.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: String,
    pub mime: &'static str,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    /// Resolve the format from the file contents, falling back to the extension.
    pub fn from_bytes(file_name: &str, bytes: Vec<u8>) -> Result<Self, ClientError> {
        if bytes.is_empty() {
            return Err(ClientError::InvalidUpload(format!("{} is empty", file_name)));
        }

        let format = image::guess_format(&bytes)
            .or_else(|_| ImageFormat::from_path(file_name))
            .map_err(|_| {
                ClientError::InvalidUpload(format!("{} is not a supported image", file_name))
            })?;

        Ok(Self {
            file_name: file_name.to_string(),
            mime: format.to_mime_type(),
            bytes,
        })
    }

    /// Blocking read; call from `spawn_blocking` in async code.
    pub fn from_path(path: &Path) -> Result<Self, ClientError> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ClientError::InvalidUpload(format!("No file name in {:?}", path)))?
            .to_string();
        let bytes = std::fs::read(path).map_err(|e| {
            ClientError::InvalidUpload(format!("Failed to read {:?}: {}", path, e))
        })?;
        Self::from_bytes(&file_name, bytes)
    }

    fn to_part(&self) -> FilePart {
        FilePart {
            field: UPLOAD_FIELD.to_string(),
            file_name: self.file_name.clone(),
            mime: self.mime.to_string(),
            bytes: self.bytes.clone(),
        }
    }
}

/// Upload one image. The new resource joins the collection on the next fetch.
pub async fn upload_image(
    api: &AuthorizedClient,
    file: &UploadFile,
    access_token: &str,
) -> Result<UploadedImage, ClientError> {
    info!(
        "Uploading {} ({} bytes, {})",
        file.file_name,
        file.bytes.len(),
        file.mime
    );
    let request = ApiRequest::post_multipart(UPLOAD_PATH, file.to_part());
    let uploaded: UploadedImage = api.execute_json(&request, access_token).await?;
    info!("Uploaded {} as image {}", file.file_name, uploaded.id);
    Ok(uploaded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

    #[test]
    fn test_mime_from_content() {
        let file = UploadFile::from_bytes("photo.bin", PNG_MAGIC.to_vec()).unwrap();
        assert_eq!(file.mime, "image/png");
    }

    #[test]
    fn test_mime_from_extension_fallback() {
        let file = UploadFile::from_bytes("photo.jpg", b"not really a jpeg".to_vec()).unwrap();
        assert_eq!(file.mime, "image/jpeg");
    }

    #[test]
    fn test_unknown_format_rejected() {
        let result = UploadFile::from_bytes("notes.txt", b"hello".to_vec());
        assert!(matches!(result, Err(ClientError::InvalidUpload(_))));
    }

    #[test]
    fn test_empty_file_rejected() {
        let result = UploadFile::from_bytes("empty.png", Vec::new());
        assert!(matches!(result, Err(ClientError::InvalidUpload(_))));
    }

    #[test]
    fn test_from_path_reads_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cat.png");
        std::fs::write(&path, PNG_MAGIC).unwrap();

        let file = UploadFile::from_path(&path).unwrap();
        assert_eq!(file.file_name, "cat.png");
        assert_eq!(file.bytes.len(), PNG_MAGIC.len());
        assert_eq!(file.to_part().field, "image");
    }
}
