//! What gets uploaded: a file on disk or a buffer already in memory.

use crate::error::{Result, UploadError};
use bytes::Bytes;
use core_runtime::logging::strip_path;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, Clone)]
enum SourceData {
    Memory(Bytes),
    File(PathBuf),
}

/// The local side of an upload.
///
/// File sources are read one range at a time, so a multipart upload never
/// holds more than the parts in flight.
#[derive(Debug, Clone)]
pub struct UploadSource {
    filename: String,
    content_type: String,
    size: u64,
    data: SourceData,
}

impl UploadSource {
    pub fn from_bytes(filename: impl Into<String>, data: impl Into<Bytes>) -> Self {
        let data = data.into();
        Self {
            filename: filename.into(),
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            size: data.len() as u64,
            data: SourceData::Memory(data),
        }
    }

    /// Describe a file on disk. The name sent to the backend is the path's
    /// final component; the content type is guessed from its extension.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path).await?;
        if !metadata.is_file() {
            return Err(UploadError::InvalidSource(format!(
                "{} is not a regular file",
                path.display()
            )));
        }

        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                UploadError::InvalidSource(format!("{} has no usable file name", path.display()))
            })?
            .to_string();
        tracing::debug!(
            file = %strip_path(&path.to_string_lossy()),
            size = metadata.len(),
            "Upload source opened"
        );

        let content_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();

        Ok(Self {
            filename,
            content_type,
            size: metadata.len(),
            data: SourceData::File(path.to_path_buf()),
        })
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        let content_type = content_type.into();
        if !content_type.trim().is_empty() {
            self.content_type = content_type;
        }
        self
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = filename.into();
        self
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Check the source can be offered to the backend.
    pub fn validate(&self, max_size: u64) -> Result<()> {
        if self.filename.trim().is_empty() {
            return Err(UploadError::InvalidSource("file name is empty".to_string()));
        }
        if self.size > max_size {
            return Err(UploadError::FileTooLarge {
                size: self.size,
                limit: max_size,
            });
        }
        Ok(())
    }

    /// Read `len` bytes starting at `offset`.
    pub async fn read_range(&self, offset: u64, len: u64) -> Result<Bytes> {
        let end = offset
            .checked_add(len)
            .filter(|end| *end <= self.size)
            .ok_or_else(|| {
                UploadError::InvalidSource(format!(
                    "range {}+{} is outside a {} byte source",
                    offset, len, self.size
                ))
            })?;

        match &self.data {
            SourceData::Memory(data) => Ok(data.slice(offset as usize..end as usize)),
            SourceData::File(path) => {
                let mut file = File::open(path).await?;
                file.seek(SeekFrom::Start(offset)).await?;
                let mut buffer = vec![0u8; len as usize];
                file.read_exact(&mut buffer).await?;
                Ok(Bytes::from(buffer))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_ranges() {
        let source = UploadSource::from_bytes("a.txt", &b"hello world"[..]);

        assert_eq!(source.size(), 11);
        assert_eq!(source.content_type(), DEFAULT_CONTENT_TYPE);
        assert_eq!(source.read_range(6, 5).await.unwrap(), Bytes::from_static(b"world"));
        assert!(source.read_range(6, 6).await.is_err());
    }

    #[tokio::test]
    async fn test_file_ranges() {
        let path = std::env::temp_dir().join(format!("r2box-source-{}.bin", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, b"0123456789").await.unwrap();

        let source = UploadSource::from_path(&path)
            .await
            .unwrap()
            .with_content_type("text/plain");

        assert_eq!(source.size(), 10);
        assert!(source.filename().starts_with("r2box-source-"));
        assert_eq!(source.content_type(), "text/plain");
        assert_eq!(source.read_range(3, 4).await.unwrap(), Bytes::from_static(b"3456"));

        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn test_file_content_type_follows_extension() {
        let dir = std::env::temp_dir().join(format!("r2box-mime-{}", uuid::Uuid::new_v4()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let pdf = dir.join("report.pdf");
        let unknown = dir.join("dump.r2boxraw");
        tokio::fs::write(&pdf, b"%PDF-1.7").await.unwrap();
        tokio::fs::write(&unknown, b"??").await.unwrap();

        assert_eq!(
            UploadSource::from_path(&pdf).await.unwrap().content_type(),
            "application/pdf"
        );
        assert_eq!(
            UploadSource::from_path(&unknown).await.unwrap().content_type(),
            DEFAULT_CONTENT_TYPE
        );
        let overridden = UploadSource::from_path(&pdf)
            .await
            .unwrap()
            .with_content_type("application/x-custom");
        assert_eq!(overridden.content_type(), "application/x-custom");

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn test_directory_is_not_a_source() {
        let err = UploadSource::from_path(std::env::temp_dir()).await.unwrap_err();
        assert!(matches!(err, UploadError::InvalidSource(_)));
    }

    #[test]
    fn test_validation() {
        let limit = 1024;
        assert!(UploadSource::from_bytes("ok.bin", vec![0u8; 10]).validate(limit).is_ok());
        assert!(matches!(
            UploadSource::from_bytes(" ", vec![0u8; 10]).validate(limit),
            Err(UploadError::InvalidSource(_))
        ));
        assert!(UploadSource::from_bytes("empty.bin", Vec::<u8>::new())
            .validate(limit)
            .is_ok());
        assert!(matches!(
            UploadSource::from_bytes("big.bin", vec![0u8; 2048]).validate(limit),
            Err(UploadError::FileTooLarge { size: 2048, limit: 1024 })
        ));
    }

    #[test]
    fn test_blank_content_type_keeps_default() {
        let source = UploadSource::from_bytes("a", vec![1u8]).with_content_type("");
        assert_eq!(source.content_type(), DEFAULT_CONTENT_TYPE);
    }
}
