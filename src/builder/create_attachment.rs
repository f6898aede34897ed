use std::path::Path;

use tokio::fs::File;
use tokio::io::AsyncReadExt;

use crate::internal::prelude::*;

/// A file to upload along with a request.
///
/// Each attachment is sent as its own multipart part and described in the `attachments` array of
/// the request's JSON payload. Unless overridden with [`Self::id`], an attachment's id is its
/// position among the request's files.
///
/// [Discord docs](https://discord.com/developers/docs/reference#uploading-files)
#[derive(Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
#[must_use]
pub struct CreateAttachment {
    pub data: Vec<u8>,
    pub filename: String,
    pub description: Option<String>,
    pub id: Option<u64>,
    pub flags: Option<u64>,
}

impl CreateAttachment {
    /// Builds an [`CreateAttachment`] from the raw attachment data.
    pub fn bytes(data: impl Into<Vec<u8>>, filename: impl Into<String>) -> CreateAttachment {
        CreateAttachment {
            data: data.into(),
            filename: filename.into(),
            description: None,
            id: None,
            flags: None,
        }
    }

    /// Builds an [`CreateAttachment`] by reading a local file.
    ///
    /// # Errors
    ///
    /// [`Error::Io`] if reading the file fails.
    pub async fn path(path: impl AsRef<Path>) -> Result<CreateAttachment> {
        let mut file = File::open(path.as_ref()).await?;
        let mut data = Vec::new();
        file.read_to_end(&mut data).await?;

        let filename = path.as_ref().file_name().ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::Other,
                "attachment path must not be a directory",
            )
        })?;

        Ok(CreateAttachment::bytes(data, filename.to_string_lossy()))
    }

    /// Builds an [`CreateAttachment`] by reading from a file handler.
    ///
    /// # Errors
    ///
    /// [`Error::Io`] error if reading the file fails.
    pub async fn file(file: &File, filename: impl Into<String>) -> Result<CreateAttachment> {
        let mut data = Vec::new();
        file.try_clone().await?.read_to_end(&mut data).await?;

        Ok(CreateAttachment::bytes(data, filename))
    }

    /// Sets a description for the file (max 1024 characters).
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Overrides the id the attachment is referred to by in the payload. Defaults to the
    /// attachment's position among the request's files.
    pub fn id(mut self, id: u64) -> Self {
        self.id = Some(id);
        self
    }

    /// Sets the attachment flags, such as marking it as a spoiler.
    pub fn flags(mut self, flags: u64) -> Self {
        self.flags = Some(flags);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_file_from_path() {
        let path = std::env::temp_dir().join("serenade-create-attachment.txt");
        tokio::fs::write(&path, b"hello").await.unwrap();

        let attachment = CreateAttachment::path(&path).await.unwrap();
        assert_eq!(attachment.data, b"hello");
        assert_eq!(attachment.filename, "serenade-create-attachment.txt");
        assert_eq!(attachment.id, None);

        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn missing_file_is_io_error() {
        let err = CreateAttachment::path("/definitely/not/here.png").await.unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn setters() {
        let attachment =
            CreateAttachment::bytes(vec![1, 2], "a.png").description("alt").id(7).flags(1 << 3);

        assert_eq!(attachment.description.as_deref(), Some("alt"));
        assert_eq!(attachment.id, Some(7));
        assert_eq!(attachment.flags, Some(8));
    }
}
