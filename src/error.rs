//! Error types shared by the catalog services.

/// Errors raised by ingestion, queries and file retrieval.
///
/// The first group are client-input problems detected at the boundary;
/// store and filesystem failures pass through untranslated.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("invalid image format")]
    InvalidImage,

    #[error("cannot determine MIME type: no filename or content type")]
    UnknownMimeType,

    #[error("cannot determine file extension: no filename or known content type")]
    UnknownExtension,

    #[error("no file extension known for content type: {0}")]
    UnmappedContentType(String),

    #[error("image not found: {0}")]
    NotFound(i64),

    #[error("store did not return an id for the new image")]
    MissingId,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl CatalogError {
    /// True for errors caused by the request itself rather than the
    /// service.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidImage | Self::UnknownMimeType | Self::UnknownExtension | Self::NotFound(_)
        )
    }
}

pub type CatalogResult<T> = std::result::Result<T, CatalogError>;
