//! Core data models for the image catalog.
//!
//! [`ImageMetadata`] is the stored record (minus its timestamp). Its file
//! extension, storage path and public URL are derived on demand from
//! `(id, content_type)` and are never persisted.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{CatalogError, CatalogResult};
use crate::mimetypes;

/// URL prefix under which image payloads are served.
pub const IMAGE_URL_PREFIX: &str = "/images/img/";

/// One image record and its tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMetadata {
    pub id: i64,
    pub content_type: String,
    pub caption: Option<String>,
    pub tags: Vec<String>,
}

impl ImageMetadata {
    /// Extension for this record's content type, e.g. `.png`.
    pub fn file_ext(&self) -> CatalogResult<&'static str> {
        file_ext_for(&self.content_type)
    }

    /// Payload location relative to the image root.
    pub fn filepath(&self) -> CatalogResult<PathBuf> {
        Ok(make_filepath(self.id, self.file_ext()?))
    }

    pub fn url(&self) -> CatalogResult<String> {
        Ok(make_url(self.id, self.file_ext()?))
    }

    /// Record plus its derived fields, as returned by an upload.
    pub fn to_response(&self) -> CatalogResult<ImageResponse> {
        let ext = self.file_ext()?;
        Ok(ImageResponse {
            metadata: self.clone(),
            filepath: make_filepath(self.id, ext).display().to_string(),
            url: make_url(self.id, ext),
        })
    }
}

/// Extension for a content type, or [`CatalogError::UnmappedContentType`].
pub fn file_ext_for(content_type: &str) -> CatalogResult<&'static str> {
    mimetypes::guess_extension(content_type)
        .ok_or_else(|| CatalogError::UnmappedContentType(content_type.to_string()))
}

pub fn make_url(image_id: i64, file_ext: &str) -> String {
    format!("{IMAGE_URL_PREFIX}{image_id}{file_ext}")
}

pub fn make_filepath(image_id: i64, file_ext: &str) -> PathBuf {
    PathBuf::from(format!("{image_id}{file_ext}"))
}

/// JSON body of an upload response: the record plus `filepath` and `url`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageResponse {
    #[serde(flatten)]
    pub metadata: ImageMetadata,
    pub filepath: String,
    pub url: String,
}

/// Caption and tags supplied alongside an upload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadMetadata {
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// A record as stored, including the insert timestamp.
#[derive(Debug, Clone)]
pub struct ImageRecord {
    pub metadata: ImageMetadata,
    pub created_at: Option<NaiveDateTime>,
}
