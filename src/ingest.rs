//! Image ingestion.
//!
//! Validates an uploaded payload, resolves its content type, records the
//! metadata and tags, and writes the bytes to the image directory:
//!
//! ```text
//! decode check → content type → extension → images row → tag rows → payload file
//! ```
//!
//! The image row is committed before the tags, and the tags before the
//! payload is written. If either later step fails the image row is deleted
//! again (tags cascade) and any partial payload removed, so a failed upload
//! never leaves a record that cannot be served.

use anyhow::{Context, Result};
use sqlx::SqliteConnection;
use std::io::Cursor;
use std::path::Path;

use crate::config::Config;
use crate::db;
use crate::error::{CatalogError, CatalogResult};
use crate::migrate;
use crate::mimetypes;
use crate::models::{self, ImageMetadata, UploadMetadata};
use crate::storage::ImageStorage;
use crate::store;

/// An uploaded payload and what the client said about it.
#[derive(Debug, Clone, Default)]
pub struct Upload {
    pub data: Vec<u8>,
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub metadata: UploadMetadata,
}

/// Fully decodes `data` as an image, sniffing the format from its bytes.
pub fn validate_image(data: &[u8]) -> CatalogResult<()> {
    image::ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|_| CatalogError::InvalidImage)?
        .decode()
        .map_err(|_| CatalogError::InvalidImage)?;
    Ok(())
}

/// Declared content type if present, else a guess from the filename.
pub fn resolve_content_type(
    declared: Option<&str>,
    filename: Option<&str>,
) -> CatalogResult<String> {
    if let Some(ct) = declared.map(str::trim).filter(|ct| !ct.is_empty()) {
        return Ok(ct.to_string());
    }
    filename
        .and_then(mimetypes::guess_type)
        .map(str::to_string)
        .ok_or(CatalogError::UnknownMimeType)
}

/// The filename's own extension if it has one, else the canonical
/// extension of the content type.
pub fn resolve_extension(filename: Option<&str>, content_type: &str) -> CatalogResult<String> {
    if let Some(ext) = filename.and_then(mimetypes::extension_of) {
        return Ok(ext.to_string());
    }
    mimetypes::guess_extension(content_type)
        .map(str::to_string)
        .ok_or(CatalogError::UnknownExtension)
}

/// Drops repeated tags, keeping the first occurrence of each.
fn dedup_tags(tags: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        if !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}

/// Ingests one upload and returns the stored record.
pub async fn ingest(
    conn: &mut SqliteConnection,
    storage: &ImageStorage,
    upload: Upload,
) -> CatalogResult<ImageMetadata> {
    let Upload {
        data,
        filename,
        content_type,
        metadata,
    } = upload;

    // Decoding is CPU bound; keep it off the async workers.
    let data = tokio::task::spawn_blocking(move || validate_image(&data).map(|_| data))
        .await
        .map_err(|e| CatalogError::Io(std::io::Error::other(e)))??;

    let content_type = resolve_content_type(content_type.as_deref(), filename.as_deref())?;
    let file_ext = resolve_extension(filename.as_deref(), &content_type)?;

    // The stored path derives from the content type, so it has to map to an
    // extension before anything is written.
    let stored_ext =
        models::file_ext_for(&content_type).map_err(|_| CatalogError::UnknownExtension)?;
    if !file_ext.eq_ignore_ascii_case(stored_ext) {
        tracing::debug!(
            upload_ext = %file_ext,
            stored_ext,
            content_type = %content_type,
            "upload extension differs from content type"
        );
    }

    let tags = dedup_tags(metadata.tags);
    let id = store::insert_image(conn, &content_type, metadata.caption.as_deref()).await?;

    let image = ImageMetadata {
        id,
        content_type,
        caption: metadata.caption,
        tags,
    };
    let filepath = models::make_filepath(id, stored_ext);

    if let Err(err) = persist(conn, storage, &image, &filepath, &data).await {
        tracing::warn!(image_id = id, error = %err, "ingestion failed, removing partial image");
        if let Err(cleanup) = store::delete_image(conn, id).await {
            tracing::error!(image_id = id, error = %cleanup, "failed to remove image row");
        }
        if let Err(cleanup) = storage.remove(&filepath).await {
            tracing::error!(image_id = id, error = %cleanup, "failed to remove image file");
        }
        return Err(err);
    }

    tracing::info!(
        image_id = id,
        content_type = %image.content_type,
        tags = image.tags.len(),
        bytes = data.len(),
        "image ingested"
    );

    Ok(image)
}

/// CLI entry point for `imgcat upload`. Prints the stored record as JSON.
pub async fn run_upload(
    config: &Config,
    path: &Path,
    caption: Option<String>,
    tags: Vec<String>,
    content_type: Option<String>,
) -> Result<()> {
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read image file: {}", path.display()))?;

    let pool = db::connect(config).await?;
    migrate::ensure_schema(&pool).await?;
    let storage = ImageStorage::new(&config.storage.image_path);
    storage.ensure_root().await?;

    let upload = Upload {
        data,
        filename: path.file_name().map(|n| n.to_string_lossy().into_owned()),
        content_type,
        metadata: UploadMetadata { caption, tags },
    };

    let mut conn = pool.acquire().await?;
    let result = ingest(&mut conn, &storage, upload).await;
    drop(conn);
    pool.close().await;

    let image = result?;
    println!("{}", serde_json::to_string_pretty(&image.to_response()?)?);
    Ok(())
}

async fn persist(
    conn: &mut SqliteConnection,
    storage: &ImageStorage,
    image: &ImageMetadata,
    filepath: &Path,
    data: &[u8],
) -> CatalogResult<()> {
    store::insert_tags(conn, image.id, &image.tags).await?;
    storage.write(filepath, data).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db, migrate, query};
    use image::{ImageBuffer, Rgba, RgbaImage};
    use sqlx::pool::PoolConnection;
    use sqlx::Sqlite;
    use tempfile::TempDir;

    fn png_bytes() -> Vec<u8> {
        let img: RgbaImage = ImageBuffer::from_pixel(4, 4, Rgba([255, 128, 0, 255]));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    async fn setup() -> (PoolConnection<Sqlite>, ImageStorage, TempDir) {
        let pool = db::connect_in_memory().await;
        migrate::ensure_schema(&pool).await.unwrap();
        let tmp = TempDir::new().unwrap();
        let storage = ImageStorage::new(tmp.path().join("images"));
        (pool.acquire().await.unwrap(), storage, tmp)
    }

    fn upload(data: Vec<u8>, filename: Option<&str>, content_type: Option<&str>) -> Upload {
        Upload {
            data,
            filename: filename.map(str::to_string),
            content_type: content_type.map(str::to_string),
            metadata: UploadMetadata {
                caption: Some("cat".into()),
                tags: vec!["pet".into(), "orange".into()],
            },
        }
    }

    async fn image_count(conn: &mut SqliteConnection) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM images")
            .fetch_one(conn)
            .await
            .unwrap()
    }

    #[test]
    fn test_validate_image() {
        assert!(validate_image(&png_bytes()).is_ok());
        assert!(matches!(
            validate_image(b"definitely not an image"),
            Err(CatalogError::InvalidImage)
        ));
        assert!(validate_image(&[]).is_err());
    }

    #[test]
    fn test_truncated_png_rejected() {
        let data = png_bytes();
        assert!(validate_image(&data[..data.len() / 2]).is_err());
    }

    #[test]
    fn test_resolve_content_type_order() {
        assert_eq!(
            resolve_content_type(Some("image/gif"), Some("a.png")).unwrap(),
            "image/gif"
        );
        assert_eq!(
            resolve_content_type(None, Some("a.png")).unwrap(),
            "image/png"
        );
        assert_eq!(resolve_content_type(Some(""), Some("a.jpg")).unwrap(), "image/jpeg");
        assert!(matches!(
            resolve_content_type(None, Some("noext")),
            Err(CatalogError::UnknownMimeType)
        ));
        assert!(matches!(
            resolve_content_type(None, None),
            Err(CatalogError::UnknownMimeType)
        ));
    }

    #[test]
    fn test_resolve_extension_order() {
        assert_eq!(resolve_extension(Some("a.jpeg"), "image/png").unwrap(), ".jpeg");
        assert_eq!(resolve_extension(Some("blob"), "image/png").unwrap(), ".png");
        assert_eq!(resolve_extension(None, "image/gif").unwrap(), ".gif");
        assert!(matches!(
            resolve_extension(None, "image/x-unknown"),
            Err(CatalogError::UnknownExtension)
        ));
    }

    #[test]
    fn test_dedup_tags_keeps_order() {
        let tags = vec!["b".into(), "a".into(), "b".into(), "c".into(), "a".into()];
        assert_eq!(dedup_tags(tags), vec!["b", "a", "c"]);
    }

    #[tokio::test]
    async fn test_ingest_png() {
        let (mut conn, storage, _tmp) = setup().await;
        let data = png_bytes();

        let image = ingest(&mut conn, &storage, upload(data.clone(), None, Some("image/png")))
            .await
            .unwrap();

        assert_eq!(image.content_type, "image/png");
        assert_eq!(image.caption.as_deref(), Some("cat"));
        assert_eq!(image.tags, vec!["pet", "orange"]);
        assert_eq!(image.url().unwrap(), format!("/images/img/{}.png", image.id));

        let stored = storage.read(&image.filepath().unwrap()).await.unwrap();
        assert_eq!(stored, data);

        let loaded = query::get_image(&mut conn, image.id).await.unwrap();
        assert_eq!(loaded, image);
        let all = query::list_images(&mut conn).await.unwrap();
        assert!(all.contains(&image));
    }

    #[tokio::test]
    async fn test_ingest_guesses_type_from_filename() {
        let (mut conn, storage, _tmp) = setup().await;
        let image = ingest(&mut conn, &storage, upload(png_bytes(), Some("cat.png"), None))
            .await
            .unwrap();
        assert_eq!(image.content_type, "image/png");
    }

    #[tokio::test]
    async fn test_ingest_rejects_non_image_without_row() {
        let (mut conn, storage, _tmp) = setup().await;
        let err = ingest(
            &mut conn,
            &storage,
            upload(b"hello".to_vec(), Some("x.png"), Some("image/png")),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, CatalogError::InvalidImage));
        assert_eq!(image_count(&mut conn).await, 0);
    }

    #[tokio::test]
    async fn test_ingest_without_type_information() {
        let (mut conn, storage, _tmp) = setup().await;
        let err = ingest(&mut conn, &storage, upload(png_bytes(), None, None))
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::UnknownMimeType));
        assert_eq!(image_count(&mut conn).await, 0);
    }

    #[tokio::test]
    async fn test_ingest_unmapped_content_type_rejected() {
        let (mut conn, storage, _tmp) = setup().await;
        let err = ingest(
            &mut conn,
            &storage,
            upload(png_bytes(), Some("a.png"), Some("image/x-unknown")),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, CatalogError::UnknownExtension));
        assert_eq!(image_count(&mut conn).await, 0);
    }

    #[tokio::test]
    async fn test_ingest_duplicate_tags_collapse() {
        let (mut conn, storage, _tmp) = setup().await;
        let mut up = upload(png_bytes(), None, Some("image/png"));
        up.metadata.tags = vec!["pet".into(), "pet".into()];

        let image = ingest(&mut conn, &storage, up).await.unwrap();
        assert_eq!(image.tags, vec!["pet"]);
        assert_eq!(store::tags_for(&mut conn, image.id).await.unwrap(), vec!["pet"]);
    }

    #[tokio::test]
    async fn test_failed_write_removes_row() {
        let (mut conn, _storage, tmp) = setup().await;
        // A regular file where the image directory should be makes the write fail.
        let blocked = tmp.path().join("not-a-dir");
        std::fs::write(&blocked, b"").unwrap();
        let storage = ImageStorage::new(&blocked);

        let result = ingest(&mut conn, &storage, upload(png_bytes(), None, Some("image/png"))).await;

        assert!(matches!(result, Err(CatalogError::Io(_))));
        assert_eq!(image_count(&mut conn).await, 0);
        let tags: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM image_tags")
            .fetch_one(&mut *conn)
            .await
            .unwrap();
        assert_eq!(tags, 0);
    }
}
