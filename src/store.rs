//! SQL access to the `images` and `image_tags` tables.
//!
//! Every function takes a borrowed connection so the caller decides its
//! scope: the HTTP server hands in the connection acquired for the
//! current request, the CLI one from a short-lived pool.

use sqlx::{Connection, Row, SqliteConnection};
use std::collections::HashMap;

use crate::error::{CatalogError, CatalogResult};
use crate::models::{ImageMetadata, ImageRecord};

/// Inserts an image row and returns the id assigned by SQLite.
/// The statement commits on its own.
pub async fn insert_image(
    conn: &mut SqliteConnection,
    content_type: &str,
    caption: Option<&str>,
) -> CatalogResult<i64> {
    let id: Option<i64> = sqlx::query_scalar(
        r#"
        INSERT INTO images (content_type, caption)
        VALUES (?, ?)
        RETURNING id
        "#,
    )
    .bind(content_type)
    .bind(caption)
    .fetch_optional(&mut *conn)
    .await?;

    id.ok_or(CatalogError::MissingId)
}

/// Associates `tags` with an image in one transaction. Pairs that already
/// exist are left alone.
pub async fn insert_tags(
    conn: &mut SqliteConnection,
    image_id: i64,
    tags: &[String],
) -> CatalogResult<()> {
    let mut tx = conn.begin().await?;

    for tag in tags {
        sqlx::query("INSERT OR IGNORE INTO image_tags (image_id, tag) VALUES (?, ?)")
            .bind(image_id)
            .bind(tag)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Tags of one image in insertion order.
pub async fn tags_for(conn: &mut SqliteConnection, image_id: i64) -> CatalogResult<Vec<String>> {
    let tags = sqlx::query_scalar("SELECT tag FROM image_tags WHERE image_id = ? ORDER BY rowid")
        .bind(image_id)
        .fetch_all(&mut *conn)
        .await?;
    Ok(tags)
}

pub async fn fetch_image(
    conn: &mut SqliteConnection,
    image_id: i64,
) -> CatalogResult<Option<ImageRecord>> {
    let row = sqlx::query(
        r#"
        SELECT id, content_type, caption, created_at
        FROM images
        WHERE id = ?
        "#,
    )
    .bind(image_id)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let id: i64 = row.try_get("id")?;
    let tags = tags_for(conn, id).await?;

    Ok(Some(ImageRecord {
        metadata: ImageMetadata {
            id,
            content_type: row.try_get("content_type")?,
            caption: row.try_get("caption")?,
            tags,
        },
        created_at: row.try_get("created_at")?,
    }))
}

/// All images with their tags, ordered by id.
pub async fn fetch_all(conn: &mut SqliteConnection) -> CatalogResult<Vec<ImageMetadata>> {
    let image_rows = sqlx::query("SELECT id, content_type, caption FROM images ORDER BY id")
        .fetch_all(&mut *conn)
        .await?;

    let tag_rows = sqlx::query("SELECT image_id, tag FROM image_tags ORDER BY rowid")
        .fetch_all(&mut *conn)
        .await?;

    let mut tags_by_image: HashMap<i64, Vec<String>> = HashMap::new();
    for row in &tag_rows {
        tags_by_image
            .entry(row.try_get("image_id")?)
            .or_default()
            .push(row.try_get("tag")?);
    }

    image_rows
        .iter()
        .map(|row| -> CatalogResult<ImageMetadata> {
            let id: i64 = row.try_get("id")?;
            Ok(ImageMetadata {
                id,
                content_type: row.try_get("content_type")?,
                caption: row.try_get("caption")?,
                tags: tags_by_image.remove(&id).unwrap_or_default(),
            })
        })
        .collect()
}

/// Deletes an image row; its tags go with it. Returns whether a row existed.
pub async fn delete_image(conn: &mut SqliteConnection, image_id: i64) -> CatalogResult<bool> {
    let result = sqlx::query("DELETE FROM images WHERE id = ?")
        .bind(image_id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}
