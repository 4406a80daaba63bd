//! Record lookup and payload retrieval.
//!
//! Used by the `imgcat list` / `imgcat get` commands and the
//! `GET /images/list` and `GET /images/img/{id}` endpoints.

use anyhow::Result;
use sqlx::SqliteConnection;

use crate::config::Config;
use crate::db;
use crate::error::{CatalogError, CatalogResult};
use crate::models::{ImageMetadata, ImageRecord};
use crate::storage::ImageStorage;
use crate::store;

/// Every image with its tags, ordered by id.
pub async fn list_images(conn: &mut SqliteConnection) -> CatalogResult<Vec<ImageMetadata>> {
    store::fetch_all(conn).await
}

pub async fn load_image_record(
    conn: &mut SqliteConnection,
    image_id: i64,
) -> CatalogResult<ImageRecord> {
    store::fetch_image(conn, image_id)
        .await?
        .ok_or(CatalogError::NotFound(image_id))
}

/// One image with its tags, or [`CatalogError::NotFound`].
pub async fn get_image(conn: &mut SqliteConnection, image_id: i64) -> CatalogResult<ImageMetadata> {
    Ok(load_image_record(conn, image_id).await?.metadata)
}

/// Loads a record and the bytes of its payload.
///
/// A record whose payload file is missing yields [`CatalogError::Io`], not
/// `NotFound`: the metadata says the image exists.
pub async fn load_image_file(
    conn: &mut SqliteConnection,
    storage: &ImageStorage,
    image_id: i64,
) -> CatalogResult<(ImageMetadata, Vec<u8>)> {
    let image = get_image(conn, image_id).await?;
    let data = storage.read(&image.filepath()?).await?;
    Ok((image, data))
}

/// CLI entry point for `imgcat list`.
pub async fn run_list(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    let mut conn = pool.acquire().await?;
    let images = list_images(&mut conn).await?;
    drop(conn);
    pool.close().await;

    if images.is_empty() {
        println!("No images.");
        return Ok(());
    }

    for image in &images {
        println!(
            "{:>6}  {:<14} {}  [{}]",
            image.id,
            image.content_type,
            image.caption.as_deref().unwrap_or("(no caption)"),
            image.tags.join(", ")
        );
    }
    println!();
    println!("{} image(s)", images.len());

    Ok(())
}

/// CLI entry point for `imgcat get <id>`.
pub async fn run_get(config: &Config, image_id: i64) -> Result<()> {
    let pool = db::connect(config).await?;
    let mut conn = pool.acquire().await?;
    let record = load_image_record(&mut conn, image_id).await;
    drop(conn);
    pool.close().await;

    let record = match record {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    let image = &record.metadata;

    println!("--- Image ---");
    println!("id:           {}", image.id);
    println!("content_type: {}", image.content_type);
    println!(
        "caption:      {}",
        image.caption.as_deref().unwrap_or("(no caption)")
    );
    println!("tags:         {}", image.tags.join(", "));
    if let Some(created_at) = record.created_at {
        println!("created_at:   {}", created_at.format("%Y-%m-%dT%H:%M:%SZ"));
    }
    match (image.filepath(), image.url()) {
        (Ok(path), Ok(url)) => {
            println!(
                "filepath:     {}",
                config.storage.image_path.join(path).display()
            );
            println!("url:          {}", url);
        }
        (Err(e), _) | (_, Err(e)) => println!("filepath:     ({})", e),
    }

    Ok(())
}
