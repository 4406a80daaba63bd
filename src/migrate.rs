use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

/// Opens the configured database, ensures the schema and the image
/// directory exist, and closes the pool again. Used by `imgcat init`.
pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    ensure_schema(&pool).await?;
    pool.close().await;

    std::fs::create_dir_all(&config.storage.image_path)?;
    Ok(())
}

/// Creates the `images` and `image_tags` tables if they are missing.
/// Safe to run on every start.
pub async fn ensure_schema(pool: &SqlitePool) -> Result<()> {
    // Create images table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS images (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            content_type TEXT NOT NULL,
            caption TEXT,
            created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create image_tags table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS image_tags (
            image_id INTEGER NOT NULL,
            tag TEXT NOT NULL,
            FOREIGN KEY (image_id) REFERENCES images(id) ON DELETE CASCADE,
            UNIQUE(image_id, tag)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_image_tags_image_id ON image_tags(image_id)")
        .execute(pool)
        .await?;

    Ok(())
}
