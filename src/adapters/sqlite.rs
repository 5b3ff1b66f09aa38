//! SQLite product store.
//!
//! Queries are built at runtime so the crate compiles without a live database.
//! `source_url` is indexed but deliberately not unique: historical duplicates
//! must stay representable so `cleanup_duplicates` can compensate for them.

use crate::config::catalog::StoreConfig;
use crate::domain::model::{ProductRecord, RecordSource, StoreStats, StoredProduct};
use crate::domain::ports::ProductStore;
use crate::utils::error::{CrawlerError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Duration;

const SCHEMA: &[&str] = &[
    r"
    CREATE TABLE IF NOT EXISTS products (
        id TEXT PRIMARY KEY,
        source_url TEXT NOT NULL,
        site_id TEXT NOT NULL,
        site_name TEXT NOT NULL,
        name TEXT NOT NULL,
        origin TEXT,
        region TEXT,
        variety TEXT,
        processing TEXT,
        roast_level TEXT,
        tasting_notes TEXT NOT NULL DEFAULT '[]',
        price REAL,
        currency TEXT,
        image_urls TEXT NOT NULL DEFAULT '[]',
        label_image TEXT,
        crawled_at TEXT NOT NULL,
        source TEXT NOT NULL DEFAULT 'crawled',
        verified INTEGER NOT NULL DEFAULT 0,
        quality_score INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        updated_at TEXT
    )
    ",
    "CREATE INDEX IF NOT EXISTS idx_products_source_url ON products (source_url)",
    "CREATE INDEX IF NOT EXISTS idx_products_site_id ON products (site_id)",
];

const SELECT_COLUMNS: &str = "id, source_url, site_id, site_name, name, origin, region, variety, \
     processing, roast_level, tasting_notes, price, currency, image_urls, label_image, \
     crawled_at, source, verified, quality_score, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct SqliteProductStore {
    pool: SqlitePool,
}

impl SqliteProductStore {
    /// Builds a lazily connected pool; nothing touches the database until the
    /// first query, so an unreachable store surfaces in `test_connection`.
    pub fn connect(config: &StoreConfig) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&config.database_url)?.create_if_missing(true);

        let mut pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections.max(1))
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs));

        // Every connection to `:memory:` is a separate database.
        if config.database_url.contains(":memory:") {
            pool = pool
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }

        Ok(Self {
            pool: pool.connect_lazy_with(options),
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn to_json(values: &[String]) -> Result<String> {
    Ok(serde_json::to_string(values)?)
}

fn from_row(row: &SqliteRow) -> Result<StoredProduct> {
    let tasting_notes: String = row.try_get("tasting_notes")?;
    let image_urls: String = row.try_get("image_urls")?;
    let source: String = row.try_get("source")?;
    let quality_score: i64 = row.try_get("quality_score")?;

    let record = ProductRecord {
        id: row.try_get("id")?,
        source_url: row.try_get("source_url")?,
        site_id: row.try_get("site_id")?,
        site_name: row.try_get("site_name")?,
        name: row.try_get("name")?,
        origin: row.try_get("origin")?,
        region: row.try_get("region")?,
        variety: row.try_get("variety")?,
        processing: row.try_get("processing")?,
        roast_level: row.try_get("roast_level")?,
        tasting_notes: serde_json::from_str(&tasting_notes)?,
        price: row.try_get("price")?,
        currency: row.try_get("currency")?,
        image_urls: serde_json::from_str(&image_urls)?,
        label_image: row.try_get("label_image")?,
        crawled_at: row.try_get("crawled_at")?,
        source: RecordSource::parse(&source),
        verified: row.try_get("verified")?,
        quality_score: quality_score.clamp(0, 100) as u8,
    };

    Ok(StoredProduct {
        record,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get::<Option<DateTime<Utc>>, _>("updated_at")?,
    })
}

#[async_trait]
impl ProductStore for SqliteProductStore {
    async fn test_connection(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| CrawlerError::StoreUnavailableError {
                message: e.to_string(),
            })?;
        Ok(())
    }

    async fn ensure_schema(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    async fn find_by_source_url(&self, source_url: &str) -> Result<Option<StoredProduct>> {
        let sql = format!(
            "SELECT {} FROM products WHERE source_url = ? ORDER BY created_at DESC, rowid DESC LIMIT 1",
            SELECT_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(source_url)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(from_row).transpose()
    }

    async fn insert(&self, record: &ProductRecord) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO products
            (id, source_url, site_id, site_name, name, origin, region, variety, processing,
             roast_level, tasting_notes, price, currency, image_urls, label_image, crawled_at,
             source, verified, quality_score, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(&record.id)
        .bind(&record.source_url)
        .bind(&record.site_id)
        .bind(&record.site_name)
        .bind(&record.name)
        .bind(&record.origin)
        .bind(&record.region)
        .bind(&record.variety)
        .bind(&record.processing)
        .bind(&record.roast_level)
        .bind(to_json(&record.tasting_notes)?)
        .bind(record.price)
        .bind(&record.currency)
        .bind(to_json(&record.image_urls)?)
        .bind(&record.label_image)
        .bind(record.crawled_at)
        .bind(record.source.as_str())
        .bind(record.verified)
        .bind(i64::from(record.quality_score))
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update(&self, id: &str, record: &ProductRecord) -> Result<()> {
        let outcome = sqlx::query(
            r"
            UPDATE products SET
                source_url = ?, site_id = ?, site_name = ?, name = ?, origin = ?, region = ?,
                variety = ?, processing = ?, roast_level = ?, tasting_notes = ?, price = ?,
                currency = ?, image_urls = ?, label_image = ?, crawled_at = ?, source = ?,
                verified = ?, quality_score = ?, updated_at = ?
            WHERE id = ?
            ",
        )
        .bind(&record.source_url)
        .bind(&record.site_id)
        .bind(&record.site_name)
        .bind(&record.name)
        .bind(&record.origin)
        .bind(&record.region)
        .bind(&record.variety)
        .bind(&record.processing)
        .bind(&record.roast_level)
        .bind(to_json(&record.tasting_notes)?)
        .bind(record.price)
        .bind(&record.currency)
        .bind(to_json(&record.image_urls)?)
        .bind(&record.label_image)
        .bind(record.crawled_at)
        .bind(record.source.as_str())
        .bind(record.verified)
        .bind(i64::from(record.quality_score))
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if outcome.rows_affected() == 0 {
            return Err(CrawlerError::PersistenceError {
                source_url: record.source_url.clone(),
                message: format!("no row with id {}", id),
            });
        }
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<StoredProduct>> {
        let sql = format!(
            "SELECT {} FROM products ORDER BY created_at ASC, rowid ASC",
            SELECT_COLUMNS
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(from_row).collect()
    }

    async fn delete(&self, ids: &[String]) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let mut deleted = 0;
        for id in ids {
            deleted += sqlx::query("DELETE FROM products WHERE id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }
        tx.commit().await?;
        Ok(deleted)
    }

    async fn stats(&self) -> Result<StoreStats> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;

        let by_site = sqlx::query_as::<_, (String, i64)>(
            "SELECT site_id, COUNT(*) FROM products GROUP BY site_id",
        )
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .collect::<BTreeMap<_, _>>();

        let by_origin = sqlx::query_as::<_, (String, i64)>(
            "SELECT COALESCE(origin, 'Unknown'), COUNT(*) FROM products GROUP BY COALESCE(origin, 'Unknown')",
        )
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .collect::<BTreeMap<_, _>>();

        let since = Utc::now() - ChronoDuration::hours(1);
        let crawled_last_hour: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE crawled_at >= ?")
                .bind(since)
                .fetch_one(&self.pool)
                .await?;

        Ok(StoreStats {
            total,
            by_site,
            by_origin,
            crawled_last_hour,
        })
    }
}
