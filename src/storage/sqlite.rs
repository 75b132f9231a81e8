use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::{debug, info};

use super::{
    models::{Post, PostSummary, ResultPage, POST_DATE_FORMAT},
    PageFetcher, PostStore,
};
use crate::error::{ReadMoreError, Result};
use crate::scan::criteria::SearchCriteria;

/// SQLite implementation of PostStore
pub struct SqliteBackend {
    pool: SqlitePool,
    site_url: String,
}

impl SqliteBackend {
    /// Create a new SQLite backend with the given database URL
    pub async fn new(database_url: &str) -> Result<Self> {
        info!("Connecting to SQLite database: {}", database_url);

        // Parse connection options and enable create_if_missing
        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;

        // Run migrations
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS posts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                post_type TEXT NOT NULL DEFAULT 'post',
                post_status TEXT NOT NULL DEFAULT 'publish',
                post_date TEXT NOT NULL,
                post_title TEXT NOT NULL,
                post_content TEXT NOT NULL,
                link TEXT
            )
            "#,
        )
        .execute(&pool)
        .await?;

        // Date range scans
        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_posts_date ON posts(post_date)
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_posts_type_status ON posts(post_type, post_status)
            "#,
        )
        .execute(&pool)
        .await?;

        info!("SQLite database initialized successfully");

        Ok(Self {
            pool,
            site_url: "http://localhost".to_string(),
        })
    }

    /// Set the base URL used to derive permalinks for posts without a stored link
    pub fn with_site_url(mut self, site_url: &str) -> Self {
        self.site_url = site_url.trim_end_matches('/').to_string();
        self
    }

    fn summary(&self, id: i64, title: String, link: Option<String>) -> PostSummary {
        PostSummary {
            id,
            title_html: title,
            url: link.unwrap_or_else(|| format!("{}/?p={}", self.site_url, id)),
        }
    }
}

/// Turn literal text into a LIKE containment pattern, escaping wildcards with `\`
fn contains_pattern(text: &str) -> String {
    let mut pattern = String::with_capacity(text.len() + 2);
    pattern.push('%');
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[async_trait]
impl PageFetcher for SqliteBackend {
    async fn fetch_page(
        &self,
        criteria: &SearchCriteria,
        limit: u32,
        offset: u64,
    ) -> Result<ResultPage> {
        let offset = i64::try_from(offset)
            .map_err(|_| ReadMoreError::InvalidInput(format!("offset {} out of range", offset)))?;

        let ids = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT id
            FROM posts
            WHERE post_type = 'post'
              AND post_status = 'publish'
              AND post_date >= ?
              AND post_date <= ?
              AND post_content LIKE ? ESCAPE '\'
            ORDER BY id ASC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(criteria.starts_at())
        .bind(criteria.ends_at())
        .bind(contains_pattern(&criteria.content_pattern))
        .bind(i64::from(limit))
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        debug!(
            "Fetched {} ids (limit {}, offset {})",
            ids.len(),
            limit,
            offset
        );

        Ok(ResultPage { ids })
    }
}

#[async_trait]
impl PostStore for SqliteBackend {
    async fn insert_post(&self, post: Post) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO posts (post_type, post_status, post_date, post_title, post_content, link)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&post.post_type)
        .bind(&post.post_status)
        .bind(post.post_date.format(POST_DATE_FORMAT).to_string())
        .bind(&post.title)
        .bind(&post.content)
        .bind(&post.link)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        info!("Stored post {} ({})", id, post.post_status);
        Ok(id)
    }

    async fn search_posts(
        &self,
        term: Option<&str>,
        page: u32,
        per_page: u32,
    ) -> Result<(Vec<PostSummary>, u64)> {
        if page == 0 || per_page == 0 {
            return Err(ReadMoreError::InvalidInput(
                "page and per_page must be at least 1".to_string(),
            ));
        }
        let offset = i64::from(page - 1) * i64::from(per_page);
        let term = term.map(str::trim).filter(|t| !t.is_empty());

        let (rows, total) = match term {
            Some(term) => {
                let pattern = contains_pattern(term);

                let total = sqlx::query_scalar::<_, i64>(
                    r#"
                    SELECT COUNT(*)
                    FROM posts
                    WHERE post_type = 'post'
                      AND post_status = 'publish'
                      AND (post_title LIKE ? ESCAPE '\' OR post_content LIKE ? ESCAPE '\')
                    "#,
                )
                .bind(&pattern)
                .bind(&pattern)
                .fetch_one(&self.pool)
                .await?;

                let rows = sqlx::query_as::<_, (i64, String, Option<String>)>(
                    r#"
                    SELECT id, post_title, link
                    FROM posts
                    WHERE post_type = 'post'
                      AND post_status = 'publish'
                      AND (post_title LIKE ? ESCAPE '\' OR post_content LIKE ? ESCAPE '\')
                    ORDER BY post_date DESC, id DESC
                    LIMIT ? OFFSET ?
                    "#,
                )
                .bind(&pattern)
                .bind(&pattern)
                .bind(i64::from(per_page))
                .bind(offset)
                .fetch_all(&self.pool)
                .await?;

                (rows, total)
            }
            None => {
                let total = sqlx::query_scalar::<_, i64>(
                    r#"
                    SELECT COUNT(*)
                    FROM posts
                    WHERE post_type = 'post' AND post_status = 'publish'
                    "#,
                )
                .fetch_one(&self.pool)
                .await?;

                let rows = sqlx::query_as::<_, (i64, String, Option<String>)>(
                    r#"
                    SELECT id, post_title, link
                    FROM posts
                    WHERE post_type = 'post' AND post_status = 'publish'
                    ORDER BY post_date DESC, id DESC
                    LIMIT ? OFFSET ?
                    "#,
                )
                .bind(i64::from(per_page))
                .bind(offset)
                .fetch_all(&self.pool)
                .await?;

                (rows, total)
            }
        };

        let posts = rows
            .into_iter()
            .map(|(id, title, link)| self.summary(id, title, link))
            .collect();

        Ok((posts, total.max(0) as u64))
    }

    async fn get_post(&self, id: i64) -> Result<Option<PostSummary>> {
        let row = sqlx::query_as::<_, (i64, String, Option<String>)>(
            r#"
            SELECT id, post_title, link
            FROM posts
            WHERE id = ? AND post_type = 'post' AND post_status = 'publish'
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(id, title, link)| self.summary(id, title, link)))
    }

    async fn append_content(&self, id: i64, markup: &str) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE posts
            SET post_content = post_content || ?
            WHERE id = ?
            "#,
        )
        .bind(markup)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ReadMoreError::NotFound);
        }

        info!("Appended {} bytes to post {}", markup.len(), id);
        Ok(())
    }
}
