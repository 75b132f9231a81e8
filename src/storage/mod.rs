pub mod models;
pub mod sqlite;

use async_trait::async_trait;
use models::{Post, PostSummary, ResultPage};

use crate::error::Result;
use crate::scan::criteria::SearchCriteria;

/// Issues one bounded query against the record store.
///
/// Implementations must return ids in a stable order across calls so that
/// consecutive `(limit, offset)` windows neither skip nor repeat records.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_page(
        &self,
        criteria: &SearchCriteria,
        limit: u32,
        offset: u64,
    ) -> Result<ResultPage>;
}

/// Trait defining the storage backend interface
#[async_trait]
pub trait PostStore: PageFetcher {
    /// Store a new post and return its identifier
    async fn insert_post(&self, post: Post) -> Result<i64>;

    /// Search published posts by title or content; returns one page and the total match count
    async fn search_posts(
        &self,
        term: Option<&str>,
        page: u32,
        per_page: u32,
    ) -> Result<(Vec<PostSummary>, u64)>;

    /// Get a published post by its ID
    async fn get_post(&self, id: i64) -> Result<Option<PostSummary>>;

    /// Append markup to the end of a post's content
    async fn append_content(&self, id: i64, markup: &str) -> Result<()>;
}
