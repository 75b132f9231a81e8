use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{LookupMode, LookupPage, LookupQuery, LOOKUP_PAGE_SIZE};
use crate::error::{ReadMoreError, Result};
use crate::storage::models::{PostSummary, TOTAL_PAGES_HEADER};

const SUMMARY_FIELDS: &str = "id,title,link";

/// Where the lookup gets its posts from
#[async_trait]
pub trait PostSource: Send + Sync {
    /// Fetch one page of results.
    ///
    /// Returns `Err(Cancelled)` once `cancel` fires; implementations must stop
    /// the underlying work rather than finish it and discard the result.
    async fn fetch(&self, query: &LookupQuery, cancel: &CancellationToken) -> Result<LookupPage>;
}

/// Post source backed by the posts REST endpoint
#[derive(Clone)]
pub struct RestPostSource {
    client: Client,
    base_url: String,
}

impl RestPostSource {
    /// Create a client for `base_url` (e.g. `http://localhost:3000/wp/v2`)
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ReadMoreError::InvalidInput(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn request(&self, query: &LookupQuery) -> Result<LookupPage> {
        match query.mode() {
            LookupMode::Single(id) => self.fetch_single(id).await,
            LookupMode::Paged { search, page } => self.fetch_paged(search, page).await,
        }
    }

    async fn fetch_single(&self, id: i64) -> Result<LookupPage> {
        let url = format!("{}/posts/{}", self.base_url, id);
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .query(&[("_fields", SUMMARY_FIELDS)])
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(LookupPage::empty());
        }
        let response = ensure_success(response).await?;

        let post: PostSummary = response.json().await?;
        Ok(LookupPage {
            posts: vec![post],
            total_pages: 1,
        })
    }

    async fn fetch_paged(&self, search: Option<&str>, page: u32) -> Result<LookupPage> {
        let url = format!("{}/posts", self.base_url);
        let mut params = vec![
            ("per_page", LOOKUP_PAGE_SIZE.to_string()),
            ("page", page.to_string()),
            ("_fields", SUMMARY_FIELDS.to_string()),
        ];
        if let Some(term) = search {
            params.push(("search", term.to_string()));
        }
        debug!("GET {} {:?}", url, params);

        let response = self.client.get(&url).query(&params).send().await?;
        let response = ensure_success(response).await?;

        let total_pages = response
            .headers()
            .get(TOTAL_PAGES_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u32>().ok())
            .unwrap_or(1)
            .max(1);

        let posts: Vec<PostSummary> = response.json().await?;
        Ok(LookupPage { posts, total_pages })
    }
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(ReadMoreError::Remote {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl PostSource for RestPostSource {
    async fn fetch(&self, query: &LookupQuery, cancel: &CancellationToken) -> Result<LookupPage> {
        // Dropping the request future aborts the connection
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ReadMoreError::Cancelled),
            result = self.request(query) => result,
        }
    }
}
