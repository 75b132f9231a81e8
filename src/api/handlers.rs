use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::error;

use crate::storage::{
    models::{TOTAL_HEADER, TOTAL_PAGES_HEADER},
    PostStore,
};

const DEFAULT_PER_PAGE: u32 = 10;
const MAX_PER_PAGE: u32 = 100;

type ApiError = (StatusCode, Json<Value>);

/// Query parameters of the post collection
#[derive(Debug, Deserialize)]
pub struct ListPostsParams {
    pub per_page: Option<u32>,
    pub page: Option<u32>,
    pub search: Option<String>,
    /// Accepted for compatibility; summaries only carry `id,title,link` anyway
    #[serde(rename = "_fields")]
    #[allow(dead_code)]
    pub fields: Option<String>,
}

fn rest_error(status: StatusCode, code: &str, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(json!({
            "code": code,
            "message": message.into(),
            "data": { "status": status.as_u16() }
        })),
    )
}

fn store_error(e: impl std::fmt::Display) -> ApiError {
    error!("Post store error: {}", e);
    rest_error(
        StatusCode::INTERNAL_SERVER_ERROR,
        "rest_store_unavailable",
        format!("Failed to fetch posts: {}", e),
    )
}

/// List published posts, optionally filtered by a search term
pub async fn list_posts(
    Query(params): Query<ListPostsParams>,
    State(storage): State<Arc<dyn PostStore>>,
) -> Result<Response, ApiError> {
    let per_page = params.per_page.unwrap_or(DEFAULT_PER_PAGE);
    if per_page == 0 || per_page > MAX_PER_PAGE {
        return Err(rest_error(
            StatusCode::BAD_REQUEST,
            "rest_invalid_param",
            format!("per_page must be between 1 and {} (inclusive)", MAX_PER_PAGE),
        ));
    }

    let page = params.page.unwrap_or(1);
    if page == 0 {
        return Err(rest_error(
            StatusCode::BAD_REQUEST,
            "rest_invalid_param",
            "page must be greater than or equal to 1",
        ));
    }

    let (posts, total) = storage
        .search_posts(params.search.as_deref(), page, per_page)
        .await
        .map_err(store_error)?;

    let total_pages = total.div_ceil(u64::from(per_page));
    if total > 0 && u64::from(page) > total_pages {
        return Err(rest_error(
            StatusCode::BAD_REQUEST,
            "rest_post_invalid_page_number",
            "The page number requested is larger than the number of pages available.",
        ));
    }

    Ok((
        [
            (TOTAL_HEADER, total.to_string()),
            (TOTAL_PAGES_HEADER, total_pages.to_string()),
        ],
        Json(posts),
    )
        .into_response())
}

/// Get a single published post by ID
pub async fn get_post(
    Path(id): Path<i64>,
    State(storage): State<Arc<dyn PostStore>>,
) -> Result<Response, ApiError> {
    match storage.get_post(id).await {
        Ok(Some(post)) => Ok(Json(post).into_response()),
        Ok(None) => Err(rest_error(
            StatusCode::NOT_FOUND,
            "rest_post_invalid_id",
            "Invalid post ID.",
        )),
        Err(e) => Err(store_error(e)),
    }
}
