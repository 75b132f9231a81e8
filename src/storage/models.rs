use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Timestamp format used for `post_date` in the store
pub const POST_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Paging headers sent with every post listing
pub const TOTAL_HEADER: &str = "x-wp-total";
pub const TOTAL_PAGES_HEADER: &str = "x-wp-totalpages";

/// Post model representing a stored record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    /// Store-assigned identifier, `None` until inserted
    pub id: Option<i64>,

    /// Record kind, `post` for everything the block can link to
    pub post_type: String,

    /// Publication status (`publish`, `draft`, ...)
    pub post_status: String,

    /// Publish timestamp in the site's local time
    pub post_date: NaiveDateTime,

    pub title: String,

    /// Raw content including block comment delimiters
    pub content: String,

    /// Permalink; derived from the site URL when empty
    pub link: Option<String>,
}

impl Post {
    /// Create a new published post dated now
    pub fn new(title: String, content: String) -> Self {
        Self {
            id: None,
            post_type: "post".to_string(),
            post_status: "publish".to_string(),
            post_date: Local::now().naive_local(),
            title,
            content,
            link: None,
        }
    }

    pub fn with_date(mut self, post_date: NaiveDateTime) -> Self {
        self.post_date = post_date;
        self
    }

    pub fn with_status(mut self, status: &str) -> Self {
        self.post_status = status.to_string();
        self
    }

    #[cfg(test)]
    pub fn with_type(mut self, post_type: &str) -> Self {
        self.post_type = post_type.to_string();
        self
    }
}

/// The unit returned by the post lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "WirePostSummary", into = "WirePostSummary")]
pub struct PostSummary {
    pub id: i64,
    pub title_html: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RenderedText {
    #[serde(default)]
    rendered: String,
}

/// JSON shape of a post on the REST endpoint: `{ id, title: { rendered }, link }`
#[derive(Debug, Clone, Serialize, Deserialize)]
struct WirePostSummary {
    id: i64,
    title: RenderedText,
    link: String,
}

impl From<WirePostSummary> for PostSummary {
    fn from(wire: WirePostSummary) -> Self {
        Self {
            id: wire.id,
            title_html: wire.title.rendered,
            url: wire.link,
        }
    }
}

impl From<PostSummary> for WirePostSummary {
    fn from(summary: PostSummary) -> Self {
        Self {
            id: summary.id,
            title: RenderedText {
                rendered: summary.title_html,
            },
            link: summary.url,
        }
    }
}

/// One window of matching identifiers produced by a page fetch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultPage {
    pub ids: Vec<i64>,
}

impl ResultPage {
    pub fn returned_count(&self) -> usize {
        self.ids.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_post_summary_wire_shape() {
        let summary = PostSummary {
            id: 7,
            title_html: "Hello &amp; welcome".to_string(),
            url: "http://localhost:3000/?p=7".to_string(),
        };

        let value = serde_json::to_value(&summary).unwrap();
        assert_eq!(value["id"], 7);
        assert_eq!(value["title"]["rendered"], "Hello &amp; welcome");
        assert_eq!(value["link"], "http://localhost:3000/?p=7");
    }

    #[test]
    fn test_post_summary_from_rest_payload() {
        let payload = json!({
            "id": 42,
            "title": { "rendered": "Answer" },
            "link": "https://example.com/answer"
        });

        let summary: PostSummary = serde_json::from_value(payload).unwrap();
        assert_eq!(summary.id, 42);
        assert_eq!(summary.title_html, "Answer");
        assert_eq!(summary.url, "https://example.com/answer");
    }

    #[test]
    fn test_new_post_defaults() {
        let post = Post::new("Title".to_string(), "Body".to_string());
        assert_eq!(post.id, None);
        assert_eq!(post.post_type, "post");
        assert_eq!(post.post_status, "publish");

        let draft = post.with_status("draft").with_type("page");
        assert_eq!(draft.post_status, "draft");
        assert_eq!(draft.post_type, "page");
    }
}
