//! The read-more block: its saved attributes, its comment-delimited
//! serialization inside post content, and its rendered markup.

use serde::{Deserialize, Serialize};

use crate::storage::models::PostSummary;

/// Registered block name
pub const BLOCK_NAME: &str = "dmg/post-search";

/// Opening delimiter every saved instance of the block starts with
pub const BLOCK_OPENING: &str = "<!-- wp:dmg/post-search";

const CLASS_NAME: &str = "dmg-read-more";

/// The post an author picked from the lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub post_id: i64,
    pub post_title: String,
    pub post_url: String,
}

impl From<&PostSummary> for Selection {
    fn from(post: &PostSummary) -> Self {
        Self {
            post_id: post.id,
            post_title: post.title_html.clone(),
            post_url: post.url.clone(),
        }
    }
}

/// Saved state of one block instance
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockAttributes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub align: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_url: Option<String>,
}

impl BlockAttributes {
    /// Point the block at the selected post, keeping its styling
    pub fn select(&mut self, selection: Selection) {
        self.post_id = Some(selection.post_id);
        self.post_title = Some(selection.post_title);
        self.post_url = Some(selection.post_url);
    }

    fn style(&self) -> Option<String> {
        let mut rules = Vec::new();
        if let Some(align) = self.align.as_deref().filter(|a| !a.is_empty()) {
            rules.push(format!("text-align:{}", align));
        }
        if let Some(color) = self.background_color.as_deref().filter(|c| !c.is_empty()) {
            rules.push(format!("background-color:{}", color));
        }
        if rules.is_empty() {
            None
        } else {
            Some(rules.join(";"))
        }
    }

    /// Render the block's front-end markup.
    ///
    /// Without a `postUrl` the block renders its empty-state placeholder.
    pub fn render(&self) -> String {
        let style = self
            .style()
            .map(|s| format!(" style=\"{}\"", html_escape(&s)))
            .unwrap_or_default();

        let body = match self.post_url.as_deref().filter(|u| !u.is_empty()) {
            Some(url) => {
                let title = self
                    .post_title
                    .as_deref()
                    .filter(|t| !t.is_empty())
                    .unwrap_or("Selected Post");
                format!(
                    "Read More:&nbsp;<a href=\"{}\">{}</a>",
                    html_escape(url),
                    html_escape(title)
                )
            }
            None => "<em>No post selected.</em>".to_string(),
        };

        format!("<p class=\"{}\"{}>{}</p>", CLASS_NAME, style, body)
    }

    /// Serialize as a comment-delimited block ready to be stored in post content
    pub fn to_markup(&self) -> serde_json::Result<String> {
        let attrs = serde_json::to_string(self)?;
        let attrs = if attrs == "{}" {
            String::new()
        } else {
            // "--" would close the surrounding HTML comment early
            format!(" {}", attrs.replace("--", "\\u002d\\u002d"))
        };

        Ok(format!(
            "\n{}{} -->\n{}\n<!-- /wp:{} -->\n",
            BLOCK_OPENING,
            attrs,
            self.render(),
            BLOCK_NAME
        ))
    }
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
