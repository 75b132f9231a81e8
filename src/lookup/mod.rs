//! Debounced, cancellable post lookup.
//!
//! A [`LookupController`] owns one search session. Every input or page change
//! supersedes the outstanding request: its token is cancelled, which both
//! stops the pending debounce timer and aborts an in-flight network call.

pub mod source;

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::block::Selection;
use crate::error::{ReadMoreError, Result};
use crate::storage::models::PostSummary;
pub use source::{PostSource, RestPostSource};

/// Results requested per page by the interactive lookup
pub const LOOKUP_PAGE_SIZE: u32 = 5;

/// One outstanding search request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupQuery {
    pub term: String,
    pub page: u32,
}

/// How a query is sent to the endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupMode<'a> {
    /// Purely numeric term: fetch that post directly
    Single(i64),
    /// Free-text search, or the latest posts when there is no term
    Paged { search: Option<&'a str>, page: u32 },
}

impl LookupQuery {
    pub fn mode(&self) -> LookupMode<'_> {
        let term = self.term.trim();
        if !term.is_empty() && term.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(id) = term.parse::<i64>() {
                return LookupMode::Single(id);
            }
        }
        LookupMode::Paged {
            search: Some(term).filter(|t| !t.is_empty()),
            page: self.page.max(1),
        }
    }
}

/// One page of lookup results
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LookupPage {
    pub posts: Vec<PostSummary>,
    pub total_pages: u32,
}

impl LookupPage {
    pub fn empty() -> Self {
        Self {
            posts: Vec::new(),
            total_pages: 1,
        }
    }
}

/// Where the session currently stands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Pending(LookupQuery),
    Fulfilled,
    /// The last request failed; results were cleared
    Failed(String),
}

/// A change the controller applied to its results
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupUpdate {
    Fulfilled(LookupQuery),
    Failed { query: LookupQuery, error: String },
}

struct Completion {
    generation: u64,
    query: LookupQuery,
    result: Result<LookupPage>,
}

/// Drives one search session against a [`PostSource`]
pub struct LookupController {
    source: Arc<dyn PostSource>,
    debounce: Duration,
    term: String,
    page: u32,
    total_pages: u32,
    results: Vec<PostSummary>,
    state: SessionState,
    // Bumped for every scheduled request; completions from older generations are dropped
    generation: u64,
    active: Option<CancellationToken>,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
}

impl LookupController {
    pub fn new(source: Arc<dyn PostSource>, debounce: Duration) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Self {
            source,
            debounce,
            term: String::new(),
            page: 1,
            total_pages: 1,
            results: Vec::new(),
            state: SessionState::Idle,
            generation: 0,
            active: None,
            completions_tx,
            completions_rx,
        }
    }

    /// Replace the search term; goes back to the first page.
    ///
    /// Returns false without issuing a request when that search is already
    /// pending or shown.
    pub fn set_term(&mut self, term: &str) -> bool {
        let unchanged = self.term == term
            && self.page == 1
            && matches!(self.state, SessionState::Pending(_) | SessionState::Fulfilled);
        if unchanged {
            debug!("Lookup for {:?} already current", term);
            return false;
        }

        self.term = term.to_string();
        self.page = 1;
        self.schedule();
        true
    }

    /// Move to the next page; returns false at the last page
    pub fn next_page(&mut self) -> bool {
        if !self.can_go_next() {
            return false;
        }
        self.page += 1;
        self.schedule();
        true
    }

    /// Move to the previous page; returns false at the first page
    pub fn previous_page(&mut self) -> bool {
        if !self.can_go_previous() {
            return false;
        }
        self.page -= 1;
        self.schedule();
        true
    }

    pub fn can_go_previous(&self) -> bool {
        self.page > 1
    }

    pub fn can_go_next(&self) -> bool {
        self.page < self.total_pages
    }

    pub fn term(&self) -> &str {
        &self.term
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn total_pages(&self) -> u32 {
        self.total_pages
    }

    pub fn results(&self) -> &[PostSummary] {
        &self.results
    }

    #[cfg(test)]
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.state, SessionState::Pending(_))
    }

    /// Pick a result by its position in the current page
    pub fn select(&self, index: usize) -> Option<Selection> {
        self.results.get(index).map(Selection::from)
    }

    fn schedule(&mut self) {
        if let Some(previous) = self.active.take() {
            previous.cancel();
            if let SessionState::Pending(superseded) = &self.state {
                debug!(
                    "Aborting lookup for {:?} page {}",
                    superseded.term, superseded.page
                );
            }
        }

        self.generation += 1;
        let query = LookupQuery {
            term: self.term.clone(),
            page: self.page,
        };
        let token = CancellationToken::new();
        self.active = Some(token.clone());
        self.state = SessionState::Pending(query.clone());

        let source = self.source.clone();
        let completions = self.completions_tx.clone();
        let debounce = self.debounce;
        let generation = self.generation;

        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(debounce) => {}
            }

            debug!("Looking up {:?} page {}", query.term, query.page);
            let request = {
                let token = token.clone();
                let query = query.clone();
                tokio::spawn(async move { source.fetch(&query, &token).await })
            };

            // The source sees the same token and stops on its own
            let joined = tokio::select! {
                biased;
                _ = token.cancelled() => return,
                joined = request => joined,
            };
            if token.is_cancelled() {
                return;
            }

            // Every live request reports back, so the session never stays pending
            let result = match joined {
                Ok(result) => result,
                Err(e) => Err(ReadMoreError::StoreUnavailable(format!(
                    "lookup request did not finish: {}",
                    e
                ))),
            };

            let _ = completions.send(Completion {
                generation,
                query,
                result,
            });
        });
    }

    /// Wait for the outstanding request and apply its result.
    ///
    /// Returns `None` when nothing is pending. Results of superseded requests
    /// are never applied.
    pub async fn next_update(&mut self) -> Option<LookupUpdate> {
        loop {
            if !self.is_loading() {
                return None;
            }

            let completion = self.completions_rx.recv().await?;
            if completion.generation != self.generation {
                debug!("Dropping stale lookup result for {:?}", completion.query.term);
                continue;
            }
            self.active = None;

            match completion.result {
                Ok(page) => {
                    self.results = page.posts;
                    self.total_pages = page.total_pages.max(1);
                    self.state = SessionState::Fulfilled;
                    return Some(LookupUpdate::Fulfilled(completion.query));
                }
                Err(e) => {
                    warn!("Post fetch failed: {}", e);
                    self.results.clear();
                    self.total_pages = 1;
                    self.state = SessionState::Failed(e.to_string());
                    return Some(LookupUpdate::Failed {
                        query: completion.query,
                        error: e.to_string(),
                    });
                }
            }
        }
    }
}

impl Drop for LookupController {
    fn drop(&mut self) {
        if let Some(token) = self.active.take() {
            token.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReadMoreError;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tokio::time::{sleep, Instant};

    const DEBOUNCE: Duration = Duration::from_millis(400);

    /// Scripted post source that records every request it receives
    #[derive(Default)]
    struct FakeSource {
        calls: Mutex<Vec<LookupQuery>>,
        cancelled: Mutex<Vec<LookupQuery>>,
        /// Terms that take this long to answer and honour cancellation
        slow: Option<(&'static str, Duration)>,
        /// Terms that take this long to answer and ignore cancellation
        stubborn: Option<(&'static str, Duration)>,
        failing: bool,
        /// Panics instead of answering
        panics: bool,
        /// Reports a cancellation nobody asked for
        spurious_cancel: bool,
        total_pages: u32,
    }

    impl FakeSource {
        fn calls(&self) -> Vec<LookupQuery> {
            self.calls.lock().unwrap().clone()
        }

        fn answer(&self, query: &LookupQuery) -> Result<LookupPage> {
            if self.failing {
                return Err(ReadMoreError::StoreUnavailable("connection refused".to_string()));
            }
            match query.mode() {
                LookupMode::Single(_) => Ok(LookupPage::empty()),
                LookupMode::Paged { search, page } => Ok(LookupPage {
                    posts: vec![PostSummary {
                        id: i64::from(page),
                        title_html: format!("{} #{}", search.unwrap_or("latest"), page),
                        url: format!("https://blog.test/?p={}", page),
                    }],
                    total_pages: self.total_pages.max(1),
                }),
            }
        }
    }

    #[async_trait]
    impl PostSource for FakeSource {
        async fn fetch(&self, query: &LookupQuery, cancel: &CancellationToken) -> Result<LookupPage> {
            self.calls.lock().unwrap().push(query.clone());

            if self.panics {
                panic!("post source crashed");
            }
            if self.spurious_cancel {
                return Err(ReadMoreError::Cancelled);
            }
            if let Some((term, delay)) = self.slow {
                if query.term == term {
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            self.cancelled.lock().unwrap().push(query.clone());
                            return Err(ReadMoreError::Cancelled);
                        }
                        _ = sleep(delay) => {}
                    }
                }
            }
            if let Some((term, delay)) = self.stubborn {
                if query.term == term {
                    sleep(delay).await;
                }
            }

            self.answer(query)
        }
    }

    fn controller(source: &Arc<FakeSource>) -> LookupController {
        LookupController::new(source.clone(), DEBOUNCE)
    }

    fn query(term: &str, page: u32) -> LookupQuery {
        LookupQuery {
            term: term.to_string(),
            page,
        }
    }

    #[test]
    fn test_query_mode() {
        assert_eq!(query("42", 3).mode(), LookupMode::Single(42));
        assert_eq!(query(" 42 ", 1).mode(), LookupMode::Single(42));
        assert_eq!(
            query("42a", 2).mode(),
            LookupMode::Paged { search: Some("42a"), page: 2 }
        );
        assert_eq!(
            query("  ", 1).mode(),
            LookupMode::Paged { search: None, page: 1 }
        );
        // Too large for an identifier, so it is searched as text
        assert_eq!(
            query("99999999999999999999", 1).mode(),
            LookupMode::Paged { search: Some("99999999999999999999"), page: 1 }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_input_issues_one_request() {
        let source = Arc::new(FakeSource::default());
        let mut lookup = controller(&source);

        lookup.set_term("7");
        sleep(Duration::from_millis(100)).await;
        lookup.set_term("cat");

        let update = lookup.next_update().await;
        assert_eq!(update, Some(LookupUpdate::Fulfilled(query("cat", 1))));
        assert_eq!(source.calls(), vec![query("cat", 1)]);
        assert!(matches!(source.calls()[0].mode(), LookupMode::Paged { .. }));

        sleep(Duration::from_secs(5)).await;
        assert_eq!(source.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_waits_for_quiet_period() {
        let source = Arc::new(FakeSource::default());
        let mut lookup = controller(&source);

        let started = Instant::now();
        lookup.set_term("cat");
        assert!(lookup.is_loading());

        sleep(Duration::from_millis(399)).await;
        assert!(source.calls().is_empty());

        lookup.next_update().await.unwrap();
        assert!(started.elapsed() >= DEBOUNCE);
        assert_eq!(source.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_numeric_term_without_match_is_empty() {
        let source = Arc::new(FakeSource {
            total_pages: 4,
            ..Default::default()
        });
        let mut lookup = controller(&source);

        lookup.set_term("42");
        let update = lookup.next_update().await;

        assert_eq!(update, Some(LookupUpdate::Fulfilled(query("42", 1))));
        assert_eq!(lookup.state(), &SessionState::Fulfilled);
        assert!(lookup.results().is_empty());
        assert_eq!(lookup.total_pages(), 1);
        assert!(!lookup.can_go_next());
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_input_is_never_issued() {
        let source = Arc::new(FakeSource::default());
        let mut lookup = controller(&source);

        lookup.set_term("a");
        sleep(Duration::from_millis(200)).await;
        lookup.set_term("ab");

        lookup.next_update().await.unwrap();
        assert_eq!(source.calls(), vec![query("ab", 1)]);
        assert_eq!(lookup.results()[0].title_html, "ab #1");
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_request_is_cancelled() {
        let source = Arc::new(FakeSource {
            slow: Some(("a", Duration::from_secs(10))),
            ..Default::default()
        });
        let mut lookup = controller(&source);

        lookup.set_term("a");
        sleep(Duration::from_millis(450)).await;
        assert_eq!(source.calls(), vec![query("a", 1)]);

        lookup.set_term("ab");
        let update = lookup.next_update().await;

        assert_eq!(update, Some(LookupUpdate::Fulfilled(query("ab", 1))));
        assert_eq!(lookup.results()[0].title_html, "ab #1");
        assert_eq!(*source.cancelled.lock().unwrap(), vec![query("a", 1)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_result_never_updates_results() {
        // "a" finishes after it was superseded and ignores its token
        let source = Arc::new(FakeSource {
            stubborn: Some(("a", Duration::from_millis(300))),
            ..Default::default()
        });
        let mut lookup = controller(&source);

        lookup.set_term("a");
        sleep(Duration::from_millis(450)).await;
        lookup.set_term("ab");

        let update = lookup.next_update().await;
        assert_eq!(update, Some(LookupUpdate::Fulfilled(query("ab", 1))));

        sleep(Duration::from_secs(1)).await;
        assert_eq!(lookup.results()[0].title_html, "ab #1");
        assert_eq!(lookup.next_update().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_clears_results() {
        let source = Arc::new(FakeSource {
            total_pages: 3,
            ..Default::default()
        });
        let mut lookup = controller(&source);

        lookup.set_term("cat");
        lookup.next_update().await.unwrap();
        assert_eq!(lookup.results().len(), 1);
        assert_eq!(lookup.total_pages(), 3);

        let failing: Arc<dyn PostSource> = Arc::new(FakeSource {
            failing: true,
            ..Default::default()
        });
        lookup.source = failing;
        lookup.set_term("dog");

        match lookup.next_update().await {
            Some(LookupUpdate::Failed { query: q, error }) => {
                assert_eq!(q, query("dog", 1));
                assert!(error.contains("connection refused"));
            }
            other => panic!("unexpected update: {other:?}"),
        }
        assert!(lookup.results().is_empty());
        assert_eq!(lookup.total_pages(), 1);
        assert!(matches!(lookup.state(), SessionState::Failed(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_crashed_request_fails_the_session() {
        let source = Arc::new(FakeSource {
            panics: true,
            ..Default::default()
        });
        let mut lookup = controller(&source);

        lookup.set_term("cat");
        let update = tokio::time::timeout(Duration::from_secs(2), lookup.next_update())
            .await
            .expect("lookup stayed pending");

        match update {
            Some(LookupUpdate::Failed { query: q, error }) => {
                assert_eq!(q, query("cat", 1));
                assert!(error.contains("did not finish"));
            }
            other => panic!("unexpected update: {other:?}"),
        }
        assert!(!lookup.is_loading());
        assert!(lookup.results().is_empty());
        assert_eq!(lookup.total_pages(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unrequested_cancellation_fails_the_session() {
        let source = Arc::new(FakeSource {
            spurious_cancel: true,
            ..Default::default()
        });
        let mut lookup = controller(&source);

        lookup.set_term("cat");
        let update = tokio::time::timeout(Duration::from_secs(2), lookup.next_update())
            .await
            .expect("lookup stayed pending");

        assert!(matches!(update, Some(LookupUpdate::Failed { .. })));
        assert!(matches!(lookup.state(), SessionState::Failed(_)));
        assert_eq!(lookup.total_pages(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_term_is_not_requested_again() {
        let source = Arc::new(FakeSource {
            total_pages: 2,
            ..Default::default()
        });
        let mut lookup = controller(&source);

        assert!(lookup.set_term("cat"));
        sleep(Duration::from_millis(100)).await;
        assert!(!lookup.set_term("cat"));
        lookup.next_update().await.unwrap();

        assert!(!lookup.set_term("cat"));
        assert!(!lookup.is_loading());
        assert_eq!(source.calls(), vec![query("cat", 1)]);

        // Same term from another page starts over at page one
        assert!(lookup.next_page());
        lookup.next_update().await.unwrap();
        assert!(lookup.set_term("cat"));
        lookup.next_update().await.unwrap();
        assert_eq!(
            source.calls(),
            vec![query("cat", 1), query("cat", 2), query("cat", 1)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_page_navigation_respects_bounds() {
        let source = Arc::new(FakeSource {
            total_pages: 2,
            ..Default::default()
        });
        let mut lookup = controller(&source);

        assert!(!lookup.previous_page());
        assert!(!lookup.next_page());
        assert_eq!(lookup.state(), &SessionState::Idle);

        lookup.set_term("cat");
        lookup.next_update().await.unwrap();
        assert!(!lookup.can_go_previous());
        assert!(lookup.can_go_next());

        assert!(lookup.next_page());
        assert_eq!(lookup.state(), &SessionState::Pending(query("cat", 2)));
        lookup.next_update().await.unwrap();
        assert_eq!(lookup.page(), 2);
        assert_eq!(lookup.results()[0].title_html, "cat #2");
        assert!(!lookup.next_page());

        assert!(lookup.previous_page());
        lookup.next_update().await.unwrap();
        assert_eq!(lookup.page(), 1);

        // A new term starts over at page one
        assert!(lookup.next_page());
        lookup.set_term("dog");
        lookup.next_update().await.unwrap();
        assert_eq!(lookup.page(), 1);
        assert_eq!(
            source.calls(),
            vec![query("cat", 1), query("cat", 2), query("cat", 1), query("dog", 1)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_select_builds_selection() {
        let source = Arc::new(FakeSource::default());
        let mut lookup = controller(&source);

        lookup.set_term("cat");
        lookup.next_update().await.unwrap();

        let selection = lookup.select(0).unwrap();
        assert_eq!(selection.post_id, 1);
        assert_eq!(selection.post_title, "cat #1");
        assert_eq!(selection.post_url, "https://blog.test/?p=1");
        assert!(lookup.select(5).is_none());
    }

    #[tokio::test]
    async fn test_next_update_without_pending_request() {
        let source = Arc::new(FakeSource::default());
        let mut lookup = controller(&source);
        assert_eq!(lookup.next_update().await, None);
    }
}
