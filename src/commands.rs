use anyhow::{Context, Result};
use chrono::{Local, NaiveDate, NaiveDateTime};
use std::io::{self, Write};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::api;
use crate::block::BlockAttributes;
use crate::config::Config;
use crate::error::ReadMoreError;
use crate::lookup::{LookupController, LookupUpdate, RestPostSource};
use crate::scan::{criteria::SearchCriteria, write_match, write_summary, ScanOutcome, Scanner};
use crate::storage::{
    models::{Post, POST_DATE_FORMAT},
    sqlite::SqliteBackend,
    PageFetcher, PostStore,
};

async fn open_storage(config: &Config) -> Result<Arc<dyn PostStore>> {
    let backend = SqliteBackend::new(&config.database_url)
        .await?
        .with_site_url(&config.site_url);
    Ok(Arc::new(backend))
}

/// `search`: list every published post in the window that contains the block
pub async fn search(
    config: &Config,
    date_after: Option<&str>,
    date_before: Option<&str>,
    pattern: Option<&str>,
) -> Result<()> {
    // Evaluated once; the window does not move while the scan runs
    let today = Local::now().date_naive();
    let criteria = SearchCriteria::from_flags(date_after, date_before, pattern, today)?;

    let storage = open_storage(config).await?;
    let mut out = io::stdout();
    scan_posts(storage.as_ref(), &criteria, &mut out).await?;
    Ok(())
}

/// Stream matching ids to `out`, then the summary line
pub async fn scan_posts<F, W>(
    fetcher: &F,
    criteria: &SearchCriteria,
    out: &mut W,
) -> Result<ScanOutcome>
where
    F: PageFetcher + ?Sized,
    W: Write,
{
    writeln!(
        out,
        "Searching between {} and {}...",
        criteria.date_after, criteria.date_before
    )?;

    let result = Scanner::new(fetcher)
        .run(criteria, |id| Ok(write_match(&mut *out, id)?))
        .await;

    match result {
        Ok(outcome) => {
            write_summary(out, &outcome)?;
            out.flush()?;
            Ok(outcome)
        }
        Err(failure) => {
            // Best effort; the scan failure is what gets reported
            let _ = out.flush();
            error!("Search did not complete: {}", failure);
            Err(anyhow::Error::new(failure).context("search did not complete"))
        }
    }
}

/// `serve`: run the posts REST endpoint until Ctrl+C or SIGTERM
pub async fn serve(config: &Config) -> Result<()> {
    info!("💾 Initializing storage backend...");
    let storage = open_storage(config).await?;
    info!("✅ Storage backend initialized");

    let router = api::create_router(storage);
    info!(
        "📱 Posts endpoint available at: http://localhost:{}/wp/v2/posts",
        config.api_port
    );

    let shutdown_signal = async {
        let ctrl_c = async {
            if let Err(e) = signal::ctrl_c().await {
                error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                }
                Err(e) => {
                    error!("Failed to install signal handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!("🛑 Received Ctrl+C signal");
            },
            _ = terminate => {
                info!("🛑 Received terminate signal");
            },
        }
    };

    api::start_server_with_shutdown(router, config.api_port, shutdown_signal).await
}

/// Accepts `YYYY-MM-DD` (midnight) or `YYYY-MM-DD HH:MM:SS`
fn parse_post_date(value: &str) -> Result<NaiveDateTime, ReadMoreError> {
    let value = value.trim();
    if let Ok(at) = NaiveDateTime::parse_from_str(value, POST_DATE_FORMAT) {
        return Ok(at);
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .ok_or_else(|| {
            ReadMoreError::InvalidInput(format!(
                "--date expects YYYY-MM-DD or \"YYYY-MM-DD HH:MM:SS\", got {:?}",
                value
            ))
        })
}

/// `publish`: store a post and print its id
pub async fn publish(
    config: &Config,
    title: String,
    content: String,
    date: Option<&str>,
    status: &str,
) -> Result<()> {
    let mut post = Post::new(title, content).with_status(status);
    if let Some(date) = date {
        post = post.with_date(parse_post_date(date)?);
    }

    let storage = open_storage(config).await?;
    let id = storage.insert_post(post).await?;
    println!("{}", id);
    Ok(())
}

/// Append a read-more block pointing at `target` to the content of `post`
pub async fn attach_block(
    storage: &dyn PostStore,
    post: i64,
    target: i64,
    attrs: BlockAttributes,
) -> Result<BlockAttributes> {
    let summary = storage
        .get_post(target)
        .await?
        .ok_or(ReadMoreError::NotFound)
        .with_context(|| format!("post {} is not a published post", target))?;

    let mut attrs = attrs;
    attrs.select((&summary).into());

    let markup = attrs.to_markup()?;
    storage
        .append_content(post, &markup)
        .await
        .with_context(|| format!("failed to attach block to post {}", post))?;

    info!("Attached read-more block to post {} -> {}", post, target);
    Ok(attrs)
}

/// `attach`: link one post to another with a read-more block
pub async fn attach(
    config: &Config,
    post: i64,
    target: i64,
    align: Option<String>,
    background_color: Option<String>,
) -> Result<()> {
    let storage = open_storage(config).await?;
    let attrs = BlockAttributes {
        align,
        background_color,
        ..Default::default()
    };

    let attrs = attach_block(storage.as_ref(), post, target, attrs).await?;
    println!(
        "Success: Post {} now reads more at {}",
        post,
        attrs.post_url.unwrap_or_default()
    );
    Ok(())
}

/// One line typed into the interactive lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupInput {
    Term(String),
    Next,
    Previous,
    /// 1-based position in the current page
    Select(usize),
    Quit,
}

pub fn parse_lookup_input(line: &str) -> LookupInput {
    let trimmed = line.trim();
    match trimmed {
        ":next" | ":n" => LookupInput::Next,
        ":prev" | ":p" => LookupInput::Previous,
        ":quit" | ":q" => LookupInput::Quit,
        _ => match trimmed.strip_prefix(":select ") {
            Some(index) => match index.trim().parse::<usize>() {
                Ok(index) if index > 0 => LookupInput::Select(index),
                _ => LookupInput::Term(line.to_string()),
            },
            None => LookupInput::Term(line.to_string()),
        },
    }
}

fn print_results(controller: &LookupController) {
    let results = controller.results();
    if results.is_empty() {
        println!("No posts found for {:?}.", controller.term().trim());
        return;
    }
    for (index, post) in results.iter().enumerate() {
        let title = if post.title_html.is_empty() {
            "(No title)"
        } else {
            post.title_html.as_str()
        };
        println!("  [{}] {} (#{}) {}", index + 1, title, post.id, post.url);
    }
    println!("Page {} / {}", controller.page(), controller.total_pages());
}

enum LookupEvent {
    Line(Option<String>),
    Update(Option<LookupUpdate>),
}

/// `lookup`: search posts interactively, one input per line
pub async fn lookup(config: &Config) -> Result<()> {
    let source = RestPostSource::new(&config.api_url, config.lookup.http_timeout)?;
    let mut controller = LookupController::new(Arc::new(source), config.lookup.debounce);

    println!("Search posts by title or ID. Commands: :next, :prev, :select N, :quit");

    let (lines_tx, mut lines_rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if lines_tx.send(line).is_err() {
                break;
            }
        }
    });

    // Same as opening the block: list the latest posts
    controller.set_term("");

    loop {
        let event = if controller.is_loading() {
            tokio::select! {
                line = lines_rx.recv() => LookupEvent::Line(line),
                update = controller.next_update() => LookupEvent::Update(update),
            }
        } else {
            LookupEvent::Line(lines_rx.recv().await)
        };

        match event {
            LookupEvent::Update(Some(LookupUpdate::Fulfilled(_))) => print_results(&controller),
            LookupEvent::Update(Some(LookupUpdate::Failed { .. })) => println!("No posts found."),
            LookupEvent::Update(None) => {}
            LookupEvent::Line(None) => break,
            LookupEvent::Line(Some(line)) => match parse_lookup_input(&line) {
                LookupInput::Quit => break,
                LookupInput::Term(term) => {
                    // Nothing new to fetch; show what is already there
                    if !controller.set_term(&term) && !controller.is_loading() {
                        print_results(&controller);
                    }
                }
                LookupInput::Next => {
                    if !controller.next_page() {
                        println!("Already on the last page.");
                    }
                }
                LookupInput::Previous => {
                    if !controller.previous_page() {
                        println!("Already on the first page.");
                    }
                }
                LookupInput::Select(index) => match controller.select(index - 1) {
                    Some(selection) => {
                        let mut attrs = BlockAttributes::default();
                        attrs.select(selection);
                        println!("{}", attrs.to_markup()?.trim());
                    }
                    None => warn!("No result at position {}", index),
                },
            },
        }
    }

    Ok(())
}
