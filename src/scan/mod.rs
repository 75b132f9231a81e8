pub mod criteria;

use std::io::{self, Write};
use thiserror::Error;
use tracing::{debug, info};

use crate::error::{ReadMoreError, Result};
use crate::storage::PageFetcher;
use criteria::SearchCriteria;

/// Rows requested per page by the batch scan
pub const SCAN_PAGE_SIZE: u32 = 500;

/// Result of a scan that ran to exhaustion
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanOutcome {
    /// Matched identifiers in store order
    pub matched_ids: Vec<i64>,
    pub total_matched: u64,
    /// Round trips made to the store, including the final empty or short page
    pub pages_fetched: u32,
}

/// A scan aborted by a store or output error; matches already emitted stay emitted
#[derive(Debug, Error)]
#[error("scan aborted after {} matches: {source}", .partial.total_matched)]
pub struct ScanFailure {
    pub partial: ScanOutcome,
    #[source]
    pub source: ReadMoreError,
}

/// Walks every matching record in fixed-size windows.
///
/// A page shorter than the window proves exhaustion, so the scan ends after
/// at most `ceil(N / page_size) + 1` fetches without knowing N in advance.
pub struct Scanner<'a, F: PageFetcher + ?Sized> {
    fetcher: &'a F,
    page_size: u32,
}

impl<'a, F: PageFetcher + ?Sized> Scanner<'a, F> {
    pub fn new(fetcher: &'a F) -> Self {
        Self {
            fetcher,
            page_size: SCAN_PAGE_SIZE,
        }
    }

    #[cfg(test)]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Run the scan, handing each match to `on_match` as soon as its page arrives.
    ///
    /// An error from `on_match` ends the scan before the next page is fetched.
    pub async fn run<M>(
        &self,
        criteria: &SearchCriteria,
        mut on_match: M,
    ) -> std::result::Result<ScanOutcome, ScanFailure>
    where
        M: FnMut(i64) -> Result<()>,
    {
        let mut outcome = ScanOutcome::default();
        let mut offset: u64 = 0;

        loop {
            let page = match self.fetcher.fetch_page(criteria, self.page_size, offset).await {
                Ok(page) => page,
                Err(source) => {
                    return Err(ScanFailure {
                        partial: outcome,
                        source,
                    })
                }
            };
            outcome.pages_fetched += 1;

            let returned = page.returned_count();
            debug!("Page at offset {} returned {} ids", offset, returned);
            if returned == 0 {
                break;
            }

            for id in page.ids {
                if let Err(source) = on_match(id) {
                    return Err(ScanFailure {
                        partial: outcome,
                        source,
                    });
                }
                outcome.matched_ids.push(id);
                outcome.total_matched += 1;
            }

            offset += u64::from(self.page_size);
            if returned < self.page_size as usize {
                break;
            }
        }

        info!(
            "Scan finished: {} matches in {} pages",
            outcome.total_matched, outcome.pages_fetched
        );
        Ok(outcome)
    }
}

/// Write one identifier line
pub fn write_match<W: Write>(out: &mut W, id: i64) -> io::Result<()> {
    writeln!(out, "{}", id)
}

/// Write the closing summary of a completed scan
pub fn write_summary<W: Write>(out: &mut W, outcome: &ScanOutcome) -> io::Result<()> {
    if outcome.total_matched == 0 {
        writeln!(out, "Warning: Nothing found!")
    } else {
        writeln!(out, "Success: Found {} posts!", outcome.total_matched)
    }
}
