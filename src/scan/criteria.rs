use chrono::{Days, NaiveDate};
use tracing::warn;

use crate::block::BLOCK_OPENING;
use crate::error::{ReadMoreError, Result};

/// Length of the default search window, ending today
pub const DEFAULT_WINDOW_DAYS: u64 = 30;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Filter for one batch scan; fixed for the lifetime of the invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchCriteria {
    pub date_after: NaiveDate,
    pub date_before: NaiveDate,
    /// Literal text the post content must contain
    pub content_pattern: String,
}

impl SearchCriteria {
    /// Default criteria: the trailing 30-day window ending on `today`, matching the read-more block
    pub fn trailing_window(today: NaiveDate) -> Self {
        Self {
            date_after: today - Days::new(DEFAULT_WINDOW_DAYS),
            date_before: today,
            content_pattern: BLOCK_OPENING.to_string(),
        }
    }

    /// Build criteria from raw command flags.
    ///
    /// Missing dates fall back to the trailing window computed from `today`;
    /// dates that are present must be `YYYY-MM-DD`.
    pub fn from_flags(
        date_after: Option<&str>,
        date_before: Option<&str>,
        pattern: Option<&str>,
        today: NaiveDate,
    ) -> Result<Self> {
        let mut criteria = Self::trailing_window(today);

        if let Some(value) = date_after {
            criteria.date_after = parse_date_flag("--date-after", value)?;
        }
        if let Some(value) = date_before {
            criteria.date_before = parse_date_flag("--date-before", value)?;
        }
        if let Some(value) = pattern {
            if value.is_empty() {
                return Err(ReadMoreError::InvalidInput(
                    "--pattern must not be empty".to_string(),
                ));
            }
            criteria.content_pattern = value.to_string();
        }

        if criteria.is_inverted() {
            warn!(
                "date range is inverted ({} is after {}), no posts will match",
                criteria.date_after, criteria.date_before
            );
        }

        Ok(criteria)
    }

    /// Inclusive lower bound as a store timestamp
    pub fn starts_at(&self) -> String {
        format!("{} 00:00:00", self.date_after.format(DATE_FORMAT))
    }

    /// Inclusive upper bound as a store timestamp
    pub fn ends_at(&self) -> String {
        format!("{} 23:59:59", self.date_before.format(DATE_FORMAT))
    }

    pub fn is_inverted(&self) -> bool {
        self.date_after > self.date_before
    }
}

fn parse_date_flag(flag: &str, value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|_| {
        ReadMoreError::InvalidInput(format!(
            "{} expects a date as YYYY-MM-DD, got {:?}",
            flag, value
        ))
    })
}
