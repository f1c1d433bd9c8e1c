//! Today's timesheet rows.

use std::fmt::Write as _;

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;
use tracing::{error, info};

use super::{CommandFormatter, TaskRow};
use crate::config::SheetConfig;
use crate::google::GoogleApiError;

/// Errors that can occur while reading the worksheet.
#[derive(Debug, Error)]
pub enum SheetError {
    #[error("Spreadsheet '{0}' not found")]
    SpreadsheetNotFound(String),

    #[error("Worksheet '{worksheet}' not found in spreadsheet '{spreadsheet}'")]
    WorksheetNotFound {
        spreadsheet: String,
        worksheet: String,
    },

    #[error("Error fetching sheet data: {0}")]
    Api(#[from] GoogleApiError),
}

/// Reads every record of the configured worksheet, in sheet order.
#[async_trait]
pub trait RecordSource: Send + Sync {
    async fn fetch_records(&self) -> Result<Vec<TaskRow>, SheetError>;
}

/// Rows selected for one day.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TodaysRows {
    pub rows: Vec<TaskRow>,
    /// The date as written in the sheet; `None` when the fetch failed.
    pub today: Option<String>,
}

/// The timesheet: a record source plus the layout needed to read it.
pub struct Timesheet {
    source: Box<dyn RecordSource>,
    date_column: String,
    date_format: String,
    formatter: CommandFormatter,
}

impl Timesheet {
    /// Creates a timesheet over `source` laid out as `config` describes.
    #[must_use]
    pub fn new(source: Box<dyn RecordSource>, config: &SheetConfig) -> Self {
        Self {
            source,
            date_column: config.columns.actual_date.clone(),
            date_format: config.date_format.clone(),
            formatter: CommandFormatter::new(config.columns.clone()),
        }
    }

    /// Formatter for this sheet's columns.
    #[must_use]
    pub const fn formatter(&self) -> &CommandFormatter {
        &self.formatter
    }

    /// Fetches the rows whose date column equals `today`.
    ///
    /// Fetch failures are logged and yield no rows.
    pub async fn fetch_todays_rows(&self, today: NaiveDate) -> TodaysRows {
        let records = match self.source.fetch_records().await {
            Ok(records) => records,
            Err(e) => {
                error!("{}", e);
                return TodaysRows::default();
            }
        };

        let mut today_str = String::new();
        if write!(today_str, "{}", today.format(&self.date_format)).is_err() {
            error!("Date format {:?} cannot render a date", self.date_format);
            return TodaysRows::default();
        }
        info!("Looking for tasks with date: {}", today_str);

        TodaysRows {
            rows: filter_rows_for(records, &self.date_column, &today_str),
            today: Some(today_str),
        }
    }
}

impl std::fmt::Debug for Timesheet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Timesheet")
            .field("date_column", &self.date_column)
            .field("date_format", &self.date_format)
            .finish_non_exhaustive()
    }
}

/// Keeps the rows whose `date_column`, trimmed, equals `today_str` exactly.
#[must_use]
pub fn filter_rows_for(rows: Vec<TaskRow>, date_column: &str, today_str: &str) -> Vec<TaskRow> {
    rows.into_iter()
        .filter(|row| row.text(date_column).trim() == today_str)
        .collect()
}
