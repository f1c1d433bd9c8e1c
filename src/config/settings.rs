//! Application settings resolved from the process environment.
//!
//! Every settings struct has a `from_env` constructor and a `from_lookup`
//! twin that reads keys through a closure, so the parsing rules can be
//! exercised without mutating the real environment.

use std::fmt::Write as _;
use std::path::PathBuf;

use chrono::NaiveDate;
use chrono::format::{Item, StrftimeItems};
use serde::{Deserialize, Serialize};

/// Default recipient when `TARGET_BOT_USERNAME` is unset.
pub const DEFAULT_TARGET_BOT: &str = "@your_target_bot_username";

/// Default chat session name.
pub const DEFAULT_SESSION_NAME: &str = "anon";

/// Indonesian public holiday calendar.
pub const DEFAULT_HOLIDAY_CALENDAR_ID: &str = "en.indonesian#holiday@group.v.calendar.google.com";

/// Date format used in the sheet's actual-date column (`DD-MM-YYYY`).
pub const DEFAULT_DATE_FORMAT: &str = "%d-%m-%Y";

/// Telegram API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Telegram API ID (obtain from <https://my.telegram.org>).
    pub api_id: i32,

    /// Telegram API hash (obtain from <https://my.telegram.org>).
    pub api_hash: String,

    /// Name of the persisted chat session.
    #[serde(default = "default_session_name")]
    pub session_name: String,

    /// Path to the session file, derived from the session name.
    #[serde(default = "default_session_path")]
    pub session_path: PathBuf,
}

fn default_session_name() -> String {
    DEFAULT_SESSION_NAME.to_owned()
}

fn default_session_path() -> PathBuf {
    session_file(&PathBuf::from("."), DEFAULT_SESSION_NAME)
}

fn session_file(dir: &std::path::Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.session"))
}

impl TelegramConfig {
    /// Creates a new Telegram configuration with the default session.
    #[must_use]
    pub fn new(api_id: i32, api_hash: String) -> Self {
        Self {
            api_id,
            api_hash,
            session_name: default_session_name(),
            session_path: default_session_path(),
        }
    }

    /// Creates configuration from environment variables.
    ///
    /// Expects `API_ID` and `API_HASH` to be set. `SESSION_NAME` and
    /// `SESSION_DIR` are optional.
    ///
    /// # Errors
    ///
    /// Returns an error if environment variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&env_lookup)
    }

    /// Same as [`Self::from_env`], reading keys through `lookup`.
    pub fn from_lookup<F>(lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_id: i32 = required(lookup, "API_ID")?
            .parse()
            .map_err(|_| ConfigError::InvalidApiId)?;
        if api_id <= 0 {
            return Err(ConfigError::InvalidApiId);
        }

        let api_hash = required(lookup, "API_HASH")?;

        let session_name = optional(lookup, "SESSION_NAME", DEFAULT_SESSION_NAME);
        let session_dir = PathBuf::from(optional(lookup, "SESSION_DIR", "."));
        let session_path = session_file(&session_dir, &session_name);

        Ok(Self {
            api_id,
            api_hash,
            session_name,
            session_path,
        })
    }
}

/// Bot-specific settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotSettings {
    /// Handle of the bot that receives the commands.
    #[serde(default = "default_target_recipient")]
    pub target_recipient: String,
}

fn default_target_recipient() -> String {
    DEFAULT_TARGET_BOT.to_owned()
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            target_recipient: default_target_recipient(),
        }
    }
}

impl BotSettings {
    /// Creates bot settings from environment variables with defaults.
    #[must_use]
    pub fn from_env_with_defaults() -> Self {
        Self::from_lookup(&env_lookup)
    }

    /// Same as [`Self::from_env_with_defaults`], reading keys through `lookup`.
    #[must_use]
    pub fn from_lookup<F>(lookup: &F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            target_recipient: optional(lookup, "TARGET_BOT_USERNAME", DEFAULT_TARGET_BOT),
        }
    }
}

/// Google service-account settings shared by the calendar and sheet readers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleConfig {
    /// Service-account JSON key file.
    pub credentials_path: PathBuf,

    /// Calendar that lists public holidays.
    pub holiday_calendar_id: String,
}

impl GoogleConfig {
    /// Creates Google configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the credentials file does not exist.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&env_lookup)
    }

    /// Same as [`Self::from_env`], reading keys through `lookup`.
    pub fn from_lookup<F>(lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let credentials_path =
            PathBuf::from(optional(lookup, "GOOGLE_CREDENTIALS_FILE", "credentials.json"));
        if !credentials_path.is_file() {
            return Err(ConfigError::CredentialsNotFound(credentials_path));
        }

        Ok(Self {
            credentials_path,
            holiday_calendar_id: optional(
                lookup,
                "HOLIDAY_CALENDAR_ID",
                DEFAULT_HOLIDAY_CALENDAR_ID,
            ),
        })
    }
}

/// Header names of the timesheet columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub actual_date: String,
    pub project: String,
    pub task: String,
    pub eff_hours: String,
}

/// Location and layout of the timesheet spreadsheet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetConfig {
    /// Spreadsheet title as shown in Google Drive.
    pub spreadsheet_name: String,

    /// Worksheet (tab) title inside the spreadsheet.
    pub worksheet_title: String,

    /// Column headers to read.
    pub columns: ColumnMapping,

    /// chrono format string of the actual-date column.
    #[serde(default = "default_date_format")]
    pub date_format: String,
}

fn default_date_format() -> String {
    DEFAULT_DATE_FORMAT.to_owned()
}

impl SheetConfig {
    /// Creates sheet configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first missing key, or if
    /// `SHEET_DATE_FORMAT` is not a valid format string.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&env_lookup)
    }

    /// Same as [`Self::from_env`], reading keys through `lookup`.
    pub fn from_lookup<F>(lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Names are matched against the sheet verbatim.
        let spreadsheet_name = required_raw(lookup, "SPREADSHEET_NAME")?;
        let worksheet_title = required_raw(lookup, "WORKSHEET_TITLE")?;
        let columns = ColumnMapping {
            actual_date: required_raw(lookup, "COL_ACTUAL_DATE")?,
            project: required_raw(lookup, "COL_PROJECT")?,
            task: required_raw(lookup, "COL_TASK")?,
            eff_hours: required_raw(lookup, "COL_EFF_HOURS")?,
        };

        let date_format = optional(lookup, "SHEET_DATE_FORMAT", DEFAULT_DATE_FORMAT);
        if !renders_dates(&date_format) {
            return Err(ConfigError::InvalidDateFormat(date_format));
        }

        Ok(Self {
            spreadsheet_name,
            worksheet_title,
            columns,
            date_format,
        })
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Invalid API_ID format (must be a positive integer)")]
    InvalidApiId,

    #[error("Credentials file not found: {}", .0.display())]
    CredentialsNotFound(PathBuf),

    #[error("Invalid SHEET_DATE_FORMAT: {0:?}")]
    InvalidDateFormat(String),
}

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Reads a key that must be present and non-blank.
fn required<F>(lookup: &F, key: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
        .ok_or(ConfigError::MissingEnvVar(key))
}

/// Like [`required`], but returns the value untrimmed.
fn required_raw<F>(lookup: &F, key: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .filter(|value| !value.trim().is_empty())
        .ok_or(ConfigError::MissingEnvVar(key))
}

/// Whether `format` parses and can render a calendar date on its own.
fn renders_dates(format: &str) -> bool {
    if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        return false;
    }
    let mut rendered = String::new();
    write!(rendered, "{}", NaiveDate::MIN.format(format)).is_ok()
}

/// Reads a key, falling back to `default` when unset or blank.
fn optional<F>(lookup: &F, key: &str, default: &str) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| default.to_owned())
}
