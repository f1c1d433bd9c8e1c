//! Configuration module for the timesheet bot.
//!
//! Handles loading and validation of the Telegram credentials, the target
//! bot, the Google service-account settings and the timesheet layout.

mod settings;

pub use settings::{
    BotSettings, ColumnMapping, ConfigError, GoogleConfig, SheetConfig, TelegramConfig,
    DEFAULT_DATE_FORMAT, DEFAULT_HOLIDAY_CALENDAR_ID, DEFAULT_SESSION_NAME, DEFAULT_TARGET_BOT,
};

/// Settings every job needs, resolved once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub telegram: TelegramConfig,
    pub bot: BotSettings,
    pub google: GoogleConfig,
}

impl AppConfig {
    /// Loads the shared configuration from the environment.
    ///
    /// # Errors
    ///
    /// Returns the first missing or malformed setting.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            telegram: TelegramConfig::from_env()?,
            bot: BotSettings::from_env_with_defaults(),
            google: GoogleConfig::from_env()?,
        })
    }
}
