//! Telegram client wrapper for sending bot commands.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use grammers_client::client::{LoginToken, PasswordToken};
use grammers_client::{sender, Client, InvocationError, SenderPool, SignInError};
use grammers_session::storages::SqliteSession;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::{ChatConnector, ChatSession};
use crate::config::TelegramConfig;

/// Errors that can occur during Telegram operations.
#[derive(Debug, Error)]
pub enum TelegramError {
    #[error("Not authorized. Run `timesheet_bot login` first.")]
    NotAuthorized,

    #[error("Sign in failed: {0}")]
    SignInFailed(String),

    #[error("Password required for 2FA")]
    PasswordRequired(PasswordToken),

    #[error("Invalid password")]
    InvalidPassword(PasswordToken),

    #[error("Recipient not found: {0}")]
    RecipientNotFound(String),

    #[error("Chat session is not connected (state: {0})")]
    NotConnected(&'static str),

    #[error("Flood wait required: {0} seconds")]
    FloodWait(u32),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("API invocation error: {0}")]
    Invocation(String),
}

impl From<InvocationError> for TelegramError {
    fn from(err: InvocationError) -> Self {
        let err_str = err.to_string();

        // Check for flood wait errors
        if (err_str.contains("FLOOD_WAIT") || err_str.contains("flood"))
            && let Some(seconds) = extract_flood_wait_seconds(&err_str) {
                return Self::FloodWait(seconds);
            }

        Self::Invocation(err_str)
    }
}

/// Extracts flood wait seconds from an error message.
fn extract_flood_wait_seconds(err_msg: &str) -> Option<u32> {
    let patterns = ["flood_wait_", "flood wait "];
    // ASCII folding keeps byte offsets, so `idx` is valid in both strings.
    let lowered = err_msg.to_ascii_lowercase();

    for pattern in patterns {
        if let Some(idx) = lowered.find(pattern) {
            let start = idx + pattern.len();
            let num_str: String = lowered[start..]
                .chars()
                .take_while(char::is_ascii_digit)
                .collect();
            if let Ok(seconds) = num_str.parse() {
                return Some(seconds);
            }
        }
    }
    None
}

/// High-level Telegram client wrapper.
pub struct TelegramBot {
    /// The underlying grammers client.
    client: Client,

    /// Handle to the sender pool for disconnection.
    handle: sender::SenderPoolHandle,

    /// Set once the sender pool has been asked to quit.
    disconnected: AtomicBool,

    /// Background task running the sender pool.
    _pool_task: JoinHandle<()>,
}

impl TelegramBot {
    /// Connects to Telegram, reusing the session file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be opened or the server is
    /// unreachable.
    pub async fn connect(config: &TelegramConfig) -> Result<Self, TelegramError> {
        info!("Connecting to Telegram...");

        let session = Arc::new(
            SqliteSession::open(&config.session_path)
                .await
                .map_err(|e| TelegramError::Session(e.to_string()))?,
        );

        let SenderPool {
            runner,
            updates: _updates,
            handle,
        } = SenderPool::new(Arc::clone(&session), config.api_id);

        let client = Client::new(handle.clone());

        // Spawn the sender pool runner
        let pool_task = tokio::spawn(async move {
            runner.run().await;
        });

        let bot = Self {
            client,
            handle: handle.thin,
            disconnected: AtomicBool::new(false),
            _pool_task: pool_task,
        };

        // Dropping `bot` on error quits the pool.
        let is_authorized = bot.is_authorized().await?;
        info!(
            "Connected to Telegram (session '{}'). Authorized: {}",
            config.session_name, is_authorized
        );

        Ok(bot)
    }

    /// Checks if the client is authorized.
    ///
    /// # Errors
    ///
    /// Returns an error if the check fails.
    pub async fn is_authorized(&self) -> Result<bool, TelegramError> {
        self.client
            .is_authorized()
            .await
            .map_err(|e| TelegramError::Connection(e.to_string()))
    }

    /// Requests a login code to be sent to the phone number.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn request_login_code(
        &self,
        phone: &str,
        api_hash: &str,
    ) -> Result<LoginToken, TelegramError> {
        info!("Requesting login code for phone: {}...", mask_phone(phone));

        self.client
            .request_login_code(phone, api_hash)
            .await
            .map_err(|e| TelegramError::SignInFailed(e.to_string()))
    }

    /// Signs in with the login code.
    ///
    /// # Errors
    ///
    /// Returns an error if sign in fails.
    pub async fn sign_in(&self, token: &LoginToken, code: &str) -> Result<(), TelegramError> {
        info!("Signing in with login code...");

        match self.client.sign_in(token, code).await {
            Ok(_user) => {
                info!("Successfully signed in!");
                Ok(())
            }
            Err(SignInError::PasswordRequired(password_token)) => {
                debug!(
                    "2FA password required, hint: {:?}",
                    password_token.hint()
                );
                Err(TelegramError::PasswordRequired(password_token))
            }
            Err(SignInError::InvalidCode) => {
                Err(TelegramError::SignInFailed("Invalid code".to_owned()))
            }
            Err(e) => Err(TelegramError::SignInFailed(e.to_string())),
        }
    }

    /// Checks the 2FA password.
    ///
    /// # Errors
    ///
    /// Returns an error if the password is invalid.
    pub async fn check_password(
        &self,
        password_token: PasswordToken,
        password: &str,
    ) -> Result<(), TelegramError> {
        info!("Checking 2FA password...");

        match self.client.check_password(password_token, password).await {
            Ok(_user) => {
                info!("Successfully authenticated with 2FA!");
                Ok(())
            }
            Err(SignInError::InvalidPassword(token)) => Err(TelegramError::InvalidPassword(token)),
            Err(e) => Err(TelegramError::SignInFailed(e.to_string())),
        }
    }

    /// Sends a text message to a `@username` handle.
    ///
    /// # Errors
    ///
    /// Returns an error if the handle does not resolve or the send fails.
    pub async fn send_text(&self, recipient: &str, text: &str) -> Result<(), TelegramError> {
        let username = recipient.trim().trim_start_matches('@');
        let not_found = || TelegramError::RecipientNotFound(recipient.to_owned());

        let peer = self
            .client
            .resolve_username(username)
            .await?
            .ok_or_else(not_found)?;
        let peer_ref = peer.to_ref().await.ok_or_else(not_found)?;

        debug!("Sending to {}: \"{}\"", recipient, truncate_for_log(text, 60));
        self.client.send_message(peer_ref, text).await?;
        Ok(())
    }

    /// Disconnects from Telegram. Later calls do nothing.
    pub fn disconnect(&self) {
        if !self.disconnected.swap(true, Ordering::SeqCst) {
            info!("Disconnecting from Telegram...");
            self.handle.quit();
        }
    }
}

impl Drop for TelegramBot {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl std::fmt::Debug for TelegramBot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramBot")
            .field("disconnected", &self.disconnected)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ChatSession for TelegramBot {
    async fn send(&self, recipient: &str, text: &str) -> Result<(), TelegramError> {
        self.send_text(recipient, text).await
    }

    fn disconnect(&self) {
        Self::disconnect(self);
    }
}

/// Opens [`TelegramBot`] sessions for the dispatcher.
#[derive(Debug, Clone)]
pub struct TelegramConnector {
    config: TelegramConfig,
    interactive: bool,
}

impl TelegramConnector {
    /// Creates a connector. With `interactive` set, an unauthorized session
    /// prompts for a login on the terminal instead of failing.
    #[must_use]
    pub const fn new(config: TelegramConfig, interactive: bool) -> Self {
        Self {
            config,
            interactive,
        }
    }
}

#[async_trait]
impl ChatConnector for TelegramConnector {
    async fn connect(&self) -> Result<Box<dyn ChatSession>, TelegramError> {
        let bot = TelegramBot::connect(&self.config).await?;

        if !bot.is_authorized().await? {
            if !self.interactive {
                return Err(TelegramError::NotAuthorized);
            }
            super::login::authenticate(&bot, &self.config).await?;
        }

        Ok(Box::new(bot))
    }
}

/// Masks a phone number for logging (shows last 4 digits).
fn mask_phone(phone: &str) -> String {
    let digits: String = phone.chars().filter(char::is_ascii_digit).collect();
    if digits.len() > 4 {
        format!("***{}", &digits[digits.len() - 4..])
    } else {
        "****".to_owned()
    }
}

/// Truncates a string for logging purposes.
fn truncate_for_log(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_owned()
    } else {
        format!("{}...", s.chars().take(max_len).collect::<String>())
    }
}
