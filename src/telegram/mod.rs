//! Telegram side of the bot.
//!
//! A [`ChatConnector`] opens a [`ChatSession`]; the [`ChatDispatcher`]
//! drives one session per batch with fixed pacing between messages.

mod client;
mod dispatcher;
pub mod login;
mod rate_limiter;

use async_trait::async_trait;

pub use client::{TelegramBot, TelegramConnector, TelegramError};
pub use dispatcher::{ChatDispatcher, DispatchOutcome, DispatchSession, SessionState};
pub use rate_limiter::{RateLimiter, PACING_INTERVAL};

/// An open, authorized chat session.
#[async_trait]
pub trait ChatSession: Send + Sync {
    /// Sends `text` to the `@username` handle `recipient`.
    async fn send(&self, recipient: &str, text: &str) -> Result<(), TelegramError>;

    /// Releases the session. Must tolerate repeated calls.
    fn disconnect(&self);
}

/// Opens chat sessions.
#[async_trait]
pub trait ChatConnector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn ChatSession>, TelegramError>;
}
