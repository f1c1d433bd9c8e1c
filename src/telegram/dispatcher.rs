//! Ordered, paced delivery of a message batch over one chat session.
//!
//! A [`DispatchSession`] moves through `Unconnected → Connected →
//! Disconnected`. Dropping it disconnects, so the session is released on
//! every exit path, including cancellation of the surrounding future.

use std::fmt;

use tracing::{error, info, warn};

use super::{ChatConnector, ChatSession, RateLimiter, TelegramError};

/// Lifecycle of a dispatch session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unconnected,
    Connected,
    Disconnected,
}

impl SessionState {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Unconnected => "unconnected",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a batch ended.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// Every message was acknowledged.
    Delivered { sent: usize },
    /// The session could not be opened; nothing was sent.
    ConnectFailed(TelegramError),
    /// Message number `failed_at` (1-based) failed; the rest were skipped.
    SendFailed {
        sent: usize,
        failed_at: usize,
        total: usize,
        error: TelegramError,
    },
}

impl DispatchOutcome {
    /// Number of messages acknowledged by the server.
    #[must_use]
    pub const fn sent(&self) -> usize {
        match self {
            Self::Delivered { sent } | Self::SendFailed { sent, .. } => *sent,
            Self::ConnectFailed(_) => 0,
        }
    }
}

/// Sends message batches to one recipient.
pub struct ChatDispatcher {
    connector: Box<dyn ChatConnector>,
    recipient: String,
}

impl ChatDispatcher {
    /// Creates a dispatcher that opens sessions through `connector`.
    #[must_use]
    pub fn new(connector: Box<dyn ChatConnector>, recipient: String) -> Self {
        Self {
            connector,
            recipient,
        }
    }

    /// The recipient handle.
    #[must_use]
    pub fn recipient(&self) -> &str {
        &self.recipient
    }

    /// Starts an unconnected session.
    #[must_use]
    pub fn session(&self) -> DispatchSession<'_> {
        DispatchSession {
            connector: self.connector.as_ref(),
            recipient: &self.recipient,
            limiter: RateLimiter::default(),
            session: None,
            state: SessionState::Unconnected,
        }
    }

    /// Connects, sends `messages` in order with pacing, and disconnects.
    ///
    /// The first failed send ends the batch; messages already sent stay sent.
    pub async fn dispatch(&self, messages: &[String]) -> DispatchOutcome {
        let total = messages.len();
        let mut session = self.session();

        if let Err(e) = session.connect().await {
            error!("Failed to connect to Telegram: {}", e);
            return DispatchOutcome::ConnectFailed(e);
        }

        for (index, text) in messages.iter().enumerate() {
            info!("Sending ({}/{}) to {}: {}", index + 1, total, self.recipient, text);

            if let Err(e) = session.send(text).await {
                error!("Error sending message {} of {}: {}", index + 1, total, e);
                if index + 1 < total {
                    warn!("Skipping the remaining {} message(s)", total - index - 1);
                }
                session.disconnect();
                return DispatchOutcome::SendFailed {
                    sent: index,
                    failed_at: index + 1,
                    total,
                    error: e,
                };
            }
        }

        session.disconnect();
        DispatchOutcome::Delivered { sent: total }
    }
}

impl fmt::Debug for ChatDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatDispatcher")
            .field("recipient", &self.recipient)
            .finish_non_exhaustive()
    }
}

/// One chat session bound to a recipient.
pub struct DispatchSession<'a> {
    connector: &'a dyn ChatConnector,
    recipient: &'a str,
    limiter: RateLimiter,
    session: Option<Box<dyn ChatSession>>,
    state: SessionState,
}

impl DispatchSession<'_> {
    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Opens the chat session.
    ///
    /// # Errors
    ///
    /// Returns an error if the session was already used or the connection
    /// fails; the state is unchanged on failure.
    pub async fn connect(&mut self) -> Result<(), TelegramError> {
        if self.state != SessionState::Unconnected {
            return Err(TelegramError::Session(format!(
                "cannot connect a {} session",
                self.state
            )));
        }

        self.session = Some(self.connector.connect().await?);
        self.state = SessionState::Connected;
        Ok(())
    }

    /// Sends one message, pausing first if the previous one was recent.
    ///
    /// # Errors
    ///
    /// Returns [`TelegramError::NotConnected`] outside the connected state,
    /// or the transport error of the send.
    pub async fn send(&mut self, text: &str) -> Result<(), TelegramError> {
        let session = match (&self.session, self.state) {
            (Some(session), SessionState::Connected) => session,
            (_, state) => return Err(TelegramError::NotConnected(state.as_str())),
        };

        self.limiter.wait_turn().await;
        let result = session.send(self.recipient, text).await;
        self.limiter.mark_used();
        result
    }

    /// Releases the session. Safe to call in any state, any number of times.
    pub fn disconnect(&mut self) {
        if let Some(session) = self.session.take() {
            session.disconnect();
        }
        if self.state == SessionState::Connected {
            self.state = SessionState::Disconnected;
        }
    }
}

impl Drop for DispatchSession<'_> {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl fmt::Debug for DispatchSession<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchSession")
            .field("recipient", &self.recipient)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
