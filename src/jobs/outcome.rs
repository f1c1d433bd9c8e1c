//! Job identity and results.

use std::fmt;

use crate::telegram::DispatchOutcome;

/// The daily jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Job {
    SubmitTimesheet,
    ClockOut,
}

impl Job {
    /// Name used on the command line and in logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::SubmitTimesheet => "submit-timesheet",
            Self::ClockOut => "clock-out",
        }
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How a job run ended. Every variant is a clean exit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// Today is a public holiday; nothing was sent.
    HolidaySkipped { name: String },
    /// The timesheet has no rows for today; nothing was sent.
    NoTasks,
    /// Every message was delivered.
    Completed { sent: usize },
    /// The chat session could not be opened.
    ConnectFailed,
    /// Message `failed_at` (1-based) of `total` failed after `sent` succeeded.
    SendFailed {
        sent: usize,
        failed_at: usize,
        total: usize,
    },
}

impl JobOutcome {
    /// Number of messages that reached the chat.
    #[must_use]
    pub const fn sent(&self) -> usize {
        match self {
            Self::Completed { sent } | Self::SendFailed { sent, .. } => *sent,
            Self::HolidaySkipped { .. } | Self::NoTasks | Self::ConnectFailed => 0,
        }
    }
}

impl From<DispatchOutcome> for JobOutcome {
    fn from(outcome: DispatchOutcome) -> Self {
        match outcome {
            DispatchOutcome::Delivered { sent } => Self::Completed { sent },
            DispatchOutcome::ConnectFailed(_) => Self::ConnectFailed,
            DispatchOutcome::SendFailed {
                sent,
                failed_at,
                total,
                ..
            } => Self::SendFailed {
                sent,
                failed_at,
                total,
            },
        }
    }
}

impl fmt::Display for JobOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HolidaySkipped { name } => write!(f, "skipped for holiday ({name})"),
            Self::NoTasks => f.write_str("no tasks for today"),
            Self::Completed { sent } => write!(f, "completed, {sent} message(s) sent"),
            Self::ConnectFailed => f.write_str("could not connect to Telegram"),
            Self::SendFailed {
                sent,
                failed_at,
                total,
            } => write!(
                f,
                "message {failed_at} of {total} failed, {sent} sent before it"
            ),
        }
    }
}
