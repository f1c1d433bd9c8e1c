//! The two daily jobs: submit today's timesheet and clock out.
//!
//! Both consult the holiday calendar before anything touches Telegram. A
//! holiday ends the run; a failed lookup is logged and the day is treated as
//! a working day.

mod outcome;

use chrono::NaiveDate;
use tracing::{error, info, warn};

use crate::holiday::{HolidayLookup, HolidayOracle};
use crate::telegram::ChatDispatcher;
use crate::timesheet::{Timesheet, CLOCK_OUT_COMMAND};

pub use outcome::{Job, JobOutcome};

/// Everything a job run needs, built once at startup.
pub struct Application {
    holidays: Box<dyn HolidayOracle>,
    dispatcher: ChatDispatcher,
}

impl Application {
    #[must_use]
    pub fn new(holidays: Box<dyn HolidayOracle>, dispatcher: ChatDispatcher) -> Self {
        Self {
            holidays,
            dispatcher,
        }
    }

    /// Sends `/clock_out` unless `today` is a holiday.
    pub async fn clock_out(&self, today: NaiveDate) -> JobOutcome {
        if let Some(skipped) = self.holiday_gate(Job::ClockOut, today).await {
            return skipped;
        }

        info!("Sending {} to {}", CLOCK_OUT_COMMAND, self.dispatcher.recipient());
        let outcome = self
            .dispatcher
            .dispatch(&[CLOCK_OUT_COMMAND.to_owned()])
            .await;
        JobOutcome::from(outcome)
    }

    /// Sends one `/ts` command per timesheet row dated `today`, in sheet
    /// order, unless `today` is a holiday.
    pub async fn submit_timesheet(&self, timesheet: &Timesheet, today: NaiveDate) -> JobOutcome {
        if let Some(skipped) = self.holiday_gate(Job::SubmitTimesheet, today).await {
            return skipped;
        }

        let todays = timesheet.fetch_todays_rows(today).await;
        if todays.rows.is_empty() {
            match todays.today {
                Some(date) => info!("No tasks found for today ({}).", date),
                None => info!("No tasks found for today."),
            }
            return JobOutcome::NoTasks;
        }

        info!("Found {} task(s) for today", todays.rows.len());

        let formatter = timesheet.formatter();
        let mut commands = Vec::with_capacity(todays.rows.len());
        for (index, row) in todays.rows.iter().enumerate() {
            match formatter.format(row) {
                Ok(command) => commands.push(command),
                Err(e) => error!("Skipping row {} of today's tasks: {}", index + 1, e),
            }
        }

        if commands.is_empty() {
            warn!("None of today's rows could be turned into a command");
            return JobOutcome::NoTasks;
        }

        JobOutcome::from(self.dispatcher.dispatch(&commands).await)
    }

    /// Returns the skip outcome when `today` is a holiday.
    async fn holiday_gate(&self, job: Job, today: NaiveDate) -> Option<JobOutcome> {
        match self.holidays.lookup(today).await {
            HolidayLookup::Holiday { name } => {
                info!("Skipping {}: today is {}", job, name);
                Some(JobOutcome::HolidaySkipped { name })
            }
            HolidayLookup::WorkingDay => None,
            HolidayLookup::LookupFailed(failure) => {
                warn!(
                    "Holiday check failed ({}); running {} as on a working day",
                    failure, job
                );
                None
            }
        }
    }
}

impl std::fmt::Debug for Application {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Application")
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use tracing_test::traced_test;

    use super::*;
    use crate::holiday::LookupFailure;
    use crate::telegram::{ChatConnector, ChatSession, TelegramError};

    struct FixedHoliday(HolidayLookup);

    #[async_trait]
    impl HolidayOracle for FixedHoliday {
        async fn lookup(&self, _date: NaiveDate) -> HolidayLookup {
            self.0.clone()
        }
    }

    #[derive(Clone, Default)]
    struct CountingChat {
        connects: Arc<AtomicUsize>,
    }

    struct NoopSession;

    #[async_trait]
    impl ChatSession for NoopSession {
        async fn send(&self, _recipient: &str, _text: &str) -> Result<(), TelegramError> {
            Ok(())
        }

        fn disconnect(&self) {}
    }

    #[async_trait]
    impl ChatConnector for CountingChat {
        async fn connect(&self) -> Result<Box<dyn ChatSession>, TelegramError> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(NoopSession))
        }
    }

    fn app(lookup: HolidayLookup, chat: &CountingChat) -> Application {
        Application::new(
            Box::new(FixedHoliday(lookup)),
            ChatDispatcher::new(Box::new(chat.clone()), "@timesheet_bot".to_owned()),
        )
    }

    fn nov_5() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 11, 5).unwrap()
    }

    #[tokio::test]
    #[traced_test]
    async fn test_holiday_skip_is_logged() {
        let chat = CountingChat::default();
        let holiday = HolidayLookup::Holiday {
            name: "New Year".to_owned(),
        };

        let outcome = app(holiday, &chat).clock_out(nov_5()).await;

        assert_eq!(
            outcome,
            JobOutcome::HolidaySkipped {
                name: "New Year".to_owned()
            }
        );
        assert_eq!(chat.connects.load(Ordering::SeqCst), 0);
        assert!(logs_contain("Skipping clock-out: today is New Year"));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_failed_lookup_runs_as_working_day() {
        let chat = CountingChat::default();
        let failed = HolidayLookup::LookupFailed(LookupFailure::Service("bad key".to_owned()));

        let outcome = app(failed, &chat).clock_out(nov_5()).await;

        assert_eq!(outcome, JobOutcome::Completed { sent: 1 });
        assert_eq!(chat.connects.load(Ordering::SeqCst), 1);
        assert!(logs_contain("Holiday check failed"));
    }
}
