//! End-to-end job runs against in-memory calendar, sheet and chat.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::time::Instant;
use tracing_test::traced_test;

use timesheet_user_bot::config::{ColumnMapping, SheetConfig};
use timesheet_user_bot::holiday::{HolidayLookup, HolidayOracle, LookupFailure};
use timesheet_user_bot::jobs::{Application, JobOutcome};
use timesheet_user_bot::telegram::{
    ChatConnector, ChatDispatcher, ChatSession, TelegramError, PACING_INTERVAL,
};
use timesheet_user_bot::timesheet::{CellValue, RecordSource, SheetError, TaskRow, Timesheet};

const RECIPIENT: &str = "@timesheet_bot";

struct FixedHoliday(HolidayLookup);

#[async_trait]
impl HolidayOracle for FixedHoliday {
    async fn lookup(&self, _date: NaiveDate) -> HolidayLookup {
        self.0.clone()
    }
}

#[derive(Clone)]
struct FakeSheet {
    rows: Result<Vec<TaskRow>, ()>,
    fetches: Arc<AtomicUsize>,
}

impl FakeSheet {
    fn with_rows(rows: Vec<TaskRow>) -> Self {
        Self {
            rows: Ok(rows),
            fetches: Arc::default(),
        }
    }

    fn failing() -> Self {
        Self {
            rows: Err(()),
            fetches: Arc::default(),
        }
    }
}

#[async_trait]
impl RecordSource for FakeSheet {
    async fn fetch_records(&self) -> Result<Vec<TaskRow>, SheetError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.rows
            .clone()
            .map_err(|()| SheetError::SpreadsheetNotFound("Timesheet 2025".to_owned()))
    }
}

#[derive(Default)]
struct ChatLog {
    connects: usize,
    disconnects: usize,
    sent: Vec<(Instant, String, String)>,
}

#[derive(Clone, Default)]
struct FakeChat {
    log: Arc<Mutex<ChatLog>>,
    fail_at: Option<usize>,
    refuse_connect: bool,
}

impl FakeChat {
    fn texts(&self) -> Vec<String> {
        let log = self.log.lock().unwrap();
        log.sent.iter().map(|(_, _, text)| text.clone()).collect()
    }

    fn counts(&self) -> (usize, usize) {
        let log = self.log.lock().unwrap();
        (log.connects, log.disconnects)
    }
}

struct FakeSession(FakeChat);

#[async_trait]
impl ChatConnector for FakeChat {
    async fn connect(&self) -> Result<Box<dyn ChatSession>, TelegramError> {
        if self.refuse_connect {
            return Err(TelegramError::NotAuthorized);
        }
        self.log.lock().unwrap().connects += 1;
        Ok(Box::new(FakeSession(self.clone())))
    }
}

#[async_trait]
impl ChatSession for FakeSession {
    async fn send(&self, recipient: &str, text: &str) -> Result<(), TelegramError> {
        let mut log = self.0.log.lock().unwrap();
        if self.0.fail_at == Some(log.sent.len() + 1) {
            return Err(TelegramError::Invocation("rpc error 500: INTERNAL".to_owned()));
        }
        log.sent
            .push((Instant::now(), recipient.to_owned(), text.to_owned()));
        Ok(())
    }

    fn disconnect(&self) {
        self.0.log.lock().unwrap().disconnects += 1;
    }
}

fn sheet_config() -> SheetConfig {
    SheetConfig {
        spreadsheet_name: "Timesheet 2025".to_owned(),
        worksheet_title: "November".to_owned(),
        columns: ColumnMapping {
            actual_date: "D".to_owned(),
            project: "P".to_owned(),
            task: "T".to_owned(),
            eff_hours: "H".to_owned(),
        },
        date_format: "%d-%m-%Y".to_owned(),
    }
}

fn row(project: &str, task: &str, hours: i64, date: &str) -> TaskRow {
    TaskRow::from_pairs([
        ("P", CellValue::Text(project.to_owned())),
        ("T", CellValue::Text(task.to_owned())),
        ("H", CellValue::Integer(hours)),
        ("D", CellValue::Text(date.to_owned())),
    ])
}

fn three_rows() -> Vec<TaskRow> {
    vec![
        row("Alpha", "Fix", 2, "05-11-2025"),
        row("Alpha", "Review", 1, "05-11-2025"),
        row("Beta", "Docs", 5, "05-11-2025"),
    ]
}

fn expected_commands() -> Vec<String> {
    vec![
        "/ts Alpha:Fix:2:05-11-2025".to_owned(),
        "/ts Alpha:Review:1:05-11-2025".to_owned(),
        "/ts Beta:Docs:5:05-11-2025".to_owned(),
    ]
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 11, 5).unwrap()
}

fn application(lookup: HolidayLookup, chat: &FakeChat) -> Application {
    Application::new(
        Box::new(FixedHoliday(lookup)),
        ChatDispatcher::new(Box::new(chat.clone()), RECIPIENT.to_owned()),
    )
}

fn timesheet(sheet: &FakeSheet) -> Timesheet {
    Timesheet::new(Box::new(sheet.clone()), &sheet_config())
}

#[tokio::test]
async fn test_holiday_skips_sheet_and_chat() {
    let chat = FakeChat::default();
    let sheet = FakeSheet::with_rows(three_rows());
    let holiday = HolidayLookup::Holiday {
        name: "New Year".to_owned(),
    };
    let app = application(holiday, &chat);

    let submitted = app.submit_timesheet(&timesheet(&sheet), today()).await;
    let clocked_out = app.clock_out(today()).await;

    let skipped = JobOutcome::HolidaySkipped {
        name: "New Year".to_owned(),
    };
    assert_eq!(submitted, skipped);
    assert_eq!(clocked_out, skipped);
    assert_eq!(sheet.fetches.load(Ordering::SeqCst), 0);
    assert_eq!(chat.counts(), (0, 0));
}

#[tokio::test]
async fn test_empty_day_never_connects() {
    let chat = FakeChat::default();
    let sheet = FakeSheet::with_rows(vec![row("Alpha", "Fix", 2, "04-11-2025")]);

    let outcome = application(HolidayLookup::WorkingDay, &chat)
        .submit_timesheet(&timesheet(&sheet), today())
        .await;

    assert_eq!(outcome, JobOutcome::NoTasks);
    assert_eq!(sheet.fetches.load(Ordering::SeqCst), 1);
    assert_eq!(chat.counts(), (0, 0));
}

#[tokio::test]
async fn test_sheet_failure_is_an_empty_day() {
    let chat = FakeChat::default();

    let outcome = application(HolidayLookup::WorkingDay, &chat)
        .submit_timesheet(&timesheet(&FakeSheet::failing()), today())
        .await;

    assert_eq!(outcome, JobOutcome::NoTasks);
    assert_eq!(chat.counts(), (0, 0));
}

#[tokio::test(start_paused = true)]
async fn test_three_rows_sent_in_order_with_pacing() {
    let chat = FakeChat::default();
    let sheet = FakeSheet::with_rows(three_rows());
    let start = Instant::now();

    let outcome = application(HolidayLookup::WorkingDay, &chat)
        .submit_timesheet(&timesheet(&sheet), today())
        .await;

    assert_eq!(outcome, JobOutcome::Completed { sent: 3 });
    assert_eq!(chat.texts(), expected_commands());
    assert_eq!(chat.counts(), (1, 1));

    let log = chat.log.lock().unwrap();
    assert!(log.sent.iter().all(|(_, recipient, _)| recipient == RECIPIENT));
    for pair in log.sent.windows(2) {
        assert!(pair[1].0 - pair[0].0 >= PACING_INTERVAL);
    }
    assert!(log.sent[2].0 - start >= Duration::from_secs(6));
}

#[tokio::test(start_paused = true)]
async fn test_other_dates_are_dropped() {
    let chat = FakeChat::default();
    let mut rows = three_rows();
    rows.insert(1, row("Gamma", "Yesterday", 3, "04-11-2025"));
    let sheet = FakeSheet::with_rows(rows);

    let outcome = application(HolidayLookup::WorkingDay, &chat)
        .submit_timesheet(&timesheet(&sheet), today())
        .await;

    assert_eq!(outcome, JobOutcome::Completed { sent: 3 });
    assert_eq!(chat.texts(), expected_commands());
}

#[tokio::test(start_paused = true)]
#[traced_test]
async fn test_send_failure_at_second_message() {
    let chat = FakeChat {
        fail_at: Some(2),
        ..FakeChat::default()
    };
    let sheet = FakeSheet::with_rows(three_rows());

    let outcome = application(HolidayLookup::WorkingDay, &chat)
        .submit_timesheet(&timesheet(&sheet), today())
        .await;

    assert_eq!(
        outcome,
        JobOutcome::SendFailed {
            sent: 1,
            failed_at: 2,
            total: 3
        }
    );
    assert_eq!(chat.texts(), ["/ts Alpha:Fix:2:05-11-2025"]);
    assert_eq!(chat.counts(), (1, 1));
    assert!(logs_contain("Error sending message 2 of 3"));
    assert!(logs_contain("Skipping the remaining 1 message(s)"));
}

#[tokio::test(start_paused = true)]
async fn test_row_with_separator_is_skipped() {
    let chat = FakeChat::default();
    let sheet = FakeSheet::with_rows(vec![
        row("Alpha", "Fix", 2, "05-11-2025"),
        row("Alpha", "Sync 10:00", 1, "05-11-2025"),
        row("Beta", "Docs", 5, "05-11-2025"),
    ]);

    let outcome = application(HolidayLookup::WorkingDay, &chat)
        .submit_timesheet(&timesheet(&sheet), today())
        .await;

    assert_eq!(outcome, JobOutcome::Completed { sent: 2 });
    assert_eq!(
        chat.texts(),
        ["/ts Alpha:Fix:2:05-11-2025", "/ts Beta:Docs:5:05-11-2025"]
    );
}

#[tokio::test]
async fn test_clock_out_on_working_day() {
    let chat = FakeChat::default();

    let outcome = application(HolidayLookup::WorkingDay, &chat)
        .clock_out(today())
        .await;

    assert_eq!(outcome, JobOutcome::Completed { sent: 1 });
    assert_eq!(chat.texts(), ["/clock_out"]);
    assert_eq!(chat.counts(), (1, 1));
}

#[tokio::test]
async fn test_clock_out_after_failed_lookup() {
    let chat = FakeChat::default();
    let failed = HolidayLookup::LookupFailed(LookupFailure::Query("API error 500".to_owned()));

    let outcome = application(failed, &chat).clock_out(today()).await;

    assert_eq!(outcome, JobOutcome::Completed { sent: 1 });
    assert_eq!(chat.texts(), ["/clock_out"]);
}

#[tokio::test]
async fn test_connect_failure_sends_nothing() {
    let chat = FakeChat {
        refuse_connect: true,
        ..FakeChat::default()
    };

    let outcome = application(HolidayLookup::WorkingDay, &chat)
        .clock_out(today())
        .await;

    assert_eq!(outcome, JobOutcome::ConnectFailed);
    assert!(chat.texts().is_empty());
    assert_eq!(chat.counts(), (0, 0));
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_submit_disconnects_once() {
    let chat = FakeChat::default();
    let sheet = FakeSheet::with_rows(three_rows());
    let app = application(HolidayLookup::WorkingDay, &chat);
    let timesheet = timesheet(&sheet);

    let run = app.submit_timesheet(&timesheet, today());
    let cancelled = tokio::time::timeout(Duration::from_secs(4), run).await;

    assert!(cancelled.is_err());
    assert_eq!(chat.texts().len(), 2);
    assert_eq!(chat.counts(), (1, 1));
}
