//! Timesheet rows, the bot command grammar and today's row selection.

mod command;
mod row;
mod source;

pub use command::{
    CommandError, CommandFormatter, CLOCK_OUT_COMMAND, FIELD_SEPARATOR, TIMESHEET_PREFIX,
};
pub use row::{records_from_values, CellValue, TaskRow};
pub use source::{filter_rows_for, RecordSource, SheetError, Timesheet, TodaysRows};
