//! Bot command grammar.
//!
//! Timesheet entries are sent as `/ts {project}:{task}:{eff_hours}:{actual_date}`
//! and the end of the day as `/clock_out`.

use thiserror::Error;

use super::TaskRow;
use crate::config::ColumnMapping;

/// Command sent at the end of the working day.
pub const CLOCK_OUT_COMMAND: &str = "/clock_out";

/// Prefix of a timesheet entry command.
pub const TIMESHEET_PREFIX: &str = "/ts";

/// Separator between the fields of a timesheet entry.
pub const FIELD_SEPARATOR: char = ':';

/// Errors that make a row unformattable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("Column '{column}' value {value:?} contains the field separator ':'")]
    SeparatorInField { column: String, value: String },
}

/// Formats worksheet rows into timesheet commands.
#[derive(Debug, Clone)]
pub struct CommandFormatter {
    columns: ColumnMapping,
}

impl CommandFormatter {
    /// Creates a formatter reading the given columns.
    #[must_use]
    pub const fn new(columns: ColumnMapping) -> Self {
        Self { columns }
    }

    /// Formats one row as a `/ts` command.
    ///
    /// Missing columns render as empty fields. A value containing `:` would
    /// shift the fields seen by the bot, so such rows are rejected.
    pub fn format(&self, row: &TaskRow) -> Result<String, CommandError> {
        let fields = [
            &self.columns.project,
            &self.columns.task,
            &self.columns.eff_hours,
            &self.columns.actual_date,
        ];

        let mut values = Vec::with_capacity(fields.len());
        for column in fields {
            let value = row.text(column);
            if value.contains(FIELD_SEPARATOR) {
                return Err(CommandError::SeparatorInField {
                    column: column.clone(),
                    value,
                });
            }
            values.push(value);
        }

        Ok(format!(
            "{TIMESHEET_PREFIX} {}",
            values.join(&FIELD_SEPARATOR.to_string())
        ))
    }
}
