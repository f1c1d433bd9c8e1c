//! Timesheet User Bot Library
//!
//! A Telegram userbot that reports the day's timesheet to a bot.
//!
//! This crate provides the core functionality for:
//! - Loading and validating configuration from the environment
//! - Reading today's task rows from a Google Sheets worksheet
//! - Checking a Google holiday calendar before each job
//! - Sending `/ts` and `/clock_out` commands via `MTProto`

pub mod config;
pub mod google;
pub mod holiday;
pub mod jobs;
pub mod telegram;
pub mod timesheet;
