//! Google Calendar API v3 public holiday lookup.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{debug, error};

use super::{check_status, endpoint, GoogleApiError, ServiceAccountAuth};
use crate::holiday::{HolidayLookup, HolidayOracle, LookupFailure};

const CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";

#[derive(Debug, Deserialize)]
struct EventsResponse {
    #[serde(default)]
    items: Vec<EventRaw>,
}

#[derive(Debug, Deserialize)]
struct EventRaw {
    #[serde(default)]
    summary: Option<String>,
    start: Option<EventDateTime>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventDateTime {
    date: Option<String>,
    date_time: Option<String>,
}

/// Holiday oracle backed by a public holiday calendar.
#[derive(Debug)]
pub struct CalendarHolidays {
    http: reqwest::Client,
    auth: Arc<ServiceAccountAuth>,
    calendar_id: String,
    base_url: String,
}

impl CalendarHolidays {
    /// Creates an oracle over `calendar_id`.
    #[must_use]
    pub fn new(http: reqwest::Client, auth: Arc<ServiceAccountAuth>, calendar_id: String) -> Self {
        Self {
            http,
            auth,
            calendar_id,
            base_url: CALENDAR_API_BASE.to_owned(),
        }
    }

    /// Overrides the base URL (for testing with wiremock).
    #[cfg(test)]
    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url;
        self
    }

    /// Lists the events of `date` as a UTC day and returns the first
    /// all-day event starting on that date.
    async fn find_holiday(
        &self,
        access_token: &str,
        date: NaiveDate,
    ) -> Result<Option<String>, GoogleApiError> {
        let date_str = date.format("%Y-%m-%d").to_string();
        let time_min = format!("{date_str}T00:00:00Z");
        let time_max = format!("{date_str}T23:59:59Z");

        let url = endpoint(&self.base_url, &["calendars", &self.calendar_id, "events"])?;
        let resp = self
            .http
            .get(url)
            .bearer_auth(access_token)
            .query(&[
                ("timeMin", time_min.as_str()),
                ("timeMax", time_max.as_str()),
                ("singleEvents", "true"),
                ("orderBy", "startTime"),
            ])
            .send()
            .await?;

        let body: EventsResponse = check_status(resp).await?.json().await?;
        debug!("Calendar returned {} event(s) for {}", body.items.len(), date_str);

        Ok(body.items.into_iter().find_map(|event| {
            let start = event
                .start
                .and_then(|s| s.date.or(s.date_time))
                .filter(|start| start.starts_with(&date_str))?;
            debug!("Matched holiday event starting {}", start);
            Some(event.summary.unwrap_or_default())
        }))
    }
}

#[async_trait]
impl HolidayOracle for CalendarHolidays {
    async fn lookup(&self, date: NaiveDate) -> HolidayLookup {
        let access_token = match self.auth.access_token().await {
            Ok(token) => token,
            Err(e) => {
                error!("Error authenticating with Google Calendar API: {}", e);
                return HolidayLookup::LookupFailed(LookupFailure::Service(e.to_string()));
            }
        };

        match self.find_holiday(&access_token, date).await {
            Ok(Some(name)) => HolidayLookup::Holiday { name },
            Ok(None) => HolidayLookup::WorkingDay,
            Err(e) => {
                error!("API error while checking holiday: {}", e);
                HolidayLookup::LookupFailed(LookupFailure::Query(e.to_string()))
            }
        }
    }
}
