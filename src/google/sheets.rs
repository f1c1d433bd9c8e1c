//! Worksheet reader over Drive v3 and Sheets v4.
//!
//! The spreadsheet is located by its Drive name, the worksheet by its tab
//! title, and all of its values are read as records.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use super::{check_status, endpoint, GoogleApiError, ServiceAccountAuth};
use crate::config::SheetConfig;
use crate::timesheet::{records_from_values, RecordSource, SheetError, TaskRow};

const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";
const SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4";
const SPREADSHEET_MIME_TYPE: &str = "application/vnd.google-apps.spreadsheet";

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Debug, Deserialize)]
struct DriveFile {
    id: String,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetMeta>,
}

#[derive(Debug, Deserialize)]
struct SheetMeta {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
struct SheetProperties {
    title: String,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// Reads one worksheet of one spreadsheet.
#[derive(Debug)]
pub struct SheetsClient {
    http: reqwest::Client,
    auth: Arc<ServiceAccountAuth>,
    spreadsheet_name: String,
    worksheet_title: String,
    drive_base_url: String,
    sheets_base_url: String,
}

impl SheetsClient {
    /// Creates a reader for the worksheet named in `config`.
    #[must_use]
    pub fn new(http: reqwest::Client, auth: Arc<ServiceAccountAuth>, config: &SheetConfig) -> Self {
        Self {
            http,
            auth,
            spreadsheet_name: config.spreadsheet_name.clone(),
            worksheet_title: config.worksheet_title.clone(),
            drive_base_url: DRIVE_API_BASE.to_owned(),
            sheets_base_url: SHEETS_API_BASE.to_owned(),
        }
    }

    /// Overrides both base URLs (for testing with wiremock).
    #[cfg(test)]
    pub fn with_base_url(mut self, url: &str) -> Self {
        self.drive_base_url = url.to_owned();
        self.sheets_base_url = url.to_owned();
        self
    }

    /// Finds the spreadsheet id by name.
    async fn open_by_name(&self, token: &str) -> Result<String, SheetError> {
        let query = format!(
            "name = '{}' and mimeType = '{SPREADSHEET_MIME_TYPE}' and trashed = false",
            escape_query_literal(&self.spreadsheet_name)
        );
        let url = endpoint(&self.drive_base_url, &["files"])?;
        let resp = self
            .http
            .get(url)
            .bearer_auth(token)
            .query(&[
                ("q", query.as_str()),
                ("fields", "files(id,name)"),
                ("pageSize", "10"),
                ("supportsAllDrives", "true"),
                ("includeItemsFromAllDrives", "true"),
            ])
            .send()
            .await
            .map_err(GoogleApiError::from)?;

        let list: FileList = check_status(resp)
            .await?
            .json()
            .await
            .map_err(GoogleApiError::from)?;

        list.files
            .into_iter()
            .next()
            .map(|file| file.id)
            .ok_or_else(|| SheetError::SpreadsheetNotFound(self.spreadsheet_name.clone()))
    }

    /// Ensures the worksheet exists in the spreadsheet.
    async fn check_worksheet(&self, token: &str, spreadsheet_id: &str) -> Result<(), SheetError> {
        let url = endpoint(&self.sheets_base_url, &["spreadsheets", spreadsheet_id])?;
        let resp = self
            .http
            .get(url)
            .bearer_auth(token)
            .query(&[("fields", "sheets.properties.title")])
            .send()
            .await
            .map_err(GoogleApiError::from)?;

        let meta: SpreadsheetMeta = check_status(resp)
            .await?
            .json()
            .await
            .map_err(GoogleApiError::from)?;

        if meta
            .sheets
            .iter()
            .any(|sheet| sheet.properties.title == self.worksheet_title)
        {
            Ok(())
        } else {
            Err(SheetError::WorksheetNotFound {
                spreadsheet: self.spreadsheet_name.clone(),
                worksheet: self.worksheet_title.clone(),
            })
        }
    }

    /// Reads every value of the worksheet as displayed.
    async fn read_values(
        &self,
        token: &str,
        spreadsheet_id: &str,
    ) -> Result<Vec<Vec<Value>>, SheetError> {
        let range = quote_sheet_title(&self.worksheet_title);
        let url = endpoint(
            &self.sheets_base_url,
            &["spreadsheets", spreadsheet_id, "values", &range],
        )?;
        let resp = self
            .http
            .get(url)
            .bearer_auth(token)
            .query(&[
                ("majorDimension", "ROWS"),
                ("valueRenderOption", "FORMATTED_VALUE"),
            ])
            .send()
            .await
            .map_err(GoogleApiError::from)?;

        let range: ValueRange = check_status(resp)
            .await?
            .json()
            .await
            .map_err(GoogleApiError::from)?;
        Ok(range.values)
    }
}

#[async_trait]
impl RecordSource for SheetsClient {
    async fn fetch_records(&self) -> Result<Vec<TaskRow>, SheetError> {
        let token = self.auth.access_token().await?;

        info!("Opening spreadsheet: '{}'...", self.spreadsheet_name);
        let spreadsheet_id = self.open_by_name(&token).await?;
        debug!("Spreadsheet '{}' has id {}", self.spreadsheet_name, spreadsheet_id);

        self.check_worksheet(&token, &spreadsheet_id).await?;

        info!("Fetching all records...");
        let values = self.read_values(&token, &spreadsheet_id).await?;
        let records = records_from_values(&values);
        debug!("Fetched {} record(s)", records.len());

        Ok(records)
    }
}

/// Escapes a string literal for a Drive search query.
fn escape_query_literal(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Quotes a worksheet title for A1 notation.
fn quote_sheet_title(title: &str) -> String {
    format!("'{}'", title.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::config::ColumnMapping;
    use crate::google::auth::tests::{fixture_key, mount_token};
    use crate::google::SHEETS_SCOPES;
    use crate::timesheet::CellValue;

    fn sheet_config() -> SheetConfig {
        SheetConfig {
            spreadsheet_name: "Timesheet 2025".to_owned(),
            worksheet_title: "November".to_owned(),
            columns: ColumnMapping {
                actual_date: "Actual Date".to_owned(),
                project: "Project".to_owned(),
                task: "Task".to_owned(),
                eff_hours: "Eff Hours".to_owned(),
            },
            date_format: "%d-%m-%Y".to_owned(),
        }
    }

    async fn client(server: &MockServer) -> SheetsClient {
        mount_token(server, "ya29.sheets").await;
        let http = reqwest::Client::new();
        let auth =
            ServiceAccountAuth::new(http.clone(), fixture_key(server), SHEETS_SCOPES).unwrap();
        SheetsClient::new(http, Arc::new(auth), &sheet_config()).with_base_url(&server.uri())
    }

    async fn mount_drive(server: &MockServer, files: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path("/files"))
            .and(header("authorization", "Bearer ya29.sheets"))
            .and(query_param(
                "q",
                "name = 'Timesheet 2025' and mimeType = 'application/vnd.google-apps.spreadsheet' and trashed = false",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(files))
            .mount(server)
            .await;
    }

    async fn mount_meta(server: &MockServer, titles: &[&str]) {
        let sheets: Vec<_> = titles
            .iter()
            .map(|t| serde_json::json!({"properties": {"title": t}}))
            .collect();
        Mock::given(method("GET"))
            .and(path("/spreadsheets/sheet-123"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"sheets": sheets})),
            )
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_fetch_records() {
        let server = MockServer::start().await;
        mount_drive(&server, serde_json::json!({"files": [{"id": "sheet-123", "name": "Timesheet 2025"}]})).await;
        mount_meta(&server, &["October", "November"]).await;
        Mock::given(method("GET"))
            .and(path("/spreadsheets/sheet-123/values/'November'"))
            .and(query_param("valueRenderOption", "FORMATTED_VALUE"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "range": "November!A1:D3",
                "majorDimension": "ROWS",
                "values": [
                    ["Actual Date", "Project", "Task", "Eff Hours"],
                    ["05-11-2025", "Alpha", "Fix", "2"],
                    ["05-11-2025", "Beta", "Docs", "1.5"]
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let records = client(&server).await.fetch_records().await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].text("Project"), "Alpha");
        assert_eq!(records[0].get("Eff Hours"), Some(&CellValue::Integer(2)));
        assert_eq!(records[1].get("Eff Hours"), Some(&CellValue::Float(1.5)));
    }

    #[tokio::test]
    async fn test_empty_worksheet() {
        let server = MockServer::start().await;
        mount_drive(&server, serde_json::json!({"files": [{"id": "sheet-123"}]})).await;
        mount_meta(&server, &["November"]).await;
        Mock::given(method("GET"))
            .and(path("/spreadsheets/sheet-123/values/'November'"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"range": "November!A1:Z1000"})),
            )
            .mount(&server)
            .await;

        let records = client(&server).await.fetch_records().await.unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_spreadsheet_not_found() {
        let server = MockServer::start().await;
        mount_drive(&server, serde_json::json!({"files": []})).await;

        let err = client(&server).await.fetch_records().await.unwrap_err();
        assert!(matches!(err, SheetError::SpreadsheetNotFound(ref name) if name == "Timesheet 2025"));
    }

    #[tokio::test]
    async fn test_worksheet_not_found() {
        let server = MockServer::start().await;
        mount_drive(&server, serde_json::json!({"files": [{"id": "sheet-123"}]})).await;
        mount_meta(&server, &["October"]).await;

        let err = client(&server).await.fetch_records().await.unwrap_err();
        assert!(matches!(err, SheetError::WorksheetNotFound { .. }));
        assert_eq!(
            err.to_string(),
            "Worksheet 'November' not found in spreadsheet 'Timesheet 2025'"
        );
    }

    #[tokio::test]
    async fn test_api_fault() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/files"))
            .respond_with(ResponseTemplate::new(403).set_body_string("insufficientPermissions"))
            .mount(&server)
            .await;

        let err = client(&server).await.fetch_records().await.unwrap_err();
        assert!(matches!(
            err,
            SheetError::Api(GoogleApiError::ApiError { status: 403, .. })
        ));
    }

    #[test]
    fn test_quoting() {
        assert_eq!(escape_query_literal("Bob's \\ sheet"), "Bob\\'s \\\\ sheet");
        assert_eq!(quote_sheet_title("Q4 'final'"), "'Q4 ''final'''");
    }
}
