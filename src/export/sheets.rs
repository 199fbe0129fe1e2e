//! Google Sheets sink over the Sheets v4 REST API.
//!
//! Two calls per export: create an empty spreadsheet with the requested
//! title, then write header + rows into its first sheet starting at `A1`.
//! Authentication is a pre-obtained OAuth bearer token; obtaining and
//! refreshing it is left to the caller (`gcloud auth print-access-token`
//! works for local use).

use super::{ExportSink, Table};
use crate::error::ExportError;
use futures::future::BoxFuture;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info};

/// Environment variable read by [`GoogleSheetsSink::from_env`].
pub const ACCESS_TOKEN_ENV: &str = "GOOGLE_SHEETS_ACCESS_TOKEN";

const SINK_NAME: &str = "google-sheets";
const DEFAULT_BASE_URL: &str = "https://sheets.googleapis.com";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedSpreadsheet {
    spreadsheet_id: String,
    spreadsheet_url: Option<String>,
}

/// Creates a new spreadsheet per export.
#[derive(Clone)]
pub struct GoogleSheetsSink {
    client: reqwest::Client,
    token: String,
    base_url: String,
}

impl std::fmt::Debug for GoogleSheetsSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleSheetsSink")
            .field("base_url", &self.base_url)
            .field("token", &"<redacted>")
            .finish()
    }
}

impl GoogleSheetsSink {
    pub fn new(token: impl Into<String>, timeout_secs: u64) -> Result<Self, ExportError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| network(e.to_string()))?;
        Ok(Self {
            client,
            token: token.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Build from `GOOGLE_SHEETS_ACCESS_TOKEN`.
    pub fn from_env(timeout_secs: u64) -> Result<Self, ExportError> {
        match std::env::var(ACCESS_TOKEN_ENV) {
            Ok(token) if !token.trim().is_empty() => Self::new(token.trim(), timeout_secs),
            _ => Err(ExportError::Auth {
                sink: SINK_NAME.to_string(),
                detail: format!("{ACCESS_TOKEN_ENV} is not set"),
            }),
        }
    }

    /// Point at a different API host (for proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn create(&self, title: &str) -> Result<CreatedSpreadsheet, ExportError> {
        let url = format!("{}/v4/spreadsheets", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&json!({ "properties": { "title": title } }))
            .send()
            .await
            .map_err(|e| network(e.to_string()))?;
        let response = check_status(response).await?;
        response
            .json::<CreatedSpreadsheet>()
            .await
            .map_err(|e| provider(format!("unexpected create response: {e}")))
    }

    async fn write_rows(&self, spreadsheet_id: &str, table: &Table) -> Result<(), ExportError> {
        let url = values_url(&self.base_url, spreadsheet_id);
        let response = self
            .client
            .put(&url)
            .bearer_auth(&self.token)
            .json(&values_body(table))
            .send()
            .await
            .map_err(|e| network(e.to_string()))?;
        check_status(response).await?;
        Ok(())
    }
}

impl ExportSink for GoogleSheetsSink {
    fn name(&self) -> &str {
        SINK_NAME
    }

    fn export<'a>(&'a self, table: &'a Table, name: &'a str) -> BoxFuture<'a, Result<String, ExportError>> {
        Box::pin(async move {
            info!("Creating spreadsheet '{}' ({} rows)", name, table.rows.len());
            let created = self.create(name).await?;
            debug!("Created spreadsheet {}", created.spreadsheet_id);
            self.write_rows(&created.spreadsheet_id, table).await?;
            Ok(created
                .spreadsheet_url
                .unwrap_or_else(|| spreadsheet_url(&created.spreadsheet_id)))
        })
    }
}

fn network(detail: String) -> ExportError {
    ExportError::Network {
        sink: SINK_NAME.to_string(),
        detail,
    }
}

fn provider(detail: String) -> ExportError {
    ExportError::Provider {
        sink: SINK_NAME.to_string(),
        detail,
    }
}

/// Map an HTTP error status to an [`ExportError`].
fn status_error(status: StatusCode, body: &str) -> ExportError {
    let detail = format!("HTTP {}: {}", status, body.trim());
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        ExportError::Auth {
            sink: SINK_NAME.to_string(),
            detail,
        }
    } else {
        provider(detail)
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ExportError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(status_error(status, &body))
}

fn values_url(base_url: &str, spreadsheet_id: &str) -> String {
    format!("{base_url}/v4/spreadsheets/{spreadsheet_id}/values/A1?valueInputOption=RAW")
}

fn values_body(table: &Table) -> serde_json::Value {
    json!({
        "range": "A1",
        "majorDimension": "ROWS",
        "values": table.to_rows(),
    })
}

/// Browser URL of a spreadsheet.
pub fn spreadsheet_url(spreadsheet_id: &str) -> String {
    format!("https://docs.google.com/spreadsheets/d/{spreadsheet_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_statuses_map_to_auth() {
        assert!(matches!(
            status_error(StatusCode::UNAUTHORIZED, "expired"),
            ExportError::Auth { .. }
        ));
        assert!(matches!(
            status_error(StatusCode::FORBIDDEN, ""),
            ExportError::Auth { .. }
        ));
        let e = status_error(StatusCode::TOO_MANY_REQUESTS, "quota");
        assert!(matches!(e, ExportError::Provider { .. }));
        assert!(e.to_string().contains("429"));
    }

    #[test]
    fn values_request_shape() {
        let table = Table {
            header: vec!["vendor_name".into(), "status".into()],
            rows: vec![vec!["ACME".into(), "OK".into()]],
        };
        let body = values_body(&table);
        assert_eq!(body["majorDimension"], "ROWS");
        assert_eq!(body["values"][0][0], "vendor_name");
        assert_eq!(body["values"][1][1], "OK");
        assert_eq!(
            values_url("https://sheets.googleapis.com", "abc"),
            "https://sheets.googleapis.com/v4/spreadsheets/abc/values/A1?valueInputOption=RAW"
        );
    }

    #[test]
    fn create_response_parses_and_url_falls_back() {
        let c: CreatedSpreadsheet = serde_json::from_str(r#"{"spreadsheetId": "xyz"}"#).unwrap();
        assert_eq!(c.spreadsheet_id, "xyz");
        assert!(c.spreadsheet_url.is_none());
        assert_eq!(spreadsheet_url("xyz"), "https://docs.google.com/spreadsheets/d/xyz");
    }

    #[test]
    fn debug_hides_token() {
        let sink = GoogleSheetsSink::new("secret-token", 30)
            .unwrap()
            .with_base_url("http://localhost:9/");
        let dbg = format!("{sink:?}");
        assert!(!dbg.contains("secret-token"));
        assert!(dbg.contains("http://localhost:9"));
        assert_eq!(sink.name(), "google-sheets");
    }
}
