//! Google Sheets v4 store
//!
//! Talks to the `spreadsheets.values` REST endpoints with a bearer token
//! from [`Credentials`]. Row 1 of the tab is the header row; every following row is one day.

use std::collections::HashSet;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::auth::Credentials;
use super::{HabitStore, HeaderIndex, date_column, index_headers, layout_row, normalize_date_cell};
use crate::config::Config;
use crate::error::HabitError;
use crate::record::{CellValue, Row};

/// Default Sheets API root
pub const SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";

/// Response body of `values.get`
#[derive(Debug, Default, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

/// Request body of `values.append`
#[derive(Debug, Serialize)]
struct AppendBody<'a> {
    values: [&'a [Option<CellValue>]; 1],
}

/// A1 column letters for a zero-based index (0 → A, 25 → Z, 26 → AA)
pub fn column_letter(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

/// Quote a tab name for use in an A1 range
fn quoted_sheet(sheet_name: &str) -> String {
    format!("'{}'", sheet_name.replace('\'', "''"))
}

/// Render a cell the way it reads in the sheet
fn cell_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Store backed by one tab of a Google spreadsheet
pub struct SheetsStore {
    client: Client,
    base_url: String,
    spreadsheet_id: String,
    sheet_name: String,
    credentials: Credentials,
    headers: RwLock<Option<HeaderIndex>>,
}

impl SheetsStore {
    /// Store using a fixed bearer token
    pub fn new(
        spreadsheet_id: impl Into<String>,
        sheet_name: impl Into<String>,
        token: impl Into<String>,
    ) -> Result<Self, HabitError> {
        Self::with_credentials(spreadsheet_id, sheet_name, Credentials::AccessToken(token.into()))
    }

    pub fn with_credentials(
        spreadsheet_id: impl Into<String>,
        sheet_name: impl Into<String>,
        credentials: Credentials,
    ) -> Result<Self, HabitError> {
        let client = Client::builder()
            .user_agent(concat!("habitlog/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| HabitError::Connection(format!("init http client: {}", e)))?;

        Ok(Self {
            client,
            base_url: SHEETS_API_BASE.to_string(),
            spreadsheet_id: spreadsheet_id.into(),
            sheet_name: sheet_name.into(),
            credentials,
            headers: RwLock::new(None),
        })
    }

    /// Build from config, reading the credentials file
    pub fn from_config(config: &Config) -> Result<Self, HabitError> {
        debug!(mode = ?config.auth.mode, "SheetsStore::from_config: called");
        let credentials = Credentials::load(&config.auth)?;
        info!(sheet = %config.sheet_name, "Sheets store configured");
        Self::with_credentials(&config.spreadsheet_id, &config.sheet_name, credentials)
    }

    /// Point at a different API root (proxies, emulators)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// URL for `values/<range><suffix>`
    fn values_url(&self, range: &str, suffix: &str) -> Result<Url, HabitError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| HabitError::Config(format!("bad API base url {}: {}", self.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| HabitError::Config(format!("API base url {} cannot take a path", self.base_url)))?
            .pop_if_empty()
            .push(&self.spreadsheet_id)
            .push("values")
            .push(&format!("{}{}", range, suffix));
        Ok(url)
    }

    async fn get_values(&self, range: &str) -> Result<ValueRange, HabitError> {
        let url = self.values_url(range, "")?;
        debug!(%url, "SheetsStore::get_values: called");
        let token = self.credentials.bearer(&self.client).await?;

        let response = self
            .client
            .get(url)
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| HabitError::Connection(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "Sheets read failed");
            return Err(read_error(status, &body));
        }

        response
            .json::<ValueRange>()
            .await
            .map_err(|e| HabitError::Connection(format!("invalid response: {}", e)))
    }
}

/// Map a failed read to the error taxonomy
fn read_error(status: StatusCode, body: &str) -> HabitError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            HabitError::Connection(format!("not authorized ({}): {}", status, body.trim()))
        }
        _ => HabitError::Connection(format!("API error {}: {}", status, body.trim())),
    }
}

#[async_trait]
impl HabitStore for SheetsStore {
    async fn fetch_schema(&self) -> Result<Vec<String>, HabitError> {
        debug!(sheet = %self.sheet_name, "SheetsStore::fetch_schema: called");
        let range = format!("{}!1:1", quoted_sheet(&self.sheet_name));
        let resp = self.get_values(&range).await?;

        let headers: Vec<String> = resp
            .values
            .into_iter()
            .next()
            .unwrap_or_default()
            .iter()
            .map(cell_text)
            .collect();
        if headers.is_empty() {
            return Err(HabitError::Schema(format!("sheet {} is empty", self.sheet_name)));
        }

        *self.headers.write().await = Some(index_headers(&headers));
        info!(columns = headers.len(), "Fetched sheet headers");
        Ok(headers)
    }

    async fn fetch_existing_dates(&self) -> Result<HashSet<String>, HabitError> {
        debug!("SheetsStore::fetch_existing_dates: called");
        let col = match self.headers.read().await.as_ref() {
            Some(index) => date_column(index)?,
            None => return Err(HabitError::Schema("headers have not been fetched".to_string())),
        };

        let letter = column_letter(col);
        let range = format!("{}!{}2:{}", quoted_sheet(&self.sheet_name), letter, letter);
        let resp = self.get_values(&range).await?;

        let dates: HashSet<String> = resp
            .values
            .iter()
            .filter_map(|row| row.first())
            .filter_map(|cell| normalize_date_cell(&cell_text(cell)))
            .collect();
        info!(count = dates.len(), "Fetched existing dates");
        Ok(dates)
    }

    async fn append_record(&self, row: &Row) -> Result<(), HabitError> {
        debug!(columns = row.len(), "SheetsStore::append_record: called");
        let cells = match self.headers.read().await.as_ref() {
            Some(index) => layout_row(index, row),
            None => return Err(HabitError::StoreWrite("headers have not been fetched".to_string())),
        };

        let mut url = self.values_url(&quoted_sheet(&self.sheet_name), ":append")?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "USER_ENTERED")
            .append_pair("insertDataOption", "INSERT_ROWS");

        let token = self.credentials.bearer(&self.client).await?;
        let body = AppendBody { values: [cells.as_slice()] };
        let response = self
            .client
            .post(url)
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await
            .map_err(|e| HabitError::StoreWrite(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "Sheets append failed");
            return Err(HabitError::StoreWrite(format!("API error {}: {}", status, body.trim())));
        }

        info!("Appended row");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::config::AuthMode;
    use crate::store::auth::ServiceAccount;

    const KEY_JSON: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/service_account.json"));
    const HEADER_PATH: &str = "/v4/spreadsheets/abc/values/'Daily'!1:1";

    fn mock_store(server: &MockServer) -> SheetsStore {
        SheetsStore::new("abc", "Daily", "test-token")
            .unwrap()
            .with_base_url(format!("{}/v4/spreadsheets", server.uri()))
    }

    async fn mount_headers(server: &MockServer, headers: &[&str]) {
        Mock::given(method("GET"))
            .and(path(HEADER_PATH))
            .and(header("authorization", "Bearer test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "range": "Daily!A1:Z1",
                "majorDimension": "ROWS",
                "values": [headers]
            })))
            .mount(server)
            .await;
    }

    #[test]
    fn test_column_letter() {
        assert_eq!(column_letter(0), "A");
        assert_eq!(column_letter(3), "D");
        assert_eq!(column_letter(25), "Z");
        assert_eq!(column_letter(26), "AA");
        assert_eq!(column_letter(27), "AB");
        assert_eq!(column_letter(51), "AZ");
        assert_eq!(column_letter(52), "BA");
        assert_eq!(column_letter(701), "ZZ");
        assert_eq!(column_letter(702), "AAA");
    }

    #[test]
    fn test_quoted_sheet() {
        assert_eq!(quoted_sheet("Daily"), "'Daily'");
        assert_eq!(quoted_sheet("Bob's log"), "'Bob''s log'");
    }

    #[test]
    fn test_values_url_encodes_range() {
        let store = SheetsStore::new("abc123", "My Log", "token").unwrap();
        let url = store.values_url(&format!("{}!1:1", quoted_sheet("My Log")), "").unwrap();
        assert_eq!(
            url.as_str(),
            "https://sheets.googleapis.com/v4/spreadsheets/abc123/values/'My%20Log'!1:1"
        );
    }

    #[test]
    fn test_append_url() {
        let store = SheetsStore::new("abc123", "Daily", "token").unwrap();
        let url = store.values_url(&quoted_sheet("Daily"), ":append").unwrap();
        assert!(url.path().ends_with("/values/'Daily':append"));
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let store = SheetsStore::new("abc", "Daily", "t")
            .unwrap()
            .with_base_url("http://localhost:8080/v4/spreadsheets/");
        let url = store.values_url("'Daily'!1:1", "").unwrap();
        assert_eq!(url.path(), "/v4/spreadsheets/abc/values/'Daily'!1:1");
    }

    #[test]
    fn test_cell_text() {
        assert_eq!(cell_text(&serde_json::json!("date")), "date");
        assert_eq!(cell_text(&serde_json::json!(45361)), "45361");
        assert_eq!(cell_text(&serde_json::json!(true)), "true");
    }

    #[test]
    fn test_append_body_shape() {
        let cells = vec![Some(CellValue::from("2024-03-10")), None, Some(CellValue::Bool(true))];
        let body = AppendBody { values: [cells.as_slice()] };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({ "values": [["2024-03-10", null, true]] })
        );
    }

    #[test]
    fn test_read_error_auth() {
        let err = read_error(StatusCode::FORBIDDEN, "denied");
        assert!(matches!(err, HabitError::Connection(ref m) if m.contains("not authorized")));
    }

    #[test]
    fn test_from_config_reads_token() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("token");
        fs::write(&path, "ya29.token\n").unwrap();

        let mut config = Config::new("abc", "Daily", vec![]);
        config.auth.mode = AuthMode::AccessToken;
        config.auth.key_path = path.to_string_lossy().into_owned();

        let store = SheetsStore::from_config(&config).unwrap();
        assert!(matches!(store.credentials, Credentials::AccessToken(ref t) if t == "ya29.token"));
    }

    #[test]
    fn test_from_config_service_account_key() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("service-account.json");
        fs::write(&path, KEY_JSON).unwrap();

        let mut config = Config::new("abc", "Daily", vec![]);
        config.auth.key_path = path.to_string_lossy().into_owned();

        let store = SheetsStore::from_config(&config).unwrap();
        assert!(matches!(store.credentials, Credentials::ServiceAccount(_)));
    }

    #[test]
    fn test_from_config_malformed_service_account_key() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("service-account.json");
        fs::write(&path, "ya29.this-is-a-token-not-a-key").unwrap();

        let mut config = Config::new("abc", "Daily", vec![]);
        config.auth.mode = AuthMode::ServiceAccount;
        config.auth.key_path = path.to_string_lossy().into_owned();

        assert!(matches!(SheetsStore::from_config(&config), Err(HabitError::Config(_))));
    }

    #[test]
    fn test_from_config_missing_credentials() {
        let mut config = Config::new("abc", "Daily", vec![]);
        config.auth.key_path = "/nonexistent/habitlog/token".to_string();
        assert!(matches!(SheetsStore::from_config(&config), Err(HabitError::Config(_))));
    }

    #[tokio::test]
    async fn test_fetch_schema_and_dates_over_http() {
        let server = MockServer::start().await;
        mount_headers(&server, &["date", "exercise", "notes"]).await;
        Mock::given(method("GET"))
            .and(path("/v4/spreadsheets/abc/values/'Daily'!A2:A"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "range": "Daily!A2:A1000",
                "majorDimension": "ROWS",
                "values": [["2024-03-09"], ["3/8/2024"], [], [""]]
            })))
            .mount(&server)
            .await;

        let store = mock_store(&server);
        assert_eq!(store.fetch_schema().await.unwrap(), vec!["date", "exercise", "notes"]);

        let dates = store.fetch_existing_dates().await.unwrap();
        let expected: HashSet<String> = ["2024-03-09", "2024-03-08"].iter().map(|s| s.to_string()).collect();
        assert_eq!(dates, expected);
    }

    #[tokio::test]
    async fn test_append_posts_user_entered_row() {
        let server = MockServer::start().await;
        mount_headers(&server, &["date", "exercise", "notes"]).await;
        Mock::given(method("POST"))
            .and(path("/v4/spreadsheets/abc/values/'Daily':append"))
            .and(query_param("valueInputOption", "USER_ENTERED"))
            .and(query_param("insertDataOption", "INSERT_ROWS"))
            .and(header("authorization", "Bearer test-token"))
            .and(body_json(json!({ "values": [["2024-03-10", true, null]] })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "spreadsheetId": "abc" })))
            .expect(1)
            .mount(&server)
            .await;

        let store = mock_store(&server);
        store.fetch_schema().await.unwrap();

        let mut row = Row::new();
        row.insert("date".to_string(), CellValue::from("2024-03-10"));
        row.insert("exercise".to_string(), CellValue::Bool(true));
        row.insert("not_in_sheet".to_string(), CellValue::Bool(false));
        store.append_record(&row).await.unwrap();
    }

    #[tokio::test]
    async fn test_append_server_error_is_store_write() {
        let server = MockServer::start().await;
        mount_headers(&server, &["date"]).await;
        Mock::given(method("POST"))
            .and(path("/v4/spreadsheets/abc/values/'Daily':append"))
            .respond_with(ResponseTemplate::new(500).set_body_string("backend error"))
            .mount(&server)
            .await;

        let store = mock_store(&server);
        store.fetch_schema().await.unwrap();

        let mut row = Row::new();
        row.insert("date".to_string(), CellValue::from("2024-03-10"));
        let Err(HabitError::StoreWrite(message)) = store.append_record(&row).await else {
            panic!("expected store write error");
        };
        assert!(message.contains("500"));
    }

    #[tokio::test]
    async fn test_forbidden_header_read_is_connection_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(HEADER_PATH))
            .respond_with(ResponseTemplate::new(403).set_body_string("caller lacks permission"))
            .mount(&server)
            .await;

        let Err(HabitError::Connection(message)) = mock_store(&server).fetch_schema().await else {
            panic!("expected connection error");
        };
        assert!(message.contains("not authorized"));
        assert!(message.contains("caller lacks permission"));
    }

    #[tokio::test]
    async fn test_empty_header_row_is_schema_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(HEADER_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "range": "Daily!A1:Z1",
                "majorDimension": "ROWS"
            })))
            .mount(&server)
            .await;

        let result = mock_store(&server).fetch_schema().await;
        assert!(matches!(result, Err(HabitError::Schema(_))));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_connection_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let store = SheetsStore::new("abc", "Daily", "t")
            .unwrap()
            .with_base_url(format!("http://{}/v4/spreadsheets", addr));
        assert!(matches!(store.fetch_schema().await, Err(HabitError::Connection(_))));
    }

    #[tokio::test]
    async fn test_service_account_token_used_for_reads() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "ya29.service",
                "expires_in": 3600,
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(HEADER_PATH))
            .and(header("authorization", "Bearer ya29.service"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "values": [["date"]] })))
            .expect(2)
            .mount(&server)
            .await;

        let account = ServiceAccount::from_json(KEY_JSON)
            .unwrap()
            .with_token_uri(format!("{}/token", server.uri()));
        let store = SheetsStore::with_credentials("abc", "Daily", Credentials::ServiceAccount(account))
            .unwrap()
            .with_base_url(format!("{}/v4/spreadsheets", server.uri()));

        assert_eq!(store.fetch_schema().await.unwrap(), vec!["date"]);
        assert_eq!(store.fetch_schema().await.unwrap(), vec!["date"]);
    }
}
