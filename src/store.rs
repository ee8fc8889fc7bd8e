//! Destination row store.
//!
//! Rows are addressed positionally through a [`SheetLayout`]. [`SheetsStore`] maps those
//! positions onto A1 ranges of the Sheets v4 values API.

use crate::config::GoogleConfig;
use crate::error::Error;
use crate::report::SheetLayout;
use log::info;
use reqwest::{Client, Response, StatusCode, Url};
use serde::Deserialize;
use serde_json::{json, Value};

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait RowStore: Send + Sync + 'static {
    /// Reads a single cell, `None` when it is empty.
    async fn read_cell(&self, tab: &str, cell: &str) -> Result<Option<String>, Error>;

    async fn write_cell(&self, tab: &str, cell: &str, value: &str) -> Result<(), Error>;

    /// Reads one column from row 1 down to its last value. Blank cells read as empty strings,
    /// so row `n` sits at index `n - 1`.
    async fn read_column(&self, tab: &str, column: &str) -> Result<Vec<String>, Error>;

    /// Reads the layout's columns from `from_row` down to the last populated row.
    async fn read_rows(&self, layout: &SheetLayout, from_row: usize)
        -> Result<Vec<Vec<String>>, Error>;

    /// Writes `rows` into the layout's columns starting at `start_row`.
    async fn write_rows(
        &self,
        layout: &SheetLayout,
        start_row: usize,
        rows: &[Vec<Value>],
    ) -> Result<(), Error>;

    /// Clears the layout's columns from its first row (header included) downwards.
    async fn clear(&self, layout: &SheetLayout) -> Result<(), Error>;
}

/// Zero based index of a column letter, `A` → 0, `AA` → 26.
pub fn column_index(column: &str) -> Option<usize> {
    if column.is_empty() {
        return None;
    }
    column.chars().try_fold(0usize, |acc, c| {
        c.is_ascii_uppercase()
            .then(|| acc * 26 + (c as usize - 'A' as usize + 1))
    })
    .map(|n| n - 1)
}

/// Builds an A1 range. `end_row = None` leaves the range open downwards.
pub fn a1_range(
    tab: &str,
    first_column: &str,
    start_row: usize,
    last_column: &str,
    end_row: Option<usize>,
) -> String {
    let tab = format!("'{}'", tab.replace('\'', "''"));
    match end_row {
        Some(end_row) => format!(
            "{}!{}{}:{}{}",
            tab, first_column, start_row, last_column, end_row
        ),
        None => format!("{}!{}{}:{}", tab, first_column, start_row, last_column),
    }
}

/// Number of non-empty cells in a column read with [`RowStore::read_column`].
///
/// This is a count, not the index of the last populated row. A blank cell inside the column
/// makes the count smaller than that index, and the next free row computed from it then lands
/// on existing data.
pub fn count_populated(column: &[String]) -> usize {
    column.iter().filter(|v| !v.trim().is_empty()).count()
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

pub struct SheetsStore {
    client: Client,
    base_url: String,
    spreadsheet_id: String,
    access_token: String,
}

impl SheetsStore {
    pub fn new(client: Client, config: &GoogleConfig, spreadsheet_id: &str) -> Self {
        SheetsStore {
            client,
            base_url: config.sheets_api_url.clone(),
            spreadsheet_id: spreadsheet_id.to_string(),
            access_token: config.google_access_token.clone(),
        }
    }

    /// Link to the spreadsheet, used in run summaries.
    pub fn sheet_url(&self) -> String {
        format!(
            "https://docs.google.com/spreadsheets/d/{}/edit",
            self.spreadsheet_id
        )
    }

    fn values_url(&self, range: &str) -> Result<Url, Error> {
        let mut url = Url::parse(&self.base_url)?;
        url.path_segments_mut()
            .map_err(|_| Error::UrlParsingFailed(url::ParseError::SetHostOnCannotBeABaseUrl))?
            .pop_if_empty()
            .extend(&["v4", "spreadsheets", self.spreadsheet_id.as_str(), "values", range]);
        Ok(url)
    }

    async fn get_values(&self, range: &str) -> Result<Vec<Vec<String>>, Error> {
        let resp = self
            .client
            .get(self.values_url(range)?)
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        let values: ValueRange = check_status(resp).await?.json().await?;

        Ok(values
            .values
            .iter()
            .map(|row| row.iter().map(cell_text).collect())
            .collect())
    }

    async fn put_values(&self, range: &str, rows: &[Vec<Value>]) -> Result<(), Error> {
        let mut url = self.values_url(range)?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "USER_ENTERED");

        let body = json!({
            "range": range,
            "majorDimension": "ROWS",
            "values": rows,
        });

        let resp = self
            .client
            .put(url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await?;
        check_status(resp).await?;

        Ok(())
    }
}

async fn check_status(resp: Response) -> Result<Response, Error> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(status_error(status, body))
}

/// A 400 from the values API means the tab or range does not exist.
fn status_error(status: StatusCode, body: String) -> Error {
    match status {
        StatusCode::BAD_REQUEST => Error::schema(body),
        status => Error::Store { status, body },
    }
}

#[async_trait::async_trait]
impl RowStore for SheetsStore {
    async fn read_cell(&self, tab: &str, cell: &str) -> Result<Option<String>, Error> {
        let range = format!("'{}'!{}", tab.replace('\'', "''"), cell);
        let values = self.get_values(&range).await?;

        Ok(values
            .into_iter()
            .next()
            .and_then(|row| row.into_iter().next())
            .filter(|v| !v.trim().is_empty()))
    }

    async fn write_cell(&self, tab: &str, cell: &str, value: &str) -> Result<(), Error> {
        let range = format!("'{}'!{}", tab.replace('\'', "''"), cell);
        self.put_values(&range, &[vec![Value::String(value.to_string())]])
            .await
    }

    async fn read_column(&self, tab: &str, column: &str) -> Result<Vec<String>, Error> {
        let range = a1_range(tab, column, 1, column, None);
        let values = self.get_values(&range).await?;

        Ok(values
            .into_iter()
            .map(|row| row.into_iter().next().unwrap_or_default())
            .collect())
    }

    async fn read_rows(
        &self,
        layout: &SheetLayout,
        from_row: usize,
    ) -> Result<Vec<Vec<String>>, Error> {
        let range = a1_range(
            layout.tab,
            layout.first_column,
            from_row,
            layout.last_column,
            None,
        );
        self.get_values(&range).await
    }

    async fn write_rows(
        &self,
        layout: &SheetLayout,
        start_row: usize,
        rows: &[Vec<Value>],
    ) -> Result<(), Error> {
        if rows.is_empty() {
            return Ok(());
        }

        let range = a1_range(
            layout.tab,
            layout.first_column,
            start_row,
            layout.last_column,
            Some(start_row + rows.len() - 1),
        );
        self.put_values(&range, rows).await?;
        info!("Wrote {} rows to {}", rows.len(), range);

        Ok(())
    }

    async fn clear(&self, layout: &SheetLayout) -> Result<(), Error> {
        let first_row = layout.header_row.unwrap_or(layout.first_data_row);
        let range = a1_range(
            layout.tab,
            layout.first_column,
            first_row,
            layout.last_column,
            None,
        );

        let resp = self
            .client
            .post(self.values_url(&format!("{}:clear", range))?)
            .bearer_auth(&self.access_token)
            .json(&json!({}))
            .send()
            .await?;
        check_status(resp).await?;
        info!("Cleared {}", range);

        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{FILL_RATE, REVENUE};

    fn google_config(url: &str) -> GoogleConfig {
        GoogleConfig {
            google_access_token: "token".to_string(),
            sheets_api_url: url.to_string(),
            drive_api_url: "https://www.googleapis.com".to_string(),
        }
    }

    #[test]
    fn test_column_index() {
        assert_eq!(column_index("A"), Some(0));
        assert_eq!(column_index("K"), Some(10));
        assert_eq!(column_index("Z"), Some(25));
        assert_eq!(column_index("AA"), Some(26));
        assert_eq!(column_index(""), None);
        assert_eq!(column_index("a1"), None);
    }

    #[test]
    fn test_a1_range_quotes_tab() {
        assert_eq!(
            a1_range(FILL_RATE.layout.tab, "B", 2, "J", Some(41)),
            "'Placement Fill Rate'!B2:J41"
        );
        assert_eq!(a1_range("Raw Data", "A", 1, "A", None), "'Raw Data'!A1:A");
        assert_eq!(a1_range("Bob's", "A", 1, "K", None), "'Bob''s'!A1:K");
    }

    #[test]
    fn test_values_url_encodes_range() {
        let store = SheetsStore::new(
            Client::new(),
            &google_config("https://sheets.example.com"),
            "sheet123",
        );

        let url = store.values_url("'Raw Data'!M1").unwrap();
        assert_eq!(
            url.as_str(),
            "https://sheets.example.com/v4/spreadsheets/sheet123/values/'Raw%20Data'!M1"
        );
        assert_eq!(
            store.sheet_url(),
            "https://docs.google.com/spreadsheets/d/sheet123/edit"
        );
    }

    #[tokio::test]
    async fn test_invalid_base_url() {
        let store = SheetsStore::new(Client::new(), &google_config("invalid_url"), "sheet123");

        let result = store.read_cell(REVENUE.layout.tab, "M1").await;
        assert!(matches!(result.unwrap_err(), Error::UrlParsingFailed(_)));
    }

    #[test]
    fn test_bad_request_is_schema_error() {
        let err = status_error(
            StatusCode::BAD_REQUEST,
            "Unable to parse range: 'Raw Data'!M1".to_string(),
        );
        match err {
            Error::Schema { message } => assert!(message.contains("Unable to parse range")),
            other => panic!("expected schema error, got {:?}", other),
        }

        let err = status_error(StatusCode::FORBIDDEN, "no access".to_string());
        assert!(matches!(
            err,
            Error::Store {
                status: StatusCode::FORBIDDEN,
                ..
            }
        ));
    }

    #[test]
    fn test_count_populated_ignores_blank_cells() {
        let column: Vec<String> = ["Date", "2024-04-30", "", "2024-05-01", " "]
            .iter()
            .map(|v| v.to_string())
            .collect();

        assert_eq!(count_populated(&column), 3);
        assert_eq!(count_populated(&[]), 0);
    }

    #[tokio::test]
    async fn test_memory_store_read_column_keeps_row_positions() {
        let store = memory::MemoryStore::new();
        store.set_cell("Raw Data", "A1", "Date");
        store.set_cell("Raw Data", "A3", "2024-05-01");
        store.set_cell("Raw Data", "B5", "Game");

        let column = store.read_column("Raw Data", "A").await.unwrap();

        assert_eq!(column, vec!["Date", "", "2024-05-01"]);
    }

    #[tokio::test]
    async fn test_memory_store_clear_keeps_other_columns() {
        let store = memory::MemoryStore::new();
        store.set_cell(FILL_RATE.layout.tab, "A1", "notes");
        store.set_cell(FILL_RATE.layout.tab, "B1", "Date");
        store.set_cell(FILL_RATE.layout.tab, "J3", "97.5");

        store.clear(&FILL_RATE.layout).await.unwrap();

        assert_eq!(store.cell(FILL_RATE.layout.tab, "A1"), Some("notes".to_string()));
        assert_eq!(store.cell(FILL_RATE.layout.tab, "B1"), None);
        assert_eq!(store.cell(FILL_RATE.layout.tab, "J3"), None);
    }
}
