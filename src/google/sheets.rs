use serde::{Deserialize, Serialize};

use crate::config::ApiSettings;
use crate::error::ReportError;
use crate::google::{Api, GoogleHttp, Replay};
use crate::requests::{BatchUpdateRequest, Request, ValueRange, ValuesBatchUpdateRequest};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetProperties {
    pub sheet_id: i64,
    pub title: String,
    #[serde(default)]
    pub index: u32,
}

#[derive(Deserialize)]
struct SpreadsheetSheets {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

pub trait SheetsClient: Send + Sync {
    fn sheet_properties(&self, spreadsheet_id: &str) -> Result<Vec<SheetProperties>, ReportError>;
    fn batch_update(&self, spreadsheet_id: &str, requests: &[Request]) -> Result<(), ReportError>;
    fn values_batch_update(
        &self,
        spreadsheet_id: &str,
        data: &[ValueRange],
    ) -> Result<(), ReportError>;
}

pub struct SheetsHttpClient {
    http: GoogleHttp,
}

impl SheetsHttpClient {
    pub fn new(settings: &ApiSettings) -> Result<Self, ReportError> {
        Ok(Self {
            http: GoogleHttp::new(Api::Sheets, &settings.sheets_base_url, settings)?,
        })
    }
}

impl SheetsClient for SheetsHttpClient {
    fn sheet_properties(&self, spreadsheet_id: &str) -> Result<Vec<SheetProperties>, ReportError> {
        let url = self.http.url(&format!("spreadsheets/{spreadsheet_id}"));
        tracing::debug!(spreadsheet_id, "spreadsheets.get");
        let response = self.http.send(Replay::Idempotent, || {
            self.http
                .client()
                .get(&url)
                .query(&[("fields", "sheets.properties(sheetId,title,index)")])
        })?;
        let body: SpreadsheetSheets = self.http.json(response)?;
        Ok(body.sheets.into_iter().map(|entry| entry.properties).collect())
    }

    fn batch_update(&self, spreadsheet_id: &str, requests: &[Request]) -> Result<(), ReportError> {
        let url = self
            .http
            .url(&format!("spreadsheets/{spreadsheet_id}:batchUpdate"));
        let body = BatchUpdateRequest {
            requests: requests.to_vec(),
        };
        tracing::debug!(spreadsheet_id, count = requests.len(), "spreadsheets.batchUpdate");
        self.http
            .send(Replay::Rejected, || self.http.client().post(&url).json(&body))?;
        Ok(())
    }

    fn values_batch_update(
        &self,
        spreadsheet_id: &str,
        data: &[ValueRange],
    ) -> Result<(), ReportError> {
        let url = self
            .http
            .url(&format!("spreadsheets/{spreadsheet_id}/values:batchUpdate"));
        let body = ValuesBatchUpdateRequest::user_entered(data.to_vec());
        tracing::debug!(spreadsheet_id, count = data.len(), "spreadsheets.values.batchUpdate");
        self.http
            .send(Replay::Rejected, || self.http.client().post(&url).json(&body))?;
        Ok(())
    }
}

/// Id of the one sheet titled `title`.
pub fn get_sheet_id(sheets: &[SheetProperties], title: &str) -> Result<i64, ReportError> {
    let matches = sheets
        .iter()
        .filter(|sheet| sheet.title == title)
        .collect::<Vec<_>>();
    match matches.as_slice() {
        [] => Err(ReportError::SheetNotFound(title.to_string())),
        [sheet] => Ok(sheet.sheet_id),
        many => Err(ReportError::AmbiguousSheet {
            title: title.to_string(),
            count: many.len(),
        }),
    }
}
