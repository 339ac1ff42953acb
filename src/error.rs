use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum ReportError {
    #[error("invalid report kind: {0}")]
    InvalidReportKind(String),

    #[error("invalid object kind: {0}")]
    InvalidObjectKind(String),

    #[error("missing config file ds-report.json in current directory")]
    MissingConfig,

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("no template configured for report kind {0}")]
    MissingTemplate(String),

    #[error("no Google access token (set GOOGLE_ACCESS_TOKEN or access_token in config)")]
    MissingAccessToken,

    #[error("failed to read input file at {0}")]
    InputRead(PathBuf),

    #[error("failed to parse report input: {0}")]
    InputParse(String),

    #[error("failed to parse sheet layout: {0}")]
    LayoutParse(String),

    #[error("invalid layout: {0}")]
    Layout(String),

    #[error("invalid spreadsheet request: {0}")]
    InvalidRequest(String),

    #[error("Sheets request failed: {0}")]
    SheetsHttp(String),

    #[error("Sheets returned status {status}: {message}")]
    SheetsStatus { status: u16, message: String },

    #[error("Drive request failed: {0}")]
    DriveHttp(String),

    #[error("Drive returned status {status}: {message}")]
    DriveStatus { status: u16, message: String },

    #[error("report not found: {0}")]
    ReportNotFound(String),

    #[error("{count} reports named {name} found in folder")]
    AmbiguousReport { name: String, count: usize },

    #[error("report already exists: {0} (pass --overwrite to replace it)")]
    ReportExists(String),

    #[error("sheet not found: {0}")]
    SheetNotFound(String),

    #[error("{count} sheets titled {title} found")]
    AmbiguousSheet { title: String, count: usize },

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
