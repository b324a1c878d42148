use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum StruttureError {
    #[error("failed to read source config at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse source config: {0}")]
    ConfigParse(String),

    #[error("dataset request failed: {0}")]
    Http(String),

    #[error("dataset server returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("failed to read workbook: {0}")]
    Workbook(String),

    #[error("workbook at {path} is missing required sheet {sheet:?}")]
    MissingSheet { path: PathBuf, sheet: String },

    #[error("dataset download failed on both primary and fallback sources (last url: {last_url})")]
    #[diagnostic(help("check your internet connection and retry; the cached copy, if any, was kept"))]
    FetchExhausted { last_url: String },

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
