use std::path::PathBuf;

/// Failures while building the table. All of them are fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("Failed to read data file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to fetch {url}: {source}")]
    Fetch { url: String, source: reqwest::Error },
    #[error("HTTP request to {url} failed with status {status}")]
    HttpStatus { url: String, status: u16 },
    #[error("Malformed CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("Failed to read workbook: {0}")]
    Xlsx(#[from] calamine::XlsxError),
    #[error("Required column '{0}' is missing from the data source")]
    MissingColumn(&'static str),
    #[error("No data URL configured for internet mode")]
    NoUrl,
}
