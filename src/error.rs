use thiserror::Error;

#[derive(Error, Debug)]
pub enum TallyError {
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Missing required column: no header containing \"{0}\" was found")]
    MissingColumn(&'static str),

    #[error("No month columns found: expected headers like \"Month 1\", \"M1\", \"Jan\" or \"January\"")]
    NoMonthColumns,

    #[error("Month columns \"{first}\" and \"{second}\" both map to {label}")]
    DuplicateMonthColumn {
        label: String,
        first: String,
        second: String,
    },

    #[error("The upload is empty: a header row is required")]
    EmptyUpload,

    #[error("Unknown upload type: {0} (expected ytd-3, ytd-2, ytd-1, budget or ytd-actual)")]
    UnknownUploadType(String),

    #[error("Invalid financial year: {0} (expected the form 2024/2025)")]
    InvalidFinancialYear(String),

    #[error("Unknown month: {0}")]
    UnknownMonth(String),

    #[error("Nothing to save: no rows matched a known client and product")]
    NothingToSave,

    #[error("Database not found at {0}. Run `tally init` to set up.")]
    NotInitialized(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, TallyError>;
