use thiserror::Error;

#[derive(Error, Debug)]
pub enum ForecastError {
    #[error("Invalid month key '{0}': expected YYYY-MM with a zero-padded month")]
    InvalidMonthKey(String),

    #[error("Cannot distribute an amount across an empty set of months")]
    EmptyPeriod,

    #[error("Invalid forecast periods: {0}")]
    InvalidPeriodOrder(String),

    #[error("Invalid COGS percentage {0}: must be a fraction between 0.0 and 1.0")]
    InvalidCogsPercentage(f64),

    #[error("Invalid amount for {field}: {value}")]
    InvalidAmount { field: String, value: f64 },

    #[error("Invalid fiscal year end month {0}: must be between 1 and 12")]
    InvalidFiscalYearEndMonth(u32),

    #[error("CSV import failed: missing required column '{0}'")]
    MissingHeader(String),

    #[error("CSV import failed: no column header could be read as a month (expected e.g. 'Jul 2024')")]
    NoMonthColumns,

    #[error("CSV import failed: the file contains no account rows")]
    NoDataRows,

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Forecast {0} not found")]
    NotFound(String),

    #[error("Forecast version {0} already exists; versions are append-only")]
    DuplicateVersion(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ForecastError>;
