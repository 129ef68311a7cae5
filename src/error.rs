use thiserror::Error;

/// Errors raised by the record store, the chart renderer and the web layer.
#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Chart drawing failed: {0}")]
    Chart(String),

    #[error("Image encoding failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("Invalid entry: {0}")]
    InvalidEntry(String),
}

impl TrackerError {
    /// Whether the error was caused by bad input rather than by the server.
    pub fn is_client_error(&self) -> bool {
        matches!(self, TrackerError::InvalidEntry(_))
    }
}

pub type Result<T> = std::result::Result<T, TrackerError>;
