use crate::types::CustomerId;
use plotters::drawing::DrawingAreaErrorKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeskError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{file}: missing required column '{column}'")]
    MissingColumn { file: String, column: String },

    #[error("{file}:{line}: invalid value '{value}' in column '{column}'")]
    InvalidField {
        file: String,
        line: u64,
        column: String,
        value: String,
    },

    #[error("{file}: customer {id} appears more than once")]
    DuplicateCustomer { file: String, id: CustomerId },

    #[error("Customer {id} not found")]
    CustomerNotFound { id: CustomerId },

    #[error("Request to {url} timed out after {after:?}")]
    Timeout {
        url: String,
        after: std::time::Duration,
    },

    #[error("Request to {url} failed: {message}")]
    Network { url: String, message: String },

    #[error("Request to {url} returned HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("Malformed response from {url}: {message}")]
    MalformedResponse { url: String, message: String },

    #[error("Explanation artifact misaligned: {reason}")]
    ArtifactMisaligned { reason: String },

    #[error("Invalid model: {0}")]
    InvalidModel(String),

    #[error("Feature mismatch: {0}")]
    FeatureMismatch(String),

    #[error("Chart rendering failed: {0}")]
    Chart(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DeskError {
    /// Failures worth another attempt: the request never produced an answer.
    pub fn is_transient(&self) -> bool {
        matches!(self, DeskError::Timeout { .. } | DeskError::Network { .. })
    }
}

impl<E> From<DrawingAreaErrorKind<E>> for DeskError
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(e: DrawingAreaErrorKind<E>) -> Self {
        DeskError::Chart(e.to_string())
    }
}

pub type DeskResult<T> = Result<T, DeskError>;
