use std::fmt::{self, Debug, Display};
use std::io;

/// Provides `EpinetError` and maps other errors into it.
///
/// `InvalidParameter` is raised at construction time only; `InvalidState`
/// marks a scheduler invariant violation and should be unreachable under
/// correct usage; `WorkerFailure` carries enough context to identify the
/// one (parameter point, repetition) pair that failed.
#[derive(Debug)]
pub enum EpinetError {
    IoError(io::Error),
    CsvError(csv::Error),
    JsonError(serde_json::Error),
    InvalidParameter(String),
    InvalidState(String),
    WorkerFailure {
        point_index: usize,
        repetition: usize,
        message: String,
    },
    ReportError(String),
}

impl From<io::Error> for EpinetError {
    fn from(error: io::Error) -> Self {
        EpinetError::IoError(error)
    }
}

impl From<csv::Error> for EpinetError {
    fn from(error: csv::Error) -> Self {
        EpinetError::CsvError(error)
    }
}

impl From<serde_json::Error> for EpinetError {
    fn from(error: serde_json::Error) -> Self {
        EpinetError::JsonError(error)
    }
}

impl std::error::Error for EpinetError {}

impl Display for EpinetError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EpinetError::IoError(e) => write!(f, "IO error: {e}"),
            EpinetError::CsvError(e) => write!(f, "CSV error: {e}"),
            EpinetError::JsonError(e) => write!(f, "JSON error: {e}"),
            EpinetError::InvalidParameter(msg) => write!(f, "invalid parameter: {msg}"),
            EpinetError::InvalidState(msg) => write!(f, "invalid state: {msg}"),
            EpinetError::WorkerFailure {
                point_index,
                repetition,
                message,
            } => write!(
                f,
                "worker failure at point {point_index}, repetition {repetition}: {message}"
            ),
            EpinetError::ReportError(msg) => write!(f, "report error: {msg}"),
        }
    }
}
