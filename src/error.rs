use thiserror::Error;

/// Coarse classification of every failure the engine can report.
///
/// None of these are fatal: each one means "the operation had no effect".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input to a mutation (duplicate name, invalid price, unbalanced split).
    Validation,
    /// Unknown person, item index or history entry.
    NotFound,
    /// The extraction gateway failed or returned an unusable payload.
    Extraction,
    /// The session store could not be read or written.
    Storage,
}

#[derive(Error, Debug)]
pub enum BillsplitError {
    #[error("Person name must not be empty")]
    EmptyPersonName,

    #[error("A person named '{0}' is already on this bill")]
    DuplicateName(String),

    #[error("Item name must not be empty")]
    EmptyItemName,

    #[error("Invalid price: {0}")]
    InvalidPrice(String),

    #[error("Invalid percentage for {name}: {value} (must be between 0 and 100)")]
    InvalidPercentage { name: String, value: f64 },

    #[error("'{0}' appears more than once in the split")]
    DuplicateSplitEntry(String),

    #[error("Percentages must add up to 100% (got {total}%)")]
    SplitNotBalanced { total: f64 },

    #[error("Item index {index} out of range (bill has {len} items)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Person not found: {0}")]
    PersonNotFound(String),

    #[error("History entry {index} not found (history has {len} entries)")]
    HistoryEntryNotFound { index: usize, len: usize },

    #[error("Extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(#[from] serde_yaml::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl BillsplitError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BillsplitError::EmptyPersonName
            | BillsplitError::DuplicateName(_)
            | BillsplitError::EmptyItemName
            | BillsplitError::InvalidPrice(_)
            | BillsplitError::InvalidPercentage { .. }
            | BillsplitError::DuplicateSplitEntry(_)
            | BillsplitError::SplitNotBalanced { .. } => ErrorKind::Validation,
            BillsplitError::IndexOutOfRange { .. }
            | BillsplitError::PersonNotFound(_)
            | BillsplitError::HistoryEntryNotFound { .. } => ErrorKind::NotFound,
            BillsplitError::Extraction(_) => ErrorKind::Extraction,
            BillsplitError::Storage(_)
            | BillsplitError::Io(_)
            | BillsplitError::Json(_)
            | BillsplitError::Config(_)
            | BillsplitError::Sqlite(_) => ErrorKind::Storage,
        }
    }
}

/// Failures talking to, or interpreting the answer of, the extraction gateway.
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("OPENAI_API_KEY is not set")]
    MissingApiKey,

    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("Could not read document: {0}")]
    Document(String),

    #[error("Request to extraction service failed: {0}")]
    Transport(String),

    #[error("Extraction service returned HTTP {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("Extraction service returned no content")]
    EmptyResponse,

    #[error("Response is not valid JSON: {0}")]
    NotJson(String),

    #[error("Response has the wrong shape: {0}")]
    InvalidShape(String),
}

impl From<reqwest::Error> for ExtractionError {
    fn from(err: reqwest::Error) -> Self {
        ExtractionError::Transport(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BillsplitError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_kinds() {
        assert_eq!(
            BillsplitError::DuplicateName("Alice".to_string()).kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            BillsplitError::SplitNotBalanced { total: 99.0 }.kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            BillsplitError::InvalidPrice("abc".to_string()).kind(),
            ErrorKind::Validation
        );
    }

    #[test]
    fn test_not_found_kinds() {
        assert_eq!(
            BillsplitError::IndexOutOfRange { index: 3, len: 2 }.kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            BillsplitError::PersonNotFound("Bob".to_string()).kind(),
            ErrorKind::NotFound
        );
    }

    #[test]
    fn test_extraction_error_wraps() {
        let err: BillsplitError = ExtractionError::EmptyResponse.into();
        assert_eq!(err.kind(), ErrorKind::Extraction);
        assert!(err.to_string().contains("no content"));
    }

    #[test]
    fn test_unbalanced_message_mentions_total() {
        let err = BillsplitError::SplitNotBalanced { total: 99.0 };
        assert!(err.to_string().contains("99"));
        assert!(err.to_string().contains("100%"));
    }
}
