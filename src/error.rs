use thiserror::Error;

#[derive(Error, Debug)]
pub enum EstateError {
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Prompt error: {0}")]
    Prompt(#[from] dialoguer::Error),

    #[error("Parse error on line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Import blocked: {0} row error(s) must be fixed first")]
    ImportBlocked(usize),

    #[error("Edited rows have not been re-validated")]
    UnvalidatedEdits,

    #[error("Cannot {action} while {stage}")]
    InvalidStage { action: &'static str, stage: String },

    #[error("Row {0} is out of range")]
    RowOutOfRange(usize),

    #[error("Unknown import kind: {0}")]
    UnknownKind(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, EstateError>;
