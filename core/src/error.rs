use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Schema drift in '{dataset}': missing {missing:?}, unexpected {unexpected:?}")]
    SchemaDrift {
        dataset:    String,
        missing:    Vec<String>,
        unexpected: Vec<String>,
    },

    #[error("Column '{column}' in '{dataset}' has no values to impute from")]
    EmptyColumn { dataset: String, column: String },

    #[error("Key '{key}' appears {count} times in '{dataset}'")]
    JoinKeyCollision {
        dataset: String,
        key:     String,
        count:   usize,
    },

    #[error("Column '{column}' not found in '{table}'")]
    UnknownColumn { table: String, column: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type PipelineResult<T> = Result<T, PipelineError>;
