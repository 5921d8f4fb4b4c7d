use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("object not found: {key}")]
    NotFound { key: String },

    #[error("storage error for {key}: {message}")]
    Storage { key: String, message: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid table: {0}")]
    InvalidTable(String),

    #[error("no grouping column present, expected one of {expected:?}")]
    NoGroupColumns { expected: Vec<String> },

    #[error("invalid season {0:?}, expected YYYY-YY")]
    InvalidSeason(String),
}

impl Error {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    pub(crate) fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}
