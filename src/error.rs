use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("not found")]
    NotFound,

    #[error("already exists")]
    AlreadyExists,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("customer token missing")]
    Unauthenticated,

    #[error("customer token not recognized")]
    Unauthorized,

    #[error("script name already reserved")]
    NameReserved,

    #[error("registry rejected request with status {status}")]
    UpstreamValidation {
        status: u16,
        body: serde_json::Value,
    },

    #[error("script not found")]
    ScriptNotFound,

    #[error("dependency unavailable: {0}")]
    DependencyUnavailable(String),
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Error::DependencyUnavailable(format!("request timed out: {e}"))
        } else {
            Error::DependencyUnavailable(e.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
