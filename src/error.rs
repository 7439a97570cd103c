use rmcp::model::ErrorCode;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// AnkiConnect could not be reached or refused to hand over the collection.
    #[error("{0}")]
    Connection(String),

    #[error("AnkiConnect request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The `error` field of an AnkiConnect reply was set.
    #[error("AnkiConnect action '{action}' failed: {message}")]
    AnkiConnect { action: String, message: String },

    #[error("AnkiConnect action '{0}' returned no result")]
    MissingResult(String),

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("invalid params: {0}")]
    InvalidParams(String),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Failed to access stdio: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<Error> for rmcp::ErrorData {
    fn from(err: Error) -> Self {
        match err {
            Error::ResourceNotFound(uri) => rmcp::ErrorData::new(
                ErrorCode::RESOURCE_NOT_FOUND,
                format!("Resource not found: {uri}"),
                None,
            ),
            Error::ToolNotFound(name) => rmcp::ErrorData::new(
                ErrorCode::INVALID_PARAMS,
                format!("Tool not found: {name}"),
                None,
            ),
            Error::InvalidParams(msg) => {
                rmcp::ErrorData::new(ErrorCode::INVALID_PARAMS, format!("invalid params: {msg}"), None)
            }
            _ => rmcp::ErrorData::new(
                ErrorCode::INTERNAL_ERROR,
                format!("internal error: {err}"),
                None,
            ),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
