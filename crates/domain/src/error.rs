/// Shared error type used across all station-control-plane crates.
///
/// Each wire-level handler maps this to the reply policy described in the
/// control-plane error handling design: some variants are returned to the
/// caller verbatim, `Engine`/`Store` are logged with context and collapsed
/// to a generic message for HTTP callers (wire callers still see the raw
/// string, for historical-behavior compatibility).
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("station name \"{0}\" is invalid")]
    InvalidName(String),

    #[error("station {0} already exists")]
    NameExists(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("validation failed: {0}")]
    ValidationFailure(String),

    #[error("stream not found: {0}")]
    StreamMissing(String),

    #[error("engine error: {0}")]
    Engine(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("schema {0} not found")]
    SchemaMissing(String),

    #[error("upgrade your SDK: required headers are missing")]
    HeadersMissing,

    #[error("unauthorized: no actor on this request")]
    Unauthorized,

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// True when this variant's message is safe to return verbatim to a
    /// wire/HTTP caller. `Engine`/`Store` carry internal detail and are
    /// collapsed by HTTP callers (the raw NATS reply still sees the string).
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Error::InvalidName(_)
                | Error::NameExists(_)
                | Error::NotFound(_)
                | Error::ValidationFailure(_)
                | Error::SchemaMissing(_)
                | Error::HeadersMissing
                | Error::Unauthorized
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
