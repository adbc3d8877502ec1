//! Error types for the SQLite facade.
//!
//! Every public operation returns `Result<T, Error>`. Engine failures keep
//! the engine's own result code and message so callers can tell a syntax
//! error from a constraint violation.

use thiserror::Error;

use crate::registry::SessionId;

/// Result code used for engine-side failures that did not carry a SQLite code.
pub const NO_ENGINE_CODE: i32 = -1;

#[derive(Error, Debug)]
pub enum Error {
    /// `open` on an id that is already bound to a live session.
    #[error("session {id} already exists")]
    AlreadyExists { id: SessionId },

    /// Operation on an id that was never opened or has been closed.
    #[error("no such session: {id}")]
    NoSuchSession { id: SessionId },

    /// The SQL engine reported a failure.
    #[error("engine error {code}: {message}")]
    Engine { code: i32, message: String },

    /// A named parameter does not appear in the statement.
    #[error("invalid parameter name: {name}")]
    InvalidParameter { name: String },

    /// Malformed host message.
    #[error("protocol error: {message}")]
    Protocol { message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The worker thread owning the session has stopped.
    #[error("worker is no longer running")]
    WorkerGone,
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    pub fn engine(message: impl Into<String>) -> Self {
        Self::Engine {
            code: NO_ENGINE_CODE,
            message: message.into(),
        }
    }

    /// Stable name of the error category, used on the host boundary.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AlreadyExists { .. } => "AlreadyExists",
            Self::NoSuchSession { .. } => "NoSuchSession",
            Self::Engine { .. } => "Engine",
            Self::InvalidParameter { .. } => "InvalidParameter",
            Self::Protocol { .. } => "Protocol",
            Self::Json(_) => "Json",
            Self::Io(_) => "Io",
            Self::WorkerGone => "WorkerGone",
        }
    }

    /// The engine's result code, if this is an engine failure.
    pub fn engine_code(&self) -> Option<i32> {
        match self {
            Self::Engine { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Name of the engine's primary result code (e.g. `ConstraintViolation`).
    pub fn engine_category(&self) -> Option<String> {
        match self {
            Self::Engine { code, .. } if *code != NO_ENGINE_CODE => {
                Some(format!("{:?}", rusqlite::ffi::Error::new(*code).code))
            }
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        match &e {
            rusqlite::Error::SqliteFailure(err, _) => Self::Engine {
                code: err.extended_code,
                message: e.to_string(),
            },
            rusqlite::Error::InvalidParameterName(name) => Self::InvalidParameter {
                name: name.clone(),
            },
            _ => Self::engine(e.to_string()),
        }
    }
}
