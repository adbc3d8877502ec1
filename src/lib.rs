//! Session-scoped in-memory SQLite for embedding hosts.
//!
//! # Intention
//!
//! - Give each caller-chosen session id its own isolated in-memory database.
//! - Return query output as structured [`ResultSet`]s and failures as
//!   structured [`Error`]s, never as console output.
//! - Offer the same surface as JSON messages ([`host`]) and as async
//!   per-session proxies running on a worker thread ([`worker`]).
//!
//! # Architectural Boundaries
//!
//! - SQLite itself is an external collaborator; nothing here plans or stores.
//! - No file persistence and no network access. A session can be seeded from
//!   a database image, but nothing is written back.
//! - A [`Facade`] is single-threaded; callers serialize access per session.

pub mod config;
pub mod error;
pub mod facade;
pub mod host;
pub mod registry;
pub mod result;
pub mod sqlite;
pub mod worker;

pub use config::SessionConfig;
pub use error::{Error, Result};
pub use facade::Facade;
pub use host::{Host, Response};
pub use registry::{Registry, Session, SessionId};
pub use result::{Collector, ResultSet};
pub use sqlite::{Params, SqlQuery, Value};
pub use worker::{ConnectionProxy, SqlExecutor, Worker};
