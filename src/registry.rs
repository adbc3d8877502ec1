//! Session registry: one owned engine connection per caller-chosen id.

use rusqlite::Connection;
use std::collections::HashMap;
use tracing::{info, warn};

use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::sqlite::open_connection;

/// Caller-chosen session identifier.
pub type SessionId = i64;

/// An open database bound to an id. Owns its connection exclusively.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    connection: Connection,
}

impl Session {
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }
}

#[derive(Debug, Default)]
pub struct Registry {
    sessions: HashMap<SessionId, Session>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new in-memory database and bind it to `id`.
    pub fn open(&mut self, id: SessionId, config: SessionConfig) -> Result<()> {
        if self.sessions.contains_key(&id) {
            return Err(Error::AlreadyExists { id });
        }
        let connection = open_connection(&config)?;
        self.sessions.insert(id, Session { id, connection });
        info!(session = id, "opened session");
        Ok(())
    }

    /// Release the database bound to `id`.
    pub fn close(&mut self, id: SessionId) -> Result<()> {
        let session = self
            .sessions
            .remove(&id)
            .ok_or(Error::NoSuchSession { id })?;
        if let Err((_, e)) = session.connection.close() {
            // The connection is dropped either way; report and move on.
            warn!(session = id, error = %e, "engine reported an error while closing");
        }
        info!(session = id, "closed session");
        Ok(())
    }

    pub fn get(&self, id: SessionId) -> Result<&Session> {
        self.sessions.get(&id).ok_or(Error::NoSuchSession { id })
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.sessions.contains_key(&id)
    }

    /// Live ids in ascending order.
    pub fn ids(&self) -> Vec<SessionId> {
        let mut ids: Vec<_> = self.sessions.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
