//! Dedicated worker thread owning a [`Facade`], with async per-session
//! proxies.
//!
//! Requests sent to one worker run one after another on its thread, so a
//! proxy never needs its own lock. Separate workers share nothing.

use async_trait::async_trait;
use futures::channel::oneshot;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::mpsc;
use std::thread;
use tracing::debug;

use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::facade::Facade;
use crate::registry::SessionId;
use crate::result::ResultSet;
use crate::sqlite::SqlQuery;

/// Async execution surface of a session.
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    /// Run `sql` and return the last shaped result.
    async fn exec(&self, sql: &str) -> Result<ResultSet>;

    /// Run `sql` and return every shaped result.
    async fn exec_all(&self, sql: &str) -> Result<Vec<ResultSet>>;

    async fn query(&self, query: SqlQuery) -> Result<ResultSet>;
}

enum Command {
    Open {
        id: SessionId,
        config: SessionConfig,
        reply: oneshot::Sender<Result<()>>,
    },
    Exec {
        id: SessionId,
        sql: String,
        reply: oneshot::Sender<Result<ResultSet>>,
    },
    ExecAll {
        id: SessionId,
        sql: String,
        reply: oneshot::Sender<Result<Vec<ResultSet>>>,
    },
    Query {
        id: SessionId,
        query: SqlQuery,
        reply: oneshot::Sender<Result<ResultSet>>,
    },
    Close {
        id: SessionId,
        reply: Option<oneshot::Sender<Result<()>>>,
    },
    SessionCount {
        reply: oneshot::Sender<Result<usize>>,
    },
    Shutdown {
        reply: oneshot::Sender<Result<()>>,
    },
}

fn run(commands: mpsc::Receiver<Command>) {
    let mut facade = Facade::new();
    // Replies go to callers that may have given up waiting; ignore send failures.
    for command in commands {
        match command {
            Command::Open { id, config, reply } => {
                let _ = reply.send(facade.open_with(id, config));
            }
            Command::Exec { id, sql, reply } => {
                let _ = reply.send(facade.execute(id, &sql));
            }
            Command::ExecAll { id, sql, reply } => {
                let _ = reply.send(facade.execute_all(id, &sql));
            }
            Command::Query { id, query, reply } => {
                let _ = reply.send(facade.query(id, &query));
            }
            Command::Close { id, reply } => {
                let result = facade.close(id);
                if let Some(reply) = reply {
                    let _ = reply.send(result);
                }
            }
            Command::SessionCount { reply } => {
                let _ = reply.send(Ok(facade.registry().len()));
            }
            Command::Shutdown { reply } => {
                debug!(open_sessions = facade.registry().len(), "worker shutting down");
                let _ = reply.send(Ok(()));
                return;
            }
        }
    }
    debug!(open_sessions = facade.registry().len(), "worker stopped");
}

/// Handle to a worker thread. The thread exits on [`Worker::shutdown`] or
/// once the worker and every proxy created from it have been dropped.
pub struct Worker {
    commands: mpsc::Sender<Command>,
    next_id: AtomicI64,
}

impl Worker {
    pub fn spawn() -> Result<Self> {
        let (commands, receiver) = mpsc::channel();
        thread::Builder::new()
            .name("sqlite-worker".to_string())
            .spawn(move || run(receiver))?;
        Ok(Self {
            commands,
            next_id: AtomicI64::new(1),
        })
    }

    /// Open a new session on the worker and return a proxy for it.
    pub async fn create_db(&self, config: SessionConfig) -> Result<ConnectionProxy> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        request(&self.commands, |reply| Command::Open { id, config, reply }).await?;
        Ok(ConnectionProxy {
            id,
            commands: self.commands.clone(),
            closed: false,
        })
    }

    /// Number of sessions currently open on the worker.
    pub async fn session_count(&self) -> Result<usize> {
        request(&self.commands, |reply| Command::SessionCount { reply }).await
    }

    /// Stop the worker thread, closing every session on it. Proxies that
    /// outlive the worker fail with [`Error::WorkerGone`].
    pub async fn shutdown(self) -> Result<()> {
        request(&self.commands, |reply| Command::Shutdown { reply }).await
    }
}

/// Async handle to one session living on a worker.
pub struct ConnectionProxy {
    id: SessionId,
    commands: mpsc::Sender<Command>,
    closed: bool,
}

impl ConnectionProxy {
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub async fn close(mut self) -> Result<()> {
        self.closed = true;
        let id = self.id;
        request(&self.commands, |reply| Command::Close {
            id,
            reply: Some(reply),
        })
        .await
    }
}

impl Drop for ConnectionProxy {
    fn drop(&mut self) {
        if !self.closed {
            let _ = self.commands.send(Command::Close {
                id: self.id,
                reply: None,
            });
        }
    }
}

#[async_trait]
impl SqlExecutor for ConnectionProxy {
    async fn exec(&self, sql: &str) -> Result<ResultSet> {
        let (id, sql) = (self.id, sql.to_string());
        request(&self.commands, |reply| Command::Exec { id, sql, reply }).await
    }

    async fn exec_all(&self, sql: &str) -> Result<Vec<ResultSet>> {
        let (id, sql) = (self.id, sql.to_string());
        request(&self.commands, |reply| Command::ExecAll { id, sql, reply }).await
    }

    async fn query(&self, query: SqlQuery) -> Result<ResultSet> {
        let id = self.id;
        request(&self.commands, |reply| Command::Query { id, query, reply }).await
    }
}

async fn request<T>(
    commands: &mpsc::Sender<Command>,
    build: impl FnOnce(oneshot::Sender<Result<T>>) -> Command,
) -> Result<T> {
    let (reply, response) = oneshot::channel();
    commands
        .send(build(reply))
        .map_err(|_| Error::WorkerGone)?;
    response.await.map_err(|_| Error::WorkerGone)?
}
