//! Message dispatch for an embedding host.
//!
//! A host posts `{ "name": ..., "args": [...] }` messages and gets back a
//! JSON response carrying either a result or a structured error. Engine
//! messages are always passed through to the caller.

use serde::Serialize;
use serde_json::Value as Json;

use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::facade::Facade;
use crate::registry::SessionId;
use crate::result::ResultSet;
use crate::sqlite::{Params, SqlQuery};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Reply {
    Done(bool),
    Rows(ResultSet),
    Batches(Vec<ResultSet>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorInfo {
    pub kind: &'static str,
    pub category: Option<String>,
    pub code: Option<i32>,
    pub message: String,
}

impl From<&Error> for ErrorInfo {
    fn from(e: &Error) -> Self {
        let message = match e {
            Error::Engine { message, .. } => message.clone(),
            other => other.to_string(),
        };
        Self {
            kind: e.kind(),
            category: e.engine_category(),
            code: e.engine_code(),
            message,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response {
    Ok { result: Reply },
    Error { error: ErrorInfo },
}

impl From<Result<Reply>> for Response {
    fn from(result: Result<Reply>) -> Self {
        match result {
            Ok(result) => Response::Ok { result },
            Err(e) => Response::Error {
                error: ErrorInfo::from(&e),
            },
        }
    }
}

#[derive(Debug, Default)]
pub struct Host {
    facade: Facade,
}

impl Host {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn facade(&self) -> &Facade {
        &self.facade
    }

    /// Parse a JSON message, dispatch it and serialize the response.
    pub fn handle_json(&mut self, message: &str) -> Result<String> {
        let response = match serde_json::from_str::<Json>(message) {
            Ok(message) => self.dispatch(&message),
            Err(e) => Response::from(Err(Error::from(e))),
        };
        Ok(serde_json::to_string(&response)?)
    }

    pub fn dispatch(&mut self, message: &Json) -> Response {
        self.try_dispatch(message).into()
    }

    fn try_dispatch(&mut self, message: &Json) -> Result<Reply> {
        let name = message
            .get("name")
            .and_then(Json::as_str)
            .ok_or_else(|| Error::protocol(format!("message should have name: {message}")))?;
        let args = message
            .get("args")
            .and_then(Json::as_array)
            .ok_or_else(|| Error::protocol(format!("message should have args: {message}")))?;

        match name {
            "open" => {
                let id = session_arg(args)?;
                let config = match args.get(1) {
                    None | Some(Json::Null) => SessionConfig::default(),
                    Some(options) => serde_json::from_value(options.clone())
                        .map_err(|e| Error::protocol(format!("invalid options: {e}")))?,
                };
                self.facade.open_with(id, config)?;
                Ok(Reply::Done(true))
            }
            "exec" => {
                let id = session_arg(args)?;
                let sql = sql_arg(args)?;
                Ok(Reply::Rows(self.facade.execute(id, sql)?))
            }
            "exec_all" => {
                let id = session_arg(args)?;
                let sql = sql_arg(args)?;
                Ok(Reply::Batches(self.facade.execute_all(id, sql)?))
            }
            "query" => {
                let id = session_arg(args)?;
                let sql = sql_arg(args)?;
                let params = match args.get(2) {
                    None | Some(Json::Null) => Params::new(),
                    Some(params) => serde_json::from_value(params.clone())
                        .map_err(|e| Error::protocol(format!("invalid params: {e}")))?,
                };
                let query = SqlQuery::new(sql).with_params(params);
                Ok(Reply::Rows(self.facade.query(id, &query)?))
            }
            "close" => {
                let id = session_arg(args)?;
                self.facade.close(id)?;
                Ok(Reply::Done(true))
            }
            other => Err(Error::protocol(format!("no method named {other}"))),
        }
    }
}

fn session_arg(args: &[Json]) -> Result<SessionId> {
    args.first()
        .and_then(Json::as_i64)
        .ok_or_else(|| Error::protocol("first argument must be an integer session id"))
}

fn sql_arg(args: &[Json]) -> Result<&str> {
    args.get(1)
        .and_then(Json::as_str)
        .ok_or_else(|| Error::protocol("second argument must be SQL text"))
}
