//! Execution facade: resolves a session and runs SQL text against it.
//!
//! Results are collected into [`ResultSet`]s and returned; nothing is
//! printed. A failing statement discards everything collected so far, and
//! the session stays open for further calls.

use rusqlite::{Batch, Connection, Statement};
use tracing::debug;

use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::registry::{Registry, SessionId};
use crate::result::{Collector, ResultSet};
use crate::sqlite::{SqlQuery, Value};

#[derive(Debug, Default)]
pub struct Facade {
    registry: Registry,
}

impl Facade {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open `id` with the default configuration.
    pub fn open(&mut self, id: SessionId) -> Result<()> {
        self.registry.open(id, SessionConfig::default())
    }

    pub fn open_with(&mut self, id: SessionId, config: SessionConfig) -> Result<()> {
        self.registry.open(id, config)
    }

    pub fn close(&mut self, id: SessionId) -> Result<()> {
        self.registry.close(id)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Run every statement in `sql` and return the result of the last one
    /// that had a result shape. Statements without one (DDL, DML) leave it
    /// untouched; if none had a shape the result is empty.
    pub fn execute(&self, id: SessionId, sql: &str) -> Result<ResultSet> {
        let conn = self.connection(id)?;
        debug!(session = id, sql, "execute");
        let mut last = None;
        run_batch(conn, sql, |result| last = Some(result))?;
        Ok(last.unwrap_or_default())
    }

    /// Run every statement in `sql` and return one result per statement
    /// that had a result shape, in order.
    pub fn execute_all(&self, id: SessionId, sql: &str) -> Result<Vec<ResultSet>> {
        let conn = self.connection(id)?;
        debug!(session = id, sql, "execute_all");
        let mut results = Vec::new();
        run_batch(conn, sql, |result| results.push(result))?;
        Ok(results)
    }

    /// Run exactly one statement with named parameters bound.
    pub fn query(&self, id: SessionId, query: &SqlQuery) -> Result<ResultSet> {
        let conn = self.connection(id)?;
        debug!(session = id, sql = %query.statement, "query");
        let mut batch = Batch::new(conn, &query.statement);
        let mut stmt = batch
            .next()?
            .ok_or_else(|| Error::engine("query contains no statement"))?;
        if batch.next()?.is_some() {
            return Err(Error::engine("query must contain exactly one statement"));
        }
        if !query.params.is_empty() {
            query.params.bind(&mut stmt)?;
        }
        Ok(run_statement(&mut stmt)?.unwrap_or_default())
    }

    /// Rows changed by the most recent INSERT, UPDATE or DELETE on `id`.
    pub fn changes(&self, id: SessionId) -> Result<u64> {
        Ok(self.connection(id)?.changes() as u64)
    }

    pub fn last_insert_rowid(&self, id: SessionId) -> Result<i64> {
        Ok(self.connection(id)?.last_insert_rowid())
    }

    fn connection(&self, id: SessionId) -> Result<&Connection> {
        Ok(self.registry.get(id)?.connection())
    }
}

fn run_batch(conn: &Connection, sql: &str, mut on_result: impl FnMut(ResultSet)) -> Result<()> {
    let mut batch = Batch::new(conn, sql);
    while let Some(mut stmt) = batch.next()? {
        if let Some(result) = run_statement(&mut stmt)? {
            on_result(result);
        }
    }
    Ok(())
}

/// Step `stmt` to completion. Returns `None` for statements with no result
/// shape. Unbound parameters are NULL.
fn run_statement(stmt: &mut Statement<'_>) -> Result<Option<ResultSet>> {
    let columns: Vec<String> = stmt
        .column_names()
        .into_iter()
        .map(String::from)
        .collect();
    let mut collector = Collector::new();
    if !columns.is_empty() {
        collector.on_shape(&columns);
    }

    let mut rows = stmt.raw_query();
    while let Some(row) = rows.next()? {
        let values = (0..columns.len())
            .map(|i| row.get_ref(i).map(Value::from))
            .collect::<rusqlite::Result<Vec<_>>>()?;
        collector.on_row(&columns, values);
    }

    Ok((!columns.is_empty()).then(|| collector.finish()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::Params;

    fn open_facade(id: SessionId) -> Facade {
        let mut facade = Facade::new();
        facade.open(id).unwrap();
        facade
    }

    #[test]
    fn test_ddl_only_yields_empty_result() {
        let facade = open_facade(1);
        let result = facade.execute(1, "CREATE TABLE t(x INTEGER);").unwrap();
        assert!(result.columns.is_empty());
        assert!(result.rows.is_empty());
    }

    #[test]
    fn test_last_shaped_statement_wins() {
        let facade = open_facade(1);
        let result = facade
            .execute(1, "SELECT 1 AS a; SELECT 2 AS b; CREATE TABLE t(x);")
            .unwrap();
        assert_eq!(result.columns, vec!["b"]);
        assert_eq!(result.rows, vec![vec![Value::Integer(2)]]);
    }

    #[test]
    fn test_execute_all_keeps_each_result() {
        let facade = open_facade(1);
        let results = facade
            .execute_all(1, "SELECT 1 AS a; CREATE TABLE t(x); SELECT 'z' AS b WHERE 0;")
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].columns, vec!["a"]);
        assert_eq!(results[1].columns, vec!["b"]);
        assert!(results[1].is_empty());
    }

    #[test]
    fn test_value_kinds() {
        let facade = open_facade(1);
        let result = facade
            .execute(1, "SELECT NULL, 7, 2.5, 'txt', x'0102';")
            .unwrap();
        assert_eq!(
            result.rows[0],
            vec![
                Value::Null,
                Value::Integer(7),
                Value::Real(2.5),
                Value::Text("txt".into()),
                Value::Blob(vec![1, 2]),
            ]
        );
    }

    #[test]
    fn test_unbound_parameter_is_null() {
        let facade = open_facade(1);
        let result = facade.execute(1, "SELECT ? IS NULL AS unbound;").unwrap();
        assert_eq!(result.rows, vec![vec![Value::Integer(1)]]);
    }

    #[test]
    fn test_failure_discards_partial_rows() {
        let facade = open_facade(1);
        let err = facade
            .execute(1, "SELECT 1; SELECT * FROM missing_table;")
            .unwrap_err();
        match err {
            Error::Engine { message, .. } => assert!(message.contains("missing_table")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_query_with_params() {
        let facade = open_facade(1);
        facade
            .execute(
                1,
                "CREATE TABLE users(name TEXT, age INTEGER);
                 INSERT INTO users VALUES ('ann', 30), ('bob', 40);",
            )
            .unwrap();
        let query = SqlQuery::new("SELECT name FROM users WHERE age > :age")
            .with_params(Params::new().with_value("age", 35));
        let result = facade.query(1, &query).unwrap();
        assert_eq!(result.rows, vec![vec![Value::from("bob")]]);
    }

    #[test]
    fn test_query_rejects_multiple_statements() {
        let facade = open_facade(1);
        let err = facade
            .query(1, &SqlQuery::new("SELECT 1; SELECT 2;"))
            .unwrap_err();
        assert_eq!(err.engine_code(), Some(crate::error::NO_ENGINE_CODE));
    }

    #[test]
    fn test_counters() {
        let facade = open_facade(1);
        facade
            .execute(1, "CREATE TABLE t(x); INSERT INTO t VALUES (1), (2), (3);")
            .unwrap();
        assert_eq!(facade.changes(1).unwrap(), 3);
        assert_eq!(facade.last_insert_rowid(1).unwrap(), 3);
    }

    #[test]
    fn test_unknown_session() {
        let facade = Facade::new();
        assert!(matches!(
            facade.execute(5, "SELECT 1").unwrap_err(),
            Error::NoSuchSession { id: 5 }
        ));
        assert!(matches!(
            facade.changes(5).unwrap_err(),
            Error::NoSuchSession { id: 5 }
        ));
    }
}
