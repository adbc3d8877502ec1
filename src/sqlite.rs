use rusqlite::types::{ToSqlOutput, Value as SqlValue, ValueRef};
use rusqlite::{Connection, DatabaseName, Statement, ToSql};
use serde::de::{self, MapAccess, SeqAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::io::Write;

use crate::config::SessionConfig;
use crate::error::{Error, Result};

/// Core value types for SQLite operations
///
/// Serialized as plain JSON scalars: null, number, string, byte array.
/// Non-finite reals have no JSON number form and are written as
/// `{"real": "Infinity" | "-Infinity" | "NaN"}`. Booleans deserialize as
/// integers 0 and 1.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Real(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

const REAL_KEY: &str = "real";

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Integer(i) => serializer.serialize_i64(*i),
            Value::Real(f) if f.is_finite() => serializer.serialize_f64(*f),
            Value::Real(f) => {
                let text = if f.is_nan() {
                    "NaN"
                } else if *f > 0.0 {
                    "Infinity"
                } else {
                    "-Infinity"
                };
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(REAL_KEY, text)?;
                map.end()
            }
            Value::Text(s) => serializer.serialize_str(s),
            Value::Blob(b) => b.serialize(serializer),
        }
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("null, a boolean, a number, a string, a byte array or a {\"real\": ...} object")
    }

    fn visit_unit<E: de::Error>(self) -> std::result::Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_none<E: de::Error>(self) -> std::result::Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> std::result::Result<Value, E> {
        Ok(Value::from(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<Value, E> {
        Ok(Value::Integer(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<Value, E> {
        i64::try_from(v)
            .map(Value::Integer)
            .map_err(|_| E::custom(format!("integer {v} is out of range")))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<Value, E> {
        Ok(Value::Real(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Value, E> {
        Ok(Value::Text(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> std::result::Result<Value, E> {
        Ok(Value::Text(v))
    }

    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> std::result::Result<Value, E> {
        Ok(Value::Blob(v.to_vec()))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<Value, A::Error> {
        let mut bytes = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(byte) = seq.next_element::<u8>()? {
            bytes.push(byte);
        }
        Ok(Value::Blob(bytes))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Value, A::Error> {
        let real = match map.next_entry::<String, String>()? {
            Some((key, text)) if key == REAL_KEY => match text.as_str() {
                "Infinity" => f64::INFINITY,
                "-Infinity" => f64::NEG_INFINITY,
                "NaN" => f64::NAN,
                other => return Err(de::Error::custom(format!("invalid real: {other}"))),
            },
            _ => return Err(de::Error::custom("expected a single \"real\" entry")),
        };
        if map.next_key::<String>()?.is_some() {
            return Err(de::Error::custom("expected a single \"real\" entry"));
        }
        Ok(Value::Real(real))
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v.into())
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Integer(v.into())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl From<ValueRef<'_>> for Value {
    fn from(v: ValueRef<'_>) -> Self {
        match v {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) => Value::Integer(i),
            ValueRef::Real(f) => Value::Real(f),
            ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => Value::Blob(b.to_vec()),
        }
    }
}

impl From<SqlValue> for Value {
    fn from(v: SqlValue) -> Self {
        match v {
            SqlValue::Null => Value::Null,
            SqlValue::Integer(i) => Value::Integer(i),
            SqlValue::Real(f) => Value::Real(f),
            SqlValue::Text(s) => Value::Text(s),
            SqlValue::Blob(b) => Value::Blob(b),
        }
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            Value::Integer(i) => ToSqlOutput::Borrowed(ValueRef::Integer(*i)),
            Value::Real(f) => ToSqlOutput::Borrowed(ValueRef::Real(*f)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
        })
    }
}

/// Parameter bindings for SQL queries
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Params {
    pub values: HashMap<String, Value>,
}

impl Params {
    /// Create a new Params object
    pub fn new() -> Self {
        Self::default()
    }
    /// Add a named value
    pub fn with_value(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.values.insert(name.to_string(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Bind every value to its placeholder in `stmt`.
    ///
    /// Bare names are looked up as `:name`; names that already carry a
    /// `:`, `@` or `$` prefix are used as written.
    pub(crate) fn bind(&self, stmt: &mut Statement<'_>) -> Result<()> {
        for (name, value) in &self.values {
            let placeholder = if name.starts_with(|c: char| matches!(c, ':' | '@' | '$')) {
                name.clone()
            } else {
                format!(":{name}")
            };
            let index = stmt
                .parameter_index(&placeholder)?
                .ok_or_else(|| Error::InvalidParameter { name: name.clone() })?;
            stmt.raw_bind_parameter(index, value)?;
        }
        Ok(())
    }
}

/// SQL Query with typed parameters
#[derive(Debug, Clone, PartialEq)]
pub struct SqlQuery {
    pub statement: String,
    pub params: Params,
}

impl SqlQuery {
    pub fn new(statement: &str) -> Self {
        Self {
            statement: statement.to_string(),
            params: Params::new(),
        }
    }
    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }
}

/// Open a fresh in-memory engine configured per `config`.
///
/// The image (if any) is restored first, then the foreign-key pragma is
/// applied and the init script runs against the restored contents.
pub fn open_connection(config: &SessionConfig) -> Result<Connection> {
    let mut conn = Connection::open_in_memory()?;
    if let Some(image) = &config.image {
        restore_image(&mut conn, image)?;
    }
    conn.pragma_update(None, "foreign_keys", config.foreign_keys)?;
    if let Some(script) = &config.init_script {
        conn.execute_batch(script)?;
    }
    Ok(conn)
}

/// Copy a serialized database file into `conn`. The temporary copy is
/// removed as soon as the restore completes.
fn restore_image(conn: &mut Connection, image: &[u8]) -> Result<()> {
    let mut file = tempfile::NamedTempFile::new()?;
    file.write_all(image)?;
    file.flush()?;
    conn.restore(DatabaseName::Main, file.path(), None::<fn(rusqlite::backup::Progress)>)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_conversions() {
        assert_eq!(Value::from(3), Value::Integer(3));
        assert_eq!(Value::from(true), Value::Integer(1));
        assert_eq!(Value::from("a"), Value::Text("a".into()));
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some(2.5)), Value::Real(2.5));
        assert_eq!(Value::from(ValueRef::Text(b"hi")), Value::Text("hi".into()));
    }

    #[test]
    fn test_value_json_scalars() {
        let values = vec![
            Value::Null,
            Value::Integer(1),
            Value::Real(1.5),
            Value::Text("x".into()),
            Value::Blob(vec![1, 2]),
        ];
        let json = serde_json::to_string(&values).unwrap();
        assert_eq!(json, r#"[null,1,1.5,"x",[1,2]]"#);

        let back: Vec<Value> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, values);
        assert!(back[0].is_null());
        assert_eq!(back[1].as_i64(), Some(1));
        assert_eq!(back[3].as_str(), Some("x"));
    }

    #[test]
    fn test_non_finite_reals_keep_their_kind() {
        let values = vec![
            Value::Real(f64::INFINITY),
            Value::Real(f64::NEG_INFINITY),
            Value::Null,
        ];
        let json = serde_json::to_string(&values).unwrap();
        assert_eq!(json, r#"[{"real":"Infinity"},{"real":"-Infinity"},null]"#);

        let back: Vec<Value> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, values);

        let nan: Value = serde_json::from_str(r#"{"real":"NaN"}"#).unwrap();
        assert!(nan.as_f64().is_some_and(f64::is_nan));
    }

    #[test]
    fn test_json_booleans_are_integers() {
        let values: Vec<Value> = serde_json::from_str("[true, false]").unwrap();
        assert_eq!(values, vec![Value::Integer(1), Value::Integer(0)]);
    }

    #[test]
    fn test_rejected_json_values() {
        assert!(serde_json::from_str::<Value>(r#"{"x": 1}"#).is_err());
        assert!(serde_json::from_str::<Value>(r#"{"real": "big"}"#).is_err());
        assert!(serde_json::from_str::<Value>("[256]").is_err());
        assert!(serde_json::from_str::<Value>("18446744073709551615").is_err());
    }

    #[test]
    fn test_params_bind_prefixed_and_bare_names() {
        let conn = Connection::open_in_memory().unwrap();
        let mut stmt = conn.prepare("SELECT :a + @b").unwrap();
        Params::new()
            .with_value("a", 2)
            .with_value("@b", 3)
            .bind(&mut stmt)
            .unwrap();
        let mut rows = stmt.raw_query();
        let row = rows.next().unwrap().unwrap();
        assert_eq!(row.get::<_, i64>(0).unwrap(), 5);
    }

    #[test]
    fn test_params_unknown_name() {
        let conn = Connection::open_in_memory().unwrap();
        let mut stmt = conn.prepare("SELECT :a").unwrap();
        let err = Params::new()
            .with_value("missing", 1)
            .bind(&mut stmt)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { name } if name == "missing"));
    }

    #[test]
    fn test_open_connection_applies_config() {
        let config = SessionConfig::new()
            .with_foreign_keys(true)
            .with_init_script("CREATE TABLE seed(x); INSERT INTO seed VALUES (42);");
        let conn = open_connection(&config).unwrap();

        let fk: i64 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(fk, 1);
        let x: i64 = conn
            .query_row("SELECT x FROM seed", [], |row| row.get(0))
            .unwrap();
        assert_eq!(x, 42);
    }

    #[test]
    fn test_open_connection_rejects_garbage_image() {
        let config = SessionConfig::new().with_image(vec![0xAB; 4096]);
        let err = open_connection(&config).unwrap_err();
        assert_eq!(err.kind(), "Engine");
    }
}
