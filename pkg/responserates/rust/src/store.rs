// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Tabular query execution against the response-rate database.
//!
//! Handlers only see [`QueryExecutor`]. The production implementation is a
//! bounded r2d2 pool of read-only SQLite connections: `pool_size` connections
//! are kept open, up to `max_overflow` extra ones are opened under load and
//! closed once idle, callers wait at most `timeout` for a free connection, and
//! a connection older than `recycle` is replaced.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::{Connection, OpenFlags, ToSql, params_from_iter};
use serde::{Serialize, Serializer};
use time::Date;

use crate::dates::{format_date, parse_date};
use crate::errors::StoreError;

/// A bound query parameter. Request values only ever reach SQL through these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlValue {
    Text(String),
    Integer(i64),
}

impl ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            SqlValue::Text(text) => Ok(ToSqlOutput::from(text.as_str())),
            SqlValue::Integer(value) => Ok(ToSqlOutput::from(*value)),
        }
    }
}

/// Parameterized SQL text with `?` placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlQuery {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl SqlQuery {
    pub fn new(sql: impl Into<String>, params: Vec<SqlValue>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }
}

/// One scalar cell of a result row.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Date(Date),
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(value) => Some(*value as f64),
            Value::Real(value) if value.is_finite() => Some(*value),
            Value::Text(text) => text.trim().parse().ok(),
            _ => None,
        }
    }

    /// Integer view of ids stored as text (`"003"` is 3).
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(value) => Some(*value),
            Value::Real(value) if value.fract() == 0.0 => Some(*value as i64),
            Value::Text(text) => text.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<Date> {
        match self {
            Value::Date(date) => Some(*date),
            Value::Text(text) => parse_date(text),
            _ => None,
        }
    }

    /// Text form used by delimited output. NULL is an empty field.
    pub fn to_field(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Integer(value) => value.to_string(),
            Value::Real(value) => value.to_string(),
            Value::Text(text) => text.clone(),
            Value::Date(date) => format_date(*date),
        }
    }

    fn from_sql(value: ValueRef<'_>, is_date: bool) -> Self {
        match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(value) => Value::Integer(value),
            ValueRef::Real(value) => Value::Real(value),
            ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
                let text = String::from_utf8_lossy(bytes).into_owned();
                match is_date.then(|| parse_date(&text)).flatten() {
                    Some(date) => Value::Date(date),
                    None => Value::Text(text),
                }
            }
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Integer(value) => serializer.serialize_i64(*value),
            Value::Real(value) if value.is_finite() => serializer.serialize_f64(*value),
            Value::Real(_) => serializer.serialize_none(),
            Value::Text(text) => serializer.serialize_str(text),
            Value::Date(date) => serializer.serialize_str(&format_date(*date)),
        }
    }
}

/// Rows with named columns, in selection order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl ResultSet {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn execute(&self, query: &SqlQuery) -> Result<ResultSet, StoreError>;
}

#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub path: PathBuf,
    pub pool_size: usize,
    pub max_overflow: usize,
    pub timeout: Duration,
    /// Maximum connection lifetime. Zero keeps connections forever.
    pub recycle: Duration,
}

/// Idle connections are closed after this long; r2d2 then reopens up to `pool_size`.
const OVERFLOW_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

fn open_flags() -> OpenFlags {
    OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX | OpenFlags::SQLITE_OPEN_URI
}

fn to_u32(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

/// Read-only SQLite connections managed by r2d2.
pub struct SqlitePool {
    pool: Pool<SqliteConnectionManager>,
    timeout: Duration,
}

impl SqlitePool {
    /// Opens the pool, connecting once up front so a bad path fails at startup.
    pub fn open(settings: PoolSettings) -> Result<Self, StoreError> {
        Connection::open_with_flags(&settings.path, open_flags()).map_err(|source| {
            StoreError::Open {
                path: settings.path.clone(),
                source,
            }
        })?;

        let pool_size = settings.pool_size.max(1);
        let timeout = settings.timeout.max(Duration::from_millis(1));
        let manager = SqliteConnectionManager::file(&settings.path).with_flags(open_flags());
        let pool = Pool::builder()
            .max_size(to_u32(pool_size + settings.max_overflow))
            .min_idle(Some(to_u32(pool_size)))
            .connection_timeout(timeout)
            .idle_timeout(Some(OVERFLOW_IDLE_TIMEOUT))
            .max_lifetime(Some(settings.recycle).filter(|recycle| !recycle.is_zero()))
            .build(manager)
            .map_err(StoreError::PoolBuild)?;
        debug!(
            "opened {} database connections to {}",
            pool.state().connections,
            settings.path.display()
        );

        Ok(Self { pool, timeout })
    }
}

#[async_trait]
impl QueryExecutor for SqlitePool {
    async fn execute(&self, query: &SqlQuery) -> Result<ResultSet, StoreError> {
        let pool = self.pool.clone();
        let wait = self.timeout;
        let query = query.clone();
        tokio::task::spawn_blocking(move || {
            let conn = pool.get().map_err(|e| {
                warn!("no database connection available: {e}");
                StoreError::PoolTimeout(wait)
            })?;
            run_query(&conn, &query).map_err(StoreError::Query)
        })
        .await
        .map_err(|e| StoreError::Worker(e.to_string()))?
    }
}

fn run_query(conn: &Connection, query: &SqlQuery) -> Result<ResultSet, rusqlite::Error> {
    let mut stmt = conn.prepare(&query.sql)?;
    let columns: Vec<String> = stmt
        .column_names()
        .into_iter()
        .map(String::from)
        .collect();
    let date_columns: Vec<bool> = stmt
        .columns()
        .iter()
        .map(|column| {
            column
                .decl_type()
                .is_some_and(|decl| decl.eq_ignore_ascii_case("DATE"))
        })
        .collect();

    let mut rows = stmt.query(params_from_iter(query.params.iter()))?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let mut values = Vec::with_capacity(date_columns.len());
        for (idx, is_date) in date_columns.iter().enumerate() {
            values.push(Value::from_sql(row.get_ref(idx)?, *is_date));
        }
        out.push(values);
    }

    Ok(ResultSet { columns, rows: out })
}
