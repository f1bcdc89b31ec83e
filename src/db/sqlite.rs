use super::{QueryRows, Row};
use crate::error::StoreError;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection, ErrorCode, OpenFlags};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Where a store's data lives.
enum Location {
    /// A single database file, opened per query so live changes are seen.
    File(PathBuf),
    /// Every file matching a glob pattern; results are concatenated.
    Glob(String),
    /// An already open connection (tests, fixtures).
    Connection(Mutex<Connection>),
}

/// Read-only SQLite-backed [`QueryRows`].
pub struct SqliteStore {
    name: &'static str,
    location: Location,
}

/// Open a database read-only, the way every store access does.
pub fn open_read_only(path: &Path) -> rusqlite::Result<Connection> {
    Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
}

impl SqliteStore {
    pub fn file<P: AsRef<Path>>(name: &'static str, path: P) -> Self {
        Self {
            name,
            location: Location::File(path.as_ref().to_path_buf()),
        }
    }

    pub fn glob(name: &'static str, pattern: impl Into<String>) -> Self {
        Self {
            name,
            location: Location::Glob(pattern.into()),
        }
    }

    pub fn from_connection(name: &'static str, conn: Connection) -> Self {
        Self {
            name,
            location: Location::Connection(Mutex::new(conn)),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Files currently backing this store.
    pub fn paths(&self) -> Vec<PathBuf> {
        match &self.location {
            Location::File(path) => vec![path.clone()],
            Location::Glob(pattern) => expand_glob(pattern),
            Location::Connection(_) => Vec::new(),
        }
    }

    fn classify(&self, source: rusqlite::Error) -> StoreError {
        let unavailable = matches!(
            source.sqlite_error_code(),
            Some(ErrorCode::CannotOpen)
                | Some(ErrorCode::PermissionDenied)
                | Some(ErrorCode::NotADatabase)
                | Some(ErrorCode::AuthorizationForStatementDenied)
        );
        if unavailable {
            StoreError::Unavailable { store: self.name, source }
        } else {
            StoreError::Query { store: self.name, source }
        }
    }

    fn query_file(&self, path: &Path, query: &str, params: &[Value]) -> Result<Vec<Row>, StoreError> {
        // exists() reports false on EPERM; keep a permission denial distinct.
        match path.try_exists() {
            Ok(true) => {}
            Ok(false) => {
                return Err(StoreError::NotFound {
                    store: self.name,
                    path: path.to_path_buf(),
                })
            }
            Err(source) => {
                return Err(StoreError::Denied {
                    store: self.name,
                    path: path.to_path_buf(),
                    source,
                })
            }
        }
        let conn = open_read_only(path).map_err(|source| StoreError::Unavailable {
            store: self.name,
            source,
        })?;
        run_query(&conn, query, params).map_err(|e| self.classify(e))
    }
}

fn expand_glob(pattern: &str) -> Vec<PathBuf> {
    match glob::glob(pattern) {
        Ok(paths) => paths.filter_map(|p| p.ok()).collect(),
        Err(e) => {
            log::warn!("invalid store glob {}: {}", pattern, e);
            Vec::new()
        }
    }
}

impl QueryRows for SqliteStore {
    fn query_rows(&self, query: &str, params: &[Value]) -> Result<Vec<Row>, StoreError> {
        match &self.location {
            Location::File(path) => self.query_file(path, query, params),
            Location::Glob(pattern) => {
                let paths = expand_glob(pattern);
                if paths.is_empty() {
                    return Err(StoreError::NotFound {
                        store: self.name,
                        path: PathBuf::from(pattern),
                    });
                }
                let mut all_rows = Vec::new();
                let mut readable = 0;
                for path in &paths {
                    match self.query_file(path, query, params) {
                        Ok(rows) => {
                            readable += 1;
                            all_rows.extend(rows);
                        }
                        Err(e) => log::warn!("skipping {}: {}", path.display(), e),
                    }
                }
                if readable == 0 {
                    return Err(StoreError::NoneReadable { store: self.name });
                }
                Ok(all_rows)
            }
            Location::Connection(conn) => {
                let conn = conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                run_query(&conn, query, params).map_err(|e| self.classify(e))
            }
        }
    }
}

fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(*b as i64),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

fn from_sql(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::String(String::from_utf8_lossy(b).into_owned()),
    }
}

fn run_query(conn: &Connection, query: &str, params: &[Value]) -> rusqlite::Result<Vec<Row>> {
    let mut stmt = conn.prepare(query)?;
    let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
    let mut rows = stmt.query(params_from_iter(params.iter().map(to_sql)))?;
    let mut results = Vec::new();
    while let Some(row) = rows.next()? {
        let mut map = Row::new();
        for (i, column) in columns.iter().enumerate() {
            map.insert(column.clone(), from_sql(row.get_ref(i)?));
        }
        results.push(map);
    }
    Ok(results)
}
