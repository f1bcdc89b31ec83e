mod models;
pub mod queries;
mod sqlite;

pub use models::{ContactRecord, MessageRecord, Row};
pub use sqlite::{open_read_only, SqliteStore};

use crate::error::StoreError;
use serde_json::Value;

/// Read-only tabular store: run a query with positional parameters and get
/// rows back as column-name keyed maps.
pub trait QueryRows: Send + Sync {
    fn query_rows(&self, query: &str, params: &[Value]) -> Result<Vec<Row>, StoreError>;
}
