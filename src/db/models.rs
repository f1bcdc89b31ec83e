use crate::error::RowError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One result row, keyed by column name.
pub type Row = serde_json::Map<String, Value>;

fn optional_text(row: &Row, column: &'static str) -> Result<Option<String>, RowError> {
    match row.get(column) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(_) => Err(RowError { column }),
    }
}

/// A `(first, last, phone)` row from the contacts store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactRecord {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
}

impl ContactRecord {
    pub fn from_row(row: &Row) -> Result<Self, RowError> {
        Ok(Self {
            first_name: optional_text(row, "first_name")?,
            last_name: optional_text(row, "last_name")?,
            phone: optional_text(row, "phone")?,
        })
    }

    /// First and last name joined by a space, skipping empty parts.
    pub fn display_name(&self) -> Option<String> {
        let parts: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|p| !p.is_empty())
            .collect();
        let name = parts.join(" ");
        if name.trim().is_empty() {
            None
        } else {
            Some(name)
        }
    }
}

/// A row from the message log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Raw store timestamp, left untyped so odd values can fall back to now.
    pub date: Value,
    pub text: Option<String>,
    pub is_from_me: bool,
    /// Phone number or email of the other party, when the store knows it.
    pub sender: Option<String>,
}

impl MessageRecord {
    pub fn from_row(row: &Row) -> Result<Self, RowError> {
        let is_from_me = match row.get("is_from_me") {
            None | Some(Value::Null) => false,
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_i64().map(|v| v != 0).unwrap_or(false),
            Some(_) => return Err(RowError { column: "is_from_me" }),
        };
        Ok(Self {
            date: row.get("date").cloned().unwrap_or(Value::Null),
            text: optional_text(row, "text")?,
            is_from_me,
            sender: optional_text(row, "sender")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_contact_display_name() {
        let rec = ContactRecord::from_row(&row(json!({
            "first_name": "Dylan", "last_name": null, "phone": "+13108820189"
        })))
        .unwrap();
        assert_eq!(rec.display_name().as_deref(), Some("Dylan"));

        let nameless = ContactRecord::from_row(&row(json!({"first_name": "", "phone": "1"}))).unwrap();
        assert_eq!(nameless.display_name(), None);
    }

    #[test]
    fn test_contact_rejects_malformed_column() {
        let err = ContactRecord::from_row(&row(json!({"first_name": ["x"], "phone": "1"}))).unwrap_err();
        assert_eq!(err.column, "first_name");
    }

    #[test]
    fn test_message_record_from_row() {
        let rec = MessageRecord::from_row(&row(json!({
            "date": 700000000, "text": "hi", "is_from_me": 1, "sender": "+13105551234"
        })))
        .unwrap();
        assert!(rec.is_from_me);
        assert_eq!(rec.text.as_deref(), Some("hi"));
        assert_eq!(rec.date, json!(700000000));
    }
}
