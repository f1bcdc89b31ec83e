//! Free text -> contact resolution.

use crate::contacts::ContactCache;
use crate::db::{queries, QueryRows};
use crate::phone::{self, PhoneKey};
use crate::similarity::Scorer;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// Prefix that turns a recipient into a reference to the last match list.
pub const SELECTION_PREFIX: &str = "contact:";

/// A scored directory hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchCandidate {
    pub name: String,
    pub phone: PhoneKey,
    pub score: f64,
}

/// Outcome of resolving a name to one contact.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolveResult {
    Found(MatchCandidate),
    Ambiguous(Vec<MatchCandidate>),
    NotFound,
}

/// How a caller-supplied recipient or contact string is routed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    /// `contact:N`; holds the text after the prefix.
    Selection(String),
    /// Digits and `+- ()` only; holds the normalized key.
    Number(PhoneKey),
    /// Email handle, used verbatim.
    Handle(String),
    Name(String),
}

impl Recipient {
    pub fn parse(raw: &str) -> Self {
        let text = raw.trim();
        if let Some(reference) = selection_reference(text) {
            return Recipient::Selection(reference.trim().to_string());
        }
        if text.contains('@') {
            Recipient::Handle(text.to_string())
        } else if phone::looks_like_number(text) {
            Recipient::Number(phone::normalize(text))
        } else {
            Recipient::Name(text.to_string())
        }
    }
}

/// Text after a case-insensitive `contact:` prefix.
pub fn selection_reference(text: &str) -> Option<&str> {
    let prefix = text.get(..SELECTION_PREFIX.len())?;
    if prefix.eq_ignore_ascii_case(SELECTION_PREFIX) {
        Some(&text[SELECTION_PREFIX.len()..])
    } else {
        None
    }
}

pub struct Resolver {
    cache: Arc<ContactCache>,
    scorer: Scorer,
}

impl Resolver {
    pub fn new(cache: Arc<ContactCache>, scorer: Scorer) -> Self {
        Self { cache, scorer }
    }

    pub fn cache(&self) -> &ContactCache {
        &self.cache
    }

    pub fn scorer(&self) -> &Scorer {
        &self.scorer
    }

    /// Every directory `(name, phone)` pair scoring at or above the threshold,
    /// best first. Ties keep directory order.
    pub fn resolve_by_name(&self, query: &str) -> Vec<MatchCandidate> {
        let dir = self.cache.directory();
        let pairs = dir.name_phone_pairs();
        self.scorer
            .rank(query, &pairs)
            .into_iter()
            .map(|(name, phone, score)| MatchCandidate { name, phone, score })
            .collect()
    }

    pub fn resolve(&self, query: &str) -> ResolveResult {
        let mut matches = self.resolve_by_name(query);
        match matches.len() {
            0 => ResolveResult::NotFound,
            1 => ResolveResult::Found(matches.remove(0)),
            _ => ResolveResult::Ambiguous(matches),
        }
    }

    /// Directory key for a raw phone number: the normalized key, then the
    /// key without a leading `1`, then with one.
    pub fn resolve_direct_number(&self, raw: &str) -> Option<PhoneKey> {
        self.lookup_number(raw).map(|(key, _)| key)
    }

    /// As [`Self::resolve_direct_number`], with the contact name.
    pub fn lookup_number(&self, raw: &str) -> Option<(PhoneKey, String)> {
        let key = phone::normalize(raw);
        let dir = self.cache.directory();
        dir.lookup_with_fallback(&key)
            .map(|(key, name)| (key, name.to_string()))
    }

    /// Display label for a message sender: directory name, then a chat
    /// display name from the message store, then the raw sender.
    pub fn label_sender(&self, sender: &str, messages: &dyn QueryRows) -> String {
        if phone::looks_like_number(sender) {
            if let Some((_, name)) = self.lookup_number(sender) {
                return name;
            }
        } else if let Some(name) = self.cache.directory().get(sender) {
            return name.to_string();
        }
        match messages.query_rows(queries::CHAT_DISPLAY_NAME, &[Value::from(sender)]) {
            Ok(rows) => {
                let chat_name = rows
                    .first()
                    .and_then(|row| row.get("display_name"))
                    .and_then(Value::as_str)
                    .filter(|name| !name.is_empty());
                if let Some(name) = chat_name {
                    return name.to_string();
                }
            }
            Err(e) => log::debug!("chat name lookup failed for {}: {}", sender, e),
        }
        sender.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contacts::tests::FakeContacts;
    use crate::contacts::DEFAULT_TTL;
    use crate::db::SqliteStore;
    use rusqlite::Connection;
    use serde_json::json;

    fn resolver(rows: Value) -> Resolver {
        let cache = Arc::new(ContactCache::new(Arc::new(FakeContacts::new(rows)), DEFAULT_TTL));
        Resolver::new(cache, Scorer::default())
    }

    fn chat_store() -> SqliteStore {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE handle (ROWID INTEGER PRIMARY KEY, id TEXT);
             CREATE TABLE chat (ROWID INTEGER PRIMARY KEY, display_name TEXT);
             CREATE TABLE chat_handle_join (chat_id INTEGER, handle_id INTEGER);
             INSERT INTO handle VALUES (1, '+15550001111'), (2, 'pal@example.com');
             INSERT INTO chat VALUES (1, 'Climbing Crew'), (2, '');
             INSERT INTO chat_handle_join VALUES (1, 1), (2, 2);",
        )
        .unwrap();
        SqliteStore::from_connection("Messages", conn)
    }

    #[test]
    fn test_recipient_routing() {
        assert_eq!(Recipient::parse("contact:2"), Recipient::Selection("2".into()));
        assert_eq!(Recipient::parse("CONTACT: 3 "), Recipient::Selection("3".into()));
        assert_eq!(
            Recipient::parse("+1 (310) 555-1234"),
            Recipient::Number("13105551234".into())
        );
        assert_eq!(
            Recipient::parse("pal@example.com"),
            Recipient::Handle("pal@example.com".into())
        );
        assert_eq!(Recipient::parse(" John Smith "), Recipient::Name("John Smith".into()));
        assert_eq!(selection_reference("con"), None);
    }

    #[test]
    fn test_resolve_single_first_name() {
        let r = resolver(json!([
            {"first_name": "Dylan", "last_name": "Westhimer", "phone": "+13108820189"}
        ]));
        assert_eq!(
            r.resolve_by_name("dylan"),
            vec![MatchCandidate {
                name: "Dylan Westhimer".into(),
                phone: "13108820189".into(),
                score: 1.0
            }]
        );
    }

    #[test]
    fn test_resolve_ranks_and_filters() {
        let r = resolver(json!([
            {"first_name": "Zed", "last_name": "Other", "phone": "1"},
            {"first_name": "John", "last_name": "Smithe", "phone": "2"},
            {"first_name": "John", "last_name": "Smith", "phone": "3"},
        ]));
        let matches = r.resolve_by_name("John Smit");
        let names: Vec<_> = matches.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["John Smith", "John Smithe"]);
        assert!(matches[0].score > matches[1].score);
        assert!(matches.iter().all(|m| m.score >= r.scorer().threshold()));
        assert!(matches!(r.resolve("John Smit"), ResolveResult::Ambiguous(ref m) if m.len() == 2));
        assert_eq!(r.resolve("Nobody Here At All"), ResolveResult::NotFound);
    }

    #[test]
    fn test_resolve_direct_number_probe_order() {
        let r = resolver(json!([
            {"first_name": "Ten", "phone": "3105551234"},
            {"first_name": "Eleven", "phone": "13105551234"},
        ]));
        assert_eq!(r.resolve_direct_number("(310) 555-1234").as_deref(), Some("3105551234"));
        assert_eq!(r.resolve_direct_number("+1 310 555 1234").as_deref(), Some("13105551234"));

        let r = resolver(json!([{"first_name": "Eleven", "phone": "+1 310 555 1234"}]));
        assert_eq!(r.resolve_direct_number("3105551234").as_deref(), Some("13105551234"));
        assert_eq!(r.resolve_direct_number(""), None);
    }

    #[test]
    fn test_label_sender_fallback_chain() {
        let r = resolver(json!([{"first_name": "Alice", "phone": "3105551234"}]));
        let store = chat_store();
        assert_eq!(r.label_sender("+13105551234", &store), "Alice");
        assert_eq!(r.label_sender("+15550001111", &store), "Climbing Crew");
        assert_eq!(r.label_sender("pal@example.com", &store), "pal@example.com");
        assert_eq!(r.label_sender("+19998887777", &store), "+19998887777");
    }
}
