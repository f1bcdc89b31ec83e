//! User-facing operations over the message store, the contact directory and
//! the send transport.
//!
//! Every operation returns plain text for a person or an agent; store and
//! transport errors are folded into that text here.

use crate::contacts::ContactCache;
use crate::db::{queries, QueryRows, SqliteStore};
use crate::diagnostics;
use crate::error::{BridgeError, StoreError};
use crate::phone;
use crate::resolver::{MatchCandidate, Recipient, ResolveResult, Resolver};
use crate::session::SelectionSession;
use crate::settings::Settings;
use crate::transcript::{self, cutoff_seconds};
use crate::transport::{AppleScriptTransport, SendMessage};
use chrono::Local;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

pub const DEFAULT_HOURS: u32 = 24;
const SAMPLE_CONTACTS: usize = 10;

pub struct MessageBridge {
    settings: Settings,
    resolver: Resolver,
    messages: Arc<dyn QueryRows>,
    transport: Arc<dyn SendMessage>,
    send_session: SelectionSession,
    messages_session: SelectionSession,
}

impl MessageBridge {
    /// Bridge over the local Messages and AddressBook databases.
    pub fn from_settings(settings: Settings) -> Self {
        let contacts = Arc::new(SqliteStore::glob("AddressBook", settings.addressbook_glob()));
        let messages = Arc::new(SqliteStore::file("Messages", settings.messages_db()));
        Self::new(settings, contacts, messages, Arc::new(AppleScriptTransport::new()))
    }

    pub fn new(
        settings: Settings,
        contacts: Arc<dyn QueryRows>,
        messages: Arc<dyn QueryRows>,
        transport: Arc<dyn SendMessage>,
    ) -> Self {
        let cache = Arc::new(ContactCache::new(contacts, settings.cache_ttl()));
        let scorer = settings.match_strategy.scorer(settings.match_threshold);
        let resolver = Resolver::new(cache, scorer);
        Self {
            settings,
            resolver,
            messages,
            transport,
            send_session: SelectionSession::new(),
            messages_session: SelectionSession::new(),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// Ranked name matches, without touching any selection session.
    pub fn find_contact(&self, name: &str) -> Vec<MatchCandidate> {
        self.resolver.resolve_by_name(name)
    }

    /// Listing shown when a name matches more than one contact.
    pub fn ambiguity_listing(&self, query: &str, matches: &[MatchCandidate]) -> String {
        let lines: Vec<String> = matches
            .iter()
            .take(self.settings.max_listed_matches)
            .enumerate()
            .map(|(i, m)| format!("{}. {} ({})", i + 1, m.name, m.phone))
            .collect();
        format!(
            "Multiple contacts found matching '{}'. Please specify which one using 'contact:N' \
             where N is the number:\n{}",
            query,
            lines.join("\n")
        )
    }

    /// Messages from the last `hours` hours, optionally only those exchanged
    /// with `contact` (name, number, email or `contact:N`).
    pub fn get_recent_messages(&self, hours: u32, contact: Option<&str>) -> String {
        let handle = match contact.map(str::trim).filter(|c| !c.is_empty()) {
            Some(contact) => match self.contact_handle(contact) {
                Ok(rowid) => Some(rowid),
                Err(reply) => return reply,
            },
            None => None,
        };

        let cutoff = cutoff_seconds(Local::now().naive_local(), hours);
        let mut params = vec![json!(cutoff), json!(self.settings.message_limit)];
        let query = match handle {
            Some(rowid) => {
                params.push(json!(rowid));
                queries::recent_messages_for_handle()
            }
            None => queries::recent_messages(),
        };

        let rows = match self.messages.query_rows(&query, &params) {
            Ok(rows) => rows,
            Err(e) => return format!("Error accessing messages: {}", e),
        };
        let records = transcript::records_from_rows(&rows);
        let mut labels: HashMap<String, String> = HashMap::new();
        transcript::format_transcript(&records, &self.settings.self_label, |sender| {
            labels
                .entry(sender.to_string())
                .or_insert_with(|| self.resolver.label_sender(sender, self.messages.as_ref()))
                .clone()
        })
    }

    /// Message-store handle row for a contact reference, or the reply to
    /// give the caller instead.
    fn contact_handle(&self, contact: &str) -> Result<i64, String> {
        let target = match Recipient::parse(contact) {
            Recipient::Selection(reference) => self
                .messages_session
                .select(&reference)
                .map_err(|e| e.to_string())?
                .phone,
            Recipient::Name(name) => match self.resolver.resolve(&name) {
                ResolveResult::NotFound => {
                    return Err(format!("No contacts found matching '{}'.", name))
                }
                ResolveResult::Found(m) => m.phone,
                ResolveResult::Ambiguous(matches) => {
                    let listing = self.ambiguity_listing(&name, &matches);
                    self.messages_session.record_matches(matches);
                    return Err(listing);
                }
            },
            Recipient::Number(key) => key,
            Recipient::Handle(email) => email,
        };

        match self.find_handle(&target) {
            Ok(Some(rowid)) => Ok(rowid),
            Ok(None) => Err(self.missing_handle_reply(&target)),
            Err(e) => Err(format!("Error accessing messages: {}", e)),
        }
    }

    /// Handle row for an email or phone key. Phone keys are probed bare and
    /// `+`-prefixed, with and without the `1` country code; the earliest
    /// probe with a handle wins.
    pub fn find_handle(&self, target: &str) -> Result<Option<i64>, StoreError> {
        let probes = if target.contains('@') {
            vec![target.to_string()]
        } else {
            phone::handle_probe_keys(&phone::normalize(target))
        };
        if probes.is_empty() {
            return Ok(None);
        }
        let params: Vec<Value> = probes.iter().map(|p| json!(p)).collect();
        let rows = self
            .messages
            .query_rows(&queries::handles_by_ids(probes.len()), &params)?;
        let found = probes.iter().find_map(|probe| {
            rows.iter()
                .find(|row| row.get("id").and_then(Value::as_str) == Some(probe.as_str()))
                .and_then(|row| row.get("rowid").and_then(Value::as_i64))
        });
        Ok(found)
    }

    fn missing_handle_reply(&self, target: &str) -> String {
        let pattern = format!("%{}%", phone::normalize(target));
        let count = self
            .messages
            .query_rows(queries::COUNT_MESSAGES_LIKE, &[json!(pattern)])
            .ok()
            .and_then(|rows| rows.first().and_then(|r| r.get("count")).and_then(Value::as_i64));
        if count == Some(0) {
            format!("No message history found with '{}'.", target)
        } else {
            format!(
                "Could not find any messages with contact '{}'. Verify the phone number or email is correct.",
                target
            )
        }
    }

    /// Send `body` to a name, number, email or `contact:N`.
    pub fn send_message(&self, recipient: &str, body: &str) -> String {
        let recipient = recipient.trim();
        let (address, label) = match Recipient::parse(recipient) {
            Recipient::Selection(reference) => match self.send_session.select(&reference) {
                Ok(m) => (m.phone, m.name),
                Err(e) => return e.to_string(),
            },
            Recipient::Number(key) => {
                let label = self
                    .resolver
                    .lookup_number(&key)
                    .map(|(_, name)| name)
                    .unwrap_or_else(|| key.clone());
                (key, label)
            }
            Recipient::Handle(email) => (email.clone(), email),
            Recipient::Name(name) => match self.resolver.resolve(&name) {
                ResolveResult::NotFound => {
                    return format!("Error: Could not find any contact matching '{}'", name)
                }
                ResolveResult::Found(m) => (m.phone, m.name),
                ResolveResult::Ambiguous(matches) => {
                    let listing = self.ambiguity_listing(&name, &matches);
                    self.send_session.record_matches(matches);
                    return listing;
                }
            },
        };
        match self.deliver(&address, body) {
            Ok(()) => format!("Message sent successfully to {}", label),
            Err(e) => e.to_string(),
        }
    }

    fn deliver(&self, address: &str, body: &str) -> Result<(), BridgeError> {
        log::debug!("sending {} bytes to {}", body.len(), address);
        self.transport.send(address, body)?;
        Ok(())
    }

    /// Directory size and a sample of entries.
    pub fn check_contacts(&self) -> String {
        let dir = self.resolver.cache().directory();
        if dir.is_empty() {
            return "No contacts found in AddressBook.".to_string();
        }
        let mut lines = vec![
            format!("Found {} contacts in AddressBook.", dir.len()),
            format!("Sample entries (first {}):", SAMPLE_CONTACTS),
        ];
        lines.extend(
            dir.entries()
                .take(SAMPLE_CONTACTS)
                .map(|(phone, name)| format!("{} -> {}", phone, name)),
        );
        lines.join("\n")
    }

    pub fn check_db_access(&self) -> String {
        diagnostics::check_messages_db_access(&self.settings.messages_db())
    }

    pub fn check_addressbook_access(&self) -> String {
        diagnostics::check_addressbook_access(&self.settings.addressbook_root(), || {
            self.resolver.cache().refresh().map(|dir| dir.len())
        })
    }
}
