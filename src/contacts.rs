//! Contact directory and its time-based cache.
//!
//! The directory maps phone keys to display names and keeps the reverse
//! name -> phone keys index. A snapshot is immutable once built; the cache
//! publishes a new one with a single pointer swap so readers always see a
//! forward map and reverse index from the same refresh.

use crate::db::{queries, ContactRecord, QueryRows, Row};
use crate::error::StoreError;
use crate::phone::{self, PhoneKey};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

/// Default time a directory snapshot stays fresh.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Minimum wait after a failed refresh before the store is tried again.
pub const RETRY_BACKOFF: Duration = Duration::from_secs(10);

/// vCard image metadata sometimes glued onto the phone value.
const IMAGE_METADATA_MARKER: &str = "X-IMAGETYPE";

/// Immutable phone <-> name snapshot.
#[derive(Debug, Clone)]
pub struct ContactDirectory {
    entries: Vec<(PhoneKey, String)>,
    by_phone: HashMap<PhoneKey, usize>,
    reverse: Vec<(String, Vec<PhoneKey>)>,
    by_name: HashMap<String, usize>,
    refreshed_at: Instant,
}

impl Default for ContactDirectory {
    fn default() -> Self {
        Self::empty()
    }
}

impl ContactDirectory {
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
            by_phone: HashMap::new(),
            reverse: Vec::new(),
            by_name: HashMap::new(),
            refreshed_at: Instant::now(),
        }
    }

    /// Build from contact records. Records without a phone key or a name are
    /// dropped. A phone seen twice keeps its first position but takes the
    /// latest name.
    pub fn from_records<I: IntoIterator<Item = ContactRecord>>(records: I) -> Self {
        let mut dir = Self::empty();
        for record in records {
            let Some(raw_phone) = record.phone.as_deref().filter(|p| !p.is_empty()) else {
                continue;
            };
            let raw_phone = raw_phone
                .split(IMAGE_METADATA_MARKER)
                .next()
                .unwrap_or_default();
            let Some(name) = record.display_name() else {
                continue;
            };
            let key = phone::normalize(raw_phone);
            if key.is_empty() {
                continue;
            }
            dir.insert(key, name);
        }
        dir.index_names();
        dir
    }

    /// Build from raw store rows, skipping rows that do not parse.
    pub fn from_rows(rows: &[Row]) -> Self {
        let records = rows.iter().filter_map(|row| match ContactRecord::from_row(row) {
            Ok(record) => Some(record),
            Err(e) => {
                log::warn!("skipping contact row: {}", e);
                None
            }
        });
        Self::from_records(records)
    }

    fn insert(&mut self, key: PhoneKey, name: String) {
        match self.by_phone.get(&key) {
            Some(&i) => self.entries[i].1 = name,
            None => {
                self.by_phone.insert(key.clone(), self.entries.len());
                self.entries.push((key, name));
            }
        }
    }

    /// Derive the reverse index from the final forward entries.
    fn index_names(&mut self) {
        self.reverse.clear();
        self.by_name.clear();
        for (key, name) in &self.entries {
            match self.by_name.get(name) {
                Some(&i) => self.reverse[i].1.push(key.clone()),
                None => {
                    self.by_name.insert(name.clone(), self.reverse.len());
                    self.reverse.push((name.clone(), vec![key.clone()]));
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn refreshed_at(&self) -> Instant {
        self.refreshed_at
    }

    /// Exact phone key lookup.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.by_phone.get(key).map(|&i| self.entries[i].1.as_str())
    }

    /// Phone keys recorded for a display name, in insertion order.
    pub fn numbers_for(&self, name: &str) -> &[PhoneKey] {
        self.by_name
            .get(name)
            .map(|&i| self.reverse[i].1.as_slice())
            .unwrap_or(&[])
    }

    /// Forward entries in directory order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, n)| (k.as_str(), n.as_str()))
    }

    /// `(name, phone key)` pairs from the reverse index, in directory order.
    pub fn name_phone_pairs(&self) -> Vec<(String, PhoneKey)> {
        self.reverse
            .iter()
            .flat_map(|(name, keys)| keys.iter().map(move |k| (name.clone(), k.clone())))
            .collect()
    }

    /// Probe a normalized key and its country-code variants; first hit wins.
    pub fn lookup_with_fallback(&self, key: &str) -> Option<(PhoneKey, &str)> {
        phone::probe_keys(key)
            .into_iter()
            .find_map(|probe| self.get(&probe).map(|name| (probe.clone(), name)))
    }
}

/// Lazily refreshed, shared contact directory.
pub struct ContactCache {
    source: Arc<dyn QueryRows>,
    ttl: Duration,
    retry_backoff: Duration,
    snapshot: RwLock<Option<Arc<ContactDirectory>>>,
    last_failure: Mutex<Option<Instant>>,
}

impl ContactCache {
    pub fn new(source: Arc<dyn QueryRows>, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            retry_backoff: RETRY_BACKOFF,
            snapshot: RwLock::new(None),
            last_failure: Mutex::new(None),
        }
    }

    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    fn backing_off(&self) -> bool {
        self.last_failure
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .is_some_and(|at| at.elapsed() < self.retry_backoff)
    }

    fn set_last_failure(&self, at: Option<Instant>) {
        *self
            .last_failure
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = at;
    }

    fn current(&self) -> Option<Arc<ContactDirectory>> {
        self.snapshot
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn is_stale(&self, dir: &ContactDirectory) -> bool {
        dir.refreshed_at.elapsed() > self.ttl
    }

    /// Current directory, refreshing first when stale or never loaded.
    ///
    /// A failed refresh is logged and the last good snapshot (or an empty
    /// directory) is returned instead; the store is not retried until the
    /// back-off has passed.
    pub fn directory(&self) -> Arc<ContactDirectory> {
        let current = self.current();
        if let Some(dir) = &current {
            if !self.is_stale(dir) {
                return dir.clone();
            }
        }
        if self.backing_off() {
            return current.unwrap_or_default();
        }
        match self.refresh() {
            Ok(dir) => dir,
            Err(e) => {
                log::warn!("contact refresh failed, serving previous snapshot: {}", e);
                current.unwrap_or_default()
            }
        }
    }

    /// Reload from the contacts store and publish the new snapshot.
    pub fn refresh(&self) -> Result<Arc<ContactDirectory>, StoreError> {
        let rows = match self.source.query_rows(queries::CONTACTS, &[]) {
            Ok(rows) => rows,
            Err(e) => {
                self.set_last_failure(Some(Instant::now()));
                return Err(e);
            }
        };
        self.set_last_failure(None);
        let dir = Arc::new(ContactDirectory::from_rows(&rows));
        log::debug!("contact directory refreshed: {} numbers", dir.len());
        *self
            .snapshot
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(dir.clone());
        Ok(dir)
    }

    /// Drop the snapshot so the next read reloads.
    pub fn invalidate(&self) {
        self.set_last_failure(None);
        *self
            .snapshot
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
    }
}
