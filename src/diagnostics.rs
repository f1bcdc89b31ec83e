//! Store access checks. Each returns a human-readable report; the first fatal
//! problem ends the report with an `ERROR:` line.

use crate::db::open_read_only;
use crate::error::StoreError;
use rusqlite::Connection;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;

const MESSAGES_TABLES: [&str; 2] = ["message", "handle"];
const ADDRESSBOOK_TABLES: [&str; 2] = ["ZABCDRECORD", "ZABCDPHONENUMBER"];

fn read_first_byte(path: &Path) -> std::io::Result<()> {
    let mut buf = [0u8; 1];
    File::open(path)?.read(&mut buf).map(|_| ())
}

/// `Database contains N tables` plus the required-table line.
fn table_report(conn: &Connection, required: &[&str]) -> rusqlite::Result<Vec<String>> {
    let count: i64 = conn.query_row("SELECT count(*) FROM sqlite_master", [], |r| r.get(0))?;
    let mut stmt = conn.prepare("SELECT name FROM sqlite_master WHERE type = 'table'")?;
    let names = stmt
        .query_map([], |r| r.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    let found: Vec<&str> = required
        .iter()
        .copied()
        .filter(|t| names.iter().any(|n| n == t))
        .collect();
    let mut lines = vec![format!("Database contains {} tables", count)];
    if found.len() == required.len() {
        lines.push(format!("Required tables ({}) are present", required.join(", ")));
    } else {
        lines.push(format!(
            "WARNING: Some required tables are missing. Found: {}",
            found.join(", ")
        ));
    }
    Ok(lines)
}

fn permission_denied(path: &Path, e: &std::io::Error) -> String {
    format!(
        "ERROR: Permission denied when trying to read {} ({}). Please grant Full Disk Access \
         permission to your terminal application.",
        path.display(),
        e
    )
}

pub fn check_messages_db_access(path: &Path) -> String {
    match path.try_exists() {
        Ok(true) => {}
        Ok(false) => return format!("ERROR: Messages database not found at {}", path.display()),
        Err(e) => return permission_denied(path, &e),
    }
    let mut status = vec![format!("Database file exists at: {}", path.display())];

    match read_first_byte(path) {
        Ok(()) => status.push("File is readable".to_string()),
        Err(e) if e.kind() == ErrorKind::PermissionDenied => {
            return format!(
                "ERROR: Permission denied when trying to read {}. Please grant Full Disk Access \
                 permission to your terminal application.",
                path.display()
            );
        }
        Err(e) => return format!("ERROR: Unknown error reading file: {}", e),
    }

    let report = open_read_only(path).and_then(|conn| {
        let lines = table_report(&conn, &MESSAGES_TABLES)?;
        Ok(lines)
    });
    match report {
        Ok(lines) => {
            status.push("Successfully connected to database".to_string());
            status.extend(lines);
            status.join("\n")
        }
        Err(e) => format!("ERROR: Database connection error: {}", e),
    }
}

/// Check every address-book source under `root`, then try a full contacts
/// load via `load_contacts` (returns the number of phone entries).
pub fn check_addressbook_access<F>(root: &Path, load_contacts: F) -> String
where
    F: FnOnce() -> Result<usize, StoreError>,
{
    let sources = root.join("Sources");
    match sources.try_exists() {
        Ok(true) => {}
        Ok(false) => {
            return format!(
                "ERROR: AddressBook Sources directory not found at {}",
                sources.display()
            )
        }
        Err(e) => return permission_denied(&sources, &e),
    }
    let mut status = vec![format!(
        "AddressBook Sources directory exists at: {}",
        sources.display()
    )];

    let pattern = sources.join("*").join("AddressBook-v22.abcddb");
    let paths: Vec<_> = glob::glob(&pattern.to_string_lossy())
        .map(|paths| paths.filter_map(Result::ok).collect())
        .unwrap_or_default();
    if paths.is_empty() {
        return format!(
            "ERROR: No AddressBook database files found in {}",
            sources.display()
        );
    }
    status.push(format!("Found {} AddressBook database files:", paths.len()));
    status.extend(paths.iter().map(|p| format!(" - {}", p.display())));

    for path in &paths {
        match read_first_byte(path) {
            Ok(()) => status.push(format!("File is readable: {}", path.display())),
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                status.push(format!(
                    "ERROR: Permission denied when trying to read {}",
                    path.display()
                ));
                continue;
            }
            Err(e) => {
                status.push(format!(
                    "ERROR: Unknown error reading file {}: {}",
                    path.display(),
                    e
                ));
                continue;
            }
        }
        let report = open_read_only(path).and_then(|conn| {
            let mut lines = table_report(&conn, &ADDRESSBOOK_TABLES)?;
            match conn.query_row("SELECT COUNT(*) FROM ZABCDRECORD", [], |r| r.get::<_, i64>(0)) {
                Ok(n) => lines.push(format!("Database contains {} contacts", n)),
                Err(_) => lines.push("Could not query contact count".to_string()),
            }
            Ok(lines)
        });
        match report {
            Ok(lines) => {
                status.push(format!("Successfully connected to database: {}", path.display()));
                status.extend(lines);
            }
            Err(e) => status.push(format!(
                "ERROR: Database connection error for {}: {}",
                path.display(),
                e
            )),
        }
    }

    match load_contacts() {
        Ok(n) if n > 0 => status.push(format!(
            "Successfully retrieved {} contacts with phone numbers",
            n
        )),
        Ok(_) => status.push("WARNING: No contacts with phone numbers found".to_string()),
        Err(e) => status.push(format!("ERROR: {}", e)),
    }
    status.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_messages_db_missing() {
        let dir = TempDir::new().unwrap();
        let report = check_messages_db_access(&dir.path().join("chat.db"));
        assert!(report.starts_with("ERROR: Messages database not found at"));
    }

    #[test]
    fn test_messages_db_report() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("chat.db");
        Connection::open(&path)
            .unwrap()
            .execute_batch(
                "CREATE TABLE message (ROWID INTEGER PRIMARY KEY);
                 CREATE TABLE handle (ROWID INTEGER PRIMARY KEY, id TEXT);",
            )
            .unwrap();
        let report = check_messages_db_access(&path);
        assert!(report.contains("File is readable"));
        assert!(report.contains("Database contains 2 tables"));
        assert!(report.contains("Required tables (message, handle) are present"));
    }

    #[test]
    fn test_messages_db_missing_tables() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("chat.db");
        Connection::open(&path)
            .unwrap()
            .execute_batch("CREATE TABLE handle (ROWID INTEGER PRIMARY KEY, id TEXT);")
            .unwrap();
        let report = check_messages_db_access(&path);
        assert!(report.contains("WARNING: Some required tables are missing. Found: handle"));
    }

    #[test]
    fn test_addressbook_report() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("Sources").join("ABC");
        std::fs::create_dir_all(&source).unwrap();
        Connection::open(source.join("AddressBook-v22.abcddb"))
            .unwrap()
            .execute_batch(
                "CREATE TABLE ZABCDRECORD (Z_PK INTEGER PRIMARY KEY, ZFIRSTNAME TEXT, ZLASTNAME TEXT);
                 CREATE TABLE ZABCDPHONENUMBER (ZOWNER INTEGER, ZFULLNUMBER TEXT, ZORDERINGINDEX INTEGER);
                 INSERT INTO ZABCDRECORD VALUES (1, 'Dylan', 'Westhimer');",
            )
            .unwrap();
        let report = check_addressbook_access(dir.path(), || Ok(3));
        assert!(report.contains("Found 1 AddressBook database files:"));
        assert!(report.contains("Required tables (ZABCDRECORD, ZABCDPHONENUMBER) are present"));
        assert!(report.contains("Database contains 1 contacts"));
        assert!(report.ends_with("Successfully retrieved 3 contacts with phone numbers"));
    }

    #[test]
    fn test_addressbook_without_sources() {
        let dir = TempDir::new().unwrap();
        assert!(check_addressbook_access(dir.path(), || Ok(0))
            .starts_with("ERROR: AddressBook Sources directory not found"));
        std::fs::create_dir_all(dir.path().join("Sources")).unwrap();
        assert!(check_addressbook_access(dir.path(), || Ok(0))
            .starts_with("ERROR: No AddressBook database files found"));
    }
}
