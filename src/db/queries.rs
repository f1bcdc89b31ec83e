//! SQL for the Messages (`chat.db`) and AddressBook (`AddressBook-v22.abcddb`)
//! stores. Column aliases are what the record parsers read.

/// Contact names joined with every phone number, in address-book order.
pub const CONTACTS: &str = "
    SELECT
        ZABCDRECORD.ZFIRSTNAME AS first_name,
        ZABCDRECORD.ZLASTNAME AS last_name,
        ZABCDPHONENUMBER.ZFULLNUMBER AS phone
    FROM
        ZABCDRECORD
        LEFT JOIN ZABCDPHONENUMBER ON ZABCDRECORD.Z_PK = ZABCDPHONENUMBER.ZOWNER
    WHERE
        ZABCDPHONENUMBER.ZFULLNUMBER IS NOT NULL
    ORDER BY
        ZABCDRECORD.ZLASTNAME,
        ZABCDRECORD.ZFIRSTNAME,
        ZABCDPHONENUMBER.ZORDERINGINDEX ASC";

/// Newer store versions write nanoseconds into `message.date`; normalize to
/// seconds before comparing against the cutoff.
const DATE_SECONDS: &str =
    "(CASE WHEN m.date > 100000000000 THEN m.date / 1000000000 ELSE m.date END)";

/// Messages newer than `?1` (store seconds), newest first, at most `?2`.
pub fn recent_messages() -> String {
    format!(
        "SELECT m.date AS date, m.text AS text, m.is_from_me AS is_from_me, h.id AS sender
         FROM message m
         LEFT JOIN handle h ON m.handle_id = h.ROWID
         WHERE {DATE_SECONDS} > ?1
         ORDER BY m.date DESC
         LIMIT ?2"
    )
}

/// As [`recent_messages`], restricted to handle `?3`.
pub fn recent_messages_for_handle() -> String {
    format!(
        "SELECT m.date AS date, m.text AS text, m.is_from_me AS is_from_me, h.id AS sender
         FROM message m
         LEFT JOIN handle h ON m.handle_id = h.ROWID
         WHERE {DATE_SECONDS} > ?1 AND m.handle_id = ?3
         ORDER BY m.date DESC
         LIMIT ?2"
    )
}

/// Handles whose id is any of `count` candidate strings.
pub fn handles_by_ids(count: usize) -> String {
    let placeholders = vec!["?"; count.max(1)].join(", ");
    format!("SELECT ROWID AS rowid, id FROM handle WHERE id IN ({placeholders})")
}

/// Number of messages exchanged with handles whose id matches the LIKE pattern `?1`.
pub const COUNT_MESSAGES_LIKE: &str = "
    SELECT COUNT(*) AS count
    FROM message m
    JOIN handle h ON m.handle_id = h.ROWID
    WHERE h.id LIKE ?1";

/// Display name of a chat the handle `?1` takes part in.
pub const CHAT_DISPLAY_NAME: &str = "
    SELECT c.display_name AS display_name
    FROM handle h
    JOIN chat_handle_join chj ON h.ROWID = chj.handle_id
    JOIN chat c ON chj.chat_id = c.ROWID
    WHERE h.id = ?1 AND c.display_name IS NOT NULL AND c.display_name != ''
    LIMIT 1";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_by_ids_placeholders() {
        assert_eq!(
            handles_by_ids(3),
            "SELECT ROWID AS rowid, id FROM handle WHERE id IN (?, ?, ?)"
        );
        assert!(handles_by_ids(0).ends_with("IN (?)"));
    }

    #[test]
    fn test_filtered_query_uses_third_param() {
        assert!(recent_messages_for_handle().contains("m.handle_id = ?3"));
        assert!(!recent_messages().contains("?3"));
    }
}
