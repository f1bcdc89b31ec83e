//! Phone number normalization.
//!
//! A `PhoneKey` is the digit-only form of a phone number and is the identity
//! used by the contact directory. The US country-code aliasing (10 digits vs
//! `1` + 10 digits) is a lookup fallback, not an equality.

/// Digit-only canonical phone number.
pub type PhoneKey = String;

/// Strip every character that is not a decimal digit.
pub fn normalize(raw: &str) -> PhoneKey {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Keys to probe for a normalized number, in precedence order:
/// the key itself, then without the `1` country code, then with it.
pub fn probe_keys(key: &str) -> Vec<PhoneKey> {
    let mut keys = Vec::with_capacity(2);
    if key.is_empty() {
        return keys;
    }
    keys.push(key.to_string());
    if key.len() == 11 && key.starts_with('1') {
        keys.push(key[1..].to_string());
    } else if key.len() == 10 {
        keys.push(format!("1{}", key));
    }
    keys
}

/// Handle probes used against the message store, which keeps both bare and
/// `+`-prefixed forms. Longer numbers starting with `1` also lose the prefix.
pub fn handle_probe_keys(key: &str) -> Vec<String> {
    if key.is_empty() {
        return Vec::new();
    }
    let mut formats = vec![key.to_string()];
    if key.starts_with('1') && key.len() > 10 {
        formats.push(key[1..].to_string());
    } else if key.len() == 10 {
        formats.push(format!("1{}", key));
    }
    let plus: Vec<String> = formats.iter().map(|f| format!("+{}", f)).collect();
    formats.extend(plus);
    formats
}

/// True when every character is a digit or one of `+- ()`.
///
/// Used to route send recipients; an empty string is not a number.
pub fn looks_like_number(raw: &str) -> bool {
    !raw.is_empty() && raw.chars().all(|c| c.is_ascii_digit() || "+- ()".contains(c))
}

/// A phone number or an email handle (anything with an `@`).
pub fn looks_like_handle(raw: &str) -> bool {
    raw.contains('@') || looks_like_number(raw)
}
