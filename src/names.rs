//! Display-name cleanup applied before every fuzzy comparison.
//!
//! Contact names in the wild carry emoji, flags and dingbats ("Mom ❤️",
//! "Dylan 🏄"). They are stripped so the scorer sees only the letters.

use regex::Regex;
use std::sync::OnceLock;

const PICTOGRAPHS: &str = concat!(
    "[",
    r"\x{1F600}-\x{1F64F}", // emoticons
    r"\x{1F300}-\x{1F5FF}", // symbols & pictographs
    r"\x{1F680}-\x{1F6FF}", // transport & map
    r"\x{1F700}-\x{1F77F}", // alchemical
    r"\x{1F780}-\x{1F7FF}", // geometric shapes extended
    r"\x{1F800}-\x{1F8FF}", // supplemental arrows-c
    r"\x{1F900}-\x{1F9FF}", // supplemental symbols & pictographs
    r"\x{1FA00}-\x{1FA6F}", // chess
    r"\x{1FA70}-\x{1FAFF}", // symbols & pictographs extended-a
    r"\x{2702}-\x{27B0}",   // dingbats
    r"\x{24C2}-\x{24FF}",   // enclosed alphanumerics
    r"\x{1F100}-\x{1F251}", // enclosed supplements, regional indicators
    r"\x{2600}-\x{26FF}",   // misc symbols
    r"\x{FE00}-\x{FE0F}",   // variation selectors
    r"\x{200D}",            // zero width joiner
    "]+"
);

const SYMBOLS: &str = r"[^\w\s'\-]";

/// Compile once; a pattern that fails is logged and its stage skipped.
fn compiled(cell: &'static OnceLock<Option<Regex>>, pattern: &str) -> Option<&'static Regex> {
    cell.get_or_init(|| match Regex::new(pattern) {
        Ok(re) => Some(re),
        Err(e) => {
            log::error!("name cleanup pattern does not compile: {}", e);
            None
        }
    })
    .as_ref()
}

fn pictograph_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    compiled(&RE, PICTOGRAPHS)
}

fn symbol_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    compiled(&RE, SYMBOLS)
}

fn strip(re: Option<&Regex>, text: &str) -> String {
    match re {
        Some(re) => re.replace_all(text, "").into_owned(),
        None => text.to_string(),
    }
}

/// Remove decorative glyphs and punctuation, collapse whitespace, trim.
pub fn clean_name(raw: &str) -> String {
    let without_pictographs = strip(pictograph_regex(), raw);
    let without_symbols = strip(symbol_regex(), &without_pictographs);
    without_symbols.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Cleaned, lowercased form used for comparisons.
pub fn comparison_key(raw: &str) -> String {
    clean_name(raw).to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_name_strips_emoji() {
        assert_eq!(clean_name("Dylan 🏄 Westhimer"), "Dylan Westhimer");
        assert_eq!(clean_name("Mom ❤️"), "Mom");
        assert_eq!(clean_name("🇺🇸 Sam"), "Sam");
        assert_eq!(clean_name("👩‍👩‍👧 Family"), "Family");
    }

    #[test]
    fn test_clean_name_keeps_apostrophes_and_hyphens() {
        assert_eq!(clean_name("Mary-Jane O'Neil"), "Mary-Jane O'Neil");
        assert_eq!(clean_name("Dr. Who?!"), "Dr Who");
    }

    #[test]
    fn test_clean_name_collapses_whitespace() {
        assert_eq!(clean_name("  John \t  Smith \n"), "John Smith");
        assert_eq!(clean_name(""), "");
        assert_eq!(clean_name("✨✨"), "");
    }

    #[test]
    fn test_clean_name_keeps_non_latin_letters() {
        assert_eq!(clean_name("José Müller"), "José Müller");
        assert_eq!(clean_name("山田 太郎"), "山田 太郎");
    }

    #[test]
    fn test_cleanup_patterns_compile() {
        assert!(pictograph_regex().is_some());
        assert!(symbol_regex().is_some());
    }

    #[test]
    fn test_comparison_key_lowercases() {
        assert_eq!(comparison_key("DYLAN ☀ WESTHIMER"), "dylan westhimer");
    }
}
