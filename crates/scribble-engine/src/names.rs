//! Display-name validation.

use unicode_normalization::char::is_combining_mark;

use crate::text::compact;

/// Allowed name length in chars, after trimming.
pub const NAME_LEN: std::ops::RangeInclusive<usize> = 2..=16;

/// Names nobody may take, matched exactly after compaction.
const RESERVED: &[&str] = &[
    "admin", "administrator", "moderator", "mod", "system", "server", "host", "staff",
    "scribble",
];

/// Words that may not appear anywhere in a name.
const BANNED: &[&str] = &[
    "fuck", "shit", "bitch", "cunt", "dick", "pussy", "nigger", "nigga", "faggot", "whore",
    "slut", "nazi", "hitler",
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NameError {
    #[error("name must be 2-16 characters")]
    Length,

    #[error("name contains a forbidden character {0:?}")]
    Charset(char),

    #[error("name is reserved")]
    Reserved,

    #[error("name contains a banned word")]
    Banned,
}

/// Validates a display name and returns its trimmed form.
///
/// # Errors
/// [`NameError`] naming the first rule the input breaks.
pub fn validate_name(raw: &str) -> Result<String, NameError> {
    let name = raw.trim();
    if !NAME_LEN.contains(&name.chars().count()) {
        return Err(NameError::Length);
    }
    if let Some(bad) = name.chars().find(|c| !is_allowed(*c)) {
        return Err(NameError::Charset(bad));
    }

    let compacted = compact(name);
    if RESERVED.contains(&compacted.as_str()) {
        return Err(NameError::Reserved);
    }
    let folded = fold_leet(&compacted);
    if BANNED.iter().any(|word| folded.contains(word)) {
        return Err(NameError::Banned);
    }
    Ok(name.to_string())
}

fn is_allowed(c: char) -> bool {
    c.is_alphanumeric() || is_combining_mark(c) || matches!(c, ' ' | '_' | '-' | '.')
}

fn fold_leet(input: &str) -> String {
    input
        .chars()
        .map(|c| match c {
            '0' => 'o',
            '1' => 'i',
            '3' => 'e',
            '4' => 'a',
            '5' => 's',
            '7' => 't',
            other => other,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name_accepts_and_trims() {
        assert_eq!(validate_name("  Alice "), Ok("Alice".to_string()));
        assert_eq!(validate_name("Jean-Luc_2"), Ok("Jean-Luc_2".to_string()));
        assert_eq!(validate_name("Zoé"), Ok("Zoé".to_string()));
    }

    #[test]
    fn test_validate_name_length_bounds() {
        assert_eq!(validate_name("A"), Err(NameError::Length));
        assert_eq!(validate_name("   "), Err(NameError::Length));
        assert_eq!(validate_name("abcdefghijklmnopq"), Err(NameError::Length));
        assert!(validate_name("abcdefghijklmnop").is_ok());
    }

    #[test]
    fn test_validate_name_rejects_symbols() {
        assert_eq!(validate_name("bob<script>"), Err(NameError::Charset('<')));
        assert_eq!(validate_name("a@b"), Err(NameError::Charset('@')));
    }

    #[test]
    fn test_validate_name_reserved_is_exact() {
        assert_eq!(validate_name("Admin"), Err(NameError::Reserved));
        assert_eq!(validate_name("A.d.m.i.n"), Err(NameError::Reserved));
        assert!(validate_name("Hostess").is_ok());
    }

    #[test]
    fn test_validate_name_banned_substring_insensitive() {
        assert_eq!(validate_name("xXShitXx"), Err(NameError::Banned));
        assert_eq!(validate_name("sh1t head"), Err(NameError::Banned));
        assert_eq!(validate_name("N.A.Z.I"), Err(NameError::Banned));
    }

    #[test]
    fn test_validate_name_decomposed_marks() {
        assert_eq!(validate_name("Zoe\u{0301}"), Ok("Zoe\u{0301}".to_string()));
        assert_eq!(validate_name("A\u{030A}dmin"), Err(NameError::Reserved));
        assert_eq!(validate_name("s\u{0302}hi\u{0303}t"), Err(NameError::Banned));
        assert_eq!(validate_name("ŝhĩt"), Err(NameError::Banned));
    }
}
