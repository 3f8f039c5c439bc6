//! Key name rules shared by every operation that takes a key.

use std::collections::BTreeMap;

use tracing::warn;

use super::domain::MAX_KEY_LEN;
use crate::errors::KvError;

const DISALLOWED_CHARS: &[char] = &['\'', '"', '`', '#', '_', '*', '%'];
const DISALLOWED_SEQUENCES: &[&str] = &["--", "*/", "/*"];

/// Rule a rejected key broke. Checked in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyRule {
    TooLong,
    Whitespace,
    DisallowedCharacter,
    DisallowedSequence,
}

impl KeyRule {
    pub fn describe(&self, key: &str) -> String {
        match self {
            KeyRule::TooLong => {
                format!("Key length cannot exceed {MAX_KEY_LEN} characters, key='{key}'.")
            }
            KeyRule::Whitespace => format!("Whitespace is not allowed in keys, key='{key}'."),
            KeyRule::DisallowedCharacter => format!(
                "The characters ',\",`,#,_,*, and % are not allowed in keys, key='{key}'."
            ),
            KeyRule::DisallowedSequence => {
                format!("The sequences --, */, and /* are not allowed in keys, key='{key}'.")
            }
        }
    }
}

fn first_violation(key: &str) -> Option<KeyRule> {
    if key.chars().count() > MAX_KEY_LEN {
        return Some(KeyRule::TooLong);
    }
    if key.chars().any(char::is_whitespace) {
        return Some(KeyRule::Whitespace);
    }
    if key.contains(DISALLOWED_CHARS) {
        return Some(KeyRule::DisallowedCharacter);
    }
    if DISALLOWED_SEQUENCES.iter().any(|s| key.contains(s)) {
        return Some(KeyRule::DisallowedSequence);
    }
    None
}

pub fn validate_key(key: &str) -> Result<(), KvError> {
    match first_violation(key) {
        None => Ok(()),
        Some(rule) => {
            warn!(key, ?rule, "key rejected");
            Err(KvError::KeyFormat { key: key.to_string(), rule })
        }
    }
}

/// Check every key; report all offenders at once.
pub fn validate_key_list<S: AsRef<str>>(keys: &[S]) -> Result<(), KvError> {
    let errors: BTreeMap<String, String> = keys
        .iter()
        .map(AsRef::as_ref)
        .filter_map(|k| first_violation(k).map(|rule| (k.to_string(), rule.describe(k))))
        .collect();
    if errors.is_empty() {
        return Ok(());
    }
    warn!(count = errors.len(), "key list rejected");
    Err(KvError::BadKeyList { errors })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule_of(key: &str) -> Option<KeyRule> {
        match validate_key(key) {
            Ok(()) => None,
            Err(KvError::KeyFormat { rule, .. }) => Some(rule),
            Err(other) => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn accepts_ordinary_keys() {
        let longest = "k".repeat(50);
        for k in ["a", "Foo", "theme.dark", "user-prefs/v2", "ключ", longest.as_str()] {
            assert_eq!(rule_of(k), None, "{k}");
        }
    }

    #[test]
    fn each_rule_is_reported() {
        assert_eq!(rule_of(&"k".repeat(51)), Some(KeyRule::TooLong));
        assert_eq!(rule_of("bad key"), Some(KeyRule::Whitespace));
        assert_eq!(rule_of("tab\tkey"), Some(KeyRule::Whitespace));
        for c in ['\'', '"', '`', '#', '_', '*', '%'] {
            assert_eq!(rule_of(&format!("a{c}b")), Some(KeyRule::DisallowedCharacter), "{c}");
        }
        assert_eq!(rule_of("a--b"), Some(KeyRule::DisallowedSequence));
    }

    #[test]
    fn first_violation_wins() {
        // too long and contains whitespace: length is checked first
        let key = format!("{} x", "k".repeat(50));
        assert_eq!(rule_of(&key), Some(KeyRule::TooLong));
        assert_eq!(rule_of("a b%"), Some(KeyRule::Whitespace));
    }

    #[test]
    fn message_names_key() {
        let err = validate_key("bad key").unwrap_err();
        assert!(err.to_string().contains("key='bad key'"));
    }

    #[test]
    fn list_reports_every_offender() {
        let keys = ["ok", "bad key", "x%", "fine"];
        match validate_key_list(&keys) {
            Err(KvError::BadKeyList { errors }) => {
                assert_eq!(errors.len(), 2);
                assert!(errors["bad key"].contains("Whitespace"));
                assert!(errors["x%"].contains("not allowed"));
            }
            other => panic!("expected BadKeyList, got {other:?}"),
        }
        assert!(validate_key_list(&["a", "b"]).is_ok());
        assert!(validate_key_list::<&str>(&[]).is_ok());
    }
}
