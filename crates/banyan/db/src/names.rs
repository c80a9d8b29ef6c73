//! Collection name grammar.

use crate::error::{DbError, DbResult};

/// Names refused regardless of sanitisation, compared case-insensitively.
pub const RESERVED_COLLECTION_NAMES: &[&str] = &["index", "master", "system", "admin"];

/// Characters a collection name may not contain.
pub const DISALLOWED_NAME_CHARACTERS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Strip every disallowed character from `name`.
pub fn sanitise_collection_name(name: &str) -> String {
    name.chars()
        .filter(|c| !DISALLOWED_NAME_CHARACTERS.contains(c))
        .collect()
}

/// Apply the grammar: non-empty, no disallowed characters (stripped when
/// `strip` is set, rejected otherwise). Returns the effective name.
pub(crate) fn normalise_collection_name(name: &str, strip: bool) -> DbResult<String> {
    if name.trim().is_empty() {
        return Err(DbError::InvalidCollectionName(
            "collection name must not be empty".to_string(),
        ));
    }
    let effective = if strip {
        sanitise_collection_name(name)
    } else {
        if let Some(bad) = name.chars().find(|c| DISALLOWED_NAME_CHARACTERS.contains(c)) {
            return Err(DbError::InvalidCollectionName(format!(
                "collection name '{}' contains disallowed character '{}'",
                name, bad
            )));
        }
        name.to_string()
    };
    if effective.trim().is_empty() {
        return Err(DbError::InvalidCollectionName(format!(
            "collection name '{}' is empty after sanitisation",
            name
        )));
    }
    Ok(effective)
}

/// Refuse reserved names. Runs after sanitisation.
pub(crate) fn ensure_not_reserved(name: &str) -> DbResult<()> {
    if RESERVED_COLLECTION_NAMES
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(name))
    {
        return Err(DbError::InvalidCollectionName(format!(
            "collection name '{}' is reserved",
            name
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_names_pass_through() {
        assert_eq!(normalise_collection_name("users", false).unwrap(), "users");
        assert_eq!(normalise_collection_name("users", true).unwrap(), "users");
    }

    #[test]
    fn disallowed_characters_are_rejected_without_stripping() {
        for raw in ["a/b", "a\\b", "a:b", "a*b", "a?b", "a\"b", "a<b", "a>b", "a|b"] {
            assert!(normalise_collection_name(raw, false).is_err(), "{raw}");
        }
    }

    #[test]
    fn stripping_removes_disallowed_characters() {
        assert_eq!(
            normalise_collection_name("us/er:s?", true).unwrap(),
            "users"
        );
    }

    #[test]
    fn name_of_only_disallowed_characters_fails_even_when_stripping() {
        assert!(normalise_collection_name("///", true).is_err());
    }

    #[test]
    fn empty_name_is_rejected() {
        assert!(normalise_collection_name("", false).is_err());
        assert!(normalise_collection_name("   ", false).is_err());
    }

    #[test]
    fn reserved_names_are_case_insensitive() {
        assert!(ensure_not_reserved("index").is_err());
        assert!(ensure_not_reserved("MASTER").is_err());
        assert!(ensure_not_reserved("System").is_err());
        assert!(ensure_not_reserved("aDmIn").is_err());
        assert!(ensure_not_reserved("users").is_ok());
    }
}
