//! Modification tokens.
//!
//! A token tags one persisted state of a collection: `<millis>-<random>`,
//! where the prefix is the generation time in milliseconds since the epoch
//! and the suffix is random lowercase-alphanumeric noise. The monotonic
//! prefix gives optimistic-concurrency clients an ordering hint; equality is
//! the only operation the kernel itself relies on.

use chrono::Utc;
use rand::Rng;

const TOKEN_SUFFIX_LEN: usize = 9;
const TOKEN_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Generate a fresh modification token.
pub fn generate_modification_token() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..TOKEN_SUFFIX_LEN)
        .map(|_| TOKEN_ALPHABET[rng.gen_range(0..TOKEN_ALPHABET.len())] as char)
        .collect();
    format!("{}-{}", Utc::now().timestamp_millis(), suffix)
}

/// Check that `token` has the shape `<digits>-<lowercase alnum>`.
pub fn validate_modification_token(token: &str) -> bool {
    let Some((millis, suffix)) = token.split_once('-') else {
        return false;
    };
    !millis.is_empty()
        && millis.bytes().all(|b| b.is_ascii_digit())
        && !suffix.is_empty()
        && suffix
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_tokens_validate() {
        for _ in 0..64 {
            assert!(validate_modification_token(&generate_modification_token()));
        }
    }

    #[test]
    fn millis_prefixes_are_non_decreasing() {
        let first = generate_modification_token();
        let second = generate_modification_token();
        let millis = |token: &str| {
            token
                .split_once('-')
                .and_then(|(prefix, _)| prefix.parse::<i64>().ok())
                .unwrap()
        };
        assert!(millis(&first) <= millis(&second));
    }

    #[test]
    fn malformed_tokens_are_rejected() {
        assert!(!validate_modification_token(""));
        assert!(!validate_modification_token("12345"));
        assert!(!validate_modification_token("-abc"));
        assert!(!validate_modification_token("123-"));
        assert!(!validate_modification_token("abc-def"));
        assert!(!validate_modification_token("123-ABC"));
        assert!(!validate_modification_token("123-abc def"));
    }
}
