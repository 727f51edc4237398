//! Phone token normalization.
//!
//! Canonicalizes user-supplied phone tokens into digits-only strings. A token
//! starting with `#` is a chat-index reference and is substituted with that
//! chat's contact user id before stripping. Short numbers (8 digits or fewer
//! after stripping) get the configured default country code prepended.

use crate::chats::ChatCache;
use crate::errors::PhoneError;

/// Default country code prepended to short local numbers.
pub const DEFAULT_COUNTRY_CODE: &str = "504";

/// Normalize a phone token into a canonical digit string.
///
/// The only validation performed is `#n` index resolution; anything else
/// degrades to "strip non-digits, maybe prefix" with no length or format
/// checks beyond the 8-digit threshold.
pub fn normalize(token: &str, chats: &ChatCache, default_cc: &str) -> Result<String, PhoneError> {
    let working = if let Some(index_str) = token.strip_prefix('#') {
        let index: usize = index_str
            .parse()
            .map_err(|_| PhoneError::InvalidIndex(index_str.to_string()))?;
        if !chats.is_populated() {
            return Err(PhoneError::NoChatIndex);
        }
        chats
            .get(index)
            .ok_or(PhoneError::IndexOutOfRange(index))?
            .id
            .clone()
    } else {
        token.to_string()
    };

    let digits: String = working.chars().filter(char::is_ascii_digit).collect();
    if digits.len() > 8 {
        Ok(digits)
    } else {
        Ok(format!("{default_cc}{digits}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chats::ChatEntry;

    fn cache_with(id: &str) -> ChatCache {
        let mut cache = ChatCache::default();
        cache.replace(vec![ChatEntry {
            id: id.to_string(),
            name: "Ana".to_string(),
            unread_count: 0,
            is_group: false,
            group_size: 0,
            participants: vec![],
        }]);
        cache
    }

    #[test]
    fn test_short_number_gets_country_code() {
        let cache = ChatCache::default();
        assert_eq!(
            normalize("99998888", &cache, DEFAULT_COUNTRY_CODE).unwrap(),
            "50499998888"
        );
    }

    #[test]
    fn test_long_number_passes_through() {
        let cache = ChatCache::default();
        assert_eq!(
            normalize("50499998888", &cache, DEFAULT_COUNTRY_CODE).unwrap(),
            "50499998888"
        );
    }

    #[test]
    fn test_strips_formatting_characters() {
        let cache = ChatCache::default();
        assert_eq!(
            normalize("+504 9999-8888", &cache, DEFAULT_COUNTRY_CODE).unwrap(),
            "50499998888"
        );
        assert_eq!(
            normalize("9999-8888", &cache, DEFAULT_COUNTRY_CODE).unwrap(),
            "50499998888"
        );
    }

    #[test]
    fn test_exactly_nine_digits_unchanged() {
        let cache = ChatCache::default();
        assert_eq!(
            normalize("123456789", &cache, DEFAULT_COUNTRY_CODE).unwrap(),
            "123456789"
        );
    }

    #[test]
    fn test_index_reference_resolves_to_chat_id() {
        let cache = cache_with("50477776666");
        assert_eq!(
            normalize("#0", &cache, DEFAULT_COUNTRY_CODE).unwrap(),
            "50477776666"
        );
    }

    #[test]
    fn test_index_reference_with_short_id_gets_prefix() {
        let cache = cache_with("77776666");
        assert_eq!(
            normalize("#0", &cache, DEFAULT_COUNTRY_CODE).unwrap(),
            "50477776666"
        );
    }

    #[test]
    fn test_index_into_empty_cache_fails() {
        let cache = ChatCache::default();
        assert_eq!(
            normalize("#0", &cache, DEFAULT_COUNTRY_CODE),
            Err(PhoneError::NoChatIndex)
        );
    }

    #[test]
    fn test_index_out_of_range_fails() {
        let cache = cache_with("50477776666");
        assert_eq!(
            normalize("#5", &cache, DEFAULT_COUNTRY_CODE),
            Err(PhoneError::IndexOutOfRange(5))
        );
    }

    #[test]
    fn test_non_numeric_index_fails() {
        let cache = cache_with("50477776666");
        assert!(matches!(
            normalize("#abc", &cache, DEFAULT_COUNTRY_CODE),
            Err(PhoneError::InvalidIndex(_))
        ));
    }

    #[test]
    fn test_custom_country_code() {
        let cache = ChatCache::default();
        assert_eq!(normalize("12345678", &cache, "49").unwrap(), "4912345678");
    }
}
