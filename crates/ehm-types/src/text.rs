//! Bounded diagnostic strings.
//!
//! Event messages and context names are copied into the event when it is
//! created or raised. Both are bounded; over-long input is truncated on a
//! character boundary, never rejected.

/// Maximum number of characters kept from an event message.
pub const MAX_MESSAGE_CHARS: usize = 155;

/// Maximum number of characters kept from a context name.
pub const MAX_NAME_CHARS: usize = 99;

/// Copies at most `max` characters of `text`.
///
/// # Example
///
/// ```
/// use ehm_types::truncate_chars;
///
/// assert_eq!(truncate_chars("hello", 3), "hel");
/// assert_eq!(truncate_chars("héllo", 2), "hé");
/// assert_eq!(truncate_chars("hi", 10), "hi");
/// ```
#[must_use]
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((end, _)) => text[..end].to_string(),
        None => text.to_string(),
    }
}
