//! Username rules and their URL form.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

pub const MAX_USERNAME_CHARS: usize = 150;

/// Bytes escaped when a username becomes a single path segment.
const SEGMENT_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'@')
    .remove(b'+');

/// Letters, digits and `_ . @ + -`, at most 150 characters.
pub fn is_valid_username(username: &str) -> bool {
    !username.is_empty()
        && username.chars().count() <= MAX_USERNAME_CHARS
        && username
            .chars()
            .all(|ch| ch.is_alphanumeric() || matches!(ch, '_' | '.' | '@' | '+' | '-'))
}

/// The username as it appears inside `/profile/{username}/`.
pub fn username_segment(username: &str) -> String {
    utf8_percent_encode(username, SEGMENT_SET).to_string()
}
