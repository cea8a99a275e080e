//! Rune classes shared by the scanner's matchers.

/// Punctuation allowed inside a path pattern besides identifier runes.
pub const PATTERN_PUNCTUATION: &str = "/*%.:-";

/// Letters accepted after `%` in a command.
pub const VALID_FLAGS: &str = "foObBedg%";

/// Identifiers are `[A-Za-z_]+`; everything else breaks one.
#[must_use]
pub const fn is_identifier_break(r: char) -> bool {
    !(r.is_ascii_alphabetic() || r == '_')
}

#[must_use]
pub fn is_pattern_break(r: char) -> bool {
    is_identifier_break(r) && !PATTERN_PUNCTUATION.contains(r)
}

#[must_use]
pub fn is_valid_flag(r: char) -> bool {
    r.is_ascii() && VALID_FLAGS.contains(r)
}

/// Shorten `s` to at most `max_len` characters for diagnostics.
#[must_use]
pub fn trim_text(s: &str, max_len: usize) -> String {
    s.char_indices()
        .nth(max_len)
        .map_or_else(|| s.to_string(), |(end, _)| format!("{}..", &s[..end]))
}
