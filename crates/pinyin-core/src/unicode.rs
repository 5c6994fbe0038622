//! Character-level Unicode classification for Chinese text.

/// CJK Unified Ideographs, Extension A, Extension B, and the ideographic
/// zero (〇, U+3007) which dictionaries carry as a numeral.
pub fn is_hanzi(c: char) -> bool {
    ('\u{4E00}'..='\u{9FFF}').contains(&c)
        || ('\u{3400}'..='\u{4DBF}').contains(&c)
        || ('\u{20000}'..='\u{2A6DF}').contains(&c)
        || ('\u{F900}'..='\u{FAFF}').contains(&c)
        || c == '\u{3007}'
}

/// True if the string contains at least one Chinese character.
pub fn contains_hanzi(s: &str) -> bool {
    s.chars().any(is_hanzi)
}

/// ASCII letters and digits, plus any character of `allowed_punctuation`.
///
/// Chinese characters never pass through, whatever the punctuation list says.
pub fn is_passthrough(c: char, allowed_punctuation: &str) -> bool {
    if is_hanzi(c) {
        return false;
    }
    c.is_ascii_alphanumeric() || (c.is_ascii_punctuation() && allowed_punctuation.contains(c))
}
