//! Tone encodings for pinyin syllables.
//!
//! Tiers store the diacritic form (`xíng`). The ASCII form strips the
//! diacritic (`xing`, with `ü` written as `v`), and the numbered form
//! appends the tone digit (`xing2`). Stripping loses the tone but never
//! the base syllable.

/// (marked char, base char, tone). `ü` maps to base `ü` here; the ASCII
/// forms turn it into `v` afterwards.
static MARKS: &[(char, char, u8)] = &[
    ('ā', 'a', 1),
    ('á', 'a', 2),
    ('ǎ', 'a', 3),
    ('à', 'a', 4),
    ('ō', 'o', 1),
    ('ó', 'o', 2),
    ('ǒ', 'o', 3),
    ('ò', 'o', 4),
    ('ē', 'e', 1),
    ('é', 'e', 2),
    ('ě', 'e', 3),
    ('è', 'e', 4),
    ('ī', 'i', 1),
    ('í', 'i', 2),
    ('ǐ', 'i', 3),
    ('ì', 'i', 4),
    ('ū', 'u', 1),
    ('ú', 'u', 2),
    ('ǔ', 'u', 3),
    ('ù', 'u', 4),
    ('ǖ', 'ü', 1),
    ('ǘ', 'ü', 2),
    ('ǚ', 'ü', 3),
    ('ǜ', 'ü', 4),
    ('ń', 'n', 2),
    ('ň', 'n', 3),
    ('ǹ', 'n', 4),
    ('ḿ', 'm', 2),
    ('ế', 'ê', 2),
    ('ề', 'ê', 4),
];

fn unmark(c: char) -> Option<(char, u8)> {
    MARKS
        .iter()
        .find(|&&(marked, _, _)| marked == c)
        .map(|&(_, base, tone)| (base, tone))
}

fn mark(base: char, tone: u8) -> Option<char> {
    MARKS
        .iter()
        .find(|&&(_, b, t)| b == base && t == tone)
        .map(|&(marked, _, _)| marked)
}

fn ascii_base(c: char) -> char {
    match c {
        'ü' => 'v',
        'ê' => 'e',
        other => other,
    }
}

fn is_combining_mark(c: char) -> bool {
    ('\u{0300}'..='\u{036F}').contains(&c)
}

/// Remove tone diacritics: `xíng` → `xing`, `lǜ` → `lv`.
///
/// Characters outside the substitution table pass through unchanged, so
/// stripping an already-plain string is the identity.
pub fn strip_diacritic(s: &str) -> String {
    s.chars()
        .filter(|&c| !is_combining_mark(c))
        .map(|c| match unmark(c) {
            Some((base, _)) => ascii_base(base),
            None => ascii_base(c),
        })
        .collect()
}

/// True when both pronunciations share the same base syllable(s).
pub fn same_base(a: &str, b: &str) -> bool {
    a == b || strip_diacritic(a) == strip_diacritic(b)
}

/// Tone number carried by a diacritic syllable; 0 for neutral / unmarked.
pub fn tone_of(syllable: &str) -> u8 {
    syllable
        .chars()
        .find_map(|c| unmark(c).map(|(_, tone)| tone))
        .unwrap_or(0)
}

/// Diacritic form to numbered form, syllable by syllable: `xíng` → `xing2`.
/// Neutral-tone syllables carry no digit.
pub fn to_numbered(s: &str) -> String {
    map_syllables(s, |syllable| {
        let tone = tone_of(syllable);
        let mut out = strip_diacritic(syllable);
        if tone > 0 {
            out.push(char::from(b'0' + tone));
        }
        out
    })
}

/// Numbered or plain form to diacritic form: `xing2` → `xíng`, `lv4` → `lǜ`.
///
/// A trailing `0` or `5`, or no digit at all, yields the neutral tone. The
/// mark goes on `a` or `e` if present, on the `o` of `ou`, otherwise on the
/// last vowel; syllabic `m`/`n` take it when there is no vowel.
pub fn from_numbered(s: &str) -> String {
    map_syllables(s, |syllable| {
        let (body, tone) = match syllable.chars().last() {
            Some(d @ '0'..='5') => (&syllable[..syllable.len() - 1], d as u8 - b'0'),
            _ => (syllable, 0),
        };
        let mut chars: Vec<char> = body
            .chars()
            .map(|c| if c == 'v' { 'ü' } else { c })
            .collect();
        if tone == 0 || tone == 5 {
            return chars.into_iter().collect();
        }
        if let Some(pos) = mark_position(&chars) {
            if let Some(marked) = mark(chars[pos], tone) {
                chars[pos] = marked;
            }
        }
        chars.into_iter().collect()
    })
}

/// User-supplied reading to diacritic form: numbered input (`hao3`) is
/// converted, anything else is only trimmed.
pub fn to_diacritic(pronunciation: &str) -> String {
    let p = pronunciation.trim();
    if p.chars().any(|c| c.is_ascii_digit()) {
        from_numbered(p)
    } else {
        p.to_string()
    }
}

/// True when `s` carries neither a tone mark nor a tone digit.
pub fn is_toneless(s: &str) -> bool {
    !s.chars().any(|c| c.is_ascii_digit() || unmark(c).is_some())
}

fn mark_position(chars: &[char]) -> Option<usize> {
    if let Some(pos) = chars.iter().position(|&c| c == 'a' || c == 'e' || c == 'ê') {
        return Some(pos);
    }
    if let Some(pos) = chars.windows(2).position(|w| w == ['o', 'u']) {
        return Some(pos);
    }
    if let Some(pos) = chars
        .iter()
        .rposition(|&c| matches!(c, 'i' | 'o' | 'u' | 'ü'))
    {
        return Some(pos);
    }
    chars.iter().rposition(|&c| c == 'n' || c == 'm')
}

fn map_syllables(s: &str, f: impl Fn(&str) -> String) -> String {
    s.split(' ')
        .map(|syllable| if syllable.is_empty() { String::new() } else { f(syllable) })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Whether `s` parses as a pinyin pronunciation: one or more space-separated
/// syllables of lowercase ASCII letters, `ü`, or tone-marked vowels, with at
/// most one tone mark per syllable.
pub fn is_valid_pronunciation(s: &str) -> bool {
    if s.is_empty() {
        return false;
    }
    s.split(' ').all(|syllable| {
        if syllable.is_empty() {
            return false;
        }
        let mut marks = 0;
        for c in syllable.chars() {
            if unmark(c).is_some() {
                marks += 1;
            } else if !(c.is_ascii_lowercase() || c == 'ü' || c == 'ê') {
                return false;
            }
        }
        marks <= 1
    })
}

/// First letter of each syllable, lowercase ASCII.
pub fn initial(syllable: &str) -> Option<char> {
    strip_diacritic(syllable).chars().next()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_strip_diacritic() {
        assert_eq!(strip_diacritic("xíng"), "xing");
        assert_eq!(strip_diacritic("háng"), "hang");
        assert_eq!(strip_diacritic("lǜ"), "lv");
        assert_eq!(strip_diacritic("nǚ ér"), "nv er");
        assert_eq!(strip_diacritic("de"), "de");
        assert_eq!(strip_diacritic("ń"), "n");
        assert_eq!(strip_diacritic(""), "");
    }

    #[test]
    fn test_strip_combining_marks() {
        assert_eq!(strip_diacritic("m\u{0300}"), "m");
    }

    #[test]
    fn test_tone_of() {
        assert_eq!(tone_of("mā"), 1);
        assert_eq!(tone_of("má"), 2);
        assert_eq!(tone_of("mǎ"), 3);
        assert_eq!(tone_of("mà"), 4);
        assert_eq!(tone_of("ma"), 0);
    }

    #[test]
    fn test_to_numbered() {
        assert_eq!(to_numbered("xíng"), "xing2");
        assert_eq!(to_numbered("chóng qìng"), "chong2 qing4");
        assert_eq!(to_numbered("lǜ"), "lv4");
        assert_eq!(to_numbered("le"), "le");
    }

    #[test]
    fn test_from_numbered_placement() {
        assert_eq!(from_numbered("xing2"), "xíng");
        assert_eq!(from_numbered("hao3"), "hǎo");
        assert_eq!(from_numbered("xie4"), "xiè");
        assert_eq!(from_numbered("gou3"), "gǒu");
        assert_eq!(from_numbered("liu2"), "liú");
        assert_eq!(from_numbered("gui4"), "guì");
        assert_eq!(from_numbered("lv4"), "lǜ");
        assert_eq!(from_numbered("n2"), "ń");
        assert_eq!(from_numbered("de5"), "de");
        assert_eq!(from_numbered("de"), "de");
        assert_eq!(from_numbered("chong2 qing4"), "chóng qìng");
    }

    #[test]
    fn test_to_diacritic() {
        assert_eq!(to_diacritic(" hao3 "), "hǎo");
        assert_eq!(to_diacritic("yin2 hang2"), "yín háng");
        assert_eq!(to_diacritic("háng"), "háng");
        assert_eq!(to_diacritic("HAO"), "HAO");
    }

    #[test]
    fn test_is_toneless() {
        assert!(is_toneless("da"));
        assert!(is_toneless("lü"));
        assert!(!is_toneless("dá"));
        assert!(!is_toneless("da2"));
    }

    #[test]
    fn test_same_base() {
        assert!(same_base("xíng", "xing"));
        assert!(same_base("xíng", "xìng"));
        assert!(!same_base("xíng", "háng"));
    }

    #[test]
    fn test_is_valid_pronunciation() {
        assert!(is_valid_pronunciation("xíng"));
        assert!(is_valid_pronunciation("hang"));
        assert!(is_valid_pronunciation("chóng qìng"));
        assert!(is_valid_pronunciation("lǜ"));
        assert!(!is_valid_pronunciation(""));
        assert!(!is_valid_pronunciation("Xing"));
        assert!(!is_valid_pronunciation("xing2"));
        assert!(!is_valid_pronunciation("xíǹg"));
        assert!(!is_valid_pronunciation("a  b"));
        assert!(!is_valid_pronunciation("行"));
    }

    #[test]
    fn test_initial() {
        assert_eq!(initial("yín"), Some('y'));
        assert_eq!(initial("ǎi"), Some('a'));
        assert_eq!(initial(""), None);
    }

    const BASES: &[&str] = &[
        "a", "ai", "ang", "bao", "chuang", "de", "er", "gou", "guo", "hang", "jiong", "kuai",
        "liu", "lv", "lve", "mian", "nv", "ou", "qiu", "shui", "xing", "xue", "yue", "zhuang",
    ];

    proptest! {
        #[test]
        fn prop_roundtrip_on_base_syllable(idx in 0..BASES.len(), tone in 1u8..=4) {
            let numbered = format!("{}{}", BASES[idx], tone);
            let marked = from_numbered(&numbered);
            prop_assert_eq!(strip_diacritic(&marked), BASES[idx]);
            prop_assert_eq!(tone_of(&marked), tone);
            prop_assert_eq!(
                strip_diacritic(&from_numbered(&to_numbered(&marked))),
                strip_diacritic(&marked)
            );
            prop_assert!(is_valid_pronunciation(&marked));
        }
    }
}
