/// Characters that show up in product and technical vocabulary but are
/// missing from many bulk dictionaries.
static BUILTIN: &[(char, &str)] = &[
    ('〇', "líng"),
    ('嗯', "ēn"),
    ('哦', "ó"),
    ('呗', "bei"),
    ('啰', "luō"),
    ('喵', "miāo"),
    ('嘚', "dē"),
    ('咩', "miē"),
    ('囧', "jiǒng"),
    ('槑', "méi"),
];

/// Last-resort pronunciation before a character is declared unresolved.
pub fn builtin_fallback(c: char) -> Option<&'static str> {
    BUILTIN
        .iter()
        .find(|&&(k, _)| k == c)
        .map(|&(_, v)| v)
}
