use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref TOKEN_RE: Regex = Regex::new(r"[a-zA-Z]+|[0-9]+").expect("valid regex");
    static ref TAG_RE: Regex = Regex::new(r"<[^>]*>").expect("valid regex");
    static ref EQUAL_SHAPED: HashMap<char, char> = {
        let pairs: &[(char, char)] = &[
            ('У', 'Y'), ('у', 'y'),
            ('К', 'K'), ('к', 'k'),
            ('Е', 'E'), ('е', 'e'),
            ('Н', 'H'), ('н', 'h'),
            ('Х', 'X'), ('х', 'x'),
            ('В', 'B'), ('в', 'b'),
            ('А', 'A'), ('а', 'a'),
            ('Р', 'P'), ('р', 'p'),
            ('О', 'O'), ('о', 'o'),
            ('С', 'C'), ('с', 'c'),
            ('М', 'M'), ('м', 'm'),
            ('Т', 'T'), ('т', 't'),
            ('З', '3'), ('з', '3'),
            ('п', 'n'),
        ];
        pairs.iter().copied().collect()
    };
}

fn join_tokens(s: &str) -> String {
    TOKEN_RE
        .find_iter(s)
        .map(|m| m.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Strip markup from source text. Fills the sanitizer role of the build
/// pipeline: corpus lines may carry HTML, the index must not.
pub fn strip_tags(s: &str) -> String {
    TAG_RE.replace_all(s, "").into_owned()
}

/// Normalize text for indexing and prefix lookup: NFKC fold, strip markup,
/// lowercase, then join alphabetic and numeric runs with single spaces.
/// Runs of mixed kind split, so "mk2" normalizes to "mk 2".
pub fn normalize(s: &str) -> String {
    let folded = s.nfkc().collect::<String>();
    let stripped = strip_tags(&folded);
    join_tokens(&stripped.to_lowercase())
}

/// The token-join step alone, preserving case. Highlighting tokenizes the
/// raw query with this before lowercasing on its own.
pub fn alpha_normalize(s: &str) -> String {
    join_tokens(s)
}

/// Map Cyrillic characters that render identically to Latin ones (У->Y,
/// С->C, З->3, ...) onto their Latin shapes, both cases.
pub fn to_equal_shaped_latin(s: &str) -> String {
    s.chars()
        .map(|c| EQUAL_SHAPED.get(&c).copied().unwrap_or(c))
        .collect()
}

/// `normalize` with the equal-shaped Latin mapping applied after
/// lowercasing, for deployments that index mixed-alphabet text.
pub fn equal_shaped_normalize(s: &str) -> String {
    let folded = s.nfkc().collect::<String>();
    let stripped = strip_tags(&folded);
    join_tokens(&to_equal_shaped_latin(&stripped.to_lowercase()))
}
