use once_cell::sync::Lazy;
use regex::Regex;

static ORDINAL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^[[:punct:]]*\d+(?:st|nd|rd|th|s)[[:punct:]]*$").expect("valid regex")
});

/// Glyphs OCR commonly reads in place of a letter.
fn letter_for(c: char) -> Option<char> {
    match c {
        '0' => Some('o'),
        '1' => Some('l'),
        '|' => Some('i'),
        '5' => Some('s'),
        '$' => Some('s'),
        '@' => Some('a'),
        _ => None,
    }
}

/// Rewrite digit/symbol confusions inside words: `C1ean C0de` → `Clean Code`,
/// `Mart|n` → `Martin`.
///
/// A run of confusable glyphs is only replaced when it touches an ASCII letter
/// in the same token, so numbers such as `1984` or `Web 2.0` keep their
/// digits. Ordinals and decades (`5th`, `2nd`, `1980s`) are left alone.
/// Tokens whose letters are all uppercase get uppercase replacements. Applying
/// the rewrite twice gives the same result as applying it once.
pub fn fix_ocr_confusions(input: &str) -> String {
    input
        .split_whitespace()
        .map(fix_token)
        .collect::<Vec<_>>()
        .join(" ")
}

fn fix_token(token: &str) -> String {
    if ORDINAL_REGEX.is_match(token) {
        return token.to_string();
    }
    let chars: Vec<char> = token.chars().collect();
    let mut letters = chars.iter().filter(|c| c.is_ascii_alphabetic()).peekable();
    if letters.peek().is_none() {
        return token.to_string();
    }
    let shouting = letters.all(|c| c.is_ascii_uppercase());
    let is_letter = |idx: Option<usize>| {
        idx.and_then(|i| chars.get(i))
            .is_some_and(|c| c.is_ascii_alphabetic())
    };

    let mut out = String::with_capacity(token.len());
    let mut i = 0;
    while i < chars.len() {
        if letter_for(chars[i]).is_none() {
            out.push(chars[i]);
            i += 1;
            continue;
        }
        let start = i;
        while i < chars.len() && letter_for(chars[i]).is_some() {
            i += 1;
        }
        let run = &chars[start..i];
        if is_letter(start.checked_sub(1)) || is_letter(Some(i)) {
            out.extend(run.iter().filter_map(|&c| letter_for(c)).map(|l| {
                if shouting { l.to_ascii_uppercase() } else { l }
            }));
        } else {
            out.extend(run);
        }
    }
    out
}
