//! Conservative OCR text cleanup.
//!
//! Only glyphs that are never part of a book cover's wording are touched.
//! Digit/letter confusions are left alone here; see [`super::noise`] for the
//! search-side rewrite.

/// Characters that OCR engines emit for specks, rules and ornaments.
const NOISE_CHARS: &[char] = &['~', '_', '•', '¦', '«', '»', '*', '^', '`', '¤', '§'];

/// Punctuation whose doubled runs (`..`, `--`, `,,`) are collapsed.
const COLLAPSIBLE_PUNCT: &[char] = &['.', ',', ':', ';', '-'];

/// `None` stays `None`, `""` stays `""`, anything else goes through [`clean_str`].
pub fn clean_text(input: Option<&str>) -> Option<String> {
    input.map(clean_str)
}

pub fn clean_str(input: &str) -> String {
    if input.is_empty() {
        return String::new();
    }

    let normalized: String = input
        .replace("\r\n", "\n")
        .chars()
        .filter_map(|c| match c {
            '\r' => Some('\n'),
            '\n' | '\t' => Some(c),
            c if c.is_control() => None,
            c if NOISE_CHARS.contains(&c) => Some(' '),
            c => Some(c),
        })
        .collect();

    let mut lines: Vec<String> = Vec::new();
    for raw_line in normalized.split('\n') {
        let line = clean_line(raw_line);
        // keep at most one blank line between text lines
        if line.is_empty() && lines.last().is_none_or(|prev| prev.is_empty()) {
            continue;
        }
        lines.push(line);
    }
    while lines.last().is_some_and(|line| line.is_empty()) {
        lines.pop();
    }

    lines.join("\n")
}

fn clean_line(line: &str) -> String {
    let tokens: Vec<String> = line
        .split_whitespace()
        .filter(|token| !token.chars().all(|c| c == '|'))
        .map(collapse_punctuation)
        .filter(|token| !token.is_empty())
        .collect();
    tokens.join(" ")
}

fn collapse_punctuation(token: &str) -> String {
    let mut out = String::with_capacity(token.len());
    let mut prev: Option<char> = None;
    for c in token.chars() {
        if COLLAPSIBLE_PUNCT.contains(&c) && prev == Some(c) {
            continue;
        }
        out.push(c);
        prev = Some(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_and_empty_pass_through() {
        assert_eq!(clean_text(None), None);
        assert_eq!(clean_text(Some("")), Some(String::new()));
    }

    #[test]
    fn collapses_whitespace_per_line() {
        assert_eq!(clean_str("  Clean    Code \t "), "Clean Code");
    }

    #[test]
    fn drops_noise_glyphs_and_pipe_tokens() {
        assert_eq!(clean_str("~~ Clean | Code __"), "Clean Code");
        assert_eq!(clean_str("• Robert C. Martin •"), "Robert C. Martin");
    }

    #[test]
    fn keeps_pipe_inside_words() {
        // in-word pipes are a letter confusion, handled on the search side
        assert_eq!(clean_str("Mart|n"), "Mart|n");
    }

    #[test]
    fn collapses_repeated_punctuation() {
        assert_eq!(clean_str("Wait.... what,, now -- ok"), "Wait. what, now - ok");
    }

    #[test]
    fn collapses_blank_line_runs() {
        let raw = "\n\nClean Code\n\n\n\nRobert C. Martin\n\n";
        assert_eq!(clean_str(raw), "Clean Code\n\nRobert C. Martin");
    }

    #[test]
    fn strips_control_characters_and_carriage_returns() {
        assert_eq!(clean_str("Clean\u{0007} Code\r\n2008"), "Clean Code\n2008");
    }

    #[test]
    fn digits_are_not_rewritten() {
        assert_eq!(clean_str("1984"), "1984");
        assert_eq!(clean_str("C0de"), "C0de");
    }

    #[test]
    fn whitespace_only_becomes_empty() {
        assert_eq!(clean_str(" \n \t \n"), "");
    }
}
