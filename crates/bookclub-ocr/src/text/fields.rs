//! Line-oriented heuristics that pull book fields out of cleaned cover text.
//!
//! Every extractor is best effort: false positives and misses are expected,
//! the user edits the result downstream.

use chrono::{Datelike, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::identifiers::extract::{extract_isbn, isbn_span};
use crate::text::cleanup::clean_str;

static ISBN_LABEL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bisbn\b").expect("valid regex"));
static BY_LINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:(?:written\s+)?by\s+|authors?\s*:\s*)(.+)$").expect("valid regex")
});
static PUBLISHER_LINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:published\s+by\s+|publisher\s*:\s*)(.+)$").expect("valid regex")
});
static COPYRIGHT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(©|\(c\)|\bcopyright\b)").expect("valid regex"));
static BARE_NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\d\s.,:;/\-]+$").expect("valid regex"));
static PRICE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[$€£]\s?\d").expect("valid regex"));
static YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{4})\b").expect("valid regex"));
static INITIAL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:[A-Z]\.)+$").expect("valid regex"));

const EARLIEST_YEAR: i32 = 1450;

const PUBLISHER_SUFFIXES: &[&str] = &[
    "press",
    "publishing",
    "publishers",
    "publications",
    "books",
    "hall",
    "house",
    "media",
];

const NAME_PARTICLES: &[&str] = &["van", "von", "de", "der", "den", "da", "di", "du", "le", "la"];

const NAME_STOPWORDS: &[&str] = &[
    "the", "of", "and", "a", "an", "to", "in", "for", "on", "with", "edition", "volume",
];

/// Fields recovered from one OCR pass. Absent fields are `None`; nothing is
/// persisted apart from the owning book record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedFields {
    pub isbn: Option<String>,
    pub title: Option<String>,
    pub author: Option<String>,
    pub publisher: Option<String>,
    pub published_date: Option<String>,
    pub description: Option<String>,
}

impl ExtractedFields {
    pub fn is_empty(&self) -> bool {
        self.isbn.is_none()
            && self.title.is_none()
            && self.author.is_none()
            && self.publisher.is_none()
            && self.published_date.is_none()
            && self.description.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineKind {
    Isbn,
    ByLine,
    Publisher,
    Copyright,
    Number,
    Price,
    Text,
}

#[derive(Debug)]
struct ScanLine<'a> {
    text: &'a str,
    kind: LineKind,
}

impl ScanLine<'_> {
    fn is_text(&self) -> bool {
        self.kind == LineKind::Text
    }
}

fn classify(text: &str) -> LineKind {
    if ISBN_LABEL_RE.is_match(text) || extract_isbn(text).is_some() {
        LineKind::Isbn
    } else if BY_LINE_RE.is_match(text) {
        LineKind::ByLine
    } else if PUBLISHER_LINE_RE.is_match(text) {
        LineKind::Publisher
    } else if COPYRIGHT_RE.is_match(text) {
        LineKind::Copyright
    } else if BARE_NUMBER_RE.is_match(text) {
        LineKind::Number
    } else if PRICE_RE.is_match(text) {
        LineKind::Price
    } else {
        LineKind::Text
    }
}

fn scan_lines(cleaned: &str) -> Vec<ScanLine<'_>> {
    cleaned
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|text| ScanLine {
            text,
            kind: classify(text),
        })
        .collect()
}

fn trim_field(value: &str) -> Option<String> {
    let trimmed = value
        .trim()
        .trim_matches(|c: char| matches!(c, ',' | ';' | ':' | '-' | '/'))
        .trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn letter_count(text: &str) -> usize {
    text.chars().filter(|c| c.is_alphabetic()).count()
}

fn looks_like_title(text: &str) -> bool {
    let letters = letter_count(text);
    let visible = text.chars().filter(|c| !c.is_whitespace()).count();
    if text.chars().count() < 3 || letters < 2 || letters * 2 < visible {
        return false;
    }
    let has_upper = text.chars().any(char::is_uppercase);
    let words = text
        .split_whitespace()
        .filter(|word| letter_count(word) >= 2)
        .count();
    has_upper || words >= 2
}

fn is_name_token(token: &str, position: usize) -> bool {
    if INITIAL_RE.is_match(token) {
        return true;
    }
    let lower = token.to_lowercase();
    if NAME_STOPWORDS.contains(&lower.as_str()) {
        return false;
    }
    if position > 0 && NAME_PARTICLES.contains(&lower.as_str()) {
        return true;
    }
    let mut chars = token.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    first.is_uppercase()
        && letter_count(token) >= 2
        && chars.all(|c| c.is_alphabetic() || c == '\'' || c == '-' || c == '.')
}

fn ends_with_publisher_word(text: &str) -> bool {
    text.split_whitespace()
        .last()
        .map(|word| word.trim_end_matches(['.', ',']).to_lowercase())
        .is_some_and(|word| PUBLISHER_SUFFIXES.contains(&word.as_str()))
}

fn looks_like_person_name(text: &str) -> bool {
    if text.chars().count() > 40 || text.chars().any(|c| c.is_ascii_digit()) {
        return false;
    }
    let tokens: Vec<&str> = text.split_whitespace().collect();
    (2..=4).contains(&tokens.len())
        && !ends_with_publisher_word(text)
        && tokens
            .iter()
            .enumerate()
            .all(|(i, token)| is_name_token(token, i))
}

fn title_index(lines: &[ScanLine<'_>]) -> Option<usize> {
    lines
        .iter()
        .position(|line| line.is_text() && looks_like_title(line.text))
}

/// The author, plus the index of the line it came from.
fn author_with_index(lines: &[ScanLine<'_>], title_idx: Option<usize>) -> Option<(String, usize)> {
    let by_line = lines.iter().enumerate().find_map(|(idx, line)| {
        if line.kind != LineKind::ByLine {
            return None;
        }
        let caps = BY_LINE_RE.captures(line.text)?;
        trim_field(caps.get(1)?.as_str()).map(|name| (name, idx))
    });
    by_line.or_else(|| {
        lines.iter().enumerate().find_map(|(idx, line)| {
            (Some(idx) != title_idx && line.is_text() && looks_like_person_name(line.text))
                .then(|| (line.text.to_string(), idx))
        })
    })
}

fn publisher_with_index(
    lines: &[ScanLine<'_>],
    taken: &[Option<usize>],
) -> Option<(String, usize)> {
    let labelled = lines.iter().enumerate().find_map(|(idx, line)| {
        if line.kind != LineKind::Publisher {
            return None;
        }
        let caps = PUBLISHER_LINE_RE.captures(line.text)?;
        trim_field(caps.get(1)?.as_str()).map(|name| (name, idx))
    });
    labelled.or_else(|| {
        lines.iter().enumerate().find_map(|(idx, line)| {
            (!taken.contains(&Some(idx)) && line.is_text() && ends_with_publisher_word(line.text))
                .then(|| (line.text.to_string(), idx))
        })
    })
}

fn years_in(text: &str, max_year: i32) -> impl Iterator<Item = i32> + '_ {
    YEAR_RE
        .captures_iter(text)
        .filter_map(|caps| caps.get(1)?.as_str().parse::<i32>().ok())
        .filter(move |year| (EARLIEST_YEAR..=max_year).contains(year))
}

fn year_from_lines(lines: &[ScanLine<'_>], title_idx: Option<usize>, max_year: i32) -> Option<String> {
    let copyright = lines
        .iter()
        .filter(|line| line.kind == LineKind::Copyright)
        .find_map(|line| years_in(line.text, max_year).next());

    copyright
        .or_else(|| {
            lines.iter().enumerate().find_map(|(idx, line)| {
                if Some(idx) == title_idx || line.kind == LineKind::Price {
                    return None;
                }
                match isbn_span(line.text) {
                    Some((start, end)) => years_in(&line.text[..start], max_year)
                        .chain(years_in(&line.text[end..], max_year))
                        .next(),
                    None => years_in(line.text, max_year).next(),
                }
            })
        })
        .map(|year| year.to_string())
}

fn description_from_lines(lines: &[ScanLine<'_>], title_idx: usize, taken: &[Option<usize>]) -> Option<String> {
    let parts: Vec<&str> = lines
        .iter()
        .enumerate()
        .skip(title_idx + 1)
        .filter(|(idx, line)| {
            !taken.contains(&Some(*idx)) && line.is_text() && letter_count(line.text) >= 3
        })
        .map(|(_, line)| line.text)
        .collect();
    (!parts.is_empty()).then(|| parts.join(" "))
}

/// Extract every field from raw OCR text. Cleanup runs first; empty or
/// unparseable input yields an all-`None` record.
pub fn extract_fields(raw: &str) -> ExtractedFields {
    extract_fields_with_max_year(raw, Utc::now().year() + 1)
}

pub(crate) fn extract_fields_with_max_year(raw: &str, max_year: i32) -> ExtractedFields {
    let cleaned = clean_str(raw);
    let lines = scan_lines(&cleaned);
    if lines.is_empty() {
        return ExtractedFields::default();
    }

    let isbn = extract_isbn(&cleaned);
    let title_idx = title_index(&lines);
    let author = author_with_index(&lines, title_idx);
    let author_idx = author.as_ref().map(|(_, idx)| *idx);
    let publisher = publisher_with_index(&lines, &[title_idx, author_idx]);
    let publisher_idx = publisher.as_ref().map(|(_, idx)| *idx);
    let description = title_idx.and_then(|idx| {
        description_from_lines(&lines, idx, &[author_idx, publisher_idx])
    });

    ExtractedFields {
        isbn,
        title: title_idx.map(|idx| lines[idx].text.to_string()),
        author: author.map(|(name, _)| name),
        publisher: publisher.map(|(name, _)| name),
        published_date: year_from_lines(&lines, title_idx, max_year),
        description,
    }
}

pub fn extract_title(raw: &str) -> Option<String> {
    let cleaned = clean_str(raw);
    let lines = scan_lines(&cleaned);
    title_index(&lines).map(|idx| lines[idx].text.to_string())
}

pub fn extract_author(raw: &str) -> Option<String> {
    let cleaned = clean_str(raw);
    let lines = scan_lines(&cleaned);
    author_with_index(&lines, title_index(&lines)).map(|(name, _)| name)
}

pub fn extract_publisher(raw: &str) -> Option<String> {
    extract_fields(raw).publisher
}

pub fn extract_year(raw: &str) -> Option<String> {
    extract_fields(raw).published_date
}
