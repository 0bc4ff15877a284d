use crate::error::{OcrError, Result};
use serde::{Deserialize, Serialize};

/// A checksum-verified ISBN with both canonical forms.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Isbn {
    pub raw: String,
    pub isbn13: String,
    /// Only 978-prefixed ISBN-13s have an ISBN-10 form.
    pub isbn10: Option<String>,
    pub hyphenated: String,
}

/// Digits and `X` only, uppercased.
pub fn normalize_isbn_chars(input: &str) -> String {
    input
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == 'X' || *c == 'x')
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

fn isbn10_values(code: &str) -> Option<Vec<u32>> {
    if code.len() != 10 {
        return None;
    }
    code.chars()
        .enumerate()
        .map(|(i, c)| match c {
            'X' if i == 9 => Some(10),
            c => c.to_digit(10),
        })
        .collect()
}

fn isbn13_values(code: &str) -> Option<Vec<u32>> {
    if code.len() != 13 {
        return None;
    }
    code.chars().map(|c| c.to_digit(10)).collect()
}

fn isbn10_sum_ok(values: &[u32]) -> bool {
    let sum: u32 = values
        .iter()
        .enumerate()
        .map(|(i, v)| (10 - i as u32) * v)
        .sum();
    sum % 11 == 0
}

fn isbn13_weighted_sum(values: &[u32]) -> u32 {
    values
        .iter()
        .enumerate()
        .map(|(i, v)| if i % 2 == 0 { *v } else { v * 3 })
        .sum()
}

fn isbn13_check_digit(first12: &[u32]) -> u32 {
    (10 - isbn13_weighted_sum(first12) % 10) % 10
}

fn isbn10_check_char(first9: &[u32]) -> char {
    let sum: u32 = first9
        .iter()
        .enumerate()
        .map(|(i, v)| (10 - i as u32) * v)
        .sum();
    match (11 - sum % 11) % 11 {
        10 => 'X',
        d => char::from_digit(d, 10).unwrap_or('0'),
    }
}

fn digits_to_string(values: &[u32]) -> String {
    values
        .iter()
        .filter_map(|v| char::from_digit(*v, 10))
        .collect()
}

fn hyphenate(isbn13: &str) -> String {
    // prefix-group-registrant-publication-check, with a fixed 1/4/4 split
    format!(
        "{}-{}-{}-{}-{}",
        &isbn13[0..3],
        &isbn13[3..4],
        &isbn13[4..8],
        &isbn13[8..12],
        &isbn13[12..13]
    )
}

impl Isbn {
    pub fn parse(input: &str) -> Result<Self> {
        let code = normalize_isbn_chars(input);

        if let Some(values) = isbn13_values(&code) {
            if isbn13_weighted_sum(&values) % 10 != 0 {
                return Err(OcrError::InvalidIsbn(input.to_string()));
            }
            let isbn10 = code.starts_with("978").then(|| {
                let mut s = digits_to_string(&values[3..12]);
                s.push(isbn10_check_char(&values[3..12]));
                s
            });
            return Ok(Self {
                raw: input.to_string(),
                hyphenated: hyphenate(&code),
                isbn13: code,
                isbn10,
            });
        }

        if let Some(values) = isbn10_values(&code) {
            if !isbn10_sum_ok(&values) {
                return Err(OcrError::InvalidIsbn(input.to_string()));
            }
            let mut first12 = vec![9, 7, 8];
            first12.extend_from_slice(&values[..9]);
            let check = isbn13_check_digit(&first12);
            first12.push(check);
            let isbn13 = digits_to_string(&first12);
            return Ok(Self {
                raw: input.to_string(),
                hyphenated: hyphenate(&isbn13),
                isbn13,
                isbn10: Some(code),
            });
        }

        Err(OcrError::InvalidIsbn(input.to_string()))
    }

    pub fn is_valid(input: &str) -> bool {
        Self::parse(input).is_ok()
    }
}
