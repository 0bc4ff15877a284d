use std::ops::Range;

use once_cell::sync::Lazy;
use regex::{Match, Regex};

use crate::identifiers::isbn::Isbn;

// Optional ISBN / ISBN-10 / ISBN-13 label, then a digit run that may be broken
// up by hyphens or spaces (never newlines), ending in a digit or X.
static ISBN_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\bisbn(?:-1[03])?\s*:?\s*)?\b(\d[\d\- ]{8,22}[\dX])\b")
        .expect("valid regex")
});

/// One pattern hit. A hit can span several space-separated numbers
/// (`Printed 2008 9780132350884`, a printer's key line), so the ISBN is
/// picked out of it as a window.
struct Run {
    /// Digits and `X`, uppercased, with their byte offsets in the text.
    chars: Vec<(usize, char)>,
    /// Indices into `chars` where a space-separated group starts.
    group_starts: Vec<usize>,
    labelled: bool,
    spaced: bool,
}

impl Run {
    fn from_match(m: Match<'_>, labelled: bool) -> Self {
        let mut chars = Vec::new();
        let mut group_starts = Vec::new();
        let mut after_space = true;
        let mut spaced = false;
        for (offset, c) in m.as_str().char_indices() {
            if c == ' ' {
                after_space = true;
                spaced = true;
            } else if c.is_ascii_digit() || c.eq_ignore_ascii_case(&'x') {
                if after_space {
                    group_starts.push(chars.len());
                    after_space = false;
                }
                chars.push((m.start() + offset, c.to_ascii_uppercase()));
            }
        }
        Self {
            chars,
            group_starts,
            labelled,
            spaced,
        }
    }

    fn code(&self, range: Range<usize>) -> String {
        self.chars[range].iter().map(|(_, c)| *c).collect()
    }

    fn span(&self, range: Range<usize>) -> (usize, usize) {
        (self.chars[range.start].0, self.chars[range.end - 1].0 + 1)
    }

    fn on_group_edge(&self, idx: usize) -> bool {
        idx == self.chars.len() || self.group_starts.contains(&idx)
    }

    /// Checksum-valid window, ISBN-13 before ISBN-10, leftmost first. With
    /// `whole_groups` the window must start and end on group edges.
    fn valid_window(&self, whole_groups: bool) -> Option<Range<usize>> {
        let len = self.chars.len();
        [13, 10]
            .into_iter()
            .filter(|width| len >= *width)
            .flat_map(|width| (0..=len - width).map(move |start| start..start + width))
            .filter(|w| {
                w.len() == 10 || matches!(self.code(w.start..w.start + 3).as_str(), "978" | "979")
            })
            .filter(|w| !whole_groups || (self.on_group_edge(w.start) && self.on_group_edge(w.end)))
            .find(|w| Isbn::is_valid(&self.code(w.clone())))
    }

    /// ISBN-shaped window without a checksum match, so OCR slips still give a
    /// searchable code. Unlabelled runs of separate numbers never qualify.
    fn shaped_window(&self) -> Option<Range<usize>> {
        if self.spaced && !self.labelled {
            return None;
        }
        let code = self.code(0..self.chars.len());
        let is_isbn13 = |s: &str| s.len() == 13 && s.chars().all(|c| c.is_ascii_digit());
        let is_isbn10 = |s: &str| {
            s.len() == 10
                && s.char_indices()
                    .all(|(i, c)| c.is_ascii_digit() || (i == 9 && c == 'X'))
        };

        if is_isbn13(&code) || is_isbn10(&code) {
            return Some(0..code.len());
        }
        if code.len() > 13
            && (code.starts_with("978") || code.starts_with("979"))
            && is_isbn13(&code[..13])
        {
            return Some(0..13);
        }
        if code.len() > 10 && is_isbn10(&code[..10]) {
            return Some(0..10);
        }
        None
    }
}

/// Code and byte span of the ISBN in `text`. Checksum-valid windows over whole
/// groups win, then any checksum-valid window, then the first ISBN-shaped run;
/// document order breaks ties.
fn locate(text: &str) -> Option<(String, (usize, usize))> {
    let runs: Vec<Run> = ISBN_REGEX
        .captures_iter(text)
        .filter_map(|caps| Some(Run::from_match(caps.get(2)?, caps.get(1).is_some())))
        .filter(|run| run.chars.len() >= 10)
        .collect();

    runs.iter()
        .find_map(|run| run.valid_window(true).map(|w| (run, w)))
        .or_else(|| {
            runs.iter()
                .find_map(|run| run.valid_window(false).map(|w| (run, w)))
        })
        .or_else(|| {
            runs.iter()
                .find_map(|run| run.shaped_window().map(|w| (run, w)))
        })
        .map(|(run, w)| (run.code(w.clone()), run.span(w)))
}

/// ISBN in `text`, normalised to its 10- or 13-character digits-and-X form.
/// Checksum-valid codes win; without one, the first ISBN-shaped run is
/// returned as-is.
pub fn extract_isbn(text: &str) -> Option<String> {
    locate(text).map(|(code, _)| code)
}

/// Byte range of the ISBN digits, used to keep them out of the year
/// heuristics.
pub(crate) fn isbn_span(line: &str) -> Option<(usize, usize)> {
    locate(line).map(|(_, span)| span)
}
