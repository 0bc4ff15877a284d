//! Title/author candidates from raw OCR detections.
//!
//! An OCR engine reports each detected line with a recognition confidence
//! and a quadrilateral bounding box. Big, confidently read lines are the most
//! salient parts of a cover, so they are ranked first.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

const MAX_RANKED_LINES: usize = 20;
const MAX_CANDIDATES: usize = 5;
const MAX_LINE_CHARS: usize = 200;
const MIN_LINE_CHARS: usize = 3;
const MAX_AUTHOR_CHARS: usize = 80;
const AREA_SCALE: f32 = 10_000.0;

/// One recognised line. `bbox` holds the four corner points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrLine {
    pub text: String,
    pub confidence: f32,
    pub bbox: [[f32; 2]; 4],
}

impl OcrLine {
    pub fn area(&self) -> f32 {
        let (min_x, max_x) = extent(self.bbox.iter().map(|p| p[0]));
        let (min_y, max_y) = extent(self.bbox.iter().map(|p| p[1]));
        (max_x - min_x).max(0.0) * (max_y - min_y).max(0.0)
    }

    fn salience(&self) -> f32 {
        self.confidence * (1.0 + self.area() / AREA_SCALE)
    }
}

fn extent(values: impl Iterator<Item = f32>) -> (f32, f32) {
    values.fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextCandidate {
    pub value: String,
    pub confidence: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverScan {
    pub title_candidates: Vec<TextCandidate>,
    pub author_candidates: Vec<TextCandidate>,
    pub language_guess: String,
    #[serde(skip)]
    ranked_text: Vec<String>,
}

impl CoverScan {
    pub fn from_lines(lines: &[OcrLine]) -> Self {
        let mut ranked: Vec<&OcrLine> = lines
            .iter()
            .filter(|line| !line.text.trim().is_empty())
            .collect();
        ranked.sort_by(|a, b| b.salience().total_cmp(&a.salience()));

        let mut titles = Vec::new();
        let mut authors = Vec::new();
        let mut ranked_text = Vec::new();

        for line in ranked.into_iter().take(MAX_RANKED_LINES) {
            let text = normalize_line(&line.text);
            if text.chars().count() < MIN_LINE_CHARS {
                continue;
            }
            let candidate = TextCandidate {
                value: text.clone(),
                confidence: round3(line.confidence),
            };
            if looks_like_author_list(&text) {
                authors.push(candidate);
            } else {
                titles.push(candidate);
            }
            ranked_text.push(text);
        }

        Self {
            title_candidates: dedup(titles),
            author_candidates: dedup(authors),
            language_guess: "en".to_string(),
            ranked_text,
        }
    }

    /// Ranked lines joined back into text, most salient first, for the
    /// line-oriented field extractors.
    pub fn to_text(&self) -> String {
        self.ranked_text.join("\n")
    }
}

fn normalize_line(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(MAX_LINE_CHARS)
        .collect()
}

fn looks_like_author_list(text: &str) -> bool {
    text.chars().count() < MAX_AUTHOR_CHARS
        && [",", " and ", " & "].iter().any(|sep| text.contains(sep))
}

fn round3(value: f32) -> f32 {
    (value * 1000.0).round() / 1000.0
}

fn dedup(items: Vec<TextCandidate>) -> Vec<TextCandidate> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.value.to_lowercase()))
        .take(MAX_CANDIDATES)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(text: &str, confidence: f32, w: f32, h: f32) -> OcrLine {
        OcrLine {
            text: text.to_string(),
            confidence,
            bbox: [[0.0, 0.0], [w, 0.0], [w, h], [0.0, h]],
        }
    }

    #[test]
    fn area_from_bbox_extents() {
        assert_eq!(line("x", 1.0, 100.0, 20.0).area(), 2000.0);
        let degenerate = OcrLine {
            text: "x".to_string(),
            confidence: 1.0,
            bbox: [[5.0, 5.0]; 4],
        };
        assert_eq!(degenerate.area(), 0.0);
    }

    #[test]
    fn ranks_large_confident_lines_first() {
        let scan = CoverScan::from_lines(&[
            line("small print", 0.99, 50.0, 5.0),
            line("CLEAN CODE", 0.95, 800.0, 120.0),
        ]);
        assert_eq!(scan.title_candidates[0].value, "CLEAN CODE");
        assert_eq!(scan.title_candidates[1].value, "small print");
        assert_eq!(scan.to_text(), "CLEAN CODE\nsmall print");
    }

    #[test]
    fn separators_mark_author_lists() {
        let scan = CoverScan::from_lines(&[
            line("Design Patterns", 0.9, 600.0, 100.0),
            line("Gamma, Helm, Johnson & Vlissides", 0.8, 400.0, 40.0),
            line("Andrew Hunt and David Thomas", 0.8, 300.0, 40.0),
        ]);
        assert_eq!(scan.title_candidates.len(), 1);
        assert_eq!(scan.author_candidates.len(), 2);
        assert_eq!(scan.language_guess, "en");
    }

    #[test]
    fn short_lines_skipped_and_duplicates_dropped() {
        let scan = CoverScan::from_lines(&[
            line("Dune", 0.9, 500.0, 100.0),
            line("DUNE", 0.8, 400.0, 80.0),
            line("ok", 0.99, 500.0, 100.0),
            line("   ", 0.99, 500.0, 100.0),
        ]);
        assert_eq!(scan.title_candidates.len(), 1);
        assert_eq!(scan.title_candidates[0].value, "Dune");
    }

    #[test]
    fn confidence_rounded_and_candidates_capped() {
        let lines: Vec<OcrLine> = (0..10)
            .map(|i| line(&format!("Line number {i}"), 0.123456, 100.0, 10.0))
            .collect();
        let scan = CoverScan::from_lines(&lines);
        assert_eq!(scan.title_candidates.len(), 5);
        assert_eq!(scan.title_candidates[0].confidence, 0.123);
    }

    #[test]
    fn whitespace_is_collapsed() {
        let scan = CoverScan::from_lines(&[line("Clean\n  Code", 0.9, 10.0, 10.0)]);
        assert_eq!(scan.title_candidates[0].value, "Clean Code");
    }
}
