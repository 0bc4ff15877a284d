use std::fmt;

use serde::{Deserialize, Serialize};

use crate::text::ExtractedFields;

/// Coarse label for how much of a cover was recovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
}

impl ConfidenceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    /// Deterministic rule table over which fields are present. Adding an
    /// ISBN, title or author never lowers the result.
    pub fn score(fields: &ExtractedFields) -> Self {
        let isbn = fields.isbn.is_some();
        let title = fields.title.is_some();
        let author = fields.author.is_some();
        let other = title || author || fields.publisher.is_some() || fields.published_date.is_some();

        match (isbn, title, author) {
            (true, _, _) if other => Self::High,
            (true, _, _) => Self::Medium,
            (false, true, _) | (false, _, true) => Self::Medium,
            (false, false, false) => Self::Low,
        }
    }
}

impl fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
