use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::identifiers::extract_isbn;
use crate::identifiers::isbn::normalize_isbn_chars;
use crate::text::fix_ocr_confusions;

pub mod client;
pub mod google_books;

pub use client::MetadataSearchClient;
pub use google_books::GoogleBooksProvider;

/// Partially populated lookup parameters, usually straight from OCR.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchParams {
    pub isbn: Option<String>,
    pub title: Option<String>,
    pub author: Option<String>,
}

impl SearchParams {
    pub fn is_empty(&self) -> bool {
        self.isbn.is_none() && self.title.is_none() && self.author.is_none()
    }
}

/// Book metadata as returned by a provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookMetadata {
    pub title: String,
    pub subtitle: Option<String>,
    pub authors: Vec<String>,
    pub publisher: Option<String>,
    pub published_date: Option<String>,
    pub description: Option<String>,
    pub isbn_13: Option<String>,
    pub isbn_10: Option<String>,
    pub page_count: Option<u32>,
    pub categories: Vec<String>,
    pub thumbnail: Option<String>,
    pub language: Option<String>,
    pub source: String,
}

impl BookMetadata {
    pub fn preferred_isbn(&self) -> Option<&str> {
        self.isbn_13.as_deref().or(self.isbn_10.as_deref())
    }
}

#[async_trait]
pub trait MetadataProvider: Send + Sync {
    fn name(&self) -> &str;

    /// `Ok(None)` means the provider answered but had no match.
    async fn lookup(&self, params: &SearchParams) -> Result<Option<BookMetadata>>;
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Trim, drop empty values, canonicalise the ISBN and undo OCR letter
/// confusions in title/author. Case is kept for the outbound query.
pub fn preprocess_search_params(params: &SearchParams) -> SearchParams {
    let isbn = non_empty(params.isbn.as_deref())
        .map(|raw| extract_isbn(raw).unwrap_or_else(|| normalize_isbn_chars(raw)))
        .filter(|isbn| !isbn.is_empty());
    let text = |value: Option<&String>| {
        non_empty(value.map(String::as_str))
            .map(fix_ocr_confusions)
            .filter(|v| !v.is_empty())
    };

    SearchParams {
        isbn,
        title: text(params.title.as_ref()),
        author: text(params.author.as_ref()),
    }
}

/// Lowercased `isbn:…|title:…|author:…` over the parameters present after
/// preprocessing; `None` when nothing is searchable.
pub fn generate_cache_key(params: &SearchParams) -> Option<String> {
    let params = preprocess_search_params(params);
    let parts: Vec<String> = [
        ("isbn", params.isbn),
        ("title", params.title),
        ("author", params.author),
    ]
    .into_iter()
    .filter_map(|(name, value)| value.map(|v| format!("{name}:{}", v.to_lowercase())))
    .collect();

    (!parts.is_empty()).then(|| parts.join("|"))
}
