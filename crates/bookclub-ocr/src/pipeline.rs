use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::candidates::{CoverScan, OcrLine};
use crate::confidence::ConfidenceLevel;
use crate::identifiers::Isbn;
use crate::search::{BookMetadata, MetadataSearchClient, SearchParams};
use crate::text::{ExtractedFields, extract_fields};

/// What the caller gets back for one cover scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    pub book_id: Option<String>,
    pub isbn: Option<String>,
    pub isbn_verified: bool,
    pub title: Option<String>,
    pub author: Option<String>,
    pub publisher: Option<String>,
    pub published_date: Option<String>,
    pub description: Option<String>,
    /// Scored on the OCR fields only, before any metadata fill.
    pub confidence: ConfidenceLevel,
    pub metadata: Option<BookMetadata>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields_from_metadata: Vec<String>,
}

impl ScanReport {
    fn from_fields(fields: ExtractedFields, book_id: Option<String>) -> Self {
        let confidence = ConfidenceLevel::score(&fields);
        let mut report = Self {
            book_id,
            isbn: fields.isbn,
            isbn_verified: false,
            title: fields.title,
            author: fields.author,
            publisher: fields.publisher,
            published_date: fields.published_date,
            description: fields.description,
            confidence,
            metadata: None,
            fields_from_metadata: Vec::new(),
        };
        report.refresh_isbn_verified();
        report
    }

    fn refresh_isbn_verified(&mut self) {
        self.isbn_verified = self.isbn.as_deref().is_some_and(Isbn::is_valid);
    }

    pub fn search_params(&self) -> SearchParams {
        SearchParams {
            isbn: self.isbn.clone(),
            title: self.title.clone(),
            author: self.author.clone(),
        }
    }

    /// Fill fields the OCR pass left empty. Values already present win.
    pub fn merge_metadata(&mut self, metadata: BookMetadata) {
        let mut filled = Vec::new();

        fill(&mut self.isbn, metadata.preferred_isbn().map(str::to_string), "isbn", &mut filled);
        fill(&mut self.title, Some(metadata.title.clone()), "title", &mut filled);
        let authors = (!metadata.authors.is_empty()).then(|| metadata.authors.join(", "));
        fill(&mut self.author, authors, "author", &mut filled);
        fill(&mut self.publisher, metadata.publisher.clone(), "publisher", &mut filled);
        fill(
            &mut self.published_date,
            metadata.published_date.clone(),
            "publishedDate",
            &mut filled,
        );
        fill(&mut self.description, metadata.description.clone(), "description", &mut filled);

        self.refresh_isbn_verified();
        self.fields_from_metadata = filled;
        self.metadata = Some(metadata);
    }
}

fn fill(
    slot: &mut Option<String>,
    value: Option<String>,
    name: &str,
    filled: &mut Vec<String>,
) {
    if slot.is_some() {
        return;
    }
    if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
        *slot = Some(value);
        filled.push(name.to_string());
    }
}

/// Cleanup, extraction, scoring and optional metadata enrichment for one
/// cover scan.
#[derive(Clone, Default)]
pub struct CoverScanner {
    search: Option<MetadataSearchClient>,
}

impl CoverScanner {
    pub fn new(search: Option<MetadataSearchClient>) -> Self {
        Self { search }
    }

    pub async fn analyze(&self, text: Option<&str>, book_id: Option<String>) -> ScanReport {
        let fields = text.map(extract_fields).unwrap_or_default();
        let mut report = ScanReport::from_fields(fields, book_id);
        debug!(
            book_id = report.book_id.as_deref().unwrap_or("-"),
            confidence = %report.confidence,
            "cover text analysed"
        );

        let Some(search) = &self.search else {
            return report;
        };
        let params = report.search_params();
        if params.is_empty() {
            return report;
        }
        if let Some(metadata) = search.search(&params).await {
            debug!(source = %metadata.source, "merging provider metadata");
            report.merge_metadata(metadata);
        }
        report
    }

    /// Rank raw detections into candidates, then run the text path over the
    /// ranked lines.
    pub async fn analyze_lines(
        &self,
        lines: &[OcrLine],
        book_id: Option<String>,
    ) -> (CoverScan, ScanReport) {
        let scan = CoverScan::from_lines(lines);
        let text = scan.to_text();
        let report = self.analyze(Some(&text), book_id).await;
        (scan, report)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::cache::MemoryCache;
    use crate::error::Result;
    use crate::search::MetadataProvider;

    const CLEAN_CODE: &str = "Clean Code\nA Handbook of Agile Software Craftsmanship\nRobert C. Martin\nISBN: 978-0-13-235088-4\nPrentice Hall\n2008";

    struct StaticProvider {
        calls: AtomicUsize,
        result: Option<BookMetadata>,
    }

    #[async_trait]
    impl MetadataProvider for StaticProvider {
        fn name(&self) -> &str {
            "static"
        }

        async fn lookup(&self, _params: &SearchParams) -> Result<Option<BookMetadata>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.result.clone())
        }
    }

    fn scanner_with(result: Option<BookMetadata>) -> (CoverScanner, Arc<StaticProvider>) {
        let provider = Arc::new(StaticProvider {
            calls: AtomicUsize::new(0),
            result,
        });
        let client = MetadataSearchClient::new(
            provider.clone(),
            Arc::new(MemoryCache::new()),
            Duration::from_secs(60),
        );
        (CoverScanner::new(Some(client)), provider)
    }

    #[tokio::test]
    async fn clean_code_cover_without_search() {
        let report = CoverScanner::default()
            .analyze(Some(CLEAN_CODE), Some("book-1".to_string()))
            .await;
        assert_eq!(report.book_id.as_deref(), Some("book-1"));
        assert_eq!(report.title.as_deref(), Some("Clean Code"));
        assert_eq!(report.author.as_deref(), Some("Robert C. Martin"));
        assert_eq!(report.isbn.as_deref(), Some("9780132350884"));
        assert!(report.isbn_verified);
        assert_eq!(report.confidence, ConfidenceLevel::High);
        assert_eq!(report.metadata, None);
    }

    #[tokio::test]
    async fn missing_text_is_low() {
        let report = CoverScanner::default().analyze(None, None).await;
        assert_eq!(report.confidence, ConfidenceLevel::Low);
        assert_eq!(report.title, None);
        assert!(!report.isbn_verified);
    }

    #[tokio::test]
    async fn metadata_only_fills_gaps() {
        let (scanner, provider) = scanner_with(Some(BookMetadata {
            title: "Clean Code: A Handbook".to_string(),
            authors: vec!["Robert C. Martin".to_string(), "Someone Else".to_string()],
            publisher: Some("Pearson".to_string()),
            description: Some("Even bad code can function.".to_string()),
            isbn_13: Some("9780132350884".to_string()),
            source: "static".to_string(),
            ..Default::default()
        }));

        let report = scanner.analyze(Some("Clean Code\nby Robert C. Martin"), None).await;
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert_eq!(report.title.as_deref(), Some("Clean Code"));
        assert_eq!(report.author.as_deref(), Some("Robert C. Martin"));
        assert_eq!(report.publisher.as_deref(), Some("Pearson"));
        assert_eq!(report.isbn.as_deref(), Some("9780132350884"));
        assert!(report.isbn_verified);
        assert_eq!(report.confidence, ConfidenceLevel::Medium);
        assert_eq!(
            report.fields_from_metadata,
            vec!["isbn", "publisher", "description"]
        );
    }

    #[test]
    fn author_list_is_joined() {
        let mut report = ScanReport::from_fields(ExtractedFields::default(), None);
        report.merge_metadata(BookMetadata {
            title: "Design Patterns".to_string(),
            authors: vec!["Erich Gamma".to_string(), "Richard Helm".to_string()],
            isbn_10: Some("0201633612".to_string()),
            ..Default::default()
        });
        assert_eq!(report.author.as_deref(), Some("Erich Gamma, Richard Helm"));
        assert_eq!(report.isbn.as_deref(), Some("0201633612"));
        assert_eq!(report.confidence, ConfidenceLevel::Low);
    }

    #[tokio::test]
    async fn nothing_searchable_skips_lookup() {
        let (scanner, provider) = scanner_with(None);
        let report = scanner.analyze(Some("abc"), None).await;
        assert_eq!(report.confidence, ConfidenceLevel::Low);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn lines_path_ranks_then_extracts() {
        let line = |text: &str, confidence: f32, w: f32, h: f32| OcrLine {
            text: text.to_string(),
            confidence,
            bbox: [[0.0, 0.0], [w, 0.0], [w, h], [0.0, h]],
        };
        let lines = vec![
            line("Robert C. Martin", 0.9, 200.0, 20.0),
            line("Clean Code", 0.95, 400.0, 80.0),
        ];

        let (scan, report) = CoverScanner::default().analyze_lines(&lines, None).await;
        assert_eq!(scan.title_candidates[0].value, "Clean Code");
        assert_eq!(report.title.as_deref(), Some("Clean Code"));
        assert_eq!(report.author.as_deref(), Some("Robert C. Martin"));
    }

    #[test]
    fn report_serialises_camel_case() {
        let report = ScanReport::from_fields(
            ExtractedFields {
                published_date: Some("2008".to_string()),
                ..Default::default()
            },
            Some("b1".to_string()),
        );
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["bookId"], "b1");
        assert_eq!(json["publishedDate"], "2008");
        assert_eq!(json["isbnVerified"], false);
        assert_eq!(json["confidence"], "low");
        assert!(json.get("fieldsFromMetadata").is_none());
    }
}
