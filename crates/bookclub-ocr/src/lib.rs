//! Book-cover OCR helpers: text cleanup, field extraction and confidence
//! scoring, plus cached book-metadata lookup.

pub mod error;
pub mod config;
pub mod http;
pub mod cache;
pub mod identifiers;
pub mod text;
pub mod confidence;
pub mod candidates;
pub mod search;
pub mod pipeline;

pub use error::{OcrError, Result};
pub use config::ScanConfig;
pub use cache::{CacheStore, DiskCache, MemoryCache};
pub use candidates::{CoverScan, OcrLine, TextCandidate};
pub use confidence::ConfidenceLevel;
pub use identifiers::{Isbn, extract_isbn};
pub use pipeline::{CoverScanner, ScanReport};
pub use search::{
    BookMetadata, GoogleBooksProvider, MetadataProvider, MetadataSearchClient, SearchParams,
    generate_cache_key, preprocess_search_params,
};
pub use text::{ExtractedFields, clean_text, extract_fields};
