use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use serde_json::Value;
use tracing::debug;

use crate::config::ScanConfig;
use crate::error::{OcrError, Result};
use crate::http::HttpClient;
use crate::search::{BookMetadata, MetadataProvider, SearchParams};

const SOURCE_NAME: &str = "google_books";

/// Google Books volumes API (`items[0].volumeInfo`).
pub struct GoogleBooksProvider {
    client: HttpClient,
    base_url: String,
    api_key: Option<String>,
}

impl GoogleBooksProvider {
    pub fn new(config: &ScanConfig) -> Result<Self> {
        Self::with_params(
            &config.provider.base_url,
            config.api_key(),
            Duration::from_secs(config.provider.timeout_secs),
            &config.provider.user_agent,
        )
    }

    pub fn with_params(
        base_url: &str,
        api_key: Option<String>,
        timeout: Duration,
        user_agent: &str,
    ) -> Result<Self> {
        Ok(Self {
            client: HttpClient::new(timeout, user_agent)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn volumes_url(&self, query: &str) -> Result<Url> {
        let mut url = Url::parse(&format!("{}/volumes", self.base_url))
            .map_err(|e| OcrError::Parse(format!("invalid URL {}: {e}", self.base_url)))?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("q", query).append_pair("maxResults", "1");
            if let Some(key) = &self.api_key {
                pairs.append_pair("key", key);
            }
        }
        Ok(url)
    }
}

/// `isbn:<isbn>` when an ISBN is known, otherwise `intitle:… inauthor:…`.
/// Terms are space separated; the form encoder turns the space into `+`.
pub fn build_query(params: &SearchParams) -> Option<String> {
    if let Some(isbn) = &params.isbn {
        return Some(format!("isbn:{isbn}"));
    }
    let mut terms = Vec::new();
    if let Some(title) = &params.title {
        terms.push(format!("intitle:{title}"));
    }
    if let Some(author) = &params.author {
        terms.push(format!("inauthor:{author}"));
    }
    (!terms.is_empty()).then(|| terms.join(" "))
}

fn string_list(v: &Value) -> Vec<String> {
    v.as_array()
        .map(|arr| {
            arr.iter()
                .filter_map(Value::as_str)
                .map(ToOwned::to_owned)
                .collect()
        })
        .unwrap_or_default()
}

fn string_field(v: &Value, key: &str) -> Option<String> {
    v.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
}

fn identifier(info: &Value, kind: &str) -> Option<String> {
    info.get("industryIdentifiers")
        .and_then(Value::as_array)?
        .iter()
        .find(|entry| entry.get("type").and_then(Value::as_str) == Some(kind))
        .and_then(|entry| entry.get("identifier"))
        .and_then(Value::as_str)
        .map(ToOwned::to_owned)
}

impl BookMetadata {
    /// Parse a Google Books `volumeInfo` record. Returns `None` without a title.
    pub fn from_volume_info(info: &Value) -> Option<Self> {
        let title = string_field(info, "title")?;
        let thumbnail = info
            .get("imageLinks")
            .and_then(|links| links.get("thumbnail").or_else(|| links.get("smallThumbnail")))
            .and_then(Value::as_str)
            .map(|url| url.replacen("http://", "https://", 1));

        Some(Self {
            title,
            subtitle: string_field(info, "subtitle"),
            authors: info.get("authors").map(string_list).unwrap_or_default(),
            publisher: string_field(info, "publisher"),
            published_date: string_field(info, "publishedDate"),
            description: string_field(info, "description"),
            isbn_13: identifier(info, "ISBN_13"),
            isbn_10: identifier(info, "ISBN_10"),
            page_count: info
                .get("pageCount")
                .and_then(Value::as_u64)
                .and_then(|n| u32::try_from(n).ok()),
            categories: info.get("categories").map(string_list).unwrap_or_default(),
            thumbnail,
            language: string_field(info, "language"),
            source: SOURCE_NAME.to_string(),
        })
    }
}

#[async_trait]
impl MetadataProvider for GoogleBooksProvider {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    async fn lookup(&self, params: &SearchParams) -> Result<Option<BookMetadata>> {
        let Some(query) = build_query(params) else {
            return Ok(None);
        };
        let url = self.volumes_url(&query)?;
        debug!(query = %query, "google books lookup");

        let json: Value = self.client.get_json(url.as_str()).await?;
        let first = json
            .get("items")
            .and_then(Value::as_array)
            .and_then(|items| items.first())
            .and_then(|item| item.get("volumeInfo"));

        Ok(first.and_then(BookMetadata::from_volume_info))
    }
}
