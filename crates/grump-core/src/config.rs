//! Knowledge base configuration
//!
//! Values come from three layers, later layers winning:
//! 1. compiled-in defaults
//! 2. an optional TOML file
//! 3. `KNOWLEDGE_BASE_*` environment variables

use crate::{GrumpError, Result};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::warn;

/// Default global character budget across all sources
pub const DEFAULT_MAX_TOTAL_CHARS: usize = 15_000;
/// Default character cap for a single source
pub const DEFAULT_MAX_CHARS_PER_SOURCE: usize = 750;
/// Default per-request timeout for remote fetches
pub const DEFAULT_FETCH_TIMEOUT_SECONDS: u64 = 20;
/// Default ceiling on a remote response body
pub const DEFAULT_MAX_RESPONSE_BYTES: u64 = 10 * 1024 * 1024;
/// Default directory-listing API base
pub const DEFAULT_LISTING_API_BASE: &str = "https://api.github.com";
/// Default raw-content base used when a listing entry has no download URL
pub const DEFAULT_RAW_CONTENT_BASE: &str = "https://raw.githubusercontent.com";

/// Configuration for the knowledge pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeConfig {
    /// Directory scanned for `*.md` documents
    pub markdown_dir: PathBuf,
    /// Directory scanned for `*.pdf` documents (may equal `markdown_dir`)
    pub pdf_dir: PathBuf,
    /// Remote document URLs, newline- or comma-separated
    pub remote_urls: String,
    /// Remote folder reference expanded through the listing API
    pub remote_folder: Option<String>,
    /// Global character budget
    pub max_total_chars: usize,
    /// Character cap per source
    pub max_chars_per_source: usize,
    /// Timeout for each remote request, in seconds
    pub fetch_timeout_seconds: u64,
    /// Largest accepted remote response body, in bytes
    pub max_response_bytes: u64,
    /// Base URL of the directory-listing API
    pub listing_api_base: String,
    /// Base URL for raw file downloads
    pub raw_content_base: String,
    /// Token sent to the listing API. Never serialized.
    #[serde(skip)]
    pub listing_token: Option<SecretString>,
    /// File holding the base persona prompt for all backends
    pub prompt_path: Option<PathBuf>,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            markdown_dir: PathBuf::from("docs/knowledge-base"),
            pdf_dir: PathBuf::from("docs/knowledge-base"),
            remote_urls: String::new(),
            remote_folder: None,
            max_total_chars: DEFAULT_MAX_TOTAL_CHARS,
            max_chars_per_source: DEFAULT_MAX_CHARS_PER_SOURCE,
            fetch_timeout_seconds: DEFAULT_FETCH_TIMEOUT_SECONDS,
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
            listing_api_base: DEFAULT_LISTING_API_BASE.to_string(),
            raw_content_base: DEFAULT_RAW_CONTENT_BASE.to_string(),
            listing_token: None,
            prompt_path: None,
        }
    }
}

impl KnowledgeConfig {
    /// Defaults overlaid with environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML file, then apply environment overrides
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&content)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document without consulting the environment
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| GrumpError::Serialization(e.to_string()))
    }

    /// Overlay values from a key lookup (the process environment in production).
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("KNOWLEDGE_BASE_MARKDOWN_DIR") {
            self.markdown_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("KNOWLEDGE_BASE_PDF_DIR") {
            self.pdf_dir = PathBuf::from(dir);
        }
        if let Some(urls) = lookup("KNOWLEDGE_BASE_REMOTE_URLS") {
            self.remote_urls = urls;
        }
        if let Some(folder) = lookup("KNOWLEDGE_BASE_REMOTE_FOLDER") {
            let folder = folder.trim();
            self.remote_folder = (!folder.is_empty()).then(|| folder.to_string());
        }

        self.max_total_chars = parse_or(
            &lookup,
            "KNOWLEDGE_BASE_MAX_TOTAL_CHARS",
            self.max_total_chars,
        );
        // The per-PDF name predates remote and markdown sources.
        self.max_chars_per_source = parse_or(
            &lookup,
            "KNOWLEDGE_BASE_MAX_CHARS_PER_PDF",
            self.max_chars_per_source,
        );
        self.max_chars_per_source = parse_or(
            &lookup,
            "KNOWLEDGE_BASE_MAX_CHARS_PER_SOURCE",
            self.max_chars_per_source,
        );
        self.fetch_timeout_seconds = parse_or(
            &lookup,
            "KNOWLEDGE_BASE_FETCH_TIMEOUT_SECONDS",
            self.fetch_timeout_seconds,
        );
        self.max_response_bytes = parse_or(
            &lookup,
            "KNOWLEDGE_BASE_MAX_RESPONSE_BYTES",
            self.max_response_bytes,
        );

        if let Some(token) = lookup("GITHUB_TOKEN").filter(|t| !t.trim().is_empty()) {
            self.listing_token = Some(SecretString::from(token.trim().to_string()));
        }
        if let Some(path) = lookup("GRUMP_PROMPT_PATH") {
            self.prompt_path = Some(PathBuf::from(path));
        }
    }

    /// Reject values the allocator and fetcher cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.max_total_chars == 0 {
            return Err(GrumpError::Config(
                "max_total_chars must be greater than zero".to_string(),
            ));
        }
        if self.max_chars_per_source == 0 {
            return Err(GrumpError::Config(
                "max_chars_per_source must be greater than zero".to_string(),
            ));
        }
        if self.fetch_timeout_seconds == 0 {
            return Err(GrumpError::Config(
                "fetch_timeout_seconds must be greater than zero".to_string(),
            ));
        }
        if self.max_response_bytes == 0 {
            return Err(GrumpError::Config(
                "max_response_bytes must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Explicit remote URLs in configuration order, trimmed and de-duplicated
    pub fn remote_url_list(&self) -> Vec<String> {
        let mut urls: Vec<String> = Vec::new();
        for raw in self.remote_urls.split(['\n', ',']) {
            let url = raw.trim();
            if url.is_empty() || urls.iter().any(|u| u == url) {
                continue;
            }
            urls.push(url.to_string());
        }
        urls
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, current: T) -> T
where
    T: FromStr + Copy,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                warn!(key, value = %raw, "Ignoring unparseable configuration value");
                current
            }
        },
        None => current,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config = KnowledgeConfig::default();
        assert_eq!(config.max_total_chars, 15_000);
        assert_eq!(config.max_chars_per_source, 750);
        assert!(config.remote_folder.is_none());
        assert!(config.remote_url_list().is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn env_overrides() {
        let mut config = KnowledgeConfig::default();
        config.apply_overrides(lookup_from(&[
            ("KNOWLEDGE_BASE_MARKDOWN_DIR", "/kb/md"),
            ("KNOWLEDGE_BASE_MAX_TOTAL_CHARS", "100"),
            ("KNOWLEDGE_BASE_MAX_CHARS_PER_PDF", "50"),
            ("KNOWLEDGE_BASE_REMOTE_FOLDER", "  "),
            ("GITHUB_TOKEN", "ghp_test"),
        ]));
        assert_eq!(config.markdown_dir, PathBuf::from("/kb/md"));
        assert_eq!(config.max_total_chars, 100);
        assert_eq!(config.max_chars_per_source, 50);
        assert!(config.remote_folder.is_none());
        let token = config.listing_token.as_ref().map(|t| t.expose_secret().to_string());
        assert_eq!(token.as_deref(), Some("ghp_test"));
    }

    #[test]
    fn per_source_name_wins_over_legacy_name() {
        let mut config = KnowledgeConfig::default();
        config.apply_overrides(lookup_from(&[
            ("KNOWLEDGE_BASE_MAX_CHARS_PER_PDF", "50"),
            ("KNOWLEDGE_BASE_MAX_CHARS_PER_SOURCE", "80"),
        ]));
        assert_eq!(config.max_chars_per_source, 80);
    }

    #[test]
    fn unparseable_numbers_keep_previous_value() {
        let mut config = KnowledgeConfig::default();
        config.apply_overrides(lookup_from(&[("KNOWLEDGE_BASE_MAX_TOTAL_CHARS", "lots")]));
        assert_eq!(config.max_total_chars, DEFAULT_MAX_TOTAL_CHARS);
    }

    #[test]
    fn remote_url_list_splits_and_dedupes() {
        let config = KnowledgeConfig {
            remote_urls: "https://a.test/x.md,\n https://b.test/y.pdf ,,https://a.test/x.md\n"
                .to_string(),
            ..Default::default()
        };
        assert_eq!(
            config.remote_url_list(),
            vec![
                "https://a.test/x.md".to_string(),
                "https://b.test/y.pdf".to_string()
            ]
        );
    }

    #[test]
    fn toml_round_trip_of_partial_file() -> anyhow::Result<()> {
        let config = KnowledgeConfig::from_toml_str(
            r#"
markdown_dir = "kb"
max_total_chars = 2000
remote_folder = "https://github.com/acme/docs/tree/main/kb"
"#,
        )?;
        assert_eq!(config.markdown_dir, PathBuf::from("kb"));
        assert_eq!(config.max_total_chars, 2000);
        assert_eq!(config.max_chars_per_source, DEFAULT_MAX_CHARS_PER_SOURCE);
        assert_eq!(
            config.remote_folder.as_deref(),
            Some("https://github.com/acme/docs/tree/main/kb")
        );
        Ok(())
    }

    #[test]
    fn validate_rejects_zero_budget() {
        let config = KnowledgeConfig {
            max_total_chars: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(GrumpError::Config(_))));
    }

    #[test]
    fn load_from_file() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("knowledge.toml");
        std::fs::write(&path, "max_chars_per_source = 300\n")?;
        let config = KnowledgeConfig::load_from(&path)?;
        assert_eq!(config.max_chars_per_source, 300);
        Ok(())
    }
}
