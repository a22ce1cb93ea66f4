//! Remote folder references
//!
//! A folder is written as a browser or raw-content URL and expanded through
//! the hosting service's contents API into one [`DocumentRef`] per `.md` or
//! `.pdf` file. Accepted shapes:
//!
//! - `https://<host>/raw/<user>/<repo>/<branch>/<path>/`
//! - `https://raw.githubusercontent.com/<user>/<repo>/<branch>/<path>`
//! - `https://<host>/<user>/<repo>/(tree|blob|raw)/<branch>/<path>`

use crate::{IngestError, Result};
use grump_protocol::models::{DocumentCategory, DocumentRef};
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::sync::OnceLock;
use thiserror::Error;
use tracing::{debug, info, instrument};
use url::Url;

static RAW_HOST_PATTERN: OnceLock<Regex> = OnceLock::new();
static RAW_PREFIX_PATTERN: OnceLock<Regex> = OnceLock::new();
static BROWSER_PATTERN: OnceLock<Regex> = OnceLock::new();

fn folder_patterns() -> Result<[&'static Regex; 3]> {
    fn compile(cell: &'static OnceLock<Regex>, pattern: &str) -> Result<&'static Regex> {
        if let Some(re) = cell.get() {
            return Ok(re);
        }
        let re = Regex::new(pattern)
            .map_err(|e| IngestError::Configuration(format!("bad folder pattern: {e}")))?;
        Ok(cell.get_or_init(|| re))
    }

    Ok([
        compile(
            &RAW_HOST_PATTERN,
            r"^https?://raw\.githubusercontent\.com/([^/]+)/([^/]+)/([^/]+)/(.+)$",
        )?,
        compile(
            &RAW_PREFIX_PATTERN,
            r"^https?://[^/]+/raw/([^/]+)/([^/]+)/([^/]+)/(.+)$",
        )?,
        compile(
            &BROWSER_PATTERN,
            r"^https?://[^/]+/([^/]+)/([^/]+)/(?:tree|blob|raw)/([^/]+)/(.+)$",
        )?,
    ])
}

/// Failures of the directory-listing API
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DirectoryListingError {
    /// The folder does not exist (HTTP 404)
    #[error("folder not found")]
    NotFound,
    /// The listing was refused (HTTP 401/403)
    #[error("access denied (HTTP {0})")]
    AccessDenied(u16),
    /// The API rate limit is spent
    #[error("rate limited")]
    RateLimited,
    /// Any other non-success status
    #[error("unexpected HTTP status {0}")]
    Status(u16),
    /// The request did not complete
    #[error("transport error: {0}")]
    Transport(String),
    /// The response was not a directory listing
    #[error("malformed listing: {0}")]
    Malformed(String),
}

/// A parsed folder reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderRef {
    /// Repository owner
    pub user: String,
    /// Repository name
    pub repo: String,
    /// Branch or ref
    pub branch: String,
    /// Folder path inside the repository, without surrounding slashes
    pub path: String,
}

impl FolderRef {
    /// Parse any accepted folder URL shape
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        let without_query = trimmed.split(['?', '#']).next().unwrap_or(trimmed);
        let candidate = without_query.trim_end_matches('/');

        for pattern in folder_patterns()? {
            if let Some(caps) = pattern.captures(candidate) {
                let path = caps[4].trim_matches('/').to_string();
                if path.is_empty() {
                    break;
                }
                return Ok(Self {
                    user: caps[1].to_string(),
                    repo: caps[2].to_string(),
                    branch: caps[3].to_string(),
                    path,
                });
            }
        }

        Err(IngestError::Configuration(format!(
            "unrecognized remote folder reference: {trimmed}"
        )))
    }

    /// Contents-API URL that lists this folder
    pub fn listing_url(&self, api_base: &str) -> Result<Url> {
        let raw = format!(
            "{}/repos/{}/{}/contents/{}",
            api_base.trim_end_matches('/'),
            self.user,
            self.repo,
            self.path
        );
        let mut url = Url::parse(&raw)
            .map_err(|e| IngestError::Configuration(format!("invalid listing URL {raw}: {e}")))?;
        url.query_pairs_mut().append_pair("ref", &self.branch);
        Ok(url)
    }

    /// Raw-content URL of a file directly inside this folder
    pub fn raw_file_url(&self, raw_base: &str, name: &str) -> String {
        format!(
            "{}/{}/{}/{}/{}/{}",
            raw_base.trim_end_matches('/'),
            self.user,
            self.repo,
            self.branch,
            self.path,
            name
        )
    }
}

impl std::fmt::Display for FolderRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}@{}:{}", self.user, self.repo, self.branch, self.path)
    }
}

#[derive(Debug, Deserialize)]
struct ListingEntry {
    name: String,
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    download_url: Option<String>,
}

/// Client for the contents API
#[derive(Clone)]
pub struct FolderLister {
    http: reqwest::Client,
    api_base: String,
    raw_base: String,
    token: Option<SecretString>,
}

impl std::fmt::Debug for FolderLister {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FolderLister")
            .field("api_base", &self.api_base)
            .field("raw_base", &self.raw_base)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl FolderLister {
    /// Create a lister against `api_base`, falling back to `raw_base` for
    /// entries without a download URL
    pub fn new(http: reqwest::Client, api_base: impl Into<String>, raw_base: impl Into<String>) -> Self {
        Self {
            http,
            api_base: api_base.into(),
            raw_base: raw_base.into(),
            token: None,
        }
    }

    /// Authenticate listing requests
    pub fn with_token(mut self, token: Option<SecretString>) -> Self {
        self.token = token;
        self
    }

    /// List the supported files directly inside `folder`, sorted by name
    #[instrument(skip(self, folder), fields(folder = %folder))]
    pub async fn list(&self, folder: &FolderRef) -> Result<Vec<DocumentRef>> {
        let url = folder.listing_url(&self.api_base)?;
        debug!(url = %url, "Listing remote folder");

        let mut request = self
            .http
            .get(url)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token.expose_secret());
        }

        let response = request
            .send()
            .await
            .map_err(|e| DirectoryListingError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let rate_spent = response
                .headers()
                .get("x-ratelimit-remaining")
                .and_then(|v| v.to_str().ok())
                .is_some_and(|v| v.trim() == "0");
            let err = match status.as_u16() {
                404 => DirectoryListingError::NotFound,
                429 => DirectoryListingError::RateLimited,
                401 | 403 if rate_spent => DirectoryListingError::RateLimited,
                code @ (401 | 403) => DirectoryListingError::AccessDenied(code),
                code => DirectoryListingError::Status(code),
            };
            return Err(err.into());
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| DirectoryListingError::Malformed(e.to_string()))?;
        if !body.is_array() {
            return Err(DirectoryListingError::Malformed(
                "listing target is not a directory".to_string(),
            )
            .into());
        }
        let mut entries: Vec<ListingEntry> = serde_json::from_value(body)
            .map_err(|e| DirectoryListingError::Malformed(e.to_string()))?;
        entries.sort_by(|a, b| a.name.cmp(&b.name));

        let documents: Vec<DocumentRef> = entries
            .into_iter()
            .filter(|e| e.kind == "file" && DocumentCategory::is_supported_name(&e.name))
            .map(|e| {
                let url = e
                    .download_url
                    .filter(|u| !u.trim().is_empty())
                    .unwrap_or_else(|| folder.raw_file_url(&self.raw_base, &e.name));
                DocumentRef::remote(url).with_category(DocumentCategory::from_identifier(&e.name))
            })
            .collect();

        info!(count = documents.len(), "Expanded remote folder");
        Ok(documents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn expected() -> FolderRef {
        FolderRef {
            user: "acme".to_string(),
            repo: "docs".to_string(),
            branch: "main".to_string(),
            path: "kb/guides".to_string(),
        }
    }

    #[test]
    fn parses_every_shape() -> anyhow::Result<()> {
        for input in [
            "https://github.com/raw/acme/docs/main/kb/guides/",
            "https://raw.githubusercontent.com/acme/docs/main/kb/guides",
            "https://github.com/acme/docs/tree/main/kb/guides",
            "https://github.com/acme/docs/blob/main/kb/guides/",
            "  https://github.com/acme/docs/tree/main/kb/guides?tab=readme  ",
        ] {
            assert_eq!(FolderRef::parse(input)?, expected(), "input: {input}");
        }
        Ok(())
    }

    #[test]
    fn rejects_unknown_shapes() {
        for input in [
            "",
            "not a url",
            "https://github.com/acme/docs",
            "https://github.com/acme/docs/tree/main",
            "ftp://github.com/acme/docs/tree/main/kb",
        ] {
            assert!(
                matches!(FolderRef::parse(input), Err(IngestError::Configuration(_))),
                "input: {input}"
            );
        }
    }

    #[test]
    fn listing_url_is_shape_independent() -> anyhow::Result<()> {
        let a = FolderRef::parse("https://github.com/raw/acme/docs/main/kb/guides/")?;
        let b = FolderRef::parse("https://github.com/acme/docs/tree/main/kb/guides")?;
        let url_a = a.listing_url("https://api.github.com")?;
        let url_b = b.listing_url("https://api.github.com/")?;
        assert_eq!(url_a, url_b);
        assert_eq!(
            url_a.as_str(),
            "https://api.github.com/repos/acme/docs/contents/kb/guides?ref=main"
        );
        Ok(())
    }

    #[test]
    fn raw_file_url_fallback() {
        assert_eq!(
            expected().raw_file_url("https://raw.githubusercontent.com/", "a.md"),
            "https://raw.githubusercontent.com/acme/docs/main/kb/guides/a.md"
        );
    }

    #[test]
    fn debug_hides_token() {
        let lister = FolderLister::new(reqwest::Client::new(), "https://api.test", "https://raw.test")
            .with_token(Some(SecretString::from("ghp_secret".to_string())));
        let rendered = format!("{lister:?}");
        assert!(!rendered.contains("ghp_secret"));
        assert!(rendered.contains("[REDACTED]"));
    }
}
