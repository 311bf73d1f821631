//! Page keys and prefetch requests

use crate::Result;
use std::fmt;
use url::Url;

/// Normalized absolute URL identifying a cached page.
///
/// Identity is fragment-sensitive: `/a#x` and `/a#y` are distinct entries.
/// Use [`PageKey::same_document`] for fragment-insensitive comparison.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageKey(Url);

impl PageKey {
    /// Wrap an already parsed URL
    pub fn new(url: Url) -> Self {
        Self(url)
    }

    /// Parse an absolute URL
    pub fn parse(input: &str) -> Result<Self> {
        Ok(Self(Url::parse(input)?))
    }

    /// Resolve a possibly relative reference against a base URL
    pub fn resolve(base: &Url, input: &str) -> Result<Self> {
        Ok(Self(base.join(input)?))
    }

    /// Underlying URL
    pub fn url(&self) -> &Url {
        &self.0
    }

    /// Serialized form
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Whether the key carries a `#fragment`
    pub fn has_fragment(&self) -> bool {
        self.0.fragment().is_some()
    }

    /// The same key with any fragment removed
    pub fn without_fragment(&self) -> PageKey {
        let mut url = self.0.clone();
        url.set_fragment(None);
        PageKey(url)
    }

    /// True when both URLs point at the same document, ignoring fragments
    pub fn same_document(&self, other: &Url) -> bool {
        let mut other = other.clone();
        other.set_fragment(None);
        self.without_fragment().0 == other
    }

    /// `scheme://host[:port]` of the key
    pub fn origin(&self) -> String {
        self.0.origin().ascii_serialization()
    }
}

impl fmt::Display for PageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Url> for PageKey {
    fn from(url: Url) -> Self {
        Self(url)
    }
}

impl AsRef<str> for PageKey {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

/// The request a prefetch actually issues.
///
/// By default it is a plain GET of the page URL; hosts may rewrite it (for
/// example to hit a JSON endpoint) through a request transform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// Target URL
    pub url: Url,
    /// Extra request headers
    pub headers: Vec<(String, String)>,
}

impl PageRequest {
    /// Plain GET of `url`
    pub fn get(url: Url) -> Self {
        Self {
            url,
            headers: Vec::new(),
        }
    }

    /// Add header
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }
}

impl From<&PageKey> for PageRequest {
    fn from(key: &PageKey) -> Self {
        PageRequest::get(key.url().clone())
    }
}
