//! Request-like values and their identity.
//!
//! Fetches are keyed by the absolute URL string of their request, so two
//! requests for the same URL are "the same" for cancellation even when they
//! were made through different value types.

use reqwest::Url;

use crate::error::{ExtractError, Result};

/// An absolute `http`/`https` URL plus any extra request headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRequest {
    url: Url,
    headers: Vec<(String, String)>,
}

impl ImageRequest {
    pub fn new(url: Url) -> Result<Self> {
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ExtractError::InvalidRequest(format!(
                "unsupported scheme '{}' in {}",
                url.scheme(),
                url
            )));
        }
        if url.host_str().is_none_or(str::is_empty) {
            return Err(ExtractError::InvalidRequest(format!("missing host in {url}")));
        }
        Ok(Self {
            url,
            headers: Vec::new(),
        })
    }

    pub fn parse(input: &str) -> Result<Self> {
        let url = Url::parse(input.trim())
            .map_err(|e| ExtractError::InvalidRequest(format!("{input:?}: {e}")))?;
        Self::new(url)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[inline]
    pub fn url(&self) -> &Url {
        &self.url
    }

    #[inline]
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Normalized absolute URL used to match fetches.
    pub fn identity(&self) -> String {
        self.url.as_str().to_string()
    }
}

/// Anything that can name an image to fetch.
pub trait RequestSource {
    /// Builds a well-formed request, or `None` when this value cannot be fetched.
    fn to_request(&self) -> Option<ImageRequest>;

    /// The identity string reported back to callers. Falls back to the raw
    /// text when the value never parsed.
    fn to_url_string(&self) -> Option<String>;
}

impl RequestSource for str {
    fn to_request(&self) -> Option<ImageRequest> {
        ImageRequest::parse(self).ok()
    }

    fn to_url_string(&self) -> Option<String> {
        match Url::parse(self.trim()) {
            Ok(url) => Some(url.as_str().to_string()),
            Err(_) => Some(self.to_string()),
        }
    }
}

impl RequestSource for String {
    fn to_request(&self) -> Option<ImageRequest> {
        self.as_str().to_request()
    }

    fn to_url_string(&self) -> Option<String> {
        self.as_str().to_url_string()
    }
}

impl RequestSource for Url {
    fn to_request(&self) -> Option<ImageRequest> {
        ImageRequest::new(self.clone()).ok()
    }

    fn to_url_string(&self) -> Option<String> {
        Some(self.as_str().to_string())
    }
}

impl RequestSource for ImageRequest {
    fn to_request(&self) -> Option<ImageRequest> {
        Some(self.clone())
    }

    fn to_url_string(&self) -> Option<String> {
        Some(self.identity())
    }
}

impl<T: RequestSource + ?Sized> RequestSource for &T {
    fn to_request(&self) -> Option<ImageRequest> {
        (**self).to_request()
    }

    fn to_url_string(&self) -> Option<String> {
        (**self).to_url_string()
    }
}

/// Identity of any request-like value, empty when it has none.
pub(crate) fn identity_of<R: RequestSource + ?Sized>(request: &R) -> String {
    match request.to_request() {
        Some(request) => request.identity(),
        None => request.to_url_string().unwrap_or_default(),
    }
}
