use std::collections::HashSet;
use thiserror::Error;
use url::Url;

use crate::config::ConfigError;

/// Errors that can occur during feed URL validation.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    /// The URL string could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// The URL has no host to connect to.
    #[error("URL has no host")]
    MissingHost,
}

/// Validates a URL string for use as a feed source.
///
/// Only `http` and `https` URLs with a host are accepted; anything else
/// (`file://`, `ftp://`, bare paths) is rejected before a fetch starts.
///
/// # Examples
///
/// ```
/// use feedflux::util::validate_url;
///
/// let url = validate_url("https://example.com/feed.xml").unwrap();
/// assert_eq!(url.host_str(), Some("example.com"));
///
/// assert!(validate_url("file:///etc/passwd").is_err());
/// ```
pub fn validate_url(url_str: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str)?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }

    if url.host_str().is_none_or(str::is_empty) {
        return Err(UrlValidationError::MissingHost);
    }

    Ok(url)
}

/// Collect the requested sources and drop repeats.
///
/// Sources keep their original spelling (it is the checkpoint key) and the
/// order of first appearance. A repeated URL would otherwise get two workers
/// racing on one checkpoint file. Individual URLs are not checked here: a
/// malformed one fails only its own source when the fetcher calls
/// [`validate_url`].
///
/// # Errors
///
/// - [`ConfigError::NoSources`] - `urls` is empty
pub fn validate_sources<I, S>(urls: I) -> Result<Vec<String>, ConfigError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut seen = HashSet::new();
    let mut sources = Vec::new();

    for url in urls {
        let url = url.into();
        if seen.insert(url.clone()) {
            sources.push(url);
        } else {
            tracing::debug!(url = %url, "Ignoring duplicate feed url");
        }
    }

    if sources.is_empty() {
        return Err(ConfigError::NoSources);
    }

    Ok(sources)
}
