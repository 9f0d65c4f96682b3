use thiserror::Error;
use url::Url;

/// Errors that can occur during URL validation.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    /// The URL string could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// The URL has no host component.
    #[error("URL has no host")]
    MissingHost,
    /// A bare hostname was expected but something else was supplied.
    #[error("Invalid hostname: {0} (expected e.g. sendy.example.com)")]
    InvalidHostname(String),
}

/// Validates a URL string for use as a feed source.
///
/// Rejects anything that is not an absolute `http`/`https` URL with a host.
/// Surrounding whitespace is ignored.
///
/// # Examples
///
/// ```
/// use rss2push::util::validate_url;
///
/// let url = validate_url("https://example.com/feed.xml").unwrap();
/// assert_eq!(url.host_str(), Some("example.com"));
///
/// assert!(validate_url("file:///etc/passwd").is_err());
/// assert!(validate_url("not a url").is_err());
/// ```
pub fn validate_url(url_str: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str.trim())?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }

    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(url),
        _ => Err(UrlValidationError::MissingHost),
    }
}

/// Builds `https://<hostname><path>` for a service configured by hostname.
///
/// The hostname may carry a port but no scheme, path, query or credentials.
///
/// ```
/// use rss2push::util::service_endpoint;
///
/// let url = service_endpoint("sendy.example.com", "/api/campaigns/create.php").unwrap();
/// assert_eq!(url.as_str(), "https://sendy.example.com/api/campaigns/create.php");
/// assert!(service_endpoint("https://sendy.example.com", "/x").is_err());
/// ```
pub fn service_endpoint(hostname: &str, path: &str) -> Result<Url, UrlValidationError> {
    let hostname = hostname.trim();
    if hostname.is_empty()
        || hostname.contains("://")
        || hostname.contains(['/', '?', '#', '@'])
        || hostname.chars().any(char::is_whitespace)
    {
        return Err(UrlValidationError::InvalidHostname(hostname.to_owned()));
    }

    let mut url = Url::parse(&format!("https://{}", hostname))
        .map_err(|_| UrlValidationError::InvalidHostname(hostname.to_owned()))?;
    url.set_path(path);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_urls() {
        assert!(validate_url("https://example.com/feed.xml").is_ok());
        assert!(validate_url("http://news.example.org").is_ok());
        assert!(validate_url("  https://example.com/rss  ").is_ok());
    }

    #[test]
    fn test_local_urls_accepted() {
        // Self-hosted feeds on the local network are a normal use case
        assert!(validate_url("http://127.0.0.1:8080/feed").is_ok());
        assert!(validate_url("http://localhost/feed").is_ok());
    }

    #[test]
    fn test_invalid_schemes() {
        assert!(matches!(
            validate_url("file:///etc/passwd"),
            Err(UrlValidationError::UnsupportedScheme(_))
        ));
        assert!(validate_url("ftp://example.com").is_err());
    }

    #[test]
    fn test_relative_url_rejected() {
        assert!(matches!(
            validate_url("/feed.xml"),
            Err(UrlValidationError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_service_endpoint_with_port() {
        let url = service_endpoint("mail.example.com:8443", "/api/campaigns/create.php").unwrap();
        assert_eq!(
            url.as_str(),
            "https://mail.example.com:8443/api/campaigns/create.php"
        );
    }

    #[test]
    fn test_service_endpoint_rejects_paths_and_schemes() {
        assert!(service_endpoint("", "/x").is_err());
        assert!(service_endpoint("sendy.example.com/sub", "/x").is_err());
        assert!(service_endpoint("http://sendy.example.com", "/x").is_err());
        assert!(service_endpoint("user@sendy.example.com", "/x").is_err());
    }
}
