use std::net::IpAddr;
use thiserror::Error;
use url::Url;

/// Errors from validating a configured service base URL.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// Plain HTTP would put the API key on the wire in clear text.
    #[error("Insecure base URL: HTTPS required (except localhost for testing)")]
    Insecure,
    #[error("Base URL cannot carry a query string or fragment")]
    HasQuery,
}

/// Validates a base URL for the catalog or identity service.
///
/// Both services receive an API key in every request, so the base URL must be
/// HTTPS. Plain HTTP is accepted only for loopback hosts, which is what the
/// integration tests run against. Query strings and fragments are rejected
/// because request paths and parameters are appended to the base.
///
/// ```
/// use fakeflix::util::validate_base_url;
///
/// assert!(validate_base_url("https://api.themoviedb.org/3").is_ok());
/// assert!(validate_base_url("http://127.0.0.1:8080").is_ok());
/// assert!(validate_base_url("http://api.themoviedb.org/3").is_err());
/// assert!(validate_base_url("ftp://example.com").is_err());
/// ```
pub fn validate_base_url(url_str: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str.trim_end_matches('/'))?;

    match url.scheme() {
        "https" => {}
        "http" if is_loopback_host(&url) => {
            tracing::warn!(base_url = %url, "Using non-HTTPS base URL (localhost only)");
        }
        "http" => return Err(UrlValidationError::Insecure),
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }

    if url.query().is_some() || url.fragment().is_some() {
        return Err(UrlValidationError::HasQuery);
    }

    Ok(url)
}

/// Appends `path` (with or without a leading slash) to a validated base URL.
pub fn join_path(base: &Url, path: &str) -> Result<Url, UrlValidationError> {
    let joined = format!(
        "{}/{}",
        base.as_str().trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    Ok(Url::parse(&joined)?)
}

fn is_loopback_host(url: &Url) -> bool {
    let Some(host) = url.host_str() else {
        return false;
    };
    if host == "localhost" {
        return true;
    }
    let host = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    host.parse::<IpAddr>().is_ok_and(|ip| ip.is_loopback())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_https_accepted() {
        let url = validate_base_url("https://api.themoviedb.org/3/").unwrap();
        assert_eq!(url.as_str(), "https://api.themoviedb.org/3");
    }

    #[test]
    fn test_plain_http_rejected_for_public_hosts() {
        assert!(matches!(
            validate_base_url("http://api.themoviedb.org/3"),
            Err(UrlValidationError::Insecure)
        ));
    }

    #[test]
    fn test_plain_http_allowed_for_loopback() {
        assert!(validate_base_url("http://localhost:3000").is_ok());
        assert!(validate_base_url("http://127.0.0.1:8080").is_ok());
        assert!(validate_base_url("http://[::1]:8080").is_ok());
    }

    #[test]
    fn test_other_schemes_rejected() {
        assert!(matches!(
            validate_base_url("file:///etc/passwd"),
            Err(UrlValidationError::UnsupportedScheme(_))
        ));
    }

    #[test]
    fn test_query_rejected() {
        assert!(matches!(
            validate_base_url("https://example.com/3?api_key=x"),
            Err(UrlValidationError::HasQuery)
        ));
    }

    #[test]
    fn test_join_path() {
        let base = validate_base_url("https://api.themoviedb.org/3").unwrap();
        let url = join_path(&base, "/discover/movie").unwrap();
        assert_eq!(url.as_str(), "https://api.themoviedb.org/3/discover/movie");

        let bare = validate_base_url("http://127.0.0.1:9000").unwrap();
        let url = join_path(&bare, "movie/upcoming").unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:9000/movie/upcoming");
    }
}
