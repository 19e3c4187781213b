use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use std::time::Duration;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Headers a Polish desktop browser sends on a top-level navigation.
/// Names must be lowercase.
const NAVIGATION_HEADERS: &[(&str, &str)] = &[
    ("accept", "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8"),
    ("accept-language", "pl-PL,pl;q=0.9,en-US;q=0.8,en;q=0.7"),
    ("dnt", "1"),
    ("upgrade-insecure-requests", "1"),
    ("sec-fetch-dest", "document"),
    ("sec-fetch-mode", "navigate"),
];

fn navigation_headers() -> HeaderMap {
    NAVIGATION_HEADERS
        .iter()
        .map(|&(name, value)| (HeaderName::from_static(name), HeaderValue::from_static(value)))
        .collect()
}

/// Client for fetching results pages.
///
/// Cookies set by the site (consent, session) are kept for the client's lifetime,
/// so follow-up page requests look like the same visitor.
pub fn listing_client(user_agent: &str, timeout: Duration) -> Result<Client> {
    Client::builder()
        .user_agent(user_agent)
        .default_headers(navigation_headers())
        .cookie_store(true)
        .timeout(timeout)
        .build()
        .context("Failed to build HTTP client")
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::ACCEPT_LANGUAGE;

    #[test]
    fn test_navigation_headers_are_polish() {
        let headers = navigation_headers();
        assert_eq!(headers.len(), NAVIGATION_HEADERS.len());
        assert!(headers[ACCEPT_LANGUAGE].to_str().unwrap().starts_with("pl-PL"));
        assert_eq!(headers["sec-fetch-mode"], "navigate");
    }

    #[test]
    fn test_listing_client_builds() {
        assert!(listing_client("Mozilla/5.0 (Test Agent)", DEFAULT_TIMEOUT).is_ok());
    }

    #[tokio::test]
    async fn test_silent_server_times_out() {
        // Accepts the connection but never answers
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let client = listing_client("Mozilla/5.0 (Test Agent)", Duration::from_millis(200)).unwrap();
        let err = client.get(format!("http://{}/", addr)).send().await.unwrap_err();
        assert!(err.is_timeout());

        server.abort();
    }
}
