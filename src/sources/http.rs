use crate::http_client;
use crate::selectors::ListingPageSelectors;
use crate::source_trait::ListingSource;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use scraper::{Html, Selector};

/// Fetches results pages with plain HTTP requests.
///
/// No form is driven here: the search is expressed directly by `search_url`.
pub struct HttpSource {
    client: reqwest::Client,
    search_url: String,
    container: Selector,
    base_url: Option<String>,
    current_page: Option<String>,
}

impl HttpSource {
    pub fn new(
        user_agent: &str,
        search_url_template: &str,
        location: &str,
        selectors: &ListingPageSelectors,
    ) -> Result<Self> {
        let container = Selector::parse(&selectors.offer_list)
            .map_err(|e| anyhow!("Invalid offer list selector '{}': {:?}", selectors.offer_list, e))?;

        Ok(Self {
            client: http_client::listing_client(user_agent, http_client::DEFAULT_TIMEOUT)?,
            search_url: Self::build_search_url(search_url_template, location),
            container,
            base_url: None,
            current_page: None,
        })
    }

    /// Replaces the `{location}` placeholder with the URL-encoded location
    fn build_search_url(template: &str, location: &str) -> String {
        template.replace("{location}", &urlencoding::encode(location))
    }

    async fn fetch(&self, url: &str) -> Result<(String, String)> {
        tracing::debug!("Fetching {}", url);
        let response = self.client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {}", url))?
            .error_for_status()
            .with_context(|| format!("Bad status for {}", url))?;

        let final_url = response.url().to_string();
        let body = response.text().await.context("Failed to read response body")?;
        tracing::debug!("Fetched {} bytes from {}", body.len(), final_url);

        Ok((final_url, body))
    }

    fn container_markup(&self, html: &str) -> Result<String> {
        let document = Html::parse_document(html);
        document
            .select(&self.container)
            .next()
            .map(|container| container.inner_html())
            .context("Listing container not found in page")
    }
}

#[async_trait]
impl ListingSource for HttpSource {
    fn name(&self) -> &str {
        "http"
    }

    async fn prepare(&mut self) -> Result<()> {
        if self.search_url.is_empty() {
            anyhow::bail!("search_url is required for the http source");
        }

        let (final_url, body) = self.fetch(&self.search_url).await?;
        tracing::info!("Search results at {}", final_url);
        self.base_url = Some(final_url);
        self.current_page = Some(body);
        Ok(())
    }

    fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    async fn current_markup(&mut self) -> Result<String> {
        let page = self.current_page
            .as_deref()
            .context("No page loaded, call prepare first")?;
        self.container_markup(page)
    }

    async fn markup_at(&mut self, url: &str) -> Result<String> {
        let (_, body) = self.fetch(url).await?;
        let markup = self.container_markup(&body)?;
        self.current_page = Some(body);
        Ok(markup)
    }
}
