use crate::config::{Config, SourceKind};
use crate::sources::{BrowserSource, HttpSource};
use anyhow::Result;
use async_trait::async_trait;

/// Provides the markup of the results container, page by page.
#[async_trait]
pub trait ListingSource: Send {
    /// Returns the name of the source
    fn name(&self) -> &str;

    /// Reaches the first results page for the configured search
    async fn prepare(&mut self) -> Result<()>;

    /// URL of the first results page, captured by `prepare`
    fn base_url(&self) -> Option<&str>;

    /// Container markup of the page currently loaded
    async fn current_markup(&mut self) -> Result<String>;

    /// Loads `url` and returns its container markup
    async fn markup_at(&mut self, url: &str) -> Result<String>;

    /// Releases whatever the source holds (browser process, connections)
    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Builds the source selected in the configuration
pub fn from_config(config: &Config) -> Result<Box<dyn ListingSource>> {
    let source: Box<dyn ListingSource> = match config.source {
        SourceKind::Browser => Box::new(BrowserSource::new(
            config.main_page.clone(),
            &config.listing_page,
            &config.location,
        )),
        SourceKind::Http => Box::new(HttpSource::new(
            &config.user_agent,
            config.search_url.as_deref().unwrap_or_default(),
            &config.location,
            &config.listing_page,
        )?),
    };

    tracing::info!("Using {} source", source.name());
    Ok(source)
}
