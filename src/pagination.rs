use crate::extractor::ListingExtractor;
use crate::models::ListingBatch;
use crate::source_trait::ListingSource;
use anyhow::{Context, Result};
use reqwest::Url;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct PaginationOptions {
    /// Collection stops once the batch holds more than this many listings
    pub ceiling: usize,
    /// Stop after this many consecutive pages without a single listing (0 disables)
    pub empty_page_limit: usize,
    pub request_delay: Duration,
}

impl Default for PaginationOptions {
    fn default() -> Self {
        Self {
            ceiling: 1000,
            empty_page_limit: 2,
            request_delay: Duration::ZERO,
        }
    }
}

/// Adds `page=<n>` to `base`, replacing any page parameter already present.
pub fn paginated_url(base: &str, page: usize) -> Result<String> {
    let mut url = Url::parse(base).with_context(|| format!("Invalid base URL '{}'", base))?;
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != "page")
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    url.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair("page", &page.to_string());

    Ok(url.to_string())
}

/// Walks the results pages of `source` and accumulates every extracted listing.
///
/// Page 1 is whatever the source currently shows; later pages are addressed
/// through the base URL captured during preparation. The loop ends when the
/// batch grows past the ceiling or when `empty_page_limit` consecutive pages
/// come back without listings. Any source error aborts the collection.
pub async fn collect_listings(
    source: &mut dyn ListingSource,
    extractor: &ListingExtractor,
    options: &PaginationOptions,
) -> Result<ListingBatch> {
    let (batch, pages) = collect_pages(source, extractor, options).await?;
    tracing::info!("Collected {} listings from {} pages", batch.len(), pages);
    Ok(batch)
}

/// Same as [`collect_listings`], also returning how many pages were fetched.
async fn collect_pages(
    source: &mut dyn ListingSource,
    extractor: &ListingExtractor,
    options: &PaginationOptions,
) -> Result<(ListingBatch, usize)> {
    let mut batch = ListingBatch::new();
    let mut fetched = 0;
    let mut empty_pages = 0;

    while batch.len() <= options.ceiling {
        let page = fetched + 1;
        let markup = if page == 1 {
            source.current_markup().await?
        } else {
            if !options.request_delay.is_zero() {
                tokio::time::sleep(options.request_delay).await;
            }
            let base = source.base_url().context("No base URL captured for pagination")?;
            let url = paginated_url(base, page)?;
            source
                .markup_at(&url)
                .await
                .with_context(|| format!("Failed to load page {}", page))?
        };
        fetched = page;

        let records = extractor.extract(&markup);
        tracing::info!("Page {}: {} listings ({} collected)", page, records.len(), batch.len() + records.len());

        if records.is_empty() {
            empty_pages += 1;
            if options.empty_page_limit > 0 && empty_pages >= options.empty_page_limit {
                tracing::info!("{} consecutive empty pages, assuming last page reached", empty_pages);
                break;
            }
        } else {
            empty_pages = 0;
        }

        batch.extend(records);
    }

    Ok((batch, fetched))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selectors::ListingPageSelectors;
    use async_trait::async_trait;

    fn listing_markup(count: usize, page: usize) -> String {
        (0..count)
            .map(|i| {
                format!(
                    r#"<li><article><p>Kraków</p><div><span>p{page} o{i}</span></div>
                    <div><span>500 000 zł</span><span>x</span><span>2 pokoje</span><span>40 m²</span></div></article></li>"#
                )
            })
            .collect()
    }

    /// Serves `pages[n-1]` listings for page n, and an empty list past the end.
    struct FakeSource {
        pages: Vec<usize>,
        requested: Vec<String>,
        fail_on_page: Option<usize>,
    }

    impl FakeSource {
        fn with_pages(pages: Vec<usize>) -> Self {
            Self { pages, requested: Vec::new(), fail_on_page: None }
        }

        fn page_markup(&self, page: usize) -> Result<String> {
            if self.fail_on_page == Some(page) {
                anyhow::bail!("navigation timeout");
            }
            let count = self.pages.get(page - 1).copied().unwrap_or(0);
            Ok(listing_markup(count, page))
        }
    }

    #[async_trait]
    impl ListingSource for FakeSource {
        fn name(&self) -> &str {
            "fake"
        }

        async fn prepare(&mut self) -> Result<()> {
            Ok(())
        }

        fn base_url(&self) -> Option<&str> {
            Some("https://www.otodom.pl/pl/wyniki/sprzedaz/mieszkanie/malopolskie/krakow")
        }

        async fn current_markup(&mut self) -> Result<String> {
            self.requested.push("current".to_string());
            self.page_markup(1)
        }

        async fn markup_at(&mut self, url: &str) -> Result<String> {
            self.requested.push(url.to_string());
            let page: usize = url.rsplit("page=").next().unwrap().parse().unwrap();
            self.page_markup(page)
        }
    }

    fn extractor() -> ListingExtractor {
        ListingExtractor::new(&ListingPageSelectors::default()).unwrap()
    }

    fn options(ceiling: usize, empty_page_limit: usize) -> PaginationOptions {
        PaginationOptions { ceiling, empty_page_limit, request_delay: Duration::ZERO }
    }

    #[test]
    fn test_paginated_url_appends_page() {
        let url = paginated_url("https://www.otodom.pl/pl/wyniki/sprzedaz/mieszkanie/krakow", 2).unwrap();
        assert_eq!(url, "https://www.otodom.pl/pl/wyniki/sprzedaz/mieszkanie/krakow?page=2");
    }

    #[test]
    fn test_paginated_url_keeps_other_params() {
        let url = paginated_url("https://www.otodom.pl/wyniki?limit=36&page=4&by=DEFAULT", 5).unwrap();
        assert_eq!(url, "https://www.otodom.pl/wyniki?limit=36&by=DEFAULT&page=5");
    }

    #[test]
    fn test_paginated_url_rejects_garbage() {
        assert!(paginated_url("not a url", 2).is_err());
    }

    #[tokio::test]
    async fn test_stops_after_exceeding_ceiling() {
        let mut source = FakeSource::with_pages(vec![36; 100]);
        let batch = collect_listings(&mut source, &extractor(), &options(100, 2)).await.unwrap();

        // 36 * 3 = 108 is the first total above 100
        assert_eq!(batch.len(), 108);
        assert!(batch.len() > 100 && batch.len() <= 100 + 36);
        assert_eq!(source.requested.len(), 3);
    }

    #[tokio::test]
    async fn test_ceiling_reached_exactly_keeps_going() {
        let mut source = FakeSource::with_pages(vec![5; 10]);
        let batch = collect_listings(&mut source, &extractor(), &options(10, 0)).await.unwrap();
        assert_eq!(batch.len(), 15, "a batch equal to the ceiling is not yet past it");
    }

    #[tokio::test]
    async fn test_first_page_uses_current_markup_then_page_urls() {
        let mut source = FakeSource::with_pages(vec![3, 3, 3]);
        collect_listings(&mut source, &extractor(), &options(7, 2)).await.unwrap();

        assert_eq!(source.requested[0], "current");
        assert!(source.requested[1].ends_with("krakow?page=2"));
        assert!(source.requested[2].ends_with("krakow?page=3"));
    }

    #[tokio::test]
    async fn test_batch_preserves_page_order() {
        let mut source = FakeSource::with_pages(vec![2, 2]);
        let batch = collect_listings(&mut source, &extractor(), &options(3, 1)).await.unwrap();

        let titles: Vec<&str> = batch.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["p1 o0", "p1 o1", "p2 o0", "p2 o1"]);
    }

    #[tokio::test]
    async fn test_consecutive_empty_pages_end_collection() {
        let mut source = FakeSource::with_pages(vec![10, 10, 0, 4, 0, 0, 10]);
        let batch = collect_listings(&mut source, &extractor(), &options(1000, 2)).await.unwrap();

        assert_eq!(batch.len(), 24, "a single empty page must not stop the loop");
        assert_eq!(source.requested.len(), 6);
    }

    #[tokio::test]
    async fn test_page_count_includes_final_empty_page() {
        let mut source = FakeSource::with_pages(vec![4, 0, 0]);
        let (batch, pages) = collect_pages(&mut source, &extractor(), &options(1000, 2)).await.unwrap();

        assert_eq!(batch.len(), 4);
        assert_eq!(pages, 3);
        assert_eq!(pages, source.requested.len());
    }

    #[tokio::test]
    async fn test_page_count_when_ceiling_is_passed() {
        let mut source = FakeSource::with_pages(vec![6; 5]);
        let (batch, pages) = collect_pages(&mut source, &extractor(), &options(10, 2)).await.unwrap();

        assert_eq!(batch.len(), 12);
        assert_eq!(pages, 2);
    }

    #[tokio::test]
    async fn test_source_error_aborts_collection() {
        let mut source = FakeSource::with_pages(vec![10; 10]);
        source.fail_on_page = Some(3);

        let err = collect_listings(&mut source, &extractor(), &options(1000, 2)).await.unwrap_err();
        assert!(format!("{:#}", err).contains("page 3"));
    }

    #[tokio::test]
    async fn test_higher_ceiling_never_collects_less() {
        // 23 listings in total, so every ceiling below 23 is eventually exceeded
        let pages = vec![7, 0, 3, 12, 1];
        let mut totals = Vec::new();
        for ceiling in 0..23 {
            let mut source = FakeSource::with_pages(pages.clone());
            let batch = collect_listings(&mut source, &extractor(), &options(ceiling, 0)).await.unwrap();
            assert!(batch.len() > ceiling);
            totals.push(batch.len());
        }
        assert!(totals.windows(2).all(|w| w[0] <= w[1]), "totals: {:?}", totals);
    }
}
