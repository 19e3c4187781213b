use crate::config::Config;
use crate::database::DocumentStore;
use crate::extractor::ListingExtractor;
use crate::models::ListingBatch;
use crate::output;
use crate::pagination::{collect_listings, PaginationOptions};
use crate::source_trait::{self, ListingSource};
use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, Months, NaiveDate, Utc};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

impl From<&Config> for PaginationOptions {
    fn from(config: &Config) -> Self {
        Self {
            ceiling: config.listing_ceiling,
            empty_page_limit: config.empty_page_limit,
            request_delay: Duration::from_millis(config.request_delay_ms),
        }
    }
}

/// Prepares `source`, paginates through it, and releases it whatever the outcome.
pub async fn collect_from(
    source: &mut dyn ListingSource,
    extractor: &ListingExtractor,
    options: &PaginationOptions,
) -> Result<ListingBatch> {
    let result = async {
        source.prepare().await?;
        collect_listings(source, extractor, options).await
    }
    .await;

    if let Err(e) = source.close().await {
        tracing::warn!("Failed to release {} source: {}", source.name(), e);
    }

    result.map_err(|e| {
        tracing::error!("Listing collection failed: {:#}", e);
        e
    })
}

/// Stage 1: scrape listings with the configured source
pub async fn collect(config: &Config) -> Result<ListingBatch> {
    tracing::info!("Data scraping started for {}", config.location);
    let extractor = ListingExtractor::new(&config.listing_page)?;
    let mut source = source_trait::from_config(config)?;
    collect_from(source.as_mut(), &extractor, &PaginationOptions::from(config)).await
}

/// Stage 2: persist the batch to the intermediate file
pub fn write(config: &Config, batch: &ListingBatch) -> Result<PathBuf> {
    output::write_batch(Path::new(&config.output_dir), batch)
}

/// Stage 3: insert the file's listings into the document store
pub fn load(config: &Config, path: &Path) -> Result<usize> {
    let batch = output::read_batch(path)?;
    let mut store = DocumentStore::open(&config.store.path)?;
    let inserted = store.insert_many(&config.store.collection, &batch)?;
    tracing::info!(
        "Inserted {} listings into '{}' ({} total)",
        inserted,
        config.store.collection,
        store.count(&config.store.collection)?
    );
    Ok(inserted)
}

/// Runs the three stages once. Any stage failing fails the whole job.
pub async fn run_job(config: &Config) -> Result<usize> {
    let batch = collect(config).await?;
    let inserted = persist(config, &batch)?;
    tracing::info!("Scraping finished successfully, {} new listings stored", inserted);
    Ok(inserted)
}

/// Write then load. The store is not touched unless the file was written.
pub fn persist(config: &Config, batch: &ListingBatch) -> Result<usize> {
    let path = write(config, batch).context("Failed to write intermediate file")?;
    load(config, &path).context("Failed to load listings into the store")
}

/// Runs `job` up to `retries + 1` times, waiting `delay` between attempts.
///
/// Every attempt starts from scratch; nothing is carried over between attempts.
pub async fn run_with_retries<T, F, Fut>(retries: u32, delay: Duration, mut job: F) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1;
    loop {
        match job(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if attempt <= retries => {
                tracing::warn!(
                    "Attempt {}/{} failed: {:#}. Retrying in {:?}",
                    attempt,
                    retries + 1,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Job failed after {} attempts", attempt));
            }
        }
    }
}

/// First `day`-of-month midnight (UTC) strictly after `now`.
pub fn next_monthly_run(now: DateTime<Utc>, day: u32) -> Result<DateTime<Utc>> {
    let this_month = NaiveDate::from_ymd_opt(now.year(), now.month(), day)
        .with_context(|| format!("Invalid schedule day {}", day))?
        .and_hms_opt(0, 0, 0)
        .context("Invalid schedule time")?
        .and_utc();

    if this_month > now {
        return Ok(this_month);
    }

    this_month
        .checked_add_months(Months::new(1))
        .context("Schedule date out of range")
}
