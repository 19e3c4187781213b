mod config;
mod database;
mod extractor;
mod http_client;
mod models;
mod output;
mod pagination;
mod pipeline;
mod selectors;
mod setup;
mod source_trait;
mod sources;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use config::{Config, CONFIG_PATH};
use extractor::ListingExtractor;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "otoscrape")]
#[command(about = "Collects real-estate listings and loads them into a document store", long_about = None)]
struct Args {
    /// Keep running and collect once a month on the configured day
    #[arg(long)]
    schedule: bool,

    /// Run the extractor over a saved listing-container markup file and print the records
    #[arg(long)]
    extract_file: Option<PathBuf>,

    /// Load an existing intermediate JSON file into the store
    #[arg(long)]
    load_file: Option<PathBuf>,

    /// Test URL fetching - fetch and print HTML from a URL
    #[arg(long)]
    test_url: Option<String>,

    /// Save HTML to file when using --test-url
    #[arg(long)]
    save_html: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Create a default config on first start
    if !Path::new(CONFIG_PATH).exists() {
        eprintln!("No config file found, creating default {}", CONFIG_PATH);
        Config::create_default()?;
        eprintln!("Please review {} (location, store path, source) and run again", CONFIG_PATH);
        return Ok(());
    }

    // Load configuration and initialize logging
    let config = Config::load()?;
    init_logging(&config);

    // One-off debugging modes
    if let Some(url) = args.test_url {
        return test_url_fetch(&config, &url, args.save_html.as_deref()).await;
    }

    if let Some(path) = args.extract_file {
        return extract_file(&config, &path);
    }

    if let Some(path) = args.load_file {
        let inserted = pipeline::load(&config, &path)?;
        println!("Inserted {} listings from {}", inserted, path.display());
        return Ok(());
    }

    // Monthly loop, or a single run with retries
    if args.schedule {
        return run_schedule(&config).await;
    }

    run_once(&config).await.map(|_| ())
}

/// Uses RUST_LOG when set, otherwise the level from the config file
fn init_logging(config: &Config) {
    if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .init();
        tracing::info!("Logging level set from RUST_LOG environment variable");
        return;
    }

    let level = config.tracing_level.to_lowercase();
    let max_level = match level.as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => {
            eprintln!("Invalid tracing level '{}', using 'info'", level);
            tracing::Level::INFO
        }
    };

    tracing_subscriber::fmt()
        .with_max_level(max_level)
        .init();

    tracing::info!("Logging level set to: {} (from {})", level, CONFIG_PATH);
}

async fn run_once(config: &Config) -> Result<usize> {
    pipeline::run_with_retries(
        config.retries,
        Duration::from_secs(config.retry_delay_seconds),
        |attempt| {
            tracing::info!("Starting run, attempt {}", attempt);
            pipeline::run_job(config)
        },
    )
    .await
}

async fn run_schedule(config: &Config) -> Result<()> {
    tracing::info!("Scheduler started, runs on day {} of every month (UTC)", config.schedule_day);

    loop {
        let now = Utc::now();
        let next = pipeline::next_monthly_run(now, config.schedule_day)?;
        tracing::info!("Next run at {}", next);

        // Sleep until the next run
        let wait = (next - now).to_std().context("Next run is in the past")?;
        tokio::time::sleep(wait).await;

        if let Err(e) = run_once(config).await {
            tracing::error!("Scheduled run failed: {:#}", e);
        }
    }
}

fn extract_file(config: &Config, path: &Path) -> Result<()> {
    let markup = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let extractor = ListingExtractor::new(&config.listing_page)?;
    let records = extractor.extract(&markup);

    println!("Found {} listings in {}", records.len(), path.display());
    println!("{}", "=".repeat(80));

    for (i, record) in records.iter().enumerate() {
        println!("\nListing #{}", i + 1);
        println!("Title: {}", record.title);
        println!("Location: {}", record.location);
        println!("Price: {}", record.price);
        println!("Rooms: {}", record.rooms);
        println!("Surface: {}", record.surface);
        println!("{}", "-".repeat(80));
    }

    if records.is_empty() {
        println!("No listings found. This might mean:");
        println!("  - The file is a full page instead of the listing container");
        println!("  - The listing_page selectors need updating");
    }

    Ok(())
}

/// Test URL fetching - downloads and prints HTML response
async fn test_url_fetch(config: &Config, url: &str, save_path: Option<&str>) -> Result<()> {
    println!("Testing URL fetch: {}", url);
    println!("{}", "=".repeat(80));
    println!("User-Agent: {}", config.user_agent);

    let client = http_client::listing_client(&config.user_agent, http_client::DEFAULT_TIMEOUT)?;

    println!("Sending request...");
    let response = client.get(url).send().await?;

    println!("Status: {}", response.status());
    println!("\nResponse Headers:");
    for (name, value) in response.headers() {
        println!("  {}: {:?}", name, value);
    }

    println!("{}", "=".repeat(80));

    let body = response.text().await?;

    if let Some(path) = save_path {
        std::fs::write(path, &body)?;
        println!("HTML saved to: {}", path);
        println!("{}", "=".repeat(80));
    } else {
        println!("Response body:");
        println!("{}", "=".repeat(80));
        println!("{}", body);
        println!("{}", "=".repeat(80));
    }

    println!("Total length: {} bytes", body.len());

    let lower_body = body.to_lowercase();
    if lower_body.contains("captcha") || lower_body.contains("cloudflare") {
        println!("\n⚠️  WARNING: Response may contain CAPTCHA or anti-bot protection!");
        println!("Consider switching to the browser source or increasing request_delay_ms");
    }

    Ok(())
}
