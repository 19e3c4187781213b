use crate::selectors::{ListingPageSelectors, MainPageSelectors};
use serde::{Deserialize, Serialize};
use std::fs;
use std::env;
use std::str::FromStr;
use anyhow::{Result, Context};

pub const CONFIG_PATH: &str = "data/config.yaml";

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Browser,
    Http,
}

impl FromStr for SourceKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "browser" => Ok(SourceKind::Browser),
            "http" => Ok(SourceKind::Http),
            other => anyhow::bail!("Unknown source '{}', expected 'browser' or 'http'", other),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: String,
    #[serde(default = "default_collection")]
    pub collection: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            collection: default_collection(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_location")]
    pub location: String,
    #[serde(default = "default_listing_ceiling")]
    pub listing_ceiling: usize,
    #[serde(default = "default_empty_page_limit")]
    pub empty_page_limit: usize,
    #[serde(default)]
    pub request_delay_ms: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_tracing_level")]
    pub tracing_level: String,
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    #[serde(default = "default_source")]
    pub source: SourceKind,
    /// Only used by the http source, `{location}` is substituted
    #[serde(default)]
    pub search_url: Option<String>,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_retry_delay_seconds")]
    pub retry_delay_seconds: u64,
    #[serde(default = "default_schedule_day")]
    pub schedule_day: u32,
    #[serde(default)]
    pub main_page: MainPageSelectors,
    #[serde(default)]
    pub listing_page: ListingPageSelectors,
}

fn default_location() -> String {
    "Kraków".to_string()
}

fn default_listing_ceiling() -> usize {
    1000
}

fn default_empty_page_limit() -> usize {
    2
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string()
}

fn default_tracing_level() -> String {
    "info".to_string()
}

fn default_output_dir() -> String {
    "data/output_files".to_string()
}

fn default_source() -> SourceKind {
    SourceKind::Browser
}

fn default_store_path() -> String {
    "data/listings.db".to_string()
}

fn default_collection() -> String {
    "otodom_offers".to_string()
}

fn default_retries() -> u32 {
    5
}

fn default_retry_delay_seconds() -> u64 {
    300 // 5 minutes between attempts
}

fn default_schedule_day() -> u32 {
    10
}

fn env_parse<T>(name: &str, target: &mut T) -> Result<()>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    if let Ok(raw) = env::var(name) {
        *target = raw.trim().parse()
            .map_err(|e| anyhow::anyhow!("{}", e))
            .with_context(|| format!("Failed to parse {} environment variable", name))?;
    }
    Ok(())
}

impl Config {
    pub fn load() -> Result<Self> {
        // Load from config.yaml
        let config_str = fs::read_to_string(CONFIG_PATH)
            .with_context(|| format!("Failed to read {}", CONFIG_PATH))?;
        let mut config = Self::from_yaml(&config_str)?;

        // Override with environment variables if present
        config.apply_env_overrides()?;

        // Reject values the job cannot run with
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(config_str: &str) -> Result<Self> {
        serde_yaml::from_str(config_str).context("Failed to parse configuration")
    }

    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(location) = env::var("LOCATION") {
            self.location = location;
        }
        env_parse("LISTING_CEILING", &mut self.listing_ceiling)?;
        env_parse("EMPTY_PAGE_LIMIT", &mut self.empty_page_limit)?;
        env_parse("REQUEST_DELAY_MS", &mut self.request_delay_ms)?;
        if let Ok(user_agent) = env::var("USER_AGENT") {
            self.user_agent = user_agent;
        }
        if let Ok(tracing_level) = env::var("TRACING_LEVEL") {
            self.tracing_level = tracing_level;
        }
        if let Ok(output_dir) = env::var("OUTPUT_DIR") {
            self.output_dir = output_dir;
        }
        env_parse("SOURCE", &mut self.source)?;
        if let Ok(search_url) = env::var("SEARCH_URL") {
            self.search_url = Some(search_url);
        }
        if let Ok(path) = env::var("STORE_PATH") {
            self.store.path = path;
        }
        if let Ok(collection) = env::var("STORE_COLLECTION") {
            self.store.collection = collection;
        }
        // Job control
        env_parse("RETRIES", &mut self.retries)?;
        env_parse("RETRY_DELAY_SECONDS", &mut self.retry_delay_seconds)?;
        env_parse("SCHEDULE_DAY", &mut self.schedule_day)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.location.trim().is_empty() {
            anyhow::bail!("location is required (set via {} or LOCATION env var)", CONFIG_PATH);
        }

        if self.listing_ceiling == 0 {
            anyhow::bail!("listing_ceiling must be greater than zero");
        }

        if !(1..=28).contains(&self.schedule_day) {
            anyhow::bail!("schedule_day must be between 1 and 28, got {}", self.schedule_day);
        }

        if self.source == SourceKind::Http
            && self.search_url.as_deref().map_or(true, |url| url.trim().is_empty())
        {
            anyhow::bail!("search_url is required when source is 'http'");
        }

        if self.store.collection.trim().is_empty() {
            anyhow::bail!("store.collection must not be empty");
        }

        Ok(())
    }

    pub fn create_default() -> Result<()> {
        std::fs::create_dir_all("data")?;

        let default_config = Self::from_yaml("{}")?;
        let config_str = serde_yaml::to_string(&default_config)?;
        fs::write(CONFIG_PATH, config_str)?;
        Ok(())
    }
}
