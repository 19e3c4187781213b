use crate::selectors::{ListingPageSelectors, MainPageSelectors};
use crate::setup::{run_setup, search_plan, Interaction, Interactor};
use crate::source_trait::ListingSource;
use anyhow::{Context, Result};
use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use regex::Regex;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(250);
const CONTAINER_TIMEOUT: Duration = Duration::from_secs(30);

/// Drives the search form in headless Chrome, then reads results pages from the tab.
pub struct BrowserSource {
    main: MainPageSelectors,
    offer_list: String,
    location: String,
    browser: Option<Browser>,
    tab: Option<Arc<Tab>>,
    base_url: Option<String>,
}

impl BrowserSource {
    pub fn new(main: MainPageSelectors, listing: &ListingPageSelectors, location: &str) -> Self {
        Self {
            main,
            offer_list: listing.offer_list.clone(),
            location: location.to_string(),
            browser: None,
            tab: None,
            base_url: None,
        }
    }

    fn tab(&self) -> Result<Arc<Tab>> {
        self.tab.clone().context("Browser not started, call prepare first")
    }
}

#[async_trait]
impl ListingSource for BrowserSource {
    fn name(&self) -> &str {
        "browser"
    }

    async fn prepare(&mut self) -> Result<()> {
        let main = self.main.clone();
        let location = self.location.clone();

        let (browser, tab, base_url) = tokio::task::spawn_blocking(move || -> Result<_> {
            tracing::info!("Launching headless Chrome...");
            let options = LaunchOptions::default_builder()
                .headless(true)
                .build()
                .context("Failed to build launch options")?;
            let browser = Browser::new(options).context("Failed to launch Chrome browser")?;
            let tab = browser.new_tab().context("Failed to open tab")?;

            let interactor = TabInteractor { tab: tab.clone() };
            run_setup(&interactor, &search_plan(&main, &location))?;

            let base_url = tab.get_url();
            Ok((browser, tab, base_url))
        })
        .await
        .context("Browser task panicked")??;

        tracing::info!("Search results at {}", base_url);
        self.browser = Some(browser);
        self.tab = Some(tab);
        self.base_url = Some(base_url);
        Ok(())
    }

    fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    async fn current_markup(&mut self) -> Result<String> {
        let tab = self.tab()?;
        let selector = self.offer_list.clone();
        tokio::task::spawn_blocking(move || read_container(&tab, &selector, CONTAINER_TIMEOUT))
            .await
            .context("Browser task panicked")?
    }

    async fn markup_at(&mut self, url: &str) -> Result<String> {
        let tab = self.tab()?;
        let selector = self.offer_list.clone();
        let url = url.to_string();
        tokio::task::spawn_blocking(move || {
            tab.navigate_to(&url)
                .with_context(|| format!("Failed to navigate to {}", url))?
                .wait_until_navigated()?;
            read_container(&tab, &selector, CONTAINER_TIMEOUT)
        })
        .await
        .context("Browser task panicked")?
    }

    async fn close(&mut self) -> Result<()> {
        self.tab.take();
        if self.browser.take().is_some() {
            tracing::info!("Browser closed");
        }
        Ok(())
    }
}

/// Performs setup interactions against a live tab.
struct TabInteractor {
    tab: Arc<Tab>,
}

impl Interactor for TabInteractor {
    fn perform(&self, interaction: &Interaction) -> Result<()> {
        tracing::trace!("Performing {:?}", interaction);
        match interaction {
            Interaction::Navigate { url } => {
                self.tab.navigate_to(url)?.wait_until_navigated()?;
            }
            Interaction::Click { selector, timeout } => {
                self.tab
                    .wait_for_element_with_custom_timeout(selector, *timeout)
                    .with_context(|| format!("Element '{}' not found", selector))?
                    .click()?;
            }
            Interaction::Fill { selector, text, timeout } => {
                let element = self.tab
                    .wait_for_element_with_custom_timeout(selector, *timeout)
                    .with_context(|| format!("Input '{}' not found", selector))?;
                element.call_js_fn("function() { this.value = ''; }", vec![], false)?;
                element.click()?;
                element.type_into(text)?;
            }
            Interaction::ClickWithin { item, text_pattern, target, timeout } => {
                let pattern = Regex::new(text_pattern)?;
                let index = poll(*timeout, || {
                    let texts = evaluate_string(&self.tab, &item_texts_script(item))?
                        .map(|json| serde_json::from_str::<Vec<String>>(&json))
                        .transpose()?
                        .unwrap_or_default();
                    Ok(texts.iter().position(|text| pattern.is_match(text)))
                })
                .with_context(|| format!("No '{}' matching '{}'", item, text_pattern))?;

                let clicked = evaluate_string(&self.tab, &click_within_script(item, index, target))?;
                if clicked.as_deref() != Some("clicked") {
                    anyhow::bail!("'{}' not found inside matching '{}'", target, item);
                }
            }
            Interaction::WaitForText { selector, pattern, timeout } => {
                let pattern = Regex::new(pattern)?;
                poll(*timeout, || {
                    let text = evaluate_string(&self.tab, &text_content_script(selector))?;
                    Ok(text.filter(|t| pattern.is_match(t)).map(|_| ()))
                })
                .with_context(|| format!("Text of '{}' never matched", selector))?;
            }
            Interaction::WaitForUrl { pattern, timeout } => {
                let pattern = Regex::new(pattern)?;
                poll(*timeout, || Ok(pattern.is_match(&self.tab.get_url()).then_some(())))
                    .with_context(|| format!("URL never matched '{}'", pattern))?;
            }
        }
        Ok(())
    }
}

/// Re-runs `check` until it yields a value or `timeout` elapses.
fn poll<T>(timeout: Duration, mut check: impl FnMut() -> Result<Option<T>>) -> Result<T> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(value) = check()? {
            return Ok(value);
        }
        if Instant::now() >= deadline {
            anyhow::bail!("Timed out after {:?}", timeout);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn evaluate_string(tab: &Tab, script: &str) -> Result<Option<String>> {
    let result = tab.evaluate(script, false)?;
    Ok(result.value.and_then(|value| value.as_str().map(str::to_string)))
}

fn read_container(tab: &Tab, selector: &str, timeout: Duration) -> Result<String> {
    let script = inner_html_script(selector);
    poll(timeout, || evaluate_string(tab, &script))
        .with_context(|| format!("Listing container '{}' did not appear", selector))
}

fn js_string(value: &str) -> String {
    serde_json::Value::from(value).to_string()
}

fn inner_html_script(selector: &str) -> String {
    format!(
        "(() => {{ const el = document.querySelector({}); return el ? el.innerHTML : null; }})()",
        js_string(selector)
    )
}

fn text_content_script(selector: &str) -> String {
    format!(
        "(() => {{ const el = document.querySelector({}); return el ? el.textContent : null; }})()",
        js_string(selector)
    )
}

fn item_texts_script(item: &str) -> String {
    format!(
        "JSON.stringify(Array.from(document.querySelectorAll({})).map(el => el.textContent))",
        js_string(item)
    )
}

fn click_within_script(item: &str, index: usize, target: &str) -> String {
    format!(
        "(() => {{ const item = document.querySelectorAll({})[{}]; const t = item && item.querySelector({}); if (!t) return null; t.click(); return 'clicked'; }})()",
        js_string(item),
        index,
        js_string(target)
    )
}
