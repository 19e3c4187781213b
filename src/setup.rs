use crate::selectors::MainPageSelectors;
use anyhow::{Context, Result};
use std::time::Duration;

const OPTIONAL_TIMEOUT: Duration = Duration::from_secs(3);
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const SUBMIT_TEXT_TIMEOUT: Duration = Duration::from_secs(5);

/// A single UI action against the current page.
#[derive(Debug, Clone, PartialEq)]
pub enum Interaction {
    Navigate { url: String },
    Click { selector: String, timeout: Duration },
    Fill { selector: String, text: String, timeout: Duration },
    /// Click `target` inside the first `item` whose text matches `text_pattern`
    ClickWithin {
        item: String,
        text_pattern: String,
        target: String,
        timeout: Duration,
    },
    WaitForText { selector: String, pattern: String, timeout: Duration },
    WaitForUrl { pattern: String, timeout: Duration },
}

/// Something able to perform interactions, typically a browser tab.
pub trait Interactor {
    fn perform(&self, interaction: &Interaction) -> Result<()>;
}

/// One way of completing a step; every interaction must succeed.
pub type Candidate = Vec<Interaction>;

#[derive(Debug, Clone)]
pub struct SetupStep {
    pub name: &'static str,
    pub candidates: Vec<Candidate>,
    /// Optional steps never fail the setup.
    pub required: bool,
}

impl SetupStep {
    fn required(name: &'static str, interactions: Candidate) -> Self {
        Self { name, candidates: vec![interactions], required: true }
    }

    fn optional(name: &'static str, candidates: Vec<Candidate>) -> Self {
        Self { name, candidates, required: false }
    }
}

/// Tries each candidate in order and returns the index of the first that succeeds.
///
/// When every candidate fails the error of the last one is returned.
pub fn first_success<T, F>(candidates: &[T], mut attempt: F) -> Result<usize>
where
    F: FnMut(&T) -> Result<()>,
{
    let mut last_error = None;
    for (index, candidate) in candidates.iter().enumerate() {
        match attempt(candidate) {
            Ok(()) => return Ok(index),
            Err(e) => {
                tracing::debug!("Candidate #{} failed: {:#}", index + 1, e);
                last_error = Some(e);
            }
        }
    }
    Err(last_error.unwrap_or_else(|| anyhow::anyhow!("No candidates to try")))
}

fn run_candidate(interactor: &dyn Interactor, candidate: &Candidate) -> Result<()> {
    for interaction in candidate {
        interactor.perform(interaction)?;
    }
    Ok(())
}

/// Runs the steps in order. A required step that fails aborts the setup.
pub fn run_setup(interactor: &dyn Interactor, steps: &[SetupStep]) -> Result<()> {
    for step in steps {
        tracing::debug!("Setup step: {}", step.name);
        match first_success(&step.candidates, |candidate| run_candidate(interactor, candidate)) {
            Ok(index) => tracing::trace!("Step '{}' completed with variant #{}", step.name, index + 1),
            Err(e) if step.required => {
                return Err(e).with_context(|| format!("Setup step '{}' failed", step.name));
            }
            Err(e) => tracing::debug!("Optional step '{}' skipped: {:#}", step.name, e),
        }
    }
    Ok(())
}

/// The click sequence leading from the landing page to the results for `location`.
pub fn search_plan(selectors: &MainPageSelectors, location: &str) -> Vec<SetupStep> {
    vec![
        SetupStep::required("open site", vec![Interaction::Navigate { url: selectors.web_url.clone() }]),
        SetupStep::required(
            "accept cookies",
            vec![Interaction::Click { selector: selectors.accept_cookies.clone(), timeout: DEFAULT_TIMEOUT }],
        ),
        SetupStep::optional(
            "open location picker",
            vec![
                vec![Interaction::Click { selector: selectors.location_button.clone(), timeout: OPTIONAL_TIMEOUT }],
                vec![Interaction::Click { selector: selectors.placeholder_selector(), timeout: OPTIONAL_TIMEOUT }],
            ],
        ),
        SetupStep::required(
            "type location",
            vec![Interaction::Fill {
                selector: selectors.location_input.clone(),
                text: location.to_string(),
                timeout: DEFAULT_TIMEOUT,
            }],
        ),
        SetupStep::optional(
            "select location",
            vec![
                vec![
                    Interaction::ClickWithin {
                        item: selectors.checkbox_item.clone(),
                        text_pattern: format!("{},.*", regex::escape(location)),
                        target: selectors.checkbox_role.clone(),
                        timeout: OPTIONAL_TIMEOUT,
                    },
                    Interaction::Click { selector: selectors.checkbox_dismiss.clone(), timeout: OPTIONAL_TIMEOUT },
                ],
                vec![Interaction::Click { selector: selectors.checkbox_fallback.clone(), timeout: DEFAULT_TIMEOUT }],
            ],
        ),
        SetupStep::required(
            "submit search",
            vec![
                Interaction::WaitForText {
                    selector: selectors.submit_button.clone(),
                    pattern: selectors.submit_expected_pattern.clone(),
                    timeout: SUBMIT_TEXT_TIMEOUT,
                },
                Interaction::Click { selector: selectors.submit_button.clone(), timeout: DEFAULT_TIMEOUT },
                Interaction::WaitForUrl { pattern: selectors.final_url_pattern.clone(), timeout: DEFAULT_TIMEOUT },
            ],
        ),
    ]
}
