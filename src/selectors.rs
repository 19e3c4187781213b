use serde::{Deserialize, Serialize};

/// Selectors used while driving the search form on the landing page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MainPageSelectors {
    pub web_url: String,
    pub accept_cookies: String,
    pub location_button: String,
    /// Placeholder text of the location input, used when the button variant is absent
    pub location_placeholder: String,
    pub location_input: String,
    /// Suggestion rows shown by the location picker
    pub checkbox_item: String,
    /// Checkbox inside a suggestion row
    pub checkbox_role: String,
    /// Neutral element clicked to close the suggestion dropdown
    pub checkbox_dismiss: String,
    pub checkbox_fallback: String,
    pub submit_button: String,
    /// Regex the submit button text must match before it is clickable ("Pokaż 1234")
    pub submit_expected_pattern: String,
    pub final_url_pattern: String,
}

impl Default for MainPageSelectors {
    fn default() -> Self {
        Self {
            web_url: "https://www.otodom.pl".to_string(),
            accept_cookies: "#onetrust-accept-btn-handler".to_string(),
            location_button: "button#location".to_string(),
            location_placeholder: "Wpisz lokalizację".to_string(),
            location_input: "#location-picker-input".to_string(),
            checkbox_item: "li".to_string(),
            checkbox_role: "[data-testid='checkbox']".to_string(),
            checkbox_dismiss: "#priceMin".to_string(),
            checkbox_fallback: "[data-testid='suggestions-list'] li [data-testid='checkbox']".to_string(),
            submit_button: "#search-form-submit".to_string(),
            submit_expected_pattern: r"\w+ [0-9]+".to_string(),
            final_url_pattern: r"/wyniki/".to_string(),
        }
    }
}

impl MainPageSelectors {
    pub fn placeholder_selector(&self) -> String {
        format!("input[placeholder='{}']", self.location_placeholder)
    }
}

/// Selectors describing one results page and the shape of a listing inside it.
///
/// `item` nodes are enumerated inside the `offer_list` container. Each item must
/// hold a `listing` element whose direct children are a `location` paragraph and
/// two `group` elements: the first carries the title, the second the detail spans.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ListingPageSelectors {
    pub offer_list: String,
    pub item: String,
    pub listing: String,
    pub group: String,
    pub title: String,
    pub detail: String,
    pub location: String,
    pub price_index: usize,
    pub rooms_index: usize,
    pub surface_index: usize,
}

impl Default for ListingPageSelectors {
    fn default() -> Self {
        Self {
            offer_list: "[data-cy='search.listing.organic'] > ul".to_string(),
            item: "li".to_string(),
            listing: "article".to_string(),
            group: "div".to_string(),
            title: "span".to_string(),
            detail: "span".to_string(),
            location: "p".to_string(),
            price_index: 0,
            rooms_index: 2,
            surface_index: 3,
        }
    }
}

impl ListingPageSelectors {
    /// Number of detail spans a listing needs for every positional read to succeed.
    pub fn required_details(&self) -> usize {
        self.price_index.max(self.rooms_index).max(self.surface_index) + 1
    }
}
