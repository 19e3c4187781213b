use crate::models::{ListingBatch, ListingRecord};
use crate::selectors::ListingPageSelectors;
use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html, Selector};

/// Turns the inner markup of a results container into listing records.
pub struct ListingExtractor {
    item: Selector,
    listing: Selector,
    group: Selector,
    title: Selector,
    detail: Selector,
    location: Selector,
    price_index: usize,
    rooms_index: usize,
    surface_index: usize,
    required_details: usize,
}

fn parse_selector(raw: &str) -> Result<Selector> {
    Selector::parse(raw).map_err(|e| anyhow!("Invalid selector '{}': {:?}", raw, e))
}

impl ListingExtractor {
    pub fn new(selectors: &ListingPageSelectors) -> Result<Self> {
        Ok(Self {
            item: parse_selector(&selectors.item)?,
            listing: parse_selector(&selectors.listing)?,
            group: parse_selector(&selectors.group)?,
            title: parse_selector(&selectors.title)?,
            detail: parse_selector(&selectors.detail)?,
            location: parse_selector(&selectors.location)?,
            price_index: selectors.price_index,
            rooms_index: selectors.rooms_index,
            surface_index: selectors.surface_index,
            required_details: selectors.required_details(),
        })
    }

    pub fn extract(&self, markup: &str) -> ListingBatch {
        self.extract_at(markup, Utc::now())
    }

    /// Items that do not have the expected shape are skipped; order is preserved.
    pub fn extract_at(&self, markup: &str, now: DateTime<Utc>) -> ListingBatch {
        let fragment = Html::parse_fragment(markup);
        let mut records = Vec::new();

        // Only top-level items count; lists nested inside an item are part of that item.
        for (index, item) in direct_children(&fragment.root_element(), &self.item).enumerate() {
            match self.extract_item(&item, now) {
                Some(record) => records.push(record),
                None => tracing::trace!("Item #{} has no recognizable listing, skipping", index + 1),
            }
        }

        records
    }

    fn extract_item(&self, item: &ElementRef, now: DateTime<Utc>) -> Option<ListingRecord> {
        let listing = item.select(&self.listing).next()?;

        let location = direct_children(&listing, &self.location).next()?;
        let mut groups = direct_children(&listing, &self.group);
        let title_group = groups.next()?;
        let details_group = groups.next()?;

        let title = title_group.select(&self.title).next()?;
        // Positions are fixed; a reordered layout yields mislabeled fields, not an error.
        let details: Vec<ElementRef> = direct_children(&details_group, &self.detail).collect();
        if details.len() < self.required_details {
            return None;
        }

        Some(ListingRecord::new(
            text_of(&title),
            text_of(&location),
            text_of(&details[self.price_index]),
            text_of(&details[self.surface_index]),
            text_of(&details[self.rooms_index]),
            now,
        ))
    }
}

fn direct_children<'a>(
    parent: &ElementRef<'a>,
    selector: &'a Selector,
) -> impl Iterator<Item = ElementRef<'a>> + 'a {
    parent
        .children()
        .filter_map(ElementRef::wrap)
        .filter(move |child| selector.matches(child))
}

fn text_of(element: &ElementRef) -> String {
    element.text().collect::<String>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn extractor() -> ListingExtractor {
        ListingExtractor::new(&ListingPageSelectors::default()).unwrap()
    }

    fn listing_item(title: &str, location: &str, details: [&str; 4]) -> String {
        format!(
            r#"<li><article>
                <p>{location}</p>
                <div><a><span>{title}</span></a></div>
                <div><span>{}</span><span>{}</span><span>{}</span><span>{}</span></div>
            </article></li>"#,
            details[0], details[1], details[2], details[3]
        )
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 11, 10, 2, 0, 0).unwrap()
    }

    #[test]
    fn test_extracts_all_fields() {
        let markup = listing_item(
            "Słoneczne 2 pokoje przy Rondzie",
            "Kraków, Krowodrza, Azory",
            ["649 000 zł", "14 422 zł/m²", "2 pokoje", "45 m²"],
        );

        let records = extractor().extract_at(&markup, fixed_now());
        assert_eq!(records.len(), 1);

        let record = &records[0];
        assert_eq!(record.title, "Słoneczne 2 pokoje przy Rondzie");
        assert_eq!(record.location, "Kraków, Krowodrza, Azory");
        assert_eq!(record.price, "649 000 zł");
        assert_eq!(record.rooms, "2 pokoje");
        assert_eq!(record.surface, "45 m²");
        assert_eq!(record.ingested_at, fixed_now());
    }

    #[test]
    fn test_skips_item_without_article() {
        let markup = format!(
            "{}{}{}",
            listing_item("first", "Kraków", ["1", "x", "2", "3"]),
            r#"<li><div class="ad-banner"><p>Reklama</p><div><span>promo</span></div></div></li>"#,
            listing_item("third", "Kraków", ["4", "x", "5", "6"]),
        );

        let records = extractor().extract_at(&markup, fixed_now());
        assert_eq!(records.len(), 2, "banner item should be dropped silently");
        assert_eq!(records[0].title, "first");
        assert_eq!(records[1].title, "third");
    }

    #[test]
    fn test_positional_mapping_reads_fixed_slots() {
        // Regression fixture: spans are read by position, not by content.
        let markup = listing_item("t", "l", ["1 200 zł", "2 pokoje", "45 m²", "extra"]);

        let records = extractor().extract_at(&markup, fixed_now());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].price, "1 200 zł");
        assert_eq!(records[0].rooms, "45 m²");
        assert_eq!(records[0].surface, "extra");
    }

    #[test]
    fn test_skips_item_with_too_few_details() {
        let markup = r#"<li><article>
            <p>Kraków</p>
            <div><span>Kawalerka</span></div>
            <div><span>399 000 zł</span><span>12 000 zł/m²</span><span>1 pokój</span></div>
        </article></li>"#;

        assert!(extractor().extract_at(markup, fixed_now()).is_empty());
    }

    #[test]
    fn test_skips_item_without_location_paragraph() {
        let markup = r#"<li><article>
            <div><span>Kawalerka</span></div>
            <div><span>a</span><span>b</span><span>c</span><span>d</span></div>
        </article></li>"#;

        assert!(extractor().extract_at(markup, fixed_now()).is_empty());
    }

    #[test]
    fn test_nested_spans_are_not_details() {
        // Only direct span children of the second group count as detail fields.
        let markup = r#"<li><article>
            <p>Kraków</p>
            <div><span>Dom</span></div>
            <div><span>1 zł</span><dl><span>nested</span></dl><span>x</span><span>3 pokoje</span><span>80 m²</span></div>
        </article></li>"#;

        let records = extractor().extract_at(markup, fixed_now());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].rooms, "3 pokoje");
        assert_eq!(records[0].surface, "80 m²");
    }

    #[test]
    fn test_text_is_passed_through_unchanged() {
        let markup = listing_item("  Loft <b>z</b> tarasem ", "Kraków,\u{a0}Podgórze", ["a", "b", "c", "d"]);

        let records = extractor().extract_at(&markup, fixed_now());
        assert_eq!(records[0].title, "  Loft z tarasem ");
        assert_eq!(records[0].location, "Kraków,\u{a0}Podgórze");
    }

    #[test]
    fn test_order_matches_document_order() {
        let markup: String = (1..=5)
            .map(|i| listing_item(&format!("offer {}", i), "Kraków", ["p", "x", "r", "s"]))
            .collect();

        let titles: Vec<String> = extractor()
            .extract_at(&markup, fixed_now())
            .into_iter()
            .map(|r| r.title)
            .collect();
        assert_eq!(titles, vec!["offer 1", "offer 2", "offer 3", "offer 4", "offer 5"]);
    }

    #[test]
    fn test_nested_list_items_are_not_enumerated() {
        let inner = listing_item("Dom z ogrodem", "Kraków, Bronowice", ["a", "b", "c", "d"]);
        let markup = format!("<li><ul>{}</ul></li>", inner);

        let records = extractor().extract_at(&markup, fixed_now());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title, "Dom z ogrodem");
    }

    #[test]
    fn test_custom_positions_need_enough_details() {
        let selectors = ListingPageSelectors {
            price_index: 1,
            surface_index: 4,
            ..Default::default()
        };
        let extractor = ListingExtractor::new(&selectors).unwrap();

        let four = listing_item("t", "l", ["a", "b", "c", "d"]);
        assert!(extractor.extract_at(&four, fixed_now()).is_empty());

        let five = r#"<li><article><p>l</p><div><span>t</span></div>
            <div><span>a</span><span>b</span><span>c</span><span>d</span><span>e</span></div></article></li>"#;
        let records = extractor.extract_at(five, fixed_now());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].price, "b");
        assert_eq!(records[0].rooms, "c");
        assert_eq!(records[0].surface, "e");
    }

    #[test]
    fn test_empty_markup_yields_nothing() {
        assert!(extractor().extract("").is_empty());
        assert!(extractor().extract("<p>Brak wyników</p>").is_empty());
    }

    #[test]
    fn test_invalid_selector_is_reported() {
        let selectors = ListingPageSelectors {
            item: "li[".to_string(),
            ..Default::default()
        };
        assert!(ListingExtractor::new(&selectors).is_err());
    }
}
