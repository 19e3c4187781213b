use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

/// One scraped offer, as displayed on the results page.
///
/// All text fields are kept exactly as rendered; no currency or unit
/// normalization happens here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListingRecord {
    #[serde(rename = "offert_title")]
    pub title: String,
    pub location: String,
    pub price: String,
    pub surface: String,
    pub rooms: String,
    #[serde(with = "ingested_at_format")]
    pub ingested_at: DateTime<Utc>,
}

/// Listings gathered during one run, in page order.
pub type ListingBatch = Vec<ListingRecord>;

impl ListingRecord {
    pub fn new(
        title: String,
        location: String,
        price: String,
        surface: String,
        rooms: String,
        ingested_at: DateTime<Utc>,
    ) -> Self {
        Self {
            title,
            location,
            price,
            surface,
            rooms,
            ingested_at: ingested_at.trunc_subsecs(0),
        }
    }
}

/// `ingested_at` is written with second precision and no offset,
/// e.g. `2023-11-10T00:00:12`. Values are UTC.
mod ingested_at_format {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&raw, FORMAT)
            .map(|naive| naive.and_utc())
            .map_err(serde::de::Error::custom)
    }
}
