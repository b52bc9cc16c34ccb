use serde::{Serialize, Serializer};

/// Room count: a positive integer, or the studio sentinel for units whose
/// breadcrumb carries the studio marker. Serializes as a number or the
/// literal string "studio".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rooms {
    Count(u32),
    Studio,
}

impl Serialize for Rooms {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Rooms::Count(n) => serializer.serialize_u32(*n),
            Rooms::Studio => serializer.serialize_str("studio"),
        }
    }
}

/// One scraped flat. Constructed once per listing page, immutable afterwards.
/// Optional fields are omitted from the JSON output entirely, never nulled.
#[derive(Debug, Clone, Serialize)]
pub struct FlatRecord {
    pub complex: String,
    #[serde(rename = "type")]
    pub unit_type: String,
    pub building: String,
    pub section: String,
    pub floor: i32,
    pub number: String,
    pub number_on_site: String,
    pub rooms: Rooms,
    pub area: f64,
    pub living_area: f64,
    pub phase: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<String>,
    pub price_finished: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sale_status: Option<String>,
    pub in_sale: bool,
    pub finished: u8,
}
