use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ── Profile ───────────────────────────────────────────────────────────────────

/// Account holder data scraped from the profile-update form.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    pub first_name: String,
    pub surname: String,
    pub email: String,
    pub city: String,
    pub scraped_at: NaiveDateTime,
}

// ── Product ───────────────────────────────────────────────────────────────────

/// One wishlist product with its availability entries and discussion posts.
///
/// Prices and the feedback count stay as text: the site renders them
/// localised and the store schema is text columns throughout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    pub title: String,
    pub wholesale_price: String,
    pub retail_price: String,
    pub feedback_count: String,
    pub stores: Vec<String>,
    pub posts: Vec<String>,
    pub scraped_at: NaiveDateTime,
}

// ── Raw page shapes (parser output, cleaned later) ────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct RawProfile {
    pub email: String,
    pub first_name: String,
    pub surname: String,
    pub city: String,
}

/// Everything lifted off a product page before cleaning.
#[derive(Debug, Clone, Default)]
pub struct RawProductPage {
    pub title: Option<String>,
    pub wholesale_price: Option<String>,
    pub retail_price: Option<String>,
    /// Text of the review link; `None` when the anchor is absent.
    pub feedback_text: Option<String>,
    pub feature_blocks: Vec<RawFeatureBlock>,
    pub posts: Vec<String>,
}

/// One availability feature block: the stock cell plus the full block text.
#[derive(Debug, Clone, Default)]
pub struct RawFeatureBlock {
    pub stock_text: String,
    pub full_text: String,
}
