use crate::models::{Product, Profile, RawFeatureBlock, RawProductPage, RawProfile};
use anyhow::{Context, Result};
use chrono::NaiveDateTime;

/// Placeholder stored when a product page has no review link.
pub const NO_REVIEWS: &str = "Отзывов нет";

/// Stock state literal the shop renders for warehouses without stock.
const OUT_OF_STOCK: &str = "отсутствует";

/// Warehouse lines start at the city prefix, "г. <city> (...):".
const CITY_MARKER: char = 'г';

// ── Field cleaners ────────────────────────────────────────────────────────────

/// Price nodes embed NBSP thousands separators.
/// "1\u{a0}500 ₽" → "1500 ₽"
pub fn clean_price(s: &str) -> String {
    s.replace('\u{a0}', "").trim().to_string()
}

/// Review counts keep only the leading character of the link text
/// ("3 отзыва" → "3"). Single-digit truncation matches the upstream
/// scraper and is pinned by test; absent or empty text gets the sentinel.
pub fn feedback_count(review_text: Option<&str>) -> String {
    match review_text.and_then(|t| t.chars().next()) {
        Some(c) => c.to_string(),
        None => NO_REVIEWS.to_string(),
    }
}

/// Normalise a stock cell for comparison: drop spaces and em-dashes.
/// " — отсутствует " → "отсутствует"
pub fn normalise_stock(s: &str) -> String {
    s.chars()
        .filter(|c| *c != ' ' && *c != '—')
        .collect::<String>()
        .trim()
        .to_string()
}

/// Cut the city segment out of a warehouse line: everything from the
/// first city marker up to the colon. "г. Москва (склад): в наличии"
/// → "г. Москва (склад)".
pub fn city_segment(block_text: &str) -> Option<String> {
    let start = block_text.find(CITY_MARKER)?;
    let end = block_text.find(':')?;
    if start >= end {
        return None;
    }
    Some(block_text[start..end].to_string())
}

/// Availability entries from the feature blocks. The first block is the
/// wholesale-terms row, not a warehouse, and is skipped; out-of-stock
/// warehouses are dropped.
pub fn store_entries(blocks: &[RawFeatureBlock]) -> Vec<String> {
    blocks
        .iter()
        .skip(1)
        .filter(|b| normalise_stock(&b.stock_text) != OUT_OF_STOCK)
        .filter_map(|b| city_segment(&b.full_text))
        .collect()
}

// ── Raw page → model ──────────────────────────────────────────────────────────

pub fn raw_to_profile(raw: &RawProfile, now: NaiveDateTime) -> Profile {
    Profile {
        first_name: raw.first_name.clone(),
        surname: raw.surname.clone(),
        email: raw.email.clone(),
        city: raw.city.clone(),
        scraped_at: now,
    }
}

/// Build a `Product` from a parsed page. Title and both prices are
/// required; only the feedback count falls back to a sentinel.
pub fn raw_to_product(raw: &RawProductPage, now: NaiveDateTime) -> Result<Product> {
    let title = raw
        .title
        .as_deref()
        .context("product title not found")?
        .trim()
        .to_string();
    let wholesale_price = clean_price(
        raw.wholesale_price
            .as_deref()
            .context("wholesale price not found")?,
    );
    let retail_price = clean_price(
        raw.retail_price
            .as_deref()
            .context("retail price not found")?,
    );

    Ok(Product {
        title,
        wholesale_price,
        retail_price,
        feedback_count: feedback_count(raw.feedback_text.as_deref()),
        stores: store_entries(&raw.feature_blocks),
        posts: raw.posts.clone(),
        scraped_at: now,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn block(stock: &str, full: &str) -> RawFeatureBlock {
        RawFeatureBlock {
            stock_text: stock.to_string(),
            full_text: full.to_string(),
        }
    }

    #[test]
    fn clean_price_strips_nbsp() {
        assert_eq!(clean_price("1\u{a0}500 ₽"), "1500 ₽");
        assert_eq!(clean_price("  610 ₽ "), "610 ₽");
    }

    #[test]
    fn feedback_count_keeps_first_char_only() {
        assert_eq!(feedback_count(Some("3 отзыва")), "3");
        assert_eq!(feedback_count(Some("12 отзывов")), "1");
    }

    #[test]
    fn feedback_count_sentinel_when_absent() {
        assert_eq!(feedback_count(None), NO_REVIEWS);
        assert_eq!(feedback_count(Some("")), NO_REVIEWS);
    }

    #[test]
    fn normalise_stock_drops_spaces_and_dashes() {
        assert_eq!(normalise_stock(" — отсутствует "), "отсутствует");
        assert_eq!(normalise_stock("в наличии"), "вналичии");
    }

    #[test]
    fn city_segment_cuts_marker_to_colon() {
        assert_eq!(
            city_segment("г. Москва (склад №2): в наличии").as_deref(),
            Some("г. Москва (склад №2)")
        );
        assert_eq!(city_segment("нет маркеров"), None);
        assert_eq!(city_segment("без двоеточия г. Тверь"), None);
    }

    #[test]
    fn store_entries_skip_first_block_and_out_of_stock() {
        let blocks = vec![
            block("от 2 шт", "Опт: от 2 шт"),
            block(" в наличии ", "г. Москва: в наличии"),
            block(" — отсутствует ", "г. Казань: — отсутствует"),
            block("в наличии", "г. Тверь (склад): в наличии"),
        ];
        assert_eq!(store_entries(&blocks), vec!["г. Москва", "г. Тверь (склад)"]);
    }

    #[test]
    fn raw_to_product_requires_title_and_prices() {
        let now = Utc::now().naive_utc();
        let raw = RawProductPage {
            title: Some(" Товар ".into()),
            wholesale_price: Some("1\u{a0}500 ₽".into()),
            retail_price: None,
            ..Default::default()
        };
        let err = raw_to_product(&raw, now).unwrap_err();
        assert!(err.to_string().contains("retail price"));
    }

    #[test]
    fn raw_to_product_builds_cleaned_model() {
        let now = Utc::now().naive_utc();
        let raw = RawProductPage {
            title: Some(" Облучатель ОУФК-01 ".into()),
            wholesale_price: Some("1\u{a0}500 ₽".into()),
            retail_price: Some("1\u{a0}700 ₽".into()),
            feedback_text: None,
            feature_blocks: vec![
                block("от 2 шт", "Опт: от 2 шт"),
                block("в наличии", "г. Москва: в наличии"),
            ],
            posts: vec!["Отличный прибор".into()],
        };

        let product = raw_to_product(&raw, now).unwrap();
        assert_eq!(product.title, "Облучатель ОУФК-01");
        assert_eq!(product.wholesale_price, "1500 ₽");
        assert_eq!(product.retail_price, "1700 ₽");
        assert_eq!(product.feedback_count, NO_REVIEWS);
        assert_eq!(product.stores, vec!["г. Москва"]);
        assert_eq!(product.posts, vec!["Отличный прибор"]);
    }
}
