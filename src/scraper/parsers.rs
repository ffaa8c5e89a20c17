use crate::models::{RawFeatureBlock, RawProductPage, RawProfile};
use anyhow::{Context, Result};
use scraper::{Html, Selector};

fn sel(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| anyhow::anyhow!("selector {}: {:?}", s, e))
}

// ── Profile page ──────────────────────────────────────────────────────────────

/// The profile-update form carries the account fields as input values.
/// Field ids are fixed by the shop's form builder.
pub fn parse_profile_page(html: &str) -> Result<RawProfile> {
    let doc = Html::parse_document(html);

    Ok(RawProfile {
        email: input_value(&doc, "input#email")?,
        first_name: input_value(&doc, "input#elm_15")?,
        surname: input_value(&doc, "input#elm_17")?,
        city: input_value(&doc, "input#elm_23")?,
    })
}

fn input_value(doc: &Html, selector: &str) -> Result<String> {
    let s = sel(selector)?;
    let el = doc
        .select(&s)
        .next()
        .with_context(|| format!("{} not found on profile page", selector))?;
    Ok(el.value().attr("value").unwrap_or_default().to_string())
}

// ── Wishlist page ─────────────────────────────────────────────────────────────

/// Collect product page hrefs from the wishlist. Zero anchors is a valid
/// (empty) wishlist, not an error.
pub fn parse_wishlist_links(html: &str) -> Result<Vec<String>> {
    let doc = Html::parse_document(html);
    let link_sel = sel("a.product-title")?;

    let links = doc
        .select(&link_sel)
        .filter_map(|a| a.value().attr("href"))
        .map(|h| h.to_string())
        .collect();

    Ok(links)
}

// ── Product page ──────────────────────────────────────────────────────────────

/// Lift the raw fields off a product page. Everything stays optional or
/// empty here; the cleaner decides what is fatal and what gets a sentinel.
pub fn parse_product_page(html: &str) -> Result<RawProductPage> {
    let doc = Html::parse_document(html);

    let title_sel = sel("h1.ty-product-block-title")?;
    let wholesale_sel = sel(".ty-product-block__price-actual span span bdi span")?;
    let retail_sel = sel(".ty-product-block__price-second span bdi span")?;
    let review_sel = sel("a.ty-discussion__review-a.cm-external-click")?;

    let title = doc
        .select(&title_sel)
        .next()
        .map(|el| el.text().collect::<String>());
    let wholesale_price = doc
        .select(&wholesale_sel)
        .next()
        .map(|el| el.text().collect::<String>());
    let retail_price = doc
        .select(&retail_sel)
        .next()
        .map(|el| el.text().collect::<String>());
    let feedback_text = doc
        .select(&review_sel)
        .next()
        .map(|el| el.text().collect::<String>());

    Ok(RawProductPage {
        title,
        wholesale_price,
        retail_price,
        feedback_text,
        feature_blocks: parse_feature_blocks(&doc)?,
        posts: parse_discussion_posts(&doc)?,
    })
}

/// Availability rows. Each block's first inner div holds the stock state;
/// the full block text carries the warehouse line the city is cut from.
fn parse_feature_blocks(doc: &Html) -> Result<Vec<RawFeatureBlock>> {
    let block_sel = sel("div.ty-product-feature")?;
    let div_sel = sel("div")?;

    let mut blocks = Vec::new();
    for block in doc.select(&block_sel) {
        let stock_text = block
            .select(&div_sel)
            .next()
            .map(|d| d.text().collect::<String>())
            .unwrap_or_default();
        let full_text = block.text().collect::<String>();
        blocks.push(RawFeatureBlock {
            stock_text,
            full_text,
        });
    }
    Ok(blocks)
}

/// Discussion posts, message bodies verbatim.
fn parse_discussion_posts(doc: &Html) -> Result<Vec<String>> {
    let content_sel = sel("div.ty-discussion-post__content.ty-mb-l")?;
    let message_sel = sel("div.ty-discussion-post__message")?;

    let mut posts = Vec::new();
    for block in doc.select(&content_sel) {
        if let Some(message) = block.select(&message_sel).next() {
            posts.push(message.text().collect::<String>());
        }
    }
    Ok(posts)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const PROFILE_PAGE: &str = r#"
        <html><body><form>
            <input type="text" id="email" value="ivan@example.com">
            <input type="text" id="elm_15" value="Иван">
            <input type="text" id="elm_17" value="Петров">
            <input type="text" id="elm_23" value="Москва">
        </form></body></html>"#;

    #[test]
    fn profile_fields_come_from_input_values() {
        let raw = parse_profile_page(PROFILE_PAGE).unwrap();
        assert_eq!(raw.email, "ivan@example.com");
        assert_eq!(raw.first_name, "Иван");
        assert_eq!(raw.surname, "Петров");
        assert_eq!(raw.city, "Москва");
    }

    #[test]
    fn profile_page_without_form_is_an_error() {
        let err = parse_profile_page("<html><body></body></html>").unwrap_err();
        assert!(err.to_string().contains("input#email"));
    }

    #[test]
    fn wishlist_links_collects_hrefs() {
        let html = r#"
            <div class="ty-wishlist">
                <a class="product-title" href="https://siriust.ru/p/1/">One</a>
                <a class="product-title" href="/p/2/">Two</a>
                <a class="other" href="/ignored/">Nope</a>
            </div>"#;
        let links = parse_wishlist_links(html).unwrap();
        assert_eq!(links, vec!["https://siriust.ru/p/1/", "/p/2/"]);
    }

    #[test]
    fn empty_wishlist_yields_no_links() {
        let links = parse_wishlist_links("<html><body><p>Пусто</p></body></html>").unwrap();
        assert!(links.is_empty());
    }

    #[test]
    fn product_page_extracts_all_fields() {
        let html = r#"
            <h1 class="ty-product-block-title"> Облучатель ОУФК-01 </h1>
            <div class="ty-product-block__price-actual">
                <span><span><bdi><span>1&nbsp;500 ₽</span></bdi></span></span>
            </div>
            <div class="ty-product-block__price-second">
                <span><bdi><span>1&nbsp;700 ₽</span></bdi></span>
            </div>
            <a class="ty-discussion__review-a cm-external-click">3 отзыва</a>
            <div class="ty-product-feature"><span>Опт</span><div>от 2 шт</div></div>
            <div class="ty-product-feature">г. Москва (склад): <div> в наличии </div></div>
            <div class="ty-discussion-post__content ty-mb-l">
                <div class="ty-discussion-post__message">Отличный прибор</div>
            </div>"#;

        let raw = parse_product_page(html).unwrap();
        assert_eq!(raw.title.as_deref(), Some(" Облучатель ОУФК-01 "));
        assert_eq!(raw.wholesale_price.as_deref(), Some("1\u{a0}500 ₽"));
        assert_eq!(raw.retail_price.as_deref(), Some("1\u{a0}700 ₽"));
        assert_eq!(raw.feedback_text.as_deref(), Some("3 отзыва"));
        assert_eq!(raw.feature_blocks.len(), 2);
        assert_eq!(raw.posts, vec!["Отличный прибор"]);
    }

    #[test]
    fn absent_review_anchor_leaves_feedback_unset() {
        let html = r#"<h1 class="ty-product-block-title">Товар</h1>"#;
        let raw = parse_product_page(html).unwrap();
        assert!(raw.feedback_text.is_none());
        assert!(raw.feature_blocks.is_empty());
        assert!(raw.posts.is_empty());
    }

    #[test]
    fn feature_block_stock_text_is_first_inner_div() {
        let html = r#"
            <div class="ty-product-feature">г. Казань: <div> — отсутствует </div></div>"#;
        let raw = parse_product_page(html).unwrap();
        assert_eq!(raw.feature_blocks.len(), 1);
        assert_eq!(raw.feature_blocks[0].stock_text, " — отсутствует ");
        assert!(raw.feature_blocks[0].full_text.contains("г. Казань"));
    }
}
