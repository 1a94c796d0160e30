//! Trumf Netthandel: a category index linking to per-category shop grids.

use std::collections::HashMap;
use std::sync::LazyLock;

use bonusmap_shared::{MerchantRecord, Result};
use scraper::{Html, Selector};
use tracing::{info, warn};
use url::Url;

use crate::{Fetcher, Program, element_text, parse_base, resolve_href, trumf_rewards};

static CATEGORY_LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a.category-box[href]").expect("category selector"));
static HEADING: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h1").expect("h1 selector"));
static SHOP_BOX: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.shop-box").expect("shop selector"));
static SHOP_NAME: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h3").expect("h3 selector"));
static SHOP_BLURB: LazyLock<Selector> = LazyLock::new(|| Selector::parse("p").expect("p selector"));
static SHOP_LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("link selector"));

pub(crate) async fn fetch(fetcher: &Fetcher) -> Result<Vec<MerchantRecord>> {
    let index_url = parse_base(&fetcher.config().trumf_url)?;
    let index = fetcher.get_text(&index_url).await?;
    let categories = category_links(&index, &index_url);
    info!(categories = categories.len(), "trumf category index loaded");

    let mut merchants = Merchants::default();
    for category_url in categories {
        let Ok(url) = Url::parse(&category_url) else {
            continue;
        };
        match fetcher.get_text(&url).await {
            Ok(body) => {
                for record in parse_category(&body, &url) {
                    merchants.add(record);
                }
            }
            Err(e) => warn!(url = %url, error = %e, "skipping trumf category"),
        }
    }

    let records = merchants.into_records();
    info!(merchants = records.len(), "trumf listing parsed");
    Ok(records)
}

/// Absolute category URLs from the index page, in page order, deduplicated.
pub(crate) fn category_links(html: &str, base: &Url) -> Vec<String> {
    let doc = Html::parse_document(html);
    let mut links: Vec<String> = Vec::new();
    for a in doc.select(&CATEGORY_LINK) {
        let Some(url) = a.value().attr("href").and_then(|h| resolve_href(base, h)) else {
            continue;
        };
        if !links.contains(&url) {
            links.push(url);
        }
    }
    links
}

/// Shops on one category page.
pub(crate) fn parse_category(html: &str, page_url: &Url) -> Vec<MerchantRecord> {
    let doc = Html::parse_document(html);
    let category = doc
        .select(&HEADING)
        .next()
        .map(element_text)
        .filter(|c| !c.is_empty());

    let mut records = Vec::new();
    for shop in doc.select(&SHOP_BOX) {
        let Some(name) = shop.select(&SHOP_NAME).next().map(element_text) else {
            continue;
        };
        if name.is_empty() {
            continue;
        }

        let mut record = MerchantRecord::new(name.clone(), name, Program::Trumf.as_str());
        if let Some(blurb) = shop
            .select(&SHOP_BLURB)
            .next()
            .map(element_text)
            .filter(|b| !b.is_empty())
        {
            record = record.with_description(blurb);
        }
        if let Some(href) = shop
            .select(&SHOP_LINK)
            .next()
            .and_then(|a| a.value().attr("href"))
            .and_then(|h| resolve_href(page_url, h))
        {
            record = record.with_redirect(href);
        }
        record.rewards = trumf_rewards(&element_text(shop), category.as_deref());
        records.push(record);
    }
    records
}

/// Shops listed under several categories collapse into one record.
#[derive(Default)]
struct Merchants {
    order: Vec<String>,
    by_id: HashMap<String, MerchantRecord>,
}

impl Merchants {
    fn add(&mut self, record: MerchantRecord) {
        match self.by_id.get_mut(&record.identifier) {
            Some(existing) => {
                if existing.description.is_none() {
                    existing.description = record.description;
                }
                if existing.redirect_url.is_none() {
                    existing.redirect_url = record.redirect_url;
                }
                for reward in record.rewards {
                    if !existing.rewards.contains(&reward) {
                        existing.rewards.push(reward);
                    }
                }
            }
            None => {
                self.order.push(record.identifier.clone());
                self.by_id.insert(record.identifier.clone(), record);
            }
        }
    }

    fn into_records(mut self) -> Vec<MerchantRecord> {
        self.order
            .iter()
            .filter_map(|id| self.by_id.remove(id))
            .collect()
    }
}
