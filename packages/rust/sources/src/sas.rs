//! SAS EuroBonus Online Shopping: a numbered list of "all shops" pages.

use std::sync::LazyLock;

use bonusmap_shared::{MerchantRecord, Result};
use scraper::{Html, Selector};
use tracing::{debug, info, warn};
use url::Url;

use crate::{Fetcher, Program, element_text, parse_base, resolve_href, sas_rewards};

static LISTING: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.merchant-listing").expect("listing selector"));
static MERCHANT_NAME: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".merchant-name").expect("name selector"));
static MERCHANT_BLURB: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".merchant-description, p").expect("blurb selector"));
static MERCHANT_LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("link selector"));

pub(crate) async fn fetch(fetcher: &Fetcher) -> Result<Vec<MerchantRecord>> {
    let base = &fetcher.config().sas_url;

    let mut records: Vec<MerchantRecord> = Vec::new();
    for page in 1..=fetcher.config().max_pages {
        let url = parse_base(&format!("{base}{page}"))?;
        let body = match fetcher.get_text(&url).await {
            Ok(body) => body,
            Err(e) => {
                warn!(page, error = %e, "stopping sas pagination");
                break;
            }
        };

        let found = parse_page(&body, &url);
        if found.is_empty() {
            debug!(page, "empty sas page, listing exhausted");
            break;
        }
        for record in found {
            if !records.iter().any(|r| r.identifier == record.identifier) {
                records.push(record);
            }
        }
    }

    info!(merchants = records.len(), "sas listing parsed");
    Ok(records)
}

/// Merchants on one listing page.
pub(crate) fn parse_page(html: &str, page_url: &Url) -> Vec<MerchantRecord> {
    let doc = Html::parse_document(html);
    let mut records = Vec::new();

    for listing in doc.select(&LISTING) {
        let Some(name) = listing
            .select(&MERCHANT_NAME)
            .next()
            .map(element_text)
            .filter(|n| !n.is_empty())
        else {
            continue;
        };

        let mut record = MerchantRecord::new(name.clone(), name, Program::Sas.as_str());
        if let Some(blurb) = listing
            .select(&MERCHANT_BLURB)
            .next()
            .map(element_text)
            .filter(|b| !b.is_empty())
        {
            record = record.with_description(blurb);
        }
        if let Some(href) = listing
            .select(&MERCHANT_LINK)
            .next()
            .and_then(|a| a.value().attr("href"))
            .and_then(|h| resolve_href(page_url, h))
        {
            record = record.with_redirect(href);
        }
        record.rewards = sas_rewards(&element_text(listing));
        records.push(record);
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use bonusmap_shared::{Reward, SourcesConfig};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PAGE_ONE: &str = r#"<html><body>
        <div class="merchant-listing">
            <a href="/go/zalando"><span class="merchant-name">Zalando</span></a>
            <p>Mote fra zalando.no</p>
            <span>8 poeng / 100 kr</span>
        </div>
        <div class="merchant-listing">
            <span class="merchant-name">Hotels.com</span>
            <span>1000 poeng</span>
        </div>
    </body></html>"#;

    const PAGE_TWO: &str = r#"<html><body>
        <div class="merchant-listing">
            <span class="merchant-name">Zalando</span>
        </div>
        <div class="merchant-listing">
            <span class="merchant-name">Elkjøp</span>
        </div>
    </body></html>"#;

    const EMPTY: &str = "<html><body><p>Ingen butikker</p></body></html>";

    fn config(server: &MockServer, max_pages: u32) -> SourcesConfig {
        SourcesConfig {
            sas_url: format!("{}/nb-NO/alle-butikker/", server.uri()),
            max_pages,
            ..SourcesConfig::default()
        }
    }

    #[test]
    fn page_yields_records() {
        let url = Url::parse("https://onlineshopping.flysas.com/nb-NO/alle-butikker/1").unwrap();
        let records = parse_page(PAGE_ONE, &url);
        assert_eq!(records.len(), 2);

        assert_eq!(records[0].identifier, "Zalando");
        assert_eq!(records[0].program, "sas");
        assert_eq!(records[0].description.as_deref(), Some("Mote fra zalando.no"));
        assert_eq!(
            records[0].redirect_url.as_deref(),
            Some("https://onlineshopping.flysas.com/go/zalando")
        );
        assert_eq!(records[0].rewards, vec![Reward::Per100Kr { value: 8 }]);

        assert_eq!(records[1].identifier, "Hotels.com");
        assert_eq!(records[1].rewards, vec![Reward::SignupBonus { value: 1000 }]);
    }

    #[tokio::test]
    async fn paginates_until_empty_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/nb-NO/alle-butikker/1"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PAGE_ONE))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/nb-NO/alle-butikker/2"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PAGE_TWO))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/nb-NO/alle-butikker/3"))
            .respond_with(ResponseTemplate::new(200).set_body_string(EMPTY))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(&config(&server, 100)).unwrap();
        let records = fetcher.fetch(Program::Sas).await.unwrap();
        let names: Vec<_> = records.iter().map(|r| r.identifier.as_str()).collect();
        assert_eq!(names, vec!["Zalando", "Hotels.com", "Elkjøp"]);
    }

    #[tokio::test]
    async fn page_cap_stops_pagination() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PAGE_ONE))
            .expect(2)
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(&config(&server, 2)).unwrap();
        let records = fetcher.fetch(Program::Sas).await.unwrap();
        assert_eq!(records.len(), 2);
    }

    #[tokio::test]
    async fn failing_page_ends_listing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/nb-NO/alle-butikker/1"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PAGE_ONE))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/nb-NO/alle-butikker/2"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(&config(&server, 100)).unwrap();
        let records = fetcher.fetch(Program::Sas).await.unwrap();
        assert_eq!(records.len(), 2);
    }
}
