pub mod cleaner;
pub mod http_client;
pub mod parsers;

use crate::config::ScraperConfig;
use crate::models::Identifier;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::BTreeSet;
use tracing::{debug, info};
use url::Url;

use self::http_client::HttpClient;
use self::parsers::parse_listing_page;

// ── Source trait ──────────────────────────────────────────────────────────────

/// Raw page access to the company directory.
#[async_trait]
pub trait DirectorySource: Send + Sync {
    async fn fetch_listing_page(&self, page: u32) -> Result<String>;
    async fn fetch_detail_page(&self, id: &Identifier) -> Result<String>;
}

// ── brazil4export scraper ─────────────────────────────────────────────────────

pub struct Brazil4ExportScraper {
    client: HttpClient,
    base_url: String,
}

impl Brazil4ExportScraper {
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        Url::parse(&config.base_url)
            .with_context(|| format!("Invalid base_url {:?}", config.base_url))?;

        Ok(Self {
            client: HttpClient::new(config)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Build a scraper and open its session; the site hands out the cookie
    /// on the home page.
    pub async fn connect(config: &ScraperConfig) -> Result<Self> {
        let scraper = Self::new(config)?;
        let home = format!("{}/", scraper.base_url);
        info!("Opening session at {}", home);
        scraper
            .client
            .get_text(&home)
            .await
            .context("Failed to open session")?;
        Ok(scraper)
    }

    fn functions_url(&self, params: &[(&str, &str)]) -> Result<String> {
        let endpoint = format!("{}/include_php/functions.php", self.base_url);
        let url = Url::parse_with_params(&endpoint, params)
            .with_context(|| format!("Invalid endpoint {}", endpoint))?;
        Ok(url.into())
    }

    /// URL for one page of the search listing.
    fn listing_url(&self, page: u32) -> Result<String> {
        let page = page.to_string();
        self.functions_url(&[
            ("opc", "1"),
            ("tabela", "0"),
            ("cpo_busca", ""),
            ("page", &page),
        ])
    }

    /// URL for a company's detail page.
    fn detail_url(&self, id: &Identifier) -> Result<String> {
        self.functions_url(&[("opc", "6"), ("empresa", id.as_str())])
    }
}

#[async_trait]
impl DirectorySource for Brazil4ExportScraper {
    async fn fetch_listing_page(&self, page: u32) -> Result<String> {
        let url = self.listing_url(page)?;
        self.client.get_text(&url).await
    }

    async fn fetch_detail_page(&self, id: &Identifier) -> Result<String> {
        let url = self.detail_url(id)?;
        self.client.get_text(&url).await
    }
}

/// Walk listing pages `1..=page_count` and gather every company id.
///
/// The listing has no end marker, so the caller supplies the bound. Any
/// page failure aborts the walk.
pub async fn collect_identifiers(
    source: &dyn DirectorySource,
    page_count: u32,
) -> Result<BTreeSet<Identifier>> {
    let mut ids = BTreeSet::new();

    for page in 1..=page_count {
        let html = source
            .fetch_listing_page(page)
            .await
            .with_context(|| format!("Failed to fetch listing page {}", page))?;

        let found = parse_listing_page(&html)
            .with_context(|| format!("Failed to parse listing page {}", page))?;
        debug!("Page {}: {} links", page, found.len());
        ids.extend(found);

        if page % 50 == 0 {
            info!("  {}/{} listing pages, {} ids so far", page, page_count, ids.len());
        }
    }

    info!("Total ids discovered: {}", ids.len());
    Ok(ids)
}
