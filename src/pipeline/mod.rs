//! Pipeline orchestrator: ties scraper → artifacts → document store together.
//!
//! ## Stages
//!
//! 1. `list`  — walk the search listing, write the id set to `ids.json`
//! 2. `fetch` — download each detail page into `responses/{id}.html`
//! 3. `parse` — decode every saved page into `json/{id}.json`
//! 4. `load`  — POST every parsed record to the document store
//!
//! Stages run one record at a time. A failing record is recorded in the
//! stage's [`BatchReport`] and the batch moves on; only listing failures and
//! artifact-directory errors abort a stage.

use crate::config::AppConfig;
use crate::loader::{DocumentStore, ElasticsearchStore};
use crate::models::{DetailRecord, Identifier};
use crate::scraper::parsers::{page_text, parse_detail};
use crate::scraper::{Brazil4ExportScraper, DirectorySource, collect_identifiers};
use crate::storage::ArtifactStore;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use tracing::{debug, info, warn};

// ── Batch report ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Fetch,
    Parse,
    Load,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Fetch => "fetch",
            Stage::Parse => "parse",
            Stage::Load => "load",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordFailure {
    pub id: Identifier,
    pub reason: String,
}

/// Per-record outcome of one stage.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub stage: Stage,
    pub succeeded: usize,
    pub failures: Vec<RecordFailure>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl BatchReport {
    pub fn begin(stage: Stage) -> Self {
        Self {
            stage,
            succeeded: 0,
            failures: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn record_success(&mut self) {
        self.succeeded += 1;
    }

    pub fn record_failure(&mut self, id: &Identifier, err: &anyhow::Error) {
        warn!("{} {}: {:#}", self.stage, id, err);
        self.failures.push(RecordFailure {
            id: id.clone(),
            reason: format!("{:#}", err),
        });
    }

    pub fn finish(mut self) -> Self {
        self.finished_at = Some(Utc::now());
        info!(
            "=== {}: {} ok | {} failed (of {}) ===",
            self.stage,
            self.succeeded,
            self.failures.len(),
            self.attempted()
        );
        self
    }

    pub fn attempted(&self) -> usize {
        self.succeeded + self.failures.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

// ── Stages ────────────────────────────────────────────────────────────────────

pub async fn fetch_and_store(
    source: &dyn DirectorySource,
    artifacts: &ArtifactStore,
    id: &Identifier,
) -> Result<()> {
    let html = source
        .fetch_detail_page(id)
        .await
        .with_context(|| format!("Failed to fetch detail page {}", id))?;
    artifacts.save_html(id, &html)
}

pub async fn fetch_and_store_all(
    source: &dyn DirectorySource,
    artifacts: &ArtifactStore,
    ids: &BTreeSet<Identifier>,
) -> BatchReport {
    let mut report = BatchReport::begin(Stage::Fetch);

    for id in ids {
        match fetch_and_store(source, artifacts, id).await {
            Ok(()) => {
                debug!("{}: saved", id);
                report.record_success();
            }
            Err(e) => report.record_failure(id, &e),
        }
    }

    report.finish()
}

/// Decode one saved page and write its JSON artifact.
pub fn parse_and_store(artifacts: &ArtifactStore, id: &Identifier) -> Result<DetailRecord> {
    let html = artifacts.read_html(id)?;

    let record = match parse_detail(id, &html) {
        Ok(record) => record,
        Err(e) => {
            debug!("{} page text: {}", id, page_text(&html));
            return Err(e.into());
        }
    };

    if record.is_unpopulated() {
        info!("{}: page has no table rows, storing empty record", id);
    }

    artifacts.save_record(&record)?;
    Ok(record)
}

pub fn parse_all(artifacts: &ArtifactStore) -> Result<BatchReport> {
    let ids = artifacts.html_ids()?;
    info!("Parsing {} saved pages", ids.len());

    let mut report = BatchReport::begin(Stage::Parse);
    for id in &ids {
        match parse_and_store(artifacts, id) {
            Ok(_) => report.record_success(),
            Err(e) => report.record_failure(id, &e),
        }
    }

    Ok(report.finish())
}

pub async fn load(
    store: &dyn DocumentStore,
    artifacts: &ArtifactStore,
    id: &Identifier,
) -> Result<()> {
    let record = artifacts.read_record(id)?;
    store
        .index(&record)
        .await
        .with_context(|| format!("Document store rejected {}", id))
}

/// Push every parsed record; failures are reported, never fatal.
pub async fn load_all(store: &dyn DocumentStore, artifacts: &ArtifactStore) -> Result<BatchReport> {
    let ids = artifacts.json_ids()?;
    info!("Loading {} records", ids.len());

    let mut report = BatchReport::begin(Stage::Load);
    for id in &ids {
        match load(store, artifacts, id).await {
            Ok(()) => report.record_success(),
            Err(e) => report.record_failure(id, &e),
        }
    }

    Ok(report.finish())
}

// ── Orchestrator ──────────────────────────────────────────────────────────────

pub struct Pipeline {
    config: AppConfig,
    artifacts: ArtifactStore,
}

#[derive(Debug)]
pub struct PipelineStats {
    pub ids_discovered: usize,
    pub fetch: BatchReport,
    pub parse: BatchReport,
    pub load: BatchReport,
}

impl Pipeline {
    pub fn new(config: AppConfig) -> Self {
        let artifacts = ArtifactStore::new(&config.storage);
        Self { config, artifacts }
    }

    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    async fn scraper(&self) -> Result<Brazil4ExportScraper> {
        Brazil4ExportScraper::connect(&self.config.scraper)
            .await
            .context("Failed to build scraper")
    }

    pub async fn list(&self, page_count: Option<u32>) -> Result<BTreeSet<Identifier>> {
        let pages = page_count.unwrap_or(self.config.pipeline.page_count);
        let scraper = self.scraper().await?;

        info!("=== Listing: {} pages ===", pages);
        let ids = collect_identifiers(&scraper, pages)
            .await
            .context("Listing failed")?;

        self.artifacts.save_ids(&ids)?;
        Ok(ids)
    }

    pub async fn fetch(&self) -> Result<BatchReport> {
        let ids = self.artifacts.load_ids()?;
        let scraper = self.scraper().await?;

        info!("=== Fetching {} detail pages ===", ids.len());
        Ok(fetch_and_store_all(&scraper, &self.artifacts, &ids).await)
    }

    pub fn parse(&self) -> Result<BatchReport> {
        info!("=== Parsing detail pages ===");
        parse_all(&self.artifacts)
    }

    pub async fn load(&self) -> Result<BatchReport> {
        let store = ElasticsearchStore::new(&self.config.loader)
            .context("Failed to build document store client")?;

        info!("=== Loading into {}/{} ===", self.config.loader.base_url, self.config.loader.index);
        load_all(&store, &self.artifacts).await
    }

    pub async fn run(&self, page_count: Option<u32>) -> Result<PipelineStats> {
        let ids = self.list(page_count).await?;
        let fetch = self.fetch().await?;
        let parse = self.parse()?;
        let load = self.load().await?;

        Ok(PipelineStats {
            ids_discovered: ids.len(),
            fetch,
            parse,
            load,
        })
    }
}
