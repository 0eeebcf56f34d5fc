use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub scraper: ScraperConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub loader: LoaderConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// Directory site scraper configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScraperConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// On-disk artifact locations
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_responses_dir")]
    pub responses_dir: PathBuf,

    #[serde(default = "default_json_dir")]
    pub json_dir: PathBuf,

    #[serde(default = "default_ids_path")]
    pub ids_path: PathBuf,
}

/// Document store (REST) configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoaderConfig {
    #[serde(default = "default_store_url")]
    pub base_url: String,

    #[serde(default = "default_index")]
    pub index: String,

    #[serde(default = "default_doc_type")]
    pub doc_type: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Pipeline configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    /// Listing pages to walk; the site offers no end-of-results marker.
    #[serde(default = "default_page_count")]
    pub page_count: u32,
}

// ── Defaults ─────────────────────────────────────────────────────────────────

fn default_base_url() -> String {
    "http://www.brazil4export.com".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_user_agent() -> String {
    "b4e-etl/0.1 (company directory research)".to_string()
}
fn default_responses_dir() -> PathBuf {
    PathBuf::from("responses")
}
fn default_json_dir() -> PathBuf {
    PathBuf::from("json")
}
fn default_ids_path() -> PathBuf {
    PathBuf::from("ids.json")
}
fn default_store_url() -> String {
    "http://localhost:9200".to_string()
}
fn default_index() -> String {
    "brazil4export".to_string()
}
fn default_doc_type() -> String {
    "company".to_string()
}
fn default_page_count() -> u32 {
    821
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            responses_dir: default_responses_dir(),
            json_dir: default_json_dir(),
            ids_path: default_ids_path(),
        }
    }
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            base_url: default_store_url(),
            index: default_index(),
            doc_type: default_doc_type(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            page_count: default_page_count(),
        }
    }
}

// ── Loader ───────────────────────────────────────────────────────────────────

impl AppConfig {
    /// Load configuration from file + environment overrides
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let cfg = config::Config::builder()
            .add_source(
                config::File::with_name("config/default")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::File::with_name("config/local")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(config::Environment::with_prefix("B4E").separator("__"))
            .build()?;

        cfg.try_deserialize().context("Invalid configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_source_falls_back_to_defaults() {
        let cfg: AppConfig = config::Config::builder()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(cfg.scraper.base_url, "http://www.brazil4export.com");
        assert_eq!(cfg.loader.index, "brazil4export");
        assert_eq!(cfg.loader.doc_type, "company");
        assert_eq!(cfg.pipeline.page_count, 821);
        assert_eq!(cfg.storage.responses_dir, PathBuf::from("responses"));
    }

    #[test]
    fn toml_overrides_single_keys() {
        let toml = r#"
            [loader]
            base_url = "http://search:9200"

            [pipeline]
            page_count = 3
        "#;
        let cfg: AppConfig = config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(cfg.loader.base_url, "http://search:9200");
        assert_eq!(cfg.loader.index, "brazil4export");
        assert_eq!(cfg.pipeline.page_count, 3);
        assert_eq!(cfg.storage.json_dir, PathBuf::from("json"));
    }
}
