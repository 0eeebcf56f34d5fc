//! Document-store loader: pushes parsed records into a REST index.

use crate::config::LoaderConfig;
use crate::models::{DetailRecord, Identifier};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected HTTP status {status} from {url}: {body}")]
    UnexpectedStatus { status: u16, url: String, body: String },
}

/// Destination for parsed records.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn index(&self, record: &DetailRecord) -> Result<(), StoreError>;
}

/// Elasticsearch-style `POST {base}/{index}/{type}/{id}` endpoint.
pub struct ElasticsearchStore {
    client: reqwest::Client,
    base_url: String,
    index: String,
    doc_type: String,
}

impl ElasticsearchStore {
    pub fn new(config: &LoaderConfig) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            index: config.index.clone(),
            doc_type: config.doc_type.clone(),
        })
    }

    pub fn document_url(&self, id: &Identifier) -> String {
        format!("{}/{}/{}/{}", self.base_url, self.index, self.doc_type, id)
    }
}

#[async_trait]
impl DocumentStore for ElasticsearchStore {
    async fn index(&self, record: &DetailRecord) -> Result<(), StoreError> {
        let url = self.document_url(&record.id);
        debug!("POST {}", url);

        let resp = self.client.post(&url).json(record).send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }

        let body = resp.text().await.unwrap_or_default();
        Err(StoreError::UnexpectedStatus {
            status: status.as_u16(),
            url,
            body,
        })
    }
}
