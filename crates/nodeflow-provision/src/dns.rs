//! DNS registration through an nsupdate-style HTTP endpoint
//!
//! The endpoint takes a GET with `name` and `ip` query parameters and
//! answers with a 2xx status when the record was updated.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DnsError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("DNS endpoint answered {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Points a node name at an address
#[async_trait]
pub trait DnsUpdater: Send + Sync {
    async fn update(&self, name: &str, ip: &str) -> Result<(), DnsError>;
}

/// Client for the nsupdate HTTP endpoint
pub struct NsUpdateClient {
    client: reqwest::Client,
    url: String,
}

impl NsUpdateClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Build the update request without sending it
    pub fn request(&self, name: &str, ip: &str) -> Result<reqwest::Request, DnsError> {
        Ok(self
            .client
            .get(&self.url)
            .query(&[("name", name), ("ip", ip)])
            .build()?)
    }
}

#[async_trait]
impl DnsUpdater for NsUpdateClient {
    async fn update(&self, name: &str, ip: &str) -> Result<(), DnsError> {
        let request = self.request(name, ip)?;
        tracing::debug!("Updating DNS: {}", request.url());

        let response = self.client.execute(request).await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DnsError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        tracing::info!("DNS record {} -> {} updated", name, ip);
        Ok(())
    }
}
