//! Provider handle with lazily cached catalogs

use crate::driver::ComputeDriver;
use crate::error::{CloudError, Result};
use crate::model::{Image, Network, SecurityGroup, Size};
use crate::retry::{RetryConfig, retry};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::OnceCell;

fn default_exclude_sizes() -> Option<String> {
    // Instance types meant for Windows
    Some("win-.*".to_string())
}

/// Provider-family options from the global configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConf {
    /// Sizes whose name matches this pattern (anchored at the start) are
    /// hidden from selection. An empty string disables filtering.
    #[serde(default = "default_exclude_sizes")]
    pub exclude_sizes: Option<String>,

    /// Security groups every node must join
    #[serde(default)]
    pub security_groups: Option<Vec<String>>,
}

impl Default for ProviderConf {
    fn default() -> Self {
        Self {
            exclude_sizes: default_exclude_sizes(),
            security_groups: None,
        }
    }
}

/// Live connection to a compute backend for one provisioning session
///
/// Each catalog is fetched at most once per handle and never refreshed;
/// build a new handle to see a newer catalog.
pub struct Provider {
    driver: Arc<dyn ComputeDriver>,
    conf: ProviderConf,
    exclude_sizes: Option<Regex>,
    retry: RetryConfig,
    images: OnceCell<Vec<Image>>,
    sizes: OnceCell<Vec<Size>>,
    networks: OnceCell<Vec<Network>>,
    security_groups: OnceCell<Vec<SecurityGroup>>,
}

impl Provider {
    pub fn new(driver: Arc<dyn ComputeDriver>, conf: ProviderConf) -> Result<Self> {
        let exclude_sizes = match conf.exclude_sizes.as_deref() {
            Some(pattern) if !pattern.is_empty() => Some(
                Regex::new(&format!("^(?:{})", pattern)).map_err(|e| {
                    CloudError::InvalidConfig(format!("exclude_sizes '{}': {}", pattern, e))
                })?,
            ),
            _ => None,
        };

        Ok(Self {
            driver,
            conf,
            exclude_sizes,
            retry: RetryConfig::default(),
            images: OnceCell::new(),
            sizes: OnceCell::new(),
            networks: OnceCell::new(),
            security_groups: OnceCell::new(),
        })
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Backend family name (e.g., "openstack")
    pub fn name(&self) -> &str {
        self.driver.name()
    }

    pub fn driver(&self) -> &dyn ComputeDriver {
        self.driver.as_ref()
    }

    pub fn conf(&self) -> &ProviderConf {
        &self.conf
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    /// Run a backend call through this handle's retry policy
    pub async fn call<T, F, Fut>(&self, name: &str, operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        retry(&self.retry, name, operation).await
    }

    pub async fn images(&self) -> Result<&[Image]> {
        self.images
            .get_or_try_init(|| self.call("list_images", || self.driver.list_images()))
            .await
            .map(Vec::as_slice)
    }

    /// Size catalog without the excluded instance types
    pub async fn sizes(&self) -> Result<&[Size]> {
        self.sizes
            .get_or_try_init(|| async {
                let sizes = self.call("list_sizes", || self.driver.list_sizes()).await?;
                Ok::<_, CloudError>(match &self.exclude_sizes {
                    Some(pattern) => sizes
                        .into_iter()
                        .filter(|s| !pattern.is_match(&s.name))
                        .collect(),
                    None => sizes,
                })
            })
            .await
            .map(Vec::as_slice)
    }

    /// Network catalog; empty when the backend has no network support
    pub async fn networks(&self) -> Result<&[Network]> {
        self.networks
            .get_or_try_init(|| async {
                match self.call("list_networks", || self.driver.list_networks()).await {
                    Err(CloudError::Unsupported(reason)) => {
                        tracing::warn!("Unable to list networks for {}: {}", self.name(), reason);
                        Ok(Vec::new())
                    }
                    other => other,
                }
            })
            .await
            .map(Vec::as_slice)
    }

    /// Security group catalog; empty when the backend has no support for them
    pub async fn security_groups(&self) -> Result<&[SecurityGroup]> {
        self.security_groups
            .get_or_try_init(|| async {
                match self
                    .call("list_security_groups", || self.driver.list_security_groups())
                    .await
                {
                    Err(CloudError::Unsupported(reason)) => {
                        tracing::warn!(
                            "Unable to list security groups for {}: {}",
                            self.name(),
                            reason
                        );
                        Ok(Vec::new())
                    }
                    other => other,
                }
            })
            .await
            .map(Vec::as_slice)
    }
}

impl std::fmt::Debug for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provider")
            .field("driver", &self.driver.name())
            .field("conf", &self.conf)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::CreateNodeRequest;
    use crate::model::{Node, Volume};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Catalog-only backend that counts listing calls
    #[derive(Default)]
    struct CatalogDriver {
        sizes: Vec<Size>,
        networks_supported: bool,
        size_calls: AtomicU32,
        network_calls: AtomicU32,
        throttle_images: AtomicU32,
    }

    fn size(name: &str) -> Size {
        Size {
            id: name.to_string(),
            name: name.to_string(),
            ram: 4096,
            disk: 40,
            vcpus: 2,
        }
    }

    #[async_trait]
    impl ComputeDriver for CatalogDriver {
        fn name(&self) -> &str {
            "test"
        }

        async fn list_images(&self) -> Result<Vec<Image>> {
            if self.throttle_images.load(Ordering::SeqCst) > 0 {
                self.throttle_images.fetch_sub(1, Ordering::SeqCst);
                return Err(CloudError::RateLimited("429".into()));
            }
            Ok(vec![Image {
                id: "img".into(),
                name: "Ubuntu 22.04".into(),
            }])
        }

        async fn list_sizes(&self) -> Result<Vec<Size>> {
            self.size_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.sizes.clone())
        }

        async fn list_networks(&self) -> Result<Vec<Network>> {
            self.network_calls.fetch_add(1, Ordering::SeqCst);
            if self.networks_supported {
                Ok(vec![Network {
                    id: "net".into(),
                    name: "private".into(),
                }])
            } else {
                Err(CloudError::Unsupported("no neutron".into()))
            }
        }

        async fn list_nodes(&self) -> Result<Vec<Node>> {
            Ok(Vec::new())
        }

        async fn create_node(&self, _request: &CreateNodeRequest) -> Result<Node> {
            Err(CloudError::ApiError("read-only".into()))
        }

        async fn wait_until_running(&self, _nodes: &[Node]) -> Result<Vec<(Node, Vec<String>)>> {
            Ok(Vec::new())
        }

        async fn list_volumes(&self) -> Result<Vec<Volume>> {
            Ok(Vec::new())
        }

        async fn create_volume(&self, _size: u64, _name: &str) -> Result<Volume> {
            Err(CloudError::ApiError("read-only".into()))
        }

        async fn attach_volume(
            &self,
            _node: &Node,
            _volume: &Volume,
            _device: Option<&str>,
        ) -> Result<()> {
            Ok(())
        }

        async fn detach_volume(&self, _volume: &Volume) -> Result<()> {
            Ok(())
        }

        async fn destroy_volume(&self, _volume: &Volume) -> Result<()> {
            Ok(())
        }

        async fn destroy_node(&self, _node: &Node) -> Result<bool> {
            Ok(true)
        }
    }

    fn provider(driver: CatalogDriver, conf: ProviderConf) -> (Arc<CatalogDriver>, Provider) {
        let driver = Arc::new(driver);
        let provider = Provider::new(driver.clone(), conf)
            .unwrap()
            .with_retry(RetryConfig::immediate(24));
        (driver, provider)
    }

    #[tokio::test]
    async fn test_sizes_exclude_windows_by_default() {
        let (_, provider) = provider(
            CatalogDriver {
                sizes: vec![size("win-large"), size("m1.large"), size("m1.win-ish")],
                ..Default::default()
            },
            ProviderConf::default(),
        );

        let names: Vec<&str> = provider
            .sizes()
            .await
            .unwrap()
            .iter()
            .map(|s| s.name.as_str())
            .collect();
        // only a leading match is excluded
        assert_eq!(names, vec!["m1.large", "m1.win-ish"]);
    }

    #[tokio::test]
    async fn test_empty_exclude_pattern_keeps_everything() {
        let conf = ProviderConf {
            exclude_sizes: Some(String::new()),
            ..Default::default()
        };
        let (_, provider) = provider(
            CatalogDriver {
                sizes: vec![size("win-large"), size("m1.large")],
                ..Default::default()
            },
            conf,
        );
        assert_eq!(provider.sizes().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_catalogs_are_fetched_once() {
        let (driver, provider) = provider(
            CatalogDriver {
                sizes: vec![size("m1.large")],
                networks_supported: true,
                ..Default::default()
            },
            ProviderConf::default(),
        );

        provider.sizes().await.unwrap();
        provider.sizes().await.unwrap();
        provider.networks().await.unwrap();
        provider.networks().await.unwrap();

        assert_eq!(driver.size_calls.load(Ordering::SeqCst), 1);
        assert_eq!(driver.network_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unsupported_listings_degrade_to_empty() {
        let (driver, provider) = provider(CatalogDriver::default(), ProviderConf::default());

        assert!(provider.networks().await.unwrap().is_empty());
        assert!(provider.networks().await.unwrap().is_empty());
        // the trait default also reports Unsupported
        assert!(provider.security_groups().await.unwrap().is_empty());
        assert_eq!(driver.network_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_images_retry_through_throttling() {
        let (_, provider) = provider(
            CatalogDriver {
                throttle_images: AtomicU32::new(2),
                ..Default::default()
            },
            ProviderConf::default(),
        );
        assert_eq!(provider.images().await.unwrap()[0].name, "Ubuntu 22.04");
    }

    #[test]
    fn test_invalid_exclude_pattern_is_rejected() {
        let conf = ProviderConf {
            exclude_sizes: Some("win-(".to_string()),
            ..Default::default()
        };
        let result = Provider::new(Arc::new(CatalogDriver::default()), conf);
        assert!(matches!(result, Err(CloudError::InvalidConfig(_))));
    }

    #[test]
    fn test_provider_conf_defaults_from_empty_section() {
        let conf: ProviderConf = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(conf.exclude_sizes.as_deref(), Some("win-.*"));
        assert!(conf.security_groups.is_none());
    }
}
