//! CMS connector: the optional middle tier of configuration.
//!
//! The CMS is best-effort. Any failure degrades to [`CmsLayer::Unavailable`]
//! and resolution carries on with defaults and registry overrides.

use async_trait::async_trait;
use serde::Deserialize;
use service_core::observability::TracedClientExt;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use thiserror::Error;

use super::cache::TtlCache;
use super::config_resolver::CmsLayer;
use super::metrics;
use crate::config::CmsConfig;
use crate::models::{ConfigKey, ConfigValue};

#[derive(Debug, Error)]
pub enum CmsError {
    #[error("CMS request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("CMS returned status {0}")]
    Status(u16),

    #[error("CMS payload invalid: {0}")]
    Payload(String),

    #[error("CMS not configured")]
    Disabled,
}

#[async_trait]
pub trait CmsSource: Send + Sync {
    /// Fetch every configuration value the CMS defines.
    async fn fetch_entries(&self) -> Result<HashMap<ConfigKey, ConfigValue>, CmsError>;
}

/// Strapi REST client for the `config-entries` collection.
#[derive(Clone)]
pub struct StrapiClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct StrapiListResponse {
    data: Vec<serde_json::Value>,
}

impl StrapiClient {
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            timeout,
        }
    }

    fn entries_url(&self) -> String {
        format!(
            "{}/api/config-entries?pagination[pageSize]=500",
            self.base_url
        )
    }
}

/// Turn a Strapi list payload into config values.
///
/// Strapi v4 nests fields under `attributes`, v5 returns them flat. Items
/// without a valid key are skipped.
fn parse_entries(body: StrapiListResponse) -> HashMap<ConfigKey, ConfigValue> {
    body.data
        .into_iter()
        .filter_map(|mut item| {
            let fields = if item.get("attributes").is_some() {
                item["attributes"].take()
            } else {
                item
            };
            let raw_key = fields.get("key")?.as_str()?.to_string();
            let value = fields.get("value").cloned().unwrap_or(ConfigValue::Null);
            match ConfigKey::parse(&raw_key) {
                Ok(key) => Some((key, value)),
                Err(e) => {
                    tracing::warn!(key = %raw_key, error = %e, "Ignoring CMS entry");
                    None
                }
            }
        })
        .collect()
}

#[async_trait]
impl CmsSource for StrapiClient {
    async fn fetch_entries(&self) -> Result<HashMap<ConfigKey, ConfigValue>, CmsError> {
        let url = self.entries_url();
        let mut request = self.client.traced_get(&url).timeout(self.timeout);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CmsError::Status(status.as_u16()));
        }

        let body: StrapiListResponse = response
            .json()
            .await
            .map_err(|e| CmsError::Payload(e.to_string()))?;

        Ok(parse_entries(body))
    }
}

/// Stand-in when no CMS is configured.
#[derive(Debug, Clone, Default)]
pub struct DisabledCms;

#[async_trait]
impl CmsSource for DisabledCms {
    async fn fetch_entries(&self) -> Result<HashMap<ConfigKey, ConfigValue>, CmsError> {
        Err(CmsError::Disabled)
    }
}

/// Default window during which a failed fetch is not retried.
pub const DEFAULT_FAILURE_BACKOFF: Duration = Duration::from_secs(30);

/// Wraps a source with a TTL cache of the last successful snapshot.
///
/// A failed fetch is remembered for the backoff window so an outage does not
/// cost a full request timeout on every resolution.
#[derive(Clone)]
pub struct CachedCms {
    source: Arc<dyn CmsSource>,
    cache: TtlCache<(), Arc<HashMap<ConfigKey, ConfigValue>>>,
    failures: TtlCache<(), ()>,
}

impl CachedCms {
    pub fn new(source: Arc<dyn CmsSource>, ttl: Duration) -> Self {
        Self {
            source,
            cache: TtlCache::new(ttl),
            failures: TtlCache::new(DEFAULT_FAILURE_BACKOFF),
        }
    }

    pub fn with_failure_backoff(mut self, backoff: Duration) -> Self {
        self.failures = TtlCache::new(backoff);
        self
    }

    pub fn from_config(config: &CmsConfig) -> Self {
        let source: Arc<dyn CmsSource> = match &config.base_url {
            Some(url) => Arc::new(StrapiClient::new(
                url,
                config.token.clone(),
                Duration::from_millis(config.timeout_ms),
            )),
            None => {
                tracing::info!("No CMS configured; resolving from defaults and registry only");
                Arc::new(DisabledCms)
            }
        };
        Self::new(source, Duration::from_secs(config.cache_ttl_seconds))
            .with_failure_backoff(Duration::from_secs(config.failure_backoff_seconds))
    }

    /// Current CMS tier. With `force_refresh` the cached snapshot and the
    /// failure backoff are both bypassed.
    pub async fn layer(&self, force_refresh: bool) -> CmsLayer {
        if !force_refresh {
            if let Some(values) = self.cache.get(&()) {
                return CmsLayer::Available(values.as_ref().clone());
            }
            if self.failures.get(&()).is_some() {
                return CmsLayer::Unavailable;
            }
        }

        match self.source.fetch_entries().await {
            Ok(values) => {
                tracing::debug!(entries = values.len(), "Fetched CMS configuration");
                let values = Arc::new(values);
                self.cache.insert((), Arc::clone(&values));
                self.failures.clear();
                CmsLayer::Available(values.as_ref().clone())
            }
            Err(CmsError::Disabled) => CmsLayer::Unavailable,
            Err(e) => {
                tracing::warn!(error = %e, "CMS unavailable; falling back to defaults");
                metrics::record_cms_failure();
                self.failures.insert((), ());
                CmsLayer::Unavailable
            }
        }
    }

    pub fn invalidate(&self) {
        self.cache.clear();
        self.failures.clear();
    }
}

/// In-memory CMS with switchable availability.
#[derive(Default)]
pub struct MockCms {
    pub entries: RwLock<HashMap<ConfigKey, ConfigValue>>,
    pub available: RwLock<bool>,
    pub fetches: std::sync::atomic::AtomicUsize,
}

impl MockCms {
    pub fn available(entries: HashMap<ConfigKey, ConfigValue>) -> Self {
        Self {
            entries: RwLock::new(entries),
            available: RwLock::new(true),
            fetches: Default::default(),
        }
    }

    pub fn unavailable() -> Self {
        Self::default()
    }

    pub fn set_available(&self, available: bool) {
        if let Ok(mut flag) = self.available.write() {
            *flag = available;
        }
    }

    pub fn set_entry(&self, key: ConfigKey, value: ConfigValue) {
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(key, value);
        }
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[async_trait]
impl CmsSource for MockCms {
    async fn fetch_entries(&self) -> Result<HashMap<ConfigKey, ConfigValue>, CmsError> {
        self.fetches
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let available = *self
            .available
            .read()
            .map_err(|e| CmsError::Payload(format!("Mock CMS lock poisoned: {}", e)))?;
        if !available {
            return Err(CmsError::Status(503));
        }
        let entries = self
            .entries
            .read()
            .map_err(|e| CmsError::Payload(format!("Mock CMS lock poisoned: {}", e)))?;
        Ok(entries.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn key(raw: &str) -> ConfigKey {
        ConfigKey::parse(raw).unwrap()
    }

    #[test]
    fn parses_v4_and_v5_shapes() {
        let body: StrapiListResponse = serde_json::from_value(json!({
            "data": [
                { "id": 1, "attributes": { "key": "project.stages", "value": ["a", "b"] } },
                { "id": 2, "key": "task.statuses", "value": ["todo"] },
                { "id": 3, "key": "Bad Key", "value": 1 }
            ]
        }))
        .unwrap();

        let entries = parse_entries(body);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[&key("project.stages")], json!(["a", "b"]));
        assert_eq!(entries[&key("task.statuses")], json!(["todo"]));
    }

    #[tokio::test]
    async fn caches_successful_snapshot() {
        let mock = Arc::new(MockCms::available(HashMap::from([(
            key("project.stages"),
            json!(["cms"]),
        )])));
        let cms = CachedCms::new(mock.clone(), Duration::from_secs(300));

        assert!(cms.layer(false).await.is_available());
        assert!(cms.layer(false).await.is_available());
        assert_eq!(mock.fetch_count(), 1);

        cms.layer(true).await;
        assert_eq!(mock.fetch_count(), 2);
    }

    #[tokio::test]
    async fn failure_degrades_to_unavailable() {
        let cms = CachedCms::new(Arc::new(MockCms::unavailable()), Duration::from_secs(300));
        assert_eq!(cms.layer(false).await, CmsLayer::Unavailable);
    }

    #[tokio::test]
    async fn failed_fetch_is_not_retried_within_backoff() {
        let mock = Arc::new(MockCms::unavailable());
        let cms = CachedCms::new(mock.clone(), Duration::from_secs(300))
            .with_failure_backoff(Duration::from_secs(60));

        assert_eq!(cms.layer(false).await, CmsLayer::Unavailable);
        mock.set_available(true);
        assert_eq!(cms.layer(false).await, CmsLayer::Unavailable);
        assert_eq!(mock.fetch_count(), 1);

        assert!(cms.layer(true).await.is_available());
        assert!(cms.layer(false).await.is_available());
        assert_eq!(mock.fetch_count(), 2);
    }

    #[tokio::test]
    async fn zero_backoff_retries_every_time() {
        let mock = Arc::new(MockCms::unavailable());
        let cms = CachedCms::new(mock.clone(), Duration::from_secs(300))
            .with_failure_backoff(Duration::ZERO);

        cms.layer(false).await;
        mock.set_available(true);
        assert!(cms.layer(false).await.is_available());
        assert_eq!(mock.fetch_count(), 2);
    }

    #[tokio::test]
    async fn disabled_cms_is_unavailable() {
        let cms = CachedCms::new(Arc::new(DisabledCms), Duration::from_secs(300));
        assert_eq!(cms.layer(true).await, CmsLayer::Unavailable);
    }

    #[tokio::test]
    async fn strapi_client_reads_entries_and_sends_token() {
        use wiremock::matchers::{header, method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/config-entries"))
            .and(header("authorization", "Bearer cms-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{ "id": 1, "attributes": { "key": "crm.deal_stages", "value": ["won"] } }]
            })))
            .mount(&server)
            .await;

        let client = StrapiClient::new(
            &server.uri(),
            Some("cms-token".to_string()),
            Duration::from_secs(2),
        );
        let entries = client.fetch_entries().await.unwrap();
        assert_eq!(entries[&key("crm.deal_stages")], json!(["won"]));
    }

    #[tokio::test]
    async fn strapi_client_reports_error_status() {
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let client = StrapiClient::new(&server.uri(), None, Duration::from_secs(2));
        assert!(matches!(
            client.fetch_entries().await,
            Err(CmsError::Status(502))
        ));
    }
}
