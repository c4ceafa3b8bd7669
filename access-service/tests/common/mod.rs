//! Shared setup for access-service integration tests.
//!
//! Builds the full router over in-memory store and CMS doubles, so no
//! PostgreSQL or Strapi instance is needed.

#![allow(dead_code)]

use access_service::{
    build_router,
    config::{
        AccessConfig, CacheConfig, CmsConfig, DatabaseConfig, Environment, SecurityConfig,
        SwaggerConfig, SwaggerMode,
    },
    models::{ConfigKey, ConfigValue, MemberRole, Membership},
    services::{AccessStore, CachedCms, CmsSource, MockCms, MockStore},
    AppState,
};
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tower::util::ServiceExt;
use uuid::Uuid;

pub fn test_config() -> AccessConfig {
    AccessConfig {
        common: service_core::config::Config::default(),
        environment: Environment::Dev,
        service_name: "access-service-test".to_string(),
        service_version: "0.0.0-test".to_string(),
        log_level: "error".to_string(),
        otlp_endpoint: None,
        database: DatabaseConfig {
            url: "postgres://unused".to_string(),
            max_connections: 1,
            min_connections: 1,
        },
        cms: CmsConfig {
            base_url: None,
            token: None,
            timeout_ms: 1000,
            cache_ttl_seconds: 300,
            failure_backoff_seconds: 30,
        },
        cache: CacheConfig { ttl_seconds: 60 },
        security: SecurityConfig {
            allowed_origins: vec!["http://localhost:3000".to_string()],
        },
        swagger: SwaggerConfig {
            enabled: SwaggerMode::Public,
        },
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MockStore>,
    pub cms: Arc<MockCms>,
    pub organization_id: Uuid,
    pub admin: Membership,
    pub member: Membership,
}

impl TestApp {
    /// App with an admin and a plain member in one organization, CMS unavailable.
    pub async fn spawn() -> Self {
        Self::spawn_with_cms(MockCms::unavailable()).await
    }

    pub async fn spawn_with_strapi(entries: &[(&str, ConfigValue)]) -> Self {
        let entries: HashMap<ConfigKey, ConfigValue> = entries
            .iter()
            .map(|(k, v)| (ConfigKey::parse(k).unwrap(), v.clone()))
            .collect();
        Self::spawn_with_cms(MockCms::available(entries)).await
    }

    async fn spawn_with_cms(cms: MockCms) -> Self {
        let store = Arc::new(MockStore::new());
        let cms = Arc::new(cms);

        let organization_id = Uuid::new_v4();
        let admin = Membership::new(organization_id, Uuid::new_v4(), MemberRole::Admin);
        let member = Membership::new(organization_id, Uuid::new_v4(), MemberRole::Member);
        store.insert_membership(&admin).await.unwrap();
        store.insert_membership(&member).await.unwrap();

        let source: Arc<dyn CmsSource> = cms.clone();
        let state = AppState::new(
            test_config(),
            store.clone(),
            CachedCms::new(source, Duration::from_secs(300)),
        );

        Self {
            router: build_router(state),
            store,
            cms,
            organization_id,
            admin,
            member,
        }
    }

    /// Add another membership to the test organization.
    pub async fn add_member(&self, role: MemberRole) -> Membership {
        let membership = Membership::new(self.organization_id, Uuid::new_v4(), role);
        self.store.insert_membership(&membership).await.unwrap();
        membership
    }

    pub async fn get(&self, uri: &str, as_member: &Membership) -> (StatusCode, serde_json::Value) {
        let request = with_identity(Request::builder().method("GET").uri(uri), as_member)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    pub async fn get_anonymous(&self, uri: &str) -> (StatusCode, serde_json::Value) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        self.send(request).await
    }

    pub async fn put_json(
        &self,
        uri: &str,
        as_member: &Membership,
        body: serde_json::Value,
    ) -> (StatusCode, serde_json::Value) {
        let request = with_identity(Request::builder().method("PUT").uri(uri), as_member)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    pub async fn post(&self, uri: &str, as_member: &Membership) -> (StatusCode, serde_json::Value) {
        let request = with_identity(Request::builder().method("POST").uri(uri), as_member)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| serde_json::Value::String(String::from_utf8_lossy(&bytes).into()))
        };
        (status, body)
    }
}

/// Gateway headers identifying `membership`'s user in its organization.
pub fn with_identity(
    builder: axum::http::request::Builder,
    membership: &Membership,
) -> axum::http::request::Builder {
    builder
        .header("x-account-id", membership.organization_id.to_string())
        .header("x-user-id", membership.user_id.to_string())
}
