//! Tenant-scoped access overlay (spec §4.7): stamps writes, filters reads,
//! rate-limits, and records a bounded audit trail.
//!
//! Grounded structurally on the teacher's "wrap the fallible inner op,
//! translate/guard, log" discipline throughout `storage/sqlite.rs`, and on
//! `neuroscience/predictive_retrieval.rs`'s bounded `VecDeque` ring for the
//! audit log.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::instrument;
use uuid::Uuid;

use crate::config::{EngineConfig, SecurityConfig};
use crate::embeddings::EmbeddingProvider;
use crate::error::Result;
use crate::item::{ItemMetadata, MemoryItem, MemoryLayer, PartialItem};
use crate::layer::SearchResult;
use crate::router::Router;

/// Caller identity for a tenant-scoped operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantContext {
    pub tenant_id: String,
    pub user_id: String,
}

impl TenantContext {
    pub fn new(tenant_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            user_id: user_id.into(),
        }
    }
}

#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditSeverity {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub tenant_id: String,
    pub user_id: String,
    pub event_type: String,
    pub severity: AuditSeverity,
    pub resource: String,
    pub action: String,
    pub metadata: serde_json::Value,
}

mod rate_limit {
    use super::*;

    /// A token bucket for one `(operation, tenant_id, user_id)` key.
    struct Bucket {
        tokens: f64,
        last_refill: DateTime<Utc>,
    }

    pub struct RateLimiter {
        capacity: f64,
        refill_per_sec: f64,
        buckets: Mutex<HashMap<(String, String, String), Bucket>>,
    }

    impl RateLimiter {
        pub fn new(capacity: u32, refill_per_sec: f64) -> Self {
            Self {
                capacity: capacity as f64,
                refill_per_sec,
                buckets: Mutex::new(HashMap::new()),
            }
        }

        /// Returns `Ok(())` if a token was available, or `Err(retry_after_ms)`.
        pub async fn try_acquire(&self, operation: &str, tenant_id: &str, user_id: &str) -> std::result::Result<(), u64> {
            let key = (operation.to_string(), tenant_id.to_string(), user_id.to_string());
            let now = Utc::now();
            let mut buckets = self.buckets.lock().await;
            let bucket = buckets.entry(key).or_insert_with(|| Bucket {
                tokens: self.capacity,
                last_refill: now,
            });

            let elapsed = now.signed_duration_since(bucket.last_refill).num_milliseconds() as f64 / 1000.0;
            bucket.tokens = (bucket.tokens + elapsed * self.refill_per_sec).min(self.capacity);
            bucket.last_refill = now;

            if bucket.tokens >= 1.0 {
                bucket.tokens -= 1.0;
                Ok(())
            } else {
                let deficit = 1.0 - bucket.tokens;
                let retry_after_ms = (deficit / self.refill_per_sec * 1000.0).ceil().max(0.0) as u64;
                Err(retry_after_ms)
            }
        }
    }
}

use rate_limit::RateLimiter;

/// Wraps a [`Router`], stamping tenant identity on writes and filtering
/// every read so a tenant can only observe its own items.
pub struct TenantOverlay {
    router: Router,
    security: SecurityConfig,
    audit: RwLock<VecDeque<AuditEvent>>,
    audit_capacity: usize,
    rate_limiter: RateLimiter,
}

impl TenantOverlay {
    pub fn new(config: &EngineConfig, embedder: Option<std::sync::Arc<dyn EmbeddingProvider>>) -> Self {
        Self {
            router: Router::new(config, embedder),
            security: config.security.clone(),
            audit: RwLock::new(VecDeque::with_capacity(config.security.audit_ring_capacity)),
            audit_capacity: config.security.audit_ring_capacity.max(1),
            rate_limiter: RateLimiter::new(config.security.rate_limit_capacity, config.security.rate_limit_refill_per_sec),
        }
    }

    pub async fn load(config: &EngineConfig, embedder: Option<std::sync::Arc<dyn EmbeddingProvider>>) -> Self {
        Self {
            router: Router::load(config, embedder).await,
            security: config.security.clone(),
            audit: RwLock::new(VecDeque::with_capacity(config.security.audit_ring_capacity)),
            audit_capacity: config.security.audit_ring_capacity.max(1),
            rate_limiter: RateLimiter::new(config.security.rate_limit_capacity, config.security.rate_limit_refill_per_sec),
        }
    }

    fn authorized(&self, ctx: Option<&TenantContext>) -> bool {
        !(self.security.require_auth && ctx.is_none())
    }

    async fn audit_log(&self, ctx: &TenantContext, event_type: &str, resource: &str, action: &str, severity: AuditSeverity) {
        if !self.security.audit_logging {
            return;
        }
        let event = AuditEvent {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            tenant_id: ctx.tenant_id.clone(),
            user_id: ctx.user_id.clone(),
            event_type: event_type.to_string(),
            severity,
            resource: resource.to_string(),
            action: action.to_string(),
            metadata: serde_json::Value::Null,
        };
        let mut ring = self.audit.write().await;
        if ring.len() >= self.audit_capacity {
            ring.pop_front();
        }
        ring.push_back(event);
    }

    async fn check_rate_limit(&self, operation: &str, ctx: &TenantContext) -> Result<()> {
        self.rate_limiter
            .try_acquire(operation, &ctx.tenant_id, &ctx.user_id)
            .await
            .map_err(|retry_after_ms| crate::error::EngineError::RateLimited { retry_after_ms })
    }

    /// `store(content, meta, ctx)` (spec §4.7): stamps `tenant_id` and
    /// `created_by`, then delegates to the router.
    #[instrument(skip(self, content, metadata, ctx))]
    pub async fn store(
        &self,
        content: String,
        mut metadata: ItemMetadata,
        ctx: Option<&TenantContext>,
    ) -> Result<Option<MemoryItem>> {
        let Some(ctx) = ctx.filter(|_| self.authorized(ctx)) else {
            return Ok(None);
        };
        self.check_rate_limit("store", ctx).await?;

        metadata.tenant_id = ctx.tenant_id.clone();
        metadata.created_by = ctx.user_id.clone();
        let item = self.router.store(content, metadata).await?;
        self.audit_log(ctx, "memory.store", &item.id.to_string(), "write", AuditSeverity::Info)
            .await;
        Ok(Some(item))
    }

    /// `search(query, ctx)`: fans out through the router, then drops any
    /// result whose `tenant_id` doesn't match the caller's.
    pub async fn search(
        &self,
        query_text: &str,
        category: Option<String>,
        tags: Vec<String>,
        ctx: Option<&TenantContext>,
    ) -> Vec<SearchResult> {
        let Some(ctx) = ctx.filter(|_| self.authorized(ctx)) else {
            return Vec::new();
        };
        if self.check_rate_limit("search", ctx).await.is_err() {
            return Vec::new();
        }

        let results = self.router.search(query_text, category, tags).await;
        let visible: Vec<SearchResult> = results
            .into_iter()
            .filter(|r| !self.security.tenant_isolation || r.item.metadata.tenant_id == ctx.tenant_id)
            .collect();
        self.audit_log(ctx, "memory.search", query_text, "read", AuditSeverity::Info)
            .await;
        visible
    }

    pub async fn retrieve(&self, kind: MemoryLayer, id: Uuid, ctx: Option<&TenantContext>) -> Option<MemoryItem> {
        let ctx = ctx.filter(|_| self.authorized(ctx))?;
        if self.check_rate_limit("retrieve", ctx).await.is_err() {
            return None;
        }
        let item = self.router.retrieve(kind, id).await?;
        if self.security.tenant_isolation && item.metadata.tenant_id != ctx.tenant_id {
            return None;
        }
        self.audit_log(ctx, "memory.retrieve", &id.to_string(), "read", AuditSeverity::Info)
            .await;
        Some(item)
    }

    pub async fn update(
        &self,
        kind: MemoryLayer,
        id: Uuid,
        patch: PartialItem,
        ctx: Option<&TenantContext>,
    ) -> Result<Option<MemoryItem>> {
        let Some(ctx) = ctx.filter(|_| self.authorized(ctx)) else {
            return Ok(None);
        };
        self.check_rate_limit("update", ctx).await?;

        if self.security.tenant_isolation {
            match self.router.retrieve(kind, id).await {
                Some(existing) if existing.metadata.tenant_id == ctx.tenant_id => {}
                _ => return Ok(None),
            }
        }
        let updated = self.router.update(kind, id, patch).await?;
        self.audit_log(ctx, "memory.update", &id.to_string(), "write", AuditSeverity::Info)
            .await;
        Ok(updated)
    }

    pub async fn delete(&self, kind: MemoryLayer, id: Uuid, ctx: Option<&TenantContext>) -> bool {
        let Some(ctx) = ctx.filter(|_| self.authorized(ctx)) else {
            return false;
        };
        if self.check_rate_limit("delete", ctx).await.is_err() {
            return false;
        }
        if self.security.tenant_isolation {
            match self.router.retrieve(kind, id).await {
                Some(existing) if existing.metadata.tenant_id == ctx.tenant_id => {}
                _ => return false,
            }
        }
        let removed = self.router.delete(kind, id).await;
        if removed {
            self.audit_log(ctx, "memory.delete", &id.to_string(), "write", AuditSeverity::Warning)
                .await;
        }
        removed
    }

    /// `audit_log(ctx, limit)`: most recent events for `ctx.tenant_id`,
    /// read-only (spec §4.7).
    pub async fn recent_audit_events(&self, ctx: &TenantContext, limit: usize) -> Vec<AuditEvent> {
        self.audit
            .read()
            .await
            .iter()
            .rev()
            .filter(|e| e.tenant_id == ctx.tenant_id)
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub async fn close(&self) -> Result<()> {
        self.router.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> (EngineConfig, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let mut config = EngineConfig::default();
        config.data_dir = dir.path().to_path_buf();
        (config, dir)
    }

    fn meta(category: &str, priority: u8) -> ItemMetadata {
        ItemMetadata::new(category, priority, "test")
    }

    #[tokio::test]
    async fn store_stamps_tenant_and_user() {
        let (config, _dir) = test_config();
        let overlay = TenantOverlay::new(&config, None);
        let ctx = TenantContext::new("acme", "alice");
        let item = overlay
            .store("hello".into(), meta("general", 5), Some(&ctx))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(item.metadata.tenant_id, "acme");
        assert_eq!(item.metadata.created_by, "alice");
    }

    #[tokio::test]
    async fn search_hides_other_tenants_items() {
        let (config, _dir) = test_config();
        let overlay = TenantOverlay::new(&config, None);
        let acme = TenantContext::new("acme", "alice");
        let globex = TenantContext::new("globex", "bob");

        overlay.store("acme secret plan".into(), meta("general", 5), Some(&acme)).await.unwrap();
        overlay.store("globex secret plan".into(), meta("general", 5), Some(&globex)).await.unwrap();

        let results = overlay.search("secret plan", None, Vec::new(), Some(&acme)).await;
        assert!(results.iter().all(|r| r.item.metadata.tenant_id == "acme"));
    }

    #[tokio::test]
    async fn no_context_returns_empty_when_require_auth() {
        let (mut config, _dir) = test_config();
        config.security.require_auth = true;
        let overlay = TenantOverlay::new(&config, None);
        let result = overlay.store("hello".into(), meta("general", 5), None).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn retrieve_across_tenant_boundary_is_invisible() {
        let (config, _dir) = test_config();
        let overlay = TenantOverlay::new(&config, None);
        let acme = TenantContext::new("acme", "alice");
        let globex = TenantContext::new("globex", "bob");
        let item = overlay
            .store("acme only".into(), meta("general", 5), Some(&acme))
            .await
            .unwrap()
            .unwrap();

        assert!(overlay.retrieve(MemoryLayer::Project, item.id, Some(&globex)).await.is_none());
        assert!(overlay.retrieve(MemoryLayer::Project, item.id, Some(&acme)).await.is_some());
    }

    #[tokio::test]
    async fn audit_log_is_tenant_scoped() {
        let (config, _dir) = test_config();
        let overlay = TenantOverlay::new(&config, None);
        let acme = TenantContext::new("acme", "alice");
        overlay.store("hello".into(), meta("general", 5), Some(&acme)).await.unwrap();

        let events = overlay.recent_audit_events(&acme, 10).await;
        assert!(events.iter().any(|e| e.event_type == "memory.store"));
    }
}
