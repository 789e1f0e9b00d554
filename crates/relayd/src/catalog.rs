//! Entity catalog - copy-on-write snapshot of entities exposed to the
//! assistant.
//!
//! Readers always get the last fully-built snapshot; a refresh builds the
//! replacement off to the side and publishes it with a single swap. A failed
//! refresh leaves the previous snapshot in place; a partial catalog is never
//! published. Refreshes are serialized so at most one rebuild is in flight.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

use relay_common::types::{CatalogEntity, EntityDomain};
use relay_common::RelayError;

/// Source of exposed entities. Production uses the host platform's HTTP
/// endpoint; tests use an in-memory fake.
#[async_trait]
pub trait EntitySource: Send + Sync {
    async fn list_exposed_entities(&self) -> Result<Vec<CatalogEntity>, RelayError>;
}

/// One consistent view of the exposed entities.
#[derive(Debug, Clone)]
pub struct CatalogSnapshot {
    pub entities: Vec<CatalogEntity>,
    pub built_at: DateTime<Utc>,
}

impl CatalogSnapshot {
    /// Placeholder used before the first successful refresh.
    pub fn empty() -> Self {
        Self {
            entities: Vec::new(),
            built_at: DateTime::<Utc>::MIN_UTC,
        }
    }

    /// Whether this snapshot has ever been built from the source.
    pub fn is_initialized(&self) -> bool {
        self.built_at > DateTime::<Utc>::MIN_UTC
    }
}

/// Queryable, periodically-refreshed catalog of exposed entities.
pub struct EntityCatalog {
    source: Arc<dyn EntitySource>,
    snapshot: RwLock<Arc<CatalogSnapshot>>,
    refresh_gate: Mutex<()>,
}

impl EntityCatalog {
    pub fn new(source: Arc<dyn EntitySource>) -> Self {
        Self {
            source,
            snapshot: RwLock::new(Arc::new(CatalogSnapshot::empty())),
            refresh_gate: Mutex::new(()),
        }
    }

    /// The latest published snapshot. Never blocks on a refresh in
    /// progress.
    pub async fn current(&self) -> Arc<CatalogSnapshot> {
        Arc::clone(&*self.snapshot.read().await)
    }

    /// Rebuild the snapshot from the source and publish it atomically.
    ///
    /// Returns the entity count on success. On failure the previous
    /// snapshot stays in place and the error is reported as recoverable.
    pub async fn refresh(&self) -> Result<usize, RelayError> {
        let _gate = self.refresh_gate.lock().await;

        let entities = self.source.list_exposed_entities().await?;
        let count = entities.len();

        let snapshot = Arc::new(CatalogSnapshot {
            entities,
            built_at: Utc::now(),
        });
        *self.snapshot.write().await = snapshot;

        debug!("entity catalog rebuilt: {} entities", count);
        Ok(count)
    }
}

/// Raw record as reported by the entity source. Entities in unknown domains
/// are skipped at build time instead of failing the whole refresh.
#[derive(Debug, Deserialize)]
struct RawEntity {
    id: String,
    domain: String,
    friendly_name: String,
    #[serde(default)]
    aliases: Vec<String>,
    #[serde(default)]
    area: Option<String>,
}

/// HTTP entity source: GETs a JSON array of exposed entities from the host
/// platform.
pub struct HttpEntitySource {
    client: reqwest::Client,
    url: String,
}

impl HttpEntitySource {
    pub fn new(url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.to_string(),
        }
    }
}

#[async_trait]
impl EntitySource for HttpEntitySource {
    async fn list_exposed_entities(&self) -> Result<Vec<CatalogEntity>, RelayError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| RelayError::CatalogUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(RelayError::CatalogUnavailable(format!(
                "entity source returned {}",
                response.status()
            )));
        }

        let raw: Vec<RawEntity> = response
            .json()
            .await
            .map_err(|e| RelayError::CatalogUnavailable(e.to_string()))?;

        let entities = raw
            .into_iter()
            .filter_map(|r| match EntityDomain::from_str(&r.domain) {
                Some(domain) => Some(CatalogEntity {
                    id: r.id,
                    domain,
                    friendly_name: r.friendly_name,
                    aliases: r.aliases,
                    area: r.area,
                }),
                None => {
                    warn!("skipping entity {} in uncontrollable domain {}", r.id, r.domain);
                    None
                }
            })
            .collect();

        Ok(entities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct FlakySource {
        entities: Vec<CatalogEntity>,
        fail: AtomicBool,
    }

    #[async_trait]
    impl EntitySource for FlakySource {
        async fn list_exposed_entities(&self) -> Result<Vec<CatalogEntity>, RelayError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(RelayError::CatalogUnavailable("source down".to_string()));
            }
            Ok(self.entities.clone())
        }
    }

    fn light(id: &str, name: &str) -> CatalogEntity {
        CatalogEntity {
            id: id.to_string(),
            domain: EntityDomain::Light,
            friendly_name: name.to_string(),
            aliases: Vec::new(),
            area: None,
        }
    }

    #[tokio::test]
    async fn test_refresh_publishes_snapshot() {
        let source = Arc::new(FlakySource {
            entities: vec![light("light.a", "A"), light("light.b", "B")],
            fail: AtomicBool::new(false),
        });
        let catalog = EntityCatalog::new(source);

        assert!(!catalog.current().await.is_initialized());
        let count = catalog.refresh().await.unwrap();
        assert_eq!(count, 2);

        let snapshot = catalog.current().await;
        assert!(snapshot.is_initialized());
        assert_eq!(snapshot.entities.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_snapshot() {
        let source = Arc::new(FlakySource {
            entities: vec![light("light.a", "A")],
            fail: AtomicBool::new(false),
        });
        let catalog = EntityCatalog::new(source.clone());

        catalog.refresh().await.unwrap();
        let before = catalog.current().await;

        source.fail.store(true, Ordering::SeqCst);
        let err = catalog.refresh().await.unwrap_err();
        assert!(matches!(err, RelayError::CatalogUnavailable(_)));

        let after = catalog.current().await;
        assert_eq!(after.entities.len(), 1);
        assert_eq!(after.built_at, before.built_at);
    }

    #[tokio::test]
    async fn test_readers_see_old_snapshot_until_swap() {
        let source = Arc::new(FlakySource {
            entities: vec![light("light.a", "A")],
            fail: AtomicBool::new(false),
        });
        let catalog = EntityCatalog::new(source);
        catalog.refresh().await.unwrap();

        let held = catalog.current().await;
        catalog.refresh().await.unwrap();

        // The clone taken before the second refresh is still the old,
        // consistent snapshot; the catalog already serves the new one.
        assert!(held.built_at < catalog.current().await.built_at);
    }
}
