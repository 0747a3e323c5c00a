use super::cache::SchemaCache;
use super::mapping::EsMappingResponse;
use super::types::FieldSet;
use crate::config::SchemaConfig;
use crate::error::{Error, Result};
use crate::metrics;
use crate::transport::{Method, Transport, TransportRequest};
use crate::types::IndexCoord;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

/// Resolves the field set of a mapping type, optionally through a cache
pub struct SchemaResolver {
    transport: Arc<dyn Transport>,
    cache: Option<SchemaCache>,
}

impl SchemaResolver {
    pub fn new(transport: Arc<dyn Transport>, config: &SchemaConfig) -> Self {
        Self {
            transport,
            cache: config
                .cache_enabled
                .then(|| SchemaCache::new(config.cache_ttl())),
        }
    }

    /// Field set of `coord`, or the empty set when it cannot be resolved
    ///
    /// An empty result is not proof that the type has no fields: callers
    /// only use it to drop filters on fields they cannot vouch for.
    pub async fn fields_of(&self, coord: &IndexCoord) -> Arc<FieldSet> {
        match self.try_fields_of(coord).await {
            Ok(fields) => fields,
            Err(e) => {
                warn!(coord = %coord, error = %e, "mapping lookup failed, continuing without field set");
                Arc::new(FieldSet::new())
            }
        }
    }

    /// Field set of `coord`; failures and empty mappings are errors and never cached
    pub async fn try_fields_of(&self, coord: &IndexCoord) -> Result<Arc<FieldSet>> {
        coord.validate()?;

        if let Some(cache) = &self.cache {
            if let Some(fields) = cache.get(coord) {
                metrics::record_schema_cache(true);
                return Ok(fields);
            }
            metrics::record_schema_cache(false);
        }

        let generation = self.cache.as_ref().map(SchemaCache::generation);
        let unavailable = |reason: String| Error::SchemaUnavailable {
            coord: coord.clone(),
            reason,
        };

        let response = self
            .fetch_mapping(coord)
            .await
            .map_err(|e| unavailable(e.to_string()))?;
        let fields = response
            .field_set(coord)
            .filter(|fields| !fields.is_empty())
            .ok_or_else(|| unavailable("mapping has no properties".to_string()))?;
        debug!(coord = %coord, fields = fields.len(), "resolved field set");

        let fields = Arc::new(fields);
        if let (Some(cache), Some(generation)) = (&self.cache, generation) {
            cache.insert(coord.clone(), Arc::clone(&fields), generation);
        }
        Ok(fields)
    }

    /// `GET /{index}/_mapping/{type}`
    pub async fn fetch_mapping(&self, coord: &IndexCoord) -> Result<EsMappingResponse> {
        let request = TransportRequest::new(
            Method::Get,
            [coord.index.as_str(), "_mapping", coord.doc_type.as_str()],
        );
        let body = self.transport.send(request).await?.into_success()?;
        Ok(serde_json::from_value(body)?)
    }

    /// Raw `properties` of `coord`; empty when the type has no mapping
    pub async fn fetch_properties(&self, coord: &IndexCoord) -> Result<Map<String, Value>> {
        coord.validate()?;
        Ok(self
            .fetch_mapping(coord)
            .await?
            .properties(coord)
            .cloned()
            .unwrap_or_default())
    }

    pub fn invalidate(&self, coord: &IndexCoord) {
        if let Some(cache) = &self.cache {
            cache.invalidate(coord);
        }
    }

    pub fn invalidate_index(&self, index: &str) {
        if let Some(cache) = &self.cache {
            cache.invalidate_index(index);
        }
    }

    pub fn invalidate_all(&self) {
        if let Some(cache) = &self.cache {
            cache.invalidate_all();
        }
    }

    pub fn cache(&self) -> Option<&SchemaCache> {
        self.cache.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TransportResponse;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Answers every request with the same reply and counts calls
    struct FixedTransport {
        status: u16,
        body: Value,
        calls: AtomicUsize,
    }

    impl FixedTransport {
        fn new(status: u16, body: Value) -> Arc<Self> {
            Arc::new(Self {
                status,
                body,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Transport for FixedTransport {
        async fn send(&self, _request: TransportRequest) -> Result<crate::transport::TransportResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(TransportResponse {
                status: self.status,
                body: self.body.clone(),
            })
        }

        fn describe(&self) -> String {
            "fixed".to_string()
        }
    }

    fn cached() -> SchemaConfig {
        SchemaConfig::default()
    }

    fn uncached() -> SchemaConfig {
        SchemaConfig {
            cache_enabled: false,
            ..SchemaConfig::default()
        }
    }

    fn mapping_body() -> Value {
        json!({"news": {"mappings": {"article": {"properties": {
            "title": {"type": "string"},
            "lang": {"type": "string", "index": "not_analyzed"}
        }}}}})
    }

    #[tokio::test]
    async fn test_fields_of_caches() {
        let transport = FixedTransport::new(200, mapping_body());
        let resolver = SchemaResolver::new(transport.clone(), &cached());
        let coord = IndexCoord::new("news", "article");

        let first = resolver.fields_of(&coord).await;
        let second = resolver.fields_of(&coord).await;
        assert_eq!(first.len(), 2);
        assert_eq!(first, second);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);

        resolver.invalidate(&coord);
        resolver.fields_of(&coord).await;
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_expired_entry_is_refetched() {
        let transport = FixedTransport::new(200, mapping_body());
        let config = SchemaConfig {
            cache_ttl_secs: 0,
            ..SchemaConfig::default()
        };
        let resolver = SchemaResolver::new(transport.clone(), &config);
        let coord = IndexCoord::new("news", "article");

        resolver.fields_of(&coord).await;
        resolver.fields_of(&coord).await;
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cache_disabled_fetches_every_time() {
        let transport = FixedTransport::new(200, mapping_body());
        let resolver = SchemaResolver::new(transport.clone(), &uncached());
        let coord = IndexCoord::new("news", "article");

        resolver.fields_of(&coord).await;
        resolver.fields_of(&coord).await;
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
        assert!(resolver.cache().is_none());
    }

    #[tokio::test]
    async fn test_missing_index_degrades_to_empty() {
        let transport = FixedTransport::new(
            404,
            json!({"error": "IndexMissingException[[news] missing]", "status": 404}),
        );
        let resolver = SchemaResolver::new(transport.clone(), &cached());
        let coord = IndexCoord::new("news", "article");

        assert!(resolver.fields_of(&coord).await.is_empty());
        assert!(matches!(
            resolver.try_fields_of(&coord).await,
            Err(Error::SchemaUnavailable { .. })
        ));
        // Failures are not cached
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
        assert!(resolver.cache().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_mapping_is_unavailable() {
        let transport = FixedTransport::new(200, json!({}));
        let resolver = SchemaResolver::new(transport, &cached());
        let coord = IndexCoord::new("news", "article");

        assert!(matches!(
            resolver.try_fields_of(&coord).await,
            Err(Error::SchemaUnavailable { .. })
        ));
        assert!(resolver.fetch_properties(&coord).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_blank_coord_never_reaches_transport() {
        let transport = FixedTransport::new(200, mapping_body());
        let resolver = SchemaResolver::new(transport.clone(), &cached());

        assert!(resolver
            .fields_of(&IndexCoord::new("", "article"))
            .await
            .is_empty());
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }
}
