//! Index, mapping and single-document operations

use crate::error::{Error, Result};
use crate::helper::SearchHelper;
use crate::metrics::RequestTimer;
use crate::schema::{build_mapping, parse_properties, FieldDescriptor};
use crate::transport::{Method, TransportRequest, TransportResponse};
use crate::types::{Document, IndexCoord, StoredDocument};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use tracing::{debug, error, info, warn};

/// index -> type -> properties
pub type MappingTree = BTreeMap<String, BTreeMap<String, Map<String, Value>>>;

#[derive(Debug, Deserialize)]
struct GetResponse {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_version", default)]
    version: Option<u64>,
    #[serde(default)]
    found: bool,
    #[serde(rename = "_source", default)]
    source: Option<Document>,
}

#[derive(Debug, Default, Deserialize)]
struct AllMappingsIndex {
    #[serde(default)]
    mappings: BTreeMap<String, AllMappingsType>,
}

#[derive(Debug, Default, Deserialize)]
struct AllMappingsType {
    #[serde(default)]
    properties: Map<String, Value>,
}

pub(crate) fn validate_index(index: &str) -> Result<()> {
    if index.trim().is_empty() {
        return Err(Error::MalformedRequest("index name is missing".to_string()));
    }
    Ok(())
}

fn validate_id(id: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(Error::MalformedRequest("document id is missing".to_string()));
    }
    Ok(())
}

impl SearchHelper {
    /// Send and time one request; the raw response is returned whatever its status
    pub(crate) async fn send_timed(
        &self,
        operation: &'static str,
        request: TransportRequest,
    ) -> Result<TransportResponse> {
        let timer = RequestTimer::new(operation);
        timer.finish(self.transport.send(request).await)
    }

    /// Send and time one request, failing on a non-2xx reply
    pub(crate) async fn send_ok(
        &self,
        operation: &'static str,
        request: TransportRequest,
    ) -> Result<Value> {
        let timer = RequestTimer::new(operation);
        let result = match self.transport.send(request).await {
            Ok(response) => response.into_success(),
            Err(e) => Err(e),
        };
        timer.finish(result)
    }

    pub async fn create_index(&self, index: &str) -> Result<()> {
        validate_index(index)?;
        info!(index, "creating index");
        self.send_ok("create_index", TransportRequest::new(Method::Put, [index]))
            .await?;
        Ok(())
    }

    pub async fn exists_index(&self, index: &str) -> Result<bool> {
        validate_index(index)?;
        let response = self
            .send_timed("exists_index", TransportRequest::new(Method::Head, [index]))
            .await?;
        match response.status {
            404 => Ok(false),
            _ => response.into_success().map(|_| true),
        }
    }

    pub async fn drop_index(&self, index: &str) -> Result<()> {
        validate_index(index)?;
        info!(index, "dropping index");
        self.send_ok("drop_index", TransportRequest::new(Method::Delete, [index]))
            .await?;
        self.resolver.invalidate_index(index);
        Ok(())
    }

    /// Delete every document of `index`, keeping its mappings
    pub async fn clear_index(&self, index: &str) -> Result<()> {
        validate_index(index)?;
        info!(index, "clearing index");
        let request = TransportRequest::new(Method::Delete, [index, "_query"])
            .json(json!({"query": {"match_all": {}}}));
        self.send_ok("clear_index", request).await?;
        self.resolver.invalidate_index(index);
        Ok(())
    }

    /// Put the mapping of `coord`
    ///
    /// An invalid descriptor is logged and nothing is sent.
    pub async fn create_mapping(
        &self,
        coord: &IndexCoord,
        fields: &BTreeMap<String, FieldDescriptor>,
    ) -> Result<()> {
        coord.validate()?;
        let body = match build_mapping(&coord.doc_type, fields) {
            Ok(body) => body,
            Err(e) => {
                error!(coord = %coord, error = %e, "cannot build mapping, nothing sent");
                return Ok(());
            }
        };

        info!(coord = %coord, fields = fields.len(), "creating mapping");
        let request = TransportRequest::new(
            Method::Put,
            [coord.index.as_str(), "_mapping", coord.doc_type.as_str()],
        )
        .json(body);
        self.send_ok("create_mapping", request).await?;
        self.resolver.invalidate(coord);
        Ok(())
    }

    /// Raw `properties` of `coord`; empty when the type has no mapping
    pub async fn get_mapping(&self, coord: &IndexCoord) -> Result<Map<String, Value>> {
        let timer = RequestTimer::new("get_mapping");
        timer.finish(self.resolver.fetch_properties(coord).await)
    }

    /// Typed descriptors of `coord`
    pub async fn get_field_descriptors(
        &self,
        coord: &IndexCoord,
    ) -> Result<BTreeMap<String, FieldDescriptor>> {
        Ok(parse_properties(&self.get_mapping(coord).await?))
    }

    /// Properties of every index and type, hiding names with the configured marker
    ///
    /// Failures are logged and yield an empty tree.
    pub async fn all_mappings(&self) -> MappingTree {
        match self.try_all_mappings().await {
            Ok(tree) => tree,
            Err(e) => {
                warn!(error = %e, "cannot list mappings");
                MappingTree::new()
            }
        }
    }

    async fn try_all_mappings(&self) -> Result<MappingTree> {
        let body = self
            .send_ok("all_mappings", TransportRequest::new(Method::Get, ["_mapping"]))
            .await?;
        let indices: BTreeMap<String, AllMappingsIndex> = serde_json::from_value(body)?;
        let marker = self.config.schema.hidden_marker.as_str();
        let hidden = |name: &str| !marker.is_empty() && name.contains(marker);

        Ok(indices
            .into_iter()
            .filter(|(index, _)| !hidden(index))
            .map(|(index, mapping)| {
                let types = mapping
                    .mappings
                    .into_iter()
                    .filter(|(doc_type, _)| !hidden(doc_type))
                    .map(|(doc_type, t)| (doc_type, t.properties))
                    .collect();
                (index, types)
            })
            .collect())
    }

    pub async fn delete_mapping(&self, coord: &IndexCoord) -> Result<()> {
        coord.validate()?;
        info!(coord = %coord, "deleting mapping");
        let request = TransportRequest::new(
            Method::Delete,
            [coord.index.as_str(), "_mapping", coord.doc_type.as_str()],
        );
        self.send_ok("delete_mapping", request).await?;
        self.resolver.invalidate(coord);
        Ok(())
    }

    /// Fetch a document by id; `None` when it does not exist
    pub async fn get(&self, coord: &IndexCoord, id: &str) -> Result<Option<StoredDocument>> {
        coord.validate()?;
        validate_id(id)?;
        let request = TransportRequest::new(
            Method::Get,
            [coord.index.as_str(), coord.doc_type.as_str(), id],
        );
        let response = self.send_timed("get", request).await?;

        let missing_doc = response.status == 404
            && response.body.get("found").and_then(Value::as_bool) == Some(false);
        if missing_doc {
            debug!(coord = %coord, id, "document not found");
            return Ok(None);
        }

        let found: GetResponse = serde_json::from_value(response.into_success()?)?;
        if !found.found {
            return Ok(None);
        }
        Ok(Some(StoredDocument {
            id: found.id,
            version: found.version,
            source: found.source.unwrap_or_default(),
        }))
    }

    /// Index one document with write consistency `one`
    ///
    /// The cached field set of `coord` is dropped afterwards, since the
    /// engine may have extended the mapping with new fields.
    pub async fn index_one(&self, coord: &IndexCoord, id: &str, doc: &Document) -> Result<()> {
        coord.validate()?;
        validate_id(id)?;
        let request = TransportRequest::new(
            Method::Put,
            [coord.index.as_str(), coord.doc_type.as_str(), id],
        )
        .param("consistency", "one")
        .json(Value::Object(doc.clone()));
        let sent = self.send_ok("index_one", request).await;
        // dynamic mapping may have added fields
        self.resolver.invalidate(coord);
        sent?;
        debug!(coord = %coord, id, "document indexed");
        Ok(())
    }
}
