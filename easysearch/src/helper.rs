//! Search helper: query, aggregation and match entry points

use crate::config::Config;
use crate::error::{Error, Result};
use crate::metrics::RequestTimer;
use crate::query::{
    match_query, AggregationPlanner, PredicateCompiler, SearchBody, SearchRequest, SearchType,
    SortOrder, SortSpec,
};
use crate::response::{describe_body, EsSearchResponse, ResultShaper};
use crate::schema::SchemaResolver;
use crate::transport::{HttpTransport, Method, Transport, TransportRequest};
use crate::types::{validate_paging, AggregationRequest, IndexCoord, QueryRequest, ResultEnvelope};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Helper over one cluster
///
/// Cheap to clone; clones share the transport and the schema cache.
#[derive(Clone)]
pub struct SearchHelper {
    pub(crate) config: Arc<Config>,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) resolver: Arc<SchemaResolver>,
}

impl SearchHelper {
    /// Helper over HTTP to every node in `config`
    pub fn new(config: Config) -> Result<Self> {
        let transport = Arc::new(HttpTransport::new(&config)?);
        Ok(Self::with_transport(config, transport))
    }

    /// Helper over a caller-supplied transport
    pub fn with_transport(config: Config, transport: Arc<dyn Transport>) -> Self {
        let resolver = SchemaResolver::new(Arc::clone(&transport), &config.schema);
        info!(
            cluster = %config.cluster_name,
            nodes = %transport.describe(),
            "search helper ready"
        );
        Self {
            config: Arc::new(config),
            transport,
            resolver: Arc::new(resolver),
        }
    }

    pub fn connect_single(cluster_name: impl Into<String>, host: &str, port: u16) -> Result<Self> {
        Self::new(Config::single(cluster_name, host, port))
    }

    /// Helper over `host:port` nodes
    pub fn connect_nodes<I, S>(cluster_name: impl Into<String>, nodes: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(Config::with_nodes(cluster_name, nodes))
    }

    pub fn cluster_name(&self) -> &str {
        &self.config.cluster_name
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn resolver(&self) -> &SchemaResolver {
        &self.resolver
    }

    /// Check that the nodes belong to the configured cluster
    ///
    /// A blank configured name accepts any cluster.
    pub async fn verify_cluster(&self) -> Result<()> {
        let expected = self.config.cluster_name.trim();
        let body = self
            .transport
            .send(TransportRequest::new(Method::Get, Vec::<String>::new()))
            .await?
            .into_success()?;

        let reported = body.get("cluster_name").and_then(Value::as_str).unwrap_or("");
        if expected.is_empty() || reported == expected {
            debug!(cluster = reported, "cluster verified");
            Ok(())
        } else {
            Err(Error::Config(format!(
                "nodes report cluster '{}', expected '{}'",
                reported, expected
            )))
        }
    }

    /// Paged full-text query with filters
    ///
    /// `total` is the engine's match count, `list` the page of sources.
    pub async fn query(&self, request: &QueryRequest) -> Result<ResultEnvelope> {
        let timer = RequestTimer::new("query");
        timer.finish(self.run_query(request).await)
    }

    async fn run_query(&self, request: &QueryRequest) -> Result<ResultEnvelope> {
        request.validate()?;
        info!(
            coord = %request.coord,
            q = request.effective_text(),
            pageno = request.pageno,
            pagesize = request.pagesize,
            "query"
        );

        let fields = self.resolver.fields_of(&request.coord).await;
        let query = PredicateCompiler::new(&fields, self.config.query.range_join).compile(request);

        let response = self
            .search(SearchRequest {
                coord: request.coord.clone(),
                search_type: Some(SearchType::DfsQueryThenFetch),
                body: SearchBody {
                    from: Some(request.offset()),
                    size: u64::from(request.pagesize),
                    query: Some(query),
                    sort: Vec::new(),
                    aggs: BTreeMap::new(),
                },
            })
            .await?;

        Ok(ResultShaper::page(&response, request.pageno, request.pagesize))
    }

    /// Grouped search returning representative documents per group
    ///
    /// Paging fields of the inner query are ignored.
    pub async fn aggregate(&self, request: &AggregationRequest) -> Result<ResultEnvelope> {
        let timer = RequestTimer::new("aggregate");
        timer.finish(self.run_aggregate(request).await)
    }

    async fn run_aggregate(&self, request: &AggregationRequest) -> Result<ResultEnvelope> {
        let query = &request.query;
        query.validate_target()?;
        info!(
            coord = %query.coord,
            q = query.effective_text(),
            group_by = ?request.aggregation_fields,
            top_only = request.top_only,
            "aggregate"
        );

        let fields = self.resolver.fields_of(&query.coord).await;
        let compiled = PredicateCompiler::new(&fields, self.config.query.range_join).compile(query);

        let Some(plan) = AggregationPlanner::new(&self.config.query).plan(compiled, request, &fields)
        else {
            warn!(
                coord = %query.coord,
                group_by = ?request.aggregation_fields,
                "no aggregation field is in the mapping, returning no groups"
            );
            return Ok(ResultEnvelope::rows(Vec::new()));
        };

        let response = self
            .search(SearchRequest {
                coord: query.coord.clone(),
                search_type: Some(SearchType::DfsQueryThenFetch),
                body: plan.body,
            })
            .await?;

        let envelope = ResultShaper::aggregation(&response, request.top_only, &plan.key_name);
        debug!(key = %plan.key_name, rows = envelope.total, "aggregation shaped");
        Ok(envelope)
    }

    /// Conjunction of `match` queries, newest first by the configured sort field
    pub async fn match_query(
        &self,
        coord: &IndexCoord,
        pageno: u32,
        pagesize: u32,
        params: &BTreeMap<String, Value>,
    ) -> Result<ResultEnvelope> {
        let timer = RequestTimer::new("match");
        timer.finish(self.run_match(coord, pageno, pagesize, params).await)
    }

    async fn run_match(
        &self,
        coord: &IndexCoord,
        pageno: u32,
        pagesize: u32,
        params: &BTreeMap<String, Value>,
    ) -> Result<ResultEnvelope> {
        coord.validate()?;
        validate_paging(pageno, pagesize)?;
        info!(coord = %coord, params = params.len(), pageno, pagesize, "match");

        let mut sort = BTreeMap::new();
        sort.insert(
            self.config.query.match_sort_field.clone(),
            SortSpec {
                order: SortOrder::Desc,
            },
        );

        let response = self
            .search(SearchRequest {
                coord: coord.clone(),
                search_type: None,
                body: SearchBody {
                    from: Some(u64::from(pageno - 1) * u64::from(pagesize)),
                    size: u64::from(pagesize),
                    query: Some(match_query(params)),
                    sort: vec![sort],
                    aggs: BTreeMap::new(),
                },
            })
            .await?;

        Ok(ResultShaper::page(&response, pageno, pagesize))
    }

    async fn search(&self, request: SearchRequest) -> Result<EsSearchResponse> {
        debug!(coord = %request.coord, body = %describe_body(&request.body), "dispatching search");
        let body = self
            .transport
            .send(request.to_transport()?)
            .await?
            .into_success()?;
        Ok(serde_json::from_value(body)?)
    }
}
