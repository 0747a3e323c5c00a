//! Elasticsearch 1.x Query DSL types
//!
//! These types represent the subset of the 1.x request body the helper
//! emits: `filtered` queries, `bool` filters, terms/top_hits/max aggregations.

use crate::types::IndexCoord;
use crate::transport::{Method, TransportRequest};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Search type sent as the `search_type` parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchType {
    /// Collect global term frequencies before scoring
    DfsQueryThenFetch,
}

impl SearchType {
    pub fn as_param(&self) -> &'static str {
        match self {
            SearchType::DfsQueryThenFetch => "dfs_query_then_fetch",
        }
    }
}

/// ES Query types
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EsQuery {
    /// Match all documents
    MatchAll(MatchAllQuery),

    /// Query string (Lucene syntax) over explicit fields
    QueryString(QueryStringQuery),

    /// Match query (analyzed full-text), field -> text
    Match(BTreeMap<String, Value>),

    /// Bool query
    Bool(BoolQuery),

    /// Scoring query restricted by a non-scoring filter
    Filtered(Box<FilteredQuery>),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MatchAllQuery {}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryStringQuery {
    pub query: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<String>,
    /// Score by the best single field instead of the sum across fields
    pub use_dis_max: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BoolQuery {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub must: Vec<EsQuery>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilteredQuery {
    pub query: EsQuery,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<EsFilter>,
}

/// ES 1.x filter types
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EsFilter {
    Bool(BoolFilter),
    /// Field -> accepted values
    Terms(BTreeMap<String, Vec<Value>>),
    /// Field -> bounds
    Range(BTreeMap<String, RangeBounds>),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BoolFilter {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub must: Vec<EsFilter>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub should: Vec<EsFilter>,
}

impl BoolFilter {
    pub fn is_empty(&self) -> bool {
        self.must.is_empty() && self.should.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RangeBounds {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gt: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gte: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lt: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lte: Option<Value>,
}

impl RangeBounds {
    pub fn is_empty(&self) -> bool {
        self.gt.is_none() && self.gte.is_none() && self.lt.is_none() && self.lte.is_none()
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SortSpec {
    pub order: SortOrder,
}

/// Aggregation with optional sub-aggregations
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EsAggregation {
    #[serde(flatten)]
    pub kind: AggregationKind,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub aggs: BTreeMap<String, EsAggregation>,
}

impl EsAggregation {
    pub fn new(kind: AggregationKind) -> Self {
        Self {
            kind,
            aggs: BTreeMap::new(),
        }
    }

    pub fn with_sub(mut self, name: impl Into<String>, agg: EsAggregation) -> Self {
        self.aggs.insert(name.into(), agg);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationKind {
    Terms(TermsAgg),
    TopHits(TopHitsAgg),
    Max(MaxAgg),
}

/// Terms bucketing over a field or a script
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TermsAgg {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
    pub size: u32,
    /// Metric name -> direction
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub order: BTreeMap<String, SortOrder>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopHitsAgg {
    pub size: u32,
    #[serde(rename = "_source", skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceInclude>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceInclude {
    pub include: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaxAgg {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
}

/// Root search request body
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<u64>,
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<EsQuery>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sort: Vec<BTreeMap<String, SortSpec>>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub aggs: BTreeMap<String, EsAggregation>,
}

/// A search ready to dispatch: target, search type and body
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub coord: IndexCoord,
    pub search_type: Option<SearchType>,
    pub body: SearchBody,
}

impl SearchRequest {
    pub fn to_transport(&self) -> crate::Result<TransportRequest> {
        let mut request = TransportRequest::new(
            Method::Post,
            [
                self.coord.index.as_str(),
                self.coord.doc_type.as_str(),
                "_search",
            ],
        )
        .json(serde_json::to_value(&self.body)?);
        if let Some(search_type) = self.search_type {
            request = request.param("search_type", search_type.as_param());
        }
        Ok(request)
    }
}
