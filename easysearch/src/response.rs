//! Engine search responses and result shaping

use crate::query::types::SearchBody;
use crate::types::{Bucket, Document, ResultEnvelope};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashSet;
use tracing::debug;

/// ES search response, the parts the helper reads
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EsSearchResponse {
    #[serde(default)]
    pub took: u64,
    #[serde(default)]
    pub timed_out: bool,
    #[serde(default)]
    pub hits: HitsResponse,
    #[serde(default)]
    pub aggregations: Option<EsAggregations>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HitsResponse {
    #[serde(default)]
    pub total: TotalHits,
    #[serde(default)]
    pub max_score: Option<f64>,
    #[serde(default)]
    pub hits: Vec<Hit>,
}

/// Hit count: a bare number on 1.x, `{value, relation}` on later engines
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TotalHits {
    Count(u64),
    Object { value: u64 },
}

impl Default for TotalHits {
    fn default() -> Self {
        TotalHits::Count(0)
    }
}

impl TotalHits {
    pub fn value(&self) -> u64 {
        match self {
            TotalHits::Count(n) => *n,
            TotalHits::Object { value } => *value,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Hit {
    #[serde(rename = "_index", default)]
    pub index: String,
    #[serde(rename = "_id", default)]
    pub id: String,
    #[serde(rename = "_score", default)]
    pub score: Option<f64>,
    #[serde(rename = "_source", default)]
    pub source: Option<Document>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EsAggregations {
    #[serde(rename = "top-tags", default)]
    pub top_tags: Option<TermsResult>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TermsResult {
    #[serde(default)]
    pub buckets: Vec<EsBucket>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EsBucket {
    pub key: Value,
    #[serde(default)]
    pub doc_count: u64,
    #[serde(rename = "top-tags-record", default)]
    pub top_hits: Option<TopHitsResult>,
    #[serde(rename = "max_score", default)]
    pub max_score: Option<ValueResult>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TopHitsResult {
    #[serde(default)]
    pub hits: HitsResponse,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ValueResult {
    pub value: Option<f64>,
}

/// Turns engine responses into result envelopes
pub struct ResultShaper;

impl ResultShaper {
    /// Hit sources in engine order; hits without a source become empty maps
    pub fn sources(hits: &[Hit]) -> Vec<Value> {
        hits.iter()
            .map(|hit| Value::Object(hit.source.clone().unwrap_or_default()))
            .collect()
    }

    /// Paged envelope: `total` is the engine count, not the page length
    pub fn page(response: &EsSearchResponse, pageno: u32, pagesize: u32) -> ResultEnvelope {
        ResultEnvelope::page(
            response.hits.total.value(),
            Self::sources(&response.hits.hits),
            pageno,
            pagesize,
        )
    }

    /// Buckets of the outer terms aggregation, in engine order
    pub fn buckets(response: &EsSearchResponse) -> Vec<Bucket> {
        let Some(terms) = response
            .aggregations
            .as_ref()
            .and_then(|aggs| aggs.top_tags.as_ref())
        else {
            return Vec::new();
        };

        terms
            .buckets
            .iter()
            .map(|bucket| Bucket {
                key: bucket.key.clone(),
                doc_count: bucket.doc_count,
                hits: bucket
                    .top_hits
                    .as_ref()
                    .map(|top| {
                        top.hits
                            .hits
                            .iter()
                            .map(|hit| hit.source.clone().unwrap_or_default())
                            .collect()
                    })
                    .unwrap_or_default(),
                max_score: bucket.max_score.as_ref().and_then(|m| m.value),
            })
            .collect()
    }

    /// Rows before deduplication
    ///
    /// Top-only: every bucket's hits, flattened. Otherwise one
    /// `{key_name: key, "hits": [...]}` row per bucket.
    pub fn group_rows(buckets: Vec<Bucket>, top_only: bool, key_name: &str) -> Vec<Value> {
        if top_only {
            return buckets
                .into_iter()
                .flat_map(|bucket| bucket.hits.into_iter().map(Value::Object))
                .collect();
        }

        buckets
            .into_iter()
            .map(|bucket| {
                let mut row = Map::new();
                row.insert(key_name.to_string(), bucket.key);
                row.insert(
                    "hits".to_string(),
                    Value::Array(bucket.hits.into_iter().map(Value::Object).collect()),
                );
                Value::Object(row)
            })
            .collect()
    }

    /// Drop rows whose canonical rendering was already seen; first one wins
    pub fn dedup(rows: Vec<Value>) -> Vec<Value> {
        let mut seen = HashSet::new();
        rows.into_iter()
            .filter(|row| !row.is_null())
            .filter(|row| seen.insert(canonical_json(row)))
            .collect()
    }

    /// Aggregation envelope: grouped, deduplicated, `total` = row count
    pub fn aggregation(response: &EsSearchResponse, top_only: bool, key_name: &str) -> ResultEnvelope {
        let buckets = Self::buckets(response);
        debug!(
            buckets = buckets.len(),
            documents = buckets.iter().map(|b| b.doc_count).sum::<u64>(),
            "grouping buckets"
        );
        let rows = Self::group_rows(buckets, top_only, key_name);
        ResultEnvelope::rows(Self::dedup(rows))
    }
}

/// JSON rendering with object keys sorted at every depth
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// Sizes of a body for debug logs
pub(crate) fn describe_body(body: &SearchBody) -> String {
    format!(
        "from={:?} size={} aggs={}",
        body.from,
        body.size,
        body.aggs.len()
    )
}
