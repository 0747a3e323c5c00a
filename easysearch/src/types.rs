//! Request and result value types
//!
//! Requests are plain values: built by the caller, consumed once by a
//! [`SearchHelper`](crate::SearchHelper) call.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Text used when the caller supplies no query text
pub const WILDCARD: &str = "*";

/// A document source: field name to JSON value
pub type Document = Map<String, Value>;

/// Term filters: field -> accepted values (OR within a field, AND across fields)
pub type TermFilters = BTreeMap<String, Vec<Value>>;

/// Range filters: field -> op name -> bound
///
/// Op names are kept as strings so that unrecognized ops can be carried
/// and ignored at compile time.
pub type RangeFilters = BTreeMap<String, BTreeMap<String, Value>>;

/// `(index, type)` pair addressing a mapping type inside an index
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IndexCoord {
    pub index: String,
    #[serde(rename = "type")]
    pub doc_type: String,
}

impl IndexCoord {
    pub fn new(index: impl Into<String>, doc_type: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            doc_type: doc_type.into(),
        }
    }

    /// Reject coordinates with a blank index or type
    pub fn validate(&self) -> Result<()> {
        if self.index.trim().is_empty() {
            return Err(Error::MalformedRequest("index name is missing".to_string()));
        }
        if self.doc_type.trim().is_empty() {
            return Err(Error::MalformedRequest(format!(
                "type name is missing for index '{}'",
                self.index
            )));
        }
        Ok(())
    }
}

impl fmt::Display for IndexCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.index, self.doc_type)
    }
}

/// Range comparison operators understood by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RangeOp {
    Gt,
    Gte,
    Lt,
    Lte,
}

impl RangeOp {
    pub const ALL: [RangeOp; 4] = [RangeOp::Gt, RangeOp::Gte, RangeOp::Lt, RangeOp::Lte];

    /// Parse an op name; anything outside gt/gte/lt/lte yields `None`
    pub fn parse(op: &str) -> Option<Self> {
        match op {
            "gt" => Some(RangeOp::Gt),
            "gte" => Some(RangeOp::Gte),
            "lt" => Some(RangeOp::Lt),
            "lte" => Some(RangeOp::Lte),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RangeOp::Gt => "gt",
            RangeOp::Gte => "gte",
            RangeOp::Lt => "lt",
            RangeOp::Lte => "lte",
        }
    }
}

impl fmt::Display for RangeOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_pageno() -> u32 {
    1
}

fn default_pagesize() -> u32 {
    10
}

/// Full-text query with filters and paging
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub coord: IndexCoord,

    /// Free text; empty or blank means "match everything"
    #[serde(default)]
    pub q: Option<String>,

    /// 1-based page number
    #[serde(default = "default_pageno")]
    pub pageno: u32,

    #[serde(default = "default_pagesize")]
    pub pagesize: u32,

    /// Fields searched by the text layer; not checked against the mapping
    #[serde(default)]
    pub match_fields: Vec<String>,

    #[serde(default)]
    pub term_filters: TermFilters,

    #[serde(default)]
    pub range_filters: RangeFilters,
}

impl QueryRequest {
    pub fn new(coord: IndexCoord) -> Self {
        Self {
            coord,
            q: None,
            pageno: default_pageno(),
            pagesize: default_pagesize(),
            match_fields: Vec::new(),
            term_filters: TermFilters::new(),
            range_filters: RangeFilters::new(),
        }
    }

    pub fn with_text(mut self, q: impl Into<String>) -> Self {
        self.q = Some(q.into());
        self
    }

    pub fn with_page(mut self, pageno: u32, pagesize: u32) -> Self {
        self.pageno = pageno;
        self.pagesize = pagesize;
        self
    }

    pub fn with_match_field(mut self, field: impl Into<String>) -> Self {
        let field = field.into();
        if !self.match_fields.contains(&field) {
            self.match_fields.push(field);
        }
        self
    }

    pub fn with_match_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for field in fields {
            self = self.with_match_field(field);
        }
        self
    }

    /// Add accepted values for a field; repeated calls extend the value list
    pub fn with_term_filter<I, V>(mut self, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.term_filters
            .entry(field.into())
            .or_default()
            .extend(values.into_iter().map(Into::into));
        self
    }

    pub fn with_range(
        mut self,
        field: impl Into<String>,
        op: impl Into<String>,
        bound: impl Into<Value>,
    ) -> Self {
        self.range_filters
            .entry(field.into())
            .or_default()
            .insert(op.into(), bound.into());
        self
    }

    /// Text handed to the engine: the caller's text, or `*` when empty/blank
    pub fn effective_text(&self) -> &str {
        match self.q.as_deref().map(str::trim) {
            Some(q) if !q.is_empty() => q,
            _ => WILDCARD,
        }
    }

    pub fn is_wildcard(&self) -> bool {
        self.effective_text() == WILDCARD
    }

    /// Offset of the first hit: `(pageno - 1) * pagesize`
    pub fn offset(&self) -> u64 {
        u64::from(self.pageno.saturating_sub(1)) * u64::from(self.pagesize)
    }

    /// Checks shared by query and aggregation requests
    pub fn validate_target(&self) -> Result<()> {
        self.coord.validate()?;
        if self.match_fields.is_empty() && !self.is_wildcard() {
            return Err(Error::MalformedRequest(
                "match fields are required for non-wildcard text".to_string(),
            ));
        }
        Ok(())
    }

    /// Full validation for paged queries
    pub fn validate(&self) -> Result<()> {
        self.validate_target()?;
        validate_paging(self.pageno, self.pagesize)
    }
}

/// Reject page numbers or sizes below 1
pub fn validate_paging(pageno: u32, pagesize: u32) -> Result<()> {
    if pageno < 1 {
        return Err(Error::MalformedRequest(format!(
            "pageno must be at least 1, got {}",
            pageno
        )));
    }
    if pagesize < 1 {
        return Err(Error::MalformedRequest(format!(
            "pagesize must be at least 1, got {}",
            pagesize
        )));
    }
    Ok(())
}

/// Grouped search: a query plus the fields to group by
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationRequest {
    #[serde(flatten)]
    pub query: QueryRequest,

    /// Grouping fields in caller order
    #[serde(default)]
    pub aggregation_fields: Vec<String>,

    /// One representative per group when true, full hit lists otherwise
    #[serde(default)]
    pub top_only: bool,
}

impl AggregationRequest {
    pub fn new(query: QueryRequest) -> Self {
        Self {
            query,
            aggregation_fields: Vec::new(),
            top_only: false,
        }
    }

    pub fn group_by<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for field in fields {
            let field = field.into();
            if !self.aggregation_fields.contains(&field) {
                self.aggregation_fields.push(field);
            }
        }
        self
    }

    pub fn top_only(mut self, top_only: bool) -> Self {
        self.top_only = top_only;
        self
    }
}

/// A group returned by the aggregation planner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    pub key: Value,
    pub doc_count: u64,
    pub hits: Vec<Document>,
    pub max_score: Option<f64>,
}

/// Result envelope returned to callers
///
/// `pageno`/`pagesize` are present for paged queries and absent for
/// aggregation results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultEnvelope {
    pub total: u64,
    pub list: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pageno: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagesize: Option<u32>,
}

impl ResultEnvelope {
    pub fn page(total: u64, list: Vec<Value>, pageno: u32, pagesize: u32) -> Self {
        Self {
            total,
            list,
            pageno: Some(pageno),
            pagesize: Some(pagesize),
        }
    }

    /// Unpaged envelope whose total is the row count
    pub fn rows(list: Vec<Value>) -> Self {
        Self {
            total: list.len() as u64,
            list,
            pageno: None,
            pagesize: None,
        }
    }
}

/// A document fetched by id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
    pub source: Document,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn coord() -> IndexCoord {
        IndexCoord::new("news", "article")
    }

    #[test]
    fn test_effective_text_wildcard() {
        assert_eq!(QueryRequest::new(coord()).effective_text(), "*");
        assert_eq!(QueryRequest::new(coord()).with_text("").effective_text(), "*");
        assert_eq!(
            QueryRequest::new(coord()).with_text("   \t").effective_text(),
            "*"
        );
        assert_eq!(
            QueryRequest::new(coord())
                .with_text("elasticsearch")
                .effective_text(),
            "elasticsearch"
        );
    }

    #[test]
    fn test_offset() {
        let req = QueryRequest::new(coord()).with_page(2, 10);
        assert_eq!(req.offset(), 10);
        let req = QueryRequest::new(coord()).with_page(1, 25);
        assert_eq!(req.offset(), 0);
    }

    #[test]
    fn test_validate_paging() {
        let req = QueryRequest::new(coord()).with_page(0, 10);
        assert!(matches!(req.validate(), Err(Error::MalformedRequest(_))));

        let req = QueryRequest::new(coord()).with_page(1, 0);
        assert!(matches!(req.validate(), Err(Error::MalformedRequest(_))));

        let req = QueryRequest::new(coord()).with_page(3, 5);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_validate_missing_coord() {
        let req = QueryRequest::new(IndexCoord::new("", "article"));
        assert!(matches!(req.validate(), Err(Error::MalformedRequest(_))));

        let req = QueryRequest::new(IndexCoord::new("news", " "));
        assert!(matches!(req.validate(), Err(Error::MalformedRequest(_))));
    }

    #[test]
    fn test_match_fields_required_for_text() {
        let req = QueryRequest::new(coord()).with_text("rust");
        assert!(matches!(req.validate(), Err(Error::MalformedRequest(_))));

        // Wildcard text may run without match fields
        let req = QueryRequest::new(coord()).with_text("  ");
        assert!(req.validate().is_ok());

        let req = QueryRequest::new(coord())
            .with_text("rust")
            .with_match_field("title");
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_builders_accumulate() {
        let req = QueryRequest::new(coord())
            .with_match_fields(["title", "body", "title"])
            .with_term_filter("lang", ["en"])
            .with_term_filter("lang", ["de"])
            .with_range("price", "gte", 10)
            .with_range("price", "lt", 20);

        assert_eq!(req.match_fields, vec!["title", "body"]);
        assert_eq!(req.term_filters["lang"], vec![json!("en"), json!("de")]);
        assert_eq!(req.range_filters["price"].len(), 2);
    }

    #[test]
    fn test_range_op_parse() {
        for op in RangeOp::ALL {
            assert_eq!(RangeOp::parse(op.as_str()), Some(op));
        }
        assert_eq!(RangeOp::parse("between"), None);
        assert_eq!(RangeOp::parse("GT"), None);
    }

    #[test]
    fn test_request_deserialize_defaults() {
        let req: QueryRequest = serde_json::from_value(json!({
            "coord": {"index": "news", "type": "article"},
            "q": "hello",
            "match_fields": ["title"]
        }))
        .unwrap();
        assert_eq!(req.pageno, 1);
        assert_eq!(req.pagesize, 10);
        assert!(req.term_filters.is_empty());

        let agg: AggregationRequest = serde_json::from_value(json!({
            "coord": {"index": "news", "type": "article"},
            "aggregation_fields": ["category"],
            "top_only": true
        }))
        .unwrap();
        assert!(agg.top_only);
        assert_eq!(agg.aggregation_fields, vec!["category"]);
    }

    #[test]
    fn test_envelope_serialization() {
        let page = ResultEnvelope::page(42, vec![], 2, 10);
        assert_eq!(
            serde_json::to_value(&page).unwrap(),
            json!({"total": 42, "list": [], "pageno": 2, "pagesize": 10})
        );

        let rows = ResultEnvelope::rows(vec![json!({"a": 1})]);
        assert_eq!(
            serde_json::to_value(&rows).unwrap(),
            json!({"total": 1, "list": [{"a": 1}]})
        );
    }
}
