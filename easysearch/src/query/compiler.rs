//! Predicate compiler: caller request -> filtered query tree

use crate::config::RangeJoin;
use crate::query::types::*;
use crate::schema::FieldSet;
use crate::types::{QueryRequest, RangeFilters, RangeOp, TermFilters};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

/// Compiles query requests against a known field set
///
/// Term and range clauses naming fields outside the set are dropped.
/// Match fields are passed through unchecked.
pub struct PredicateCompiler<'a> {
    fields: &'a FieldSet,
    range_join: RangeJoin,
}

impl<'a> PredicateCompiler<'a> {
    pub fn new(fields: &'a FieldSet, range_join: RangeJoin) -> Self {
        Self { fields, range_join }
    }

    /// Text layer wrapped in a `filtered` query, with the filter layer when
    /// any clause survives
    pub fn compile(&self, request: &QueryRequest) -> EsQuery {
        EsQuery::Filtered(Box::new(FilteredQuery {
            query: Self::text_layer(request),
            filter: self.filter_layer(&request.term_filters, &request.range_filters),
        }))
    }

    /// Query string over the match fields with dis-max scoring
    pub fn text_layer(request: &QueryRequest) -> EsQuery {
        EsQuery::QueryString(QueryStringQuery {
            query: request.effective_text().to_string(),
            fields: request.match_fields.clone(),
            use_dis_max: true,
        })
    }

    /// Bool filter combining terms (must) and ranges (should, or must per config)
    ///
    /// Returns `None` when no clause survives validation.
    pub fn filter_layer(&self, terms: &TermFilters, ranges: &RangeFilters) -> Option<EsFilter> {
        let mut filter = BoolFilter::default();

        for (field, values) in terms {
            if !self.fields.contains(field) {
                debug!(field = %field, "dropping term filter on unknown field");
                continue;
            }
            let mut clause = BTreeMap::new();
            clause.insert(field.clone(), values.clone());
            filter.must.push(EsFilter::Terms(clause));
        }

        for (field, ops) in ranges {
            if !self.fields.contains(field) {
                debug!(field = %field, "dropping range filter on unknown field");
                continue;
            }
            let Some(bounds) = range_bounds(ops) else {
                continue;
            };
            let mut clause = BTreeMap::new();
            clause.insert(field.clone(), bounds);
            let range = EsFilter::Range(clause);
            match self.range_join {
                RangeJoin::Should => filter.should.push(range),
                RangeJoin::Must => filter.must.push(range),
            }
        }

        if filter.is_empty() {
            None
        } else {
            Some(EsFilter::Bool(filter))
        }
    }
}

/// Recognized op -> bound pairs; `None` when nothing is left
fn range_bounds(ops: &BTreeMap<String, Value>) -> Option<RangeBounds> {
    let mut bounds = RangeBounds::default();
    for (op, bound) in ops {
        match RangeOp::parse(op) {
            Some(RangeOp::Gt) => bounds.gt = Some(bound.clone()),
            Some(RangeOp::Gte) => bounds.gte = Some(bound.clone()),
            Some(RangeOp::Lt) => bounds.lt = Some(bound.clone()),
            Some(RangeOp::Lte) => bounds.lte = Some(bound.clone()),
            None => debug!(op = %op, "ignoring unknown range op"),
        }
    }
    if bounds.is_empty() {
        None
    } else {
        Some(bounds)
    }
}

/// `bool.must` of one `match` per parameter with a non-empty key and a non-null value
pub fn match_query(params: &BTreeMap<String, Value>) -> EsQuery {
    let must = params
        .iter()
        .filter(|(key, value)| !key.trim().is_empty() && !value.is_null())
        .map(|(key, value)| {
            let mut clause = BTreeMap::new();
            clause.insert(key.clone(), value.clone());
            EsQuery::Match(clause)
        })
        .collect();

    EsQuery::Bool(BoolQuery { must })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::IndexCoord;
    use serde_json::json;

    fn schema() -> FieldSet {
        ["title", "body", "lang", "createat", "price"]
            .into_iter()
            .map(String::from)
            .collect()
    }

    fn e1() -> QueryRequest {
        QueryRequest::new(IndexCoord::new("news", "article"))
            .with_text("elasticsearch")
            .with_match_fields(["title", "body"])
            .with_page(2, 10)
            .with_term_filter("lang", ["en", "de"])
    }

    #[test]
    fn test_e1_query_shape() {
        let fields = schema();
        let query = PredicateCompiler::new(&fields, RangeJoin::Should).compile(&e1());

        assert_eq!(
            serde_json::to_value(&query).unwrap(),
            json!({
                "filtered": {
                    "query": {"query_string": {
                        "query": "elasticsearch",
                        "fields": ["title", "body"],
                        "use_dis_max": true
                    }},
                    "filter": {"bool": {"must": [{"terms": {"lang": ["en", "de"]}}]}}
                }
            })
        );
    }

    #[test]
    fn test_e2_unknown_term_field_dropped() {
        let fields = schema();
        let with_unknown = e1().with_term_filter("unknownField", ["x"]);
        let compiler = PredicateCompiler::new(&fields, RangeJoin::Should);

        assert_eq!(compiler.compile(&with_unknown), compiler.compile(&e1()));
    }

    #[test]
    fn test_e3_blank_text_is_wildcard() {
        let fields = schema();
        let request = QueryRequest::new(IndexCoord::new("news", "article"))
            .with_text("")
            .with_match_field("title");
        let query = PredicateCompiler::new(&fields, RangeJoin::Should).compile(&request);

        assert_eq!(
            serde_json::to_value(&query).unwrap(),
            json!({"filtered": {"query": {"query_string": {
                "query": "*", "fields": ["title"], "use_dis_max": true
            }}}})
        );
    }

    #[test]
    fn test_ranges_join_as_should() {
        let fields = schema();
        let request = e1()
            .with_range("price", "gte", 10)
            .with_range("price", "lt", 20)
            .with_range("price", "between", json!([1, 2]))
            .with_range("createat", "gt", "2015-01-01");
        let filter = PredicateCompiler::new(&fields, RangeJoin::Should)
            .filter_layer(&request.term_filters, &request.range_filters)
            .unwrap();

        assert_eq!(
            serde_json::to_value(&filter).unwrap(),
            json!({"bool": {
                "must": [{"terms": {"lang": ["en", "de"]}}],
                "should": [
                    {"range": {"createat": {"gt": "2015-01-01"}}},
                    {"range": {"price": {"gte": 10, "lt": 20}}}
                ]
            }})
        );
    }

    #[test]
    fn test_ranges_join_as_must() {
        let fields = schema();
        let request = e1().with_range("price", "lte", 99);
        let filter = PredicateCompiler::new(&fields, RangeJoin::Must)
            .filter_layer(&request.term_filters, &request.range_filters)
            .unwrap();

        assert_eq!(
            serde_json::to_value(&filter).unwrap(),
            json!({"bool": {"must": [
                {"terms": {"lang": ["en", "de"]}},
                {"range": {"price": {"lte": 99}}}
            ]}})
        );
    }

    #[test]
    fn test_only_unknown_ops_produce_no_clause() {
        let fields = schema();
        let request = QueryRequest::new(IndexCoord::new("news", "article"))
            .with_range("price", "near", 5);
        let compiler = PredicateCompiler::new(&fields, RangeJoin::Should);
        assert!(compiler
            .filter_layer(&request.term_filters, &request.range_filters)
            .is_none());

        let mut ranges = RangeFilters::new();
        ranges.insert("price".to_string(), BTreeMap::new());
        assert!(compiler.filter_layer(&TermFilters::new(), &ranges).is_none());
    }

    #[test]
    fn test_empty_schema_drops_every_filter() {
        let fields = FieldSet::new();
        let request = e1().with_range("price", "gt", 1);
        let query = PredicateCompiler::new(&fields, RangeJoin::Should).compile(&request);

        match query {
            EsQuery::Filtered(filtered) => {
                assert!(filtered.filter.is_none());
                assert!(matches!(filtered.query, EsQuery::QueryString(_)));
            }
            other => panic!("expected filtered query, got {:?}", other),
        }
    }

    #[test]
    fn test_match_query_skips_empty_params() {
        let mut params = BTreeMap::new();
        params.insert("title".to_string(), json!("rust"));
        params.insert("".to_string(), json!("ignored"));
        params.insert("lang".to_string(), Value::Null);

        assert_eq!(
            serde_json::to_value(match_query(&params)).unwrap(),
            json!({"bool": {"must": [{"match": {"title": "rust"}}]}})
        );
    }
}
