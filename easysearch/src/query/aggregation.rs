//! Aggregation planner: group-by search over a terms aggregation

use crate::config::QueryConfig;
use crate::query::types::*;
use crate::schema::FieldSet;
use crate::types::AggregationRequest;
use std::collections::BTreeMap;
use tracing::debug;

/// Outer terms aggregation
pub const AGG_TERMS: &str = "top-tags";
/// Top hits per bucket
pub const AGG_TOP_HITS: &str = "top-tags-record";
/// Best score per bucket, used for bucket ordering
pub const AGG_MAX_SCORE: &str = "max_score";

/// Separator for composite keys, both in the key name and the bucketing script
pub const KEY_SEPARATOR: &str = "-";

/// A planned aggregation search
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationPlan {
    pub body: SearchBody,
    /// Name under which the bucket key is reported in grouped rows
    pub key_name: String,
    /// Grouping fields that survived the schema check, in caller order
    pub group_fields: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct AggregationPlanner {
    top_hits_size: u32,
    max_buckets: u32,
}

impl AggregationPlanner {
    pub fn new(config: &QueryConfig) -> Self {
        Self {
            top_hits_size: config.top_hits_size,
            max_buckets: config.max_buckets,
        }
    }

    /// Build the search body for `request` around an already compiled query
    ///
    /// Returns `None` when none of the grouping fields is in `fields`.
    pub fn plan(
        &self,
        query: EsQuery,
        request: &AggregationRequest,
        fields: &FieldSet,
    ) -> Option<AggregationPlan> {
        let group_fields: Vec<String> = request
            .aggregation_fields
            .iter()
            .filter(|f| fields.contains(*f))
            .cloned()
            .collect();

        if group_fields.is_empty() {
            return None;
        }

        let key_name = group_fields.join(KEY_SEPARATOR);
        let (field, script) = match group_fields.as_slice() {
            [single] => (Some(single.clone()), None),
            many => (None, Some(composite_script(many))),
        };
        debug!(
            key = %key_name,
            scripted = script.is_some(),
            top_only = request.top_only,
            "planned aggregation"
        );

        let mut order = BTreeMap::new();
        order.insert(AGG_MAX_SCORE.to_string(), SortOrder::Desc);

        let hits_per_bucket = if request.top_only {
            1
        } else {
            self.top_hits_size
        };

        let terms = EsAggregation::new(AggregationKind::Terms(TermsAgg {
            field,
            script,
            size: self.max_buckets,
            order,
        }))
        .with_sub(
            AGG_TOP_HITS,
            EsAggregation::new(AggregationKind::TopHits(TopHitsAgg {
                size: hits_per_bucket,
                source: Some(SourceInclude {
                    include: fields.iter().cloned().collect(),
                }),
            })),
        )
        .with_sub(
            AGG_MAX_SCORE,
            EsAggregation::new(AggregationKind::Max(MaxAgg {
                field: None,
                script: Some("_score".to_string()),
            })),
        );

        let mut aggs = BTreeMap::new();
        aggs.insert(AGG_TERMS.to_string(), terms);

        Some(AggregationPlan {
            body: SearchBody {
                from: None,
                size: 0,
                query: Some(query),
                sort: Vec::new(),
                aggs,
            },
            key_name,
            group_fields,
        })
    }
}

/// Server-side script joining each field's doc value with the key separator
fn composite_script(fields: &[String]) -> String {
    let values: Vec<String> = fields.iter().map(|f| format!("doc.{}.value", f)).collect();
    format!("[{}].join(\"{}\")", values.join(","), KEY_SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{IndexCoord, QueryRequest};
    use serde_json::json;

    fn schema() -> FieldSet {
        ["title", "category", "lang", "createat"]
            .into_iter()
            .map(String::from)
            .collect()
    }

    fn request(fields: &[&str], top_only: bool) -> AggregationRequest {
        AggregationRequest::new(QueryRequest::new(IndexCoord::new("news", "article")))
            .group_by(fields.iter().copied())
            .top_only(top_only)
    }

    fn planner() -> AggregationPlanner {
        AggregationPlanner::new(&QueryConfig::default())
    }

    #[test]
    fn test_single_field_plan() {
        let plan = planner()
            .plan(
                EsQuery::MatchAll(MatchAllQuery {}),
                &request(&["category"], true),
                &schema(),
            )
            .unwrap();

        assert_eq!(plan.key_name, "category");
        assert_eq!(
            serde_json::to_value(&plan.body).unwrap(),
            json!({
                "size": 0,
                "query": {"match_all": {}},
                "aggs": {"top-tags": {
                    "terms": {"field": "category", "size": 10000, "order": {"max_score": "desc"}},
                    "aggs": {
                        "max_score": {"max": {"script": "_score"}},
                        "top-tags-record": {"top_hits": {
                            "size": 1,
                            "_source": {"include": ["category", "createat", "lang", "title"]}
                        }}
                    }
                }}
            })
        );
    }

    #[test]
    fn test_composite_plan_keeps_caller_order() {
        let plan = planner()
            .plan(
                EsQuery::MatchAll(MatchAllQuery {}),
                &request(&["lang", "missing", "category"], false),
                &schema(),
            )
            .unwrap();

        assert_eq!(plan.key_name, "lang-category");
        assert_eq!(plan.group_fields, vec!["lang", "category"]);

        let body = serde_json::to_value(&plan.body).unwrap();
        let terms = &body["aggs"]["top-tags"]["terms"];
        assert_eq!(
            terms["script"],
            json!("[doc.lang.value,doc.category.value].join(\"-\")")
        );
        assert!(terms.get("field").is_none());
        assert_eq!(
            body["aggs"]["top-tags"]["aggs"]["top-tags-record"]["top_hits"]["size"],
            json!(320)
        );
    }

    #[test]
    fn test_no_known_fields_yields_no_plan() {
        let plan = planner().plan(
            EsQuery::MatchAll(MatchAllQuery {}),
            &request(&["nope"], true),
            &schema(),
        );
        assert!(plan.is_none());
    }

    #[test]
    fn test_bucket_cap_from_config() {
        let config = QueryConfig {
            max_buckets: 25,
            top_hits_size: 5,
            ..Default::default()
        };
        let plan = AggregationPlanner::new(&config)
            .plan(
                EsQuery::MatchAll(MatchAllQuery {}),
                &request(&["category"], false),
                &schema(),
            )
            .unwrap();
        let body = serde_json::to_value(&plan.body).unwrap();
        assert_eq!(body["aggs"]["top-tags"]["terms"]["size"], json!(25));
        assert_eq!(
            body["aggs"]["top-tags"]["aggs"]["top-tags-record"]["top_hits"]["size"],
            json!(5)
        );
    }
}
