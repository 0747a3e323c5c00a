use super::{parse_param, parse_range, parse_term, print_json, split_list};
use crate::FilterArgs;
use anyhow::Result;
use easysearch::{AggregationRequest, IndexCoord, QueryRequest, SearchHelper};
use std::collections::BTreeMap;

pub fn build_query(coord: IndexCoord, args: &FilterArgs) -> Result<QueryRequest> {
    let mut request = QueryRequest::new(coord);
    if let Some(q) = &args.q {
        request = request.with_text(q.clone());
    }
    if let Some(fields) = &args.fields {
        request = request.with_match_fields(split_list(fields));
    }
    for raw in &args.terms {
        let (field, values) = parse_term(raw)?;
        request = request.with_term_filter(field, values);
    }
    for raw in &args.ranges {
        let (field, op, bound) = parse_range(raw)?;
        request = request.with_range(field, op, bound);
    }
    Ok(request)
}

pub async fn run_query(helper: &SearchHelper, request: &QueryRequest) -> Result<()> {
    let envelope = helper.query(request).await?;
    print_json(&envelope)
}

pub async fn run_aggregate(
    helper: &SearchHelper,
    query: QueryRequest,
    group_by: &str,
    top_only: bool,
) -> Result<()> {
    let request = AggregationRequest::new(query)
        .group_by(split_list(group_by))
        .top_only(top_only);
    let envelope = helper.aggregate(&request).await?;
    print_json(&envelope)
}

pub async fn run_match(
    helper: &SearchHelper,
    coord: &IndexCoord,
    params: &[String],
    pageno: u32,
    pagesize: u32,
) -> Result<()> {
    let params = params
        .iter()
        .map(|raw| parse_param(raw))
        .collect::<Result<BTreeMap<_, _>>>()?;
    let envelope = helper.match_query(coord, pageno, pagesize, &params).await?;
    print_json(&envelope)
}
