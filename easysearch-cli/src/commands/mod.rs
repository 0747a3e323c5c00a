pub mod admin;
pub mod search;

pub use admin::{
    run_bulk, run_get, run_index, run_mapping_all, run_mapping_create, run_mapping_get,
    run_ping, run_put,
};
pub use search::{build_query, run_aggregate, run_match, run_query};

use anyhow::{bail, Result};
use serde::Serialize;
use serde_json::Value;

pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// A command line scalar: JSON when it parses as such, else a plain string
pub(crate) fn parse_scalar(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Split a comma-separated list, dropping empty entries
pub(crate) fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// `field=v1,v2`
pub(crate) fn parse_term(raw: &str) -> Result<(String, Vec<Value>)> {
    let Some((field, values)) = raw.split_once('=') else {
        bail!("term filter '{}' must look like field=v1,v2", raw);
    };
    let field = field.trim();
    if field.is_empty() {
        bail!("term filter '{}' has no field", raw);
    }
    let values = values
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(parse_scalar)
        .collect();
    Ok((field.to_string(), values))
}

/// `field:op=bound`
pub(crate) fn parse_range(raw: &str) -> Result<(String, String, Value)> {
    let parsed = raw.split_once('=').and_then(|(lhs, bound)| {
        lhs.split_once(':')
            .map(|(field, op)| (field.trim(), op.trim(), bound.trim()))
    });
    match parsed {
        Some((field, op, bound)) if !field.is_empty() && !op.is_empty() => {
            Ok((field.to_string(), op.to_string(), parse_scalar(bound)))
        }
        _ => bail!("range filter '{}' must look like field:op=bound", raw),
    }
}

/// `field=text`
pub(crate) fn parse_param(raw: &str) -> Result<(String, Value)> {
    match raw.split_once('=') {
        Some((field, text)) if !field.trim().is_empty() => {
            Ok((field.trim().to_string(), Value::String(text.to_string())))
        }
        _ => bail!("match parameter '{}' must look like field=text", raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_term() {
        let (field, values) = parse_term("tag=rust, 42,true").unwrap();
        assert_eq!(field, "tag");
        assert_eq!(values, vec![json!("rust"), json!(42), json!(true)]);

        assert!(parse_term("tag").is_err());
        assert!(parse_term("=a").is_err());
    }

    #[test]
    fn test_parse_range() {
        let (field, op, bound) = parse_range("price:gte=10").unwrap();
        assert_eq!((field.as_str(), op.as_str()), ("price", "gte"));
        assert_eq!(bound, json!(10));

        let (_, _, bound) = parse_range("date:lt=2014-01-01").unwrap();
        assert_eq!(bound, json!("2014-01-01"));

        assert!(parse_range("price=10").is_err());
        assert!(parse_range(":gt=1").is_err());
    }

    #[test]
    fn test_parse_param_keeps_text() {
        let (field, text) = parse_param("title=a=b").unwrap();
        assert_eq!(field, "title");
        assert_eq!(text, json!("a=b"));
        assert!(parse_param("title").is_err());
    }

    #[test]
    fn test_split_list() {
        assert_eq!(split_list("a, b,,c"), vec!["a", "b", "c"]);
        assert!(split_list("").is_empty());
    }
}
