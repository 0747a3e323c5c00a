//! Mapping emission and parsing (engine 1.x mapping JSON)

use super::types::{CopyTo, FieldDescriptor, FieldSet, FieldType};
use crate::error::{Error, Result};
use crate::types::IndexCoord;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use tracing::warn;

/// `GET /{index}/_mapping[/{type}]` response
#[derive(Debug, Default, Deserialize)]
pub struct EsMappingResponse {
    #[serde(flatten)]
    pub indices: BTreeMap<String, EsIndexMapping>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EsIndexMapping {
    #[serde(default)]
    pub mappings: BTreeMap<String, EsTypeMapping>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EsTypeMapping {
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl EsMappingResponse {
    /// Properties of `coord`
    ///
    /// Falls back to the only index in the response, which is how the engine
    /// answers when the index name is an alias.
    pub fn properties(&self, coord: &IndexCoord) -> Option<&Map<String, Value>> {
        let index = self.indices.get(&coord.index).or_else(|| {
            if self.indices.len() == 1 {
                self.indices.values().next()
            } else {
                None
            }
        })?;
        index
            .mappings
            .get(&coord.doc_type)
            .map(|mapping| &mapping.properties)
    }

    pub fn field_set(&self, coord: &IndexCoord) -> Option<FieldSet> {
        self.properties(coord)
            .map(|props| props.keys().cloned().collect())
    }
}

/// Engine form of one descriptor
pub fn emit_field(name: &str, descriptor: &FieldDescriptor) -> Result<Value> {
    validate_field(name, descriptor)?;

    let mut out = Map::new();
    out.insert("type".to_string(), json!(descriptor.effective_type().as_str()));
    out.insert("store".to_string(), json!(descriptor.stored.unwrap_or(true)));
    if descriptor.analyzed == Some(false) {
        out.insert("index".to_string(), json!("not_analyzed"));
    }
    if let Some(searched) = descriptor.searchable {
        out.insert("searched".to_string(), json!(searched));
    }
    if let Some(analyzer) = descriptor.effective_analyzer() {
        out.insert("analyzer".to_string(), json!(analyzer));
    }
    if let Some(copy_to) = &descriptor.copy_to {
        out.insert("copy_to".to_string(), serde_json::to_value(copy_to)?);
    }
    Ok(Value::Object(out))
}

/// `{type: {properties: {...}}}` body for a put-mapping request
pub fn build_mapping(doc_type: &str, fields: &BTreeMap<String, FieldDescriptor>) -> Result<Value> {
    let mut properties = Map::new();
    for (name, descriptor) in fields {
        properties.insert(name.clone(), emit_field(name, descriptor)?);
    }
    let mut body = Map::new();
    body.insert(doc_type.to_string(), json!({ "properties": properties }));
    Ok(Value::Object(body))
}

fn validate_field(name: &str, descriptor: &FieldDescriptor) -> Result<()> {
    let reject = |reason: &str| {
        Err(Error::MappingBuild {
            field: name.to_string(),
            reason: reason.to_string(),
        })
    };

    if name.trim().is_empty() {
        return reject("field name is empty");
    }
    if name.contains('.') {
        return reject("field name must not contain '.'");
    }
    if name.chars().any(char::is_whitespace) {
        return reject("field name must not contain whitespace");
    }
    if let Some(copy_to) = &descriptor.copy_to {
        let targets = copy_to.targets();
        if targets.is_empty() || targets.iter().any(|t| t.trim().is_empty()) {
            return reject("copy_to target is empty");
        }
    }
    if descriptor.effective_analyzer().is_some() && !descriptor.effective_type().is_string() {
        return reject("analyzer is only valid on string fields");
    }
    Ok(())
}

/// Descriptor for one engine property; the inverse of [`emit_field`]
pub fn parse_field(name: &str, mapping: &Value) -> Result<FieldDescriptor> {
    let Some(obj) = mapping.as_object() else {
        return Err(Error::MappingBuild {
            field: name.to_string(),
            reason: format!("expected an object, got {}", mapping),
        });
    };

    let field_type = match obj.get("type").and_then(Value::as_str) {
        Some(t) => FieldType::from(t),
        None if obj.contains_key("properties") => FieldType::Other("object".to_string()),
        None => FieldType::String,
    };

    let copy_to = match obj.get("copy_to") {
        Some(value) => Some(serde_json::from_value::<CopyTo>(value.clone()).map_err(|e| {
            Error::MappingBuild {
                field: name.to_string(),
                reason: format!("invalid copy_to: {}", e),
            }
        })?),
        None => None,
    };

    Ok(FieldDescriptor {
        field_type: Some(field_type),
        stored: obj.get("store").and_then(flag),
        analyzed: match obj.get("index").and_then(Value::as_str) {
            Some("not_analyzed") => Some(false),
            _ => None,
        },
        searchable: obj.get("searched").and_then(flag),
        analyzer: obj
            .get("analyzer")
            .and_then(Value::as_str)
            .map(String::from),
        copy_to,
    })
}

/// Descriptors for every property; unreadable ones are logged and skipped
pub fn parse_properties(properties: &Map<String, Value>) -> BTreeMap<String, FieldDescriptor> {
    properties
        .iter()
        .filter_map(|(name, mapping)| match parse_field(name, mapping) {
            Ok(descriptor) => Some((name.clone(), descriptor)),
            Err(e) => {
                warn!(field = %name, error = %e, "skipping unreadable mapping property");
                None
            }
        })
        .collect()
}

impl FieldDescriptor {
    /// Read a descriptor back from its engine mapping
    pub fn from_mapping(name: &str, mapping: &Value) -> Result<Self> {
        parse_field(name, mapping)
    }
}

/// Boolean flag as the engine reports it: `true`, `"yes"`, `"true"`, ...
fn flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.as_str() {
            "true" | "yes" => Some(true),
            "false" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_defaults() {
        let emitted = emit_field("title", &FieldDescriptor::default()).unwrap();
        assert_eq!(emitted, json!({"type": "string", "store": true}));
    }

    #[test]
    fn test_emit_all_options() {
        let descriptor = FieldDescriptor::new(FieldType::String)
            .stored(false)
            .not_analyzed()
            .searchable(true)
            .analyzer("ik")
            .copy_to("all_text");

        assert_eq!(
            emit_field("tag", &descriptor).unwrap(),
            json!({
                "type": "string",
                "store": false,
                "index": "not_analyzed",
                "searched": true,
                "analyzer": "ik",
                "copy_to": "all_text"
            })
        );
    }

    #[test]
    fn test_analyzed_true_emits_nothing() {
        let descriptor = FieldDescriptor {
            analyzed: Some(true),
            analyzer: Some(String::new()),
            ..FieldDescriptor::new(FieldType::Long)
        };
        assert_eq!(
            emit_field("views", &descriptor).unwrap(),
            json!({"type": "long", "store": true})
        );
    }

    #[test]
    fn test_build_mapping_body() {
        let mut fields = BTreeMap::new();
        fields.insert("title".to_string(), FieldDescriptor::default());
        fields.insert(
            "createat".to_string(),
            FieldDescriptor::new(FieldType::Date),
        );

        assert_eq!(
            build_mapping("article", &fields).unwrap(),
            json!({"article": {"properties": {
                "createat": {"type": "date", "store": true},
                "title": {"type": "string", "store": true}
            }}})
        );
    }

    #[test]
    fn test_build_rejects_invalid_descriptors() {
        let cases = [
            ("", FieldDescriptor::default()),
            ("a.b", FieldDescriptor::default()),
            ("a b", FieldDescriptor::default()),
            ("tags", FieldDescriptor::default().copy_to(" ")),
            ("tags", FieldDescriptor {
                copy_to: Some(CopyTo::Many(vec![])),
                ..Default::default()
            }),
            ("views", FieldDescriptor::new(FieldType::Long).analyzer("ik")),
        ];

        for (name, descriptor) in cases {
            let mut fields = BTreeMap::new();
            fields.insert(name.to_string(), descriptor);
            assert!(
                matches!(build_mapping("article", &fields), Err(Error::MappingBuild { .. })),
                "expected '{}' to be rejected",
                name
            );
        }
    }

    #[test]
    fn test_parse_engine_forms() {
        let parsed = parse_field(
            "tag",
            &json!({"type": "string", "store": "yes", "index": "not_analyzed", "copy_to": ["a", "b"]}),
        )
        .unwrap();
        assert_eq!(parsed.stored, Some(true));
        assert_eq!(parsed.analyzed, Some(false));
        assert_eq!(parsed.copy_to, Some(CopyTo::Many(vec!["a".into(), "b".into()])));

        let object = parse_field("author", &json!({"properties": {"name": {"type": "string"}}})).unwrap();
        assert_eq!(object.field_type, Some(FieldType::Other("object".into())));

        assert!(parse_field("broken", &json!("string")).is_err());
    }

    #[test]
    fn test_emit_parse_round_trip() {
        let emitted = json!({
            "type": "string",
            "store": false,
            "index": "not_analyzed",
            "searched": false,
            "analyzer": "standard",
            "copy_to": ["all"]
        });
        let parsed = FieldDescriptor::from_mapping("f", &emitted).unwrap();
        assert_eq!(emit_field("f", &parsed).unwrap(), emitted);
    }

    #[test]
    fn test_mapping_response_properties() {
        let response: EsMappingResponse = serde_json::from_value(json!({
            "news_v2": {"mappings": {"article": {"properties": {
                "title": {"type": "string"},
                "lang": {"type": "string", "index": "not_analyzed"}
            }}}}
        }))
        .unwrap();

        // Alias resolves to the single concrete index
        let fields = response
            .field_set(&IndexCoord::new("news", "article"))
            .unwrap();
        assert_eq!(fields.into_iter().collect::<Vec<_>>(), vec!["lang", "title"]);

        assert!(response.field_set(&IndexCoord::new("news", "comment")).is_none());
    }

    #[test]
    fn test_parse_properties_skips_broken() {
        let props = json!({"ok": {"type": "long"}, "bad": 3});
        let parsed = parse_properties(props.as_object().unwrap());
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed["ok"].field_type, Some(FieldType::Long));
    }
}
