use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Top-level property names of a mapping type
pub type FieldSet = BTreeSet<String>;

/// Core field types of a 1.x mapping
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FieldType {
    String,
    Long,
    Double,
    Date,
    Boolean,
    /// Any other engine type, carried by name
    Other(String),
}

impl FieldType {
    pub fn as_str(&self) -> &str {
        match self {
            FieldType::String => "string",
            FieldType::Long => "long",
            FieldType::Double => "double",
            FieldType::Date => "date",
            FieldType::Boolean => "boolean",
            FieldType::Other(name) => name,
        }
    }

    pub fn is_string(&self) -> bool {
        matches!(self, FieldType::String)
    }
}

impl From<String> for FieldType {
    fn from(name: String) -> Self {
        match name.as_str() {
            "string" => FieldType::String,
            "long" => FieldType::Long,
            "double" => FieldType::Double,
            "date" => FieldType::Date,
            "boolean" => FieldType::Boolean,
            _ => FieldType::Other(name),
        }
    }
}

impl From<&str> for FieldType {
    fn from(name: &str) -> Self {
        FieldType::from(name.to_string())
    }
}

impl From<FieldType> for String {
    fn from(field_type: FieldType) -> Self {
        field_type.as_str().to_string()
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `copy_to` target: a single field or a list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CopyTo {
    One(String),
    Many(Vec<String>),
}

impl CopyTo {
    pub fn targets(&self) -> Vec<&str> {
        match self {
            CopyTo::One(target) => vec![target.as_str()],
            CopyTo::Many(targets) => targets.iter().map(String::as_str).collect(),
        }
    }
}

/// Field descriptor used to create and read mappings
///
/// Unset options take the engine defaults: stored, analyzed, searchable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// Defaults to `string` on emission
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub field_type: Option<FieldType>,

    #[serde(alias = "store", default, skip_serializing_if = "Option::is_none")]
    pub stored: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analyzed: Option<bool>,

    #[serde(alias = "searched", default, skip_serializing_if = "Option::is_none")]
    pub searchable: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analyzer: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copy_to: Option<CopyTo>,
}

impl FieldDescriptor {
    pub fn new(field_type: impl Into<FieldType>) -> Self {
        Self {
            field_type: Some(field_type.into()),
            ..Default::default()
        }
    }

    pub fn stored(mut self, stored: bool) -> Self {
        self.stored = Some(stored);
        self
    }

    /// Index the value as a single exact term
    pub fn not_analyzed(mut self) -> Self {
        self.analyzed = Some(false);
        self
    }

    pub fn searchable(mut self, searchable: bool) -> Self {
        self.searchable = Some(searchable);
        self
    }

    pub fn analyzer(mut self, analyzer: impl Into<String>) -> Self {
        self.analyzer = Some(analyzer.into());
        self
    }

    pub fn copy_to(mut self, target: impl Into<String>) -> Self {
        self.copy_to = Some(match self.copy_to.take() {
            None => CopyTo::One(target.into()),
            Some(CopyTo::One(first)) => CopyTo::Many(vec![first, target.into()]),
            Some(CopyTo::Many(mut all)) => {
                all.push(target.into());
                CopyTo::Many(all)
            }
        });
        self
    }

    /// Type emitted for this descriptor
    pub fn effective_type(&self) -> FieldType {
        self.field_type.clone().unwrap_or(FieldType::String)
    }

    /// Analyzer when set and non-empty
    pub fn effective_analyzer(&self) -> Option<&str> {
        self.analyzer.as_deref().filter(|a| !a.is_empty())
    }
}
