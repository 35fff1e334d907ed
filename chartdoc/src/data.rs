//! Data descriptors and the normalized, in-memory datasets they produce.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Map as JsonMap, Value as JsonValue};

use crate::{hash::sha256, Error};

/// A single data record. Usually an object mapping field names to values.
pub type Record = JsonValue;

/// The data section of a chart document.
///
/// Each variant retains the complete original JSON so that keys we don't
/// understand survive a load/save cycle untouched.
#[derive(Debug, Clone, PartialEq)]
pub enum DataDescriptor {
    /// An object carrying a `values` key.
    InlineValues(JsonMap<String, JsonValue>),
    /// An object carrying a non-empty string `url` key. Takes precedence over
    /// `values` when both are present.
    UrlReference(JsonMap<String, JsonValue>),
    /// Anything else.
    Unknown(JsonValue),
}

impl DataDescriptor {
    /// Classify the given raw data section.
    pub fn classify(raw: JsonValue) -> Self {
        match raw {
            JsonValue::Object(obj) => {
                let has_url = matches!(obj.get("url"), Some(JsonValue::String(s)) if !s.is_empty());
                let has_values = !matches!(obj.get("values"), None | Some(JsonValue::Null));
                if has_url {
                    Self::UrlReference(obj)
                } else if has_values {
                    Self::InlineValues(obj)
                } else {
                    Self::Unknown(JsonValue::Object(obj))
                }
            }
            other => Self::Unknown(other),
        }
    }

    /// A descriptor holding the given value inline as `{"values": ...}`.
    pub fn inline<V: Into<JsonValue>>(values: V) -> Self {
        let mut obj = JsonMap::new();
        obj.insert("values".to_string(), values.into());
        Self::InlineValues(obj)
    }

    /// The URL of a [`DataDescriptor::UrlReference`].
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::UrlReference(obj) => obj.get("url").and_then(JsonValue::as_str),
            _ => None,
        }
    }

    /// The inline values of a [`DataDescriptor::InlineValues`].
    pub fn values(&self) -> Option<&JsonValue> {
        match self {
            Self::InlineValues(obj) => obj.get("values"),
            _ => None,
        }
    }

    /// A short name for the active variant, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InlineValues(_) => "inline values",
            Self::UrlReference(_) => "URL reference",
            Self::Unknown(_) => "unknown",
        }
    }

    /// The original JSON representation of this descriptor.
    pub fn to_value(&self) -> JsonValue {
        match self {
            Self::InlineValues(obj) | Self::UrlReference(obj) => JsonValue::Object(obj.clone()),
            Self::Unknown(raw) => raw.clone(),
        }
    }
}

impl From<JsonValue> for DataDescriptor {
    fn from(raw: JsonValue) -> Self {
        Self::classify(raw)
    }
}

impl From<DataDescriptor> for JsonValue {
    fn from(d: DataDescriptor) -> Self {
        match d {
            DataDescriptor::InlineValues(obj) | DataDescriptor::UrlReference(obj) => {
                JsonValue::Object(obj)
            }
            DataDescriptor::Unknown(raw) => raw,
        }
    }
}

impl Serialize for DataDescriptor {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::InlineValues(obj) | Self::UrlReference(obj) => obj.serialize(serializer),
            Self::Unknown(raw) => raw.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for DataDescriptor {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Self::classify(JsonValue::deserialize(deserializer)?))
    }
}

/// A fully materialized sequence of records, independent of wherever it was
/// loaded from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedDataset {
    rows: Vec<Record>,
}

impl NormalizedDataset {
    /// Constructor.
    pub fn new(rows: Vec<Record>) -> Self {
        Self { rows }
    }

    /// Arrays become rows as they are. Any other value becomes a single row.
    pub fn from_value(value: JsonValue) -> Self {
        match value {
            JsonValue::Array(rows) => Self::new(rows),
            other => Self::new(vec![other]),
        }
    }

    pub fn rows(&self) -> &[Record] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// SHA256 digest (lowercase hex) of the JSON encoding of the rows.
    ///
    /// Two datasets with the same fingerprint are identical.
    pub fn fingerprint(&self) -> Result<String, Error> {
        Ok(sha256(serde_json::to_vec(&self.rows)?))
    }
}

impl From<Vec<Record>> for NormalizedDataset {
    fn from(rows: Vec<Record>) -> Self {
        Self::new(rows)
    }
}

/// The data that is handed to the rendering surface.
#[derive(Debug, Clone, PartialEq)]
pub enum DataInput {
    /// Records that have been loaded into memory.
    Rows(NormalizedDataset),
    /// Values given inline in the document. The surface receives the data
    /// section as written, including keys like `format` or `name`.
    Inline {
        rows: NormalizedDataset,
        section: JsonValue,
    },
    /// A reference to an external resource that the rendering surface fetches
    /// itself.
    Remote(JsonValue),
    /// A data section we could not classify, passed on as-is.
    Opaque(JsonValue),
}

impl DataInput {
    /// The in-memory rows, if the data has been materialized.
    pub fn rows(&self) -> Option<&NormalizedDataset> {
        match self {
            Self::Rows(ds) | Self::Inline { rows: ds, .. } => Some(ds),
            _ => None,
        }
    }

    /// The data section as understood by the rendering surface.
    pub fn to_value(&self) -> JsonValue {
        match self {
            Self::Rows(ds) => json!({ "values": ds.rows() }),
            Self::Inline { section, .. } | Self::Remote(section) | Self::Opaque(section) => {
                section.clone()
            }
        }
    }
}
