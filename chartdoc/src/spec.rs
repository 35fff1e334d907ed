//! Visualization specifications and the canonical chart document.
//!
//! The fields of a specification are carried around verbatim: chartdoc never
//! interprets them. A field is only ever written out if it was read in (or
//! set by the rendering surface), so a load/save cycle introduces no keys.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;

use crate::{DataDescriptor, Error};

/// The visualization-specific part of a chart document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VisualizationSpec {
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub mark: Option<JsonValue>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub encoding: Option<JsonValue>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub height: Option<JsonValue>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub width: Option<JsonValue>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub description: Option<JsonValue>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub name: Option<JsonValue>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub selection: Option<JsonValue>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub title: Option<JsonValue>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub transform: Option<JsonValue>,
}

// Keeps explicit `null`s, which would otherwise be indistinguishable from
// absent fields.
fn present<'de, D>(deserializer: D) -> Result<Option<JsonValue>, D::Error>
where
    D: Deserializer<'de>,
{
    JsonValue::deserialize(deserializer).map(Some)
}

impl VisualizationSpec {
    /// Project the visualization fields out of an arbitrary JSON value.
    /// Values that are not objects have no visualization fields.
    pub fn from_value(value: &JsonValue) -> Result<Self, Error> {
        match value {
            JsonValue::Object(_) => Ok(serde_json::from_value(value.clone())?),
            _ => Ok(Self::default()),
        }
    }

    /// Returns true if none of the fields are set.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub fn to_value(&self) -> Result<JsonValue, Error> {
        Ok(serde_json::to_value(self)?)
    }
}

/// The canonical, on-disk shape of a chart document (`*.vl.json`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<DataDescriptor>,
    #[serde(flatten)]
    pub spec: VisualizationSpec,
}

impl DocumentContent {
    /// Interpret an already parsed document. Documents that are not objects
    /// have neither a data section nor visualization fields.
    pub fn from_value(value: &JsonValue) -> Result<Self, Error> {
        match value {
            JsonValue::Object(_) => Ok(serde_json::from_value(value.clone())?),
            _ => Ok(Self::default()),
        }
    }

    /// The canonical JSON text of this document.
    pub fn to_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_value(&self) -> Result<JsonValue, Error> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Document to specification: a direct projection of the visualization
/// fields.
pub fn to_spec(doc: &DocumentContent) -> VisualizationSpec {
    doc.spec.clone()
}

/// Specification to document: reassemble a document from the rendering
/// surface's current specification and the data descriptor that was retained
/// when the data was loaded.
pub fn from_spec(spec: VisualizationSpec, data: &DataDescriptor) -> DocumentContent {
    DocumentContent {
        data: Some(data.clone()),
        spec,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn absent_fields_are_not_synthesized() {
        let doc = DocumentContent::from_value(&json!({"mark": "bar"})).unwrap();
        assert_eq!(doc.to_value().unwrap(), json!({"mark": "bar"}));
    }

    #[test]
    fn explicit_nulls_are_kept() {
        let raw = json!({"data": {"values": []}, "title": null});
        let doc = DocumentContent::from_value(&raw).unwrap();
        assert_eq!(doc.spec.title, Some(JsonValue::Null));
        assert_eq!(doc.to_value().unwrap(), raw);
    }

    #[test]
    fn canonical_field_order() {
        let raw = json!({
            "transform": [],
            "mark": "point",
            "data": {"url": "cars.json"},
            "encoding": {"x": {"field": "a"}},
        });
        let doc = DocumentContent::from_value(&raw).unwrap();
        assert_eq!(
            serde_json::to_string(&doc).unwrap(),
            r#"{"data":{"url":"cars.json"},"mark":"point","encoding":{"x":{"field":"a"}},"transform":[]}"#
        );
    }

    #[test]
    fn reassembly_uses_the_retained_descriptor() {
        let descriptor = DataDescriptor::classify(json!({"values": [{"a": 1}]}));
        let spec = VisualizationSpec {
            mark: Some(json!("bar")),
            ..Default::default()
        };
        let doc = from_spec(spec, &descriptor);
        assert_eq!(
            serde_json::to_string(&doc).unwrap(),
            r#"{"data":{"values":[{"a":1}]},"mark":"bar"}"#
        );
    }

    #[test]
    fn non_object_documents_have_no_fields() {
        let doc = DocumentContent::from_value(&json!([1, 2, 3])).unwrap();
        assert!(doc.data.is_none());
        assert!(doc.spec.is_empty());
    }
}
