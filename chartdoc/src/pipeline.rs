//! Resolution of a document's data section into data the rendering surface
//! can display.
//!
//! A data section is first classified into a [`DataSource`], which tells the
//! loader where the records come from. Loading then happens in one place,
//! regardless of the shape of the document.

use std::path::{Path, PathBuf};

use log::{debug, warn};
use serde_json::Value as JsonValue;

use crate::{
    format::{self, DataFormat},
    ContentStore, DataDescriptor, DataInput, DocumentContent, Error, NormalizedDataset,
    PathResolver, VisualizationSpec,
};

/// The outcome of resolving a document.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    /// The data as it should be handed to the rendering surface.
    pub data: DataInput,
    /// The data section exactly as it was found in the document. This is what
    /// gets written back when saving.
    pub descriptor: DataDescriptor,
    /// The visualization fields of the document.
    pub spec: VisualizationSpec,
}

/// Where the records of a data section come from.
#[derive(Debug, Clone, PartialEq)]
pub enum DataSource {
    /// Values given inline.
    Inline(JsonValue),
    /// A file inside the document store.
    Local { path: PathBuf, format: DataFormat },
    /// A resource outside of the document store, which the rendering surface
    /// fetches on its own.
    Remote,
    /// Neither values nor a reference. The data section is passed on as-is.
    Opaque,
}

/// Classify a data descriptor belonging to the document at `base_path`.
///
/// Fails only if a store-local reference has no recognizable format.
pub fn classify(
    resolver: &PathResolver,
    base_path: &Path,
    descriptor: &DataDescriptor,
) -> Result<DataSource, Error> {
    if let Some(url) = descriptor.url() {
        if resolver.is_external(url) {
            return Ok(DataSource::Remote);
        }
        let path = resolver.resolve(base_path, url);
        let format = DataFormat::from_path(&path).map_err(|e| e.while_loading(url))?;
        return Ok(DataSource::Local { path, format });
    }
    Ok(match descriptor.values() {
        Some(values) => DataSource::Inline(values.clone()),
        None => DataSource::Opaque,
    })
}

/// Resolves documents against a content store.
pub struct Pipeline<'a> {
    resolver: &'a PathResolver,
    store: &'a dyn ContentStore,
}

impl<'a> Pipeline<'a> {
    /// Constructor.
    pub fn new(resolver: &'a PathResolver, store: &'a dyn ContentStore) -> Self {
        Self { resolver, store }
    }

    /// Resolve the text of the document at the given path.
    ///
    /// JSON (and plain text) documents are interpreted as chart documents.
    /// Documents in any other supported format are treated as plain data.
    pub async fn resolve_document(&self, doc_path: &Path, text: &str) -> Result<Resolution, Error> {
        let doc_format = DataFormat::from_path(doc_path)?;
        if doc_format == DataFormat::Json {
            let value = format::parse_value(text, doc_format)?;
            return self.resolve(doc_path, value).await;
        }
        debug!(
            "Treating {} document {} as data",
            doc_format,
            doc_path.display()
        );
        let rows = format::parse(text, doc_format)?;
        Ok(Resolution {
            descriptor: DataDescriptor::inline(rows.clone()),
            data: DataInput::Rows(NormalizedDataset::new(rows)),
            spec: VisualizationSpec::default(),
        })
    }

    /// Resolve an already parsed chart document. `base_path` is the path of
    /// the document, relative references are resolved next to it.
    pub async fn resolve(&self, base_path: &Path, value: JsonValue) -> Result<Resolution, Error> {
        let doc = DocumentContent::from_value(&value)?;
        let spec = doc.spec;
        let descriptor = match doc.data {
            Some(descriptor) => descriptor,
            None => {
                debug!(
                    "Document {} has no data section, using the whole document as values",
                    base_path.display()
                );
                DataDescriptor::inline(value)
            }
        };
        let data = self.load(base_path, &descriptor).await?;
        Ok(Resolution {
            data,
            descriptor,
            spec,
        })
    }

    /// Resolve a table of records that is already in memory.
    pub fn resolve_table(&self, rows: JsonValue) -> Resolution {
        Resolution {
            descriptor: DataDescriptor::inline(rows.clone()),
            data: DataInput::Rows(NormalizedDataset::from_value(rows)),
            spec: VisualizationSpec::default(),
        }
    }

    /// Load the data described by the given descriptor.
    pub async fn load(&self, base_path: &Path, descriptor: &DataDescriptor) -> Result<DataInput, Error> {
        let source = classify(self.resolver, base_path, descriptor)?;
        debug!("Data section is {}, loading from {:?}", descriptor.kind(), source);
        Ok(match source {
            DataSource::Inline(values) => DataInput::Inline {
                rows: NormalizedDataset::from_value(values),
                section: descriptor.to_value(),
            },
            DataSource::Local { path, format } => {
                let contents = self
                    .store
                    .get(&path)
                    .await
                    .map_err(|e| e.while_loading(path.display()))?;
                let rows = format::parse(&contents.content, format)
                    .map_err(|e| e.while_loading(path.display()))?;
                debug!("Loaded {} rows from {}", rows.len(), path.display());
                DataInput::Rows(NormalizedDataset::new(rows))
            }
            DataSource::Remote => DataInput::Remote(descriptor.to_value()),
            DataSource::Opaque => {
                warn!(
                    "Data section has neither values nor a URL, passing it on unchanged: {}",
                    descriptor.to_value()
                );
                DataInput::Opaque(descriptor.to_value())
            }
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::MemoryStore;
    use futures::executor::block_on;
    use serde_json::json;

    fn resolve(store: &MemoryStore, resolver: &PathResolver, doc: JsonValue) -> Result<Resolution, Error> {
        block_on(Pipeline::new(resolver, store).resolve(Path::new("charts/c.vl.json"), doc))
    }

    #[test]
    fn inline_values_are_used_as_is() {
        let store = MemoryStore::default();
        let resolver = PathResolver::default();
        let values = json!([{"a": 1}, {"a": 2, "b": [1, 2]}]);
        let r = resolve(&store, &resolver, json!({"data": {"values": values}})).unwrap();
        assert_eq!(r.data.rows().unwrap().rows(), values.as_array().unwrap().as_slice());
    }

    #[test]
    fn inline_sections_keep_their_other_keys() {
        let store = MemoryStore::default();
        let resolver = PathResolver::default();
        let data = json!({
            "values": [{"d": "2020-01-01"}],
            "format": {"type": "json", "parse": {"d": "date"}},
            "name": "table",
        });
        let r = resolve(&store, &resolver, json!({ "data": data })).unwrap();
        assert_eq!(r.data.to_value(), data);
        assert_eq!(r.data.rows().unwrap().len(), 1);
        assert_eq!(r.descriptor.to_value(), data);
    }

    #[test]
    fn same_host_urls_are_store_local() {
        let store = MemoryStore::default().with("charts/x.csv", "a\n1");
        let resolver = PathResolver::new(Some("localhost:8888"));
        let url = "http://localhost:8888/files/x.csv?token=abc#top";
        let r = resolve(&store, &resolver, json!({"data": {"url": url}})).unwrap();
        assert_eq!(r.data.rows().unwrap().rows(), &[json!({"a": "1"})]);
        assert_eq!(r.descriptor.url(), Some(url));
    }

    #[test]
    fn local_references_are_fetched_and_parsed() {
        let store = MemoryStore::default().with("charts/other.csv", "a,b\n1,2");
        let resolver = PathResolver::new(Some("localhost:8888"));
        let doc = json!({"data": {"url": "other.csv"}, "mark": "bar"});
        let r = resolve(&store, &resolver, doc).unwrap();
        assert_eq!(
            r.data,
            DataInput::Rows(NormalizedDataset::new(vec![json!({"a": "1", "b": "2"})]))
        );
        assert_eq!(r.descriptor.url(), Some("other.csv"));
        assert_eq!(r.spec.mark, Some(json!("bar")));
    }

    #[test]
    fn external_references_pass_through() {
        let store = MemoryStore::default();
        let resolver = PathResolver::new(Some("localhost:8888"));
        let data = json!({"url": "https://example.com/cars.json", "format": {"type": "json"}});
        let r = resolve(&store, &resolver, json!({ "data": data })).unwrap();
        assert_eq!(r.data, DataInput::Remote(data.clone()));
        assert_eq!(r.descriptor.to_value(), data);
    }

    #[test]
    fn unknown_sections_pass_through() {
        let store = MemoryStore::default();
        let resolver = PathResolver::default();
        let data = json!({"name": "table"});
        let r = resolve(&store, &resolver, json!({ "data": data })).unwrap();
        assert_eq!(r.data, DataInput::Opaque(data.clone()));
        assert_eq!(r.descriptor, DataDescriptor::Unknown(data));
    }

    #[test]
    fn missing_data_section_uses_whole_document() {
        let store = MemoryStore::default();
        let resolver = PathResolver::default();
        let doc = json!([{"a": 1}, {"a": 2}]);
        let r = resolve(&store, &resolver, doc.clone()).unwrap();
        assert_eq!(r.data.rows().unwrap().len(), 2);
        assert_eq!(r.descriptor, DataDescriptor::inline(doc));
        assert!(r.spec.is_empty());
    }

    #[test]
    fn missing_files_fail_to_load() {
        let store = MemoryStore::default();
        let resolver = PathResolver::default();
        let err = resolve(&store, &resolver, json!({"data": {"url": "nope.csv"}})).unwrap_err();
        match err {
            Error::DataLoad(location, cause) => {
                assert_eq!(location, Path::new("charts/nope.csv").display().to_string());
                assert!(matches!(*cause, Error::NotFound(_)));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn malformed_files_fail_to_load() {
        let store = MemoryStore::default().with("charts/bad.json", "{oops");
        let resolver = PathResolver::default();
        let err = resolve(&store, &resolver, json!({"data": {"url": "bad.json"}})).unwrap_err();
        assert!(matches!(err, Error::DataLoad(_, cause) if matches!(*cause, Error::Format(_, _))));
    }

    #[test]
    fn tabular_documents_are_data() {
        let store = MemoryStore::default();
        let resolver = PathResolver::default();
        let pipeline = Pipeline::new(&resolver, &store);
        let r = block_on(pipeline.resolve_document(Path::new("cars.csv"), "a\n1\n2")).unwrap();
        assert_eq!(r.data.rows().unwrap().len(), 2);
        assert_eq!(r.descriptor.values(), Some(&json!([{"a": "1"}, {"a": "2"}])));
    }

    #[test]
    fn text_documents_are_chart_documents() {
        let store = MemoryStore::default();
        let resolver = PathResolver::default();
        let pipeline = Pipeline::new(&resolver, &store);
        let text = r#"{"data": {"values": [{"a": 1}]}, "mark": "line"}"#;
        let r = block_on(pipeline.resolve_document(Path::new("notes.txt"), text)).unwrap();
        assert_eq!(r.spec.mark, Some(json!("line")));
    }
}
