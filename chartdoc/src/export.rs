//! Exporting chart documents under new names and as notebook cells.

use handlebars::Handlebars;
use serde::Serialize;
use serde_json::{json, Map as JsonMap, Value as JsonValue};

use crate::{DocumentContent, Error};

/// The extension of chart documents that can be saved in place.
pub const CHART_DOCUMENT_EXT: &str = ".vl.json";

/// The MIME type used for notebook cells on the clipboard.
pub const JUPYTER_CELL_MIME: &str = "application/vnd.jupyter.cells";

const ALTAIR_CELL_TEMPLATE: &str = "import altair as alt
import pandas as pd
import json
data_src = json.loads('''{{{src}}}''')
alt.Chart.from_dict(data_src)
";

/// Whether or not the given name can be used as a file name: it must not be
/// empty and must not contain `/`, `\` or `:`.
pub fn is_valid_file_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(|c: char| c == '/' || c == '\\' || c == ':')
}

/// The file name an export with the given name is written to.
pub fn export_file_name(name: &str) -> Result<String, Error> {
    if !is_valid_file_name(name) {
        return Err(Error::InvalidName(name.to_string()));
    }
    Ok(if name.contains(CHART_DOCUMENT_EXT) {
        name.to_string()
    } else {
        format!("{}{}", name, CHART_DOCUMENT_EXT)
    })
}

/// A single notebook code cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotebookCell {
    pub cell_type: String,
    pub execution_count: Option<u64>,
    pub metadata: JsonMap<String, JsonValue>,
    pub outputs: Vec<JsonValue>,
    pub source: Vec<String>,
}

impl NotebookCell {
    /// A code cell that has never been executed.
    pub fn code<I: IntoIterator<Item = String>>(source: I) -> Self {
        Self {
            cell_type: "code".to_string(),
            execution_count: None,
            metadata: JsonMap::new(),
            outputs: Vec::new(),
            source: source.into_iter().collect(),
        }
    }
}

/// Clipboard data, tagged with its MIME type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClipboardPayload {
    pub mime: String,
    pub cells: Vec<NotebookCell>,
}

impl ClipboardPayload {
    /// The clipboard data as JSON.
    pub fn to_value(&self) -> Result<JsonValue, Error> {
        Ok(serde_json::to_value(&self.cells)?)
    }
}

/// Build a notebook cell that recreates the chart with Altair.
pub fn altair_cell(doc: &DocumentContent) -> Result<ClipboardPayload, Error> {
    let src = format_json_str(&serde_json::to_string(doc)?);
    let mut hb = Handlebars::new();
    hb.register_template_string("altair", ALTAIR_CELL_TEMPLATE)
        .map_err(|e| Error::TemplateRegister("altair".to_string(), Box::new(e)))?;
    let rendered = hb
        .render("altair", &json!({ "src": src }))
        .map_err(|e| Error::TemplateRender("altair".to_string(), e))?;
    Ok(ClipboardPayload {
        mime: JUPYTER_CELL_MIME.to_string(),
        cells: vec![NotebookCell::code(
            rendered.split_inclusive('\n').map(ToString::to_string),
        )],
    })
}

// The document ends up inside a single-quoted Python string literal.
fn format_json_str(s: &str) -> String {
    s.replace('\\', "\\\\").replace('\'', "\\'")
}
