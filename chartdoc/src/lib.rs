//! chartdoc binds a chart editing surface to a chart document, keeping the
//! chart's specification in sync with the document on disk.
//!
//! Documents may carry their data inline, refer to another file in the same
//! document store, or refer to an external resource. Whichever it is, the data
//! is resolved into something the rendering surface can display, while the
//! document's original data section is retained so that saving never inlines
//! referenced data.
//!
//! For chartdoc's command line interface, see the `chartdoc-cli` crate.

mod config;
mod data;
mod error;
pub mod export;
pub mod format;
mod hash;
mod host;
mod panel;
mod path;
mod pipeline;
pub mod spec;
mod surface;

pub use config::{PanelConfig, SurfaceConfig};
pub use data::{DataDescriptor, DataInput, NormalizedDataset, Record};
pub use error::Error;
pub use export::ClipboardPayload;
pub use format::DataFormat;
pub use host::{ContentStore, Contents, DocumentModel, FsStore, MemoryStore, StoreDocument};
pub use panel::{is_chart_document, ChangeKind, Panel, PanelSource, PanelState, Reload, Resolved};
pub use path::PathResolver;
pub use pipeline::{classify, DataSource, Pipeline, Resolution};
pub use spec::{DocumentContent, VisualizationSpec};
pub use surface::{MemorySurface, MemoryView, Surface, View};
