//! The panel that binds a chart view to a document.
//!
//! A panel starts out [`PanelState::Loading`]. Once the document's data has
//! been resolved and a view created it becomes [`PanelState::Ready`]. Change
//! notifications make it [`PanelState::Stale`] until the document has been
//! resolved again.
//!
//! Resolutions may overlap. Every resolution is tagged with a generation
//! number and only the most recently started one is allowed to update the
//! panel; older ones are discarded when they complete.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use log::{debug, info, warn};
use serde_json::Value as JsonValue;

use crate::{
    export::{self, ClipboardPayload, CHART_DOCUMENT_EXT},
    path::base_name,
    spec, ContentStore, DataDescriptor, DataInput, DocumentContent, DocumentModel, Error,
    PanelConfig, Pipeline, Resolution, Surface, View, VisualizationSpec,
};

/// The lifecycle states of a panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PanelState {
    /// Waiting for the first resolution to complete.
    Loading,
    /// Displaying the current content of the document.
    Ready,
    /// The document has changed (or the last resolution failed) and what is
    /// displayed may be out of date.
    Stale,
}

/// External changes a panel may be notified about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// The document's content was modified.
    Content,
    /// The document's underlying file was modified.
    File,
}

/// What a panel displays.
#[derive(Clone)]
pub enum PanelSource {
    /// A document in the content store.
    Document(Arc<dyn DocumentModel>),
    /// Data that only exists in memory, for example a data frame handed over
    /// by a notebook. Never receives change notifications and cannot be saved.
    Inline {
        /// Either a table of records (if `is_table`) or a chart document.
        payload: JsonValue,
        is_table: bool,
        title: String,
        /// Relative references and exports are resolved next to this path.
        base_path: PathBuf,
    },
}

impl std::fmt::Debug for PanelSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Document(doc) => f.debug_tuple("Document").field(&doc.path()).finish(),
            Self::Inline {
                is_table, title, ..
            } => f
                .debug_struct("Inline")
                .field("is_table", is_table)
                .field("title", title)
                .finish(),
        }
    }
}

impl PanelSource {
    fn base_path(&self) -> &Path {
        match self {
            Self::Document(doc) => doc.path(),
            Self::Inline { base_path, .. } => base_path,
        }
    }
}

/// A resolution that has been started but not yet applied to its panel.
///
/// Does not borrow the panel, so several may be in flight at once.
pub struct Reload {
    generation: u64,
    source: PanelSource,
    config: PanelConfig,
    store: Arc<dyn ContentStore>,
}

impl Reload {
    /// Read and resolve the panel's source.
    pub async fn run(self) -> Resolved {
        let result = self.resolve().await;
        Resolved {
            generation: self.generation,
            result,
        }
    }

    async fn resolve(&self) -> Result<Resolution, Error> {
        let resolver = self.config.resolver();
        let pipeline = Pipeline::new(&resolver, self.store.as_ref());
        match &self.source {
            PanelSource::Document(doc) => {
                let text = doc.read().await?;
                pipeline.resolve_document(doc.path(), &text).await
            }
            PanelSource::Inline {
                payload,
                is_table: true,
                ..
            } => Ok(pipeline.resolve_table(payload.clone())),
            PanelSource::Inline {
                payload, base_path, ..
            } => pipeline.resolve(base_path, payload.clone()).await,
        }
    }
}

/// A completed resolution, waiting to be applied to its panel.
#[derive(Debug)]
pub struct Resolved {
    generation: u64,
    result: Result<Resolution, Error>,
}

// The data and descriptor of the last successful resolution.
struct Loaded {
    data: DataInput,
    descriptor: DataDescriptor,
    spec: VisualizationSpec,
}

/// Binds a rendering surface to a document and keeps the two in sync.
pub struct Panel {
    source: PanelSource,
    store: Arc<dyn ContentStore>,
    surface: Arc<dyn Surface>,
    config: PanelConfig,
    state: PanelState,
    view: Option<Box<dyn View>>,
    loaded: Option<Loaded>,
    // Generation of the most recently started resolution.
    generation: u64,
    last_error: Option<String>,
}

impl Panel {
    /// Constructor. The panel stays [`PanelState::Loading`] until
    /// [`Panel::open`] (or a reload) completes.
    pub fn new(
        source: PanelSource,
        store: Arc<dyn ContentStore>,
        surface: Arc<dyn Surface>,
        config: PanelConfig,
    ) -> Self {
        Self {
            source,
            store,
            surface,
            config,
            state: PanelState::Loading,
            view: None,
            loaded: None,
            generation: 0,
            last_error: None,
        }
    }

    /// Resolve the panel's source for the first time and create its view.
    pub async fn open(&mut self) -> Result<(), Error> {
        debug!("Opening panel {}", self.title());
        self.reload().await
    }

    /// Resolve the panel's source again and update its view.
    pub async fn reload(&mut self) -> Result<(), Error> {
        let resolved = self.begin_reload().run().await;
        self.apply(resolved).map(|_| ())
    }

    /// Start a new resolution. Any resolution started earlier will be
    /// discarded when it completes.
    pub fn begin_reload(&mut self) -> Reload {
        self.generation += 1;
        if self.state == PanelState::Ready {
            self.state = PanelState::Stale;
        }
        debug!("Starting resolution {} of {}", self.generation, self.title());
        Reload {
            generation: self.generation,
            source: self.source.clone(),
            config: self.config.clone(),
            store: self.store.clone(),
        }
    }

    /// Apply a completed resolution.
    ///
    /// Returns `Ok(false)` if the resolution was superseded by a more recent
    /// one and has been discarded. On failure the panel becomes
    /// [`PanelState::Stale`] and keeps displaying what it displayed before.
    pub fn apply(&mut self, resolved: Resolved) -> Result<bool, Error> {
        if resolved.generation < self.generation {
            warn!(
                "Discarding resolution {} of {}, resolution {} has since been started",
                resolved.generation,
                self.title(),
                self.generation
            );
            return Ok(false);
        }
        let resolution = match resolved.result {
            Ok(r) => r,
            Err(e) => {
                warn!("Failed to resolve {}: {}", self.title(), e);
                self.state = PanelState::Stale;
                self.last_error = Some(e.to_string());
                return Err(e);
            }
        };
        if let (Some(previous), Some(next)) = (
            self.loaded.as_ref().and_then(|l| l.data.rows()),
            resolution.data.rows(),
        ) {
            if previous.fingerprint()? == next.fingerprint()? {
                debug!("Data of {} is unchanged", self.title());
            } else {
                debug!("Data of {} changed, now {} rows", self.title(), next.len());
            }
        }
        let mut view = self.surface.create_view(&self.config.surface, &resolution.data)?;
        view.set_spec(&resolution.spec);
        self.view = Some(view);
        self.loaded = Some(Loaded {
            data: resolution.data,
            descriptor: resolution.descriptor,
            spec: resolution.spec,
        });
        self.state = PanelState::Ready;
        self.last_error = None;
        Ok(true)
    }

    /// Handle an external change notification. Panels displaying in-memory
    /// data ignore these.
    pub async fn notify(&mut self, change: ChangeKind) -> Result<(), Error> {
        if let PanelSource::Inline { .. } = self.source {
            debug!("Ignoring {:?} change for in-memory panel {}", change, self.title());
            return Ok(());
        }
        debug!("{:?} change for {}", change, self.title());
        self.reload().await
    }

    /// Replace the panel's configuration and recreate its view. The data is
    /// not resolved again.
    pub fn set_config(&mut self, config: PanelConfig) -> Result<(), Error> {
        self.config = config;
        let loaded = match &self.loaded {
            Some(l) => l,
            None => return Ok(()),
        };
        let spec = self.current_spec(loaded);
        let mut view = self.surface.create_view(&self.config.surface, &loaded.data)?;
        view.set_spec(&spec);
        self.view = Some(view);
        debug!("Recreated view of {} with new settings", self.title());
        Ok(())
    }

    pub fn config(&self) -> &PanelConfig {
        &self.config
    }

    pub fn state(&self) -> PanelState {
        self.state
    }

    /// The message of the error that made the panel stale, if any.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// The panel's title: the document's file name, or the title given to an
    /// in-memory panel.
    pub fn title(&self) -> String {
        match &self.source {
            PanelSource::Document(doc) => base_name(&doc.path().to_string_lossy()).to_string(),
            PanelSource::Inline { title, .. } => title.clone(),
        }
    }

    /// The data handed to the view, as of the last successful resolution.
    pub fn data(&self) -> Option<&DataInput> {
        self.loaded.as_ref().map(|l| &l.data)
    }

    /// The data section retained from the last successful resolution.
    pub fn descriptor(&self) -> Option<&DataDescriptor> {
        self.loaded.as_ref().map(|l| &l.descriptor)
    }

    pub fn view(&self) -> Option<&dyn View> {
        self.view.as_deref()
    }

    pub fn view_mut(&mut self) -> Option<&mut (dyn View + 'static)> {
        self.view.as_deref_mut()
    }

    /// The view's current specification.
    pub fn spec(&self) -> Option<VisualizationSpec> {
        self.view.as_ref().and_then(|v| v.spec())
    }

    /// The document as it would be saved right now: the view's current
    /// specification combined with the retained data section.
    pub fn document(&self) -> Result<DocumentContent, Error> {
        let loaded = self.loaded.as_ref().ok_or(Error::NoView)?;
        Ok(spec::from_spec(self.current_spec(loaded), &loaded.descriptor))
    }

    // The view's specification, or the loaded one if the view has none.
    fn current_spec(&self, loaded: &Loaded) -> VisualizationSpec {
        self.spec().unwrap_or_else(|| loaded.spec.clone())
    }

    /// Write the current document back in place. Only chart documents
    /// (`*.vl.json`) can be saved.
    pub async fn save(&self) -> Result<(), Error> {
        let doc = match &self.source {
            PanelSource::Document(doc) if is_chart_document(doc.path()) => doc,
            other => return Err(Error::UnsupportedSaveTarget(other.base_path().to_path_buf())),
        };
        let content = self.document()?;
        doc.write(&content).await?;
        info!("Saved {}", doc.path().display());
        Ok(())
    }

    /// Write the current document to a new chart document next to this one,
    /// returning its path. Existing files are never overwritten.
    pub async fn export(&self, name: &str) -> Result<PathBuf, Error> {
        let file_name = export::export_file_name(name)?;
        let content = self.document()?;
        let dir = self.source.base_path().parent().unwrap_or_else(|| Path::new(""));
        let path = dir.join(file_name);
        if self.store.exists(&path).await? {
            return Err(Error::AlreadyExists(path));
        }
        self.store.save(&path, &content.to_json()?).await?;
        info!("Exported {} to {}", self.title(), path.display());
        Ok(path)
    }

    /// A notebook cell recreating the current chart.
    pub fn copy_cell(&self) -> Result<ClipboardPayload, Error> {
        export::altair_cell(&self.document()?)
    }

    pub fn undo(&mut self) {
        if let Some(view) = self.view.as_mut() {
            view.undo();
        }
    }

    pub fn redo(&mut self) {
        if let Some(view) = self.view.as_mut() {
            view.redo();
        }
    }
}

impl std::fmt::Debug for Panel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Panel")
            .field("source", &self.source)
            .field("state", &self.state)
            .field("generation", &self.generation)
            .finish()
    }
}

/// Whether or not the document at the given path can be saved in place.
pub fn is_chart_document(path: &Path) -> bool {
    path.to_string_lossy().ends_with(CHART_DOCUMENT_EXT)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{MemoryStore, MemorySurface, StoreDocument};
    use futures::executor::block_on;
    use serde_json::json;

    fn panel_for(store: Arc<MemoryStore>, path: &str) -> Panel {
        let doc = StoreDocument::new(store.clone(), path);
        Panel::new(
            PanelSource::Document(Arc::new(doc)),
            store,
            Arc::new(MemorySurface::default()),
            PanelConfig::default(),
        )
    }

    #[test]
    fn open_makes_panel_ready() {
        let store = Arc::new(MemoryStore::default().with("a.vl.json", r#"{"data": {"values": []}}"#));
        let mut panel = panel_for(store, "a.vl.json");
        assert_eq!(panel.state(), PanelState::Loading);
        block_on(panel.open()).unwrap();
        assert_eq!(panel.state(), PanelState::Ready);
        assert_eq!(panel.title(), "a.vl.json");
    }

    #[test]
    fn failed_reload_keeps_last_good_state() {
        let store = Arc::new(MemoryStore::default().with("a.vl.json", r#"{"data": {"values": [1]}}"#));
        let mut panel = panel_for(store.clone(), "a.vl.json");
        block_on(panel.open()).unwrap();
        store.insert("a.vl.json", "{broken");
        assert!(block_on(panel.notify(ChangeKind::Content)).is_err());
        assert_eq!(panel.state(), PanelState::Stale);
        assert!(panel.last_error().is_some());
        assert_eq!(panel.document().unwrap().to_value().unwrap(), json!({"data": {"values": [1]}}));

        store.insert("a.vl.json", r#"{"data": {"values": [2]}}"#);
        block_on(panel.notify(ChangeKind::File)).unwrap();
        assert_eq!(panel.state(), PanelState::Ready);
        assert!(panel.last_error().is_none());
    }

    #[test]
    fn stale_resolutions_are_discarded() {
        let store = Arc::new(MemoryStore::default().with("a.vl.json", r#"{"data": {"values": [1]}}"#));
        let mut panel = panel_for(store.clone(), "a.vl.json");
        let first = panel.begin_reload();
        store.insert("a.vl.json", r#"{"data": {"values": [2]}}"#);
        let second = panel.begin_reload();
        let (first, second) = block_on(futures::future::join(first.run(), second.run()));
        assert!(panel.apply(second).unwrap());
        assert!(!panel.apply(first).unwrap());
        assert_eq!(panel.descriptor().unwrap().values(), Some(&json!([2])));
    }

    #[test]
    fn inline_panels_ignore_notifications_and_cannot_be_saved() {
        let mut panel = Panel::new(
            PanelSource::Inline {
                payload: json!([{"a": 1}]),
                is_table: true,
                title: "df".to_string(),
                base_path: PathBuf::from("notebooks/analysis.ipynb"),
            },
            Arc::new(MemoryStore::default()),
            Arc::new(MemorySurface::default()),
            PanelConfig::default(),
        );
        block_on(panel.open()).unwrap();
        block_on(panel.notify(ChangeKind::Content)).unwrap();
        assert_eq!(panel.title(), "df");
        assert!(matches!(block_on(panel.save()), Err(Error::UnsupportedSaveTarget(_))));
        let path = block_on(panel.export("df")).unwrap();
        assert_eq!(path, PathBuf::from("notebooks/df.vl.json"));
    }

    #[test]
    fn commands_before_open_fail() {
        let store = Arc::new(MemoryStore::default());
        let panel = panel_for(store, "a.vl.json");
        assert!(matches!(panel.document(), Err(Error::NoView)));
        assert!(matches!(panel.copy_cell(), Err(Error::NoView)));
    }

    #[test]
    fn undo_right_after_open_keeps_the_loaded_spec() {
        let store = Arc::new(MemoryStore::default().with(
            "a.vl.json",
            r#"{"data": {"values": [{"a": 1}]}, "mark": "bar", "encoding": {"x": {"field": "a"}}}"#,
        ));
        let mut panel = panel_for(store.clone(), "a.vl.json");
        block_on(panel.open()).unwrap();
        panel.undo();
        panel.undo();
        block_on(panel.save()).unwrap();
        let saved: JsonValue = serde_json::from_str(&store.content("a.vl.json").unwrap()).unwrap();
        assert_eq!(
            saved,
            json!({"data": {"values": [{"a": 1}]}, "mark": "bar", "encoding": {"x": {"field": "a"}}})
        );
    }

    #[test]
    fn export_does_not_overwrite_existing_documents() {
        let existing = r#"{"data":{"url":"precious.csv"},"mark":"line"}"#;
        let store = Arc::new(
            MemoryStore::default()
                .with("charts/a.vl.json", r#"{"data": {"values": []}, "mark": "bar"}"#)
                .with("charts/other.vl.json", existing),
        );
        let mut panel = panel_for(store.clone(), "charts/a.vl.json");
        block_on(panel.open()).unwrap();
        let err = block_on(panel.export("other")).unwrap_err();
        assert!(matches!(&err, Error::AlreadyExists(p) if p == Path::new("charts/other.vl.json")));
        assert!(err.is_blocking());
        assert_eq!(store.content("charts/other.vl.json").unwrap(), existing);
    }

    #[test]
    fn settings_changes_keep_the_current_spec() {
        let store = Arc::new(
            MemoryStore::default().with("a.vl.json", r#"{"data": {"values": []}, "mark": "bar"}"#),
        );
        let mut panel = panel_for(store, "a.vl.json");
        block_on(panel.open()).unwrap();
        let mut edited = panel.spec().unwrap();
        edited.mark = Some(json!("line"));
        panel.view_mut().unwrap().set_spec(&edited);

        let config = PanelConfig::default().with_host("localhost:8888");
        panel.set_config(config.clone()).unwrap();
        assert_eq!(panel.config(), &config);
        assert_eq!(panel.spec().unwrap().mark, Some(json!("line")));
    }
}
