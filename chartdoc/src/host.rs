//! Interfaces to the host environment: the document being edited and the
//! store that holds it and its data files.

use std::{
    collections::HashMap,
    fs, io,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use log::debug;

use crate::{DocumentContent, Error};

/// The content of a file in a [`ContentStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contents {
    pub path: PathBuf,
    pub content: String,
}

/// A store of documents and data files, addressed by store-relative paths.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Fetch the content of the file at the given path.
    async fn get(&self, path: &Path) -> Result<Contents, Error>;

    /// Create or overwrite the file at the given path.
    async fn save(&self, path: &Path, content: &str) -> Result<(), Error>;

    /// Whether or not a file exists at the given path.
    async fn exists(&self, path: &Path) -> Result<bool, Error>;
}

/// The document a panel is bound to.
#[async_trait]
pub trait DocumentModel: Send + Sync {
    /// The store-relative path of the document.
    fn path(&self) -> &Path;

    /// The current text of the document.
    async fn read(&self) -> Result<String, Error>;

    /// Replace the document with the given content and persist it.
    async fn write(&self, content: &DocumentContent) -> Result<(), Error>;
}

/// A [`ContentStore`] backed by a directory on the local file system.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    /// Constructor.
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn full_path(&self, path: &Path) -> PathBuf {
        self.root.join(path)
    }
}

#[async_trait]
impl ContentStore for FsStore {
    async fn get(&self, path: &Path) -> Result<Contents, Error> {
        let full_path = self.full_path(path);
        let content = fs::read_to_string(&full_path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => Error::NotFound(path.to_path_buf()),
            _ => Error::Io(
                format!("while trying to read from {}", full_path.display()),
                e,
            ),
        })?;
        debug!("Read {} bytes from {}", content.len(), full_path.display());
        Ok(Contents {
            path: path.to_path_buf(),
            content,
        })
    }

    async fn save(&self, path: &Path, content: &str) -> Result<(), Error> {
        let full_path = self.full_path(path);
        if let Some(parent) = full_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.is_dir() {
                fs::create_dir_all(parent).map_err(|e| {
                    Error::Io(format!("while trying to create {}", parent.display()), e)
                })?;
                debug!("Created path: {}", parent.display());
            }
        }
        fs::write(&full_path, content).map_err(|e| {
            Error::Io(
                format!("while trying to write to {}", full_path.display()),
                e,
            )
        })?;
        debug!("Wrote {} bytes to {}", content.len(), full_path.display());
        Ok(())
    }

    async fn exists(&self, path: &Path) -> Result<bool, Error> {
        let full_path = self.full_path(path);
        match fs::metadata(&full_path) {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::Io(
                format!("while trying to inspect {}", full_path.display()),
                e,
            )),
        }
    }
}

/// A [`ContentStore`] that keeps everything in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    files: Mutex<HashMap<PathBuf, String>>,
}

impl MemoryStore {
    /// Convenience method for constructing a store with the given file.
    pub fn with<P: AsRef<Path>, C: ToString>(self, path: P, content: C) -> Self {
        self.insert(path, content);
        self
    }

    /// Insert or replace a file.
    pub fn insert<P: AsRef<Path>, C: ToString>(&self, path: P, content: C) {
        self.lock()
            .insert(path.as_ref().to_path_buf(), content.to_string());
    }

    /// The current content of the file at the given path, if any.
    pub fn content<P: AsRef<Path>>(&self, path: P) -> Option<String> {
        self.lock().get(path.as_ref()).cloned()
    }

    pub fn contains<P: AsRef<Path>>(&self, path: P) -> bool {
        self.lock().contains_key(path.as_ref())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<PathBuf, String>> {
        // A poisoned lock only means another thread panicked mid-insert; the
        // map itself is still usable.
        self.files.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn get(&self, path: &Path) -> Result<Contents, Error> {
        let content = self
            .content(path)
            .ok_or_else(|| Error::NotFound(path.to_path_buf()))?;
        Ok(Contents {
            path: path.to_path_buf(),
            content,
        })
    }

    async fn save(&self, path: &Path, content: &str) -> Result<(), Error> {
        self.insert(path, content);
        Ok(())
    }

    async fn exists(&self, path: &Path) -> Result<bool, Error> {
        Ok(self.contains(path))
    }
}

/// A document living in a [`ContentStore`].
pub struct StoreDocument {
    store: Arc<dyn ContentStore>,
    path: PathBuf,
}

impl StoreDocument {
    /// Constructor.
    pub fn new<P: AsRef<Path>>(store: Arc<dyn ContentStore>, path: P) -> Self {
        Self {
            store,
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl std::fmt::Debug for StoreDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreDocument")
            .field("path", &self.path)
            .finish()
    }
}

#[async_trait]
impl DocumentModel for StoreDocument {
    fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> Result<String, Error> {
        Ok(self.store.get(&self.path).await?.content)
    }

    async fn write(&self, content: &DocumentContent) -> Result<(), Error> {
        self.store.save(&self.path, &content.to_json()?).await
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use futures::executor::block_on;

    #[test]
    fn fs_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path());
        block_on(store.save(Path::new("nested/a.csv"), "a,b\n1,2")).unwrap();
        let contents = block_on(store.get(Path::new("nested/a.csv"))).unwrap();
        assert_eq!(contents.content, "a,b\n1,2");
        assert!(matches!(
            block_on(store.get(Path::new("missing.csv"))),
            Err(Error::NotFound(_))
        ));
        assert!(block_on(store.exists(Path::new("nested/a.csv"))).unwrap());
        assert!(!block_on(store.exists(Path::new("missing.csv"))).unwrap());
    }

    #[test]
    fn store_document_reads_and_writes() {
        let store = Arc::new(MemoryStore::default().with("c.vl.json", "{}"));
        let doc = StoreDocument::new(store.clone(), "c.vl.json");
        assert_eq!(block_on(doc.read()).unwrap(), "{}");
        let content = DocumentContent {
            data: Some(crate::DataDescriptor::inline(vec![1, 2])),
            ..Default::default()
        };
        block_on(doc.write(&content)).unwrap();
        let saved: serde_json::Value =
            serde_json::from_str(&store.content("c.vl.json").unwrap()).unwrap();
        assert_eq!(saved, serde_json::json!({"data": {"values": [1, 2]}}));
    }
}
