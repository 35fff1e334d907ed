//! Configuration-related functionality for chartdoc.

use std::{fs, path::Path};

use eyre::{Result, WrapErr};
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::{format::DataFormat, Error, PathResolver};

/// Options passed on to the rendering surface whenever a view is created.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SurfaceConfig(Map<String, Value>);

impl Default for SurfaceConfig {
    fn default() -> Self {
        let mut m = Map::new();
        // Data always comes from the document, so users may not pick
        // another data source from within the surface.
        m.insert("showDataSourceSelector".to_string(), json!(false));
        m.insert("serverUrl".to_string(), Value::Null);
        m.insert("hideHeader".to_string(), json!(true));
        m.insert("hideFooter".to_string(), json!(true));
        m.insert("relatedViews".to_string(), json!("initiallyCollapsed"));
        m.insert("wildcards".to_string(), json!("enabled"));
        Self(m)
    }
}

impl SurfaceConfig {
    /// Set the value associated with the given key.
    pub fn set<K, V>(&mut self, key: K, value: V) -> Result<Option<Value>, Error>
    where
        K: AsRef<str>,
        V: Serialize,
    {
        let value = serde_json::to_value(value)?;
        let key = key.as_ref().to_string();
        let maybe_prev = self.0.insert(key, value);
        Ok(maybe_prev)
    }

    /// Get a reference to the value associated with the given key.
    pub fn get<K: AsRef<str>>(&self, key: K) -> Option<&Value> {
        self.0.get(key.as_ref())
    }
}

impl From<SurfaceConfig> for Value {
    fn from(cfg: SurfaceConfig) -> Self {
        Value::Object(cfg.0)
    }
}

/// Configuration owned by a single panel.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct PanelConfig {
    /// The host (and port) of the runtime serving the document store. Data
    /// references naming any other host are fetched by the rendering surface
    /// itself.
    pub host: Option<String>,
    /// Options for the rendering surface.
    pub surface: SurfaceConfig,
}

impl PanelConfig {
    /// Load a configuration from a JSON or YAML file. Options missing from the
    /// file take their default values.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        debug!("Attempting to load config file: {}", path.display());
        let content = fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read config file {}", path.display()))?;
        let config: PanelConfig = match DataFormat::from_path(path)? {
            DataFormat::Json => serde_json::from_str(&content).map_err(Error::from),
            DataFormat::Yaml => serde_yaml::from_str(&content).map_err(Error::from),
            other => Err(Error::UnsupportedFormat(other.to_string())),
        }
        .wrap_err_with(|| format!("failed to parse config file {}", path.display()))?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Convenience method for setting the runtime host.
    pub fn with_host<S: AsRef<str>>(mut self, host: S) -> Self {
        self.host = Some(host.as_ref().to_string());
        self
    }

    /// A path resolver for this configuration's runtime host.
    pub fn resolver(&self) -> PathResolver {
        PathResolver::new(self.host.as_deref())
    }
}
