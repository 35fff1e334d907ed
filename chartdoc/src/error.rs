use std::path::PathBuf;

use thiserror::Error;

/// The primary error type that can be produced by chartdoc.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to parse content as {0}: {1}")]
    Format(String, String),
    #[error("failed to load data from {0}: {1}")]
    DataLoad(String, Box<Error>),
    #[error(
        "\"{0}\" is not a valid name for a file - names must have nonzero length, \
         and cannot include \"/\", \"\\\", or \":\""
    )]
    InvalidName(String),
    #[error("cannot save {0}: source file type is not a chart document (.vl.json), export it instead")]
    UnsupportedSaveTarget(PathBuf),
    #[error("cannot export to {0}: a file with that name already exists")]
    AlreadyExists(PathBuf),
    #[error("unsupported data format: {0}")]
    UnsupportedFormat(String),
    #[error("cannot determine data format of: {0}")]
    CannotDetermineFormat(String),
    #[error("no such document or data file: {0}")]
    NotFound(PathBuf),
    #[error("I/O error {0}: {1}")]
    Io(String, std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("failed to render template \"{0}\": {1}")]
    TemplateRender(String, handlebars::RenderError),
    #[error("failed to register template \"{0}\": {1}")]
    TemplateRegister(String, Box<handlebars::TemplateError>),
    #[error("no view has been created yet")]
    NoView,
}

impl Error {
    /// Shorthand for constructing a [`Error::Format`] error.
    pub fn format<F: ToString, E: ToString>(format: F, err: E) -> Self {
        Self::Format(format.to_string(), err.to_string())
    }

    /// Wraps this error as a [`Error::DataLoad`] error for the given location.
    pub fn while_loading<L: ToString>(self, location: L) -> Self {
        Self::DataLoad(location.to_string(), Box::new(self))
    }

    /// Errors of this class are shown as a blocking dialog at the command
    /// boundary. Everything else is a non-blocking notification.
    pub fn is_blocking(&self) -> bool {
        matches!(
            self,
            Self::InvalidName(_) | Self::UnsupportedSaveTarget(_) | Self::AlreadyExists(_)
        )
    }
}
