use std::path::{Path, PathBuf};

/// Malformed or missing structure in a world, layer or model description.
#[derive(Debug, thiserror::Error)]
pub enum DescriptionError {
    #[error("error reading \"{}\": {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("error loading \"{}\": {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("{context} (in \"{}\")", path.display())]
    Invalid { path: PathBuf, context: String },
    #[error("max number of layers reached, max is {max} (in \"{}\")", path.display())]
    LayerLimit { path: PathBuf, max: usize },
}

impl DescriptionError {
    pub(crate) fn invalid(path: &Path, context: impl Into<String>) -> Self {
        Self::Invalid {
            path: path.to_path_buf(),
            context: context.into(),
        }
    }

    /// The description file the error was found in.
    pub fn path(&self) -> &Path {
        match self {
            Self::Io { path, .. }
            | Self::Parse { path, .. }
            | Self::Invalid { path, .. }
            | Self::LayerLimit { path, .. } => path,
        }
    }
}

/// Failure to create or initialize a declared model plugin.
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    #[error("unknown plugin type \"{plugin_type}\" requested by model \"{model}\"")]
    UnknownType { model: String, plugin_type: String },
    #[error("plugin \"{name}\" of model \"{model}\" failed to initialize: {source}")]
    Initialize {
        model: String,
        name: String,
        #[source]
        source: Box<PluginError>,
    },
    /// Raised by a plugin's own initialization when its configuration is unusable.
    #[error("{0}")]
    Config(String),
}

/// Everything that can abort [`crate::World::make_world`].
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    #[error(transparent)]
    Description(#[from] DescriptionError),
    #[error(transparent)]
    Plugin(#[from] PluginError),
}
