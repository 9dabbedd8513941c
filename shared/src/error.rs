use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required properties: {missing:?}")]
    MissingConfig { missing: Vec<String> },
    #[error("Config file ({}) does not exist or was not found", path.display())]
    ConfigFileNotFound { path: PathBuf },
    #[error("Config file ({}) could not be loaded: {source}", path.display())]
    ConfigFile {
        path: PathBuf,
        #[source]
        source: PropertiesError,
    },
    #[error("Unsupported or unknown config: {0}")]
    UnknownConfigKey(String),
}

impl ConfigError {
    /// True for both flavours of properties-file failure.
    pub fn is_file_error(&self) -> bool {
        matches!(
            self,
            ConfigError::ConfigFileNotFound { .. } | ConfigError::ConfigFile { .. }
        )
    }
}

/// Failures while reading or parsing a `.properties` document.
#[derive(Error, Debug)]
pub enum PropertiesError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed \\uXXXX escape on line {line}")]
    MalformedEscape { line: usize },
}

pub type Result<T> = std::result::Result<T, ConfigError>;
