//! Errors for the fallible edges around the engine: settings I/O and thread
//! startup. The engine's commands and queries never fail.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StopwatchError {
    #[error("failed to spawn {name} thread")]
    Spawn {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read settings file {}", path.display())]
    ReadSettings {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse settings TOML in {}", path.display())]
    ParseSettings {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to serialize settings")]
    SerializeSettings(#[from] toml::ser::Error),

    #[error("failed to write settings file {}", path.display())]
    WriteSettings {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, StopwatchError>;
