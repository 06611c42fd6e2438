use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config directory could not be determined")]
    ConfigDirNotFound,

    #[error(
        "settings file not found. Checked:\n\
        - current directory: pragma.local.yaml, .pragma.local.yaml, pragma.yaml, .pragma.yaml\n\
        - the ./.pragma/ directory\n\
        - ~/.config/pragma/pragma.yaml\n\
        Set PRAGMA_CONFIG_PATH to point at a file directly"
    )]
    SettingsFileNotFound,

    #[error("invalid settings in {path}: {source}")]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid poll settings for {key}: {reason}")]
    InvalidPoll { key: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
