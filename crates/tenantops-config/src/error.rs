use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration directory not found")]
    ConfigDirNotFound,

    #[error("{0} environment variable must be set")]
    MissingEnvVar(String),

    #[error("{var} has an invalid value: {value}")]
    InvalidEnvVar { var: String, value: String },

    #[error(
        "Quota defaults file not found. Looked in:\n\
        - $TENANTOPS_QUOTA_DEFAULTS\n\
        - ./conf/defaults.ini, ./defaults.ini\n\
        - ~/.config/tenantops/defaults.ini"
    )]
    DefaultsFileNotFound,

    #[error("Failed to load {path}: {source}")]
    Load {
        path: String,
        #[source]
        source: config::ConfigError,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
