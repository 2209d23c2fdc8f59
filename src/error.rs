use thiserror::Error;

/// Everything that can abort loading an entries document.
///
/// A failed load never touches the tree or the type registry that are currently
/// live, so these are fatal to the reload attempt only.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read entries file: {0}")]
    Io(#[from] std::io::Error),

    #[error("entries document is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("missing required key '{0}'")]
    MissingKey(String),

    #[error("key '{key}' must be {expected}")]
    InvalidField { key: String, expected: &'static str },

    #[error("unknown entry type '{0}'")]
    UnknownType(String),

    #[error("type '{0}' is already defined")]
    DuplicateType(String),

    #[error("type '{name}' derives from '{base}', which is itself a derived type")]
    NestedDerivation { name: String, base: String },

    #[error("type '{name}' has an invalid base '{base}'")]
    InvalidBase { name: String, base: String },
}
