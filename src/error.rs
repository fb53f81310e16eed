use thiserror::Error;

/// Errors returned while building urls and requests
#[derive(Debug, Error)]
pub enum Error {
    /// The given string is not a valid URI reference
    #[error("malformed or unsupported URI '{0}'")]
    MalformedUrl(String),

    /// The script path is not a prefix of the url path
    #[error("script path '{script_path}' doesn't match path '{path}'")]
    ScriptPathMismatch { script_path: String, path: String },

    /// An input map holds a value which is neither a scalar nor a nested map
    #[error("invalid value type for input key '{key}'")]
    InvalidInputType { key: String },

    /// A trusted proxy entry is neither an ip address nor a CIDR block
    #[error("invalid trusted proxy: {0}")]
    InvalidProxy(#[from] ipnet::AddrParseError),

    /// An url filter pattern failed to compile
    #[error("invalid url filter: {0}")]
    InvalidFilter(#[from] regex::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
