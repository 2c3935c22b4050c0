//! Error types for Mocknest Core

/// Result type alias for Mocknest operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for Mocknest
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Catalog error: {message}")]
    Catalog { message: String },

    #[error("Matching error: {message}")]
    Matching { message: String },

    #[error("Script error: {message}")]
    Script { message: String },

    #[error("Template error: {message}")]
    Template { message: String },

    #[error("Proxy error: {message}")]
    Proxy { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("JavaScript error: {0}")]
    JavaScript(#[from] rquickjs::Error),

    #[error("Generic error: {0}")]
    Generic(String),
}

impl From<String> for Error {
    fn from(message: String) -> Self {
        Self::Generic(message)
    }
}

impl Error {
    /// Create a catalog error
    pub fn catalog<S: Into<String>>(message: S) -> Self {
        Self::Catalog {
            message: message.into(),
        }
    }

    /// Create a matching error
    pub fn matching<S: Into<String>>(message: S) -> Self {
        Self::Matching {
            message: message.into(),
        }
    }

    /// Create a script error
    pub fn script<S: Into<String>>(message: S) -> Self {
        Self::Script {
            message: message.into(),
        }
    }

    /// Create a template error
    pub fn template<S: Into<String>>(message: S) -> Self {
        Self::Template {
            message: message.into(),
        }
    }

    /// Create a proxy error
    pub fn proxy<S: Into<String>>(message: S) -> Self {
        Self::Proxy {
            message: message.into(),
        }
    }

    /// Create a config error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a generic error
    pub fn generic<S: Into<String>>(message: S) -> Self {
        Self::Generic(message.into())
    }
}
