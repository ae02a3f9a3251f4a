use thiserror::Error;

/// Validation failures raised while turning request parameters into SQL.
///
/// All variants are caller errors: reported once, never retried. Database
/// failures are a separate category owned by the execution layer.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BuildError {
    /// Malformed value: unparseable operator, bad coercion, bad direction.
    #[error("invalid parameter value: {0}")]
    InvalidParameter(String),

    /// A name with no schema mapping, anywhere it may appear.
    #[error("unknown field `{0}`")]
    UnresolvableField(String),

    /// Structurally invalid combination of otherwise valid parts.
    #[error("invalid query: {0}")]
    InvalidQuery(String),
}

/// Wrapper surfaced to the caller, carrying the offending parameter name
/// when the failing stage knows it.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryBuildError {
    pub param: Option<String>,
    pub source: BuildError,
}

impl QueryBuildError {
    pub fn new(source: BuildError) -> Self {
        Self {
            param: None,
            source,
        }
    }

    pub fn for_param(param: impl Into<String>, source: BuildError) -> Self {
        Self {
            param: Some(param.into()),
            source,
        }
    }
}

impl std::fmt::Display for QueryBuildError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.param {
            Some(p) => write!(f, "query build failed for parameter `{}`: {}", p, self.source),
            None => write!(f, "query build failed: {}", self.source),
        }
    }
}

impl std::error::Error for QueryBuildError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

impl From<BuildError> for QueryBuildError {
    fn from(source: BuildError) -> Self {
        QueryBuildError::new(source)
    }
}
