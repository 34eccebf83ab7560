use std::fmt;

/// Error types for the Ansible import workflow
#[derive(Debug)]
pub enum ImportError {
    /// Inventory missing, malformed, or one of its hosts unreachable
    Parse(String),

    /// Resolved input failed validation
    Validation(String),

    /// A cluster with the same name is already managed
    DuplicateName { name: String, suggestion: String },

    /// Filesystem operation failed
    Io {
        context: String,
        source: anyhow::Error,
    },

    /// Fetching configuration from a deployment host failed
    RemoteFetch { host: String, message: String },

    /// Cluster metadata could not be encoded or decoded
    Metadata(String),

    /// No cluster with this name in the metadata store
    ClusterNotFound(String),
}

impl ImportError {
    /// Filesystem failure with a description of what was being attempted
    pub fn io(context: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        ImportError::Io {
            context: context.into(),
            source: source.into(),
        }
    }

    /// Duplicate-name rejection with the standard remediation hint
    pub fn duplicate_name(name: &str) -> Self {
        ImportError::DuplicateName {
            name: name.to_string(),
            suggestion: "Please use --rename `NAME` to specify another name (You can use `tiup-cluster list` to see all clusters)".to_string(),
        }
    }

    /// Actionable next step for the operator, if there is one
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            ImportError::DuplicateName { suggestion, .. } => Some(suggestion),
            ImportError::ClusterNotFound(_) => {
                Some("You can use `tiup-cluster list` to see all clusters")
            }
            _ => None,
        }
    }
}

impl fmt::Display for ImportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportError::Parse(msg) => {
                write!(f, "Failed to parse inventory: {}", msg)
            }
            ImportError::Validation(msg) => write!(f, "{}", msg),
            ImportError::DuplicateName { name, .. } => {
                write!(f, "Cluster name '{}' is duplicated", name)
            }
            // The cause is reported through `source`
            ImportError::Io { context, .. } => write!(f, "{}", context),
            ImportError::RemoteFetch { host, message } => {
                write!(f, "Failed to fetch configuration from {}: {}", host, message)
            }
            ImportError::Metadata(msg) => {
                write!(f, "Invalid cluster metadata: {}", msg)
            }
            ImportError::ClusterNotFound(name) => {
                write!(f, "Cluster '{}' not found", name)
            }
        }
    }
}

impl std::error::Error for ImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ImportError::Io { source, .. } => {
                let cause: &(dyn std::error::Error + 'static) = source.as_ref();
                Some(cause)
            }
            _ => None,
        }
    }
}

impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::io("I/O error", err)
    }
}

impl From<serde_yaml::Error> for ImportError {
    fn from(err: serde_yaml::Error) -> Self {
        ImportError::Metadata(err.to_string())
    }
}

impl From<serde_json::Error> for ImportError {
    fn from(err: serde_json::Error) -> Self {
        ImportError::Metadata(err.to_string())
    }
}

/// Result type for import operations
pub type ImportResult<T> = Result<T, ImportError>;
