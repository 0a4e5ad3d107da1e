use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The resource categories tracked by the local snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Containers,
    Images,
    Networks,
    Volumes,
    Info,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Containers => "containers",
            ResourceKind::Images => "images",
            ResourceKind::Networks => "networks",
            ResourceKind::Volumes => "volumes",
            ResourceKind::Info => "info",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum DaemonError {
    /// An index address did not resolve against the local snapshot. Nothing
    /// was sent to the engine.
    #[error("cannot address {kind} at index {index} (snapshot has {len})")]
    InvalidAddress {
        kind: ResourceKind,
        index: usize,
        len: usize,
    },

    /// The engine rejected or failed an operation. The snapshot was left as
    /// it was and no refresh was attempted.
    #[error("failed to {op} {target}: {source}")]
    Gateway {
        op: &'static str,
        target: String,
        #[source]
        source: anyhow::Error,
    },

    /// A snapshot refresh failed. When returned from a mutating operation
    /// the mutation has already been applied by the engine; the affected
    /// category is stale until the next successful refresh.
    #[error("failed to fetch {kind}: {source}")]
    Refresh {
        kind: ResourceKind,
        #[source]
        source: anyhow::Error,
    },
}

// Define the primary Result type for session operations
pub type Result<T> = std::result::Result<T, DaemonError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_name_the_failure() {
        let err = DaemonError::InvalidAddress {
            kind: ResourceKind::Containers,
            index: 4,
            len: 2,
        };
        assert_eq!(
            err.to_string(),
            "cannot address containers at index 4 (snapshot has 2)"
        );

        let err = DaemonError::Gateway {
            op: "stop",
            target: "container 1a2b3c4d5e6f".to_string(),
            source: anyhow::anyhow!("container already stopped"),
        };
        assert_eq!(
            err.to_string(),
            "failed to stop container 1a2b3c4d5e6f: container already stopped"
        );

        let err = DaemonError::Refresh {
            kind: ResourceKind::Volumes,
            source: anyhow::anyhow!("connection reset"),
        };
        assert_eq!(err.to_string(), "failed to fetch volumes: connection reset");
    }

    #[test]
    fn gateway_error_keeps_its_cause() {
        let err = DaemonError::Gateway {
            op: "remove",
            target: "image sha256:abcd".to_string(),
            source: anyhow::anyhow!("image in use"),
        };
        let source = std::error::Error::source(&err).expect("cause retained");
        assert_eq!(source.to_string(), "image in use");
    }
}
