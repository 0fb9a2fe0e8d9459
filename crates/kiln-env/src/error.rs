use thiserror::Error;

use kiln_version::{ParseConstraintError, ParseVersionError};

use crate::package::{ParseChannelError, ParseMatchSpecError, ParsePlatformError};
use crate::repository::ParseVirtualPackageError;
use crate::solver::{CyclicDependencyError, SolveError};

#[derive(Error, Debug)]
pub enum EnvError {
    // Caller input errors
    #[error("Invalid version: {0}")]
    ParseVersion(#[from] ParseVersionError),

    #[error("Invalid version spec: {0}")]
    ParseConstraint(#[from] ParseConstraintError),

    #[error("Invalid match spec: {0}")]
    ParseMatchSpec(#[from] ParseMatchSpecError),

    #[error("Invalid platform: {0}")]
    ParsePlatform(#[from] ParsePlatformError),

    #[error("Invalid channel: {0}")]
    ParseChannel(#[from] ParseChannelError),

    #[error("Invalid virtual package: {0}")]
    ParseVirtualPackage(#[from] ParseVirtualPackageError),

    // Solver errors
    #[error(transparent)]
    Solve(#[from] SolveError),

    #[error(transparent)]
    Cyclic(#[from] CyclicDependencyError),

    // Collaborator errors
    #[error("Failed to fetch {channel}/{subdir}")]
    Fetch {
        channel: String,
        subdir: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Failed to read installed state")]
    InstalledState(#[source] anyhow::Error),

    #[error("Failed to execute transaction")]
    Execute(#[source] anyhow::Error),

    #[error("Solver task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Lock file error: {0}")]
    Lock(String),

    // Config errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl EnvError {
    /// Returns true if retrying with a larger budget could succeed.
    ///
    /// Only a solver timeout qualifies; every other error is either a caller
    /// input fault, a definitive answer, or a collaborator failure the caller
    /// has to inspect.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EnvError::Solve(SolveError::Timeout))
    }
}

pub type Result<T> = std::result::Result<T, EnvError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_only_timeout_is_retryable() {
        assert!(EnvError::Solve(SolveError::Timeout).is_retryable());
        assert!(!EnvError::Config("bad".to_string()).is_retryable());
        assert!(!EnvError::Execute(anyhow::anyhow!("disk full")).is_retryable());
    }

    #[test]
    fn test_fetch_error_keeps_source() {
        let err = EnvError::Fetch {
            channel: "conda-forge".to_string(),
            subdir: "linux-64".to_string(),
            source: anyhow::anyhow!("connection reset"),
        };
        assert_eq!(err.to_string(), "Failed to fetch conda-forge/linux-64");
        assert_eq!(err.source().map(|e| e.to_string()), Some("connection reset".to_string()));
    }

    #[test]
    fn test_parse_errors_convert() {
        let err: EnvError = "1..2".parse::<kiln_version::Version>().unwrap_err().into();
        assert!(matches!(err, EnvError::ParseVersion(_)));
    }
}
