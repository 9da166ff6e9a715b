// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::io::ErrorKind;
use std::path::PathBuf;
use thiserror::Error;

use super::{ConfigError, ErrorCategory, ErrorSeverity, RegistryError, StorageError};

pub type Result<T> = std::result::Result<T, CorpusError>;

/// The error every stage, operator and framework returns.
///
/// Each variant carries enough information to be classified into an
/// [`ErrorSeverity`] and [`ErrorCategory`] and to decide whether a retry makes
/// sense. Stage-fatal conditions (missing input, bad configuration, missing
/// required components) are never retryable.
#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("Input path not found: {}", .0.display())]
    InputNotFound(PathBuf),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Required {kind} not found: {name}")]
    MissingRequirement { kind: &'static str, name: String },
    #[error("{component} cannot {action} while {state}")]
    InvalidState {
        component: String,
        action: &'static str,
        state: String,
    },
    #[error("Data error: {0}")]
    Data(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Timed out: {0}")]
    Timeout(String),
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),
    #[error("Operator '{operator}' failed: {message}")]
    OperatorFailed { operator: String, message: String },
    #[error("Run stopped before stage '{0}'")]
    Stopped(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CorpusError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CorpusError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn operator_failed(operator: impl Into<String>, message: impl Into<String>) -> Self {
        CorpusError::OperatorFailed {
            operator: operator.into(),
            message: message.into(),
        }
    }

    /// Short, stable name of the error kind, used as the frequency key in reports.
    pub fn kind_name(&self) -> &'static str {
        match self {
            CorpusError::InputNotFound(_) => "InputNotFound",
            CorpusError::Storage(StorageError::Io { .. }) => "StorageIo",
            CorpusError::Storage(StorageError::KeyCollision { .. }) => "KeyCollision",
            CorpusError::Storage(StorageError::MissingColumn { .. }) => "MissingColumn",
            CorpusError::Storage(_) => "Storage",
            CorpusError::Registry(RegistryError::NotFound { .. }) => "RegistryLookup",
            CorpusError::Registry(_) => "Registry",
            CorpusError::Config(_) => "Config",
            CorpusError::MissingRequirement { .. } => "MissingRequirement",
            CorpusError::InvalidState { .. } => "InvalidState",
            CorpusError::Data(_) => "Data",
            CorpusError::Network(_) => "Network",
            CorpusError::Timeout(_) => "Timeout",
            CorpusError::Io { .. } => "Io",
            CorpusError::ResourceExhausted(_) => "ResourceExhausted",
            CorpusError::OperatorFailed { .. } => "OperatorFailed",
            CorpusError::Stopped(_) => "Stopped",
            CorpusError::Internal(_) => "Internal",
        }
    }

    /// Automatic classification of this error.
    pub fn classify(&self) -> (ErrorSeverity, ErrorCategory) {
        use ErrorCategory as C;
        use ErrorSeverity as S;

        match self {
            CorpusError::ResourceExhausted(_) => (S::Critical, C::System),
            CorpusError::Network(_) | CorpusError::Timeout(_) => (S::High, C::Network),
            CorpusError::Io { source, .. } | CorpusError::Storage(StorageError::Io { source, .. }) => {
                classify_io(source.kind())
            }
            CorpusError::InputNotFound(_)
            | CorpusError::Config(_)
            | CorpusError::Registry(_)
            | CorpusError::MissingRequirement { .. }
            | CorpusError::Storage(StorageError::KeyCollision { .. })
            | CorpusError::Storage(StorageError::UnsupportedFormat(_))
            | CorpusError::Storage(StorageError::ProtectedInput { .. })
            | CorpusError::Storage(StorageError::MissingSnapshot { .. }) => (S::High, C::Config),
            CorpusError::Data(_) | CorpusError::Storage(_) => (S::Medium, C::Data),
            CorpusError::InvalidState { .. } | CorpusError::Internal(_) => (S::High, C::Logic),
            CorpusError::Stopped(_) => (S::Low, C::System),
            CorpusError::OperatorFailed { .. } => (S::Medium, C::Unknown),
        }
    }

    /// Whether the retry mechanism may try the failed call again.
    ///
    /// Connection, timeout and transient I/O failures qualify. A missing file
    /// or a permission problem will not fix itself and is not retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            CorpusError::Network(_) | CorpusError::Timeout(_) => true,
            CorpusError::Io { source, .. } | CorpusError::Storage(StorageError::Io { source, .. }) => {
                !matches!(
                    source.kind(),
                    ErrorKind::NotFound | ErrorKind::PermissionDenied
                )
            }
            _ => false,
        }
    }
}

fn classify_io(kind: ErrorKind) -> (ErrorSeverity, ErrorCategory) {
    match kind {
        ErrorKind::NotFound | ErrorKind::PermissionDenied => {
            (ErrorSeverity::High, ErrorCategory::Config)
        }
        ErrorKind::ConnectionRefused
        | ErrorKind::ConnectionReset
        | ErrorKind::ConnectionAborted
        | ErrorKind::NotConnected
        | ErrorKind::TimedOut => (ErrorSeverity::High, ErrorCategory::Network),
        ErrorKind::OutOfMemory => (ErrorSeverity::Critical, ErrorCategory::System),
        ErrorKind::InvalidData | ErrorKind::UnexpectedEof => {
            (ErrorSeverity::Medium, ErrorCategory::Data)
        }
        _ => (ErrorSeverity::Critical, ErrorCategory::System),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_table() {
        struct TestCase {
            name: &'static str,
            error: CorpusError,
            severity: ErrorSeverity,
            category: ErrorCategory,
            retryable: bool,
        }

        let test_cases = vec![
            TestCase {
                name: "missing input is a config problem",
                error: CorpusError::InputNotFound(PathBuf::from("/nope")),
                severity: ErrorSeverity::High,
                category: ErrorCategory::Config,
                retryable: false,
            },
            TestCase {
                name: "timeouts are network problems",
                error: CorpusError::Timeout("llm request".into()),
                severity: ErrorSeverity::High,
                category: ErrorCategory::Network,
                retryable: true,
            },
            TestCase {
                name: "connection reset io is retryable network",
                error: CorpusError::io(
                    "/tmp/x",
                    std::io::Error::new(ErrorKind::ConnectionReset, "reset"),
                ),
                severity: ErrorSeverity::High,
                category: ErrorCategory::Network,
                retryable: true,
            },
            TestCase {
                name: "permission denied is not retried",
                error: CorpusError::Storage(StorageError::io(
                    "/tmp/x",
                    std::io::Error::new(ErrorKind::PermissionDenied, "denied"),
                )),
                severity: ErrorSeverity::High,
                category: ErrorCategory::Config,
                retryable: false,
            },
            TestCase {
                name: "malformed data is medium",
                error: CorpusError::Data("bad row".into()),
                severity: ErrorSeverity::Medium,
                category: ErrorCategory::Data,
                retryable: false,
            },
            TestCase {
                name: "invalid state is a logic error",
                error: CorpusError::InvalidState {
                    component: "framework".into(),
                    action: "run",
                    state: "initialized".into(),
                },
                severity: ErrorSeverity::High,
                category: ErrorCategory::Logic,
                retryable: false,
            },
            TestCase {
                name: "registry lookup failure is fatal config",
                error: CorpusError::Registry(RegistryError::NotFound {
                    name: "x".into(),
                    registry: "operator".into(),
                }),
                severity: ErrorSeverity::High,
                category: ErrorCategory::Config,
                retryable: false,
            },
            TestCase {
                name: "key collision is config",
                error: CorpusError::Storage(StorageError::KeyCollision { key: "k".into() }),
                severity: ErrorSeverity::High,
                category: ErrorCategory::Config,
                retryable: false,
            },
            TestCase {
                name: "resource exhaustion is critical",
                error: CorpusError::ResourceExhausted("memory".into()),
                severity: ErrorSeverity::Critical,
                category: ErrorCategory::System,
                retryable: false,
            },
        ];

        for tc in test_cases {
            let (severity, category) = tc.error.classify();
            assert_eq!(severity, tc.severity, "severity mismatch for '{}'", tc.name);
            assert_eq!(category, tc.category, "category mismatch for '{}'", tc.name);
            assert_eq!(
                tc.error.is_retryable(),
                tc.retryable,
                "retryable mismatch for '{}'",
                tc.name
            );
        }
    }

    #[test]
    fn test_display_messages() {
        let err = CorpusError::MissingRequirement {
            kind: "operator",
            name: "text_splitter".into(),
        };
        assert_eq!(err.to_string(), "Required operator not found: text_splitter");

        let err = CorpusError::InputNotFound(PathBuf::from("/data/missing.jsonl"));
        assert_eq!(err.to_string(), "Input path not found: /data/missing.jsonl");
    }
}
