use std::path::PathBuf;
use std::time::Duration;

use serde_json::{json, Value};

pub mod codes {
    pub const NOT_FOUND: &str = "DB101";
    pub const AMBIGUOUS: &str = "DB102";
    pub const QUERY_FAILED: &str = "DB110";
    pub const METADATA_MISSING: &str = "DB201";
    pub const EMPTY_PACKAGE: &str = "DB202";
    pub const ENCODING: &str = "DB210";
    pub const INTERPRETER_FAILED: &str = "DB301";
    pub const INTERPRETER_TIMEOUT: &str = "DB302";
    pub const WRITE_FAILED: &str = "DB401";
    pub const WRITE_TIMEOUT: &str = "DB402";
}

/// Terminal failures of one conversion.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConvertError {
    #[error("[DB101] no installed package provides `{requested}` (tried {})", join_or_none(.candidates))]
    NotFound {
        requested: String,
        candidates: Vec<String>,
        interpreters: Vec<String>,
    },
    #[error("[DB102] `{requested}` is provided by more than one installed package: {}", .providers.join(", "))]
    Ambiguous {
        requested: String,
        providers: Vec<String>,
    },
    #[error("[DB110] package database query failed: {reason}")]
    QueryFailed { reason: String },
    #[error("[DB201] cannot determine name and version for `{requested}`: {reason}")]
    MetadataMissing {
        requested: String,
        os_package: Option<String>,
        reason: String,
    },
    #[error("[DB202] no importable files of `{requested}` survive mapping under {}", .import_root.display())]
    EmptyPackage {
        requested: String,
        import_root: PathBuf,
    },
    #[error("[DB210] cannot encode {} into the archive: {reason}", .path.display())]
    EncodingError { path: PathBuf, reason: String },
    #[error("[DB301] interpreter {interpreter} failed: {reason}")]
    InterpreterFailed { interpreter: String, reason: String },
    #[error("[DB302] interpreter {interpreter} did not answer within {}s", .timeout.as_secs())]
    InterpreterTimeout {
        interpreter: String,
        timeout: Duration,
    },
    #[error("[DB401] writing {} failed: {reason}", .path.display())]
    WriteFailed { path: PathBuf, reason: String },
    #[error("[DB402] writing {} exceeded {}s", .path.display(), .timeout.as_secs())]
    WriteTimeout { path: PathBuf, timeout: Duration },
}

impl ConvertError {
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => codes::NOT_FOUND,
            Self::Ambiguous { .. } => codes::AMBIGUOUS,
            Self::QueryFailed { .. } => codes::QUERY_FAILED,
            Self::MetadataMissing { .. } => codes::METADATA_MISSING,
            Self::EmptyPackage { .. } => codes::EMPTY_PACKAGE,
            Self::EncodingError { .. } => codes::ENCODING,
            Self::InterpreterFailed { .. } => codes::INTERPRETER_FAILED,
            Self::InterpreterTimeout { .. } => codes::INTERPRETER_TIMEOUT,
            Self::WriteFailed { .. } => codes::WRITE_FAILED,
            Self::WriteTimeout { .. } => codes::WRITE_TIMEOUT,
        }
    }

    /// Failures caused by what was asked for rather than by the host.
    #[must_use]
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. }
                | Self::Ambiguous { .. }
                | Self::MetadataMissing { .. }
                | Self::EmptyPackage { .. }
        )
    }

    pub(crate) fn query(err: &anyhow::Error) -> Self {
        Self::QueryFailed {
            reason: format!("{err:#}"),
        }
    }

    pub(crate) fn write(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        Self::WriteFailed {
            path: path.into(),
            reason: err.to_string(),
        }
    }

    #[must_use]
    pub fn details(&self) -> Value {
        let mut details = match self {
            Self::NotFound {
                requested,
                candidates,
                interpreters,
            } => json!({
                "requested": requested,
                "candidates": candidates,
                "interpreters": interpreters,
                "hint": "install the OS package that ships this module, or check the name is importable",
            }),
            Self::Ambiguous {
                requested,
                providers,
            } => json!({
                "requested": requested,
                "providers": providers,
                "hint": "remove all but one of the providing packages",
            }),
            Self::QueryFailed { reason } => json!({ "reason": reason }),
            Self::MetadataMissing {
                requested,
                os_package,
                reason,
            } => json!({
                "requested": requested,
                "os_package": os_package,
                "reason": reason,
            }),
            Self::EmptyPackage {
                requested,
                import_root,
            } => json!({
                "requested": requested,
                "import_root": import_root,
            }),
            Self::EncodingError { path, reason } | Self::WriteFailed { path, reason } => {
                json!({ "path": path, "reason": reason })
            }
            Self::InterpreterFailed {
                interpreter,
                reason,
            } => json!({ "interpreter": interpreter, "reason": reason }),
            Self::InterpreterTimeout {
                interpreter,
                timeout,
            } => json!({ "interpreter": interpreter, "timeout_secs": timeout.as_secs() }),
            Self::WriteTimeout { path, timeout } => {
                json!({ "path": path, "timeout_secs": timeout.as_secs() })
            }
        };
        if let Value::Object(map) = &mut details {
            map.insert("code".to_string(), Value::String(self.code().to_string()));
        }
        details
    }
}

fn join_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "nothing".to_string()
    } else {
        items.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_codes_and_candidates() {
        let err = ConvertError::NotFound {
            requested: "stupid".into(),
            candidates: vec!["stupid".into(), "python3-stupid".into()],
            interpreters: vec![],
        };
        assert_eq!(
            err.to_string(),
            "[DB101] no installed package provides `stupid` (tried stupid, python3-stupid)"
        );
        assert!(err.is_user_error());
        assert_eq!(err.details()["code"], "DB101");
        assert_eq!(err.details()["candidates"][1], "python3-stupid");
    }

    #[test]
    fn host_failures_are_not_user_errors() {
        let err = ConvertError::WriteTimeout {
            path: PathBuf::from("/tmp/out/x.whl"),
            timeout: Duration::from_secs(3),
        };
        assert!(!err.is_user_error());
        assert_eq!(err.code(), codes::WRITE_TIMEOUT);
        assert_eq!(err.to_string(), "[DB402] writing /tmp/out/x.whl exceeded 3s");
    }
}
