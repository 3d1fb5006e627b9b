use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Application-level errors for HX-300
#[derive(Error, Debug)]
pub enum AppError {
    /// A refresh was requested for a category that has no refresh pass
    #[error("Unknown or non-refreshable category: {name}")]
    UnknownCategory { name: String },

    /// Benchmark could not be started
    #[error("Benchmark error: {message}")]
    Benchmark { message: String },

    /// Invalid command-line configuration
    #[error("Invalid configuration: {message}")]
    Config { message: String },

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Terminal/display error
    #[error("Display error: {message}")]
    Display { message: String },

    /// Table export failed
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AppError {
    pub fn unknown_category(name: impl Into<String>) -> Self {
        Self::UnknownCategory { name: name.into() }
    }

    pub fn benchmark(message: impl Into<String>) -> Self {
        Self::Benchmark {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn display(message: impl Into<String>) -> Self {
        Self::Display {
            message: message.into(),
        }
    }
}

/// Why a probe could not produce its fields.
///
/// Every variant is recoverable; the orchestrator counts it and moves on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    /// Privileged source while running as a regular user
    #[error("{source_name}: need to be root")]
    PermissionDenied { source_name: String },

    /// Optional tool, device or kernel interface is absent
    #[error("{source_name}: unavailable ({message})")]
    SourceUnavailable { source_name: String, message: String },

    /// Live sample could not be read this time
    #[error("{source_name}: read failed ({message})")]
    TransientReadFailure { source_name: String, message: String },

    /// Value was read but fails a sanity check
    #[error("{source_name}: implausible value ({message})")]
    DataImplausible { source_name: String, message: String },

    /// A fact this probe derives from has not been determined yet
    #[error("{source_name}: missing prerequisite {prerequisite}")]
    MissingPrerequisite {
        source_name: String,
        prerequisite: String,
    },
}

impl ProbeError {
    pub fn permission_denied(source_name: impl Into<String>) -> Self {
        Self::PermissionDenied {
            source_name: source_name.into(),
        }
    }

    pub fn unavailable(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    pub fn transient(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TransientReadFailure {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    pub fn implausible(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DataImplausible {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    pub fn missing(source_name: impl Into<String>, prerequisite: impl Into<String>) -> Self {
        Self::MissingPrerequisite {
            source_name: source_name.into(),
            prerequisite: prerequisite.into(),
        }
    }

    /// Whether the failure will repeat on every call for this process.
    ///
    /// Permanent failures disable the probe in the skip-cache; transient
    /// reads and missing prerequisites are retried on the next pass.
    pub fn is_permanent(&self) -> bool {
        !matches!(
            self,
            Self::TransientReadFailure { .. } | Self::MissingPrerequisite { .. }
        )
    }

    /// Failures that are part of normal unprivileged operation
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            Self::PermissionDenied { .. } | Self::SourceUnavailable { .. }
        )
    }
}
