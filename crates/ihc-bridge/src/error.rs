//! CLI error types with miette diagnostics.
//!
//! Maps `ConfigError` and `CoreError` into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use ihc_config::ConfigError;
use ihc_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const CONFIG: i32 = 4;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Configuration ────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(ihc::validation), help("Fix the entry in {path}"))]
    Validation {
        field: String,
        reason: String,
        path: String,
    },

    #[error("Controller {field} is not configured")]
    #[diagnostic(
        code(ihc::missing),
        help(
            "Add it to the [controller] section of {path}\n\
             or set IHC_CONTROLLER__{upper}."
        )
    )]
    Missing {
        field: &'static str,
        upper: String,
        path: String,
    },

    #[error("No password configured for user '{username}'")]
    #[diagnostic(
        code(ihc::no_credentials),
        help(
            "Set IHC_PASSWORD, name a variable with password_env,\n\
             or store it in the system keyring under service 'ihc-bridge'."
        )
    )]
    NoCredentials { username: String },

    #[error(transparent)]
    #[diagnostic(code(ihc::config))]
    Config(Box<figment::Error>),

    // ── Runtime ──────────────────────────────────────────────────────
    #[error("No controller transport is available in this build")]
    #[diagnostic(
        code(ihc::no_transport),
        help("Use `ihc-bridge run --simulate` to exercise the bindings against an in-memory controller.")
    )]
    NoTransport,

    #[error("Could not reach the controller: {message}")]
    #[diagnostic(code(ihc::connection_failed))]
    ConnectionFailed { message: String },

    #[error("Binding engine error: {message}")]
    #[diagnostic(code(ihc::engine))]
    Engine { message: String },

    // ── Serialization ────────────────────────────────────────────────
    #[error("Failed to render config: {0}")]
    #[diagnostic(code(ihc::render))]
    Render(#[from] toml::ser::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Validation { .. } | Self::NoTransport => exit_code::USAGE,
            Self::NoCredentials { .. } => exit_code::AUTH,
            Self::Missing { .. } | Self::Config(_) => exit_code::CONFIG,
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            _ => exit_code::GENERAL,
        }
    }

    /// Attach the config path to configuration errors.
    pub fn from_config(err: ConfigError, path: &std::path::Path) -> Self {
        let path = path.display().to_string();
        match err {
            ConfigError::Validation { field, reason } => Self::Validation {
                field,
                reason,
                path,
            },
            ConfigError::Missing { field } => Self::Missing {
                field,
                upper: field.to_uppercase(),
                path,
            },
            ConfigError::NoCredentials { username } => Self::NoCredentials { username },
            ConfigError::Figment(err) => Self::Config(err),
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ControllerUnavailable => Self::ConnectionFailed {
                message: "no active controller session".into(),
            },
            CoreError::Communication(e) => Self::ConnectionFailed {
                message: e.to_string(),
            },
            other => Self::Engine {
                message: other.to_string(),
            },
        }
    }
}
