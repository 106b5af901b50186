//! CLI error handling

use std::fmt;

use provision_errors::UserFacingError;

/// CLI-specific error type
#[derive(Debug)]
pub enum CliError {
    /// Configuration error
    Config(provision_errors::ConfigError),
    /// Provisioning or store error
    Provision(provision_errors::Error),
    /// Invalid command arguments
    InvalidArguments(String),
    /// I/O error
    Io(std::io::Error),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(e) => write!(f, "Configuration error: {e}"),
            CliError::Provision(e) => {
                let message = e.user_message();
                write!(f, "{message}")?;
                if let Some(code) = e.user_code() {
                    write!(f, "\n  Code: {code}")?;
                }
                if let Some(hint) = e.user_hint() {
                    write!(f, "\n  Hint: {hint}")?;
                }
                if e.is_retryable() {
                    write!(f, "\n  Retry: safe to retry this operation.")?;
                }
                Ok(())
            }
            CliError::InvalidArguments(msg) => write!(f, "Invalid arguments: {msg}"),
            CliError::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl CliError {
    /// Machine-readable form printed in `--json` mode
    pub fn to_json(&self) -> serde_json::Value {
        let mut body = serde_json::json!({ "error": self.to_string() });
        let (code, detail) = match self {
            CliError::Provision(e) => (e.user_code(), serde_json::to_value(e).ok()),
            CliError::Config(e) => (e.user_code(), serde_json::to_value(e).ok()),
            CliError::InvalidArguments(_) => (Some("cli.invalid_arguments"), None),
            CliError::Io(_) => (Some("error.io"), None),
        };
        if let Some(code) = code {
            body["code"] = code.into();
        }
        if let Some(detail) = detail {
            body["detail"] = detail;
        }
        body
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Config(e) => Some(e),
            CliError::Provision(e) => Some(e),
            CliError::Io(e) => Some(e),
            CliError::InvalidArguments(_) => None,
        }
    }
}

impl From<provision_errors::ConfigError> for CliError {
    fn from(e: provision_errors::ConfigError) -> Self {
        CliError::Config(e)
    }
}

impl From<provision_errors::Error> for CliError {
    fn from(e: provision_errors::Error) -> Self {
        match e {
            provision_errors::Error::Config(e) => CliError::Config(e),
            other => CliError::Provision(other),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        CliError::Io(e)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::Provision(e.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use provision_errors::{ConfigError, ProvisionError};

    #[test]
    fn test_provision_error_shows_code_and_hint() {
        let err = CliError::from(provision_errors::Error::from(
            ProvisionError::ImageNotFound {
                name: "debian".to_string(),
            },
        ));
        let text = err.to_string();
        assert!(text.contains("debian"));
        assert!(text.contains("Code: provision.image_not_found"));
        assert!(text.contains("Hint:"));
    }

    #[test]
    fn test_json_error_carries_code_and_detail() {
        let err = CliError::from(provision_errors::Error::from(
            ProvisionError::SizeMismatch {
                name: "debian".to_string(),
                expected: 200,
                actual: 100,
            },
        ));
        let json = err.to_json();
        assert_eq!(json["code"], "provision.size_mismatch");
        assert_eq!(json["detail"]["Provision"]["SizeMismatch"]["expected"], 200);
        assert!(json["error"].as_str().unwrap().contains("debian"));

        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let json = CliError::from(provision_errors::Error::io_with_path(&io, "/srv")).to_json();
        assert_eq!(json["detail"]["Io"]["kind"], "permission_denied");
    }

    #[test]
    fn test_config_errors_are_unwrapped() {
        let err = CliError::from(provision_errors::Error::from(ConfigError::InvalidValue {
            field: "provision.chunk_size".to_string(),
            value: "0".to_string(),
        }));
        assert!(matches!(err, CliError::Config(_)));
        assert!(err.to_string().starts_with("Configuration error:"));
    }
}
