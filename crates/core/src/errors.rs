use serde_json::Value;
use thiserror::Error;

use crate::config::ConfigError;
use crate::domain::test_case::TestSuiteError;
use crate::normalize::NormalizeError;

#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error(transparent)]
    Configuration(#[from] ConfigError),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    TestCases(#[from] TestSuiteError),
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("malformed response: {reason}")]
    MalformedResponse { reason: String, raw: Value },
    #[error("resource not found: {0}")]
    ResourceNotFound(String),
    #[error("i/o failure: {0}")]
    Io(String),
    #[error("serialization failure: {0}")]
    Serialization(String),
}

impl From<NormalizeError> for ApplicationError {
    fn from(value: NormalizeError) -> Self {
        match value {
            NormalizeError::MalformedResponse { reason, raw } => {
                Self::MalformedResponse { reason, raw }
            }
        }
    }
}

impl ApplicationError {
    pub fn error_class(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "config_validation",
            Self::InvalidInput(_) => "invalid_input",
            Self::TestCases(TestSuiteError::Read { .. } | TestSuiteError::Parse { .. }) => {
                "test_cases_io"
            }
            Self::TestCases(TestSuiteError::EmptyCase { .. }) => "test_cases_invalid",
            Self::TestCases(TestSuiteError::OutOfRange { .. }) => "test_selection",
            Self::Transport(_) => "transport",
            Self::MalformedResponse { .. } => "malformed_response",
            Self::ResourceNotFound(_) => "resource_not_found",
            Self::Io(_) => "io",
            Self::Serialization(_) => "serialization",
        }
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            Self::TestCases(TestSuiteError::OutOfRange { .. }) => 1,
            Self::Configuration(_)
            | Self::InvalidInput(_)
            | Self::TestCases(TestSuiteError::EmptyCase { .. }) => 2,
            Self::Transport(_) | Self::MalformedResponse { .. } => 4,
            Self::ResourceNotFound(_) => 5,
            Self::TestCases(_) | Self::Io(_) | Self::Serialization(_) => 6,
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Configuration(_) => {
                "The configuration is incomplete or invalid. Fix it and restart."
            }
            Self::InvalidInput(_) => "Check the supplied arguments and try again.",
            Self::TestCases(_) => "Fix the test cases file or the selected test number.",
            Self::Transport(_) => {
                "The remote service call failed. Your message was kept; try again."
            }
            Self::MalformedResponse { .. } => {
                "The remote service returned a response this tool does not recognize."
            }
            Self::ResourceNotFound(_) => "The requested policy or version does not exist.",
            Self::Io(_) => "A local file could not be read or written.",
            Self::Serialization(_) => "The output could not be serialized.",
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use serde_json::json;

    use crate::config::ConfigError;
    use crate::domain::test_case::TestSuiteError;
    use crate::errors::ApplicationError;
    use crate::normalize::NormalizeError;

    #[test]
    fn configuration_error_exits_with_code_two() {
        let error = ApplicationError::from(ConfigError::Validation("guardrail.id".to_owned()));

        assert_eq!(error.error_class(), "config_validation");
        assert_eq!(error.exit_code(), 2);
    }

    #[test]
    fn transport_error_keeps_the_message() {
        let error = ApplicationError::Transport("connection reset".to_owned());

        assert_eq!(error.exit_code(), 4);
        assert_eq!(
            error.user_message(),
            "The remote service call failed. Your message was kept; try again."
        );
    }

    #[test]
    fn malformed_response_keeps_raw_payload() {
        let raw = json!({"unexpected": true});
        let error = ApplicationError::from(NormalizeError::MalformedResponse {
            reason: "no known shape".to_owned(),
            raw: raw.clone(),
        });

        assert!(matches!(
            error,
            ApplicationError::MalformedResponse { raw: ref kept, .. } if *kept == raw
        ));
    }

    #[test]
    fn resource_not_found_exits_with_code_five() {
        let error = ApplicationError::ResourceNotFound("policy abc123".to_owned());

        assert_eq!(error.exit_code(), 5);
        assert_eq!(error.error_class(), "resource_not_found");
    }

    #[test]
    fn test_suite_errors_keep_their_own_classes() {
        let unreadable = ApplicationError::from(TestSuiteError::Read {
            path: PathBuf::from("cases.json"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        });
        let out_of_range =
            ApplicationError::from(TestSuiteError::OutOfRange { requested: 4, available: 1 });

        assert_eq!((unreadable.error_class(), unreadable.exit_code()), ("test_cases_io", 6));
        assert_eq!((out_of_range.error_class(), out_of_range.exit_code()), ("test_selection", 1));
        assert!(out_of_range.to_string().contains("available tests: 1-1"));
    }
}
