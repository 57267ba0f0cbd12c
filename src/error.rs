//! Error handler for directory operations.

use thiserror::Error;
use validator::{ValidationError, ValidationErrors};

pub type Result<T> = std::result::Result<T, Error>;

/// LDAP result code returned on a bind with a wrong password.
pub const INVALID_CREDENTIALS: u32 = 49;

/// Enum representing every failure surfaced by the directory layer.
#[derive(Debug, Error)]
pub enum Error {
    #[error("validation error occurred: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("bind refused by directory (code {code}): {reason}")]
    Auth { code: u32, reason: String },

    #[error("no entry matches filter {filter}")]
    NotFound { filter: String },

    #[error(transparent)]
    Directory(#[from] ldap3::LdapError),

    #[error("directory operation failed (code {code}): {text}")]
    Operation { code: u32, text: String },

    #[error("{} of {total} entries failed: {}", failures.len(), failed_dns(failures))]
    Batch {
        total: usize,
        failures: Vec<EntryFailure>,
    },

    #[error("invalid configuration, {0}")]
    Configuration(String),
}

/// Failure of a single target inside a bulk operation.
#[derive(Debug)]
pub struct EntryFailure {
    pub dn: String,
    pub error: Error,
}

fn failed_dns(failures: &[EntryFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{} ({})", f.dn, f.error))
        .collect::<Vec<_>>()
        .join(", ")
}

impl Error {
    /// Build a [`Error::Validation`] for a single field.
    pub fn validation(field: &'static str, message: &'static str) -> Self {
        let mut errors = ValidationErrors::new();
        errors.add(
            field,
            ValidationError::new("required").with_message(message.into()),
        );
        Self::Validation(errors)
    }

    /// Whether the directory rejected the supplied password.
    pub fn is_invalid_credentials(&self) -> bool {
        match self {
            Error::InvalidCredentials => true,
            Error::Auth { code, .. } => *code == INVALID_CREDENTIALS,
            _ => false,
        }
    }

    /// Whether the error comes from the transport rather than the caller.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::Directory(_) | Error::Operation { .. } | Error::Auth { .. }
        )
    }
}

impl From<ldap3::LdapResult> for Error {
    fn from(result: ldap3::LdapResult) -> Self {
        Error::Operation {
            code: result.rc,
            text: result.text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_field() {
        let err = Error::validation("sn", "Missing 'sn' field.");
        match err {
            Error::Validation(errors) => {
                assert!(errors.field_errors().contains_key("sn"));
            },
            _ => panic!("expected validation error"),
        }
    }

    #[test]
    fn test_error_categories() {
        assert!(Error::InvalidCredentials.is_invalid_credentials());
        assert!(
            Error::Auth {
                code: 49,
                reason: "bad".into()
            }
            .is_invalid_credentials()
        );
        assert!(
            !Error::Auth {
                code: 52,
                reason: "unavailable".into()
            }
            .is_invalid_credentials()
        );
        assert!(
            Error::Operation {
                code: 32,
                text: "no such object".into()
            }
            .is_transport()
        );
        assert!(!Error::validation("sn", "missing").is_transport());
    }

    #[test]
    fn test_batch_message_names_targets() {
        let err = Error::Batch {
            total: 2,
            failures: vec![EntryFailure {
                dn: "CN=B,DC=example,DC=com".into(),
                error: Error::Operation {
                    code: 50,
                    text: "insufficient access".into(),
                },
            }],
        };

        let message = err.to_string();
        assert!(message.starts_with("1 of 2 entries failed"));
        assert!(message.contains("CN=B,DC=example,DC=com"));
    }
}
