//! Error taxonomy for number generation.

use thiserror::Error;

use crate::ports::PortError;

/// Errors raised while generating a number.
///
/// Every variant is terminal for the current generation; only the
/// uniqueness loop retries, and it surfaces [`NumberingError::UniquenessExhausted`]
/// once it gives up.
#[derive(Debug, Error)]
pub enum NumberingError {
    /// The numbering configuration is incomplete or inconsistent.
    #[error("numbering config is invalid: {0}")]
    ConfigInvalid(String),

    /// A directive body could not be parsed.
    #[error("malformed directive \"{directive}\": {reason}")]
    MalformedDirective {
        /// The offending template substring.
        directive: String,
        /// What was wrong with it.
        reason: String,
    },

    /// A `{param:N}` directive referenced a parameter that does not exist.
    #[error("parameter number is invalid => \"{index}\" ({supplied} supplied)")]
    ParamIndexInvalid {
        /// The requested 1-based index.
        index: i64,
        /// How many parameters were supplied.
        supplied: usize,
    },

    /// The template references more parameters than were supplied.
    #[error("param count mismatch: template references {referenced}, input has {supplied}")]
    ParamCountMismatch {
        /// Distinct parameter indices referenced by the template.
        referenced: usize,
        /// Parameters supplied by the caller.
        supplied: usize,
    },

    /// A referenced field is absent from the record image.
    #[error("missing value \"{field}\" in entity \"{entity}\"")]
    FieldMissing {
        /// Entity the lookup ran against.
        entity: String,
        /// The field that was absent.
        field: String,
    },

    /// A lookup chain continued through a value that is not a reference.
    #[error("field \"{0}\" is not a lookup")]
    NotALookup(String),

    /// Every attempt collided with an existing record.
    #[error("couldn't generate a unique string after {attempts} attempts => \"{last}\"")]
    UniquenessExhausted {
        /// The last candidate produced.
        last: String,
        /// Attempts made.
        attempts: u32,
    },

    /// The replacement-character rules could not be parsed.
    #[error("replacement characters config is invalid: {0}")]
    ReplacementRuleInvalid(String),

    /// Random token settings are degenerate.
    #[error("invalid random spec: {0}")]
    InvalidRandomSpec(String),

    /// Uniqueness validation was requested without a field or record to check.
    #[error("to generate a unique string, {0} must be specified")]
    MissingUniquenessTarget(&'static str),

    /// A collaborator (record store, config store, ...) failed.
    #[error("{port} failed: {source}")]
    Port {
        /// Name of the failing port.
        port: &'static str,
        /// Underlying error.
        #[source]
        source: PortError,
    },
}

impl NumberingError {
    /// Builds a [`NumberingError::MalformedDirective`].
    pub fn malformed(directive: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedDirective { directive: directive.into(), reason: reason.into() }
    }
}

/// Attaches a port name to collaborator failures.
pub trait PortResultExt<T> {
    /// Converts a port error into [`NumberingError::Port`].
    ///
    /// # Errors
    ///
    /// Returns the wrapped error when `self` is `Err`.
    fn port(self, port: &'static str) -> Result<T, NumberingError>;
}

impl<T> PortResultExt<T> for Result<T, PortError> {
    #[inline]
    fn port(self, port: &'static str) -> Result<T, NumberingError> {
        self.map_err(|source| NumberingError::Port { port, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhausted_message_carries_last_candidate() {
        let err = NumberingError::UniquenessExhausted { last: "INV-0010".into(), attempts: 10 };
        assert!(err.to_string().contains("INV-0010"));
    }

    #[test]
    fn port_ext_wraps_source() {
        let result: Result<(), PortError> = Err("disk full".into());
        let err = result.port("config store").unwrap_err();
        assert_eq!(err.to_string(), "config store failed: disk full");
    }
}
