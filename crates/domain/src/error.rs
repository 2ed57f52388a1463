//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts via `#[from]`.

/// Invariant violations on domain values.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// The advertised device name is empty.
    #[error("device name must not be empty")]
    EmptyName,

    /// The advertised device name is the platform's placeholder.
    #[error("device name {name:?} is a placeholder")]
    SentinelName { name: String },

    /// A serial suffix is not exactly four ASCII alphanumerics.
    #[error("serial suffix {suffix:?} must be exactly 4 alphanumeric characters")]
    InvalidSerialSuffix { suffix: String },
}

/// Failure to compile an identifier pattern.
#[derive(Debug, thiserror::Error)]
pub enum PatternError {
    #[error("invalid identifier pattern {pattern:?}")]
    Invalid {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid serial suffix")]
    Serial(#[from] ValidationError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_display_sentinel_name_error() {
        let err = ValidationError::SentinelName {
            name: "Unknown".to_owned(),
        };
        assert_eq!(err.to_string(), "device name \"Unknown\" is a placeholder");
    }

    #[test]
    fn should_wrap_validation_error_into_pattern_error() {
        let err: PatternError = ValidationError::InvalidSerialSuffix {
            suffix: "12".to_owned(),
        }
        .into();
        assert!(matches!(
            err,
            PatternError::Serial(ValidationError::InvalidSerialSuffix { .. })
        ));
    }
}
