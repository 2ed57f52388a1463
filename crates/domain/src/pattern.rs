//! Identifier pattern — selects devices of interest by advertised name.
//!
//! Patterns are regular expressions matched at the *start* of the name: a
//! name matches when it begins with text the pattern accepts. Trailing text
//! after the matched prefix is allowed.

use std::fmt;

use regex::Regex;

use crate::error::{PatternError, ValidationError};

/// Name prefix used by GoPro cameras.
pub const GOPRO_NAME_PREFIX: &str = "GoPro";

/// Default pattern: `GoPro` followed by the last four serial characters.
pub const DEFAULT_PATTERN: &str = "GoPro [A-Z0-9]{4}";

/// A compiled, start-anchored name pattern.
#[derive(Debug, Clone)]
pub struct IdentifierPattern {
    source: String,
    regex: Regex,
}

impl IdentifierPattern {
    /// Compile `pattern`, anchored at the start of the device name.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError::Invalid`] if `pattern` is not a valid regular
    /// expression.
    pub fn new(pattern: impl Into<String>) -> Result<Self, PatternError> {
        let source = pattern.into();
        let regex = Regex::new(&format!("^(?:{source})")).map_err(|err| PatternError::Invalid {
            pattern: source.clone(),
            source: err,
        })?;
        Ok(Self { source, regex })
    }

    /// Build the pattern for one specific camera from the last four
    /// characters of its serial number (also the tail of its default SSID).
    ///
    /// # Errors
    ///
    /// Returns [`PatternError::Serial`] unless `suffix` is exactly four ASCII
    /// alphanumerics.
    pub fn for_serial_suffix(suffix: &str) -> Result<Self, PatternError> {
        if suffix.len() != 4 || !suffix.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ValidationError::InvalidSerialSuffix {
                suffix: suffix.to_owned(),
            }
            .into());
        }
        Self::new(format!("{GOPRO_NAME_PREFIX} {}", regex::escape(suffix)))
    }

    /// Whether `name` starts with text accepted by this pattern.
    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        self.regex.is_match(name)
    }

    /// The pattern as written, without the anchor.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl Default for IdentifierPattern {
    fn default() -> Self {
        match Self::new(DEFAULT_PATTERN) {
            Ok(pattern) => pattern,
            Err(err) => unreachable!("default pattern must compile: {err}"),
        }
    }
}

impl fmt::Display for IdentifierPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
