//! Configuration loading — TOML file, environment overrides, then CLI flags.
//!
//! Looks for `beldum.toml` in the working directory unless `--config` names
//! another file. Every field has a default so the file is optional.
//! Precedence, lowest first: defaults, file, environment, command line.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use beldum_app::services::connection_manager::{
    AcquisitionConfig, DEFAULT_CONNECT_TIMEOUT, DEFAULT_MAX_RETRIES,
};
use beldum_app::services::poll_loop::DEFAULT_POLL_INTERVAL;
use beldum_app::services::scanner::DEFAULT_SCAN_TIMEOUT;
use beldum_domain::error::PatternError;
use beldum_domain::pattern::IdentifierPattern;

/// Default configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "beldum.toml";

pub const USAGE: &str = "\
Usage: beldumd [OPTIONS]

Options:
  -i, --identifier <REGEX>  Device name pattern (anchored at the start of the name)
      --serial <XXXX>       Last 4 characters of the camera serial number
      --config <PATH>       Configuration file [default: beldum.toml]
  -h, --help                Print this help
";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// BLE acquisition settings.
    pub ble: BleConfig,
    /// Poll loop settings.
    pub poll: PollConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Device acquisition configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct BleConfig {
    /// Host adapter number, 0 for the first one.
    pub adapter_index: usize,
    /// Duration of one discovery pass, in seconds.
    pub scan_timeout_secs: u64,
    /// Bound on a single connect call, in seconds.
    pub connect_timeout_secs: u64,
    /// Failed attempts tolerated before giving up.
    pub max_retries: u32,
    /// Device name regex. Defaults to any GoPro camera.
    pub identifier: Option<String>,
    /// Serial suffix; takes the place of `identifier` when set.
    #[serde(skip)]
    pub serial: Option<String>,
}

/// Poll loop configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// Seconds between two capture polls.
    pub interval_secs: u64,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// Parsed command line.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Cli {
    pub config: Option<PathBuf>,
    pub identifier: Option<String>,
    pub serial: Option<String>,
    pub help: bool,
}

impl Cli {
    /// Parse arguments, program name excluded.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Usage`] on unknown flags, missing values, or
    /// when both `--identifier` and `--serial` are given.
    pub fn parse<I>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut cli = Self::default();
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            let (flag, inline) = match arg.split_once('=') {
                Some((flag, value)) if flag.starts_with("--") => (flag.to_owned(), Some(value.to_owned())),
                _ => (arg.clone(), None),
            };
            let mut value = |name: &str| {
                inline
                    .clone()
                    .or_else(|| args.next())
                    .ok_or_else(|| ConfigError::Usage(format!("{name} requires a value")))
            };
            match flag.as_str() {
                "-h" | "--help" => cli.help = true,
                "-i" | "--identifier" => cli.identifier = Some(value("--identifier")?),
                "--serial" => cli.serial = Some(value("--serial")?),
                "--config" => cli.config = Some(PathBuf::from(value("--config")?)),
                other => return Err(ConfigError::Usage(format!("unexpected argument '{other}'"))),
            }
        }
        if cli.identifier.is_some() && cli.serial.is_some() {
            return Err(ConfigError::Usage(
                "--identifier and --serial are mutually exclusive".to_string(),
            ));
        }
        Ok(cli)
    }
}

impl Config {
    /// Load the configuration file selected by `cli`, then apply environment
    /// and command-line overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but is unreadable or malformed, or
    /// if the resulting configuration is invalid.
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        let path = cli
            .config
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
        let mut config = Self::from_file(&path, cli.config.is_some())?;
        config.apply_env_overrides();
        config.apply_cli(cli);
        config.validate()?;
        Ok(config)
    }

    /// A missing file is only an error when it was asked for explicitly.
    fn from_file(path: &std::path::Path, required: bool) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound && !required => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("BELDUM_IDENTIFIER") {
            self.ble.identifier = Some(val);
        }
        if let Ok(val) = std::env::var("BELDUM_MAX_RETRIES") {
            if let Ok(max_retries) = val.parse() {
                self.ble.max_retries = max_retries;
            }
        }
        if let Ok(val) = std::env::var("BELDUM_POLL_INTERVAL_SECS") {
            if let Ok(secs) = val.parse() {
                self.poll.interval_secs = secs;
            }
        }
        if let Ok(val) = std::env::var("BELDUM_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    fn apply_cli(&mut self, cli: &Cli) {
        if let Some(identifier) = &cli.identifier {
            self.ble.identifier = Some(identifier.clone());
            self.ble.serial = None;
        }
        if let Some(serial) = &cli.serial {
            self.ble.serial = Some(serial.clone());
            self.ble.identifier = None;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.ble.scan_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "scan_timeout_secs must be non-zero".to_string(),
            ));
        }
        if self.ble.connect_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "connect_timeout_secs must be non-zero".to_string(),
            ));
        }
        if self.ble.max_retries == 0 {
            return Err(ConfigError::Validation(
                "max_retries must be non-zero".to_string(),
            ));
        }
        if self.poll.interval_secs == 0 {
            return Err(ConfigError::Validation(
                "interval_secs must be non-zero".to_string(),
            ));
        }
        // An empty pattern would match every advertised name.
        if self.ble.serial.is_none()
            && self
                .ble
                .identifier
                .as_deref()
                .is_some_and(|identifier| identifier.trim().is_empty())
        {
            return Err(ConfigError::Validation(
                "identifier must not be empty".to_string(),
            ));
        }
        self.pattern()?;
        Ok(())
    }

    /// The device name pattern: serial suffix, else identifier, else the
    /// default GoPro pattern.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError`] if the identifier does not compile or the
    /// serial suffix is malformed.
    pub fn pattern(&self) -> Result<IdentifierPattern, PatternError> {
        match (&self.ble.serial, &self.ble.identifier) {
            (Some(serial), _) => IdentifierPattern::for_serial_suffix(serial),
            (None, Some(identifier)) => IdentifierPattern::new(identifier),
            (None, None) => Ok(IdentifierPattern::default()),
        }
    }

    #[must_use]
    pub fn acquisition(&self) -> AcquisitionConfig {
        AcquisitionConfig {
            scan_timeout: Duration::from_secs(self.ble.scan_timeout_secs),
            connect_timeout: Duration::from_secs(self.ble.connect_timeout_secs),
            max_retries: self.ble.max_retries,
        }
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll.interval_secs)
    }
}

impl Default for BleConfig {
    fn default() -> Self {
        Self {
            adapter_index: 0,
            scan_timeout_secs: DEFAULT_SCAN_TIMEOUT.as_secs(),
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT.as_secs(),
            max_retries: DEFAULT_MAX_RETRIES,
            identifier: None,
            serial: None,
        }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_POLL_INTERVAL.as_secs(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "beldumd=info,beldum=info".to_string(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Device name pattern does not compile.
    #[error("invalid device identifier")]
    Pattern(#[from] PatternError),
    /// Bad command line.
    #[error("{0}")]
    Usage(String),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn should_produce_sensible_defaults() {
        let config = Config::default();
        assert_eq!(config.ble.adapter_index, 0);
        assert_eq!(config.ble.scan_timeout_secs, 5);
        assert_eq!(config.ble.connect_timeout_secs, 15);
        assert_eq!(config.ble.max_retries, 10);
        assert!(config.ble.identifier.is_none());
        assert_eq!(config.poll.interval_secs, 900);
        assert_eq!(config.logging.filter, "beldumd=info,beldum=info");
    }

    #[test]
    fn should_parse_minimal_toml() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.ble.max_retries, 10);
    }

    #[test]
    fn should_parse_full_toml() {
        let toml = "
            [ble]
            adapter_index = 1
            scan_timeout_secs = 8
            connect_timeout_secs = 20
            max_retries = 4
            identifier = 'GoPro 12'

            [poll]
            interval_secs = 60

            [logging]
            filter = 'debug'
        ";
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.ble.adapter_index, 1);
        assert_eq!(config.ble.scan_timeout_secs, 8);
        assert_eq!(config.ble.connect_timeout_secs, 20);
        assert_eq!(config.ble.max_retries, 4);
        assert_eq!(config.ble.identifier.as_deref(), Some("GoPro 12"));
        assert_eq!(config.poll.interval_secs, 60);
        assert_eq!(config.logging.filter, "debug");
    }

    #[test]
    fn should_parse_partial_toml_with_defaults() {
        let toml = "
            [ble]
            max_retries = 3
        ";
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.ble.max_retries, 3);
        assert_eq!(config.ble.scan_timeout_secs, 5);
        assert_eq!(config.poll.interval_secs, 900);
    }

    #[test]
    fn should_ignore_serial_in_toml() {
        let toml = "
            [ble]
            serial = '1234'
        ";
        let config: Config = toml::from_str(toml).unwrap();
        assert!(config.ble.serial.is_none());
    }

    #[test]
    fn should_report_parse_error_for_invalid_toml() {
        let result: Result<Config, _> = toml::from_str("invalid {{{");
        assert!(result.is_err());
    }

    #[test]
    fn should_return_default_when_optional_file_not_found() {
        let config = Config::from_file(std::path::Path::new("nonexistent.toml"), false).unwrap();
        assert_eq!(config.ble.max_retries, 10);
    }

    #[test]
    fn should_fail_when_requested_file_not_found() {
        let result = Config::from_file(std::path::Path::new("nonexistent.toml"), true);
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn should_accept_defaults() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn should_reject_zero_scan_timeout() {
        let mut config = Config::default();
        config.ble.scan_timeout_secs = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn should_reject_zero_connect_timeout() {
        let mut config = Config::default();
        config.ble.connect_timeout_secs = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn should_reject_zero_retries() {
        let mut config = Config::default();
        config.ble.max_retries = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn should_reject_zero_poll_interval() {
        let mut config = Config::default();
        config.poll.interval_secs = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn should_reject_identifier_that_does_not_compile() {
        let mut config = Config::default();
        config.ble.identifier = Some("GoPro (".to_string());
        assert!(matches!(config.validate(), Err(ConfigError::Pattern(_))));
    }

    #[test]
    fn should_reject_empty_identifier() {
        let mut config = Config::default();
        config.ble.identifier = Some("  ".to_string());
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn should_reject_empty_identifier_flag() {
        let cli = Cli::parse(args(&["--identifier="])).unwrap();
        assert_eq!(cli.identifier.as_deref(), Some(""));
        let mut config = Config::default();
        config.apply_cli(&cli);
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn should_reject_malformed_serial() {
        let mut config = Config::default();
        config.ble.serial = Some("12".to_string());
        assert!(matches!(config.validate(), Err(ConfigError::Pattern(_))));
    }

    #[test]
    fn should_use_default_pattern_without_identifier() {
        let pattern = Config::default().pattern().unwrap();
        assert!(pattern.matches("GoPro 1234"));
        assert!(!pattern.matches("Hero"));
    }

    #[test]
    fn should_prefer_serial_over_identifier() {
        let mut config = Config::default();
        config.ble.identifier = Some("Hero".to_string());
        config.ble.serial = Some("0456".to_string());
        let pattern = config.pattern().unwrap();
        assert!(pattern.matches("GoPro 0456"));
        assert!(!pattern.matches("Hero"));
    }

    #[test]
    fn should_convert_to_acquisition_config() {
        let mut config = Config::default();
        config.ble.scan_timeout_secs = 2;
        config.ble.connect_timeout_secs = 7;
        config.ble.max_retries = 3;
        let acquisition = config.acquisition();
        assert_eq!(acquisition.scan_timeout, Duration::from_secs(2));
        assert_eq!(acquisition.connect_timeout, Duration::from_secs(7));
        assert_eq!(acquisition.max_retries, 3);
        assert_eq!(config.poll_interval(), Duration::from_secs(900));
    }

    #[test]
    fn should_parse_empty_command_line() {
        assert_eq!(Cli::parse(args(&[])).unwrap(), Cli::default());
    }

    #[test]
    fn should_parse_identifier_flags() {
        let cli = Cli::parse(args(&["-i", "GoPro 12"])).unwrap();
        assert_eq!(cli.identifier.as_deref(), Some("GoPro 12"));

        let cli = Cli::parse(args(&["--identifier=Hero"])).unwrap();
        assert_eq!(cli.identifier.as_deref(), Some("Hero"));
    }

    #[test]
    fn should_parse_serial_and_config_flags() {
        let cli = Cli::parse(args(&["--serial", "1234", "--config", "/etc/beldum.toml"])).unwrap();
        assert_eq!(cli.serial.as_deref(), Some("1234"));
        assert_eq!(cli.config, Some(PathBuf::from("/etc/beldum.toml")));
    }

    #[test]
    fn should_parse_help_flag() {
        assert!(Cli::parse(args(&["--help"])).unwrap().help);
        assert!(Cli::parse(args(&["-h"])).unwrap().help);
    }

    #[test]
    fn should_reject_unknown_flag() {
        let err = Cli::parse(args(&["--verbose"])).unwrap_err();
        assert_eq!(err.to_string(), "unexpected argument '--verbose'");
    }

    #[test]
    fn should_reject_flag_without_value() {
        let err = Cli::parse(args(&["--serial"])).unwrap_err();
        assert_eq!(err.to_string(), "--serial requires a value");
    }

    #[test]
    fn should_reject_identifier_with_serial() {
        let result = Cli::parse(args(&["-i", "GoPro", "--serial", "1234"]));
        assert!(matches!(result, Err(ConfigError::Usage(_))));
    }

    #[test]
    fn should_let_cli_serial_replace_file_identifier() {
        let mut config = Config::default();
        config.ble.identifier = Some("Hero".to_string());
        let cli = Cli {
            serial: Some("ABCD".to_string()),
            ..Cli::default()
        };
        config.apply_cli(&cli);
        assert!(config.ble.identifier.is_none());
        assert!(config.pattern().unwrap().matches("GoPro ABCD"));
    }
}
