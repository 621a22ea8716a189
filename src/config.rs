use std::{
    error::Error,
    fmt::{self, Display},
    fs, io,
    path::Path,
};

use serde::Deserialize;

/// The result type for loading a `CollectorConfig`.
pub type Result<T> = std::result::Result<T, ConfigErr>;

/// Error returned while reading or validating a `CollectorConfig`.
#[derive(Debug)]
pub enum ConfigErr {
    Io(io::Error),
    Json(serde_json::Error),
    Invalid(String),
}

impl Display for ConfigErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "io error: {e}"),
            Self::Json(e) => write!(f, "invalid JSON: {e}"),
            Self::Invalid(msg) => write!(f, "invalid config: {msg}"),
        }
    }
}

impl Error for ConfigErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Json(e) => Some(e),
            Self::Invalid(_) => None,
        }
    }
}

impl From<io::Error> for ConfigErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for ConfigErr {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

/// Construction parameters of a `MultiCollector`.
///
/// ```json
/// { "workers": 5, "expected_total": 5000 }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CollectorConfig {
    /// The fixed amount of worker threads taking part in every round.
    pub workers: usize,
    /// The amount of values expected per round, used to preallocate the partitions.
    #[serde(default)]
    pub expected_total: Option<usize>,
}

impl CollectorConfig {
    /// Creates a new `CollectorConfig` without a preallocation hint.
    pub fn new(workers: usize) -> Self {
        Self {
            workers,
            expected_total: None,
        }
    }

    /// Sets the amount of values expected per round.
    pub fn with_expected_total(mut self, expected_total: usize) -> Self {
        self.expected_total = Some(expected_total);
        self
    }

    /// Parses and validates a config from a JSON string.
    ///
    /// # Errors
    /// A `ConfigErr` if the JSON is malformed or the values are inconsistent.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a config from a JSON file.
    ///
    /// # Errors
    /// A `ConfigErr` if the file can't be read or its content is invalid.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Checks the config describes a collector that can be built.
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 && self.expected_total.is_some_and(|total| total > 0) {
            return Err(ConfigErr::Invalid(
                "expected_total requires at least one worker".into(),
            ));
        }

        Ok(())
    }
}
