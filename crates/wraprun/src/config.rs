//! # Configuration
//!
//! Generator and dispatch settings, loadable from TOML:
//!
//! ```toml
//! [generator]
//! suffix = "Remote"
//!
//! [dispatch]
//! concurrency = 4
//! open_timeout_ms = 5000
//! invoke_timeout_ms = 30000
//! on_open_failure = "abort"   # or "continue"
//! ```
//!
//! Every key is optional; missing keys take the defaults shown by
//! [`Config::default`].

use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub generator: GeneratorConfig,
    pub dispatch: DispatchConfig,
}

impl Config {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.generator.suffix.is_empty() {
            return Err(Error::Invalid("generator.suffix must not be empty".into()));
        }
        if self.dispatch.concurrency == 0 {
            return Err(Error::Invalid("dispatch.concurrency must be at least 1".into()));
        }
        Ok(())
    }

    pub fn with_generator(mut self, generator: GeneratorConfig) -> Self {
        self.generator = generator;
        self
    }

    pub fn with_dispatch(mut self, dispatch: DispatchConfig) -> Self {
        self.dispatch = dispatch;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeneratorConfig {
    /// Appended to the source callable's name when no explicit wrapper name is given.
    pub suffix: String,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self { suffix: "Remote".to_string() }
    }
}

/// What resolution does when opening a session to one of several addresses fails.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpenFailurePolicy {
    /// Close what was opened and fail the invocation with the connection error.
    #[default]
    Abort,
    /// Record the failing address and dispatch to the sessions that did open.
    Continue,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DispatchConfig {
    /// Maximum sessions invoked at once. `1` dispatches strictly in list order.
    pub concurrency: usize,
    pub open_timeout_ms: Option<u64>,
    pub invoke_timeout_ms: Option<u64>,
    pub on_open_failure: OpenFailurePolicy,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            concurrency: 1,
            open_timeout_ms: None,
            invoke_timeout_ms: None,
            on_open_failure: OpenFailurePolicy::Abort,
        }
    }
}

impl DispatchConfig {
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_open_timeout(mut self, timeout: Duration) -> Self {
        self.open_timeout_ms = Some(millis(timeout));
        self
    }

    pub fn with_invoke_timeout(mut self, timeout: Duration) -> Self {
        self.invoke_timeout_ms = Some(millis(timeout));
        self
    }

    pub fn with_open_failure(mut self, policy: OpenFailurePolicy) -> Self {
        self.on_open_failure = policy;
        self
    }

    pub fn open_timeout(&self) -> Option<Duration> {
        self.open_timeout_ms.map(Duration::from_millis)
    }

    pub fn invoke_timeout(&self) -> Option<Duration> {
        self.invoke_timeout_ms.map(Duration::from_millis)
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
