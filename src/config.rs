use std::ffi::OsString;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tokio::sync::Semaphore;

use crate::constants::{
    DEFAULT_MAX_CONCURRENT_EXECUTIONS, DEFAULT_MAX_OUTPUT_CHARS, DEFAULT_TIMEOUT_MS,
};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Optional OS limits applied to every child before it execs.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SandboxLimits {
    pub memory_bytes: Option<u64>,
    pub cpu_time_secs: Option<u64>,
    pub file_size_bytes: Option<u64>,
}

impl SandboxLimits {
    pub fn is_empty(&self) -> bool {
        self.memory_bytes.is_none()
            && self.cpu_time_secs.is_none()
            && self.file_size_bytes.is_none()
    }
}

#[derive(Clone, Debug)]
pub struct InterpreterPaths {
    pub node: OsString,
    pub python: OsString,
    pub npx: OsString,
}

impl Default for InterpreterPaths {
    fn default() -> Self {
        Self {
            node: "node".into(),
            python: "python3".into(),
            npx: "npx".into(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ExecutionConfig {
    pub default_timeout_ms: u64,
    pub max_output_chars: usize,
    pub temp_dir: PathBuf,
    pub max_concurrent_executions: usize,
    pub sandbox: SandboxLimits,
    pub interpreters: InterpreterPaths,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: DEFAULT_TIMEOUT_MS,
            max_output_chars: DEFAULT_MAX_OUTPUT_CHARS,
            temp_dir: default_temp_dir(),
            max_concurrent_executions: DEFAULT_MAX_CONCURRENT_EXECUTIONS,
            sandbox: SandboxLimits::default(),
            interpreters: InterpreterPaths::default(),
        }
    }
}

impl ExecutionConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let max_concurrent_executions = parse_or(
            &lookup,
            "MAX_CONCURRENT_EXECUTIONS",
            defaults.max_concurrent_executions,
        )?;
        if !(1..=Semaphore::MAX_PERMITS).contains(&max_concurrent_executions) {
            return Err(ConfigError::Invalid {
                key: "MAX_CONCURRENT_EXECUTIONS",
                value: max_concurrent_executions.to_string(),
                reason: format!("must be between 1 and {}", Semaphore::MAX_PERMITS),
            });
        }

        let sandbox = SandboxLimits {
            memory_bytes: parse_megabytes(&lookup, "MAX_MEMORY_MB")?,
            cpu_time_secs: parse(&lookup, "SANDBOX_CPU_SECONDS")?,
            file_size_bytes: parse_megabytes(&lookup, "SANDBOX_MAX_FILE_MB")?,
        };

        let interpreters = InterpreterPaths {
            node: lookup("CODEVIEW_NODE_BIN")
                .map(OsString::from)
                .unwrap_or(defaults.interpreters.node),
            python: lookup("CODEVIEW_PYTHON_BIN")
                .map(OsString::from)
                .unwrap_or(defaults.interpreters.python),
            npx: lookup("CODEVIEW_NPX_BIN")
                .map(OsString::from)
                .unwrap_or(defaults.interpreters.npx),
        };

        Ok(Self {
            default_timeout_ms: parse_or(
                &lookup,
                "CODE_EXECUTION_TIMEOUT",
                defaults.default_timeout_ms,
            )?,
            max_output_chars: parse_or(&lookup, "MAX_OUTPUT_CHARS", defaults.max_output_chars)?,
            temp_dir: lookup("EXECUTION_TEMP_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.temp_dir),
            max_concurrent_executions,
            sandbox,
            interpreters,
        })
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }
}

fn default_temp_dir() -> PathBuf {
    std::env::current_dir()
        .unwrap_or_else(|_| std::env::temp_dir())
        .join(".temp")
        .join("executions")
}

fn parse<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::Invalid {
                key,
                value,
                reason: e.to_string(),
            }),
    }
}

fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    Ok(parse(lookup, key)?.unwrap_or(default))
}

/// Reads a size in MiB and returns it in bytes.
fn parse_megabytes(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<u64>, ConfigError> {
    let Some(mb) = parse::<u64>(lookup, key)? else {
        return Ok(None);
    };
    mb.checked_mul(1024 * 1024)
        .map(Some)
        .ok_or_else(|| ConfigError::Invalid {
            key,
            value: mb.to_string(),
            reason: "too large".to_string(),
        })
}
