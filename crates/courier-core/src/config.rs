//! Config - 環境変数からの設定読み込み
//!
//! | Variable | Default |
//! |---|---|
//! | `AZURE_STORAGE_ACCOUNT_CONNECTION_STRING` (alias `OUTBOUND_AZURE_STORAGE_ACCOUNT_CONNECTION_STRING`, fallback `connectionstring.txt`) | required |
//! | `PEPPOL_CERT_PATH` | required |
//! | `OXALIS_STANDALONE` | `sh /oxalis/bin-standalone/run-docker.sh` |
//! | `TRANSPORT_PROTOCOL` | `peppol-transport-as4-v2_0` |
//! | `TRANSPORT_TIMEOUT_SECS` | `300` |
//! | `OUTBOUND_AZURE_BLOB_ARCHIVED` | `archived` |
//! | `OUTBOUND_AZURE_BLOB_FAILED` | `failed` |
//! | `OUTBOUND_AZURE_QUEUE_OUTBOUND` | `outbound` |
//! | `AFTER_COMPLETED` / `AFTER_FAILED` | `move` |
//! | `LOGLEVEL` | `error` |
//! | `ROUTING_SCHEME` | `auto` |
//! | `SCRATCH_DIR` | system temp dir |
//! | `OUTBOUND_WORKERS` | `1` |
//!
//! Empty values count as unset. Unknown policy, log level values fall back
//! to the default and leave a note in [`Config::warnings`], because logging
//! is not initialised yet while the configuration is read.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::app::transport::{DEFAULT_COMMAND, DEFAULT_PROTOCOL, TransportSettings, split_command};
use crate::domain::{AfterPolicy, Policies};
use crate::extract::RoutingScheme;

pub const CONNECTION_STRING_VARS: [&str; 2] = [
    "AZURE_STORAGE_ACCOUNT_CONNECTION_STRING",
    "OUTBOUND_AZURE_STORAGE_ACCOUNT_CONNECTION_STRING",
];
pub const CONNECTION_STRING_FILE: &str = "connectionstring.txt";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} must be set{hint}")]
    Missing { name: &'static str, hint: &'static str },

    #[error("invalid value {value:?} for {name}: {reason}")]
    InvalidValue {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("unsupported connection string (expected file://<root> or memory:)")]
    UnsupportedConnectionString,
}

/// Log verbosity as operators spell it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Debug,
    Info,
    Notice,
    Warning,
    #[default]
    Error,
}

impl LogLevel {
    /// `tracing` filter directive for this level.
    pub fn filter_directive(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info | LogLevel::Notice => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "notice" => Ok(LogLevel::Notice),
            "warning" | "warn" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level '{other}'")),
        }
    }
}

/// Where queues and blobs live, decided by the connection string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    /// `file://<root>`: `<root>/blobs` and `<root>/queues`.
    Local { root: PathBuf },
    /// `memory:`; nothing survives a restart.
    Memory,
}

impl Backend {
    pub fn parse(connection_string: &str) -> Result<Self, ConfigError> {
        let s = connection_string.trim();
        if let Some(root) = s.strip_prefix("file://") {
            if root.is_empty() {
                return Err(ConfigError::UnsupportedConnectionString);
            }
            return Ok(Backend::Local {
                root: PathBuf::from(root),
            });
        }
        if s == "memory:" {
            return Ok(Backend::Memory);
        }
        Err(ConfigError::UnsupportedConnectionString)
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub connection_string: String,
    pub backend: Backend,
    pub queue_name: String,
    pub archive_container: String,
    pub failed_container: String,
    pub after_completed: AfterPolicy,
    pub after_failed: AfterPolicy,
    pub log_level: LogLevel,
    pub routing_scheme: RoutingScheme,
    pub transport: TransportSettings,
    pub workers: usize,
    /// Values that were ignored in favour of a default.
    pub warnings: Vec<String>,
}

impl Config {
    /// Process environment, with `./connectionstring.txt` as fallback.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(|name| std::env::var(name).ok(), Some(Path::new(CONNECTION_STRING_FILE)))
    }

    /// Any variable source; no file fallback.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::load(lookup, None)
    }

    pub fn load<F>(lookup: F, fallback_file: Option<&Path>) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let mut warnings = Vec::new();

        let connection_string = CONNECTION_STRING_VARS
            .iter()
            .find_map(|&name| get(name))
            .or_else(|| fallback_file.and_then(read_first_line))
            .ok_or(ConfigError::Missing {
                name: CONNECTION_STRING_VARS[0],
                hint: " (or placed in connectionstring.txt)",
            })?;
        let backend = Backend::parse(&connection_string)?;

        let cert_path = get("PEPPOL_CERT_PATH").ok_or(ConfigError::Missing {
            name: "PEPPOL_CERT_PATH",
            hint: "",
        })?;

        let command = get("OXALIS_STANDALONE").unwrap_or_else(|| DEFAULT_COMMAND.to_string());
        if split_command(&command).is_empty() {
            return Err(ConfigError::InvalidValue {
                name: "OXALIS_STANDALONE",
                value: command,
                reason: "empty command".to_string(),
            });
        }

        let timeout_secs: u64 = parse_number(&get, "TRANSPORT_TIMEOUT_SECS", 300)?;
        let workers: usize = parse_number(&get, "OUTBOUND_WORKERS", 1)?;
        if workers == 0 {
            return Err(ConfigError::InvalidValue {
                name: "OUTBOUND_WORKERS",
                value: "0".to_string(),
                reason: "at least one worker is required".to_string(),
            });
        }

        let routing_scheme = match get("ROUTING_SCHEME") {
            None => RoutingScheme::default(),
            Some(value) => value.parse().map_err(|reason| ConfigError::InvalidValue {
                name: "ROUTING_SCHEME",
                value,
                reason,
            })?,
        };

        let after_completed =
            parse_or_default(&get, "AFTER_COMPLETED", AfterPolicy::Move, &mut warnings);
        let after_failed = parse_or_default(&get, "AFTER_FAILED", AfterPolicy::Move, &mut warnings);
        let log_level = parse_or_default(&get, "LOGLEVEL", LogLevel::default(), &mut warnings);

        let mut transport = TransportSettings::new(cert_path)
            .with_command(&command)
            .with_timeout(Duration::from_secs(timeout_secs));
        transport.protocol =
            get("TRANSPORT_PROTOCOL").unwrap_or_else(|| DEFAULT_PROTOCOL.to_string());
        if let Some(dir) = get("SCRATCH_DIR") {
            transport = transport.with_scratch_dir(dir);
        }

        Ok(Self {
            connection_string,
            backend,
            queue_name: get("OUTBOUND_AZURE_QUEUE_OUTBOUND")
                .unwrap_or_else(|| "outbound".to_string()),
            archive_container: get("OUTBOUND_AZURE_BLOB_ARCHIVED")
                .unwrap_or_else(|| "archived".to_string()),
            failed_container: get("OUTBOUND_AZURE_BLOB_FAILED")
                .unwrap_or_else(|| "failed".to_string()),
            after_completed,
            after_failed,
            log_level,
            routing_scheme,
            transport,
            workers,
            warnings,
        })
    }

    pub fn policies(&self) -> Policies {
        Policies {
            after_completed: self.after_completed,
            after_failed: self.after_failed,
            archive_container: self.archive_container.clone(),
            failed_container: self.failed_container.clone(),
            ..Policies::default()
        }
    }

    /// Connection string with everything after the scheme hidden.
    pub fn redacted_connection_string(&self) -> String {
        match &self.backend {
            Backend::Memory => self.connection_string.clone(),
            Backend::Local { .. } => "file://***".to_string(),
        }
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "connection={} queue={} archived={} failed={} after_completed={} after_failed={} \
             routing={} command={:?} cert={} protocol={} timeout={:?} scratch={} workers={}",
            self.redacted_connection_string(),
            self.queue_name,
            self.archive_container,
            self.failed_container,
            self.after_completed,
            self.after_failed,
            self.routing_scheme,
            self.transport.command,
            self.transport.cert_path.display(),
            self.transport.protocol,
            self.transport.timeout,
            self.transport.scratch_dir.display(),
            self.workers,
        )
    }
}

fn read_first_line(path: &Path) -> Option<String> {
    let content = std::fs::read_to_string(path).ok()?;
    content
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
}

fn parse_number<G, T>(get: &G, name: &'static str, default: T) -> Result<T, ConfigError>
where
    G: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: fmt::Display,
{
    match get(name) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            name,
            value,
            reason: e.to_string(),
        }),
    }
}

fn parse_or_default<G, T>(
    get: &G,
    name: &'static str,
    default: T,
    warnings: &mut Vec<String>,
) -> T
where
    G: Fn(&str) -> Option<String>,
    T: FromStr + fmt::Debug,
    T::Err: fmt::Display,
{
    match get(name) {
        None => default,
        Some(value) => value.parse().unwrap_or_else(|e: T::Err| {
            warnings.push(format!("{name}: {e}; using {default:?}"));
            default
        }),
    }
}
