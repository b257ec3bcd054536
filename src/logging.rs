//! Logging setup
//!
//! The library only emits `tracing` events. Binaries call [`init`] once
//! to install a `tracing-subscriber` formatter; `RUST_LOG` takes
//! precedence over the configured level.
//!
//! Level usage:
//! - `info`: lifecycle (bind, connect, disconnect, shutdown)
//! - `warn`: dropped connections, unknown units
//! - `error`: I/O and simulator failures
//! - `debug`: per-request decisions
//! - `trace`: hex dumps of every frame

use std::fmt::Write as _;
use std::str::FromStr;

use tracing_subscriber::EnvFilter;

use crate::error::{ModbusError, ModbusResult};

/// Minimum level for crate output when `RUST_LOG` is unset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

impl FromStr for LogLevel {
    type Err = ModbusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "error" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            other => Err(ModbusError::configuration(format!("unknown log level '{}'", other))),
        }
    }
}

/// Output layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoggingMode {
    /// Single-line events with target and timestamp
    #[default]
    Full,
    /// Abbreviated single-line events
    Compact,
}

/// Install the global subscriber
///
/// Fails if a global subscriber is already set.
pub fn init(level: LogLevel, mode: LoggingMode) -> ModbusResult<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);

    let result = match mode {
        LoggingMode::Full => builder.try_init(),
        LoggingMode::Compact => builder.compact().try_init(),
    };
    result.map_err(|e| ModbusError::configuration(format!("failed to install logger: {}", e)))
}

/// Space separated upper-case hex, e.g. `00 01 00 00`
pub fn hex_dump(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for (i, b) in bytes.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{:02X}", b);
    }
    out
}
