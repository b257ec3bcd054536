//! # Server Configuration
//!
//! Everything the binary needs to start the emulated device.
//!
//! ## Environment
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | `MODBUS_PORT` | 502 | TCP port |
//! | `MODBUS_DEVICE_ID` | 1 | unit identifier served |
//! | `MODBUS_BIND_ADDRESS` | 0.0.0.0 | listen address |
//! | `MODBUS_SIM_INTERVAL_MS` | 5000 | sensor simulator tick, 0 disables |
//! | `MODBUS_LOG_LEVEL` | info | level when `RUST_LOG` is unset |

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use crate::constants::{DEFAULT_SIMULATION_INTERVAL_MS, DEFAULT_TCP_PORT, DEFAULT_UNIT_ID};
use crate::error::{ModbusError, ModbusResult};
use crate::logging::LogLevel;
use crate::protocol::SlaveId;

pub const ENV_PORT: &str = "MODBUS_PORT";
pub const ENV_DEVICE_ID: &str = "MODBUS_DEVICE_ID";
pub const ENV_BIND_ADDRESS: &str = "MODBUS_BIND_ADDRESS";
pub const ENV_SIM_INTERVAL_MS: &str = "MODBUS_SIM_INTERVAL_MS";
pub const ENV_LOG_LEVEL: &str = "MODBUS_LOG_LEVEL";

/// Runtime configuration of the slave
///
/// # Example
///
/// ```rust
/// use modbus_test_slave::ServerConfig;
///
/// let config = ServerConfig::new()
///     .with_port(5020)
///     .with_unit_id(3);
///
/// assert_eq!(config.socket_addr().port(), 5020);
/// assert_eq!(config.unit_id, 3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_address: IpAddr,
    pub port: u16,
    pub unit_id: SlaveId,
    /// Sensor simulator tick in milliseconds; 0 disables the simulator
    pub simulation_interval_ms: u64,
    pub log_level: LogLevel,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_TCP_PORT,
            unit_id: DEFAULT_UNIT_ID,
            simulation_interval_ms: DEFAULT_SIMULATION_INTERVAL_MS,
            log_level: LogLevel::default(),
        }
    }
}

impl ServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the process environment
    pub fn from_env() -> ModbusResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unset keys keep their default
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ModbusResult<Self> {
        let mut config = Self::default();

        if let Some(v) = lookup(ENV_PORT) {
            config.port = parse_var(ENV_PORT, &v)?;
        }
        if let Some(v) = lookup(ENV_DEVICE_ID) {
            config.unit_id = parse_var(ENV_DEVICE_ID, &v)?;
        }
        if let Some(v) = lookup(ENV_BIND_ADDRESS) {
            config.bind_address = parse_var(ENV_BIND_ADDRESS, &v)?;
        }
        if let Some(v) = lookup(ENV_SIM_INTERVAL_MS) {
            config.simulation_interval_ms = parse_var(ENV_SIM_INTERVAL_MS, &v)?;
        }
        if let Some(v) = lookup(ENV_LOG_LEVEL) {
            config.log_level = v.parse()?;
        }

        Ok(config)
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_unit_id(mut self, unit_id: SlaveId) -> Self {
        self.unit_id = unit_id;
        self
    }

    pub fn with_bind_address(mut self, address: IpAddr) -> Self {
        self.bind_address = address;
        self
    }

    pub fn with_simulation_interval_ms(mut self, interval_ms: u64) -> Self {
        self.simulation_interval_ms = interval_ms;
        self
    }

    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }

    /// Simulator tick, `None` when disabled
    pub fn simulation_interval(&self) -> Option<Duration> {
        (self.simulation_interval_ms > 0).then(|| Duration::from_millis(self.simulation_interval_ms))
    }
}

fn parse_var<T>(key: &str, value: &str) -> ModbusResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| ModbusError::configuration(format!("{}='{}': {}", key, value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.socket_addr().to_string(), "0.0.0.0:502");
        assert_eq!(config.unit_id, 1);
        assert_eq!(config.simulation_interval(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_from_lookup() {
        let config = ServerConfig::from_lookup(lookup(&[
            (ENV_PORT, "5020"),
            (ENV_DEVICE_ID, " 17 "),
            (ENV_BIND_ADDRESS, "127.0.0.1"),
            (ENV_SIM_INTERVAL_MS, "0"),
            (ENV_LOG_LEVEL, "debug"),
        ]))
        .unwrap();
        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:5020");
        assert_eq!(config.unit_id, 17);
        assert_eq!(config.simulation_interval(), None);
        assert_eq!(config.log_level, LogLevel::Debug);
    }

    #[test]
    fn test_invalid_values() {
        for vars in [
            [(ENV_PORT, "70000")],
            [(ENV_PORT, "modbus")],
            [(ENV_DEVICE_ID, "256")],
            [(ENV_BIND_ADDRESS, "localhost:502")],
        ] {
            let err = ServerConfig::from_lookup(lookup(&vars)).unwrap_err();
            assert!(matches!(err, ModbusError::Configuration { .. }), "{:?}", vars);
        }
    }

    #[test]
    fn test_builder() {
        let config = ServerConfig::new()
            .with_port(1502)
            .with_unit_id(5)
            .with_bind_address(IpAddr::V4(Ipv4Addr::LOCALHOST))
            .with_simulation_interval_ms(250);
        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:1502");
        assert_eq!(config.simulation_interval(), Some(Duration::from_millis(250)));
    }
}
