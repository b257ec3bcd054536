//! Multicast-DNS service advertisement
//!
//! Describes the emulated device the way a discovery client will see it
//! and publishes it as `_modbus._tcp.local.` through an `mdns-sd`
//! daemon. The record is derived from the configuration only; nothing
//! here touches the register store.

use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;
use std::time::Duration;

use mdns_sd::{ServiceDaemon, ServiceInfo};
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::error::{ModbusError, ModbusResult};
use crate::protocol::ModbusFunction;
use crate::store::RegisterKind;

pub const SERVICE_TYPE: &str = "_modbus._tcp.local.";
pub const INSTANCE_NAME: &str = "ESP Test Modbus Server";
pub const HOST_NAME: &str = "esp-test-modbus.local.";

/// How long to wait for the daemon to confirm withdrawal
const UNREGISTER_TIMEOUT: Duration = Duration::from_secs(1);

/// Device identification strings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub vendor_name: String,
    pub product_code: String,
    pub vendor_url: String,
    pub product_name: String,
    pub model_name: String,
    pub revision: String,
    pub application_name: String,
}

impl Default for DeviceIdentity {
    fn default() -> Self {
        Self {
            vendor_name: "ESP Test Modbus".to_string(),
            product_code: "ETM".to_string(),
            vendor_url: "http://esp-test-modbus.local".to_string(),
            product_name: "ESP Test Modbus Server".to_string(),
            model_name: "ESP-MODBUS-V1".to_string(),
            revision: "1.0.0".to_string(),
            application_name: "ESP Service Discovery Test Server".to_string(),
        }
    }
}

/// DNS-SD record contents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRecord {
    pub service_type: String,
    pub instance_name: String,
    pub host_name: String,
    pub port: u16,
    /// TXT properties, sorted by key
    pub properties: BTreeMap<String, String>,
}

impl ServiceRecord {
    pub fn for_device(config: &ServerConfig, identity: &DeviceIdentity) -> Self {
        let unit_id = config.unit_id.to_string();
        let registers = [
            RegisterKind::Coil,
            RegisterKind::DiscreteInput,
            RegisterKind::HoldingRegister,
            RegisterKind::InputRegister,
        ]
        .map(RegisterKind::as_str)
        .join(",");
        let functions = ModbusFunction::ALL
            .iter()
            .map(|f| f.to_u8().to_string())
            .collect::<Vec<_>>()
            .join(",");

        let properties = [
            ("version", identity.revision.clone()),
            ("device_id", unit_id.clone()),
            ("protocol", "modbus-tcp".to_string()),
            ("vendor", identity.vendor_name.clone()),
            ("model", identity.model_name.clone()),
            ("description", identity.application_name.clone()),
            ("registers", registers),
            ("functions", functions),
            ("unit_id", unit_id),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        Self {
            service_type: SERVICE_TYPE.to_string(),
            instance_name: INSTANCE_NAME.to_string(),
            host_name: HOST_NAME.to_string(),
            port: config.port,
            properties,
        }
    }

    /// Fully qualified instance name, e.g. `ESP Test Modbus Server._modbus._tcp.local.`
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.instance_name, self.service_type)
    }

    /// TXT record entries as `key=value` byte strings
    pub fn txt_entries(&self) -> Vec<Vec<u8>> {
        self.properties
            .iter()
            .map(|(k, v)| format!("{}={}", k, v).into_bytes())
            .collect()
    }

    /// DNS-SD service info for this record
    ///
    /// An unspecified `address` lets the daemon announce every interface
    /// address; a concrete one is announced alone.
    pub fn service_info(&self, address: IpAddr) -> ModbusResult<ServiceInfo> {
        let properties: Vec<(&str, &str)> = self
            .properties
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        let ip = if address.is_unspecified() {
            String::new()
        } else {
            address.to_string()
        };

        let info = ServiceInfo::new(
            &self.service_type,
            &self.instance_name,
            &self.host_name,
            ip.as_str(),
            self.port,
            &properties[..],
        )
        .map_err(|e| ModbusError::advertise(format!("invalid service info: {}", e)))?;

        Ok(if address.is_unspecified() {
            info.enable_addr_auto()
        } else {
            info
        })
    }

    /// Start an mDNS daemon and register the record with it
    pub fn publish(&self, address: IpAddr) -> ModbusResult<Advertisement> {
        let info = self.service_info(address)?;
        let full_name = info.get_fullname().to_string();

        let daemon = ServiceDaemon::new()
            .map_err(|e| ModbusError::advertise(format!("failed to create mDNS daemon: {}", e)))?;
        daemon
            .register(info)
            .map_err(|e| ModbusError::advertise(format!("failed to register service: {}", e)))?;

        info!(
            "Registered mDNS service {} on port {} ({} TXT properties)",
            full_name,
            self.port,
            self.properties.len()
        );
        Ok(Advertisement {
            daemon,
            full_name: Some(full_name),
        })
    }
}

/// A published service; withdrawn on [`Advertisement::unregister`] or drop
pub struct Advertisement {
    daemon: ServiceDaemon,
    full_name: Option<String>,
}

impl Advertisement {
    pub fn full_name(&self) -> Option<&str> {
        self.full_name.as_deref()
    }

    /// Withdraw the service and stop the daemon
    ///
    /// Blocks for up to one second waiting for the goodbye packets.
    pub fn unregister(mut self) -> ModbusResult<()> {
        if let Some(full_name) = self.full_name.take() {
            let status = self
                .daemon
                .unregister(&full_name)
                .map_err(|e| ModbusError::advertise(format!("failed to unregister service: {}", e)))?;
            match status.recv_timeout(UNREGISTER_TIMEOUT) {
                Ok(status) => debug!("mDNS unregister of {}: {:?}", full_name, status),
                Err(e) => warn!("No mDNS unregister confirmation for {}: {}", full_name, e),
            }
            info!("Unregistered mDNS service {}", full_name);
        }

        self.daemon
            .shutdown()
            .map_err(|e| ModbusError::advertise(format!("failed to shut down mDNS daemon: {}", e)))?;
        Ok(())
    }
}

impl Drop for Advertisement {
    fn drop(&mut self) {
        if let Some(full_name) = self.full_name.take() {
            let _ = self.daemon.unregister(&full_name);
        }
    }
}

impl fmt::Display for ServiceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}:{}", self.full_name(), self.host_name, self.port)
    }
}
