//! # Modbus Test Slave - Modbus TCP Device Emulator
//!
//! An in-memory Modbus TCP slave for integration testing of
//! service-discovery tooling. It serves one seeded unit, refreshes its
//! simulated sensor readings in the background, and advertises itself
//! as `_modbus._tcp.local.` over mDNS.
//!
//! ## Supported Function Codes
//!
//! | Code | Function | Table |
//! |------|----------|-------|
//! | 0x01 | Read Coils | coils |
//! | 0x02 | Read Discrete Inputs | discrete inputs |
//! | 0x03 | Read Holding Registers | holding registers |
//! | 0x04 | Read Input Registers | input registers |
//! | 0x05 | Write Single Coil | coils |
//! | 0x06 | Write Single Register | holding registers |
//! | 0x0F | Write Multiple Coils | coils |
//! | 0x10 | Write Multiple Registers | holding registers |
//!
//! Anything else is answered with exception 0x01 (Illegal Function).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use modbus_test_slave::{shutdown, ModbusResult, ModbusTcpServer, ServerConfig, ServerContext};
//!
//! #[tokio::main]
//! async fn main() -> ModbusResult<()> {
//!     let config = ServerConfig::new().with_port(5020);
//!     let context = Arc::new(ServerContext::single(config.unit_id));
//!
//!     let server = ModbusTcpServer::bind(config.socket_addr(), context).await?;
//!     let (trigger, signal) = shutdown::channel();
//!     tokio::spawn(async move {
//!         let _ = tokio::signal::ctrl_c().await;
//!         trigger.trigger();
//!     });
//!     server.run(signal).await
//! }
//! ```

// ============================================================================
// Core modules
// ============================================================================

/// Core error types and result handling
pub mod error;

/// Modbus protocol constants and device defaults
pub mod constants;

/// Function codes, exception codes and decoded requests
pub mod protocol;

/// Stack-allocated response PDU and builder
pub mod pdu;

/// MBAP frame decoding and encoding
pub mod codec;

/// Register tables of one unit
pub mod store;

/// Unit id to register store mapping
pub mod context;

/// Request validation and execution
pub mod dispatcher;

/// TCP listener and connection handling
pub mod server;

// ============================================================================
// Device collaborators
// ============================================================================

/// Periodic sensor value updates
pub mod simulator;

/// mDNS service record and publication
pub mod advertise;

/// Environment driven configuration
pub mod config;

/// Cooperative shutdown signal
pub mod shutdown;

/// Logging setup
pub mod logging;

// ============================================================================
// Re-exports for convenience
// ============================================================================

// === Async runtime ===
pub use tokio;

// === Error handling ===
pub use error::{ModbusError, ModbusResult};

// === Core types ===
pub use context::{ServerContext, SlaveContext};
pub use dispatcher::Dispatcher;
pub use protocol::{ModbusException, ModbusFunction, Request, SlaveId, TransactionId};
pub use server::{ModbusTcpServer, ServerStats, StatsHandle};
pub use store::{RegisterKind, RegisterStore, RegisterTable};

// === Codec ===
pub use codec::{encode_frame, Frame, FrameDecoder, MbapHeader};
pub use pdu::{ModbusPdu, PduBuilder};

// === Device collaborators ===
pub use advertise::{Advertisement, DeviceIdentity, ServiceRecord};
pub use config::ServerConfig;
pub use simulator::{SensorSample, SensorSimulator};

// === Logging ===
pub use logging::{LogLevel, LoggingMode};

// === Commonly needed constants ===
pub use constants::{DEFAULT_TCP_PORT, DEFAULT_UNIT_ID, TABLE_CAPACITY};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
