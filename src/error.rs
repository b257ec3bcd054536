//! Error types for the Modbus slave
//!
//! Every failure inside the server is a [`ModbusError`]. Request-level
//! failures are converted to Modbus exception responses through
//! [`ModbusError::to_exception`]; only frame and I/O errors leave the
//! protocol layer and end a connection.

use std::io;

use thiserror::Error;

use crate::protocol::ModbusException;
use crate::store::RegisterKind;

/// Result alias used throughout the crate
pub type ModbusResult<T> = Result<T, ModbusError>;

/// Errors raised by the register store, codec, dispatcher and server
#[derive(Debug, Error)]
pub enum ModbusError {
    /// Socket level failure
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Connection could not be established or was lost
    #[error("Connection error: {message}")]
    Connection { message: String },

    /// Frame cannot be trusted (bad protocol id, impossible length)
    #[error("Frame error: {message}")]
    Frame { message: String },

    /// Generic protocol violation
    #[error("Protocol error: {message}")]
    Protocol { message: String },

    /// Function code is not supported
    #[error("Invalid function code: 0x{code:02X}")]
    InvalidFunction { code: u8 },

    /// Value outside the permitted domain
    #[error("Invalid data: {message}")]
    InvalidData { message: String },

    /// Requested span does not fit the table
    #[error("Address out of range: {kind} offset {offset} count {count} (capacity {capacity})")]
    AddressOutOfRange {
        kind: RegisterKind,
        offset: u16,
        count: usize,
        capacity: usize,
    },

    /// Operation not permitted on this table kind
    #[error("Illegal operation: {operation} on {kind}")]
    IllegalOperation {
        kind: RegisterKind,
        operation: &'static str,
    },

    /// Invalid configuration value
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Service advertisement could not be published or withdrawn
    #[error("mDNS error: {message}")]
    Advertise { message: String },

    /// Internal failure (poisoned lock and similar)
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl ModbusError {
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    pub fn frame(message: impl Into<String>) -> Self {
        Self::Frame {
            message: message.into(),
        }
    }

    pub fn invalid_function(code: u8) -> Self {
        Self::InvalidFunction { code }
    }

    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn advertise(message: impl Into<String>) -> Self {
        Self::Advertise {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether the error must terminate the connection it occurred on
    pub fn is_connection_fatal(&self) -> bool {
        matches!(
            self,
            Self::Io(_) | Self::Connection { .. } | Self::Frame { .. }
        )
    }

    /// Map to the exception code returned to the client
    pub fn to_exception(&self) -> ModbusException {
        match self {
            Self::InvalidFunction { .. } | Self::IllegalOperation { .. } => {
                ModbusException::IllegalFunction
            }
            Self::AddressOutOfRange { .. } => ModbusException::IllegalDataAddress,
            Self::InvalidData { .. } | Self::Protocol { .. } => ModbusException::IllegalDataValue,
            Self::Io(_)
            | Self::Connection { .. }
            | Self::Frame { .. }
            | Self::Configuration { .. }
            | Self::Advertise { .. }
            | Self::Internal { .. } => ModbusException::ServerDeviceFailure,
        }
    }
}
