//! Slave and server contexts
//!
//! A [`SlaveContext`] owns the [`RegisterStore`] of one unit behind a
//! single mutex. The lock is held only for the in-memory access, never
//! across an `.await`; client requests and the sensor simulator take the
//! same lock, so a reader sees either the whole write or none of it.
//!
//! A [`ServerContext`] maps unit identifiers to slave contexts and is
//! shared between connection tasks as `Arc<ServerContext>`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{ModbusError, ModbusResult};
use crate::protocol::SlaveId;
use crate::store::RegisterStore;

/// Register store of one unit identifier
#[derive(Debug)]
pub struct SlaveContext {
    unit_id: SlaveId,
    store: Mutex<RegisterStore>,
}

impl SlaveContext {
    pub fn new(unit_id: SlaveId, store: RegisterStore) -> Self {
        Self {
            unit_id,
            store: Mutex::new(store),
        }
    }

    /// Context holding the seeded device image
    pub fn seeded(unit_id: SlaveId) -> Self {
        Self::new(unit_id, RegisterStore::seeded())
    }

    #[inline]
    pub fn unit_id(&self) -> SlaveId {
        self.unit_id
    }

    fn lock(&self) -> ModbusResult<MutexGuard<'_, RegisterStore>> {
        self.store
            .lock()
            .map_err(|_| ModbusError::internal(format!("register store of unit {} poisoned", self.unit_id)))
    }

    /// Run `f` with shared access to the store
    pub fn read<R>(&self, f: impl FnOnce(&RegisterStore) -> ModbusResult<R>) -> ModbusResult<R> {
        let store = self.lock()?;
        f(&store)
    }

    /// Run `f` with exclusive access to the store
    pub fn write<R>(
        &self,
        f: impl FnOnce(&mut RegisterStore) -> ModbusResult<R>,
    ) -> ModbusResult<R> {
        let mut store = self.lock()?;
        f(&mut store)
    }

    /// Copy of the current store contents
    pub fn snapshot(&self) -> ModbusResult<RegisterStore> {
        self.read(|store| Ok(store.clone()))
    }
}

/// Unit identifier to slave context lookup
#[derive(Debug, Default)]
pub struct ServerContext {
    slaves: HashMap<SlaveId, Arc<SlaveContext>>,
}

impl ServerContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single seeded unit, the shape of the emulated device
    pub fn single(unit_id: SlaveId) -> Self {
        Self::new().with_slave(SlaveContext::seeded(unit_id))
    }

    /// Add a unit, replacing any previous context with the same id
    pub fn with_slave(mut self, slave: SlaveContext) -> Self {
        self.slaves.insert(slave.unit_id(), Arc::new(slave));
        self
    }

    pub fn get(&self, unit_id: SlaveId) -> Option<&Arc<SlaveContext>> {
        self.slaves.get(&unit_id)
    }

    /// Served unit identifiers in ascending order
    pub fn unit_ids(&self) -> Vec<SlaveId> {
        let mut ids: Vec<SlaveId> = self.slaves.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.slaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slaves.is_empty()
    }
}
