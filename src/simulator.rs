//! Sensor value simulation
//!
//! Periodically rewrites input registers 0-6 of one unit so clients see
//! live-looking telemetry:
//!
//! | Register | Value |
//! |----------|-------|
//! | 0 | temperature, `(25 + 5·sin(0.1·n)) × 10` |
//! | 1 | humidity, `(60 + 20·sin(0.05·n)) × 10` |
//! | 2 | pressure, `1000 + 50·sin(0.03·n)` |
//! | 3 | voltage, random 2200..=2800 mV |
//! | 4 | current, random 1000..=2000 mA |
//! | 5 | power, `voltage × current / 1000` |
//! | 6 | energy counter, +1 per tick, wraps 65535 → 0 |
//!
//! All seven registers are written under one acquisition of the slave
//! lock, the same lock client requests take.

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::context::SlaveContext;
use crate::error::{ModbusError, ModbusResult};
use crate::shutdown::Shutdown;

/// Input register holding the energy counter
pub const ENERGY_REGISTER: u16 = 6;

/// One set of simulated readings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorSample {
    pub temperature: u16,
    pub humidity: u16,
    pub pressure: u16,
    pub voltage: u16,
    pub current: u16,
    pub power: u16,
    pub energy: u16,
}

impl SensorSample {
    /// Readings for tick `tick`, continuing from `previous_energy`
    pub fn compute<R: Rng + ?Sized>(tick: u64, rng: &mut R, previous_energy: u16) -> Self {
        let n = tick as f64;
        let voltage: u16 = rng.random_range(2200..=2800);
        let current: u16 = rng.random_range(1000..=2000);

        Self {
            temperature: ((25.0 + 5.0 * (n * 0.1).sin()) * 10.0) as u16,
            humidity: ((60.0 + 20.0 * (n * 0.05).sin()) * 10.0) as u16,
            pressure: (1000.0 + 50.0 * (n * 0.03).sin()) as u16,
            voltage,
            current,
            power: (u32::from(voltage) * u32::from(current) / 1000) as u16,
            energy: previous_energy.wrapping_add(1),
        }
    }

    /// Values for input registers 0-6
    pub fn registers(&self) -> [u16; 7] {
        [
            self.temperature,
            self.humidity,
            self.pressure,
            self.voltage,
            self.current,
            self.power,
            self.energy,
        ]
    }
}

/// Background task updating one unit's input registers
pub struct SensorSimulator {
    slave: Arc<SlaveContext>,
    interval: Duration,
    rng: StdRng,
    tick: u64,
}

impl SensorSimulator {
    pub fn new(slave: Arc<SlaveContext>, interval: Duration) -> Self {
        Self::with_rng(slave, interval, StdRng::from_os_rng())
    }

    /// Deterministic readings, for tests
    pub fn with_rng(slave: Arc<SlaveContext>, interval: Duration, rng: StdRng) -> Self {
        Self {
            slave,
            interval,
            rng,
            tick: 0,
        }
    }

    /// Completed ticks
    pub fn ticks(&self) -> u64 {
        self.tick
    }

    /// Compute and store one sample
    pub fn step(&mut self) -> ModbusResult<SensorSample> {
        let tick = self.tick;
        let rng = &mut self.rng;
        let sample = self.slave.write(|store| {
            let previous = store.input_register(ENERGY_REGISTER).ok_or_else(|| {
                ModbusError::internal(format!("input register {} missing", ENERGY_REGISTER))
            })?;
            let sample = SensorSample::compute(tick, rng, previous);
            store.set_input_registers(0, &sample.registers())?;
            Ok(sample)
        })?;
        self.tick += 1;
        Ok(sample)
    }

    /// Step every interval until `shutdown` fires
    ///
    /// The first update happens one interval after start, so the seeded
    /// values are observable right after boot. Failures are logged and
    /// the loop keeps going.
    pub async fn run(mut self, mut shutdown: Shutdown) {
        info!(
            "Sensor simulator started for unit {} (every {:?})",
            self.slave.unit_id(),
            self.interval
        );

        let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.wait() => break,
                _ = ticker.tick() => match self.step() {
                    Ok(sample) => debug!("Sensor update {}: {:?}", self.tick, sample),
                    Err(e) => error!("Error updating sensor data: {}", e),
                }
            }
        }

        info!("Sensor simulator stopped after {} ticks", self.tick);
    }
}
