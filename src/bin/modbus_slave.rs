//! Modbus test slave
//!
//! Serves the seeded device image over Modbus TCP, runs the sensor
//! simulator and advertises the device over mDNS. Stops cleanly on
//! ctrl-c or SIGTERM, withdrawing the advertisement first.
//!
//! Usage: MODBUS_PORT=5020 MODBUS_DEVICE_ID=1 cargo run --bin modbus_slave

use std::process::ExitCode;
use std::sync::Arc;

use modbus_test_slave::{
    logging, shutdown, Advertisement, DeviceIdentity, LoggingMode, ModbusError, ModbusResult,
    ModbusTcpServer, SensorSimulator, ServerConfig, ServerContext, ServiceRecord,
};
use tracing::{debug, error, info, warn};

#[tokio::main]
async fn main() -> ExitCode {
    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = logging::init(config.log_level, LoggingMode::Full) {
        eprintln!("{}", e);
    }

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Modbus server failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(config: ServerConfig) -> ModbusResult<()> {
    info!(
        "Starting ESP Test Modbus TCP Server on port {}, device ID {}",
        config.port, config.unit_id
    );

    let context = Arc::new(ServerContext::single(config.unit_id));
    let server = ModbusTcpServer::bind(config.socket_addr(), Arc::clone(&context)).await?;

    let record = ServiceRecord::for_device(&config, &DeviceIdentity::default());
    info!("Service record: {}", record);
    for (key, value) in &record.properties {
        debug!("  TXT {}={}", key, value);
    }
    // the Modbus service runs without discovery if this fails
    let advertisement = match record.publish(config.bind_address) {
        Ok(advertisement) => Some(advertisement),
        Err(e) => {
            warn!("Failed to register mDNS service: {}", e);
            None
        }
    };

    let (trigger, signal) = shutdown::channel();

    let simulator = match (config.simulation_interval(), context.get(config.unit_id)) {
        (Some(interval), Some(slave)) => Some(tokio::spawn(
            SensorSimulator::new(Arc::clone(slave), interval).run(signal.clone()),
        )),
        _ => {
            info!("Sensor simulation disabled");
            None
        }
    };

    let mut server_task = tokio::spawn(server.run(signal));

    tokio::select! {
        received = wait_for_signal() => {
            received?;
            info!("Received shutdown signal, shutting down...");
        }
        finished = &mut server_task => {
            trigger.trigger();
            withdraw(advertisement).await;
            return join(finished);
        }
    }

    trigger.trigger();
    withdraw(advertisement).await;
    join(server_task.await)?;
    if let Some(simulator) = simulator {
        join(simulator.await.map(Ok))?;
    }

    info!("Modbus server stopped");
    Ok(())
}

async fn withdraw(advertisement: Option<Advertisement>) {
    let Some(advertisement) = advertisement else {
        return;
    };
    match tokio::task::spawn_blocking(move || advertisement.unregister()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("Failed to unregister mDNS service: {}", e),
        Err(e) => warn!("mDNS unregister task failed: {}", e),
    }
}

fn join(result: Result<ModbusResult<()>, tokio::task::JoinError>) -> ModbusResult<()> {
    result.map_err(|e| ModbusError::internal(format!("task failed: {}", e)))?
}

#[cfg(unix)]
async fn wait_for_signal() -> ModbusResult<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result?,
        _ = terminate.recv() => {}
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_signal() -> ModbusResult<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
