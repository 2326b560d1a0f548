//! Modbus device link (TCP or RTU).

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio_modbus::client::{Client, Context, Reader};
use tokio_modbus::prelude::{Slave, rtu, tcp};
use tracing::{debug, info, warn};

use pvsight_bridge_framework::LinkState;

use crate::config::{ConnectionConfig, InverterConfig, Parity};
use crate::register_map::RegisterBank;

/// Device link errors. Recoverable: the collector turns them into absent fields.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceLinkError {
    #[error("Device link is not connected")]
    NotConnected,
    #[error("Device exception response: {0}")]
    Protocol(String),
    #[error("Device transport error: {0}")]
    Transport(String),
}

/// Stateful connection to the field device.
///
/// No operation retries internally.
#[async_trait]
pub trait DeviceLink: Send {
    /// Open the underlying transport. Calling it while connected is a no-op.
    async fn connect(&mut self) -> Result<(), DeviceLinkError>;

    /// Read `count` registers starting at the 0-based `address`.
    async fn read_registers(
        &mut self,
        bank: RegisterBank,
        address: u16,
        count: u16,
    ) -> Result<Vec<u16>, DeviceLinkError>;

    /// Release the transport. Safe to call repeatedly; close errors are logged.
    async fn disconnect(&mut self);

    /// Current link state.
    fn state(&self) -> LinkState;
}

/// [`DeviceLink`] over tokio-modbus.
///
/// A read that fails at the transport level (timeout, I/O error, framing
/// mismatch) leaves the stream out of step with the device, so the context is
/// dropped and a fresh one is opened before the next read.
pub struct ModbusDeviceLink {
    name: String,
    connection: ConnectionConfig,
    unit_id: u8,
    timeout: Duration,
    ctx: Option<Context>,
    /// Set while the link should be up but its context was discarded.
    needs_reopen: bool,
}

impl ModbusDeviceLink {
    /// Create a disconnected link for the configured inverter.
    pub fn new(config: &InverterConfig) -> Self {
        Self {
            name: config.name.clone(),
            connection: config.connection.clone(),
            unit_id: config.unit_id,
            timeout: config.timeout(),
            ctx: None,
            needs_reopen: false,
        }
    }

    /// Discard a context whose stream may still carry a late reply.
    fn invalidate(&mut self, reason: &str) {
        if self.ctx.take().is_some() {
            warn!(
                device = %self.name,
                reason,
                "Dropping device context; reopening before next read"
            );
        }
        self.needs_reopen = true;
    }

    async fn reopen(&mut self) -> Result<(), DeviceLinkError> {
        let ctx = self.open().await?;
        self.ctx = Some(ctx);
        self.needs_reopen = false;
        info!(device = %self.name, "Reopened device link");
        Ok(())
    }

    async fn open(&mut self) -> Result<Context, DeviceLinkError> {
        let slave = Slave(self.unit_id);

        match &self.connection {
            ConnectionConfig::Tcp { host, port } => {
                let addr = Self::resolve(self.timeout, host, *port).await?;

                let ctx = tokio::time::timeout(self.timeout, tcp::connect_slave(addr, slave))
                    .await
                    .map_err(|_| DeviceLinkError::Transport("Connection timeout".to_string()))?
                    .map_err(|e| DeviceLinkError::Transport(e.to_string()))?;

                Ok(ctx)
            }
            ConnectionConfig::Rtu {
                port,
                baud_rate,
                data_bits,
                parity,
                stop_bits,
            } => {
                let parity = match parity {
                    Parity::None => tokio_serial::Parity::None,
                    Parity::Even => tokio_serial::Parity::Even,
                    Parity::Odd => tokio_serial::Parity::Odd,
                };

                let stop_bits = match stop_bits {
                    2 => tokio_serial::StopBits::Two,
                    _ => tokio_serial::StopBits::One,
                };

                let data_bits = match data_bits {
                    5 => tokio_serial::DataBits::Five,
                    6 => tokio_serial::DataBits::Six,
                    7 => tokio_serial::DataBits::Seven,
                    _ => tokio_serial::DataBits::Eight,
                };

                let builder = tokio_serial::new(port, *baud_rate)
                    .parity(parity)
                    .stop_bits(stop_bits)
                    .data_bits(data_bits)
                    .timeout(self.timeout);

                let serial = tokio_serial::SerialStream::open(&builder).map_err(|e| {
                    DeviceLinkError::Transport(format!("Serial open failed: {}", e))
                })?;

                Ok(rtu::attach_slave(serial, slave))
            }
        }
    }

    async fn resolve(
        timeout: Duration,
        host: &str,
        port: u16,
    ) -> Result<SocketAddr, DeviceLinkError> {
        let lookup = tokio::net::lookup_host((host, port));

        tokio::time::timeout(timeout, lookup)
            .await
            .map_err(|_| DeviceLinkError::Transport(format!("Timed out resolving '{}'", host)))?
            .map_err(|e| DeviceLinkError::Transport(format!("Invalid address: {}", e)))?
            .next()
            .ok_or_else(|| DeviceLinkError::Transport(format!("No address for '{}'", host)))
    }
}

#[async_trait]
impl DeviceLink for ModbusDeviceLink {
    async fn connect(&mut self) -> Result<(), DeviceLinkError> {
        if self.ctx.is_some() {
            return Ok(());
        }

        let ctx = self.open().await?;
        self.ctx = Some(ctx);
        self.needs_reopen = false;

        info!(
            device = %self.name,
            connection = ?self.connection,
            unit_id = self.unit_id,
            "Connected to inverter"
        );
        Ok(())
    }

    async fn read_registers(
        &mut self,
        bank: RegisterBank,
        address: u16,
        count: u16,
    ) -> Result<Vec<u16>, DeviceLinkError> {
        if self.ctx.is_none() && self.needs_reopen {
            self.reopen().await?;
        }

        let timeout = self.timeout;
        let ctx = self.ctx.as_mut().ok_or(DeviceLinkError::NotConnected)?;

        let request = async {
            match bank {
                RegisterBank::Holding => ctx.read_holding_registers(address, count).await,
                RegisterBank::Input => ctx.read_input_registers(address, count).await,
            }
        };

        let result = tokio::time::timeout(timeout, request).await;
        let response = match result {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                let e = DeviceLinkError::Transport(e.to_string());
                self.invalidate("transport error");
                return Err(e);
            }
            Err(_) => {
                self.invalidate("read timeout");
                return Err(DeviceLinkError::Transport(format!(
                    "Read timed out after {:?}",
                    timeout
                )));
            }
        };

        let words = response.map_err(|e| DeviceLinkError::Protocol(format!("{:?}", e)))?;

        if words.len() != usize::from(count) {
            return Err(DeviceLinkError::Protocol(format!(
                "Expected {} registers, got {}",
                count,
                words.len()
            )));
        }

        debug!(
            device = %self.name,
            bank = bank.as_str(),
            function_code = bank.function_code(),
            address,
            ?words,
            "Read registers"
        );
        Ok(words)
    }

    async fn disconnect(&mut self) {
        self.needs_reopen = false;
        if let Some(mut ctx) = self.ctx.take() {
            if let Err(e) = ctx.disconnect().await {
                warn!(device = %self.name, error = %e, "Error closing device link");
            }
            info!(device = %self.name, "Disconnected from inverter");
        }
    }

    fn state(&self) -> LinkState {
        if self.ctx.is_some() {
            LinkState::Connected
        } else {
            LinkState::Disconnected
        }
    }
}
