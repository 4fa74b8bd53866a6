use std::{thread, time::Duration};

use anyhow::{Context, Result};
use log::{debug, info};
use serialport::SerialPort;

use crate::firmata::{PinSpec, PwmPin};

/// Anything that can take a brightness (duty cycle) in [0,1]
pub trait ActuatorSink {
    fn write(&mut self, value: f32) -> Result<()>;
}

pub struct SerialSettings<'a> {
    pub port: &'a str,
    pub baud_rate: u32,
    pub pin: &'a str,
    /// Opening the port resets most Arduinos; give Firmata time to come up
    pub board_setup_wait: Duration,
}

/// PWM pin on an Arduino running Firmata, over a serial port
pub struct FirmataSink {
    pin: PwmPin<Box<dyn SerialPort>>,
}

impl FirmataSink {
    pub fn connect(settings: &SerialSettings) -> Result<Self> {
        let spec: PinSpec = settings
            .pin
            .parse()
            .with_context(|| format!("bad pin definition \"{}\"", settings.pin))?;

        info!(
            "Opening serial port {} @ {} baud...",
            settings.port, settings.baud_rate
        );
        let port = serialport::new(settings.port, settings.baud_rate)
            .timeout(Duration::from_millis(100))
            .open()
            .with_context(|| format!("failed to open serial port {}", settings.port))?;

        debug!(
            "Waiting {}ms for board to be ready",
            settings.board_setup_wait.as_millis()
        );
        thread::sleep(settings.board_setup_wait);

        let pin = PwmPin::new(port, spec)?;
        info!("Connected to board on {}; LED on pin {}", settings.port, pin.pin());
        Ok(FirmataSink { pin })
    }
}

impl ActuatorSink for FirmataSink {
    fn write(&mut self, value: f32) -> Result<()> {
        self.pin.write(value)
    }
}

/// For running without hardware: only logs what would have been written
#[derive(Default)]
pub struct NullSink {
    last: Option<f32>,
}

impl NullSink {
    #[cfg(test)]
    pub fn last(&self) -> Option<f32> {
        self.last
    }
}

impl ActuatorSink for NullSink {
    fn write(&mut self, value: f32) -> Result<()> {
        debug!("(dry run) brightness {:.4}", value);
        self.last = Some(value);
        Ok(())
    }
}
