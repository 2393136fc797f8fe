#![allow(async_fn_in_trait)]

use crate::gesture::Gesture;

pub mod apds9960;

#[derive(Debug, Eq, PartialEq)]
pub enum SensorError {
    Bus(embedded_hal::i2c::ErrorKind),
    WrongDevice(u8),
}

#[cfg(feature = "defmt")]
impl defmt::Format for SensorError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            SensorError::Bus(kind) => defmt::write!(f, "Bus({:?})", kind),
            SensorError::WrongDevice(id) => defmt::write!(f, "WrongDevice(id=0x{:02X})", id),
        }
    }
}

impl From<embedded_hal::i2c::ErrorKind> for SensorError {
    fn from(kind: embedded_hal::i2c::ErrorKind) -> Self {
        SensorError::Bus(kind)
    }
}

/// A device that reports hand gestures.
pub trait GestureSensor {
    /// Probes and configures the device. Failing here is fatal for the transmitter.
    async fn begin(&mut self) -> Result<(), SensorError>;

    async fn enable_gesture(&mut self, enable: bool) -> Result<(), SensorError>;

    /// Returns [`Gesture::None`] when no gesture can be resolved right now.
    async fn read_gesture(&mut self) -> Result<Gesture, SensorError>;
}
