use esp_hal::{
    Async,
    i2c::master::{Config as I2cConfig, ConfigError, I2c},
    peripherals::{GPIO21, GPIO22, I2C0},
    time::Rate,
};

/// Async I2C bus for the gesture sensor on the ESP32 default pins (GPIO21=SDA, GPIO22=SCL).
pub fn init_sensor_bus(i2c0: I2C0<'static>, sda: GPIO21<'static>, scl: GPIO22<'static>) -> Result<I2c<'static, Async>, ConfigError> {
    let i2c = I2c::new(i2c0, I2cConfig::default().with_frequency(Rate::from_khz(100)))?
        .with_sda(sda)
        .with_scl(scl)
        .into_async();
    Ok(i2c)
}
