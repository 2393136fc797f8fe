//! Driver for the Broadcom APDS-9960 proximity/gesture sensor.
//!
//! Datasheet: https://docs.broadcom.com/doc/AV02-4191EN
//!
//! Only the gesture engine is used. Gesture resolution works on the first
//! dataset of every FIFO burst and pairs opposing photodiode swings.

use embassy_time::{Duration, Instant, Timer};
use embedded_hal::i2c::Error as _;
use embedded_hal_async::i2c::I2c;
use heapless::Vec;

use crate::{
    gesture::Gesture,
    sensor::{GestureSensor, SensorError},
};

pub const DEFAULT_ADDRESS: u8 = 0x39;
pub const DEVICE_ID: u8 = 0xAB;

mod reg {
    pub const ENABLE: u8 = 0x80;
    pub const ATIME: u8 = 0x81;
    pub const CONTROL: u8 = 0x8F;
    pub const ID: u8 = 0x92;
    pub const GPENTH: u8 = 0xA0;
    pub const GCONF1: u8 = 0xA2;
    pub const GCONF2: u8 = 0xA3;
    pub const GCONF3: u8 = 0xAA;
    pub const GCONF4: u8 = 0xAB;
    pub const GFLVL: u8 = 0xAE;
    pub const GSTATUS: u8 = 0xAF;
    pub const GFIFO_U: u8 = 0xFC;
}

mod bits {
    pub const ENABLE_PON: u8 = 1 << 0;
    pub const ENABLE_PEN: u8 = 1 << 2;
    pub const ENABLE_GEN: u8 = 1 << 6;
    pub const GCONF4_GMODE: u8 = 1 << 0;
    pub const GSTATUS_GVALID: u8 = 1 << 0;
}

// ~10ms integration time (2.78ms per step, counted down from 256)
const ATIME_10MS: u8 = 252;
// LDRIVE 100mA, PGAIN 1x, AGAIN 4x
const CONTROL_AGAIN_4X: u8 = 0x01;
// GFIFOTH: interrupt after 4 datasets
const GCONF1_FIFO_4: u8 = 0x01 << 6;
// GGAIN 4x, GLDRIVE 100mA, GWTIME 0ms
const GCONF2_GAIN_4X: u8 = 0x02 << 5;
// GDIMS: all four photodiodes
const GCONF3_DIMS_ALL: u8 = 0x00;
const GESTURE_PROXIMITY_ENTER: u8 = 50;

const POWER_ON_DELAY: Duration = Duration::from_millis(10);
const FIFO_SETTLE: Duration = Duration::from_millis(30);
const GESTURE_TIMEOUT: Duration = Duration::from_millis(300);

/// Minimum photodiode difference that counts as motion.
const MOTION_THRESHOLD: i16 = 13;

const FIFO_DEPTH: usize = 32;
const DATASET_SIZE: usize = 4;

/// One FIFO sample: the four directional photodiode readings.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Dataset {
    pub up: u8,
    pub down: u8,
    pub left: u8,
    pub right: u8,
}

impl Dataset {
    fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            up: bytes[0],
            down: bytes[1],
            left: bytes[2],
            right: bytes[3],
        }
    }
}

#[derive(Debug, Default, Clone, Copy, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Resolution {
    pub motion: bool,
    pub gesture: Option<Gesture>,
}

/// Pairs opposing swings into gestures.
///
/// A first swing only arms its direction counter; the opposite swing that
/// follows resolves the gesture.
#[derive(Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GestureResolver {
    up: u8,
    down: u8,
    left: u8,
    right: u8,
}

impl GestureResolver {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn update(&mut self, dataset: &Dataset) -> Resolution {
        let up_down = Self::significant(dataset.up, dataset.down);
        let left_right = Self::significant(dataset.left, dataset.right);
        let mut gesture = None;

        if up_down < 0 {
            if self.down > 0 {
                gesture = Some(Gesture::Up);
            } else {
                self.up = self.up.saturating_add(1);
            }
        } else if up_down > 0 {
            if self.up > 0 {
                gesture = Some(Gesture::Down);
            } else {
                self.down = self.down.saturating_add(1);
            }
        }

        if left_right < 0 {
            if self.right > 0 {
                gesture = Some(Gesture::Left);
            } else {
                self.left = self.left.saturating_add(1);
            }
        } else if left_right > 0 {
            if self.left > 0 {
                gesture = Some(Gesture::Right);
            } else {
                self.right = self.right.saturating_add(1);
            }
        }

        Resolution {
            motion: up_down != 0 || left_right != 0,
            gesture,
        }
    }

    fn significant(a: u8, b: u8) -> i16 {
        let diff = a as i16 - b as i16;
        if diff.abs() > MOTION_THRESHOLD { diff } else { 0 }
    }
}

pub struct Apds9960<I2C: I2c> {
    i2c: I2C,
    address: u8,
    resolver: GestureResolver,
}

impl<I2C: I2c> Apds9960<I2C> {
    pub fn new(i2c: I2C) -> Self {
        Self::with_address(i2c, DEFAULT_ADDRESS)
    }

    pub fn with_address(i2c: I2C, address: u8) -> Self {
        Self {
            i2c,
            address,
            resolver: GestureResolver::default(),
        }
    }

    pub fn release(self) -> I2C {
        self.i2c
    }

    async fn read_reg(&mut self, register: u8) -> Result<u8, SensorError> {
        let mut buf = [0u8];
        self.i2c.write_read(self.address, &[register], &mut buf).await.map_err(|e| e.kind())?;
        trace!("APDS.Read> 0x{:02X} => 0x{:02X}", register, buf[0]);
        Ok(buf[0])
    }

    async fn write_reg(&mut self, register: u8, value: u8) -> Result<(), SensorError> {
        trace!("APDS.Write> 0x{:02X} <= 0x{:02X}", register, value);
        self.i2c.write(self.address, &[register, value]).await.map_err(|e| e.kind())?;
        Ok(())
    }

    async fn update_reg(&mut self, register: u8, mask: u8, set: bool) -> Result<(), SensorError> {
        let current = self.read_reg(register).await?;
        let value = if set { current | mask } else { current & !mask };
        self.write_reg(register, value).await
    }

    async fn gesture_valid(&mut self) -> Result<bool, SensorError> {
        Ok(self.read_reg(reg::GSTATUS).await? & bits::GSTATUS_GVALID != 0)
    }

    /// Drains the datasets currently in the FIFO and returns the oldest one.
    async fn read_fifo(&mut self) -> Result<Option<Dataset>, SensorError> {
        let level = (self.read_reg(reg::GFLVL).await? as usize).min(FIFO_DEPTH);
        if level == 0 {
            return Ok(None);
        }
        let mut buf: Vec<u8, { FIFO_DEPTH * DATASET_SIZE }> = Vec::new();
        // level <= FIFO_DEPTH, so this always fits
        let _ = buf.resize(level * DATASET_SIZE, 0);
        self.i2c.write_read(self.address, &[reg::GFIFO_U], &mut buf).await.map_err(|e| e.kind())?;
        let dataset = Dataset::from_bytes(&buf[..DATASET_SIZE]);
        trace!("APDS.Fifo> {} datasets, first {:?}", level, dataset);
        Ok(Some(dataset))
    }
}

impl<I2C: I2c> GestureSensor for Apds9960<I2C> {
    async fn begin(&mut self) -> Result<(), SensorError> {
        let id = self.read_reg(reg::ID).await?;
        if id != DEVICE_ID {
            error!("APDS> unexpected device id 0x{:02X}", id);
            return Err(SensorError::WrongDevice(id));
        }

        self.write_reg(reg::ENABLE, 0x00).await?;
        self.write_reg(reg::ATIME, ATIME_10MS).await?;
        self.write_reg(reg::CONTROL, CONTROL_AGAIN_4X).await?;

        self.write_reg(reg::GCONF3, GCONF3_DIMS_ALL).await?;
        self.write_reg(reg::GCONF1, GCONF1_FIFO_4).await?;
        self.write_reg(reg::GCONF2, GCONF2_GAIN_4X).await?;
        self.write_reg(reg::GPENTH, GESTURE_PROXIMITY_ENTER).await?;
        self.resolver.reset();

        self.write_reg(reg::ENABLE, bits::ENABLE_PON).await?;
        Timer::after(POWER_ON_DELAY).await;
        debug!("APDS> configured");
        Ok(())
    }

    async fn enable_gesture(&mut self, enable: bool) -> Result<(), SensorError> {
        if !enable {
            self.update_reg(reg::GCONF4, bits::GCONF4_GMODE, false).await?;
            self.update_reg(reg::ENABLE, bits::ENABLE_GEN, false).await?;
        } else {
            // the gesture engine is entered through proximity detection
            self.update_reg(reg::ENABLE, bits::ENABLE_PEN | bits::ENABLE_GEN, true).await?;
        }
        self.resolver.reset();
        Ok(())
    }

    async fn read_gesture(&mut self) -> Result<Gesture, SensorError> {
        let mut last_motion: Option<Instant> = None;
        loop {
            if !self.gesture_valid().await? {
                return Ok(Gesture::None);
            }
            Timer::after(FIFO_SETTLE).await;

            let resolution = match self.read_fifo().await? {
                Some(dataset) => self.resolver.update(&dataset),
                None => Resolution::default(),
            };
            if resolution.motion {
                last_motion = Some(Instant::now());
            }

            let idle = last_motion.is_none_or(|at| at.elapsed() > GESTURE_TIMEOUT);
            if resolution.gesture.is_some() || idle {
                self.resolver.reset();
                return Ok(resolution.gesture.unwrap_or(Gesture::None));
            }
        }
    }
}

#[cfg(test)]
pub mod tests {
    use std::collections::VecDeque;
    use std::vec::Vec;

    use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource, Operation};

    use super::*;

    pub struct I2cMock {
        registers: [u8; 256],
        fifo: VecDeque<Vec<[u8; 4]>>,
        writes: Vec<(u8, u8)>,
        fail: bool,
    }

    impl I2cMock {
        pub fn new() -> Self {
            let mut registers = [0u8; 256];
            registers[reg::ID as usize] = DEVICE_ID;
            Self {
                registers,
                fifo: VecDeque::new(),
                writes: Vec::new(),
                fail: false,
            }
        }

        /// Queues a FIFO burst holding a single dataset.
        fn push(&mut self, up: u8, down: u8, left: u8, right: u8) {
            self.push_burst(&[[up, down, left, right]]);
        }

        fn push_burst(&mut self, datasets: &[[u8; 4]]) {
            self.fifo.push_back(datasets.to_vec());
        }

        fn read_into(&mut self, register: u8, buf: &mut [u8]) {
            match register {
                reg::GSTATUS => buf[0] = if self.fifo.is_empty() { 0 } else { bits::GSTATUS_GVALID },
                reg::GFLVL => buf[0] = self.fifo.front().map_or(0, |burst| burst.len() as u8),
                reg::GFIFO_U => {
                    let burst = self.fifo.pop_front().unwrap_or_default();
                    for (chunk, dataset) in buf.chunks_mut(4).zip(burst.iter()) {
                        chunk.copy_from_slice(dataset);
                    }
                }
                other => buf[0] = self.registers[other as usize],
            }
        }
    }

    impl embedded_hal_async::i2c::ErrorType for I2cMock {
        type Error = ErrorKind;
    }

    impl embedded_hal_async::i2c::I2c for I2cMock {
        async fn transaction(&mut self, address: u8, operations: &mut [Operation<'_>]) -> Result<(), Self::Error> {
            assert_eq!(address, DEFAULT_ADDRESS);
            if self.fail {
                return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
            }
            let mut pointer = None;
            for operation in operations.iter_mut() {
                match operation {
                    Operation::Write(bytes) => {
                        pointer = Some(bytes[0]);
                        if let &[register, value] = *bytes {
                            self.registers[register as usize] = value;
                            self.writes.push((register, value));
                        }
                    }
                    Operation::Read(buf) => {
                        let register = pointer.expect("read without register pointer");
                        self.read_into(register, buf);
                    }
                }
            }
            Ok(())
        }
    }

    fn sensor() -> Apds9960<I2cMock> {
        Apds9960::new(I2cMock::new())
    }

    #[test]
    fn resolver_ignores_small_differences() {
        let mut resolver = GestureResolver::default();
        let resolution = resolver.update(&Dataset {
            up: 100,
            down: 113,
            left: 50,
            right: 40,
        });
        assert_eq!(resolution, Resolution::default());
    }

    #[test]
    fn resolver_pairs_opposite_swings() {
        let mut resolver = GestureResolver::default();
        let first = resolver.update(&Dataset { up: 10, down: 40, left: 0, right: 0 });
        assert!(first.motion);
        assert_eq!(first.gesture, None);
        let second = resolver.update(&Dataset { up: 40, down: 10, left: 0, right: 0 });
        assert_eq!(second.gesture, Some(Gesture::Down));

        resolver.reset();
        resolver.update(&Dataset { up: 40, down: 10, left: 0, right: 0 });
        let second = resolver.update(&Dataset { up: 10, down: 40, left: 0, right: 0 });
        assert_eq!(second.gesture, Some(Gesture::Up));
    }

    #[test]
    fn resolver_left_right() {
        let mut resolver = GestureResolver::default();
        resolver.update(&Dataset { up: 0, down: 0, left: 60, right: 20 });
        let resolution = resolver.update(&Dataset { up: 0, down: 0, left: 20, right: 60 });
        assert_eq!(resolution.gesture, Some(Gesture::Left));

        resolver.reset();
        resolver.update(&Dataset { up: 0, down: 0, left: 20, right: 60 });
        let resolution = resolver.update(&Dataset { up: 0, down: 0, left: 60, right: 20 });
        assert_eq!(resolution.gesture, Some(Gesture::Right));
    }

    #[test]
    fn resolver_left_right_wins_within_one_dataset() {
        let mut resolver = GestureResolver::default();
        resolver.update(&Dataset { up: 10, down: 40, left: 60, right: 20 });
        let resolution = resolver.update(&Dataset { up: 40, down: 10, left: 20, right: 60 });
        assert_eq!(resolution.gesture, Some(Gesture::Left));
    }

    #[tokio::test]
    async fn begin_configures_and_powers_on() {
        let mut sensor = sensor();
        sensor.begin().await.unwrap();
        let bus = sensor.release();
        assert_eq!(bus.writes.first(), Some(&(reg::ENABLE, 0x00)));
        assert_eq!(bus.writes.last(), Some(&(reg::ENABLE, bits::ENABLE_PON)));
        assert_eq!(bus.registers[reg::ATIME as usize], ATIME_10MS);
        assert_eq!(bus.registers[reg::GCONF1 as usize], GCONF1_FIFO_4);
        assert_eq!(bus.registers[reg::GCONF2 as usize], GCONF2_GAIN_4X);
        assert_eq!(bus.registers[reg::GPENTH as usize], GESTURE_PROXIMITY_ENTER);
    }

    #[tokio::test]
    async fn begin_rejects_wrong_device() {
        let mut bus = I2cMock::new();
        bus.registers[reg::ID as usize] = 0xA8;
        let mut sensor = Apds9960::new(bus);
        assert_eq!(sensor.begin().await, Err(SensorError::WrongDevice(0xA8)));
        assert!(sensor.release().writes.is_empty());
    }

    #[tokio::test]
    async fn begin_reports_bus_errors() {
        let mut bus = I2cMock::new();
        bus.fail = true;
        let mut sensor = Apds9960::new(bus);
        assert_eq!(
            sensor.begin().await,
            Err(SensorError::Bus(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address)))
        );
    }

    #[tokio::test]
    async fn enable_and_disable_gesture() {
        let mut sensor = sensor();
        sensor.begin().await.unwrap();
        sensor.enable_gesture(true).await.unwrap();
        let enable = sensor.i2c.registers[reg::ENABLE as usize];
        assert_eq!(enable, bits::ENABLE_PON | bits::ENABLE_PEN | bits::ENABLE_GEN);

        sensor.i2c.registers[reg::GCONF4 as usize] = bits::GCONF4_GMODE;
        sensor.enable_gesture(false).await.unwrap();
        assert_eq!(sensor.i2c.registers[reg::ENABLE as usize], bits::ENABLE_PON | bits::ENABLE_PEN);
        assert_eq!(sensor.i2c.registers[reg::GCONF4 as usize], 0);
    }

    #[tokio::test]
    async fn read_without_valid_data_is_none() {
        let mut sensor = sensor();
        assert_eq!(sensor.read_gesture().await, Ok(Gesture::None));
    }

    #[tokio::test]
    async fn read_resolves_a_swipe() {
        let mut sensor = sensor();
        sensor.i2c.push(0, 0, 20, 60);
        sensor.i2c.push(0, 0, 60, 20);
        assert_eq!(sensor.read_gesture().await, Ok(Gesture::Right));
        assert!(sensor.i2c.fifo.is_empty());
    }

    #[tokio::test]
    async fn read_without_motion_returns_none() {
        let mut sensor = sensor();
        sensor.i2c.push(30, 30, 30, 30);
        assert_eq!(sensor.read_gesture().await, Ok(Gesture::None));
    }

    #[tokio::test]
    async fn only_the_first_dataset_of_a_burst_counts() {
        let mut sensor = sensor();
        sensor.i2c.push_burst(&[[30, 30, 30, 30], [0, 0, 20, 60]]);
        assert_eq!(sensor.read_gesture().await, Ok(Gesture::None));
        assert!(sensor.i2c.fifo.is_empty());
    }

    #[tokio::test]
    async fn pending_swing_survives_an_empty_fifo() {
        let mut sensor = sensor();
        sensor.i2c.push(10, 40, 0, 0);
        // FIFO runs dry before the swing completes
        assert_eq!(sensor.read_gesture().await, Ok(Gesture::None));
        sensor.i2c.push(40, 10, 0, 0);
        assert_eq!(sensor.read_gesture().await, Ok(Gesture::Down));
    }

    #[tokio::test]
    async fn read_gives_up_after_idle_timeout() {
        let mut sensor = sensor();
        sensor.i2c.push(10, 40, 0, 0);
        for _ in 0..20 {
            sensor.i2c.push(30, 30, 30, 30);
        }
        let start = std::time::Instant::now();
        assert_eq!(sensor.read_gesture().await, Ok(Gesture::None));
        assert!(start.elapsed() >= std::time::Duration::from_millis(300));

        // counters were reset, so the opposite swing only arms again
        sensor.i2c.fifo.clear();
        sensor.i2c.push(40, 10, 0, 0);
        assert_eq!(sensor.read_gesture().await, Ok(Gesture::None));
    }

    #[tokio::test]
    async fn read_reports_bus_errors() {
        let mut sensor = sensor();
        sensor.i2c.fail = true;
        assert!(matches!(sensor.read_gesture().await, Err(SensorError::Bus(_))));
    }
}
