//! Gesture kinds as reported by the sensor and the record that carries them over the air.

pub const GESTURE_NONE: i32 = 0x00;
pub const GESTURE_UP: i32 = 0x01;
pub const GESTURE_DOWN: i32 = 0x02;
pub const GESTURE_LEFT: i32 = 0x03;
pub const GESTURE_RIGHT: i32 = 0x04;
pub const GESTURE_NEAR: i32 = 0x05;
pub const GESTURE_FAR: i32 = 0x06;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Gesture {
    None,
    Up,
    Down,
    Left,
    Right,
    Near,
    Far,
    /// Any code outside the known table, kept verbatim.
    Unknown(i32),
}

impl Gesture {
    pub fn from_code(code: i32) -> Self {
        match code {
            GESTURE_NONE => Gesture::None,
            GESTURE_UP => Gesture::Up,
            GESTURE_DOWN => Gesture::Down,
            GESTURE_LEFT => Gesture::Left,
            GESTURE_RIGHT => Gesture::Right,
            GESTURE_NEAR => Gesture::Near,
            GESTURE_FAR => Gesture::Far,
            other => Gesture::Unknown(other),
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            Gesture::None => GESTURE_NONE,
            Gesture::Up => GESTURE_UP,
            Gesture::Down => GESTURE_DOWN,
            Gesture::Left => GESTURE_LEFT,
            Gesture::Right => GESTURE_RIGHT,
            Gesture::Near => GESTURE_NEAR,
            Gesture::Far => GESTURE_FAR,
            Gesture::Unknown(code) => *code,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Gesture::None)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Gesture::None => "NONE",
            Gesture::Up => "UP",
            Gesture::Down => "DOWN",
            Gesture::Left => "LEFT",
            Gesture::Right => "RIGHT",
            Gesture::Near => "NEAR",
            Gesture::Far => "FAR",
            Gesture::Unknown(_) => "UNKNOWN",
        }
    }
}

#[derive(Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DecodeError {
    Length { expected: usize, actual: usize },
}

/// Payload of one ESP-NOW datagram.
///
/// The layout matches a C `struct { int gesture; }` on the ESP32: a single
/// little-endian 32-bit signed integer, no header, no padding.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GestureRecord {
    pub gesture: i32,
}

impl GestureRecord {
    pub const SIZE: usize = core::mem::size_of::<i32>();

    pub fn new(gesture: Gesture) -> Self {
        Self { gesture: gesture.code() }
    }

    pub fn gesture(&self) -> Gesture {
        Gesture::from_code(self.gesture)
    }

    pub fn encode(&self) -> [u8; Self::SIZE] {
        self.gesture.to_le_bytes()
    }

    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        let bytes: [u8; Self::SIZE] = payload.try_into().map_err(|_| DecodeError::Length {
            expected: Self::SIZE,
            actual: payload.len(),
        })?;
        Ok(Self {
            gesture: i32::from_le_bytes(bytes),
        })
    }
}

impl From<Gesture> for GestureRecord {
    fn from(gesture: Gesture) -> Self {
        Self::new(gesture)
    }
}
