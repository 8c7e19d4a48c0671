// Hardware collaborators consumed by the control core
//
// The chip bindings (PWM driver, IMU, LED driver, camera) live behind these
// traits; the core only ever hands them post-conversion values.

pub mod sim;

pub use sim::{NoDetector, SimImu, SimIndicator, SimServoBoard};

/// Error types for hardware collaborators
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DriverError {
    #[error("Actuator channel {channel} write failed: {reason}")]
    Actuator { channel: u8, reason: String },

    #[error("Orientation sensor read failed: {0}")]
    Sensor(String),

    #[error("Indicator write failed: {0}")]
    Indicator(String),
}

/// PWM servo driver: takes 12-bit duty values, never raw angles
pub trait ActuatorDriver {
    fn write(&mut self, channel: u8, duty: u16) -> Result<(), DriverError>;
}

/// One orientation sample in degrees (angles) and m/s^2 (acceleration)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Orientation {
    pub pitch: f32,
    pub roll: f32,
    pub yaw: f32,
    pub accel_x: f32,
    pub accel_y: f32,
    pub accel_z: f32,
}

/// Orientation sensor, sampled synchronously
pub trait OrientationSensor {
    fn sample(&mut self) -> Result<Orientation, DriverError>;
}

/// Which eye ring an indicator write targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Right,
    Left,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// Addressable LED rings behind the eyes
pub trait IndicatorDriver {
    fn write(&mut self, side: Side, index: usize, color: Rgb) -> Result<(), DriverError>;

    /// Latch the written colors; drivers that write through can ignore this
    fn show(&mut self) -> Result<(), DriverError> {
        Ok(())
    }
}

/// A person found in a camera frame, in pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Detection {
    pub x: i16,
    pub y: i16,
    pub size: u16,
}

/// Camera person detector on the main board
pub trait PersonDetector {
    fn detect(&mut self) -> Option<Detection>;
}
