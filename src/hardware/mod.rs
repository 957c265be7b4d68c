// Actuator capabilities consumed by the calibrated components
//
// Provides:
// - Servo, output pin and PWM traits (one method each, no logic)
// - A `Board` factory selected at startup
// - `SimBoard`, a logging/recording backend used by the binary and the tests

pub mod sim;

use std::fmt;

pub use sim::{ActuatorEvent, SimBoard};

/// Logic level of a digital output pin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinLevel {
    Low,
    High,
}

impl fmt::Display for PinLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PinLevel::Low => f.write_str("low"),
            PinLevel::High => f.write_str("high"),
        }
    }
}

/// Error types for actuator backends
#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    #[error("servo channel {channel} rejected angle {angle}")]
    ServoWrite { channel: u8, angle: i32 },

    #[error("GPIO {gpio} write failed")]
    PinWrite { gpio: u8 },

    #[error("PWM channel {channel} write failed")]
    PwmWrite { channel: u8 },
}

pub type Result<T> = std::result::Result<T, HardwareError>;

/// A continuous-angle servo on a controller channel
pub trait ServoMotor: Send {
    fn set_angle(&mut self, angle: i32) -> Result<()>;
}

/// A GPIO pin already configured as an output
pub trait OutputPin: Send {
    fn write(&mut self, level: PinLevel) -> Result<()>;
}

/// A multi-channel PWM generator (12-bit on/off counts)
pub trait PwmOutput: Send {
    fn set_pwm(&mut self, channel: u8, on_time: u16, off_time: u16) -> Result<()>;
}

/// Factory for the actuators of one platform
///
/// The implementation is picked once at startup and handed to the
/// `VehicleController`, which keeps the created handles for its lifetime.
pub trait Board: Send {
    fn servo(&mut self, channel: u8) -> Result<Box<dyn ServoMotor>>;

    fn output_pin(&mut self, gpio: u8) -> Result<Box<dyn OutputPin>>;

    fn pwm(&mut self) -> Result<Box<dyn PwmOutput>>;
}
