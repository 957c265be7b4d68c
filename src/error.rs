// Error taxonomy of the vehicle core

use std::fmt;

use crate::hardware::HardwareError;
use crate::profile::ProfileError;
use crate::session::SessionError;

/// Identity of a physical actuator, attached to every hardware fault
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorId {
    Servo { channel: u8 },
    MotorPin { motor: usize, gpio: u8 },
    MotorPwm { motor: usize, channel: u8 },
}

impl fmt::Display for ActuatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActuatorId::Servo { channel } => write!(f, "servo channel {}", channel),
            ActuatorId::MotorPin { motor, gpio } => write!(f, "motor {} pin GPIO {}", motor, gpio),
            ActuatorId::MotorPwm { motor, channel } => {
                write!(f, "motor {} PWM channel {}", motor, channel)
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum VehicleError {
    #[error("{what} value {value} is outside [-100, 100]")]
    OutOfRange { what: &'static str, value: f64 },

    #[error("unknown {axis} direction code {code}")]
    UnknownDirection { axis: &'static str, code: i8 },

    #[error("message truncated reading {field}: need {needed} bytes, {available} left")]
    TruncatedMessage {
        field: &'static str,
        needed: usize,
        available: usize,
    },

    #[error("CRC8 mismatch: expected 0x{expected:02X}, got 0x{received:02X}")]
    ChecksumMismatch { expected: u8, received: u8 },

    #[error("actuator fault on {actuator}: {source}")]
    ActuatorFault {
        actuator: ActuatorId,
        #[source]
        source: HardwareError,
    },

    #[error("no {what} configured")]
    MissingActuator { what: &'static str },

    #[error("invalid servo range: min={min}, center={center}, max={max}")]
    InvalidRange { min: i32, center: i32, max: i32 },

    #[error("session error: {0}")]
    Session(#[from] SessionError),

    #[error("profile error: {0}")]
    Profile(#[from] ProfileError),
}

pub type Result<T> = std::result::Result<T, VehicleError>;

/// Wraps a hardware result with the identity of the actuator that produced it
pub(crate) fn actuator<T>(
    id: ActuatorId,
    result: std::result::Result<T, HardwareError>,
) -> Result<T> {
    result.map_err(|source| VehicleError::ActuatorFault {
        actuator: id,
        source,
    })
}
