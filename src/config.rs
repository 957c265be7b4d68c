// Ports, pin assignments, calibration constants and command line options
use std::path::PathBuf;

use clap::{Parser, ValueEnum};

// Operator session (text menu) TCP port
pub const SESSION_TCP_PORT: u16 = 1337;

// Remote-control datagrams (35-byte Motion Commands)
pub const STEERING_UDP_PORT: u16 = 1338;

// Drive motors: two direction pins (A, B) per H-bridge channel
pub const MOTOR0_PIN_A: u8 = 17;
pub const MOTOR0_PIN_B: u8 = 18;
pub const MOTOR1_PIN_A: u8 = 27;
pub const MOTOR1_PIN_B: u8 = 22;

// PWM channels carrying the shared speed duty
pub const MOTOR0_PWM_CHANNEL: u8 = 5;
pub const MOTOR1_PWM_CHANNEL: u8 = 4;

// 0-100 % onto the 12-bit PWM resolution (0-4095)
pub const PWM_COUNTS_PER_PERCENT: f64 = 40.96;

// Fixed duty used while asking the operator which way a wheel turns
pub const MOTOR_CALIBRATION_DUTY: u16 = 2000;

// Servo controller channels
pub const STEERING_SERVO_CHANNEL: u8 = 0;
pub const CAMERA_SERVO_CHANNELS: [u8; 2] = [14, 15];

// Placeholder angle for uncalibrated servos
pub const NEUTRAL_ANGLE: i32 = 90;

// Where the calibration profile lives unless overridden
pub const DEFAULT_PROFILE_PATH: &str = "calibration.json";

/// Operator channel used for the menu and calibration prompts
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SessionKind {
    Console,
    Tcp,
    Serial,
}

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Remote-controlled vehicle runtime", long_about = None)]
pub struct Args {
    /// Where operator sessions come from
    #[arg(long, value_enum, default_value_t = SessionKind::Tcp)]
    pub session: SessionKind,

    /// TCP port for operator sessions
    #[arg(long, default_value_t = SESSION_TCP_PORT)]
    pub tcp_port: u16,

    /// UDP port for remote Motion Commands
    #[arg(long, default_value_t = STEERING_UDP_PORT)]
    pub udp_port: u16,

    /// Serial device for operator sessions (with --session serial)
    #[arg(long, default_value = "/dev/ttyUSB0")]
    pub serial_port: String,

    #[arg(long, default_value_t = crate::session::DEFAULT_BAUDRATE)]
    pub baud_rate: u32,

    /// Calibration profile file
    #[arg(long, default_value = DEFAULT_PROFILE_PATH)]
    pub profile: PathBuf,

    /// Require a CRC8 trailer on every Motion Command datagram
    #[arg(long, default_value_t = false)]
    pub crc8: bool,
}
