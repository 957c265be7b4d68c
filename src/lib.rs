pub mod calibration;
pub mod codec;
pub mod components;
pub mod config;
pub mod error;
pub mod hardware;
pub mod messages;
pub mod profile;
pub mod runtime;
pub mod session;
pub mod udp;
pub mod vehicle;

pub use error::{Result, VehicleError};
