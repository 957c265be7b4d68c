// Calibration Orchestrator
//
// Menu-driven selection of which components to calibrate. Runs on the
// operator session and keeps asking until the operator picks nothing.

use tracing::info;

use crate::error::Result;
use crate::session::{SessionStream, ask};

pub const CALIBRATION_MENU: &str = "Please choose which part you want to calibrate:\r\n\
[0] Everything\r\n\
[1] Motor\r\n\
[2] Steering\r\n\
[3] Camera\r\n\
Anything else will bring you back to the previous selection\r\n";

/// The components a calibration round can run against
pub trait CalibrationTargets {
    fn calibrate_motor(&mut self, session: &mut dyn SessionStream) -> Result<()>;
    fn calibrate_steering(&mut self, session: &mut dyn SessionStream) -> Result<()>;
    fn calibrate_camera(&mut self, session: &mut dyn SessionStream) -> Result<()>;
}

/// Components picked by one menu answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CalibrationSelection {
    pub motor: bool,
    pub steering: bool,
    pub camera: bool,
}

impl CalibrationSelection {
    pub const ALL: Self = Self {
        motor: true,
        steering: true,
        camera: true,
    };

    pub const NONE: Self = Self {
        motor: false,
        steering: false,
        camera: false,
    };

    /// Only the first character counts; leading whitespace is skipped
    pub fn parse(answer: &str) -> Self {
        match answer.trim_start().chars().next() {
            Some('0') => Self::ALL,
            Some('1') => Self {
                motor: true,
                ..Self::NONE
            },
            Some('2') => Self {
                steering: true,
                ..Self::NONE
            },
            Some('3') => Self {
                camera: true,
                ..Self::NONE
            },
            _ => Self::NONE,
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::NONE
    }
}

/// Ask, calibrate the selection, repeat; an unrecognized answer returns
///
/// Components run in the order motor, steering, camera. The first error
/// aborts the whole round and is returned.
pub fn run(targets: &mut dyn CalibrationTargets, session: &mut dyn SessionStream) -> Result<()> {
    loop {
        let answer = ask(session, CALIBRATION_MENU)?;
        let selection = CalibrationSelection::parse(&answer);
        if selection.is_empty() {
            info!("Leaving calibration");
            return Ok(());
        }
        info!("Calibrating {:?}", selection);

        if selection.motor {
            targets.calibrate_motor(session)?;
        }
        if selection.steering {
            targets.calibrate_steering(session)?;
        }
        if selection.camera {
            targets.calibrate_camera(session)?;
        }
    }
}
