// Calibrated actuators of the vehicle
//
// Provides:
// - Calibrated servo (angle range + percent mapping)
// - Calibrated drive motor pair (cabling + PWM duty)
// - Steering and camera polarity wrappers around calibrated servos

mod camera;
mod motor;
mod servo;
mod steering;

pub use camera::{CalibratedCamera, CameraDirection};
pub use motor::{CalibratedMotor, MotorPins};
pub use servo::CalibratedServo;
pub use steering::CalibratedSteering;

use crate::error::Result;
use crate::profile::CalibrationStore;
use crate::session::{SessionStream, ask};

/// A component whose mapping from logical to physical output is recorded by
/// asking the operator
pub trait Calibrate {
    /// Run the interactive procedure and persist the result
    ///
    /// On error the component keeps its previous calibration.
    fn calibrate(&mut self, session: &mut dyn SessionStream, store: &mut CalibrationStore)
    -> Result<()>;
}

/// Shows the operator which way the servo's positive direction points
///
/// Homes the servo, then drives it to `max` and asks. Answers `parse` does not
/// recognize repeat the whole demonstration.
fn discover_direction<T>(
    servo: &mut CalibratedServo,
    session: &mut dyn SessionStream,
    name: &str,
    question: &str,
    parse: impl Fn(char) -> Option<T>,
) -> Result<T> {
    loop {
        session.write(&format!(
            "{} will move to home position. Press any key to continue...\r\n",
            name
        ))?;
        servo.home()?;
        session.read_line()?;

        session.write(&format!(
            "{} will move in positive direction. Please pay attention to the direction! Press any key to continue...\r\n",
            name
        ))?;
        session.read_line()?;
        servo.forward(100.0)?;

        let answer = ask(session, question)?;
        if let Some(found) = answer
            .trim()
            .chars()
            .next()
            .and_then(|c| parse(c.to_ascii_uppercase()))
        {
            return Ok(found);
        }
    }
}
