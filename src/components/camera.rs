// Calibrated camera: pan and tilt servos with per-direction bindings
//
// Which servo tilts and which pans is discovered during calibration, so any of
// the four directions may end up on either servo.

use tracing::{info, warn};

use super::{Calibrate, CalibratedServo, discover_direction};
use crate::error::{Result, VehicleError};
use crate::hardware::Board;
use crate::profile::{
    ActuatorPolarity, CalibrationProfile, CalibrationStore, CameraProfile, Sign,
};
use crate::session::SessionStream;

/// Physical direction reported by the operator during calibration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraDirection {
    Up,
    Down,
    Left,
    Right,
}

impl CameraDirection {
    fn from_answer(answer: char) -> Option<Self> {
        match answer {
            'U' => Some(CameraDirection::Up),
            'D' => Some(CameraDirection::Down),
            'L' => Some(CameraDirection::Left),
            'R' => Some(CameraDirection::Right),
            _ => None,
        }
    }

    /// Rebind the axis this direction belongs to onto servo `index`
    fn bind(self, bindings: &mut CameraProfile, index: usize) {
        let positive = ActuatorPolarity::new(index, Sign::Positive);
        let negative = positive.opposite();
        match self {
            CameraDirection::Up => (bindings.up, bindings.down) = (positive, negative),
            CameraDirection::Down => (bindings.up, bindings.down) = (negative, positive),
            CameraDirection::Left => (bindings.left, bindings.right) = (positive, negative),
            CameraDirection::Right => (bindings.left, bindings.right) = (negative, positive),
        }
    }
}

pub struct CalibratedCamera {
    servos: Vec<CalibratedServo>,
    bindings: CameraProfile,
}

impl CalibratedCamera {
    pub fn new(
        board: &mut dyn Board,
        channels: &[u8],
        profile: &CalibrationProfile,
    ) -> Result<Self> {
        if channels.is_empty() {
            return Err(VehicleError::MissingActuator {
                what: "camera servo channel",
            });
        }

        let servos = channels
            .iter()
            .map(|&channel| CalibratedServo::new(board, channel, profile.servo_range(channel)))
            .collect::<Result<Vec<_>>>()?;

        let bindings = checked_bindings(profile.camera, servos.len());
        info!("Current camera config: {:?}", bindings);
        Ok(Self { servos, bindings })
    }

    pub fn bindings(&self) -> CameraProfile {
        self.bindings
    }

    fn drive(&mut self, polarity: ActuatorPolarity, percent: f64) -> Result<()> {
        self.servos[polarity.index].move_percent(percent, polarity.sign.value())
    }

    pub fn move_up(&mut self, percent: f64) -> Result<()> {
        self.drive(self.bindings.up, percent)
    }

    pub fn move_down(&mut self, percent: f64) -> Result<()> {
        self.drive(self.bindings.down, percent)
    }

    pub fn move_left(&mut self, percent: f64) -> Result<()> {
        self.drive(self.bindings.left, percent)
    }

    pub fn move_right(&mut self, percent: f64) -> Result<()> {
        self.drive(self.bindings.right, percent)
    }

    pub fn center_up_down(&mut self) -> Result<()> {
        self.servos[self.bindings.up.index].home()
    }

    pub fn center_left_right(&mut self) -> Result<()> {
        self.servos[self.bindings.left.index].home()
    }
}

/// Replace bindings that point past the servo list with the defaults
fn checked_bindings(bindings: CameraProfile, servo_count: usize) -> CameraProfile {
    let defaults = CameraProfile::default();
    let check = |name: &str, binding: ActuatorPolarity, fallback: ActuatorPolarity| {
        if binding.index < servo_count {
            binding
        } else {
            warn!(
                "Camera {} bound to missing servo index {}, using default",
                name, binding.index
            );
            ActuatorPolarity::new(fallback.index.min(servo_count.saturating_sub(1)), fallback.sign)
        }
    };

    CameraProfile {
        up: check("up", bindings.up, defaults.up),
        down: check("down", bindings.down, defaults.down),
        left: check("left", bindings.left, defaults.left),
        right: check("right", bindings.right, defaults.right),
    }
}

impl Calibrate for CalibratedCamera {
    fn calibrate(
        &mut self,
        session: &mut dyn SessionStream,
        store: &mut CalibrationStore,
    ) -> Result<()> {
        let mut bindings = self.bindings;

        for (index, servo) in self.servos.iter_mut().enumerate() {
            servo.calibrate(session, store)?;

            let direction = discover_direction(
                servo,
                session,
                "Camera",
                "Did the camera move [U]p, [D]own, [L]eft or [R]ight (press anything else to repeat)?\r\n",
                CameraDirection::from_answer,
            )?;
            info!(
                "Camera servo channel {} moves {:?} when driven forward",
                servo.channel(),
                direction
            );
            direction.bind(&mut bindings, index);
        }

        store.update(|profile| profile.camera = bindings)?;
        self.bindings = bindings;
        info!("Camera calibrated: {:?}", bindings);
        Ok(())
    }
}
