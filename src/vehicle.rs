// Vehicle Controller: the single place where a Motion Command turns into
// actuator calls.
//
// Every caller (operator session, UDP listener) goes through one
// `SharedVehicle` mutex; the controller itself is plain synchronous code.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::calibration::CalibrationTargets;
use crate::components::{
    Calibrate, CalibratedCamera, CalibratedMotor, CalibratedSteering, MotorPins,
};
use crate::config::{
    CAMERA_SERVO_CHANNELS, MOTOR0_PIN_A, MOTOR0_PIN_B, MOTOR0_PWM_CHANNEL, MOTOR1_PIN_A,
    MOTOR1_PIN_B, MOTOR1_PWM_CHANNEL, STEERING_SERVO_CHANNEL,
};
use crate::error::{Result, VehicleError};
use crate::hardware::Board;
use crate::messages::{HorizontalDirection, MotionCommand, VerticalDirection};
use crate::profile::{CalibrationProfile, CalibrationStore};
use crate::session::SessionStream;

/// The controller behind the one mutual-exclusion boundary of the process
pub type SharedVehicle = Arc<tokio::sync::Mutex<VehicleController>>;

/// Actuator group an `apply` step drives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Motor,
    Steering,
    CameraVertical,
    CameraHorizontal,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Motor => f.write_str("motor"),
            Stage::Steering => f.write_str("steering"),
            Stage::CameraVertical => f.write_str("camera up/down"),
            Stage::CameraHorizontal => f.write_str("camera left/right"),
        }
    }
}

/// A failed `apply`: the stage that failed and why
///
/// Stages before `stage` have already been applied and are not rolled back.
#[derive(Debug, thiserror::Error)]
#[error("{stage} failed: {source}")]
pub struct ApplyError {
    pub stage: Stage,
    #[source]
    pub source: VehicleError,
}

/// Pin and channel assignment of the whole vehicle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VehicleLayout {
    pub motors: [MotorPins; 2],
    pub steering_channel: u8,
    pub camera_channels: [u8; 2],
}

impl Default for VehicleLayout {
    fn default() -> Self {
        Self {
            motors: [
                MotorPins {
                    pin_a: MOTOR0_PIN_A,
                    pin_b: MOTOR0_PIN_B,
                    pwm_channel: MOTOR0_PWM_CHANNEL,
                },
                MotorPins {
                    pin_a: MOTOR1_PIN_A,
                    pin_b: MOTOR1_PIN_B,
                    pwm_channel: MOTOR1_PWM_CHANNEL,
                },
            ],
            steering_channel: STEERING_SERVO_CHANNEL,
            camera_channels: CAMERA_SERVO_CHANNELS,
        }
    }
}

pub struct VehicleController {
    motor: CalibratedMotor,
    steering: CalibratedSteering,
    camera: CalibratedCamera,
    store: CalibrationStore,
}

impl VehicleController {
    pub fn new(board: &mut dyn Board, store: CalibrationStore) -> Result<Self> {
        Self::with_layout(board, store, VehicleLayout::default())
    }

    pub fn with_layout(
        board: &mut dyn Board,
        store: CalibrationStore,
        layout: VehicleLayout,
    ) -> Result<Self> {
        let profile = store.profile();
        let motor = CalibratedMotor::new(board, layout.motors, profile.motor.cabling)?;
        let steering = CalibratedSteering::new(board, layout.steering_channel, profile)?;
        let camera = CalibratedCamera::new(board, &layout.camera_channels, profile)?;

        Ok(Self {
            motor,
            steering,
            camera,
            store,
        })
    }

    pub fn into_shared(self) -> SharedVehicle {
        Arc::new(tokio::sync::Mutex::new(self))
    }

    pub fn profile(&self) -> &CalibrationProfile {
        self.store.profile()
    }

    pub fn motor(&mut self) -> &mut CalibratedMotor {
        &mut self.motor
    }

    pub fn steering(&mut self) -> &mut CalibratedSteering {
        &mut self.steering
    }

    pub fn camera(&mut self) -> &mut CalibratedCamera {
        &mut self.camera
    }

    /// Apply one Motion Command: speed, steering, camera tilt, camera pan
    ///
    /// Stops at the first failing stage; earlier stages stay applied.
    pub fn apply(&mut self, command: &MotionCommand) -> std::result::Result<(), ApplyError> {
        debug!("Applying {}", command);

        at(Stage::Motor, self.motor.set_speed(command.speed))?;
        at(Stage::Steering, self.apply_steering(command))?;
        at(Stage::CameraVertical, self.apply_camera_vertical(command))?;
        at(Stage::CameraHorizontal, self.apply_camera_horizontal(command))
    }

    fn apply_steering(&mut self, command: &MotionCommand) -> Result<()> {
        let magnitude = command.steer.magnitude;
        match command.steer.direction {
            HorizontalDirection::None => self.steering.center(),
            HorizontalDirection::Left => self.steering.steer_left(magnitude),
            HorizontalDirection::Right => self.steering.steer_right(magnitude),
            HorizontalDirection::Unknown(code) => Err(VehicleError::UnknownDirection {
                axis: "steering",
                code,
            }),
        }
    }

    fn apply_camera_vertical(&mut self, command: &MotionCommand) -> Result<()> {
        let magnitude = command.camera_vertical.magnitude;
        match command.camera_vertical.direction {
            VerticalDirection::None => self.camera.center_up_down(),
            VerticalDirection::Up => self.camera.move_up(magnitude),
            VerticalDirection::Down => self.camera.move_down(magnitude),
            VerticalDirection::Unknown(code) => Err(VehicleError::UnknownDirection {
                axis: "camera up/down",
                code,
            }),
        }
    }

    fn apply_camera_horizontal(&mut self, command: &MotionCommand) -> Result<()> {
        let magnitude = command.camera_horizontal.magnitude;
        match command.camera_horizontal.direction {
            HorizontalDirection::None => self.camera.center_left_right(),
            HorizontalDirection::Left => self.camera.move_left(magnitude),
            HorizontalDirection::Right => self.camera.move_right(magnitude),
            HorizontalDirection::Unknown(code) => Err(VehicleError::UnknownDirection {
                axis: "camera left/right",
                code,
            }),
        }
    }

    pub fn stop(&mut self) -> Result<()> {
        self.motor.stop()
    }
}

fn at(stage: Stage, result: Result<()>) -> std::result::Result<(), ApplyError> {
    result.map_err(|source| ApplyError { stage, source })
}

impl CalibrationTargets for VehicleController {
    fn calibrate_motor(&mut self, session: &mut dyn SessionStream) -> Result<()> {
        self.motor.calibrate(session, &mut self.store)
    }

    fn calibrate_steering(&mut self, session: &mut dyn SessionStream) -> Result<()> {
        self.steering.calibrate(session, &mut self.store)
    }

    fn calibrate_camera(&mut self, session: &mut dyn SessionStream) -> Result<()> {
        self.camera.calibrate(session, &mut self.store)
    }
}
