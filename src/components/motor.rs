// Calibrated drive motors
//
// Two H-bridge motors share one logical speed. Each has two direction pins
// (A, B) and a PWM channel for the duty:
//
// | speed | forward pin | other pin | duty                |
// |-------|-------------|-----------|---------------------|
// | > 0   | high        | low       | round(40.96 * |v|)  |
// | < 0   | low         | high      | round(40.96 * |v|)  |
// | 0     | low         | low       | 0 (coast)           |
//
// Which pin is the "forward" pin is the motor's recorded cabling.

use tracing::{debug, info};

use super::Calibrate;
use crate::config::{MOTOR_CALIBRATION_DUTY, PWM_COUNTS_PER_PERCENT};
use crate::error::{ActuatorId, Result, VehicleError, actuator};
use crate::hardware::{Board, OutputPin, PinLevel, PwmOutput};
use crate::profile::{CalibrationStore, MotorCabling};
use crate::session::{SessionStream, ask};

const WHEEL_NAMES: [&str; 2] = ["first", "second"];

/// GPIO and PWM assignment of one motor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotorPins {
    pub pin_a: u8,
    pub pin_b: u8,
    pub pwm_channel: u8,
}

struct DriveMotor {
    index: usize,
    pins: MotorPins,
    pin_a: Box<dyn OutputPin>,
    pin_b: Box<dyn OutputPin>,
    cabling: MotorCabling,
}

impl DriveMotor {
    fn new(
        board: &mut dyn Board,
        index: usize,
        pins: MotorPins,
        cabling: MotorCabling,
    ) -> Result<Self> {
        let pin_a = actuator(
            ActuatorId::MotorPin {
                motor: index,
                gpio: pins.pin_a,
            },
            board.output_pin(pins.pin_a),
        )?;
        let pin_b = actuator(
            ActuatorId::MotorPin {
                motor: index,
                gpio: pins.pin_b,
            },
            board.output_pin(pins.pin_b),
        )?;

        Ok(Self {
            index,
            pins,
            pin_a,
            pin_b,
            cabling,
        })
    }

    fn write_a(&mut self, level: PinLevel) -> Result<()> {
        let id = ActuatorId::MotorPin {
            motor: self.index,
            gpio: self.pins.pin_a,
        };
        actuator(id, self.pin_a.write(level))
    }

    fn write_b(&mut self, level: PinLevel) -> Result<()> {
        let id = ActuatorId::MotorPin {
            motor: self.index,
            gpio: self.pins.pin_b,
        };
        actuator(id, self.pin_b.write(level))
    }

    /// Drive the direction pins for a validated speed
    fn apply_direction(&mut self, speed: f64) -> Result<()> {
        let (a, b) = pin_levels(self.cabling, speed);
        self.write_a(a)?;
        self.write_b(b)
    }
}

/// (pin A, pin B) levels for a speed under a cabling
fn pin_levels(cabling: MotorCabling, speed: f64) -> (PinLevel, PinLevel) {
    use PinLevel::{High, Low};

    let forward = match cabling {
        MotorCabling::PinAForward => (High, Low),
        MotorCabling::PinBForward => (Low, High),
    };

    if speed > 0.0 {
        forward
    } else if speed < 0.0 {
        (forward.1, forward.0)
    } else {
        (Low, Low)
    }
}

pub struct CalibratedMotor {
    motors: [DriveMotor; 2],
    pwm: Box<dyn PwmOutput>,
}

impl CalibratedMotor {
    pub fn new(
        board: &mut dyn Board,
        pins: [MotorPins; 2],
        cabling: [MotorCabling; 2],
    ) -> Result<Self> {
        let pwm = actuator(
            ActuatorId::MotorPwm {
                motor: 0,
                channel: pins[0].pwm_channel,
            },
            board.pwm(),
        )?;
        let m0 = DriveMotor::new(board, 0, pins[0], cabling[0])?;
        let m1 = DriveMotor::new(board, 1, pins[1], cabling[1])?;

        Ok(Self {
            motors: [m0, m1],
            pwm,
        })
    }

    pub fn cabling(&self) -> [MotorCabling; 2] {
        [self.motors[0].cabling, self.motors[1].cabling]
    }

    /// PWM duty (0-4096) for a speed percentage
    pub fn duty_for(percent: f64) -> u16 {
        (PWM_COUNTS_PER_PERCENT * percent.abs()).round() as u16
    }

    fn set_duty(&mut self, duty: u16) -> Result<()> {
        for motor in &self.motors {
            let id = ActuatorId::MotorPwm {
                motor: motor.index,
                channel: motor.pins.pwm_channel,
            };
            actuator(id, self.pwm.set_pwm(motor.pins.pwm_channel, 0, duty))?;
        }
        Ok(())
    }

    /// Set the shared speed in percent, [-100, 100]; the sign selects direction
    pub fn set_speed(&mut self, percent: f64) -> Result<()> {
        if !(-100.0..=100.0).contains(&percent) {
            return Err(VehicleError::OutOfRange {
                what: "speed",
                value: percent,
            });
        }

        let duty = Self::duty_for(percent);
        debug!("Setting motor speed {}% (duty {})", percent, duty);
        self.set_duty(duty)?;

        for motor in &mut self.motors {
            motor.apply_direction(percent)?;
        }
        Ok(())
    }

    pub fn stop(&mut self) -> Result<()> {
        self.set_speed(0.0)
    }
}

impl Calibrate for CalibratedMotor {
    fn calibrate(
        &mut self,
        session: &mut dyn SessionStream,
        store: &mut CalibrationStore,
    ) -> Result<()> {
        let mut cabling = self.cabling();
        self.set_duty(MOTOR_CALIBRATION_DUTY)?;

        for (i, name) in WHEEL_NAMES.iter().enumerate() {
            session.write(&format!(
                "The {} wheel will move in one direction. Please pay attention!\r\n",
                name
            ))?;

            let motor = &mut self.motors[i];
            motor.write_a(PinLevel::High)?;
            let answer = ask(
                session,
                "In which direction is the wheel moving?\r\n[0] Forward\r\n[1] Backward\r\n",
            );
            // Release the pin before looking at the answer so a dropped session
            // never leaves the wheel spinning
            motor.write_a(PinLevel::Low)?;

            match answer?.trim().chars().next() {
                Some('0') => cabling[i] = MotorCabling::PinAForward,
                Some('1') => cabling[i] = MotorCabling::PinBForward,
                _ => session.write(&format!(
                    "Skipping configuration for {} wheel...\r\n",
                    name
                ))?,
            }
        }

        store.update(|profile| profile.motor.cabling = cabling)?;
        for (motor, recorded) in self.motors.iter_mut().zip(cabling) {
            motor.cabling = recorded;
        }
        info!("Motor cabling calibrated: {:?}", cabling);

        self.stop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::{ActuatorEvent, SimBoard};
    use crate::profile::MemoryStore;
    use crate::session::scripted::ScriptedSession;

    const PINS: [MotorPins; 2] = [
        MotorPins {
            pin_a: 17,
            pin_b: 18,
            pwm_channel: 5,
        },
        MotorPins {
            pin_a: 27,
            pin_b: 22,
            pwm_channel: 4,
        },
    ];

    fn motor(cabling: [MotorCabling; 2]) -> (CalibratedMotor, SimBoard) {
        let mut board = SimBoard::new();
        let motor = CalibratedMotor::new(&mut board, PINS, cabling).unwrap();
        (motor, board)
    }

    fn pin(gpio: u8, level: PinLevel) -> ActuatorEvent {
        ActuatorEvent::Pin { gpio, level }
    }

    fn pwm(channel: u8, off: u16) -> ActuatorEvent {
        ActuatorEvent::Pwm { channel, on: 0, off }
    }

    #[test]
    fn test_duty_scaling() {
        assert_eq!(CalibratedMotor::duty_for(50.0), 2048);
        assert_eq!(CalibratedMotor::duty_for(-50.0), 2048);
        assert_eq!(CalibratedMotor::duty_for(100.0), 4096);
        assert_eq!(CalibratedMotor::duty_for(0.0), 0);
        assert_eq!(CalibratedMotor::duty_for(1.0), 41);
    }

    #[test]
    fn test_forward_on_pin_a() {
        use PinLevel::{High, Low};
        let (mut motor, board) = motor([MotorCabling::PinAForward; 2]);

        motor.set_speed(50.0).unwrap();
        assert_eq!(
            board.events(),
            vec![
                pwm(5, 2048),
                pwm(4, 2048),
                pin(17, High),
                pin(18, Low),
                pin(27, High),
                pin(22, Low),
            ]
        );

        board.clear_events();
        motor.set_speed(-50.0).unwrap();
        assert_eq!(
            board.events(),
            vec![
                pwm(5, 2048),
                pwm(4, 2048),
                pin(17, Low),
                pin(18, High),
                pin(27, Low),
                pin(22, High),
            ]
        );
    }

    #[test]
    fn test_each_motor_uses_its_own_cabling() {
        use PinLevel::{High, Low};
        let (mut motor, board) = motor([MotorCabling::PinAForward, MotorCabling::PinBForward]);

        motor.set_speed(10.0).unwrap();
        let events = board.events();
        assert_eq!(
            &events[2..],
            &[pin(17, High), pin(18, Low), pin(27, Low), pin(22, High)]
        );
    }

    #[test]
    fn test_stop_coasts() {
        use PinLevel::Low;
        let (mut motor, board) = motor([MotorCabling::PinBForward; 2]);
        motor.stop().unwrap();
        assert_eq!(
            board.events(),
            vec![
                pwm(5, 0),
                pwm(4, 0),
                pin(17, Low),
                pin(18, Low),
                pin(27, Low),
                pin(22, Low),
            ]
        );
    }

    #[test]
    fn test_invalid_speed_writes_nothing() {
        let (mut motor, board) = motor([MotorCabling::PinAForward; 2]);
        assert!(matches!(
            motor.set_speed(150.0),
            Err(VehicleError::OutOfRange { what: "speed", .. })
        ));
        assert!(motor.set_speed(-100.01).is_err());
        assert!(motor.set_speed(f64::NAN).is_err());
        assert!(board.events().is_empty());
    }

    #[test]
    fn test_pin_fault_names_motor() {
        let (mut motor, board) = motor([MotorCabling::PinAForward; 2]);
        board.fail_pin(22);
        match motor.set_speed(20.0) {
            Err(VehicleError::ActuatorFault { actuator, .. }) => {
                assert_eq!(actuator, ActuatorId::MotorPin { motor: 1, gpio: 22 })
            }
            other => panic!("expected actuator fault, got {:?}", other),
        }
    }

    #[test]
    fn test_calibration_records_cabling() {
        use PinLevel::{High, Low};
        let (mut motor, board) = motor([MotorCabling::PinAForward; 2]);
        let backend = MemoryStore::new();
        let mut store = CalibrationStore::open(Box::new(backend.clone())).unwrap();

        let mut session = ScriptedSession::new(&["1", "0"]);
        motor.calibrate(&mut session, &mut store).unwrap();

        let expected = [MotorCabling::PinBForward, MotorCabling::PinAForward];
        assert_eq!(motor.cabling(), expected);
        assert_eq!(backend.saved().unwrap().motor.cabling, expected);

        let events = board.events();
        assert_eq!(
            &events[..6],
            &[
                pwm(5, MOTOR_CALIBRATION_DUTY),
                pwm(4, MOTOR_CALIBRATION_DUTY),
                pin(17, High),
                pin(17, Low),
                pin(27, High),
                pin(27, Low),
            ]
        );
        // Ends stopped
        assert_eq!(events[6..8], [pwm(5, 0), pwm(4, 0)]);

        // Driving afterwards follows the recorded cabling of each wheel
        board.clear_events();
        motor.set_speed(50.0).unwrap();
        assert_eq!(
            board.events(),
            vec![
                pwm(5, 2048),
                pwm(4, 2048),
                pin(17, Low),
                pin(18, High),
                pin(27, High),
                pin(22, Low),
            ]
        );

        board.clear_events();
        motor.set_speed(-50.0).unwrap();
        assert_eq!(
            board.events(),
            vec![
                pwm(5, 2048),
                pwm(4, 2048),
                pin(17, High),
                pin(18, Low),
                pin(27, Low),
                pin(22, High),
            ]
        );
    }

    #[test]
    fn test_unrecognized_answer_keeps_cabling() {
        let (mut motor, _) = motor([MotorCabling::PinBForward, MotorCabling::PinAForward]);
        let mut store = CalibrationStore::open(Box::new(MemoryStore::new())).unwrap();

        let mut session = ScriptedSession::new(&["?", "1"]);
        motor.calibrate(&mut session, &mut store).unwrap();

        assert_eq!(
            motor.cabling(),
            [MotorCabling::PinBForward, MotorCabling::PinBForward]
        );
        assert!(session.output().contains("Skipping configuration for first wheel"));
    }

    #[test]
    fn test_closed_session_releases_pin() {
        use PinLevel::{High, Low};
        let (mut motor, board) = motor([MotorCabling::PinAForward; 2]);
        let mut store = CalibrationStore::open(Box::new(MemoryStore::new())).unwrap();

        let mut session = ScriptedSession::new(&[]);
        assert!(motor.calibrate(&mut session, &mut store).is_err());

        let events = board.events();
        assert_eq!(&events[2..], &[pin(17, High), pin(17, Low)]);
        assert_eq!(motor.cabling(), [MotorCabling::PinAForward; 2]);
    }
}
