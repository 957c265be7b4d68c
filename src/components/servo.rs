// Calibrated servo: maps a signed percentage onto a recorded angle range

use tracing::info;

use super::Calibrate;
use crate::error::{ActuatorId, Result, VehicleError, actuator};
use crate::hardware::{Board, ServoMotor};
use crate::profile::{CalibrationStore, ServoRange};
use crate::session::{SessionStream, ask};

const BIG_STEP: i32 = 10;
const SMALL_STEP: i32 = 1;

pub struct CalibratedServo {
    channel: u8,
    servo: Box<dyn ServoMotor>,
    range: ServoRange,
}

impl CalibratedServo {
    pub fn new(board: &mut dyn Board, channel: u8, range: ServoRange) -> Result<Self> {
        let servo = actuator(ActuatorId::Servo { channel }, board.servo(channel))?;
        Ok(Self {
            channel,
            servo,
            range,
        })
    }

    pub fn channel(&self) -> u8 {
        self.channel
    }

    pub fn range(&self) -> ServoRange {
        self.range
    }

    /// Absolute angle for a percentage in [-100, 100]
    ///
    /// 0 is `center`, 100 is `max`, -100 is `min`; each half is linear.
    pub fn angle_for(&self, percent: f64) -> Result<i32> {
        if !(-100.0..=100.0).contains(&percent) {
            return Err(VehicleError::OutOfRange {
                what: "servo percent",
                value: percent,
            });
        }

        let min = self.range.min() as f64;
        let max = self.range.max() as f64;
        let center = self.range.center() as f64;

        let angle = if percent >= 0.0 {
            center + (max - center) * percent / 100.0
        } else {
            center + (center - min) * percent / 100.0
        };
        Ok(angle as i32)
    }

    fn set_angle(&mut self, angle: i32) -> Result<()> {
        actuator(
            ActuatorId::Servo {
                channel: self.channel,
            },
            self.servo.set_angle(angle),
        )
    }

    pub fn home(&mut self) -> Result<()> {
        self.set_angle(self.range.center())
    }

    pub fn forward(&mut self, percent: f64) -> Result<()> {
        let angle = self.angle_for(percent)?;
        self.set_angle(angle)
    }

    pub fn backward(&mut self, percent: f64) -> Result<()> {
        self.forward(-percent)
    }

    /// Move by `percent` in the sense given by `direction` (any negative value
    /// means backward, anything else forward)
    pub fn move_percent(&mut self, percent: f64, direction: f64) -> Result<()> {
        let sign = if direction < 0.0 { -1.0 } else { 1.0 };
        self.forward(percent * sign)
    }

    /// One round of the range search: step the angle until the operator commits
    fn determine_angle(
        &mut self,
        session: &mut dyn SessionStream,
        mut angle: i32,
        label: &str,
    ) -> Result<i32> {
        loop {
            session.write(&format!("Current {} Value: {}\r\n", label, angle))?;
            self.set_angle(angle)?;

            let answer = ask(
                session,
                &format!(
                    "{} Calibration. Press [I] for a increment (10), [i] for a small increment (1), [D] for a big decrement (10), [d] for a small decrement (1) and [X] to end calibration...\r\n",
                    label
                ),
            )?;

            match step_for(&answer) {
                Some(step) => angle = angle.saturating_add(step),
                None => {
                    session.write(&format!("Setting {} for {} value\r\n", angle, label))?;
                    return Ok(angle);
                }
            }
        }
    }
}

fn step_for(answer: &str) -> Option<i32> {
    match answer.chars().next()? {
        'I' => Some(BIG_STEP),
        'i' => Some(SMALL_STEP),
        'D' => Some(-BIG_STEP),
        'd' => Some(-SMALL_STEP),
        _ => None,
    }
}

impl Calibrate for CalibratedServo {
    fn calibrate(
        &mut self,
        session: &mut dyn SessionStream,
        store: &mut CalibrationStore,
    ) -> Result<()> {
        session.write(&format!(
            "Starting calibration for servo: {}\r\n",
            self.channel
        ))?;

        let min = self.determine_angle(session, self.range.min(), "Min")?;
        let max = self.determine_angle(session, self.range.max(), "Max")?;
        let center = self.determine_angle(session, self.range.center(), "Center")?;

        let range = ServoRange::new(min, center, max)?;
        let channel = self.channel;
        store.update(|profile| profile.set_servo_range(channel, range))?;
        self.range = range;
        info!(
            "Servo channel {} calibrated: min={}, center={}, max={}",
            channel, min, center, max
        );

        self.home()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::{ActuatorEvent, SimBoard};
    use crate::profile::MemoryStore;
    use crate::session::scripted::ScriptedSession;

    fn servo(min: i32, center: i32, max: i32) -> (CalibratedServo, SimBoard) {
        let mut board = SimBoard::new();
        let range = ServoRange::new(min, center, max).unwrap();
        let servo = CalibratedServo::new(&mut board, 7, range).unwrap();
        (servo, board)
    }

    fn angles(board: &SimBoard) -> Vec<i32> {
        board
            .events()
            .into_iter()
            .filter_map(|e| match e {
                ActuatorEvent::Angle { angle, .. } => Some(angle),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_angle_endpoints() {
        let (servo, _) = servo(40, 90, 150);
        assert_eq!(servo.angle_for(0.0).unwrap(), 90);
        assert_eq!(servo.angle_for(100.0).unwrap(), 150);
        assert_eq!(servo.angle_for(-100.0).unwrap(), 40);
        assert_eq!(servo.angle_for(50.0).unwrap(), 120);
        assert_eq!(servo.angle_for(-50.0).unwrap(), 65);
    }

    #[test]
    fn test_angle_is_monotonic() {
        let (servo, _) = servo(13, 77, 171);
        let mut previous = servo.angle_for(-100.0).unwrap();
        for step in -999..=1000 {
            let percent = step as f64 / 10.0;
            let angle = servo.angle_for(percent).unwrap();
            assert!(
                angle >= previous,
                "angle_for({}) = {} dropped below {}",
                percent,
                angle,
                previous
            );
            previous = angle;
        }
    }

    #[test]
    fn test_out_of_range_percent() {
        let (mut servo, board) = servo(40, 90, 150);
        assert!(matches!(
            servo.angle_for(100.5),
            Err(VehicleError::OutOfRange { .. })
        ));
        assert!(servo.forward(-101.0).is_err());
        assert!(servo.angle_for(f64::NAN).is_err());
        assert!(board.events().is_empty());
    }

    #[test]
    fn test_move_normalizes_direction() {
        let (mut servo, board) = servo(40, 90, 150);
        servo.move_percent(50.0, -0.25).unwrap();
        servo.move_percent(50.0, 3.0).unwrap();
        servo.move_percent(50.0, 0.0).unwrap();
        servo.backward(100.0).unwrap();
        servo.home().unwrap();
        assert_eq!(angles(&board), vec![65, 120, 120, 40, 90]);
    }

    #[test]
    fn test_fault_names_channel() {
        let (mut servo, board) = servo(40, 90, 150);
        board.fail_servo(7);
        match servo.home() {
            Err(VehicleError::ActuatorFault { actuator, .. }) => {
                assert_eq!(actuator, ActuatorId::Servo { channel: 7 })
            }
            other => panic!("expected actuator fault, got {:?}", other),
        }
    }

    #[test]
    fn test_calibration_steps_and_persists() {
        let (mut servo, board) = servo(90, 90, 90);
        let backend = MemoryStore::new();
        let mut store = CalibrationStore::open(Box::new(backend.clone())).unwrap();

        // min: 90 -> 80 -> 79, max: 90 -> 100 -> 101, center: 90 -> 91
        let mut session =
            ScriptedSession::new(&["D", "d", "X", "I", "i", "", "i", "anything"]);
        servo.calibrate(&mut session, &mut store).unwrap();

        let expected = ServoRange::new(79, 91, 101).unwrap();
        assert_eq!(servo.range(), expected);
        assert_eq!(store.profile().servo_range(7), expected);
        assert_eq!(backend.saved().unwrap().servo_range(7), expected);
        assert_eq!(
            angles(&board),
            vec![90, 80, 79, 90, 100, 101, 90, 91, 91]
        );
        assert!(session.output().contains("Setting 79 for Min value"));
        assert_eq!(session.remaining(), 0);
    }

    #[test]
    fn test_calibration_rejects_inverted_range() {
        let (mut servo, _) = servo(90, 90, 90);
        let backend = MemoryStore::new();
        let mut store = CalibrationStore::open(Box::new(backend.clone())).unwrap();

        // min raised above max
        let mut session = ScriptedSession::new(&["I", "X", "X", "X"]);
        let result = servo.calibrate(&mut session, &mut store);

        assert!(matches!(result, Err(VehicleError::InvalidRange { .. })));
        assert_eq!(servo.range(), ServoRange::placeholder());
        assert!(backend.saved().is_none());
    }

    #[test]
    fn test_calibration_aborts_when_session_closes() {
        let (mut servo, _) = servo(60, 90, 120);
        let mut store = CalibrationStore::open(Box::new(MemoryStore::new())).unwrap();
        let mut session = ScriptedSession::new(&["d"]);

        let result = servo.calibrate(&mut session, &mut store);
        assert!(matches!(result, Err(VehicleError::Session(_))));
        assert_eq!(servo.range(), ServoRange::new(60, 90, 120).unwrap());
    }
}
