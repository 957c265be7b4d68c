// Calibrated steering: one servo plus the sign that makes "left" mean left

use tracing::info;

use super::{Calibrate, CalibratedServo, discover_direction};
use crate::error::Result;
use crate::hardware::Board;
use crate::profile::{ActuatorPolarity, CalibrationProfile, CalibrationStore, Sign, SteeringProfile};
use crate::session::SessionStream;

pub struct CalibratedSteering {
    servo: CalibratedServo,
    polarity: SteeringProfile,
}

impl CalibratedSteering {
    pub fn new(board: &mut dyn Board, channel: u8, profile: &CalibrationProfile) -> Result<Self> {
        let servo = CalibratedServo::new(board, channel, profile.servo_range(channel))?;
        info!("Current steering config: {:?}", profile.steering);
        Ok(Self {
            servo,
            polarity: profile.steering,
        })
    }

    pub fn polarity(&self) -> SteeringProfile {
        self.polarity
    }

    pub fn steer_left(&mut self, percent: f64) -> Result<()> {
        self.servo.move_percent(percent, self.polarity.left.sign.value())
    }

    pub fn steer_right(&mut self, percent: f64) -> Result<()> {
        self.servo
            .move_percent(percent, self.polarity.right.sign.value())
    }

    pub fn center(&mut self) -> Result<()> {
        self.servo.home()
    }
}

impl Calibrate for CalibratedSteering {
    fn calibrate(
        &mut self,
        session: &mut dyn SessionStream,
        store: &mut CalibrationStore,
    ) -> Result<()> {
        self.servo.calibrate(session, store)?;

        // Sign that turns a positive servo move into a left turn
        let left_sign = discover_direction(
            &mut self.servo,
            session,
            "Steering",
            "Did the steering move [L]eft or [R]ight (press anything else to repeat)?\r\n",
            |answer| match answer {
                'L' => Some(Sign::Positive),
                'R' => Some(Sign::Negative),
                _ => None,
            },
        )?;

        let left = ActuatorPolarity::new(0, left_sign);
        let polarity = SteeringProfile {
            left,
            right: left.opposite(),
        };
        store.update(|profile| profile.steering = polarity)?;
        self.polarity = polarity;
        info!("Steering calibrated: {:?}", polarity);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::{ActuatorEvent, SimBoard};
    use crate::profile::{MemoryStore, ServoRange};
    use crate::session::scripted::ScriptedSession;

    fn steering(left: Sign) -> (CalibratedSteering, SimBoard) {
        let mut board = SimBoard::new();
        let mut profile = CalibrationProfile::default();
        profile.set_servo_range(0, ServoRange::new(50, 90, 130).unwrap());
        let left = ActuatorPolarity::new(0, left);
        profile.steering = SteeringProfile {
            left,
            right: left.opposite(),
        };
        let steering = CalibratedSteering::new(&mut board, 0, &profile).unwrap();
        (steering, board)
    }

    fn last_angle(board: &SimBoard) -> Option<i32> {
        board.events().into_iter().rev().find_map(|e| match e {
            ActuatorEvent::Angle { angle, .. } => Some(angle),
            _ => None,
        })
    }

    #[test]
    fn test_polarity_decides_servo_side() {
        let (mut normal, board) = steering(Sign::Positive);
        normal.steer_left(100.0).unwrap();
        assert_eq!(last_angle(&board), Some(130));
        normal.steer_right(50.0).unwrap();
        assert_eq!(last_angle(&board), Some(70));
        normal.center().unwrap();
        assert_eq!(last_angle(&board), Some(90));

        let (mut flipped, board) = steering(Sign::Negative);
        flipped.steer_left(100.0).unwrap();
        assert_eq!(last_angle(&board), Some(50));
        flipped.steer_right(100.0).unwrap();
        assert_eq!(last_angle(&board), Some(130));
    }

    #[test]
    fn test_calibration_binds_right_turn() {
        let (mut steering, board) = steering(Sign::Positive);
        let backend = MemoryStore::new();
        let mut store = CalibrationStore::open(Box::new(backend.clone())).unwrap();

        // Keep the range, then: ack home, ack forward, unclear answer, repeat, "R"
        let mut session = ScriptedSession::new(&["X", "X", "X", "", "", "up?", "", "", "r"]);
        steering.calibrate(&mut session, &mut store).unwrap();

        assert_eq!(steering.polarity().left.sign, Sign::Negative);
        assert_eq!(steering.polarity().right.sign, Sign::Positive);
        assert_eq!(backend.saved().unwrap().steering, steering.polarity());
        assert_eq!(
            session
                .output()
                .matches("Steering will move to home position")
                .count(),
            2
        );
        // Demonstration ends at max
        assert_eq!(last_angle(&board), Some(130));
    }
}
