// Simulated board: every write is logged and recorded, nothing moves
//
// Used when no physical driver is available and as the test double for the
// calibrated components. Clones share the same event log.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use super::{Board, HardwareError, OutputPin, PinLevel, PwmOutput, Result, ServoMotor};

/// One recorded actuator write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorEvent {
    Angle { channel: u8, angle: i32 },
    Pin { gpio: u8, level: PinLevel },
    Pwm { channel: u8, on: u16, off: u16 },
}

#[derive(Debug, Default)]
struct SimState {
    events: Vec<ActuatorEvent>,
    failing_servos: HashSet<u8>,
    failing_pins: HashSet<u8>,
    failing_pwm: HashSet<u8>,
}

#[derive(Debug, Clone, Default)]
pub struct SimBoard {
    state: Arc<Mutex<SimState>>,
}

impl SimBoard {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        // A panicking test thread must not hide the log from the others
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// All writes recorded so far, oldest first
    pub fn events(&self) -> Vec<ActuatorEvent> {
        self.state().events.clone()
    }

    pub fn clear_events(&self) {
        self.state().events.clear();
    }

    /// Make every later write to this servo channel fail
    pub fn fail_servo(&self, channel: u8) {
        self.state().failing_servos.insert(channel);
    }

    pub fn fail_pin(&self, gpio: u8) {
        self.state().failing_pins.insert(gpio);
    }

    pub fn fail_pwm(&self, channel: u8) {
        self.state().failing_pwm.insert(channel);
    }
}

impl Board for SimBoard {
    fn servo(&mut self, channel: u8) -> Result<Box<dyn ServoMotor>> {
        debug!("Generated simulated servo on channel {}", channel);
        Ok(Box::new(SimServo {
            channel,
            board: self.clone(),
        }))
    }

    fn output_pin(&mut self, gpio: u8) -> Result<Box<dyn OutputPin>> {
        debug!("Generated simulated output pin GPIO {}", gpio);
        Ok(Box::new(SimPin {
            gpio,
            board: self.clone(),
        }))
    }

    fn pwm(&mut self) -> Result<Box<dyn PwmOutput>> {
        Ok(Box::new(SimPwm {
            board: self.clone(),
        }))
    }
}

struct SimServo {
    channel: u8,
    board: SimBoard,
}

impl ServoMotor for SimServo {
    fn set_angle(&mut self, angle: i32) -> Result<()> {
        let mut state = self.board.state();
        if state.failing_servos.contains(&self.channel) {
            return Err(HardwareError::ServoWrite {
                channel: self.channel,
                angle,
            });
        }
        debug!("Servo channel {} -> angle {}", self.channel, angle);
        state.events.push(ActuatorEvent::Angle {
            channel: self.channel,
            angle,
        });
        Ok(())
    }
}

struct SimPin {
    gpio: u8,
    board: SimBoard,
}

impl OutputPin for SimPin {
    fn write(&mut self, level: PinLevel) -> Result<()> {
        let mut state = self.board.state();
        if state.failing_pins.contains(&self.gpio) {
            return Err(HardwareError::PinWrite { gpio: self.gpio });
        }
        debug!("GPIO {} -> {}", self.gpio, level);
        state.events.push(ActuatorEvent::Pin {
            gpio: self.gpio,
            level,
        });
        Ok(())
    }
}

struct SimPwm {
    board: SimBoard,
}

impl PwmOutput for SimPwm {
    fn set_pwm(&mut self, channel: u8, on_time: u16, off_time: u16) -> Result<()> {
        let mut state = self.board.state();
        if state.failing_pwm.contains(&channel) {
            return Err(HardwareError::PwmWrite { channel });
        }
        debug!("PWM channel {}: on={}, off={}", channel, on_time, off_time);
        state.events.push(ActuatorEvent::Pwm {
            channel,
            on: on_time,
            off: off_time,
        });
        Ok(())
    }
}
