// Define message types for the vehicle
//
// A Motion Command is one fully specified intent: speed, steering and camera
// pose. Direction codes keep unknown values so they survive decoding and are
// rejected only when the command is applied.

use std::fmt;

/// Left/right direction (steering and camera pan); wire codes 0, 1, 2
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HorizontalDirection {
    /// Return to center
    #[default]
    None,
    Left,
    Right,
    Unknown(i8),
}

impl HorizontalDirection {
    pub fn code(self) -> i8 {
        match self {
            HorizontalDirection::None => 0,
            HorizontalDirection::Left => 1,
            HorizontalDirection::Right => 2,
            HorizontalDirection::Unknown(code) => code,
        }
    }
}

impl From<i8> for HorizontalDirection {
    fn from(code: i8) -> Self {
        match code {
            0 => HorizontalDirection::None,
            1 => HorizontalDirection::Left,
            2 => HorizontalDirection::Right,
            other => HorizontalDirection::Unknown(other),
        }
    }
}

/// Up/down direction (camera tilt); wire codes 0, 1, 2
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VerticalDirection {
    /// Return to center
    #[default]
    None,
    Up,
    Down,
    Unknown(i8),
}

impl VerticalDirection {
    pub fn code(self) -> i8 {
        match self {
            VerticalDirection::None => 0,
            VerticalDirection::Up => 1,
            VerticalDirection::Down => 2,
            VerticalDirection::Unknown(code) => code,
        }
    }
}

impl From<i8> for VerticalDirection {
    fn from(code: i8) -> Self {
        match code {
            0 => VerticalDirection::None,
            1 => VerticalDirection::Up,
            2 => VerticalDirection::Down,
            other => VerticalDirection::Unknown(other),
        }
    }
}

/// A direction with its intensity in percent; the magnitude is ignored for `None`
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Movement<D> {
    pub direction: D,
    pub magnitude: f64,
}

impl<D> Movement<D> {
    pub fn new(direction: D, magnitude: f64) -> Self {
        Self {
            direction,
            magnitude,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MotionCommand {
    /// Signed percent, [-100, 100]
    pub speed: f64,
    pub steer: Movement<HorizontalDirection>,
    pub camera_vertical: Movement<VerticalDirection>,
    pub camera_horizontal: Movement<HorizontalDirection>,
}

impl fmt::Display for MotionCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "speed={} steer={:?}({}) cam_v={:?}({}) cam_h={:?}({})",
            self.speed,
            self.steer.direction,
            self.steer.magnitude,
            self.camera_vertical.direction,
            self.camera_vertical.magnitude,
            self.camera_horizontal.direction,
            self.camera_horizontal.magnitude
        )
    }
}
