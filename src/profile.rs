// Calibration Profile: the durable record of every servo range, polarity
// sign and motor cabling.
//
// The live profile sits in a `CalibrationStore`; every change goes through
// `CalibrationStore::update`, which writes the backend before the new values
// become visible. Missing entries resolve to neutral placeholders.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::NEUTRAL_ANGLE;
use crate::error::VehicleError;

/// Error types for profile persistence
#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed calibration profile: {0}")]
    Json(#[from] serde_json::Error),
}

/// Polarity sign, exactly +1.0 or -1.0
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub enum Sign {
    #[default]
    Positive,
    Negative,
}

impl Sign {
    pub fn value(self) -> f64 {
        match self {
            Sign::Positive => 1.0,
            Sign::Negative => -1.0,
        }
    }

    pub fn flipped(self) -> Self {
        match self {
            Sign::Positive => Sign::Negative,
            Sign::Negative => Sign::Positive,
        }
    }
}

impl From<Sign> for f64 {
    fn from(sign: Sign) -> f64 {
        sign.value()
    }
}

impl TryFrom<f64> for Sign {
    type Error = String;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if value == 1.0 {
            Ok(Sign::Positive)
        } else if value == -1.0 {
            Ok(Sign::Negative)
        } else {
            Err(format!("polarity sign must be 1.0 or -1.0, got {}", value))
        }
    }
}

/// Which physical servo realizes a logical direction, and in which sense
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ActuatorPolarity {
    pub index: usize,
    pub sign: Sign,
}

impl ActuatorPolarity {
    pub fn new(index: usize, sign: Sign) -> Self {
        Self { index, sign }
    }

    /// The polarity of the opposite logical direction on the same servo
    pub fn opposite(self) -> Self {
        Self::new(self.index, self.sign.flipped())
    }
}

/// Angular range of one servo; `min <= center <= max` always holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ServoRangeRecord", into = "ServoRangeRecord")]
pub struct ServoRange {
    min: i32,
    max: i32,
    center: i32,
}

#[derive(Serialize, Deserialize)]
struct ServoRangeRecord {
    min: i32,
    max: i32,
    center: i32,
}

impl ServoRange {
    pub fn new(min: i32, center: i32, max: i32) -> Result<Self, VehicleError> {
        if min <= center && center <= max {
            Ok(Self { min, max, center })
        } else {
            Err(VehicleError::InvalidRange { min, center, max })
        }
    }

    /// First-boot value: all three angles at the neutral position
    pub fn placeholder() -> Self {
        Self {
            min: NEUTRAL_ANGLE,
            max: NEUTRAL_ANGLE,
            center: NEUTRAL_ANGLE,
        }
    }

    pub fn min(&self) -> i32 {
        self.min
    }

    pub fn max(&self) -> i32 {
        self.max
    }

    pub fn center(&self) -> i32 {
        self.center
    }
}

impl Default for ServoRange {
    fn default() -> Self {
        Self::placeholder()
    }
}

impl TryFrom<ServoRangeRecord> for ServoRange {
    type Error = VehicleError;

    fn try_from(record: ServoRangeRecord) -> Result<Self, Self::Error> {
        ServoRange::new(record.min, record.center, record.max)
    }
}

impl From<ServoRange> for ServoRangeRecord {
    fn from(range: ServoRange) -> Self {
        Self {
            min: range.min,
            max: range.max,
            center: range.center,
        }
    }
}

/// Which of a motor's two direction pins drives forward rotation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotorCabling {
    #[default]
    PinAForward,
    PinBForward,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MotorProfile {
    pub cabling: [MotorCabling; 2],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SteeringProfile {
    pub left: ActuatorPolarity,
    pub right: ActuatorPolarity,
}

impl Default for SteeringProfile {
    fn default() -> Self {
        let left = ActuatorPolarity::new(0, Sign::Positive);
        Self {
            left,
            right: left.opposite(),
        }
    }
}

/// Camera bindings; indices refer to the camera's servo list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraProfile {
    pub up: ActuatorPolarity,
    pub down: ActuatorPolarity,
    pub left: ActuatorPolarity,
    pub right: ActuatorPolarity,
}

impl Default for CameraProfile {
    fn default() -> Self {
        let up = ActuatorPolarity::new(0, Sign::Positive);
        let left = ActuatorPolarity::new(1, Sign::Positive);
        Self {
            up,
            down: up.opposite(),
            left,
            right: left.opposite(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationProfile {
    /// Servo ranges keyed by controller channel
    pub servos: BTreeMap<u8, ServoRange>,
    pub motor: MotorProfile,
    pub steering: SteeringProfile,
    pub camera: CameraProfile,
}

impl CalibrationProfile {
    pub fn servo_range(&self, channel: u8) -> ServoRange {
        self.servos.get(&channel).copied().unwrap_or_default()
    }

    pub fn set_servo_range(&mut self, channel: u8, range: ServoRange) {
        self.servos.insert(channel, range);
    }
}

/// Durable storage for the profile
pub trait ProfileBackend: Send {
    fn load(&self) -> Result<CalibrationProfile, ProfileError>;

    fn save(&self, profile: &CalibrationProfile) -> Result<(), ProfileError>;
}

/// Pretty-printed JSON file, created with placeholders on first boot
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> ProfileError {
        ProfileError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl ProfileBackend for JsonFileStore {
    fn load(&self) -> Result<CalibrationProfile, ProfileError> {
        if !self.path.exists() {
            info!(
                "No calibration profile at {}, creating placeholder profile",
                self.path.display()
            );
            let profile = CalibrationProfile::default();
            self.save(&profile)?;
            return Ok(profile);
        }

        let text = fs::read_to_string(&self.path).map_err(|e| self.io_error(e))?;
        let profile = serde_json::from_str(&text)?;
        debug!("Loaded calibration profile from {}", self.path.display());
        Ok(profile)
    }

    fn save(&self, profile: &CalibrationProfile) -> Result<(), ProfileError> {
        let json = serde_json::to_string_pretty(profile)?;

        // Write next to the target and rename so a crash never leaves half a file
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| self.io_error(e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))?;
        debug!("Saved calibration profile to {}", self.path.display());
        Ok(())
    }
}

/// In-memory backend; clones share the stored profile
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    saved: Arc<Mutex<Option<CalibrationProfile>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profile(profile: CalibrationProfile) -> Self {
        Self {
            saved: Arc::new(Mutex::new(Some(profile))),
        }
    }

    /// The last saved profile, if any
    pub fn saved(&self) -> Option<CalibrationProfile> {
        self.saved.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl ProfileBackend for MemoryStore {
    fn load(&self) -> Result<CalibrationProfile, ProfileError> {
        Ok(self.saved().unwrap_or_default())
    }

    fn save(&self, profile: &CalibrationProfile) -> Result<(), ProfileError> {
        *self.saved.lock().unwrap_or_else(|e| e.into_inner()) = Some(profile.clone());
        Ok(())
    }
}

/// The live profile plus the backend it is persisted to
pub struct CalibrationStore {
    backend: Box<dyn ProfileBackend>,
    profile: CalibrationProfile,
}

impl CalibrationStore {
    pub fn open(backend: Box<dyn ProfileBackend>) -> Result<Self, ProfileError> {
        let profile = backend.load()?;
        Ok(Self { backend, profile })
    }

    pub fn profile(&self) -> &CalibrationProfile {
        &self.profile
    }

    /// Apply a change and persist it; on a failed save the live profile is untouched
    pub fn update(
        &mut self,
        change: impl FnOnce(&mut CalibrationProfile),
    ) -> Result<(), ProfileError> {
        let mut candidate = self.profile.clone();
        change(&mut candidate);
        self.backend.save(&candidate)?;
        self.profile = candidate;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_profile_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "rc-vehicle-runtime-{}-{}",
            name,
            std::process::id()
        ));
        fs::create_dir_all(&dir).unwrap();
        dir.join("calibration.json")
    }

    #[test]
    fn test_missing_servo_uses_placeholder() {
        let profile = CalibrationProfile::default();
        let range = profile.servo_range(14);
        assert_eq!(range.min(), NEUTRAL_ANGLE);
        assert_eq!(range.center(), NEUTRAL_ANGLE);
        assert_eq!(range.max(), NEUTRAL_ANGLE);
    }

    #[test]
    fn test_servo_range_rejects_bad_ordering() {
        assert!(ServoRange::new(60, 90, 120).is_ok());
        assert!(ServoRange::new(60, 60, 60).is_ok());
        assert!(matches!(
            ServoRange::new(100, 90, 120),
            Err(VehicleError::InvalidRange { .. })
        ));
        assert!(ServoRange::new(60, 130, 120).is_err());
    }

    #[test]
    fn test_sign_accepts_only_unit_values() {
        assert_eq!(Sign::try_from(1.0_f64), Ok(Sign::Positive));
        assert_eq!(Sign::try_from(-1.0_f64), Ok(Sign::Negative));
        assert!(Sign::try_from(0.0_f64).is_err());
        assert!(Sign::try_from(-0.5_f64).is_err());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let json = r#"{ "servos": { "0": { "min": 40, "max": 140, "center": 95 } } }"#;
        let profile: CalibrationProfile = serde_json::from_str(json).unwrap();

        assert_eq!(profile.servo_range(0), ServoRange::new(40, 95, 140).unwrap());
        assert_eq!(profile.motor, MotorProfile::default());
        assert_eq!(profile.camera, CameraProfile::default());
    }

    #[test]
    fn test_invalid_json_values_are_rejected() {
        let bad_range = r#"{ "servos": { "0": { "min": 150, "max": 140, "center": 95 } } }"#;
        assert!(serde_json::from_str::<CalibrationProfile>(bad_range).is_err());

        let bad_sign = r#"{ "steering": { "left": { "index": 0, "sign": 0.5 } } }"#;
        assert!(serde_json::from_str::<CalibrationProfile>(bad_sign).is_err());
    }

    #[test]
    fn test_json_store_creates_and_reloads() {
        let path = temp_profile_path("reload");
        let _ = fs::remove_file(&path);

        let store = JsonFileStore::new(&path);
        let first = store.load().unwrap();
        assert_eq!(first, CalibrationProfile::default());
        assert!(path.exists(), "first boot should write the placeholder profile");

        let mut changed = first.clone();
        changed.motor.cabling[1] = MotorCabling::PinBForward;
        changed.set_servo_range(15, ServoRange::new(10, 80, 170).unwrap());
        store.save(&changed).unwrap();

        assert_eq!(JsonFileStore::new(&path).load().unwrap(), changed);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_store_update_persists() {
        let backend = MemoryStore::new();
        let mut store = CalibrationStore::open(Box::new(backend.clone())).unwrap();
        assert!(backend.saved().is_none());

        store
            .update(|p| p.steering.left = ActuatorPolarity::new(0, Sign::Negative))
            .unwrap();

        assert_eq!(store.profile().steering.left.sign, Sign::Negative);
        assert_eq!(backend.saved().unwrap().steering.left.sign, Sign::Negative);
    }
}
