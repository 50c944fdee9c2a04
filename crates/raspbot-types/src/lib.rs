//! `raspbot-types` – shared data model for the Raspbot control server.
//!
//! Everything here is plain data: the command vocabulary accepted by the
//! control surface, the [`ControlState`] guarded by the hardware mutex domain,
//! the lenient input parsers in [`input`], and the [`BotError`] taxonomy.

pub mod input;
pub mod state;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use state::ControlState;

/// Drive speed applied when no valid speed has been supplied.
pub const DEFAULT_SPEED: u8 = 120;
/// Pan servo limits in degrees (inclusive).
pub const PAN_MIN: u8 = 20;
pub const PAN_MAX: u8 = 160;
/// Tilt servo limits in degrees (inclusive).
pub const TILT_MIN: u8 = 50;
pub const TILT_MAX: u8 = 110;
/// Resting angle for both servos.
pub const SERVO_CENTER: u8 = 90;
/// Highest addressable pixel index on the LED strip.
pub const NUM_LEDS: u8 = 14;

/// Drive command accepted by `/api/motor/move`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Forward,
    Backward,
    Left,
    Right,
    Stop,
}

impl Direction {
    /// Missing input means `Forward`; anything unrecognised means `Stop`.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            None => Direction::Forward,
            Some("forward") => Direction::Forward,
            Some("backward") => Direction::Backward,
            Some("left") => Direction::Left,
            Some("right") => Direction::Right,
            Some(_) => Direction::Stop,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Direction::Forward => "forward",
            Direction::Backward => "backward",
            Direction::Left => "left",
            Direction::Right => "right",
            Direction::Stop => "stop",
        };
        f.write_str(s)
    }
}

/// Camera servo addressed by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServoId {
    Pan,
    Tilt,
}

impl ServoId {
    /// Bus-level servo number.
    pub fn bus_id(self) -> u8 {
        match self {
            ServoId::Pan => 1,
            ServoId::Tilt => 2,
        }
    }

    /// Inclusive angle range for this servo.
    pub fn limits(self) -> (u8, u8) {
        match self {
            ServoId::Pan => (PAN_MIN, PAN_MAX),
            ServoId::Tilt => (TILT_MIN, TILT_MAX),
        }
    }
}

/// The seven solid-colour LED presets, indexed 0–6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedPreset {
    Red,
    Green,
    Blue,
    Yellow,
    Purple,
    Cyan,
    White,
}

impl LedPreset {
    pub const ALL: [LedPreset; 7] = [
        LedPreset::Red,
        LedPreset::Green,
        LedPreset::Blue,
        LedPreset::Yellow,
        LedPreset::Purple,
        LedPreset::Cyan,
        LedPreset::White,
    ];

    /// Preset for `index`, or `None` outside 0–6.
    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }

    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn rgb(self) -> (u8, u8, u8) {
        match self {
            LedPreset::Red => (255, 0, 0),
            LedPreset::Green => (0, 255, 0),
            LedPreset::Blue => (0, 0, 255),
            LedPreset::Yellow => (255, 255, 0),
            LedPreset::Purple => (255, 0, 255),
            LedPreset::Cyan => (0, 255, 255),
            LedPreset::White => (255, 255, 255),
        }
    }
}

/// Named light-show patterns understood by the effect renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LightEffect {
    River,
    Breathing,
    Gradient,
    RandomRunning,
    Starlight,
}

impl LightEffect {
    pub const ALL: [LightEffect; 5] = [
        LightEffect::River,
        LightEffect::Breathing,
        LightEffect::Gradient,
        LightEffect::RandomRunning,
        LightEffect::Starlight,
    ];

    /// Unknown or missing names fall back to `Breathing`.
    pub fn parse(raw: Option<&str>) -> Self {
        raw.map(str::trim)
            .and_then(|name| Self::ALL.into_iter().find(|e| e.name() == name))
            .unwrap_or(LightEffect::Breathing)
    }

    pub fn name(self) -> &'static str {
        match self {
            LightEffect::River => "river",
            LightEffect::Breathing => "breathing",
            LightEffect::Gradient => "gradient",
            LightEffect::RandomRunning => "random_running",
            LightEffect::Starlight => "starlight",
        }
    }
}

impl std::fmt::Display for LightEffect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Error taxonomy for the control server.
///
/// Invalid command input is deliberately absent: the control surface clamps
/// or defaults instead of rejecting.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BotError {
    #[error("Bus error during {operation}: {details}")]
    Bus { operation: String, details: String },

    #[error("Camera unavailable: {0}")]
    CameraUnavailable(String),

    #[error("JPEG encode failed: {0}")]
    Encode(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl BotError {
    /// Shorthand for a gateway failure on `operation`.
    pub fn bus(operation: impl Into<String>, details: impl std::fmt::Display) -> Self {
        BotError::Bus {
            operation: operation.into(),
            details: details.to_string(),
        }
    }
}

impl From<std::io::Error> for BotError {
    fn from(e: std::io::Error) -> Self {
        BotError::Io(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_defaults() {
        assert_eq!(Direction::parse(None), Direction::Forward);
        assert_eq!(Direction::parse(Some("left")), Direction::Left);
        assert_eq!(Direction::parse(Some(" backward ")), Direction::Backward);
        assert_eq!(Direction::parse(Some("sideways")), Direction::Stop);
    }

    #[test]
    fn led_preset_index_and_rgb() {
        let blue = LedPreset::from_index(2).unwrap();
        assert_eq!(blue, LedPreset::Blue);
        assert_eq!(blue.index(), 2);
        assert_eq!(blue.rgb(), (0, 0, 255));
        assert!(LedPreset::from_index(7).is_none());
    }

    #[test]
    fn light_effect_falls_back_to_breathing() {
        assert_eq!(LightEffect::parse(Some("river")), LightEffect::River);
        assert_eq!(
            LightEffect::parse(Some("random_running")),
            LightEffect::RandomRunning
        );
        assert_eq!(LightEffect::parse(Some("disco")), LightEffect::Breathing);
        assert_eq!(LightEffect::parse(None), LightEffect::Breathing);
    }

    #[test]
    fn servo_limits() {
        assert_eq!(ServoId::Pan.limits(), (20, 160));
        assert_eq!(ServoId::Tilt.limits(), (50, 110));
        assert_eq!(ServoId::Pan.bus_id(), 1);
        assert_eq!(ServoId::Tilt.bus_id(), 2);
    }

    #[test]
    fn bot_error_display() {
        let err = BotError::bus("set_motor", "nack");
        assert!(err.to_string().contains("set_motor"));
        assert!(err.to_string().contains("nack"));

        let err = BotError::CameraUnavailable("open failed".into());
        assert!(err.to_string().contains("Camera unavailable"));
    }

    #[test]
    fn light_effect_serializes_snake_case() {
        let json = serde_json::to_string(&LightEffect::RandomRunning).unwrap();
        assert_eq!(json, "\"random_running\"");
    }
}
