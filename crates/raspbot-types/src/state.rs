//! The single mutable record shared by every command and background task.

use serde::Serialize;

use crate::{DEFAULT_SPEED, LedPreset, PAN_MAX, PAN_MIN, SERVO_CENTER, TILT_MAX, TILT_MIN};

/// Robot control state.
///
/// Fields are private so the pan/tilt ranges hold no matter who writes them;
/// setters clamp and return the value actually stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControlState {
    speed: u8,
    pan: u8,
    tilt: u8,
    ultrasonic_enabled: bool,
    infrared_enabled: bool,
    last_distance_mm: Option<u16>,
    last_infrared_code: Option<u8>,
    last_led_preset: Option<LedPreset>,
    status: String,
}

impl Default for ControlState {
    fn default() -> Self {
        Self {
            speed: DEFAULT_SPEED,
            pan: SERVO_CENTER,
            tilt: SERVO_CENTER,
            ultrasonic_enabled: false,
            infrared_enabled: false,
            last_distance_mm: None,
            last_infrared_code: None,
            last_led_preset: None,
            status: "ready".to_string(),
        }
    }
}

impl ControlState {
    pub fn speed(&self) -> u8 {
        self.speed
    }

    pub fn set_speed(&mut self, speed: u8) {
        self.speed = speed;
    }

    pub fn pan(&self) -> u8 {
        self.pan
    }

    pub fn tilt(&self) -> u8 {
        self.tilt
    }

    /// Store `angle` clamped to the pan range.
    pub fn set_pan(&mut self, angle: i64) -> u8 {
        self.pan = angle.clamp(PAN_MIN as i64, PAN_MAX as i64) as u8;
        self.pan
    }

    /// Store `angle` clamped to the tilt range.
    pub fn set_tilt(&mut self, angle: i64) -> u8 {
        self.tilt = angle.clamp(TILT_MIN as i64, TILT_MAX as i64) as u8;
        self.tilt
    }

    pub fn ultrasonic_enabled(&self) -> bool {
        self.ultrasonic_enabled
    }

    pub fn set_ultrasonic_enabled(&mut self, on: bool) {
        self.ultrasonic_enabled = on;
    }

    pub fn infrared_enabled(&self) -> bool {
        self.infrared_enabled
    }

    pub fn set_infrared_enabled(&mut self, on: bool) {
        self.infrared_enabled = on;
    }

    pub fn last_distance_mm(&self) -> Option<u16> {
        self.last_distance_mm
    }

    pub fn set_last_distance_mm(&mut self, mm: Option<u16>) {
        self.last_distance_mm = mm;
    }

    pub fn last_infrared_code(&self) -> Option<u8> {
        self.last_infrared_code
    }

    pub fn set_last_infrared_code(&mut self, code: Option<u8>) {
        self.last_infrared_code = code;
    }

    pub fn last_led_preset(&self) -> Option<LedPreset> {
        self.last_led_preset
    }

    pub fn set_last_led_preset(&mut self, preset: Option<LedPreset>) {
        self.last_led_preset = preset;
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn set_status(&mut self, msg: impl Into<String>) {
        self.status = msg.into();
    }
}
