//! Typed robot commands behind the HTTP routes.
//!
//! Each function takes already-parsed, already-clamped inputs, holds the
//! hardware lock only for its own touch, and leaves a human-readable outcome
//! in the status text. Bus faults never escape: they are logged and reported
//! through [`Hardware::report_fault`].

use std::time::Duration;

use rand::Rng;
use raspbot_kernel::Hardware;
use raspbot_runtime::{EffectRequest, RobotContext, SequenceStart};
use raspbot_types::{
    BotError, Direction, LedPreset, NUM_LEDS, PAN_MAX, PAN_MIN, SERVO_CENTER, ServoId, TILT_MAX,
    TILT_MIN,
};
use tracing::{info, warn};

/// Forward pulse length.
pub const MOTOR_PULSE: Duration = Duration::from_millis(500);
/// Beep length.
pub const BUZZER_PULSE: Duration = Duration::from_millis(200);
/// Delay between enabling a sensor and reading it.
pub const SENSOR_SETTLE: Duration = Duration::from_millis(50);
/// Below this on both axes the joystick counts as centred.
pub const JOYSTICK_DEADZONE: f64 = 0.1;

/// Set the status on success, report the fault otherwise.
fn finish(hw: &mut Hardware, action: &str, result: Result<(), BotError>, status: String) -> bool {
    match result {
        Ok(()) => {
            hw.set_status(status);
            true
        }
        Err(e) => {
            hw.report_fault(action, &e);
            false
        }
    }
}

// ── Motors ──────────────────────────────────────────────────────────────────

pub async fn set_speed(ctx: &RobotContext, speed: u8) {
    let mut hw = ctx.hardware.lock().await;
    hw.state_mut().set_speed(speed);
    hw.set_status(format!("speed set to {speed}"));
}

pub async fn drive(ctx: &RobotContext, direction: Direction) {
    let mut hw = ctx.hardware.lock().await;
    let speed = i16::from(hw.state().speed());
    let result = match direction {
        Direction::Forward => hw.drive_all(speed),
        Direction::Backward => hw.drive_all(-speed),
        Direction::Left => hw.spin_left(speed),
        Direction::Right => hw.spin_right(speed),
        Direction::Stop => hw.stop_all_motors(),
    };
    let status = match direction {
        Direction::Forward => format!("forward, speed {speed}"),
        Direction::Backward => format!("backward, speed {speed}"),
        Direction::Left => format!("spin left, speed {speed}"),
        Direction::Right => format!("spin right, speed {speed}"),
        Direction::Stop => "stopped".to_string(),
    };
    finish(&mut hw, &format!("move {direction}"), result, status);
}

pub async fn stop(ctx: &RobotContext) {
    let mut hw = ctx.hardware.lock().await;
    let result = hw.stop_all_motors();
    finish(&mut hw, "stop", result, "stopped".to_string());
}

/// Drive forward for `length`, releasing the lock while the motors run.
pub async fn pulse_forward(ctx: &RobotContext, length: Duration) {
    {
        let mut hw = ctx.hardware.lock().await;
        let speed = i16::from(hw.state().speed());
        let result = hw.drive_all(speed);
        let status = format!("pulse forward {:.1} s, speed {speed}", length.as_secs_f64());
        finish(&mut hw, "pulse", result, status);
    }
    tokio::time::sleep(length).await;
    let mut hw = ctx.hardware.lock().await;
    let result = hw.stop_all_motors();
    finish(&mut hw, "pulse stop", result, "pulse finished".to_string());
}

/// Differential mix of a joystick position: `left = (y - x)·speed`,
/// `right = (y + x)·speed`, each clamped to ±255.
///
/// `x` and `y` are the raw knob offsets the control page sends. Returns
/// `None` inside the deadzone.
pub fn mix_joystick(x: f64, y: f64, speed: u8) -> Option<(i16, i16)> {
    if x.abs() < JOYSTICK_DEADZONE && y.abs() < JOYSTICK_DEADZONE {
        return None;
    }
    let s = f64::from(speed);
    let track = |v: f64| (v * s).clamp(-255.0, 255.0) as i16;
    Some((track(y - x), track(y + x)))
}

pub async fn joystick(ctx: &RobotContext, x: f64, y: f64) -> bool {
    let mut hw = ctx.hardware.lock().await;
    match mix_joystick(x, y, hw.state().speed()) {
        None => {
            let result = hw.stop_all_motors();
            finish(&mut hw, "joystick", result, "stopped (joystick centred)".to_string())
        }
        Some((left, right)) => {
            let result = hw.drive_tracks(left, right);
            finish(&mut hw, "joystick", result, format!("joystick: L={left}, R={right}"))
        }
    }
}

// ── Servos ──────────────────────────────────────────────────────────────────

/// Command both servos. The returned angles are the clamped values now held
/// in the state, whether or not the bus accepted them.
pub async fn point_camera(ctx: &RobotContext, pan: i64, tilt: i64) -> (bool, u8, u8) {
    let mut hw = ctx.hardware.lock().await;
    let pan_result = hw.set_servo(ServoId::Pan, pan);
    let tilt_result = hw.set_servo(ServoId::Tilt, tilt);
    let (pan, tilt) = (hw.state().pan(), hw.state().tilt());
    let result = pan_result.and(tilt_result).map(|_| ());
    let ok = finish(&mut hw, "servo", result, format!("servo pan={pan} tilt={tilt}"));
    (ok, pan, tilt)
}

pub async fn center_camera(ctx: &RobotContext) {
    let mut hw = ctx.hardware.lock().await;
    let pan_result = hw.set_servo(ServoId::Pan, i64::from(SERVO_CENTER));
    let tilt_result = hw.set_servo(ServoId::Tilt, i64::from(SERVO_CENTER));
    let result = pan_result.and(tilt_result).map(|_| ());
    finish(&mut hw, "servo center", result, "servos centred".to_string());
}

pub async fn random_camera_pose(ctx: &RobotContext) -> (u8, u8) {
    let (pan, tilt) = {
        let mut rng = rand::thread_rng();
        (rng.gen_range(PAN_MIN..=PAN_MAX), rng.gen_range(TILT_MIN..=TILT_MAX))
    };
    let mut hw = ctx.hardware.lock().await;
    let pan_result = hw.set_servo(ServoId::Pan, i64::from(pan));
    let tilt_result = hw.set_servo(ServoId::Tilt, i64::from(tilt));
    let result = pan_result.and(tilt_result).map(|_| ());
    finish(&mut hw, "servo random", result, format!("random servo pan={pan} tilt={tilt}"));
    (pan, tilt)
}

// ── LEDs and buzzer ─────────────────────────────────────────────────────────

pub async fn led_preset(ctx: &RobotContext, preset: LedPreset) {
    let (r, g, b) = preset.rgb();
    let mut hw = ctx.hardware.lock().await;
    let result = hw.gateway().set_all_pixels_rgb(r, g, b);
    hw.state_mut().set_last_led_preset(Some(preset));
    let status = format!("LED preset {} (RGB {r},{g},{b})", preset.index());
    finish(&mut hw, "led preset", result, status);
}

pub async fn led_off(ctx: &RobotContext) {
    let mut hw = ctx.hardware.lock().await;
    let result = hw.leds_off();
    hw.state_mut().set_last_led_preset(None);
    finish(&mut hw, "led off", result, "LEDs off".to_string());
}

pub async fn led_rgb_all(ctx: &RobotContext, r: u8, g: u8, b: u8) {
    let mut hw = ctx.hardware.lock().await;
    let result = hw.gateway().set_all_pixels_rgb(r, g, b);
    hw.state_mut().set_last_led_preset(None);
    finish(&mut hw, "led rgb", result, format!("LED RGB all ({r},{g},{b})"));
}

pub async fn led_rgb_one(ctx: &RobotContext, index: u8, r: u8, g: u8, b: u8) {
    let index = index.min(NUM_LEDS);
    let mut hw = ctx.hardware.lock().await;
    let result = hw.gateway().set_pixel_rgb(index, r, g, b);
    hw.state_mut().set_last_led_preset(None);
    finish(&mut hw, "led pixel", result, format!("LED {index} RGB ({r},{g},{b})"));
}

pub async fn buzzer(ctx: &RobotContext, on: bool) {
    let mut hw = ctx.hardware.lock().await;
    let result = hw.gateway().set_buzzer(on);
    let status = if on { "buzzer on" } else { "buzzer off" };
    finish(&mut hw, "buzzer", result, status.to_string());
}

/// Beep for `length`, releasing the lock in between.
pub async fn buzzer_pulse(ctx: &RobotContext, length: Duration) {
    {
        let mut hw = ctx.hardware.lock().await;
        let result = hw.gateway().set_buzzer(true);
        let status = format!("buzzer {:.1} s", length.as_secs_f64());
        finish(&mut hw, "buzzer pulse", result, status);
    }
    tokio::time::sleep(length).await;
    let mut hw = ctx.hardware.lock().await;
    let result = hw.gateway().set_buzzer(false);
    finish(&mut hw, "buzzer pulse off", result, "buzzer finished".to_string());
}

// ── Sensors ─────────────────────────────────────────────────────────────────

pub async fn ultrasonic_switch(ctx: &RobotContext, on: bool) {
    let mut hw = ctx.hardware.lock().await;
    let result = hw.gateway().set_ultrasonic_enabled(on);
    if result.is_ok() {
        hw.state_mut().set_ultrasonic_enabled(on);
    }
    let status = if on { "ultrasonic on" } else { "ultrasonic off" };
    finish(&mut hw, "ultrasonic switch", result, status.to_string());
}

/// Enable the sensor if needed, then read one distance.
pub async fn ultrasonic_read(ctx: &RobotContext) -> Option<u16> {
    let mut hw = ctx.hardware.lock().await;
    if !hw.state().ultrasonic_enabled() {
        if let Err(e) = hw.gateway().set_ultrasonic_enabled(true) {
            hw.report_fault("ultrasonic enable", &e);
            return None;
        }
        hw.state_mut().set_ultrasonic_enabled(true);
        tokio::time::sleep(SENSOR_SETTLE).await;
    }
    match hw.read_ultrasonic_mm() {
        Ok(mm) => {
            hw.state_mut().set_last_distance_mm(Some(mm));
            hw.set_status(format!("ultrasonic distance {mm} mm"));
            Some(mm)
        }
        Err(e) => {
            hw.report_fault("ultrasonic read", &e);
            None
        }
    }
}

/// Polling view: refresh the distance when the sensor is on. A failed read
/// keeps the previous value and leaves the status alone.
pub async fn ultrasonic_poll(ctx: &RobotContext) -> (bool, Option<u16>) {
    let mut hw = ctx.hardware.lock().await;
    let enabled = hw.state().ultrasonic_enabled();
    if enabled {
        match hw.read_ultrasonic_mm() {
            Ok(mm) => hw.state_mut().set_last_distance_mm(Some(mm)),
            Err(e) => warn!(error = %e, "ultrasonic poll failed"),
        }
    }
    (enabled, hw.state().last_distance_mm())
}

pub async fn infrared_switch(ctx: &RobotContext, on: bool) {
    let mut hw = ctx.hardware.lock().await;
    let result = hw.gateway().set_infrared_enabled(on);
    if result.is_ok() {
        hw.state_mut().set_infrared_enabled(on);
    }
    let status = if on { "IR on" } else { "IR off" };
    finish(&mut hw, "IR switch", result, status.to_string());
}

/// Enable the receiver if needed, then read the last key code.
pub async fn infrared_read(ctx: &RobotContext) -> Option<u8> {
    let mut hw = ctx.hardware.lock().await;
    if !hw.state().infrared_enabled() {
        if let Err(e) = hw.gateway().set_infrared_enabled(true) {
            hw.report_fault("IR enable", &e);
            return None;
        }
        hw.state_mut().set_infrared_enabled(true);
        tokio::time::sleep(SENSOR_SETTLE).await;
    }
    match hw.read_infrared_code() {
        Ok(code) => {
            hw.state_mut().set_last_infrared_code(code);
            let shown = code.map_or_else(|| "none".to_string(), |c| c.to_string());
            hw.set_status(format!("IR code {shown}"));
            code
        }
        Err(e) => {
            hw.report_fault("IR read", &e);
            None
        }
    }
}

// ── Background work ─────────────────────────────────────────────────────────

pub async fn start_light_effect(ctx: &RobotContext, request: EffectRequest) {
    ctx.supervisor.start_light_effect(request);
    ctx.hardware
        .set_status(format!(
            "light effect {} started ({} s)",
            request.effect,
            request.duration.as_secs_f64()
        ))
        .await;
}

pub async fn stop_light_effect(ctx: &RobotContext) {
    ctx.supervisor.stop_light_effect();
    let mut hw = ctx.hardware.lock().await;
    let result = hw.leds_off();
    finish(&mut hw, "light stop", result, "light effect stopped".to_string());
}

/// Take a still tagged `snap`. Returns the saved file name.
pub async fn snap(ctx: &RobotContext) -> Option<String> {
    match ctx.camera.capture_still("snap").await {
        Ok(path) => {
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default()
                .to_string();
            ctx.hardware.set_status(format!("saved {name}")).await;
            Some(name)
        }
        Err(e) => {
            warn!(error = %e, "snapshot failed");
            ctx.hardware.set_status("no picture").await;
            None
        }
    }
}

pub async fn run_sequence(ctx: &RobotContext) -> SequenceStart {
    let outcome = ctx.supervisor.start_sequence().await;
    info!(?outcome, "sequence requested");
    outcome
}

/// Emergency stop. Every step runs regardless of earlier failures.
pub async fn emergency_stop(ctx: &RobotContext) {
    ctx.supervisor.stop_light_effect();
    let mut hw = ctx.hardware.lock().await;
    let steps = [
        ("stop motors", hw.stop_all_motors()),
        ("buzzer off", hw.gateway().set_buzzer(false)),
        ("LEDs off", hw.leds_off()),
        ("ultrasonic off", hw.gateway().set_ultrasonic_enabled(false)),
        ("IR off", hw.gateway().set_infrared_enabled(false)),
    ];
    let state = hw.state_mut();
    state.set_ultrasonic_enabled(false);
    state.set_infrared_enabled(false);
    state.set_last_led_preset(None);

    let failed: Vec<&str> = steps
        .iter()
        .filter_map(|(step, result)| {
            result.as_ref().err().map(|e| {
                warn!(step, error = %e, "emergency stop step failed");
                *step
            })
        })
        .collect();
    if failed.is_empty() {
        hw.set_status("emergency stop: motors, buzzer, LEDs and sensors off");
    } else {
        hw.set_status(format!("emergency stop incomplete: {} failed", failed.join(", ")));
    }
}
