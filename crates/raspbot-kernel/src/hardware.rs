//! [`HardwareDomain`] – the one lock in front of the bus, the state and the camera.
//!
//! Everything that touches the expansion board, mutates [`ControlState`] or
//! uses the [`CaptureHandle`] does so through a [`Hardware`] guard obtained
//! from [`HardwareDomain::lock`]. The lock is a fair tokio mutex, so waiters
//! are served in arrival order and a waiting HTTP handler never blocks a
//! runtime thread.
//!
//! Hold the guard for exactly one hardware touch. Timed waits (pulses,
//! sequence phases) drop the guard and re-lock afterwards.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use raspbot_hal::{CaptureHandle, CaptureSettings, SimCamera, SimGateway};
//! use raspbot_kernel::HardwareDomain;
//!
//! # tokio_test_block_on(async {
//! let gw = SimGateway::new();
//! let camera = CaptureHandle::new(Arc::new(SimCamera::new(8, 8)), CaptureSettings::default());
//! let hw = HardwareDomain::new(Box::new(gw.clone()), camera);
//!
//! let mut guard = hw.lock().await;
//! guard.drive_all(120).unwrap();
//! drop(guard);
//!
//! assert_eq!(gw.motor_speeds(), [120; 4]);
//! # });
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(f)
//! # }
//! ```

use std::sync::Arc;

use raspbot_hal::gateway::{
    LEFT_MOTORS, MOTOR_CHANNELS, REG_INFRARED, REG_ULTRASONIC_HIGH, REG_ULTRASONIC_LOW,
    RIGHT_MOTORS,
};
use raspbot_hal::{CaptureHandle, DeviceGateway};
use raspbot_types::{BotError, ControlState, ServoId};
use tokio::sync::{Mutex, MutexGuard};
use tracing::warn;

// ────────────────────────────────────────────────────────────────────────────
// Domain
// ────────────────────────────────────────────────────────────────────────────

/// Shared handle to the hardware mutex domain. Clones share the same lock.
#[derive(Clone)]
pub struct HardwareDomain {
    inner: Arc<Mutex<Hardware>>,
}

impl HardwareDomain {
    pub fn new(gateway: Box<dyn DeviceGateway>, camera: CaptureHandle) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Hardware {
                gateway,
                state: ControlState::default(),
                camera,
            })),
        }
    }

    /// Wait for exclusive access.
    pub async fn lock(&self) -> MutexGuard<'_, Hardware> {
        self.inner.lock().await
    }

    /// Copy of the current control state.
    pub async fn snapshot(&self) -> ControlState {
        self.inner.lock().await.state.clone()
    }

    /// Set the status text in its own short critical section.
    pub async fn set_status(&self, msg: impl Into<String>) {
        self.inner.lock().await.set_status(msg);
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Guarded resources
// ────────────────────────────────────────────────────────────────────────────

/// The resources protected by the domain. Only reachable through the guard.
pub struct Hardware {
    gateway: Box<dyn DeviceGateway>,
    state: ControlState,
    camera: CaptureHandle,
}

impl Hardware {
    pub fn gateway(&mut self) -> &mut dyn DeviceGateway {
        self.gateway.as_mut()
    }

    pub fn state(&self) -> &ControlState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut ControlState {
        &mut self.state
    }

    pub fn camera(&mut self) -> &mut CaptureHandle {
        &mut self.camera
    }

    pub fn set_status(&mut self, msg: impl Into<String>) {
        self.state.set_status(msg);
    }

    /// Log a bus fault and surface it in the status text.
    pub fn report_fault(&mut self, action: &str, err: &BotError) {
        warn!(action, error = %err, "hardware call failed");
        self.state.set_status(format!("{action} failed: {err}"));
    }

    // ── Motors ──────────────────────────────────────────────────────────────

    /// Command every `(channel, speed)` pair, continuing past failures.
    ///
    /// # Errors
    ///
    /// Returns the first failure after all channels have been attempted.
    fn command_motors(
        &mut self,
        commands: impl IntoIterator<Item = (u8, i16)>,
    ) -> Result<(), BotError> {
        let mut first_err = None;
        for (channel, speed) in commands {
            if let Err(e) = self.gateway.set_motor(channel, speed) {
                warn!(channel, speed, error = %e, "motor command failed");
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    pub fn stop_all_motors(&mut self) -> Result<(), BotError> {
        self.drive_all(0)
    }

    /// All four motors at the same signed speed.
    pub fn drive_all(&mut self, speed: i16) -> Result<(), BotError> {
        self.command_motors(MOTOR_CHANNELS.map(|ch| (ch, speed)))
    }

    /// Rotate in place counter-clockwise.
    pub fn spin_left(&mut self, speed: i16) -> Result<(), BotError> {
        self.drive_tracks(-speed, speed)
    }

    /// Rotate in place clockwise.
    pub fn spin_right(&mut self, speed: i16) -> Result<(), BotError> {
        self.drive_tracks(speed, -speed)
    }

    /// Independent speeds for the left (0, 1) and right (2, 3) tracks.
    pub fn drive_tracks(&mut self, left: i16, right: i16) -> Result<(), BotError> {
        let left_cmds = LEFT_MOTORS.map(|ch| (ch, left));
        let right_cmds = RIGHT_MOTORS.map(|ch| (ch, right));
        self.command_motors(left_cmds.into_iter().chain(right_cmds))
    }

    // ── Servos ──────────────────────────────────────────────────────────────

    /// Clamp `angle` into the servo's range, record it, then command it.
    ///
    /// The clamped angle is recorded even when the bus call fails, so the
    /// state reflects the last requested position.
    pub fn set_servo(&mut self, servo: ServoId, angle: i64) -> Result<u8, BotError> {
        let applied = match servo {
            ServoId::Pan => self.state.set_pan(angle),
            ServoId::Tilt => self.state.set_tilt(angle),
        };
        self.gateway.set_servo(servo.bus_id(), applied)?;
        Ok(applied)
    }

    // ── Sensors ─────────────────────────────────────────────────────────────

    /// Distance in millimetres from the two ultrasonic registers.
    ///
    /// # Errors
    ///
    /// [`BotError::Bus`] when either read fails or returns no data.
    pub fn read_ultrasonic_mm(&mut self) -> Result<u16, BotError> {
        let high = self.read_byte(REG_ULTRASONIC_HIGH)?;
        let low = self.read_byte(REG_ULTRASONIC_LOW)?;
        Ok((u16::from(high) << 8) | u16::from(low))
    }

    /// Last infrared key code, `None` when the board returns nothing.
    pub fn read_infrared_code(&mut self) -> Result<Option<u8>, BotError> {
        let bytes = self.gateway.read_register_block(REG_INFRARED, 1)?;
        Ok(bytes.first().copied())
    }

    fn read_byte(&mut self, addr: u8) -> Result<u8, BotError> {
        self.gateway
            .read_register_block(addr, 1)?
            .first()
            .copied()
            .ok_or_else(|| BotError::bus("read_register_block", format!("empty read at {addr:#04x}")))
    }

    // ── Indicators ──────────────────────────────────────────────────────────

    pub fn leds_off(&mut self) -> Result<(), BotError> {
        self.gateway.set_all_pixels(0, 0)
    }

    /// Motors stopped, buzzer off, LEDs off. Each step is attempted
    /// independently; failures are logged and the first one is returned.
    pub fn safe_state(&mut self) -> Result<(), BotError> {
        let steps = [
            self.stop_all_motors(),
            self.gateway.set_buzzer(false),
            self.leds_off(),
        ];
        let mut first_err = None;
        for err in steps.into_iter().filter_map(Result::err) {
            warn!(error = %err, "safe-state step failed");
            first_err.get_or_insert(err);
        }
        first_err.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use raspbot_hal::{BusCommand, CaptureSettings, SimCamera, SimGateway};

    fn domain() -> (HardwareDomain, SimGateway) {
        let gw = SimGateway::new();
        let camera = CaptureHandle::new(Arc::new(SimCamera::new(8, 8)), CaptureSettings::default());
        (HardwareDomain::new(Box::new(gw.clone()), camera), gw)
    }

    #[tokio::test]
    async fn spin_directions() {
        let (hw, gw) = domain();
        hw.lock().await.spin_left(100).unwrap();
        assert_eq!(gw.motor_speeds(), [-100, -100, 100, 100]);
        hw.lock().await.spin_right(100).unwrap();
        assert_eq!(gw.motor_speeds(), [100, 100, -100, -100]);
        hw.lock().await.stop_all_motors().unwrap();
        assert_eq!(gw.motor_speeds(), [0; 4]);
    }

    #[tokio::test]
    async fn motor_fault_still_attempts_every_channel() {
        let (hw, gw) = domain();
        gw.fail("set_motor");
        let err = hw.lock().await.drive_all(50).unwrap_err();
        assert!(matches!(err, BotError::Bus { .. }));
        let motor_calls = gw
            .commands()
            .into_iter()
            .filter(|c| matches!(c, BusCommand::Motor { .. }))
            .count();
        assert_eq!(motor_calls, 4);
    }

    #[tokio::test]
    async fn servo_clamps_and_records() {
        let (hw, gw) = domain();
        let mut guard = hw.lock().await;
        assert_eq!(guard.set_servo(ServoId::Pan, 500).unwrap(), 160);
        assert_eq!(guard.set_servo(ServoId::Tilt, 0).unwrap(), 50);
        assert_eq!((guard.state().pan(), guard.state().tilt()), (160, 50));
        drop(guard);
        assert_eq!(
            gw.commands(),
            vec![
                BusCommand::Servo { id: 1, angle: 160 },
                BusCommand::Servo { id: 2, angle: 50 },
            ]
        );
    }

    #[tokio::test]
    async fn servo_state_recorded_on_bus_failure() {
        let (hw, gw) = domain();
        gw.fail("set_servo");
        let mut guard = hw.lock().await;
        assert!(guard.set_servo(ServoId::Pan, 42).is_err());
        assert_eq!(guard.state().pan(), 42);
    }

    #[tokio::test]
    async fn ultrasonic_combines_registers() {
        let (hw, gw) = domain();
        gw.set_register(REG_ULTRASONIC_HIGH, vec![0x01]);
        gw.set_register(REG_ULTRASONIC_LOW, vec![0x2C]);
        assert_eq!(hw.lock().await.read_ultrasonic_mm().unwrap(), 300);
    }

    #[tokio::test]
    async fn infrared_empty_read_is_none() {
        let (hw, gw) = domain();
        gw.set_register(REG_INFRARED, vec![]);
        assert_eq!(hw.lock().await.read_infrared_code().unwrap(), None);
        gw.set_register(REG_INFRARED, vec![0x45]);
        assert_eq!(hw.lock().await.read_infrared_code().unwrap(), Some(0x45));
    }

    #[tokio::test]
    async fn safe_state_continues_past_failures() {
        let (hw, gw) = domain();
        gw.fail("set_buzzer");
        assert!(hw.lock().await.safe_state().is_err());
        let cmds = gw.commands();
        assert!(cmds.contains(&BusCommand::Buzzer(false)));
        assert!(cmds.contains(&BusCommand::AllPixels { effect_code: 0, param: 0 }));
        assert_eq!(gw.motor_speeds(), [0; 4]);
    }

    #[tokio::test]
    async fn report_fault_sets_status() {
        let (hw, _gw) = domain();
        let err = BotError::bus("set_buzzer", "nack");
        hw.lock().await.report_fault("buzzer", &err);
        assert!(hw.snapshot().await.status().starts_with("buzzer failed"));
    }
}
