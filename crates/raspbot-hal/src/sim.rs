//! In-process simulated hardware for tests and for running without a robot.
//!
//! [`SimGateway`] records recent bus commands in order and returns configured
//! register contents. [`SimCamera`] produces synthetic frames and can be
//! unplugged and replugged at runtime. Both are cheap `Clone` handles over
//! shared state, so a test keeps one clone for inspection while the server
//! owns the other.
//!
//! # Example
//!
//! ```rust
//! use raspbot_hal::gateway::DeviceGateway;
//! use raspbot_hal::sim::{BusCommand, SimGateway};
//!
//! let recorder = SimGateway::new().with_register(0x0C, vec![0x45]);
//! let mut gw = recorder.clone();
//! gw.set_buzzer(true).unwrap();
//! assert_eq!(recorder.commands(), vec![BusCommand::Buzzer(true)]);
//! assert_eq!(gw.read_register_block(0x0C, 1).unwrap(), vec![0x45]);
//! ```

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use raspbot_types::BotError;

use crate::camera::{CameraDriver, CameraFrame, FrameSource};
use crate::gateway::{DeviceGateway, MOTOR_CHANNELS};

// ────────────────────────────────────────────────────────────────────────────
// Simulated gateway
// ────────────────────────────────────────────────────────────────────────────

/// One recorded gateway call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusCommand {
    Motor { channel: u8, speed: i16 },
    Servo { id: u8, angle: u8 },
    AllPixels { effect_code: u8, param: u8 },
    PixelRgb { index: u8, r: u8, g: u8, b: u8 },
    AllPixelsRgb { r: u8, g: u8, b: u8 },
    Buzzer(bool),
    Ultrasonic(bool),
    Infrared(bool),
    Read { addr: u8, len: usize },
}

/// Commands kept by [`SimGateway::new`]; older ones are dropped first.
pub const DEFAULT_HISTORY: usize = 4096;

struct SimBus {
    log: VecDeque<BusCommand>,
    capacity: usize,
    speeds: [i16; 4],
    failing: HashSet<String>,
    registers: HashMap<u8, Vec<u8>>,
}

/// Recording gateway with per-operation fault injection.
///
/// Failed calls are still recorded, so tests can assert that a multi-channel
/// helper kept going after a fault. The history is bounded, which keeps a
/// long-running simulated robot at constant memory.
#[derive(Clone)]
pub struct SimGateway {
    bus: Arc<Mutex<SimBus>>,
}

impl Default for SimGateway {
    fn default() -> Self {
        Self::with_history(DEFAULT_HISTORY)
    }
}

impl SimGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `capacity` recorded commands (at least one).
    pub fn with_history(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            bus: Arc::new(Mutex::new(SimBus {
                log: VecDeque::with_capacity(capacity.min(DEFAULT_HISTORY)),
                capacity,
                speeds: [0; 4],
                failing: HashSet::new(),
                registers: HashMap::new(),
            })),
        }
    }

    /// Preload register `addr` with `bytes`. Unset registers read as zeros.
    pub fn with_register(self, addr: u8, bytes: Vec<u8>) -> Self {
        self.set_register(addr, bytes);
        self
    }

    pub fn set_register(&self, addr: u8, bytes: Vec<u8>) {
        self.bus().registers.insert(addr, bytes);
    }

    /// Make every subsequent call to `operation` (a trait method name such as
    /// `"set_motor"`) return [`BotError::Bus`].
    pub fn fail(&self, operation: &str) {
        self.bus().failing.insert(operation.to_string());
    }

    /// Undo [`fail`](Self::fail).
    pub fn heal(&self, operation: &str) {
        self.bus().failing.remove(operation);
    }

    /// The retained calls, oldest first.
    pub fn commands(&self) -> Vec<BusCommand> {
        self.bus().log.iter().cloned().collect()
    }

    /// Forget the recorded history and motor speeds.
    pub fn clear(&self) {
        let mut bus = self.bus();
        bus.log.clear();
        bus.speeds = [0; 4];
    }

    /// Latest commanded speed per motor channel, 0 when never commanded.
    pub fn motor_speeds(&self) -> [i16; 4] {
        self.bus().speeds
    }

    fn bus(&self) -> MutexGuard<'_, SimBus> {
        self.bus.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, operation: &str, cmd: BusCommand) -> Result<(), BotError> {
        let mut bus = self.bus();
        if let BusCommand::Motor { channel, speed } = cmd
            && let Some(slot) = bus.speeds.get_mut(channel as usize)
        {
            *slot = speed;
        }
        if bus.log.len() == bus.capacity {
            bus.log.pop_front();
        }
        bus.log.push_back(cmd);
        if bus.failing.contains(operation) {
            return Err(BotError::bus(operation, "simulated fault"));
        }
        Ok(())
    }
}

impl DeviceGateway for SimGateway {
    fn set_motor(&mut self, channel: u8, speed: i16) -> Result<(), BotError> {
        if !MOTOR_CHANNELS.contains(&channel) {
            return Err(BotError::bus("set_motor", format!("no channel {channel}")));
        }
        self.record("set_motor", BusCommand::Motor { channel, speed })
    }

    fn set_servo(&mut self, id: u8, angle: u8) -> Result<(), BotError> {
        self.record("set_servo", BusCommand::Servo { id, angle })
    }

    fn set_all_pixels(&mut self, effect_code: u8, param: u8) -> Result<(), BotError> {
        self.record("set_all_pixels", BusCommand::AllPixels { effect_code, param })
    }

    fn set_pixel_rgb(&mut self, index: u8, r: u8, g: u8, b: u8) -> Result<(), BotError> {
        self.record("set_pixel_rgb", BusCommand::PixelRgb { index, r, g, b })
    }

    fn set_all_pixels_rgb(&mut self, r: u8, g: u8, b: u8) -> Result<(), BotError> {
        self.record("set_all_pixels_rgb", BusCommand::AllPixelsRgb { r, g, b })
    }

    fn set_buzzer(&mut self, on: bool) -> Result<(), BotError> {
        self.record("set_buzzer", BusCommand::Buzzer(on))
    }

    fn set_ultrasonic_enabled(&mut self, on: bool) -> Result<(), BotError> {
        self.record("set_ultrasonic_enabled", BusCommand::Ultrasonic(on))
    }

    fn set_infrared_enabled(&mut self, on: bool) -> Result<(), BotError> {
        self.record("set_infrared_enabled", BusCommand::Infrared(on))
    }

    fn read_register_block(&mut self, addr: u8, len: usize) -> Result<Vec<u8>, BotError> {
        self.record("read_register_block", BusCommand::Read { addr, len })?;
        let bus = self.bus();
        Ok(match bus.registers.get(&addr) {
            Some(bytes) => bytes.iter().copied().take(len).collect(),
            None => vec![0; len],
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Simulated camera
// ────────────────────────────────────────────────────────────────────────────

struct SimCameraShared {
    width: u32,
    height: u32,
    available: AtomicBool,
    opens: AtomicUsize,
    grabs: AtomicUsize,
    frames: AtomicU64,
}

/// Synthetic camera: a colour gradient with a bar that moves every frame.
#[derive(Clone)]
pub struct SimCamera {
    shared: Arc<SimCameraShared>,
}

impl SimCamera {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            shared: Arc::new(SimCameraShared {
                width,
                height,
                available: AtomicBool::new(true),
                opens: AtomicUsize::new(0),
                grabs: AtomicUsize::new(0),
                frames: AtomicU64::new(0),
            }),
        }
    }

    /// Plug (`true`) or unplug (`false`) the camera. While unplugged, opens,
    /// grabs and reads fail.
    pub fn set_available(&self, available: bool) {
        self.shared.available.store(available, Ordering::SeqCst);
    }

    /// Number of open attempts, successful or not.
    pub fn open_count(&self) -> usize {
        self.shared.opens.load(Ordering::SeqCst)
    }

    pub fn grab_count(&self) -> usize {
        self.shared.grabs.load(Ordering::SeqCst)
    }

    /// Number of frames successfully read.
    pub fn frame_count(&self) -> u64 {
        self.shared.frames.load(Ordering::SeqCst)
    }
}

impl CameraDriver for SimCamera {
    fn open(&self) -> Result<Box<dyn FrameSource>, BotError> {
        self.shared.opens.fetch_add(1, Ordering::SeqCst);
        if !self.shared.available.load(Ordering::SeqCst) {
            return Err(BotError::CameraUnavailable("simulated camera unplugged".into()));
        }
        Ok(Box::new(SimFrameSource {
            shared: Arc::clone(&self.shared),
        }))
    }
}

struct SimFrameSource {
    shared: Arc<SimCameraShared>,
}

impl SimFrameSource {
    fn check(&self) -> Result<(), BotError> {
        if self.shared.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(BotError::CameraUnavailable("simulated camera unplugged".into()))
        }
    }
}

impl FrameSource for SimFrameSource {
    fn set_buffer_size(&mut self, _frames: u32) -> Result<(), BotError> {
        Ok(())
    }

    fn grab(&mut self) -> Result<(), BotError> {
        self.shared.grabs.fetch_add(1, Ordering::SeqCst);
        self.check()
    }

    fn read(&mut self) -> Result<CameraFrame, BotError> {
        self.check()?;
        let seq = self.shared.frames.fetch_add(1, Ordering::SeqCst);
        Ok(synthetic_frame(self.shared.width, self.shared.height, seq))
    }
}

fn synthetic_frame(width: u32, height: u32, seq: u64) -> CameraFrame {
    let bar = (seq % u64::from(width.max(1))) as u32;
    let mut data = Vec::with_capacity((width * height * 3) as usize);
    for y in 0..height {
        for x in 0..width {
            if x == bar {
                data.extend_from_slice(&[255, 255, 255]);
            } else {
                let r = (x * 255 / width.max(1)) as u8;
                let g = (y * 255 / height.max(1)) as u8;
                data.extend_from_slice(&[r, g, 96]);
            }
        }
    }
    CameraFrame {
        width,
        height,
        data,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
