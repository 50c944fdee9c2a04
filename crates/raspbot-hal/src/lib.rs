//! `raspbot-hal` – Hardware Abstraction Layer
//!
//! The narrow, fallible boundary between the control server and the robot's
//! physical devices.
//!
//! # Modules
//!
//! - [`gateway`] – [`DeviceGateway`][gateway::DeviceGateway]: motors, servos,
//!   LED strip, buzzer, sensor switches and raw register reads on the
//!   expansion board.
//! - [`camera`] – [`CameraDriver`][camera::CameraDriver] /
//!   [`FrameSource`][camera::FrameSource]: opening a camera and pulling
//!   decoded RGB frames from it.
//! - [`capture`] – [`CaptureHandle`][capture::CaptureHandle]: lazy open with a
//!   failure cooldown, warm-up, and flush-before-read so stills are current.
//! - [`sim`] – [`SimGateway`][sim::SimGateway] and [`SimCamera`][sim::SimCamera]:
//!   recording doubles with fault injection, usable both in tests and to run
//!   the full server without a robot.
//! - `v4l2` (feature `v4l2`) – `V4l2Camera`: MJPEG capture from
//!   `/dev/videoN`.

pub mod camera;
pub mod capture;
pub mod gateway;
pub mod sim;
#[cfg(feature = "v4l2")]
pub mod v4l2;

pub use camera::{CameraDriver, CameraFrame, FrameSource};
pub use capture::{CaptureHandle, CaptureSettings, CaptureState};
pub use gateway::DeviceGateway;
pub use sim::{BusCommand, SimCamera, SimGateway};
#[cfg(feature = "v4l2")]
pub use v4l2::V4l2Camera;
