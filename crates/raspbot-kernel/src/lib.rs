//! `raspbot-kernel` – Hardware Mutex Domain
//!
//! Serializes every touch of the physical robot. It does not decide what to
//! do; it makes sure that whatever is done happens one caller at a time.
//!
//! # Modules
//!
//! - [`hardware`] – [`HardwareDomain`][hardware::HardwareDomain]: the fair
//!   async lock guarding the [`DeviceGateway`][raspbot_hal::DeviceGateway],
//!   the [`ControlState`][raspbot_types::ControlState] and the camera
//!   [`CaptureHandle`][raspbot_hal::CaptureHandle], plus the drive, servo,
//!   sensor and indicator helpers available on the locked
//!   [`Hardware`][hardware::Hardware] guard.

pub mod hardware;

pub use hardware::{Hardware, HardwareDomain};
