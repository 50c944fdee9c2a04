//! `raspbot-runtime` – background work and process plumbing
//!
//! Owns everything that outlives a single HTTP request.
//!
//! # Modules
//!
//! - [`supervisor`] – [`TaskSupervisor`][supervisor::TaskSupervisor]: at most
//!   one light effect (a new start replaces the old one after its teardown)
//!   and at most one movement sequence (a second start is refused).
//! - [`sequence`] – the drive / photograph / return choreography and its
//!   [`SequencePlan`][sequence::SequencePlan] timings.
//! - [`effects`] – [`EffectRenderer`][effects::EffectRenderer] and the
//!   built-in [`PixelShow`][effects::PixelShow] renderer for the LED strip.
//! - [`context`] – [`RobotContext`][context::RobotContext]: the shared state
//!   handed to every handler, plus startup and shutdown safe-state helpers.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: console
//!   logging with optional OTLP span export.

pub mod context;
pub mod effects;
pub mod sequence;
pub mod supervisor;
pub mod telemetry;

pub use context::{RobotContext, StatusReport};
pub use effects::{EffectRenderer, EffectRequest, PixelShow};
pub use sequence::SequencePlan;
pub use supervisor::{SequenceStart, TaskActivity, TaskSupervisor};
pub use telemetry::{TracerProviderGuard, init_tracing};
