//! `raspbot-cockpit` – the robot's web control surface
//!
//! Boots an HTTP server (default port `5000`) that:
//!
//! 1. **Serves** the embedded control page at `/` and the picture gallery at
//!    `/gallery`.
//!
//! 2. **Accepts** commands under `/api/...` as form or JSON bodies. Inputs
//!    are clamped or defaulted, never rejected, and each command holds the
//!    hardware lock only for its own bus touch.
//!
//! 3. **Streams** the camera as `multipart/x-mixed-replace` at `/stream`.
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use raspbot_cockpit::CockpitServer;
//! use raspbot_hal::{CaptureSettings, SimCamera, SimGateway};
//! use raspbot_runtime::RobotContext;
//! use raspbot_vision::PipelineSettings;
//!
//! #[tokio::main]
//! async fn main() {
//!     let ctx = RobotContext::new(
//!         Box::new(SimGateway::new()),
//!         Arc::new(SimCamera::new(640, 480)),
//!         CaptureSettings::default(),
//!         PipelineSettings::default(),
//!         "/tmp/pictures",
//!     );
//!     CockpitServer::new(ctx)
//!         .run(std::future::pending())
//!         .await
//!         .expect("cockpit server failed");
//! }
//! ```

pub mod commands;
pub mod pages;
pub mod params;
pub mod server;

pub use params::Params;
pub use server::{CockpitServer, DEFAULT_HOST, DEFAULT_PORT, router};
