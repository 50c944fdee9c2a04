//! `raspbot-vision` – Camera Pipeline
//!
//! Turns the shared [`CaptureHandle`][raspbot_hal::CaptureHandle] into things a
//! browser can use: timestamped stills on disk, a live MJPEG stream, and a
//! gallery listing.
//!
//! # Modules
//!
//! - [`pipeline`] – [`CameraPipeline`][pipeline::CameraPipeline]: lock-scoped
//!   frame reads and [`capture_still`][pipeline::CameraPipeline::capture_still].
//! - [`stream`] – [`mjpeg_stream`][stream::mjpeg_stream]: per-viewer
//!   `multipart/x-mixed-replace` parts with placeholder fallback.
//! - [`overlay`] – timestamp stamping with a built-in bitmap font.
//! - [`jpeg`] – RGB → JPEG via the `image` crate.
//! - [`gallery`] – newest-first listing and safe image lookup.

pub mod gallery;
pub mod jpeg;
pub mod overlay;
pub mod pipeline;
pub mod stream;

pub use gallery::{GALLERY_LIMIT, GalleryEntry};
pub use pipeline::{CameraPipeline, PipelineSettings};
pub use stream::mjpeg_stream;
