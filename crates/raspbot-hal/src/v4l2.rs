//! Video4Linux2 camera driver (feature `v4l2`).
//!
//! Requests MJPEG from the device and decodes each dequeued buffer to RGB24.
//! USB webcams on the Raspberry Pi almost universally offer MJPEG; devices
//! that refuse it are reported as unavailable.

use image::ImageFormat;
use raspbot_types::BotError;
use tracing::info;
use v4l::FourCC;
use v4l::buffer::Type;
use v4l::io::mmap::Stream as MmapStream;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;

use crate::camera::{CameraDriver, CameraFrame, FrameSource};

const DEFAULT_BUFFERS: u32 = 4;

/// Opens `/dev/videoN` style devices.
#[derive(Debug, Clone)]
pub struct V4l2Camera {
    path: String,
    width: u32,
    height: u32,
}

impl V4l2Camera {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            width: 640,
            height: 480,
        }
    }

    /// Requested capture size; the driver may pick the closest it supports.
    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }
}

fn unavailable(what: &str, e: impl std::fmt::Display) -> BotError {
    BotError::CameraUnavailable(format!("{what}: {e}"))
}

impl CameraDriver for V4l2Camera {
    fn open(&self) -> Result<Box<dyn FrameSource>, BotError> {
        let device =
            Device::with_path(&self.path).map_err(|e| unavailable("failed to open device", e))?;

        let mut format = device
            .format()
            .map_err(|e| unavailable("failed to get format", e))?;
        format.width = self.width;
        format.height = self.height;
        format.fourcc = FourCC::new(b"MJPG");
        let actual = device
            .set_format(&format)
            .map_err(|e| unavailable("failed to set format", e))?;
        if actual.fourcc != FourCC::new(b"MJPG") {
            return Err(BotError::CameraUnavailable(format!(
                "{} does not offer MJPEG (got {})",
                self.path, actual.fourcc
            )));
        }
        info!(
            device = %self.path,
            width = actual.width,
            height = actual.height,
            "v4l2 camera configured"
        );

        let stream = MmapStream::with_buffers(&device, Type::VideoCapture, DEFAULT_BUFFERS)
            .map_err(|e| unavailable("failed to create stream", e))?;
        Ok(Box::new(V4l2Source {
            device,
            stream: Some(stream),
        }))
    }
}

struct V4l2Source {
    device: Device,
    stream: Option<MmapStream<'static>>,
}

impl V4l2Source {
    fn stream(&mut self) -> Result<&mut MmapStream<'static>, BotError> {
        self.stream
            .as_mut()
            .ok_or_else(|| BotError::CameraUnavailable("stream not running".into()))
    }
}

impl FrameSource for V4l2Source {
    fn set_buffer_size(&mut self, frames: u32) -> Result<(), BotError> {
        // The buffer count is fixed per stream, so restart with the new depth.
        self.stream = None;
        let stream = MmapStream::with_buffers(&self.device, Type::VideoCapture, frames.max(1))
            .map_err(|e| unavailable("failed to resize stream", e))?;
        self.stream = Some(stream);
        Ok(())
    }

    fn grab(&mut self) -> Result<(), BotError> {
        self.stream()?
            .next()
            .map(|_| ())
            .map_err(|e| unavailable("failed to dequeue frame", e))
    }

    fn read(&mut self) -> Result<CameraFrame, BotError> {
        let (buf, _meta) = self
            .stream()?
            .next()
            .map_err(|e| unavailable("failed to dequeue frame", e))?;
        let rgb = image::load_from_memory_with_format(buf, ImageFormat::Jpeg)
            .map_err(|e| unavailable("failed to decode frame", e))?
            .to_rgb8();
        Ok(CameraFrame {
            width: rgb.width(),
            height: rgb.height(),
            data: rgb.into_raw(),
        })
    }
}
