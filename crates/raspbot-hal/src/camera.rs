//! Camera driver traits and the decoded frame type.
//!
//! A [`CameraDriver`] knows how to open the device; the opened
//! [`FrameSource`] is then owned by the [`CaptureHandle`][crate::capture::CaptureHandle]
//! for the rest of the process.

use raspbot_types::BotError;

/// A decoded RGB24 frame, row-major, three bytes per pixel.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraFrame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl CameraFrame {
    /// A frame of `width`×`height` filled with a single colour.
    pub fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let data = rgb
            .iter()
            .copied()
            .cycle()
            .take((width * height * 3) as usize)
            .collect();
        Self {
            width,
            height,
            data,
        }
    }

    /// `true` when `data` holds exactly `width * height` RGB pixels.
    pub fn is_well_formed(&self) -> bool {
        self.data.len() == (self.width as usize) * (self.height as usize) * 3
    }
}

/// An opened camera stream.
pub trait FrameSource: Send {
    /// Request a driver-side queue depth. Drivers that cannot honour it may
    /// return an error, which callers ignore.
    fn set_buffer_size(&mut self, frames: u32) -> Result<(), BotError>;

    /// Dequeue and discard one frame.
    fn grab(&mut self) -> Result<(), BotError>;

    /// Dequeue and decode one frame.
    ///
    /// # Errors
    ///
    /// Returns [`BotError::CameraUnavailable`] when no frame can be produced.
    fn read(&mut self) -> Result<CameraFrame, BotError>;
}

/// Something that can open a camera device.
pub trait CameraDriver: Send + Sync {
    /// Open the device.
    ///
    /// # Errors
    ///
    /// Returns [`BotError::CameraUnavailable`] when the device is missing or
    /// refuses to start streaming.
    fn open(&self) -> Result<Box<dyn FrameSource>, BotError>;
}
