//! [`CaptureHandle`] – lazy, open-once camera acquisition with frame freshness.
//!
//! ```text
//!   Closed ──acquire()──► Opening ──ok──► Open (kept until process exit)
//!     ▲                      │
//!     └──── fail, stamp ─────┘   (no reopen until the cooldown elapses)
//! ```
//!
//! USB webcams queue several frames internally, so a naive read returns an
//! image that can be seconds old. After opening, the handle discards a batch
//! of warm-up grabs; before every read it discards a smaller flush batch.
//!
//! The handle is not internally synchronized. It lives inside the hardware
//! mutex domain and every method is called with that lock held.

use std::sync::Arc;
use std::time::Duration;

use raspbot_types::BotError;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::camera::{CameraDriver, CameraFrame, FrameSource};

/// Timing knobs for [`CaptureHandle`].
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureSettings {
    /// Frames discarded right after the device opens.
    pub warmup_grabs: u32,
    /// Frames discarded before every read.
    pub flush_grabs: u32,
    /// Pause between consecutive discard grabs.
    pub grab_delay: Duration,
    /// Minimum time between a failed open and the next attempt.
    pub open_cooldown: Duration,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            warmup_grabs: 25,
            flush_grabs: 12,
            grab_delay: Duration::from_millis(10),
            open_cooldown: Duration::from_secs(2),
        }
    }
}

/// Externally visible camera state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    /// Never opened, or the last failure is older than the cooldown.
    Closed,
    /// The last open failed recently; acquisition fails fast.
    CoolingDown,
    Open,
}

pub struct CaptureHandle {
    driver: Arc<dyn CameraDriver>,
    settings: CaptureSettings,
    source: Option<Box<dyn FrameSource>>,
    last_open_failure: Option<Instant>,
}

impl CaptureHandle {
    pub fn new(driver: Arc<dyn CameraDriver>, settings: CaptureSettings) -> Self {
        Self {
            driver,
            settings,
            source: None,
            last_open_failure: None,
        }
    }

    pub fn settings(&self) -> &CaptureSettings {
        &self.settings
    }

    pub fn state(&self) -> CaptureState {
        if self.source.is_some() {
            CaptureState::Open
        } else if self.in_cooldown() {
            CaptureState::CoolingDown
        } else {
            CaptureState::Closed
        }
    }

    fn in_cooldown(&self) -> bool {
        self.last_open_failure
            .is_some_and(|at| at.elapsed() < self.settings.open_cooldown)
    }

    /// Ensure the camera is open, opening and warming it up if needed.
    ///
    /// # Errors
    ///
    /// Returns [`BotError::CameraUnavailable`] when the open fails or when a
    /// previous open failed less than `open_cooldown` ago. In the latter case
    /// the driver is not touched.
    pub async fn acquire(&mut self) -> Result<(), BotError> {
        if self.source.is_some() {
            return Ok(());
        }
        if self.in_cooldown() {
            return Err(BotError::CameraUnavailable(
                "open failed recently, cooling down".to_string(),
            ));
        }

        let mut source = match self.driver.open() {
            Ok(source) => source,
            Err(e) => {
                warn!(error = %e, "camera open failed");
                self.last_open_failure = Some(Instant::now());
                return Err(e);
            }
        };

        if let Err(e) = source.set_buffer_size(1) {
            debug!(error = %e, "camera ignored buffer depth request");
        }
        discard(source.as_mut(), self.settings.warmup_grabs, self.settings.grab_delay).await;

        info!(warmup = self.settings.warmup_grabs, "camera opened");
        self.source = Some(source);
        self.last_open_failure = None;
        Ok(())
    }

    /// Flush stale frames and read one current frame.
    ///
    /// # Errors
    ///
    /// Returns [`BotError::CameraUnavailable`] when the handle is not open or
    /// the read fails. A failed read leaves the handle open.
    pub async fn fresh_frame(&mut self) -> Result<CameraFrame, BotError> {
        let flush = self.settings.flush_grabs;
        let delay = self.settings.grab_delay;
        let Some(source) = self.source.as_mut() else {
            return Err(BotError::CameraUnavailable("camera not open".to_string()));
        };
        discard(source.as_mut(), flush, delay).await;
        source.read()
    }

    /// [`acquire`](Self::acquire) followed by [`fresh_frame`](Self::fresh_frame).
    pub async fn acquire_fresh(&mut self) -> Result<CameraFrame, BotError> {
        self.acquire().await?;
        self.fresh_frame().await
    }
}

async fn discard(source: &mut dyn FrameSource, count: u32, delay: Duration) {
    for _ in 0..count {
        // A failed grab is expected while the sensor settles.
        let _ = source.grab();
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimCamera;

    fn fast_settings() -> CaptureSettings {
        CaptureSettings {
            warmup_grabs: 3,
            flush_grabs: 2,
            grab_delay: Duration::from_millis(1),
            open_cooldown: Duration::from_secs(2),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn opens_lazily_and_stays_open() {
        let cam = SimCamera::new(16, 8);
        let mut handle = CaptureHandle::new(Arc::new(cam.clone()), fast_settings());
        assert_eq!(handle.state(), CaptureState::Closed);
        assert_eq!(cam.open_count(), 0);

        handle.acquire().await.unwrap();
        handle.acquire().await.unwrap();
        assert_eq!(handle.state(), CaptureState::Open);
        assert_eq!(cam.open_count(), 1);
        // Warm-up grabs happen once.
        assert_eq!(cam.grab_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn fresh_frame_flushes_before_read() {
        let cam = SimCamera::new(16, 8);
        let mut handle = CaptureHandle::new(Arc::new(cam.clone()), fast_settings());
        let frame = handle.acquire_fresh().await.unwrap();
        assert_eq!((frame.width, frame.height), (16, 8));
        assert!(frame.is_well_formed());
        assert_eq!(cam.grab_count(), 3 + 2);
    }

    #[tokio::test(start_paused = true)]
    async fn fresh_frame_requires_open() {
        let cam = SimCamera::new(16, 8);
        let mut handle = CaptureHandle::new(Arc::new(cam), fast_settings());
        let err = handle.fresh_frame().await.unwrap_err();
        assert!(matches!(err, BotError::CameraUnavailable(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_open_cools_down_then_retries() {
        let cam = SimCamera::new(16, 8);
        cam.set_available(false);
        let mut handle = CaptureHandle::new(Arc::new(cam.clone()), fast_settings());

        assert!(handle.acquire().await.is_err());
        assert_eq!(cam.open_count(), 1);
        assert_eq!(handle.state(), CaptureState::CoolingDown);

        // Within the cooldown the driver is not consulted.
        cam.set_available(true);
        tokio::time::advance(Duration::from_millis(500)).await;
        assert!(handle.acquire().await.is_err());
        assert_eq!(cam.open_count(), 1);

        tokio::time::advance(Duration::from_millis(1600)).await;
        handle.acquire().await.unwrap();
        assert_eq!(cam.open_count(), 2);
        assert_eq!(handle.state(), CaptureState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn read_failure_keeps_handle_open() {
        let cam = SimCamera::new(16, 8);
        let mut handle = CaptureHandle::new(Arc::new(cam.clone()), fast_settings());
        handle.acquire().await.unwrap();

        cam.set_available(false);
        assert!(handle.fresh_frame().await.is_err());
        assert_eq!(handle.state(), CaptureState::Open);

        cam.set_available(true);
        assert!(handle.fresh_frame().await.is_ok());
        assert_eq!(cam.open_count(), 1);
    }
}
