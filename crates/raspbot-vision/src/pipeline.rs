//! [`CameraPipeline`] – stills and live frames from the shared capture handle.
//!
//! The hardware lock is held only while the camera is opened, flushed and
//! read. Overlay, JPEG encoding and disk writes run afterwards on the
//! blocking pool, so drive commands are not queued behind an encoder.

use std::path::{Path, PathBuf};
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Local};
use raspbot_hal::CameraFrame;
use raspbot_kernel::HardwareDomain;
use raspbot_types::BotError;
use tracing::{debug, info};

use crate::jpeg::{self, DEFAULT_QUALITY};
use crate::overlay;

/// Encoding and pacing knobs.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub jpeg_quality: u8,
    /// Upper bound on stream frames per second; 0 disables pacing.
    pub fps_limit: u32,
    /// Wait after sending a "camera not available" placeholder.
    pub unavailable_backoff: Duration,
    /// Wait after a failed stream-frame encode.
    pub encode_retry: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            jpeg_quality: DEFAULT_QUALITY,
            fps_limit: 20,
            unavailable_backoff: Duration::from_millis(500),
            encode_retry: Duration::from_millis(50),
        }
    }
}

impl PipelineSettings {
    /// Minimum spacing between stream frames.
    pub fn frame_interval(&self) -> Option<Duration> {
        (self.fps_limit > 0).then(|| Duration::from_secs(1) / self.fps_limit)
    }
}

/// A frame read under the lock, together with the pose it was taken at.
struct Snapshot {
    frame: CameraFrame,
    pan: u8,
    tilt: u8,
    taken_at: DateTime<Local>,
}

#[derive(Clone)]
pub struct CameraPipeline {
    hw: HardwareDomain,
    save_dir: PathBuf,
    settings: PipelineSettings,
}

impl CameraPipeline {
    pub fn new(hw: HardwareDomain, save_dir: impl Into<PathBuf>, settings: PipelineSettings) -> Self {
        Self {
            hw,
            save_dir: save_dir.into(),
            settings,
        }
    }

    pub fn save_dir(&self) -> &Path {
        &self.save_dir
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Open if needed, flush, and read one frame. Holds the hardware lock
    /// for the whole camera touch.
    pub async fn grab_frame(&self) -> Result<CameraFrame, BotError> {
        let mut hw = self.hw.lock().await;
        hw.camera().acquire_fresh().await
    }

    async fn snapshot(&self) -> Result<Snapshot, BotError> {
        let mut hw = self.hw.lock().await;
        let frame = hw.camera().acquire_fresh().await?;
        Ok(Snapshot {
            frame,
            pan: hw.state().pan(),
            tilt: hw.state().tilt(),
            taken_at: Local::now(),
        })
    }

    /// Capture a timestamped still and save it as JPEG.
    ///
    /// Returns the path of the written file. No file is created unless a
    /// frame was actually read.
    ///
    /// # Errors
    ///
    /// - [`BotError::CameraUnavailable`] – open failed, cooling down, or read failed.
    /// - [`BotError::Encode`] – the frame could not be encoded.
    /// - [`BotError::Io`] – the file could not be written.
    pub async fn capture_still(&self, tag: &str) -> Result<PathBuf, BotError> {
        let shot = self.snapshot().await?;
        let stamp = shot.taken_at.format("%Y%m%d_%H%M%S").to_string();
        let name = still_file_name(&stamp, tag, shot.pan, shot.tilt);
        let quality = self.settings.jpeg_quality;

        let frame = shot.frame;
        let jpeg = tokio::task::spawn_blocking(move || -> Result<Bytes, BotError> {
            let mut img = jpeg::frame_to_image(frame)?;
            overlay::stamp_timestamp(&mut img, &stamp);
            jpeg::encode_image(&img, quality)
        })
        .await
        .map_err(|e| BotError::Encode(format!("encoder task failed: {e}")))??;

        let path = persist(&self.save_dir, &name, &jpeg).await?;
        info!(path = %path.display(), bytes = jpeg.len(), "still captured");
        Ok(path)
    }
}

/// `img_{stamp}_{tag}_pan{pan}_tilt{tilt}.jpg`, with the tag reduced to
/// characters that are safe in a file name.
pub fn still_file_name(stamp: &str, tag: &str, pan: u8, tilt: u8) -> String {
    let tag: String = tag
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '-' })
        .collect();
    format!("img_{stamp}_{tag}_pan{pan}_tilt{tilt}.jpg")
}

/// Write `bytes` to a hidden temporary name, then rename into place so the
/// gallery never lists a half-written file.
async fn persist(dir: &Path, name: &str, bytes: &[u8]) -> Result<PathBuf, BotError> {
    let final_path = dir.join(name);
    let tmp_path = dir.join(format!(".{name}.part"));
    if let Err(e) = tokio::fs::write(&tmp_path, bytes).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(e.into());
    }
    if let Err(e) = tokio::fs::rename(&tmp_path, &final_path).await {
        debug!(error = %e, "rename failed, removing temporary file");
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(e.into());
    }
    Ok(final_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use raspbot_hal::{CaptureHandle, CaptureSettings, SimCamera, SimGateway};
    use raspbot_types::ServoId;
    use std::sync::Arc;

    fn rig(dir: &Path) -> (CameraPipeline, SimCamera, HardwareDomain) {
        let cam = SimCamera::new(64, 48);
        let settings = CaptureSettings {
            warmup_grabs: 2,
            flush_grabs: 1,
            grab_delay: Duration::from_millis(1),
            open_cooldown: Duration::from_secs(2),
        };
        let handle = CaptureHandle::new(Arc::new(cam.clone()), settings);
        let hw = HardwareDomain::new(Box::new(SimGateway::new()), handle);
        let pipeline = CameraPipeline::new(hw.clone(), dir, PipelineSettings::default());
        (pipeline, cam, hw)
    }

    fn files_in(dir: &Path) -> Vec<String> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn file_name_format() {
        assert_eq!(
            still_file_name("20240102_030405", "snap", 90, 75),
            "img_20240102_030405_snap_pan90_tilt75.jpg"
        );
        assert_eq!(
            still_file_name("20240102_030405", "../x", 20, 50),
            "img_20240102_030405_---x_pan20_tilt50.jpg"
        );
    }

    #[test]
    fn frame_interval_from_fps() {
        let s = PipelineSettings::default();
        assert_eq!(s.frame_interval(), Some(Duration::from_millis(50)));
        let unpaced = PipelineSettings {
            fps_limit: 0,
            ..PipelineSettings::default()
        };
        assert_eq!(unpaced.frame_interval(), None);
    }

    #[tokio::test]
    async fn capture_writes_jpeg_with_pose_in_name() {
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, _cam, hw) = rig(dir.path());
        hw.lock().await.set_servo(ServoId::Pan, 120).unwrap();

        let path = pipeline.capture_still("snap").await.unwrap();
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("img_"));
        assert!(name.ends_with("_snap_pan120_tilt90.jpg"));

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
        assert_eq!(files_in(dir.path()), vec![name]);
    }

    #[tokio::test]
    async fn no_file_when_camera_missing() {
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, cam, _hw) = rig(dir.path());
        cam.set_available(false);

        let err = pipeline.capture_still("snap").await.unwrap_err();
        assert!(matches!(err, BotError::CameraUnavailable(_)));
        assert!(files_in(dir.path()).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn second_failure_within_cooldown_does_not_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, cam, _hw) = rig(dir.path());
        cam.set_available(false);

        assert!(pipeline.capture_still("a").await.is_err());
        assert!(pipeline.capture_still("b").await.is_err());
        assert_eq!(cam.open_count(), 1);

        cam.set_available(true);
        tokio::time::advance(Duration::from_millis(2100)).await;
        assert!(pipeline.capture_still("c").await.is_ok());
        assert_eq!(cam.open_count(), 2);
    }

    #[tokio::test]
    async fn missing_directory_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, _cam, _hw) = rig(&dir.path().join("absent"));
        let err = pipeline.capture_still("snap").await.unwrap_err();
        assert!(matches!(err, BotError::Io(_)));
    }
}
