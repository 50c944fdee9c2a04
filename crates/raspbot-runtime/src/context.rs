//! [`RobotContext`] – everything a request handler needs, built once at startup.

use std::path::PathBuf;
use std::sync::Arc;

use raspbot_hal::{CameraDriver, CaptureHandle, CaptureSettings, DeviceGateway};
use raspbot_kernel::HardwareDomain;
use raspbot_types::BotError;
use raspbot_vision::{CameraPipeline, PipelineSettings};
use serde::Serialize;
use tracing::warn;

use crate::effects::{EffectRenderer, PixelShow};
use crate::supervisor::{TaskActivity, TaskSupervisor};

/// Shared server state. Cheap to clone; every clone refers to the same
/// hardware lock, camera and task slots.
#[derive(Clone)]
pub struct RobotContext {
    pub hardware: HardwareDomain,
    pub camera: CameraPipeline,
    pub supervisor: TaskSupervisor,
}

/// JSON body of `/api/status`.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    #[serde(flatten)]
    pub state: raspbot_types::ControlState,
    pub camera_open: bool,
    pub tasks: TaskActivity,
}

impl RobotContext {
    /// Wire the domain, pipeline and supervisor around the given drivers,
    /// using the built-in [`PixelShow`] renderer.
    pub fn new(
        gateway: Box<dyn DeviceGateway>,
        camera: Arc<dyn CameraDriver>,
        capture: CaptureSettings,
        pipeline: PipelineSettings,
        save_dir: impl Into<PathBuf>,
    ) -> Self {
        let hardware = HardwareDomain::new(gateway, CaptureHandle::new(camera, capture));
        let renderer: Arc<dyn EffectRenderer> = Arc::new(PixelShow::new(hardware.clone()));
        Self::with_renderer(hardware, renderer, pipeline, save_dir)
    }

    pub fn with_renderer(
        hardware: HardwareDomain,
        renderer: Arc<dyn EffectRenderer>,
        pipeline: PipelineSettings,
        save_dir: impl Into<PathBuf>,
    ) -> Self {
        let camera = CameraPipeline::new(hardware.clone(), save_dir, pipeline);
        let supervisor = TaskSupervisor::new(hardware.clone(), camera.clone(), renderer);
        Self {
            hardware,
            camera,
            supervisor,
        }
    }

    pub async fn status_report(&self) -> StatusReport {
        let (state, camera_open) = {
            let mut hw = self.hardware.lock().await;
            let open = hw.camera().state() == raspbot_hal::CaptureState::Open;
            (hw.state().clone(), open)
        };
        StatusReport {
            state,
            camera_open,
            tasks: self.supervisor.activity(),
        }
    }

    /// Motors stopped, buzzer off, LEDs off. Used before serving.
    pub async fn enter_safe_state(&self) -> Result<(), BotError> {
        let mut hw = self.hardware.lock().await;
        let result = hw.safe_state();
        hw.set_status(match &result {
            Ok(()) => "ready".to_string(),
            Err(e) => format!("startup safe state incomplete: {e}"),
        });
        result
    }

    /// Stop the light effect and put the hardware in its safe state. Used on
    /// shutdown; failures are logged, not returned.
    pub async fn shutdown(&self) {
        self.supervisor.stop_light_effect();
        if let Err(e) = self.hardware.lock().await.safe_state() {
            warn!(error = %e, "shutdown safe state incomplete");
        }
    }
}
