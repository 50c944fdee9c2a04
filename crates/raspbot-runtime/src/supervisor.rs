//! [`TaskSupervisor`] – lifecycle of the long-running background tasks.
//!
//! | Class | Concurrency | Start while active |
//! |---|---|---|
//! | light effect | at most one | replaces: old instance is signalled, new one waits for its teardown |
//! | sequence | at most one | rejected with [`SequenceStart::Busy`] |
//!
//! The light-effect slot is a plain `std::sync::Mutex` because it is only
//! ever held for a swap, never across an await. A stopped instance keeps its
//! handle in the slot until the next start chains onto it, so teardowns
//! never overlap a newer effect.

use std::sync::{Arc, Mutex, MutexGuard};

use raspbot_kernel::HardwareDomain;
use raspbot_vision::CameraPipeline;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::effects::{EffectRenderer, EffectRequest};
use crate::sequence::{SequencePlan, run_sequence};

/// Outcome of [`TaskSupervisor::start_sequence`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SequenceStart {
    Started,
    Busy,
}

/// Which background tasks are currently running.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskActivity {
    pub light_effect: Option<String>,
    pub sequence_running: bool,
}

struct LightSlot {
    id: Uuid,
    request: EffectRequest,
    stop: CancellationToken,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct LightState {
    active: Option<LightSlot>,
    /// Handle of the last stopped instance, awaited by the next start.
    stopping: Option<JoinHandle<()>>,
}

type SharedSlot = Arc<Mutex<LightState>>;

fn lock_slot(slot: &Mutex<LightState>) -> MutexGuard<'_, LightState> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Clone)]
pub struct TaskSupervisor {
    hw: HardwareDomain,
    camera: CameraPipeline,
    renderer: Arc<dyn EffectRenderer>,
    light: SharedSlot,
    run_lock: Arc<tokio::sync::Mutex<()>>,
    plan: SequencePlan,
}

impl TaskSupervisor {
    pub fn new(hw: HardwareDomain, camera: CameraPipeline, renderer: Arc<dyn EffectRenderer>) -> Self {
        Self {
            hw,
            camera,
            renderer,
            light: Arc::new(Mutex::new(LightState::default())),
            run_lock: Arc::new(tokio::sync::Mutex::new(())),
            plan: SequencePlan::default(),
        }
    }

    /// Override the sequence timings.
    pub fn with_sequence_plan(mut self, plan: SequencePlan) -> Self {
        self.plan = plan;
        self
    }

    // ── Light effects ───────────────────────────────────────────────────────

    /// Start a light effect, replacing any running one. Returns immediately
    /// with the new instance id.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start_light_effect(&self, request: EffectRequest) -> Uuid {
        let id = Uuid::new_v4();
        let stop = CancellationToken::new();

        let mut slot = lock_slot(&self.light);
        let previous = match slot.active.take() {
            Some(prev) => {
                prev.stop.cancel();
                info!(id = %prev.id, effect = %prev.request.effect, "light effect replaced");
                Some(prev.handle)
            }
            None => slot.stopping.take(),
        };

        let handle = tokio::spawn(light_task(
            id,
            request,
            stop.clone(),
            previous,
            Arc::clone(&self.renderer),
            Arc::clone(&self.light),
            self.hw.clone(),
        ));
        slot.active = Some(LightSlot {
            id,
            request,
            stop,
            handle,
        });
        info!(%id, effect = %request.effect, duration = ?request.duration, "light effect started");
        id
    }

    /// Signal the running light effect (if any) and clear the slot without
    /// waiting for its teardown. Returns whether one was running.
    ///
    /// The next [`start_light_effect`](Self::start_light_effect) waits for
    /// the stopped instance to finish tearing down.
    pub fn stop_light_effect(&self) -> bool {
        let mut slot = lock_slot(&self.light);
        match slot.active.take() {
            Some(prev) => {
                prev.stop.cancel();
                info!(id = %prev.id, "light effect stopped");
                slot.stopping = Some(prev.handle);
                true
            }
            None => false,
        }
    }

    /// The effect currently occupying the slot.
    pub fn active_light_effect(&self) -> Option<EffectRequest> {
        lock_slot(&self.light)
            .active
            .as_ref()
            .filter(|s| !s.handle.is_finished())
            .map(|s| s.request)
    }

    // ── Sequence ────────────────────────────────────────────────────────────

    /// Start the scripted sequence unless one is already running.
    pub async fn start_sequence(&self) -> SequenceStart {
        let Ok(guard) = Arc::clone(&self.run_lock).try_lock_owned() else {
            self.hw.set_status("sequence already running").await;
            return SequenceStart::Busy;
        };
        let hw = self.hw.clone();
        let camera = self.camera.clone();
        let plan = self.plan.clone();
        tokio::spawn(async move {
            // Held for the life of the task; dropped on completion, panic or abort.
            let _running = guard;
            run_sequence(&hw, &camera, &plan).await;
        });
        SequenceStart::Started
    }

    pub fn sequence_running(&self) -> bool {
        self.run_lock.try_lock().is_err()
    }

    pub fn activity(&self) -> TaskActivity {
        TaskActivity {
            light_effect: self.active_light_effect().map(|r| r.effect.to_string()),
            sequence_running: self.sequence_running(),
        }
    }
}

async fn light_task(
    id: Uuid,
    request: EffectRequest,
    stop: CancellationToken,
    previous: Option<JoinHandle<()>>,
    renderer: Arc<dyn EffectRenderer>,
    slot: SharedSlot,
    hw: HardwareDomain,
) {
    if let Some(prev) = previous
        && let Err(e) = prev.await
    {
        warn!(error = %e, "previous light effect task ended abnormally");
    }

    if !stop.is_cancelled() {
        hw.set_status(format!("light effect {} running", request.effect)).await;
        if let Err(e) = renderer.run(request, stop.clone()).await {
            warn!(%id, error = %e, "light effect failed");
        }
    }

    if let Err(e) = renderer.turn_off_all().await {
        warn!(%id, error = %e, "turning LEDs off after effect failed");
    }

    let owned = {
        let mut current = lock_slot(&slot);
        let owned = current.active.as_ref().is_some_and(|s| s.id == id);
        if owned {
            current.active = None;
        }
        owned
    };
    // A stopped or replaced instance leaves the status to whoever stopped it.
    if owned {
        hw.set_status("light effect finished").await;
    }
}
