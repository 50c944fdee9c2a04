//! Scripted drive-and-photograph routine.
//!
//! ```text
//! stop ─► forward ─► stop ─► 3 × (random pose ─► settle ─► still) ─► backward ─► stop
//! ```
//!
//! Each hardware touch takes the lock on its own; the waits between phases
//! run unlocked so manual commands interleave with the routine.

use std::time::Duration;

use rand::Rng;
use raspbot_kernel::HardwareDomain;
use raspbot_types::{PAN_MAX, PAN_MIN, ServoId, TILT_MAX, TILT_MIN};
use raspbot_vision::CameraPipeline;
use tokio::time::sleep;
use tracing::{info, warn};

/// Phase timings of the routine.
#[derive(Debug, Clone, PartialEq)]
pub struct SequencePlan {
    pub pre_drive_pause: Duration,
    pub drive_time: Duration,
    pub post_drive_pause: Duration,
    pub shots: u32,
    pub servo_settle: Duration,
    pub after_shot: Duration,
}

impl Default for SequencePlan {
    fn default() -> Self {
        Self {
            pre_drive_pause: Duration::from_millis(100),
            drive_time: Duration::from_secs(3),
            post_drive_pause: Duration::from_millis(200),
            shots: 3,
            servo_settle: Duration::from_millis(250),
            after_shot: Duration::from_millis(750),
        }
    }
}

/// Stop all motors, logging (and reporting) a failure.
async fn stop(hw: &HardwareDomain, status: &str) {
    let mut guard = hw.lock().await;
    match guard.stop_all_motors() {
        Ok(()) => guard.set_status(status),
        Err(e) => guard.report_fault("sequence stop", &e),
    }
}

async fn drive(hw: &HardwareDomain, forward: bool, status: &str) {
    let mut guard = hw.lock().await;
    let speed = i16::from(guard.state().speed());
    let signed = if forward { speed } else { -speed };
    match guard.drive_all(signed) {
        Ok(()) => guard.set_status(status),
        Err(e) => guard.report_fault("sequence drive", &e),
    }
}

fn random_pose() -> (i64, i64) {
    let mut rng = rand::thread_rng();
    (
        rng.gen_range(i64::from(PAN_MIN)..=i64::from(PAN_MAX)),
        rng.gen_range(i64::from(TILT_MIN)..=i64::from(TILT_MAX)),
    )
}

/// Run the routine to completion. Not cancellable.
pub async fn run_sequence(hw: &HardwareDomain, camera: &CameraPipeline, plan: &SequencePlan) {
    info!(shots = plan.shots, "sequence started");
    stop(hw, "sequence: starting").await;
    sleep(plan.pre_drive_pause).await;

    drive(hw, true, "sequence: driving forward").await;
    sleep(plan.drive_time).await;

    stop(hw, "sequence: stopped, taking pictures").await;
    sleep(plan.post_drive_pause).await;

    for i in 0..plan.shots {
        let (pan, tilt) = random_pose();
        {
            let mut guard = hw.lock().await;
            for (servo, angle) in [(ServoId::Pan, pan), (ServoId::Tilt, tilt)] {
                if let Err(e) = guard.set_servo(servo, angle) {
                    guard.report_fault("sequence servo", &e);
                }
            }
        }
        sleep(plan.servo_settle).await;

        let tag = format!("seq{i}");
        match camera.capture_still(&tag).await {
            Ok(path) => {
                let name = path.file_name().map(|n| n.to_string_lossy().into_owned());
                hw.set_status(format!(
                    "sequence: saved {}",
                    name.unwrap_or_else(|| tag.clone())
                ))
                .await;
            }
            Err(e) => {
                warn!(tag, error = %e, "sequence still failed");
                hw.set_status(format!("sequence: no picture for {tag}")).await;
            }
        }
        sleep(plan.after_shot).await;
    }

    drive(hw, false, "sequence: driving backward").await;
    sleep(plan.drive_time).await;

    stop(hw, "sequence finished").await;
    info!("sequence finished");
}
